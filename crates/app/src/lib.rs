pub mod runtime;

pub use runtime::{SessionConfig, SessionRunner, SessionSummary};
