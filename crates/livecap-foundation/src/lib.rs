//! Foundation types shared across the livecap workspace.

pub mod clock;
pub mod error;

pub use clock::{real_clock, Clock, RealClock, SharedClock, TestClock};
pub use error::{AudioError, SessionError};
