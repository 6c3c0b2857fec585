//! Live transcript segmentation and subtitle lifecycle.

pub mod lifecycle;
pub mod segmenter;
pub mod types;

pub use lifecycle::{
    PassthroughTranslator, SubtitleLifecycle, TranslateError, TranslationUpdate, Translator,
};
pub use segmenter::{normalize_text, EngineUpdate, SegmentationEngine, SegmenterConfig};
pub use types::{SegmentId, SubtitleSegment, TRANSLATION_FAILED, TRANSLATION_PENDING};
