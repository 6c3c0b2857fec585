//! Subtitle data model.

use std::time::Instant;

pub type SegmentId = u64;

/// Shown while a segment's translation is still in flight.
pub const TRANSLATION_PENDING: &str = "...";
/// Shown when translation failed; never retried automatically.
pub const TRANSLATION_FAILED: &str = "[translation failed]";

/// One committed (or, transiently, previewed) subtitle line.
///
/// Created once per commit. `translated_text` is the only field mutated
/// afterwards, exactly once, when the translation resolves. The id is
/// unique for the process lifetime and never re-keyed.
#[derive(Debug, Clone, PartialEq)]
pub struct SubtitleSegment {
    pub id: SegmentId,
    pub original_text: String,
    pub translated_text: String,
    pub timestamp: Instant,
    pub is_final: bool,
}
