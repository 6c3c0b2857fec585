//! Core types for the speech-engine boundary.

/// Transcription event types
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptionEvent {
    /// Partial transcription result (ongoing speech); supersedes the
    /// previous partial for the current utterance.
    Partial { text: String },
    /// Final transcription result (utterance complete)
    Final { text: String },
    /// Engine failure; session-fatal for the orchestrator.
    Error { code: String, message: String },
}

impl TranscriptionEvent {
    pub fn text(&self) -> Option<&str> {
        match self {
            TranscriptionEvent::Partial { text } | TranscriptionEvent::Final { text } => {
                Some(text)
            }
            TranscriptionEvent::Error { .. } => None,
        }
    }

    pub fn is_final(&self) -> bool {
        matches!(self, TranscriptionEvent::Final { .. })
    }
}
