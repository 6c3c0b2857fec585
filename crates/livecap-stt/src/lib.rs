//! Speech-to-text abstraction layer for livecap.
//!
//! The recognizer itself is an external collaborator; this crate defines
//! the interface the orchestrator consumes plus a scripted engine for
//! deterministic tests.

use thiserror::Error;

pub mod types;

pub use types::TranscriptionEvent;

#[derive(Error, Debug)]
pub enum SttError {
    #[error("Engine unavailable: {0}")]
    Unavailable(String),

    #[error("Engine rejected audio: {0}")]
    Rejected(String),
}

/// Streaming transcription interface.
///
/// Feed 16 kHz mono S16LE samples as they become available; the engine
/// emits zero or more events per feed. Events are also allowed to arrive
/// on `finalize`, which ends the current utterance.
#[async_trait::async_trait]
pub trait StreamingStt: Send {
    /// Accept canonical PCM and return any events it produced.
    async fn accept_audio(&mut self, samples: &[i16]) -> Result<Vec<TranscriptionEvent>, SttError>;

    /// End of session: flush whatever the engine still holds.
    async fn finalize(&mut self) -> Result<Vec<TranscriptionEvent>, SttError>;
}

/// Engine that consumes audio and never transcribes. Useful for running
/// the pipeline when only the audio path is under scrutiny (e.g. with the
/// debug WAV sink) and no recognizer is wired in.
#[derive(Debug, Default)]
pub struct NullStt {
    samples_seen: u64,
}

impl NullStt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }
}

#[async_trait::async_trait]
impl StreamingStt for NullStt {
    async fn accept_audio(&mut self, samples: &[i16]) -> Result<Vec<TranscriptionEvent>, SttError> {
        self.samples_seen += samples.len() as u64;
        Ok(Vec::new())
    }

    async fn finalize(&mut self) -> Result<Vec<TranscriptionEvent>, SttError> {
        tracing::debug!(target: "stt", samples = self.samples_seen, "null engine finalized");
        Ok(Vec::new())
    }
}

/// Scripted engine for tests: releases a predefined event sequence, one
/// batch per `accept_audio` call, regardless of audio content.
pub struct ScriptedStt {
    script: std::collections::VecDeque<Vec<TranscriptionEvent>>,
    final_events: Vec<TranscriptionEvent>,
    samples_seen: u64,
}

impl ScriptedStt {
    pub fn new(
        script: Vec<Vec<TranscriptionEvent>>,
        final_events: Vec<TranscriptionEvent>,
    ) -> Self {
        Self {
            script: script.into(),
            final_events,
            samples_seen: 0,
        }
    }

    pub fn samples_seen(&self) -> u64 {
        self.samples_seen
    }
}

#[async_trait::async_trait]
impl StreamingStt for ScriptedStt {
    async fn accept_audio(&mut self, samples: &[i16]) -> Result<Vec<TranscriptionEvent>, SttError> {
        self.samples_seen += samples.len() as u64;
        Ok(self.script.pop_front().unwrap_or_default())
    }

    async fn finalize(&mut self) -> Result<Vec<TranscriptionEvent>, SttError> {
        Ok(std::mem::take(&mut self.final_events))
    }
}
