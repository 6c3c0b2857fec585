//! Producer-side pipeline: normalizer plus transport writer.
//!
//! This is the only piece that runs inside the producer's real-time
//! delivery callback. One call per chunk, no blocking beyond the file
//! append, and no access to any consumer-side state.

use std::path::Path;

use livecap_foundation::AudioError;
use tracing::warn;

use crate::normalizer::{AudioChunk, AudioNormalizer, NormalizerStats};
use crate::resampler::ResamplerQuality;
use crate::transport::TransportWriter;

pub struct ProducerPipeline {
    normalizer: AudioNormalizer,
    writer: TransportWriter,
    format_published: bool,
}

impl ProducerPipeline {
    /// Open the transport (asserting the session-active marker) and set up
    /// normalization.
    pub fn start(transport_dir: &Path, quality: ResamplerQuality) -> Result<Self, AudioError> {
        let writer = TransportWriter::create(transport_dir)?;
        Ok(Self {
            normalizer: AudioNormalizer::new(quality),
            writer,
            format_published: false,
        })
    }

    /// Normalize one chunk and append the result. A failed chunk is
    /// dropped by the normalizer; transport I/O failure is the only error
    /// surfaced, since a broken channel ends the session anyway.
    pub fn push_chunk(&mut self, chunk: &AudioChunk<'_>) -> Result<(), AudioError> {
        if !self.format_published {
            // Side channel for the consumer-side conversion fallback.
            if let Err(e) = self.writer.write_format_record(&chunk.format.into()) {
                warn!(target: "audio", error = %e, "failed to publish source format record");
            }
            self.format_published = true;
        }
        if let Some(canonical) = self.normalizer.normalize(chunk) {
            self.writer.append(&canonical)?;
        }
        Ok(())
    }

    pub fn stats(&self) -> NormalizerStats {
        self.normalizer.stats()
    }

    pub fn bytes_appended(&self) -> u64 {
        self.writer.bytes_appended()
    }

    /// Clear the session marker and stop.
    pub fn finish(self) -> Result<(), AudioError> {
        self.writer.finish()
    }
}
