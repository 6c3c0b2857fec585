//! Optional debug artifact: a WAV capture of everything actually delivered
//! to the speech engine. Not required for correctness; invaluable when a
//! transcript goes wrong and the question is "what did the engine hear".

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use hound::{SampleFormat, WavSpec, WavWriter};
use livecap_foundation::AudioError;
use tracing::info;

use crate::format::{CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE_HZ};

pub struct DebugWavSink {
    path: PathBuf,
    writer: WavWriter<BufWriter<File>>,
    samples_written: u64,
}

impl DebugWavSink {
    pub fn create(path: &Path) -> Result<Self, AudioError> {
        let spec = WavSpec {
            channels: CANONICAL_CHANNELS,
            sample_rate: CANONICAL_SAMPLE_RATE_HZ,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let writer =
            WavWriter::create(path, spec).map_err(|e| AudioError::WavSink(e.to_string()))?;
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            samples_written: 0,
        })
    }

    pub fn write_samples(&mut self, samples: &[i16]) -> Result<(), AudioError> {
        for &s in samples {
            self.writer
                .write_sample(s)
                .map_err(|e| AudioError::WavSink(e.to_string()))?;
        }
        self.samples_written += samples.len() as u64;
        Ok(())
    }

    pub fn samples_written(&self) -> u64 {
        self.samples_written
    }

    /// Patch the RIFF/data sizes from the accumulated length and close.
    pub fn finalize(self) -> Result<(), AudioError> {
        info!(
            target: "audio",
            path = %self.path.display(),
            samples = self.samples_written,
            "finalizing debug WAV"
        );
        self.writer
            .finalize()
            .map_err(|e| AudioError::WavSink(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn finalized_wav_reads_back_with_canonical_spec() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("session.wav");

        let mut sink = DebugWavSink::create(&path).unwrap();
        let samples: Vec<i16> = (0..1600).map(|i| (i % 256) as i16 * 100).collect();
        sink.write_samples(&samples).unwrap();
        assert_eq!(sink.samples_written(), 1600);
        sink.finalize().unwrap();

        let mut reader = hound::WavReader::open(&path).unwrap();
        let spec = reader.spec();
        assert_eq!(spec.channels, 1);
        assert_eq!(spec.sample_rate, 16_000);
        assert_eq!(spec.bits_per_sample, 16);
        let back: Vec<i16> = reader.samples::<i16>().map(|s| s.unwrap()).collect();
        assert_eq!(back, samples);
    }
}
