//! Audio normalization: arbitrary producer formats to canonical 16 kHz
//! mono S16LE.
//!
//! The normalizer runs on the producer's real-time delivery callback, so a
//! bad chunk is dropped (and logged) rather than surfaced as an error, and
//! the expensive converter is cached across chunks and rebuilt only when
//! the source format actually changes.

use livecap_foundation::AudioError;
use tracing::{debug, info, warn};

use crate::format::{ChannelLayout, FormatDescriptor, SampleEncoding};
use crate::resampler::{quantize, ResamplerQuality, StreamResampler};

/// One producer-side chunk: a contiguous byte span plus its format.
#[derive(Debug, Clone, Copy)]
pub struct AudioChunk<'a> {
    pub bytes: &'a [u8],
    pub format: FormatDescriptor,
}

impl<'a> AudioChunk<'a> {
    pub fn new(bytes: &'a [u8], format: FormatDescriptor) -> Self {
        Self { bytes, format }
    }

    pub fn frame_count(&self) -> usize {
        self.format.frame_count(self.bytes.len())
    }
}

/// Conversion state cached for one source format.
struct FormatConverter {
    key: FormatDescriptor,
    /// None when the source is already at the canonical rate.
    resampler: Option<StreamResampler>,
}

impl FormatConverter {
    fn build(key: FormatDescriptor, quality: ResamplerQuality) -> Result<Self, AudioError> {
        let in_rate = key.sample_rate_hz.round() as u32;
        let resampler = if in_rate == crate::format::CANONICAL_SAMPLE_RATE_HZ {
            None
        } else {
            Some(StreamResampler::new_with_quality(
                in_rate,
                crate::format::CANONICAL_SAMPLE_RATE_HZ,
                quality,
            )?)
        };
        Ok(Self { key, resampler })
    }
}

/// Normalizer statistics, reported at session teardown.
#[derive(Debug, Clone, Copy, Default)]
pub struct NormalizerStats {
    pub chunks_in: u64,
    pub chunks_dropped: u64,
    pub converter_rebuilds: u64,
    pub canonical_bytes_out: u64,
}

pub struct AudioNormalizer {
    quality: ResamplerQuality,
    converter: Option<FormatConverter>,
    stats: NormalizerStats,
}

impl AudioNormalizer {
    pub fn new(quality: ResamplerQuality) -> Self {
        Self {
            quality,
            converter: None,
            stats: NormalizerStats::default(),
        }
    }

    pub fn stats(&self) -> NormalizerStats {
        self.stats
    }

    /// Convert one chunk to canonical bytes. Returns `None` when the chunk
    /// was dropped (invalid descriptor or conversion failure) or when the
    /// converter is still buffering and produced no output yet.
    pub fn normalize(&mut self, chunk: &AudioChunk<'_>) -> Option<Vec<u8>> {
        self.stats.chunks_in += 1;

        // Fast path: already canonical, forward whole samples verbatim.
        // A truncated chunk may end mid-sample; carrying that byte forward
        // would shift every later sample boundary in the stream.
        if chunk.format.is_valid() && chunk.format.is_canonical() {
            let whole = chunk.bytes.len() & !1;
            if whole < chunk.bytes.len() {
                warn!(target: "audio", "canonical chunk ends mid-sample, dropping trailing byte");
            }
            if whole == 0 {
                return None;
            }
            self.stats.canonical_bytes_out += whole as u64;
            return Some(chunk.bytes[..whole].to_vec());
        }

        match self.convert(chunk) {
            Ok(samples) => {
                if samples.is_empty() {
                    return None;
                }
                let bytes = samples_to_le_bytes(&samples);
                self.stats.canonical_bytes_out += bytes.len() as u64;
                Some(bytes)
            }
            Err(e) => {
                // Never session-fatal for a single chunk.
                self.stats.chunks_dropped += 1;
                warn!(target: "audio", format = %chunk.format, error = %e, "dropping chunk");
                None
            }
        }
    }

    fn convert(&mut self, chunk: &AudioChunk<'_>) -> Result<Vec<i16>, AudioError> {
        if !chunk.format.is_valid() {
            return Err(AudioError::FormatNotSupported {
                format: chunk.format.to_string(),
            });
        }
        let converter = self.converter_for(chunk.format)?;

        let planes = build_source_planes(chunk)?;
        let mono = downmix_to_mono(&planes);

        match converter.resampler.as_mut() {
            Some(rs) => rs.process(&mono),
            None => Ok(mono.iter().map(|&s| quantize(s)).collect()),
        }
    }

    /// Obtain the cached converter, rebuilding it when the format key
    /// changed. Rebuilding is expensive; a stable source format pays the
    /// cost exactly once.
    fn converter_for(
        &mut self,
        format: FormatDescriptor,
    ) -> Result<&mut FormatConverter, AudioError> {
        let needs_rebuild = match &self.converter {
            Some(c) => c.key != format,
            None => true,
        };

        if needs_rebuild {
            info!(target: "audio", format = %format, "building converter for source format");
            self.converter = Some(FormatConverter::build(format, self.quality)?);
            self.stats.converter_rebuilds += 1;
        } else {
            debug!(target: "audio", format = %format, "reusing cached converter");
        }

        // Converter was just ensured above.
        Ok(self.converter.as_mut().unwrap())
    }
}

/// Build a planar f32 sample buffer from the chunk, regardless of its
/// input layout.
///
/// Interleaved input is de-interleaved explicitly, frame by frame and
/// channel by channel. Treating an interleaved span as two bulk channel
/// regions corrupts sample continuity (it produced audible periodic
/// silences), so a bulk copy is only valid for genuinely planar input.
fn build_source_planes(chunk: &AudioChunk<'_>) -> Result<Vec<Vec<f32>>, AudioError> {
    let format = &chunk.format;
    let channels = format.channels as usize;
    let bps = format.bytes_per_channel_sample();
    let frames = chunk.frame_count();

    if frames == 0 {
        return Ok(vec![Vec::new(); channels]);
    }

    let mut planes: Vec<Vec<f32>> = (0..channels)
        .map(|_| Vec::with_capacity(frames))
        .collect();

    match format.layout {
        ChannelLayout::Planar => {
            let plane_len = frames * bps;
            if plane_len * channels > chunk.bytes.len() {
                return Err(AudioError::Conversion(format!(
                    "planar chunk too short: {} bytes for {} frames x {} channels",
                    chunk.bytes.len(),
                    frames,
                    channels
                )));
            }
            for (ch, plane) in planes.iter_mut().enumerate() {
                let region = &chunk.bytes[ch * plane_len..(ch + 1) * plane_len];
                for sample in region.chunks_exact(bps) {
                    plane.push(decode_sample(sample, format.encoding));
                }
            }
        }
        ChannelLayout::Interleaved => {
            let frame_stride = format.frame_stride();
            for frame in 0..frames {
                let base = frame * frame_stride;
                for (ch, plane) in planes.iter_mut().enumerate() {
                    let offset = base + ch * bps;
                    let sample = &chunk.bytes[offset..offset + bps];
                    plane.push(decode_sample(sample, format.encoding));
                }
            }
        }
    }

    Ok(planes)
}

/// Average all channel planes into one mono plane.
fn downmix_to_mono(planes: &[Vec<f32>]) -> Vec<f32> {
    match planes {
        [] => Vec::new(),
        [only] => only.clone(),
        many => {
            let frames = many.iter().map(|p| p.len()).min().unwrap_or(0);
            let scale = 1.0 / many.len() as f32;
            (0..frames)
                .map(|i| many.iter().map(|p| p[i]).sum::<f32>() * scale)
                .collect()
        }
    }
}

#[inline]
fn decode_sample(bytes: &[u8], encoding: SampleEncoding) -> f32 {
    match encoding {
        SampleEncoding::Int16 => {
            let v = i16::from_le_bytes([bytes[0], bytes[1]]);
            v as f32 / 32768.0
        }
        SampleEncoding::Float32 => f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]),
    }
}

fn samples_to_le_bytes(samples: &[i16]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(samples.len() * 2);
    for s in samples {
        bytes.extend_from_slice(&s.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::format::{CANONICAL_SAMPLE_RATE_HZ, CANONICAL_CHANNELS};

    fn descriptor(
        rate: f64,
        channels: u16,
        encoding: SampleEncoding,
        layout: ChannelLayout,
    ) -> FormatDescriptor {
        let bits = match encoding {
            SampleEncoding::Int16 => 16,
            SampleEncoding::Float32 => 32,
        };
        FormatDescriptor {
            sample_rate_hz: rate,
            channels,
            encoding,
            layout,
            bits_per_channel: bits,
        }
    }

    fn f32_bytes(samples: &[f32]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    fn i16_bytes(samples: &[i16]) -> Vec<u8> {
        samples.iter().flat_map(|s| s.to_le_bytes()).collect()
    }

    #[test]
    fn fast_path_copies_verbatim() {
        let mut n = AudioNormalizer::new(ResamplerQuality::Balanced);
        let payload = i16_bytes(&[100, -200, 300, -400]);
        let chunk = AudioChunk::new(&payload, FormatDescriptor::canonical());
        assert_eq!(n.normalize(&chunk).unwrap(), payload);
        assert_eq!(n.stats().chunks_dropped, 0);
    }

    #[test]
    fn fast_path_truncates_partial_trailing_sample() {
        // An odd-length canonical chunk must never produce an odd-length
        // canonical buffer; the stray byte would desync the whole stream.
        let mut n = AudioNormalizer::new(ResamplerQuality::Balanced);
        let chunk = AudioChunk::new(&[1u8, 2, 3], FormatDescriptor::canonical());
        assert_eq!(n.normalize(&chunk).unwrap(), vec![1, 2]);

        // A lone byte yields nothing at all.
        let lone = AudioChunk::new(&[9u8], FormatDescriptor::canonical());
        assert!(n.normalize(&lone).is_none());
        assert_eq!(n.stats().canonical_bytes_out, 2);
    }

    #[test]
    fn invalid_descriptor_drops_chunk_without_panicking() {
        let mut n = AudioNormalizer::new(ResamplerQuality::Balanced);
        let d = FormatDescriptor {
            bits_per_channel: 8,
            ..FormatDescriptor::canonical()
        };
        let payload = [0u8; 64];
        assert!(n.normalize(&AudioChunk::new(&payload, d)).is_none());
        assert_eq!(n.stats().chunks_dropped, 1);
    }

    #[test]
    fn duration_is_preserved_through_resampling() {
        // 1 s of 44.1 kHz stereo f32 interleaved must come out as ~1 s of
        // canonical audio (filter latency holds a tail back).
        let mut n = AudioNormalizer::new(ResamplerQuality::Balanced);
        let d = descriptor(44_100.0, 2, SampleEncoding::Float32, ChannelLayout::Interleaved);

        let mut out_samples = 0usize;
        let frames_per_chunk = 1024;
        let total_chunks = 44;
        for c in 0..total_chunks {
            let mut interleaved = Vec::with_capacity(frames_per_chunk * 2);
            for i in 0..frames_per_chunk {
                let t = (c * frames_per_chunk + i) as f32;
                let v = (t * 0.01).sin() * 0.25;
                interleaved.push(v);
                interleaved.push(v);
            }
            let payload = f32_bytes(&interleaved);
            if let Some(bytes) = n.normalize(&AudioChunk::new(&payload, d)) {
                assert_eq!(bytes.len() % 2, 0, "canonical buffers must be even-length");
                out_samples += bytes.len() / 2;
            }
        }

        let in_frames = frames_per_chunk * total_chunks;
        let expected = (in_frames as f64 * 16_000.0 / 44_100.0) as usize;
        assert!(
            out_samples >= expected - 1200 && out_samples <= expected + 120,
            "expected ~{} canonical samples, got {}",
            expected,
            out_samples
        );
    }

    #[test]
    fn interleaved_matches_planar_for_same_signal() {
        // Regression guard for the interleaved/planar corruption defect:
        // the same logical stereo signal delivered in either layout must
        // produce bit-identical canonical output.
        let frames = 8192;
        let left: Vec<i16> = (0..frames).map(|i| ((i * 37) % 20000) as i16 - 10000).collect();
        let right: Vec<i16> = (0..frames).map(|i| ((i * 53) % 18000) as i16 - 9000).collect();

        let mut interleaved = Vec::with_capacity(frames * 2);
        for i in 0..frames {
            interleaved.push(left[i]);
            interleaved.push(right[i]);
        }
        let mut planar = left.clone();
        planar.extend_from_slice(&right);

        let d_int = descriptor(44_100.0, 2, SampleEncoding::Int16, ChannelLayout::Interleaved);
        let d_pla = descriptor(44_100.0, 2, SampleEncoding::Int16, ChannelLayout::Planar);

        let mut n1 = AudioNormalizer::new(ResamplerQuality::Balanced);
        let mut n2 = AudioNormalizer::new(ResamplerQuality::Balanced);
        let out_int = n1.normalize(&AudioChunk::new(&i16_bytes(&interleaved), d_int));
        let out_pla = n2.normalize(&AudioChunk::new(&i16_bytes(&planar), d_pla));

        assert_eq!(out_int, out_pla);
        assert!(out_int.is_some());
    }

    #[test]
    fn four_channel_interleaved_downmix() {
        // >2 channels goes through the same generic per-frame loop; verify
        // rather than assume.
        let d = descriptor(
            CANONICAL_SAMPLE_RATE_HZ as f64,
            4,
            SampleEncoding::Int16,
            ChannelLayout::Interleaved,
        );
        assert_eq!(CANONICAL_CHANNELS, 1);
        // Two frames: (1000, 2000, 3000, 4000) and (-1000, -2000, -3000, -4000)
        let payload = i16_bytes(&[1000, 2000, 3000, 4000, -1000, -2000, -3000, -4000]);
        let mut n = AudioNormalizer::new(ResamplerQuality::Balanced);
        let out = n.normalize(&AudioChunk::new(&payload, d)).unwrap();
        let samples: Vec<i16> = out
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples.len(), 2);
        // Average of each frame, within quantization error.
        assert!((samples[0] - 2500).abs() <= 2, "got {}", samples[0]);
        assert!((samples[1] + 2500).abs() <= 2, "got {}", samples[1]);
    }

    #[test]
    fn float_input_beyond_unit_range_is_clamped() {
        let d = descriptor(
            CANONICAL_SAMPLE_RATE_HZ as f64,
            1,
            SampleEncoding::Float32,
            ChannelLayout::Interleaved,
        );
        let payload = f32_bytes(&[2.0, -4.0, 0.5]);
        let mut n = AudioNormalizer::new(ResamplerQuality::Balanced);
        let out = n.normalize(&AudioChunk::new(&payload, d)).unwrap();
        let samples: Vec<i16> = out
            .chunks_exact(2)
            .map(|b| i16::from_le_bytes([b[0], b[1]]))
            .collect();
        assert_eq!(samples, vec![32767, -32767, 16384]);
    }

    #[test]
    fn converter_rebuilds_only_on_format_change() {
        let mut n = AudioNormalizer::new(ResamplerQuality::Fast);
        let d1 = descriptor(48_000.0, 2, SampleEncoding::Int16, ChannelLayout::Interleaved);
        let d2 = descriptor(44_100.0, 2, SampleEncoding::Int16, ChannelLayout::Interleaved);
        let payload = i16_bytes(&vec![0i16; 2048]);

        n.normalize(&AudioChunk::new(&payload, d1));
        n.normalize(&AudioChunk::new(&payload, d1));
        n.normalize(&AudioChunk::new(&payload, d1));
        assert_eq!(n.stats().converter_rebuilds, 1);

        n.normalize(&AudioChunk::new(&payload, d2));
        assert_eq!(n.stats().converter_rebuilds, 2);
    }

    #[test]
    fn truncated_planar_chunk_is_dropped() {
        let d = descriptor(48_000.0, 2, SampleEncoding::Int16, ChannelLayout::Planar);
        // 3 bytes: not even one full frame for both planes.
        let payload = [1u8, 2, 3];
        let mut n = AudioNormalizer::new(ResamplerQuality::Balanced);
        assert!(n.normalize(&AudioChunk::new(&payload, d)).is_none());
    }
}
