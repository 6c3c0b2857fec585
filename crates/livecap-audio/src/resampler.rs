use rubato::{
    Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
};

use livecap_foundation::AudioError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResamplerQuality {
    /// Lower quality, lower CPU usage
    Fast,
    /// Default quality/performance balance
    Balanced,
    /// Higher quality, higher CPU usage
    Quality,
}

/// Streaming mono resampler built on Rubato's sinc interpolation.
///
/// Accepts arbitrary-sized f32 input chunks, buffers internally to satisfy
/// Rubato's fixed input-chunk requirement, and drains every pending output
/// region for the input given so far. A single `process` call on the
/// underlying resampler does not necessarily surface all available output;
/// the drain loop here is what guarantees it.
pub struct StreamResampler {
    in_rate: u32,
    out_rate: u32,
    resampler: SincFixedIn<f32>,
    input_buffer: Vec<f32>,
    output_buffer: Vec<f32>,
    chunk_size: usize,
}

impl StreamResampler {
    pub fn new(in_rate: u32, out_rate: u32) -> Result<Self, AudioError> {
        Self::new_with_quality(in_rate, out_rate, ResamplerQuality::Balanced)
    }

    pub fn new_with_quality(
        in_rate: u32,
        out_rate: u32,
        quality: ResamplerQuality,
    ) -> Result<Self, AudioError> {
        // 512 samples of input keeps latency low; at 16 kHz output that is
        // well under the transport poll period.
        let chunk_size = 512;

        let sinc_params = match quality {
            ResamplerQuality::Fast => SincInterpolationParameters {
                sinc_len: 32,
                f_cutoff: 0.92,
                interpolation: SincInterpolationType::Linear,
                oversampling_factor: 64,
                window: WindowFunction::Blackman,
            },
            ResamplerQuality::Balanced => SincInterpolationParameters {
                sinc_len: 64,
                f_cutoff: 0.95,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 128,
                window: WindowFunction::Blackman2,
            },
            ResamplerQuality::Quality => SincInterpolationParameters {
                sinc_len: 128,
                f_cutoff: 0.97,
                interpolation: SincInterpolationType::Cubic,
                oversampling_factor: 256,
                window: WindowFunction::BlackmanHarris2,
            },
        };

        let resampler = SincFixedIn::<f32>::new(
            out_rate as f64 / in_rate as f64,
            2.0,
            sinc_params,
            chunk_size,
            1, // mono
        )
        .map_err(|e| AudioError::ResamplerSetup(e.to_string()))?;

        Ok(Self {
            in_rate,
            out_rate,
            resampler,
            input_buffer: Vec::with_capacity(chunk_size * 2),
            output_buffer: Vec::new(),
            chunk_size,
        })
    }

    /// Process an arbitrary chunk of mono f32 samples in [-1.0, 1.0].
    /// Returns resampled i16 at the output rate; the amount depends on how
    /// many whole internal chunks the accumulated input completed.
    pub fn process(&mut self, input: &[f32]) -> Result<Vec<i16>, AudioError> {
        if self.in_rate == self.out_rate {
            // Fast path: no rate change, just quantize.
            return Ok(input.iter().map(|&s| quantize(s)).collect());
        }

        self.input_buffer.extend_from_slice(input);

        // Drain loop: keep requesting output while a full input chunk is
        // available. One resampler call per chunk is not enough when a
        // large input chunk spans several internal chunks.
        while self.input_buffer.len() >= self.chunk_size {
            let chunk: Vec<f32> = self.input_buffer.drain(..self.chunk_size).collect();
            let input_frames = vec![chunk];

            let output_frames = self
                .resampler
                .process(&input_frames, None)
                .map_err(|e| AudioError::Conversion(e.to_string()))?;

            if let Some(channel) = output_frames.first() {
                self.output_buffer.extend_from_slice(channel);
            }
        }

        let result = self.output_buffer.iter().map(|&s| quantize(s)).collect();
        self.output_buffer.clear();
        Ok(result)
    }

    /// Reset internal state, clearing buffers and the resampler history.
    pub fn reset(&mut self) {
        self.input_buffer.clear();
        self.output_buffer.clear();
        self.resampler.reset();
    }

    pub fn input_rate(&self) -> u32 {
        self.in_rate
    }

    pub fn output_rate(&self) -> u32 {
        self.out_rate
    }
}

/// Clamp to [-1.0, 1.0] before scaling; unclamped float input would wrap
/// around the i16 range.
#[inline]
pub fn quantize(sample: f32) -> i16 {
    let clamped = sample.clamp(-1.0, 1.0);
    (clamped * 32767.0).round() as i16
}
