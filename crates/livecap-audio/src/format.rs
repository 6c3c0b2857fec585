//! Audio format descriptors.
//!
//! A producer chunk arrives with an arbitrary layout/encoding/rate; the
//! descriptor captures it as tagged data so the normalizer dispatches once
//! per format change instead of branching per sample.

use serde::{Deserialize, Serialize};

/// The single format the speech engine consumes: 16 kHz, mono, S16LE.
pub const CANONICAL_SAMPLE_RATE_HZ: u32 = 16_000;
pub const CANONICAL_CHANNELS: u16 = 1;
pub const CANONICAL_BYTES_PER_SAMPLE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleEncoding {
    /// 16-bit signed integer, little-endian
    Int16,
    /// 32-bit IEEE float, little-endian
    Float32,
}

impl SampleEncoding {
    pub fn bytes_per_sample(&self) -> usize {
        match self {
            SampleEncoding::Int16 => 2,
            SampleEncoding::Float32 => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChannelLayout {
    /// Channels interspersed per frame: L R L R ...
    Interleaved,
    /// One contiguous region per channel: L L ... R R ...
    Planar,
}

/// Describes one producer-side chunk. Expected stable within a capture
/// session, but every chunk carries its own descriptor and a change is
/// honored (the converter cache is keyed on the whole descriptor).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FormatDescriptor {
    pub sample_rate_hz: f64,
    pub channels: u16,
    pub encoding: SampleEncoding,
    pub layout: ChannelLayout,
    pub bits_per_channel: u16,
}

impl FormatDescriptor {
    pub fn canonical() -> Self {
        Self {
            sample_rate_hz: CANONICAL_SAMPLE_RATE_HZ as f64,
            channels: CANONICAL_CHANNELS,
            encoding: SampleEncoding::Int16,
            layout: ChannelLayout::Interleaved,
            bits_per_channel: 16,
        }
    }

    /// True when chunk bytes can be forwarded verbatim (rate, mono, int16).
    /// Layout is irrelevant for mono: interleaved and planar coincide.
    pub fn is_canonical(&self) -> bool {
        self.sample_rate_hz == CANONICAL_SAMPLE_RATE_HZ as f64
            && self.channels == CANONICAL_CHANNELS
            && self.encoding == SampleEncoding::Int16
    }

    /// Bytes occupied by one sample of one channel.
    pub fn bytes_per_channel_sample(&self) -> usize {
        (self.bits_per_channel as usize) / 8
    }

    /// Distance in bytes between successive frames of the same channel
    /// within the chunk's byte span.
    pub fn frame_stride(&self) -> usize {
        match self.layout {
            ChannelLayout::Interleaved => {
                self.bytes_per_channel_sample() * self.channels as usize
            }
            ChannelLayout::Planar => self.bytes_per_channel_sample(),
        }
    }

    /// Number of whole frames a byte span of `byte_len` holds.
    pub fn frame_count(&self, byte_len: usize) -> usize {
        let per_frame = self.bytes_per_channel_sample() * self.channels as usize;
        if per_frame == 0 {
            0
        } else {
            byte_len / per_frame
        }
    }

    /// Sanity-check the descriptor before touching chunk bytes.
    pub fn is_valid(&self) -> bool {
        if self.channels == 0 || self.sample_rate_hz <= 0.0 {
            return false;
        }
        match self.encoding {
            SampleEncoding::Int16 => self.bits_per_channel == 16,
            SampleEncoding::Float32 => self.bits_per_channel == 32,
        }
    }
}

impl std::fmt::Display for FormatDescriptor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}Hz {}ch {:?} {:?}",
            self.sample_rate_hz, self.channels, self.encoding, self.layout
        )
    }
}

/// Side-channel record for the fallback path where the consumer performs
/// the conversion itself. Serialized as JSON next to the stream file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceFormatRecord {
    pub sample_rate_hz: f64,
    pub channel_count: u16,
    pub is_float: bool,
    pub is_interleaved: bool,
    pub bits_per_channel: u16,
}

impl From<FormatDescriptor> for SourceFormatRecord {
    fn from(d: FormatDescriptor) -> Self {
        Self {
            sample_rate_hz: d.sample_rate_hz,
            channel_count: d.channels,
            is_float: d.encoding == SampleEncoding::Float32,
            is_interleaved: d.layout == ChannelLayout::Interleaved,
            bits_per_channel: d.bits_per_channel,
        }
    }
}

impl From<SourceFormatRecord> for FormatDescriptor {
    fn from(r: SourceFormatRecord) -> Self {
        Self {
            sample_rate_hz: r.sample_rate_hz,
            channels: r.channel_count,
            encoding: if r.is_float {
                SampleEncoding::Float32
            } else {
                SampleEncoding::Int16
            },
            layout: if r.is_interleaved {
                ChannelLayout::Interleaved
            } else {
                ChannelLayout::Planar
            },
            bits_per_channel: r.bits_per_channel,
        }
    }
}
