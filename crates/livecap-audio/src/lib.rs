pub mod format;
pub mod normalizer;
pub mod producer;
pub mod reassembler;
pub mod resampler;
pub mod transport;
pub mod wav_sink;

// Public API
pub use format::{
    ChannelLayout, FormatDescriptor, SampleEncoding, SourceFormatRecord,
    CANONICAL_CHANNELS, CANONICAL_SAMPLE_RATE_HZ,
};
pub use normalizer::{AudioChunk, AudioNormalizer, NormalizerStats};
pub use producer::ProducerPipeline;
pub use reassembler::SampleReassembler;
pub use resampler::{ResamplerQuality, StreamResampler};
pub use transport::{TransportReader, TransportWriter};
pub use wav_sink::DebugWavSink;
