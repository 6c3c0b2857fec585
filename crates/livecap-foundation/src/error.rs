use thiserror::Error;

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Audio subsystem error: {0}")]
    Audio(#[from] AudioError),

    #[error("Speech engine failed: {0}")]
    SpeechEngine(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

#[derive(Error, Debug)]
pub enum AudioError {
    #[error("Format not supported: {format}")]
    FormatNotSupported { format: String },

    #[error("Resampler setup failed: {0}")]
    ResamplerSetup(String),

    #[error("Conversion failed: {0}")]
    Conversion(String),

    #[error("Transport I/O error: {0}")]
    TransportIo(#[from] std::io::Error),

    #[error("Debug WAV sink error: {0}")]
    WavSink(String),
}

impl SessionError {
    /// Whether the session must halt, or the failing unit of work can just
    /// be dropped and the session continue. Audio failures are scoped to
    /// the chunk or poll that caused them.
    pub fn is_fatal(&self) -> bool {
        match self {
            SessionError::Audio(_) => false,
            SessionError::SpeechEngine(_) | SessionError::Config(_) => true,
        }
    }
}
