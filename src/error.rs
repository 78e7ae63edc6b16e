use thiserror::Error;

#[derive(Debug, Clone, Error)]
pub enum SynthError {
    #[error("Parsing Error: {0}")]
    ParseError(String),
    #[error("File Error: {0}")]
    FileError(String),
    #[error("Audio Error: {0}")]
    AudioError(String),
    #[error("Decode Error: {0}")]
    DecodeError(String),
    #[error("Invalid Instrument Error: {0}")]
    InvalidInstrument(String),
    #[error("Config Error: {0}")]
    ConfigError(String),
}

impl From<std::io::Error> for SynthError {
    fn from(e: std::io::Error) -> Self {
        SynthError::FileError(e.to_string())
    }
}
