//! Error types for the wildsnap-ml crate.

use thiserror::Error;

/// Top-level error type for pipeline operations.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Acquisition error: {0}")]
    Acquisition(String),

    #[error("Unsupported model format: {0}")]
    UnsupportedFormat(String),

    #[error("Conversion error: {0}")]
    Conversion(String),

    #[error("Relocation error: {0}")]
    Relocation(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Python runtime error: {0}")]
    Python(String),

    #[error("Timeout: {0}")]
    Timeout(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

impl From<reqwest::Error> for PipelineError {
    fn from(err: reqwest::Error) -> Self {
        Self::Network(err.to_string())
    }
}

impl PipelineError {
    pub fn acquisition(msg: impl Into<String>) -> Self {
        Self::Acquisition(msg.into())
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn conversion(msg: impl Into<String>) -> Self {
        Self::Conversion(msg.into())
    }

    pub fn relocation(msg: impl Into<String>) -> Self {
        Self::Relocation(msg.into())
    }

    pub fn network(msg: impl Into<String>) -> Self {
        Self::Network(msg.into())
    }

    /// Fold any failure raised while converting into [`Self::Conversion`].
    pub fn into_conversion(self) -> Self {
        match self {
            Self::Conversion(_) => self,
            other => Self::Conversion(other.to_string()),
        }
    }

    /// Stable name of the error kind, used in summary lines.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Acquisition(_) => "AcquisitionError",
            Self::UnsupportedFormat(_) => "UnsupportedFormatError",
            Self::Conversion(_) => "ConversionError",
            Self::Relocation(_) => "RelocationError",
            Self::Io(_) => "IOError",
            Self::Network(_) => "NetworkError",
            Self::Python(_) => "PythonError",
            Self::Timeout(_) => "TimeoutError",
            Self::Config(_) => "ConfigError",
            Self::Serde(_) => "SerializationError",
        }
    }
}
