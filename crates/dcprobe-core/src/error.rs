//! Probe error taxonomy.

use thiserror::Error;

/// A recoverable failure of one probe primitive.
///
/// Every variant is caught by the check run that produced it and folded
/// into the record's error summary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProbeError {
    #[error("controller discovery failed: {0}")]
    Discovery(String),

    #[error("address resolution failed: {0}")]
    Resolution(String),

    #[error("host unreachable: {0}")]
    Unreachable(String),

    #[error("directory bind failed: {0}")]
    Bind(String),

    #[error("secure channel check failed: {0}")]
    Channel(String),
}

impl ProbeError {
    /// Short kind label for log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            ProbeError::Discovery(_) => "discovery",
            ProbeError::Resolution(_) => "resolution",
            ProbeError::Unreachable(_) => "unreachable",
            ProbeError::Bind(_) => "bind",
            ProbeError::Channel(_) => "channel",
        }
    }
}

pub type ProbeResult<T> = Result<T, ProbeError>;
