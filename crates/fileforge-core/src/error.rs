//! Unified conversion error types for FileForge.
//!
//! Adapter failures, scheduler-synthesized failures and configuration
//! problems all travel as a [`ConvertError`]. The [`ErrorKind`] carries the
//! classification; the message is what callers show to users, verbatim.

use std::fmt;
use thiserror::Error;

/// Message used when an execution slot dies mid-job.
pub const WORKER_CRASHED: &str = "Worker crashed";

/// Message used when the pool is shut down with work outstanding.
pub const POOL_TERMINATED: &str = "Worker pool terminated";

/// Top-level error categorization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// No adapter handles the requested category / format pair.
    UnsupportedConversion,
    /// Source bytes could not be parsed by the expected codec.
    DecodeFailure,
    /// The transform or encoder could not produce output.
    EncodeFailure,
    /// A lazily loaded engine failed to initialize.
    EngineInitFailure,
    /// The execution slot terminated unexpectedly while running the job.
    SlotCrash,
    /// The pool was shut down while the job was queued or running.
    PoolTerminated,
    /// Configuration could not be loaded or failed validation.
    Configuration,
    /// An I/O error outside of any codec.
    Io,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedConversion => write!(f, "UNSUPPORTED_CONVERSION"),
            Self::DecodeFailure => write!(f, "DECODE_FAILURE"),
            Self::EncodeFailure => write!(f, "ENCODE_FAILURE"),
            Self::EngineInitFailure => write!(f, "ENGINE_INIT_FAILURE"),
            Self::SlotCrash => write!(f, "SLOT_CRASH"),
            Self::PoolTerminated => write!(f, "POOL_TERMINATED"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Io => write!(f, "IO"),
        }
    }
}

/// The unified error used throughout FileForge.
///
/// `Display` renders only the human-readable message so that failures such
/// as `"Worker crashed"` reach the caller exactly as synthesized. Use
/// [`ConvertError::kind`] for classification.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct ConvertError {
    /// The category of error.
    pub kind: ErrorKind,
    /// A human-readable error message.
    pub message: String,
    /// Optional underlying cause.
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl ConvertError {
    /// Create a new conversion error.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// Create a new conversion error with an underlying cause.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create an unsupported-conversion error.
    pub fn unsupported(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnsupportedConversion, message)
    }

    /// Create the standard "from X to Y" unsupported-pair error.
    pub fn unsupported_pair(input: &str, output: &str) -> Self {
        Self::unsupported(format!(
            "Conversion from {input} to {output} is not supported"
        ))
    }

    /// Create a decode error.
    pub fn decode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::DecodeFailure, message)
    }

    /// Create an encode error.
    pub fn encode(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EncodeFailure, message)
    }

    /// Create an engine initialization error.
    pub fn engine_init(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::EngineInitFailure, message)
    }

    /// Create the scheduler's synthetic slot-crash error.
    pub fn slot_crash() -> Self {
        Self::new(ErrorKind::SlotCrash, WORKER_CRASHED)
    }

    /// Create the scheduler's synthetic termination error.
    pub fn pool_terminated() -> Self {
        Self::new(ErrorKind::PoolTerminated, POOL_TERMINATED)
    }

    /// Create a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    /// The error category.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Whether this error was produced by the scheduler rather than an adapter.
    pub fn is_synthetic(&self) -> bool {
        matches!(self.kind, ErrorKind::SlotCrash | ErrorKind::PoolTerminated)
    }
}

impl Clone for ConvertError {
    fn clone(&self) -> Self {
        Self {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl From<std::io::Error> for ConvertError {
    fn from(err: std::io::Error) -> Self {
        Self::with_source(ErrorKind::Io, format!("I/O error: {err}"), err)
    }
}

impl From<config::ConfigError> for ConvertError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Configuration error: {err}"),
            err,
        )
    }
}

impl From<validator::ValidationErrors> for ConvertError {
    fn from(err: validator::ValidationErrors) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Invalid configuration: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_is_message_only() {
        assert_eq!(ConvertError::slot_crash().to_string(), "Worker crashed");
        assert_eq!(
            ConvertError::pool_terminated().to_string(),
            "Worker pool terminated"
        );
    }

    #[test]
    fn test_unsupported_pair_message() {
        let err = ConvertError::unsupported_pair("rar", "zip");
        assert_eq!(err.kind(), ErrorKind::UnsupportedConversion);
        assert_eq!(err.to_string(), "Conversion from rar to zip is not supported");
    }

    #[test]
    fn test_clone_drops_source() {
        let io = std::io::Error::other("disk gone");
        let err = ConvertError::from(io);
        assert!(std::error::Error::source(&err).is_some());
        let cloned = err.clone();
        assert_eq!(cloned.kind(), ErrorKind::Io);
        assert!(std::error::Error::source(&cloned).is_none());
    }

    #[test]
    fn test_synthetic_kinds() {
        assert!(ConvertError::slot_crash().is_synthetic());
        assert!(!ConvertError::decode("bad").is_synthetic());
    }
}
