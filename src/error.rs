//! # Errors
//!
//! Outcomes surfaced by emitters, appenders and transports

use thiserror::Error;

/// Why a call to [MetricsEmitter](super::MetricsEmitter) or [LogAppender](super::LogAppender) was dropped
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CallError {
    #[error("transport is not configured, was the registry built with one and is it still running?")]
    NotConfigured,

    #[error("previous request is still in flight, make the next call after the response is received")]
    AlreadyInFlight,

    #[error(transparent)]
    Transport(#[from] TransportError),
}

/// Coarse classification of a backend failure
///
/// Transports map their service errors onto these so the log bootstrap can tell
/// "already exists" apart from a real failure without knowing the SDK.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportErrorKind {
    NotFound,
    AlreadyExists,
    Other,
}

/// A failed network or backend call reported by a transport
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{operation} failed: {message}")]
pub struct TransportError {
    pub operation: &'static str,
    pub kind: TransportErrorKind,
    pub message: String,
}

impl TransportError {
    pub fn new(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            operation,
            kind: TransportErrorKind::Other,
            message: message.into(),
        }
    }

    pub fn not_found(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::NotFound,
            ..Self::new(operation, message)
        }
    }

    pub fn already_exists(operation: &'static str, message: impl Into<String>) -> Self {
        Self {
            kind: TransportErrorKind::AlreadyExists,
            ..Self::new(operation, message)
        }
    }

    pub fn is_already_exists(&self) -> bool {
        self.kind == TransportErrorKind::AlreadyExists
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_includes_operation() {
        let err = TransportError::not_found("DescribeLogStreams", "group does not exist");
        assert_eq!(err.to_string(), "DescribeLogStreams failed: group does not exist");
        assert_eq!(err.kind, TransportErrorKind::NotFound);

        let call: CallError = err.clone().into();
        assert_eq!(call.to_string(), err.to_string());
    }
}
