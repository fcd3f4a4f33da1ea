//! Platform errors

use shared::VmsError;
use thiserror::Error;

/// Failure talking to the Platform
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PlatformError {
    #[error("Platform is not configured")]
    NotConfigured,

    #[error("Platform request timed out")]
    Timeout,

    #[error("Platform connection failed: {0}")]
    Connection(String),

    #[error("Platform unavailable (HTTP {status})")]
    Unavailable { status: u16 },

    #[error("Platform resource not found")]
    NotFound,

    #[error("Platform rejected the request (HTTP {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Invalid Platform response: {0}")]
    Decode(String),
}

impl PlatformError {
    /// Map a non-success HTTP status
    pub fn from_status(status: u16, message: impl Into<String>) -> Self {
        match status {
            404 => PlatformError::NotFound,
            429 | 500..=599 => PlatformError::Unavailable { status },
            _ => PlatformError::Rejected {
                status,
                message: message.into(),
            },
        }
    }

    /// Worth trying again later
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            PlatformError::Timeout | PlatformError::Connection(_) | PlatformError::Unavailable { .. }
        )
    }
}

impl From<reqwest::Error> for PlatformError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            PlatformError::Timeout
        } else if err.is_decode() {
            PlatformError::Decode(err.to_string())
        } else if let Some(status) = err.status() {
            PlatformError::from_status(status.as_u16(), err.to_string())
        } else {
            PlatformError::Connection(err.to_string())
        }
    }
}

impl From<PlatformError> for VmsError {
    fn from(err: PlatformError) -> Self {
        VmsError::Platform(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(PlatformError::from_status(404, ""), PlatformError::NotFound);
        assert_eq!(PlatformError::from_status(503, ""), PlatformError::Unavailable { status: 503 });
        assert_eq!(PlatformError::from_status(429, ""), PlatformError::Unavailable { status: 429 });
        assert!(matches!(
            PlatformError::from_status(422, "bad"),
            PlatformError::Rejected { status: 422, .. }
        ));
    }

    #[test]
    fn test_retryable() {
        assert!(PlatformError::Timeout.is_retryable());
        assert!(PlatformError::Connection("refused".to_string()).is_retryable());
        assert!(PlatformError::Unavailable { status: 502 }.is_retryable());

        assert!(!PlatformError::NotFound.is_retryable());
        assert!(!PlatformError::NotConfigured.is_retryable());
        assert!(!PlatformError::Decode("eof".to_string()).is_retryable());
        assert!(!PlatformError::from_status(400, "bad").is_retryable());
    }

    #[test]
    fn test_into_vms_error() {
        let err: VmsError = PlatformError::Unavailable { status: 503 }.into();
        assert!(matches!(err, VmsError::Platform(_)));
    }
}
