//! Error types for the integration crate.
//!
//! `ConnectorError` is returned by every outbound collaborator. Callers in
//! the automation crate capture its `Display` text verbatim as handler
//! failure detail, so messages are kept short and specific.

use std::fmt;

/// Errors from outbound provider and webhook calls.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectorError {
    /// Could not reach the remote service.
    ConnectionFailed { reason: String },
    /// The provider rejected the credentials.
    AuthenticationFailed { reason: String },
    /// Rate limit exceeded.
    RateLimited { retry_after_secs: Option<u64> },
    /// The provider answered with an error status.
    Rejected { status: u16, reason: String },
    /// The request could not be built from the supplied parameters.
    InvalidRequest { reason: String },
    /// The response could not be understood.
    ProtocolError { reason: String },
    /// Timeout waiting for response.
    Timeout,
}

impl fmt::Display for ConnectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConnectionFailed { reason } => {
                write!(f, "connection failed: {reason}")
            }
            Self::AuthenticationFailed { reason } => {
                write!(f, "authentication failed: {reason}")
            }
            Self::RateLimited { retry_after_secs } => {
                if let Some(secs) = retry_after_secs {
                    write!(f, "rate limited, retry after {secs}s")
                } else {
                    write!(f, "rate limited")
                }
            }
            Self::Rejected { status, reason } => {
                write!(f, "provider rejected request ({status}): {reason}")
            }
            Self::InvalidRequest { reason } => {
                write!(f, "invalid request: {reason}")
            }
            Self::ProtocolError { reason } => {
                write!(f, "protocol error: {reason}")
            }
            Self::Timeout => write!(f, "operation timed out"),
        }
    }
}

impl std::error::Error for ConnectorError {}

impl From<reqwest::Error> for ConnectorError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_builder() {
            Self::InvalidRequest {
                reason: e.to_string(),
            }
        } else if e.is_decode() {
            Self::ProtocolError {
                reason: e.to_string(),
            }
        } else {
            Self::ConnectionFailed {
                reason: e.to_string(),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejected_includes_status_and_reason() {
        let err = ConnectorError::Rejected {
            status: 400,
            reason: "invalid recipient".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("400"));
        assert!(text.contains("invalid recipient"));
    }

    #[test]
    fn rate_limited_with_and_without_hint() {
        let with = ConnectorError::RateLimited {
            retry_after_secs: Some(30),
        };
        let without = ConnectorError::RateLimited {
            retry_after_secs: None,
        };
        assert!(with.to_string().contains("30s"));
        assert_eq!(without.to_string(), "rate limited");
    }
}
