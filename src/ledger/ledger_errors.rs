use solana_client::client_error::ClientError;
use thiserror::Error;

/// Ledger query failures
#[derive(Debug, Clone, Error)]
pub enum LedgerError {
    /// Transport-level errors (network, connection)
    #[error("Transport error: {message} (endpoint: {endpoint})")]
    Transport { endpoint: String, message: String },

    #[error("Timeout after {timeout_ms}ms (endpoint: {endpoint})")]
    Timeout { endpoint: String, timeout_ms: u64 },

    /// Errors reported by the RPC server
    #[error("RPC response error: {message} (endpoint: {endpoint}, code: {code:?})")]
    RpcResponse {
        endpoint: String,
        message: String,
        code: Option<i64>,
    },

    #[error("Rate limit exceeded (endpoint: {endpoint})")]
    RateLimitExceeded { endpoint: String },

    /// The server answered but the payload could not be interpreted
    #[error("Invalid data for {what}: {message}")]
    InvalidData { what: String, message: String },

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl LedgerError {
    pub fn invalid_data(what: impl Into<String>, message: impl Into<String>) -> Self {
        LedgerError::InvalidData {
            what: what.into(),
            message: message.into(),
        }
    }

    /// Check if the same query might succeed when issued again
    pub fn is_retryable(&self) -> bool {
        match self {
            LedgerError::Transport { .. } => true,
            LedgerError::Timeout { .. } => true,
            LedgerError::RateLimitExceeded { .. } => true,
            LedgerError::RpcResponse { code, .. } => {
                matches!(code, Some(c) if (500..600).contains(c))
            }
            LedgerError::InvalidData { .. } => false,
            LedgerError::Configuration(_) => false,
        }
    }

    pub fn endpoint(&self) -> Option<&str> {
        match self {
            LedgerError::Transport { endpoint, .. } => Some(endpoint),
            LedgerError::Timeout { endpoint, .. } => Some(endpoint),
            LedgerError::RpcResponse { endpoint, .. } => Some(endpoint),
            LedgerError::RateLimitExceeded { endpoint } => Some(endpoint),
            _ => None,
        }
    }

    /// Classify a client error by its message
    pub fn from_client_error(err: ClientError, endpoint: &str, timeout_ms: u64) -> Self {
        let message = err.to_string();
        Self::classify(&message, endpoint, timeout_ms)
    }

    fn classify(message: &str, endpoint: &str, timeout_ms: u64) -> Self {
        let lower = message.to_lowercase();

        if lower.contains("rate limit")
            || lower.contains("too many requests")
            || lower.contains("429")
        {
            LedgerError::RateLimitExceeded {
                endpoint: endpoint.to_string(),
            }
        } else if lower.contains("timeout") || lower.contains("timed out") {
            LedgerError::Timeout {
                endpoint: endpoint.to_string(),
                timeout_ms,
            }
        } else if lower.contains("connection")
            || lower.contains("dns")
            || lower.contains("error sending request")
        {
            LedgerError::Transport {
                endpoint: endpoint.to_string(),
                message: message.to_string(),
            }
        } else {
            // Extract error code if available
            let code = lower
                .split("code:")
                .nth(1)
                .and_then(|s| s.split_whitespace().next())
                .and_then(|s| s.trim_end_matches(',').parse::<i64>().ok());

            LedgerError::RpcResponse {
                endpoint: endpoint.to_string(),
                message: message.to_string(),
                code,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_is_retryable() {
        assert!(LedgerError::Transport {
            endpoint: "test".to_string(),
            message: "connection refused".to_string(),
        }
        .is_retryable());

        assert!(LedgerError::Timeout {
            endpoint: "test".to_string(),
            timeout_ms: 5000,
        }
        .is_retryable());

        assert!(!LedgerError::invalid_data("holder", "bad base58").is_retryable());
        assert!(!LedgerError::Configuration("bad commitment".to_string()).is_retryable());
    }

    #[test]
    fn test_classify_messages() {
        let err = LedgerError::classify("HTTP status client error (429 Too Many Requests)", "rpc", 1);
        assert!(matches!(err, LedgerError::RateLimitExceeded { .. }));

        let err = LedgerError::classify("operation timed out", "rpc", 30_000);
        assert!(matches!(err, LedgerError::Timeout { timeout_ms: 30_000, .. }));

        let err = LedgerError::classify("error sending request for url", "rpc", 1);
        assert!(matches!(err, LedgerError::Transport { .. }));

        let err = LedgerError::classify("RPC response error code: 503 service down", "rpc", 1);
        match err {
            LedgerError::RpcResponse { code, .. } => assert_eq!(code, Some(503)),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_error_endpoint() {
        let err = LedgerError::Timeout {
            endpoint: "https://test.com".to_string(),
            timeout_ms: 5000,
        };
        assert_eq!(err.endpoint(), Some("https://test.com"));
        assert_eq!(LedgerError::invalid_data("x", "y").endpoint(), None);
    }
}
