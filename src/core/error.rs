use thiserror::Error;

#[derive(Error, Debug)]
pub enum KnmapError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status} from {url}")]
    Http { status: u16, url: String },

    #[error("Decode error: {0}")]
    Decode(String),

    #[error("Invalid span data: {0}")]
    InvalidSpan(String),

    #[error("Invalid time window: from {from} must be before to {to}")]
    InvalidWindow { from: i64, to: i64 },

    #[error("Service registry error: {0}")]
    Registry(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Timeout error: operation took longer than {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Unknown service {name}.{namespace}")]
    ServiceNotFound { name: String, namespace: String },
}

/// Result type alias for knmap operations
pub type Result<T> = std::result::Result<T, KnmapError>;

impl KnmapError {
    /// Creates a new configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Creates a new network error
    pub fn network<S: Into<String>>(msg: S) -> Self {
        Self::Network(msg.into())
    }

    /// Creates a new decode error
    pub fn decode<S: Into<String>>(msg: S) -> Self {
        Self::Decode(msg.into())
    }

    /// Creates a new registry error
    pub fn registry<S: Into<String>>(msg: S) -> Self {
        Self::Registry(msg.into())
    }

    /// Returns true if retrying the failed operation may succeed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout { .. } => true,
            Self::Http { status, .. } => *status >= 500 || *status == 429,
            _ => false,
        }
    }

    /// Returns the error category for logging and HTTP status mapping
    pub fn category(&self) -> &'static str {
        match self {
            Self::Config(_) => "config",
            Self::Network(_) | Self::Http { .. } => "network",
            Self::Decode(_) | Self::Serialization(_) => "serialization",
            Self::InvalidSpan(_) | Self::InvalidWindow { .. } => "validation",
            Self::Registry(_) => "registry",
            Self::Io(_) => "io",
            Self::Timeout { .. } => "timeout",
            Self::ServiceNotFound { .. } => "not_found",
        }
    }
}

impl From<reqwest::Error> for KnmapError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            // reqwest does not expose the configured limit on the error
            return Self::Timeout { timeout_ms: 0 };
        }
        if err.is_decode() {
            return Self::Decode(err.to_string());
        }
        match err.status() {
            Some(status) => Self::Http {
                status: status.as_u16(),
                url: err.url().map(ToString::to_string).unwrap_or_default(),
            },
            None => Self::Network(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = KnmapError::decode("bad payload");
        assert_eq!(err.to_string(), "Decode error: bad payload");
        assert_eq!(err.category(), "serialization");
    }

    #[test]
    fn test_error_recoverability() {
        assert!(KnmapError::network("connection refused").is_recoverable());
        assert!(KnmapError::Timeout { timeout_ms: 5000 }.is_recoverable());
        assert!(KnmapError::Http { status: 503, url: String::new() }.is_recoverable());
        assert!(!KnmapError::Http { status: 404, url: String::new() }.is_recoverable());
        assert!(!KnmapError::config("invalid config").is_recoverable());
    }

    #[test]
    fn test_service_not_found() {
        let err = KnmapError::ServiceNotFound {
            name: "orders".to_string(),
            namespace: "shop".to_string(),
        };
        assert_eq!(err.to_string(), "Unknown service orders.shop");
        assert_eq!(err.category(), "not_found");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_invalid_window_message() {
        let err = KnmapError::InvalidWindow { from: 20, to: 10 };
        assert_eq!(err.to_string(), "Invalid time window: from 20 must be before to 10");
        assert_eq!(err.category(), "validation");
    }
}
