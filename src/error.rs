use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use std::fmt;

/// Main error type for the hostwatch service
#[derive(Debug)]
pub enum HostwatchError {
    /// Configuration or CLI argument errors
    Config(String),

    /// Errors reported by the known-hosts store (not timeouts)
    Store(String),

    /// Reverse lookup errors (never surfaced past the resolver)
    Resolver(String),

    /// Node lifecycle and controller errors
    Node(String),

    /// System I/O errors
    Io(std::io::Error),

    /// Transport layer errors
    Transport(String),

    /// A network step gave up waiting on its peer
    Timeout(String),

    /// Serialization/deserialization errors
    Serialization(SerializationError),

    /// Internal lock poisoning or concurrency errors
    Concurrency(String),
}

/// Serialization related errors
#[derive(Debug)]
pub enum SerializationError {
    /// JSON serialization/deserialization errors
    Json(serde_json::Error),

    /// Binary encoding errors
    Encode(bincode::error::EncodeError),

    /// Binary decoding errors
    Decode(bincode::error::DecodeError),
}

impl fmt::Display for HostwatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostwatchError::Config(msg) => write!(f, "Configuration error: {}", msg),
            HostwatchError::Store(msg) => write!(f, "Store error: {}", msg),
            HostwatchError::Resolver(msg) => write!(f, "Resolver error: {}", msg),
            HostwatchError::Node(msg) => write!(f, "Node error: {}", msg),
            HostwatchError::Io(err) => write!(f, "I/O error: {}", err),
            HostwatchError::Transport(msg) => write!(f, "Transport error: {}", msg),
            HostwatchError::Timeout(msg) => write!(f, "Timed out: {}", msg),
            HostwatchError::Serialization(err) => write!(f, "Serialization error: {}", err),
            HostwatchError::Concurrency(msg) => write!(f, "Concurrency error: {}", msg),
        }
    }
}

impl fmt::Display for SerializationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SerializationError::Json(err) => write!(f, "JSON: {}", err),
            SerializationError::Encode(err) => write!(f, "Binary encode: {}", err),
            SerializationError::Decode(err) => write!(f, "Binary decode: {}", err),
        }
    }
}

impl std::error::Error for HostwatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            HostwatchError::Io(err) => Some(err),
            HostwatchError::Serialization(err) => Some(err),
            _ => None,
        }
    }
}

impl std::error::Error for SerializationError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            SerializationError::Json(err) => Some(err),
            SerializationError::Encode(err) => Some(err),
            SerializationError::Decode(err) => Some(err),
        }
    }
}

// Convenient type alias for Results using our error type
pub type Result<T> = std::result::Result<T, HostwatchError>;

impl IntoResponse for HostwatchError {
    fn into_response(self) -> Response {
        let status_code = self.status_code();
        let error_response = json!({
            "error": {
                "code": status_code.as_u16(),
                "message": self.user_message(),
                "type": self.error_type(),
            }
        });

        (status_code, Json(error_response)).into_response()
    }
}

impl HostwatchError {
    /// Get the appropriate HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            HostwatchError::Config(_) => StatusCode::BAD_REQUEST,
            HostwatchError::Store(_) => StatusCode::SERVICE_UNAVAILABLE,
            HostwatchError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            HostwatchError::Node(_) => StatusCode::SERVICE_UNAVAILABLE,
            HostwatchError::Resolver(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HostwatchError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HostwatchError::Transport(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HostwatchError::Serialization(_) => StatusCode::INTERNAL_SERVER_ERROR,
            HostwatchError::Concurrency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            HostwatchError::Config(msg) => format!("Configuration error: {}", msg),
            HostwatchError::Store(_) | HostwatchError::Timeout(_) | HostwatchError::Node(_) => {
                "Service temporarily unavailable. Please try again later.".to_string()
            }
            _ => "Internal server error. Please try again later.".to_string(),
        }
    }

    /// Get the error type identifier
    pub fn error_type(&self) -> &'static str {
        match self {
            HostwatchError::Config(_) => "configuration_error",
            HostwatchError::Store(_) => "store_error",
            HostwatchError::Resolver(_) => "resolver_error",
            HostwatchError::Node(_) => "node_error",
            HostwatchError::Io(_) => "io_error",
            HostwatchError::Transport(_) => "transport_error",
            HostwatchError::Timeout(_) => "timeout_error",
            HostwatchError::Serialization(_) => "serialization_error",
            HostwatchError::Concurrency(_) => "concurrency_error",
        }
    }
}

// Conversions from common error types
impl From<std::io::Error> for HostwatchError {
    fn from(err: std::io::Error) -> Self {
        HostwatchError::Io(err)
    }
}

impl From<serde_json::Error> for HostwatchError {
    fn from(err: serde_json::Error) -> Self {
        HostwatchError::Serialization(SerializationError::Json(err))
    }
}

impl From<bincode::error::EncodeError> for HostwatchError {
    fn from(err: bincode::error::EncodeError) -> Self {
        HostwatchError::Serialization(SerializationError::Encode(err))
    }
}

impl From<bincode::error::DecodeError> for HostwatchError {
    fn from(err: bincode::error::DecodeError) -> Self {
        HostwatchError::Serialization(SerializationError::Decode(err))
    }
}

impl From<SerializationError> for HostwatchError {
    fn from(err: SerializationError) -> Self {
        HostwatchError::Serialization(err)
    }
}

impl From<std::net::AddrParseError> for HostwatchError {
    fn from(err: std::net::AddrParseError) -> Self {
        HostwatchError::Config(format!("Invalid address: {}", err))
    }
}

impl From<ipnet::AddrParseError> for HostwatchError {
    fn from(err: ipnet::AddrParseError) -> Self {
        HostwatchError::Config(format!("Invalid network: {}", err))
    }
}

// Helper macros for common error construction patterns
#[macro_export]
macro_rules! config_error {
    ($msg:expr) => {
        $crate::error::HostwatchError::Config($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::HostwatchError::Config(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! store_error {
    ($msg:expr) => {
        $crate::error::HostwatchError::Store($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::HostwatchError::Store(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! transport_error {
    ($msg:expr) => {
        $crate::error::HostwatchError::Transport($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::HostwatchError::Transport(format!($fmt, $($arg)*))
    };
}

#[macro_export]
macro_rules! concurrency_error {
    ($msg:expr) => {
        $crate::error::HostwatchError::Concurrency($msg.to_string())
    };
    ($fmt:expr, $($arg:tt)*) => {
        $crate::error::HostwatchError::Concurrency(format!($fmt, $($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let config_err = HostwatchError::Config("Invalid port".to_string());
        assert_eq!(config_err.to_string(), "Configuration error: Invalid port");

        let io_err = HostwatchError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "File not found",
        ));
        assert!(io_err.to_string().contains("I/O error"));
    }

    #[test]
    fn test_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "test");
        let err: HostwatchError = io_err.into();
        assert!(matches!(err, HostwatchError::Io(_)));

        let parse_err = "not-an-ip".parse::<std::net::IpAddr>().unwrap_err();
        let err: HostwatchError = parse_err.into();
        assert!(matches!(err, HostwatchError::Config(_)));
    }

    #[test]
    fn test_macros() {
        let err = config_error!("Port {} is invalid", 65536);
        assert_eq!(err.to_string(), "Configuration error: Port 65536 is invalid");

        let err = store_error!("store rejected insert");
        assert_eq!(err.to_string(), "Store error: store rejected insert");
        assert_eq!(err.error_type(), "store_error");
        assert_eq!(err.status_code(), StatusCode::SERVICE_UNAVAILABLE);

        let err = transport_error!("Peer not found: {}", "proxy-1");
        assert_eq!(err.error_type(), "transport_error");

        let err = concurrency_error!("Mutex lock fail {}", "poisoned");
        assert_eq!(err.to_string(), "Concurrency error: Mutex lock fail poisoned");
    }

    #[test]
    fn test_timeout_is_its_own_kind() {
        let err = HostwatchError::Timeout("Response length read timeout".to_string());
        assert_eq!(err.status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(err.error_type(), "timeout_error");
        assert!(err.to_string().starts_with("Timed out"));
    }
}
