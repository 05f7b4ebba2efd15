//! Global error types for the pusher client.
//!
//! All error categories across the client are unified into a single
//! `PusherError` enum with conversions from underlying library errors.

use thiserror::Error;

/// Convenience type alias for Results using PusherError.
pub type PusherResult<T> = Result<T, PusherError>;

/// Unified error type covering all error categories in the client.
#[derive(Error, Debug)]
pub enum PusherError {
    // -- Configuration errors --
    /// Failed to load or parse client configuration.
    #[error("configuration error: {0}")]
    Config(String),

    /// A required configuration value is missing.
    #[error("missing configuration: {0}")]
    MissingConfig(String),

    // -- Connection setup errors --
    /// Connection handshake failed before a session was established.
    #[error("handshake error: {0}")]
    Handshake(String),

    /// The service reported an error frame.
    #[error("service error (code {code}): {message}")]
    Protocol {
        /// Service-assigned error code.
        code: i32,
        /// Error message from the service.
        message: String,
    },

    // -- Transport errors --
    /// WebSocket send or receive failed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The connection was closed and the session is no longer usable.
    #[error("connection closed")]
    ConnectionClosed,

    // -- Authorization errors --
    /// The channel-authorization HTTP request failed.
    #[error("http error: {0}")]
    Http(String),

    /// The authorization request timed out.
    #[error("request timeout: {0}")]
    Timeout(String),

    /// The authorization endpoint rejected the request.
    #[error("authorization failed (status {status}): {message}")]
    AuthFailed {
        /// HTTP status code.
        status: u16,
        /// Response body or error detail.
        message: String,
    },

    /// The authorization response body was not a JSON object.
    #[error("malformed authorization body: {0}")]
    MalformedAuthBody(String),

    // -- Subscription / binding errors --
    /// Subscribe called for a topic already in the subscription set.
    #[error("channel {0} already subscribed")]
    AlreadySubscribed(String),

    /// Unsubscribe called for a topic not in the subscription set.
    #[error("not subscribed to channel {0}")]
    NotSubscribed(String),

    /// Bind called for an event name that already has a delivery channel.
    #[error("event {0} already bound")]
    AlreadyBound(String),

    // -- File/IO errors --
    /// File system operation failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    // -- Generic --
    /// An unexpected internal error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Wrapping anyhow errors for interop.
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl From<serde_json::Error> for PusherError {
    fn from(e: serde_json::Error) -> Self {
        PusherError::Serialization(e.to_string())
    }
}

impl From<toml::de::Error> for PusherError {
    fn from(e: toml::de::Error) -> Self {
        PusherError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_display() {
        let err = PusherError::Protocol {
            code: 4001,
            message: "Over capacity".into(),
        };
        assert_eq!(err.to_string(), "service error (code 4001): Over capacity");
    }

    #[test]
    fn test_duplicate_subscribe_display() {
        let err = PusherError::AlreadySubscribed("room1".into());
        assert_eq!(err.to_string(), "channel room1 already subscribed");
    }

    #[test]
    fn test_json_error_conversion() {
        let json_err = serde_json::from_str::<serde_json::Value>("not json").unwrap_err();
        let err: PusherError = json_err.into();
        assert!(matches!(err, PusherError::Serialization(_)));
    }
}
