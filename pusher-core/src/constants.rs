//! Protocol constants and reserved event names.

/// Client name reported in the connection URL.
pub const CLIENT_NAME: &str = "pusher-websocket-rust";

/// Client version reported in the connection URL.
pub const CLIENT_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Pusher protocol version negotiated in the connection URL.
pub const PROTOCOL_VERSION: &str = "7";

/// Default service host.
pub const DEFAULT_HOST: &str = "ws.pusherapp.com";

/// Default WebSocket port.
pub const DEFAULT_PORT: u16 = 443;

/// Interval between keepalive pings, in seconds.
pub const KEEPALIVE_INTERVAL_SECS: u64 = 60;

/// Capacity of each per-event delivery channel.
pub const DELIVERY_CHANNEL_CAPACITY: usize = 64;

/// Service-imposed envelope size limit. Frames above this bound are
/// rejected by the transport adapter.
pub const MAX_FRAME_BYTES: usize = 10_240;

/// Default timeout for the channel-authorization HTTP request, in milliseconds.
pub const DEFAULT_AUTH_TIMEOUT_MS: u64 = 30_000;

/// Reserved event names carried in the `event` field of wire envelopes.
pub mod events {
    pub const PING: &str = "pusher:ping";
    pub const PONG: &str = "pusher:pong";
    pub const ERROR: &str = "pusher:error";
    pub const CONNECTION_ESTABLISHED: &str = "pusher:connection_established";
    pub const SUBSCRIBE: &str = "pusher:subscribe";
    pub const UNSUBSCRIBE: &str = "pusher:unsubscribe";

    /// All reserved event names.
    pub const ALL: &[&str] = &[
        PING,
        PONG,
        ERROR,
        CONNECTION_ESTABLISHED,
        SUBSCRIBE,
        UNSUBSCRIBE,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_event_names() {
        assert_eq!(events::ALL.len(), 6);
        assert!(events::ALL.iter().all(|e| e.starts_with("pusher:")));
    }

    #[test]
    fn test_frame_bound_covers_service_limit() {
        // 10 KB service limit
        assert_eq!(MAX_FRAME_BYTES, 10 * 1024);
    }
}
