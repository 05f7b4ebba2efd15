//! Wire protocol types and frame construction.
//!
//! Defines the envelope exchanged over the connection, the reserved system
//! events, and the payloads used during session establishment. Application
//! payloads stay opaque: the `data` field of an inbound envelope is a string
//! that itself holds JSON.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use pusher_core::constants::events;
use pusher_core::error::{PusherError, PusherResult};

/// The wire unit: an event name and an opaque data payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Event name, e.g. `pusher:ping` or an application event.
    pub event: String,
    /// Opaque payload; holds JSON in normal operation.
    pub data: String,
}

impl Envelope {
    /// Create an envelope from an event name and payload.
    pub fn new(event: impl Into<String>, data: impl Into<String>) -> Self {
        Self {
            event: event.into(),
            data: data.into(),
        }
    }

    /// Encode the envelope as a JSON text frame.
    pub fn encode(&self) -> PusherResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode an envelope from a received text frame.
    pub fn decode(raw: &str) -> PusherResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Classify this envelope's event name.
    pub fn system_event(&self) -> SystemEvent {
        SystemEvent::from_name(&self.event)
    }
}

/// Reserved system events plus a fallback for application events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SystemEvent {
    /// Liveness probe from the peer (`pusher:ping`).
    Ping,
    /// Liveness reply (`pusher:pong`).
    Pong,
    /// Service-reported error frame (`pusher:error`).
    Error,
    /// Session establishment frame (`pusher:connection_established`).
    ConnectionEstablished,
    /// Channel subscription request (`pusher:subscribe`, client to service).
    Subscribe,
    /// Channel unsubscription request (`pusher:unsubscribe`, client to service).
    Unsubscribe,
    /// Any non-reserved event name, delivered to bound consumers.
    Application(String),
}

impl SystemEvent {
    /// Parse an event name string.
    pub fn from_name(name: &str) -> Self {
        match name {
            events::PING => Self::Ping,
            events::PONG => Self::Pong,
            events::ERROR => Self::Error,
            events::CONNECTION_ESTABLISHED => Self::ConnectionEstablished,
            events::SUBSCRIBE => Self::Subscribe,
            events::UNSUBSCRIBE => Self::Unsubscribe,
            other => Self::Application(other.to_string()),
        }
    }

    /// Convert back to the wire event name.
    pub fn as_name(&self) -> &str {
        match self {
            Self::Ping => events::PING,
            Self::Pong => events::PONG,
            Self::Error => events::ERROR,
            Self::ConnectionEstablished => events::CONNECTION_ESTABLISHED,
            Self::Subscribe => events::SUBSCRIBE,
            Self::Unsubscribe => events::UNSUBSCRIBE,
            Self::Application(s) => s.as_str(),
        }
    }
}

/// Payload of the `pusher:connection_established` handshake frame.
///
/// Immutable once created; owned exclusively by the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionDescriptor {
    /// Connection identifier assigned by the service at handshake.
    pub socket_id: String,
    /// Informational activity-timeout hint, in seconds.
    #[serde(default)]
    pub activity_timeout: u64,
}

/// Payload of a `pusher:error` frame.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorPayload {
    /// Service-assigned error code.
    #[serde(default)]
    pub code: i32,
    /// Human-readable error message.
    #[serde(default)]
    pub message: String,
}

/// Outbound frame constructors.
///
/// Subscribe frames embed their payload as a JSON object (not a string),
/// matching the service's subscribe contract; the ping/pong frames carry an
/// empty string-encoded payload.
pub mod frames {
    use super::*;

    /// Keepalive ping frame with empty payload.
    pub fn ping() -> String {
        r#"{"event":"pusher:ping","data":"{}"}"#.to_string()
    }

    /// Liveness reply frame with empty payload.
    pub fn pong() -> String {
        r#"{"event":"pusher:pong","data":"{}"}"#.to_string()
    }

    /// Subscribe frame for a public channel: `{"channel": <name>}` payload.
    pub fn subscribe(channel: &str) -> PusherResult<String> {
        let frame = serde_json::json!({
            "event": events::SUBSCRIBE,
            "data": { "channel": channel },
        });
        Ok(serde_json::to_string(&frame)?)
    }

    /// Unsubscribe frame for a channel.
    pub fn unsubscribe(channel: &str) -> PusherResult<String> {
        let frame = serde_json::json!({
            "event": events::UNSUBSCRIBE,
            "data": { "channel": channel },
        });
        Ok(serde_json::to_string(&frame)?)
    }

    /// Subscribe frame for an authorized channel.
    ///
    /// Decodes the raw authorization response as a generic JSON object,
    /// injects the target channel under the reserved `channel` key, and
    /// embeds the result as the subscribe payload. The body's other fields
    /// pass through untouched, whatever their shape.
    pub fn authorized_subscribe(auth_body: &str, channel: &str) -> PusherResult<String> {
        let mut payload: Map<String, Value> = serde_json::from_str(auth_body)
            .map_err(|e| PusherError::MalformedAuthBody(e.to_string()))?;
        payload.insert("channel".to_string(), Value::String(channel.to_string()));

        let frame = serde_json::json!({
            "event": events::SUBSCRIBE,
            "data": payload,
        });
        Ok(serde_json::to_string(&frame)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_roundtrip() {
        let original = Envelope::new("client-my-event", r#"{"text":"hello"}"#);
        let encoded = original.encode().unwrap();
        let decoded = Envelope::decode(&encoded).unwrap();
        assert_eq!(decoded.event, original.event);
        assert_eq!(decoded.data, original.data);
    }

    #[test]
    fn test_decode_handshake_frame() {
        let raw = r#"{"event":"pusher:connection_established","data":"{\"socket_id\":\"123.456\",\"activity_timeout\":120}"}"#;
        let envelope = Envelope::decode(raw).unwrap();
        assert_eq!(envelope.system_event(), SystemEvent::ConnectionEstablished);

        let descriptor: SessionDescriptor = serde_json::from_str(&envelope.data).unwrap();
        assert_eq!(descriptor.socket_id, "123.456");
        assert_eq!(descriptor.activity_timeout, 120);
    }

    #[test]
    fn test_decode_error_payload() {
        let payload: ErrorPayload =
            serde_json::from_str(r#"{"code":4001,"message":"Over capacity"}"#).unwrap();
        assert_eq!(payload.code, 4001);
        assert_eq!(payload.message, "Over capacity");
    }

    #[test]
    fn test_decode_rejects_malformed_frame() {
        assert!(Envelope::decode("not json").is_err());
        // `data` must be a string on the wire, not an object
        assert!(Envelope::decode(r#"{"event":"x","data":{"a":1}}"#).is_err());
    }

    #[test]
    fn test_system_event_classification() {
        assert_eq!(SystemEvent::from_name("pusher:ping"), SystemEvent::Ping);
        assert_eq!(SystemEvent::from_name("pusher:pong"), SystemEvent::Pong);
        assert_eq!(
            SystemEvent::from_name("pusher:error"),
            SystemEvent::Error
        );
        assert_eq!(
            SystemEvent::from_name("chat-message"),
            SystemEvent::Application("chat-message".into())
        );
    }

    #[test]
    fn test_system_event_name_roundtrip() {
        for name in pusher_core::constants::events::ALL {
            assert_eq!(SystemEvent::from_name(name).as_name(), *name);
        }
    }

    #[test]
    fn test_ping_pong_frames() {
        let ping: Envelope = serde_json::from_str(&frames::ping()).unwrap();
        assert_eq!(ping.event, "pusher:ping");
        assert_eq!(ping.data, "{}");

        let pong: Envelope = serde_json::from_str(&frames::pong()).unwrap();
        assert_eq!(pong.event, "pusher:pong");
        assert_eq!(pong.data, "{}");
    }

    #[test]
    fn test_subscribe_frame() {
        let frame: Value = serde_json::from_str(&frames::subscribe("room1").unwrap()).unwrap();
        assert_eq!(frame["event"], "pusher:subscribe");
        assert_eq!(frame["data"]["channel"], "room1");
    }

    #[test]
    fn test_unsubscribe_frame() {
        let frame: Value = serde_json::from_str(&frames::unsubscribe("room1").unwrap()).unwrap();
        assert_eq!(frame["event"], "pusher:unsubscribe");
        assert_eq!(frame["data"]["channel"], "room1");
    }

    #[test]
    fn test_authorized_subscribe_frame() {
        let frame: Value = serde_json::from_str(
            &frames::authorized_subscribe(r#"{"auth":"key:sig"}"#, "private-room").unwrap(),
        )
        .unwrap();
        assert_eq!(frame["event"], "pusher:subscribe");
        assert_eq!(frame["data"]["auth"], "key:sig");
        assert_eq!(frame["data"]["channel"], "private-room");
    }

    #[test]
    fn test_authorized_subscribe_preserves_extra_fields() {
        let body = r#"{"auth":"key:sig","channel_data":"{\"user_id\":\"7\"}"}"#;
        let frame: Value =
            serde_json::from_str(&frames::authorized_subscribe(body, "presence-room").unwrap())
                .unwrap();
        assert_eq!(frame["data"]["channel_data"], "{\"user_id\":\"7\"}");
        assert_eq!(frame["data"]["channel"], "presence-room");
    }

    #[test]
    fn test_authorized_subscribe_rejects_malformed_body() {
        let err = frames::authorized_subscribe("<html>error</html>", "private-room").unwrap_err();
        assert!(matches!(err, PusherError::MalformedAuthBody(_)));
    }
}
