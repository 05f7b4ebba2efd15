//! Pusher Socket - persistent pub/sub client for the hosted messaging service.
//!
//! This crate provides the connection session that handles:
//! - Session establishment over one long-lived WebSocket connection
//! - Keepalive pings and ping/pong protocol handling
//! - Channel subscription, including the signed authorization handshake
//!   for private channels
//! - Per-event-name fan-out to bounded delivery channels via `bind`
//! - Deterministic shutdown through an explicit cancellation signal
//!
//! Reconnection is deliberately out of scope: a dropped transport leaves
//! the session in the `Disconnected` state and callers reconnect by
//! constructing a new session.
//!
//! # Example
//!
//! ```rust,no_run
//! use pusher_core::PusherConfig;
//! use pusher_socket::Session;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = PusherConfig::for_app_key("app-key");
//! let session = Session::connect(&config).await?;
//!
//! session.subscribe("room1").await?;
//! let mut events = session.bind("chat-message").await?;
//!
//! while let Some(envelope) = events.recv().await {
//!     println!("{}: {}", envelope.event, envelope.data);
//! }
//! # Ok(())
//! # }
//! ```

pub mod protocol;
pub mod registry;
pub mod session;
pub mod transport;

// Re-export key types
pub use protocol::{Envelope, ErrorPayload, SessionDescriptor, SystemEvent};
pub use registry::{BindingTable, Delivery, SubscriptionSet};
pub use session::{ConnectionState, Session};
pub use transport::{FrameSink, FrameSource};
