//! Pusher Core - Foundation types, error handling, configuration, and logging.
//!
//! This crate provides the shared foundation used by the other pusher crates:
//! - Client configuration (app key, service host, auth endpoint, tunables)
//! - Global error types covering all error categories
//! - Structured logging with tracing
//! - Protocol constants and reserved event names

pub mod config;
pub mod constants;
pub mod error;
pub mod logging;

// Re-export commonly used items at the crate root
pub use config::{AuthConfig, PusherConfig};
pub use error::{PusherError, PusherResult};
pub use logging::init_logging;
