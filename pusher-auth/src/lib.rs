//! Pusher Auth - HTTP client for the channel-authorization endpoint.
//!
//! Private channels require a signed authorization token minted by an
//! application-controlled HTTP endpoint. This crate performs that round
//! trip: a form-encoded POST carrying the connection's socket id and the
//! channel name, with caller-supplied headers and a configurable TLS
//! policy, returning the raw response body for the subscribe payload.

pub mod client;

pub use client::AuthClient;
