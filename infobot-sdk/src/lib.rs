//! infobot-sdk: a small async IRC client.
//!
//! Handles the TCP connection, registration, keepalive and line parsing,
//! and exposes the session as a stream of [`event::Event`]s plus a
//! cloneable [`client::ClientHandle`] for outbound commands.

pub mod client;
pub mod event;
pub mod irc;
