//! Networking layer for host-client session synchronization.
//!
//! TCP with newline-delimited JSON records: a closed set of tagged
//! messages, a line codec with a size guard, the host's accept/broadcast
//! machinery, and the client's mirror-and-request side.

/// TCP client for joining a discovered host.
pub mod client;

/// Line framing for the session protocol.
pub mod codec;

/// Message types for the host-client protocol.
pub mod messages;

/// Host-side accept loop, connection registry, and broadcast.
pub mod server;
