//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! DialConfig + TransportConfig
//!     → dial.rs (endpoint: keepalive, windows, concurrency)
//!     → tls.rs (rustls client config, minimum protocol version)
//!     → connector.rs (TCP connect + TLS handshake, ALPN h2)
//!     → Connection (channel + policy)
//! ```
//!
//! # Design Decisions
//! - Dialing is bounded by a single timeout and is not retried
//! - The connection is owned by the returned handle and closes on drop

pub mod connector;
pub mod dial;
pub mod tls;

pub use dial::{dial, ClientKeepalive, Connection, DialError};
