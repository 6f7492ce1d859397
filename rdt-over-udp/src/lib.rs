//! `rdt-over-udp` — reliable data transfer over a lossy, corrupting UDP channel.
//!
//! # Architecture
//!
//! ```text
//!  ┌──────────┐   DATA       ┌──────────┐
//!  │  Sender  │─────────────▶│ Receiver │
//!  └────┬─────┘              └─────┬────┘
//!       │                          │
//!       │        ACKs              │
//!       │◀─────────────────────────┘
//!       │
//!  ┌────▼──────────────────────────────┐
//!  │           Connection              │
//!  │  (owns seq state + socket, drain) │
//!  └────┬──────────────────────────────┘
//!       │ raw UDP datagrams
//!  ┌────▼──────┐
//!  │ UdtSocket │  (tokio UdpSocket + simulated loss/corruption)
//!  └───────────┘
//! ```
//!
//! Each module has a single responsibility:
//! - [`checksum`]    — Internet checksum
//! - [`packet`]      — wire format (serialise / deserialise)
//! - [`config`]      — protocol constants and network configuration
//! - [`simulator`]   — loss/corruption fault model
//! - [`socket`]      — unreliable datagram layer
//! - [`sender`]      — send batch and cumulative-ACK bookkeeping
//! - [`receiver`]    — in-order acceptance and re-acknowledgment
//! - [`connection`]  — endpoint lifecycle: send, recv, close

use thiserror::Error;

pub mod checksum;
pub mod config;
pub mod connection;
pub mod packet;
pub mod receiver;
pub mod sender;
pub mod simulator;
pub mod socket;

pub use config::{ConfigError, NetworkConfig, PAYLOAD_MAX, TIMEOUT, TWAIT};
pub use connection::Connection;

/// Errors surfaced to applications.
///
/// Simulated loss and corruption never show up here; they are absorbed by
/// retransmission and checksum drops.
#[derive(Debug, Error)]
pub enum RdtError {
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("peer address not set")]
    NoPeerAddress,
    #[error("message needs {segments} segments; at most {max} fit the sequence space", max = config::MAX_SEGMENTS)]
    MessageTooLarge { segments: usize },
    #[error(transparent)]
    Config(#[from] ConfigError),
}
