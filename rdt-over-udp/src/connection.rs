//! Per-endpoint lifecycle: create, bind, send, receive, drain and close.
//!
//! A [`Connection`] owns the complete state for one endpoint:
//!
//! ```text
//!  Application
//!      │  send(msg) / recv(max) / close()
//!      ▼
//!  Connection
//!    ├── Sender    (next_seq_num, send batches)
//!    ├── Receiver  (expected_seq_num, re-ACKs)
//!    └── UdtSocket (UDP + simulated loss/corruption)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! let mut conn = Connection::create(NetworkConfig::new(0.1, 0.1, 5)?)?;
//! conn.bind(9000)?;
//! conn.set_peer("127.0.0.1:9001".parse()?);
//! conn.send(b"hello").await?;
//! let reply = conn.recv(PAYLOAD_MAX).await?;
//! conn.close().await?;
//! ```
//!
//! Every operation takes the connection exclusively, so one caller drives it
//! at a time. Send and receive sequence numbers are independent streams and
//! both persist across calls.

use std::io;
use std::net::SocketAddr;

use tokio::time::Instant;

use crate::checksum;
use crate::config::{NetworkConfig, HEADER_LEN, PAYLOAD_MAX, TIMEOUT, TWAIT};
use crate::packet::{Packet, PacketType};
use crate::receiver::{Receiver, Verdict};
use crate::sender::{AckOutcome, Sender};
use crate::socket::{ChannelStats, UdtSocket};
use crate::RdtError;

/// Largest datagram the engines expect to read while sending or draining.
const MAX_DATAGRAM: usize = PAYLOAD_MAX + HEADER_LEN;

// ---------------------------------------------------------------------------
// Connection
// ---------------------------------------------------------------------------

/// One RDT endpoint talking to a single, fixed peer.
#[derive(Debug)]
pub struct Connection {
    /// Outbound sequence state.
    pub sender: Sender,

    /// Inbound sequence state.
    pub receiver: Receiver,

    config: NetworkConfig,

    /// Remote peer address; sends fail until it is set.
    peer: Option<SocketAddr>,

    socket: UdtSocket,
}

impl Connection {
    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// Create an endpoint with an unbound UDP socket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create(config: NetworkConfig) -> Result<Self, RdtError> {
        config.validate()?;
        let socket = UdtSocket::create(&config).inspect_err(|e| {
            log::error!("Socket creation error: {e}");
        })?;
        Ok(Self {
            sender: Sender::default(),
            receiver: Receiver::default(),
            config,
            peer: None,
            socket,
        })
    }

    /// Bind the local port. Port 0 lets the OS choose.
    pub fn bind(&mut self, port: u16) -> Result<(), RdtError> {
        self.socket.bind(port).inspect_err(|e| {
            log::error!("Socket bind error: {e}");
        })?;
        Ok(())
    }

    /// Set the remote peer all traffic is sent to.
    pub fn set_peer(&mut self, peer: SocketAddr) {
        self.peer = Some(peer);
    }

    pub fn peer(&self) -> Option<SocketAddr> {
        self.peer
    }

    pub fn local_addr(&self) -> Result<SocketAddr, RdtError> {
        Ok(self.socket.local_addr()?)
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Counters from the unreliable layer.
    pub fn channel_stats(&self) -> ChannelStats {
        self.socket.stats()
    }

    // -----------------------------------------------------------------------
    // Data transfer
    // -----------------------------------------------------------------------

    /// Deliver `message` to the peer.
    ///
    /// The message is split into segments that are all sent at once. The call
    /// returns only after the final segment is acknowledged; unacknowledged
    /// segments are retransmitted every [`TIMEOUT`] with no retry limit.
    ///
    /// Returns the message length.
    pub async fn send(&mut self, message: &[u8]) -> Result<usize, RdtError> {
        if self.peer.is_none() {
            log::error!("[send] peer address not set");
            return Err(RdtError::NoPeerAddress);
        }
        if message.is_empty() {
            return Ok(0);
        }
        if message.len() > self.config.message_limit() {
            log::debug!(
                "[send] {} bytes exceed the {}-segment window; sending as one batch",
                message.len(),
                self.config.window_size
            );
        }

        let mut batch = self.sender.begin_batch(message)?;
        for entry in batch.entries() {
            self.transmit(&entry.bytes).await;
            log::debug!(
                "[send] → DATA seq={} len={}",
                entry.seq,
                entry.bytes.len() - HEADER_LEN
            );
        }

        loop {
            let deadline = Instant::now() + TIMEOUT;
            let result = self.socket.recv_timeout(MAX_DATAGRAM, TIMEOUT).await;
            let incoming = settle("[send]", result, deadline).await;

            let Some(bytes) = incoming else {
                // Timeout: go back and resend whatever is still unacknowledged.
                for entry in batch.unacked() {
                    log::debug!("[send] timeout: retransmit DATA seq={}", entry.seq);
                    self.transmit(&entry.bytes).await;
                }
                continue;
            };

            let Some(pkt) = inspect("[send]", &bytes) else {
                continue;
            };

            match pkt.kind {
                PacketType::Ack => match batch.on_ack(pkt.seq) {
                    AckOutcome::Complete => {
                        log::debug!(
                            "[send] ← ACK seq={}; {} segment(s), {} bytes delivered",
                            pkt.seq,
                            batch.len(),
                            message.len()
                        );
                        return Ok(message.len());
                    }
                    AckOutcome::Advanced(n) => {
                        log::debug!("[send] ← ACK seq={} (flagged {n} segment(s))", pkt.seq);
                    }
                    AckOutcome::Stale => {
                        log::debug!(
                            "[send] ← unexpected ACK seq={} outside {}..={}; drop",
                            pkt.seq,
                            batch.base,
                            batch.last_seq()
                        );
                    }
                },
                PacketType::Data => {
                    // Our ACK for the peer's last segment was lost.
                    let ack = self.receiver.reack(pkt.length);
                    log::debug!(
                        "[send] ← retransmitted DATA seq={}; → ACK seq={}",
                        pkt.seq,
                        ack.seq
                    );
                    self.transmit(&ack.encode()).await;
                }
            }
        }
    }

    /// Wait for the next in-order payload of at most `max_len` bytes.
    ///
    /// Corrupted packets, stray ACKs and duplicate DATA are handled here and
    /// never returned. Fails only on a local socket error.
    pub async fn recv(&mut self, max_len: usize) -> Result<Vec<u8>, RdtError> {
        loop {
            let bytes = self
                .socket
                .recv(max_len.saturating_add(HEADER_LEN))
                .await
                .inspect_err(|e| log::error!("[recv] socket recv error: {e}"))?;

            let Some(pkt) = inspect("[recv]", &bytes) else {
                continue;
            };

            if pkt.kind == PacketType::Ack {
                log::debug!("[recv] ← ACK seq={} from peer; ignored", pkt.seq);
                continue;
            }

            match self.receiver.on_data(pkt.seq, pkt.length) {
                Verdict::Accept(ack) => {
                    log::debug!(
                        "[recv] ← DATA seq={} len={}; → ACK seq={}",
                        pkt.seq,
                        pkt.payload.len(),
                        ack.seq
                    );
                    self.transmit(&ack.encode()).await;
                    return Ok(pkt.payload);
                }
                Verdict::Reack(ack) => {
                    log::debug!(
                        "[recv] ← retransmitted DATA seq={} (expected {}); drop, → ACK seq={}",
                        pkt.seq,
                        self.receiver.expected_seq_num,
                        ack.seq
                    );
                    self.transmit(&ack.encode()).await;
                }
            }
        }
    }

    /// Drain trailing retransmissions, then release the socket.
    ///
    /// Any DATA arriving within [`TWAIT`] is re-acknowledged and restarts the
    /// wait, so a peer whose final ACK was lost still gets one. Returns once
    /// the channel has been silent for a full [`TWAIT`].
    pub async fn close(mut self) -> Result<(), RdtError> {
        loop {
            let incoming = self
                .socket
                .recv_timeout(MAX_DATAGRAM, TWAIT)
                .await
                .inspect_err(|e| log::error!("[close] socket recv error: {e}"))?;

            let Some(bytes) = incoming else {
                log::info!("[close] nothing happened for {TWAIT:?}; releasing the socket");
                return Ok(());
            };

            let Some(pkt) = inspect("[close]", &bytes) else {
                continue;
            };
            if pkt.kind == PacketType::Data {
                let ack = self.receiver.reack(pkt.length);
                log::debug!("[close] ← DATA seq={}; → ACK seq={}", pkt.seq, ack.seq);
                self.transmit(&ack.encode()).await;
            }
        }
    }

    // -----------------------------------------------------------------------
    // Helpers
    // -----------------------------------------------------------------------

    /// Send through the unreliable layer; failures are logged, not returned.
    async fn transmit(&mut self, datagram: &[u8]) {
        if let Err(e) = self.socket.send(self.peer, datagram).await {
            log::error!("[udt] socket send error: {e}");
        }
    }
}

/// Resolve one timed receive into its datagram, if any.
///
/// A socket error is logged and counts as a timeout, but only once
/// `deadline` has passed. A socket that fails on every read still paces
/// retransmission at one round per [`TIMEOUT`].
async fn settle(
    ctx: &str,
    result: io::Result<Option<Vec<u8>>>,
    deadline: Instant,
) -> Option<Vec<u8>> {
    match result {
        Ok(incoming) => incoming,
        Err(e) => {
            log::error!("{ctx} socket recv error: {e}");
            tokio::time::sleep_until(deadline).await;
            None
        }
    }
}

/// Decode `bytes` and check its checksum; `None` means drop it.
fn inspect(ctx: &str, bytes: &[u8]) -> Option<Packet> {
    let pkt = match Packet::decode(bytes) {
        Ok(pkt) => pkt,
        Err(e) => {
            log::warn!("{ctx} malformed packet ({e}); drop");
            return None;
        }
    };
    if !checksum::verify(bytes) {
        log::warn!(
            "{ctx} received a corrupted packet: type={} length={}; drop",
            pkt.kind,
            pkt.length
        );
        return None;
    }
    Some(pkt)
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
