//! The unreliable datagram layer.
//!
//! [`UdtSocket`] is a thin wrapper around `tokio::net::UdpSocket` that runs
//! every outbound datagram through the [`FaultModel`]. All protocol logic
//! lives elsewhere; this module owns only byte I/O.
//!
//! A dropped packet is reported as sent in full. The sender's
//! retransmission timer is the only thing that notices.

use std::io;
use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use socket2::{Domain, Protocol, SockAddr, SockRef, Socket, Type};
use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::config::{NetworkConfig, MAX_UDP_PAYLOAD};
use crate::simulator::{Fate, FaultModel};
use crate::RdtError;

/// Datagram counters kept by a [`UdtSocket`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChannelStats {
    /// Datagrams handed to the OS (corrupted ones included).
    pub sent: u64,
    /// Datagrams swallowed by the simulated loss.
    pub dropped: u64,
    /// Datagrams transmitted with a damaged byte.
    pub corrupted: u64,
}

/// A UDP socket with simulated loss and corruption on the sending edge.
#[derive(Debug)]
pub struct UdtSocket {
    inner: UdpSocket,
    faults: FaultModel,
    stats: ChannelStats,
}

impl UdtSocket {
    /// Create an unbound IPv4 datagram socket.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn create(config: &NetworkConfig) -> io::Result<Self> {
        let raw = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
        raw.set_nonblocking(true)?;
        let inner = UdpSocket::from_std(raw.into())?;
        Ok(Self {
            inner,
            faults: FaultModel::new(config),
            stats: ChannelStats::default(),
        })
    }

    /// Bind to `port` on all local interfaces. Port 0 picks an ephemeral port.
    pub fn bind(&self, port: u16) -> io::Result<()> {
        let addr = SocketAddr::from((Ipv4Addr::UNSPECIFIED, port));
        SockRef::from(&self.inner).bind(&SockAddr::from(addr))
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.inner.local_addr()
    }

    pub fn stats(&self) -> ChannelStats {
        self.stats
    }

    /// Send `datagram` to `peer` through the fault model.
    ///
    /// Returns the number of bytes the caller should consider sent.
    pub async fn send(
        &mut self,
        peer: Option<SocketAddr>,
        datagram: &[u8],
    ) -> Result<usize, RdtError> {
        let peer = peer.ok_or(RdtError::NoPeerAddress)?;

        match self.faults.judge(datagram) {
            Fate::Drop => {
                log::warn!("[udt] packet lost in unreliable layer");
                self.stats.dropped += 1;
                Ok(datagram.len())
            }
            Fate::Corrupt(damaged) => {
                log::warn!("[udt] packet corrupted in unreliable layer");
                self.stats.corrupted += 1;
                self.stats.sent += 1;
                Ok(self.inner.send_to(&damaged, peer).await?)
            }
            Fate::Pass => {
                self.stats.sent += 1;
                Ok(self.inner.send_to(datagram, peer).await?)
            }
        }
    }

    /// Receive one datagram of at most `max_len` bytes.
    ///
    /// Longer datagrams are truncated; the sender's address is discarded.
    /// `max_len` is capped at [`MAX_UDP_PAYLOAD`].
    pub async fn recv(&self, max_len: usize) -> io::Result<Vec<u8>> {
        let mut buf = vec![0u8; max_len.min(MAX_UDP_PAYLOAD)];
        let (n, _from) = self.inner.recv_from(&mut buf).await?;
        buf.truncate(n);
        Ok(buf)
    }

    /// Like [`recv`](Self::recv), but gives up after `wait` of silence.
    ///
    /// Returns `Ok(None)` when nothing arrived in time.
    pub async fn recv_timeout(&self, max_len: usize, wait: Duration) -> io::Result<Option<Vec<u8>>> {
        match timeout(wait, self.recv(max_len)).await {
            Ok(result) => result.map(Some),
            Err(_elapsed) => Ok(None),
        }
    }
}
