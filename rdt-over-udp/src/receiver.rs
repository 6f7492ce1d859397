//! Receive-side state machine.
//!
//! [`Receiver`] tracks the next expected sequence number:
//!
//! - Only the **in-order** DATA segment (seq == `expected_seq_num`) is
//!   accepted; it is ACKed with its own sequence number.
//! - Anything else is a duplicate or retransmission and is discarded. The
//!   caller re-sends the ACK for the last accepted segment
//!   (`expected_seq_num - 1`) so a sender whose ACK was lost can move on.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use crate::packet::Packet;

/// Verdict on an inbound DATA segment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    /// In order: deliver the payload and send this ACK.
    Accept(Packet),
    /// Duplicate or out of order: drop the payload, send this ACK.
    Reack(Packet),
}

/// Receive-side state for one connection.
#[derive(Debug, Default)]
pub struct Receiver {
    /// Next sequence number expected from the peer.
    pub expected_seq_num: u8,
}

impl Receiver {
    pub fn new(expected_seq_num: u8) -> Self {
        Self { expected_seq_num }
    }

    /// Process an uncorrupted DATA segment.
    ///
    /// `length` is the segment's length field; the resulting ACK echoes it.
    pub fn on_data(&mut self, seq: u8, length: u16) -> Verdict {
        if seq == self.expected_seq_num {
            self.expected_seq_num = self.expected_seq_num.wrapping_add(1);
            Verdict::Accept(Packet::ack(seq, length))
        } else {
            Verdict::Reack(self.reack(length))
        }
    }

    /// Sequence number of the last accepted segment.
    pub fn last_accepted(&self) -> u8 {
        self.expected_seq_num.wrapping_sub(1)
    }

    /// ACK for the last accepted segment, echoing `length`.
    pub fn reack(&self, length: u16) -> Packet {
        Packet::ack(self.last_accepted(), length)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
