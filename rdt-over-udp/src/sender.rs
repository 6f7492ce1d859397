//! Send-side state: sequence numbering and the in-flight batch.
//!
//! A message is split into segments of at most [`PAYLOAD_MAX`] bytes and
//! all of them go out at once as a [`SendBatch`]. ACKs are **cumulative**:
//! an ACK for sequence `k` acknowledges every segment of the batch up to and
//! including `k`. On timeout, the caller retransmits every segment that is
//! still unacknowledged.
//!
//! Sequence numbers are `u8` and wrap. Whether an ACK belongs to the batch is
//! decided by its modular distance from the batch's first sequence number, so
//! a batch that straddles 255 → 0 behaves like any other.
//!
//! This module only manages state; all socket I/O is the caller's
//! responsibility.

use crate::config::{MAX_SEGMENTS, PAYLOAD_MAX};
use crate::packet::Packet;
use crate::RdtError;

/// Number of segments needed to carry `len` bytes.
pub fn segment_count(len: usize) -> usize {
    len.div_ceil(PAYLOAD_MAX)
}

// ---------------------------------------------------------------------------
// Sender
// ---------------------------------------------------------------------------

/// Send-side sequence state for one connection.
#[derive(Debug, Default)]
pub struct Sender {
    /// Sequence number for the next segment transmitted for the first time.
    pub next_seq_num: u8,
}

impl Sender {
    pub fn new(next_seq_num: u8) -> Self {
        Self { next_seq_num }
    }

    /// Frame `message` into a batch and claim its sequence numbers.
    ///
    /// Fails when the message needs more than [`MAX_SEGMENTS`] segments.
    pub fn begin_batch(&mut self, message: &[u8]) -> Result<SendBatch, RdtError> {
        let segments = segment_count(message.len());
        if segments > MAX_SEGMENTS {
            return Err(RdtError::MessageTooLarge { segments });
        }

        let batch = SendBatch::new(self.next_seq_num, message);
        self.next_seq_num = self.next_seq_num.wrapping_add(segments as u8);
        Ok(batch)
    }
}

// ---------------------------------------------------------------------------
// SendBatch
// ---------------------------------------------------------------------------

/// One segment of an in-flight batch.
#[derive(Debug, Clone)]
pub struct BatchEntry {
    pub seq: u8,
    /// The framed packet, kept for retransmission.
    pub bytes: Vec<u8>,
    pub acked: bool,
}

/// What an incoming ACK did to the batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AckOutcome {
    /// The final segment was acknowledged; the message is delivered.
    Complete,
    /// Segments up to the ACKed one are now flagged; count newly flagged.
    Advanced(usize),
    /// The ACK does not belong to this batch.
    Stale,
}

/// The segments of one message, from first transmission until the final ACK.
#[derive(Debug)]
pub struct SendBatch {
    /// Sequence number of the first segment (S).
    pub base: u8,
    entries: Vec<BatchEntry>,
}

impl SendBatch {
    /// Slice `message` into framed segments numbered from `base`.
    pub fn new(base: u8, message: &[u8]) -> Self {
        let entries = message
            .chunks(PAYLOAD_MAX)
            .enumerate()
            .map(|(i, chunk)| {
                let seq = base.wrapping_add(i as u8);
                BatchEntry {
                    seq,
                    bytes: Packet::data(seq, chunk).encode(),
                    acked: false,
                }
            })
            .collect();
        Self { base, entries }
    }

    /// Number of segments (N).
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sequence number of the final segment (S + N - 1).
    pub fn last_seq(&self) -> u8 {
        self.base.wrapping_add(self.entries.len().wrapping_sub(1) as u8)
    }

    pub fn entries(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter()
    }

    /// Segments still awaiting acknowledgement, oldest first.
    pub fn unacked(&self) -> impl Iterator<Item = &BatchEntry> {
        self.entries.iter().filter(|e| !e.acked)
    }

    /// Process an uncorrupted ACK for `seq`.
    pub fn on_ack(&mut self, seq: u8) -> AckOutcome {
        let offset = seq.wrapping_sub(self.base) as usize;
        if offset >= self.entries.len() {
            return AckOutcome::Stale;
        }
        if offset == self.entries.len() - 1 {
            for entry in &mut self.entries {
                entry.acked = true;
            }
            return AckOutcome::Complete;
        }

        let mut newly = 0;
        for entry in &mut self.entries[..=offset] {
            if !entry.acked {
                entry.acked = true;
                newly += 1;
            }
        }
        AckOutcome::Advanced(newly)
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
