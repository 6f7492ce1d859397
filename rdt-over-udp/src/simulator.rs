//! Fault model for the unreliable channel.
//!
//! Real networks drop and damage packets. To exercise the reliability
//! mechanisms without depending on actual network conditions, every
//! outbound datagram passes through a [`FaultModel`] first:
//!
//! | Fault       | Description                                              |
//! |-------------|----------------------------------------------------------|
//! | Packet loss | Drop the packet with probability `loss_rate`.            |
//! | Corruption  | With probability `error_rate`, damage one random byte.   |
//!
//! Loss is checked first; a packet that survives it may still be corrupted.
//! A seeded RNG makes a run reproducible.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::NetworkConfig;

/// What the channel should do with one outbound datagram.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fate {
    /// Transmit unchanged.
    Pass,
    /// Swallow silently.
    Drop,
    /// Transmit this damaged copy instead.
    Corrupt(Vec<u8>),
}

/// Decides the fate of each outbound datagram.
#[derive(Debug)]
pub struct FaultModel {
    loss_rate: f64,
    error_rate: f64,
    rng: StdRng,
}

impl FaultModel {
    pub fn new(config: &NetworkConfig) -> Self {
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Self {
            loss_rate: config.loss_rate,
            error_rate: config.error_rate,
            rng,
        }
    }

    /// Roll the dice for `datagram`.
    pub fn judge(&mut self, datagram: &[u8]) -> Fate {
        if self.rng.random::<f64>() < self.loss_rate {
            return Fate::Drop;
        }
        if self.rng.random::<f64>() < self.error_rate && !datagram.is_empty() {
            let pos = self.rng.random_range(0..datagram.len());
            let mut damaged = datagram.to_vec();
            corrupt_byte(&mut damaged, pos);
            return Fate::Corrupt(damaged);
        }
        Fate::Pass
    }
}

/// Damage the byte at `pos`: subtract 2, or set 254 where that would underflow.
pub fn corrupt_byte(buf: &mut [u8], pos: usize) {
    let val = buf[pos];
    buf[pos] = if val > 1 { val - 2 } else { 254 };
}
