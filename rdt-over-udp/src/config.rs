//! Protocol constants and the simulated-network configuration.
//!
//! Every tunable is fixed once when a [`crate::connection::Connection`] is
//! created; nothing here is adjustable per call.

use std::time::Duration;

use thiserror::Error;

/// Largest payload carried by a single DATA packet.
pub const PAYLOAD_MAX: usize = 1000;

/// Byte length of the fixed packet header.
/// type(1) + seq(1) + checksum(2) + length(2)
pub const HEADER_LEN: usize = 6;

const TIMEOUT_MS: u64 = 50;

/// How long the sender waits for an ACK before retransmitting.
pub const TIMEOUT: Duration = Duration::from_millis(TIMEOUT_MS);

/// Silence required before `close` releases the socket.
pub const TWAIT: Duration = Duration::from_millis(10 * TIMEOUT_MS);

/// Largest payload a UDP datagram over IPv4 can carry.
pub const MAX_UDP_PAYLOAD: usize = 65_507;

/// Most segments a single message may span.
///
/// One short of the 8-bit sequence space so a batch never aliases the
/// receiver's re-acknowledgment of the previous batch.
pub const MAX_SEGMENTS: usize = 255;

/// Rejected configuration values.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("loss rate {0} is outside [0, 1]")]
    LossRate(f64),
    #[error("error rate {0} is outside [0, 1]")]
    ErrorRate(f64),
    #[error("window size must be at least 1")]
    ZeroWindow,
}

/// Properties of the underlying (simulated) network.
///
/// All probabilities are in the range `[0.0, 1.0]`.
#[derive(Debug, Clone, PartialEq)]
pub struct NetworkConfig {
    /// Probability that an outbound packet is silently dropped.
    pub loss_rate: f64,
    /// Probability that an outbound packet has one byte corrupted.
    pub error_rate: f64,
    /// Window size W. Logged only; a send batch always spans the whole message.
    pub window_size: usize,
    /// Seed for the fault model; `None` draws from the OS.
    pub seed: Option<u64>,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        // A transparent channel with a stop-and-wait window.
        Self {
            loss_rate: 0.0,
            error_rate: 0.0,
            window_size: 1,
            seed: None,
        }
    }
}

impl NetworkConfig {
    /// Set the properties of the underlying network.
    pub fn new(loss_rate: f64, error_rate: f64, window_size: usize) -> Result<Self, ConfigError> {
        let config = Self {
            loss_rate,
            error_rate,
            window_size,
            seed: None,
        };
        config.validate()?;
        log::info!(
            "Drop rate: {loss_rate}\tError rate: {error_rate}\tWindow size: {window_size}"
        );
        Ok(config)
    }

    /// Fix the fault-model seed so loss and corruption decisions repeat.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.loss_rate) {
            return Err(ConfigError::LossRate(self.loss_rate));
        }
        if !(0.0..=1.0).contains(&self.error_rate) {
            return Err(ConfigError::ErrorRate(self.error_rate));
        }
        if self.window_size == 0 {
            return Err(ConfigError::ZeroWindow);
        }
        Ok(())
    }

    /// Largest message the window nominally covers (`W × PAYLOAD_MAX`).
    pub fn message_limit(&self) -> usize {
        self.window_size * PAYLOAD_MAX
    }
}
