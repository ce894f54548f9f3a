//! Protocol constants and runtime knobs.
//!
//! Constants here are part of the wire and signing format: changing one
//! changes every transaction identifier and every signature the crate
//! produces.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Smallest units (sompi) in one HTN.
pub const SOMPI_PER_HTN: u64 = 100_000_000;

/// Number of fractional digits in a display amount.
pub const HTN_DECIMALS: usize = 8;

/// Highest transaction version this crate produces and accepts.
pub const TX_VERSION: u16 = 0;

/// Native subnetwork: plain value transfers.
pub const SUBNETWORK_ID_NATIVE: [u8; 20] = [0u8; 20];

/// Length of a subnetwork identifier.
pub const SUBNETWORK_ID_SIZE: usize = 20;

/// Sign every input and every output.
pub const SIG_HASH_ALL: u8 = 0x01;

/// Domain key for every hash that feeds a signature.
pub const SIGNING_DOMAIN: &[u8] = b"TransactionSigningHash";

pub const DEFAULT_SEQUENCE: u64 = 0;
pub const DEFAULT_SIG_OP_COUNT: u8 = 1;

/// Script version of every standard locking script.
pub const SCRIPT_VERSION: u16 = 0;

pub const DEFAULT_MAX_RECONNECT_ATTEMPTS: u32 = 5;
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2_000;
pub const DEFAULT_MAX_RECONNECT_DELAY_MS: u64 = 60_000;
pub const DEFAULT_MAX_SUBSCRIBED_ADDRESSES: usize = 1_000;

/// Knobs for [`crate::rpc::UtxoStreamManager`].
///
/// Missing fields fall back to their defaults when deserialized, so a
/// partial config object is valid.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StreamConfig {
    pub max_reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
    pub max_reconnect_delay_ms: u64,
    pub max_subscribed_addresses: usize,
}

impl StreamConfig {
    /// Delay before reconnect attempt `attempt` (1-based). Doubles per
    /// attempt and saturates at `max_reconnect_delay_ms`.
    pub fn reconnect_delay(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(32);
        let ms = self
            .reconnect_delay_ms
            .saturating_mul(1u64 << exponent)
            .min(self.max_reconnect_delay_ms.max(self.reconnect_delay_ms));
        Duration::from_millis(ms)
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_reconnect_attempts: DEFAULT_MAX_RECONNECT_ATTEMPTS,
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            max_reconnect_delay_ms: DEFAULT_MAX_RECONNECT_DELAY_MS,
            max_subscribed_addresses: DEFAULT_MAX_SUBSCRIBED_ADDRESSES,
        }
    }
}
