//! Resolver configuration.

use std::time::Duration;

use alloy::primitives::Address;

use crate::ext::{FeeBump, MULTICALL3_ADDRESS};

/// Number of confirmations awaited on created entries (default: 6).
pub const DEFAULT_CONFIRMATIONS: u64 = 6;

/// Configuration for one registry client.
#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Registry contract address
    pub registry: Address,
    /// Multicall3 contract used for batched reads
    pub multicall: Address,
    /// Confirmations awaited by `PendingCreation::confirmations()` (default: 6)
    pub confirmations: u64,
    /// Fee bump applied after simulation (default: 12/10)
    pub fee_bump: FeeBump,
    /// Probe the version again before every write (default: true)
    pub revalidate_writes: bool,
    /// Prefix of the throwaway badge name used by the simulation probe
    pub probe_name_prefix: String,
    /// Timeout for confirmation waits (default: none)
    pub receipt_timeout: Option<Duration>,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            registry: Address::ZERO,
            multicall: MULTICALL3_ADDRESS,
            confirmations: DEFAULT_CONFIRMATIONS,
            fee_bump: FeeBump::default(),
            revalidate_writes: true,
            probe_name_prefix: "__probe_".to_string(),
            receipt_timeout: None,
        }
    }
}

impl ResolverConfig {
    pub fn new(registry: Address) -> Self {
        Self {
            registry,
            ..Default::default()
        }
    }

    pub fn with_multicall(mut self, multicall: Address) -> Self {
        self.multicall = multicall;
        self
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn with_fee_bump(mut self, fee_bump: FeeBump) -> Self {
        self.fee_bump = fee_bump;
        self
    }

    /// Reuse the cached version for writes instead of probing again
    pub fn with_revalidate_writes(mut self, enabled: bool) -> Self {
        self.revalidate_writes = enabled;
        self
    }

    pub fn with_probe_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.probe_name_prefix = prefix.into();
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Duration) -> Self {
        self.receipt_timeout = Some(timeout);
        self
    }
}
