//! Handle for a submitted entry creation.
//!
//! `create_entry()` returns as soon as the transaction is broadcast. Waiting
//! for confirmations is a separate step on the returned `PendingCreation`:
//!
//! ```text
//! create_entry() → PendingCreation (Pending)
//!                        │
//!              confirmations() / wait_for(n)
//!                        │
//!                        ▼
//!                  Confirmed(receipt)   (cached, later calls return it)
//! ```
//!
//! Dropping the handle or the waiting future only stops local waiting; the
//! transaction itself is already on the network.

use std::{sync::Arc, time::Duration};

use alloy::primitives::{Address, B256};

use crate::ext::{
    CallError, CallLayer, ContractVersion, ErrorClassifier, HeuristicClassifier, RegistryError,
    TxReceipt,
};

/// Confirmation state of a submitted transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TxState {
    /// Broadcast, receipt not yet fetched
    Pending(B256),
    /// Receipt fetched with the required confirmations
    Confirmed(TxReceipt),
}

impl TxState {
    pub fn is_confirmed(&self) -> bool {
        matches!(self, TxState::Confirmed(_))
    }

    pub fn tx_hash(&self) -> B256 {
        match self {
            TxState::Pending(hash) => *hash,
            TxState::Confirmed(receipt) => receipt.tx_hash,
        }
    }

    pub fn receipt(&self) -> Option<&TxReceipt> {
        match self {
            TxState::Confirmed(r) => Some(r),
            TxState::Pending(_) => None,
        }
    }
}

/// A broadcast `createBadge` transaction.
pub struct PendingCreation<L> {
    layer: Arc<L>,
    state: TxState,
    registry: Address,
    version: ContractVersion,
    required_confirmations: u64,
    timeout: Option<Duration>,
}

impl<L> std::fmt::Debug for PendingCreation<L> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PendingCreation")
            .field("state", &self.state)
            .field("registry", &self.registry)
            .field("version", &self.version)
            .field("required_confirmations", &self.required_confirmations)
            .finish_non_exhaustive()
    }
}

impl<L: CallLayer> PendingCreation<L> {
    pub(crate) fn new(
        layer: Arc<L>,
        tx_hash: B256,
        registry: Address,
        version: ContractVersion,
        required_confirmations: u64,
        timeout: Option<Duration>,
    ) -> Self {
        Self {
            layer,
            state: TxState::Pending(tx_hash),
            registry,
            version,
            required_confirmations,
            timeout,
        }
    }

    pub fn tx_hash(&self) -> B256 {
        self.state.tx_hash()
    }

    pub fn registry(&self) -> Address {
        self.registry
    }

    /// Interface version the transaction was encoded with
    pub fn version(&self) -> ContractVersion {
        self.version
    }

    pub fn state(&self) -> &TxState {
        &self.state
    }

    pub fn is_confirmed(&self) -> bool {
        self.state.is_confirmed()
    }

    /// Wait for the configured number of confirmations (6 by default).
    pub async fn confirmations(&mut self) -> Result<&TxReceipt, RegistryError> {
        self.wait_for(self.required_confirmations).await
    }

    /// Wait for `confirmations` confirmations.
    ///
    /// The receipt is cached after the first successful wait.
    pub async fn wait_for(&mut self, confirmations: u64) -> Result<&TxReceipt, RegistryError> {
        if let TxState::Pending(tx_hash) = self.state {
            let wait = self.layer.wait_for_confirmations(tx_hash, confirmations);
            let result = match self.timeout {
                Some(timeout) => match tokio::time::timeout(timeout, wait).await {
                    Ok(result) => result,
                    Err(_) => Err(CallError::transport(format!(
                        "timed out after {timeout:?} waiting for {confirmations} confirmations"
                    ))),
                },
                None => wait.await,
            };

            let receipt = result.map_err(|e| {
                tracing::warn!(%tx_hash, confirmations, error = %e, "failed to get receipt");
                let kind = HeuristicClassifier.classify(&e);
                RegistryError::classified(kind, self.version, e)
            })?;

            tracing::debug!(
                %tx_hash,
                registry = %self.registry,
                block = ?receipt.block_number,
                status = receipt.status,
                confirmations,
                "badge creation confirmed"
            );
            self.state = TxState::Confirmed(receipt);
        }

        match &self.state {
            TxState::Confirmed(receipt) => Ok(receipt),
            TxState::Pending(_) => unreachable!("state set to confirmed above"),
        }
    }
}
