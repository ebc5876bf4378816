//! Contract call layer consumed by the resolver.
//!
//! Everything above this trait works on raw calldata and return bytes, so the
//! version-specific codecs stay in one place and the network side can be
//! swapped (alloy provider in production, in-memory registry in tests).

use alloy::primitives::{Address, Bytes, B256};
use async_trait::async_trait;

use crate::ext::CallError;

/// Sender identity used for simulation and sending.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SenderContext {
    pub account: Address,
    pub chain_id: u64,
}

/// A simulated state-changing call, ready to be sent.
///
/// Gas and fee fields come from the simulation and are adjusted by the
/// dispatcher's `FeeBump` before `CallLayer::send`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub to: Address,
    pub from: Address,
    pub chain_id: u64,
    pub input: Bytes,
    pub gas_limit: u64,
    pub max_fee_per_gas: u128,
    pub max_priority_fee_per_gas: u128,
}

/// Receipt of a confirmed transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxReceipt {
    pub tx_hash: B256,
    pub block_number: Option<u64>,
    /// `true` if execution succeeded
    pub status: bool,
    pub gas_used: u64,
    /// Confirmations the receipt was awaited for
    pub confirmations: u64,
}

#[async_trait]
pub trait CallLayer: Send + Sync {
    /// `eth_call` against `to`, returning raw return data.
    async fn read(&self, to: Address, input: Bytes) -> Result<Bytes, CallError>;

    /// Issue all reads against `to` in one batched call through the
    /// aggregator at `multicall`.
    ///
    /// All-or-nothing: if any sub-call fails the whole batch fails and no
    /// partial results are returned.
    async fn read_batch(
        &self,
        multicall: Address,
        to: Address,
        inputs: Vec<Bytes>,
    ) -> Result<Vec<Bytes>, CallError>;

    /// Dry-run a state-changing call with the exact sender and chain.
    async fn simulate(
        &self,
        to: Address,
        input: Bytes,
        sender: SenderContext,
    ) -> Result<PreparedRequest, CallError>;

    /// Broadcast a prepared request, returning the transaction hash.
    async fn send(&self, request: PreparedRequest) -> Result<B256, CallError>;

    /// Wait until `tx_hash` has `confirmations` confirmations.
    async fn wait_for_confirmations(
        &self,
        tx_hash: B256,
        confirmations: u64,
    ) -> Result<TxReceipt, CallError>;
}
