//! In-memory registry harness.
//!
//! `MockRegistry` implements `CallLayer` for a single registry deployed with
//! either interface version. Return data and calldata go through the real ABI
//! encoders, so decoding V1 data as V2 or calling a V2 selector on a V1
//! registry fails the same way it does on chain.
//!
//! # Example
//!
//! ```ignore
//! let mock = Arc::new(MockRegistry::v1().with_entries(3));
//! mock.fail_next_read(CallError::transport("connection reset"));
//!
//! let prober = VersionProber::new(mock.clone());
//! assert!(prober.resolve_version(mock.address(), &ProbeContext::default()).await.is_err());
//! assert_eq!(mock.stats().count_reads.load(Ordering::SeqCst), 1);
//! ```


use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Mutex,
    },
    time::Duration,
};

use alloy::{
    primitives::{address, keccak256, Address, Bytes, B256, U256},
    sol_types::{SolCall, SolValue},
};
use async_trait::async_trait;

use crate::ext::{
    from_fixed32, from_variable, to_fixed32, to_variable, BadgeRegistryV1, BadgeRegistryV2,
    CallError, CallLayer, ContractVersion, PreparedRequest, RegistryEntry, SenderContext,
    TxReceipt,
};

// ============================================================================
// Call Counters
// ============================================================================

/// Per-method call counters.
#[derive(Debug, Default)]
pub struct MockStats {
    /// `totalBadges()` reads
    pub count_reads: AtomicUsize,
    /// Single `getBadgeAt()` reads
    pub entry_reads: AtomicUsize,
    pub batch_reads: AtomicUsize,
    pub simulations: AtomicUsize,
    pub sends: AtomicUsize,
    pub receipt_waits: AtomicUsize,
}

impl MockStats {
    pub fn total_calls(&self) -> usize {
        [
            &self.count_reads,
            &self.entry_reads,
            &self.batch_reads,
            &self.simulations,
            &self.sends,
            &self.receipt_waits,
        ]
        .iter()
        .map(|counter| counter.load(Ordering::SeqCst))
        .sum()
    }
}

// ============================================================================
// MockRegistry
// ============================================================================

#[derive(Debug, Clone)]
struct MinedTx {
    block_number: u64,
    status: bool,
}

#[derive(Debug, Clone, Copy)]
enum Failure {
    Read,
    EntryRead,
    Simulation,
    Send,
}

#[derive(Debug, Default)]
struct MockState {
    entries: Vec<RegistryEntry>,
    mined: HashMap<B256, MinedTx>,
    last_sent: Option<PreparedRequest>,
    block_number: u64,
    fail_read: Option<CallError>,
    fail_entry_read: Option<CallError>,
    fail_simulation: Option<CallError>,
    fail_send: Option<CallError>,
}

pub struct MockRegistry {
    version: ContractVersion,
    address: Address,
    latency: Option<Duration>,
    state: Mutex<MockState>,
    stats: MockStats,
}

impl MockRegistry {
    pub const SIMULATED_GAS: u64 = 100_000;
    pub const SIMULATED_MAX_FEE: u128 = 2_000_000_000;
    pub const SIMULATED_PRIORITY_FEE: u128 = 1_000_000_000;
    pub const OWNER: Address = address!("aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa");

    fn new(version: ContractVersion) -> Self {
        Self {
            version,
            address: Address::repeat_byte(0x5a),
            latency: None,
            state: Mutex::new(MockState {
                block_number: 1,
                ..Default::default()
            }),
            stats: MockStats::default(),
        }
    }

    /// Registry with fixed 32-byte descriptions.
    pub fn v1() -> Self {
        Self::new(ContractVersion::V1)
    }

    /// Registry with variable-length descriptions.
    pub fn v2() -> Self {
        Self::new(ContractVersion::V2)
    }

    /// Seed `count` entries named `badge-0`, `badge-1`, ...
    pub fn with_entries(mut self, count: usize) -> Self {
        let version = self.version;
        let state = self.state.get_mut().unwrap();
        for index in 0..count {
            let description = Self::description_for(index);
            state.entries.push(RegistryEntry {
                name: format!("badge-{index}"),
                description: Self::stored_description(version, &description),
                owner: Self::OWNER,
            });
        }
        self
    }

    /// Delay every call, to keep operations in flight in concurrency tests.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Description of a seeded entry, longer than 32 bytes.
    pub fn description_for(index: usize) -> String {
        format!("badge {index} description that runs past thirty-two bytes")
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn version(&self) -> ContractVersion {
        self.version
    }

    pub fn stats(&self) -> &MockStats {
        &self.stats
    }

    pub fn entry_count(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub fn entries(&self) -> Vec<RegistryEntry> {
        self.state.lock().unwrap().entries.clone()
    }

    /// Last request passed to `send`.
    pub fn last_sent(&self) -> Option<PreparedRequest> {
        self.state.lock().unwrap().last_sent.clone()
    }

    /// Fail the next `read` or `read_batch` with `error`.
    pub fn fail_next_read(&self, error: CallError) {
        self.state.lock().unwrap().fail_read = Some(error);
    }

    /// Fail the next single `getBadgeAt()` read, leaving size queries alone.
    pub fn fail_next_entry_read(&self, error: CallError) {
        self.state.lock().unwrap().fail_entry_read = Some(error);
    }

    pub fn fail_next_simulation(&self, error: CallError) {
        self.state.lock().unwrap().fail_simulation = Some(error);
    }

    pub fn fail_next_send(&self, error: CallError) {
        self.state.lock().unwrap().fail_send = Some(error);
    }

    fn stored_description(version: ContractVersion, description: &str) -> String {
        match version {
            ContractVersion::V1 => from_fixed32(&to_fixed32(description)),
            _ => description.to_string(),
        }
    }

    async fn delay(&self) {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
    }

    fn take_failure(&self, failure: Failure) -> Result<(), CallError> {
        let mut state = self.state.lock().unwrap();
        let injected = match failure {
            Failure::Read => state.fail_read.take(),
            Failure::EntryRead => state.fail_entry_read.take(),
            Failure::Simulation => state.fail_simulation.take(),
            Failure::Send => state.fail_send.take(),
        };
        injected.map_or(Ok(()), Err)
    }

    /// Answer one view call the way the deployed contract would.
    fn respond(&self, input: &[u8]) -> Result<Bytes, CallError> {
        let state = self.state.lock().unwrap();
        let Some(selector) = input.get(..4) else {
            return Err(CallError::reverted(None));
        };

        if selector == BadgeRegistryV2::totalBadgesCall::SELECTOR {
            return Ok(U256::from(state.entries.len()).abi_encode().into());
        }

        if selector == BadgeRegistryV2::getBadgeAtCall::SELECTOR {
            let call = BadgeRegistryV2::getBadgeAtCall::abi_decode(input)
                .map_err(|e| CallError::decode("getBadgeAt", e))?;
            let entry = usize::try_from(call.index)
                .ok()
                .and_then(|index| state.entries.get(index))
                .ok_or_else(|| CallError::revert_reason("INDEX_OUT_OF_BOUNDS"))?;

            let name = to_fixed32(&entry.name);
            let payload = match self.version {
                ContractVersion::V1 => {
                    (name, to_fixed32(&entry.description), entry.owner).abi_encode_params()
                }
                _ => (name, to_variable(&entry.description), entry.owner).abi_encode_params(),
            };
            return Ok(payload.into());
        }

        Err(CallError::reverted(None))
    }

    /// Decode `createBadge` calldata under this registry's own interface.
    fn decode_creation(&self, input: &[u8]) -> Result<(String, String), CallError> {
        match self.version {
            ContractVersion::V1 => {
                let call = BadgeRegistryV1::createBadgeCall::abi_decode(input)
                    .map_err(|_| CallError::reverted(None))?;
                Ok((from_fixed32(&call.name), from_fixed32(&call.description)))
            }
            _ => {
                let call = BadgeRegistryV2::createBadgeCall::abi_decode(input)
                    .map_err(|_| CallError::reverted(None))?;
                Ok((from_fixed32(&call.name), from_variable(&call.description)))
            }
        }
    }

    fn validate(&self, name: &str) -> Result<(), CallError> {
        if name.is_empty() {
            return Err(CallError::revert_reason("EMPTY_NAME"));
        }
        let state = self.state.lock().unwrap();
        if state.entries.iter().any(|entry| entry.name == name) {
            return Err(CallError::revert_reason("DUPLICATE_NAME"));
        }
        Ok(())
    }
}

#[async_trait]
impl CallLayer for MockRegistry {
    async fn read(&self, _to: Address, input: Bytes) -> Result<Bytes, CallError> {
        let size_query = input.starts_with(&BadgeRegistryV2::totalBadgesCall::SELECTOR);
        if size_query {
            self.stats.count_reads.fetch_add(1, Ordering::SeqCst);
        } else {
            self.stats.entry_reads.fetch_add(1, Ordering::SeqCst);
        }
        self.delay().await;
        self.take_failure(Failure::Read)?;
        if !size_query {
            self.take_failure(Failure::EntryRead)?;
        }
        self.respond(&input)
    }

    async fn read_batch(
        &self,
        _multicall: Address,
        _to: Address,
        inputs: Vec<Bytes>,
    ) -> Result<Vec<Bytes>, CallError> {
        self.stats.batch_reads.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.take_failure(Failure::Read)?;

        // aggregate3 with allowFailure = false reverts as a whole
        inputs
            .iter()
            .map(|input| {
                self.respond(input)
                    .map_err(|_| CallError::revert_reason("Multicall3: call failed"))
            })
            .collect()
    }

    async fn simulate(
        &self,
        to: Address,
        input: Bytes,
        sender: SenderContext,
    ) -> Result<PreparedRequest, CallError> {
        self.stats.simulations.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.take_failure(Failure::Simulation)?;

        let (name, _) = self.decode_creation(&input)?;
        self.validate(&name)?;

        Ok(PreparedRequest {
            to,
            from: sender.account,
            chain_id: sender.chain_id,
            input,
            gas_limit: Self::SIMULATED_GAS,
            max_fee_per_gas: Self::SIMULATED_MAX_FEE,
            max_priority_fee_per_gas: Self::SIMULATED_PRIORITY_FEE,
        })
    }

    async fn send(&self, request: PreparedRequest) -> Result<B256, CallError> {
        self.stats.sends.fetch_add(1, Ordering::SeqCst);
        self.delay().await;
        self.take_failure(Failure::Send)?;

        // Executes on "chain": an invalid call is mined with a failed status
        let created = self
            .decode_creation(&request.input)
            .and_then(|(name, description)| self.validate(&name).map(|_| (name, description)));

        let mut state = self.state.lock().unwrap();
        state.block_number += 1;
        let block_number = state.block_number;
        let tx_hash = keccak256([&request.input[..], &block_number.to_be_bytes()[..]].concat());

        let status = match created {
            Ok((name, description)) => {
                state.entries.push(RegistryEntry {
                    name,
                    description,
                    owner: request.from,
                });
                true
            }
            Err(_) => false,
        };
        state.mined.insert(
            tx_hash,
            MinedTx {
                block_number,
                status,
            },
        );
        state.last_sent = Some(request);
        Ok(tx_hash)
    }

    async fn wait_for_confirmations(
        &self,
        tx_hash: B256,
        confirmations: u64,
    ) -> Result<TxReceipt, CallError> {
        self.stats.receipt_waits.fetch_add(1, Ordering::SeqCst);
        self.delay().await;

        let mined = self
            .state
            .lock()
            .unwrap()
            .mined
            .get(&tx_hash)
            .cloned()
            .ok_or_else(|| CallError::transport(format!("transaction {tx_hash} not found")))?;

        Ok(TxReceipt {
            tx_hash,
            block_number: Some(mined.block_number),
            status: mined.status,
            gas_used: Self::SIMULATED_GAS,
            confirmations,
        })
    }
}
