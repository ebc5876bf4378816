//! Version prober.
//!
//! Determines which registry interface is deployed at an address by issuing a
//! single diagnostic call under the V2 interface and reading its outcome.
//!
//! ## Strategies
//!
//! ```text
//! totalBadges() ──► count > 0 ──► ReadFirstEntry:   getBadgeAt(0) decoded as V2
//!                  │                  ok → V2, decode mismatch → V1
//!                  │
//!                  └► count == 0 ─► SimulateCreation: createBadge(bytes32, bytes) dry-run
//!                                     ok → V2, selector mismatch → V1
//! ```
//!
//! A write-shaped probe cannot run against a populated registry without
//! risking duplicate-name reverts, and a read-shaped probe has nothing to read
//! in an empty one. Every other failure is propagated; the prober never
//! guesses a version.

use std::sync::Arc;

use alloy::primitives::Address;
use uuid::Uuid;

use crate::ext::{
    decode_total_entries, encode_total_entries, BadgeCreationRequest, CallError,
    CallLayer, ContractVersion, ErrorClassifier, ErrorKind, HeuristicClassifier, RegistryCodec,
    RegistryError, SenderContext,
};

/// Description used for the simulated creation probe
const PROBE_DESCRIPTION: &str = "probe";
/// Hex characters of randomness at the end of every probe name
const PROBE_SUFFIX_LEN: usize = 16;

// ============================================================================
// Probe Types
// ============================================================================

/// Which diagnostic call to issue, chosen by the registry's entry count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeStrategy {
    /// Read entry 0 and decode it under V2
    ReadFirstEntry,
    /// Simulate a V2 `createBadge` with a throwaway name
    SimulateCreation,
}

impl ProbeStrategy {
    pub fn for_entry_count(count: u64) -> Self {
        if count > 0 {
            ProbeStrategy::ReadFirstEntry
        } else {
            ProbeStrategy::SimulateCreation
        }
    }

    /// Map a probe outcome to a version.
    ///
    /// Only the mismatch kind matching this strategy counts as a V1 signal.
    pub fn decide(&self, outcome: ProbeOutcome) -> Result<ContractVersion, RegistryError> {
        let Some(error) = outcome.error else {
            return Ok(ContractVersion::V2);
        };
        let kind = outcome
            .classified_error
            .unwrap_or(ErrorKind::InfrastructureError);

        match (self, kind) {
            (ProbeStrategy::ReadFirstEntry, ErrorKind::DecodeMismatch)
            | (ProbeStrategy::SimulateCreation, ErrorKind::SelectorMismatch) => {
                Ok(ContractVersion::V1)
            }
            _ => Err(RegistryError::classified(kind, ContractVersion::V2, error)),
        }
    }
}

/// Result of one probe call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub succeeded: bool,
    pub classified_error: Option<ErrorKind>,
    /// The raw failure, kept so it can be propagated verbatim
    pub error: Option<CallError>,
}

impl ProbeOutcome {
    pub fn success() -> Self {
        Self {
            succeeded: true,
            classified_error: None,
            error: None,
        }
    }

    pub fn failure(error: CallError, classifier: &dyn ErrorClassifier) -> Self {
        Self {
            succeeded: false,
            classified_error: Some(classifier.classify(&error)),
            error: Some(error),
        }
    }
}

/// Inputs a probe may need beyond the address.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeContext {
    /// Required for the simulation probe
    pub sender: Option<SenderContext>,
    /// Entry count if the caller already has it; queried otherwise
    pub entry_count: Option<u64>,
}

impl ProbeContext {
    pub fn with_sender(mut self, sender: SenderContext) -> Self {
        self.sender = Some(sender);
        self
    }

    pub fn with_entry_count(mut self, count: u64) -> Self {
        self.entry_count = Some(count);
        self
    }
}

// ============================================================================
// VersionProber
// ============================================================================

pub struct VersionProber<L> {
    layer: Arc<L>,
    classifier: Arc<dyn ErrorClassifier>,
    probe_name_prefix: String,
}

impl<L: CallLayer> VersionProber<L> {
    pub fn new(layer: Arc<L>) -> Self {
        Self {
            layer,
            classifier: Arc::new(HeuristicClassifier),
            probe_name_prefix: "__probe_".to_string(),
        }
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_probe_name_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.probe_name_prefix = prefix.into();
        self
    }

    pub fn classifier(&self) -> &Arc<dyn ErrorClassifier> {
        &self.classifier
    }

    /// Query `totalBadges()`. The size query is identical on both versions,
    /// so it is always encoded as V2.
    pub async fn entry_count(&self, address: Address) -> Result<u64, RegistryError> {
        let result = match self.layer.read(address, encode_total_entries()).await {
            Ok(data) => decode_total_entries(&data),
            Err(e) => Err(e),
        };

        result.map_err(|e| {
            let kind = self.classifier.classify(&e);
            RegistryError::classified(kind, ContractVersion::V2, e)
        })
    }

    /// Determine the interface version deployed at `address`.
    pub async fn resolve_version(
        &self,
        address: Address,
        ctx: &ProbeContext,
    ) -> Result<ContractVersion, RegistryError> {
        let count = match ctx.entry_count {
            Some(count) => count,
            None => self.entry_count(address).await?,
        };

        let strategy = ProbeStrategy::for_entry_count(count);
        tracing::debug!(%address, count, ?strategy, "probing registry version");

        let outcome = self.run_probe(strategy, address, ctx).await?;
        let result = strategy.decide(outcome);

        match &result {
            Ok(version) => {
                tracing::info!(%address, %version, ?strategy, "registry version resolved");
            }
            Err(e) => {
                tracing::debug!(%address, ?strategy, error = %e, "version probe failed");
            }
        }
        result
    }

    /// Issue the diagnostic call for `strategy` and classify its outcome.
    pub async fn run_probe(
        &self,
        strategy: ProbeStrategy,
        address: Address,
        ctx: &ProbeContext,
    ) -> Result<ProbeOutcome, RegistryError> {
        match strategy {
            ProbeStrategy::ReadFirstEntry => Ok(self.probe_first_entry(address).await),
            ProbeStrategy::SimulateCreation => {
                let sender = ctx.sender.ok_or_else(|| {
                    RegistryError::Configuration(
                        "empty registry can only be probed with a connected signer".to_string(),
                    )
                })?;
                Ok(self.probe_creation(address, sender).await)
            }
        }
    }

    async fn probe_first_entry(&self, address: Address) -> ProbeOutcome {
        let codec = RegistryCodec::V2;
        let result = match self.layer.read(address, codec.get_entry_call(0)).await {
            Ok(data) => codec.decode_entry(&data).map(|_| ()),
            Err(e) => Err(e),
        };

        match result {
            Ok(()) => ProbeOutcome::success(),
            Err(e) => ProbeOutcome::failure(e, self.classifier.as_ref()),
        }
    }

    async fn probe_creation(&self, address: Address, sender: SenderContext) -> ProbeOutcome {
        let request = BadgeCreationRequest::new(self.probe_name(), PROBE_DESCRIPTION);
        let input = RegistryCodec::V2.create_entry_call(&request);

        match self.layer.simulate(address, input, sender).await {
            Ok(_) => ProbeOutcome::success(),
            Err(e) => ProbeOutcome::failure(e, self.classifier.as_ref()),
        }
    }

    /// A name no real badge uses, so duplicate/empty-name validation cannot
    /// fire on the probe.
    ///
    /// Names are stored as 32-byte labels. The prefix is clamped so the random
    /// suffix always fits.
    fn probe_name(&self) -> String {
        let prefix = &self.probe_name_prefix;
        let mut end = prefix.len().min(32 - PROBE_SUFFIX_LEN);
        while !prefix.is_char_boundary(end) {
            end -= 1;
        }
        let suffix = Uuid::new_v4().simple().to_string();
        format!("{}{}", &prefix[..end], &suffix[..PROBE_SUFFIX_LEN])
    }
}
