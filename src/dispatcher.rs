//! Mutation dispatcher for guarded entry creation.
//!
//! ## Flow
//!
//! ```text
//! create_entry(name, description)
//!   │
//!   ├─► registry address is non-zero                  ──► Configuration
//!   ├─► latch (one in-flight creation per dispatcher) ──► OperationPending
//!   ├─► session.sender()                               ──► Configuration
//!   ├─► totalBadges() + version (revalidated by default)
//!   ├─► simulate createBadge with the resolved codec
//!   ├─► FeeBump::apply (gas limit, max fee, priority fee)
//!   └─► send ──► PendingCreation
//! ```
//!
//! The latch is released as soon as `send` returns or any earlier step fails.
//! Confirmation waiting happens on the returned handle and does not hold it.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Duration,
};

use alloy::primitives::Address;

use crate::ext::{
    BadgeCreationRequest, CallError, CallLayer, ContractVersion, FeeBump, PendingCreation,
    ProbeContext, RegistryCodec, RegistryError, SignerSession, VersionCache, VersionProber,
    DEFAULT_CONFIRMATIONS,
};

pub struct MutationDispatcher<L, S> {
    layer: Arc<L>,
    prober: Arc<VersionProber<L>>,
    cache: Arc<VersionCache>,
    session: Arc<S>,
    fee_bump: FeeBump,
    confirmations: u64,
    revalidate: bool,
    receipt_timeout: Option<Duration>,
    in_flight: AtomicBool,
}

impl<L: CallLayer, S: SignerSession> MutationDispatcher<L, S> {
    pub fn new(
        layer: Arc<L>,
        prober: Arc<VersionProber<L>>,
        cache: Arc<VersionCache>,
        session: Arc<S>,
    ) -> Self {
        Self {
            layer,
            prober,
            cache,
            session,
            fee_bump: FeeBump::default(),
            confirmations: DEFAULT_CONFIRMATIONS,
            revalidate: true,
            receipt_timeout: None,
            in_flight: AtomicBool::new(false),
        }
    }

    pub fn with_fee_bump(mut self, fee_bump: FeeBump) -> Self {
        self.fee_bump = fee_bump;
        self
    }

    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations;
        self
    }

    pub fn with_revalidate(mut self, revalidate: bool) -> Self {
        self.revalidate = revalidate;
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    /// `true` while a creation is between the latch and `send`.
    pub fn is_pending(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Simulate and send `createBadge` against the registry at `address`.
    ///
    /// Returns once the transaction is broadcast. A second call while one is
    /// still being prepared fails with `OperationPending` without touching
    /// the network.
    pub async fn create_entry(
        &self,
        address: Address,
        name: &str,
        description: &str,
    ) -> Result<PendingCreation<L>, RegistryError> {
        let address = RegistryError::require_registry(address)?;
        let _latch = Latch::acquire(&self.in_flight)?;

        let sender = self.session.sender()?;
        if sender.account == Address::ZERO {
            return Err(RegistryError::Configuration(
                "connected signer has no account address".to_string(),
            ));
        }

        let count = self.prober.entry_count(address).await?;
        let ctx = ProbeContext::default()
            .with_sender(sender)
            .with_entry_count(count);
        let version = self.resolve(address, &ctx).await?;

        let codec = RegistryCodec::new(version).ok_or(RegistryError::UnresolvedVersion(address))?;
        let request = BadgeCreationRequest::new(name, description);
        let input = codec.create_entry_call(&request);

        tracing::debug!(%address, %version, name, "simulating badge creation");
        let prepared = self
            .layer
            .simulate(address, input, sender)
            .await
            .map_err(|e| self.classify(version, e))?;

        let prepared = self.fee_bump.apply(prepared);
        let tx_hash = self
            .layer
            .send(prepared)
            .await
            .map_err(|e| self.classify(version, e))?;

        tracing::info!(%address, %version, %tx_hash, name, "badge creation submitted");

        Ok(PendingCreation::new(
            self.layer.clone(),
            tx_hash,
            address,
            version,
            self.confirmations,
            self.receipt_timeout,
        ))
    }

    async fn resolve(
        &self,
        address: Address,
        ctx: &ProbeContext,
    ) -> Result<ContractVersion, RegistryError> {
        let prober = &self.prober;
        let probe = || async move { prober.resolve_version(address, ctx).await };
        if self.revalidate {
            self.cache.revalidate(address, probe).await
        } else {
            self.cache.get_or_resolve(address, probe).await
        }
    }

    fn classify(&self, version: ContractVersion, error: CallError) -> RegistryError {
        let kind = self.prober.classifier().classify(&error);
        RegistryError::classified(kind, version, error)
    }
}

/// Held for the duration of one `create_entry` preparation.
struct Latch<'a>(&'a AtomicBool);

impl<'a> Latch<'a> {
    fn acquire(flag: &'a AtomicBool) -> Result<Self, RegistryError> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .map_err(|_| RegistryError::OperationPending)?;
        Ok(Self(flag))
    }
}

impl Drop for Latch<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}
