//! Registry facade.
//!
//! `BadgeRegistry` binds one registry address to a shared `VersionCache` and
//! wires prober, reader and dispatcher together:
//!
//! ```text
//! list_entries()  ── totalBadges() ──► 0 ─► []            (no probe)
//!                                  └─► n ─► cache.get_or_resolve ─► BatchedReader
//!
//! create_entry()  ── MutationDispatcher (latch, revalidate, simulate, send)
//! ```

use std::sync::Arc;

use alloy::primitives::Address;

use crate::ext::{
    BatchedReader, CallLayer, ContractVersion, ErrorClassifier, HeuristicClassifier,
    MutationDispatcher, PendingCreation, ProbeContext, RegistryEntry, RegistryError,
    ResolverConfig, SignerSession, VersionCache, VersionProber,
};

pub struct BadgeRegistry<L, S> {
    layer: Arc<L>,
    session: Arc<S>,
    cache: Arc<VersionCache>,
    prober: Arc<VersionProber<L>>,
    reader: BatchedReader<L>,
    dispatcher: MutationDispatcher<L, S>,
    config: ResolverConfig,
}

impl<L: CallLayer, S: SignerSession> BadgeRegistry<L, S> {
    pub fn new(
        layer: Arc<L>,
        session: Arc<S>,
        cache: Arc<VersionCache>,
        config: ResolverConfig,
    ) -> Self {
        Self::assemble(layer, session, cache, config, Arc::new(HeuristicClassifier))
    }

    /// Replace the failure classifier used by probing, reads and writes.
    pub fn with_classifier(self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        Self::assemble(self.layer, self.session, self.cache, self.config, classifier)
    }

    fn assemble(
        layer: Arc<L>,
        session: Arc<S>,
        cache: Arc<VersionCache>,
        config: ResolverConfig,
        classifier: Arc<dyn ErrorClassifier>,
    ) -> Self {
        let prober = Arc::new(
            VersionProber::new(layer.clone())
                .with_classifier(classifier.clone())
                .with_probe_name_prefix(config.probe_name_prefix.clone()),
        );
        let reader = BatchedReader::new(layer.clone())
            .with_classifier(classifier)
            .with_multicall(config.multicall);
        let dispatcher = Self::dispatcher_for(&layer, &prober, &cache, &session, &config);

        Self {
            layer,
            session,
            cache,
            prober,
            reader,
            dispatcher,
            config,
        }
    }

    fn dispatcher_for(
        layer: &Arc<L>,
        prober: &Arc<VersionProber<L>>,
        cache: &Arc<VersionCache>,
        session: &Arc<S>,
        config: &ResolverConfig,
    ) -> MutationDispatcher<L, S> {
        MutationDispatcher::new(layer.clone(), prober.clone(), cache.clone(), session.clone())
            .with_fee_bump(config.fee_bump)
            .with_confirmations(config.confirmations)
            .with_revalidate(config.revalidate_writes)
            .with_receipt_timeout(config.receipt_timeout)
    }

    pub fn address(&self) -> Address {
        self.config.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    /// Version stored in the shared cache, without probing.
    pub fn cached_version(&self) -> Option<ContractVersion> {
        self.cache.get(self.address()).map(|resolution| resolution.version)
    }

    pub async fn entry_count(&self) -> Result<u64, RegistryError> {
        let address = RegistryError::require_registry(self.address())?;
        self.prober.entry_count(address).await
    }

    /// Resolved interface version, probing on first use.
    ///
    /// Probing an empty registry needs a connected signer.
    pub async fn version(&self) -> Result<ContractVersion, RegistryError> {
        RegistryError::require_registry(self.address())?;
        if let Some(version) = self.cached_version() {
            return Ok(version);
        }
        let count = self.entry_count().await?;
        self.resolve_for_read(count).await
    }

    /// Every entry in the registry.
    ///
    /// An empty registry returns an empty list without probing.
    pub async fn list_entries(&self) -> Result<Vec<RegistryEntry>, RegistryError> {
        let address = RegistryError::require_registry(self.address())?;
        let count = self.entry_count().await?;
        if count == 0 {
            tracing::debug!(%address, "registry is empty");
            return Ok(Vec::new());
        }

        let version = self.resolve_for_read(count).await?;
        self.reader.list_entries(address, version, count).await
    }

    /// Create a badge through this registry's dispatcher.
    ///
    /// Concurrent calls on the same `BadgeRegistry` share one pending latch;
    /// use `mutation_dispatcher()` for an independent one.
    pub async fn create_entry(
        &self,
        name: &str,
        description: &str,
    ) -> Result<PendingCreation<L>, RegistryError> {
        self.dispatcher
            .create_entry(self.address(), name, description)
            .await
    }

    /// A new dispatcher with its own latch, sharing prober and cache.
    pub fn mutation_dispatcher(&self) -> MutationDispatcher<L, S> {
        Self::dispatcher_for(
            &self.layer,
            &self.prober,
            &self.cache,
            &self.session,
            &self.config,
        )
    }

    async fn resolve_for_read(&self, count: u64) -> Result<ContractVersion, RegistryError> {
        let address = self.address();
        let mut ctx = ProbeContext::default().with_entry_count(count);
        // Only needed when count is zero; a missing signer surfaces from the probe
        if let Ok(sender) = self.session.sender() {
            ctx = ctx.with_sender(sender);
        }

        let prober = &self.prober;
        let ctx = &ctx;
        self.cache
            .get_or_resolve(address, || async move {
                prober.resolve_version(address, ctx).await
            })
            .await
    }
}
