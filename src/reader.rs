//! Batched registry reader.

use std::sync::Arc;

use alloy::primitives::Address;

use crate::ext::{
    CallError, CallLayer, ContractVersion, ErrorClassifier, HeuristicClassifier, RegistryCodec,
    RegistryEntry, RegistryError, MULTICALL3_ADDRESS,
};

/// Fetches registry entries in a single batched call.
///
/// Every entry of one batch is decoded with the same codec; a version is never
/// mixed within a batch.
pub struct BatchedReader<L> {
    layer: Arc<L>,
    classifier: Arc<dyn ErrorClassifier>,
    multicall: Address,
}

impl<L: CallLayer> BatchedReader<L> {
    pub fn new(layer: Arc<L>) -> Self {
        Self {
            layer,
            classifier: Arc::new(HeuristicClassifier),
            multicall: MULTICALL3_ADDRESS,
        }
    }

    pub fn with_multicall(mut self, multicall: Address) -> Self {
        self.multicall = multicall;
        self
    }

    pub fn with_classifier(mut self, classifier: Arc<dyn ErrorClassifier>) -> Self {
        self.classifier = classifier;
        self
    }

    /// Read entries `0..count` of the registry at `address`.
    ///
    /// All-or-nothing: one failing read or undecodable entry fails the call.
    pub async fn list_entries(
        &self,
        address: Address,
        version: ContractVersion,
        count: u64,
    ) -> Result<Vec<RegistryEntry>, RegistryError> {
        let codec = RegistryCodec::new(version).ok_or(RegistryError::UnresolvedVersion(address))?;
        if count == 0 {
            return Ok(Vec::new());
        }

        let inputs = (0..count).map(|index| codec.get_entry_call(index)).collect();
        tracing::debug!(%address, %version, count, "reading registry entries");

        let results = self
            .layer
            .read_batch(self.multicall, address, inputs)
            .await
            .map_err(|e| self.classify(version, e))?;

        if results.len() as u64 != count {
            let err = CallError::decode(
                "getBadgeAt",
                format!("batch returned {} results for {} reads", results.len(), count),
            );
            return Err(self.classify(version, err));
        }

        results
            .iter()
            .map(|data| codec.decode_entry(data))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| self.classify(version, e))
    }

    fn classify(&self, version: ContractVersion, error: CallError) -> RegistryError {
        let kind = self.classifier.classify(&error);
        RegistryError::classified(kind, version, error)
    }
}
