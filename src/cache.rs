//! Version cache with a per-address in-flight guard.
//!
//! Each registry address moves through two slot states:
//!
//! ```text
//!   (absent) ──claim──► Resolving ──ok──► Resolved (kept for the cache lifetime)
//!                           │
//!                           └──err / leader dropped──► (absent, next caller retries)
//! ```
//!
//! The first caller to find a slot absent becomes the leader and runs the
//! resolver. Callers arriving while the slot is `Resolving` subscribe to a
//! `watch` channel and receive exactly what the leader produced, so one probe
//! serves every concurrent caller. Failures are broadcast but never stored.
//!
//! `revalidate` also moves a `Resolved` slot to `Resolving`, but only other
//! revalidators wait on it. `get_or_resolve` keeps answering from the stored
//! resolution until the revalidation settles.

use std::{future::Future, mem};

use alloy::primitives::Address;
use dashmap::{mapref::entry::Entry, DashMap};
use tokio::sync::watch;

use crate::ext::{ContractVersion, RegistryError, VersionResolution};

type Published = Option<Result<ContractVersion, RegistryError>>;

#[derive(Debug)]
enum Slot {
    Resolved(VersionResolution),
    Resolving {
        rx: watch::Receiver<Published>,
        /// Resolution being revalidated, restored if the probe fails
        previous: Option<VersionResolution>,
    },
}

enum Claim {
    Cached(ContractVersion),
    Wait(watch::Receiver<Published>),
    Lead(watch::Sender<Published>, Option<VersionResolution>),
}

// ============================================================================
// VersionCache
// ============================================================================

/// Process-wide memoization of registry address → interface version.
///
/// Construct once and share through `Arc`. There is no invalidation: a
/// registry that changes implementation needs a new cache.
#[derive(Debug, Default)]
pub struct VersionCache {
    slots: DashMap<Address, Slot>,
}

impl VersionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored resolution for `address`, if any.
    pub fn get(&self, address: Address) -> Option<VersionResolution> {
        match self.slots.get(&address)?.value() {
            Slot::Resolved(resolution) => Some(resolution.clone()),
            Slot::Resolving { previous, .. } => previous.clone(),
        }
    }

    /// Number of addresses with a stored resolution.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| {
                matches!(
                    slot.value(),
                    Slot::Resolved(_) | Slot::Resolving { previous: Some(_), .. }
                )
            })
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Return the cached version, or run `resolver` once for all concurrent
    /// callers and cache its success.
    pub async fn get_or_resolve<F, Fut>(
        &self,
        address: Address,
        resolver: F,
    ) -> Result<ContractVersion, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ContractVersion, RegistryError>>,
    {
        self.resolve_with(address, resolver, true).await
    }

    /// Run `resolver` even if a version is cached, still sharing the in-flight
    /// guard with other callers.
    ///
    /// A stored resolution is never replaced. If the fresh probe disagrees
    /// with it, the fresh version is returned and the disagreement logged.
    pub async fn revalidate<F, Fut>(
        &self,
        address: Address,
        resolver: F,
    ) -> Result<ContractVersion, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ContractVersion, RegistryError>>,
    {
        self.resolve_with(address, resolver, false).await
    }

    async fn resolve_with<F, Fut>(
        &self,
        address: Address,
        resolver: F,
        reuse_resolved: bool,
    ) -> Result<ContractVersion, RegistryError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<ContractVersion, RegistryError>>,
    {
        let (tx, previous) = loop {
            match self.claim(address, reuse_resolved) {
                Claim::Cached(version) => return Ok(version),
                Claim::Lead(tx, previous) => break (tx, previous),
                Claim::Wait(mut rx) => {
                    tracing::debug!(%address, "joining in-flight version resolution");
                    let published = match rx.wait_for(Option::is_some).await {
                        Ok(value) => (*value).clone(),
                        Err(_) => None,
                    };
                    if let Some(result) = published {
                        return result;
                    }
                    // Leader dropped before publishing; claim again.
                    tracing::debug!(%address, "in-flight resolution abandoned, retrying");
                }
            }
        };

        let mut flight = InFlight {
            cache: self,
            address,
            tx: Some(tx),
            previous,
        };
        let result = resolver().await;
        flight.publish(&result);
        result
    }

    fn claim(&self, address: Address, reuse_resolved: bool) -> Claim {
        match self.slots.entry(address) {
            Entry::Occupied(mut entry) => {
                let current = match entry.get() {
                    // A revalidation in flight never hides the stored resolution from reads
                    Slot::Resolving {
                        previous: Some(previous),
                        ..
                    } if reuse_resolved => return Claim::Cached(previous.version),
                    Slot::Resolving { rx, .. } => return Claim::Wait(rx.clone()),
                    Slot::Resolved(resolution) => resolution.clone(),
                };
                if reuse_resolved {
                    return Claim::Cached(current.version);
                }
                let (tx, rx) = watch::channel(None);
                entry.insert(Slot::Resolving {
                    rx,
                    previous: Some(current.clone()),
                });
                Claim::Lead(tx, Some(current))
            }
            Entry::Vacant(entry) => {
                let (tx, rx) = watch::channel(None);
                entry.insert(Slot::Resolving { rx, previous: None });
                Claim::Lead(tx, None)
            }
        }
    }
}

// ============================================================================
// InFlight guard
// ============================================================================

/// Leader-side handle for a `Resolving` slot.
///
/// Publishing settles the slot and wakes waiters. Dropping without publishing
/// (the leader's future was cancelled) restores the slot so waiters can claim
/// it again.
struct InFlight<'a> {
    cache: &'a VersionCache,
    address: Address,
    tx: Option<watch::Sender<Published>>,
    previous: Option<VersionResolution>,
}

impl InFlight<'_> {
    fn publish(&mut self, result: &Result<ContractVersion, RegistryError>) {
        let Some(tx) = self.tx.take() else {
            return;
        };

        match (result, self.previous.take()) {
            (Ok(version), Some(previous)) => {
                if previous.version != *version {
                    tracing::warn!(
                        address = %self.address,
                        cached = %previous.version,
                        probed = %version,
                        "registry version changed since it was cached; using probed version"
                    );
                }
                self.cache
                    .slots
                    .insert(self.address, Slot::Resolved(previous));
            }
            (Ok(version), None) => {
                tracing::debug!(address = %self.address, %version, "caching registry version");
                self.cache.slots.insert(
                    self.address,
                    Slot::Resolved(VersionResolution::new(self.address, *version)),
                );
            }
            (Err(_), previous) => self.restore(previous),
        }

        tx.send_replace(Some(result.clone()));
    }

    fn restore(&self, previous: Option<VersionResolution>) {
        match previous {
            Some(previous) => {
                self.cache
                    .slots
                    .insert(self.address, Slot::Resolved(previous));
            }
            None => {
                self.cache.slots.remove(&self.address);
            }
        }
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if self.tx.is_some() {
            let previous = mem::take(&mut self.previous);
            self.restore(previous);
            tracing::debug!(address = %self.address, "version resolution dropped before completion");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    };

    use super::*;
    use crate::ext::CallError;

    fn addr() -> Address {
        Address::repeat_byte(0x42)
    }

    #[tokio::test]
    async fn test_resolves_once_and_caches() {
        let cache = VersionCache::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        for _ in 0..3 {
            let version = cache
                .get_or_resolve(addr(), || async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Ok(ContractVersion::V1)
                })
                .await
                .unwrap();
            assert_eq!(version, ContractVersion::V1);
        }

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(addr()).unwrap().version, ContractVersion::V1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_resolution() {
        let cache = VersionCache::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let resolver = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            tokio::task::yield_now().await;
            Ok(ContractVersion::V2)
        };

        let (a, b, c) = tokio::join!(
            cache.get_or_resolve(addr(), resolver),
            cache.get_or_resolve(addr(), resolver),
            cache.get_or_resolve(addr(), resolver),
        );

        assert_eq!(a.unwrap(), ContractVersion::V2);
        assert_eq!(b.unwrap(), ContractVersion::V2);
        assert_eq!(c.unwrap(), ContractVersion::V2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_shared_but_not_cached() {
        let cache = VersionCache::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        let failing = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Err(RegistryError::Infrastructure(CallError::transport("connection reset")))
        };

        let (a, b) = tokio::join!(
            cache.get_or_resolve(addr(), failing),
            cache.get_or_resolve(addr(), failing),
        );
        assert!(matches!(a, Err(RegistryError::Infrastructure(_))));
        assert!(matches!(b, Err(RegistryError::Infrastructure(_))));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cache.get(addr()).is_none());

        // A later call retries
        let version = cache
            .get_or_resolve(addr(), || async { Ok(ContractVersion::V1) })
            .await
            .unwrap();
        assert_eq!(version, ContractVersion::V1);
    }

    #[tokio::test]
    async fn test_addresses_are_independent() {
        let cache = VersionCache::new();
        let other = Address::repeat_byte(0x43);

        cache
            .get_or_resolve(addr(), || async { Ok(ContractVersion::V1) })
            .await
            .unwrap();
        cache
            .get_or_resolve(other, || async { Ok(ContractVersion::V2) })
            .await
            .unwrap();

        assert_eq!(cache.get(addr()).unwrap().version, ContractVersion::V1);
        assert_eq!(cache.get(other).unwrap().version, ContractVersion::V2);
    }

    #[tokio::test]
    async fn test_dropped_leader_hands_over_to_waiter() {
        let cache = Arc::new(VersionCache::new());
        let (release_tx, release_rx) = tokio::sync::oneshot::channel::<()>();

        // Leader that never finishes on its own
        let leader = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_resolve(addr(), || async move {
                        let _ = release_rx.await;
                        Ok(ContractVersion::V1)
                    })
                    .await
            })
        };
        tokio::task::yield_now().await;

        let waiter = {
            let cache = cache.clone();
            tokio::spawn(async move {
                cache
                    .get_or_resolve(addr(), || async { Ok(ContractVersion::V2) })
                    .await
            })
        };
        tokio::task::yield_now().await;

        leader.abort();
        drop(release_tx);

        let version = waiter.await.unwrap().unwrap();
        assert_eq!(version, ContractVersion::V2);
        assert_eq!(cache.get(addr()).unwrap().version, ContractVersion::V2);
    }

    #[tokio::test]
    async fn test_revalidate_probes_again_but_keeps_resolution() {
        let cache = VersionCache::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;

        cache
            .get_or_resolve(addr(), || async { Ok(ContractVersion::V1) })
            .await
            .unwrap();

        let version = cache
            .revalidate(addr(), || async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(ContractVersion::V2)
            })
            .await
            .unwrap();

        assert_eq!(version, ContractVersion::V2);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(cache.get(addr()).unwrap().version, ContractVersion::V1);
    }

    #[tokio::test]
    async fn test_failed_revalidation_keeps_resolution() {
        let cache = VersionCache::new();
        cache
            .get_or_resolve(addr(), || async { Ok(ContractVersion::V2) })
            .await
            .unwrap();

        let err = cache
            .revalidate(addr(), || async {
                Err(RegistryError::Infrastructure(CallError::transport("timeout")))
            })
            .await;
        assert!(err.is_err());
        assert_eq!(cache.get(addr()).unwrap().version, ContractVersion::V2);
    }

    #[tokio::test]
    async fn test_read_during_failing_revalidation_gets_cached_version() {
        let cache = VersionCache::new();
        let reads = AtomicUsize::new(0);
        let reads = &reads;
        cache
            .get_or_resolve(addr(), || async { Ok(ContractVersion::V1) })
            .await
            .unwrap();

        let (revalidated, read) = tokio::join!(
            cache.revalidate(addr(), || async {
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                Err(RegistryError::Infrastructure(CallError::transport("connection reset")))
            }),
            cache.get_or_resolve(addr(), || async move {
                reads.fetch_add(1, Ordering::SeqCst);
                Ok(ContractVersion::V2)
            }),
        );

        assert!(matches!(revalidated, Err(RegistryError::Infrastructure(_))));
        assert_eq!(read.unwrap(), ContractVersion::V1);
        assert_eq!(reads.load(Ordering::SeqCst), 0);
        assert_eq!(cache.get(addr()).unwrap().version, ContractVersion::V1);
    }

    #[tokio::test]
    async fn test_read_during_disagreeing_revalidation_gets_cached_version() {
        let cache = VersionCache::new();
        cache
            .get_or_resolve(addr(), || async { Ok(ContractVersion::V1) })
            .await
            .unwrap();

        let (revalidated, read) = tokio::join!(
            cache.revalidate(addr(), || async {
                tokio::task::yield_now().await;
                tokio::task::yield_now().await;
                Ok(ContractVersion::V2)
            }),
            cache.get_or_resolve(addr(), || async { Ok(ContractVersion::V2) }),
        );

        assert_eq!(revalidated.unwrap(), ContractVersion::V2);
        assert_eq!(read.unwrap(), ContractVersion::V1);

        let later = cache
            .get_or_resolve(addr(), || async { Ok(ContractVersion::V2) })
            .await
            .unwrap();
        assert_eq!(later, ContractVersion::V1);
    }

    #[tokio::test]
    async fn test_concurrent_revalidations_share_one_probe() {
        let cache = VersionCache::new();
        let calls = AtomicUsize::new(0);
        let calls = &calls;
        cache
            .get_or_resolve(addr(), || async { Ok(ContractVersion::V1) })
            .await
            .unwrap();

        let resolver = || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            tokio::task::yield_now().await;
            Ok(ContractVersion::V1)
        };
        let (a, b) = tokio::join!(
            cache.revalidate(addr(), resolver),
            cache.revalidate(addr(), resolver),
        );

        assert_eq!(a.unwrap(), ContractVersion::V1);
        assert_eq!(b.unwrap(), ContractVersion::V1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
