//! # badge-registry-ext
//!
//! Version-adaptive client for the badge registry contract, built on Alloy.
//!
//! The registry was deployed in two wire-incompatible shapes and exposes no
//! version getter:
//!
//! - **V1**: `getBadgeAt` returns `(bytes32, bytes32, address)`, `createBadge(bytes32, bytes32)`
//! - **V2**: `getBadgeAt` returns `(bytes32, bytes, address)`, `createBadge(bytes32, bytes)`
//!
//! ## Core Features
//!
//! - **Version Probing**: One diagnostic read or simulated write decides which interface is live
//! - **Error Classification**: Tells ABI mismatches apart from validation reverts and RPC failures
//! - **Version Cache**: Resolves each address once, collapsing concurrent probes into one
//! - **Batched Reads**: All entries fetched in a single Multicall3 round-trip
//! - **Guarded Writes**: Simulate, bump fees by 20%, send, then track confirmations
//!
//! ## Usage
//!
//! ```ignore
//! use badge_registry_ext::ext::*;
//!
//! let provider = RegistryProvider::with_http(rpc_url).await?.with_signer(signer);
//! let provider = Arc::new(provider);
//! let cache = Arc::new(VersionCache::new());
//! let registry = BadgeRegistry::new(
//!     provider.clone(),
//!     provider,
//!     cache,
//!     ResolverConfig::new(registry_address),
//! );
//!
//! let entries = registry.list_entries().await?;
//! let mut pending = registry.create_entry("Builder", "Shipped a feature").await?;
//! let receipt = pending.confirmations().await?;
//! ```

// ============================================================================
// Internal Module Declarations
// ============================================================================

/// Solidity bindings for both registry interfaces and Multicall3
mod abi;

/// Version cache with per-address in-flight guard
mod cache;

/// Contract call layer abstraction consumed by the resolver
mod call_layer;

/// Resolver configuration
mod config;

/// Mutation dispatcher for guarded entry creation
mod dispatcher;

/// Fixed/variable-length encodings and per-version codecs
mod encoding;

/// Call error classification and the crate error type
mod error;

/// Fee bump applied to simulated requests before sending
mod gas;

/// Submitted transaction handle with confirmation tracking
mod pending_tx;

/// Version prober and its two probe strategies
mod prober;

/// Alloy-backed call layer implementation
mod provider;

/// Batched registry reader
mod reader;

/// Registry facade wiring prober, cache, reader and dispatcher
mod registry;

/// Signer/session collaborator
mod session;

/// Contract version types
mod version;

/// Test harness module (compiled only in test mode)
#[cfg(test)]
pub mod test_harness;

// ============================================================================
// Public Exports
// ============================================================================

/// Re-export of the alloy crate so callers can build addresses, signers and
/// providers without a separate dependency.
pub use alloy;

/// Extension module containing the full public API:
///
/// - `BadgeRegistry` - Registry facade
/// - `VersionProber` / `ProbeStrategy` - Version detection
/// - `VersionCache` - Process-wide version memoization
/// - `BatchedReader` - Multicall entry listing
/// - `MutationDispatcher` - Simulate-then-send entry creation
/// - `ErrorClassifier` / `HeuristicClassifier` - Failure classification
/// - `RegistryProvider` - Alloy call layer
pub mod ext {
    pub use super::abi::*;
    pub use super::cache::*;
    pub use super::call_layer::*;
    pub use super::config::*;
    pub use super::dispatcher::*;
    pub use super::encoding::*;
    pub use super::error::*;
    pub use super::gas::*;
    pub use super::pending_tx::*;
    pub use super::prober::*;
    pub use super::provider::*;
    pub use super::reader::*;
    pub use super::registry::*;
    pub use super::session::*;
    pub use super::version::*;
}
