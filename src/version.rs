//! Contract version types.

use std::{fmt, time::Instant};

use alloy::primitives::Address;

/// Interface version of a deployed badge registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ContractVersion {
    /// Not yet determined
    #[default]
    Unknown,
    /// `bytes32` descriptions
    V1,
    /// `bytes` descriptions
    V2,
}

impl ContractVersion {
    /// Check if this is a concrete interface version usable for encoding.
    pub fn is_resolved(&self) -> bool {
        !matches!(self, ContractVersion::Unknown)
    }
}

impl fmt::Display for ContractVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContractVersion::Unknown => f.write_str("unknown"),
            ContractVersion::V1 => f.write_str("v1"),
            ContractVersion::V2 => f.write_str("v2"),
        }
    }
}

/// A successful version determination for one registry address.
///
/// Created by the `VersionCache` on the first successful probe and kept for the
/// lifetime of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionResolution {
    pub address: Address,
    pub version: ContractVersion,
    pub resolved_at: Instant,
}

impl VersionResolution {
    pub fn new(address: Address, version: ContractVersion) -> Self {
        Self {
            address,
            version,
            resolved_at: Instant::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_is_not_resolved() {
        assert!(!ContractVersion::Unknown.is_resolved());
        assert!(ContractVersion::V1.is_resolved());
        assert!(ContractVersion::V2.is_resolved());
        assert_eq!(ContractVersion::default(), ContractVersion::Unknown);
    }

    #[test]
    fn test_display() {
        assert_eq!(ContractVersion::V1.to_string(), "v1");
        assert_eq!(ContractVersion::V2.to_string(), "v2");
    }
}
