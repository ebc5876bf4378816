//! Solidity bindings for the badge registry and Multicall3.
//!
//! Both registry versions share the `totalBadges()` and `getBadgeAt(uint256)`
//! selectors, so only the return payload of `getBadgeAt` tells them apart on
//! the read path. `createBadge` changes its parameter types and therefore its
//! selector, which is what the write-path probe relies on.

use alloy::primitives::{address, Address};

alloy::sol! {
    /// Registry interface with fixed 32-byte descriptions.
    #[sol(all_derives)]
    interface BadgeRegistryV1 {
        function totalBadges() external view returns (uint256);
        function getBadgeAt(uint256 index) external view returns (bytes32, bytes32, address);
        function createBadge(bytes32 name, bytes32 description) external;
    }

    /// Registry interface with variable-length descriptions.
    #[sol(all_derives)]
    interface BadgeRegistryV2 {
        function totalBadges() external view returns (uint256);
        function getBadgeAt(uint256 index) external view returns (bytes32, bytes, address);
        function createBadge(bytes32 name, bytes description) external;
    }

    /// Subset of Multicall3 used for batched reads.
    #[sol(all_derives)]
    interface IMulticall3 {
        struct Call3 {
            address target;
            bool allowFailure;
            bytes callData;
        }

        struct CallResult {
            bool success;
            bytes returnData;
        }

        function aggregate3(Call3[] calldata calls) external payable returns (CallResult[] memory returnData);
    }
}

/// Canonical Multicall3 deployment, identical on every major EVM chain.
pub const MULTICALL3_ADDRESS: Address = address!("cA11bde05977b3631167028862bE2a173976CA11");
