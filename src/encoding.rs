//! Text encodings and per-version registry codecs.
//!
//! Names are always fixed 32-byte labels. Descriptions are fixed 32-byte
//! labels on V1 and variable-length bytes on V2. The same helpers are used on
//! the read (decode) and write (encode) paths so both agree on padding and
//! truncation.

use alloy::{
    primitives::{Address, Bytes, B256, U256},
    sol_types::SolCall,
};

use crate::ext::{BadgeRegistryV1, BadgeRegistryV2, CallError, ContractVersion};

// ============================================================================
// Encoding Helpers
// ============================================================================

/// Encode text as a right-padded 32-byte label.
///
/// Text longer than 32 bytes is truncated at the last UTF-8 character
/// boundary that fits.
pub fn to_fixed32(text: &str) -> B256 {
    let mut end = text.len().min(32);
    while !text.is_char_boundary(end) {
        end -= 1;
    }
    B256::right_padding_from(&text.as_bytes()[..end])
}

/// Decode a 32-byte label, trimming the zero padding.
pub fn from_fixed32(label: &B256) -> String {
    let bytes = label.as_slice();
    let end = bytes.iter().rposition(|b| *b != 0).map_or(0, |i| i + 1);
    String::from_utf8_lossy(&bytes[..end]).into_owned()
}

/// Encode text as variable-length bytes.
pub fn to_variable(text: &str) -> Bytes {
    Bytes::copy_from_slice(text.as_bytes())
}

/// Decode variable-length bytes as text.
pub fn from_variable(bytes: &Bytes) -> String {
    String::from_utf8_lossy(bytes).into_owned()
}

// ============================================================================
// Registry Types
// ============================================================================

/// One badge as stored in the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
    pub name: String,
    pub description: String,
    pub owner: Address,
}

/// Caller-supplied input for creating a badge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BadgeCreationRequest {
    pub name: String,
    pub description: String,
}

impl BadgeCreationRequest {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

// ============================================================================
// Size Query
// ============================================================================

/// Calldata for `totalBadges()`. The selector is the same on both versions.
pub fn encode_total_entries() -> Bytes {
    BadgeRegistryV2::totalBadgesCall {}.abi_encode().into()
}

pub fn decode_total_entries(data: &[u8]) -> Result<u64, CallError> {
    let count = BadgeRegistryV2::totalBadgesCall::abi_decode_returns(data)
        .map_err(|e| CallError::decode("totalBadges", e))?;
    u64::try_from(count)
        .map_err(|_| CallError::decode("totalBadges", format!("entry count {count} out of range")))
}

// ============================================================================
// Registry Codec
// ============================================================================

/// Encoder/decoder bound to one concrete interface version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryCodec {
    V1,
    V2,
}

impl RegistryCodec {
    /// Codec for a resolved version; `None` for `Unknown`.
    pub fn new(version: ContractVersion) -> Option<Self> {
        match version {
            ContractVersion::V1 => Some(RegistryCodec::V1),
            ContractVersion::V2 => Some(RegistryCodec::V2),
            ContractVersion::Unknown => None,
        }
    }

    pub fn version(&self) -> ContractVersion {
        match self {
            RegistryCodec::V1 => ContractVersion::V1,
            RegistryCodec::V2 => ContractVersion::V2,
        }
    }

    /// Calldata for `getBadgeAt(index)`.
    pub fn get_entry_call(&self, index: u64) -> Bytes {
        let index = U256::from(index);
        match self {
            RegistryCodec::V1 => BadgeRegistryV1::getBadgeAtCall { index }.abi_encode().into(),
            RegistryCodec::V2 => BadgeRegistryV2::getBadgeAtCall { index }.abi_encode().into(),
        }
    }

    /// Decode `getBadgeAt` return data.
    pub fn decode_entry(&self, data: &[u8]) -> Result<RegistryEntry, CallError> {
        match self {
            RegistryCodec::V1 => {
                let ret = BadgeRegistryV1::getBadgeAtCall::abi_decode_returns(data)
                    .map_err(|e| CallError::decode("getBadgeAt", e))?;
                Ok(RegistryEntry {
                    name: from_fixed32(&ret._0),
                    description: from_fixed32(&ret._1),
                    owner: ret._2,
                })
            }
            RegistryCodec::V2 => {
                let ret = BadgeRegistryV2::getBadgeAtCall::abi_decode_returns(data)
                    .map_err(|e| CallError::decode("getBadgeAt", e))?;
                Ok(RegistryEntry {
                    name: from_fixed32(&ret._0),
                    description: from_variable(&ret._1),
                    owner: ret._2,
                })
            }
        }
    }

    /// Calldata for `createBadge(name, description)`.
    pub fn create_entry_call(&self, request: &BadgeCreationRequest) -> Bytes {
        let name = to_fixed32(&request.name);
        match self {
            RegistryCodec::V1 => BadgeRegistryV1::createBadgeCall {
                name,
                description: to_fixed32(&request.description),
            }
            .abi_encode()
            .into(),
            RegistryCodec::V2 => BadgeRegistryV2::createBadgeCall {
                name,
                description: to_variable(&request.description),
            }
            .abi_encode()
            .into(),
        }
    }
}
