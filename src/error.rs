//! Call failure classification for version detection.
//!
//! The registry exposes no version getter, so the resolver learns which
//! interface is live from how calls fail. This module turns a raw call failure
//! into an `ErrorKind` by pattern matching its symbolic name and message,
//! checking the two interface-mismatch shapes before anything else.
//!
//! Matching is heuristic. Anything that matches neither mismatch shape falls
//! through to a business or infrastructure error and is propagated, never
//! interpreted as a version signal.

use std::fmt;

use alloy::{
    primitives::{hex, Address, Bytes},
    sol_types::{Revert, SolError},
};

use crate::ext::ContractVersion;

// ============================================================================
// Call Error
// ============================================================================

/// A failed contract call as reported by the call layer.
///
/// Carries a symbolic `name` (the error type as the call layer knows it) and a
/// free-text `message`, which is all the classifier looks at. Revert payloads
/// are kept for callers that want to decode them further.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallError {
    name: String,
    message: String,
    revert_data: Option<Bytes>,
}

impl CallError {
    pub fn new(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            message: message.into(),
            revert_data: None,
        }
    }

    /// Return data could not be decoded under the attempted interface.
    pub fn decode(function: &str, err: impl fmt::Display) -> Self {
        Self::new(
            "AbiDecodeError",
            format!("failed to decode {function} function result: {err}"),
        )
    }

    /// The node or transport failed before the contract produced a result.
    pub fn transport(err: impl fmt::Display) -> Self {
        Self::new("TransportError", err.to_string())
    }

    /// Execution reverted with the given revert payload.
    ///
    /// A revert without payload is reported as a missing function selector:
    /// Solidity contracts without a fallback revert that way when called with
    /// a selector they do not implement.
    pub fn reverted(data: Option<Bytes>) -> Self {
        let data = data.filter(|d| !d.is_empty());
        let Some(data) = data else {
            return Self::new(
                "FunctionNotFoundError",
                "function selector not found: execution reverted without data",
            );
        };

        let message = match Revert::abi_decode(&data) {
            Ok(revert) => format!("contract function reverted: {}", revert.reason),
            Err(_) => format!(
                "contract function reverted with custom error 0x{}",
                hex::encode(&data[..data.len().min(4)])
            ),
        };

        Self {
            name: "ContractFunctionRevertedError".to_string(),
            message,
            revert_data: Some(data),
        }
    }

    /// Execution reverted with a plain `Error(string)` reason.
    pub fn revert_reason(reason: &str) -> Self {
        let revert = Revert {
            reason: reason.to_string(),
        };
        Self::reverted(Some(revert.abi_encode().into()))
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn revert_data(&self) -> Option<&Bytes> {
        self.revert_data.as_ref()
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)
    }
}

impl std::error::Error for CallError {}

// ============================================================================
// Error Classification Types
// ============================================================================

/// Classified call failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A response arrived but could not be decoded under the attempted interface
    DecodeMismatch,
    /// The target has no function matching the attempted signature
    SelectorMismatch,
    /// Deliberate contract revert (validation failure and the like)
    BusinessError,
    /// Network or RPC failure
    InfrastructureError,
}

impl ErrorKind {
    /// Check if this failure indicates the wrong interface was used.
    pub fn is_interface_mismatch(&self) -> bool {
        matches!(self, ErrorKind::DecodeMismatch | ErrorKind::SelectorMismatch)
    }
}

/// Pluggable failure classifier.
///
/// Implementations must fail open: a failure they cannot place must come back
/// as `BusinessError` or `InfrastructureError`, never as a mismatch kind.
pub trait ErrorClassifier: Send + Sync {
    fn classify(&self, error: &CallError) -> ErrorKind;
}

/// Substring-based classifier matching the error names and messages produced
/// by common EVM client stacks.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicClassifier;

impl ErrorClassifier for HeuristicClassifier {
    fn classify(&self, error: &CallError) -> ErrorKind {
        let name = error.name().to_lowercase();
        let message = error.message().to_lowercase();

        if is_decode_mismatch(&name, &message) {
            return ErrorKind::DecodeMismatch;
        }

        if is_selector_mismatch(&name, &message) {
            return ErrorKind::SelectorMismatch;
        }

        if name.contains("revert") || message.contains("revert") {
            return ErrorKind::BusinessError;
        }

        ErrorKind::InfrastructureError
    }
}

// ============================================================================
// Error Classification Functions
// ============================================================================

/// Classify an optional call failure; `None` means the call succeeded.
pub fn classify_call_error(error: Option<&CallError>) -> Option<ErrorKind> {
    error.map(|e| HeuristicClassifier.classify(e))
}

fn is_decode_mismatch(name: &str, message: &str) -> bool {
    name.contains("positionoutofbounds")
        || name.contains("decodefunctionresult")
        || name.contains("abidecode")
        || (name.contains("contractfunctionexecution")
            && (message.contains("decode") || message.contains("position")))
        || (message.contains("decode") && (message.contains("function") || message.contains("abi")))
        || (message.contains("position") && message.contains("out of bounds"))
}

fn is_selector_mismatch(name: &str, message: &str) -> bool {
    name.contains("functionnotfound")
        || name.contains("functionselector")
        || (message.contains("function")
            && (message.contains("not found") || message.contains("selector")))
        || (message.contains("selector") && message.contains("not found"))
}

// ============================================================================
// Registry Error
// ============================================================================

/// Error type for every resolver, reader and dispatcher operation.
///
/// Cloneable so that all callers waiting on one in-flight resolution receive
/// the same failure.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RegistryError {
    /// Missing signer, chain id or registry address. Not retried.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The contract rejected the call.
    #[error("contract rejected the call: {0}")]
    Business(CallError),

    /// Network or RPC failure. Callers may retry.
    #[error("rpc failure: {0}")]
    Infrastructure(CallError),

    /// An interface mismatch outside of a version decision point.
    #[error("interface mismatch ({kind:?}) on {version} encoding: {source}")]
    InterfaceMismatch {
        kind: ErrorKind,
        version: ContractVersion,
        source: CallError,
    },

    /// An operation needed a concrete version but got `Unknown`.
    #[error("contract version for {0} is not resolved")]
    UnresolvedVersion(Address),

    /// The dispatcher latch rejected a second concurrent operation.
    #[error("previous operation still pending, please wait")]
    OperationPending,
}

impl RegistryError {
    /// Wrap a call failure according to its classification.
    pub fn classified(kind: ErrorKind, version: ContractVersion, error: CallError) -> Self {
        match kind {
            ErrorKind::BusinessError => RegistryError::Business(error),
            ErrorKind::InfrastructureError => RegistryError::Infrastructure(error),
            ErrorKind::DecodeMismatch | ErrorKind::SelectorMismatch => {
                RegistryError::InterfaceMismatch {
                    kind,
                    version,
                    source: error,
                }
            }
        }
    }

    /// The underlying call failure, if this error came from a contract call.
    pub fn call_error(&self) -> Option<&CallError> {
        match self {
            RegistryError::Business(e) | RegistryError::Infrastructure(e) => Some(e),
            RegistryError::InterfaceMismatch { source, .. } => Some(source),
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, RegistryError::Configuration(_))
    }

    /// Reject the zero address before it reaches the network.
    pub fn require_registry(address: Address) -> Result<Address, RegistryError> {
        if address == Address::ZERO {
            return Err(RegistryError::Configuration(
                "missing registry address".to_string(),
            ));
        }
        Ok(address)
    }
}
