//! Signer/session collaborator.

use alloy::primitives::Address;

use crate::ext::{RegistryError, SenderContext};

/// Source of the connected account and active chain.
pub trait SignerSession: Send + Sync {
    fn account(&self) -> Option<Address>;
    fn chain_id(&self) -> Option<u64>;

    /// Both values, or a configuration error naming what is missing.
    fn sender(&self) -> Result<SenderContext, RegistryError> {
        let account = self
            .account()
            .ok_or_else(|| RegistryError::Configuration("no connected signer".to_string()))?;
        let chain_id = self
            .chain_id()
            .ok_or_else(|| RegistryError::Configuration("no active chain id".to_string()))?;
        Ok(SenderContext { account, chain_id })
    }
}

/// Fixed session values, for callers that manage the wallet elsewhere.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StaticSession {
    pub account: Option<Address>,
    pub chain_id: Option<u64>,
}

impl StaticSession {
    pub fn new(account: Address, chain_id: u64) -> Self {
        Self {
            account: Some(account),
            chain_id: Some(chain_id),
        }
    }

    /// No signer connected.
    pub fn disconnected() -> Self {
        Self::default()
    }
}

impl SignerSession for StaticSession {
    fn account(&self) -> Option<Address> {
        self.account
    }

    fn chain_id(&self) -> Option<u64> {
        self.chain_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sender_requires_account_and_chain() {
        let account = Address::repeat_byte(0x11);
        let session = StaticSession::new(account, 1);
        assert_eq!(
            session.sender().unwrap(),
            SenderContext {
                account,
                chain_id: 1
            }
        );

        assert!(StaticSession::disconnected().sender().unwrap_err().is_configuration());

        let no_chain = StaticSession {
            account: Some(account),
            chain_id: None,
        };
        assert!(no_chain.sender().unwrap_err().is_configuration());
    }
}
