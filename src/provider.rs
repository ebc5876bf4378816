//! Alloy-backed call layer.
//!
//! `RegistryProvider` implements `CallLayer` and `SignerSession` on top of an
//! alloy HTTP provider, optionally joined with a local signer.
//!
//! ## Architecture
//!
//! ```text
//! RegistryProvider (enum)
//! ├── Http: read-only provider (reads, batched reads, simulation)
//! └── Wallet: Http plus WalletFiller<EthereumWallet> for sending
//!
//! Fillers Stack:
//! ├── ChainIdFiller: Sets chain_id
//! ├── NonceFiller<CachedNonceManager>: Assigns nonces
//! └── WalletFiller<EthereumWallet>: Signs transactions (Wallet variant only)
//! ```
//!
//! Gas limit and EIP-1559 fees come from `simulate` and are bumped by the
//! dispatcher, so no gas filler is installed.
//!
//! There is no receipt timeout here. `PendingCreation` bounds the wait with
//! `ResolverConfig::receipt_timeout`.
//!
//! Transport failures are mapped into `CallError`. JSON-RPC error responses
//! carrying revert data (or mentioning a revert) become revert errors so the
//! classifier can tell selector mismatches and validation reverts apart from
//! node failures.

use alloy::{
    network::{Ethereum, EthereumWallet, NetworkWallet, ReceiptResponse, TransactionBuilder},
    primitives::{Address, Bytes, B256},
    providers::{
        fillers::{
            CachedNonceManager, ChainIdFiller, FillProvider, JoinFill, NonceFiller, WalletFiller,
        },
        Identity, PendingTransactionBuilder, PendingTransactionError, Provider, ProviderBuilder,
        RootProvider,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
    sol_types::SolCall,
    transports::{RpcError, TransportError},
};
use async_trait::async_trait;

use crate::ext::{
    CallError, CallLayer, IMulticall3, PreparedRequest, SenderContext, SignerSession, TxReceipt,
};

/// Read provider with chain ID and nonce fillers
pub type BasicProvider =
    JoinFill<JoinFill<Identity, ChainIdFiller>, NonceFiller<CachedNonceManager>>;

type WalletProvider =
    FillProvider<JoinFill<BasicProvider, WalletFiller<EthereumWallet>>, RootProvider>;

// ============================================================================
// RegistryProvider
// ============================================================================

/// A network provider that can optionally include wallet signing capability.
#[derive(Clone)]
pub enum RegistryProvider {
    /// HTTP provider without wallet signing
    Http {
        chain_id: u64,
        provider: FillProvider<BasicProvider, RootProvider>,
    },
    /// Provider with wallet signing
    Wallet {
        chain_id: u64,
        wallet: EthereumWallet,
        base: FillProvider<BasicProvider, RootProvider>,
        provider: WalletProvider,
    },
}

impl RegistryProvider {
    /// Connect to `rpc_url` and fetch its chain id.
    pub async fn with_http(rpc_url: &str) -> anyhow::Result<Self> {
        let http_provider = ProviderBuilder::new()
            .disable_recommended_fillers()
            .filler(ChainIdFiller::default())
            .filler(NonceFiller::new(CachedNonceManager::default()))
            .connect_http(rpc_url.parse()?);
        let chain_id = http_provider.get_chain_id().await?;

        tracing::debug!(chain_id, "connected registry provider");
        Ok(Self::Http {
            chain_id,
            provider: http_provider,
        })
    }

    /// Create a provider with wallet capability for signing transactions.
    pub fn with_signer(&self, signer: PrivateKeySigner) -> Self {
        let wallet = EthereumWallet::new(signer);
        let (chain_id, base) = match self {
            RegistryProvider::Http { chain_id, provider } => (*chain_id, provider.clone()),
            RegistryProvider::Wallet { chain_id, base, .. } => (*chain_id, base.clone()),
        };
        let provider = base.clone().join_with(WalletFiller::new(wallet.clone()));
        RegistryProvider::Wallet {
            chain_id,
            wallet,
            base,
            provider,
        }
    }

    pub fn chain_id(&self) -> u64 {
        match self {
            RegistryProvider::Http { chain_id, .. } => *chain_id,
            RegistryProvider::Wallet { chain_id, .. } => *chain_id,
        }
    }

    /// Signer address, if a signer is attached.
    pub fn from(&self) -> anyhow::Result<Address> {
        match self {
            RegistryProvider::Http { .. } => anyhow::bail!("Provider has no signer"),
            RegistryProvider::Wallet { wallet, .. } => {
                Ok(<EthereumWallet as NetworkWallet<Ethereum>>::default_signer_address(wallet))
            }
        }
    }

    pub fn root(&self) -> &RootProvider {
        self.base().root()
    }

    fn base(&self) -> &FillProvider<BasicProvider, RootProvider> {
        match self {
            RegistryProvider::Http { provider, .. } => provider,
            RegistryProvider::Wallet { base, .. } => base,
        }
    }
}

#[async_trait]
impl CallLayer for RegistryProvider {
    async fn read(&self, to: Address, input: Bytes) -> Result<Bytes, CallError> {
        let tx = TransactionRequest::default().with_to(to).with_input(input);
        self.base().call(tx).await.map_err(call_error)
    }

    async fn read_batch(
        &self,
        multicall: Address,
        to: Address,
        inputs: Vec<Bytes>,
    ) -> Result<Vec<Bytes>, CallError> {
        let calls = inputs
            .into_iter()
            .map(|call_data| IMulticall3::Call3 {
                target: to,
                allowFailure: false,
                callData: call_data,
            })
            .collect();
        let input = IMulticall3::aggregate3Call { calls }.abi_encode();

        let data = self.read(multicall, input.into()).await?;
        let results = IMulticall3::aggregate3Call::abi_decode_returns(&data)
            .map_err(|e| CallError::decode("aggregate3", e))?;

        // allowFailure is false, so the aggregate reverts before any failed
        // sub-call gets here
        results
            .into_iter()
            .map(|result| {
                if result.success {
                    Ok(result.returnData)
                } else {
                    Err(CallError::reverted(Some(result.returnData)))
                }
            })
            .collect()
    }

    async fn simulate(
        &self,
        to: Address,
        input: Bytes,
        sender: SenderContext,
    ) -> Result<PreparedRequest, CallError> {
        if sender.chain_id != self.chain_id() {
            return Err(CallError::new(
                "ChainMismatchError",
                format!(
                    "sender chain {} does not match provider chain {}",
                    sender.chain_id,
                    self.chain_id()
                ),
            ));
        }

        let tx = TransactionRequest::default()
            .with_from(sender.account)
            .with_to(to)
            .with_input(input.clone())
            .with_chain_id(sender.chain_id);

        let provider = self.base();
        provider.call(tx.clone()).await.map_err(call_error)?;
        let gas_limit = provider.estimate_gas(tx).await.map_err(call_error)?;
        let fees = provider.estimate_eip1559_fees().await.map_err(call_error)?;

        Ok(PreparedRequest {
            to,
            from: sender.account,
            chain_id: sender.chain_id,
            input,
            gas_limit,
            max_fee_per_gas: fees.max_fee_per_gas,
            max_priority_fee_per_gas: fees.max_priority_fee_per_gas,
        })
    }

    async fn send(&self, request: PreparedRequest) -> Result<B256, CallError> {
        let RegistryProvider::Wallet { provider, .. } = self else {
            return Err(CallError::new(
                "AccountNotFoundError",
                "cannot send transaction without a signer",
            ));
        };

        let tx = TransactionRequest::default()
            .with_from(request.from)
            .with_to(request.to)
            .with_input(request.input)
            .with_chain_id(request.chain_id)
            .with_gas_limit(request.gas_limit)
            .with_max_fee_per_gas(request.max_fee_per_gas)
            .with_max_priority_fee_per_gas(request.max_priority_fee_per_gas);

        let pending = provider.send_transaction(tx).await.map_err(call_error)?;
        Ok(*pending.tx_hash())
    }

    async fn wait_for_confirmations(
        &self,
        tx_hash: B256,
        confirmations: u64,
    ) -> Result<TxReceipt, CallError> {
        let receipt = PendingTransactionBuilder::new(self.root().clone(), tx_hash)
            .with_required_confirmations(confirmations)
            .get_receipt()
            .await
            .map_err(|e| match e {
                PendingTransactionError::TransportError(e) => call_error(e),
                other => CallError::transport(other),
            })?;

        Ok(TxReceipt {
            tx_hash: receipt.transaction_hash(),
            block_number: receipt.block_number(),
            status: receipt.status(),
            gas_used: receipt.gas_used(),
            confirmations,
        })
    }
}

impl SignerSession for RegistryProvider {
    fn account(&self) -> Option<Address> {
        self.from().ok()
    }

    fn chain_id(&self) -> Option<u64> {
        Some(RegistryProvider::chain_id(self))
    }
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Map a transport failure into a `CallError`.
///
/// Error responses with revert data are decoded as reverts. A response that
/// mentions a revert but carries no data is a data-less revert.
pub fn call_error(err: TransportError) -> CallError {
    match err {
        RpcError::ErrorResp(payload) => {
            let data = payload
                .data
                .as_ref()
                .and_then(|data| serde_json::from_str::<Bytes>(data.get()).ok());
            if data.is_some() || payload.message.to_lowercase().contains("revert") {
                tracing::debug!(code = payload.code, message = %payload.message, "call reverted");
                CallError::reverted(data)
            } else {
                CallError::new("RpcRequestError", payload.message.to_string())
            }
        }
        RpcError::DeserError { err, .. } => {
            CallError::new("RpcDeserializationError", err.to_string())
        }
        other => CallError::transport(other),
    }
}
