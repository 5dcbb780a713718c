//! Ethereum JSON-RPC backend built on an alloy provider.
//!
//! Transactions from accounts the node manages (`anvil`, `hardhat node`) go
//! out as `eth_sendTransaction`. Transactions from local signers, such as a
//! deployer key for a hosted endpoint, are signed here and submitted raw.
//! A network without an RPC url gets its own `anvil` process, which lives
//! as long as the backend.

use crate::abi::decode_revert_reason;
use crate::backend::{CallOutput, ChainBackend, Receipt, TransactionRequest};
use crate::config::RpcConfig;
use crate::contract::FUND_ME_ERRORS;
use crate::error::{DeployError, Result};
use crate::network::Network;
use alloy::network::{EthereumWallet, ReceiptResponse, TransactionBuilder};
use alloy::node_bindings::{Anvil, AnvilInstance};
use alloy::primitives::{Address, Bytes, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::client::RpcClient;
use alloy::rpc::types::{TransactionReceipt, TransactionRequest as RpcTransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use alloy::transports::TransportError;
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, trace};

pub struct RpcBackend {
    url: Url,
    provider: DynProvider,
    /// Provider with a wallet of the local signers, if there are any.
    signing_provider: Option<DynProvider>,
    local_accounts: Vec<Address>,
    poll_interval: Duration,
    receipt_timeout: Duration,
    _node: Option<AnvilInstance>,
}

impl RpcBackend {
    pub fn new(url: Url, config: &RpcConfig, signers: Vec<PrivateKeySigner>) -> Self {
        let client = || RpcClient::new_http(url.clone()).with_poll_interval(config.poll_interval);
        let provider = ProviderBuilder::new().connect_client(client()).erased();

        let local_accounts: Vec<Address> = signers.iter().map(PrivateKeySigner::address).collect();
        let signing_provider = match signers.split_first() {
            None => None,
            Some((first, rest)) => {
                let mut wallet = EthereumWallet::from(first.clone());
                for signer in rest {
                    wallet.register_signer(signer.clone());
                }
                Some(
                    ProviderBuilder::new()
                        .wallet(wallet)
                        .connect_client(client())
                        .erased(),
                )
            }
        };

        Self {
            url,
            provider,
            signing_provider,
            local_accounts,
            poll_interval: config.poll_interval,
            receipt_timeout: config.receipt_timeout,
            _node: None,
        }
    }

    /// Connects to the network's RPC endpoint and checks that the node
    /// serves the configured chain.
    pub async fn connect(
        network: &Network,
        config: &RpcConfig,
        signers: Vec<PrivateKeySigner>,
    ) -> Result<Self> {
        let raw = network.url.as_deref().ok_or_else(|| {
            DeployError::ConfigurationError(format!("network '{}' has no RPC url", network.name))
        })?;
        let url: Url = raw.parse().map_err(|e| {
            DeployError::ConfigurationError(format!(
                "network '{}' has an invalid RPC url '{}': {}",
                network.name, raw, e
            ))
        })?;
        let backend = Self::new(url, config, signers);
        backend.check_chain_id(network).await?;
        Ok(backend)
    }

    /// Starts an `anvil` node serving the network's chain id and connects to
    /// it. The node is killed when the backend is dropped.
    pub async fn spawn(
        network: &Network,
        config: &RpcConfig,
        signers: Vec<PrivateKeySigner>,
    ) -> Result<Self> {
        let node = Anvil::new()
            .chain_id(network.chain_id)
            .try_spawn()
            .map_err(|e| {
                DeployError::ConfigurationError(format!(
                    "failed to start a development node for '{}' (is anvil from Foundry installed?): {}",
                    network.name, e
                ))
            })?;
        let mut backend = Self::new(node.endpoint_url(), config, signers);
        backend._node = Some(node);
        backend.check_chain_id(network).await?;
        Ok(backend)
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    async fn check_chain_id(&self, network: &Network) -> Result<()> {
        let node_chain_id = self.chain_id().await?;
        if node_chain_id != network.chain_id {
            return Err(DeployError::ConfigurationError(format!(
                "network '{}' is configured with chain id {} but the node reports {}",
                network.name, network.chain_id, node_chain_id
            )));
        }
        debug!("Connected to {} (chain id {})", self.url, node_chain_id);
        Ok(())
    }

    fn provider_for(&self, from: Address) -> &DynProvider {
        match &self.signing_provider {
            Some(signing) if self.local_accounts.contains(&from) => signing,
            _ => &self.provider,
        }
    }

    /// Polls until the head is `confirmations - 1` blocks past the receipt.
    async fn wait_for_depth(&self, receipt: &Receipt, confirmations: u64) -> Result<()> {
        let target = receipt.block_number + confirmations - 1;
        let wait = async {
            loop {
                let head = self.provider.get_block_number().await?;
                if head >= target {
                    return Ok::<(), DeployError>(());
                }
                trace!(
                    "{} mined in block {}, head {}, waiting for {} confirmations",
                    receipt.transaction_hash,
                    receipt.block_number,
                    head,
                    confirmations
                );
                tokio::time::sleep(self.poll_interval).await;
            }
        };
        match tokio::time::timeout(self.receipt_timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(DeployError::TransactionError(format!(
                "timed out after {} waiting for {} confirmations of {}",
                humantime::format_duration(self.receipt_timeout),
                confirmations,
                receipt.transaction_hash
            ))),
        }
    }
}

fn rpc_request(tx: &TransactionRequest) -> RpcTransactionRequest {
    let request = RpcTransactionRequest::default()
        .with_from(tx.from)
        .with_value(tx.value);
    match tx.to {
        Some(to) => request.with_to(to).with_input(tx.data.clone()),
        None => request.with_deploy_code(tx.data.clone()),
    }
}

fn receipt_from(receipt: &TransactionReceipt) -> Result<Receipt> {
    let block_number = receipt.block_number.ok_or_else(|| {
        DeployError::TransactionError(format!(
            "receipt of {} has no block number",
            receipt.transaction_hash
        ))
    })?;
    Ok(Receipt {
        transaction_hash: receipt.transaction_hash,
        block_number,
        contract_address: receipt.contract_address,
        gas_used: receipt.gas_used,
        effective_gas_price: receipt.effective_gas_price,
        status: receipt.status(),
    })
}

/// Revert data carried by a node error, flat in `data` or nested as
/// `data.data` depending on the node.
fn revert_data(err: &TransportError) -> Option<Bytes> {
    err.as_error_resp()
        .and_then(|payload| payload.as_revert_data())
        .filter(|data| !data.is_empty())
}

fn is_revert(err: &TransportError) -> bool {
    err.as_error_resp()
        .is_some_and(|payload| payload.code == 3 || payload.message.contains("revert"))
}

/// Maps a rejected submission to a `TransactionError` carrying the decoded
/// revert reason when the node supplied one.
fn transaction_error(err: TransportError) -> DeployError {
    if let Some(data) = revert_data(&err) {
        if let Some(reason) = decode_revert_reason(&data, FUND_ME_ERRORS) {
            return DeployError::TransactionError(reason);
        }
    }
    match err.as_error_resp() {
        Some(payload) => DeployError::TransactionError(payload.message.to_string()),
        None => DeployError::RpcError(err.to_string()),
    }
}

#[async_trait]
impl ChainBackend for RpcBackend {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.provider.get_chain_id().await?)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        let mut accounts = self.local_accounts.clone();
        match self.provider.get_accounts().await {
            Ok(node_accounts) => accounts.extend(
                node_accounts
                    .into_iter()
                    .filter(|a| !self.local_accounts.contains(a)),
            ),
            // Hosted endpoints may not serve eth_accounts
            Err(err) if !self.local_accounts.is_empty() => {
                debug!("eth_accounts unavailable, using local signers only: {}", err)
            }
            Err(err) => return Err(err.into()),
        }
        Ok(accounts)
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.provider.get_block_number().await?)
    }

    async fn send_transaction(&self, tx: TransactionRequest, confirmations: u64) -> Result<Receipt> {
        let confirmations = confirmations.max(1);
        let pending = self
            .provider_for(tx.from)
            .send_transaction(rpc_request(&tx))
            .await
            .map_err(transaction_error)?;
        let tx_hash = *pending.tx_hash();
        debug!("Sent {}, waiting for {} confirmation(s)", tx_hash, confirmations);

        let mined = pending
            .with_required_confirmations(confirmations)
            .with_timeout(Some(self.receipt_timeout))
            .get_receipt()
            .await
            .map_err(|e| {
                DeployError::TransactionError(format!("waiting for {} failed: {}", tx_hash, e))
            })?;
        let receipt = receipt_from(&mined)?;
        self.wait_for_depth(&receipt, confirmations).await?;
        Ok(receipt)
    }

    async fn call(&self, tx: TransactionRequest) -> Result<CallOutput> {
        match self.provider.call(rpc_request(&tx)).await {
            Ok(data) => Ok(CallOutput::Success(data)),
            Err(err) => match revert_data(&err) {
                Some(data) => Ok(CallOutput::Revert(data)),
                // A revert without data (e.g. a bare `revert()`)
                None if is_revert(&err) => Ok(CallOutput::Revert(Bytes::new())),
                None => Err(err.into()),
            },
        }
    }

    async fn has_code(&self, address: Address) -> Result<bool> {
        Ok(!self.provider.get_code_at(address).await?.is_empty())
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self.provider.get_balance(address).await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::abi::error_selector;
    use alloy::rpc::json_rpc::ErrorPayload;

    fn node_error(body: &str) -> TransportError {
        let payload: ErrorPayload = serde_json::from_str(body).unwrap();
        TransportError::ErrorResp(payload)
    }

    #[test]
    fn test_rejected_send_names_fund_me_error() {
        let selector = hex::encode(error_selector("FundMe__NotOwner"));
        let err = node_error(&format!(
            r#"{{"code":-32603,"message":"Error: VM Exception while processing transaction: reverted with custom error 'FundMe__NotOwner()'","data":{{"message":"reverted","data":"0x{}"}}}}"#,
            selector
        ));
        assert_eq!(
            transaction_error(err),
            DeployError::TransactionError("FundMe__NotOwner".to_string())
        );
    }

    #[test]
    fn test_rejected_send_without_revert_data_keeps_message() {
        let err = node_error(r#"{"code":-32000,"message":"nonce too low"}"#);
        assert_eq!(
            transaction_error(err),
            DeployError::TransactionError("nonce too low".to_string())
        );
    }

    #[test]
    fn test_revert_data_locations() {
        let flat = node_error(r#"{"code":3,"message":"execution reverted","data":"0x08c379a0"}"#);
        assert_eq!(revert_data(&flat), Some(Bytes::from(vec![0x08, 0xc3, 0x79, 0xa0])));
        assert!(is_revert(&flat));

        let bare = node_error(r#"{"code":3,"message":"execution reverted"}"#);
        assert_eq!(revert_data(&bare), None);
        assert!(is_revert(&bare));

        let other = node_error(r#"{"code":-32000,"message":"insufficient funds"}"#);
        assert!(!is_revert(&other));
    }

    #[test]
    fn test_request_kinds() {
        let from = Address::repeat_byte(1);
        let creation = rpc_request(&TransactionRequest::creation(from, vec![0x60]));
        assert_eq!(creation.from, Some(from));
        assert!(creation.to.is_some_and(|kind| kind.is_create()));

        let to = Address::repeat_byte(2);
        let call = rpc_request(&TransactionRequest::transfer(from, to, U256::from(10)));
        assert_eq!(call.to.and_then(|kind| kind.to().copied()), Some(to));
        assert_eq!(call.value, Some(U256::from(10)));
    }
}
