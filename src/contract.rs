//! Client for a deployed FundMe contract.
//!
//! Transactions are simulated with `eth_call` first so that reverts surface
//! with their decoded reason (`Error(string)` messages or the names of
//! FundMe's custom errors) instead of a bare failed receipt.

use crate::abi::decode_revert_reason;
use crate::backend::{CallOutput, ChainBackend, Receipt, TransactionRequest};
use crate::error::{DeployError, Result};
use alloy::primitives::{Address, Bytes, U256};
use alloy::sol;
use alloy::sol_types::SolCall;
use std::sync::Arc;

sol! {
    interface IFundMe {
        error FundMe__NotOwner();

        function fund() external payable;
        function withdraw() external;
        function getPriceFeed() external view returns (address);
        function getOwner() external view returns (address);
        function getAddressToAmountFunded(address funder) external view returns (uint256);
        function getFunder(uint256 index) external view returns (address);
    }
}

/// Custom errors declared by FundMe.
pub const FUND_ME_ERRORS: &[&str] = &["FundMe__NotOwner"];

pub struct FundMeClient {
    address: Address,
    backend: Arc<dyn ChainBackend>,
    /// Account used for transactions and as `msg.sender` of views.
    signer: Address,
}

impl FundMeClient {
    pub fn new(address: Address, backend: Arc<dyn ChainBackend>, signer: Address) -> Self {
        Self {
            address,
            backend,
            signer,
        }
    }

    /// Same contract, different sending account.
    pub fn connect(&self, signer: Address) -> Self {
        Self {
            address: self.address,
            backend: self.backend.clone(),
            signer,
        }
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn signer(&self) -> Address {
        self.signer
    }

    pub async fn fund(&self, value: U256) -> Result<Receipt> {
        self.transact("fund", IFundMe::fundCall {}.abi_encode(), value)
            .await
    }

    pub async fn withdraw(&self) -> Result<Receipt> {
        self.transact("withdraw", IFundMe::withdrawCall {}.abi_encode(), U256::ZERO)
            .await
    }

    pub async fn get_price_feed(&self) -> Result<Address> {
        self.view(IFundMe::getPriceFeedCall {}).await
    }

    pub async fn get_owner(&self) -> Result<Address> {
        self.view(IFundMe::getOwnerCall {}).await
    }

    pub async fn get_address_to_amount_funded(&self, funder: Address) -> Result<U256> {
        self.view(IFundMe::getAddressToAmountFundedCall { funder })
            .await
    }

    pub async fn get_funder(&self, index: U256) -> Result<Address> {
        self.view(IFundMe::getFunderCall { index }).await
    }

    /// Ether held by the contract.
    pub async fn balance(&self) -> Result<U256> {
        self.backend.balance(self.address).await
    }

    async fn view<C: SolCall>(&self, call: C) -> Result<C::Return> {
        let request = TransactionRequest::call(self.signer, self.address, call.abi_encode());
        match self.backend.call(request).await? {
            CallOutput::Success(data) => Ok(C::abi_decode_returns(&data)?),
            CallOutput::Revert(data) => Err(revert_error(C::SIGNATURE, &data)),
        }
    }

    async fn transact(&self, method: &str, data: Vec<u8>, value: U256) -> Result<Receipt> {
        let request = TransactionRequest::call(self.signer, self.address, Bytes::from(data))
            .with_value(value);

        if let CallOutput::Revert(data) = self.backend.call(request.clone()).await? {
            return Err(revert_error(method, &data));
        }

        let receipt = self.backend.send_transaction(request, 1).await?;
        if !receipt.status {
            return Err(DeployError::TransactionError(format!(
                "{} reverted (tx: {})",
                method, receipt.transaction_hash
            )));
        }
        Ok(receipt)
    }
}

fn revert_error(method: &str, data: &[u8]) -> DeployError {
    match decode_revert_reason(data, FUND_ME_ERRORS) {
        Some(reason) => DeployError::TransactionError(reason),
        None => DeployError::TransactionError(format!("{} reverted without a reason", method)),
    }
}
