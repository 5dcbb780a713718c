//! Transport to a network: the operations deploy steps and contract clients
//! need from a node.

use crate::error::Result;
use alloy::primitives::{Address, Bytes, TxHash, U256};
use async_trait::async_trait;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionRequest {
    pub from: Address,
    /// `None` for contract creation.
    pub to: Option<Address>,
    pub value: U256,
    pub data: Bytes,
}

impl TransactionRequest {
    pub fn creation(from: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from,
            to: None,
            value: U256::ZERO,
            data: data.into(),
        }
    }

    pub fn call(from: Address, to: Address, data: impl Into<Bytes>) -> Self {
        Self {
            from,
            to: Some(to),
            value: U256::ZERO,
            data: data.into(),
        }
    }

    /// Plain ether transfer.
    pub fn transfer(from: Address, to: Address, value: U256) -> Self {
        Self::call(from, to, Bytes::new()).with_value(value)
    }

    pub fn with_value(mut self, value: U256) -> Self {
        self.value = value;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub contract_address: Option<Address>,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    /// `false` when the transaction was mined but reverted.
    pub status: bool,
}

impl Receipt {
    /// Wei spent on gas by this transaction.
    pub fn gas_cost(&self) -> U256 {
        U256::from(self.gas_used) * U256::from(self.effective_gas_price)
    }
}

/// Result of a read-only call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallOutput {
    Success(Bytes),
    /// The call reverted with the given revert data.
    Revert(Bytes),
}

#[async_trait]
pub trait ChainBackend: Send + Sync {
    async fn chain_id(&self) -> Result<u64>;

    /// Accounts transactions can be sent from.
    async fn accounts(&self) -> Result<Vec<Address>>;

    async fn block_number(&self) -> Result<u64>;

    /// Submits a transaction and waits until it is mined with at least
    /// `confirmations` blocks on top of (and including) its block.
    async fn send_transaction(&self, tx: TransactionRequest, confirmations: u64) -> Result<Receipt>;

    async fn call(&self, tx: TransactionRequest) -> Result<CallOutput>;

    async fn has_code(&self, address: Address) -> Result<bool>;

    async fn balance(&self, address: Address) -> Result<U256>;
}
