//! In-memory chain for exercising deploy steps without a node.
//!
//! `InMemoryChain` keeps a fixed set of funded accounts, mines one block per
//! transaction and records contract creations. It never executes bytecode,
//! so calls into deployed contracts are rejected. The binaries always talk
//! to a real node; this double exists for tests.

use crate::backend::{CallOutput, ChainBackend, Receipt, TransactionRequest};
use crate::error::{DeployError, Result};
use alloy::primitives::{keccak256, Address, Bytes, TxHash, U256};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;

pub const DEV_CHAIN_ID: u64 = 31337;
pub const DEV_ACCOUNT_COUNT: usize = 10;
/// 10 000 ETH in wei.
pub const DEV_ACCOUNT_BALANCE: U256 = U256::from_limbs([0x19e0c9bab2400000, 0x21e, 0, 0]);
pub const WEI_PER_ETHER: U256 = U256::from_limbs([1_000_000_000_000_000_000, 0, 0, 0]);
pub const DEV_GAS_PRICE: u128 = 1_000_000_000;

const TX_BASE_GAS: u64 = 21_000;
const CREATION_BASE_GAS: u64 = 53_000;

#[derive(Debug, Default)]
struct ChainState {
    block_number: u64,
    accounts: Vec<Address>,
    balances: HashMap<Address, U256>,
    nonces: HashMap<Address, u64>,
    code: HashMap<Address, Bytes>,
}

pub struct InMemoryChain {
    chain_id: u64,
    state: Mutex<ChainState>,
}

impl InMemoryChain {
    pub fn new() -> Self {
        Self::with_chain_id(DEV_CHAIN_ID)
    }

    pub fn with_chain_id(chain_id: u64) -> Self {
        let mut state = ChainState::default();
        for i in 0..DEV_ACCOUNT_COUNT {
            let mut seed = b"fundme-test-account".to_vec();
            seed.extend_from_slice(&(i as u64).to_be_bytes());
            let account = Address::from_word(keccak256(seed));
            state.accounts.push(account);
            state.balances.insert(account, DEV_ACCOUNT_BALANCE);
        }
        Self {
            chain_id,
            state: Mutex::new(state),
        }
    }

    /// Creation bytecode stored at `address`, if any.
    pub fn code_at(&self, address: Address) -> Option<Bytes> {
        self.state.lock().code.get(&address).cloned()
    }

    /// Number of contracts created so far.
    pub fn contract_count(&self) -> usize {
        self.state.lock().code.len()
    }

    fn intrinsic_gas(tx: &TransactionRequest) -> u64 {
        let base = if tx.to.is_none() {
            CREATION_BASE_GAS
        } else {
            TX_BASE_GAS
        };
        let data_gas: u64 = tx
            .data
            .iter()
            .map(|b| if *b == 0 { 4u64 } else { 16u64 })
            .sum();
        base + data_gas
    }

    fn transaction_hash(from: &Address, nonce: u64, tx: &TransactionRequest) -> TxHash {
        let mut preimage = from.to_vec();
        preimage.extend_from_slice(&nonce.to_be_bytes());
        preimage.extend_from_slice(&tx.value.to_be_bytes::<32>());
        preimage.extend_from_slice(&tx.data);
        keccak256(preimage)
    }
}

impl Default for InMemoryChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ChainBackend for InMemoryChain {
    async fn chain_id(&self) -> Result<u64> {
        Ok(self.chain_id)
    }

    async fn accounts(&self) -> Result<Vec<Address>> {
        Ok(self.state.lock().accounts.clone())
    }

    async fn block_number(&self) -> Result<u64> {
        Ok(self.state.lock().block_number)
    }

    async fn send_transaction(&self, tx: TransactionRequest, confirmations: u64) -> Result<Receipt> {
        let mut state = self.state.lock();

        if !state.accounts.contains(&tx.from) {
            return Err(DeployError::TransactionError(format!(
                "sender account {} is not managed by the chain",
                tx.from
            )));
        }
        if tx.to.is_none() && tx.data.is_empty() {
            return Err(DeployError::TransactionError(
                "contract creation without code".to_string(),
            ));
        }
        if let Some(to) = tx.to {
            if state.code.contains_key(&to) {
                return Err(DeployError::TransactionError(format!(
                    "cannot execute contract {}: the in-memory chain does not run contract code",
                    to
                )));
            }
        }

        let gas_used = Self::intrinsic_gas(&tx);
        let cost = U256::from(gas_used)
            .checked_mul(U256::from(DEV_GAS_PRICE))
            .and_then(|fee| fee.checked_add(tx.value))
            .ok_or_else(|| {
                DeployError::TransactionError(format!(
                    "value {} plus gas overflows the sender's balance type",
                    tx.value
                ))
            })?;
        let balance = state.balances.get(&tx.from).copied().unwrap_or_default();
        if balance < cost {
            return Err(DeployError::TransactionError(format!(
                "sender {} doesn't have enough funds: balance {}, cost {}",
                tx.from, balance, cost
            )));
        }

        let nonce = state.nonces.get(&tx.from).copied().unwrap_or(0);
        let tx_hash = Self::transaction_hash(&tx.from, nonce, &tx);
        state.nonces.insert(tx.from, nonce + 1);
        state.balances.insert(tx.from, balance - cost);

        let recipient = tx.to.unwrap_or_else(|| tx.from.create(nonce));
        let credited = state
            .balances
            .get(&recipient)
            .copied()
            .unwrap_or_default()
            .checked_add(tx.value)
            .ok_or_else(|| {
                DeployError::TransactionError(format!("balance of {} overflows", recipient))
            })?;
        state.balances.insert(recipient, credited);
        let contract_address = match tx.to {
            None => {
                state.code.insert(recipient, tx.data.clone());
                Some(recipient)
            }
            Some(_) => None,
        };

        // Automine, then mine until the requested depth is reached
        state.block_number += 1;
        let receipt = Receipt {
            transaction_hash: tx_hash,
            block_number: state.block_number,
            contract_address,
            gas_used,
            effective_gas_price: DEV_GAS_PRICE,
            status: true,
        };
        state.block_number += confirmations.max(1) - 1;
        Ok(receipt)
    }

    async fn call(&self, tx: TransactionRequest) -> Result<CallOutput> {
        let state = self.state.lock();
        match tx.to {
            Some(to) if state.code.contains_key(&to) => Err(DeployError::RpcError(format!(
                "cannot call contract {}: the in-memory chain does not run contract code",
                to
            ))),
            _ => Ok(CallOutput::Success(Bytes::new())),
        }
    }

    async fn has_code(&self, address: Address) -> Result<bool> {
        Ok(self.state.lock().code.contains_key(&address))
    }

    async fn balance(&self, address: Address) -> Result<U256> {
        Ok(self
            .state
            .lock()
            .balances
            .get(&address)
            .copied()
            .unwrap_or_default())
    }
}
