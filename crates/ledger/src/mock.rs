//! In-memory ledger for tests and dry runs
//!
//! Models the registry and token contracts closely enough for the full
//! subscribe/register/ingest flows. Raw transactions are expected to be the
//! JSON encoding of a [`PendingTransaction`], which is what the loopback
//! signer produces.

use async_trait::async_trait;
use datamarket_types::{
    Address, DatasetId, PendingTransaction, ProviderInfo, SignedTransaction, SubscriptionStatus,
    TxHash, TxReceipt,
};
use parking_lot::Mutex;
use std::collections::HashMap;

use crate::abi::{self, encode_bytes32_array, encode_tokens, split_call, Decoder, Token};
use crate::contracts::{
    APPROVE, BALANCE_OF, CHECK_SUBSCRIPTION, GET_ALL_PROVIDERS, GET_PROVIDER_INFO, REGISTER,
    SUBSCRIBE,
};
use crate::{CallRequest, LedgerClient, LedgerError};

const SUBSCRIPTION_PERIOD_SECS: u64 = 30 * 24 * 60 * 60;
const DEFAULT_GAS_ESTIMATE: u64 = 90_000;

struct MockReceipt {
    receipt: TxReceipt,
    polls_until_mined: u32,
}

#[derive(Default)]
struct MockState {
    providers: Vec<[u8; 32]>,
    provider_info: HashMap<[u8; 32], ProviderInfo>,
    subscriptions: HashMap<(Address, [u8; 32]), SubscriptionStatus>,
    subscription_responses: HashMap<(Address, [u8; 32]), SubscriptionStatus>,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
    nonces: HashMap<Address, u64>,
    gas_estimate: u64,
    estimates: Vec<CallRequest>,
    receipts: HashMap<TxHash, MockReceipt>,
    pending_polls: u32,
    never_mine: bool,
    receipt_failures: u32,
    revert_next: bool,
    fail_submissions: bool,
    submitted: Vec<PendingTransaction>,
}

/// Mock ledger client for testing
pub struct MockLedger {
    registry: Address,
    token: Address,
    state: Mutex<MockState>,
}

impl Default for MockLedger {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLedger {
    pub fn new() -> Self {
        let mut registry = [0u8; 20];
        registry[18] = 0xaa;
        registry[19] = 0x01;
        let mut token = [0u8; 20];
        token[18] = 0xaa;
        token[19] = 0x02;
        Self::with_addresses(Address::from_bytes(registry), Address::from_bytes(token))
    }

    pub fn with_addresses(registry: Address, token: Address) -> Self {
        let state = MockState {
            // The live registry keeps an empty identifier at index 0.
            providers: vec![[0u8; 32]],
            gas_estimate: DEFAULT_GAS_ESTIMATE,
            ..Default::default()
        };

        Self {
            registry,
            token,
            state: Mutex::new(state),
        }
    }

    pub fn registry_address(&self) -> Address {
        self.registry
    }

    pub fn token_address(&self) -> Address {
        self.token
    }

    pub fn register_provider(&self, dataset: &DatasetId, owner: Address, monthly_price: u128) {
        let mut state = self.state.lock();
        state.insert_provider(dataset.to_bytes32(), owner, monthly_price);
    }

    pub fn set_balance(&self, owner: Address, raw: u128) {
        self.state.lock().balances.insert(owner, raw);
    }

    pub fn balance(&self, owner: &Address) -> u128 {
        self.state.lock().balances.get(owner).copied().unwrap_or(0)
    }

    pub fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.state
            .lock()
            .allowances
            .get(&(*owner, *spender))
            .copied()
            .unwrap_or(0)
    }

    pub fn nonce(&self, address: &Address) -> u64 {
        self.state.lock().nonces.get(address).copied().unwrap_or(0)
    }

    pub fn is_registered(&self, dataset: &DatasetId) -> bool {
        self.state
            .lock()
            .provider_info
            .contains_key(&dataset.to_bytes32())
    }

    /// Store a subscription the way the registry would record it
    pub fn set_subscription(&self, status: SubscriptionStatus) {
        let key = (status.subscriber, status.dataset);
        self.state.lock().subscriptions.insert(key, status);
    }

    pub fn subscription(&self, subscriber: &Address, dataset: &DatasetId) -> Option<SubscriptionStatus> {
        self.state
            .lock()
            .subscriptions
            .get(&(*subscriber, dataset.to_bytes32()))
            .cloned()
    }

    /// Answer a subscription query with an arbitrary record, even one for
    /// another address or dataset
    pub fn set_subscription_response(
        &self,
        subscriber: Address,
        dataset: &DatasetId,
        response: SubscriptionStatus,
    ) {
        self.state
            .lock()
            .subscription_responses
            .insert((subscriber, dataset.to_bytes32()), response);
    }

    pub fn set_gas_estimate(&self, units: u64) {
        self.state.lock().gas_estimate = units;
    }

    pub fn estimates(&self) -> Vec<CallRequest> {
        self.state.lock().estimates.clone()
    }

    /// Receipt queries return nothing this many times before each new
    /// transaction is reported as mined
    pub fn set_pending_polls(&self, polls: u32) {
        self.state.lock().pending_polls = polls;
    }

    /// Accept transactions but never mine them
    pub fn set_never_mine(&self, never: bool) {
        self.state.lock().never_mine = never;
    }

    /// Fail the next `count` receipt queries with a connection error
    pub fn fail_receipt_queries(&self, count: u32) {
        self.state.lock().receipt_failures = count;
    }

    /// Mine the next submitted transaction with a failed status
    pub fn revert_next(&self) {
        self.state.lock().revert_next = true;
    }

    pub fn set_fail_submissions(&self, fail: bool) {
        self.state.lock().fail_submissions = fail;
    }

    pub fn submitted(&self) -> Vec<PendingTransaction> {
        self.state.lock().submitted.clone()
    }

    fn handle_call(&self, request: &CallRequest) -> Result<Vec<u8>, LedgerError> {
        let (selector, args) = split_call(&request.data)?;
        let args = Decoder::new(args);
        let state = self.state.lock();

        if request.to == self.registry {
            if selector == abi::selector(GET_ALL_PROVIDERS) {
                return Ok(encode_bytes32_array(&state.providers));
            }
            if selector == abi::selector(GET_PROVIDER_INFO) {
                let dataset = args.bytes32(0)?;
                let info = state.provider_info.get(&dataset);
                return Ok(encode_tokens(&[
                    Token::Address(info.map(|i| i.owner).unwrap_or(Address::ZERO)),
                    Token::Uint(info.map(|i| i.monthly_price).unwrap_or(0)),
                    Token::Uint(info.map(|i| u128::from(i.frequency_hint)).unwrap_or(0)),
                    Token::Bool(info.map(|i| i.has_history).unwrap_or(false)),
                    Token::Bool(info.is_some()),
                ]));
            }
            if selector == abi::selector(CHECK_SUBSCRIPTION) {
                let subscriber = args.address(0)?;
                let dataset = args.bytes32(1)?;
                let key = (subscriber, dataset);
                let status = state
                    .subscription_responses
                    .get(&key)
                    .or_else(|| state.subscriptions.get(&key))
                    .cloned()
                    .unwrap_or(SubscriptionStatus {
                        subscriber,
                        dataset,
                        start_timestamp: 0,
                        expiry_timestamp: 0,
                        is_active: false,
                    });
                return Ok(encode_tokens(&[
                    Token::Address(status.subscriber),
                    Token::Bytes32(status.dataset),
                    Token::Uint(u128::from(status.start_timestamp)),
                    Token::Uint(0),
                    Token::Uint(u128::from(status.expiry_timestamp)),
                    Token::Bool(status.is_active),
                ]));
            }
        }

        if request.to == self.token && selector == abi::selector(BALANCE_OF) {
            let owner = args.address(0)?;
            let balance = state.balances.get(&owner).copied().unwrap_or(0);
            return Ok(encode_tokens(&[Token::Uint(balance)]));
        }

        Err(LedgerError::Rpc {
            code: -32000,
            message: "execution reverted".to_string(),
        })
    }
}

impl MockState {
    fn insert_provider(&mut self, dataset: [u8; 32], owner: Address, monthly_price: u128) {
        if !self.provider_info.contains_key(&dataset) {
            self.providers.push(dataset);
        }
        self.provider_info.insert(
            dataset,
            ProviderInfo {
                owner,
                monthly_price,
                frequency_hint: 0,
                has_history: true,
                is_registered: true,
            },
        );
    }

    /// Apply a mined transaction; returns false when it reverts
    fn execute(&mut self, tx: &PendingTransaction, registry: Address, token: Address) -> bool {
        let Ok((selector, args)) = split_call(&tx.data) else {
            return true;
        };
        let args = Decoder::new(args);

        if tx.to == token && selector == abi::selector(APPROVE) {
            let (Ok(spender), Ok(amount)) = (args.address(0), args.uint(1)) else {
                return false;
            };
            self.allowances.insert((tx.from, spender), amount);
            return true;
        }

        if tx.to == registry && selector == abi::selector(SUBSCRIBE) {
            let Ok(dataset) = args.bytes32(0) else {
                return false;
            };
            let Some(price) = self.provider_info.get(&dataset).map(|i| i.monthly_price) else {
                return false;
            };
            let allowance = self.allowances.entry((tx.from, registry)).or_insert(0);
            if *allowance < price {
                return false;
            }
            *allowance -= price;

            let now = unix_now();
            self.subscriptions.insert(
                (tx.from, dataset),
                SubscriptionStatus {
                    subscriber: tx.from,
                    dataset,
                    start_timestamp: now,
                    expiry_timestamp: now + SUBSCRIPTION_PERIOD_SECS,
                    is_active: true,
                },
            );
            return true;
        }

        if tx.to == registry && selector == abi::selector(REGISTER) {
            let (Ok(dataset), Ok(price), Ok(owner)) =
                (args.bytes32(0), args.uint(1), args.address(2))
            else {
                return false;
            };
            if self.provider_info.contains_key(&dataset) {
                return false;
            }
            self.insert_provider(dataset, owner, price);
            return true;
        }

        true
    }
}

fn unix_now() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

#[async_trait]
impl LedgerClient for MockLedger {
    async fn call(&self, request: &CallRequest) -> Result<Vec<u8>, LedgerError> {
        self.handle_call(request)
    }

    async fn estimate_gas(&self, request: &CallRequest) -> Result<u64, LedgerError> {
        let mut state = self.state.lock();
        state.estimates.push(request.clone());
        Ok(state.gas_estimate)
    }

    async fn get_transaction_count(&self, address: &Address) -> Result<u64, LedgerError> {
        Ok(self.nonce(address))
    }

    async fn send_raw_transaction(&self, tx: &SignedTransaction) -> Result<TxHash, LedgerError> {
        let pending: PendingTransaction =
            serde_json::from_slice(tx.as_bytes()).map_err(|e| LedgerError::Rpc {
                code: -32602,
                message: format!("invalid raw transaction: {}", e),
            })?;

        let mut state = self.state.lock();
        if state.fail_submissions {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: "transaction rejected".to_string(),
            });
        }

        let expected = state.nonces.get(&pending.from).copied().unwrap_or(0);
        if pending.nonce != expected {
            return Err(LedgerError::Rpc {
                code: -32000,
                message: format!("nonce mismatch: expected {}, got {}", expected, pending.nonce),
            });
        }
        state.nonces.insert(pending.from, expected + 1);

        let hash = TxHash::from_bytes(&abi::keccak256(tx.as_bytes()));
        let reverted = std::mem::take(&mut state.revert_next);
        let status = !reverted && state.execute(&pending, self.registry, self.token);

        let polls_until_mined = if state.never_mine {
            u32::MAX
        } else {
            state.pending_polls
        };
        let receipt = TxReceipt {
            hash: hash.clone(),
            status,
            block_number: Some(state.submitted.len() as u64 + 1),
            gas_used: Some(pending.gas_limit.min(state.gas_estimate)),
        };
        state.receipts.insert(
            hash.clone(),
            MockReceipt {
                receipt,
                polls_until_mined,
            },
        );
        state.submitted.push(pending);

        Ok(hash)
    }

    async fn get_transaction_receipt(
        &self,
        hash: &TxHash,
    ) -> Result<Option<TxReceipt>, LedgerError> {
        let mut state = self.state.lock();
        if state.receipt_failures > 0 {
            state.receipt_failures -= 1;
            return Err(LedgerError::ConnectionFailed("mock node unreachable".to_string()));
        }

        let Some(entry) = state.receipts.get_mut(hash) else {
            return Ok(None);
        };
        if entry.polls_until_mined == u32::MAX {
            return Ok(None);
        }
        if entry.polls_until_mined > 0 {
            entry.polls_until_mined -= 1;
            return Ok(None);
        }
        Ok(Some(entry.receipt.clone()))
    }
}
