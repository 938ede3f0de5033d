//! Fake implementations of the relayer's trait abstractions.
//!
//! These let Getter/Collector/Wallet/Store logic be exercised without a
//! live RPC endpoint or external key-value service: one fake per trait,
//! each configurable enough to simulate the failure modes §4.9 calls out
//! (transport errors, decoding failures, stalls).

use alloy_primitives::{Address, Bytes, TxHash, U256};
use alloy_rpc_types::{Log, TransactionRequest};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio::sync::broadcast;

use crate::error::{RelayerError, Result};
use crate::store::StoreBackend;
use crate::traits::{ChainProvider, Clock, FeeData, LogFilter, TxReceipt};

// ============================================================================
// Fake ChainProvider
// ============================================================================

/// A fake chain provider with pre-configured responses, and fault injection
/// for each RPC method independently.
///
/// # Test Scenarios
///
/// Implementing this trait with fakes enables testing:
/// - Transport failures mid-scan (retried indefinitely per §4.9)
/// - Nonce progression and stuck-transaction repricing
/// - Fee-market spikes
/// - `CALL_EXCEPTION` collisions on retry simulation
#[derive(Default)]
pub struct FakeChainProvider {
    block_number: AtomicU64,
    logs: Mutex<Vec<Log>>,
    call_result: Mutex<Option<std::result::Result<Bytes, String>>>,
    estimate_gas: AtomicU64,
    nonces: Mutex<HashMap<Address, u64>>,
    fee_data: Mutex<FeeData>,
    balances: Mutex<HashMap<Address, U256>>,
    receipts: Mutex<HashMap<TxHash, TxReceipt>>,
    sent: Mutex<Vec<TransactionRequest>>,
    fail_get_block_number: Mutex<bool>,
    get_logs_calls: Mutex<Vec<LogFilter>>,
}

impl FakeChainProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_block_number(self, height: u64) -> Self {
        self.block_number.store(height, Ordering::SeqCst);
        self
    }

    pub fn set_block_number(&self, height: u64) {
        self.block_number.store(height, Ordering::SeqCst);
    }

    pub fn set_logs(&self, logs: Vec<Log>) {
        *self.logs.lock().unwrap() = logs;
    }

    pub fn set_call_ok(&self, bytes: Bytes) {
        *self.call_result.lock().unwrap() = Some(Ok(bytes));
    }

    /// Configures `call` to fail with a message containing `reason`, so
    /// `RelayerError::is_collision()` can be exercised end to end.
    pub fn set_call_err(&self, reason: impl Into<String>) {
        *self.call_result.lock().unwrap() = Some(Err(reason.into()));
    }

    pub fn set_nonce(&self, address: Address, nonce: u64) {
        self.nonces.lock().unwrap().insert(address, nonce);
    }

    pub fn set_fee_data(&self, fee_data: FeeData) {
        *self.fee_data.lock().unwrap() = fee_data;
    }

    pub fn set_balance(&self, address: Address, balance: U256) {
        self.balances.lock().unwrap().insert(address, balance);
    }

    pub fn add_receipt(&self, tx_hash: TxHash, receipt: TxReceipt) {
        self.receipts.lock().unwrap().insert(tx_hash, receipt);
    }

    pub fn fail_next_block_number_call(&self) {
        *self.fail_get_block_number.lock().unwrap() = true;
    }

    pub fn sent_transactions(&self) -> Vec<TransactionRequest> {
        self.sent.lock().unwrap().clone()
    }

    /// Every `(fromBlock, toBlock)` window requested via `get_logs`, in
    /// call order — lets block-window scanner tests assert on the exact
    /// scan windows rather than just the final tip (§8 scenario 6).
    pub fn get_logs_calls(&self) -> Vec<(u64, u64)> {
        self.get_logs_calls
            .lock()
            .unwrap()
            .iter()
            .map(|f| (f.from_block, f.to_block))
            .collect()
    }
}

#[async_trait]
impl ChainProvider for FakeChainProvider {
    async fn get_block_number(&self) -> Result<u64> {
        let mut fail = self.fail_get_block_number.lock().unwrap();
        if *fail {
            *fail = false;
            return Err(RelayerError::Transport("simulated transport failure".into()));
        }
        Ok(self.block_number.load(Ordering::SeqCst))
    }

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>> {
        self.get_logs_calls.lock().unwrap().push(filter.clone());
        Ok(self.logs.lock().unwrap().clone())
    }

    async fn call(&self, _tx: &TransactionRequest) -> Result<Bytes> {
        match self.call_result.lock().unwrap().clone() {
            Some(Ok(bytes)) => Ok(bytes),
            Some(Err(reason)) => Err(RelayerError::ContractCall(reason)),
            None => Ok(Bytes::new()),
        }
    }

    async fn estimate_gas(&self, _tx: &TransactionRequest) -> Result<u64> {
        Ok(self.estimate_gas.load(Ordering::SeqCst))
    }

    async fn get_transaction_count(&self, address: Address) -> Result<u64> {
        Ok(self.nonces.lock().unwrap().get(&address).copied().unwrap_or(0))
    }

    async fn get_fee_data(&self) -> Result<FeeData> {
        Ok(*self.fee_data.lock().unwrap())
    }

    async fn get_balance(&self, address: Address) -> Result<U256> {
        Ok(self.balances.lock().unwrap().get(&address).copied().unwrap_or(U256::ZERO))
    }

    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash> {
        self.sent.lock().unwrap().push(tx);
        Ok(TxHash::repeat_byte(self.sent.lock().unwrap().len() as u8))
    }

    async fn get_transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>> {
        Ok(self.receipts.lock().unwrap().get(&tx_hash).cloned())
    }
}

// ============================================================================
// Fake Clock
// ============================================================================

/// A fake clock that advances instantly and logs every sleep call.
///
/// Suited to bounded retry loops (Evaluator deadlines, queue backoff) where
/// the test only cares that the *right duration* was requested, not that
/// real wall-clock time passed. Unsuited to an unbounded polling loop run
/// as a background task — prefer `#[tokio::test(start_paused = true)]` with
/// the real [`crate::providers::TokioClock`] there instead.
#[derive(Clone, Debug)]
pub struct FakeClock {
    current_time: Arc<Mutex<Instant>>,
    sleep_log: Arc<Mutex<Vec<Duration>>>,
}

impl Default for FakeClock {
    fn default() -> Self {
        Self {
            current_time: Arc::new(Mutex::new(Instant::now())),
            sleep_log: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

impl FakeClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, duration: Duration) {
        let mut time = self.current_time.lock().unwrap();
        *time += duration;
    }

    pub fn total_sleep_time(&self) -> Duration {
        self.sleep_log.lock().unwrap().iter().sum()
    }

    pub fn sleep_count(&self) -> usize {
        self.sleep_log.lock().unwrap().len()
    }
}

#[async_trait]
impl Clock for FakeClock {
    async fn sleep(&self, duration: Duration) {
        self.sleep_log.lock().unwrap().push(duration);
        self.advance(duration);
    }

    fn now(&self) -> Instant {
        *self.current_time.lock().unwrap()
    }
}

// ============================================================================
// Fake StoreBackend
// ============================================================================

/// An in-memory [`StoreBackend`] that additionally records every mutating
/// call, for tests that assert on *what was written* rather than just the
/// resulting state (e.g. "exactly one `relayer:key` notification fired").
#[derive(Default)]
pub struct FakeStoreBackend {
    kv: Mutex<HashMap<String, String>>,
    channels: Mutex<HashMap<String, broadcast::Sender<String>>>,
    pub sets: Mutex<Vec<(String, String)>>,
    pub deletes: Mutex<Vec<String>>,
    pub publishes: Mutex<Vec<(String, String)>>,
}

impl FakeStoreBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, channel: &str) -> broadcast::Sender<String> {
        let mut channels = self.channels.lock().unwrap();
        channels
            .entry(channel.to_string())
            .or_insert_with(|| broadcast::channel(1024).0)
            .clone()
    }
}

#[async_trait]
impl StoreBackend for FakeStoreBackend {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.kv.lock().unwrap().get(key).cloned())
    }

    async fn set(&self, key: &str, value: String) -> Result<()> {
        self.sets.lock().unwrap().push((key.to_string(), value.clone()));
        self.kv.lock().unwrap().insert(key.to_string(), value);
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        self.kv.lock().unwrap().remove(key);
        Ok(())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<String>> {
        Ok(self
            .kv
            .lock()
            .unwrap()
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }

    async fn publish(&self, channel: &str, payload: String) -> Result<()> {
        self.publishes.lock().unwrap().push((channel.to_string(), payload.clone()));
        let _ = self.sender_for(channel).send(payload);
        Ok(())
    }

    fn subscribe(&self, channel: &str) -> broadcast::Receiver<String> {
        self.sender_for(channel).subscribe()
    }
}
