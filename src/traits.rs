//! Core trait abstractions for the relayer's chain-facing and time-facing
//! dependencies.
//!
//! Every external collaborator the pipeline depends on sits behind a trait
//! here, with exactly one production implementation (under [`crate::providers`])
//! and one fake (under [`crate::testing`]). This is what lets the Getter,
//! Collector, Wallet, and Submitter be tested without a live RPC endpoint.
//!
//! # Example: Implementing a Test Fake
//!
//! ```rust,ignore
//! use incentivized_relayer::traits::{ChainProvider, Clock};
//!
//! struct FixedHeightProvider;
//!
//! #[async_trait::async_trait]
//! impl ChainProvider for FixedHeightProvider {
//!     async fn get_block_number(&self) -> Result<u64> {
//!         Ok(12345)
//!     }
//!     // ...
//! }
//! ```

use alloy_primitives::{Address, Bytes, TxHash, B256, U256};
use alloy_rpc_types::{Log, TransactionRequest};
use async_trait::async_trait;
use std::time::{Duration, Instant};

use crate::error::Result;

/// Current EIP-1559 (or legacy) fee market data for a chain, as needed by
/// the Wallet's gas pricing policy.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeeData {
    /// `None` on chains that have not activated EIP-1559.
    pub base_fee_per_gas: Option<u128>,
    pub max_priority_fee_per_gas: u128,
    /// Legacy `eth_gasPrice`, always populated as a fallback.
    pub gas_price: u128,
}

impl FeeData {
    /// The per-unit-gas price a transaction will actually pay: base +
    /// priority fee where EIP-1559 is active, the legacy price otherwise.
    /// Used by the Evaluator to convert a gas estimate into a cost.
    pub fn effective_price(&self) -> u128 {
        match self.base_fee_per_gas {
            Some(base) => base + self.max_priority_fee_per_gas,
            None => self.gas_price,
        }
    }
}

/// The subset of a mined transaction receipt the relayer acts on: enough
/// to price balance surveillance and confirm success, without threading
/// `alloy`'s full `ReceiptEnvelope` through every layer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TxReceipt {
    pub transaction_hash: TxHash,
    pub block_number: u64,
    pub gas_used: u64,
    pub effective_gas_price: u128,
    pub status: bool,
}

/// A filter over chain logs, mirroring `eth_getLogs` parameters.
#[derive(Debug, Clone)]
pub struct LogFilter {
    pub address: Address,
    pub topic0: Vec<B256>,
    pub from_block: u64,
    pub to_block: u64,
}

/// Trait for all RPC operations the relayer needs against a single chain.
///
/// One implementor exists per configured chain (see
/// [`crate::providers::AlloyChainProvider`]); Getters, Collectors, the
/// Wallet, and the Evaluator are all generic over this trait rather than
/// holding a concrete `alloy` `Provider`.
///
/// # Test Scenarios
///
/// Implementing this trait with a fake enables testing:
/// - RPC transport failures mid-scan
/// - Reorgs / stale tips
/// - Nonce gaps and stuck transactions
/// - Fee-market spikes driving repricing
#[async_trait]
pub trait ChainProvider: Send + Sync {
    /// Current chain tip. Polled by the [`crate::monitor::Monitor`]; never
    /// called directly by a Getter or Collector.
    async fn get_block_number(&self) -> Result<u64>;

    async fn get_logs(&self, filter: &LogFilter) -> Result<Vec<Log>>;

    /// `eth_call` without a state-changing side effect, used both as a gas
    /// estimation precursor and for the Submitter's pre-retry collision
    /// check.
    async fn call(&self, tx: &TransactionRequest) -> Result<Bytes>;

    async fn estimate_gas(&self, tx: &TransactionRequest) -> Result<u64>;

    /// Next nonce to use for `address`, including pending transactions.
    async fn get_transaction_count(&self, address: Address) -> Result<u64>;

    async fn get_fee_data(&self) -> Result<FeeData>;

    async fn get_balance(&self, address: Address) -> Result<U256>;

    /// Signs and broadcasts `tx`, returning the accepted transaction hash.
    async fn send_transaction(&self, tx: TransactionRequest) -> Result<TxHash>;

    async fn get_transaction_receipt(&self, tx_hash: TxHash) -> Result<Option<TxReceipt>>;
}

/// Trait for time-based operations.
///
/// This trait abstracts sleep and time queries, enabling fast-forward
/// testing where tests can instantly advance through polling loops and
/// timeouts without actually waiting.
///
/// # Test Scenarios
///
/// Implementing this trait with fakes enables testing:
/// - Timeout behavior without waiting
/// - Polling interval correctness
/// - Retry backoff periods
#[async_trait]
pub trait Clock: Send + Sync {
    /// Asynchronously sleeps for the given duration.
    async fn sleep(&self, duration: Duration);

    /// Returns the current instant in time.
    ///
    /// Used for calculating timeouts and measuring elapsed time.
    fn now(&self) -> Instant;
}
