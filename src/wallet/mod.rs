//! Per-chain, nonce-ordered transaction submitter.
//!
//! A single [`Wallet`] task owns the signing key for a chain; every other
//! worker (the Submitter) reaches it through a `tokio::sync::mpsc` request
//! channel paired with a `tokio::sync::oneshot` per request, so nonces are
//! assigned in one total order (§4.4, §5.1).

mod gas;

pub use gas::{GasPolicy, GasPrice};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy_primitives::{Address, TxHash, U256};
use alloy_rpc_types::TransactionRequest;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{error, info, instrument, warn};

use crate::error::{RelayerError, Result};
use crate::traits::{ChainProvider, Clock, TxReceipt};

/// A request to submit a transaction for confirmation on this chain.
pub struct WalletRequest {
    pub transaction_request: TransactionRequest,
    pub response: oneshot::Sender<WalletResponse>,
}

#[derive(Debug, Clone)]
pub struct WalletResponse {
    pub tx_hash: Option<TxHash>,
    pub receipt: Option<TxReceipt>,
    pub error: Option<String>,
}

impl WalletResponse {
    fn failed(error: impl Into<String>) -> Self {
        Self { tx_hash: None, receipt: None, error: Some(error.into()) }
    }

    fn confirmed(tx_hash: TxHash, receipt: TxReceipt) -> Self {
        Self { tx_hash: Some(tx_hash), receipt: Some(receipt), error: None }
    }
}

/// A handle other workers hold to submit requests to the [`Wallet`] task.
/// Cheap to clone; every clone shares the same backpressure semaphore.
#[derive(Clone)]
pub struct WalletHandle {
    sender: mpsc::Sender<WalletRequest>,
}

impl WalletHandle {
    pub async fn submit(&self, transaction_request: TransactionRequest) -> WalletResponse {
        let (tx, rx) = oneshot::channel();
        if self
            .sender
            .send(WalletRequest { transaction_request, response: tx })
            .await
            .is_err()
        {
            return WalletResponse::failed("wallet task no longer running");
        }
        rx.await.unwrap_or_else(|_| WalletResponse::failed("wallet task dropped the response channel"))
    }
}

const REQUEST_CHANNEL_CAPACITY: usize = 256;

/// Configuration for one chain's Wallet.
#[derive(Debug, Clone)]
pub struct WalletConfig {
    pub chain_id: u64,
    pub max_pending_transactions: usize,
    pub max_tries: u32,
    pub confirmation_timeout: Duration,
    pub retry_interval: Duration,
    pub gas_policy: GasPolicy,
    pub low_balance_warning: U256,
}

/// Per-chain singleton. Spawn with [`Wallet::spawn`]; interact through the
/// returned [`WalletHandle`].
///
/// Every accepted request runs in its own spawned task, bounded by a
/// `Semaphore` sized to `max_pending_transactions`, so more than one
/// transaction may sit Pending/Repriced at once (§4.4, §5). Nonces are
/// assigned once, in the single accepting loop, before a task is spawned —
/// that keeps assignment totally ordered even though confirmation then
/// proceeds concurrently.
pub struct Wallet<P: ChainProvider, C: Clock> {
    config: WalletConfig,
    provider: Arc<P>,
    clock: Arc<C>,
    signer_address: Address,
    estimated_balance: Mutex<U256>,
    next_nonce: Mutex<u64>,
    stalled: AtomicBool,
}

impl<P: ChainProvider + 'static, C: Clock + 'static> Wallet<P, C> {
    pub fn spawn(
        config: WalletConfig,
        provider: Arc<P>,
        clock: Arc<C>,
        signer_address: Address,
        initial_balance: U256,
    ) -> WalletHandle {
        let (sender, receiver) = mpsc::channel(REQUEST_CHANNEL_CAPACITY);
        let semaphore = Arc::new(Semaphore::new(config.max_pending_transactions));

        let wallet = Arc::new(Wallet {
            config,
            provider,
            clock,
            signer_address,
            estimated_balance: Mutex::new(initial_balance),
            next_nonce: Mutex::new(0),
            stalled: AtomicBool::new(false),
        });

        tokio::spawn(Self::run(wallet, receiver, semaphore));

        WalletHandle { sender }
    }

    #[instrument(skip(wallet, receiver, semaphore), fields(chain_id = wallet.config.chain_id))]
    async fn run(wallet: Arc<Self>, mut receiver: mpsc::Receiver<WalletRequest>, semaphore: Arc<Semaphore>) {
        // Primes the nonce cursor once from chain state; every subsequent
        // nonce is assigned locally so accepting a request never needs to
        // wait on a concurrently-pending transaction's confirmation.
        loop {
            match wallet.provider.get_transaction_count(wallet.signer_address).await {
                Ok(nonce) => {
                    *wallet.next_nonce.lock().unwrap() = nonce;
                    break;
                }
                Err(err) => {
                    warn!(%err, chain_id = wallet.config.chain_id, "failed to fetch starting nonce, retrying");
                    wallet.clock.sleep(wallet.config.retry_interval).await;
                }
            }
        }

        while let Some(request) = receiver.recv().await {
            if wallet.stalled.load(Ordering::SeqCst) {
                let _ = request.response.send(WalletResponse::failed("wallet stalled, no longer accepting requests"));
                continue;
            }

            let Ok(permit) = semaphore.clone().acquire_owned().await else {
                let _ = request.response.send(WalletResponse::failed("wallet shutting down"));
                continue;
            };

            let nonce = {
                let mut next = wallet.next_nonce.lock().unwrap();
                let assigned = *next;
                *next += 1;
                assigned
            };

            let wallet = wallet.clone();
            tokio::spawn(async move {
                let response = wallet.submit_and_confirm(request.transaction_request, nonce).await;
                drop(permit);

                match response {
                    Ok(resp) => {
                        let _ = request.response.send(resp);
                    }
                    Err(stall) => {
                        wallet.stalled.store(true, Ordering::SeqCst);
                        error!(fatal = true, chain_id = wallet.config.chain_id, %stall, "wallet stalled");
                        let _ = request.response.send(WalletResponse::failed(stall.to_string()));
                    }
                }
            });
        }
    }

    /// Drives one request through Simulated → Signed+Sent → Pending →
    /// Confirmed, with repricing on confirmation timeout and a cancellation
    /// attempt if repricing is exhausted (§4.4). `nonce` was already
    /// assigned by the accepting loop in [`Wallet::run`].
    #[instrument(skip(self, tx), fields(chain_id = self.config.chain_id, nonce))]
    async fn submit_and_confirm(&self, mut tx: TransactionRequest, nonce: u64) -> Result<WalletResponse> {
        tx = tx.nonce(nonce);

        let fee_data = self.provider.get_fee_data().await?;
        let mut gas_price = self.config.gas_policy.price_for(&fee_data);
        tx = gas_price.apply(tx);

        let mut tx_hash = self.provider.send_transaction(tx.clone()).await?;

        for attempt in 0..self.config.max_tries {
            match self.await_confirmation(tx_hash).await {
                Some(receipt) => {
                    self.record_confirmed_cost(&receipt);
                    return Ok(WalletResponse::confirmed(tx_hash, receipt));
                }
                None => {
                    warn!(chain_id = self.config.chain_id, nonce, attempt, "confirmation timed out, repricing");
                    gas_price = gas_price.repriced(self.config.gas_policy.priority_adjustment_factor);
                    tx = gas_price.apply(tx.clone().nonce(nonce));
                    match self.provider.send_transaction(tx.clone()).await {
                        Ok(new_hash) => tx_hash = new_hash,
                        Err(err) => {
                            warn!(%err, "repriced resubmission failed");
                        }
                    }
                }
            }
        }

        self.cancel_stuck_transaction(nonce, gas_price).await
    }

    async fn await_confirmation(&self, tx_hash: TxHash) -> Option<TxReceipt> {
        let deadline = self.clock.now() + self.config.confirmation_timeout;
        loop {
            if let Ok(Some(receipt)) = self.provider.get_transaction_receipt(tx_hash).await {
                return Some(receipt);
            }
            if self.clock.now() >= deadline {
                return None;
            }
            self.clock.sleep(self.config.retry_interval).await;
        }
    }

    /// Zero-value self-transfer at the stuck nonce, priced above the last
    /// attempt, to free the nonce. If this also fails, the wallet stalls.
    async fn cancel_stuck_transaction(&self, nonce: u64, last_price: GasPrice) -> Result<WalletResponse> {
        let cancellation = TransactionRequest::default()
            .from(self.signer_address)
            .to(self.signer_address)
            .nonce(nonce);
        let cancellation = last_price.repriced(self.config.gas_policy.priority_adjustment_factor).apply(cancellation);

        match self.provider.send_transaction(cancellation).await {
            Ok(cancel_hash) => match self.await_confirmation(cancel_hash).await {
                Some(_) => Ok(WalletResponse::failed("transaction cancelled after exhausting repricing attempts")),
                None => Err(RelayerError::WalletStall {
                    chain_id: self.config.chain_id,
                    reason: "cancellation transaction never confirmed".into(),
                }),
            },
            Err(err) => Err(RelayerError::WalletStall {
                chain_id: self.config.chain_id,
                reason: format!("cancellation transaction failed to submit: {err}"),
            }),
        }
    }

    fn record_confirmed_cost(&self, receipt: &TxReceipt) {
        let cost = U256::from(receipt.gas_used).saturating_mul(U256::from(receipt.effective_gas_price));
        let mut balance = self.estimated_balance.lock().unwrap();
        *balance = balance.saturating_sub(cost);
        if *balance < self.config.low_balance_warning {
            warn!(
                chain_id = self.config.chain_id,
                balance = %*balance,
                "wallet balance below configured low-balance threshold"
            );
        } else {
            info!(chain_id = self.config.chain_id, gas_used = %receipt.gas_used, "transaction confirmed");
        }
    }
}
