//! Per-chain delivery pipeline: evaluate, submit, confirm (§4.8).
//!
//! Three chained [`ProcessingQueue`] instances model `PendingEval →
//! Evaluated → Submitted → Confirmed | Dropped(collided) | Failed`. Each
//! stage's `on_order_completion` pushes its successful result into the next
//! stage's queue — the same composition the generic queue module documents.
//! A single dispatcher task consumes `submit-<chainId>` and feeds the
//! `EvalQueue`; three ticker tasks drive the three queues independently.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use alloy_rpc_types::TransactionRequest;
use alloy_sol_types::SolCall;
use async_trait::async_trait;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

use crate::chain_events::processPacketCall;
use crate::error::{RelayerError, Result};
use crate::evaluator::{Evaluator, EvaluatorConfig};
use crate::queue::{OrderHandler, OrderMeta, ProcessingQueue};
use crate::store::{Store, StoreBackend};
use crate::traits::{ChainProvider, Clock};
use crate::types::{AmbPayload, ConfirmOrder, EvalOrder, InFlightPermit, Order, SubmitOrder, SubmitOrderResult};
use crate::wallet::WalletHandle;

#[derive(Debug, Clone)]
pub struct SubmitterConfig {
    pub chain_id: u64,
    /// The escrow contract `processPacket` is called on, for this chain.
    pub incentives_address: Address,
    pub evaluator_config: EvaluatorConfig,
    pub evaluation_deadline: Duration,
    pub eval_retry_interval: Duration,
    pub eval_max_tries: u32,
    pub submit_retry_interval: Duration,
    pub submit_max_tries: u32,
    pub confirm_retry_interval: Duration,
    pub confirm_max_tries: u32,
    /// Extra confirmations to wait for beyond the Wallet's own receipt,
    /// before `ConfirmQueue` runs its bookkeeping. Zero skips the wait.
    pub additional_confirmations: u64,
    pub processing_interval: Duration,
    /// Percentage applied to the simulated gas estimate before evaluation
    /// (§6 `gasLimitBuffer`, keyed by AMB in config but applied here as a
    /// single resolved value per chain). 100 means no buffer.
    pub gas_limit_buffer_percent: u64,
    /// Global in-flight cap across the whole Eval→Submit→Confirm pipeline
    /// (§4.8: "the dispatcher enforces a global in-flight cap of
    /// `maxPendingTransactions`"), enforced by the dispatcher acquiring one
    /// permit per order before it enters `EvalQueue`.
    pub max_pending_transactions: usize,
}

/// Builds the `processPacket(messageCtx, message, refundGasTo)` calldata
/// (§4.8.1, §6) against the configured escrow contract.
fn build_transaction_request(incentives_address: Address, order: &Order, refund_gas_to: Address) -> TransactionRequest {
    let call = processPacketCall {
        messageCtx: order.message_ctx.clone().unwrap_or_default(),
        message: order.message.clone(),
        refundGasTo: refund_gas_to,
    };
    TransactionRequest::default().to(incentives_address).input(call.abi_encode().into())
}

// ============================================================================
// EvalQueue
// ============================================================================

struct EvalHandler<P: ChainProvider, C: Clock, B: StoreBackend> {
    config: SubmitterConfig,
    provider: Arc<P>,
    clock: Arc<C>,
    store: Store<B>,
    evaluator: Evaluator,
    submit_queue: Arc<ProcessingQueue<SubmitOrder, SubmitHandler<P, C, B>, C>>,
}

#[async_trait]
impl<P: ChainProvider + 'static, C: Clock + 'static, B: StoreBackend + 'static> OrderHandler<EvalOrder> for EvalHandler<P, C, B> {
    type Result = SubmitOrder;

    #[instrument(skip(self, order), fields(message_identifier = %order.order.message_identifier))]
    async fn handle_order(&self, order: &EvalOrder, _meta: OrderMeta) -> std::result::Result<Option<SubmitOrder>, RelayerError> {
        let Some(bounty) = self.store.get_bounty(order.order.message_identifier).await? else {
            return Err(RelayerError::BountyNotReady {
                message_identifier: order.order.message_identifier.to_string(),
            });
        };

        let transaction_request = build_transaction_request(self.config.incentives_address, &order.order, bounty.refund_gas_to);

        let raw_gas_estimate = self.provider.estimate_gas(&transaction_request).await?;
        let gas_estimate = raw_gas_estimate.saturating_mul(self.config.gas_limit_buffer_percent) / 100;
        let fee_data = self.provider.get_fee_data().await?;

        if !self
            .evaluator
            .should_relay(&bounty, gas_estimate, &fee_data, &self.config.evaluator_config, order.priority)
        {
            debug!(message_identifier = %order.order.message_identifier, "bounty does not cover estimated delivery cost, dropping");
            return Ok(None);
        }

        Ok(Some(
            SubmitOrder::builder()
                .order(order.order.clone())
                .is_delivery(true)
                .priority(order.priority)
                .transaction_request(transaction_request)
                .permit(order.permit.clone())
                .build(),
        ))
    }

    async fn handle_failed_order(&self, order: &EvalOrder, _meta: OrderMeta, error: &RelayerError) -> bool {
        match error {
            RelayerError::BountyNotReady { .. } => self.clock.now() < order.evaluation_deadline,
            _ => error.is_transient(),
        }
    }

    async fn on_order_completion(&self, order: &EvalOrder, success: bool, result: Option<SubmitOrder>, _meta: OrderMeta) {
        match (success, result) {
            (true, Some(submit_order)) => self.submit_queue.push(submit_order).await,
            _ => debug!(message_identifier = %order.order.message_identifier, "order did not reach submission"),
        }
    }
}

// ============================================================================
// SubmitQueue
// ============================================================================

struct SubmitHandler<P: ChainProvider, C: Clock, B: StoreBackend> {
    chain_id: u64,
    provider: Arc<P>,
    wallet: WalletHandle,
    confirm_queue: Arc<ProcessingQueue<ConfirmOrder, ConfirmHandler<P, C, B>, C>>,
}

#[async_trait]
impl<P: ChainProvider + 'static, C: Clock + 'static, B: StoreBackend + 'static> OrderHandler<SubmitOrder> for SubmitHandler<P, C, B> {
    type Result = ConfirmOrder;

    #[instrument(skip(self, order), fields(chain_id = self.chain_id, message_identifier = %order.order.message_identifier))]
    async fn handle_order(&self, order: &SubmitOrder, meta: OrderMeta) -> std::result::Result<Option<ConfirmOrder>, RelayerError> {
        // A retried or requeued order may already have been delivered by a
        // competing relayer; simulate first to catch that before resubmitting (§4.8.2).
        if meta.retry_count > 0 || meta.requeue_count > 0 || order.requeue_count > 0 {
            if let Err(error) = self.provider.call(&order.transaction_request).await {
                if error.is_collision() {
                    info!(message_identifier = %order.order.message_identifier, "delivery already claimed by a competing relayer");
                    return Err(RelayerError::SimulationCollision {
                        message_identifier: order.order.message_identifier.to_string(),
                    });
                }
                return Err(error);
            }
        }

        let response = self.wallet.submit(order.transaction_request.clone()).await;
        if let Some(reason) = response.error {
            return Err(RelayerError::ContractCall(reason));
        }
        let (Some(tx_hash), Some(receipt)) = (response.tx_hash, response.receipt) else {
            return Err(RelayerError::ContractCall("wallet returned neither a receipt nor an error".into()));
        };

        let result = SubmitOrderResult {
            message_identifier: order.order.message_identifier,
            tx_hash,
            block_number: receipt.block_number,
            gas_used: U256::from(receipt.gas_used),
            effective_gas_price: U256::from(receipt.effective_gas_price),
            is_delivery: order.is_delivery,
        };

        Ok(Some(
            ConfirmOrder::builder()
                .order(order.order.clone())
                .is_delivery(order.is_delivery)
                .result(result)
                .permit(order.permit.clone())
                .build(),
        ))
    }

    async fn handle_failed_order(&self, _order: &SubmitOrder, _meta: OrderMeta, error: &RelayerError) -> bool {
        !error.is_collision()
    }

    async fn on_order_completion(&self, order: &SubmitOrder, success: bool, result: Option<ConfirmOrder>, _meta: OrderMeta) {
        match (success, result) {
            (true, Some(confirm_order)) => self.confirm_queue.push(confirm_order).await,
            _ => warn!(message_identifier = %order.order.message_identifier, "submission dropped: collided or exhausted retries"),
        }
    }
}

// ============================================================================
// ConfirmQueue
// ============================================================================

struct ConfirmHandler<P: ChainProvider, C: Clock, B: StoreBackend> {
    chain_id: u64,
    provider: Arc<P>,
    store: Store<B>,
    additional_confirmations: u64,
}

#[async_trait]
impl<P: ChainProvider + 'static, C: Clock + 'static, B: StoreBackend + 'static> OrderHandler<ConfirmOrder> for ConfirmHandler<P, C, B> {
    type Result = ();

    #[instrument(skip(self, order), fields(chain_id = self.chain_id, message_identifier = %order.order.message_identifier))]
    async fn handle_order(&self, order: &ConfirmOrder, _meta: OrderMeta) -> std::result::Result<Option<()>, RelayerError> {
        if self.additional_confirmations > 0 {
            let tip = self.provider.get_block_number().await?;
            if tip < order.result.block_number + self.additional_confirmations {
                return Err(RelayerError::AwaitingConfirmations);
            }
        }

        // Ack (return-leg) orders do not register a delivery cost — an
        // intentional asymmetry, not an oversight (§9).
        if order.is_delivery {
            self.store
                .register_delivery_cost(order.order.message_identifier, order.order.from_chain_id, order.result.delivery_gas_cost())
                .await?;
        }

        info!(message_identifier = %order.order.message_identifier, tx_hash = %order.result.tx_hash, "order confirmed");
        Ok(Some(()))
    }

    async fn handle_failed_order(&self, _order: &ConfirmOrder, _meta: OrderMeta, error: &RelayerError) -> bool {
        matches!(error, RelayerError::AwaitingConfirmations) || error.is_transient()
    }

    async fn on_order_completion(&self, _order: &ConfirmOrder, _success: bool, _result: Option<()>, _meta: OrderMeta) {}
}

// ============================================================================
// Submitter: wiring and dispatch
// ============================================================================

/// Owns the three chained queues for one chain and the dispatcher task that
/// feeds them from the `submit-<chainId>` bus.
pub struct Submitter<P: ChainProvider, C: Clock, B: StoreBackend> {
    config: SubmitterConfig,
    eval_queue: Arc<ProcessingQueue<EvalOrder, EvalHandler<P, C, B>, C>>,
    submit_queue: Arc<ProcessingQueue<SubmitOrder, SubmitHandler<P, C, B>, C>>,
    confirm_queue: Arc<ProcessingQueue<ConfirmOrder, ConfirmHandler<P, C, B>, C>>,
    clock: Arc<C>,
    /// Sized to `max_pending_transactions`; acquired once per order before it
    /// enters `EvalQueue` and held (via `InFlightPermit`) until the order
    /// reaches a terminal state anywhere in the pipeline (§4.8).
    in_flight: Arc<Semaphore>,
}

impl<P: ChainProvider + 'static, C: Clock + 'static, B: StoreBackend + 'static> Submitter<P, C, B> {
    pub fn new(config: SubmitterConfig, provider: Arc<P>, clock: Arc<C>, store: Store<B>, wallet: WalletHandle) -> Self {
        let confirm_handler = ConfirmHandler {
            chain_id: config.chain_id,
            provider: provider.clone(),
            store: store.clone(),
            additional_confirmations: config.additional_confirmations,
        };
        let confirm_queue = Arc::new(ProcessingQueue::new(
            confirm_handler,
            clock.clone(),
            config.confirm_retry_interval,
            config.confirm_max_tries,
        ));

        let submit_handler = SubmitHandler {
            chain_id: config.chain_id,
            provider: provider.clone(),
            wallet,
            confirm_queue: confirm_queue.clone(),
        };
        let submit_queue = Arc::new(ProcessingQueue::new(
            submit_handler,
            clock.clone(),
            config.submit_retry_interval,
            config.submit_max_tries,
        ));

        let eval_handler = EvalHandler {
            config: config.clone(),
            provider,
            clock: clock.clone(),
            store,
            evaluator: Evaluator,
            submit_queue: submit_queue.clone(),
        };
        let eval_queue = Arc::new(ProcessingQueue::new(
            eval_handler,
            clock.clone(),
            config.eval_retry_interval,
            config.eval_max_tries,
        ));

        let in_flight = Arc::new(Semaphore::new(config.max_pending_transactions));

        Self { config, eval_queue, submit_queue, confirm_queue, clock, in_flight }
    }

    /// Spawns the dispatcher (consuming `submit-<chainId>`) and the three
    /// queue tickers, returning their join handles.
    pub fn spawn(self, store: Store<B>) -> Vec<JoinHandle<()>> {
        let mut handles = Vec::with_capacity(4);

        let chain_id = self.config.chain_id;
        let evaluation_deadline = self.config.evaluation_deadline;
        let eval_queue = self.eval_queue.clone();
        let mut receiver = store.subscribe_submit(chain_id);
        let clock = self.clock.clone();
        let in_flight = self.in_flight.clone();
        handles.push(tokio::spawn(async move {
            loop {
                match receiver.recv().await {
                    Ok(raw) => match serde_json::from_str::<AmbPayload>(&raw) {
                        Ok(payload) => {
                            // Blocks the dispatcher until a slot frees up, which is the
                            // point: §4.8's global in-flight cap applies to the whole
                            // pipeline, not just the Wallet's own concurrency bound.
                            let Ok(permit) = in_flight.clone().acquire_owned().await else {
                                return;
                            };
                            let order = Order {
                                amb: payload.amb,
                                from_chain_id: chain_id,
                                message_identifier: payload.message_identifier,
                                message: payload.message,
                                message_ctx: payload.message_ctx,
                                incentives_payload: None,
                            };
                            let eval_order = EvalOrder::builder()
                                .order(order)
                                .priority(payload.priority)
                                .evaluation_deadline(clock.now() + evaluation_deadline)
                                .permit(InFlightPermit::from(permit))
                                .build();
                            eval_queue.push(eval_order).await;
                        }
                        Err(error) => warn!(%error, "failed to decode AmbPayload from submit bus"),
                    },
                    Err(tokio::sync::broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(chain_id, skipped, "submit bus dispatcher lagged, some payloads were dropped");
                    }
                    Err(tokio::sync::broadcast::error::RecvError::Closed) => return,
                }
            }
        }));

        handles.push(self.spawn_ticker("eval", self.eval_queue.clone()));
        handles.push(self.spawn_ticker("submit", self.submit_queue.clone()));
        handles.push(self.spawn_ticker("confirm", self.confirm_queue.clone()));

        handles
    }

    fn spawn_ticker<O, H>(&self, stage: &'static str, queue: Arc<ProcessingQueue<O, H, C>>) -> JoinHandle<()>
    where
        O: Send + Sync + Clone + 'static,
        H: OrderHandler<O> + 'static,
    {
        let chain_id = self.config.chain_id;
        let processing_interval = self.config.processing_interval;
        let clock = self.clock.clone();
        tokio::spawn(async move {
            loop {
                let processed = queue.tick().await;
                if processed > 0 {
                    debug!(chain_id, stage, processed, "queue tick processed orders");
                }
                clock.sleep(processing_interval).await;
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBackend;
    use crate::testing::{FakeChainProvider, FakeClock};
    use crate::traits::{FeeData, TxReceipt};
    use crate::types::{Bounty, BountyStatus, MessageIdentifier};
    use crate::wallet::{Wallet, WalletConfig, GasPolicy};
    use alloy_primitives::{Bytes, TxHash};

    fn config() -> SubmitterConfig {
        SubmitterConfig {
            chain_id: 2,
            incentives_address: Address::repeat_byte(0xEE),
            evaluator_config: EvaluatorConfig::default(),
            evaluation_deadline: Duration::from_secs(30),
            eval_retry_interval: Duration::from_millis(1),
            eval_max_tries: 3,
            submit_retry_interval: Duration::from_millis(1),
            submit_max_tries: 3,
            confirm_retry_interval: Duration::from_millis(1),
            confirm_max_tries: 3,
            additional_confirmations: 0,
            processing_interval: Duration::from_millis(1),
            gas_limit_buffer_percent: 100,
            max_pending_transactions: 4,
        }
    }

    /// A permit drawn from a throwaway semaphore, for tests that build an
    /// `EvalOrder` directly without going through the dispatcher.
    fn test_permit() -> InFlightPermit {
        InFlightPermit::from(Arc::new(tokio::sync::Semaphore::new(1)).try_acquire_owned().unwrap())
    }

    fn bounty() -> Bounty {
        let mut b = Bounty::sparse(MessageIdentifier::new([0xAA; 32]), 1, BountyStatus::BountyPlaced);
        b.max_gas_delivery = U256::from(200_000u64);
        b.price_of_delivery_gas = U256::from(1_000_000_000u64);
        b
    }

    fn eval_order() -> EvalOrder {
        EvalOrder::builder()
            .order(Order {
                amb: crate::types::AmbKind::Mock,
                from_chain_id: 1,
                message_identifier: MessageIdentifier::new([0xAA; 32]),
                message: Bytes::from_static(b"payload"),
                message_ctx: Some(Bytes::from_static(b"ctx")),
                incentives_payload: None,
            })
            .priority(false)
            .evaluation_deadline(std::time::Instant::now() + Duration::from_secs(30))
            .permit(test_permit())
            .build()
    }

    #[tokio::test]
    async fn eval_handler_drops_order_when_bounty_never_arrives_by_deadline() {
        let provider = Arc::new(FakeChainProvider::new());
        let clock = Arc::new(FakeClock::new());
        let store = Store::new(InMemoryBackend::new());
        let wallet_provider = Arc::new(FakeChainProvider::new());

        let wallet = Wallet::spawn(
            WalletConfig {
                chain_id: 2,
                max_pending_transactions: 4,
                max_tries: 1,
                confirmation_timeout: Duration::from_millis(1),
                retry_interval: Duration::from_millis(1),
                gas_policy: GasPolicy::default(),
                low_balance_warning: U256::ZERO,
            },
            wallet_provider,
            clock.clone(),
            Address::repeat_byte(0x01),
            U256::ZERO,
        );

        let submitter = Submitter::new(config(), provider, clock.clone(), store.clone(), wallet);

        let mut order = eval_order();
        order.evaluation_deadline = clock.now();
        submitter.eval_queue.push(order).await;
        submitter.eval_queue.tick().await;

        assert!(submitter.submit_queue.is_empty().await);
    }

    #[tokio::test]
    async fn full_pipeline_delivers_and_registers_cost() {
        let provider = Arc::new(FakeChainProvider::new());
        provider.set_fee_data(FeeData { base_fee_per_gas: None, max_priority_fee_per_gas: 0, gas_price: 1 });
        let clock = Arc::new(FakeClock::new());
        let store = Store::new(InMemoryBackend::new());
        store.register_bounty_placed(bounty()).await.unwrap();

        let wallet_provider = Arc::new(FakeChainProvider::new());
        let sent_hash = TxHash::repeat_byte(1);
        wallet_provider.add_receipt(
            sent_hash,
            TxReceipt { transaction_hash: sent_hash, block_number: 5, gas_used: 150_000, effective_gas_price: 1, status: true },
        );
        let wallet = Wallet::spawn(
            WalletConfig {
                chain_id: 2,
                max_pending_transactions: 4,
                max_tries: 3,
                confirmation_timeout: Duration::from_secs(5),
                retry_interval: Duration::from_millis(1),
                gas_policy: GasPolicy::default(),
                low_balance_warning: U256::ZERO,
            },
            wallet_provider,
            clock.clone(),
            Address::repeat_byte(0x01),
            U256::from(1_000_000_000u64),
        );

        let submitter = Submitter::new(config(), provider, clock.clone(), store.clone(), wallet);

        submitter.eval_queue.push(eval_order()).await;
        submitter.eval_queue.tick().await;
        submitter.submit_queue.tick().await;
        submitter.confirm_queue.tick().await;

        let updated = store.get_bounty(MessageIdentifier::new([0xAA; 32])).await.unwrap().unwrap();
        assert_eq!(updated.delivery_gas_cost, Some(U256::from(150_000u64)));
    }
}
