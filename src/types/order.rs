//! Queue records shared by the Evaluator and the Submitter pipeline.

use alloy_primitives::{Bytes, TxHash, U256};
use alloy_rpc_types::TransactionRequest;
use bon::Builder;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OwnedSemaphorePermit;

use super::amb::AmbKind;
use super::message_id::MessageIdentifier;

/// The dispatcher's `maxPendingTransactions` permit for this order (§4.8).
/// Acquired once when the order enters `EvalQueue` and carried forward
/// through `SubmitQueue`/`ConfirmQueue`; released by `Drop` the moment the
/// order reaches a terminal state (confirmed, dropped, or exhausted) at any
/// stage, since nothing clones the `Arc` beyond the single in-flight order.
pub type InFlightPermit = Arc<OwnedSemaphorePermit>;

/// Fields common to every stage of the submission pipeline.
#[derive(Debug, Clone, Builder)]
pub struct Order {
    pub amb: AmbKind,
    pub from_chain_id: u64,
    pub message_identifier: MessageIdentifier,
    pub message: Bytes,
    pub message_ctx: Option<Bytes>,
    #[builder(default)]
    pub incentives_payload: Option<Bytes>,
}

/// An order waiting on [`crate::evaluator::Evaluator::should_relay`] in the
/// `EvalQueue`.
#[derive(Debug, Clone, Builder)]
pub struct EvalOrder {
    #[builder(into)]
    pub order: Order,
    pub priority: bool,
    pub evaluation_deadline: Instant,
    #[builder(default)]
    pub retry_evaluation: bool,
    pub permit: InFlightPermit,
}

/// An order that passed evaluation and carries a built transaction request,
/// moving through `SubmitQueue` and `ConfirmQueue`.
#[derive(Debug, Clone, Builder)]
pub struct SubmitOrder {
    #[builder(into)]
    pub order: Order,
    pub is_delivery: bool,
    pub priority: bool,
    pub transaction_request: TransactionRequest,
    #[builder(default)]
    pub requeue_count: u32,
    pub permit: InFlightPermit,
}

/// An order waiting on additional confirmations and final bookkeeping in
/// the `ConfirmQueue`.
#[derive(Debug, Clone, Builder)]
pub struct ConfirmOrder {
    #[builder(into)]
    pub order: Order,
    pub is_delivery: bool,
    pub result: SubmitOrderResult,
    pub permit: InFlightPermit,
}

/// Terminal result of a successful `SubmitQueue` handler invocation.
#[derive(Debug, Clone)]
pub struct SubmitOrderResult {
    pub message_identifier: MessageIdentifier,
    pub tx_hash: TxHash,
    pub block_number: u64,
    pub gas_used: U256,
    pub effective_gas_price: U256,
    pub is_delivery: bool,
}

impl SubmitOrderResult {
    pub fn delivery_gas_cost(&self) -> U256 {
        self.gas_used.saturating_mul(self.effective_gas_price)
    }
}
