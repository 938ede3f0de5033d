//! Generic bounded retry queue.
//!
//! The Evaluator→Submitter→Confirmer pipeline (§4.8) is three instances of
//! this same abstraction chained together: each stage is a `ProcessingQueue`
//! whose `OrderHandler` either produces a result to push into the next
//! stage, or fails and gets retried/dropped according to the policy below.

use std::collections::BinaryHeap;
use std::cmp::Ordering as CmpOrdering;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::{debug, instrument, warn};

use crate::error::RelayerError;
use crate::traits::Clock;

/// An order's retry/requeue accounting, carried alongside the order itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct OrderMeta {
    pub retry_count: u32,
    pub requeue_count: u32,
}

/// Hooks a `ProcessingQueue` user implements to define one pipeline stage.
///
/// Mirrors the reference's `handleOrder`/`handleFailedOrder`/`onOrderCompletion`
/// trio exactly: `handle_order` returning `Ok(None)` means "skip, no retry";
/// `Err` triggers `handle_failed_order` to decide whether to retry.
#[async_trait]
pub trait OrderHandler<O: Send + Sync + Clone + 'static>: Send + Sync {
    type Result: Send + Sync + Clone;

    async fn handle_order(
        &self,
        order: &O,
        meta: OrderMeta,
    ) -> Result<Option<Self::Result>, RelayerError>;

    /// Returns whether the order should be retried after this failure.
    async fn handle_failed_order(&self, order: &O, meta: OrderMeta, error: &RelayerError) -> bool;

    async fn on_order_completion(&self, order: &O, success: bool, result: Option<Self::Result>, meta: OrderMeta);
}

struct Scheduled<O> {
    process_at: Instant,
    order: O,
    meta: OrderMeta,
}

impl<O> PartialEq for Scheduled<O> {
    fn eq(&self, other: &Self) -> bool {
        self.process_at == other.process_at
    }
}
impl<O> Eq for Scheduled<O> {}
impl<O> PartialOrd for Scheduled<O> {
    fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> {
        Some(self.cmp(other))
    }
}
impl<O> Ord for Scheduled<O> {
    fn cmp(&self, other: &Self) -> CmpOrdering {
        // reversed: BinaryHeap is a max-heap, we want the earliest deadline first
        other.process_at.cmp(&self.process_at)
    }
}

/// A bounded FIFO of pending orders with per-order retry state.
pub struct ProcessingQueue<O, H, C>
where
    O: Send + Sync + Clone + 'static,
    H: OrderHandler<O>,
    C: Clock,
{
    handler: H,
    clock: Arc<C>,
    retry_interval: Duration,
    max_tries: u32,
    pending: Mutex<BinaryHeap<Scheduled<O>>>,
}

impl<O, H, C> ProcessingQueue<O, H, C>
where
    O: Send + Sync + Clone + 'static,
    H: OrderHandler<O>,
    C: Clock,
{
    pub fn new(handler: H, clock: Arc<C>, retry_interval: Duration, max_tries: u32) -> Self {
        Self {
            handler,
            clock,
            retry_interval,
            max_tries,
            pending: Mutex::new(BinaryHeap::new()),
        }
    }

    /// Adds a fresh order, eligible immediately.
    pub async fn push(&self, order: O) {
        self.push_at(order, self.clock.now(), OrderMeta::default()).await;
    }

    /// Re-adds an already-seen order: `requeueCount` increments, retry
    /// state resets. This is how the pipeline stages compose (§4.3).
    pub async fn requeue(&self, order: O, previous_meta: OrderMeta) {
        let meta = OrderMeta {
            retry_count: 0,
            requeue_count: previous_meta.requeue_count + 1,
        };
        self.push_at(order, self.clock.now(), meta).await;
    }

    async fn push_at(&self, order: O, process_at: Instant, meta: OrderMeta) {
        self.pending.lock().await.push(Scheduled { process_at, order, meta });
    }

    /// Pops and processes every order eligible at `now`, returning the
    /// number processed. Called from a worker loop between sleeps.
    #[instrument(skip(self))]
    pub async fn tick(&self) -> usize {
        let now = self.clock.now();
        let mut processed = 0;

        loop {
            let next = {
                let mut pending = self.pending.lock().await;
                match pending.peek() {
                    Some(scheduled) if scheduled.process_at <= now => pending.pop(),
                    _ => None,
                }
            };

            let Some(Scheduled { order, meta, .. }) = next else {
                break;
            };

            self.process_one(order, meta).await;
            processed += 1;
        }

        processed
    }

    async fn process_one(&self, order: O, meta: OrderMeta) {
        match self.handler.handle_order(&order, meta).await {
            Ok(Some(result)) => {
                self.handler.on_order_completion(&order, true, Some(result), meta).await;
            }
            Ok(None) => {
                debug!(retry_count = meta.retry_count, "order skipped without retry");
                self.handler.on_order_completion(&order, false, None, meta).await;
            }
            Err(error) => {
                let retry_count = meta.retry_count + 1;
                let should_retry = retry_count < self.max_tries
                    && self.handler.handle_failed_order(&order, meta, &error).await;

                if should_retry {
                    warn!(%error, retry_count, "order failed, scheduling retry");
                    self.push_at(
                        order,
                        self.clock.now() + self.retry_interval,
                        OrderMeta { retry_count, requeue_count: meta.requeue_count },
                    )
                    .await;
                } else {
                    warn!(%error, retry_count, "order exhausted retries");
                    self.handler.on_order_completion(&order, false, None, meta).await;
                }
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.pending.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::FakeClock;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Clone)]
    struct CountingOrder(u32);

    struct SucceedOnNthAttempt {
        succeed_at: u32,
        attempts: AtomicU32,
        completions: Mutex<Vec<(u32, bool)>>,
    }

    #[async_trait]
    impl OrderHandler<CountingOrder> for SucceedOnNthAttempt {
        type Result = u32;

        async fn handle_order(&self, order: &CountingOrder, _meta: OrderMeta) -> Result<Option<u32>, RelayerError> {
            let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
            if attempt >= self.succeed_at {
                Ok(Some(order.0))
            } else {
                Err(RelayerError::Transport("not yet".into()))
            }
        }

        async fn handle_failed_order(&self, _order: &CountingOrder, _meta: OrderMeta, _error: &RelayerError) -> bool {
            true
        }

        async fn on_order_completion(&self, order: &CountingOrder, success: bool, _result: Option<u32>, _meta: OrderMeta) {
            self.completions.lock().await.push((order.0, success));
        }
    }

    #[tokio::test]
    async fn retries_until_success_within_max_tries() {
        let clock = Arc::new(FakeClock::new());
        let handler = SucceedOnNthAttempt {
            succeed_at: 3,
            attempts: AtomicU32::new(0),
            completions: Mutex::new(Vec::new()),
        };
        let queue = ProcessingQueue::new(handler, clock.clone(), Duration::from_secs(1), 5);

        queue.push(CountingOrder(42)).await;
        queue.tick().await;
        clock.advance(Duration::from_secs(1));
        queue.tick().await;
        clock.advance(Duration::from_secs(1));
        queue.tick().await;

        let completions = queue.handler.completions.lock().await;
        assert_eq!(completions.as_slice(), &[(42, true)]);
    }

    #[tokio::test]
    async fn exhausts_after_max_tries() {
        let clock = Arc::new(FakeClock::new());
        let handler = SucceedOnNthAttempt {
            succeed_at: 100,
            attempts: AtomicU32::new(0),
            completions: Mutex::new(Vec::new()),
        };
        let queue = ProcessingQueue::new(handler, clock.clone(), Duration::from_secs(1), 2);

        queue.push(CountingOrder(7)).await;
        for _ in 0..3 {
            queue.tick().await;
            clock.advance(Duration::from_secs(1));
        }

        let completions = queue.handler.completions.lock().await;
        assert_eq!(completions.as_slice(), &[(7, false)]);
        assert!(queue.is_empty().await);
    }

    struct AlwaysSkip {
        completions: Mutex<Vec<(u32, bool)>>,
    }

    #[async_trait]
    impl OrderHandler<CountingOrder> for AlwaysSkip {
        type Result = u32;

        async fn handle_order(&self, _order: &CountingOrder, _meta: OrderMeta) -> Result<Option<u32>, RelayerError> {
            Ok(None)
        }

        async fn handle_failed_order(&self, _order: &CountingOrder, _meta: OrderMeta, _error: &RelayerError) -> bool {
            false
        }

        async fn on_order_completion(&self, order: &CountingOrder, success: bool, _result: Option<u32>, _meta: OrderMeta) {
            self.completions.lock().await.push((order.0, success));
        }
    }

    /// Queue liveness (§4.3/§8): a "skip without retry" outcome still calls
    /// `on_order_completion` exactly once, same as success or exhaustion.
    #[tokio::test]
    async fn skip_without_retry_still_completes_the_order() {
        let clock = Arc::new(FakeClock::new());
        let handler = AlwaysSkip { completions: Mutex::new(Vec::new()) };
        let queue = ProcessingQueue::new(handler, clock, Duration::from_secs(1), 5);

        queue.push(CountingOrder(9)).await;
        queue.tick().await;

        let completions = queue.handler.completions.lock().await;
        assert_eq!(completions.as_slice(), &[(9, false)]);
    }

    #[tokio::test]
    async fn requeue_resets_retry_count_and_bumps_requeue_count() {
        let clock = Arc::new(FakeClock::new());
        let handler = SucceedOnNthAttempt {
            succeed_at: 1,
            attempts: AtomicU32::new(0),
            completions: Mutex::new(Vec::new()),
        };
        let queue = ProcessingQueue::new(handler, clock, Duration::from_secs(1), 5);

        queue.requeue(CountingOrder(1), OrderMeta { retry_count: 3, requeue_count: 0 }).await;
        let pending = queue.pending.lock().await;
        let scheduled = pending.peek().unwrap();
        assert_eq!(scheduled.meta.retry_count, 0);
        assert_eq!(scheduled.meta.requeue_count, 1);
    }
}
