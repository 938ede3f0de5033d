//! Per-chain block-tip broadcaster.
//!
//! Getters and Collectors never poll the RPC for the current tip themselves;
//! they subscribe to the single [`Monitor`] task for their chain and read
//! the latest [`MonitorStatus`] off a `tokio::sync::watch` channel. `watch`
//! gives latest-value semantics, which is what a tip pointer wants: a
//! subscriber that wakes up late should see the newest height, not a queue
//! of every height it missed.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{instrument, warn};

use crate::traits::{ChainProvider, Clock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorStatus {
    pub block_number: u64,
}

/// Polls `provider.get_block_number()` on `poll_interval` and republishes
/// the result on a `watch` channel. One instance per chain.
pub struct Monitor<P: ChainProvider, C: Clock> {
    chain_id: u64,
    provider: Arc<P>,
    clock: Arc<C>,
    poll_interval: Duration,
}

impl<P: ChainProvider, C: Clock> Monitor<P, C> {
    pub fn new(chain_id: u64, provider: Arc<P>, clock: Arc<C>, poll_interval: Duration) -> Self {
        Self {
            chain_id,
            provider,
            clock,
            poll_interval,
        }
    }

    /// Fetches the first height synchronously, then spawns the polling
    /// loop and returns a receiver already primed with a value. Consumers
    /// that call `watch::Receiver::borrow` before any tick still see a
    /// real block number, never a sentinel zero.
    #[instrument(skip(self), fields(chain_id = self.chain_id))]
    pub async fn start(self) -> crate::error::Result<watch::Receiver<MonitorStatus>> {
        let block_number = self.provider.get_block_number().await?;
        let (tx, rx) = watch::channel(MonitorStatus { block_number });

        tokio::spawn(async move {
            loop {
                self.clock.sleep(self.poll_interval).await;

                match self.provider.get_block_number().await {
                    Ok(block_number) => {
                        if tx.send(MonitorStatus { block_number }).is_err() {
                            // every subscriber (and the handle returned from `start`) dropped
                            return;
                        }
                    }
                    Err(err) => {
                        warn!(chain_id = self.chain_id, %err, "monitor poll failed, retrying");
                    }
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeChainProvider, FakeClock};

    #[tokio::test]
    async fn first_status_is_available_before_any_tick() {
        let provider = Arc::new(FakeChainProvider::new().with_block_number(100));
        let clock = Arc::new(FakeClock::new());

        let monitor = Monitor::new(1, provider, clock, Duration::from_secs(10));
        let rx = monitor.start().await.unwrap();

        assert_eq!(rx.borrow().block_number, 100);
    }

    #[tokio::test]
    async fn advances_after_poll_interval() {
        let provider = Arc::new(FakeChainProvider::new().with_block_number(100));
        let clock = Arc::new(FakeClock::new());

        let monitor = Monitor::new(1, provider.clone(), clock, Duration::from_millis(1));
        let mut rx = monitor.start().await.unwrap();

        provider.set_block_number(101);

        tokio::time::timeout(Duration::from_secs(1), rx.changed())
            .await
            .expect("monitor did not pick up the new height in time")
            .unwrap();
        assert_eq!(rx.borrow().block_number, 101);
    }
}
