//! The block-window scanning loop shared by the Getter and every Collector
//! (§4.5, §4.6: "using the same block-window loop as the Getter").

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::{Address, B256};
use alloy_rpc_types::Log;
use tokio::sync::watch;
use tracing::{debug, instrument, warn};

use crate::error::Result;
use crate::monitor::MonitorStatus;
use crate::traits::{ChainProvider, Clock, LogFilter};

/// Parameters common to a Getter or a Collector's scan loop.
#[derive(Debug, Clone)]
pub struct ScanConfig {
    pub chain_id: u64,
    pub address: Address,
    pub topics: Vec<B256>,
    pub max_blocks: u64,
    pub starting_block: Option<u64>,
    pub stopping_block: Option<u64>,
    pub processing_interval: Duration,
    pub retry_interval: Duration,
}

/// Drives one `[fromBlock, toBlock]` window per tick against `provider`,
/// handing the fetched logs to `on_logs`, until `stoppingBlock` (if any) is
/// reached. Transport failures are retried indefinitely; the caller decides
/// what to do with a single log's decode failure inside `on_logs`.
pub struct Scanner<P: ChainProvider, C: Clock> {
    config: ScanConfig,
    provider: Arc<P>,
    clock: Arc<C>,
    monitor: watch::Receiver<MonitorStatus>,
}

impl<P: ChainProvider, C: Clock> Scanner<P, C> {
    pub fn new(
        config: ScanConfig,
        provider: Arc<P>,
        clock: Arc<C>,
        monitor: watch::Receiver<MonitorStatus>,
    ) -> Self {
        Self { config, provider, clock, monitor }
    }

    #[instrument(skip(self, on_logs), fields(chain_id = self.config.chain_id))]
    pub async fn run<F, Fut>(mut self, mut on_logs: F) -> Result<()>
    where
        F: FnMut(Log) -> Fut,
        Fut: std::future::Future<Output = Result<()>>,
    {
        let mut from_block = self.config.starting_block.unwrap_or_else(|| self.monitor.borrow().block_number);

        loop {
            let tip = self.monitor.borrow().block_number;
            let mut to_block = (from_block + self.config.max_blocks).min(tip);
            if let Some(stopping) = self.config.stopping_block {
                to_block = to_block.min(stopping);
            }

            if to_block < from_block {
                self.clock.sleep(self.config.processing_interval).await;
                continue;
            }

            let logs = self.fetch_logs_with_retry(from_block, to_block).await;
            debug!(from_block, to_block, log_count = logs.len(), "scanned block window");

            for log in logs {
                if let Err(err) = on_logs(log).await {
                    if err.is_decoding() {
                        warn!(%err, "skipping undecodable log");
                        continue;
                    }
                    return Err(err);
                }
            }

            from_block = to_block + 1;

            if let Some(stopping) = self.config.stopping_block {
                if to_block >= stopping {
                    debug!(stopping, "scanner reached stopping block, exiting");
                    return Ok(());
                }
            }

            self.clock.sleep(self.config.processing_interval).await;
        }
    }

    async fn fetch_logs_with_retry(&self, from_block: u64, to_block: u64) -> Vec<Log> {
        let filter = LogFilter {
            address: self.config.address,
            topic0: self.config.topics.clone(),
            from_block,
            to_block,
        };

        loop {
            match self.provider.get_logs(&filter).await {
                Ok(logs) => return logs,
                Err(err) => {
                    warn!(%err, from_block, to_block, "get_logs failed, retrying");
                    self.clock.sleep(self.config.retry_interval).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{FakeChainProvider, FakeClock};
    use alloy_primitives::Address;

    // The bounded-catch-up block-window scenario (§8 scenario 6) lives in
    // tests/relayer_integration_tests.rs alongside the Wallet repricing
    // scenario, matching the teacher's split between inline unit tests and
    // its cross-module `tests/bridge_integration_tests.rs`.

    #[tokio::test]
    async fn starting_block_defaults_to_current_tip() {
        let provider = Arc::new(FakeChainProvider::new().with_block_number(1_000));
        let clock = Arc::new(FakeClock::new());
        let (_tx, rx) = watch::channel(MonitorStatus { block_number: 1_000 });

        let config = ScanConfig {
            chain_id: 1,
            address: Address::ZERO,
            topics: vec![],
            max_blocks: 10,
            starting_block: None,
            stopping_block: Some(1_000),
            processing_interval: Duration::from_millis(1),
            retry_interval: Duration::from_millis(1),
        };

        let scanner = Scanner::new(config, provider.clone(), clock, rx);
        scanner.run(|_log| async { Ok(()) }).await.unwrap();

        assert_eq!(provider.get_logs_calls(), vec![(1_000, 1_000)]);
    }
}
