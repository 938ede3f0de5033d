//! Per-chain event scanner over the incentivized escrow (§4.5).
//!
//! A single [`Getter`] scans one chain's escrow contract for the four
//! bounty lifecycle events and dispatches each decoded log to the matching
//! [`crate::store::Store::register_*`] method. It never polls for the tip
//! itself — that's the [`crate::monitor::Monitor`]'s job.

use std::sync::Arc;
use std::time::Duration;

use alloy_primitives::Address;
use alloy_rpc_types::Log;
use alloy_sol_types::SolEvent;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{instrument, warn};

use crate::chain_events::{BountyClaimed, BountyIncreased, BountyPlaced, MessageDelivered};
use crate::error::{RelayerError, Result};
use crate::monitor::MonitorStatus;
use crate::scan::{ScanConfig, Scanner};
use crate::store::{Store, StoreBackend};
use crate::traits::{ChainProvider, Clock};
use crate::types::{Bounty, BountyStatus, MessageIdentifier};

#[derive(Debug, Clone)]
pub struct GetterConfig {
    pub chain_id: u64,
    pub incentives_address: Address,
    pub max_blocks: u64,
    pub starting_block: Option<u64>,
    pub stopping_block: Option<u64>,
    pub processing_interval: Duration,
    pub retry_interval: Duration,
}

pub struct Getter<P: ChainProvider, C: Clock, B: StoreBackend> {
    config: GetterConfig,
    provider: Arc<P>,
    clock: Arc<C>,
    store: Store<B>,
    monitor: watch::Receiver<MonitorStatus>,
}

impl<P: ChainProvider + 'static, C: Clock + 'static, B: StoreBackend + 'static> Getter<P, C, B> {
    pub fn new(
        config: GetterConfig,
        provider: Arc<P>,
        clock: Arc<C>,
        store: Store<B>,
        monitor: watch::Receiver<MonitorStatus>,
    ) -> Self {
        Self { config, provider, clock, store, monitor }
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    #[instrument(skip(self), fields(chain_id = self.config.chain_id))]
    async fn run(self) -> Result<()> {
        let topics = vec![
            BountyPlaced::SIGNATURE_HASH,
            MessageDelivered::SIGNATURE_HASH,
            BountyClaimed::SIGNATURE_HASH,
            BountyIncreased::SIGNATURE_HASH,
        ];

        let scan_config = ScanConfig {
            chain_id: self.config.chain_id,
            address: self.config.incentives_address,
            topics,
            max_blocks: self.config.max_blocks,
            starting_block: self.config.starting_block,
            stopping_block: self.config.stopping_block,
            processing_interval: self.config.processing_interval,
            retry_interval: self.config.retry_interval,
        };

        let chain_id = self.config.chain_id;
        let store = self.store;
        let scanner = Scanner::new(scan_config, self.provider, self.clock, self.monitor);

        scanner.run(move |log| dispatch_log(chain_id, store.clone(), log)).await
    }
}

async fn dispatch_log<B: StoreBackend>(chain_id: u64, store: Store<B>, log: Log) -> Result<()> {
    let Some(topic0) = log.topics().first().copied() else {
        return Err(RelayerError::Decode { what: "escrow log", reason: "missing topic0".into() });
    };
    let tx_hash = log.transaction_hash.unwrap_or_default();

    if topic0 == BountyPlaced::SIGNATURE_HASH {
        let event = log
            .log_decode::<BountyPlaced>()
            .map_err(|e| RelayerError::Decode { what: "BountyPlaced", reason: e.to_string() })?;
        let data = event.inner.data;
        let bounty = Bounty {
            message_identifier: MessageIdentifier::from(data.messageIdentifier),
            from_chain_id: chain_id,
            to_chain_id: None,
            max_gas_delivery: data.maxGasDelivery,
            max_gas_ack: data.maxGasAck,
            refund_gas_to: data.refundGasTo,
            price_of_delivery_gas: data.priceOfDeliveryGas,
            price_of_ack_gas: data.priceOfAckGas,
            target_delta: data.targetDelta,
            status: BountyStatus::BountyPlaced,
            source_address: data.sourceAddress,
            destination_address: None,
            finalised: false,
            submit_transaction_hash: Some(tx_hash),
            exec_transaction_hash: None,
            ack_transaction_hash: None,
            delivery_gas_cost: None,
        };
        store.register_bounty_placed(bounty).await?;
    } else if topic0 == MessageDelivered::SIGNATURE_HASH {
        let event = log
            .log_decode::<MessageDelivered>()
            .map_err(|e| RelayerError::Decode { what: "MessageDelivered", reason: e.to_string() })?;
        let data = event.inner.data;
        let from_chain_id: u64 = data.fromChainId.try_into().map_err(|_| RelayerError::Decode {
            what: "MessageDelivered.fromChainId",
            reason: "value does not fit in u64".into(),
        })?;
        store
            .register_message_delivered(MessageIdentifier::from(data.messageIdentifier), from_chain_id, chain_id, tx_hash)
            .await?;
    } else if topic0 == BountyClaimed::SIGNATURE_HASH {
        let event = log
            .log_decode::<BountyClaimed>()
            .map_err(|e| RelayerError::Decode { what: "BountyClaimed", reason: e.to_string() })?;
        let data = event.inner.data;
        store
            .register_bounty_claimed(MessageIdentifier::from(data.messageIdentifier), chain_id, tx_hash)
            .await?;
    } else if topic0 == BountyIncreased::SIGNATURE_HASH {
        let event = log
            .log_decode::<BountyIncreased>()
            .map_err(|e| RelayerError::Decode { what: "BountyIncreased", reason: e.to_string() })?;
        let data = event.inner.data;
        store
            .register_bounty_increased(
                MessageIdentifier::from(data.messageIdentifier),
                chain_id,
                data.newDeliveryGasPrice,
                data.newAckGasPrice,
            )
            .await?;
    } else {
        warn!(?topic0, "ignoring log with unrecognized topic0");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBackend;
    use crate::testing::{FakeChainProvider, FakeClock};
    use alloy_primitives::{LogData, B256, U256};
    use alloy_sol_types::SolEvent;

    fn test_log(address: Address, topics: Vec<B256>, data: alloy_primitives::Bytes, tx_hash: B256) -> Log {
        Log {
            inner: alloy_primitives::Log { address, data: LogData::new_unchecked(topics, data) },
            block_hash: Some(B256::repeat_byte(0xbb)),
            block_number: Some(1),
            block_timestamp: None,
            transaction_hash: Some(tx_hash),
            transaction_index: Some(0),
            log_index: Some(0),
            removed: false,
        }
    }

    fn bounty_placed_log(chain_address: Address, message_identifier: [u8; 32]) -> Log {
        let event = BountyPlaced {
            messageIdentifier: B256::from(message_identifier),
            maxGasDelivery: U256::from(200_000u64),
            maxGasAck: U256::from(100_000u64),
            refundGasTo: Address::repeat_byte(0x22),
            priceOfDeliveryGas: U256::from(1_000_000_000u64),
            priceOfAckGas: U256::from(1_000_000_000u64),
            targetDelta: U256::ZERO,
            sourceAddress: Address::repeat_byte(0x11),
        };
        let topics = vec![BountyPlaced::SIGNATURE_HASH, B256::from(message_identifier)];
        test_log(chain_address, topics, event.encode_data().into(), B256::repeat_byte(0x01))
    }

    #[tokio::test]
    async fn dispatches_bounty_placed_to_store() {
        let store = Store::new(InMemoryBackend::new());
        let log = bounty_placed_log(Address::repeat_byte(0x99), [0xAB; 32]);

        dispatch_log(1, store.clone(), log).await.unwrap();

        let id = MessageIdentifier::new([0xAB; 32]);
        let bounty = store.get_bounty(id).await.unwrap().unwrap();
        assert_eq!(bounty.from_chain_id, 1);
        assert_eq!(bounty.max_gas_delivery, U256::from(200_000u64));
        assert_eq!(bounty.status, BountyStatus::BountyPlaced);
    }

    #[tokio::test]
    async fn unrecognized_topic_is_skipped_not_errored() {
        let store = Store::new(InMemoryBackend::new());
        let log = test_log(Address::ZERO, vec![B256::repeat_byte(0xFF)], Default::default(), B256::ZERO);
        dispatch_log(1, store, log).await.unwrap();
    }

    #[tokio::test]
    async fn run_exits_cleanly_at_stopping_block() {
        let provider = Arc::new(FakeChainProvider::new().with_block_number(200));
        let clock = Arc::new(FakeClock::new());
        let store = Store::new(InMemoryBackend::new());
        let (_tx, rx) = watch::channel(MonitorStatus { block_number: 200 });

        let config = GetterConfig {
            chain_id: 1,
            incentives_address: Address::ZERO,
            max_blocks: 100,
            starting_block: Some(0),
            stopping_block: Some(200),
            processing_interval: Duration::from_millis(1),
            retry_interval: Duration::from_millis(1),
        };

        let getter = Getter::new(config, provider, clock, store, rx);
        getter.run().await.unwrap();
    }
}
