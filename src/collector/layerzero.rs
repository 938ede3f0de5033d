//! LayerZero V2 endpoint sniffer collector (§4.6).
//!
//! Unlike the Mock collector, LayerZero requires a peer attestation before a
//! delivery can be submitted; that attestation path is outside this crate's
//! scope (§9 Open Question). This collector only does the half of the job
//! that is in scope: observe outbound packets, decode them, and index the
//! one this relayer's escrow actually sent so a later attestation event can
//! be correlated back to it.

use std::sync::Arc;

use alloy_primitives::{keccak256, Address, B256};
use alloy_rpc_types::Log;
use alloy_sol_types::{SolEvent, SolValue};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{instrument, trace};

use super::CollectorConfig;
use crate::chain_events::{Packet, PacketSent};
use crate::error::{RelayerError, Result};
use crate::garp;
use crate::monitor::MonitorStatus;
use crate::scan::{ScanConfig, Scanner};
use crate::store::{Store, StoreBackend};
use crate::traits::{ChainProvider, Clock};
use crate::types::{AmbKind, AmbMessage};

pub struct LayerZeroCollector<P: ChainProvider, C: Clock, B: StoreBackend> {
    config: CollectorConfig,
    provider: Arc<P>,
    clock: Arc<C>,
    store: Store<B>,
    monitor: watch::Receiver<MonitorStatus>,
}

impl<P: ChainProvider + 'static, C: Clock + 'static, B: StoreBackend + 'static> LayerZeroCollector<P, C, B> {
    pub fn new(
        config: CollectorConfig,
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

    #[instrument(skip(self), fields(chain_id = self.config.chain_id, amb = "layerzero"))]
    async fn run(self) -> Result<()> {
        let scan_config = ScanConfig {
            chain_id: self.config.chain_id,
            address: self.config.scan_address,
            topics: vec![PacketSent::SIGNATURE_HASH],
            max_blocks: self.config.max_blocks,
            starting_block: self.config.starting_block,
            stopping_block: self.config.stopping_block,
            processing_interval: self.config.processing_interval,
            retry_interval: self.config.retry_interval,
        };

        let source_chain = self.config.chain_id;
        let incentives_address = self.config.incentives_address;
        let priority = self.config.priority;
        let store = self.store;
        let scanner = Scanner::new(scan_config, self.provider, self.clock, self.monitor);

        scanner
            .run(move |log| handle_packet_sent_log(source_chain, incentives_address, priority, store.clone(), log))
            .await
    }
}

async fn handle_packet_sent_log<B: StoreBackend>(
    source_chain: u64,
    incentives_address: Address,
    priority: bool,
    store: Store<B>,
    log: Log,
) -> Result<()> {
    let event = log
        .log_decode::<PacketSent>()
        .map_err(|e| RelayerError::Decode { what: "PacketSent", reason: e.to_string() })?;
    let data = event.inner.data;

    let packet = Packet::abi_decode(&data.encodedPacket)
        .map_err(|e| RelayerError::Decode { what: "LayerZero Packet", reason: e.to_string() })?;

    if packet.sender != incentives_address {
        trace!(sender = %packet.sender, "packet sender is not our escrow, ignoring");
        return Ok(());
    }

    let garp_message = garp::decode(&packet.message)?;
    let destination_chain = u64::from(packet.dstEid);

    let amb = AmbMessage {
        message_identifier: garp_message.message_identifier,
        amb: AmbKind::LayerZero,
        source_chain,
        destination_chain,
        source_escrow: incentives_address,
        payload: packet.message.clone(),
        recovery_context: Some(data.encodedPacket.clone()),
        priority,
        source_block_number: log.block_number.unwrap_or_default(),
        source_block_hash: log.block_hash.unwrap_or_default(),
    };
    store.set_amb(&amb).await?;

    let payload_hash = payload_hash(packet.guid, &packet.message);
    store.set_payload_layer_zero_amb(payload_hash, &amb).await
}

/// `keccak256(abi.encode(bytes32 guid, bytes message))`, used as the
/// correlation key between an outbound packet and its eventual peer
/// attestation.
fn payload_hash(guid: B256, message: &[u8]) -> B256 {
    keccak256((guid, alloy_primitives::Bytes::copy_from_slice(message)).abi_encode_params())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBackend;
    use alloy_primitives::Bytes;
    use alloy_sol_types::LogData;

    fn garp_payload(identifier: [u8; 32]) -> Vec<u8> {
        let mut bytes = vec![0x02u8];
        bytes.extend_from_slice(&identifier);
        bytes.extend_from_slice(Address::repeat_byte(0x01).as_slice());
        bytes.extend_from_slice(Address::repeat_byte(0x02).as_slice());
        bytes.extend_from_slice(b"payload");
        bytes
    }

    fn packet_sent_log(endpoint: Address, sender: Address, identifier: [u8; 32]) -> Log {
        let packet = Packet {
            nonce: 1,
            srcEid: 101,
            sender,
            dstEid: 102,
            receiver: Address::repeat_byte(0x03),
            guid: B256::repeat_byte(0x09),
            message: Bytes::from(garp_payload(identifier)),
        };
        let event = PacketSent {
            encodedPacket: Bytes::from(packet.abi_encode()),
            options: Bytes::new(),
            sendLibrary: Address::repeat_byte(0x04),
        };
        let topics = vec![PacketSent::SIGNATURE_HASH];
        Log {
            inner: alloy_primitives::Log { address: endpoint, data: LogData::new_unchecked(topics, event.encode_data().into()) },
            block_hash: Some(B256::repeat_byte(0xdd)),
            block_number: Some(20),
            block_timestamp: None,
            transaction_hash: Some(B256::repeat_byte(0x05)),
            transaction_index: Some(0),
            log_index: Some(0),
            removed: false,
        }
    }

    #[tokio::test]
    async fn indexes_packet_from_our_escrow_by_payload_hash() {
        let store = Store::new(InMemoryBackend::new());
        let incentives_address = Address::repeat_byte(0x77);
        let log = packet_sent_log(Address::repeat_byte(0x99), incentives_address, [0xEF; 32]);

        handle_packet_sent_log(1, incentives_address, false, store.clone(), log).await.unwrap();

        let identifier = crate::types::MessageIdentifier::new([0xEF; 32]);
        let amb = store.get_amb(identifier).await.unwrap().unwrap();
        assert_eq!(amb.destination_chain, 102);
    }

    #[tokio::test]
    async fn ignores_packet_from_other_senders() {
        let store = Store::new(InMemoryBackend::new());
        let incentives_address = Address::repeat_byte(0x77);
        let log = packet_sent_log(Address::repeat_byte(0x99), Address::repeat_byte(0x01), [0xEF; 32]);

        handle_packet_sent_log(1, incentives_address, false, store.clone(), log).await.unwrap();

        let identifier = crate::types::MessageIdentifier::new([0xEF; 32]);
        assert!(store.get_amb(identifier).await.unwrap().is_none());
    }
}
