//! Mock AMB collector: a signed-message bridge used as the protocol's
//! reference implementation (§4.6).
//!
//! The Mock bridge requires no on-chain attestation at all — the relayer
//! itself is the trusted oracle, and "delivery proof" is just its own
//! signature over the message bytes. This is what lets the rest of the
//! pipeline be exercised end to end without a real bridge dependency.

use std::sync::Arc;

use alloy_primitives::{keccak256, Address, U256};
use alloy_rpc_types::Log;
use alloy_signer::Signer;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::{SolEvent, SolValue};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::instrument;

use super::CollectorConfig;
use crate::chain_events::Message;
use crate::error::{RelayerError, Result};
use crate::garp;
use crate::monitor::MonitorStatus;
use crate::scan::{ScanConfig, Scanner};
use crate::store::{Store, StoreBackend};
use crate::traits::{ChainProvider, Clock};
use crate::types::{AmbKind, AmbMessage, AmbPayload};

pub struct MockCollector<P: ChainProvider, C: Clock, B: StoreBackend> {
    config: CollectorConfig,
    provider: Arc<P>,
    clock: Arc<C>,
    store: Store<B>,
    monitor: watch::Receiver<MonitorStatus>,
    signer: PrivateKeySigner,
}

impl<P: ChainProvider + 'static, C: Clock + 'static, B: StoreBackend + 'static> MockCollector<P, C, B> {
    pub fn new(
        config: CollectorConfig,
        provider: Arc<P>,
        clock: Arc<C>,
        store: Store<B>,
        monitor: watch::Receiver<MonitorStatus>,
        signer: PrivateKeySigner,
    ) -> Self {
        Self { config, provider, clock, store, monitor, signer }
    }

    pub fn spawn(self) -> JoinHandle<Result<()>> {
        tokio::spawn(self.run())
    }

    #[instrument(skip(self), fields(chain_id = self.config.chain_id, amb = "mock"))]
    async fn run(self) -> Result<()> {
        let scan_config = ScanConfig {
            chain_id: self.config.chain_id,
            address: self.config.scan_address,
            topics: vec![Message::SIGNATURE_HASH],
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
        let signer = self.signer;
        let scanner = Scanner::new(scan_config, self.provider, self.clock, self.monitor);

        scanner
            .run(move |log| {
                handle_message_log(source_chain, incentives_address, priority, store.clone(), signer.clone(), log)
            })
            .await
    }
}

async fn handle_message_log<B: StoreBackend>(
    source_chain: u64,
    incentives_address: Address,
    priority: bool,
    store: Store<B>,
    signer: PrivateKeySigner,
    log: Log,
) -> Result<()> {
    let event = log
        .log_decode::<Message>()
        .map_err(|e| RelayerError::Decode { what: "Message", reason: e.to_string() })?;
    let data = event.inner.data;

    let destination_chain: u64 = data.destinationIdentifier.try_into().map_err(|_| RelayerError::Decode {
        what: "Message.destinationIdentifier",
        reason: "value does not fit in u64".into(),
    })?;
    let garp_message = garp::decode(&data.message)?;
    let recipient = Address::from_word(data.recipient);

    let amb = AmbMessage {
        message_identifier: garp_message.message_identifier,
        amb: AmbKind::Mock,
        source_chain,
        destination_chain,
        source_escrow: incentives_address,
        payload: data.message.clone(),
        recovery_context: None,
        priority,
        source_block_number: log.block_number.unwrap_or_default(),
        source_block_hash: log.block_hash.unwrap_or_default(),
    };
    store.set_amb(&amb).await?;
    store
        .register_destination_address(garp_message.message_identifier, source_chain, recipient)
        .await?;

    let message_ctx = sign_message(&signer, incentives_address, &data.message).await?;

    let payload = AmbPayload {
        message_identifier: garp_message.message_identifier,
        amb: AmbKind::Mock,
        destination_chain_id: destination_chain,
        message: data.message,
        message_ctx: Some(message_ctx),
        priority,
    };
    store.submit_proof(destination_chain, &payload).await
}

/// Signs `keccak256(concat(incentivesAddressBytes32, message))` and encodes
/// the signature the way the escrow's Mock verifier expects it:
/// `abi.encode(uint8 v, uint256 r, uint256 s)`, with `v` in the
/// conventional 27/28 form rather than a bare y-parity bit.
async fn sign_message(signer: &PrivateKeySigner, incentives_address: Address, message: &[u8]) -> Result<alloy_primitives::Bytes> {
    let mut preimage = Vec::with_capacity(32 + message.len());
    preimage.extend_from_slice(incentives_address.into_word().as_slice());
    preimage.extend_from_slice(message);
    let digest = keccak256(&preimage);

    let signature = signer
        .sign_hash(&digest)
        .await
        .map_err(|e| RelayerError::Signing(e.to_string()))?;

    let v: u8 = 27 + u8::from(signature.v());
    let r = signature.r();
    let s = signature.s();
    Ok((v, r, s).abi_encode_params().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryBackend;
    use alloy_primitives::{Bytes, B256};
    use alloy_sol_types::LogData;

    fn signer() -> PrivateKeySigner {
        PrivateKeySigner::random()
    }

    fn garp_payload(identifier: [u8; 32]) -> Vec<u8> {
        let mut bytes = vec![0x01u8];
        bytes.extend_from_slice(&identifier);
        bytes.extend_from_slice(Address::repeat_byte(0x01).as_slice());
        bytes.extend_from_slice(Address::repeat_byte(0x02).as_slice());
        bytes.extend_from_slice(b"payload");
        bytes
    }

    fn message_log(chain_address: Address, identifier: [u8; 32]) -> Log {
        let event = Message {
            destinationIdentifier: U256::from(2u64),
            recipient: B256::from(Address::repeat_byte(0x09).into_word()),
            message: Bytes::from(garp_payload(identifier)),
        };
        let topics = vec![Message::SIGNATURE_HASH, B256::from(U256::from(2u64).to_be_bytes::<32>())];
        Log {
            inner: alloy_primitives::Log { address: chain_address, data: LogData::new_unchecked(topics, event.encode_data().into()) },
            block_hash: Some(B256::repeat_byte(0xcc)),
            block_number: Some(10),
            block_timestamp: None,
            transaction_hash: Some(B256::repeat_byte(0x03)),
            transaction_index: Some(0),
            log_index: Some(0),
            removed: false,
        }
    }

    #[tokio::test]
    async fn handles_message_log_and_publishes_payload() {
        let store = Store::new(InMemoryBackend::new());
        let log = message_log(Address::repeat_byte(0x77), [0xCD; 32]);

        let mut rx = store.subscribe_submit(2);
        handle_message_log(1, Address::repeat_byte(0x77), false, store.clone(), signer(), log)
            .await
            .unwrap();

        let published = rx.recv().await.unwrap();
        let payload: AmbPayload = serde_json::from_str(&published).unwrap();
        assert!(payload.message_ctx.is_some());
        assert_eq!(payload.destination_chain_id, 2);
    }

    #[tokio::test]
    async fn signature_round_trips_to_the_signer_address() {
        let signer = signer();
        let incentives_address = Address::repeat_byte(0x55);
        let message = b"deliver this";

        let encoded = sign_message(&signer, incentives_address, message).await.unwrap();
        let (v, r, s) = <(u8, U256, U256)>::abi_decode_params(&encoded).unwrap();

        let mut preimage = Vec::new();
        preimage.extend_from_slice(incentives_address.into_word().as_slice());
        preimage.extend_from_slice(message);
        let digest = keccak256(&preimage);

        let recovered_signature = alloy_primitives::Signature::from_scalars_and_parity(r.into(), s.into(), (v - 27) != 0);
        let recovered = recovered_signature.recover_address_from_prehash(&digest).unwrap();
        assert_eq!(recovered, signer.address());
    }
}
