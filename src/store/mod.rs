//! Typed key/value + pub-sub facade over a shared backing store.
//!
//! `Store<B>` is generic over [`StoreBackend`] the same way [`crate::wallet::Wallet`]
//! is generic over [`crate::traits::ChainProvider`]: production code plugs in
//! [`InMemoryBackend`] (or a Redis-compatible backend behind the same trait),
//! tests plug in [`crate::testing::FakeStoreBackend`].

mod backend;
mod memory;
mod schema;

pub use backend::StoreBackend;
pub use memory::InMemoryBackend;
pub use schema::{KeyChangeAction, KeyChangeNotification, AMB_CHANNEL, KEY_CHANGE_CHANNEL};

use alloy_primitives::{Address, TxHash, U256, B256};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, instrument};

use crate::error::Result;
use crate::types::{AmbMessage, AmbPayload, Bounty, BountyStatus, MessageIdentifier};

pub struct Store<B: StoreBackend> {
    backend: Arc<B>,
}

// Written by hand rather than `#[derive(Clone)]`: the derive would add a
// `B: Clone` bound even though only the `Arc` is ever cloned.
impl<B: StoreBackend> Clone for Store<B> {
    fn clone(&self) -> Self {
        Self { backend: self.backend.clone() }
    }
}

impl<B: StoreBackend> Store<B> {
    pub fn new(backend: B) -> Self {
        Self {
            backend: Arc::new(backend),
        }
    }

    /// Reads the current bounty for `message_identifier`, if any.
    pub async fn get_bounty(&self, message_identifier: MessageIdentifier) -> Result<Option<Bounty>> {
        let Some(raw) = self.backend.get(&schema::bounty_key(message_identifier)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    pub async fn get_amb(&self, message_identifier: MessageIdentifier) -> Result<Option<AmbMessage>> {
        let Some(raw) = self.backend.get(&schema::amb_key(message_identifier)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Writes `value` at `key` and fires the generic `relayer:key` change
    /// notification. The set-then-publish pair is not transactional: a
    /// racing subscriber may observe the notification before (or instead
    /// of) the fresh value; callers tolerate eventual consistency.
    async fn set_notifying(&self, key: &str, value: String) -> Result<()> {
        self.backend.set(key, value).await?;
        let notification = KeyChangeNotification {
            key: key.to_string(),
            action: KeyChangeAction::Set,
        };
        self.backend
            .publish(KEY_CHANGE_CHANNEL, serde_json::to_string(&notification)?)
            .await
    }

    async fn del_notifying(&self, key: &str) -> Result<()> {
        self.backend.del(key).await?;
        let notification = KeyChangeNotification {
            key: key.to_string(),
            action: KeyChangeAction::Del,
        };
        self.backend
            .publish(KEY_CHANGE_CHANNEL, serde_json::to_string(&notification)?)
            .await
    }

    async fn put_bounty(&self, bounty: &Bounty) -> Result<()> {
        let key = schema::bounty_key(bounty.message_identifier);
        self.set_notifying(&key, serde_json::to_string(bounty)?).await
    }

    /// Creates-or-merges a [`Bounty`] from a `BountyPlaced` event. On
    /// conflict, the on-disk version's non-null fields win over the
    /// freshly constructed one — i.e. we merge the *new* data into the
    /// *existing* record, not the reverse.
    #[instrument(skip(self, bounty), fields(message_identifier = %bounty.message_identifier))]
    pub async fn register_bounty_placed(&self, bounty: Bounty) -> Result<()> {
        let mut current = self
            .get_bounty(bounty.message_identifier)
            .await?
            .unwrap_or_else(|| Bounty::sparse(bounty.message_identifier, bounty.from_chain_id, BountyStatus::BountyPlaced));
        current.merge(bounty);
        debug!(status = ?current.status, "bounty placed registered");
        self.put_bounty(&current).await
    }

    /// Lazily creates a sparse [`Bounty`] if the source-side event was
    /// missed, then advances status to at least `MessageDelivered`.
    #[instrument(skip(self))]
    pub async fn register_message_delivered(
        &self,
        message_identifier: MessageIdentifier,
        from_chain_id: u64,
        to_chain_id: u64,
        exec_transaction_hash: TxHash,
    ) -> Result<()> {
        let mut current = self
            .get_bounty(message_identifier)
            .await?
            .unwrap_or_else(|| Bounty::sparse(message_identifier, from_chain_id, BountyStatus::BountyPlaced));

        let mut update = Bounty::sparse(message_identifier, from_chain_id, BountyStatus::MessageDelivered);
        update.to_chain_id = Some(to_chain_id);
        update.exec_transaction_hash = Some(exec_transaction_hash);

        current.merge(update);
        self.put_bounty(&current).await
    }

    #[instrument(skip(self))]
    pub async fn register_bounty_claimed(
        &self,
        message_identifier: MessageIdentifier,
        from_chain_id: u64,
        ack_transaction_hash: TxHash,
    ) -> Result<()> {
        let mut current = self
            .get_bounty(message_identifier)
            .await?
            .unwrap_or_else(|| Bounty::sparse(message_identifier, from_chain_id, BountyStatus::BountyPlaced));

        let mut update = Bounty::sparse(message_identifier, from_chain_id, BountyStatus::BountyClaimed);
        update.ack_transaction_hash = Some(ack_transaction_hash);

        current.merge(update);
        self.put_bounty(&current).await
    }

    /// Field-wise max of `priceOfDeliveryGas`/`priceOfAckGas`; a no-op write
    /// if neither strictly increases (still writes, since the merge is
    /// idempotent and cheap; the invariant is about the *stored value*,
    /// not about skipping redundant writes).
    #[instrument(skip(self))]
    pub async fn register_bounty_increased(
        &self,
        message_identifier: MessageIdentifier,
        from_chain_id: u64,
        new_delivery_gas_price: U256,
        new_ack_gas_price: U256,
    ) -> Result<()> {
        let mut current = self
            .get_bounty(message_identifier)
            .await?
            .unwrap_or_else(|| Bounty::sparse(message_identifier, from_chain_id, BountyStatus::BountyPlaced));

        current.register_bounty_increased(new_delivery_gas_price, new_ack_gas_price);
        self.put_bounty(&current).await
    }

    pub async fn register_destination_address(
        &self,
        message_identifier: MessageIdentifier,
        from_chain_id: u64,
        destination_address: Address,
    ) -> Result<()> {
        let mut current = self
            .get_bounty(message_identifier)
            .await?
            .unwrap_or_else(|| Bounty::sparse(message_identifier, from_chain_id, BountyStatus::BountyPlaced));
        if current.destination_address.is_none() {
            current.destination_address = Some(destination_address);
        }
        self.put_bounty(&current).await
    }

    /// Records the gas cost of a *delivery*. Ack (return-leg) cost is
    /// intentionally never registered here — see DESIGN.md's decision on
    /// the reference's unresolved open question.
    pub async fn register_delivery_cost(
        &self,
        message_identifier: MessageIdentifier,
        from_chain_id: u64,
        delivery_gas_cost: U256,
    ) -> Result<()> {
        let mut current = self
            .get_bounty(message_identifier)
            .await?
            .unwrap_or_else(|| Bounty::sparse(message_identifier, from_chain_id, BountyStatus::BountyPlaced));
        current.delivery_gas_cost = Some(delivery_gas_cost);
        self.put_bounty(&current).await
    }

    /// Stores the raw [`AmbMessage`] keyed by its `messageIdentifier`.
    pub async fn set_amb(&self, amb: &AmbMessage) -> Result<()> {
        let key = schema::amb_key(amb.message_identifier);
        self.set_notifying(&key, serde_json::to_string(amb)?).await
    }

    /// Secondary index used only by the LayerZero collector, so a later
    /// peer attestation can be correlated back to the message by payload
    /// hash. No corresponding publish-to-`submit-*` happens here: that
    /// step awaits an attestation path outside this crate's scope.
    pub async fn set_payload_layer_zero_amb(&self, payload_hash: B256, amb: &AmbMessage) -> Result<()> {
        let key = schema::layerzero_payload_key(&payload_hash);
        self.set_notifying(&key, serde_json::to_string(amb)?).await
    }

    pub async fn get_payload_layer_zero_amb(&self, payload_hash: B256) -> Result<Option<AmbMessage>> {
        let Some(raw) = self.backend.get(&schema::layerzero_payload_key(&payload_hash)).await? else {
            return Ok(None);
        };
        Ok(Some(serde_json::from_str(&raw)?))
    }

    /// Publishes a delivery-ready payload on `submit-<destinationChainId>`.
    #[instrument(skip(self, payload), fields(message_identifier = %payload.message_identifier))]
    pub async fn submit_proof(&self, destination_chain_id: u64, payload: &AmbPayload) -> Result<()> {
        let channel = schema::submit_channel(destination_chain_id);
        self.backend
            .publish(&channel, serde_json::to_string(payload)?)
            .await
    }

    /// Subscribes to the submit bus for `chain_id`, receiving [`AmbPayload`]s
    /// published for that chain.
    pub fn subscribe_submit(&self, chain_id: u64) -> broadcast::Receiver<String> {
        self.backend.subscribe(&schema::submit_channel(chain_id))
    }

    pub fn subscribe_key_changes(&self) -> broadcast::Receiver<String> {
        self.backend.subscribe(KEY_CHANGE_CHANNEL)
    }

    pub async fn delete_bounty(&self, message_identifier: MessageIdentifier) -> Result<()> {
        self.del_notifying(&schema::bounty_key(message_identifier)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, U256};

    fn id() -> MessageIdentifier {
        MessageIdentifier::new([0x42; 32])
    }

    fn store() -> Store<InMemoryBackend> {
        Store::new(InMemoryBackend::new())
    }

    #[tokio::test]
    async fn out_of_order_delivery_then_placed_preserves_max_status() {
        let store = store();

        store
            .register_message_delivered(id(), 1, 2, TxHash::repeat_byte(0x01))
            .await
            .unwrap();

        let mut placed = Bounty::sparse(id(), 1, BountyStatus::BountyPlaced);
        placed.max_gas_delivery = U256::from(200_000u64);
        placed.price_of_delivery_gas = U256::from(1_000_000_000u64);
        placed.source_address = address!("0000000000000000000000000000000000000001");
        store.register_bounty_placed(placed).await.unwrap();

        let bounty = store.get_bounty(id()).await.unwrap().unwrap();
        assert_eq!(bounty.status, BountyStatus::MessageDelivered);
        assert_eq!(bounty.max_gas_delivery, U256::from(200_000u64));
        assert_eq!(bounty.to_chain_id, Some(2));
    }

    #[tokio::test]
    async fn bounty_increased_sequence_converges_to_max() {
        let store = store();
        for price in [10u64, 20, 15, 25] {
            store
                .register_bounty_increased(id(), 1, U256::from(price), U256::ZERO)
                .await
                .unwrap();
        }
        let bounty = store.get_bounty(id()).await.unwrap().unwrap();
        assert_eq!(bounty.price_of_delivery_gas, U256::from(25u64));
    }

    #[tokio::test]
    async fn claimed_then_placed_does_not_regress_status() {
        let store = store();
        store
            .register_bounty_claimed(id(), 1, TxHash::repeat_byte(0x02))
            .await
            .unwrap();

        store
            .register_bounty_placed(Bounty::sparse(id(), 1, BountyStatus::BountyPlaced))
            .await
            .unwrap();

        let bounty = store.get_bounty(id()).await.unwrap().unwrap();
        assert_eq!(bounty.status, BountyStatus::BountyClaimed);
    }

    #[tokio::test]
    async fn set_notifying_publishes_key_change() {
        let store = store();
        let mut rx = store.subscribe_key_changes();

        store
            .register_bounty_placed(Bounty::sparse(id(), 1, BountyStatus::BountyPlaced))
            .await
            .unwrap();

        let raw = rx.recv().await.unwrap();
        let notification: KeyChangeNotification = serde_json::from_str(&raw).unwrap();
        assert_eq!(notification.action, KeyChangeAction::Set);
    }
}
