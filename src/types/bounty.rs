//! The per-message bounty record and its monotonic merge rule.

use alloy_primitives::{Address, TxHash, U256};
use serde::{Deserialize, Serialize};

use super::amount;
use super::message_id::MessageIdentifier;

/// Monotonically-advancing lifecycle status. Declaration order doubles as
/// the ordering used by `max()` at every merge site — `derive(Ord)` over
/// this order is the entire mechanism behind "status only moves forward."
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum BountyStatus {
    BountyPlaced,
    MessageDelivered,
    BountyClaimed,
}

/// Per-message bounty record. At most one exists per [`MessageIdentifier`];
/// every write is a merge, never an overwrite that would lose information
/// (see [`Bounty::merge`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bounty {
    pub message_identifier: MessageIdentifier,
    pub from_chain_id: u64,
    pub to_chain_id: Option<u64>,
    #[serde(with = "amount")]
    pub max_gas_delivery: U256,
    #[serde(with = "amount")]
    pub max_gas_ack: U256,
    pub refund_gas_to: Address,
    #[serde(with = "amount")]
    pub price_of_delivery_gas: U256,
    #[serde(with = "amount")]
    pub price_of_ack_gas: U256,
    #[serde(with = "amount")]
    pub target_delta: U256,
    pub status: BountyStatus,
    pub source_address: Address,
    pub destination_address: Option<Address>,
    pub finalised: bool,
    pub submit_transaction_hash: Option<TxHash>,
    pub exec_transaction_hash: Option<TxHash>,
    pub ack_transaction_hash: Option<TxHash>,
    #[serde(with = "amount::option")]
    pub delivery_gas_cost: Option<U256>,
}

impl Bounty {
    /// Builds the sparse record a destination-side handler creates when the
    /// source-side `BountyPlaced` was never observed (§4.9).
    pub fn sparse(
        message_identifier: MessageIdentifier,
        from_chain_id: u64,
        status: BountyStatus,
    ) -> Self {
        Self {
            message_identifier,
            from_chain_id,
            to_chain_id: None,
            max_gas_delivery: U256::ZERO,
            max_gas_ack: U256::ZERO,
            refund_gas_to: Address::ZERO,
            price_of_delivery_gas: U256::ZERO,
            price_of_ack_gas: U256::ZERO,
            target_delta: U256::ZERO,
            status,
            source_address: Address::ZERO,
            destination_address: None,
            finalised: false,
            submit_transaction_hash: None,
            exec_transaction_hash: None,
            ack_transaction_hash: None,
            delivery_gas_cost: None,
        }
    }

    /// Merges `update` into `self` in place:
    /// - `status` becomes the max of both.
    /// - scalar/address fields in `self` that are already non-default keep
    ///   their value; the incoming value only fills a gap.
    /// - gas prices take the field-wise max (monotonic, never decreases).
    /// - optional fields fill in only if `self` doesn't already have one.
    pub fn merge(&mut self, update: Bounty) {
        debug_assert_eq!(self.message_identifier, update.message_identifier);

        self.status = self.status.max(update.status);
        self.price_of_delivery_gas = self.price_of_delivery_gas.max(update.price_of_delivery_gas);
        self.price_of_ack_gas = self.price_of_ack_gas.max(update.price_of_ack_gas);

        if self.to_chain_id.is_none() {
            self.to_chain_id = update.to_chain_id;
        }
        if self.max_gas_delivery.is_zero() {
            self.max_gas_delivery = update.max_gas_delivery;
        }
        if self.max_gas_ack.is_zero() {
            self.max_gas_ack = update.max_gas_ack;
        }
        if self.refund_gas_to.is_zero() {
            self.refund_gas_to = update.refund_gas_to;
        }
        if self.target_delta.is_zero() {
            self.target_delta = update.target_delta;
        }
        if self.source_address.is_zero() {
            self.source_address = update.source_address;
        }
        if self.destination_address.is_none() {
            self.destination_address = update.destination_address;
        }
        self.finalised = self.finalised || update.finalised;

        if self.submit_transaction_hash.is_none() {
            self.submit_transaction_hash = update.submit_transaction_hash;
        }
        if self.exec_transaction_hash.is_none() {
            self.exec_transaction_hash = update.exec_transaction_hash;
        }
        if self.ack_transaction_hash.is_none() {
            self.ack_transaction_hash = update.ack_transaction_hash;
        }
        if self.delivery_gas_cost.is_none() {
            self.delivery_gas_cost = update.delivery_gas_cost;
        }
    }

    /// Raises `priceOfDeliveryGas`/`priceOfAckGas` to the max of the current
    /// value and the given candidates; a no-op if neither strictly increases.
    pub fn register_bounty_increased(&mut self, new_delivery_gas_price: U256, new_ack_gas_price: U256) {
        self.price_of_delivery_gas = self.price_of_delivery_gas.max(new_delivery_gas_price);
        self.price_of_ack_gas = self.price_of_ack_gas.max(new_ack_gas_price);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn id() -> MessageIdentifier {
        MessageIdentifier::new([0xAB; 32])
    }

    #[test]
    fn merge_never_lowers_status() {
        let mut claimed = Bounty::sparse(id(), 1, BountyStatus::BountyClaimed);
        let placed = Bounty::sparse(id(), 1, BountyStatus::BountyPlaced);

        claimed.merge(placed);
        assert_eq!(claimed.status, BountyStatus::BountyClaimed);
    }

    #[test]
    fn merge_out_of_order_converges_to_max_status() {
        let mut sparse = Bounty::sparse(id(), 1, BountyStatus::MessageDelivered);
        let mut later_placed = Bounty::sparse(id(), 1, BountyStatus::BountyPlaced);
        later_placed.max_gas_delivery = U256::from(200_000u64);
        later_placed.price_of_delivery_gas = U256::from(1_000_000_000u64);

        sparse.merge(later_placed);

        assert_eq!(sparse.status, BountyStatus::MessageDelivered);
        assert_eq!(sparse.max_gas_delivery, U256::from(200_000u64));
        assert_eq!(sparse.price_of_delivery_gas, U256::from(1_000_000_000u64));
    }

    #[test]
    fn merge_preserves_already_populated_fields() {
        let mut bounty = Bounty::sparse(id(), 1, BountyStatus::BountyPlaced);
        bounty.destination_address = Some(Address::repeat_byte(0x11));

        let update = Bounty::sparse(id(), 1, BountyStatus::MessageDelivered);
        bounty.merge(update);

        assert_eq!(bounty.destination_address, Some(Address::repeat_byte(0x11)));
    }

    #[test]
    fn register_bounty_increased_is_monotonic() {
        let mut bounty = Bounty::sparse(id(), 1, BountyStatus::BountyPlaced);
        for price in [10u64, 20, 15, 25] {
            bounty.register_bounty_increased(U256::from(price), U256::ZERO);
        }
        assert_eq!(bounty.price_of_delivery_gas, U256::from(25u64));
    }

    /// §8: "for every messageIdentifier, across any interleaving of the
    /// three register calls, the final status equals the maximum of all
    /// statuses ever written, regardless of arrival order."
    #[rstest]
    #[case::placed_then_delivered_then_claimed(&[BountyStatus::BountyPlaced, BountyStatus::MessageDelivered, BountyStatus::BountyClaimed])]
    #[case::claimed_first(&[BountyStatus::BountyClaimed, BountyStatus::BountyPlaced, BountyStatus::MessageDelivered])]
    #[case::delivered_first(&[BountyStatus::MessageDelivered, BountyStatus::BountyClaimed, BountyStatus::BountyPlaced])]
    #[case::duplicates(&[BountyStatus::BountyPlaced, BountyStatus::BountyPlaced, BountyStatus::MessageDelivered])]
    fn merge_any_interleaving_converges_to_max_status(#[case] arrivals: &[BountyStatus]) {
        let mut current: Option<Bounty> = None;
        for &status in arrivals {
            let update = Bounty::sparse(id(), 1, status);
            match current.as_mut() {
                Some(existing) => existing.merge(update),
                None => current = Some(update),
            }
        }

        let expected = arrivals.iter().copied().max().unwrap();
        assert_eq!(current.unwrap().status, expected);
    }
}
