//! Decides whether a bounty's attached reward covers the estimated cost of
//! delivering it (§4.7).
//!
//! The reference inlines this check directly inside the Submitter; it is
//! pulled out here as its own unit so the formula has one place to read and
//! one place to test (§9 Open Question).

use alloy_primitives::U256;

use crate::traits::FeeData;
use crate::types::Bounty;

/// Conversion factor between the bounty's `priceOfDeliveryGas` (denominated
/// in source-chain gas-equivalent units) and the destination chain's native
/// gas cost, expressed as an integer ratio so no economic quantity is ever
/// rounded through a float (§9 "Big integers").
#[derive(Debug, Clone, Copy)]
pub struct EvaluatorConfig {
    pub price_relation_numerator: U256,
    pub price_relation_denominator: U256,
}

impl Default for EvaluatorConfig {
    /// 1:1 — the bounty's delivery-gas price already denominates destination
    /// chain cost directly, the common case for a single-chain-pair deploy.
    fn default() -> Self {
        Self {
            price_relation_numerator: U256::from(1u64),
            price_relation_denominator: U256::from(1u64),
        }
    }
}

/// Stateless: the formula reads only its arguments.
#[derive(Debug, Clone, Copy, Default)]
pub struct Evaluator;

impl Evaluator {
    /// Approves relaying `bounty` given a simulated `gas_estimate` and the
    /// destination chain's current fee market, per §4.7:
    ///
    /// `priceOfDeliveryGas × gasEstimate ≤ maxGasDelivery × priceOfDeliveryGas`
    /// — i.e. the simulated cost stays inside the budget the bounty
    /// reserved — **and** the reward, converted into destination-chain
    /// terms via `config`'s price relation, covers what the destination
    /// chain will actually charge for that much gas. Priority orders
    /// bypass the cost check (but the caller must still have a successful
    /// simulation before calling this at all).
    pub fn should_relay(
        &self,
        bounty: &Bounty,
        gas_estimate: u64,
        fee_data: &FeeData,
        config: &EvaluatorConfig,
        priority: bool,
    ) -> bool {
        if priority {
            return true;
        }

        let gas_estimate = U256::from(gas_estimate);
        if gas_estimate > bounty.max_gas_delivery {
            return false;
        }

        let destination_cost = U256::from(fee_data.effective_price()).saturating_mul(gas_estimate);
        let reward = bounty.price_of_delivery_gas.saturating_mul(gas_estimate);
        let reward_in_destination_terms = reward
            .saturating_mul(config.price_relation_numerator)
            .checked_div(config.price_relation_denominator)
            .unwrap_or(U256::ZERO);

        reward_in_destination_terms >= destination_cost
    }
}
