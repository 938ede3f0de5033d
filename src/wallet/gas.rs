//! Gas pricing policy (§4.4): EIP-1559 when the chain supports it, legacy
//! `gasPrice` otherwise, each bounded by a configured ceiling.

use alloy_rpc_types::TransactionRequest;

use crate::traits::FeeData;

#[derive(Debug, Clone, Copy)]
pub struct GasPolicy {
    pub max_fee_per_gas: Option<u128>,
    pub max_priority_fee_adjustment_factor: f64,
    pub max_allowed_priority_fee_per_gas: u128,
    pub gas_price_adjustment_factor: f64,
    pub max_allowed_gas_price: u128,
    /// Multiplier applied to gas parameters when a stuck transaction is
    /// repriced. Defaults to 1.1 per §4.4.
    pub priority_adjustment_factor: f64,
}

impl Default for GasPolicy {
    fn default() -> Self {
        Self {
            max_fee_per_gas: None,
            max_priority_fee_adjustment_factor: 1.0,
            max_allowed_priority_fee_per_gas: u128::MAX,
            gas_price_adjustment_factor: 1.0,
            max_allowed_gas_price: u128::MAX,
            priority_adjustment_factor: 1.1,
        }
    }
}

impl GasPolicy {
    pub fn price_for(&self, fee_data: &FeeData) -> GasPrice {
        match (self.max_fee_per_gas, fee_data.base_fee_per_gas) {
            (Some(max_fee_per_gas), Some(_)) => {
                let priority_fee = ((fee_data.max_priority_fee_per_gas as f64)
                    * self.max_priority_fee_adjustment_factor) as u128;
                GasPrice::Eip1559 {
                    max_fee_per_gas,
                    max_priority_fee_per_gas: priority_fee.min(self.max_allowed_priority_fee_per_gas),
                }
            }
            _ => {
                let gas_price =
                    ((fee_data.gas_price as f64) * self.gas_price_adjustment_factor) as u128;
                GasPrice::Legacy {
                    gas_price: gas_price.min(self.max_allowed_gas_price),
                }
            }
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum GasPrice {
    Eip1559 { max_fee_per_gas: u128, max_priority_fee_per_gas: u128 },
    Legacy { gas_price: u128 },
}

impl GasPrice {
    pub fn apply(&self, tx: TransactionRequest) -> TransactionRequest {
        match *self {
            GasPrice::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => tx
                .max_fee_per_gas(max_fee_per_gas)
                .max_priority_fee_per_gas(max_priority_fee_per_gas),
            GasPrice::Legacy { gas_price } => tx.gas_price(gas_price),
        }
    }

    /// Multiplies all gas parameters by `factor`, used when a stuck
    /// transaction is repriced under the same nonce.
    pub fn repriced(&self, factor: f64) -> GasPrice {
        match *self {
            GasPrice::Eip1559 { max_fee_per_gas, max_priority_fee_per_gas } => GasPrice::Eip1559 {
                max_fee_per_gas: ((max_fee_per_gas as f64) * factor) as u128,
                max_priority_fee_per_gas: ((max_priority_fee_per_gas as f64) * factor) as u128,
            },
            GasPrice::Legacy { gas_price } => GasPrice::Legacy {
                gas_price: ((gas_price as f64) * factor) as u128,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prefers_eip1559_when_chain_supports_it_and_ceiling_configured() {
        let policy = GasPolicy { max_fee_per_gas: Some(100), ..Default::default() };
        let fee_data = FeeData { base_fee_per_gas: Some(20), max_priority_fee_per_gas: 2, gas_price: 30 };

        let price = policy.price_for(&fee_data);
        assert!(matches!(price, GasPrice::Eip1559 { .. }));
    }

    #[test]
    fn falls_back_to_legacy_without_base_fee() {
        let policy = GasPolicy::default();
        let fee_data = FeeData { base_fee_per_gas: None, max_priority_fee_per_gas: 0, gas_price: 30 };

        let price = policy.price_for(&fee_data);
        assert!(matches!(price, GasPrice::Legacy { gas_price: 30 }));
    }

    #[test]
    fn priority_fee_is_capped_at_max_allowed() {
        let policy = GasPolicy {
            max_fee_per_gas: Some(1000),
            max_allowed_priority_fee_per_gas: 5,
            ..Default::default()
        };
        let fee_data = FeeData { base_fee_per_gas: Some(20), max_priority_fee_per_gas: 50, gas_price: 30 };

        match policy.price_for(&fee_data) {
            GasPrice::Eip1559 { max_priority_fee_per_gas, .. } => assert_eq!(max_priority_fee_per_gas, 5),
            other => panic!("expected eip1559, got {other:?}"),
        }
    }

    #[test]
    fn repricing_multiplies_all_gas_fields() {
        let price = GasPrice::Legacy { gas_price: 100 };
        let repriced = price.repriced(1.1);
        assert!(matches!(repriced, GasPrice::Legacy { gas_price: 110 }));
    }
}
