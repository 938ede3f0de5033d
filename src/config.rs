//! Environment-selected YAML configuration (§6, §6.1).
//!
//! Grounded on the teacher's `ProviderConfig`/`ProviderConfigBuilder` pattern:
//! a raw `serde`/`serde_yaml` deserialization target with optional
//! per-chain override fields, resolved at load time into the concrete
//! `GetterConfig`/`SubmitterConfig`/`CollectorConfig`/`WalletConfig` structs
//! the runtime wires up directly. Missing required fields refuse startup
//! with `RelayerError::InvalidConfig`, never a default guess.

use std::collections::HashMap;
use std::time::Duration;

use alloy_primitives::{Address, U256};
use serde::Deserialize;

use crate::collector::CollectorConfig;
use crate::error::{RelayerError, Result};
use crate::evaluator::EvaluatorConfig;
use crate::getter::GetterConfig;
use crate::submitter::SubmitterConfig;
use crate::wallet::{GasPolicy, WalletConfig};

fn default_log_level() -> String {
    "info".into()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GetterSection {
    retry_interval_ms: Option<u64>,
    processing_interval_ms: Option<u64>,
    max_blocks: Option<u64>,
    starting_block: Option<u64>,
    stopping_block: Option<u64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitterSection {
    enabled: Option<bool>,
    new_orders_delay_ms: Option<u64>,
    retry_interval_ms: Option<u64>,
    processing_interval_ms: Option<u64>,
    max_tries: Option<u32>,
    max_pending_transactions: Option<usize>,
    #[serde(default)]
    gas_limit_buffer: HashMap<String, u64>,
    max_fee_per_gas: Option<u128>,
    max_priority_fee_adjustment_factor: Option<f64>,
    max_allowed_priority_fee_per_gas: Option<u128>,
    gas_price_adjustment_factor: Option<f64>,
    max_allowed_gas_price: Option<u128>,
    priority_adjustment_factor: Option<f64>,
    low_balance_warning: Option<u128>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RelayerSection {
    private_key: String,
    #[serde(default = "default_log_level")]
    log_level: String,
    getter: GetterSection,
    #[serde(default)]
    submitter: SubmitterSection,
}

/// Per-AMB settings, keyed by AMB name (`mock`, `layerzero`, …) at both the
/// global and per-chain level; a chain entry overrides the global one
/// field-wise.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AmbSection {
    incentives_address: Option<Address>,
    #[serde(default)]
    priority: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChainSection {
    chain_id: u64,
    rpc: String,
    #[serde(default)]
    getter: Option<GetterSection>,
    #[serde(default)]
    submitter: Option<SubmitterSection>,
    #[serde(default)]
    ambs: HashMap<String, AmbSection>,
}

#[derive(Debug, Clone, Deserialize)]
struct RawConfig {
    relayer: RelayerSection,
    #[serde(default)]
    ambs: HashMap<String, AmbSection>,
    chains: Vec<ChainSection>,
}

/// One fully-resolved AMB collector on one chain, ready to hand to
/// [`crate::collector::mock::MockCollector`]/[`crate::collector::layerzero::LayerZeroCollector`].
#[derive(Debug, Clone)]
pub struct ResolvedAmb {
    pub name: String,
    pub collector: CollectorConfig,
}

/// Everything a `ChainRuntime` needs to spawn one chain's workers.
#[derive(Debug, Clone)]
pub struct ResolvedChain {
    pub chain_id: u64,
    pub rpc: String,
    pub getter: GetterConfig,
    pub submitter: Option<SubmitterConfig>,
    pub ambs: Vec<ResolvedAmb>,
    pub wallet: WalletConfig,
}

#[derive(Debug, Clone)]
pub struct RelayerConfig {
    pub private_key: String,
    pub log_level: String,
    pub chains: Vec<ResolvedChain>,
}

impl RelayerConfig {
    /// Reads and resolves `config.<env>.yaml` from the current directory.
    pub fn load(env: &str) -> Result<Self> {
        let path = format!("config.{env}.yaml");
        let raw = std::fs::read_to_string(&path)
            .map_err(|e| RelayerError::InvalidConfig(format!("reading {path}: {e}")))?;
        Self::from_yaml(&raw)
    }

    pub fn from_yaml(raw: &str) -> Result<Self> {
        let raw: RawConfig = serde_yaml::from_str(raw)?;
        Self::resolve(raw)
    }

    fn resolve(raw: RawConfig) -> Result<Self> {
        let mut chains = Vec::with_capacity(raw.chains.len());

        for chain in &raw.chains {
            let mut getter = resolve_getter(chain.chain_id, &raw.relayer.getter, chain.getter.as_ref())?;

            let mut ambs = Vec::new();
            for (name, global_amb) in &raw.ambs {
                let chain_amb = chain.ambs.get(name);
                let incentives_address = chain_amb
                    .and_then(|a| a.incentives_address)
                    .or(global_amb.incentives_address)
                    .ok_or_else(|| {
                        RelayerError::InvalidConfig(format!(
                            "chain {}: amb '{name}' is missing incentivesAddress",
                            chain.chain_id
                        ))
                    })?;
                let priority = chain_amb.map(|a| a.priority).unwrap_or(global_amb.priority);

                ambs.push(ResolvedAmb {
                    name: name.clone(),
                    collector: CollectorConfig {
                        chain_id: chain.chain_id,
                        scan_address: incentives_address,
                        incentives_address,
                        max_blocks: getter.max_blocks,
                        starting_block: getter.starting_block,
                        stopping_block: getter.stopping_block,
                        processing_interval: getter.processing_interval,
                        retry_interval: getter.retry_interval,
                        priority,
                    },
                });
            }

            // The Getter scans the same incentivized escrow contract every
            // configured AMB on this chain references; take the first.
            let incentives_address = ambs
                .first()
                .map(|a| a.collector.incentives_address)
                .ok_or_else(|| RelayerError::InvalidConfig(format!("chain {}: no AMBs configured", chain.chain_id)))?;
            getter.incentives_address = incentives_address;

            let submitter_section = merge_submitter(&raw.relayer.submitter, chain.submitter.as_ref());
            let submitter = if submitter_section.enabled.unwrap_or(true) {
                Some(resolve_submitter(chain.chain_id, incentives_address, &submitter_section)?)
            } else {
                None
            };

            let wallet = WalletConfig {
                chain_id: chain.chain_id,
                max_pending_transactions: submitter_section.max_pending_transactions.unwrap_or(16),
                max_tries: submitter_section.max_tries.unwrap_or(5),
                confirmation_timeout: Duration::from_secs(60),
                retry_interval: Duration::from_millis(submitter_section.retry_interval_ms.unwrap_or(1_000)),
                gas_policy: GasPolicy {
                    max_fee_per_gas: submitter_section.max_fee_per_gas,
                    max_priority_fee_adjustment_factor: submitter_section.max_priority_fee_adjustment_factor.unwrap_or(1.0),
                    max_allowed_priority_fee_per_gas: submitter_section.max_allowed_priority_fee_per_gas.unwrap_or(u128::MAX),
                    gas_price_adjustment_factor: submitter_section.gas_price_adjustment_factor.unwrap_or(1.0),
                    max_allowed_gas_price: submitter_section.max_allowed_gas_price.unwrap_or(u128::MAX),
                    priority_adjustment_factor: submitter_section.priority_adjustment_factor.unwrap_or(1.1),
                },
                low_balance_warning: submitter_section.low_balance_warning.map(U256::from).unwrap_or(U256::ZERO),
            };

            chains.push(ResolvedChain {
                chain_id: chain.chain_id,
                rpc: chain.rpc.clone(),
                getter,
                submitter,
                ambs,
                wallet,
            });
        }

        Ok(RelayerConfig {
            private_key: raw.relayer.private_key,
            log_level: raw.relayer.log_level,
            chains,
        })
    }
}

fn resolve_getter(chain_id: u64, global: &GetterSection, chain_override: Option<&GetterSection>) -> Result<GetterConfig> {
    let merged = merge_getter(global, chain_override);
    Ok(GetterConfig {
        chain_id,
        incentives_address: Address::ZERO,
        max_blocks: merged
            .max_blocks
            .ok_or_else(|| RelayerError::InvalidConfig(format!("chain {chain_id}: getter.maxBlocks is required")))?,
        starting_block: merged.starting_block,
        stopping_block: merged.stopping_block,
        processing_interval: Duration::from_millis(
            merged
                .processing_interval_ms
                .ok_or_else(|| RelayerError::InvalidConfig(format!("chain {chain_id}: getter.processingInterval is required")))?,
        ),
        retry_interval: Duration::from_millis(
            merged
                .retry_interval_ms
                .ok_or_else(|| RelayerError::InvalidConfig(format!("chain {chain_id}: getter.retryInterval is required")))?,
        ),
    })
}

fn merge_getter(global: &GetterSection, chain_override: Option<&GetterSection>) -> GetterSection {
    let Some(ov) = chain_override else { return global.clone() };
    GetterSection {
        retry_interval_ms: ov.retry_interval_ms.or(global.retry_interval_ms),
        processing_interval_ms: ov.processing_interval_ms.or(global.processing_interval_ms),
        max_blocks: ov.max_blocks.or(global.max_blocks),
        starting_block: ov.starting_block.or(global.starting_block),
        stopping_block: ov.stopping_block.or(global.stopping_block),
    }
}

fn merge_submitter(global: &SubmitterSection, chain_override: Option<&SubmitterSection>) -> SubmitterSection {
    let Some(ov) = chain_override else { return global.clone() };
    SubmitterSection {
        enabled: ov.enabled.or(global.enabled),
        new_orders_delay_ms: ov.new_orders_delay_ms.or(global.new_orders_delay_ms),
        retry_interval_ms: ov.retry_interval_ms.or(global.retry_interval_ms),
        processing_interval_ms: ov.processing_interval_ms.or(global.processing_interval_ms),
        max_tries: ov.max_tries.or(global.max_tries),
        max_pending_transactions: ov.max_pending_transactions.or(global.max_pending_transactions),
        gas_limit_buffer: if ov.gas_limit_buffer.is_empty() { global.gas_limit_buffer.clone() } else { ov.gas_limit_buffer.clone() },
        max_fee_per_gas: ov.max_fee_per_gas.or(global.max_fee_per_gas),
        max_priority_fee_adjustment_factor: ov.max_priority_fee_adjustment_factor.or(global.max_priority_fee_adjustment_factor),
        max_allowed_priority_fee_per_gas: ov.max_allowed_priority_fee_per_gas.or(global.max_allowed_priority_fee_per_gas),
        gas_price_adjustment_factor: ov.gas_price_adjustment_factor.or(global.gas_price_adjustment_factor),
        max_allowed_gas_price: ov.max_allowed_gas_price.or(global.max_allowed_gas_price),
        priority_adjustment_factor: ov.priority_adjustment_factor.or(global.priority_adjustment_factor),
        low_balance_warning: ov.low_balance_warning.or(global.low_balance_warning),
    }
}

fn resolve_submitter(chain_id: u64, incentives_address: Address, merged: &SubmitterSection) -> Result<SubmitterConfig> {
    let retry_interval = Duration::from_millis(
        merged
            .retry_interval_ms
            .ok_or_else(|| RelayerError::InvalidConfig(format!("chain {chain_id}: submitter.retryInterval is required")))?,
    );
    let processing_interval = Duration::from_millis(
        merged
            .processing_interval_ms
            .ok_or_else(|| RelayerError::InvalidConfig(format!("chain {chain_id}: submitter.processingInterval is required")))?,
    );
    let max_tries = merged
        .max_tries
        .ok_or_else(|| RelayerError::InvalidConfig(format!("chain {chain_id}: submitter.maxTries is required")))?;

    let gas_limit_buffer_percent = *merged.gas_limit_buffer.get("default").unwrap_or(&100);
    let evaluation_deadline = Duration::from_millis(merged.new_orders_delay_ms.unwrap_or(30_000));

    // The Eval stage's try budget must outlast `evaluationDeadline` (§4.8):
    // `EvalHandler::handle_failed_order` is the thing that actually decides
    // whether a not-yet-observed bounty keeps retrying, by comparing against
    // the deadline. Reusing the submit/confirm `maxTries` here would let the
    // flat counter in `ProcessingQueue::process_one` cut retries off first.
    let eval_max_tries = ((evaluation_deadline.as_millis() / retry_interval.as_millis().max(1)) as u32)
        .saturating_add(1)
        .max(max_tries);

    Ok(SubmitterConfig {
        chain_id,
        incentives_address,
        evaluator_config: EvaluatorConfig::default(),
        evaluation_deadline,
        eval_retry_interval: retry_interval,
        eval_max_tries,
        submit_retry_interval: retry_interval,
        submit_max_tries: max_tries,
        confirm_retry_interval: retry_interval,
        confirm_max_tries: max_tries,
        additional_confirmations: 0,
        processing_interval,
        gas_limit_buffer_percent,
        max_pending_transactions: merged.max_pending_transactions.unwrap_or(16),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;

    const SAMPLE: &str = r#"
relayer:
  privateKey: "0xabc"
  logLevel: "debug"
  getter:
    retryIntervalMs: 1000
    processingIntervalMs: 5000
    maxBlocks: 1000
  submitter:
    retryIntervalMs: 2000
    processingIntervalMs: 1000
    maxTries: 5
    maxPendingTransactions: 8
ambs:
  mock:
    incentivesAddress: "0x0000000000000000000000000000000000000001"
chains:
  - chainId: 1
    rpc: "http://localhost:8545"
  - chainId: 2
    rpc: "http://localhost:8546"
    getter:
      startingBlock: 100
    ambs:
      mock:
        incentivesAddress: "0x0000000000000000000000000000000000000002"
"#;

    #[test]
    fn resolves_global_and_per_chain_overrides() {
        let config = RelayerConfig::from_yaml(SAMPLE).unwrap();
        assert_eq!(config.chains.len(), 2);

        let chain1 = &config.chains[0];
        assert_eq!(chain1.ambs[0].collector.incentives_address, address!("0000000000000000000000000000000000000001"));
        assert_eq!(chain1.getter.starting_block, None);

        let chain2 = &config.chains[1];
        assert_eq!(chain2.getter.starting_block, Some(100));
        assert_eq!(chain2.ambs[0].collector.incentives_address, address!("0000000000000000000000000000000000000002"));
    }

    /// §4.8: the Eval stage must not give up on an unobserved bounty before
    /// `evaluationDeadline` elapses, even though `submitter.maxTries` (5) is
    /// far too small a counter to span the default 30s deadline at a 2s
    /// retry interval.
    #[test]
    fn eval_max_tries_outlasts_the_evaluation_deadline() {
        let config = RelayerConfig::from_yaml(SAMPLE).unwrap();
        let submitter = config.chains[0].submitter.as_ref().unwrap();

        assert_eq!(submitter.submit_max_tries, 5);
        assert!(
            submitter.eval_max_tries as u128 * submitter.eval_retry_interval.as_millis()
                >= submitter.evaluation_deadline.as_millis(),
            "eval_max_tries ({}) * eval_retry_interval must cover evaluation_deadline",
            submitter.eval_max_tries
        );
    }

    #[test]
    fn missing_amb_address_is_rejected() {
        let yaml = SAMPLE.replace("incentivesAddress: \"0x0000000000000000000000000000000000000001\"", "priority: true");
        let err = RelayerConfig::from_yaml(&yaml).unwrap_err();
        assert!(matches!(err, RelayerError::InvalidConfig(_)));
    }
}
