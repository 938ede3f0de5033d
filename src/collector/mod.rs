//! Per-(chain, AMB) proof ingesters (§4.6).
//!
//! Every collector obeys the same contract regardless of bridge protocol:
//! emit [`crate::types::AmbMessage`] records via [`crate::store::Store::set_amb`]
//! and publish deliverable [`crate::types::AmbPayload`]s via
//! [`crate::store::Store::submit_proof`]. Adding a bridge means adding a
//! variant to [`crate::types::AmbKind`] and a module here implementing that
//! contract with its own scan loop — the core runtime never special-cases one.

pub mod layerzero;
pub mod mock;

use std::time::Duration;

use alloy_primitives::Address;

/// Fields common to every collector's scan loop, mirroring [`crate::getter::GetterConfig`].
///
/// `scan_address` and `incentives_address` coincide for the Mock collector
/// (the escrow contract emits both the escrow events and `Message`), but
/// diverge for LayerZero: `scan_address` is the LayerZero endpoint contract
/// being scanned, while `incentives_address` is the escrow contract used to
/// filter the decoded packet's `sender` (§4.6).
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub chain_id: u64,
    pub scan_address: Address,
    pub incentives_address: Address,
    pub max_blocks: u64,
    pub starting_block: Option<u64>,
    pub stopping_block: Option<u64>,
    pub processing_interval: Duration,
    pub retry_interval: Duration,
    pub priority: bool,
}
