//! AMB-facing records: the raw message as observed at the source, and the
//! delivery-ready payload handed to the Submitter.

use alloy_primitives::Bytes;
use serde::{Deserialize, Serialize};

use super::message_id::MessageIdentifier;

/// Closed tagged variant over the supported bridge protocols. Adding a new
/// AMB means adding a variant here and a matching collector task — the
/// core runtime (queues, wallet, store) never special-cases a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AmbKind {
    Mock,
    LayerZero,
}

impl AmbKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AmbKind::Mock => "mock",
            AmbKind::LayerZero => "layerzero",
        }
    }
}

impl std::fmt::Display for AmbKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The raw cross-chain message as observed at the source chain.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbMessage {
    pub message_identifier: MessageIdentifier,
    pub amb: AmbKind,
    pub source_chain: u64,
    pub destination_chain: u64,
    pub source_escrow: alloy_primitives::Address,
    pub payload: Bytes,
    pub recovery_context: Option<Bytes>,
    pub priority: bool,
    pub source_block_number: u64,
    pub source_block_hash: alloy_primitives::B256,
}

/// The delivery-ready tuple published on `submit-<destinationChainId>` and
/// consumed by the Submitter's evaluation queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AmbPayload {
    pub message_identifier: MessageIdentifier,
    pub amb: AmbKind,
    pub destination_chain_id: u64,
    pub message: Bytes,
    pub message_ctx: Option<Bytes>,
    pub priority: bool,
}
