// SPDX-FileCopyrightText: 2025 Semiotic AI, Inc.
//
// SPDX-License-Identifier: Apache-2.0

//! Error kinds for the relayer, and the classifiers that the queue and
//! scanner loops branch on to decide retry vs. drop vs. fatal.

use alloy_json_rpc::RpcError;
use alloy_transport::TransportErrorKind;
use thiserror::Error;

/// Revert reason substrings that indicate a competing relayer already
/// delivered the message (a simulation collision, not a real failure).
const COLLISION_PATTERNS: &[&str] = &[
    "nonce already used",
    "already received",
    "already processed",
    "message already received",
    "nonce used",
];

#[derive(Error, Debug)]
pub enum RelayerError {
    #[error("chain {chain_id} is not configured")]
    UnknownChain { chain_id: u64 },

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("failed to decode {what}: {reason}")]
    Decode { what: &'static str, reason: String },

    #[error("message {message_identifier} already delivered by a competing relayer")]
    SimulationCollision { message_identifier: String },

    #[error("bounty for {message_identifier} does not cover estimated delivery cost")]
    BountyUnderfunded { message_identifier: String },

    #[error("wallet for chain {chain_id} stalled: {reason}")]
    WalletStall { chain_id: u64, reason: String },

    #[error("contract call failed: {0}")]
    ContractCall(String),

    #[error("signing error: {0}")]
    Signing(String),

    #[error("deadline exceeded waiting for {what}")]
    DeadlineExceeded { what: &'static str },

    #[error("bounty for {message_identifier} not yet observed")]
    BountyNotReady { message_identifier: String },

    #[error("waiting for additional confirmations")]
    AwaitingConfirmations,

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("rpc error: {0}")]
    Rpc(#[from] alloy_json_rpc::RpcError<alloy_transport::TransportErrorKind>),

    #[error("abi encoding/decoding error: {0}")]
    Abi(#[from] alloy_sol_types::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("hex conversion error: {0}")]
    Hex(#[from] alloy_primitives::hex::FromHexError),
}

impl RelayerError {
    /// Transient transport/network failure: scanners retry indefinitely,
    /// queues retry up to `maxTries`.
    pub fn is_transient(&self) -> bool {
        match self {
            RelayerError::Transport(_) | RelayerError::Network(_) => true,
            RelayerError::Rpc(RpcError::Transport(
                TransportErrorKind::BackendGone | TransportErrorKind::HttpError(_),
            )) => true,
            _ => false,
        }
    }

    /// Per-record decode failure: logged and skipped, never retried.
    pub fn is_decoding(&self) -> bool {
        matches!(self, RelayerError::Decode { .. } | RelayerError::Abi(_))
    }

    /// Wallet stall after cancellation failure: fatal, surfaced via exit code.
    pub fn is_fatal(&self) -> bool {
        matches!(self, RelayerError::WalletStall { .. })
    }

    /// Whether this failure represents a message already delivered by
    /// somebody else. The order is dropped, not retried, and no error is
    /// surfaced to the operator.
    pub fn is_collision(&self) -> bool {
        match self {
            RelayerError::SimulationCollision { .. } => true,
            RelayerError::ContractCall(msg) => Self::message_matches_collision(msg),
            RelayerError::Rpc(rpc_error) => Self::rpc_error_is_collision(rpc_error),
            _ => false,
        }
    }

    fn rpc_error_is_collision(error: &RpcError<TransportErrorKind>) -> bool {
        match error {
            RpcError::ErrorResp(payload) => {
                Self::message_matches_collision(&payload.message)
                    || payload
                        .data
                        .as_ref()
                        .is_some_and(|d| Self::message_matches_collision(&d.to_string()))
            }
            RpcError::LocalUsageError(e) => Self::message_matches_collision(&e.to_string()),
            _ => false,
        }
    }

    fn message_matches_collision(message: &str) -> bool {
        let lower = message.to_lowercase();
        COLLISION_PATTERNS.iter().any(|p| lower.contains(p))
    }
}

pub type Result<T> = std::result::Result<T, RelayerError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collision_detected_from_contract_call_message() {
        let err = RelayerError::ContractCall("execution reverted: nonce already used".into());
        assert!(err.is_collision());

        let err = RelayerError::ContractCall("insufficient funds".into());
        assert!(!err.is_collision());
    }

    #[test]
    fn collision_matching_is_case_insensitive() {
        let err = RelayerError::ContractCall("NONCE ALREADY USED".into());
        assert!(err.is_collision());
    }

    #[test]
    fn wallet_stall_is_fatal_and_nothing_else_is() {
        let stall = RelayerError::WalletStall {
            chain_id: 1,
            reason: "cancellation failed".into(),
        };
        assert!(stall.is_fatal());
        assert!(!RelayerError::InvalidConfig("x".into()).is_fatal());
    }

    #[test]
    fn transport_and_network_are_transient() {
        assert!(RelayerError::Transport("timeout".into()).is_transient());
        assert!(!RelayerError::InvalidConfig("x".into()).is_transient());
    }
}
