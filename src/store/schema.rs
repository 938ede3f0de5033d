//! Key and channel naming: `relayer:<midfix>:<id>[:<sub>]` and
//! `relayer:<channel>`.

use crate::types::MessageIdentifier;

pub fn bounty_key(id: MessageIdentifier) -> String {
    format!("relayer:bounty:{id}")
}

pub fn amb_key(id: MessageIdentifier) -> String {
    format!("relayer:amb:{id}")
}

pub fn layerzero_payload_key(payload_hash: &alloy_primitives::B256) -> String {
    format!("relayer:amb:payload:{payload_hash}")
}

pub fn submit_channel(destination_chain_id: u64) -> String {
    format!("relayer:submit-{destination_chain_id}")
}

pub const AMB_CHANNEL: &str = "relayer:amb";
pub const KEY_CHANGE_CHANNEL: &str = "relayer:key";

/// Generic change-notification payload for the `relayer:key` channel.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct KeyChangeNotification {
    pub key: String,
    pub action: KeyChangeAction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyChangeAction {
    Set,
    Del,
}
