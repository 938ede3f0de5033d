//! The 32-byte opaque key that joins all per-message state.

use alloy_primitives::{hex, FixedBytes};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Primary key chosen by the escrow contract, shared by the [`crate::types::Bounty`],
/// [`crate::types::AmbMessage`] and [`crate::types::Order`] records for a single
/// cross-chain message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageIdentifier(pub FixedBytes<32>);

impl MessageIdentifier {
    pub fn new(bytes: [u8; 32]) -> Self {
        Self(FixedBytes::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        self.0.as_ref()
    }
}

impl fmt::Display for MessageIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<FixedBytes<32>> for MessageIdentifier {
    fn from(value: FixedBytes<32>) -> Self {
        Self(value)
    }
}

impl std::str::FromStr for MessageIdentifier {
    type Err = alloy_primitives::hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse::<FixedBytes<32>>()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_round_trips_through_from_str() {
        let id = MessageIdentifier::new([0xAAu8; 32]);
        let rendered = id.to_string();
        let parsed: MessageIdentifier = rendered.parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serializes_as_0x_prefixed_hex_string() {
        let id = MessageIdentifier::new([0u8; 32]);
        let json = serde_json::to_string(&id).unwrap();
        assert!(json.starts_with("\"0x"));
        assert_eq!(json.len(), 2 + 2 + 64); // quotes + "0x" + 64 hex chars
    }
}
