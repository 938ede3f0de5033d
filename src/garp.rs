//! Shared envelope format for the raw bytes handed to `processPacket`.
//!
//! Both the Mock and LayerZero collectors observe this same structure
//! inside the opaque `message` payload they scan off-chain — it is built
//! by the escrow contract itself, not by either bridge, so the decode
//! lives here once instead of being duplicated per collector (§4.6
//! describes it for LayerZero's inner packet; see DESIGN.md for the
//! decision to share it with Mock too).

use alloy_primitives::{Address, Bytes};

use crate::error::{RelayerError, Result};
use crate::types::MessageIdentifier;

const CONTEXT_LEN: usize = 1;
const MESSAGE_IDENTIFIER_LEN: usize = 32;
const ADDRESS_SLOT_LEN: usize = 20;
const HEADER_LEN: usize = CONTEXT_LEN + MESSAGE_IDENTIFIER_LEN + ADDRESS_SLOT_LEN + ADDRESS_SLOT_LEN;

/// Byte 0 = context; [1..33) = messageIdentifier; [33..53) = sender;
/// [53..73) = destination; remainder = application payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GarpMessage {
    pub context: u8,
    pub message_identifier: MessageIdentifier,
    pub sender: Address,
    pub destination: Address,
    pub payload: Bytes,
}

pub fn decode(message: &[u8]) -> Result<GarpMessage> {
    if message.len() < HEADER_LEN {
        return Err(RelayerError::Decode {
            what: "GARP message",
            reason: format!("message too short: {} bytes, need at least {HEADER_LEN}", message.len()),
        });
    }

    Ok(GarpMessage {
        context: message[0],
        message_identifier: MessageIdentifier::new(message[1..33].try_into().unwrap()),
        sender: Address::from_slice(&message[33..53]),
        destination: Address::from_slice(&message[53..73]),
        payload: Bytes::copy_from_slice(&message[73..]),
    })
}

pub fn encode(message: &GarpMessage) -> Bytes {
    let mut out = Vec::with_capacity(HEADER_LEN + message.payload.len());
    out.push(message.context);
    out.extend_from_slice(message.message_identifier.as_bytes());
    out.extend_from_slice(message.sender.as_slice());
    out.extend_from_slice(message.destination.as_slice());
    out.extend_from_slice(&message.payload);
    Bytes::from(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> GarpMessage {
        GarpMessage {
            context: 0x01,
            message_identifier: MessageIdentifier::new([0xAB; 32]),
            sender: Address::repeat_byte(0x11),
            destination: Address::repeat_byte(0x22),
            payload: Bytes::from_static(b"hello"),
        }
    }

    #[test]
    fn decodes_header_and_payload() {
        let raw = encode(&sample());
        let decoded = decode(&raw).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn encode_then_decode_is_identity() {
        let message = sample();
        assert_eq!(decode(&encode(&message)).unwrap(), message);
    }

    #[test]
    fn rejects_too_short_message() {
        assert!(decode(&[0u8; 10]).is_err());
    }
}
