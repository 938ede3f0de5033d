//! Explicit decimal-string codec for [`U256`] amounts.
//!
//! Bounty prices and gas quantities are unbounded on-chain. We never convert
//! them to a machine float at any layer; every store read/write goes through
//! this codec instead of relying on a serializer default or a global
//! numeric-type override.

use alloy_primitives::U256;
use serde::{de::Error as _, Deserialize, Deserializer, Serialize, Serializer};

/// Serializes a [`U256`] as a decimal string.
pub fn serialize<S: Serializer>(value: &U256, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&value.to_string())
}

/// Parses a [`U256`] from a decimal string.
pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<U256, D::Error> {
    let raw = String::deserialize(deserializer)?;
    raw.parse::<U256>()
        .map_err(|e| D::Error::custom(format!("invalid decimal U256 `{raw}`: {e}")))
}

/// Same codec for `Option<U256>` fields (`deliveryGasCost` and friends).
pub mod option {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &Option<U256>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match value {
            Some(v) => serializer.serialize_some(&v.to_string()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<U256>, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        raw.map(|s| {
            s.parse::<U256>()
                .map_err(|e| D::Error::custom(format!("invalid decimal U256 `{s}`: {e}")))
        })
        .transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::{Deserialize, Serialize};

    #[derive(Serialize, Deserialize)]
    struct Wrapper(#[serde(with = "super")] U256);

    #[derive(Serialize, Deserialize)]
    struct OptWrapper(#[serde(with = "super::option")] Option<U256>);

    #[test]
    fn round_trips_as_decimal_string() {
        let value = Wrapper(U256::from(123456789012345u128));
        let json = serde_json::to_string(&value).unwrap();
        assert_eq!(json, "\"123456789012345\"");

        let back: Wrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, value.0);
    }

    #[test]
    fn never_emits_a_json_number() {
        let value = Wrapper(U256::MAX);
        let json = serde_json::to_string(&value).unwrap();
        assert!(json.starts_with('"') && json.ends_with('"'));
    }

    #[test]
    fn option_round_trips_none_and_some() {
        let none = OptWrapper(None);
        assert_eq!(serde_json::to_string(&none).unwrap(), "null");

        let some = OptWrapper(Some(U256::from(42u64)));
        let json = serde_json::to_string(&some).unwrap();
        let back: OptWrapper = serde_json::from_str(&json).unwrap();
        assert_eq!(back.0, Some(U256::from(42u64)));
    }
}
