//! [`serde_with`] adapters for hex quantities.

use crate::hex::{decode_u64, encode_u64};
use serde::{Deserialize, Deserializer, Serializer};
use serde_with::{DeserializeAs, SerializeAs};

pub struct U64AsHex;

impl SerializeAs<u64> for U64AsHex {
    fn serialize_as<S>(value: &u64, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&encode_u64(*value))
    }
}

impl<'de> DeserializeAs<'de, u64> for U64AsHex {
    fn deserialize_as<D>(deserializer: D) -> Result<u64, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        decode_u64(&s).map_err(serde::de::Error::custom)
    }
}

pub struct BoolAsHex;

impl SerializeAs<bool> for BoolAsHex {
    fn serialize_as<S>(value: &bool, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(if *value { "0x1" } else { "0x0" })
    }
}

impl<'de> DeserializeAs<'de, bool> for BoolAsHex {
    fn deserialize_as<D>(deserializer: D) -> Result<bool, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        match decode_u64(&s).map_err(serde::de::Error::custom)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(serde::de::Error::custom(format!("Expected 0x0 or 0x1, got {other:#x}"))),
        }
    }
}
