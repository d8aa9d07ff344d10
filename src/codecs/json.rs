//! JSON Codec using `serde_json`

use crate::error::{CacheError, CacheResult};
use crate::traits::CacheCodec;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// JSON Codec using `serde_json`
///
/// The default codec. Integers encode as ASCII decimal, which is the same
/// representation `increment` stores, so counters can be read back with
/// `get::<i64>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonCodec;

impl CacheCodec for JsonCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CacheResult<Vec<u8>> {
        serde_json::to_vec(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CacheResult<T> {
        serde_json::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "serde_json"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_counter_written_as_ascii_decimal() {
        let n: i64 = JsonCodec.deserialize(b"42").unwrap();
        assert_eq!(n, 42);
    }

    #[test]
    fn mismatched_type_is_serialization_error() {
        let err = JsonCodec.deserialize::<u32>(b"\"not a number\"").unwrap_err();
        assert!(matches!(err, CacheError::Serialization(_)));
    }
}
