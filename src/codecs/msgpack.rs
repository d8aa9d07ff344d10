//! MessagePack Codec using `rmp-serde`

use crate::error::{CacheError, CacheResult};
use crate::traits::CacheCodec;
use serde::Serialize;
use serde::de::DeserializeOwned;

/// MessagePack Codec using `rmp-serde`
///
/// Produces smaller payloads than JSON for structured values. Struct fields are
/// encoded by name so payloads survive field reordering.
///
/// Counters written by `increment` are ASCII decimal, which this codec does not
/// decode as the counter's value (`"1"` is the byte `0x31`, a MessagePack
/// fixint 49); read them with `get_raw` instead.
#[cfg_attr(docsrs, doc(cfg(feature = "msgpack")))]
#[derive(Debug, Default, Clone, Copy)]
pub struct MsgPackCodec;

impl CacheCodec for MsgPackCodec {
    fn serialize<T: Serialize + ?Sized>(&self, value: &T) -> CacheResult<Vec<u8>> {
        rmp_serde::to_vec_named(value).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn deserialize<T: DeserializeOwned>(&self, bytes: &[u8]) -> CacheResult<T> {
        rmp_serde::from_slice(bytes).map_err(|e| CacheError::Serialization(e.to_string()))
    }

    fn name(&self) -> &'static str {
        "rmp_serde"
    }
}

#[cfg(all(test, feature = "msgpack"))]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Bar {
        symbol: String,
        close: f64,
    }

    #[test]
    fn encodes_structs_by_field_name() {
        let codec = MsgPackCodec;
        let bar = Bar {
            symbol: "AAPL".to_string(),
            close: 190.1,
        };
        let bytes = codec.serialize(&bar).unwrap();
        assert_eq!(codec.deserialize::<Bar>(&bytes).unwrap(), bar);
    }

    #[test]
    fn ascii_counters_do_not_decode_to_their_value() {
        let codec = MsgPackCodec;
        assert_ne!(codec.deserialize::<i64>(b"1").ok(), Some(1));
        assert_ne!(codec.deserialize::<i64>(b"42").ok(), Some(42));
    }
}
