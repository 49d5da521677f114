//! Canonical binary encoding of values.
//!
//! Values are encoded with bincode's default configuration. Maps and struct
//! fields are ordered by key, so equal values always produce equal bytes.

use cairn_types::Chunk;

use crate::error::{ValueError, ValueResult};
use crate::value::{Value, ValueData};

/// Encode a value to its canonical bytes.
pub fn encode(value: &Value) -> Vec<u8> {
    // Every ValueData variant maps onto plain bincode primitives.
    bincode::serialize(value).expect("value encoding is infallible for in-memory data")
}

/// Decode canonical bytes.
pub fn decode(data: &[u8]) -> ValueResult<Value> {
    bincode::deserialize(data).map_err(|e| ValueError::Decode(e.to_string()))
}

/// Decode a chunk, seeding the value's hash cache with the chunk hash.
///
/// The caller is responsible for having verified the chunk if it came from
/// an untrusted source.
pub fn decode_chunk(chunk: &Chunk) -> ValueResult<Value> {
    let data: ValueData =
        bincode::deserialize(chunk.data()).map_err(|e| ValueError::Decode(e.to_string()))?;
    Ok(Value::with_known_hash(data, chunk.hash()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reference::Ref;
    use proptest::prelude::*;

    #[test]
    fn nested_value_decodes_to_same_hash() {
        let leaf = Value::string("leaf");
        let v = Value::structure(
            "Row",
            [
                ("name", Value::from("alice")),
                ("tags", Value::list([Value::from("a"), Value::from("b")])),
                ("raw", Value::blob(vec![0u8, 1, 2, 255])),
                ("link", Value::reference(Ref::new(&leaf))),
                ("ok", Value::bool(false)),
            ],
        );
        let back = decode(&encode(&v)).unwrap();
        assert_eq!(back.hash(), v.hash());
        assert_eq!(back.refs(), v.refs());
    }

    #[test]
    fn garbage_is_rejected() {
        let err = decode(&[0xff, 0xff, 0xff, 0xff, 0xff]).unwrap_err();
        assert!(matches!(err, ValueError::Decode(_)));
    }

    #[test]
    fn decode_chunk_seeds_cache() {
        let chunk = Value::from("seeded").to_chunk();
        let v = decode_chunk(&chunk).unwrap();
        assert!(v.hash_is_cached());
        assert_eq!(v.hash(), chunk.hash());
    }

    proptest! {
        #[test]
        fn strings_encode_deterministically(s in ".*") {
            prop_assert_eq!(encode(&Value::string(s.clone())), encode(&Value::string(s)));
        }
    }
}
