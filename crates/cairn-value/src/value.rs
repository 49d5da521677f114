use std::collections::BTreeMap;
use std::fmt;
use std::sync::{Arc, OnceLock};

use cairn_types::{Chunk, Hash};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::codec;
use crate::error::{ValueError, ValueResult};
use crate::hash_cache;
use crate::reference::Ref;

/// The kind of a value.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ValueKind {
    Bool,
    Number,
    String,
    Blob,
    List,
    Map,
    Struct,
    Ref,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "bool"),
            Self::Number => write!(f, "number"),
            Self::String => write!(f, "string"),
            Self::Blob => write!(f, "blob"),
            Self::List => write!(f, "list"),
            Self::Map => write!(f, "map"),
            Self::Struct => write!(f, "struct"),
            Self::Ref => write!(f, "ref"),
        }
    }
}

/// The payload of a [`Value`].
///
/// Maps and struct fields are kept in `BTreeMap`s so the encoding is
/// independent of insertion order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ValueData {
    Bool(bool),
    Number(f64),
    String(String),
    Blob(Vec<u8>),
    List(Vec<Value>),
    Map(BTreeMap<String, Value>),
    Struct {
        name: String,
        fields: BTreeMap<String, Value>,
    },
    Ref(Ref),
}

struct Node {
    data: ValueData,
    hash: OnceLock<Hash>,
}

/// An immutable, structurally shared value.
///
/// Cloning is cheap. The content hash is computed on first use and cached
/// in the shared node, so every clone benefits from it.
#[derive(Clone)]
pub struct Value(Arc<Node>);

impl Value {
    /// Wrap raw value data.
    pub fn from_data(data: ValueData) -> Self {
        Self(Arc::new(Node {
            data,
            hash: OnceLock::new(),
        }))
    }

    /// Wrap value data whose hash is already known.
    ///
    /// Used when decoding a chunk that has been verified against its hash.
    pub(crate) fn with_known_hash(data: ValueData, hash: Hash) -> Self {
        Self(Arc::new(Node {
            data,
            hash: OnceLock::from(hash),
        }))
    }

    pub fn bool(b: bool) -> Self {
        Self::from_data(ValueData::Bool(b))
    }

    pub fn number(n: f64) -> Self {
        Self::from_data(ValueData::Number(n))
    }

    pub fn string(s: impl Into<String>) -> Self {
        Self::from_data(ValueData::String(s.into()))
    }

    pub fn blob(bytes: impl Into<Vec<u8>>) -> Self {
        Self::from_data(ValueData::Blob(bytes.into()))
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Self {
        Self::from_data(ValueData::List(items.into_iter().collect()))
    }

    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, Value)>) -> Self {
        Self::from_data(ValueData::Map(
            entries.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        ))
    }

    /// A named struct.
    pub fn structure<K: Into<String>>(
        name: impl Into<String>,
        fields: impl IntoIterator<Item = (K, Value)>,
    ) -> Self {
        Self::from_data(ValueData::Struct {
            name: name.into(),
            fields: fields.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        })
    }

    /// A value holding a reference.
    pub fn reference(r: Ref) -> Self {
        Self::from_data(ValueData::Ref(r))
    }

    pub fn data(&self) -> &ValueData {
        &self.0.data
    }

    pub fn kind(&self) -> ValueKind {
        match &self.0.data {
            ValueData::Bool(_) => ValueKind::Bool,
            ValueData::Number(_) => ValueKind::Number,
            ValueData::String(_) => ValueKind::String,
            ValueData::Blob(_) => ValueKind::Blob,
            ValueData::List(_) => ValueKind::List,
            ValueData::Map(_) => ValueKind::Map,
            ValueData::Struct { .. } => ValueKind::Struct,
            ValueData::Ref(_) => ValueKind::Ref,
        }
    }

    /// Content hash of the canonical encoding, computed at most once.
    pub fn hash(&self) -> Hash {
        hash_cache::ensure_hash(&self.0.hash, self)
    }

    /// Returns `true` if the hash has already been computed.
    pub fn hash_is_cached(&self) -> bool {
        self.0.hash.get().is_some()
    }

    /// Encode into a chunk keyed by this value's hash.
    pub fn to_chunk(&self) -> Chunk {
        Chunk::with_hash(self.hash(), codec::encode(self))
    }

    /// Every [`Ref`] embedded in this value, in encoding order.
    ///
    /// Refs are not followed: only the refs stored directly inside this
    /// value's own chunk are listed.
    pub fn refs(&self) -> Vec<Ref> {
        let mut out = Vec::new();
        self.collect_refs(&mut out);
        out
    }

    fn collect_refs(&self, out: &mut Vec<Ref>) {
        match &self.0.data {
            ValueData::Ref(r) => out.push(*r),
            ValueData::List(items) => items.iter().for_each(|v| v.collect_refs(out)),
            ValueData::Map(entries) => entries.values().for_each(|v| v.collect_refs(out)),
            ValueData::Struct { fields, .. } => fields.values().for_each(|v| v.collect_refs(out)),
            ValueData::Bool(_) | ValueData::Number(_) | ValueData::String(_) | ValueData::Blob(_) => {}
        }
    }

    /// Height of a chunk holding this value: one more than the tallest
    /// embedded ref, or 1 when there are none.
    pub fn chunk_height(&self) -> u64 {
        self.refs().iter().map(Ref::height).max().unwrap_or(0) + 1
    }

    // -----------------------------------------------------------------------
    // Typed accessors
    // -----------------------------------------------------------------------

    fn unexpected(&self, expected: ValueKind) -> ValueError {
        ValueError::UnexpectedKind {
            expected,
            actual: self.kind(),
        }
    }

    pub fn as_bool(&self) -> ValueResult<bool> {
        match &self.0.data {
            ValueData::Bool(b) => Ok(*b),
            _ => Err(self.unexpected(ValueKind::Bool)),
        }
    }

    pub fn as_number(&self) -> ValueResult<f64> {
        match &self.0.data {
            ValueData::Number(n) => Ok(*n),
            _ => Err(self.unexpected(ValueKind::Number)),
        }
    }

    pub fn as_str(&self) -> ValueResult<&str> {
        match &self.0.data {
            ValueData::String(s) => Ok(s),
            _ => Err(self.unexpected(ValueKind::String)),
        }
    }

    pub fn as_blob(&self) -> ValueResult<&[u8]> {
        match &self.0.data {
            ValueData::Blob(b) => Ok(b),
            _ => Err(self.unexpected(ValueKind::Blob)),
        }
    }

    pub fn as_list(&self) -> ValueResult<&[Value]> {
        match &self.0.data {
            ValueData::List(items) => Ok(items),
            _ => Err(self.unexpected(ValueKind::List)),
        }
    }

    pub fn as_map(&self) -> ValueResult<&BTreeMap<String, Value>> {
        match &self.0.data {
            ValueData::Map(entries) => Ok(entries),
            _ => Err(self.unexpected(ValueKind::Map)),
        }
    }

    pub fn as_ref_value(&self) -> ValueResult<Ref> {
        match &self.0.data {
            ValueData::Ref(r) => Ok(*r),
            _ => Err(self.unexpected(ValueKind::Ref)),
        }
    }

    /// Struct name, if this is a struct.
    pub fn struct_name(&self) -> Option<&str> {
        match &self.0.data {
            ValueData::Struct { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Look up a struct field.
    pub fn field(&self, field: &str) -> ValueResult<&Value> {
        match &self.0.data {
            ValueData::Struct { name, fields } => {
                fields.get(field).ok_or_else(|| ValueError::MissingField {
                    name: name.clone(),
                    field: field.to_string(),
                })
            }
            _ => Err(self.unexpected(ValueKind::Struct)),
        }
    }

    /// Navigate one step into the value: struct field or map entry.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match &self.0.data {
            ValueData::Struct { fields, .. } => fields.get(key),
            ValueData::Map(entries) => entries.get(key),
            _ => None,
        }
    }
}

// Values are identified by content.
impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0) || self.hash() == other.hash()
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&self.0.data, f)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.data.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        ValueData::deserialize(deserializer).map(Value::from_data)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::bool(b)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::number(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::string(s)
    }
}

impl From<Ref> for Value {
    fn from(r: Ref) -> Self {
        Value::reference(r)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn map_order_does_not_affect_hash() {
        let a = Value::map([("x", Value::number(1.0)), ("y", Value::number(2.0))]);
        let b = Value::map([("y", Value::number(2.0)), ("x", Value::number(1.0))]);
        assert_eq!(a.hash(), b.hash());
        assert_eq!(a, b);
    }

    #[test]
    fn different_values_differ() {
        assert_ne!(Value::string("a").hash(), Value::string("b").hash());
        assert_ne!(Value::bool(true).hash(), Value::string("true").hash());
    }

    #[test]
    fn hash_matches_chunk_hash() {
        let v = Value::list([Value::from("a"), Value::from(2.0)]);
        let chunk = v.to_chunk();
        assert_eq!(chunk.hash(), v.hash());
        assert!(chunk.verify(&v.hash()));
    }

    #[test]
    fn hash_is_cached_and_shared_by_clones() {
        let v = Value::string("cache me");
        assert!(!v.hash_is_cached());
        let copy = v.clone();
        let h = v.hash();
        assert!(copy.hash_is_cached());
        assert_eq!(copy.hash(), h);
    }

    #[test]
    fn refs_are_collected_without_following() {
        let leaf = Value::string("leaf");
        let r = Ref::new(&leaf);
        let v = Value::structure(
            "S",
            [
                ("a", Value::reference(r)),
                ("b", Value::list([Value::reference(r), Value::number(3.0)])),
            ],
        );
        assert_eq!(v.refs(), vec![r, r]);
        assert_eq!(v.chunk_height(), 2);
        assert!(leaf.refs().is_empty());
        assert_eq!(leaf.chunk_height(), 1);
    }

    #[test]
    fn typed_accessors() {
        let s = Value::structure("Point", [("x", Value::number(1.5))]);
        assert_eq!(s.struct_name(), Some("Point"));
        assert_eq!(s.field("x").unwrap().as_number().unwrap(), 1.5);
        assert!(matches!(
            s.field("y").unwrap_err(),
            ValueError::MissingField { .. }
        ));
        let err = Value::bool(true).as_str().unwrap_err();
        assert!(matches!(
            err,
            ValueError::UnexpectedKind {
                expected: ValueKind::String,
                actual: ValueKind::Bool
            }
        ));
        assert_eq!(Value::blob(b"xy".to_vec()).as_blob().unwrap(), b"xy");
    }

    #[test]
    fn get_navigates_maps_and_structs() {
        let m = Value::map([("k", Value::from("v"))]);
        assert_eq!(m.get("k").unwrap().as_str().unwrap(), "v");
        assert!(m.get("missing").is_none());
        assert!(Value::number(1.0).get("k").is_none());
    }
}
