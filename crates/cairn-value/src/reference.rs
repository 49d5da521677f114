use std::fmt;

use cairn_types::Hash;
use serde::{Deserialize, Serialize};

use crate::value::{Value, ValueKind};

/// A typed pointer to a stored value.
///
/// `height` is the length of the longest chain of refs below the target
/// chunk, counting the target itself: a value with no embedded refs has
/// height 1. A parent always has a greater height than any chunk it
/// references, which lets graph walks prune by height.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Ref {
    target: Hash,
    height: u64,
    kind: ValueKind,
}

impl Ref {
    /// Reference a value.
    pub fn new(value: &Value) -> Self {
        Self {
            target: value.hash(),
            height: value.chunk_height(),
            kind: value.kind(),
        }
    }

    /// Build a ref from its parts, e.g. when the target is only known by hash.
    pub fn from_parts(target: Hash, height: u64, kind: ValueKind) -> Self {
        Self {
            target,
            height,
            kind,
        }
    }

    pub fn target(&self) -> Hash {
        self.target
    }

    pub fn height(&self) -> u64 {
        self.height
    }

    /// Kind of the referenced value.
    pub fn kind(&self) -> ValueKind {
        self.kind
    }
}

impl fmt::Debug for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ref({}, h={}, {})", self.target.short(), self.height, self.kind)
    }
}

impl fmt::Display for Ref {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.target)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn height_grows_with_nesting() {
        let a = Value::string("a");
        let ra = Ref::new(&a);
        assert_eq!(ra.height(), 1);
        assert_eq!(ra.kind(), ValueKind::String);
        assert_eq!(ra.target(), a.hash());

        let b = Value::list([Value::reference(ra)]);
        let rb = Ref::new(&b);
        assert_eq!(rb.height(), 2);

        let c = Value::map([("a", Value::reference(ra)), ("b", Value::reference(rb))]);
        assert_eq!(Ref::new(&c).height(), 3);
    }

    #[test]
    fn display_is_hash_prefixed() {
        let r = Ref::new(&Value::bool(true));
        assert_eq!(r.to_string(), format!("#{}", r.target()));
    }
}
