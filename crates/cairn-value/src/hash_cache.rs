//! Write-once hash caching with a test hook.
//!
//! Every [`Value`] carries a write-once slot for its hash. The first call to
//! [`Value::hash`] fills it and later calls return the cached hash.
//!
//! [`override_hash`] swaps the hash function for the current thread so
//! tests can manufacture values whose recorded hash disagrees with their
//! content. The previous function comes back when the guard is dropped.
//! Values that already have a cached hash are not affected.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::OnceLock;

use cairn_types::Hash;

use crate::codec;
use crate::value::Value;

type HashFn = Rc<dyn Fn(&Value) -> Hash>;

thread_local! {
    static OVERRIDE: RefCell<Option<HashFn>> = const { RefCell::new(None) };
}

/// Hash the canonical encoding of `value`, honouring any override.
pub fn hash_of(value: &Value) -> Hash {
    let hook = OVERRIDE.with(|slot| slot.borrow().clone());
    match hook {
        Some(f) => f(value),
        None => content_hash(value),
    }
}

/// Hash the canonical encoding of `value`, ignoring any override.
pub fn content_hash(value: &Value) -> Hash {
    Hash::of(&codec::encode(value))
}

/// Return the cached hash, computing it on first use.
pub fn ensure_hash(cell: &OnceLock<Hash>, value: &Value) -> Hash {
    *cell.get_or_init(|| hash_of(value))
}

/// Restores the previous hash function when dropped.
#[must_use = "the override is removed when the guard is dropped"]
pub struct HashOverrideGuard {
    previous: Option<HashFn>,
}

impl Drop for HashOverrideGuard {
    fn drop(&mut self) {
        let previous = self.previous.take();
        OVERRIDE.with(|slot| *slot.borrow_mut() = previous);
    }
}

/// Replace the hash function on this thread until the guard is dropped.
pub fn override_hash<F>(f: F) -> HashOverrideGuard
where
    F: Fn(&Value) -> Hash + 'static,
{
    let previous = OVERRIDE.with(|slot| slot.borrow_mut().replace(Rc::new(f)));
    HashOverrideGuard { previous }
}
