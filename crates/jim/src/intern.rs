//! Shared byte-string pool.
//!
//! Variable and link names repeat heavily (every loop iteration resolves the
//! same few names), so the interpreter deduplicates them: `acquire` returns a
//! stable `Rc<[u8]>` for the given bytes, handing the same allocation to
//! every caller. Entries whose only owner is the pool itself are dropped by
//! `purge`, which runs opportunistically when frames are torn down.

use ahash::AHashSet;
use std::rc::Rc;

#[derive(Debug, Default)]
pub(crate) struct StrPool {
    set: AHashSet<Rc<[u8]>>,
}

impl StrPool {
    /// Returns the pooled copy of `bytes`, inserting it on first use.
    pub fn acquire(&mut self, bytes: &[u8]) -> Rc<[u8]> {
        if let Some(existing) = self.set.get(bytes) {
            return Rc::clone(existing);
        }
        let entry: Rc<[u8]> = Rc::from(bytes);
        self.set.insert(Rc::clone(&entry));
        entry
    }

    /// Drops entries no longer referenced outside the pool.
    pub fn purge(&mut self) {
        self.set.retain(|entry| Rc::strong_count(entry) > 1);
    }

    pub fn len(&self) -> usize {
        self.set.len()
    }
}

/// Smoke test for the shared-string pool, exposed for the CLI's `--test-ht`
/// mode. Exercises dedup, reuse across holders, and purge behavior.
pub fn pool_smoke_test() -> Result<(), String> {
    let mut pool = StrPool::default();

    let keys: Vec<String> = (0..1024).map(|i| format!("key-{i}")).collect();
    let held: Vec<Rc<[u8]>> = keys.iter().map(|k| pool.acquire(k.as_bytes())).collect();
    if pool.len() != keys.len() {
        return Err(format!("expected {} pooled entries, found {}", keys.len(), pool.len()));
    }

    // Re-acquiring must return the same allocation, not a new one.
    for (key, first) in keys.iter().zip(&held) {
        let again = pool.acquire(key.as_bytes());
        if !Rc::ptr_eq(first, &again) {
            return Err(format!("acquire returned a fresh allocation for {key}"));
        }
    }
    if pool.len() != keys.len() {
        return Err(format!("re-acquire grew the pool to {}", pool.len()));
    }

    // Dropping the outside holders makes entries purgeable.
    let keep: Vec<Rc<[u8]>> = held.iter().take(16).map(Rc::clone).collect();
    drop(held);
    pool.purge();
    if pool.len() != keep.len() {
        return Err(format!("expected {} entries after purge, found {}", keep.len(), pool.len()));
    }
    for entry in &keep {
        let again = pool.acquire(entry);
        if !Rc::ptr_eq(entry, &again) {
            return Err("purge dropped a live entry".to_owned());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn acquire_deduplicates() {
        let mut pool = StrPool::default();
        let a = pool.acquire(b"x");
        let b = pool.acquire(b"x");
        assert!(Rc::ptr_eq(&a, &b));
        assert_eq!(pool.len(), 1);
    }

    #[test]
    fn purge_keeps_live_entries() {
        let mut pool = StrPool::default();
        let live = pool.acquire(b"live");
        let _ = pool.acquire(b"dead");
        pool.purge();
        assert_eq!(pool.len(), 1);
        assert!(Rc::ptr_eq(&live, &pool.acquire(b"live")));
    }

    #[test]
    fn smoke_test_passes() {
        pool_smoke_test().unwrap();
    }
}
