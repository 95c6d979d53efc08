//! A hashmap with "external hashing": keys are hashed or compared for equality only with
//! some external context supplied on lookup/insert.
//!
//! This is what makes interning cheap: a [`Node`](crate::ir::node::Node) payload refers to its
//! operands by [`NodeId`](crate::ir::node::NodeId), a small interned index, so hashing a node's
//! payload is O(payload size) rather than O(subtree size) even though two structurally-equal
//! subtrees are guaranteed (by the interning invariant) to share the same id.

use hashbrown::raw::RawTable;
use std::hash::{Hash, Hasher};

/// Determine whether `a` and `b` are equal, given external context `self`.
pub trait CtxEq<V1: ?Sized, V2: ?Sized> {
    fn ctx_eq(&self, a: &V1, b: &V2) -> bool;
}

/// Compute the hash of `value`, given external context `self`.
pub trait CtxHash<V: ?Sized>: CtxEq<V, V> {
    fn ctx_hash<H: Hasher>(&self, state: &mut H, value: &V);
}

struct Bucket<K, V> {
    hash: u64,
    key: K,
    value: V,
}

/// A hashmap that takes external context for all operations, used to intern [`Node`]s by
/// `(tag, operand ids)` without needing `K: Hash + Eq`.
pub struct CtxHashMap<K, V> {
    raw: RawTable<Bucket<K, V>>,
}

impl<K, V> CtxHashMap<K, V> {
    pub fn new() -> Self {
        Self {
            raw: RawTable::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            raw: RawTable::with_capacity(capacity),
        }
    }

    pub fn len(&self) -> usize {
        self.raw.len()
    }
}

impl<K, V> Default for CtxHashMap<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

fn compute_hash<Ctx, K>(ctx: &Ctx, key: &K) -> u64
where
    Ctx: CtxHash<K>,
{
    let mut hasher = rustc_hash::FxHasher::default();
    ctx.ctx_hash(&mut hasher, key);
    hasher.finish()
}

impl<K, V> CtxHashMap<K, V> {
    /// Find an existing entry equal (under `ctx`) to `key`, or return `None`.
    pub fn get<Ctx>(&self, key: &K, ctx: &Ctx) -> Option<&V>
    where
        Ctx: CtxHash<K>,
    {
        let hash = compute_hash(ctx, key);
        self.raw
            .get(hash, |bucket| ctx.ctx_eq(&bucket.key, key))
            .map(|bucket| &bucket.value)
    }

    /// Insert `key -> value`, assuming `key` is not already present (callers are expected to
    /// `get` first; interning call sites always do).
    pub fn insert<Ctx>(&mut self, key: K, value: V, ctx: &Ctx)
    where
        Ctx: CtxHash<K>,
    {
        let hash = compute_hash(ctx, &key);
        self.raw.insert(
            hash,
            Bucket { hash, key, value },
            |bucket| bucket.hash,
        );
    }

    /// Get-or-insert: the common interning path. Returns `(value, was_new)`.
    pub fn get_or_insert<Ctx>(&mut self, key: K, ctx: &Ctx, make_value: impl FnOnce() -> V) -> (V, bool)
    where
        Ctx: CtxHash<K>,
        V: Copy,
    {
        let hash = compute_hash(ctx, &key);
        if let Some(bucket) = self.raw.get(hash, |bucket| ctx.ctx_eq(&bucket.key, &key)) {
            return (bucket.value, false);
        }
        let value = make_value();
        self.raw
            .insert(hash, Bucket { hash, key, value }, |bucket| bucket.hash);
        (value, true)
    }
}

/// A null-comparator context for value types that already implement `Eq + Hash` directly.
#[derive(Default)]
pub struct NullCtx;

impl<V: Eq + Hash> CtxEq<V, V> for NullCtx {
    fn ctx_eq(&self, a: &V, b: &V) -> bool {
        a == b
    }
}

impl<V: Eq + Hash> CtxHash<V> for NullCtx {
    fn ctx_hash<H: Hasher>(&self, state: &mut H, value: &V) {
        value.hash(state);
    }
}
