//! The interning arena: component A of the design. An [`Arena`] is the unit of GPU-IR storage;
//! every [`crate::ir::Node`] lives in exactly one arena, and releasing the arena (simply
//! dropping it) frees every node, node-list, and string it owns in one shot.
//!
//! Nodes are hash-consed: [`Arena::intern_node`] never creates a duplicate of a structurally
//! equal node. Because a node's payload only ever refers to *other already-interned* ids
//! (never to a raw subtree), computing its hash is O(payload size), not O(subtree size) — see
//! `crate::ctxhash`.

use crate::ctxhash::{CtxEq, CtxHash, CtxHashMap};
use crate::entity::{PrimaryMap, SecondaryMap};
use crate::ir::abs::Abstraction;
use crate::ir::decl::Decl;
use crate::ir::ids::{AbsId, DeclId, NodeId, NodeListId, StrId, Uniformity};
use crate::ir::node::Node;
use std::hash::Hash;

/// The dialect level of an arena: which invariants its nodes are guaranteed to satisfy. The
/// pipeline strengthens this monotonically as it threads a program through successive arenas
/// (§4.F); no pass is ever asked to run against a *weaker* config than the one it declares it
/// needs.
#[derive(Clone, Debug)]
pub struct ArenaConfig {
    /// Every value/instruction node carries a resolved type (itself interned in this arena).
    pub check_types: bool,
    /// No `Unbound` node remains; every `Variable` resolves to a definition in lexical scope.
    pub name_bound: bool,
    /// Constant-folding is permitted during construction (disabled for e.g. the pre-bind
    /// arena, where folding could hide a binding error).
    pub allow_fold: bool,
    /// True until `simt2d` runs: whether the program still models per-lane (SIMT) execution
    /// rather than explicit-SIMD.
    pub is_simt: bool,
    /// Whether GPU-builtin references are checked against their canonical types.
    pub validate_builtin_types: bool,
    pub word_bits: u32,
    pub pointer_bits: u32,
    pub subgroup_size: u32,
    pub subgroup_mask_bits: u32,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            check_types: false,
            name_bound: false,
            allow_fold: true,
            is_simt: true,
            validate_builtin_types: false,
            word_bits: 32,
            pointer_bits: 64,
            subgroup_size: 8,
            subgroup_mask_bits: 64,
        }
    }
}

impl ArenaConfig {
    pub fn assert_stronger_than(&self, previous: &ArenaConfig) {
        if previous.check_types {
            debug_assert!(self.check_types, "pipeline must not forget check_types");
        }
        if previous.name_bound {
            debug_assert!(self.name_bound, "pipeline must not forget name_bound");
        }
    }
}

/// External-context wrapper so `Node`, `Box<[NodeId]>`, and `Box<str>` (all plain `Eq + Hash`
/// types) can share the same [`CtxHashMap`] machinery used for the node table, without every
/// call site re-deriving a trivial `CtxEq`/`CtxHash` impl.
struct DirectCtx;

impl<V: Eq + Hash> CtxEq<V, V> for DirectCtx {
    fn ctx_eq(&self, a: &V, b: &V) -> bool {
        a == b
    }
}
impl<V: Eq + Hash> CtxHash<V> for DirectCtx {
    fn ctx_hash<H: std::hash::Hasher>(&self, state: &mut H, value: &V) {
        value.hash(state);
    }
}

/// A single hash-consing, config-carrying IR dialect level.
///
/// The bump allocator ([`bumpalo::Bump`]) backs scratch buffers used while assembling a new
/// node-list or string before it is frozen into the canonical `Box<[_]>` stored in the arena;
/// this keeps repeated small allocations (building up a call's argument list one push at a
/// time, say) off the global allocator.
pub struct Arena {
    pub config: ArenaConfig,

    nodes: PrimaryMap<NodeId, Node>,
    node_intern: CtxHashMap<Node, NodeId>,

    node_lists: PrimaryMap<NodeListId, Box<[NodeId]>>,
    list_intern: CtxHashMap<Box<[NodeId]>, NodeListId>,

    strings: PrimaryMap<StrId, Box<str>>,
    string_intern: CtxHashMap<Box<str>, StrId>,

    abstractions: PrimaryMap<AbsId, Abstraction>,
    decls: PrimaryMap<DeclId, Decl>,

    /// Side table populated by the type checker (§4.C) when `config.check_types` is set. Kept
    /// out of `Node` itself so that a node's hash-cons identity never depends on when in the
    /// pipeline it happened to be typed.
    types: SecondaryMap<NodeId, Option<NodeId>>,
    uniformity: SecondaryMap<NodeId, Uniformity>,

    scratch: bumpalo::Bump,
    next_fresh_id: u32,
}

impl Arena {
    pub fn new(config: ArenaConfig) -> Self {
        Self {
            config,
            nodes: PrimaryMap::new(),
            node_intern: CtxHashMap::new(),
            node_lists: PrimaryMap::new(),
            list_intern: CtxHashMap::new(),
            strings: PrimaryMap::new(),
            string_intern: CtxHashMap::new(),
            abstractions: PrimaryMap::new(),
            decls: PrimaryMap::new(),
            types: SecondaryMap::new(),
            uniformity: SecondaryMap::new(),
            scratch: bumpalo::Bump::new(),
            next_fresh_id: 0,
        }
    }

    /// Record the resolved type for `node`. Only meaningful once `config.check_types` is set;
    /// the type checker is the sole writer.
    pub fn set_type(&mut self, node: NodeId, ty: NodeId) {
        self.types[node] = Some(ty);
    }

    pub fn type_of(&self, node: NodeId) -> Option<NodeId> {
        self.types[node]
    }

    pub fn set_uniformity(&mut self, node: NodeId, u: Uniformity) {
        self.uniformity[node] = u;
    }

    pub fn uniformity_of(&self, node: NodeId) -> Uniformity {
        self.uniformity[node]
    }

    /// Intern a node, returning the canonical id for its structural equivalence class.
    ///
    /// This is the one and only way a `Node` payload enters an arena: there is no API that
    /// mutates a node in place, so once a caller holds a `NodeId` its meaning never changes.
    pub fn intern_node(&mut self, node: Node) -> NodeId {
        if let Some(existing) = self.node_intern.get(&node, &DirectCtx) {
            return *existing;
        }
        let id = self.nodes.push(node.clone());
        self.node_intern.insert(node, id, &DirectCtx);
        id
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    /// Look up a node's id without interning it, for callers (the emitter's global-variable
    /// binding, mainly) that need to recover the id of a node they know must already be present
    /// rather than mutate the arena to get it.
    pub fn lookup_node(&self, node: &Node) -> Option<NodeId> {
        self.node_intern.get(node, &DirectCtx).copied()
    }

    /// Every interned node, in allocation order. Used by passes that need to scan for a
    /// particular leftover tag (e.g. `bind_program` checking that no `Unbound` node survived)
    /// rather than walk the program structurally.
    pub fn all_nodes(&self) -> impl Iterator<Item = (NodeId, &Node)> {
        self.nodes.iter()
    }

    /// Intern a node-list (operands, parameter lists, yield-type lists, ...).
    pub fn intern_nodes(&mut self, items: impl IntoIterator<Item = NodeId>) -> NodeListId {
        // Assemble in the scratch bump arena first so a lookup that turns out to be a hit
        // doesn't force a heap allocation for the final `Box<[_]>`.
        let scratch = bumpalo::collections::Vec::from_iter_in(items, &self.scratch);
        let key: Box<[NodeId]> = scratch.into_bump_slice().to_vec().into_boxed_slice();
        self.scratch.reset();
        if let Some(existing) = self.list_intern.get(&key, &DirectCtx) {
            return *existing;
        }
        let id = self.node_lists.push(key.clone());
        self.list_intern.insert(key, id, &DirectCtx);
        id
    }

    pub fn nodes_slice(&self, id: NodeListId) -> &[NodeId] {
        &self.node_lists[id]
    }

    /// Intern a string (identifier text).
    pub fn intern_string(&mut self, bytes: &str) -> StrId {
        let key: Box<str> = bytes.into();
        if let Some(existing) = self.string_intern.get(&key, &DirectCtx) {
            return *existing;
        }
        let id = self.strings.push(key.clone());
        self.string_intern.insert(key, id, &DirectCtx);
        id
    }

    pub fn string(&self, id: StrId) -> &str {
        &self.strings[id]
    }

    /// Allocate the header of a new abstraction, reserving its identity before the body is
    /// known. Callers must follow up with [`Arena::define_abs_body`] before the arena is used
    /// by anything that reads bodies (the CF analyses, the rewriter, the emitter).
    pub fn declare_abs(&mut self, abs: Abstraction) -> AbsId {
        self.abstractions.push(abs)
    }

    pub fn define_abs_body(&mut self, id: AbsId, body: NodeId) {
        self.abstractions[id].set_body(body);
    }

    pub fn abs(&self, id: AbsId) -> &Abstraction {
        &self.abstractions[id]
    }

    pub fn abs_mut(&mut self, id: AbsId) -> &mut Abstraction {
        &mut self.abstractions[id]
    }

    pub fn abs_ids(&self) -> impl Iterator<Item = AbsId> + '_ {
        self.abstractions.keys()
    }

    pub fn declare_decl(&mut self, decl: Decl) -> DeclId {
        self.decls.push(decl)
    }

    pub fn decl(&self, id: DeclId) -> &Decl {
        &self.decls[id]
    }

    /// A monotonically increasing counter used to name freshly synthesized variables (e.g. a
    /// merge-point parameter introduced by `lcssa`). Two passes run back to back against a
    /// freshly-seeded counter produce identical names, which is what makes typing deterministic
    /// (testable property #2).
    pub fn fresh_id(&mut self) -> u32 {
        let id = self.next_fresh_id;
        self.next_fresh_id += 1;
        id
    }

    pub fn seed_fresh_id(&mut self, next: u32) {
        self.next_fresh_id = next;
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn abs_count(&self) -> usize {
        self.abstractions.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::node::Node;

    #[test]
    fn duplicate_int_literals_intern_to_same_id() {
        let mut arena = Arena::new(ArenaConfig::default());
        let a = arena.intern_node(Node::IntLiteral(1));
        let b = arena.intern_node(Node::IntLiteral(1));
        assert_eq!(a, b, "structurally-equal nodes must share identity");
    }

    #[test]
    fn distinct_payloads_get_distinct_ids() {
        let mut arena = Arena::new(ArenaConfig::default());
        let a = arena.intern_node(Node::IntLiteral(1));
        let b = arena.intern_node(Node::IntLiteral(2));
        assert_ne!(a, b);
    }

    #[test]
    fn node_lists_are_deduplicated() {
        let mut arena = Arena::new(ArenaConfig::default());
        let one = arena.intern_node(Node::IntLiteral(1));
        let two = arena.intern_node(Node::IntLiteral(2));
        let list_a = arena.intern_nodes([one, two]);
        let list_b = arena.intern_nodes([one, two]);
        assert_eq!(list_a, list_b);
        assert_eq!(arena.nodes_slice(list_a), &[one, two]);
    }

    #[test]
    fn strings_are_deduplicated_by_content() {
        let mut arena = Arena::new(ArenaConfig::default());
        let a = arena.intern_string("px");
        let b = arena.intern_string("px");
        let c = arena.intern_string("py");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn fresh_id_is_monotonic() {
        let mut arena = Arena::new(ArenaConfig::default());
        assert_eq!(arena.fresh_id(), 0);
        assert_eq!(arena.fresh_id(), 1);
        assert_eq!(arena.fresh_id(), 2);
    }
}
