//! Abstractions: named or anonymous targets of control flow.
//!
//! Functions, basic blocks, and anonymous lambdas reference each other cyclically (a loop's
//! body jumps back to a block that dominates it; a function's blocks reference the function's
//! own identity for nothing in particular, but `Jump`/`Branch`/`Call` targets form genuine
//! cycles). Hash-consing assumes an acyclic payload, so abstractions live outside the interning
//! table entirely: each gets a stable [`AbsId`] the moment its header is created, and the body
//! is attached afterwards through a narrow, explicitly two-phase API (`Arena::declare_abs` then
//! `Arena::define_abs_body`). This mirrors the teacher's pattern of allocating a `Function`/
//! `Block` by index up front and filling in its body as the builder walks the source.

use crate::ir::ids::{AbsId, NodeId, NodeListId, StrId};

/// What kind of abstraction an [`AbsId`] names.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Abstraction {
    Function(Function),
    BasicBlock(BasicBlock),
    AnonymousLambda(AnonymousLambda),
}

impl Abstraction {
    pub fn tag(&self) -> &'static str {
        match self {
            Abstraction::Function(_) => "function",
            Abstraction::BasicBlock(_) => "basic_block",
            Abstraction::AnonymousLambda(_) => "anonymous_lambda",
        }
    }

    /// The body expression, if it has been attached yet. `None` during the header-only window
    /// between `declare_abs` and `define_abs_body`.
    pub fn body(&self) -> Option<NodeId> {
        match self {
            Abstraction::Function(f) => f.body,
            Abstraction::BasicBlock(b) => b.body,
            Abstraction::AnonymousLambda(l) => l.body,
        }
    }

    pub fn params(&self) -> NodeListId {
        match self {
            Abstraction::Function(f) => f.params,
            Abstraction::BasicBlock(b) => b.params,
            Abstraction::AnonymousLambda(l) => l.params,
        }
    }

    pub fn set_body(&mut self, body: NodeId) {
        let slot = match self {
            Abstraction::Function(f) => &mut f.body,
            Abstraction::BasicBlock(b) => &mut b.body,
            Abstraction::AnonymousLambda(l) => &mut l.body,
        };
        debug_assert!(slot.is_none(), "abstraction body defined twice");
        *slot = Some(body);
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Abstraction::Function(f) if f.is_leaf)
    }

    pub fn mark_leaf(&mut self, leaf: bool) {
        if let Abstraction::Function(f) = self {
            f.is_leaf = leaf;
        }
    }
}

/// A named function: the unit the pipeline compiles and the unit the emitter reserves an
/// `SpvId` for.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Function {
    pub name: StrId,
    pub params: NodeListId,
    pub result_types: NodeListId,
    /// Entry basic block, set in the same call that attaches `body` for a top-level function
    /// (a function's "body" is its entry block's abstraction id, expressed as a `NodeId` of a
    /// zero-argument `Jump` to that block, keeping `body` uniform across all `Abstraction`
    /// kinds).
    pub body: Option<NodeId>,
    /// Set by the optional `mark_leaf_functions` pass: true if the function makes no calls
    /// (directly or through a tail call) and therefore needs no stack-frame push on entry.
    pub is_leaf: bool,
    /// Set by `specialize_for_entry_point` bookkeeping: true if this function is the configured
    /// Vulkan entry point.
    pub is_entry_point: bool,
}

/// A named basic block reachable by `Jump`/`Branch`/`Switch` targets within one function.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct BasicBlock {
    pub name: StrId,
    pub params: NodeListId,
    pub body: Option<NodeId>,
}

/// The implicit body of an instruction-bearing block (e.g. an `If`'s `true`/`false` arm, a
/// `Loop`'s body). Per the CF-analysis invariant, every anonymous lambda has exactly one
/// predecessor edge (the structural edge from the instruction that owns it).
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct AnonymousLambda {
    pub params: NodeListId,
    pub body: Option<NodeId>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entity::EntityRef;

    #[test]
    fn set_body_once() {
        let mut f = Abstraction::BasicBlock(BasicBlock {
            name: StrId::new(0),
            params: NodeListId::new(0),
            body: None,
        });
        assert!(f.body().is_none());
        f.set_body(NodeId::new(0));
        assert_eq!(f.body(), Some(NodeId::new(0)));
    }
}
