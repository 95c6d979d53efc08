//! Entity-reference index types and small closed enumerations used throughout the IR.

use crate::entity::entity_impl;

/// Reference to a hash-consed node (a type, value, instruction, terminator, or constant
/// payload) within one [`Arena`](crate::arena::Arena). Pointer equality in the source system
/// becomes index equality here: two `NodeId`s are equal iff they name the same interned node.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(u32);
entity_impl!(NodeId, "n");

/// Reference to an interned, deduplicated list of [`NodeId`]s (operands, parameter lists,
/// yield-type lists, ...).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeListId(u32);
entity_impl!(NodeListId, "l");

/// Reference to an interned, deduplicated byte string (identifier names).
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StrId(u32);
entity_impl!(StrId, "s");

/// Reference to an [`Abstraction`](crate::ir::abs::Abstraction): a `Function`, `BasicBlock`,
/// or `AnonymousLambda`. Unlike `NodeId`, abstractions are *not* hash-consed — see
/// `DESIGN.md` for why the cyclic, header-then-body construction protocol rules that out.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AbsId(u32);
entity_impl!(AbsId, "a");

/// Reference to a top-level declaration (`GlobalVariable` or `Constant`) owned by the `Root`.
#[derive(Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeclId(u32);
entity_impl!(DeclId, "d");

/// Address space classification of a pointer, per §3 of the spec. The logical/physical split
/// governs whether address arithmetic is legal on a pointer of that space; `Generic` must be
/// eliminated by `lower_generic_ptrs` before the emitter will accept the program.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum AddressSpace {
    GlobalLogical,
    GlobalPhysical,
    SharedLogical,
    SharedPhysical,
    PrivateLogical,
    PrivatePhysical,
    SubgroupPhysical,
    Function,
    Generic,
    Input,
    Output,
    External,
}

impl AddressSpace {
    /// Logical address spaces forbid pointer arithmetic; physical ones permit it.
    pub fn is_physical(self) -> bool {
        matches!(
            self,
            AddressSpace::GlobalPhysical
                | AddressSpace::SharedPhysical
                | AddressSpace::PrivatePhysical
                | AddressSpace::SubgroupPhysical
        )
    }

    pub fn is_generic(self) -> bool {
        matches!(self, AddressSpace::Generic)
    }
}

/// The uniformity qualifier lattice: `Uniform ⊑ Varying`. `Unknown` only appears transiently
/// before the type checker has run a fixed point; a fully inferred program never has `Unknown`
/// reachable from a Qualified type.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug, Default)]
pub enum Uniformity {
    Uniform,
    Varying,
    #[default]
    Unknown,
}

impl Uniformity {
    /// Join on the lattice: used when merging values along different control-flow edges
    /// (e.g. the two arms of an `If`).
    pub fn join(self, other: Uniformity) -> Uniformity {
        use Uniformity::*;
        match (self, other) {
            (Uniform, Uniform) => Uniform,
            (Unknown, x) | (x, Unknown) => x,
            _ => Varying,
        }
    }
}

/// The closed set of primitive operators. Arithmetic/comparison/bitwise ops are
/// uniformity-preserving; `load`/`store`/`alloca`/`call` are not pure in the uniformity sense
/// (and `call` is not actually represented as a `PrimOp` — it is its own instruction — this
/// enum covers the primop token set from the surface grammar in §6).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum PrimOpKind {
    Add,
    Sub,
    Mul,
    Div,
    Mod,
    Lt,
    Lte,
    Gt,
    Gte,
    Eq,
    Neq,
    And,
    Or,
    Xor,
    Not,
    Load,
    Store,
    Alloca,
    Lea,
    Memcpy,
    SubgroupBroadcast,
    SubgroupBallot,
    SubgroupReduce,
}

impl PrimOpKind {
    /// Arithmetic and comparison ops preserve uniformity: if every operand is `Uniform`, so is
    /// the result. Memory and subgroup ops do not (a `load` from a varying address may observe
    /// different values per lane even given uniform operands).
    pub fn is_uniformity_preserving(self) -> bool {
        use PrimOpKind::*;
        matches!(
            self,
            Add | Sub | Mul | Div | Mod | Lt | Lte | Gt | Gte | Eq | Neq | And | Or | Xor | Not
        )
    }
}
