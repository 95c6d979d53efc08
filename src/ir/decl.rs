//! Top-level declarations: the contents of a `Root`.

use crate::ir::ids::{AbsId, AddressSpace, DeclId, NodeId, StrId};

/// A top-level declaration. Like abstractions, declarations carry a name and are owned by the
/// `Root` rather than hash-consed (two globals with the same initializer are still distinct
/// declarations), but their `value`/`init` fields point into the hash-consed node graph.
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Decl {
    GlobalVariable(GlobalVariable),
    Constant(Constant),
}

impl Decl {
    pub fn name(&self) -> StrId {
        match self {
            Decl::GlobalVariable(g) => g.name,
            Decl::Constant(c) => c.name,
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct GlobalVariable {
    pub name: StrId,
    pub ty: NodeId,
    pub address_space: AddressSpace,
    pub init: Option<NodeId>,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub struct Constant {
    pub name: StrId,
    /// The constant's value. Two `Constant`s built from the same literal get the same
    /// `value` id (that's what `NodeId` interning guarantees) even though the two `Constant`
    /// declarations themselves remain distinct entries in `Root::declarations` — this is
    /// exactly scenario S5.
    pub value: NodeId,
}

/// The root of a compilation unit: an ordered list of top-level declarations plus the set of
/// `Function`s reachable from them. `Root` is a plain `Vec`, not an interned node — there is
/// exactly one per arena/program and interning it would buy nothing.
#[derive(Clone, Debug, Default)]
pub struct Root {
    pub declarations: Vec<DeclId>,
    /// Functions in declaration order. Kept separate from `declarations` because functions are
    /// `Abstraction`s (identity-allocated, two-phase body attachment), not hash-consed `Decl`s.
    pub functions: Vec<AbsId>,
}
