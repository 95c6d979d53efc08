//! The IR node model (§3–4.B of the design). This module defines the data; `crate::arena`
//! owns construction, interning, and lifetime.

pub mod abs;
pub mod builder;
pub mod decl;
pub mod ids;
pub mod node;

pub use abs::{Abstraction, AnonymousLambda, BasicBlock, Function};
pub use decl::{Constant, Decl, GlobalVariable, Root};
pub use ids::{AbsId, AddressSpace, DeclId, NodeId, NodeListId, PrimOpKind, StrId, Uniformity};
pub use node::Node;
