//! The hash-consed node payloads: types, values, instructions, terminators, and the
//! `SwitchCase`/`Constant` leaves that hang off a `Switch`/`Root`.
//!
//! `Function`, `BasicBlock`, and `AnonymousLambda` are deliberately *not* here — see
//! `crate::ir::abs`. Everything in this file is immutable once interned and is deduplicated
//! purely by structural equality of the payload, which is cheap because every sub-reference is
//! already an interned id.

use crate::ir::ids::{AbsId, AddressSpace, NodeId, NodeListId, PrimOpKind, StrId, Uniformity};

/// A hash-consed IR node. Two `Node`s that compare equal are, by the arena's invariant, always
/// interned to the same `NodeId`.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum Node {
    // ---- types ----
    Int,
    Bool,
    Float,
    Mask,
    Ptr {
        address_space: AddressSpace,
        pointee: NodeId,
    },
    Record {
        members: NodeListId,
    },
    FnType {
        params: NodeListId,
        results: NodeListId,
        is_continuation: bool,
    },
    Qualified {
        uniform: Uniformity,
        inner: NodeId,
    },
    Array {
        element: NodeId,
        size: u64,
    },

    // ---- values ----
    IntLiteral(i64),
    True,
    False,
    Variable {
        name: StrId,
        ty: NodeId,
    },
    Unbound {
        name: StrId,
    },
    UntypedNumber {
        text: StrId,
    },

    // ---- instructions ----
    PrimOp {
        op: PrimOpKind,
        operands: NodeListId,
    },
    Call {
        callee: AbsId,
        args: NodeListId,
    },
    If {
        yield_types: NodeListId,
        cond: NodeId,
        true_branch: AbsId,
        false_branch: AbsId,
    },
    Match {
        scrutinee: NodeId,
        arms: NodeListId,
        yield_types: NodeListId,
    },
    /// One arm of a `Match`: structurally the same role `SwitchCase` plays for `Switch`.
    MatchArm {
        pattern: NodeId,
        target: AbsId,
    },
    Loop {
        params: NodeListId,
        initial_args: NodeListId,
        body: AbsId,
        yield_types: NodeListId,
    },
    Control {
        yield_types: NodeListId,
        body: AbsId,
    },
    Block {
        yield_types: NodeListId,
        body: AbsId,
    },

    // ---- terminators ----
    Jump {
        target: AbsId,
        args: NodeListId,
    },
    Branch {
        cond: NodeId,
        true_target: AbsId,
        false_target: AbsId,
        args: NodeListId,
    },
    Switch {
        scrutinee: NodeId,
        cases: NodeListId,
        default: AbsId,
    },
    SwitchCase {
        value: i64,
        target: AbsId,
    },
    Return {
        values: NodeListId,
    },
    Let {
        instruction: NodeId,
        tail: AbsId,
    },
    Join {
        args: NodeListId,
    },
    MergeBreak {
        args: NodeListId,
    },
    MergeContinue {
        args: NodeListId,
    },
    MergeYield {
        args: NodeListId,
    },
    TailCall {
        callee: AbsId,
        args: NodeListId,
    },
    Unreachable,
}

impl Node {
    /// Human-readable tag name, used in error messages and `log` output so a reader never has
    /// to guess which arm of the big enum fired.
    pub fn tag(&self) -> &'static str {
        match self {
            Node::Int => "int",
            Node::Bool => "bool",
            Node::Float => "float",
            Node::Mask => "mask",
            Node::Ptr { .. } => "ptr",
            Node::Record { .. } => "record",
            Node::FnType { .. } => "fn_type",
            Node::Qualified { .. } => "qualified",
            Node::Array { .. } => "array",
            Node::IntLiteral(_) => "int_literal",
            Node::True => "true",
            Node::False => "false",
            Node::Variable { .. } => "variable",
            Node::Unbound { .. } => "unbound",
            Node::UntypedNumber { .. } => "untyped_number",
            Node::PrimOp { .. } => "prim_op",
            Node::Call { .. } => "call",
            Node::If { .. } => "if",
            Node::Match { .. } => "match",
            Node::MatchArm { .. } => "match_arm",
            Node::Loop { .. } => "loop",
            Node::Control { .. } => "control",
            Node::Block { .. } => "block",
            Node::Jump { .. } => "jump",
            Node::Branch { .. } => "branch",
            Node::Switch { .. } => "switch",
            Node::SwitchCase { .. } => "switch_case",
            Node::Return { .. } => "return",
            Node::Let { .. } => "let",
            Node::Join { .. } => "join",
            Node::MergeBreak { .. } => "merge_break",
            Node::MergeContinue { .. } => "merge_continue",
            Node::MergeYield { .. } => "merge_yield",
            Node::TailCall { .. } => "tail_call",
            Node::Unreachable => "unreachable",
        }
    }

    pub fn is_type(&self) -> bool {
        matches!(
            self,
            Node::Int
                | Node::Bool
                | Node::Float
                | Node::Mask
                | Node::Ptr { .. }
                | Node::Record { .. }
                | Node::FnType { .. }
                | Node::Qualified { .. }
                | Node::Array { .. }
        )
    }

    pub fn is_value(&self) -> bool {
        matches!(
            self,
            Node::IntLiteral(_)
                | Node::True
                | Node::False
                | Node::Variable { .. }
                | Node::Unbound { .. }
                | Node::UntypedNumber { .. }
        )
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Node::Jump { .. }
                | Node::Branch { .. }
                | Node::Switch { .. }
                | Node::Return { .. }
                | Node::Let { .. }
                | Node::Join { .. }
                | Node::MergeBreak { .. }
                | Node::MergeContinue { .. }
                | Node::MergeYield { .. }
                | Node::TailCall { .. }
                | Node::Unreachable
        )
    }
}
