//! A thin, ergonomic construction API standing in for the out-of-scope surface parser
//! (§4.B.1). Tests and any embedder with its own front end use this instead of hand-assembling
//! `Node` payloads, much as the teacher's `cranelift-frontend::FunctionBuilder` sits in front of
//! raw `DataFlowGraph` construction.
//!
//! The builder performs no binding or type inference — those remain pipeline passes run over
//! the arena afterwards — it only knows how to intern nodes and run the two-phase abstraction
//! protocol without letting a caller forget the second phase.

use crate::arena::Arena;
use crate::ir::abs::{Abstraction, AnonymousLambda, BasicBlock, Function};
use crate::ir::decl::{Constant, Decl, GlobalVariable, Root};
use crate::ir::ids::{AbsId, AddressSpace, NodeId, NodeListId, PrimOpKind, Uniformity};
use crate::ir::node::Node;

pub struct IrBuilder<'a> {
    pub arena: &'a mut Arena,
}

impl<'a> IrBuilder<'a> {
    pub fn new(arena: &'a mut Arena) -> Self {
        Self { arena }
    }

    // ---- types ----

    pub fn int_ty(&mut self) -> NodeId {
        self.arena.intern_node(Node::Int)
    }

    pub fn bool_ty(&mut self) -> NodeId {
        self.arena.intern_node(Node::Bool)
    }

    pub fn float_ty(&mut self) -> NodeId {
        self.arena.intern_node(Node::Float)
    }

    pub fn ptr_ty(&mut self, address_space: AddressSpace, pointee: NodeId) -> NodeId {
        self.arena.intern_node(Node::Ptr {
            address_space,
            pointee,
        })
    }

    pub fn qualified(&mut self, uniform: Uniformity, inner: NodeId) -> NodeId {
        self.arena.intern_node(Node::Qualified { uniform, inner })
    }

    // ---- values ----

    pub fn int_literal(&mut self, value: i64) -> NodeId {
        self.arena.intern_node(Node::IntLiteral(value))
    }

    pub fn true_(&mut self) -> NodeId {
        self.arena.intern_node(Node::True)
    }

    pub fn false_(&mut self) -> NodeId {
        self.arena.intern_node(Node::False)
    }

    pub fn unbound(&mut self, name: &str) -> NodeId {
        let name = self.arena.intern_string(name);
        self.arena.intern_node(Node::Unbound { name })
    }

    /// A numeric literal whose width hasn't been resolved yet, exactly as a front end would
    /// hand one off before `normalize` folds it into a typed `IntLiteral`.
    pub fn untyped_number(&mut self, text: &str) -> NodeId {
        let text = self.arena.intern_string(text);
        self.arena.intern_node(Node::UntypedNumber { text })
    }

    pub fn variable(&mut self, name: &str, ty: NodeId) -> NodeId {
        let name = self.arena.intern_string(name);
        self.arena.intern_node(Node::Variable { name, ty })
    }

    // ---- instructions ----

    pub fn prim_op(&mut self, op: PrimOpKind, operands: &[NodeId]) -> NodeId {
        let operands = self.arena.intern_nodes(operands.iter().copied());
        self.arena.intern_node(Node::PrimOp { op, operands })
    }

    pub fn call(&mut self, callee: AbsId, args: &[NodeId]) -> NodeId {
        let args = self.arena.intern_nodes(args.iter().copied());
        self.arena.intern_node(Node::Call { callee, args })
    }

    // ---- terminators ----

    pub fn jump(&mut self, target: AbsId, args: &[NodeId]) -> NodeId {
        let args = self.arena.intern_nodes(args.iter().copied());
        self.arena.intern_node(Node::Jump { target, args })
    }

    pub fn branch(
        &mut self,
        cond: NodeId,
        true_target: AbsId,
        false_target: AbsId,
        args: &[NodeId],
    ) -> NodeId {
        let args = self.arena.intern_nodes(args.iter().copied());
        self.arena.intern_node(Node::Branch {
            cond,
            true_target,
            false_target,
            args,
        })
    }

    pub fn return_(&mut self, values: &[NodeId]) -> NodeId {
        let values = self.arena.intern_nodes(values.iter().copied());
        self.arena.intern_node(Node::Return { values })
    }

    pub fn let_(&mut self, instruction: NodeId, tail: AbsId) -> NodeId {
        self.arena.intern_node(Node::Let { instruction, tail })
    }

    pub fn merge_continue(&mut self, args: &[NodeId]) -> NodeId {
        let args = self.arena.intern_nodes(args.iter().copied());
        self.arena.intern_node(Node::MergeContinue { args })
    }

    pub fn merge_break(&mut self, args: &[NodeId]) -> NodeId {
        let args = self.arena.intern_nodes(args.iter().copied());
        self.arena.intern_node(Node::MergeBreak { args })
    }

    pub fn unreachable(&mut self) -> NodeId {
        self.arena.intern_node(Node::Unreachable)
    }

    // ---- abstraction two-phase protocol ----

    pub fn declare_function(
        &mut self,
        name: &str,
        params: &[NodeId],
        result_types: &[NodeId],
    ) -> AbsId {
        let name = self.arena.intern_string(name);
        let params = self.arena.intern_nodes(params.iter().copied());
        let result_types = self.arena.intern_nodes(result_types.iter().copied());
        self.arena.declare_abs(Abstraction::Function(Function {
            name,
            params,
            result_types,
            body: None,
            is_leaf: false,
            is_entry_point: false,
        }))
    }

    pub fn declare_block(&mut self, name: &str, params: &[NodeId]) -> AbsId {
        let name = self.arena.intern_string(name);
        let params = self.arena.intern_nodes(params.iter().copied());
        self.arena.declare_abs(Abstraction::BasicBlock(BasicBlock {
            name,
            params,
            body: None,
        }))
    }

    pub fn declare_lambda(&mut self, params: &[NodeId]) -> AbsId {
        let params = self.arena.intern_nodes(params.iter().copied());
        self.arena
            .declare_abs(Abstraction::AnonymousLambda(AnonymousLambda {
                params,
                body: None,
            }))
    }

    /// Attach `body` (a terminator node, or a `Let` chain ending in one) to a previously
    /// declared abstraction. Must be called exactly once per abstraction id.
    pub fn define_body(&mut self, abs: AbsId, body: NodeId) {
        self.arena.define_abs_body(abs, body);
    }

    // ---- declarations ----

    pub fn declare_constant(&mut self, name: &str, value: NodeId) -> crate::ir::ids::DeclId {
        let name = self.arena.intern_string(name);
        self.arena
            .declare_decl(Decl::Constant(Constant { name, value }))
    }

    pub fn declare_global(
        &mut self,
        name: &str,
        ty: NodeId,
        address_space: AddressSpace,
        init: Option<NodeId>,
    ) -> crate::ir::ids::DeclId {
        let name = self.arena.intern_string(name);
        self.arena.declare_decl(Decl::GlobalVariable(GlobalVariable {
            name,
            ty,
            address_space,
            init,
        }))
    }

    pub fn finish(self, functions: Vec<AbsId>, declarations: Vec<crate::ir::ids::DeclId>) -> Root {
        Root {
            declarations,
            functions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaConfig;

    #[test]
    fn builds_arithmetic_identity_function() {
        let mut arena = Arena::new(ArenaConfig::default());
        let mut b = IrBuilder::new(&mut arena);
        let int_ty = b.int_ty();
        let f = b.declare_function("main", &[], &[int_ty]);
        let one = b.int_literal(1);
        let two = b.int_literal(2);
        let sum = b.prim_op(PrimOpKind::Add, &[one, two]);
        let entry = b.declare_block("entry", &[]);
        let ret = b.return_(&[sum]);
        b.define_body(entry, ret);
        let entry_jump = b.jump(entry, &[]);
        b.define_body(f, entry_jump);

        assert_eq!(arena.abs(f).tag(), "function");
        assert_eq!(arena.abs(entry).body(), Some(ret));
    }
}
