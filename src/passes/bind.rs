//! `bind_program`: resolves `Unbound` references against the module's global-variable
//! declarations and emits a `name_bound` arena.
//!
//! A full implementation of §4.F's "resolves Unbound nodes to their defining Variable by lexical
//! scope" needs the symbol table a surface parser builds while walking binder scopes (function
//! parameters, let-bound locals); that table is exactly the kind of front-end state this core
//! declines to own (§1's parser is out of scope). What the IR contract *does* give us is the
//! module's top-level `GlobalVariable` declarations, each already carrying a name and type — so
//! this pass resolves against those, and rejects anything else as a binding error. See
//! DESIGN.md for the open-question rationale.

use crate::ir::node::Node;
use crate::rewrite::{Identity, NodeRewrite, Rewriter};
use std::collections::HashMap;

pub struct Binder {
    /// Unresolved names mapped to the *source*-arena type id of the global that defines them.
    globals: HashMap<String, crate::ir::ids::NodeId>,
}

impl Binder {
    pub fn new(globals: HashMap<String, crate::ir::ids::NodeId>) -> Self {
        Self { globals }
    }
}

impl NodeRewrite for Binder {
    fn rewrite_node(&mut self, rw: &mut Rewriter, node: &Node) -> Node {
        if let Node::Unbound { name } = node {
            let text = rw.src.string(*name).to_string();
            if let Some(&src_ty) = self.globals.get(&text) {
                let new_name = rw.rewrite_string(*name);
                let mut identity = Identity;
                let dst_ty = rw.rewrite_node_id(src_ty, &mut identity);
                return Node::Variable {
                    name: new_name,
                    ty: dst_ty,
                };
            }
        }
        rw.default_rewrite_node(self, node)
    }
}
