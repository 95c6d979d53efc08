//! `normalize`: folds every `UntypedNumber` literal the builder produced into an `IntLiteral`
//! once its text parses as an integer. This is the one step that has to run strictly before
//! `infer_program` — the type checker treats a surviving `UntypedNumber` as an error (it has no
//! rule for inferring a literal's width from context), so this pass is what actually resolves
//! them, not just a cosmetic rewrite.
//!
//! Text that fails to parse as an integer is left as `UntypedNumber` and surfaces as a type
//! error at the next stage, where the message has more context (the use site) than this pass
//! could give it.

use crate::ir::node::Node;
use crate::rewrite::{NodeRewrite, Rewriter};

pub struct Normalize;

impl NodeRewrite for Normalize {
    fn rewrite_node(&mut self, rw: &mut Rewriter, node: &Node) -> Node {
        if let Node::UntypedNumber { text } = node {
            let text = rw.src.string(*text);
            if let Ok(value) = text.parse::<i64>() {
                return Node::IntLiteral(value);
            }
        }
        rw.default_rewrite_node(self, node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, ArenaConfig};
    use crate::ir::builder::IrBuilder;
    use crate::rewrite::Rewriter;

    #[test]
    fn parseable_untyped_number_folds_to_int_literal() {
        let mut src = Arena::new(ArenaConfig::default());
        let f = {
            let mut b = IrBuilder::new(&mut src);
            let untyped = b.untyped_number("42");
            let entry = b.declare_block("entry", &[]);
            let ret = b.return_(&[untyped]);
            b.define_body(entry, ret);
            let f = b.declare_function("main", &[], &[]);
            let j = b.jump(entry, &[]);
            b.define_body(f, j);
            f
        };

        let mut dst = Arena::new(src.config.clone());
        let mut rw = Rewriter::new(&src, &mut dst);
        let mut pass = Normalize;
        let new_f = rw.rewrite_abs(f, &mut pass);

        let body = dst.abs(new_f).body().expect("function body must be set");
        let Node::Jump { target, .. } = dst.node(body) else {
            panic!("expected Jump entry")
        };
        let entry_body = dst
            .abs(*target)
            .body()
            .expect("entry block body must be set");
        let Node::Return { values } = dst.node(entry_body) else {
            panic!("expected Return")
        };
        let returned = dst.nodes_slice(*values)[0];
        assert!(matches!(dst.node(returned), Node::IntLiteral(42)));
    }
}
