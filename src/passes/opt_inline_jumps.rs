//! `opt_inline_jumps`: collapses trivial jump chains. A `Jump{target, args}` where `target` is a
//! zero-parameter basic block whose entire body is itself an argument-less `Jump{target2}` is
//! rewritten straight to `target2` — the intermediate block contributes nothing once its only
//! purpose is forwarding, so skipping it shortens every later CF analysis without changing
//! behavior.
//!
//! Chains are followed transitively (`a -> b -> c -> d` collapses to `a -> d` in one pass) but
//! capped to guard against a malformed cyclic program looping forever; a genuinely infinite
//! trivial-jump cycle is nonsensical input, not something this pass is responsible for
//! diagnosing, so a chain that hits the cap is left as found at that point.

use crate::arena::Arena;
use crate::ir::abs::Abstraction;
use crate::ir::ids::AbsId;
use crate::ir::node::Node;
use crate::rewrite::{NodeRewrite, Rewriter};

const MAX_CHAIN: usize = 256;

pub struct InlineJumps;

impl NodeRewrite for InlineJumps {
    fn rewrite_node(&mut self, rw: &mut Rewriter, node: &Node) -> Node {
        if let Node::Jump { target, args } = node {
            if rw.src.nodes_slice(*args).is_empty() {
                if let Some(final_target) = follow_chain(rw.src, *target) {
                    return Node::Jump {
                        target: rw.rewrite_abs(final_target, self),
                        args: rw.rewrite_list(*args, self),
                    };
                }
            }
        }
        rw.default_rewrite_node(self, node)
    }
}

/// Follows a chain of zero-parameter, forwarding-only basic blocks starting at `target`.
/// Returns `Some` only if at least one hop was collapsed, so the caller can tell "nothing to do"
/// from "already at the end of a one-block chain".
fn follow_chain(arena: &Arena, start: AbsId) -> Option<AbsId> {
    let mut target = start;
    let mut collapsed_any = false;
    for _ in 0..MAX_CHAIN {
        let Abstraction::BasicBlock(block) = arena.abs(target) else {
            break;
        };
        if !arena.nodes_slice(block.params).is_empty() {
            break;
        }
        let Some(body) = block.body else { break };
        let Node::Jump {
            target: next_target,
            args: next_args,
        } = arena.node(body)
        else {
            break;
        };
        if !arena.nodes_slice(*next_args).is_empty() {
            break;
        }
        target = *next_target;
        collapsed_any = true;
    }
    if collapsed_any {
        Some(target)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaConfig;
    use crate::ir::builder::IrBuilder;
    use crate::rewrite::Rewriter;

    #[test]
    fn chain_of_forwarding_blocks_collapses() {
        let mut src = Arena::new(ArenaConfig::default());
        let (f, real_target) = {
            let mut b = IrBuilder::new(&mut src);
            let int_ty = b.int_ty();
            let real_target = b.declare_block("real", &[]);
            let zero = b.int_literal(0);
            let ret = b.return_(&[zero]);
            b.define_body(real_target, ret);

            let hop2 = b.declare_block("hop2", &[]);
            let j2 = b.jump(real_target, &[]);
            b.define_body(hop2, j2);

            let hop1 = b.declare_block("hop1", &[]);
            let j1 = b.jump(hop2, &[]);
            b.define_body(hop1, j1);

            let f = b.declare_function("f", &[], &[int_ty]);
            let entry_jump = b.jump(hop1, &[]);
            b.define_body(f, entry_jump);
            (f, real_target)
        };

        let mut dst = Arena::new(src.config.clone());
        let mut rw = Rewriter::new(&src, &mut dst);
        let mut pass = InlineJumps;
        let new_f = rw.rewrite_abs(f, &mut pass);

        let _ = real_target;
        let body = dst.abs(new_f).body().expect("function body must be set");
        match dst.node(body) {
            Node::Jump { target, .. } => {
                let target_body = dst.abs(*target).body().expect("target body must be set");
                assert!(
                    matches!(dst.node(target_body), Node::Return { .. }),
                    "jump chain should collapse straight to the block ending in Return"
                );
            }
            other => panic!("expected Jump, got {:?}", other.tag()),
        }
    }
}
