//! Dominance frontiers, computed with the standard Cytron-et-al. algorithm: for each abstraction
//! `n` with at least two predecessors, walk each predecessor's dominator-tree ancestry up to
//! (but not including) `n`'s idom, adding `n` to every frontier along the way. Grounded in the
//! same teacher `dominator_tree` module's broader "what is this used for" commentary (SSA
//! construction), even though this IR has no phi-node placement step — `lcssa` instead walks
//! this to decide where a merge point's parameters live.

use crate::cfg::dominators::DominatorTree;
use crate::cfg::scope::Scope;
use crate::ir::ids::AbsId;
use std::collections::{HashMap, HashSet};

pub struct DominanceFrontier {
    frontier: HashMap<AbsId, HashSet<AbsId>>,
}

impl DominanceFrontier {
    pub fn compute(scope: &Scope, domtree: &DominatorTree) -> DominanceFrontier {
        let mut frontier: HashMap<AbsId, HashSet<AbsId>> = HashMap::new();

        for &n in &scope.nodes {
            let preds = scope.predecessors(n);
            if preds.len() < 2 {
                continue;
            }
            for &pred in preds {
                if domtree.idom(pred).is_none() && pred != domtree.entry() {
                    // unreachable predecessor; skip.
                    continue;
                }
                let mut runner = pred;
                while Some(runner) != domtree.idom(n) && runner != n {
                    frontier.entry(runner).or_default().insert(n);
                    match domtree.idom(runner) {
                        Some(next) => runner = next,
                        None => break,
                    }
                }
            }
        }

        DominanceFrontier { frontier }
    }

    pub fn of(&self, abs: AbsId) -> impl Iterator<Item = AbsId> + '_ {
        self.frontier
            .get(&abs)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, ArenaConfig};
    use crate::cfg::dominators::DominatorTree;
    use crate::cfg::rpo::Rpo;
    use crate::ir::builder::IrBuilder;
    use crate::ir::node::Node;

    #[test]
    fn diamond_join_in_branch_frontiers() {
        let mut arena = Arena::new(ArenaConfig::default());
        let mut b = IrBuilder::new(&mut arena);
        let int_ty = b.int_ty();
        let bool_ty = b.bool_ty();
        let f = b.declare_function("f", &[bool_ty], &[int_ty]);

        let join = b.declare_block("join", &[int_ty]);
        let p = b.variable("r", int_ty);
        let join_ret = b.return_(&[p]);
        b.define_body(join, join_ret);

        let l = b.declare_block("l", &[]);
        let one = b.int_literal(1);
        let l_jump = b.jump(join, &[one]);
        b.define_body(l, l_jump);

        let r = b.declare_block("r", &[]);
        let two = b.int_literal(2);
        let r_jump = b.jump(join, &[two]);
        b.define_body(r, r_jump);

        let cond = b.unbound("c");
        let entry = b.declare_block("entry", &[]);
        let branch = b.arena.intern_node(Node::Branch {
            cond,
            true_target: l,
            false_target: r,
            args: b.arena.intern_nodes(std::iter::empty()),
        });
        b.define_body(entry, branch);
        let entry_jump = b.jump(entry, &[]);
        b.define_body(f, entry_jump);

        let scope = Scope::build(&arena, f).unwrap();
        let rpo = Rpo::compute(&scope);
        let domtree = DominatorTree::compute(&scope, &rpo);
        let df = DominanceFrontier::compute(&scope, &domtree);

        assert!(df.of(l).any(|n| n == join));
        assert!(df.of(r).any(|n| n == join));
        assert!(df.of(entry).next().is_none());
    }
}
