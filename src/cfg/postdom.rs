//! Post-dominance, computed per §4.D by flipping the scope's forward edges and running the same
//! Cooper-Harvey-Kennedy solver used for (forward) dominance. A function can have more than one
//! exit (`Return`, `Unreachable`, a dangling `Join`/`MergeBreak`/`MergeContinue`/`MergeYield`), so
//! the flipped graph is rooted at a synthetic virtual exit with an edge from every real exit —
//! mirroring how the teacher's flow-graph utilities handle multi-exit functions when post-order
//! is computed over a reversed CFG.

use crate::cfg::scope::Scope;
use crate::ir::ids::AbsId;
use std::collections::HashMap;

/// A node in the flipped (post-dominance) graph: either a real abstraction, or the synthetic
/// exit that every real exit abstraction flows into.
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
enum PNode {
    Virtual,
    Real(AbsId),
}

pub struct PostDominatorTree {
    ipdom: HashMap<AbsId, PNode>,
    exits: Vec<AbsId>,
}

impl PostDominatorTree {
    pub fn compute(scope: &Scope) -> PostDominatorTree {
        let exits: Vec<AbsId> = scope
            .nodes
            .iter()
            .copied()
            .filter(|&a| scope.forward_successors(a).next().is_none())
            .collect();

        let order = reverse_postorder(scope, &exits);
        let rpo_number: HashMap<PNode, u32> = order
            .iter()
            .enumerate()
            .map(|(i, &n)| (n, i as u32))
            .collect();

        let mut ipdom: HashMap<PNode, PNode> = HashMap::new();

        let flipped_preds = |n: PNode, exits: &[AbsId]| -> Vec<PNode> {
            match n {
                PNode::Virtual => exits.iter().copied().map(PNode::Real).collect(),
                PNode::Real(abs) => scope.forward_successors(abs).map(PNode::Real).collect(),
            }
        };

        for &n in order.iter().skip(1) {
            ipdom.insert(
                n,
                compute_ipdom(n, &flipped_preds(n, &exits), &rpo_number, &ipdom),
            );
        }

        let mut changed = true;
        while changed {
            changed = false;
            for &n in order.iter().skip(1) {
                let new = compute_ipdom(n, &flipped_preds(n, &exits), &rpo_number, &ipdom);
                if ipdom.get(&n) != Some(&new) {
                    ipdom.insert(n, new);
                    changed = true;
                }
            }
        }

        let real_ipdom = ipdom
            .into_iter()
            .filter_map(|(k, v)| match k {
                PNode::Real(abs) => Some((abs, v)),
                PNode::Virtual => None,
            })
            .collect();

        PostDominatorTree {
            ipdom: real_ipdom,
            exits,
        }
    }

    /// The immediate post-dominator of `abs`, or `None` if its only post-dominator is the
    /// synthetic virtual exit (i.e. `abs` is itself an exit).
    pub fn ipdom(&self, abs: AbsId) -> Option<AbsId> {
        match self.ipdom.get(&abs) {
            Some(PNode::Real(next)) => Some(*next),
            _ => None,
        }
    }

    pub fn is_exit(&self, abs: AbsId) -> bool {
        self.exits.contains(&abs)
    }
}

fn compute_ipdom(
    n: PNode,
    preds: &[PNode],
    rpo_number: &HashMap<PNode, u32>,
    ipdom: &HashMap<PNode, PNode>,
) -> PNode {
    let mut reachable = preds
        .iter()
        .copied()
        .filter(|p| rpo_number.contains_key(p) && (ipdom.contains_key(p) || *p == PNode::Virtual));

    let mut result = match reachable.next() {
        Some(first) => first,
        None => return n,
    };
    for pred in reachable {
        result = intersect(result, pred, rpo_number, ipdom);
    }
    result
}

fn intersect(
    a: PNode,
    b: PNode,
    rpo_number: &HashMap<PNode, u32>,
    ipdom: &HashMap<PNode, PNode>,
) -> PNode {
    let mut finger1 = a;
    let mut finger2 = b;
    while finger1 != finger2 {
        while rpo_number[&finger1] > rpo_number[&finger2] {
            finger1 = ipdom[&finger1];
        }
        while rpo_number[&finger2] > rpo_number[&finger1] {
            finger2 = ipdom[&finger2];
        }
    }
    finger1
}

fn reverse_postorder(scope: &Scope, exits: &[AbsId]) -> Vec<PNode> {
    let mut visited = std::collections::HashSet::new();
    let mut postorder = Vec::new();
    visit(scope, PNode::Virtual, exits, &mut visited, &mut postorder);
    postorder.reverse();
    postorder
}

fn visit(
    scope: &Scope,
    n: PNode,
    exits: &[AbsId],
    visited: &mut std::collections::HashSet<PNode>,
    out: &mut Vec<PNode>,
) {
    if !visited.insert(n) {
        return;
    }
    match n {
        PNode::Virtual => {
            for &exit in exits {
                visit(scope, PNode::Real(exit), exits, visited, out);
            }
        }
        PNode::Real(abs) => {
            for &pred in scope.predecessors(abs) {
                if scope.forward_successors(pred).any(|s| s == abs) {
                    visit(scope, PNode::Real(pred), exits, visited, out);
                }
            }
        }
    }
    out.push(n);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, ArenaConfig};
    use crate::ir::builder::IrBuilder;
    use crate::ir::node::Node;

    /// entry -> {l, r} -> join -> return. `entry`'s immediate post-dominator is `join`: every
    /// path out of `entry` passes through it.
    #[test]
    fn diamond_entry_postdominated_by_join() {
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
        let postdom = PostDominatorTree::compute(&scope);

        assert_eq!(postdom.ipdom(entry), Some(join));
        assert_eq!(postdom.ipdom(l), Some(join));
        assert_eq!(postdom.ipdom(r), Some(join));
        assert!(postdom.is_exit(join));
        assert_eq!(postdom.ipdom(join), None);
    }
}
