//! Property tests (testable properties #3 and #4 of the analysis design): dominance and reverse
//! postorder must hold for every reducible CFG shape the generator below can produce, not just
//! the hand-picked diamond/loop examples in `src/cfg/*.rs`'s unit tests.

use proptest::prelude::*;
use shady_ir::arena::{Arena, ArenaConfig};
use shady_ir::cfg::{DominatorTree, Rpo, Scope};
use shady_ir::ir::builder::IrBuilder;
use shady_ir::ir::ids::AbsId;
use shady_ir::ir::node::Node;

/// Builds a function of `n` blocks: block `i` branches forward to one or two of
/// `{i+1, ..., n-1}` chosen by `targets[i]`, and the last block returns. Restricting every edge
/// to go strictly forward guarantees the CFG is reducible (in fact acyclic), which is all `Rpo`
/// and `DominatorTree` promise to handle correctly.
fn build_forward_cfg(targets: &[Vec<usize>]) -> (Arena, AbsId) {
    let n = targets.len();
    let mut arena = Arena::new(ArenaConfig::default());
    let mut b = IrBuilder::new(&mut arena);
    let int_ty = b.int_ty();

    let mut blocks = Vec::with_capacity(n);
    for i in 0..n {
        let name = format!("b{i}");
        blocks.push(b.declare_block(&name, &[]));
    }

    for i in 0..n {
        let body = if i == n - 1 {
            let zero = b.int_literal(0);
            b.return_(&[zero])
        } else {
            let mut outs: Vec<usize> = targets[i].iter().copied().filter(|&t| t > i && t < n).collect();
            outs.dedup();
            if outs.is_empty() {
                outs.push(i + 1);
            }
            if outs.len() == 1 {
                b.jump(blocks[outs[0]], &[])
            } else {
                let cond = b.unbound(&format!("c{i}"));
                b.arena.intern_node(Node::Branch {
                    cond,
                    true_target: blocks[outs[0]],
                    false_target: blocks[outs[1]],
                    args: b.arena.intern_nodes(std::iter::empty()),
                })
            }
        };
        b.define_body(blocks[i], body);
    }

    let f = b.declare_function("f", &[], &[int_ty]);
    let entry_jump = b.jump(blocks[0], &[]);
    b.define_body(f, entry_jump);
    (arena, f)
}

fn forward_cfg_strategy() -> impl Strategy<Value = Vec<Vec<usize>>> {
    (2usize..8).prop_flat_map(|n| {
        prop::collection::vec(prop::collection::vec(0usize..n, 0..=2), n)
    })
}

proptest! {
    /// Property #4: every forward edge `(u, v)` (`v` not a loop header, since this generator
    /// never produces back edges) has `rpo(u) < rpo(v)`.
    #[test]
    fn rpo_orders_every_forward_edge(targets in forward_cfg_strategy()) {
        let (arena, f) = build_forward_cfg(&targets);
        let scope = Scope::build(&arena, f).unwrap();
        let rpo = Rpo::compute(&scope);

        for &abs in &scope.nodes {
            let Some(u) = rpo.number_of(abs) else { continue };
            for succ in scope.forward_successors(abs) {
                if let Some(v) = rpo.number_of(succ) {
                    prop_assert!(u < v, "rpo({:?}) = {} should precede rpo({:?}) = {}", abs, u, succ, v);
                }
            }
        }
    }

    /// Property #3: for every reachable non-entry node `n`, every root-to-`n` path passes
    /// through `idom(n)` (equivalently: removing `idom(n)` disconnects `n` from the entry), and
    /// no strictly closer node on the dominator chain has that property.
    #[test]
    fn every_path_to_a_node_passes_through_its_immediate_dominator(targets in forward_cfg_strategy()) {
        let (arena, f) = build_forward_cfg(&targets);
        let scope = Scope::build(&arena, f).unwrap();
        let rpo = Rpo::compute(&scope);
        let domtree = DominatorTree::compute(&scope, &rpo);

        for &abs in &scope.nodes {
            if abs == f || rpo.number_of(abs).is_none() {
                continue;
            }
            let idom = domtree.idom(abs).expect("reachable non-entry node has an immediate dominator");
            prop_assert!(domtree.dominates(idom, abs));
            prop_assert!(domtree.dominates(f, abs), "entry must dominate every reachable node");

            // No path from entry to `abs` can skip `idom`: every predecessor that is itself
            // reachable must be dominated by `idom`, or be `idom` itself.
            for pred in scope.predecessors(abs) {
                if rpo.number_of(*pred).is_some() {
                    prop_assert!(
                        domtree.dominates(idom, *pred) || *pred == idom,
                        "predecessor {:?} of {:?} is not dominated by idom {:?}",
                        pred, abs, idom
                    );
                }
            }
        }
    }
}
