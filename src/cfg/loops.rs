//! Loop tree construction: find back edges (an edge `v -> h` where `h` dominates `v`), then grow
//! each back edge into its natural loop by walking predecessors backward from `v` until `h` is
//! reached. Loops sharing a header are merged; nesting is derived from loop-body containment.
//! Grounded in the same family of dominator-based loop analyses the teacher's `dominator_tree`
//! module exists to support, generalized to this IR's `Loop` node (which is itself already an
//! explicit structural marker — the analysis mainly confirms the scope graph agrees with it and
//! additionally picks up any loop expressed only through back-edge `Jump`s, e.g. a hand-built
//! test program that skips the dedicated `Loop` instruction).

use crate::cfg::dominators::DominatorTree;
use crate::cfg::scope::Scope;
use crate::ir::ids::AbsId;
use std::collections::{HashMap, HashSet};

pub struct LoopInfo {
    /// Maps a loop header to the full set of abstractions in its natural loop (including the
    /// header and, transitively, any nested loop's members).
    members: HashMap<AbsId, HashSet<AbsId>>,
    /// Maps each abstraction to the innermost loop header containing it, if any.
    innermost: HashMap<AbsId, AbsId>,
}

impl LoopInfo {
    pub fn compute(scope: &Scope, domtree: &DominatorTree) -> LoopInfo {
        let mut members: HashMap<AbsId, HashSet<AbsId>> = HashMap::new();

        for &n in &scope.nodes {
            for succ in scope.forward_successors(n) {
                if domtree.dominates(succ, n) {
                    // `n -> succ` is a back edge; `succ` is the loop header.
                    let loop_members = members.entry(succ).or_insert_with(HashSet::new);
                    loop_members.insert(succ);
                    grow_natural_loop(scope, n, succ, loop_members);
                }
            }
        }

        let mut innermost: HashMap<AbsId, AbsId> = HashMap::new();
        // Smaller loops (fewer members) are more deeply nested; assign innermost-first so outer
        // loops never overwrite an already-assigned inner one.
        let mut headers: Vec<AbsId> = members.keys().copied().collect();
        headers.sort_by_key(|h| members[h].len());
        for header in headers {
            for &m in &members[&header] {
                innermost.entry(m).or_insert(header);
            }
        }

        LoopInfo { members, innermost }
    }

    pub fn is_header(&self, abs: AbsId) -> bool {
        self.members.contains_key(&abs)
    }

    pub fn members_of(&self, header: AbsId) -> impl Iterator<Item = AbsId> + '_ {
        self.members
            .get(&header)
            .into_iter()
            .flat_map(|s| s.iter().copied())
    }

    pub fn innermost_loop(&self, abs: AbsId) -> Option<AbsId> {
        self.innermost.get(&abs).copied()
    }

    pub fn depth(&self, abs: AbsId) -> u32 {
        let mut depth = 0;
        let mut cur = self.innermost_loop(abs);
        while let Some(header) = cur {
            depth += 1;
            // A header's own enclosing loop, if nested, is found by asking for the loop
            // containing any *other* member reachable outside this loop; conservatively stop
            // once we've counted the header itself to avoid infinite recursion on self-loops.
            cur = self
                .innermost_loop(header)
                .filter(|&outer| outer != header);
        }
        depth
    }
}

fn grow_natural_loop(scope: &Scope, from: AbsId, header: AbsId, members: &mut HashSet<AbsId>) {
    if !members.insert(from) {
        return;
    }
    if from == header {
        return;
    }
    for &pred in scope.predecessors(from) {
        if scope.forward_successors(pred).any(|s| s == from) {
            grow_natural_loop(scope, pred, header, members);
        }
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

    /// entry -> header -> body -> header (back edge) -> ... -> header -> exit.
    #[test]
    fn single_back_edge_forms_one_loop() {
        let mut arena = Arena::new(ArenaConfig::default());
        let mut b = IrBuilder::new(&mut arena);
        let int_ty = b.int_ty();
        let bool_ty = b.bool_ty();
        let f = b.declare_function("f", &[], &[int_ty]);

        let exit = b.declare_block("exit", &[]);
        let zero = b.int_literal(0);
        let exit_ret = b.return_(&[zero]);
        b.define_body(exit, exit_ret);

        let header = b.declare_block("header", &[]);
        let body = b.declare_block("body", &[]);
        let cond = b.unbound("c");
        let _ = bool_ty;
        let header_branch = b.arena.intern_node(Node::Branch {
            cond,
            true_target: body,
            false_target: exit,
            args: b.arena.intern_nodes(std::iter::empty()),
        });
        b.define_body(header, header_branch);

        let back_jump = b.jump(header, &[]);
        b.define_body(body, back_jump);

        let entry_jump = b.jump(header, &[]);
        b.define_body(f, entry_jump);

        let scope = crate::cfg::scope::Scope::build(&arena, f).unwrap();
        let rpo = Rpo::compute(&scope);
        let domtree = DominatorTree::compute(&scope, &rpo);
        let loops = LoopInfo::compute(&scope, &domtree);

        assert!(loops.is_header(header));
        assert!(loops.members_of(header).any(|m| m == body));
        assert_eq!(loops.innermost_loop(body), Some(header));
        assert_eq!(loops.innermost_loop(exit), None);
    }
}
