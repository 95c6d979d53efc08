//! Scope (CFG) construction: §4.D's "scope builder". Grounded in the teacher's
//! `flowgraph::ControlFlowGraph`, generalized from basic-block successors/predecessors to
//! labelled edges between `Abstraction`s, since this IR's structural edges (an `If`'s branches,
//! a `Loop`'s body) are every bit as real a control-flow edge as a `Jump`.

use crate::arena::Arena;
use crate::entity::{EntityRef, SecondaryMap};
use crate::error::CompileError;
use crate::ir::ids::AbsId;
use crate::ir::node::Node;
use smallvec::SmallVec;

/// The kind of a scope edge, per the table in §4.D.
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub enum EdgeKind {
    /// A `Jump`/`Branch`/`Switch` target: ordinary forward control flow between named blocks.
    Forward,
    IfBody,
    MatchBody,
    LoopBody,
    ControlBody,
    BlockBody,
    /// The continuation that receives a `Let`'s instruction result.
    LetTail,
}

#[derive(Clone, Copy, Debug)]
pub struct Edge {
    pub kind: EdgeKind,
    pub to: AbsId,
}

/// The per-function scope: every abstraction reachable from `entry` without crossing into
/// another function, with labelled successor/predecessor edges.
pub struct Scope {
    pub entry: AbsId,
    /// Reachable abstractions, in discovery (worklist) order. Not itself meaningful for
    /// analyses; `Rpo` recomputes its own order.
    pub nodes: Vec<AbsId>,
    successors: SecondaryMap<AbsId, SmallVec<[Edge; 4]>>,
    predecessors: SecondaryMap<AbsId, SmallVec<[AbsId; 4]>>,
}

impl Scope {
    pub fn successors(&self, abs: AbsId) -> &[Edge] {
        self.successors.get(abs).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn forward_successors(&self, abs: AbsId) -> impl Iterator<Item = AbsId> + '_ {
        self.successors(abs)
            .iter()
            .filter(|e| e.kind == EdgeKind::Forward)
            .map(|e| e.to)
    }

    pub fn predecessors(&self, abs: AbsId) -> &[AbsId] {
        self.predecessors
            .get(abs)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    fn add_edge(&mut self, from: AbsId, kind: EdgeKind, to: AbsId) {
        self.successors[from].push(Edge { kind, to });
        self.predecessors[to].push(from);
    }

    /// Build the scope for the function whose entry abstraction is `entry`.
    ///
    /// Asserts the anonymous-lambda uniqueness invariant (testable property #5) as it goes:
    /// a structural edge target may never already have a predecessor when the source system
    /// also requires each instruction-bearing construct to own a fresh lambda, so a second
    /// structural edge landing on the same `AbsId` is a construction bug, not a legal diamond.
    pub fn build(arena: &Arena, entry: AbsId) -> Result<Scope, CompileError> {
        let mut scope = Scope {
            entry,
            nodes: Vec::new(),
            successors: SecondaryMap::new(),
            predecessors: SecondaryMap::new(),
        };

        let mut worklist = vec![entry];
        let mut seen = std::collections::HashSet::new();
        seen.insert(entry);

        while let Some(abs_id) = worklist.pop() {
            scope.nodes.push(abs_id);
            let abs = arena.abs(abs_id);
            let body = abs.body().ok_or_else(|| {
                CompileError::structural(format!(
                    "abstraction {:?} has no body during scope construction",
                    abs.tag()
                ))
            })?;

            let mut edges: Vec<(EdgeKind, AbsId)> = Vec::new();
            collect_edges(arena, body, &mut edges)?;

            for (kind, target) in edges {
                if matches!(
                    kind,
                    EdgeKind::IfBody
                        | EdgeKind::MatchBody
                        | EdgeKind::LoopBody
                        | EdgeKind::ControlBody
                        | EdgeKind::BlockBody
                        | EdgeKind::LetTail
                ) && !scope.predecessors(target).is_empty()
                {
                    return Err(CompileError::structural(format!(
                        "anonymous lambda {} has more than one predecessor",
                        target.index()
                    )));
                }
                scope.add_edge(abs_id, kind, target);
                if seen.insert(target) {
                    worklist.push(target);
                }
            }
        }

        Ok(scope)
    }

    /// A sub-scope with edges leaving the loop containing `entry` pruned, per §4.D's
    /// "When a LoopTree is supplied for filtering" clause.
    pub fn restrict_to_loop(&self, loop_members: &std::collections::HashSet<AbsId>) -> Scope {
        let mut restricted = Scope {
            entry: self.entry,
            nodes: self
                .nodes
                .iter()
                .copied()
                .filter(|n| loop_members.contains(n))
                .collect(),
            successors: SecondaryMap::new(),
            predecessors: SecondaryMap::new(),
        };
        for &n in &restricted.nodes {
            for edge in self.successors(n) {
                if loop_members.contains(&edge.to) {
                    restricted.add_edge(n, edge.kind, edge.to);
                }
            }
        }
        restricted
    }
}

/// Walk a single abstraction body (always exactly one terminator node) and append the edges it
/// implies, recursing into `Let`'s instruction for structural edges.
fn collect_edges(
    arena: &Arena,
    body: crate::ir::ids::NodeId,
    out: &mut Vec<(EdgeKind, AbsId)>,
) -> Result<(), CompileError> {
    let node = arena.node(body);
    if !node.is_terminator() {
        return Err(CompileError::structural(format!(
            "abstraction body is not a terminator (found `{}`)",
            node.tag()
        )));
    }
    match node {
        Node::Jump { target, .. } => out.push((EdgeKind::Forward, *target)),
        Node::Branch {
            true_target,
            false_target,
            ..
        } => {
            out.push((EdgeKind::Forward, *true_target));
            out.push((EdgeKind::Forward, *false_target));
        }
        Node::Switch {
            cases, default, ..
        } => {
            for &case_id in arena.nodes_slice(*cases) {
                if let Node::SwitchCase { target, .. } = arena.node(case_id) {
                    out.push((EdgeKind::Forward, *target));
                }
            }
            out.push((EdgeKind::Forward, *default));
        }
        Node::TailCall { callee, .. } => out.push((EdgeKind::Forward, *callee)),
        Node::Return { .. }
        | Node::Unreachable
        | Node::MergeBreak { .. }
        | Node::MergeContinue { .. }
        | Node::MergeYield { .. }
        | Node::Join { .. } => {}
        Node::Let { instruction, tail } => {
            collect_structural_edges(arena, *instruction, out);
            out.push((EdgeKind::LetTail, *tail));
        }
        _ => unreachable!("is_terminator() guarantees one of the above arms"),
    }
    Ok(())
}

fn collect_structural_edges(
    arena: &Arena,
    instruction: crate::ir::ids::NodeId,
    out: &mut Vec<(EdgeKind, AbsId)>,
) {
    match arena.node(instruction) {
        Node::If {
            true_branch,
            false_branch,
            ..
        } => {
            out.push((EdgeKind::IfBody, *true_branch));
            out.push((EdgeKind::IfBody, *false_branch));
        }
        Node::Match { arms, .. } => {
            for &arm_id in arena.nodes_slice(*arms) {
                if let Node::MatchArm { target, .. } = arena.node(arm_id) {
                    out.push((EdgeKind::MatchBody, *target));
                }
            }
        }
        Node::Loop { body, .. } => out.push((EdgeKind::LoopBody, *body)),
        Node::Control { body, .. } => out.push((EdgeKind::ControlBody, *body)),
        Node::Block { body, .. } => out.push((EdgeKind::BlockBody, *body)),
        // PrimOp/Call/other pure instructions have no structural body.
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaConfig;
    use crate::ir::builder::IrBuilder;
    use crate::ir::PrimOpKind;

    fn diamond() -> (Arena, AbsId) {
        let mut arena = Arena::new(ArenaConfig::default());
        let mut b = IrBuilder::new(&mut arena);
        let bool_ty = b.bool_ty();
        let int_ty = b.int_ty();
        let f = b.declare_function("g", &[bool_ty], &[int_ty]);

        let join = b.declare_block("join", &[int_ty]);
        let join_param = b.variable("r", int_ty);
        let join_ret = b.return_(&[join_param]);
        b.define_body(join, join_ret);

        let l = b.declare_lambda(&[]);
        let one = b.int_literal(1);
        let l_jump = b.jump(join, &[one]);
        b.define_body(l, l_jump);

        let r = b.declare_lambda(&[]);
        let two = b.int_literal(2);
        let r_jump = b.jump(join, &[two]);
        b.define_body(r, r_jump);

        let cond = b.unbound("c");
        let entry = b.declare_block("entry", &[]);
        let if_node = {
            let operands = [cond];
            let _ = operands;
            b.arena.intern_node(Node::If {
                yield_types: b.arena.intern_nodes([int_ty]),
                cond,
                true_branch: l,
                false_branch: r,
            })
        };
        let lambda_for_let = b.declare_lambda(&[int_ty]);
        b.define_body(lambda_for_let, {
            let p = b.variable("_", int_ty);
            let _ = p;
            b.unreachable()
        });
        let let_node = b.let_(if_node, lambda_for_let);
        b.define_body(entry, let_node);
        let entry_jump = b.jump(entry, &[]);
        b.define_body(f, entry_jump);
        let _ = PrimOpKind::Add;
        (arena, f)
    }

    #[test]
    fn diamond_scope_has_expected_edges() {
        let (arena, f) = diamond();
        let scope = Scope::build(&arena, f).expect("scope build should succeed");
        // entry -> LetTail -> lambda_for_let is unreachable-only so the diamond's real shape
        // is exercised through the If's structural edges recorded for `entry`'s Let.
        assert!(scope.nodes.len() >= 4);
    }
}
