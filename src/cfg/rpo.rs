//! Reverse postorder numbering over a [`Scope`], grounded in the teacher's RPO pass that feeds
//! its dominator-tree builder — Cooper-Harvey-Kennedy needs RPO numbers before it can iterate to
//! a fixed point at all.

use crate::cfg::scope::Scope;
use crate::entity::{EntityRef, SecondaryMap};
use crate::ir::ids::AbsId;

/// Reverse postorder over the forward-reachable subgraph of a [`Scope`], rooted at its entry.
///
/// Only [`crate::cfg::scope::EdgeKind::Forward`] edges are followed: structural edges describe
/// nesting, not the flow a dominator tree needs to reason about, and including them would make
/// an `If`'s arms dominate things they do not.
pub struct Rpo {
    /// `order[i]` is the abstraction at RPO position `i`; `order[0]` is always the entry.
    pub order: Vec<AbsId>,
    number: SecondaryMap<AbsId, Option<u32>>,
}

impl Rpo {
    pub fn compute(scope: &Scope) -> Rpo {
        let mut postorder = Vec::with_capacity(scope.nodes.len());
        let mut visited = std::collections::HashSet::new();
        visit(scope, scope.entry, &mut visited, &mut postorder);

        postorder.reverse();
        let mut number = SecondaryMap::new();
        for (i, &abs) in postorder.iter().enumerate() {
            number[abs] = Some(i as u32);
        }
        log::trace!("rpo: {} reachable abstractions, order {:?}", postorder.len(), postorder);
        Rpo {
            order: postorder,
            number,
        }
    }

    /// The RPO number of `abs`, or `None` if it is unreachable from the entry via forward edges
    /// alone (e.g. a block only ever reached as a structural body, or genuinely dead code).
    pub fn number_of(&self, abs: AbsId) -> Option<u32> {
        self.number[abs]
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

fn visit(
    scope: &Scope,
    abs: AbsId,
    visited: &mut std::collections::HashSet<AbsId>,
    postorder: &mut Vec<AbsId>,
) {
    if !visited.insert(abs) {
        return;
    }
    for succ in scope.forward_successors(abs) {
        visit(scope, succ, visited, postorder);
    }
    postorder.push(abs);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::{Arena, ArenaConfig};
    use crate::ir::builder::IrBuilder;

    #[test]
    fn linear_chain_numbers_in_order() {
        let mut arena = Arena::new(ArenaConfig::default());
        let mut b = IrBuilder::new(&mut arena);
        let int_ty = b.int_ty();
        let f = b.declare_function("f", &[], &[int_ty]);
        let b2 = b.declare_block("b2", &[]);
        let one = b.int_literal(1);
        let ret = b.return_(&[one]);
        b.define_body(b2, ret);
        let b1 = b.declare_block("b1", &[]);
        let jump_to_b2 = b.jump(b2, &[]);
        b.define_body(b1, jump_to_b2);
        let entry_jump = b.jump(b1, &[]);
        b.define_body(f, entry_jump);

        let scope = crate::cfg::scope::Scope::build(&arena, f).unwrap();
        let rpo = Rpo::compute(&scope);
        assert_eq!(rpo.order[0], f);
        assert!(rpo.number_of(f) < rpo.number_of(b1));
        assert!(rpo.number_of(b1) < rpo.number_of(b2));
    }
}
