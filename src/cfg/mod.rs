//! Control-flow analysis (component D): scope construction, reverse postorder, dominator and
//! post-dominator trees, dominance frontiers, and the loop tree. Each analysis is built fresh
//! from the `Scope` for a given function; none of them are incrementally updated, matching the
//! "analyses are recomputed, not patched" posture §4.D asks for (a pass that changes control flow
//! is responsible for invalidating and recomputing, not for reasoning about a stale tree).

pub mod dominators;
pub mod frontier;
pub mod loops;
pub mod postdom;
pub mod rpo;
pub mod scope;

use crate::arena::Arena;
use crate::error::CompileError;
use crate::ir::ids::AbsId;

pub use dominators::DominatorTree;
pub use frontier::DominanceFrontier;
pub use loops::LoopInfo;
pub use postdom::PostDominatorTree;
pub use rpo::Rpo;
pub use scope::{EdgeKind, Scope};

/// The full bundle of control-flow analyses for one function, computed together since every one
/// of them is cheap relative to `Scope::build` and passes tend to want more than one at once.
pub struct FunctionCfg {
    pub scope: Scope,
    pub rpo: Rpo,
    pub domtree: DominatorTree,
    pub postdomtree: PostDominatorTree,
    pub frontier: DominanceFrontier,
    pub loops: LoopInfo,
}

impl FunctionCfg {
    pub fn build(arena: &Arena, entry: AbsId) -> Result<FunctionCfg, CompileError> {
        let scope = Scope::build(arena, entry)?;
        let rpo = Rpo::compute(&scope);
        let domtree = DominatorTree::compute(&scope, &rpo);
        let postdomtree = PostDominatorTree::compute(&scope);
        let frontier = DominanceFrontier::compute(&scope, &domtree);
        let loops = LoopInfo::compute(&scope, &domtree);
        Ok(FunctionCfg {
            scope,
            rpo,
            domtree,
            postdomtree,
            frontier,
            loops,
        })
    }
}
