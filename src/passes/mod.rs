//! The pass pipeline driver (component F): the ordered sequence of arena-to-arena rewrites that
//! takes a freshly built (unbound, untyped) program down to one the emitter will accept.
//!
//! Two passes carry real, spec-mandated semantics end to end: [`bind_program`] and
//! [`infer_program`] (via [`crate::typeck::TypeChecker`]), plus [`normalize`] and
//! [`opt_inline_jumps`]. Everything after `infer_program` is a genuine lowering step in the
//! sense that the emitter depends on its preconditions, but demonstrating each one's individual
//! rewrite rules is out of scope here (see SPEC_FULL.md's pipeline section) — so the later
//! stages are implemented as identity-shaped structural copies over [`Identity`] that still
//! exercise the real thing this pipeline is about: threading an [`ArenaConfig`] through ~30
//! ordered stages, strengthening it exactly where the spec says each stage is allowed to, and
//! logging stage boundaries the way the teacher's own multi-pass compilation pipelines do.

pub mod bind;
pub mod normalize;
pub mod opt_inline_jumps;

use crate::arena::{Arena, ArenaConfig};
use crate::config::{CompilerConfig, LoggingConfig};
use crate::error::CompileResult;
use crate::ir::decl::Decl;
use crate::ir::ids::NodeId;
use crate::ir::Root;
use crate::rewrite::{Identity, NodeRewrite, Rewriter};
use crate::typeck::TypeChecker;
use std::collections::HashMap;
use std::time::Duration;

pub use bind::Binder;
pub use normalize::Normalize;
pub use opt_inline_jumps::InlineJumps;

/// Rewrites every top-level declaration and function in `root` through `pass`, producing the
/// `Root` that indexes the destination arena. Every stage in this module is, at bottom, one call
/// to this function (plus, for the handful of real passes, a config flag flipped afterward).
fn rewrite_root(rw: &mut Rewriter, root: &Root, pass: &mut impl NodeRewrite) -> Root {
    let functions = root.functions.iter().map(|&f| rw.rewrite_abs(f, pass)).collect();
    let declarations = root
        .declarations
        .iter()
        .map(|&d| rw.rewrite_decl(d, pass))
        .collect();
    Root {
        declarations,
        functions,
    }
}

/// One arena-to-arena pipeline stage: runs `pass` over `(src, root)`, and lets the caller adjust
/// the destination arena's config (e.g. set `name_bound`) once the rewrite is complete. Logs
/// entry/exit at debug level with the node/abstraction counts, matching the teacher's
/// `log::debug!("{name}: ...")` instrumentation around individual compilation stages.
fn run_stage(
    name: &'static str,
    src: Arena,
    root: &Root,
    mut pass: impl NodeRewrite,
    adjust_config: impl FnOnce(&mut ArenaConfig),
) -> (Arena, Root) {
    let start = std::time::Instant::now();
    log::debug!(
        "{name}: entering with {} nodes, {} abstractions",
        src.node_count(),
        src.abs_count()
    );
    let mut config = src.config.clone();
    adjust_config(&mut config);
    config.assert_stronger_than(&src.config);
    let mut dst = Arena::new(config);
    let new_root = {
        let mut rw = Rewriter::new(&src, &mut dst, );
        let root = rewrite_root(&mut rw, root, &mut pass);
        debug_assert!(rw.finished_cleanly());
        root
    };
    log_stage_timing(name, start.elapsed(), dst.node_count(), dst.abs_count());
    (dst, new_root)
}

fn log_stage_timing(name: &str, elapsed: Duration, nodes: usize, abstractions: usize) {
    log::debug!(
        "{name}: produced {nodes} nodes, {abstractions} abstractions in {:?}",
        elapsed
    );
}

/// Resolves every `Unbound` reference against the module's top-level `GlobalVariable`
/// declarations (see `bind.rs` for why this core can't do full lexical-scope binding), then
/// scans the destination arena for any `Unbound` node that survived — which can only mean an
/// identifier that isn't a known global — and reports it as a [`crate::error::CompileError`].
pub fn bind_program(src: Arena, root: &Root) -> CompileResult<(Arena, Root)> {
    let mut globals: HashMap<String, NodeId> = HashMap::new();
    for &decl_id in &root.declarations {
        if let Decl::GlobalVariable(g) = src.decl(decl_id) {
            globals.insert(src.string(g.name).to_string(), g.ty);
        }
    }
    let pass = Binder::new(globals);
    let (dst, new_root) = run_stage("bind_program", src, root, pass, |cfg| cfg.name_bound = true);

    for (_, node) in dst.all_nodes() {
        if let crate::ir::node::Node::Unbound { name } = node {
            return Err(crate::error::CompileError::binding(dst.string(*name)));
        }
    }
    Ok((dst, new_root))
}

/// Folds every parseable `UntypedNumber` into an `IntLiteral`. Infallible: a literal that fails
/// to parse is left untouched and surfaces as a type error one stage later, where the message
/// can cite the use site.
pub fn normalize(src: Arena, root: &Root) -> (Arena, Root) {
    run_stage("normalize", src, root, Normalize, |_| {})
}

/// Runs the type checker/inferencer over the whole program, attaching a resolved type and
/// uniformity qualifier to every value and instruction node.
pub fn infer_program(src: Arena, root: &Root) -> CompileResult<(Arena, Root)> {
    log::debug!(
        "infer_program: entering with {} nodes, {} abstractions",
        src.node_count(),
        src.abs_count()
    );
    let mut config = src.config.clone();
    config.check_types = true;
    config.assert_stronger_than(&src.config);
    let mut dst = Arena::new(config);
    let new_root = TypeChecker::new(&src, &mut dst).run_root(root)?;
    log::debug!(
        "infer_program: produced {} nodes, {} abstractions",
        dst.node_count(),
        dst.abs_count()
    );
    Ok((dst, new_root))
}

/// Collapses trivial forwarding jump chains (see `opt_inline_jumps.rs`). Pure optimization: no
/// config flag changes meaning as a result of this pass running.
pub fn opt_inline_jumps(src: Arena, root: &Root) -> (Arena, Root) {
    run_stage("opt_inline_jumps", src, root, InlineJumps, |_| {})
}

/// A pipeline stage whose rewrite rule is the identity — the destination arena is structurally
/// equal to the source, modulo whatever `adjust_config` strengthens. Used for every named stage
/// in §4.F whose individual rewrite semantics are out of scope for this core but whose place and
/// config contract in the pipeline still needs to be honored.
fn identity_stage(
    name: &'static str,
    src: Arena,
    root: &Root,
    adjust_config: impl FnOnce(&mut ArenaConfig),
) -> (Arena, Root) {
    run_stage(name, src, root, Identity, adjust_config)
}

/// Which `log::warn!` filter in [`LoggingConfig`] a stage's boundary notice is subject to.
enum StageKind {
    /// Compiler-internal bookkeeping passes (`lcssa`, `opt_restructurize`, ...) a caller only
    /// cares about when debugging the pipeline itself.
    Internal,
    /// Passes that lower toward a concrete hardware representation and so may introduce
    /// compiler-synthesized names (stack slots, memory-layout offsets) not present in the
    /// original program.
    Generated,
}

/// Emits the `skip_internal`/`skip_generated`-filtered warning for an identity-shaped stage,
/// matching §4.I's "Warnings are informational" policy: both flags default to suppressing these
/// notices, so a caller opts in to the extra noise by setting either to `false`.
fn warn_stage_boundary(name: &str, kind: StageKind, logging: &LoggingConfig) {
    match kind {
        StageKind::Internal if !logging.skip_internal => {
            log::warn!("{name}: running compiler-internal stage");
        }
        StageKind::Generated if !logging.skip_generated => {
            log::warn!("{name}: stage may introduce compiler-generated names");
        }
        _ => {}
    }
}

/// Bundles the handful of remaining named stages from §4.F that are demonstrated here purely as
/// identity-shaped structural copies through the pipeline: each still gets its own arena
/// generation, its own log line, and (where the spec names one) its own config adjustment, but
/// none of them rewrite any node payloads. A pass that one day needs a real implementation slots
/// in exactly where its call to `identity_stage` currently sits.
pub struct Pipeline {
    pub config: ArenaConfig,
    /// Driver-only knobs (§K) that decide whether an optional stage fires at all; kept separate
    /// from `ArenaConfig` since none of them are a dialect-strength fact any analysis reads.
    pub compiler: CompilerConfig,
}

impl Pipeline {
    pub fn new(config: ArenaConfig, compiler: CompilerConfig) -> Self {
        Self { config, compiler }
    }

    /// Runs the full ordered stage list, short-circuiting on the first fallible stage that
    /// errors. Returns the final arena plus its `Root`, ready for `crate::emit`.
    pub fn run(&self, mut arena: Arena, mut root: Root) -> CompileResult<(Arena, Root)> {
        arena.config = self.config.clone();

        let (a, r) = bind_program(arena, &root)?;
        arena = a;
        root = r;

        let (a, r) = normalize(arena, &root);
        arena = a;
        root = r;

        let (a, r) = infer_program(arena, &root)?;
        arena = a;
        root = r;

        // normalize_builtins: resolves GPU-builtin `Unbound`-like references against their
        // canonical types. No builtin surface is modeled by this core's IR yet, so this stage
        // is demonstrated as identity plus the config flag it's responsible for setting.
        let (a, r) = identity_stage("normalize_builtins", arena, &root, |cfg| {
            cfg.validate_builtin_types = true
        });
        arena = a;
        root = r;

        let (a, r) = opt_inline_jumps(arena, &root);
        arena = a;
        root = r;

        for name in [
            "lcssa",
            "reconvergence_heuristics",
            "setup_stack_frames",
            "lower_cf_instrs",
            "mark_leaf_functions",
            "lower_callf",
            "opt_inline",
            "lift_indirect_targets",
            "opt_stack",
            "lower_tailcalls",
            "lower_switch_btree",
            "opt_restructurize",
        ] {
            warn_stage_boundary(name, StageKind::Internal, &self.compiler.logging);
            let (a, r) = identity_stage(name, arena, &root, |_| {});
            arena = a;
            root = r;
        }

        for name in [
            "lower_mask",
            "lower_memcpy",
            "lower_subgroup_ops",
            "lower_stack",
            "lower_lea",
            "lower_generic_ptrs",
            "lower_physical_ptrs",
            "lower_subgroup_vars",
            "lower_memory_layout",
        ] {
            warn_stage_boundary(name, StageKind::Generated, &self.compiler.logging);
            let (a, r) = identity_stage(name, arena, &root, |_| {});
            arena = a;
            root = r;
        }

        if self.compiler.lower.decay_ptrs {
            let (a, r) = identity_stage("lower_decay_ptrs", arena, &root, |_| {});
            arena = a;
            root = r;
        }

        let (a, r) = identity_stage("lower_int", arena, &root, |_| {});
        arena = a;
        root = r;

        if !self.config.is_simt {
            // simt2d already ran upstream of this core's entry point in that configuration;
            // nothing left to flip here besides the flag itself, which the caller set.
        } else if self.compiler.lower.simt_to_explicit_simd {
            let (a, r) = identity_stage("simt2d", arena, &root, |cfg| cfg.is_simt = false);
            arena = a;
            root = r;
        }

        if self.compiler.specialization.entry_point.is_some() {
            let (a, r) = identity_stage("specialize_for_entry_point", arena, &root, |_| {});
            arena = a;
            root = r;
        }

        let (a, r) = identity_stage("lower_fill", arena, &root, |_| {});
        arena = a;
        root = r;

        Ok((a, r))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::builder::IrBuilder;
    use crate::ir::ids::{AddressSpace, PrimOpKind};

    fn build_program() -> (Arena, Root) {
        let mut arena = Arena::new(ArenaConfig {
            allow_fold: true,
            ..ArenaConfig::default()
        });
        let (f, global_decl) = {
            let mut b = IrBuilder::new(&mut arena);
            let int_ty = b.int_ty();
            let global_decl = b.declare_global("counter", int_ty, AddressSpace::GlobalLogical, None);

            let f = b.declare_function("main", &[], &[int_ty]);
            let counter_ref = b.unbound("counter");
            let one = b.untyped_number("1");
            let sum = b.prim_op(PrimOpKind::Add, &[counter_ref, one]);
            let entry = b.declare_block("entry", &[]);
            let ret = b.return_(&[sum]);
            b.define_body(entry, ret);
            let entry_jump = b.jump(entry, &[]);
            b.define_body(f, entry_jump);
            (f, global_decl)
        };
        let root = Root {
            declarations: vec![global_decl],
            functions: vec![f],
        };
        (arena, root)
    }

    #[test]
    fn bind_then_normalize_then_infer_resolves_a_global_reference() {
        let (arena, root) = build_program();
        let (arena, root) = bind_program(arena, &root).expect("binding should resolve `counter`");
        assert!(arena.config.name_bound);

        let (arena, root) = normalize(arena, &root);
        let (arena, _root) = infer_program(arena, &root).expect("program should type-check");
        assert!(arena.config.check_types);
    }

    #[test]
    fn unresolved_identifier_is_a_binding_error() {
        let mut arena = Arena::new(ArenaConfig::default());
        let f = {
            let mut b = IrBuilder::new(&mut arena);
            let not_a_global = b.unbound("mystery");
            let entry = b.declare_block("entry", &[]);
            let ret = b.return_(&[not_a_global]);
            b.define_body(entry, ret);
            let f = b.declare_function("main", &[], &[]);
            let j = b.jump(entry, &[]);
            b.define_body(f, j);
            f
        };
        let root = Root {
            declarations: vec![],
            functions: vec![f],
        };
        let err = bind_program(arena, &root).unwrap_err();
        assert_eq!(
            err,
            crate::error::CompileError::binding("mystery")
        );
    }

    #[test]
    fn full_pipeline_runs_to_completion() {
        let (arena, root) = build_program();
        let pipeline = Pipeline::new(arena.config.clone(), CompilerConfig::default());
        let (final_arena, _root) = pipeline
            .run(arena, root)
            .expect("pipeline should carry a simple program through to the end");
        assert!(final_arena.config.name_bound);
        assert!(final_arena.config.check_types);
        assert!(final_arena.config.validate_builtin_types);
    }
}
