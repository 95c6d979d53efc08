//! End-to-end scenarios (S1-S6): build a program with the IR builder, run it through the real
//! pipeline stages where the scenario is expressible without a surface-language front end, and
//! assert on the emitted SPIR-V word stream or on the CFG analyses directly.

use shady_ir::arena::{Arena, ArenaConfig};
use shady_ir::cfg::{DominanceFrontier, DominatorTree, Rpo, Scope};
use shady_ir::emit::spirv::{op, Word};
use shady_ir::emit::writer::MAGIC_NUMBER;
use shady_ir::emit::Emitter;
use shady_ir::ir::builder::IrBuilder;
use shady_ir::ir::ids::{AddressSpace, PrimOpKind};
use shady_ir::ir::node::Node;
use shady_ir::passes::{bind_program, infer_program, normalize};
use shady_ir::{CompilerConfig, Root};

fn checked_bound_arena() -> Arena {
    Arena::new(ArenaConfig {
        check_types: true,
        name_bound: true,
        ..ArenaConfig::default()
    })
}

fn emit_root(arena: &Arena, root: &Root) -> Vec<Word> {
    Emitter::new(arena, CompilerConfig::default().target_spirv_version.as_word())
        .emit_module(root)
        .expect("module should emit")
}

fn decode_opcodes(words: &[Word]) -> Vec<u32> {
    let mut opcodes = Vec::new();
    let mut i = 5;
    while i < words.len() {
        let header = words[i];
        let word_count = (header >> 16) as usize;
        opcodes.push(header & 0xFFFF);
        i += word_count.max(1);
    }
    opcodes
}

/// S1 - arithmetic identity: `fn main() int { return add(1, 2); }` built through the real
/// bind/normalize/infer pipeline (no hand-set types), then emitted.
#[test]
fn s1_arithmetic_identity_runs_the_full_pipeline_to_spirv() {
    let mut arena = Arena::new(ArenaConfig::default());
    let f = {
        let mut b = IrBuilder::new(&mut arena);
        let int_ty = b.int_ty();
        let one = b.untyped_number("1");
        let two = b.untyped_number("2");
        let sum = b.prim_op(PrimOpKind::Add, &[one, two]);
        let sum_var = b.variable("sum", int_ty);
        let k = b.declare_lambda(&[sum_var]);
        let ret = b.return_(&[sum_var]);
        b.define_body(k, ret);

        let let_sum = b.let_(sum, k);
        let entry = b.declare_block("entry", &[]);
        b.define_body(entry, let_sum);

        let f = b.declare_function("main", &[], &[int_ty]);
        let jump = b.jump(entry, &[]);
        b.define_body(f, jump);
        f
    };
    let root = Root {
        declarations: vec![],
        functions: vec![f],
    };

    let (arena, root) = bind_program(arena, &root).expect("no unbound identifiers in this program");
    let (arena, root) = normalize(arena, &root);
    let (arena, root) = infer_program(arena, &root).expect("straight-line arithmetic must type-check");

    let words = emit_root(&arena, &root);
    assert_eq!(words[0], MAGIC_NUMBER);
    let ops = decode_opcodes(&words);
    assert!(ops.contains(&op::I_ADD) || ops.contains(&op::CONSTANT));
    assert!(ops.contains(&op::RETURN_VALUE));
}

/// S2 - pointer load/store: `fn f() { let p = alloca int; store(p, 7); let x = load(p); return x; }`
#[test]
fn s2_pointer_load_store_emits_variable_store_load() {
    let mut arena = checked_bound_arena();
    let (f, alloca, store, load) = {
        let mut b = IrBuilder::new(&mut arena);
        let int_ty = b.int_ty();
        let ff = b.declare_function("f", &[], &[int_ty]);

        let alloca = b.prim_op(PrimOpKind::Alloca, &[int_ty]);
        let ptr_ty = b.ptr_ty(AddressSpace::Function, int_ty);
        let ptr_var = b.variable("p", ptr_ty);
        let k1 = b.declare_lambda(&[ptr_var]);

        let seven = b.int_literal(7);
        let store = b.prim_op(PrimOpKind::Store, &[ptr_var, seven]);
        let k2 = b.declare_lambda(&[]);

        let load = b.prim_op(PrimOpKind::Load, &[ptr_var]);
        let x_var = b.variable("x", int_ty);
        let k3 = b.declare_lambda(&[x_var]);
        let ret = b.return_(&[x_var]);
        b.define_body(k3, ret);

        let let_load = b.let_(load, k3);
        b.define_body(k2, let_load);
        let let_store = b.let_(store, k2);
        b.define_body(k1, let_store);
        let let_alloca = b.let_(alloca, k1);
        let entry = b.declare_block("entry", &[]);
        b.define_body(entry, let_alloca);
        let jump = b.jump(entry, &[]);
        b.define_body(ff, jump);
        (ff, alloca, store, load)
    };
    let int_ty = arena.lookup_node(&Node::Int).unwrap();
    let ptr_ty = arena
        .lookup_node(&Node::Ptr {
            address_space: AddressSpace::Function,
            pointee: int_ty,
        })
        .unwrap();
    let unit_ty = {
        let empty = arena.intern_nodes(std::iter::empty());
        arena.intern_node(Node::Record { members: empty })
    };
    arena.set_type(alloca, ptr_ty);
    arena.set_type(store, unit_ty);
    arena.set_type(load, int_ty);

    let root = Root {
        declarations: vec![],
        functions: vec![f],
    };
    let ops = decode_opcodes(&emit_root(&arena, &root));
    assert!(ops.contains(&op::STORE));
    assert!(ops.contains(&op::LOAD));
    assert!(ops.contains(&op::RETURN_VALUE));
}

/// S3 - structured if: two arms merging into one block with `OpSelectionMerge` before the
/// conditional branch.
#[test]
fn s3_structured_if_emits_selection_merge_before_branch() {
    let mut arena = checked_bound_arena();
    let f = {
        let mut b = IrBuilder::new(&mut arena);
        let int_ty = b.int_ty();
        b.bool_ty(); // force `Bool` to be interned for the `True` constant's type lookup
        let ff = b.declare_function("main", &[], &[int_ty]);
        let cond = b.true_();

        let true_branch = b.declare_lambda(&[]);
        let one = b.int_literal(1);
        let yield_one = {
            let args = b.arena.intern_nodes([one]);
            b.arena.intern_node(Node::MergeYield { args })
        };
        b.define_body(true_branch, yield_one);

        let false_branch = b.declare_lambda(&[]);
        let two = b.int_literal(2);
        let yield_two = {
            let args = b.arena.intern_nodes([two]);
            b.arena.intern_node(Node::MergeYield { args })
        };
        b.define_body(false_branch, yield_two);

        let yield_types = b.arena.intern_nodes([int_ty]);
        let if_node = b.arena.intern_node(Node::If {
            yield_types,
            cond,
            true_branch,
            false_branch,
        });
        let result_var = b.variable("r", int_ty);
        let k = b.declare_lambda(&[result_var]);
        let ret = b.return_(&[result_var]);
        b.define_body(k, ret);

        let let_if = b.let_(if_node, k);
        let entry = b.declare_block("entry", &[]);
        b.define_body(entry, let_if);
        let jump = b.jump(entry, &[]);
        b.define_body(ff, jump);
        ff
    };

    let root = Root {
        declarations: vec![],
        functions: vec![f],
    };
    let ops = decode_opcodes(&emit_root(&arena, &root));
    let merge_pos = ops.iter().position(|&o| o == op::SELECTION_MERGE);
    let branch_pos = ops.iter().position(|&o| o == op::BRANCH_CONDITIONAL);
    assert!(merge_pos.is_some() && branch_pos.is_some());
    assert!(merge_pos.unwrap() < branch_pos.unwrap(), "OpSelectionMerge must immediately precede the conditional branch");
}

/// S4 - loop: a loop whose only body is an immediate `continue` still needs a well-formed
/// `OpLoopMerge` with a back edge and a single, unique merge block.
#[test]
fn s4_loop_emits_loop_merge_with_back_edge() {
    let mut arena = checked_bound_arena();
    let f = {
        let mut b = IrBuilder::new(&mut arena);
        let int_ty = b.int_ty();
        let ff = b.declare_function("h", &[], &[]);

        let loop_body = b.declare_lambda(&[]);
        let cont = b.merge_continue(&[]);
        b.define_body(loop_body, cont);

        let loop_node = b.arena.intern_node(Node::Loop {
            params: b.arena.intern_nodes(std::iter::empty()),
            initial_args: b.arena.intern_nodes(std::iter::empty()),
            body: loop_body,
            yield_types: b.arena.intern_nodes(std::iter::empty()),
        });
        let k = b.declare_lambda(&[]);
        let ret = b.return_(&[]);
        b.define_body(k, ret);
        let let_loop = b.let_(loop_node, k);
        let entry = b.declare_block("entry", &[]);
        b.define_body(entry, let_loop);
        let jump = b.jump(entry, &[]);
        b.define_body(ff, jump);
        let _ = int_ty;
        ff
    };

    let root = Root {
        declarations: vec![],
        functions: vec![f],
    };
    let ops = decode_opcodes(&emit_root(&arena, &root));
    assert_eq!(ops.iter().filter(|&&o| o == op::LOOP_MERGE).count(), 1);
    assert!(ops.contains(&op::BRANCH), "the loop's continue must branch back to the header");
}

/// S5 - duplicate interning: two structurally identical `Constant` declarations share the same
/// `value` node id.
#[test]
fn s5_duplicate_constants_share_the_same_value_id() {
    let mut arena = Arena::new(ArenaConfig::default());
    let mut b = IrBuilder::new(&mut arena);
    let one_a = b.int_literal(1);
    let a = b.declare_constant("a", one_a);
    let one_b = b.int_literal(1);
    let bdecl = b.declare_constant("b", one_b);

    assert_eq!(one_a, one_b);
    let decl_a = arena.decl(a);
    let decl_b = arena.decl(bdecl);
    let (shady_ir::ir::Decl::Constant(ca), shady_ir::ir::Decl::Constant(cb)) = (decl_a, decl_b) else {
        panic!("expected Constant declarations");
    };
    assert_eq!(ca.value, cb.value);
}

/// S6 - dominator frontier on a diamond CFG: `entry -> {l, r} -> join`.
#[test]
fn s6_diamond_cfg_dominance_frontier() {
    let mut arena = Arena::new(ArenaConfig::default());
    let mut b = IrBuilder::new(&mut arena);
    let int_ty = b.int_ty();
    let bool_ty = b.bool_ty();
    let f = b.declare_function("diamond", &[bool_ty], &[int_ty]);

    let join = b.declare_block("join", &[int_ty]);
    let join_param = b.variable("r", int_ty);
    let join_ret = b.return_(&[join_param]);
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
    let frontier = DominanceFrontier::compute(&scope, &domtree);

    assert!(frontier.of(l).any(|n| n == join));
    assert!(frontier.of(r).any(|n| n == join));
    assert!(frontier.of(entry).next().is_none());
}
