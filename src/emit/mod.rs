//! The SPIR-V emitter (component G): walks a fully lowered program (checked, bound, no Generic
//! pointers left) and writes a SPIR-V word stream.
//!
//! Preconditions (checked defensively, not re-derived): `arena.config.check_types` and
//! `name_bound` are set, and no `Generic` address space or `TailCall`/`Switch` terminator
//! survives — those are `lower_generic_ptrs`/`lower_tailcalls`/`lower_switch_btree`'s job
//! upstream; reaching the emitter with one still standing is a
//! [`CompileError::lowering_precondition`].
//!
//! Structured `If`/`Match` merge into a single successor block with one `OpPhi` per yielded
//! value; `Control` has exactly one predecessor into its merge (its body's `Join` is the only
//! way in) so no phi is needed there, just forwarding the join's argument values directly.
//! `Loop` splits into a header block (carrying the per-iteration `OpPhi`s and the mandatory
//! `OpLoopMerge`) and a synthetic "body proper" block holding the loop's actual instructions,
//! which is what lets the header's phi operand list include both the preheader value and every
//! back edge discovered while emitting the body — a back edge can only be discovered by
//! emitting the body, so the header's words are finalized last even though they are written
//! first in the final stream. Blocks are buffered per id and concatenated in the order their
//! emission was *entered* (a block is recorded the moment control starts flowing into it, before
//! recursing into whatever it branches to), which is a valid preorder DFS of the CFG and so
//! always places a dominator before everything it dominates — including synthetic blocks
//! (a loop's body-proper split, a `Match`'s test-chain blocks) that have no `AbsId` of their own
//! and therefore cannot be ordered by walking the dominator tree over abstractions alone.
//!
//! A merge block is always re-entered through `emit_block` to emit whatever follows it, so its
//! phi prologue (built before that re-entry, once every arm's contribution is known) is stashed
//! in `block_prologue` rather than written straight to `block_words` — the same problem and the
//! same fix as hoisting `alloca`s into the entry block's prologue, just keyed per merge block
//! instead of hardcoded to one.

pub mod spirv;
pub mod writer;

use crate::arena::Arena;
use crate::cfg::Scope;
use crate::error::{CompileError, CompileResult};
use crate::ir::decl::Decl;
use crate::ir::ids::{AbsId, AddressSpace, NodeId, PrimOpKind};
use crate::ir::node::Node;
use crate::ir::{Abstraction, Root};
use spirv::{encode, encode_string, op, Word};
use std::collections::HashMap;
use writer::{ModuleWriter, Section};

/// One pending `OpPhi` site: a merge or loop-header block waiting on `(predecessor, values)`
/// pairs contributed by every block that branches into it.
type PendingPhi = HashMap<u32, Vec<(u32, Vec<u32>)>>;

/// What a dangling (non-local) terminator — `MergeYield`, `Join`, `MergeBreak`, `MergeContinue`
/// — resolves to. Pushed when entering an `If`/`Match`/`Control`/`Loop` body, popped on exit;
/// a `Node::Join` always resolves against the nearest `Control` frame, etc.
enum MergeFrame {
    Yield { merge_block: u32 },
    Control { merge_block: u32 },
    Loop { header_block: u32, exit_block: u32 },
}

pub struct Emitter<'a> {
    arena: &'a Arena,
    writer: ModuleWriter,
    type_ids: HashMap<NodeId, u32>,
    const_ids: HashMap<NodeId, u32>,
    global_ids: HashMap<NodeId, u32>,
    function_ids: HashMap<AbsId, u32>,
    void_ty: Option<u32>,
}

impl<'a> Emitter<'a> {
    pub fn new(arena: &'a Arena, version_word: u32) -> Self {
        Self {
            arena,
            writer: ModuleWriter::new(version_word),
            type_ids: HashMap::new(),
            const_ids: HashMap::new(),
            global_ids: HashMap::new(),
            function_ids: HashMap::new(),
            void_ty: None,
        }
    }

    /// Emits the whole module: header declarations, global variables, then every function body,
    /// and returns the finished word stream.
    pub fn emit_module(mut self, root: &Root) -> CompileResult<Vec<Word>> {
        if !self.arena.config.check_types || !self.arena.config.name_bound {
            return Err(CompileError::lowering_precondition(
                "a checked, name-bound arena",
            ));
        }

        self.emit_header();

        // Reserve every function's id up front so a `Call` to a not-yet-visited (or mutually
        // recursive) function resolves immediately.
        for &f in &root.functions {
            let id = self.writer.fresh_id();
            self.function_ids.insert(f, id);
        }

        for &decl_id in &root.declarations {
            self.emit_global(decl_id)?;
        }

        for &f in &root.functions {
            self.emit_function(f)?;
        }

        Ok(self.writer.finish())
    }

    fn emit_header(&mut self) {
        self.writer.push(
            Section::Capabilities,
            &encode(op::CAPABILITY, &[spirv::capability::SHADER]),
        );
        self.writer.push(
            Section::Capabilities,
            &encode(op::CAPABILITY, &[spirv::capability::LINKAGE]),
        );
        self.writer.push(
            Section::Capabilities,
            &encode(
                op::CAPABILITY,
                &[spirv::capability::PHYSICAL_STORAGE_BUFFER_ADDRESSES],
            ),
        );
        self.writer.push(
            Section::MemoryModel,
            &encode(
                op::MEMORY_MODEL,
                &[
                    spirv::ADDRESSING_MODEL_PHYSICAL_STORAGE_BUFFER64,
                    spirv::MEMORY_MODEL_GLSL450,
                ],
            ),
        );
    }

    // ---- types & constants ----

    fn void_type(&mut self) -> u32 {
        if let Some(id) = self.void_ty {
            return id;
        }
        let id = self.writer.fresh_id();
        self.writer
            .push(Section::TypesAndConstants, &encode(op::TYPE_VOID, &[id]));
        self.void_ty = Some(id);
        id
    }

    fn type_id(&mut self, ty: NodeId) -> CompileResult<u32> {
        if let Some(&id) = self.type_ids.get(&ty) {
            return Ok(id);
        }
        let node = self.arena.node(ty).clone();
        let id = match &node {
            Node::Int => {
                let id = self.writer.fresh_id();
                self.writer.push(
                    Section::TypesAndConstants,
                    &encode(op::TYPE_INT, &[id, self.arena.config.word_bits, 1]),
                );
                id
            }
            Node::Bool => {
                let id = self.writer.fresh_id();
                self.writer
                    .push(Section::TypesAndConstants, &encode(op::TYPE_BOOL, &[id]));
                id
            }
            Node::Float => {
                let id = self.writer.fresh_id();
                self.writer.push(
                    Section::TypesAndConstants,
                    &encode(op::TYPE_FLOAT, &[id, self.arena.config.word_bits]),
                );
                id
            }
            Node::Mask => {
                // No direct SPIR-V scalar for a subgroup mask; represented as an unsigned
                // integer of the configured mask width, matching `subgroup_mask_bits`.
                let id = self.writer.fresh_id();
                self.writer.push(
                    Section::TypesAndConstants,
                    &encode(
                        op::TYPE_INT,
                        &[id, self.arena.config.subgroup_mask_bits, 0],
                    ),
                );
                id
            }
            Node::Ptr {
                address_space,
                pointee,
            } => {
                let sc = storage_class_of(*address_space)?;
                let pointee_id = self.type_id(*pointee)?;
                let id = self.writer.fresh_id();
                self.writer.push(
                    Section::TypesAndConstants,
                    &encode(op::TYPE_POINTER, &[id, sc, pointee_id]),
                );
                id
            }
            Node::Record { members } => {
                let member_ids: Vec<u32> = self
                    .arena
                    .nodes_slice(*members)
                    .to_vec()
                    .iter()
                    .map(|&m| self.type_id(m))
                    .collect::<CompileResult<_>>()?;
                let id = self.writer.fresh_id();
                let mut operands = vec![id];
                operands.extend(member_ids);
                self.writer
                    .push(Section::TypesAndConstants, &encode(op::TYPE_STRUCT, &operands));
                id
            }
            Node::FnType {
                params, results, ..
            } => {
                let param_ids: Vec<u32> = self
                    .arena
                    .nodes_slice(*params)
                    .to_vec()
                    .iter()
                    .map(|&p| self.type_id(p))
                    .collect::<CompileResult<_>>()?;
                let results = self.arena.nodes_slice(*results).to_vec();
                let return_ty = match results.len() {
                    0 => self.void_type(),
                    1 => self.type_id(results[0])?,
                    _ => return Err(CompileError::unimplemented("multi-value FnType results")),
                };
                let id = self.writer.fresh_id();
                let mut operands = vec![id, return_ty];
                operands.extend(param_ids);
                self.writer.push(
                    Section::TypesAndConstants,
                    &encode(op::TYPE_FUNCTION, &operands),
                );
                id
            }
            Node::Qualified { inner, .. } => self.type_id(*inner)?,
            Node::Array { .. } => {
                return Err(CompileError::unimplemented("Array type emission"));
            }
            other => {
                return Err(CompileError::structural(format!(
                    "node `{}` is not a type",
                    other.tag()
                )))
            }
        };
        self.type_ids.insert(ty, id);
        Ok(id)
    }

    fn constant_id(&mut self, value: NodeId) -> CompileResult<u32> {
        if let Some(&id) = self.const_ids.get(&value) {
            return Ok(id);
        }
        let node = self.arena.node(value).clone();
        let id = match node {
            Node::IntLiteral(v) => {
                let int_ty = self.arena.intern_nodes_lookup_int()?;
                let ty_id = self.type_id(int_ty)?;
                let id = self.writer.fresh_id();
                // SPIR-V literal operands for a 32-bit-or-narrower integer constant are a
                // single word holding the sign-extended bit pattern.
                self.writer.push(
                    Section::TypesAndConstants,
                    &encode(op::CONSTANT, &[ty_id, id, v as u32]),
                );
                id
            }
            Node::True => {
                let bool_ty = self.arena.lookup_node(&Node::Bool).ok_or_else(|| {
                    CompileError::structural("Bool type was never interned in this arena")
                })?;
                let ty_id = self.type_id(bool_ty)?;
                let id = self.writer.fresh_id();
                self.writer
                    .push(Section::TypesAndConstants, &encode(op::CONSTANT_TRUE, &[ty_id, id]));
                id
            }
            Node::False => {
                let bool_ty = self.arena.lookup_node(&Node::Bool).ok_or_else(|| {
                    CompileError::structural("Bool type was never interned in this arena")
                })?;
                let ty_id = self.type_id(bool_ty)?;
                let id = self.writer.fresh_id();
                self.writer.push(
                    Section::TypesAndConstants,
                    &encode(op::CONSTANT_FALSE, &[ty_id, id]),
                );
                id
            }
            other => {
                return Err(CompileError::structural(format!(
                    "node `{}` is not a constant",
                    other.tag()
                )))
            }
        };
        self.const_ids.insert(value, id);
        Ok(id)
    }

    // ---- globals ----

    fn emit_global(&mut self, decl_id: crate::ir::ids::DeclId) -> CompileResult<()> {
        let decl = self.arena.decl(decl_id).clone();
        if let Decl::GlobalVariable(g) = decl {
            let sc = storage_class_of(g.address_space)?;
            let pointee_ty = self.type_id(g.ty)?;
            let ptr_ty_node = Node::Ptr {
                address_space: g.address_space,
                pointee: g.ty,
            };
            let ptr_ty_id = match self.arena.lookup_node(&ptr_ty_node) {
                Some(existing) => self.type_id(existing)?,
                None => {
                    // The pointer-to-global type was never separately interned (only the
                    // pointee type was); synthesize the OpTypePointer directly.
                    let id = self.writer.fresh_id();
                    self.writer.push(
                        Section::TypesAndConstants,
                        &encode(op::TYPE_POINTER, &[id, sc, pointee_ty]),
                    );
                    id
                }
            };
            let var_id = self.writer.fresh_id();
            self.writer.push(
                Section::GlobalVariables,
                &encode(op::VARIABLE, &[ptr_ty_id, var_id, sc]),
            );
            self.writer.push(
                Section::DebugNames,
                &[
                    encode(op::NAME, &{
                        let mut words = vec![var_id];
                        words.extend(encode_string(self.arena.string(g.name)));
                        words
                    })
                    .as_slice(),
                ]
                .concat(),
            );
            // Bind every occurrence of this global's (already bound-to-Variable) reference node
            // directly to the `OpVariable` id, so a `Load`/`Store`/`Lea` operand resolves to it
            // without re-deriving the global from its name at instruction-emission time.
            let var_node = Node::Variable {
                name: g.name,
                ty: g.ty,
            };
            if let Some(var_node_id) = self.arena.lookup_node(&var_node) {
                self.global_ids.insert(var_node_id, var_id);
            }
        }
        Ok(())
    }

    // ---- functions ----

    fn emit_function(&mut self, f: AbsId) -> CompileResult<()> {
        let Abstraction::Function(func) = self.arena.abs(f).clone() else {
            return Err(CompileError::structural("Root::functions entry is not a Function"));
        };
        let func_id = self.function_ids[&f];

        // A function's formal parameters are `Variable` nodes (the same convention a block's or
        // lambda's `params()` uses): the body refers to the identical interned node, so binding
        // just means recording that node's id against the freshly emitted `OpFunctionParameter`
        // result, not re-deriving a name lookup.
        let param_vars: Vec<NodeId> = self.arena.nodes_slice(func.params).to_vec();
        let mut param_tys = Vec::with_capacity(param_vars.len());
        for &p in &param_vars {
            let ty = self
                .arena
                .type_of(p)
                .ok_or_else(|| CompileError::structural("function parameter has no resolved type"))?;
            param_tys.push(self.type_id(ty)?);
        }
        let result_types: Vec<NodeId> = self.arena.nodes_slice(func.result_types).to_vec();
        let return_ty = match result_types.len() {
            0 => self.void_type(),
            1 => self.type_id(result_types[0])?,
            _ => return Err(CompileError::unimplemented("multi-result functions")),
        };
        let fn_type_id = {
            let id = self.writer.fresh_id();
            let mut operands = vec![id, return_ty];
            operands.extend(param_tys.clone());
            self.writer
                .push(Section::TypesAndConstants, &encode(op::TYPE_FUNCTION, &operands));
            id
        };

        let mut body = FunctionBody::new(self.arena, f)?;

        self.writer.push(
            Section::Functions,
            &encode(op::FUNCTION, &[return_ty, func_id, 0, fn_type_id]),
        );
        for (&param_var, &param_ty) in param_vars.iter().zip(&param_tys) {
            let param_id = self.writer.fresh_id();
            self.writer.push(
                Section::Functions,
                &encode(op::FUNCTION_PARAMETER, &[param_ty, param_id]),
            );
            body.value_ids.insert(param_var, param_id);
        }

        body.emit(self)?;
        for block_id in body.block_order.clone() {
            if let Some(words) = body.block_words.remove(&block_id) {
                self.writer.push(Section::Functions, &words);
            }
        }

        self.writer.push(Section::Functions, &encode(op::FUNCTION_END, &[]));
        Ok(())
    }
}

fn storage_class_of(space: AddressSpace) -> CompileResult<u32> {
    use spirv::storage_class::*;
    match space {
        AddressSpace::GlobalLogical => Ok(STORAGE_BUFFER),
        AddressSpace::SharedLogical => Ok(CROSS_WORKGROUP),
        AddressSpace::PrivateLogical => Ok(PRIVATE),
        AddressSpace::Function => Ok(FUNCTION),
        AddressSpace::GlobalPhysical => Ok(PHYSICAL_STORAGE_BUFFER),
        AddressSpace::Input => Ok(INPUT),
        AddressSpace::Output => Ok(OUTPUT),
        // TODO: depending on platform, use push constants/ubos/ssbos here.
        AddressSpace::External => Ok(STORAGE_BUFFER),
        AddressSpace::Generic
        | AddressSpace::SharedPhysical
        | AddressSpace::SubgroupPhysical
        | AddressSpace::PrivatePhysical => {
            Err(CompileError::lowering_precondition(format!("address space {space:?}")))
        }
    }
}

/// Per-function emission state: reserved block ids, buffered block word lists (keyed by the
/// `u32` SPIR-V id rather than `AbsId`, so synthetic "loop body proper" blocks fit the same map),
/// bound SSA values, and the merge-frame stack dangling terminators resolve against.
struct FunctionBody {
    entry: AbsId,
    block_ids: HashMap<AbsId, u32>,
    block_words: HashMap<u32, Vec<Word>>,
    /// SPIR-V ids in the order control first entered them; see the module doc comment.
    block_order: Vec<u32>,
    pending_phi: PendingPhi,
    value_ids: HashMap<NodeId, u32>,
    merge_stack: Vec<MergeFrame>,
    pending_allocas: Vec<Word>,
    entry_block_id: u32,
    /// A merge block's label + phi words, stashed by `finish_merge` for `emit_block` to pick up
    /// as its starting buffer instead of a bare label — `emit_block` always re-enters the merge
    /// block to emit `tail`, and would otherwise overwrite the phis with a fresh label-only one.
    block_prologue: HashMap<u32, Vec<Word>>,
    /// Named `BasicBlock`s already entered via a `Jump`/`Branch`/`Switch` target, so a block
    /// with more than one incoming edge (or one reached and then re-reserved) has its body
    /// emitted exactly once.
    entered: std::collections::HashSet<AbsId>,
}

impl FunctionBody {
    fn new(arena: &Arena, entry: AbsId) -> CompileResult<Self> {
        // Validates the function's CFG shape (reachability, well-formed edges) before emission
        // walks it; the analysis result itself isn't needed here.
        Scope::build(arena, entry)?;
        Ok(Self {
            entry,
            block_ids: HashMap::new(),
            block_words: HashMap::new(),
            block_order: Vec::new(),
            pending_phi: HashMap::new(),
            value_ids: HashMap::new(),
            merge_stack: Vec::new(),
            pending_allocas: Vec::new(),
            entry_block_id: 0,
            block_prologue: HashMap::new(),
            entered: std::collections::HashSet::new(),
        })
    }

    /// Emits `target`'s body the first time it is reached via a `Jump`/`Branch`/`Switch` edge;
    /// a later edge into the same block only needed `target_id` for its own branch operand.
    fn enter_target(&mut self, emitter: &mut Emitter, target: AbsId, target_id: u32) -> CompileResult<()> {
        if !self.entered.insert(target) {
            return Ok(());
        }
        let body = emitter
            .arena
            .abs(target)
            .body()
            .ok_or_else(|| CompileError::structural("jump/branch target has no body"))?;
        self.emit_block(emitter, target_id, body)
    }

    fn reserve_block(&mut self, emitter: &mut Emitter, abs: AbsId) -> u32 {
        if let Some(&id) = self.block_ids.get(&abs) {
            return id;
        }
        let id = emitter.writer.fresh_id();
        self.block_ids.insert(abs, id);
        id
    }

    fn emit(&mut self, emitter: &mut Emitter) -> CompileResult<()> {
        self.entered.insert(self.entry);
        let entry_block_id = self.reserve_block(emitter, self.entry);
        self.entry_block_id = entry_block_id;
        let entry_body = emitter
            .arena
            .abs(self.entry)
            .body()
            .ok_or_else(|| CompileError::structural("function has no body at emission"))?;
        self.emit_block(emitter, entry_block_id, entry_body)?;

        if let Some(entry_words) = self.block_words.get_mut(&self.entry_block_id) {
            // Splice collected `alloca`s right after the entry block's `OpLabel` (a 2-word
            // instruction: header + the block's own id), per §4.G's "Alloca emits OpVariable at
            // the function's entry block".
            let mut spliced = entry_words[..2].to_vec();
            spliced.extend(self.pending_allocas.drain(..));
            spliced.extend_from_slice(&entry_words[2..]);
            *entry_words = spliced;
        }
        Ok(())
    }

    /// Emits one CFG node's block: a label, a straight-line chain of `Let`-wrapped instructions
    /// (folded into this same block, since a pure `Let` is sequencing, not control flow), and
    /// finally either a genuine terminator or a structural instruction that hands off to
    /// `emit_structural`.
    fn emit_block(&mut self, emitter: &mut Emitter, block_id: u32, mut node: NodeId) -> CompileResult<()> {
        self.block_order.push(block_id);
        let mut words = self
            .block_prologue
            .remove(&block_id)
            .unwrap_or_else(|| encode(op::LABEL, &[block_id]));
        loop {
            match emitter.arena.node(node).clone() {
                Node::Let { instruction, tail } => {
                    if is_structural(emitter.arena.node(instruction)) {
                        return self.emit_structural(emitter, block_id, words, instruction, tail);
                    }
                    let result = self.emit_instruction(emitter, &mut words, instruction)?;
                    if let Some(result) = result {
                        self.bind_param(emitter, tail, 0, result)?;
                    }
                    let tail_body = emitter
                        .arena
                        .abs(tail)
                        .body()
                        .ok_or_else(|| CompileError::structural("Let tail has no body"))?;
                    node = tail_body;
                }
                Node::Jump { target, args } => {
                    self.bind_forward_args(emitter, target, args)?;
                    let target_id = self.reserve_block(emitter, target);
                    words.extend(encode(op::BRANCH, &[target_id]));
                    self.finish_block(block_id, words);
                    return self.enter_target(emitter, target, target_id);
                }
                Node::Branch {
                    cond,
                    true_target,
                    false_target,
                    args,
                } => {
                    let cond_id = self.resolve_value(emitter, cond)?;
                    self.bind_forward_args(emitter, true_target, args)?;
                    self.bind_forward_args(emitter, false_target, args)?;
                    let true_id = self.reserve_block(emitter, true_target);
                    let false_id = self.reserve_block(emitter, false_target);
                    words.extend(encode(op::BRANCH_CONDITIONAL, &[cond_id, true_id, false_id]));
                    self.finish_block(block_id, words);
                    self.enter_target(emitter, true_target, true_id)?;
                    self.enter_target(emitter, false_target, false_id)?;
                    return Ok(());
                }
                Node::Switch {
                    scrutinee,
                    cases,
                    default,
                } => {
                    let selector = self.resolve_value(emitter, scrutinee)?;
                    let default_id = self.reserve_block(emitter, default);
                    let mut operands = vec![selector, default_id];
                    let mut targets = vec![(default, default_id)];
                    for &case_id in emitter.arena.nodes_slice(cases).to_vec().iter() {
                        if let Node::SwitchCase { value, target } = emitter.arena.node(case_id) {
                            let target_id = self.reserve_block(emitter, *target);
                            operands.push(*value as u32);
                            operands.push(target_id);
                            targets.push((*target, target_id));
                        }
                    }
                    words.extend(encode(op::SWITCH, &operands));
                    self.finish_block(block_id, words);
                    for (target, target_id) in targets {
                        self.enter_target(emitter, target, target_id)?;
                    }
                    return Ok(());
                }
                Node::Return { values } => {
                    let values = emitter.arena.nodes_slice(values).to_vec();
                    match values.len() {
                        0 => words.extend(encode(op::RETURN, &[])),
                        1 => {
                            let v = self.resolve_value(emitter, values[0])?;
                            words.extend(encode(op::RETURN_VALUE, &[v]));
                        }
                        _ => {
                            return Err(CompileError::unimplemented(
                                "multi-value Return (OpCompositeConstruct + OpReturnValue)",
                            ))
                        }
                    }
                    self.finish_block(block_id, words);
                    return Ok(());
                }
                Node::Unreachable => {
                    words.extend(encode(op::UNREACHABLE, &[]));
                    self.finish_block(block_id, words);
                    return Ok(());
                }
                Node::TailCall { .. } => {
                    return Err(CompileError::lowering_precondition("a TailCall instruction"))
                }
                Node::MergeYield { args } => {
                    self.resolve_merge(emitter, block_id, &mut words, args, |f| match f {
                        MergeFrame::Yield { merge_block } => Some(*merge_block),
                        _ => None,
                    })?;
                    return Ok(());
                }
                Node::Join { args } => {
                    self.resolve_merge(emitter, block_id, &mut words, args, |f| match f {
                        MergeFrame::Control { merge_block } => Some(*merge_block),
                        _ => None,
                    })?;
                    return Ok(());
                }
                Node::MergeBreak { args } => {
                    self.resolve_merge(emitter, block_id, &mut words, args, |f| match f {
                        MergeFrame::Loop { exit_block, .. } => Some(*exit_block),
                        _ => None,
                    })?;
                    return Ok(());
                }
                Node::MergeContinue { args } => {
                    self.resolve_merge(emitter, block_id, &mut words, args, |f| match f {
                        MergeFrame::Loop { header_block, .. } => Some(*header_block),
                        _ => None,
                    })?;
                    return Ok(());
                }
                other => {
                    return Err(CompileError::structural(format!(
                        "unexpected node `{}` in block-body position",
                        other.tag()
                    )))
                }
            }
        }
    }

    fn finish_block(&mut self, block_id: u32, words: Vec<Word>) {
        self.block_words.insert(block_id, words);
    }

    /// Resolves a dangling (non-local) terminator: branches to whatever block the nearest
    /// matching `MergeFrame` names, recording this block's contribution to that block's phi.
    fn resolve_merge(
        &mut self,
        emitter: &mut Emitter,
        block_id: u32,
        words: &mut Vec<Word>,
        args: crate::ir::ids::NodeListId,
        select: impl Fn(&MergeFrame) -> Option<u32>,
    ) -> CompileResult<()> {
        let target = self
            .merge_stack
            .iter()
            .rev()
            .find_map(select)
            .ok_or_else(|| CompileError::structural("no enclosing construct for merge terminator"))?;
        let values: Vec<u32> = emitter
            .arena
            .nodes_slice(args)
            .to_vec()
            .iter()
            .map(|&a| self.resolve_value(emitter, a))
            .collect::<CompileResult<_>>()?;
        self.pending_phi
            .entry(target)
            .or_default()
            .push((block_id, values));
        words.extend(encode(op::BRANCH, &[target]));
        self.finish_block(block_id, std::mem::take(words));
        Ok(())
    }

    /// Handles a `Let` whose instruction is `If`/`Match`/`Loop`/`Control`: finishes the current
    /// block (`words` already holds its label and any straight-line prologue) with the branch
    /// that enters the construct, recurses into its arm(s), then emits the merge block (with
    /// phis) and continues with `tail` inside it.
    fn emit_structural(
        &mut self,
        emitter: &mut Emitter,
        pred_block: u32,
        mut words: Vec<Word>,
        instruction: NodeId,
        tail: AbsId,
    ) -> CompileResult<()> {
        match emitter.arena.node(instruction).clone() {
            Node::If {
                yield_types,
                cond,
                true_branch,
                false_branch,
            } => {
                let cond_id = self.resolve_value(emitter, cond)?;
                let merge_block = self.reserve_block(emitter, tail);
                let true_id = self.reserve_block(emitter, true_branch);
                let false_id = self.reserve_block(emitter, false_branch);
                words.extend(encode(op::SELECTION_MERGE, &[merge_block, 0]));
                words.extend(encode(op::BRANCH_CONDITIONAL, &[cond_id, true_id, false_id]));
                self.finish_block(pred_block, words);

                self.merge_stack.push(MergeFrame::Yield { merge_block });
                let true_body = emitter
                    .arena
                    .abs(true_branch)
                    .body()
                    .ok_or_else(|| CompileError::structural("If true branch has no body"))?;
                self.emit_block(emitter, true_id, true_body)?;
                let false_body = emitter
                    .arena
                    .abs(false_branch)
                    .body()
                    .ok_or_else(|| CompileError::structural("If false branch has no body"))?;
                self.emit_block(emitter, false_id, false_body)?;
                self.merge_stack.pop();

                self.finish_merge(emitter, merge_block, yield_types, tail)
            }
            Node::Match {
                scrutinee,
                arms,
                yield_types,
            } => {
                let arms = emitter.arena.nodes_slice(arms).to_vec();
                let merge_block = self.reserve_block(emitter, tail);
                let scrutinee_id = self.resolve_value(emitter, scrutinee)?;

                let mut test_block = pred_block;
                let mut test_words = words;
                self.merge_stack.push(MergeFrame::Yield { merge_block });
                for (i, &arm_id) in arms.iter().enumerate() {
                    let Node::MatchArm { pattern, target } = emitter.arena.node(arm_id).clone()
                    else {
                        return Err(CompileError::structural("Match arms list contains a non-MatchArm node"));
                    };
                    let pattern_id = self.resolve_value(emitter, pattern)?;
                    let eq_ty = self.bool_type(emitter)?;
                    let eq_result = emitter.writer.fresh_id();
                    let target_id = self.reserve_block(emitter, target);
                    let next_test_id = emitter.writer.fresh_id(); // next test, or unreachable default on the last arm
                    self.block_order.push(next_test_id);
                    test_words.extend(encode(op::I_EQUAL, &[eq_ty, eq_result, scrutinee_id, pattern_id]));
                    test_words.extend(encode(
                        op::BRANCH_CONDITIONAL,
                        &[eq_result, target_id, next_test_id],
                    ));
                    self.finish_block(test_block, std::mem::take(&mut test_words));

                    let target_body = emitter
                        .arena
                        .abs(target)
                        .body()
                        .ok_or_else(|| CompileError::structural("Match arm target has no body"))?;
                    self.emit_block(emitter, target_id, target_body)?;

                    if i + 1 == arms.len() {
                        self.finish_block(
                            next_test_id,
                            [encode(op::LABEL, &[next_test_id]), encode(op::UNREACHABLE, &[])].concat(),
                        );
                    } else {
                        test_words = encode(op::LABEL, &[next_test_id]);
                    }
                    test_block = next_test_id;
                }
                self.merge_stack.pop();
                self.finish_merge(emitter, merge_block, yield_types, tail)
            }
            Node::Control { yield_types, body } => {
                let merge_block = self.reserve_block(emitter, tail);
                let body_id = self.reserve_block(emitter, body);
                words.extend(encode(op::BRANCH, &[body_id]));
                self.finish_block(pred_block, words);
                self.merge_stack.push(MergeFrame::Control { merge_block });
                let body_body = emitter
                    .arena
                    .abs(body)
                    .body()
                    .ok_or_else(|| CompileError::structural("Control body has no body"))?;
                self.emit_block(emitter, body_id, body_body)?;
                self.merge_stack.pop();
                self.finish_merge(emitter, merge_block, yield_types, tail)
            }
            Node::Loop {
                params,
                initial_args,
                body,
                yield_types,
            } => {
                let header_block = self.reserve_block(emitter, body);
                self.block_order.push(header_block);
                let exit_block = self.reserve_block(emitter, tail);
                let body_proper = emitter.writer.fresh_id();

                let initial_values: Vec<u32> = emitter
                    .arena
                    .nodes_slice(initial_args)
                    .to_vec()
                    .iter()
                    .map(|&a| self.resolve_value(emitter, a))
                    .collect::<CompileResult<_>>()?;
                self.pending_phi
                    .entry(header_block)
                    .or_default()
                    .push((pred_block, initial_values));

                words.extend(encode(op::BRANCH, &[header_block]));
                self.finish_block(pred_block, words);

                // Reserve each loop-carried value's phi result id, and bind it, *before* the
                // body is emitted: the body's own instructions (and its back edge) need to refer
                // to this iteration's value of `param`, but the phi's incoming-value list can
                // only be completed once the back edge has been discovered by emitting the body.
                let params = emitter.arena.nodes_slice(params).to_vec();
                let phi_ids: Vec<u32> = params.iter().map(|_| emitter.writer.fresh_id()).collect();
                for (&param, &id) in params.iter().zip(&phi_ids) {
                    self.value_ids.insert(param, id);
                }

                self.merge_stack.push(MergeFrame::Loop {
                    header_block,
                    exit_block,
                });
                let body_body = emitter
                    .arena
                    .abs(body)
                    .body()
                    .ok_or_else(|| CompileError::structural("Loop body has no body"))?;
                self.emit_block(emitter, body_proper, body_body)?;
                self.merge_stack.pop();

                // Now that the body has been emitted, every back-edge contribution to
                // `header_block`'s phi is known; finalize the header's own words.
                let contributions = self.pending_phi.remove(&header_block).unwrap_or_default();
                let mut header_words = vec![encode(op::LABEL, &[header_block])];
                for (i, (&param, &phi_result)) in params.iter().zip(&phi_ids).enumerate() {
                    let ty = self.value_type_of(emitter, param)?;
                    let mut operands = vec![ty, phi_result];
                    for (pred, values) in &contributions {
                        operands.push(values[i]);
                        operands.push(*pred);
                    }
                    header_words.push(encode(op::PHI, &operands));
                }
                header_words.push(encode(op::LOOP_MERGE, &[exit_block, header_block, 0]));
                header_words.push(encode(op::BRANCH, &[body_proper]));
                self.finish_block(header_block, header_words.concat());

                self.finish_merge(emitter, exit_block, yield_types, tail)
            }
            other => Err(CompileError::structural(format!(
                "`{}` is not a structural instruction",
                other.tag()
            ))),
        }
    }

    /// Finalizes a merge block: one `OpPhi` per yielded value (or, when there's exactly one
    /// contributor, the value forwarded directly — no phi is needed when dominance alone proves
    /// the value reaches the merge), binds `tail`'s parameters, and continues emission inside it.
    fn finish_merge(
        &mut self,
        emitter: &mut Emitter,
        merge_block: u32,
        yield_types: crate::ir::ids::NodeListId,
        tail: AbsId,
    ) -> CompileResult<()> {
        let yield_types = emitter.arena.nodes_slice(yield_types).to_vec();
        let contributions = self.pending_phi.remove(&merge_block).unwrap_or_default();
        let mut words = vec![encode(op::LABEL, &[merge_block])];
        let tail_params = emitter.arena.nodes_slice(emitter.arena.abs(tail).params()).to_vec();

        for (i, &yield_ty) in yield_types.iter().enumerate() {
            if contributions.is_empty() {
                continue;
            }
            let result = if contributions.len() == 1 {
                contributions[0].1[i]
            } else {
                let ty = self.type_id(yield_ty)?;
                let result = emitter.writer.fresh_id();
                let mut operands = vec![ty, result];
                for (pred, values) in &contributions {
                    operands.push(values[i]);
                    operands.push(*pred);
                }
                words.push(encode(op::PHI, &operands));
                result
            };
            if let Some(&param) = tail_params.get(i) {
                self.value_ids.insert(param, result);
            }
        }
        self.block_prologue.insert(merge_block, words.concat());

        let tail_body = emitter
            .arena
            .abs(tail)
            .body()
            .ok_or_else(|| CompileError::structural("merge tail has no body"))?;
        self.emit_block(emitter, merge_block, tail_body)
    }

    // ---- instructions & values ----

    fn emit_instruction(
        &mut self,
        emitter: &mut Emitter,
        words: &mut Vec<Word>,
        instruction: NodeId,
    ) -> CompileResult<Option<u32>> {
        let ty = emitter
            .arena
            .type_of(instruction)
            .ok_or_else(|| CompileError::structural("instruction has no resolved type"))?;
        match emitter.arena.node(instruction).clone() {
            Node::PrimOp { op: kind, operands } => {
                let operands = emitter.arena.nodes_slice(operands).to_vec();
                self.emit_prim_op(emitter, words, kind, &operands, ty)
            }
            Node::Call { callee, args } => {
                let callee_id = *emitter
                    .function_ids
                    .get(&callee)
                    .ok_or_else(|| CompileError::structural("Call target function id not reserved"))?;
                let arg_ids: Vec<u32> = emitter
                    .arena
                    .nodes_slice(args)
                    .to_vec()
                    .iter()
                    .map(|&a| self.resolve_value(emitter, a))
                    .collect::<CompileResult<_>>()?;
                let ty_id = self.type_id(ty)?;
                let result = emitter.writer.fresh_id();
                let mut operands = vec![ty_id, result, callee_id];
                operands.extend(arg_ids);
                words.extend(encode(op::FUNCTION_CALL, &operands));
                Ok(Some(result))
            }
            other => Err(CompileError::structural(format!(
                "node `{}` is not emittable as a straight-line instruction",
                other.tag()
            ))),
        }
    }

    fn emit_prim_op(
        &mut self,
        emitter: &mut Emitter,
        words: &mut Vec<Word>,
        kind: PrimOpKind,
        operands: &[NodeId],
        ty: NodeId,
    ) -> CompileResult<Option<u32>> {
        match kind {
            PrimOpKind::Store => {
                let ptr = self.resolve_value(emitter, operands[0])?;
                let value = self.resolve_value(emitter, operands[1])?;
                words.extend(encode(op::STORE, &[ptr, value]));
                return Ok(None);
            }
            PrimOpKind::Memcpy => {
                let dst = self.resolve_value(emitter, operands[0])?;
                let src = self.resolve_value(emitter, operands[1])?;
                words.extend(encode(op::COPY_MEMORY, &[dst, src]));
                return Ok(None);
            }
            PrimOpKind::Alloca => {
                let ty_id = self.type_id(ty)?;
                let result = emitter.writer.fresh_id();
                self.pending_allocas.extend(encode(
                    op::VARIABLE,
                    &[ty_id, result, spirv::storage_class::FUNCTION],
                ));
                return Ok(Some(result));
            }
            _ => {}
        }

        let ty_id = self.type_id(ty)?;
        let result = emitter.writer.fresh_id();
        let opcode = match kind {
            PrimOpKind::Add => op::I_ADD,
            PrimOpKind::Sub => op::I_SUB,
            PrimOpKind::Mul => op::I_MUL,
            PrimOpKind::Div => op::S_DIV,
            PrimOpKind::Mod => op::S_MOD,
            PrimOpKind::Lt => op::S_LESS_THAN,
            PrimOpKind::Lte => op::S_LESS_THAN_EQUAL,
            PrimOpKind::Gt => op::S_GREATER_THAN,
            PrimOpKind::Gte => op::S_GREATER_THAN_EQUAL,
            PrimOpKind::Eq => op::I_EQUAL,
            PrimOpKind::Neq => op::I_NOT_EQUAL,
            PrimOpKind::And => op::BITWISE_AND,
            PrimOpKind::Or => op::BITWISE_OR,
            PrimOpKind::Xor => op::BITWISE_XOR,
            PrimOpKind::Not => op::NOT,
            PrimOpKind::Load => op::LOAD,
            PrimOpKind::Lea => op::ACCESS_CHAIN,
            PrimOpKind::SubgroupBroadcast => op::GROUP_BROADCAST,
            PrimOpKind::SubgroupBallot => op::GROUP_NON_UNIFORM_BALLOT,
            PrimOpKind::SubgroupReduce => op::GROUP_NON_UNIFORM_IADD,
            PrimOpKind::Store | PrimOpKind::Memcpy | PrimOpKind::Alloca => unreachable!("handled above"),
        };

        let mut operand_ids = Vec::with_capacity(operands.len());
        for &operand in operands {
            operand_ids.push(self.resolve_value(emitter, operand)?);
        }
        let mut all_operands = vec![ty_id, result];
        all_operands.extend(operand_ids);
        words.extend(encode(opcode, &all_operands));
        Ok(Some(result))
    }

    fn bool_type(&mut self, emitter: &mut Emitter) -> CompileResult<u32> {
        let bool_node = emitter
            .arena
            .lookup_node(&Node::Bool)
            .ok_or_else(|| CompileError::structural("Bool type was never interned in this arena"))?;
        emitter.type_id(bool_node)
    }

    fn value_type_of(&mut self, emitter: &mut Emitter, value: NodeId) -> CompileResult<u32> {
        let ty = emitter
            .arena
            .type_of(value)
            .ok_or_else(|| CompileError::structural("value has no resolved type"))?;
        emitter.type_id(ty)
    }

    /// Resolves `node` to an already-materialized SSA/global/constant id.
    fn resolve_value(&mut self, emitter: &mut Emitter, node: NodeId) -> CompileResult<u32> {
        if let Some(&id) = self.value_ids.get(&node) {
            return Ok(id);
        }
        if let Some(&id) = emitter.global_ids.get(&node) {
            return Ok(id);
        }
        match emitter.arena.node(node) {
            Node::IntLiteral(_) | Node::True | Node::False => emitter.constant_id(node),
            _ => Err(CompileError::structural(
                "value referenced before it was bound (missing Let binding or global)",
            )),
        }
    }

    /// Binds `tail`'s single declared parameter (the `Let`-tail convention: the tail lambda's
    /// only param names the instruction's result) to `result`.
    fn bind_param(&mut self, emitter: &mut Emitter, tail: AbsId, index: usize, result: u32) -> CompileResult<()> {
        let params = emitter.arena.nodes_slice(emitter.arena.abs(tail).params()).to_vec();
        if let Some(&param) = params.get(index) {
            self.value_ids.insert(param, result);
        }
        Ok(())
    }

    /// Binds a named block's parameters to the values an incoming `Jump`/`Branch` supplies, by
    /// position — the same convention `bind_param` uses for a `Let`'s tail.
    fn bind_forward_args(
        &mut self,
        emitter: &mut Emitter,
        target: AbsId,
        args: crate::ir::ids::NodeListId,
    ) -> CompileResult<()> {
        let params = emitter.arena.nodes_slice(emitter.arena.abs(target).params()).to_vec();
        let args = emitter.arena.nodes_slice(args).to_vec();
        for (i, &param) in params.iter().enumerate() {
            if let Some(&arg) = args.get(i) {
                let value = self.resolve_value(emitter, arg)?;
                self.value_ids.insert(param, value);
            }
        }
        Ok(())
    }
}

fn is_structural(node: &Node) -> bool {
    matches!(
        node,
        Node::If { .. } | Node::Match { .. } | Node::Loop { .. } | Node::Control { .. }
    )
}

impl Arena {
    /// Looks up (without interning) the canonical `Int` type node, used by constant emission to
    /// recover the type of an `IntLiteral` without threading the type through every call site.
    fn intern_nodes_lookup_int(&self) -> CompileResult<NodeId> {
        self.lookup_node(&Node::Int)
            .ok_or_else(|| CompileError::structural("Int type was never interned in this arena"))
    }
}
