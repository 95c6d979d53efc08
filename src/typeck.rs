//! The type checker / inferencer (component C): a rewrite from an arena without `check_types`
//! into one with it set, attaching a resolved type (and a uniformity qualifier) to every value
//! and instruction node as it is copied across.
//!
//! This can't be expressed as an ordinary [`crate::rewrite::NodeRewrite`] override, because that
//! trait's hook returns a `Node` before it has been interned — and type/uniformity live in the
//! destination arena's side tables, addressed by the *interned* id. So `TypeChecker` drives its
//! own structural copy, mirroring `Rewriter`'s memoization shape but feeding the freshly interned
//! destination id straight into `Arena::set_type`/`set_uniformity` before returning it to the
//! caller, which is what lets the next level up look up an operand's type with a plain
//! `dst.type_of(..)` call.

use crate::arena::Arena;
use crate::error::{CompileError, CompileResult};
use crate::ir::decl::Decl;
use crate::ir::ids::{AbsId, DeclId, NodeId, NodeListId, PrimOpKind, StrId, Uniformity};
use crate::ir::node::Node;
use crate::ir::{Abstraction, Root};
use std::collections::HashMap;

pub struct TypeChecker<'src, 'dst> {
    src: &'src Arena,
    dst: &'dst mut Arena,
    node_map: HashMap<NodeId, NodeId>,
    list_map: HashMap<NodeListId, NodeListId>,
    string_map: HashMap<StrId, StrId>,
    abs_map: HashMap<AbsId, AbsId>,
    unit_ty: Option<NodeId>,
}

impl<'src, 'dst> TypeChecker<'src, 'dst> {
    pub fn new(src: &'src Arena, dst: &'dst mut Arena) -> Self {
        Self {
            src,
            dst,
            node_map: HashMap::new(),
            list_map: HashMap::new(),
            string_map: HashMap::new(),
            abs_map: HashMap::new(),
            unit_ty: None,
        }
    }

    /// The canonical "no meaningful result" type for side-effecting instructions (`Store`,
    /// `Memcpy`): the empty record, which has no SPIR-V representation issues since it is never
    /// actually read.
    fn unit_type(&mut self) -> NodeId {
        if let Some(ty) = self.unit_ty {
            return ty;
        }
        let empty = self.dst.intern_nodes(std::iter::empty());
        let ty = self.dst.intern_node(Node::Record { members: empty });
        self.unit_ty = Some(ty);
        ty
    }

    pub fn run(mut self, entry: AbsId) -> CompileResult<AbsId> {
        let new_entry = self.check_abs(entry)?;
        self.dst.config.check_types = true;
        Ok(new_entry)
    }

    /// Type-checks every function and declaration in `root`, in declaration order.
    pub fn run_root(mut self, root: &Root) -> CompileResult<Root> {
        let mut functions = Vec::with_capacity(root.functions.len());
        for &f in &root.functions {
            functions.push(self.check_abs(f)?);
        }
        let mut declarations = Vec::with_capacity(root.declarations.len());
        for &d in &root.declarations {
            declarations.push(self.check_decl(d)?);
        }
        self.dst.config.check_types = true;
        Ok(Root {
            declarations,
            functions,
        })
    }

    fn check_decl(&mut self, id: DeclId) -> CompileResult<DeclId> {
        let decl = self.src.decl(id).clone();
        let rewritten = match decl {
            Decl::Constant(c) => {
                let value = self.check_node(c.value)?;
                Decl::Constant(crate::ir::decl::Constant {
                    name: self.rewrite_string(c.name),
                    value,
                })
            }
            Decl::GlobalVariable(g) => {
                let ty = self.check_type_node(g.ty)?;
                let init = g.init.map(|n| self.check_node(n)).transpose()?;
                Decl::GlobalVariable(crate::ir::decl::GlobalVariable {
                    name: self.rewrite_string(g.name),
                    ty,
                    address_space: g.address_space,
                    init,
                })
            }
        };
        Ok(self.dst.declare_decl(rewritten))
    }

    fn rewrite_string(&mut self, id: StrId) -> StrId {
        if let Some(&mapped) = self.string_map.get(&id) {
            return mapped;
        }
        let text = self.src.string(id).to_string();
        let mapped = self.dst.intern_string(&text);
        self.string_map.insert(id, mapped);
        mapped
    }

    fn check_list(&mut self, id: NodeListId) -> CompileResult<NodeListId> {
        if let Some(&mapped) = self.list_map.get(&id) {
            return Ok(mapped);
        }
        let items: Vec<NodeId> = self.src.nodes_slice(id).to_vec();
        let mut rewritten = Vec::with_capacity(items.len());
        for item in items {
            rewritten.push(self.check_node(item)?);
        }
        let mapped = self.dst.intern_nodes(rewritten);
        self.list_map.insert(id, mapped);
        Ok(mapped)
    }

    /// Checks (and copies) a node that is itself a *type* — no inference needed, these carry no
    /// value-level type/uniformity of their own.
    fn check_type_node(&mut self, id: NodeId) -> CompileResult<NodeId> {
        self.check_node(id)
    }

    fn check_abs(&mut self, id: AbsId) -> CompileResult<AbsId> {
        if let Some(&mapped) = self.abs_map.get(&id) {
            return Ok(mapped);
        }
        let src_abs = self.src.abs(id).clone();
        let header = match &src_abs {
            Abstraction::Function(f) => Abstraction::Function(crate::ir::abs::Function {
                name: self.rewrite_string(f.name),
                params: self.check_list(f.params)?,
                result_types: self.check_list(f.result_types)?,
                body: None,
                is_leaf: f.is_leaf,
                is_entry_point: f.is_entry_point,
            }),
            Abstraction::BasicBlock(b) => Abstraction::BasicBlock(crate::ir::abs::BasicBlock {
                name: self.rewrite_string(b.name),
                params: self.check_list(b.params)?,
                body: None,
            }),
            Abstraction::AnonymousLambda(l) => {
                Abstraction::AnonymousLambda(crate::ir::abs::AnonymousLambda {
                    params: self.check_list(l.params)?,
                    body: None,
                })
            }
        };
        let new_id = self.dst.declare_abs(header);
        self.abs_map.insert(id, new_id);

        if let Some(body) = src_abs.body() {
            let new_body = self.check_node(body)?;
            self.dst.define_abs_body(new_id, new_body);
        }
        Ok(new_id)
    }

    /// Checks one node: copies its structure into `dst`, computes its type/uniformity (if it is
    /// a value or instruction), records both in the destination arena's side tables, and returns
    /// the destination id.
    fn check_node(&mut self, id: NodeId) -> CompileResult<NodeId> {
        if let Some(&mapped) = self.node_map.get(&id) {
            return Ok(mapped);
        }
        let src_node = self.src.node(id).clone();
        let (dst_node, ty, uniformity) = self.check_payload(&src_node)?;
        let new_id = self.dst.intern_node(dst_node);
        self.node_map.insert(id, new_id);
        if let Some(ty) = ty {
            self.dst.set_type(new_id, ty);
            self.dst
                .set_uniformity(new_id, uniformity.unwrap_or(Uniformity::Unknown));
        }
        Ok(new_id)
    }

    /// Returns the rewritten node payload plus, for values/instructions, its inferred
    /// `(type, uniformity)`.
    fn check_payload(
        &mut self,
        node: &Node,
    ) -> CompileResult<(Node, Option<NodeId>, Option<Uniformity>)> {
        use Node::*;
        match node {
            // ---- types: copied structurally, no type/uniformity of their own ----
            Int | Bool | Float | Mask => Ok((node.clone(), None, None)),
            Ptr {
                address_space,
                pointee,
            } => Ok((
                Ptr {
                    address_space: *address_space,
                    pointee: self.check_type_node(*pointee)?,
                },
                None,
                None,
            )),
            Record { members } => Ok((
                Record {
                    members: self.check_list(*members)?,
                },
                None,
                None,
            )),
            FnType {
                params,
                results,
                is_continuation,
            } => Ok((
                FnType {
                    params: self.check_list(*params)?,
                    results: self.check_list(*results)?,
                    is_continuation: *is_continuation,
                },
                None,
                None,
            )),
            Qualified { uniform, inner } => Ok((
                Qualified {
                    uniform: *uniform,
                    inner: self.check_type_node(*inner)?,
                },
                None,
                None,
            )),
            Array { element, size } => Ok((
                Array {
                    element: self.check_type_node(*element)?,
                    size: *size,
                },
                None,
                None,
            )),

            // ---- values ----
            IntLiteral(v) => {
                let int_ty = self.dst.intern_node(Node::Int);
                Ok((
                    IntLiteral(*v),
                    Some(self.qualified(Uniformity::Uniform, int_ty)),
                    Some(Uniformity::Uniform),
                ))
            }
            True | False => {
                let bool_ty = self.dst.intern_node(Node::Bool);
                Ok((
                    node.clone(),
                    Some(self.qualified(Uniformity::Uniform, bool_ty)),
                    Some(Uniformity::Uniform),
                ))
            }
            Variable { name, ty } => {
                let dst_ty = self.check_type_node(*ty)?;
                let uniform = self.uniformity_of_type(dst_ty);
                Ok((
                    Variable {
                        name: self.rewrite_string(*name),
                        ty: dst_ty,
                    },
                    Some(dst_ty),
                    Some(uniform),
                ))
            }
            Unbound { name } => Err(CompileError::binding(self.src.string(*name))),
            UntypedNumber { text } => Err(CompileError::type_error(format!(
                "untyped number literal `{}` reached the type checker; `normalize` should have \
                 resolved it to an IntLiteral first",
                self.src.string(*text)
            ))),

            // ---- instructions ----
            PrimOp { op, operands } => self.check_prim_op(*op, *operands),
            Call { callee, args } => {
                let dst_callee = self.check_abs(*callee)?;
                let dst_args = self.check_list(*args)?;
                // The callee's result type(s) are only known once `callee` has been visited;
                // since `check_abs` always declares the header before recursing, this is safe
                // even for a directly (or mutually) recursive call.
                let result_ty = match self.dst.abs(dst_callee) {
                    Abstraction::Function(f) => {
                        let results = self.dst.nodes_slice(f.result_types);
                        match results.len() {
                            1 => Some(results[0]),
                            _ => Some(self.unit_type()),
                        }
                    }
                    _ => {
                        return Err(CompileError::structural(
                            "Call target must be a Function",
                        ))
                    }
                };
                Ok((
                    Call {
                        callee: dst_callee,
                        args: dst_args,
                    },
                    result_ty,
                    Some(Uniformity::Varying),
                ))
            }
            If {
                yield_types,
                cond,
                true_branch,
                false_branch,
            } => {
                let dst_cond = self.check_node(*cond)?;
                let dst_yield = self.check_list(*yield_types)?;
                let dst_true = self.check_abs(*true_branch)?;
                let dst_false = self.check_abs(*false_branch)?;
                Ok((
                    If {
                        yield_types: dst_yield,
                        cond: dst_cond,
                        true_branch: dst_true,
                        false_branch: dst_false,
                    },
                    Some(self.yield_result_type(dst_yield)),
                    Some(Uniformity::Varying),
                ))
            }
            Match {
                scrutinee,
                arms,
                yield_types,
            } => {
                let dst_scrutinee = self.check_node(*scrutinee)?;
                let dst_arms = self.check_list(*arms)?;
                let dst_yield = self.check_list(*yield_types)?;
                Ok((
                    Match {
                        scrutinee: dst_scrutinee,
                        arms: dst_arms,
                        yield_types: dst_yield,
                    },
                    Some(self.yield_result_type(dst_yield)),
                    Some(Uniformity::Varying),
                ))
            }
            MatchArm { pattern, target } => {
                let dst_pattern = self.check_node(*pattern)?;
                let dst_target = self.check_abs(*target)?;
                Ok((
                    MatchArm {
                        pattern: dst_pattern,
                        target: dst_target,
                    },
                    None,
                    None,
                ))
            }
            Loop {
                params,
                initial_args,
                body,
                yield_types,
            } => {
                let dst_params = self.check_list(*params)?;
                let dst_initial = self.check_list(*initial_args)?;
                let dst_yield = self.check_list(*yield_types)?;
                let dst_body = self.check_abs(*body)?;
                Ok((
                    Loop {
                        params: dst_params,
                        initial_args: dst_initial,
                        body: dst_body,
                        yield_types: dst_yield,
                    },
                    Some(self.yield_result_type(dst_yield)),
                    Some(Uniformity::Varying),
                ))
            }
            Control { yield_types, body } => {
                let dst_yield = self.check_list(*yield_types)?;
                let dst_body = self.check_abs(*body)?;
                Ok((
                    Control {
                        yield_types: dst_yield,
                        body: dst_body,
                    },
                    Some(self.yield_result_type(dst_yield)),
                    Some(Uniformity::Varying),
                ))
            }
            Block { yield_types, body } => {
                let dst_yield = self.check_list(*yield_types)?;
                let dst_body = self.check_abs(*body)?;
                Ok((
                    Block {
                        yield_types: dst_yield,
                        body: dst_body,
                    },
                    Some(self.yield_result_type(dst_yield)),
                    Some(Uniformity::Varying),
                ))
            }

            // ---- terminators: no value/type of their own ----
            Jump { target, args } => Ok((
                Jump {
                    target: self.check_abs(*target)?,
                    args: self.check_list(*args)?,
                },
                None,
                None,
            )),
            Branch {
                cond,
                true_target,
                false_target,
                args,
            } => Ok((
                Branch {
                    cond: self.check_node(*cond)?,
                    true_target: self.check_abs(*true_target)?,
                    false_target: self.check_abs(*false_target)?,
                    args: self.check_list(*args)?,
                },
                None,
                None,
            )),
            Switch {
                scrutinee,
                cases,
                default,
            } => Ok((
                Switch {
                    scrutinee: self.check_node(*scrutinee)?,
                    cases: self.check_list(*cases)?,
                    default: self.check_abs(*default)?,
                },
                None,
                None,
            )),
            SwitchCase { value, target } => Ok((
                SwitchCase {
                    value: *value,
                    target: self.check_abs(*target)?,
                },
                None,
                None,
            )),
            Return { values } => Ok((
                Return {
                    values: self.check_list(*values)?,
                },
                None,
                None,
            )),
            Let { instruction, tail } => {
                let dst_instruction = self.check_node(*instruction)?;
                let dst_tail = self.check_abs(*tail)?;
                Ok((
                    Let {
                        instruction: dst_instruction,
                        tail: dst_tail,
                    },
                    None,
                    None,
                ))
            }
            Join { args } => Ok((
                Join {
                    args: self.check_list(*args)?,
                },
                None,
                None,
            )),
            MergeBreak { args } => Ok((
                MergeBreak {
                    args: self.check_list(*args)?,
                },
                None,
                None,
            )),
            MergeContinue { args } => Ok((
                MergeContinue {
                    args: self.check_list(*args)?,
                },
                None,
                None,
            )),
            MergeYield { args } => Ok((
                MergeYield {
                    args: self.check_list(*args)?,
                },
                None,
                None,
            )),
            TailCall { callee, args } => Ok((
                TailCall {
                    callee: self.check_abs(*callee)?,
                    args: self.check_list(*args)?,
                },
                None,
                None,
            )),
            Unreachable => Ok((Unreachable, None, None)),
        }
    }

    fn yield_result_type(&mut self, yield_types: NodeListId) -> NodeId {
        let types = self.dst.nodes_slice(yield_types).to_vec();
        match types.len() {
            1 => types[0],
            _ => self.unit_type(),
        }
    }

    fn qualified(&mut self, uniform: Uniformity, inner: NodeId) -> NodeId {
        self.dst.intern_node(Node::Qualified { uniform, inner })
    }

    fn uniformity_of_type(&self, ty: NodeId) -> Uniformity {
        match self.dst.node(ty) {
            Node::Qualified { uniform, .. } => *uniform,
            _ => Uniformity::Uniform,
        }
    }

    fn check_prim_op(
        &mut self,
        op: PrimOpKind,
        operands: NodeListId,
    ) -> CompileResult<(Node, Option<NodeId>, Option<Uniformity>)> {
        let dst_operands = self.check_list(operands)?;
        let operand_ids = self.dst.nodes_slice(dst_operands).to_vec();

        let operand_types: Vec<NodeId> = operand_ids
            .iter()
            .map(|&id| {
                self.dst.type_of(id).ok_or_else(|| {
                    CompileError::type_error(format!(
                        "PrimOp({:?}) operand has no resolved type",
                        op
                    ))
                })
            })
            .collect::<CompileResult<_>>()?;
        let operand_uniformities: Vec<Uniformity> =
            operand_ids.iter().map(|&id| self.dst.uniformity_of(id)).collect();

        let joined_uniformity = operand_uniformities
            .iter()
            .copied()
            .fold(Uniformity::Uniform, Uniformity::join);

        use PrimOpKind::*;
        let (result_ty, result_uniformity) = match op {
            Add | Sub | Mul | Div | Mod | And | Or | Xor | Not => {
                let first = operand_types.first().ok_or_else(|| {
                    CompileError::type_error(format!("PrimOp({:?}) requires an operand", op))
                })?;
                let uniformity = if op.is_uniformity_preserving() {
                    joined_uniformity
                } else {
                    Uniformity::Varying
                };
                (*first, uniformity)
            }
            Lt | Lte | Gt | Gte | Eq | Neq => {
                let bool_ty = self.dst.intern_node(Node::Bool);
                (self.qualified(joined_uniformity, bool_ty), joined_uniformity)
            }
            Load => {
                let ptr_ty = operand_types.first().copied().ok_or_else(|| {
                    CompileError::type_error("PrimOp(Load) requires a pointer operand")
                })?;
                let pointee = self.pointee_of(ptr_ty)?;
                (pointee, Uniformity::Varying)
            }
            Store | Memcpy => (self.unit_type(), Uniformity::Varying),
            Alloca => {
                let pointee_ty = operand_types.first().copied().ok_or_else(|| {
                    CompileError::type_error("PrimOp(Alloca) requires a type operand")
                })?;
                let ptr = self.dst.intern_node(Node::Ptr {
                    address_space: crate::ir::ids::AddressSpace::Function,
                    pointee: pointee_ty,
                });
                (self.qualified(Uniformity::Varying, ptr), Uniformity::Varying)
            }
            Lea => {
                let ptr_ty = operand_types.first().copied().ok_or_else(|| {
                    CompileError::type_error("PrimOp(Lea) requires a pointer operand")
                })?;
                (ptr_ty, Uniformity::Varying)
            }
            SubgroupBroadcast | SubgroupReduce => {
                let first = operand_types.first().copied().ok_or_else(|| {
                    CompileError::type_error(format!("PrimOp({:?}) requires an operand", op))
                })?;
                (first, Uniformity::Uniform)
            }
            SubgroupBallot => {
                let mask_ty = self.dst.intern_node(Node::Mask);
                (self.qualified(Uniformity::Uniform, mask_ty), Uniformity::Uniform)
            }
        };

        Ok((
            Node::PrimOp {
                op,
                operands: dst_operands,
            },
            Some(result_ty),
            Some(result_uniformity),
        ))
    }

    fn pointee_of(&self, ty: NodeId) -> CompileResult<NodeId> {
        let unwrapped = match self.dst.node(ty) {
            Node::Qualified { inner, .. } => *inner,
            _ => ty,
        };
        match self.dst.node(unwrapped) {
            Node::Ptr { pointee, .. } => Ok(*pointee),
            _ => Err(CompileError::type_error(
                "PrimOp(Load) operand is not a pointer type",
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arena::ArenaConfig;
    use crate::ir::builder::IrBuilder;

    #[test]
    fn arithmetic_is_typed_and_uniform() {
        let mut src = Arena::new(ArenaConfig::default());
        let f = {
            let mut b = IrBuilder::new(&mut src);
            let int_ty = b.int_ty();
            let f = b.declare_function("main", &[], &[int_ty]);
            let one = b.int_literal(1);
            let two = b.int_literal(2);
            let sum = b.prim_op(PrimOpKind::Add, &[one, two]);
            let entry = b.declare_block("entry", &[]);
            let ret = b.return_(&[sum]);
            b.define_body(entry, ret);
            let j = b.jump(entry, &[]);
            b.define_body(f, j);
            f
        };

        let mut dst = Arena::new(ArenaConfig::default());
        let checker = TypeChecker::new(&src, &mut dst);
        let new_f = checker.run(f).expect("type check should succeed");
        assert!(dst.config.check_types);
        assert_eq!(dst.abs(new_f).tag(), "function");
    }

    #[test]
    fn unbound_reference_is_a_binding_error() {
        let mut src = Arena::new(ArenaConfig::default());
        let f = {
            let mut b = IrBuilder::new(&mut src);
            let x = b.unbound("x");
            let entry = b.declare_block("entry", &[]);
            let ret = b.return_(&[x]);
            b.define_body(entry, ret);
            let f = b.declare_function("main", &[], &[]);
            let j = b.jump(entry, &[]);
            b.define_body(f, j);
            f
        };

        let mut dst = Arena::new(ArenaConfig::default());
        let checker = TypeChecker::new(&src, &mut dst);
        let err = checker.run(f).unwrap_err();
        assert!(matches!(err, CompileError::Binding { .. }));
    }
}
