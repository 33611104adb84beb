//! The type/scope engine.
//!
//! A single mutable traversal over the normalized tree. Types flow
//! bottom-up from literals; control-flow joins widen to canonical
//! unions. Method calls drive specialization: the untyped definition is
//! cloned per distinct argument-type tuple, its body is inferred inside
//! a fresh scope frame, and the typed clone is cached on the untyped
//! definition so the next structurally identical call is a pointer-
//! shared cache hit.
//!
//! Scope frames double as the diagnostic back-trace: every frame
//! remembers which method it is specializing and the line of the call
//! it most recently dispatched, so a failure deep inside a
//! specialization chain reports the full call path.

use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use garnet_ast::{Call, Def, Node, NodeKind, Primitive, Type};
use garnet_common::{Location, TraceFrame};

use crate::error::{InferError, InferErrorKind};
use crate::program::Program;

/// Infer types for a normalized tree, filling every node's type slot
/// and resolving every call to its specializations.
pub fn infer(program: &mut Program, node: &mut Node) -> Result<(), InferError> {
    Infer::new(program).visit(node)
}

/// One lexical scope: the root frame for top-level code, plus one frame
/// per specialization in progress.
struct Frame {
    vars: FxHashMap<String, Type>,
    /// Method being specialized; `None` in the root frame.
    def_name: Option<String>,
    /// Receiver type the specialization is for.
    owner: Option<Type>,
    /// Line of the call this frame most recently dispatched. Feeds the
    /// back-trace.
    line: Option<u32>,
}

impl Frame {
    fn root() -> Frame {
        Frame {
            vars: FxHashMap::default(),
            def_name: None,
            owner: None,
            line: None,
        }
    }
}

/// A call site's identity, carried through resolution for diagnostics.
struct CallSite {
    name: String,
    has_parens: bool,
    location: Location,
    name_location: Option<Location>,
}

pub struct Infer<'a> {
    program: &'a mut Program,
    scopes: Vec<Frame>,
    /// Class whose body is being visited; receiverless defs register
    /// into its table.
    current_class: Option<String>,
}

impl<'a> Infer<'a> {
    pub fn new(program: &'a mut Program) -> Self {
        Infer {
            program,
            scopes: vec![Frame::root()],
            current_class: None,
        }
    }

    pub fn visit(&mut self, node: &mut Node) -> Result<(), InferError> {
        let location = node.location;
        let name_location = node.name_location;
        node.ty = self.visit_kind(&mut node.kind, location, name_location)?;
        Ok(())
    }

    fn visit_kind(
        &mut self,
        kind: &mut NodeKind,
        location: Location,
        name_location: Option<Location>,
    ) -> Result<Option<Type>, InferError> {
        match kind {
            NodeKind::BoolLiteral(_) => Ok(Some(Type::Bool)),
            NodeKind::IntLiteral(_) => Ok(Some(Type::Int)),
            NodeKind::FloatLiteral(_) => Ok(Some(Type::Float)),
            NodeKind::CharLiteral(_) => Ok(Some(Type::Char)),
            NodeKind::StringLiteral(_) => Ok(Some(Type::String)),
            NodeKind::SymbolLiteral(_) => Ok(Some(Type::Symbol)),

            NodeKind::Expressions(exps) => {
                assert!(
                    !exps.is_empty(),
                    "empty expression sequence reached type inference"
                );
                for exp in exps.iter_mut() {
                    self.visit(exp)?;
                }
                Ok(exps.last().and_then(|exp| exp.ty.clone()))
            }

            NodeKind::Assign { target, value } => {
                self.visit(value)?;
                let ty = value.ty_or_nil();
                target.ty = Some(ty.clone());
                if let NodeKind::Var(name) | NodeKind::InstanceVar(name) = &target.kind {
                    self.define_var(name.clone(), ty.clone());
                }
                Ok(Some(ty))
            }

            NodeKind::Var(name) | NodeKind::InstanceVar(name) => {
                match self.lookup_var(name) {
                    Some(ty) => Ok(Some(ty)),
                    None => Err(self.error(
                        InferErrorKind::UndefinedLocalVariableOrMethod { name: name.clone() },
                        location,
                        None,
                        name.chars().count(),
                    )),
                }
            }

            NodeKind::Ident { names, .. } => self.resolve_ident(names, location).map(Some),

            NodeKind::If { cond, then, els } => {
                self.visit(cond)?;
                let then_ty = self.visit_branch(then)?;
                let else_ty = self.visit_branch(els)?;
                Ok(Some(Type::union([then_ty, else_ty])))
            }

            NodeKind::While { cond, body } => {
                self.visit(cond)?;
                self.visit_branch(body)?;
                Ok(Some(Type::Nil))
            }

            NodeKind::SimpleOr { left, right } => {
                self.visit(left)?;
                self.visit(right)?;
                Ok(Some(Type::union([left.ty_or_nil(), right.ty_or_nil()])))
            }

            NodeKind::IsA { obj, .. } => {
                self.visit(obj)?;
                Ok(Some(Type::Bool))
            }

            NodeKind::Return(exps)
            | NodeKind::Break(exps)
            | NodeKind::Next(exps)
            | NodeKind::Yield(exps) => {
                for exp in exps.iter_mut() {
                    self.visit(exp)?;
                }
                Ok(Some(
                    exps.first().map(Node::ty_or_nil).unwrap_or(Type::Nil),
                ))
            }

            NodeKind::Def(def) => {
                self.program
                    .define(self.current_class.as_deref(), def.clone());
                Ok(None)
            }

            NodeKind::ClassDef { name, body } | NodeKind::ModuleDef { name, body } => {
                self.program.class_table(name);
                if let Some(body) = body {
                    let saved = self.current_class.replace(name.clone());
                    let result = self.visit(body);
                    self.current_class = saved;
                    result?;
                }
                Ok(None)
            }

            NodeKind::Call(call) => self
                .visit_call(call, location, name_location)
                .map(Some),

            NodeKind::Primitive(primitive) => {
                let owner = self.scopes.last().and_then(|frame| frame.owner.clone());
                Ok(Some(match primitive {
                    Primitive::BinaryOp | Primitive::Allocate => owner.unwrap_or(Type::Nil),
                    Primitive::Compare | Primitive::CaseEqual => Type::Bool,
                    Primitive::ToString => Type::String,
                    Primitive::PutChar => Type::Char,
                }))
            }

            NodeKind::StringInterpolation(_)
            | NodeKind::RangeLiteral { .. }
            | NodeKind::RegexpLiteral(_)
            | NodeKind::Unless { .. }
            | NodeKind::Case { .. }
            | NodeKind::And { .. }
            | NodeKind::Or { .. }
            | NodeKind::Block { .. }
            | NodeKind::Require { .. } => {
                panic!("sugar node reached type inference; run the normalizer first")
            }
        }
    }

    /// An absent branch contributes `Nil` to the join.
    fn visit_branch(&mut self, branch: &mut Option<Box<Node>>) -> Result<Type, InferError> {
        match branch {
            Some(node) => {
                self.visit(node)?;
                Ok(node.ty_or_nil())
            }
            None => Ok(Type::Nil),
        }
    }

    // ── Calls and specialization ──────────────────────────────────────

    fn visit_call(
        &mut self,
        call: &mut Call,
        location: Location,
        name_location: Option<Location>,
    ) -> Result<Type, InferError> {
        let receiver_ty = match &mut call.obj {
            Some(obj) => {
                self.visit(obj)?;
                Some(obj.ty_or_nil())
            }
            None => None,
        };

        let site = CallSite {
            name: call.name.clone(),
            has_parens: call.has_parens,
            location,
            name_location,
        };

        // Name lookup and the arity check come before argument
        // inference: a call that fails either reports that failure,
        // not whatever a bad argument would have reported.
        call.target_defs.clear();
        match receiver_ty {
            // A union receiver dispatches once per member; the call's
            // type is the union of the member results.
            Some(Type::Union(members)) => {
                let mut untyped = Vec::with_capacity(members.len());
                for member in &members {
                    untyped.push(self.lookup_and_check(&site, Some(member), call.args.len())?);
                }
                let arg_types = self.visit_args(&mut call.args)?;
                let mut result_types = Vec::with_capacity(members.len());
                for (member, untyped) in members.iter().zip(untyped) {
                    let instance = self.specialize(&site, untyped, Some(member), &arg_types)?;
                    result_types.push(instance.body_type());
                    call.target_defs.push(instance);
                }
                Ok(Type::union(result_types))
            }
            receiver => {
                let untyped =
                    self.lookup_and_check(&site, receiver.as_ref(), call.args.len())?;
                let arg_types = self.visit_args(&mut call.args)?;
                let instance = self.specialize(&site, untyped, receiver.as_ref(), &arg_types)?;
                let ty = instance.body_type();
                call.target_defs.push(instance);
                Ok(ty)
            }
        }
    }

    fn visit_args(&mut self, args: &mut [Node]) -> Result<Vec<Type>, InferError> {
        for arg in args.iter_mut() {
            self.visit(arg)?;
        }
        Ok(args.iter().map(Node::ty_or_nil).collect())
    }

    /// Resolve the name in the receiver's table and check the supplied
    /// argument count against the declared parameter count.
    fn lookup_and_check(
        &self,
        site: &CallSite,
        receiver: Option<&Type>,
        arg_count: usize,
    ) -> Result<Rc<RefCell<Def>>, InferError> {
        let untyped = self.lookup_method(site, receiver)?;
        let expected = untyped.borrow().params.len();
        if arg_count != expected {
            return Err(self.error(
                InferErrorKind::WrongNumberOfArguments {
                    name: site.name.clone(),
                    found: arg_count,
                    expected,
                },
                site.location,
                site.name_location,
                site.name.chars().count(),
            ));
        }
        Ok(untyped)
    }

    /// Specialize a resolved definition for one (receiver,
    /// argument-types) combination, reusing the cache when possible.
    fn specialize(
        &mut self,
        site: &CallSite,
        untyped: Rc<RefCell<Def>>,
        receiver: Option<&Type>,
        arg_types: &[Type],
    ) -> Result<Rc<Def>, InferError> {
        if let Some(instance) = untyped.borrow().lookup_instance(arg_types) {
            return Ok(instance);
        }

        let mut instance = untyped.borrow().instantiate();
        instance.owner = receiver.cloned();

        // Record the call line on the caller's frame for back-traces,
        // then open the specialization's own frame.
        if let Some(frame) = self.scopes.last_mut() {
            frame.line = Some(site.location.line);
        }
        self.scopes.push(Frame {
            vars: FxHashMap::default(),
            def_name: Some(instance.name.clone()),
            owner: instance.owner.clone(),
            line: None,
        });
        for (param, arg_ty) in instance.params.iter_mut().zip(arg_types.iter()) {
            param.ty = Some(arg_ty.clone());
            self.define_var(param.name.clone(), arg_ty.clone());
        }
        let body_result = match instance.body.as_deref_mut() {
            Some(body) => self.visit(body),
            None => Ok(()),
        };
        self.scopes.pop();
        body_result?;

        // Cached only after the body inferred cleanly, keyed by the
        // argument-type tuple.
        let instance = Rc::new(instance);
        untyped
            .borrow_mut()
            .add_instance(arg_types.to_vec(), Rc::clone(&instance));
        Ok(instance)
    }

    fn lookup_method(
        &self,
        site: &CallSite,
        receiver: Option<&Type>,
    ) -> Result<Rc<RefCell<Def>>, InferError> {
        let table = match receiver {
            Some(ty) => ty
                .lookup_name()
                .and_then(|name| self.program.classes.get(name)),
            None => Some(&self.program.defs),
        };
        match table.and_then(|table| table.get(&site.name)) {
            Some(def) => Ok(Rc::clone(def)),
            None => {
                // A bare name with no parentheses and no receiver reads
                // as a variable miss, not a method miss.
                let kind = if receiver.is_some() || site.has_parens {
                    InferErrorKind::UndefinedMethod {
                        name: site.name.clone(),
                        receiver: receiver.map(|ty| ty.to_string()),
                    }
                } else {
                    InferErrorKind::UndefinedLocalVariableOrMethod {
                        name: site.name.clone(),
                    }
                };
                Err(self.error(
                    kind,
                    site.location,
                    site.name_location,
                    site.name.chars().count(),
                ))
            }
        }
    }

    // ── Names ─────────────────────────────────────────────────────────

    /// Constant resolution order: already-typed constants, untyped
    /// constant initializers (inferred on first reference, then
    /// cached), then class names.
    fn resolve_ident(&mut self, names: &[String], location: Location) -> Result<Type, InferError> {
        let name = names.join("::");
        if let Some(ty) = self.program.const_types.get(&name) {
            return Ok(ty.clone());
        }
        if let Some(mut initializer) = self.program.consts.get(&name).cloned() {
            self.visit(&mut initializer)?;
            let ty = initializer.ty_or_nil();
            self.program.const_types.insert(name, ty.clone());
            return Ok(ty);
        }
        if self.program.classes.contains_key(&name) {
            return Ok(Type::Class(name));
        }
        Err(self.error(
            InferErrorKind::UninitializedConstant { name: name.clone() },
            location,
            None,
            name.chars().count(),
        ))
    }

    fn define_var(&mut self, name: String, ty: Type) {
        if let Some(frame) = self.scopes.last_mut() {
            frame.vars.insert(name, ty);
        }
    }

    /// Scopes do not nest for variable lookup: a method body sees only
    /// its own frame.
    fn lookup_var(&self, name: &str) -> Option<Type> {
        self.scopes
            .last()
            .and_then(|frame| frame.vars.get(name).cloned())
    }

    // ── Diagnostics ───────────────────────────────────────────────────

    /// Capture the scope back-trace, innermost frame first. A frame
    /// that never dispatched a call reports the error's own line.
    fn error(
        &self,
        kind: InferErrorKind,
        location: Location,
        name_location: Option<Location>,
        underline_length: usize,
    ) -> InferError {
        let frames = self
            .scopes
            .iter()
            .rev()
            .map(|frame| TraceFrame {
                line: frame.line.unwrap_or(location.line),
                context: frame.def_name.clone(),
            })
            .collect();
        let context = self
            .scopes
            .last()
            .and_then(|frame| frame.def_name.clone());
        InferError {
            kind,
            location,
            name_location,
            underline_length: underline_length.max(1),
            context,
            frames,
        }
    }
}
