//! The normalizer: a single recursive rewrite that eliminates
//! syntactic sugar before type inference runs.
//!
//! Rules, briefly:
//! - sequences collapse, stopping at the first `return`/`break`/`next`
//! - `&&` / `||` become `if`s, introducing a fresh temporary unless the
//!   left side is safe to re-reference
//! - `unless` swaps its branches into an `if`
//! - `case` becomes an `if`/`elsif` chain over case-equality tests,
//!   hoisting the subject into a temporary so it is evaluated once
//! - defs with default arguments expand into one def per arity
//! - string interpolation becomes a `StringBuilder` call chain
//! - range literals become `Range.new(from, to, exclusive)`
//! - regex literals are cached as named constants, one per pattern
//! - `require` splices in the loaded unit, once per path
//!
//! Unmatched kinds pass through with their children transformed.

use garnet_ast::{Call, Def, Node, NodeKind, Param, When};
use garnet_common::Location;

use crate::error::{NormalizeError, NormalizeErrorKind};
use crate::program::Program;

/// Supplies the parsed AST for a `require`d unit.
///
/// File I/O and parsing are the caller's responsibility; the normalizer
/// guarantees each distinct path is loaded at most once per program.
pub trait RequireLoader {
    /// Produce the AST for `path`, or `None` when the unit contributes
    /// nothing.
    fn load(
        &mut self,
        path: &str,
        requiring: Option<&str>,
    ) -> Result<Option<Node>, NormalizeError>;
}

impl<F> RequireLoader for F
where
    F: FnMut(&str, Option<&str>) -> Result<Option<Node>, NormalizeError>,
{
    fn load(
        &mut self,
        path: &str,
        requiring: Option<&str>,
    ) -> Result<Option<Node>, NormalizeError> {
        self(path, requiring)
    }
}

/// Loader for programs that do not use `require`.
pub struct NoRequires;

impl RequireLoader for NoRequires {
    fn load(
        &mut self,
        path: &str,
        _requiring: Option<&str>,
    ) -> Result<Option<Node>, NormalizeError> {
        Err(NormalizeError::new(
            NormalizeErrorKind::RequireFailed {
                path: path.to_string(),
                reason: "no require loader configured".to_string(),
            },
            None,
        ))
    }
}

pub struct Normalizer<'a> {
    program: &'a mut Program,
    loader: &'a mut dyn RequireLoader,
    /// File the unit being normalized came from; handed to the loader
    /// for relative resolution.
    file: Option<String>,
}

impl<'a> Normalizer<'a> {
    pub fn new(program: &'a mut Program, loader: &'a mut dyn RequireLoader) -> Self {
        Normalizer {
            program,
            loader,
            file: None,
        }
    }

    pub fn with_file(mut self, file: impl Into<String>) -> Self {
        self.file = Some(file.into());
        self
    }

    /// Normalize a tree. `None` means the whole tree normalized away
    /// (an empty sequence, or a `require` of an already-loaded unit).
    pub fn normalize(&mut self, node: Node) -> Result<Option<Node>, NormalizeError> {
        self.transform(node)
    }

    fn transform(&mut self, node: Node) -> Result<Option<Node>, NormalizeError> {
        let Node {
            kind,
            location,
            name_location,
            ..
        } = node;
        let node = match kind {
            NodeKind::Expressions(exps) => return self.transform_expressions(exps, location),
            NodeKind::Require { path } => return self.transform_require(path),
            NodeKind::Case { cond, whens, els } => {
                return self.transform_case(*cond, whens, els, location)
            }
            NodeKind::And { left, right } => self.transform_and(*left, *right, location)?,
            NodeKind::Or { left, right } => self.transform_or(*left, *right, location)?,
            NodeKind::Unless { cond, then, els } => {
                let cond = self.transform_required(*cond)?;
                let then = self.transform_opt(then)?;
                let els = self.transform_opt(els)?;
                Node::if_expr(cond, els, then).at(location)
            }
            NodeKind::Def(def) => self.transform_def(def, location, name_location)?,
            NodeKind::StringInterpolation(pieces) => {
                self.transform_string_interpolation(pieces, location)?
            }
            NodeKind::RangeLiteral {
                from,
                to,
                exclusive,
            } => {
                let from = self.transform_required(*from)?;
                let to = self.transform_required(*to)?;
                Node::call(
                    Some(Node::const_ref("Range").at(location)),
                    "new",
                    vec![from, to, Node::bool_lit(exclusive).at(location)],
                )
                .at(location)
            }
            NodeKind::RegexpLiteral(pattern) => self.transform_regexp_literal(pattern, location),
            NodeKind::Call(call) => {
                let Call {
                    obj,
                    name,
                    args,
                    block,
                    has_parens,
                    target_defs,
                } = call;
                let obj = match obj {
                    Some(obj) => Some(Box::new(self.transform_required(*obj)?)),
                    None => None,
                };
                let mut new_args = Vec::with_capacity(args.len());
                for arg in args {
                    new_args.push(self.transform_required(arg)?);
                }
                let block = self.transform_opt(block)?.map(Box::new);
                rebuild(
                    NodeKind::Call(Call {
                        obj,
                        name,
                        args: new_args,
                        block,
                        has_parens,
                        target_defs,
                    }),
                    location,
                    name_location,
                )
            }
            NodeKind::Assign { target, value } => {
                let value = self.transform_required(*value)?;
                rebuild(
                    NodeKind::Assign {
                        target,
                        value: Box::new(value),
                    },
                    location,
                    name_location,
                )
            }
            NodeKind::If { cond, then, els } => {
                let cond = self.transform_required(*cond)?;
                let then = self.transform_opt(then)?;
                let els = self.transform_opt(els)?;
                rebuild(
                    NodeKind::If {
                        cond: Box::new(cond),
                        then: then.map(Box::new),
                        els: els.map(Box::new),
                    },
                    location,
                    name_location,
                )
            }
            NodeKind::While { cond, body } => {
                let cond = self.transform_required(*cond)?;
                let body = self.transform_opt(body)?.map(Box::new);
                rebuild(
                    NodeKind::While {
                        cond: Box::new(cond),
                        body,
                    },
                    location,
                    name_location,
                )
            }
            NodeKind::ClassDef { name, body } => {
                let body = self.transform_opt(body)?.map(Box::new);
                rebuild(NodeKind::ClassDef { name, body }, location, name_location)
            }
            NodeKind::ModuleDef { name, body } => {
                let body = self.transform_opt(body)?.map(Box::new);
                rebuild(NodeKind::ModuleDef { name, body }, location, name_location)
            }
            NodeKind::Block { params, body } => {
                let body = self.transform_opt(body)?.map(Box::new);
                rebuild(NodeKind::Block { params, body }, location, name_location)
            }
            NodeKind::SimpleOr { left, right } => {
                let left = self.transform_required(*left)?;
                let right = self.transform_required(*right)?;
                rebuild(
                    NodeKind::SimpleOr {
                        left: Box::new(left),
                        right: Box::new(right),
                    },
                    location,
                    name_location,
                )
            }
            NodeKind::IsA { obj, type_name } => {
                let obj = self.transform_required(*obj)?;
                rebuild(
                    NodeKind::IsA {
                        obj: Box::new(obj),
                        type_name,
                    },
                    location,
                    name_location,
                )
            }
            NodeKind::Return(exps) => rebuild(
                NodeKind::Return(self.transform_all(exps)?),
                location,
                name_location,
            ),
            NodeKind::Break(exps) => rebuild(
                NodeKind::Break(self.transform_all(exps)?),
                location,
                name_location,
            ),
            NodeKind::Next(exps) => rebuild(
                NodeKind::Next(self.transform_all(exps)?),
                location,
                name_location,
            ),
            NodeKind::Yield(exps) => rebuild(
                NodeKind::Yield(self.transform_all(exps)?),
                location,
                name_location,
            ),
            kind @ (NodeKind::BoolLiteral(_)
            | NodeKind::IntLiteral(_)
            | NodeKind::FloatLiteral(_)
            | NodeKind::CharLiteral(_)
            | NodeKind::StringLiteral(_)
            | NodeKind::SymbolLiteral(_)
            | NodeKind::Var(_)
            | NodeKind::InstanceVar(_)
            | NodeKind::Ident { .. }
            | NodeKind::Primitive(_)) => rebuild(kind, location, name_location),
        };
        Ok(Some(node))
    }

    /// Transform a child that must still be there afterwards.
    fn transform_required(&mut self, node: Node) -> Result<Node, NormalizeError> {
        let location = node.location;
        self.transform(node)?.ok_or_else(|| {
            NormalizeError::new(NormalizeErrorKind::VanishedExpression, Some(location))
        })
    }

    fn transform_opt(
        &mut self,
        node: Option<Box<Node>>,
    ) -> Result<Option<Node>, NormalizeError> {
        match node {
            Some(node) => self.transform(*node),
            None => Ok(None),
        }
    }

    fn transform_all(&mut self, nodes: Vec<Node>) -> Result<Vec<Node>, NormalizeError> {
        let mut out = Vec::with_capacity(nodes.len());
        for node in nodes {
            out.push(self.transform_required(node)?);
        }
        Ok(out)
    }

    /// Collapse a sequence. Anything after a `return`/`break`/`next` is
    /// dead and dropped; zero survivors normalize to nothing and a
    /// single survivor is unwrapped.
    fn transform_expressions(
        &mut self,
        exps: Vec<Node>,
        location: Location,
    ) -> Result<Option<Node>, NormalizeError> {
        let mut out = Vec::new();
        for exp in exps {
            let exits = matches!(
                exp.kind,
                NodeKind::Return(_) | NodeKind::Break(_) | NodeKind::Next(_)
            );
            if let Some(transformed) = self.transform(exp)? {
                out.push(transformed);
            }
            if exits {
                break;
            }
        }
        Ok(match out.len() {
            0 => None,
            1 => Some(out.remove(0)),
            _ => Some(Node::expressions(out).at(location)),
        })
    }

    /// `a && b` => `if (cond) then b else cond`, where `cond` re-reads
    /// `a` directly when that is safe and a fresh temporary otherwise.
    fn transform_and(
        &mut self,
        left: Node,
        right: Node,
        location: Location,
    ) -> Result<Node, NormalizeError> {
        let left = self.transform_required(left)?;
        let right = self.transform_required(right)?;
        Ok(if is_safe_to_reread(&left) {
            Node::if_expr(left.clone(), Some(right), Some(left)).at(location)
        } else {
            let temp = self.program.new_temp_var().at(location);
            Node::if_expr(
                Node::assign(temp.clone(), left).at(location),
                Some(right),
                Some(temp),
            )
            .at(location)
        })
    }

    /// `a || b` => `if (cond) then cond else b`; a bare variable never
    /// needs a temporary.
    fn transform_or(
        &mut self,
        left: Node,
        right: Node,
        location: Location,
    ) -> Result<Node, NormalizeError> {
        let left = self.transform_required(left)?;
        let right = self.transform_required(right)?;
        Ok(if matches!(left.kind, NodeKind::Var(_)) {
            Node::if_expr(left.clone(), Some(left), Some(right)).at(location)
        } else {
            let temp = self.program.new_temp_var().at(location);
            Node::if_expr(
                Node::assign(temp.clone(), left).at(location),
                Some(temp),
                Some(right),
            )
            .at(location)
        })
    }

    /// Desugar `case` into an `if`/`elsif` chain of case-equality
    /// tests. The subject is hoisted into a temporary unless it is
    /// already a bare variable, so it is evaluated exactly once.
    fn transform_case(
        &mut self,
        cond: Node,
        whens: Vec<When>,
        els: Option<Box<Node>>,
        location: Location,
    ) -> Result<Option<Node>, NormalizeError> {
        let cond = self.transform_required(cond)?;
        let mut transformed_whens = Vec::with_capacity(whens.len());
        for when in whens {
            let conds = self.transform_all(when.conds)?;
            let body = match when.body {
                Some(body) => self.transform(body)?,
                None => None,
            };
            transformed_whens.push((conds, body));
        }
        let els = self.transform_opt(els)?;

        let (subject, hoisted) = if matches!(
            cond.kind,
            NodeKind::Var(_) | NodeKind::InstanceVar(_)
        ) {
            (cond, None)
        } else {
            let temp = self.program.new_temp_var().at(location);
            (temp.clone(), Some(Node::assign(temp, cond).at(location)))
        };

        let mut chain = els;
        for (conds, body) in transformed_whens.into_iter().rev() {
            // Multiple comma-separated conditions join with a
            // non-short-circuit or.
            let mut comparison: Option<Node> = None;
            for cond in conds {
                let test =
                    Node::call(Some(cond), "===", vec![subject.clone()]).at(location);
                comparison = Some(match comparison {
                    Some(previous) => Node::new(NodeKind::SimpleOr {
                        left: Box::new(previous),
                        right: Box::new(test),
                    })
                    .at(location),
                    None => test,
                });
            }
            if let Some(comparison) = comparison {
                chain = Some(Node::if_expr(comparison, body, chain).at(location));
            }
        }

        Ok(match (hoisted, chain) {
            (Some(assign), Some(chain)) => {
                Some(Node::expressions(vec![assign, chain]).at(location))
            }
            (Some(assign), None) => Some(assign),
            (None, chain) => chain,
        })
    }

    /// A def with N defaulted trailing parameters expands into N+1
    /// defs, one per callable arity, each pre-binding the omitted
    /// parameters at the top of its body.
    fn transform_def(
        &mut self,
        def: Def,
        location: Location,
        name_location: Option<Location>,
    ) -> Result<Node, NormalizeError> {
        if def.has_default_params() {
            let mut defs = Vec::new();
            for expanded in expand_default_params(def) {
                let node = Node {
                    kind: NodeKind::Def(expanded),
                    location,
                    name_location,
                    ty: None,
                };
                if let Some(node) = self.transform(node)? {
                    defs.push(node);
                }
            }
            Ok(Node::expressions(defs).at(location))
        } else {
            let Def {
                name,
                params,
                body,
                owner,
                instances,
            } = def;
            let body = match body {
                Some(body) => self.transform(*body)?.map(Box::new),
                None => None,
            };
            Ok(Node {
                kind: NodeKind::Def(Def {
                    name,
                    params,
                    body,
                    owner,
                    instances,
                }),
                location,
                name_location,
                ty: None,
            })
        }
    }

    /// `"a#{b}c"` => `StringBuilder.new << "a" << b << "c" .to_s`,
    /// appending every piece in source order.
    fn transform_string_interpolation(
        &mut self,
        pieces: Vec<Node>,
        location: Location,
    ) -> Result<Node, NormalizeError> {
        let mut builder = Node::call(
            Some(Node::const_ref("StringBuilder").at(location)),
            "new",
            vec![],
        )
        .at(location);
        for piece in pieces {
            let piece = self.transform_required(piece)?;
            builder = Node::call(Some(builder), "<<", vec![piece]).at(location);
        }
        Ok(Node::call(Some(builder), "to_s", vec![]).at(location))
    }

    /// Each distinct regex literal is registered once as a named
    /// constant; repeated occurrences reference the same constant.
    fn transform_regexp_literal(&mut self, pattern: String, location: Location) -> Node {
        let const_name = format!("#Regexp_{}", pattern);
        if !self.program.consts.contains_key(&const_name) {
            let constructor = Node::call(
                Some(Node::const_ref("Regexp").at(location)),
                "new",
                vec![Node::string(pattern).at(location)],
            )
            .at(location);
            self.program.consts.insert(const_name.clone(), constructor);
        }
        Node::const_ref(const_name).at(location)
    }

    /// Splice in a required unit, recursively normalized. Requiring an
    /// already-loaded path yields nothing.
    fn transform_require(&mut self, path: String) -> Result<Option<Node>, NormalizeError> {
        if !self.program.required.insert(path.clone()) {
            return Ok(None);
        }
        match self.loader.load(&path, self.file.as_deref())? {
            Some(ast) => self.transform(ast),
            None => Ok(None),
        }
    }
}

/// Rebuild a node around its transformed children, keeping both source
/// locations.
fn rebuild(kind: NodeKind, location: Location, name_location: Option<Location>) -> Node {
    Node {
        kind,
        location,
        name_location,
        ty: None,
    }
}

/// Safe to evaluate again: a bare variable, or a type test on one.
fn is_safe_to_reread(node: &Node) -> bool {
    match &node.kind {
        NodeKind::Var(_) => true,
        NodeKind::IsA { obj, .. } => matches!(obj.kind, NodeKind::Var(_)),
        _ => false,
    }
}

fn expand_default_params(def: Def) -> Vec<Def> {
    let required = def
        .params
        .iter()
        .take_while(|p| p.default.is_none())
        .count();
    let total = def.params.len();
    let mut out = Vec::with_capacity(total - required + 1);
    for supplied in required..=total {
        let params = def.params[..supplied]
            .iter()
            .map(|p| Param::new(p.name.clone()))
            .collect();
        let mut exps: Vec<Node> = def.params[supplied..]
            .iter()
            .filter_map(|p| {
                p.default
                    .as_ref()
                    .map(|default| Node::assign(Node::var(p.name.clone()), (**default).clone()))
            })
            .collect();
        let body = if exps.is_empty() {
            def.body.clone().map(|b| *b)
        } else {
            if let Some(body) = def.body.clone() {
                exps.push(*body);
            }
            Some(Node::expressions(exps))
        };
        out.push(Def::new(def.name.clone(), params, body));
    }
    out
}
