//! Lowering of statements and expressions into the graph.
//!
//! One [`Emitter`] compiles one function definition. Nested definitions are
//! emitted into closure blocks of the same graph.

mod assign;
mod closure;
mod control;
mod env;
mod expr;
mod index;
mod stmt;

use crate::builder::GraphBuilder;
use crate::builtins::BuiltinEntry;
use crate::config::FrontendConfig;
use crate::resolver::{Resolved, Resolver};
use crate::schema::{check_builtin, FunctionSchema};
use crate::scope::ScopeChain;
use crate::sugared::{Callable, SugaredValue};
use crate::type_parser::TypeParser;
use eyre::eyre;
use sir_core::ast::{Def, Expr};
use sir_core::ir::{Attr, BlockId, Builtin, Graph, NodeId, Op, ValueId, ValueOrigin};
use sir_core::ty::ClassRef;
use sir_core::{bail, Result, Span, Ty};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum LoopKind {
    Loop,
    /// Body emitted once per element of a tuple.
    Unrolled,
}

/// Per function body: its return types and enclosing loops.
#[derive(Debug, Clone)]
pub(crate) struct DefContext {
    pub name: String,
    pub declared_ret: Option<Ty>,
    pub merged_ret: Option<Ty>,
    pub loops: Vec<LoopKind>,
}

impl DefContext {
    fn new(name: &str, declared_ret: Option<Ty>) -> Self {
        Self {
            name: name.to_string(),
            merged_ret: declared_ret.clone(),
            declared_ret,
            loops: Vec::new(),
        }
    }
}

/// Names that end up on values as debug names: not compiler temporaries
/// (`$…`) and not placeholders like `_1`.
pub(crate) fn meaningful_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('$') {
        return false;
    }
    match name.strip_prefix('_') {
        Some(rest) => !rest.chars().all(|c| c.is_ascii_digit()),
        None => true,
    }
}

pub struct Emitter<'a> {
    pub(crate) b: GraphBuilder,
    pub(crate) scopes: ScopeChain,
    defs: Vec<DefContext>,
    closure_schemas: BTreeMap<ValueId, FunctionSchema>,
    resolver: &'a dyn Resolver,
    config: &'a FrontendConfig,
}

impl<'a> Emitter<'a> {
    pub fn new(resolver: &'a dyn Resolver, config: &'a FrontendConfig) -> Self {
        Self {
            b: GraphBuilder::new(),
            scopes: ScopeChain::new(),
            defs: Vec::new(),
            closure_schemas: BTreeMap::new(),
            resolver,
            config,
        }
    }

    /// Emit `def` as the whole graph: its parameters become graph inputs and
    /// its return value the graph output.
    pub fn emit_function(mut self, def: &Def) -> Result<(FunctionSchema, Graph)> {
        let root = self.b.graph().root();
        let schema = self.emit_def_body(def, root, None)?;
        Ok((schema, self.b.finish()))
    }

    pub(crate) fn emit_def_body(
        &mut self,
        def: &Def,
        block: BlockId,
        closure: Option<NodeId>,
    ) -> Result<FunctionSchema> {
        tracing::debug!(function = %def.name, "emitting function body");
        let declared_ret = def
            .ret_ty
            .as_ref()
            .map(|ty| self.parse_type(ty))
            .transpose()?;
        self.scopes.push(block, true, closure);
        self.defs.push(DefContext::new(def.name.as_str(), declared_ret));
        let prev = self.b.enter_block(block);

        let result = self.emit_def_contents(def, block);

        self.b.set_insert_point(prev);
        self.defs.pop();
        self.scopes.pop();
        result
    }

    fn emit_def_contents(&mut self, def: &Def, block: BlockId) -> Result<FunctionSchema> {
        let mut params = Vec::with_capacity(def.params.len());
        for param in &def.params {
            let ty = match &param.ty {
                Some(ty) => self.parse_type(ty)?,
                None => self.config.default_param_ty.clone(),
            };
            let value = self.b.graph_mut().add_block_param(block, ty.clone());
            self.bind(
                param.name.as_str(),
                SugaredValue::Plain(value),
                None,
                param.name.span,
            )?;
            params.push((param.name.name.clone(), ty));
        }

        self.emit_statements(&def.body)?;

        let output = self.emit_def_output(def)?;
        self.b.graph_mut().register_output(block, output);
        let ret = self.ty(output);
        Ok(FunctionSchema::new(def.name.as_str(), params, ret))
    }

    /// The value returned along every path, or `None` if nothing returns.
    fn emit_def_output(&mut self, def: &Def) -> Result<ValueId> {
        let ctx = self.def_ctx()?.clone();
        let returned = self
            .scopes
            .current()
            .map(|frame| frame.defines("$return"))
            .unwrap_or(false);
        if returned {
            let value = self.lookup("$return", def.span)?.resolve_to_plain(def.span)?;
            return match &ctx.declared_ret {
                Some(declared) => self.coerce(value, declared, def.span, "return value"),
                None => Ok(value),
            };
        }
        if self.scopes.deferred_in_def("$return").is_some() {
            bail!(
                Name,
                def.span,
                "function '{}' does not return along all paths",
                ctx.name
            );
        }
        if let Some(declared) = &ctx.declared_ret {
            if !Ty::None.is_subtype_of(declared) {
                bail!(
                    Type,
                    def.span,
                    "function '{}' was annotated as returning {} but does not return a value",
                    ctx.name,
                    declared
                );
            }
            return Ok(self.b.none(declared.clone(), def.span));
        }
        Ok(self.b.none(Ty::None, def.span))
    }

    pub(crate) fn def_ctx(&mut self) -> Result<&mut DefContext> {
        Ok(self
            .defs
            .last_mut()
            .ok_or_else(|| eyre!("statement emitted outside of a function body"))?)
    }

    pub(crate) fn ty(&self, value: ValueId) -> Ty {
        self.b.ty(value).clone()
    }

    pub(crate) fn parse_type(&self, expr: &Expr) -> Result<Ty> {
        TypeParser::new(self.resolver).parse(expr)
    }

    /// Convert `value` towards `target` using the implicit conversions:
    /// `int` to `float`, scalars to tensors, and into the payload of an
    /// optional. Returns `value` unchanged when no conversion applies.
    pub(crate) fn try_convert(&mut self, value: ValueId, target: &Ty, span: Span) -> ValueId {
        let ty = self.ty(value);
        if ty.is_subtype_of(target) {
            return value;
        }
        if let Some(inner) = target.as_optional() {
            let inner = inner.clone();
            return self.try_convert(value, &inner, span);
        }
        match (&ty, target) {
            (Ty::Int, Ty::Float) => self.b.insert_builtin(Builtin::Float, vec![value], Ty::Float, span),
            (Ty::Int | Ty::Float | Ty::Number | Ty::Bool, target) if target.is_tensor() => {
                self.b
                    .insert_builtin(Builtin::NumToTensor, vec![value], Ty::Tensor, span)
            }
            _ => value,
        }
    }

    /// Like [`Emitter::try_convert`], but `None` when the result still does
    /// not have the target type.
    pub(crate) fn convert_to(&mut self, value: ValueId, target: &Ty, span: Span) -> Option<ValueId> {
        let converted = self.try_convert(value, target, span);
        self.b.ty(converted).is_subtype_of(target).then_some(converted)
    }

    pub(crate) fn coerce(&mut self, value: ValueId, target: &Ty, span: Span, what: &str) -> Result<ValueId> {
        match self.convert_to(value, target, span) {
            Some(converted) => Ok(converted),
            None => bail!(
                Type,
                span,
                "{} expected a value of type {} but found {}",
                what,
                target,
                self.b.ty(value)
            ),
        }
    }

    /// Insert a checked `ops::` primitive.
    pub(crate) fn builtin(&mut self, op: Builtin, inputs: Vec<ValueId>, span: Span) -> Result<ValueId> {
        let tys: Vec<Ty> = inputs.iter().map(|value| self.ty(*value)).collect();
        let ret = check_builtin(op, &tys, span)?;
        Ok(self.b.insert_builtin(op, inputs, ret, span))
    }

    pub(crate) fn call_method(
        &mut self,
        receiver: ValueId,
        class: &ClassRef,
        name: &str,
        args: Vec<ValueId>,
        span: Span,
    ) -> Result<ValueId> {
        let Some(sig) = class.method(name).cloned() else {
            bail!(Type, span, "'{}' object has no method '{}'", class.name, name);
        };
        if args.len() != sig.params.len() {
            bail!(
                SyntaxShape,
                span,
                "{}.{}() expected {} argument(s) but received {}",
                class.name,
                name,
                sig.params.len(),
                args.len()
            );
        }
        let mut inputs = vec![receiver];
        for (index, (arg, ty)) in args.into_iter().zip(&sig.params).enumerate() {
            inputs.push(self.coerce(arg, ty, span, &format!("argument {} of {}", index, name))?);
        }
        let node = self.b.insert(Op::CallMethod, inputs, vec![sig.ret.clone()], span);
        self.b.set_attr(node, "name", Attr::Str(name.to_string()));
        Ok(self.b.graph().output(node))
    }

    pub(crate) fn construct_object(&mut self, class: &ClassRef, args: Vec<ValueId>, span: Span) -> Result<ValueId> {
        let node = self
            .b
            .insert(Op::CreateObject, vec![], vec![Ty::Class(class.clone())], span);
        self.b
            .set_attr(node, "class", Attr::Str(class.name.clone()));
        let object = self.b.graph().output(node);
        if class.method("__init__").is_some() {
            self.call_method(object, class, "__init__", args, span)?;
        } else if !args.is_empty() {
            bail!(SyntaxShape, span, "{}() takes no arguments", class.name);
        }
        Ok(object)
    }

    pub(crate) fn tuple(&mut self, elems: Vec<ValueId>, span: Span) -> ValueId {
        let ty = Ty::tuple(elems.iter().map(|value| self.ty(*value)).collect());
        self.b.insert_value(Op::TupleConstruct, elems, ty, span)
    }

    pub(crate) fn sugar_resolved(&mut self, resolved: &Resolved, span: Span) -> SugaredValue {
        match resolved {
            Resolved::Function(schema) => SugaredValue::Callable(Callable::Function(schema.clone())),
            Resolved::Class(class) => SugaredValue::ClassConstructor(class.clone()),
            Resolved::Module(module) => SugaredValue::Module(module.clone()),
            Resolved::Constant(literal) => SugaredValue::Plain(self.b.literal(literal, span)),
        }
    }

    pub(crate) fn sugar_builtin(entry: &BuiltinEntry) -> SugaredValue {
        match entry {
            BuiltinEntry::Fork => SugaredValue::Fork,
            entry => SugaredValue::Callable(Callable::Builtin(entry.clone())),
        }
    }

    /// Built-in entry named by `callee`, unless a local binding shadows it.
    pub(crate) fn builtin_callee(&self, callee: &Expr) -> Option<&'a BuiltinEntry> {
        let name = callee.as_var()?;
        if self.scopes.find(name).is_some() {
            return None;
        }
        self.config.builtins.get(name)
    }

    /// Give `value` the debug name `name` if it was produced in the current
    /// block and has no name yet.
    pub(crate) fn name_value(&mut self, value: ValueId, name: &str) {
        if !meaningful_name(name) {
            return;
        }
        let current = self.b.current_block();
        let graph = self.b.graph_mut();
        let local = match graph.value(value).origin {
            ValueOrigin::Node { node, .. } => graph.node(node).owner == Some(current),
            ValueOrigin::Param { block, .. } => block == current,
        };
        if local && graph.value(value).debug_name.is_none() {
            graph.value_mut(value).debug_name = Some(name.to_string());
        }
    }
}
