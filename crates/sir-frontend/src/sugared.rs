//! Values produced during emission that are not (yet) graph values: builtin
//! functions, classes, iterables, closures and modules.

use crate::builtins::{BuiltinEntry, IterableKind};
use crate::emit::Emitter;
use crate::resolver::ModuleDef;
use crate::schema::FunctionSchema;
use eyre::eyre;
use sir_core::ir::{Attr, Builtin, Op, ValueId};
use sir_core::ty::ClassRef;
use sir_core::{bail, Result, Span, Ty};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq)]
pub enum Callable {
    Builtin(BuiltinEntry),
    /// A host function known by its schema.
    Function(Arc<FunctionSchema>),
    /// A method of a user class, bound to its receiver.
    Method {
        receiver: ValueId,
        class: ClassRef,
        name: String,
    },
    /// A library primitive called with method syntax, e.g. `xs.append(x)`.
    BuiltinMethod { receiver: ValueId, op: Builtin },
}

#[derive(Debug, Clone, PartialEq)]
pub enum IterableSource {
    Range {
        start: Option<ValueId>,
        end: ValueId,
        step: Option<ValueId>,
    },
    Zip(Vec<SugaredValue>),
    Enumerate(Box<SugaredValue>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoneStatus {
    Always,
    Never,
    Maybe,
}

#[derive(Debug, Clone, PartialEq)]
pub enum SugaredValue {
    Plain(ValueId),
    Callable(Callable),
    ClassConstructor(ClassRef),
    Iterable(IterableSource),
    /// Output of a `prim::Closure` node.
    Closure(ValueId),
    /// The `fork` builtin.
    Fork,
    Module(Arc<ModuleDef>),
}

fn plain_args(args: &[SugaredValue], span: Span) -> Result<Vec<ValueId>> {
    args.iter().map(|arg| arg.resolve_to_plain(span)).collect()
}

impl SugaredValue {
    pub fn kind(&self) -> &'static str {
        match self {
            SugaredValue::Plain(_) => "value",
            SugaredValue::Callable(Callable::Builtin(_)) => "builtin function",
            SugaredValue::Callable(Callable::Function(_)) => "function",
            SugaredValue::Callable(Callable::Method { .. } | Callable::BuiltinMethod { .. }) => {
                "method"
            }
            SugaredValue::ClassConstructor(_) => "class",
            SugaredValue::Iterable(_) => "iterable",
            SugaredValue::Closure(_) => "closure",
            SugaredValue::Fork => "fork",
            SugaredValue::Module(_) => "module",
        }
    }

    pub fn as_plain(&self) -> Option<ValueId> {
        match self {
            SugaredValue::Plain(value) => Some(*value),
            _ => None,
        }
    }

    pub fn resolve_to_plain(&self, span: Span) -> Result<ValueId> {
        match self {
            SugaredValue::Plain(value) | SugaredValue::Closure(value) => Ok(*value),
            other => bail!(Type, span, "{} cannot be used as a value", other.kind()),
        }
    }

    pub fn call(&self, em: &mut Emitter<'_>, span: Span, args: Vec<SugaredValue>) -> Result<SugaredValue> {
        match self {
            SugaredValue::Callable(callable) => callable.call(em, span, args),
            SugaredValue::ClassConstructor(class) => {
                let args = plain_args(&args, span)?;
                em.construct_object(class, args, span).map(SugaredValue::Plain)
            }
            SugaredValue::Fork => em.emit_fork(span, args),
            SugaredValue::Closure(_) => bail!(
                Unsupported,
                span,
                "closures cannot be called directly; use fork to run them"
            ),
            SugaredValue::Plain(value) => {
                let ty = em.ty(*value);
                match ty.as_class() {
                    Some(class) if class.method("__call__").is_some() => {
                        let args = plain_args(&args, span)?;
                        em.call_method(*value, class, "__call__", args, span)
                            .map(SugaredValue::Plain)
                    }
                    _ => bail!(Type, span, "'{}' object is not callable", ty),
                }
            }
            SugaredValue::Iterable(_) | SugaredValue::Module(_) => {
                bail!(Type, span, "{} is not callable", self.kind())
            }
        }
    }

    pub fn get_attribute(&self, em: &mut Emitter<'_>, span: Span, name: &str) -> Result<SugaredValue> {
        match self {
            SugaredValue::Plain(value) => {
                let ty = em.ty(*value);
                if let Some(class) = ty.as_class() {
                    if let Some(attr_ty) = class.attribute(name) {
                        let node = em.b.insert(
                            Op::GetAttr,
                            vec![*value],
                            vec![attr_ty.clone()],
                            span,
                        );
                        em.b.set_attr(node, "name", Attr::Str(name.to_string()));
                        return Ok(SugaredValue::Plain(em.b.graph().output(node)));
                    }
                    if class.method(name).is_some() {
                        return Ok(SugaredValue::Callable(Callable::Method {
                            receiver: *value,
                            class: class.clone(),
                            name: name.to_string(),
                        }));
                    }
                    bail!(Type, span, "'{}' object has no attribute '{}'", class.name, name);
                }
                match Builtin::from_str(name) {
                    Ok(op) => Ok(SugaredValue::Callable(Callable::BuiltinMethod {
                        receiver: *value,
                        op,
                    })),
                    Err(_) => bail!(Type, span, "'{}' object has no attribute '{}'", ty, name),
                }
            }
            SugaredValue::Module(module) => match module.members.get(name) {
                Some(member) => Ok(em.sugar_resolved(member, span)),
                None => bail!(
                    Name,
                    span,
                    "module '{}' has no attribute '{}'",
                    module.name,
                    name
                ),
            },
            other => bail!(Type, span, "{} has no attribute '{}'", other.kind(), name),
        }
    }

    pub fn set_attribute(&self, em: &mut Emitter<'_>, span: Span, name: &str, value: ValueId) -> Result<()> {
        let Some(object) = self.as_plain() else {
            bail!(Type, span, "cannot set attribute '{}' on a {}", name, self.kind());
        };
        let ty = em.ty(object);
        let Some(class) = ty.as_class() else {
            bail!(Type, span, "cannot set attribute '{}' on a value of type {}", name, ty);
        };
        let Some(attr_ty) = class.attribute(name).cloned() else {
            bail!(Type, span, "'{}' object has no attribute '{}'", class.name, name);
        };
        let value = em.coerce(value, &attr_ty, span, &format!("attribute '{}'", name))?;
        let node = em.b.insert(Op::SetAttr, vec![object, value], vec![], span);
        em.b.set_attr(node, "name", Attr::Str(name.to_string()));
        Ok(())
    }

    /// Element at a dynamic position, as used by loops.
    pub fn get_item(&self, em: &mut Emitter<'_>, span: Span, index: ValueId) -> Result<SugaredValue> {
        match self {
            SugaredValue::Plain(value) => {
                let ty = em.ty(*value);
                let item = match ty {
                    Ty::List(_) | Ty::Str => em.builtin(Builtin::GetItem, vec![*value, index], span)?,
                    ty if ty.is_tensor() => {
                        let dim = em.b.int(0);
                        em.builtin(Builtin::Select, vec![*value, dim, index], span)?
                    }
                    ty => bail!(Type, span, "'{}' object is not iterable", ty),
                };
                Ok(SugaredValue::Plain(item))
            }
            SugaredValue::Iterable(IterableSource::Range { start, step, .. }) => {
                if start.is_none() && step.is_none() {
                    return Ok(SugaredValue::Plain(index));
                }
                let start = start.unwrap_or_else(|| em.b.int(0));
                let step = step.unwrap_or_else(|| em.b.int(1));
                let derived = em.builtin(Builtin::DeriveIndex, vec![index, start, step], span)?;
                Ok(SugaredValue::Plain(derived))
            }
            SugaredValue::Iterable(IterableSource::Zip(items)) => {
                let mut elems = Vec::with_capacity(items.len());
                for item in items {
                    let elem = item.get_item(em, span, index)?;
                    elems.push(elem.resolve_to_plain(span)?);
                }
                Ok(SugaredValue::Plain(em.tuple(elems, span)))
            }
            SugaredValue::Iterable(IterableSource::Enumerate(inner)) => {
                let elem = inner.get_item(em, span, index)?.resolve_to_plain(span)?;
                Ok(SugaredValue::Plain(em.tuple(vec![index, elem], span)))
            }
            other => bail!(Type, span, "{} is not iterable", other.kind()),
        }
    }

    pub fn length(&self, em: &mut Emitter<'_>, span: Span) -> Result<ValueId> {
        match self {
            SugaredValue::Plain(value) => {
                let ty = em.ty(*value);
                match &ty {
                    Ty::Tuple(elems) => Ok(em.b.int(elems.len() as i64)),
                    Ty::Class(class) if class.method("__len__").is_some() => {
                        em.call_method(*value, class, "__len__", vec![], span)
                    }
                    Ty::List(_) | Ty::Str | Ty::Dict(..) => em.builtin(Builtin::Len, vec![*value], span),
                    ty if ty.is_tensor() => em.builtin(Builtin::Len, vec![*value], span),
                    ty => bail!(Type, span, "object of type {} has no len()", ty),
                }
            }
            SugaredValue::Iterable(IterableSource::Range { start, end, step }) => {
                if start.is_none() && step.is_none() {
                    return Ok(*end);
                }
                let start = start.unwrap_or_else(|| em.b.int(0));
                let step = step.unwrap_or_else(|| em.b.int(1));
                em.builtin(Builtin::RangeLength, vec![start, *end, step], span)
            }
            SugaredValue::Iterable(IterableSource::Zip(items)) => {
                let mut shortest: Option<ValueId> = None;
                for item in items {
                    let len = item.length(em, span)?;
                    shortest = Some(match shortest {
                        Some(prev) => em.builtin(Builtin::Min, vec![prev, len], span)?,
                        None => len,
                    });
                }
                match shortest {
                    Some(len) => Ok(len),
                    None => bail!(SyntaxShape, span, "zip expected at least one argument"),
                }
            }
            SugaredValue::Iterable(IterableSource::Enumerate(inner)) => inner.length(em, span),
            other => bail!(Type, span, "{} has no len()", other.kind()),
        }
    }

    /// Element values of a fixed-length value. Lists are unpacked only when
    /// the caller knows how many elements to expect.
    pub fn expand_to_tuple(
        &self,
        em: &mut Emitter<'_>,
        span: Span,
        expected: Option<usize>,
    ) -> Result<Option<Vec<ValueId>>> {
        let Some(value) = self.as_plain() else {
            return Ok(None);
        };
        let ty = em.ty(value);
        match ty {
            Ty::Tuple(elems) => {
                let graph = em.b.graph();
                if let Some(node) = graph.producer(value) {
                    if graph.node(node).op == Op::TupleConstruct {
                        return Ok(Some(graph.node(node).inputs.clone()));
                    }
                }
                let node = em.b.insert(Op::TupleUnpack, vec![value], elems, span);
                Ok(Some(em.b.graph().node(node).outputs.clone()))
            }
            Ty::List(elem) => match expected {
                Some(n) => {
                    let node = em.b.insert(Op::ListUnpack, vec![value], vec![*elem; n], span);
                    Ok(Some(em.b.graph().node(node).outputs.clone()))
                }
                None => Ok(None),
            },
            _ => Ok(None),
        }
    }

    pub fn is_none_constant(&self, em: &Emitter<'_>) -> NoneStatus {
        match self.as_plain().map(|value| em.ty(value)) {
            Some(Ty::None) => NoneStatus::Always,
            Some(Ty::Optional(_)) => NoneStatus::Maybe,
            _ => NoneStatus::Never,
        }
    }
}

impl Callable {
    fn call(&self, em: &mut Emitter<'_>, span: Span, args: Vec<SugaredValue>) -> Result<SugaredValue> {
        match self {
            Callable::Builtin(entry) => call_builtin(entry, em, span, args),
            Callable::Function(schema) => {
                let args = plain_args(&args, span)?;
                if args.len() != schema.params.len() {
                    bail!(
                        SyntaxShape,
                        span,
                        "{}() expected {} argument(s) but received {}",
                        schema.name,
                        schema.params.len(),
                        args.len()
                    );
                }
                let mut inputs = Vec::with_capacity(args.len());
                for (arg, (param, ty)) in args.into_iter().zip(&schema.params) {
                    inputs.push(em.coerce(arg, ty, span, &format!("argument '{}'", param))?);
                }
                let node = em.b.insert(Op::CallFunction, inputs, vec![schema.ret.clone()], span);
                em.b.set_attr(node, "name", Attr::Str(schema.name.clone()));
                Ok(SugaredValue::Plain(em.b.graph().output(node)))
            }
            Callable::Method {
                receiver,
                class,
                name,
            } => {
                let args = plain_args(&args, span)?;
                em.call_method(*receiver, class, name, args, span)
                    .map(SugaredValue::Plain)
            }
            Callable::BuiltinMethod { receiver, op } => {
                let mut inputs = vec![*receiver];
                inputs.extend(plain_args(&args, span)?);
                em.builtin(*op, inputs, span).map(SugaredValue::Plain)
            }
        }
    }
}

fn call_builtin(
    entry: &BuiltinEntry,
    em: &mut Emitter<'_>,
    span: Span,
    args: Vec<SugaredValue>,
) -> Result<SugaredValue> {
    match entry {
        BuiltinEntry::Print => {
            let inputs = plain_args(&args, span)?;
            em.b.insert(Op::Print, inputs, vec![], span);
            Ok(SugaredValue::Plain(em.b.none(Ty::None, span)))
        }
        BuiltinEntry::Cast { target, magic } => {
            let [arg] = plain_args(&args, span)?[..] else {
                bail!(
                    SyntaxShape,
                    span,
                    "{}() expected 1 argument but received {}",
                    target,
                    args.len()
                );
            };
            let ty = em.ty(arg);
            if ty == *target {
                return Ok(SugaredValue::Plain(arg));
            }
            if let Some(class) = ty.as_class() {
                if class.method(magic).is_some() {
                    return em
                        .call_method(arg, class, magic, vec![], span)
                        .map(SugaredValue::Plain);
                }
            }
            let op = match target {
                Ty::Int => Builtin::Int,
                Ty::Float => Builtin::Float,
                Ty::Bool => Builtin::Bool,
                _ => Builtin::Str,
            };
            em.builtin(op, vec![arg], span).map(SugaredValue::Plain)
        }
        BuiltinEntry::Function { op, magic } => {
            let inputs = plain_args(&args, span)?;
            if let (Some(magic), Some(first)) = (magic, inputs.first()) {
                let ty = em.ty(*first);
                if let Some(class) = ty.as_class() {
                    if class.method(magic).is_some() {
                        return em
                            .call_method(*first, class, magic, inputs[1..].to_vec(), span)
                            .map(SugaredValue::Plain);
                    }
                }
            }
            em.builtin(*op, inputs, span).map(SugaredValue::Plain)
        }
        BuiltinEntry::Iterable(kind) => make_iterable(*kind, em, span, args),
        BuiltinEntry::Exception => {
            let message = match args.first() {
                Some(arg) => arg.resolve_to_plain(span)?,
                None => em.b.str("Exception", span),
            };
            Ok(SugaredValue::Plain(message))
        }
        BuiltinEntry::GetAttr
        | BuiltinEntry::IsInstance
        | BuiltinEntry::Annotate
        | BuiltinEntry::Fork => Err(eyre!("builtin {:?} must be lowered from its call syntax", entry).into()),
    }
}

fn make_iterable(
    kind: IterableKind,
    em: &mut Emitter<'_>,
    span: Span,
    args: Vec<SugaredValue>,
) -> Result<SugaredValue> {
    let source = match kind {
        IterableKind::Range => {
            let values = plain_args(&args, span)?;
            for value in &values {
                let ty = em.ty(*value);
                if ty != Ty::Int {
                    bail!(Type, span, "range expected int arguments but found {}", ty);
                }
            }
            match values[..] {
                [end] => IterableSource::Range {
                    start: None,
                    end,
                    step: None,
                },
                [start, end] => IterableSource::Range {
                    start: Some(start),
                    end,
                    step: None,
                },
                [start, end, step] => IterableSource::Range {
                    start: Some(start),
                    end,
                    step: Some(step),
                },
                _ => bail!(
                    SyntaxShape,
                    span,
                    "range expected 1 to 3 arguments but received {}",
                    values.len()
                ),
            }
        }
        IterableKind::Zip => {
            if args.is_empty() {
                bail!(SyntaxShape, span, "zip expected at least one argument");
            }
            IterableSource::Zip(args)
        }
        IterableKind::Enumerate => match <[SugaredValue; 1]>::try_from(args) {
            Ok([inner]) => IterableSource::Enumerate(Box::new(inner)),
            Err(args) => bail!(
                SyntaxShape,
                span,
                "enumerate expected 1 argument but received {}",
                args.len()
            ),
        },
    };
    Ok(SugaredValue::Iterable(source))
}
