use super::Emitter;
use crate::builtins::BuiltinEntry;
use crate::sugared::SugaredValue;
use eyre::eyre;
use sir_core::ast::{BinOpKind, Expr, ExprKind, Keyword, Literal, UnOpKind};
use sir_core::ir::{Builtin, Op, ValueId};
use sir_core::ty::unify_types;
use sir_core::{bail, Result, Span, Ty};

impl Emitter<'_> {
    pub(crate) fn emit_expr(&mut self, expr: &Expr, hint: Option<&Ty>) -> Result<ValueId> {
        self.emit_sugared_expr(expr, hint)?.resolve_to_plain(expr.span)
    }

    pub(crate) fn emit_sugared_expr(&mut self, expr: &Expr, hint: Option<&Ty>) -> Result<SugaredValue> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Var(name) => self.lookup(name, span),
            ExprKind::Attribute { value, attr } => {
                let base = self.emit_sugared_expr(value, None)?;
                base.get_attribute(self, span, attr.as_str())
            }
            ExprKind::Call {
                callee,
                args,
                kwargs,
            } => self.emit_call(callee, args, kwargs, span),
            _ => self.emit_simple_expr(expr, hint).map(SugaredValue::Plain),
        }
    }

    fn emit_simple_expr(&mut self, expr: &Expr, hint: Option<&Ty>) -> Result<ValueId> {
        let span = expr.span;
        match &expr.kind {
            ExprKind::Const(literal) => Ok(self.emit_const(literal, hint, span)),
            ExprKind::BinOp {
                op: BinOpKind::And | BinOpKind::Or | BinOpKind::Is | BinOpKind::IsNot,
                ..
            }
            | ExprKind::UnaryOp {
                op: UnOpKind::Not, ..
            } => Ok(self.emit_cond_value(expr)?.value),
            ExprKind::BinOp { op, lhs, rhs } => self.emit_binop(*op, lhs, rhs, span),
            ExprKind::UnaryOp { op, operand } => self.emit_unary(*op, operand, span),
            ExprKind::Ternary {
                cond,
                then,
                otherwise,
            } => self.emit_ternary(cond, then, otherwise, hint, span),
            ExprKind::Subscript { value, indices } => self.emit_subscript(value, indices, span),
            ExprKind::Slice { .. } | ExprKind::Ellipsis => bail!(
                SyntaxShape,
                span,
                "{} is only valid as a subscript index",
                expr.kind_name()
            ),
            ExprKind::Starred(_) => bail!(SyntaxShape, span, "starred expression is not valid here"),
            ExprKind::List(elems) => self.emit_list_literal(elems, hint, span),
            ExprKind::Tuple(elems) => self.emit_tuple_literal(elems, hint, span),
            ExprKind::Dict(entries) => self.emit_dict_literal(entries, hint, span),
            ExprKind::ListComp { elt, target, iter } => {
                self.emit_list_comp(elt, target, iter, hint, span)
            }
            ExprKind::Var(_) | ExprKind::Attribute { .. } | ExprKind::Call { .. } => {
                self.emit_sugared_expr(expr, hint)?.resolve_to_plain(span)
            }
        }
    }

    /// A `None` literal takes an optional hint as its type.
    fn emit_const(&mut self, literal: &Literal, hint: Option<&Ty>, span: Span) -> ValueId {
        match (literal, hint) {
            (Literal::None, Some(hint)) if hint.as_optional().is_some() => self.b.none(hint.clone(), span),
            _ => self.b.literal(literal, span),
        }
    }

    /// Type or kind of a sugared value, for diagnostics.
    pub(crate) fn describe(&self, value: &SugaredValue) -> String {
        match value.as_plain() {
            Some(plain) => self.ty(plain).to_string(),
            None => value.kind().to_string(),
        }
    }

    fn emit_binop(&mut self, op: BinOpKind, lhs: &Expr, rhs: &Expr, span: Span) -> Result<ValueId> {
        let lhs = self.emit_expr(lhs, None)?;
        let rhs = self.emit_expr(rhs, None)?;
        match op {
            BinOpKind::In => self.emit_contains(rhs, lhs, span),
            BinOpKind::NotIn => {
                let contained = self.emit_contains(rhs, lhs, span)?;
                self.builtin(Builtin::Not, vec![contained], span)
            }
            op => self.apply_binop(op, lhs, rhs, span),
        }
    }

    fn emit_contains(&mut self, container: ValueId, elem: ValueId, span: Span) -> Result<ValueId> {
        let ty = self.ty(container);
        if let Some(class) = ty.as_class() {
            if class.method("__contains__").is_some() {
                return self.call_method(container, class, "__contains__", vec![elem], span);
            }
        }
        self.builtin(Builtin::Contains, vec![container, elem], span)
    }

    /// Apply a binary operator to emitted operands, preferring a class
    /// overload of the left operand.
    pub(crate) fn apply_binop(&mut self, op: BinOpKind, lhs: ValueId, rhs: ValueId, span: Span) -> Result<ValueId> {
        let ty = self.ty(lhs);
        if let (Some(class), Some(magic)) = (ty.as_class(), op.magic_method()) {
            if class.method(magic).is_some() {
                return self.call_method(lhs, class, magic, vec![rhs], span);
            }
        }
        let builtin = Builtin::for_binop(op).ok_or_else(|| eyre!("operator {} has no primitive", op))?;
        self.builtin(builtin, vec![lhs, rhs], span)
    }

    fn emit_unary(&mut self, op: UnOpKind, operand: &Expr, span: Span) -> Result<ValueId> {
        if op == UnOpKind::Neg {
            match &operand.kind {
                ExprKind::Const(Literal::Int(value)) => {
                    if let Some(negated) = value.checked_neg() {
                        return Ok(self.b.int(negated));
                    }
                }
                ExprKind::Const(Literal::Float(value)) => return Ok(self.b.float(-value)),
                _ => {}
            }
        }
        let value = self.emit_expr(operand, None)?;
        let ty = self.ty(value);
        if let (Some(class), Some(magic)) = (ty.as_class(), op.magic_method()) {
            if class.method(magic).is_some() {
                return self.call_method(value, class, magic, vec![], span);
            }
        }
        self.builtin(Builtin::for_unop(op), vec![value], span)
    }

    /// Emit list or tuple elements, splicing in starred tuples.
    fn emit_sequence(&mut self, elems: &[Expr], hint: Option<&Ty>) -> Result<Vec<ValueId>> {
        let mut values = Vec::with_capacity(elems.len());
        for elem in elems {
            match &elem.kind {
                ExprKind::Starred(inner) => {
                    let value = self.emit_sugared_expr(inner, None)?;
                    match value.expand_to_tuple(self, elem.span, None)? {
                        Some(expanded) => values.extend(expanded),
                        None => bail!(
                            Type,
                            elem.span,
                            "starred expression must be a tuple but found {}",
                            self.describe(&value)
                        ),
                    }
                }
                _ => values.push(self.emit_expr(elem, hint)?),
            }
        }
        Ok(values)
    }

    /// Common supertype of the values' types, `None` for no values.
    fn unify_elements(&self, values: &[ValueId], what: &str, span: Span) -> Result<Option<Ty>> {
        let mut unified: Option<Ty> = None;
        for value in values {
            let ty = self.ty(*value);
            unified = Some(match unified {
                None => ty,
                Some(prev) => match unify_types(&prev, &ty) {
                    Some(ty) => ty,
                    None => bail!(
                        Type,
                        span,
                        "{} must contain only a single type, expected: {} but found {} instead",
                        what,
                        prev,
                        ty
                    ),
                },
            });
        }
        Ok(unified)
    }

    fn convert_all(&mut self, values: Vec<ValueId>, target: &Ty, span: Span, what: &str) -> Result<Vec<ValueId>> {
        values
            .into_iter()
            .map(|value| self.coerce(value, target, span, what))
            .collect()
    }

    fn emit_list_literal(&mut self, elems: &[Expr], hint: Option<&Ty>, span: Span) -> Result<ValueId> {
        let elem_hint = match hint {
            Some(Ty::List(elem)) => Some((**elem).clone()),
            _ => None,
        };
        let values = self.emit_sequence(elems, elem_hint.as_ref())?;
        let (values, elem_ty) = match elem_hint {
            Some(elem) => (self.convert_all(values, &elem, span, "list element")?, elem),
            None => {
                let elem = self.unify_elements(&values, "Lists", span)?;
                (values, elem.unwrap_or(Ty::Tensor))
            }
        };
        Ok(self
            .b
            .insert_value(Op::ListConstruct, values, Ty::list(elem_ty), span))
    }

    fn emit_tuple_literal(&mut self, elems: &[Expr], hint: Option<&Ty>, span: Span) -> Result<ValueId> {
        let hints = match hint {
            Some(Ty::Tuple(tys)) if tys.len() == elems.len() && !elems.iter().any(Expr::is_starred) => {
                Some(tys.clone())
            }
            _ => None,
        };
        let values = match hints {
            Some(tys) => {
                let mut values = Vec::with_capacity(elems.len());
                for (elem, ty) in elems.iter().zip(&tys) {
                    let value = self.emit_expr(elem, Some(ty))?;
                    values.push(self.try_convert(value, ty, elem.span));
                }
                values
            }
            None => self.emit_sequence(elems, None)?,
        };
        Ok(self.tuple(values, span))
    }

    fn emit_dict_literal(&mut self, entries: &[(Expr, Expr)], hint: Option<&Ty>, span: Span) -> Result<ValueId> {
        let (key_hint, value_hint) = match hint {
            Some(Ty::Dict(key, value)) => (Some((**key).clone()), Some((**value).clone())),
            _ => (None, None),
        };
        let mut keys = Vec::with_capacity(entries.len());
        let mut values = Vec::with_capacity(entries.len());
        for (key, value) in entries {
            keys.push(self.emit_expr(key, key_hint.as_ref())?);
            values.push(self.emit_expr(value, value_hint.as_ref())?);
        }

        let (keys, key_ty) = match key_hint {
            Some(key_ty) => (self.convert_all(keys, &key_ty, span, "dict key")?, key_ty),
            None => {
                let key_ty = self.unify_elements(&keys, "Dict keys", span)?;
                (keys, key_ty.unwrap_or(Ty::Str))
            }
        };
        let (values, value_ty) = match value_hint {
            Some(value_ty) => (self.convert_all(values, &value_ty, span, "dict value")?, value_ty),
            None => {
                let value_ty = self.unify_elements(&values, "Dict values", span)?;
                (values, value_ty.unwrap_or(Ty::Tensor))
            }
        };
        if !(matches!(key_ty, Ty::Int | Ty::Float | Ty::Str) || key_ty.is_tensor()) {
            bail!(
                Type,
                span,
                "Dict keys must be int, float, str or Tensor but found {}",
                key_ty
            );
        }

        let inputs = keys
            .into_iter()
            .zip(values)
            .flat_map(|(key, value)| [key, value])
            .collect();
        Ok(self
            .b
            .insert_value(Op::DictConstruct, inputs, Ty::dict(key_ty, value_ty), span))
    }

    /// `[elt for target in iter]` is a loop appending to a fresh list. The
    /// list's element type is taken from the first emitted element.
    fn emit_list_comp(
        &mut self,
        elt: &Expr,
        target: &Expr,
        iter: &Expr,
        hint: Option<&Ty>,
        span: Span,
    ) -> Result<ValueId> {
        let elem_hint = match hint {
            Some(Ty::List(elem)) => Some((**elem).clone()),
            _ => None,
        };
        let placeholder = Ty::list(elem_hint.clone().unwrap_or(Ty::Tensor));
        let list = self
            .b
            .insert_value(Op::ListConstruct, vec![], placeholder, span);

        let iterable = self.emit_sugared_expr(iter, None)?;
        if let Some(value) = iterable.as_plain() {
            if matches!(self.ty(value), Ty::Tuple(_)) {
                bail!(Unsupported, iter.span, "list comprehensions over tuples are not supported");
            }
        }
        let iterable = self.prepare_iterable(iterable, iter.span)?;
        let trip = iterable.length(self, span)?;
        self.emit_loop(Some(trip), None, span, &mut |em, counter| {
            let item = iterable.get_item(em, span, counter)?;
            em.assign_target(target, item, span)?;
            let value = em.emit_expr(elt, elem_hint.as_ref())?;
            let value = match &elem_hint {
                Some(elem) => em.coerce(value, elem, elt.span, "list comprehension element")?,
                None => {
                    let ty = em.ty(value);
                    em.b.graph_mut().value_mut(list).ty = Ty::list(ty);
                    value
                }
            };
            em.builtin(Builtin::Append, vec![list, value], span)?;
            Ok(())
        })?;
        Ok(list)
    }

    fn emit_call(&mut self, callee: &Expr, args: &[Expr], kwargs: &[Keyword], span: Span) -> Result<SugaredValue> {
        if let Some(keyword) = kwargs.first() {
            bail!(
                Unsupported,
                keyword.name.span,
                "keyword arguments are not supported (got '{}')",
                keyword.name
            );
        }
        match self.builtin_callee(callee) {
            Some(BuiltinEntry::GetAttr) => return self.emit_getattr(args, span),
            Some(BuiltinEntry::IsInstance) => {
                return self.emit_isinstance(args, span).map(SugaredValue::Plain)
            }
            Some(BuiltinEntry::Annotate) => {
                return self.emit_annotate(args, span).map(SugaredValue::Plain)
            }
            _ => {}
        }
        let callee = self.emit_sugared_expr(callee, None)?;
        let args = self.emit_call_args(args)?;
        callee.call(self, span, args)
    }

    fn emit_call_args(&mut self, args: &[Expr]) -> Result<Vec<SugaredValue>> {
        let mut values = Vec::with_capacity(args.len());
        for arg in args {
            match &arg.kind {
                ExprKind::Starred(inner) => {
                    let value = self.emit_sugared_expr(inner, None)?;
                    match value.expand_to_tuple(self, arg.span, None)? {
                        Some(expanded) => values.extend(expanded.into_iter().map(SugaredValue::Plain)),
                        None => bail!(
                            Type,
                            arg.span,
                            "starred argument must be a tuple but found {}",
                            self.describe(&value)
                        ),
                    }
                }
                _ => values.push(self.emit_sugared_expr(arg, None)?),
            }
        }
        Ok(values)
    }

    fn emit_getattr(&mut self, args: &[Expr], span: Span) -> Result<SugaredValue> {
        let [object, name] = args else {
            bail!(
                SyntaxShape,
                span,
                "getattr expected 2 arguments but received {}",
                args.len()
            );
        };
        let ExprKind::Const(Literal::Str(attr)) = &name.kind else {
            bail!(Type, name.span, "getattr's second argument must be a string literal");
        };
        let object = self.emit_sugared_expr(object, None)?;
        object.get_attribute(self, span, attr)
    }

    /// `isinstance` is decided statically from the emitted type.
    fn emit_isinstance(&mut self, args: &[Expr], span: Span) -> Result<ValueId> {
        let [object, types] = args else {
            bail!(
                SyntaxShape,
                span,
                "isinstance expected 2 arguments but received {}",
                args.len()
            );
        };
        let value = self.emit_expr(object, None)?;
        let ty = self.ty(value).unshaped();
        let candidates: Vec<&Expr> = match &types.kind {
            ExprKind::Tuple(elems) => elems.iter().collect(),
            _ => vec![types],
        };
        let mut matched = false;
        for candidate in candidates {
            matched |= self.isinstance_matches(&ty, candidate, span)?;
        }
        Ok(self.b.bool(matched, span))
    }

    fn isinstance_matches(&self, ty: &Ty, candidate: &Expr, span: Span) -> Result<bool> {
        match candidate.as_var() {
            Some("list") => return Ok(matches!(ty, Ty::List(_))),
            Some("tuple") => return Ok(matches!(ty, Ty::Tuple(_))),
            Some("dict") => return Ok(matches!(ty, Ty::Dict(..))),
            _ => {}
        }
        let target = self.parse_type(candidate)?;
        if let Some(inner) = ty.as_optional() {
            if inner.is_subtype_of(&target) && !Ty::None.is_subtype_of(&target) {
                bail!(
                    Unsupported,
                    span,
                    "isinstance on a value of type {} is not supported; compare it with None instead",
                    ty
                );
            }
        }
        Ok(ty.is_subtype_of(&target))
    }

    fn emit_annotate(&mut self, args: &[Expr], span: Span) -> Result<ValueId> {
        let [ty_expr, value_expr] = args else {
            bail!(
                SyntaxShape,
                span,
                "annotate expected 2 arguments but received {}",
                args.len()
            );
        };
        let ty = self.parse_type(ty_expr)?;
        let value = self.emit_expr(value_expr, Some(&ty))?;
        match self.convert_to(value, &ty, span) {
            Some(converted) => Ok(converted),
            None => bail!(
                Type,
                span,
                "annotate expected a value of type {} but found {}",
                ty,
                self.ty(value)
            ),
        }
    }
}
