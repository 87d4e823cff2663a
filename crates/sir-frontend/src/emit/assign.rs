use super::index::single_index;
use super::Emitter;
use crate::sugared::SugaredValue;
use sir_core::ast::{BinOpKind, Expr, ExprKind};
use sir_core::ir::{Builtin, ValueId};
use sir_core::{bail, ensure, Result, Span, Ty};

impl Emitter<'_> {
    pub(crate) fn emit_assign(&mut self, lhs: &Expr, ty: Option<&Expr>, rhs: Option<&Expr>, span: Span) -> Result<()> {
        let Some(rhs) = rhs else {
            bail!(
                Unsupported,
                span,
                "declarations without an assigned value are not supported"
            );
        };
        if let Some(ty) = ty {
            let Some(name) = lhs.as_var() else {
                bail!(
                    SyntaxShape,
                    lhs.span,
                    "only a simple name may carry a type annotation, found a {}",
                    lhs.kind_name()
                );
            };
            let ty = self.parse_type(ty)?;
            let value = self.emit_expr(rhs, Some(&ty))?;
            let found = self.ty(value);
            let Some(value) = self.convert_to(value, &ty, span) else {
                bail!(
                    Type,
                    span,
                    "Variable '{}' is annotated with type {} but is being assigned to a value of type {}",
                    name,
                    ty,
                    found
                );
            };
            return self.bind(name, SugaredValue::Plain(value), Some(&ty), span);
        }

        match &lhs.kind {
            ExprKind::Tuple(targets) | ExprKind::List(targets) => {
                validate_targets(targets, lhs.span)?;
                let value = self.emit_sugared_expr(rhs, None)?;
                self.destructure(targets, value, span)
            }
            ExprKind::Starred(_) => bail!(
                SyntaxShape,
                lhs.span,
                "A Starred expression may only appear on the lhs within the presence of another non-starred expression"
            ),
            ExprKind::Subscript { value, indices } => {
                let rhs = self.emit_expr(rhs, None)?;
                self.emit_subscript_assign(value, indices, rhs, span)
            }
            _ => {
                let value = self.emit_sugared_expr(rhs, None)?;
                self.assign_target(lhs, value, span)
            }
        }
    }

    /// Bind `value` to loop or comprehension targets.
    pub(crate) fn assign_targets(&mut self, targets: &[Expr], value: SugaredValue, span: Span) -> Result<()> {
        match targets {
            [target] => self.assign_target(target, value, span),
            _ => {
                validate_targets(targets, span)?;
                self.destructure(targets, value, span)
            }
        }
    }

    pub(crate) fn assign_target(&mut self, target: &Expr, value: SugaredValue, span: Span) -> Result<()> {
        match &target.kind {
            ExprKind::Var(name) => self.bind(name, value, None, target.span),
            ExprKind::Tuple(targets) | ExprKind::List(targets) => {
                validate_targets(targets, target.span)?;
                self.destructure(targets, value, span)
            }
            ExprKind::Subscript { value: base, indices } => {
                let value = value.resolve_to_plain(span)?;
                self.emit_subscript_assign(base, indices, value, span)
            }
            ExprKind::Attribute { value: base, attr } => {
                let base = self.emit_sugared_expr(base, None)?;
                let value = value.resolve_to_plain(span)?;
                base.set_attribute(self, target.span, attr.as_str(), value)
            }
            ExprKind::Starred(_) => bail!(
                SyntaxShape,
                target.span,
                "A Starred expression may only appear on the lhs within the presence of another non-starred expression"
            ),
            _ => bail!(
                SyntaxShape,
                target.span,
                "cannot assign to a {}",
                target.kind_name()
            ),
        }
    }

    /// Unpack a fixed-length value into `targets`; a starred target takes the
    /// surplus as a tuple.
    fn destructure(&mut self, targets: &[Expr], value: SugaredValue, span: Span) -> Result<()> {
        let starred = targets.iter().position(Expr::is_starred);
        let expected = starred.is_none().then_some(targets.len());
        let Some(elems) = value.expand_to_tuple(self, span, expected)? else {
            bail!(
                Type,
                span,
                "cannot unpack a value of type {}",
                self.describe(&value)
            );
        };

        let Some(star) = starred else {
            let n = targets.len();
            ensure!(elems.len() >= n, Type, span, "need {} values to unpack but found only {}", n, elems.len());
            ensure!(elems.len() <= n, Type, span, "too many values to unpack: need {} but found {}", n, elems.len());
            for (target, elem) in targets.iter().zip(elems) {
                self.assign_target(target, SugaredValue::Plain(elem), span)?;
            }
            return Ok(());
        };

        let fixed = targets.len() - 1;
        if elems.len() < fixed {
            bail!(
                Type,
                span,
                "need at least {} values to unpack but found only {}",
                fixed,
                elems.len()
            );
        }
        let surplus = elems.len() - fixed;
        let (before, rest) = elems.split_at(star);
        let (packed, after) = rest.split_at(surplus);
        for (target, elem) in targets[..star].iter().zip(before) {
            self.assign_target(target, SugaredValue::Plain(*elem), span)?;
        }
        let packed = self.tuple(packed.to_vec(), span);
        if let ExprKind::Starred(inner) = &targets[star].kind {
            self.assign_target(inner, SugaredValue::Plain(packed), span)?;
        }
        for (target, elem) in targets[star + 1..].iter().zip(after) {
            self.assign_target(target, SugaredValue::Plain(*elem), span)?;
        }
        Ok(())
    }

    fn emit_subscript_assign(&mut self, base: &Expr, indices: &[Expr], rhs: ValueId, span: Span) -> Result<()> {
        let sugared = self.emit_sugared_expr(base, None)?;
        let Some(base) = sugared.as_plain() else {
            bail!(
                Type,
                span,
                "'{}' object does not support item assignment",
                sugared.kind()
            );
        };
        match self.ty(base) {
            ty if ty.is_tensor() => {
                let (sliced, tensor_indices) = self.decompose_index(base, indices, span)?;
                let rhs = self.coerce(rhs, &Ty::Tensor, span, "tensor item assignment")?;
                if tensor_indices.is_empty() {
                    self.builtin(Builtin::Copy, vec![sliced, rhs], span)?;
                } else {
                    let list = self.index_list(&tensor_indices, span);
                    self.builtin(Builtin::IndexPut, vec![sliced, list, rhs], span)?;
                }
            }
            Ty::List(elem) => {
                let index = single_index(indices, span, "list")?;
                if matches!(index.kind, ExprKind::Slice { .. }) {
                    bail!(Unsupported, index.span, "assigning to a list slice is not supported");
                }
                let index = self.emit_expr(index, None)?;
                let rhs = self.coerce(rhs, &elem, span, "list item assignment")?;
                self.builtin(Builtin::SetItem, vec![base, index, rhs], span)?;
            }
            Ty::Dict(key, value) => {
                let index = single_index(indices, span, "dict")?;
                let key_value = self.emit_expr(index, Some(&key))?;
                let key_value = self.coerce(key_value, &key, index.span, "dict key")?;
                let rhs = self.coerce(rhs, &value, span, "dict item assignment")?;
                self.builtin(Builtin::SetItem, vec![base, key_value, rhs], span)?;
            }
            Ty::Class(class) if class.method("__setitem__").is_some() => {
                let index = single_index(indices, span, &class.name)?;
                let index = self.emit_expr(index, None)?;
                self.call_method(base, &class, "__setitem__", vec![index, rhs], span)?;
            }
            ty => bail!(Type, span, "'{}' object does not support item assignment", ty),
        }
        Ok(())
    }

    pub(crate) fn emit_aug_assign(&mut self, lhs: &Expr, op: BinOpKind, rhs: &Expr, span: Span) -> Result<()> {
        if !op.is_augmentable() {
            bail!(
                SyntaxShape,
                span,
                "'{}' cannot be used in an augmented assignment",
                op
            );
        }
        match &lhs.kind {
            ExprKind::Var(name) => {
                let current = self.lookup(name, lhs.span)?.resolve_to_plain(lhs.span)?;
                let rhs = self.emit_expr(rhs, None)?;
                let result = self.apply_aug_op(op, current, rhs, span)?;
                self.bind(name, SugaredValue::Plain(result), None, span)
            }
            ExprKind::Attribute { value, attr } => {
                let base = self.emit_sugared_expr(value, None)?;
                let current = base
                    .get_attribute(self, lhs.span, attr.as_str())?
                    .resolve_to_plain(lhs.span)?;
                let rhs = self.emit_expr(rhs, None)?;
                if let Some(in_place) = self.in_place_op(current, op) {
                    self.builtin(in_place, vec![current, rhs], span)?;
                    return Ok(());
                }
                let result = self.apply_binop(op, current, rhs, span)?;
                base.set_attribute(self, span, attr.as_str(), result)
            }
            ExprKind::Subscript { value, indices } => self.emit_aug_subscript(value, indices, op, rhs, span),
            _ => bail!(
                SyntaxShape,
                lhs.span,
                "augmented assignment is not supported on a {}",
                lhs.kind_name()
            ),
        }
    }

    /// Tensors update in place; classes may define `__iadd__` and friends.
    fn apply_aug_op(&mut self, op: BinOpKind, current: ValueId, rhs: ValueId, span: Span) -> Result<ValueId> {
        if let Some(in_place) = self.in_place_op(current, op) {
            return self.builtin(in_place, vec![current, rhs], span);
        }
        let ty = self.ty(current);
        if let (Some(class), Some(magic)) = (ty.as_class(), op.magic_method()) {
            let in_place_magic = format!("__i{}", magic.trim_start_matches("__"));
            if class.method(&in_place_magic).is_some() {
                return self.call_method(current, class, &in_place_magic, vec![rhs], span);
            }
        }
        self.apply_binop(op, current, rhs, span)
    }

    fn in_place_op(&self, value: ValueId, op: BinOpKind) -> Option<Builtin> {
        if !self.ty(value).is_tensor() {
            return None;
        }
        Builtin::for_binop(op).and_then(Builtin::in_place)
    }

    fn emit_aug_subscript(
        &mut self,
        base: &Expr,
        indices: &[Expr],
        op: BinOpKind,
        rhs: &Expr,
        span: Span,
    ) -> Result<()> {
        let sugared = self.emit_sugared_expr(base, None)?;
        let Some(base) = sugared.as_plain() else {
            bail!(
                Type,
                span,
                "'{}' object does not support item assignment",
                sugared.kind()
            );
        };
        let (key_ty, elem_ty) = match self.ty(base) {
            ty if ty.is_tensor() => return self.emit_aug_tensor_index(base, indices, op, rhs, span),
            Ty::List(elem) => (Ty::Int, *elem),
            Ty::Dict(key, value) => (*key, *value),
            ty => bail!(Type, span, "'{}' object does not support item assignment", ty),
        };

        let index = single_index(indices, span, "container")?;
        if matches!(index.kind, ExprKind::Slice { .. }) {
            bail!(Unsupported, index.span, "augmented assignment to a slice is not supported");
        }
        let index_value = self.emit_expr(index, Some(&key_ty))?;
        let index_value = self.coerce(index_value, &key_ty, index.span, "index")?;
        let current = self.builtin(Builtin::GetItem, vec![base, index_value], span)?;
        let rhs = self.emit_expr(rhs, None)?;
        let result = self.apply_binop(op, current, rhs, span)?;
        let result = self.coerce(result, &elem_ty, span, "augmented assignment")?;
        self.builtin(Builtin::SetItem, vec![base, index_value, result], span)?;
        Ok(())
    }

    fn emit_aug_tensor_index(
        &mut self,
        tensor: ValueId,
        indices: &[Expr],
        op: BinOpKind,
        rhs: &Expr,
        span: Span,
    ) -> Result<()> {
        let (sliced, tensor_indices) = self.decompose_index(tensor, indices, span)?;
        let rhs = self.emit_expr(rhs, None)?;
        if tensor_indices.is_empty() {
            if let Some(in_place) = self.in_place_op(sliced, op) {
                self.builtin(in_place, vec![sliced, rhs], span)?;
                return Ok(());
            }
            let result = self.apply_binop(op, sliced, rhs, span)?;
            let result = self.coerce(result, &Ty::Tensor, span, "augmented assignment")?;
            self.builtin(Builtin::Copy, vec![sliced, result], span)?;
            return Ok(());
        }
        let list = self.index_list(&tensor_indices, span);
        let current = self.builtin(Builtin::Index, vec![sliced, list], span)?;
        let result = self.apply_binop(op, current, rhs, span)?;
        let result = self.coerce(result, &Ty::Tensor, span, "augmented assignment")?;
        self.builtin(Builtin::IndexPut, vec![sliced, list, result], span)?;
        Ok(())
    }
}

fn validate_targets(targets: &[Expr], span: Span) -> Result<()> {
    let starred = targets.iter().filter(|target| target.is_starred()).count();
    ensure!(starred <= 1, SyntaxShape, span, "Only one starred expression is allowed on the lhs");
    if starred == 1 && targets.len() == 1 {
        bail!(
            SyntaxShape,
            span,
            "A Starred expression may only appear on the lhs within the presence of another non-starred expression"
        );
    }
    Ok(())
}
