use super::stmt::always_raises;
use super::{Emitter, LoopKind};
use crate::builtins::BuiltinEntry;
use crate::refine::{find_refinements, BranchRefinement, RefinementMap};
use crate::scope::{Binding, DeferredError, Frame};
use crate::sugared::{NoneStatus, SugaredValue};
use eyre::eyre;
use sir_core::ast::{BinOpKind, Expr, ExprKind, Stmt, UnOpKind};
use sir_core::ir::{Attr, BlockId, Builtin, NodeId, Op, ValueId};
use sir_core::ty::unify_types;
use sir_core::{bail, ensure, ErrorKind, Result, Span, Ty};
use std::collections::BTreeSet;

/// A boolean value together with what it implies about optional variables.
/// `static_if` is set when the outcome is known during emission.
#[derive(Debug, Clone)]
pub(crate) struct CondValue {
    pub value: ValueId,
    pub refinements: BranchRefinement,
    pub static_if: Option<bool>,
}

fn binding_kind(binding: &Binding) -> &'static str {
    match binding {
        Binding::Plain(_) => "value",
        Binding::Sugared(value) => value.kind(),
    }
}

impl Emitter<'_> {
    pub(crate) fn emit_cond_value(&mut self, expr: &Expr) -> Result<CondValue> {
        let refinements = {
            let scopes = &self.scopes;
            find_refinements(expr, &|name| scopes.type_of(name))
        };
        let span = expr.span;
        let (value, static_if) = match &expr.kind {
            ExprKind::UnaryOp {
                op: UnOpKind::Not,
                operand,
            } => {
                let inner = self.emit_cond_value(operand)?;
                match inner.static_if {
                    Some(known) => (self.b.bool(!known, span), Some(!known)),
                    None => (self.builtin(Builtin::Not, vec![inner.value], span)?, None),
                }
            }
            ExprKind::BinOp {
                op: op @ (BinOpKind::And | BinOpKind::Or),
                lhs,
                rhs,
            } => self.emit_short_circuit(*op, lhs, rhs, span)?,
            ExprKind::BinOp {
                op: op @ (BinOpKind::Is | BinOpKind::IsNot),
                lhs,
                rhs,
            } => self.emit_is(*op, lhs, rhs, span)?,
            ExprKind::Call { callee, .. }
                if matches!(self.builtin_callee(callee), Some(BuiltinEntry::IsInstance)) =>
            {
                let value = self.emit_expr(expr, None)?;
                let known = self.b.constant_of(value).and_then(Attr::as_bool);
                (value, known)
            }
            _ => (self.emit_cond(expr)?, None),
        };
        Ok(CondValue {
            value,
            refinements,
            static_if,
        })
    }

    /// Emit `expr` as a `bool`.
    pub(crate) fn emit_cond(&mut self, expr: &Expr) -> Result<ValueId> {
        let value = self.emit_expr(expr, None)?;
        let ty = self.ty(value);
        match &ty {
            Ty::Bool => Ok(value),
            ty if ty.is_tensor() => self.builtin(Builtin::Bool, vec![value], expr.span),
            Ty::Class(class) if class.method("__bool__").is_some() => {
                self.call_method(value, class, "__bool__", vec![], expr.span)
            }
            ty => bail!(
                Type,
                expr.span,
                "expected a bool expression for condition but found {}",
                ty
            ),
        }
    }

    fn emit_is(
        &mut self,
        op: BinOpKind,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<(ValueId, Option<bool>)> {
        let lhs = self.emit_sugared_expr(lhs, None)?;
        let rhs = self.emit_sugared_expr(rhs, None)?;
        let is = op == BinOpKind::Is;
        let known = match (lhs.is_none_constant(self), rhs.is_none_constant(self)) {
            (NoneStatus::Always, NoneStatus::Always) => Some(is),
            (NoneStatus::Always, NoneStatus::Never) | (NoneStatus::Never, NoneStatus::Always) => {
                Some(!is)
            }
            _ => None,
        };
        if let Some(known) = known {
            return Ok((self.b.bool(known, span), Some(known)));
        }
        let inputs = vec![lhs.resolve_to_plain(span)?, rhs.resolve_to_plain(span)?];
        let builtin = if is { Builtin::Is } else { Builtin::IsNot };
        Ok((self.builtin(builtin, inputs, span)?, None))
    }

    /// `a and b` is `b if a else False`; `a or b` is `True if a else b`.
    fn emit_short_circuit(
        &mut self,
        op: BinOpKind,
        lhs: &Expr,
        rhs: &Expr,
        span: Span,
    ) -> Result<(ValueId, Option<bool>)> {
        let is_and = op == BinOpKind::And;
        let left = self.emit_cond_value(lhs)?;
        let rhs_refinements = if is_and {
            &left.refinements.on_true
        } else {
            &left.refinements.on_false
        };
        match left.static_if {
            Some(known) if known != is_and => return Ok((left.value, Some(known))),
            Some(_) => {
                let right = self.emit_refined(rhs_refinements, |em| em.emit_cond_value(rhs))?;
                return Ok((right.value, right.static_if));
            }
            None => {}
        }

        let node = self.b.insert(Op::If, vec![left.value], vec![], span);
        let then_block = self.b.graph_mut().add_node_block(node);
        let else_block = self.b.graph_mut().add_node_block(node);
        let (rhs_block, const_block) = if is_and {
            (then_block, else_block)
        } else {
            (else_block, then_block)
        };

        self.scopes.push(rhs_block, false, None);
        let prev = self.b.enter_block(rhs_block);
        let right = self
            .insert_refinements(rhs_refinements)
            .and_then(|()| self.emit_cond_value(rhs));
        self.b.set_insert_point(prev);
        self.scopes.pop();
        let right = right?;
        self.b.graph_mut().register_output(rhs_block, right.value);

        let prev = self.b.enter_block(const_block);
        let constant = self.b.bool(!is_and, span);
        self.b.set_insert_point(prev);
        self.b.graph_mut().register_output(const_block, constant);

        Ok((self.b.graph_mut().add_node_output(node, Ty::Bool), None))
    }

    /// Run `f` at the current point with `refinements` visible only to it.
    fn emit_refined<T>(
        &mut self,
        refinements: &RefinementMap,
        f: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<T> {
        let block = self.b.current_block();
        self.scopes.push(block, false, None);
        let result = self.insert_refinements(refinements).and_then(|()| f(self));
        self.scopes.pop();
        result
    }

    pub(crate) fn emit_ternary(
        &mut self,
        cond: &Expr,
        then: &Expr,
        otherwise: &Expr,
        hint: Option<&Ty>,
        span: Span,
    ) -> Result<ValueId> {
        let cond = self.emit_cond_value(cond)?;
        if let Some(taken) = cond.static_if {
            let (expr, refinements) = if taken {
                (then, &cond.refinements.on_true)
            } else {
                (otherwise, &cond.refinements.on_false)
            };
            return self.emit_refined(refinements, |em| em.emit_expr(expr, hint));
        }

        let node = self.b.insert(Op::If, vec![cond.value], vec![], span);
        let then_block = self.b.graph_mut().add_node_block(node);
        let else_block = self.b.graph_mut().add_node_block(node);
        let then_value = self.emit_branch_expr(then_block, then, &cond.refinements.on_true, hint)?;
        let else_value =
            self.emit_branch_expr(else_block, otherwise, &cond.refinements.on_false, hint)?;

        let then_ty = self.ty(then_value);
        let else_ty = self.ty(else_value);
        let Some(unified) = unify_types(&then_ty, &else_ty) else {
            bail!(
                Type,
                span,
                "if-expression's true branch has type {} but false branch has type {}",
                then_ty,
                else_ty
            );
        };
        Ok(self.b.graph_mut().add_node_output(node, unified))
    }

    fn emit_branch_expr(
        &mut self,
        block: BlockId,
        expr: &Expr,
        refinements: &RefinementMap,
        hint: Option<&Ty>,
    ) -> Result<ValueId> {
        self.scopes.push(block, false, None);
        let prev = self.b.enter_block(block);
        let value = self
            .insert_refinements(refinements)
            .and_then(|()| self.emit_expr(expr, hint));
        self.b.set_insert_point(prev);
        self.scopes.pop();
        let value = value?;
        self.b.graph_mut().register_output(block, value);
        Ok(value)
    }

    pub(crate) fn emit_if(&mut self, cond: &Expr, then: &[Stmt], otherwise: &[Stmt], span: Span) -> Result<()> {
        let cond = self.emit_cond_value(cond)?;
        self.emit_if_else_blocks(cond, then, otherwise, span)
    }

    fn emit_if_else_blocks(
        &mut self,
        cond: CondValue,
        then: &[Stmt],
        otherwise: &[Stmt],
        span: Span,
    ) -> Result<()> {
        if let Some(taken) = cond.static_if {
            tracing::trace!(taken, "emitting statically known branch only");
            let (branch, refinements) = if taken {
                (then, &cond.refinements.on_true)
            } else {
                (otherwise, &cond.refinements.on_false)
            };
            self.insert_refinements(refinements)?;
            return self.emit_statements(branch);
        }

        let node = self.b.insert(Op::If, vec![cond.value], vec![], span);
        let then_block = self.b.graph_mut().add_node_block(node);
        let else_block = self.b.graph_mut().add_node_block(node);
        let then_frame = self.emit_branch(then_block, then, &cond.refinements.on_true)?;
        let else_frame = self.emit_branch(else_block, otherwise, &cond.refinements.on_false)?;

        self.merge_branches(
            node,
            [then_block, else_block],
            [then_frame, else_frame],
            [always_raises(then), always_raises(otherwise)],
            span,
        )
    }

    fn emit_branch(&mut self, block: BlockId, stmts: &[Stmt], refinements: &RefinementMap) -> Result<Frame> {
        self.scopes.push(block, false, None);
        let prev = self.b.enter_block(block);
        let result = self
            .insert_refinements(refinements)
            .and_then(|()| self.emit_statements(stmts));
        self.b.set_insert_point(prev);
        let frame = self.scopes.pop();
        result?;
        Ok(frame.ok_or_else(|| eyre!("branch frame missing after emission"))?)
    }

    /// Make names assigned in the branches of `node` visible after it.
    fn merge_branches(
        &mut self,
        node: NodeId,
        blocks: [BlockId; 2],
        frames: [Frame; 2],
        raises: [bool; 2],
        span: Span,
    ) -> Result<()> {
        let [then_frame, else_frame] = frames;
        if raises[0] && raises[1] {
            return Ok(());
        }
        let names: BTreeSet<String> = then_frame
            .defined_names()
            .into_iter()
            .chain(else_frame.defined_names())
            .collect();

        for name in names {
            // A branch that always raises contributes nothing.
            if raises[0] || raises[1] {
                let live = if raises[0] { &else_frame } else { &then_frame };
                match live.assigned(&name).cloned() {
                    Some(Binding::Plain(ty)) => self.scopes.record_plain(&name, ty),
                    Some(Binding::Sugared(value)) => self.scopes.record_sugared(&name, value),
                    None => {}
                }
                continue;
            }

            let found = self.scopes.find(&name);
            let outer_frame = found.as_ref().map(|found| found.frame);
            let outer = found.map(|found| found.binding);
            // Frame to read from for a branch that did not assign the name.
            let sources = [&then_frame, &else_frame].map(|frame| match frame.assigned(&name) {
                Some(_) => None,
                None => outer_frame,
            });
            let then_binding = then_frame.assigned(&name).cloned().or_else(|| outer.clone());
            let else_binding = else_frame.assigned(&name).cloned().or_else(|| outer.clone());
            match (then_binding, else_binding) {
                (Some(Binding::Plain(then_ty)), Some(Binding::Plain(else_ty))) => {
                    match unify_types(&then_ty, &else_ty) {
                        Some(unified) => self.merge_output(
                            node,
                            blocks,
                            &name,
                            [(then_ty, sources[0]), (else_ty, sources[1])],
                            unified,
                            span,
                        ),
                        None => {
                            let var = name.clone();
                            let render = move || {
                                format!(
                                    "Type mismatch: {} is set to type {} in the true branch and type {} in the false branch",
                                    var, then_ty, else_ty
                                )
                            };
                            if outer.is_some() {
                                bail!(Type, span, "{}", render());
                            }
                            self.defer_error(&name, ErrorKind::Type, span, render);
                        }
                    }
                }
                (Some(Binding::Sugared(a)), Some(Binding::Sugared(b))) if a == b => {
                    self.scopes.record_sugared(&name, a);
                }
                (None, _) => {
                    let var = name.clone();
                    self.defer_error(&name, ErrorKind::Name, span, move || {
                        format!("{} is not defined in the true branch", var)
                    });
                }
                (_, None) => {
                    let var = name.clone();
                    self.defer_error(&name, ErrorKind::Name, span, move || {
                        format!("{} is not defined in the false branch", var)
                    });
                }
                (Some(a), Some(b)) => {
                    let (var, a, b) = (name.clone(), binding_kind(&a), binding_kind(&b));
                    self.defer_error(&name, ErrorKind::Type, span, move || {
                        format!(
                            "{} is bound to a {} in the true branch and a {} in the false branch",
                            var, a, b
                        )
                    });
                }
            }
        }
        Ok(())
    }

    /// Load `name` at the end of both branches, return it from each, and
    /// store the merged output after the `if`.
    fn merge_output(
        &mut self,
        node: NodeId,
        blocks: [BlockId; 2],
        name: &str,
        branches: [(Ty, Option<usize>); 2],
        unified: Ty,
        span: Span,
    ) {
        for (block, (ty, source)) in blocks.into_iter().zip(branches) {
            let prev = self.b.enter_block(block);
            let value = match source {
                // Reads of an enclosing function's variable become captures.
                Some(frame) => self.load(name, ty, frame, span),
                None => {
                    let load = self.b.insert(Op::Load, vec![], vec![ty], span);
                    self.b.set_attr(load, "name", Attr::Str(name.to_string()));
                    self.b.graph().output(load)
                }
            };
            self.b.set_insert_point(prev);
            self.b.graph_mut().register_output(block, value);
        }
        let merged = self.b.graph_mut().add_node_output(node, unified.clone());
        self.name_value(merged, name);
        self.store(name, merged, unified, span);
    }

    fn defer_error(
        &mut self,
        name: &str,
        kind: ErrorKind,
        span: Span,
        render: impl Fn() -> String + 'static,
    ) {
        tracing::debug!(name, %kind, "deferring diagnostic until first use");
        self.scopes.defer(name, DeferredError::new(kind, span, render));
    }

    pub(crate) fn emit_while(&mut self, cond: Option<&Expr>, body: &[Stmt], span: Span) -> Result<()> {
        self.emit_loop(None, cond, span, &mut |em, _| em.emit_statements(body))
    }

    pub(crate) fn emit_for(&mut self, targets: &[Expr], iters: &[Expr], body: &[Stmt], span: Span) -> Result<()> {
        let [iter] = iters else {
            bail!(Unsupported, span, "List of iterables is not supported currently");
        };
        ensure!(!targets.is_empty(), SyntaxShape, span, "for loop requires at least one target");
        let iterable = self.emit_sugared_expr(iter, None)?;
        if let Some(value) = iterable.as_plain() {
            if matches!(self.ty(value), Ty::Tuple(_)) {
                return self.emit_unrolled_loop(targets, &iterable, body, span);
            }
        }
        let iterable = self.prepare_iterable(iterable, iter.span)?;
        let trip = iterable.length(self, span)?;
        self.emit_loop(Some(trip), None, span, &mut |em, counter| {
            let item = iterable.get_item(em, span, counter)?;
            em.assign_targets(targets, item, span)?;
            em.emit_statements(body)
        })
    }

    /// Dicts iterate over their keys; everything else must be indexable or a
    /// builtin iterable.
    pub(crate) fn prepare_iterable(&mut self, iterable: SugaredValue, span: Span) -> Result<SugaredValue> {
        let Some(value) = iterable.as_plain() else {
            return match iterable {
                SugaredValue::Iterable(_) => Ok(iterable),
                other => bail!(Type, span, "'{}' object is not iterable", other.kind()),
            };
        };
        match self.ty(value) {
            Ty::Dict(..) => Ok(SugaredValue::Plain(self.builtin(Builtin::Keys, vec![value], span)?)),
            Ty::List(_) | Ty::Str => Ok(iterable),
            ty if ty.is_tensor() => Ok(iterable),
            ty => bail!(Type, span, "'{}' object is not iterable", ty),
        }
    }

    fn emit_unrolled_loop(
        &mut self,
        targets: &[Expr],
        iterable: &SugaredValue,
        body: &[Stmt],
        span: Span,
    ) -> Result<()> {
        let elems = iterable.expand_to_tuple(self, span, None)?.unwrap_or_default();
        tracing::debug!(len = elems.len(), "unrolling loop over tuple");
        self.def_ctx()?.loops.push(LoopKind::Unrolled);
        let mut result = Ok(());
        for elem in elems {
            result = self
                .assign_targets(targets, SugaredValue::Plain(elem), span)
                .and_then(|()| self.emit_statements(body));
            if result.is_err() {
                break;
            }
        }
        self.def_ctx()?.loops.pop();
        result
    }

    /// Emit a `prim::Loop` running `body` at most `trip` times (unbounded
    /// when `None`) while `cond` holds. `body` receives the iteration counter.
    pub(crate) fn emit_loop(
        &mut self,
        trip: Option<ValueId>,
        cond: Option<&Expr>,
        span: Span,
        body: &mut dyn FnMut(&mut Self, ValueId) -> Result<()>,
    ) -> Result<()> {
        let node = self.b.insert(Op::Loop, vec![], vec![], span);

        let prev = self.b.enter_before(node);
        let trip = trip.unwrap_or_else(|| self.b.int(i64::MAX));
        let initial = match cond {
            Some(cond) => self.emit_cond_value(cond),
            None => Ok(CondValue {
                value: self.b.bool(true, span),
                refinements: BranchRefinement::default(),
                static_if: Some(true),
            }),
        };
        self.b.set_insert_point(prev);
        let initial = initial?;
        self.b.graph_mut().add_node_input(node, trip);
        self.b.graph_mut().add_node_input(node, initial.value);

        let body_block = self.b.graph_mut().add_node_block(node);
        let counter = self.b.graph_mut().add_block_param(body_block, Ty::Int);
        self.scopes.push(body_block, false, None);
        self.def_ctx()?.loops.push(LoopKind::Loop);
        let prev = self.b.enter_block(body_block);
        let result = self
            .insert_refinements(&initial.refinements.on_true)
            .and_then(|()| body(self, counter));
        self.b.set_insert_point(prev);
        self.def_ctx()?.loops.pop();
        let body_frame = self.scopes.pop();
        result?;

        let cond_block = self.b.graph_mut().add_node_block(node);
        self.scopes.push(cond_block, false, None);
        let prev = self.b.enter_block(cond_block);
        let next = match cond {
            Some(cond) => self.emit_cond(cond),
            None => Ok(self.b.bool(true, span)),
        };
        self.b.set_insert_point(prev);
        self.scopes.pop();
        let next = next?;
        self.b.graph_mut().register_output(cond_block, next);

        for name in body_frame.map(|frame| frame.defined_names()).unwrap_or_default() {
            if self.scopes.find(&name).is_none() {
                let var = name.clone();
                self.defer_error(&name, ErrorKind::Name, span, move || {
                    format!("'{}' is defined inside a loop body and is not visible after the loop", var)
                });
            }
        }
        Ok(())
    }
}
