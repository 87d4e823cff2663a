use super::{Emitter, LoopKind};
use crate::sugared::SugaredValue;
use sir_core::ast::{Expr, Ident, Stmt, StmtKind};
use sir_core::ir::Op;
use sir_core::ty::unify_types;
use sir_core::{bail, Result, Span, Ty};

/// Whether `stmt` returns on some path through nested `if`s.
fn contains_return(stmt: &Stmt) -> bool {
    match &stmt.kind {
        StmtKind::Return(_) => true,
        StmtKind::If {
            then, otherwise, ..
        } => then.iter().chain(otherwise).any(contains_return),
        _ => false,
    }
}

/// Whether control never leaves the end of `stmts` normally.
pub(crate) fn always_raises(stmts: &[Stmt]) -> bool {
    match stmts.last().map(|stmt| &stmt.kind) {
        Some(StmtKind::Raise(_)) => true,
        Some(StmtKind::If {
            then, otherwise, ..
        }) => always_raises(then) && always_raises(otherwise),
        _ => false,
    }
}

impl Emitter<'_> {
    pub(crate) fn emit_statements(&mut self, stmts: &[Stmt]) -> Result<()> {
        for (index, stmt) in stmts.iter().enumerate() {
            let last = index + 1 == stmts.len();
            if !last && stmt.is_return() {
                bail!(
                    SyntaxShape,
                    stmt.span,
                    "return statements can appear only at the end of the function body"
                );
            }
            if !last && contains_return(stmt) {
                bail!(
                    Unsupported,
                    stmt.span,
                    "early returns followed by further statements are not supported"
                );
            }
            self.emit_statement(stmt)?;
        }
        Ok(())
    }

    fn emit_statement(&mut self, stmt: &Stmt) -> Result<()> {
        let span = stmt.span;
        match &stmt.kind {
            StmtKind::If {
                cond,
                then,
                otherwise,
            } => self.emit_if(cond, then, otherwise, span),
            StmtKind::While { cond, body } => self.emit_while(cond.as_ref(), body, span),
            StmtKind::For {
                targets,
                iters,
                body,
            } => self.emit_for(targets, iters, body, span),
            StmtKind::Assign { lhs, ty, rhs } => self.emit_assign(lhs, ty.as_ref(), rhs.as_ref(), span),
            StmtKind::AugAssign { lhs, op, rhs } => self.emit_aug_assign(lhs, *op, rhs, span),
            StmtKind::Return(value) => self.emit_return(value.as_ref(), span),
            StmtKind::Break => self.emit_loop_exit(Op::Break, span),
            StmtKind::Continue => self.emit_loop_exit(Op::Continue, span),
            StmtKind::Pass => Ok(()),
            StmtKind::Raise(value) => self.emit_raise(value.as_ref(), span),
            StmtKind::Assert { test, msg } => self.emit_assert(test, msg.as_ref(), span),
            StmtKind::Expr(expr) => self.emit_sugared_expr(expr, None).map(|_| ()),
            StmtKind::Global(names) => self.emit_global(names),
            StmtKind::Def(def) => self.emit_closure(def),
        }
    }

    fn emit_return(&mut self, value: Option<&Expr>, span: Span) -> Result<()> {
        let ctx = self.def_ctx()?;
        if !ctx.loops.is_empty() {
            bail!(Unsupported, span, "return statements inside loops are not supported");
        }
        let declared = ctx.declared_ret.clone();
        let merged = ctx.merged_ret.clone();

        let value = match value {
            Some(expr) => self.emit_expr(expr, declared.as_ref())?,
            None => self.b.none(Ty::None, span),
        };
        let ty = self.ty(value);

        let result = match (&declared, merged) {
            (Some(declared), _) => match self.convert_to(value, declared, span) {
                Some(converted) => converted,
                None => bail!(
                    Type,
                    span,
                    "Return value was annotated as having type {} but is actually of type {}",
                    declared,
                    ty
                ),
            },
            (None, Some(previous)) => {
                let Some(unified) = unify_types(&previous, &ty) else {
                    bail!(
                        Type,
                        span,
                        "Previous return statement returned a value of type {} but this return statement returns a value of type {}",
                        previous,
                        ty
                    );
                };
                self.def_ctx()?.merged_ret = Some(unified);
                value
            }
            (None, None) => {
                self.def_ctx()?.merged_ret = Some(ty);
                value
            }
        };
        self.bind("$return", SugaredValue::Plain(result), None, span)
    }

    fn emit_loop_exit(&mut self, op: Op, span: Span) -> Result<()> {
        let keyword = if op == Op::Break { "break" } else { "continue" };
        match self.def_ctx()?.loops.last() {
            Some(LoopKind::Loop) => {
                self.b.insert(op, vec![], vec![], span);
                Ok(())
            }
            Some(LoopKind::Unrolled) => bail!(
                Unsupported,
                span,
                "'{}' inside a loop over a tuple is not supported",
                keyword
            ),
            None => bail!(SyntaxShape, span, "'{}' outside loop", keyword),
        }
    }

    fn emit_raise(&mut self, value: Option<&Expr>, span: Span) -> Result<()> {
        let message = match value {
            Some(expr) => self.emit_expr(expr, None)?,
            None => self.b.str("Exception", span),
        };
        self.b.insert(Op::Raise, vec![message], vec![], span);
        Ok(())
    }

    /// `assert test, msg` is `if not test: raise AssertionError(msg)`.
    fn emit_assert(&mut self, test: &Expr, msg: Option<&Expr>, span: Span) -> Result<()> {
        let cond = self.emit_cond_value(test)?;
        if cond.static_if == Some(true) {
            return Ok(());
        }
        let node = self.b.insert(Op::If, vec![cond.value], vec![], span);
        let then_block = self.b.graph_mut().add_node_block(node);
        let else_block = self.b.graph_mut().add_node_block(node);
        tracing::trace!(?then_block, ?else_block, "lowering assert");

        self.scopes.push(else_block, false, None);
        let prev = self.b.enter_block(else_block);
        let result = self.emit_assert_failure(msg, span);
        self.b.set_insert_point(prev);
        self.scopes.pop();
        result
    }

    fn emit_assert_failure(&mut self, msg: Option<&Expr>, span: Span) -> Result<()> {
        let message = match msg {
            Some(expr) => self.emit_expr(expr, None)?,
            None => self.b.str("AssertionError", span),
        };
        self.b.insert(Op::Raise, vec![message], vec![], span);
        Ok(())
    }

    /// Each name becomes a tensor input of the graph.
    fn emit_global(&mut self, names: &[Ident]) -> Result<()> {
        for name in names {
            let value = self.b.graph_mut().add_input(Ty::Tensor);
            self.b.graph_mut().value_mut(value).debug_name = Some(name.name.clone());
            self.bind(name.as_str(), SugaredValue::Plain(value), None, name.span)?;
        }
        Ok(())
    }
}
