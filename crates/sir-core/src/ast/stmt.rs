use crate::ast::{BinOpKind, Expr, Ident};
use crate::span::Span;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StmtKind {
    If {
        cond: Expr,
        then: Vec<Stmt>,
        otherwise: Vec<Stmt>,
    },
    /// `while cond:`; a missing condition loops until `break`.
    While {
        cond: Option<Expr>,
        body: Vec<Stmt>,
    },
    /// `for t0, t1 in it0, it1:`
    For {
        targets: Vec<Expr>,
        iters: Vec<Expr>,
        body: Vec<Stmt>,
    },
    /// `lhs[: ty] [= rhs]`; the target may be a tuple or list for destructuring.
    Assign {
        lhs: Expr,
        ty: Option<Expr>,
        rhs: Option<Expr>,
    },
    AugAssign {
        lhs: Expr,
        op: BinOpKind,
        rhs: Expr,
    },
    Return(Option<Expr>),
    Break,
    Continue,
    Pass,
    Raise(Option<Expr>),
    Assert {
        test: Expr,
        msg: Option<Expr>,
    },
    Expr(Expr),
    Global(Vec<Ident>),
    Def(Def),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stmt {
    pub kind: StmtKind,
    #[serde(default)]
    pub span: Span,
}

impl Stmt {
    pub fn new(kind: StmtKind) -> Self {
        Self {
            kind,
            span: Span::null(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn if_(cond: Expr, then: Vec<Stmt>, otherwise: Vec<Stmt>) -> Self {
        StmtKind::If {
            cond,
            then,
            otherwise,
        }
        .into()
    }

    pub fn while_(cond: Expr, body: Vec<Stmt>) -> Self {
        StmtKind::While {
            cond: Some(cond),
            body,
        }
        .into()
    }

    /// A loop with no condition.
    pub fn loop_(body: Vec<Stmt>) -> Self {
        StmtKind::While { cond: None, body }.into()
    }

    pub fn for_(target: Expr, iter: Expr, body: Vec<Stmt>) -> Self {
        StmtKind::For {
            targets: vec![target],
            iters: vec![iter],
            body,
        }
        .into()
    }

    pub fn assign(lhs: Expr, rhs: Expr) -> Self {
        StmtKind::Assign {
            lhs,
            ty: None,
            rhs: Some(rhs),
        }
        .into()
    }

    pub fn assign_var(name: &str, rhs: Expr) -> Self {
        Self::assign(Expr::var(name), rhs)
    }

    pub fn assign_annotated(lhs: Expr, ty: Expr, rhs: Expr) -> Self {
        StmtKind::Assign {
            lhs,
            ty: Some(ty),
            rhs: Some(rhs),
        }
        .into()
    }

    pub fn aug_assign(lhs: Expr, op: BinOpKind, rhs: Expr) -> Self {
        StmtKind::AugAssign { lhs, op, rhs }.into()
    }

    pub fn ret(value: Expr) -> Self {
        StmtKind::Return(Some(value)).into()
    }

    pub fn ret_none() -> Self {
        StmtKind::Return(None).into()
    }

    pub fn break_() -> Self {
        StmtKind::Break.into()
    }

    pub fn continue_() -> Self {
        StmtKind::Continue.into()
    }

    pub fn pass() -> Self {
        StmtKind::Pass.into()
    }

    pub fn raise(value: Option<Expr>) -> Self {
        StmtKind::Raise(value).into()
    }

    pub fn assert(test: Expr, msg: Option<Expr>) -> Self {
        StmtKind::Assert { test, msg }.into()
    }

    pub fn expr(expr: Expr) -> Self {
        StmtKind::Expr(expr).into()
    }

    pub fn global(names: Vec<Ident>) -> Self {
        StmtKind::Global(names).into()
    }

    pub fn def(def: Def) -> Self {
        let span = def.span;
        Stmt::new(StmtKind::Def(def)).with_span(span)
    }

    pub fn is_return(&self) -> bool {
        matches!(self.kind, StmtKind::Return(_))
    }
}

impl From<StmtKind> for Stmt {
    fn from(kind: StmtKind) -> Self {
        Stmt::new(kind)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Param {
    pub name: Ident,
    pub ty: Option<Expr>,
}

impl Param {
    pub fn new(name: impl Into<Ident>) -> Self {
        Self {
            name: name.into(),
            ty: None,
        }
    }

    pub fn with_ty(mut self, ty: Expr) -> Self {
        self.ty = Some(ty);
        self
    }
}

/// A function definition: the unit of compilation, and also a nested
/// closure when it appears as a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Def {
    pub name: Ident,
    pub params: Vec<Param>,
    pub ret_ty: Option<Expr>,
    pub body: Vec<Stmt>,
    #[serde(default)]
    pub span: Span,
}

impl Def {
    pub fn new(name: impl Into<Ident>, params: Vec<Param>, body: Vec<Stmt>) -> Self {
        Self {
            name: name.into(),
            params,
            ret_ty: None,
            body,
            span: Span::null(),
        }
    }

    pub fn with_ret_ty(mut self, ty: Expr) -> Self {
        self.ret_ty = Some(ty);
        self
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }
}
