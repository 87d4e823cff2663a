use crate::ast::{BinOpKind, Ident, UnOpKind};
use crate::span::Span;
use serde::{Deserialize, Serialize};

pub type BExpr = Box<Expr>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Literal {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Keyword {
    pub name: Ident,
    pub value: Expr,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ExprKind {
    Var(String),
    Const(Literal),
    BinOp {
        op: BinOpKind,
        lhs: BExpr,
        rhs: BExpr,
    },
    UnaryOp {
        op: UnOpKind,
        operand: BExpr,
    },
    /// `then if cond else otherwise`
    Ternary {
        cond: BExpr,
        then: BExpr,
        otherwise: BExpr,
    },
    /// `value[i0, i1, ...]`
    Subscript {
        value: BExpr,
        indices: Vec<Expr>,
    },
    /// `start:end:step`, only valid as a subscript index.
    Slice {
        start: Option<BExpr>,
        end: Option<BExpr>,
        step: Option<BExpr>,
    },
    Ellipsis,
    Starred(BExpr),
    Call {
        callee: BExpr,
        args: Vec<Expr>,
        kwargs: Vec<Keyword>,
    },
    Attribute {
        value: BExpr,
        attr: Ident,
    },
    List(Vec<Expr>),
    Tuple(Vec<Expr>),
    Dict(Vec<(Expr, Expr)>),
    /// `[elt for target in iter]`
    ListComp {
        elt: BExpr,
        target: BExpr,
        iter: BExpr,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Expr {
    pub kind: ExprKind,
    #[serde(default)]
    pub span: Span,
}

impl Expr {
    pub fn new(kind: ExprKind) -> Self {
        Self {
            kind,
            span: Span::null(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn kind(&self) -> &ExprKind {
        &self.kind
    }

    pub fn var(name: impl Into<String>) -> Self {
        ExprKind::Var(name.into()).into()
    }

    pub fn int(value: i64) -> Self {
        ExprKind::Const(Literal::Int(value)).into()
    }

    pub fn float(value: f64) -> Self {
        ExprKind::Const(Literal::Float(value)).into()
    }

    pub fn str_lit(value: impl Into<String>) -> Self {
        ExprKind::Const(Literal::Str(value.into())).into()
    }

    pub fn bool_lit(value: bool) -> Self {
        ExprKind::Const(Literal::Bool(value)).into()
    }

    pub fn none() -> Self {
        ExprKind::Const(Literal::None).into()
    }

    pub fn binop(op: BinOpKind, lhs: Expr, rhs: Expr) -> Self {
        ExprKind::BinOp {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
        .into()
    }

    pub fn and(lhs: Expr, rhs: Expr) -> Self {
        Self::binop(BinOpKind::And, lhs, rhs)
    }

    pub fn or(lhs: Expr, rhs: Expr) -> Self {
        Self::binop(BinOpKind::Or, lhs, rhs)
    }

    pub fn unary(op: UnOpKind, operand: Expr) -> Self {
        ExprKind::UnaryOp {
            op,
            operand: Box::new(operand),
        }
        .into()
    }

    pub fn not(operand: Expr) -> Self {
        Self::unary(UnOpKind::Not, operand)
    }

    pub fn is_none(operand: Expr) -> Self {
        Self::binop(BinOpKind::Is, operand, Expr::none())
    }

    pub fn is_not_none(operand: Expr) -> Self {
        Self::binop(BinOpKind::IsNot, operand, Expr::none())
    }

    pub fn ternary(cond: Expr, then: Expr, otherwise: Expr) -> Self {
        ExprKind::Ternary {
            cond: Box::new(cond),
            then: Box::new(then),
            otherwise: Box::new(otherwise),
        }
        .into()
    }

    pub fn subscript(value: Expr, indices: Vec<Expr>) -> Self {
        ExprKind::Subscript {
            value: Box::new(value),
            indices,
        }
        .into()
    }

    pub fn slice(start: Option<Expr>, end: Option<Expr>, step: Option<Expr>) -> Self {
        ExprKind::Slice {
            start: start.map(Box::new),
            end: end.map(Box::new),
            step: step.map(Box::new),
        }
        .into()
    }

    /// The bare `:` slice.
    pub fn full_slice() -> Self {
        Self::slice(None, None, None)
    }

    pub fn ellipsis() -> Self {
        ExprKind::Ellipsis.into()
    }

    pub fn starred(inner: Expr) -> Self {
        ExprKind::Starred(Box::new(inner)).into()
    }

    pub fn call(callee: Expr, args: Vec<Expr>) -> Self {
        ExprKind::Call {
            callee: Box::new(callee),
            args,
            kwargs: Vec::new(),
        }
        .into()
    }

    pub fn call_named(name: &str, args: Vec<Expr>) -> Self {
        Self::call(Expr::var(name), args)
    }

    pub fn with_kwarg(mut self, name: impl Into<Ident>, value: Expr) -> Self {
        if let ExprKind::Call { kwargs, .. } = &mut self.kind {
            kwargs.push(Keyword {
                name: name.into(),
                value,
            });
        }
        self
    }

    pub fn attr(value: Expr, attr: impl Into<Ident>) -> Self {
        ExprKind::Attribute {
            value: Box::new(value),
            attr: attr.into(),
        }
        .into()
    }

    pub fn method_call(receiver: Expr, method: &str, args: Vec<Expr>) -> Self {
        Self::call(Self::attr(receiver, method), args)
    }

    pub fn list(elems: Vec<Expr>) -> Self {
        ExprKind::List(elems).into()
    }

    pub fn tuple(elems: Vec<Expr>) -> Self {
        ExprKind::Tuple(elems).into()
    }

    pub fn dict(entries: Vec<(Expr, Expr)>) -> Self {
        ExprKind::Dict(entries).into()
    }

    pub fn list_comp(elt: Expr, target: Expr, iter: Expr) -> Self {
        ExprKind::ListComp {
            elt: Box::new(elt),
            target: Box::new(target),
            iter: Box::new(iter),
        }
        .into()
    }

    pub fn as_var(&self) -> Option<&str> {
        match &self.kind {
            ExprKind::Var(name) => Some(name),
            _ => None,
        }
    }

    pub fn is_starred(&self) -> bool {
        matches!(self.kind, ExprKind::Starred(_))
    }

    pub fn is_none_literal(&self) -> bool {
        matches!(self.kind, ExprKind::Const(Literal::None))
    }

    /// Short description used in diagnostics.
    pub fn kind_name(&self) -> &'static str {
        match &self.kind {
            ExprKind::Var(_) => "variable",
            ExprKind::Const(_) => "constant",
            ExprKind::BinOp { .. } => "binary operation",
            ExprKind::UnaryOp { .. } => "unary operation",
            ExprKind::Ternary { .. } => "conditional expression",
            ExprKind::Subscript { .. } => "subscript",
            ExprKind::Slice { .. } => "slice",
            ExprKind::Ellipsis => "ellipsis",
            ExprKind::Starred(_) => "starred expression",
            ExprKind::Call { .. } => "function call",
            ExprKind::Attribute { .. } => "attribute access",
            ExprKind::List(_) => "list literal",
            ExprKind::Tuple(_) => "tuple literal",
            ExprKind::Dict(_) => "dict literal",
            ExprKind::ListComp { .. } => "list comprehension",
        }
    }
}

impl From<ExprKind> for Expr {
    fn from(kind: ExprKind) -> Self {
        Expr::new(kind)
    }
}
