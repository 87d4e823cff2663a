use parse_display::{Display, FromStr};
use serde::{Deserialize, Serialize};

/// Binary operators, displayed with their surface spelling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromStr, Serialize, Deserialize)]
pub enum BinOpKind {
    #[display("+")]
    Add,
    #[display("-")]
    Sub,
    #[display("*")]
    Mul,
    #[display("/")]
    Div,
    #[display("//")]
    FloorDiv,
    #[display("%")]
    Mod,
    #[display("**")]
    Pow,
    #[display("@")]
    MatMul,
    #[display("&")]
    BitAnd,
    #[display("|")]
    BitOr,
    #[display("^")]
    BitXor,
    #[display("<<")]
    LShift,
    #[display(">>")]
    RShift,
    #[display("==")]
    Eq,
    #[display("!=")]
    Ne,
    #[display("<")]
    Lt,
    #[display("<=")]
    Le,
    #[display(">")]
    Gt,
    #[display(">=")]
    Ge,
    #[display("and")]
    And,
    #[display("or")]
    Or,
    #[display("is")]
    Is,
    #[display("is not")]
    IsNot,
    #[display("in")]
    In,
    #[display("not in")]
    NotIn,
}

impl BinOpKind {
    pub fn is_comparison(self) -> bool {
        matches!(
            self,
            BinOpKind::Eq
                | BinOpKind::Ne
                | BinOpKind::Lt
                | BinOpKind::Le
                | BinOpKind::Gt
                | BinOpKind::Ge
        )
    }

    pub fn is_short_circuit(self) -> bool {
        matches!(self, BinOpKind::And | BinOpKind::Or)
    }

    /// Whether the operator may appear in an augmented assignment (`x op= y`).
    pub fn is_augmentable(self) -> bool {
        matches!(
            self,
            BinOpKind::Add
                | BinOpKind::Sub
                | BinOpKind::Mul
                | BinOpKind::Div
                | BinOpKind::FloorDiv
                | BinOpKind::Mod
                | BinOpKind::Pow
                | BinOpKind::MatMul
                | BinOpKind::BitAnd
                | BinOpKind::BitOr
                | BinOpKind::BitXor
                | BinOpKind::LShift
                | BinOpKind::RShift
        )
    }

    /// Method a user class defines to overload this operator. For `in` the
    /// method is looked up on the right operand.
    pub fn magic_method(self) -> Option<&'static str> {
        Some(match self {
            BinOpKind::Add => "__add__",
            BinOpKind::Sub => "__sub__",
            BinOpKind::Mul => "__mul__",
            BinOpKind::Div => "__truediv__",
            BinOpKind::FloorDiv => "__floordiv__",
            BinOpKind::Mod => "__mod__",
            BinOpKind::Pow => "__pow__",
            BinOpKind::MatMul => "__matmul__",
            BinOpKind::BitAnd => "__and__",
            BinOpKind::BitOr => "__or__",
            BinOpKind::BitXor => "__xor__",
            BinOpKind::LShift => "__lshift__",
            BinOpKind::RShift => "__rshift__",
            BinOpKind::Eq => "__eq__",
            BinOpKind::Ne => "__ne__",
            BinOpKind::Lt => "__lt__",
            BinOpKind::Le => "__le__",
            BinOpKind::Gt => "__gt__",
            BinOpKind::Ge => "__ge__",
            BinOpKind::In => "__contains__",
            BinOpKind::And
            | BinOpKind::Or
            | BinOpKind::Is
            | BinOpKind::IsNot
            | BinOpKind::NotIn => return None,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, FromStr, Serialize, Deserialize)]
pub enum UnOpKind {
    #[display("not")]
    Not,
    #[display("-")]
    Neg,
    #[display("~")]
    Invert,
}

impl UnOpKind {
    pub fn magic_method(self) -> Option<&'static str> {
        match self {
            UnOpKind::Not => None,
            UnOpKind::Neg => Some("__neg__"),
            UnOpKind::Invert => Some("__invert__"),
        }
    }
}
