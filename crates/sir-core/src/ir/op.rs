use crate::ast::{BinOpKind, UnOpKind};
use parse_display::Display;

/// Graph primitives. Structural primitives print as `prim::<Name>`,
/// library primitives as `ops::<name>`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[display("prim::{}")]
pub enum Op {
    Constant,
    Load,
    Store,
    If,
    Loop,
    Closure,
    ForkClosure,
    Fork,
    Break,
    Continue,
    Raise,
    Print,
    UncheckedUnwrapOptional,
    ListConstruct,
    TupleConstruct,
    DictConstruct,
    TupleIndex,
    TupleSlice,
    TupleUnpack,
    ListUnpack,
    CreateObject,
    GetAttr,
    SetAttr,
    CallMethod,
    CallFunction,
    #[display("ops::{0}")]
    Builtin(Builtin),
}

impl From<Builtin> for Op {
    fn from(builtin: Builtin) -> Self {
        Op::Builtin(builtin)
    }
}

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    strum_macros::Display,
    strum_macros::EnumString,
    strum_macros::IntoStaticStr,
)]
#[strum(serialize_all = "snake_case")]
pub enum Builtin {
    Add,
    Sub,
    Mul,
    Div,
    #[strum(serialize = "floordiv")]
    FloorDiv,
    Remainder,
    Pow,
    Matmul,
    #[strum(serialize = "__and__")]
    BitAnd,
    #[strum(serialize = "__or__")]
    BitOr,
    #[strum(serialize = "__xor__")]
    BitXor,
    #[strum(serialize = "__lshift__")]
    LShift,
    #[strum(serialize = "__rshift__")]
    RShift,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Neg,
    #[strum(serialize = "__not__")]
    Not,
    #[strum(serialize = "bitwise_not")]
    BitNot,
    #[strum(serialize = "__is__")]
    Is,
    #[strum(serialize = "__isnot__")]
    IsNot,
    #[strum(serialize = "__contains__")]
    Contains,
    #[strum(serialize = "add_")]
    AddInplace,
    #[strum(serialize = "sub_")]
    SubInplace,
    #[strum(serialize = "mul_")]
    MulInplace,
    #[strum(serialize = "div_")]
    DivInplace,
    Int,
    Float,
    Bool,
    Str,
    NumToTensor,
    Select,
    Slice,
    Unsqueeze,
    Index,
    #[strum(serialize = "index_put_")]
    IndexPut,
    #[strum(serialize = "copy_")]
    Copy,
    #[strum(serialize = "__getitem__")]
    GetItem,
    #[strum(serialize = "_set_item")]
    SetItem,
    Len,
    Append,
    Keys,
    #[strum(serialize = "__range_length")]
    RangeLength,
    #[strum(serialize = "__derive_index")]
    DeriveIndex,
    Min,
    Max,
    Abs,
    All,
    Round,
    Hash,
    Hex,
    Oct,
    Bin,
    Ord,
    Chr,
    Divmod,
    List,
    Rangelist,
}

impl Builtin {
    pub fn for_binop(op: BinOpKind) -> Option<Builtin> {
        Some(match op {
            BinOpKind::Add => Builtin::Add,
            BinOpKind::Sub => Builtin::Sub,
            BinOpKind::Mul => Builtin::Mul,
            BinOpKind::Div => Builtin::Div,
            BinOpKind::FloorDiv => Builtin::FloorDiv,
            BinOpKind::Mod => Builtin::Remainder,
            BinOpKind::Pow => Builtin::Pow,
            BinOpKind::MatMul => Builtin::Matmul,
            BinOpKind::BitAnd => Builtin::BitAnd,
            BinOpKind::BitOr => Builtin::BitOr,
            BinOpKind::BitXor => Builtin::BitXor,
            BinOpKind::LShift => Builtin::LShift,
            BinOpKind::RShift => Builtin::RShift,
            BinOpKind::Eq => Builtin::Eq,
            BinOpKind::Ne => Builtin::Ne,
            BinOpKind::Lt => Builtin::Lt,
            BinOpKind::Le => Builtin::Le,
            BinOpKind::Gt => Builtin::Gt,
            BinOpKind::Ge => Builtin::Ge,
            BinOpKind::Is => Builtin::Is,
            BinOpKind::IsNot => Builtin::IsNot,
            BinOpKind::In => Builtin::Contains,
            BinOpKind::And | BinOpKind::Or | BinOpKind::NotIn => return None,
        })
    }

    pub fn for_unop(op: UnOpKind) -> Builtin {
        match op {
            UnOpKind::Not => Builtin::Not,
            UnOpKind::Neg => Builtin::Neg,
            UnOpKind::Invert => Builtin::BitNot,
        }
    }

    /// In-place tensor variant used by augmented assignment.
    pub fn in_place(self) -> Option<Builtin> {
        match self {
            Builtin::Add => Some(Builtin::AddInplace),
            Builtin::Sub => Some(Builtin::SubInplace),
            Builtin::Mul => Some(Builtin::MulInplace),
            Builtin::Div => Some(Builtin::DivInplace),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        self.into()
    }
}
