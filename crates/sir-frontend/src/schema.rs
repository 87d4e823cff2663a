//! Signatures: the schema of a compiled function, and the arity and
//! result-type rules of every library primitive.

use itertools::Itertools;
use sir_core::ir::Builtin;
use sir_core::ty::unify_types;
use sir_core::{bail, Result, Span, Ty};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSchema {
    pub name: String,
    pub params: Vec<(String, Ty)>,
    pub ret: Ty,
}

impl FunctionSchema {
    pub fn new(name: impl Into<String>, params: Vec<(String, Ty)>, ret: Ty) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
        }
    }

    pub fn param_tys(&self) -> impl Iterator<Item = &Ty> {
        self.params.iter().map(|(_, ty)| ty)
    }
}

impl Display for FunctionSchema {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}({}) -> {}",
            self.name,
            self.params
                .iter()
                .map(|(name, ty)| format!("{}: {}", name, ty))
                .join(", "),
            self.ret
        )
    }
}

fn arity(op: Builtin) -> (usize, usize) {
    use Builtin::*;
    match op {
        Neg | Not | BitNot | Int | Float | Bool | Str | NumToTensor | Len | Keys | Abs | All
        | Hash | Hex | Oct | Bin | Ord | Chr | List | Rangelist | Round => (1, 1),
        Min | Max => (1, 2),
        Select | SetItem | IndexPut | RangeLength | DeriveIndex => (3, 3),
        Slice => (4, 5),
        _ => (2, 2),
    }
}

fn is_scalar(ty: &Ty) -> bool {
    matches!(ty, Ty::Int | Ty::Float | Ty::Number | Ty::Bool)
}

fn is_int_like(ty: &Ty) -> bool {
    matches!(ty, Ty::Int | Ty::Bool)
}

fn scalar_result(a: &Ty, b: &Ty) -> Ty {
    if matches!(a, Ty::Float) || matches!(b, Ty::Float) {
        Ty::Float
    } else if matches!(a, Ty::Number) || matches!(b, Ty::Number) {
        Ty::Number
    } else {
        Ty::Int
    }
}

fn is_optional_tensor_list(ty: &Ty) -> bool {
    matches!(ty, Ty::List(elem) if elem.is_subtype_of(&Ty::optional_tensor()))
}

/// Check `args` against `op` and compute its result type.
///
/// Wrong arity is a syntax-shape error; operands the primitive is not
/// defined for are type errors.
pub fn check_builtin(op: Builtin, args: &[Ty], span: Span) -> Result<Ty> {
    let (min, max) = arity(op);
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            min.to_string()
        } else {
            format!("{} to {}", min, max)
        };
        bail!(
            SyntaxShape,
            span,
            "{} expected {} argument(s) but received {}",
            op,
            expected,
            args.len()
        );
    }
    match result_type(op, args) {
        Some(ty) => Ok(ty),
        None => bail!(
            Type,
            span,
            "{} is not defined for argument types ({})",
            op,
            args.iter().join(", ")
        ),
    }
}

fn result_type(op: Builtin, args: &[Ty]) -> Option<Ty> {
    use Builtin::*;
    let first = args.first()?.unshaped();
    let second = args.get(1).map(Ty::unshaped);
    match op {
        Add | Sub | Mul | Div | FloorDiv | Remainder | Pow => {
            let second = second?;
            if first.is_tensor() || second.is_tensor() {
                let other_ok = |ty: &Ty| ty.is_tensor() || is_scalar(ty);
                return (other_ok(&first) && other_ok(&second)).then_some(Ty::Tensor);
            }
            match (op, &first, &second) {
                (Add, Ty::Str, Ty::Str) => Some(Ty::Str),
                (Add, Ty::List(a), Ty::List(b)) if a == b => Some(first.clone()),
                _ if is_scalar(&first) && is_scalar(&second) => {
                    if op == Div {
                        Some(Ty::Float)
                    } else {
                        Some(scalar_result(&first, &second))
                    }
                }
                _ => None,
            }
        }
        Matmul => {
            let second = second?;
            (first.is_tensor() && second.is_tensor()).then_some(Ty::Tensor)
        }
        BitAnd | BitOr | BitXor | LShift | RShift => {
            let second = second?;
            if first.is_tensor() || second.is_tensor() {
                Some(Ty::Tensor)
            } else if first == Ty::Bool && second == Ty::Bool && !matches!(op, LShift | RShift) {
                Some(Ty::Bool)
            } else if is_int_like(&first) && is_int_like(&second) {
                Some(Ty::Int)
            } else {
                None
            }
        }
        Eq | Ne | Lt | Le | Gt | Ge => {
            let second = second?;
            if first.is_tensor() || second.is_tensor() {
                let other_ok = |ty: &Ty| ty.is_tensor() || is_scalar(ty);
                (other_ok(&first) && other_ok(&second)).then_some(Ty::Tensor)
            } else if is_scalar(&first) && is_scalar(&second) {
                Some(Ty::Bool)
            } else if first == Ty::Str && second == Ty::Str {
                Some(Ty::Bool)
            } else if matches!(op, Eq | Ne) && unify_types(&first, &second).is_some() {
                Some(Ty::Bool)
            } else {
                None
            }
        }
        Neg | Abs => {
            if first.is_tensor() {
                Some(Ty::Tensor)
            } else if matches!(first, Ty::Int | Ty::Float | Ty::Number) {
                Some(first)
            } else {
                None
            }
        }
        BitNot => match first {
            Ty::Tensor => Some(Ty::Tensor),
            Ty::Int => Some(Ty::Int),
            _ => None,
        },
        Not => (first == Ty::Bool).then_some(Ty::Bool),
        Is | IsNot => Some(Ty::Bool),
        Contains => {
            let elem = second?;
            match &first {
                Ty::List(inner) => elem.is_subtype_of(inner).then_some(Ty::Bool),
                Ty::Dict(key, _) => elem.is_subtype_of(key).then_some(Ty::Bool),
                Ty::Str => (elem == Ty::Str).then_some(Ty::Bool),
                _ => None,
            }
        }
        AddInplace | SubInplace | MulInplace | DivInplace => {
            let second = second?;
            (first.is_tensor() && (second.is_tensor() || is_scalar(&second)))
                .then_some(Ty::Tensor)
        }
        Int | Float => {
            let target = if op == Int { Ty::Int } else { Ty::Float };
            (first.is_tensor() || is_scalar(&first) || first == Ty::Str).then_some(target)
        }
        Bool => (first.is_tensor() || is_scalar(&first)).then_some(Ty::Bool),
        Str => Some(Ty::Str),
        NumToTensor => is_scalar(&first).then_some(Ty::Tensor),
        Select => {
            let rest_ok = args[1..].iter().all(|ty| *ty == Ty::Int);
            (first.is_tensor() && rest_ok).then_some(Ty::Tensor)
        }
        Slice => {
            let bounds_ok = |tys: &[Ty]| tys.iter().all(|ty| *ty == Ty::Int);
            match (&first, args.len()) {
                (ty, 5) if ty.is_tensor() => bounds_ok(&args[1..]).then_some(Ty::Tensor),
                (Ty::List(_) | Ty::Str, 4) => bounds_ok(&args[1..]).then(|| first.clone()),
                _ => None,
            }
        }
        Unsqueeze => (first.is_tensor() && second? == Ty::Int).then_some(Ty::Tensor),
        Index => (first.is_tensor() && is_optional_tensor_list(&second?)).then_some(Ty::Tensor),
        IndexPut => {
            let value = args[2].unshaped();
            (first.is_tensor() && is_optional_tensor_list(&second?) && value.is_tensor())
                .then_some(Ty::Tensor)
        }
        Copy => {
            let src = second?;
            (first.is_tensor() && src.is_tensor()).then_some(Ty::Tensor)
        }
        GetItem => {
            let index = second?;
            match &first {
                Ty::List(elem) => (index == Ty::Int).then(|| (**elem).clone()),
                Ty::Str => (index == Ty::Int).then_some(Ty::Str),
                Ty::Dict(key, value) => index.is_subtype_of(key).then(|| (**value).clone()),
                _ => None,
            }
        }
        SetItem => {
            let index = second?;
            let value = &args[2];
            match &first {
                Ty::List(elem) => {
                    (index == Ty::Int && value.is_subtype_of(elem)).then(|| first.clone())
                }
                Ty::Dict(key, elem) => (index.is_subtype_of(key) && value.is_subtype_of(elem))
                    .then(|| first.clone()),
                _ => None,
            }
        }
        Len => (matches!(first, Ty::List(_) | Ty::Str | Ty::Dict(..)) || first.is_tensor())
            .then_some(Ty::Int),
        Append => match &first {
            Ty::List(elem) => args[1].is_subtype_of(elem).then(|| first.clone()),
            _ => None,
        },
        Keys => match &first {
            Ty::Dict(key, _) => Some(Ty::list((**key).clone())),
            _ => None,
        },
        RangeLength | DeriveIndex => args.iter().all(|ty| *ty == Ty::Int).then_some(Ty::Int),
        Min | Max => match (&first, second) {
            (Ty::List(elem), None) if is_scalar(elem) => Some((**elem).clone()),
            (a, Some(b)) if a.is_tensor() && b.is_tensor() => Some(Ty::Tensor),
            (a, Some(b)) if is_scalar(a) && is_scalar(&b) => Some(scalar_result(a, &b)),
            _ => None,
        },
        All => matches!(first, Ty::List(_) | Ty::Tensor).then_some(Ty::Bool),
        Round => match first {
            Ty::Tensor => Some(Ty::Tensor),
            Ty::Int | Ty::Float | Ty::Number => Some(Ty::Float),
            _ => None,
        },
        Hash => (is_scalar(&first) || first == Ty::Str || first.is_tensor()).then_some(Ty::Int),
        Hex | Oct | Bin | Chr => is_int_like(&first).then_some(Ty::Str),
        Ord => (first == Ty::Str).then_some(Ty::Int),
        Divmod => {
            let second = second?;
            (is_scalar(&first) && is_scalar(&second)).then(|| {
                let ty = scalar_result(&first, &second);
                Ty::tuple(vec![ty.clone(), ty])
            })
        }
        List => match &first {
            Ty::List(_) => Some(first.clone()),
            Ty::Str => Some(Ty::list(Ty::Str)),
            _ => None,
        },
        Rangelist => (first == Ty::Int).then(|| Ty::list(Ty::Int)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sir_core::ErrorKind;

    fn check(op: Builtin, args: &[Ty]) -> Result<Ty> {
        check_builtin(op, args, Span::null())
    }

    #[test]
    fn arithmetic_promotes() {
        assert_eq!(check(Builtin::Add, &[Ty::Int, Ty::Int]), Ok(Ty::Int));
        assert_eq!(check(Builtin::Add, &[Ty::Int, Ty::Float]), Ok(Ty::Float));
        assert_eq!(check(Builtin::Div, &[Ty::Int, Ty::Int]), Ok(Ty::Float));
        assert_eq!(check(Builtin::Mul, &[Ty::DimTensor(2), Ty::Int]), Ok(Ty::Tensor));
        assert_eq!(check(Builtin::Add, &[Ty::Str, Ty::Str]), Ok(Ty::Str));
    }

    #[test]
    fn arity_errors_are_shape_errors() {
        let err = check(Builtin::Len, &[]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxShape);
        assert!(err.message().contains("expected 1 argument(s)"));
    }

    #[test]
    fn operand_errors_are_type_errors() {
        let err = check(Builtin::Sub, &[Ty::Str, Ty::Int]).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(err.message(), "sub is not defined for argument types (str, int)");
    }

    #[test]
    fn containers() {
        let list = Ty::list(Ty::Int);
        assert_eq!(check(Builtin::GetItem, &[list.clone(), Ty::Int]), Ok(Ty::Int));
        assert_eq!(
            check(Builtin::SetItem, &[list.clone(), Ty::Int, Ty::Int]),
            Ok(list.clone())
        );
        assert_eq!(
            check(Builtin::Keys, &[Ty::dict(Ty::Str, Ty::Tensor)]),
            Ok(Ty::list(Ty::Str))
        );
        assert!(check(Builtin::SetItem, &[list, Ty::Int, Ty::Str]).is_err());
    }

    #[test]
    fn indexing_primitives() {
        assert_eq!(
            check(Builtin::Select, &[Ty::Tensor, Ty::Int, Ty::Int]),
            Ok(Ty::Tensor)
        );
        assert_eq!(
            check(
                Builtin::Slice,
                &[Ty::Tensor, Ty::Int, Ty::Int, Ty::Int, Ty::Int]
            ),
            Ok(Ty::Tensor)
        );
        assert_eq!(
            check(
                Builtin::Index,
                &[Ty::Tensor, Ty::list(Ty::optional_tensor())]
            ),
            Ok(Ty::Tensor)
        );
    }

    #[test]
    fn schema_display() {
        let schema = FunctionSchema::new(
            "f",
            vec![("x".into(), Ty::Tensor), ("n".into(), Ty::Int)],
            Ty::optional(Ty::Int),
        );
        assert_eq!(schema.to_string(), "f(x: Tensor, n: int) -> Optional[int]");
    }
}
