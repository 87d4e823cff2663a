//! Turns annotation expressions (`List[int]`, `Optional[Tensor]`, ...) into
//! types.

use crate::resolver::Resolver;
use sir_core::ast::{Expr, ExprKind, Literal};
use sir_core::{bail, Result, Ty};

pub struct TypeParser<'a> {
    resolver: &'a dyn Resolver,
}

impl<'a> TypeParser<'a> {
    pub fn new(resolver: &'a dyn Resolver) -> Self {
        Self { resolver }
    }

    pub fn parse(&self, expr: &Expr) -> Result<Ty> {
        match &expr.kind {
            ExprKind::Const(Literal::None) => Ok(Ty::None),
            ExprKind::Var(name) => self.parse_name(name, expr),
            ExprKind::Attribute { .. } => match dotted_name(expr) {
                Some(name) => self.parse_name(&name, expr),
                None => bail!(Type, expr.span, "expression of kind {} is not a type", expr.kind_name()),
            },
            ExprKind::Subscript { value, indices } => {
                let Some(head) = value.as_var() else {
                    bail!(Type, value.span, "subscripted type must be a name");
                };
                self.parse_generic(head, indices, expr)
            }
            _ => bail!(
                Type,
                expr.span,
                "expression of kind {} is not a type",
                expr.kind_name()
            ),
        }
    }

    fn parse_name(&self, name: &str, expr: &Expr) -> Result<Ty> {
        let ty = match name {
            "int" => Ty::Int,
            "float" => Ty::Float,
            "bool" => Ty::Bool,
            "str" => Ty::Str,
            "None" => Ty::None,
            "number" => Ty::Number,
            "Tensor" | "torch.Tensor" => Ty::Tensor,
            _ => match self.resolver.resolve_type(name, expr.span) {
                Some(ty) => ty,
                None => bail!(Type, expr.span, "unknown type name '{}'", name),
            },
        };
        Ok(ty)
    }

    fn parse_generic(&self, head: &str, args: &[Expr], expr: &Expr) -> Result<Ty> {
        let expect = |n: usize| -> Result<()> {
            if args.len() != n {
                bail!(
                    Type,
                    expr.span,
                    "{} expects {} type argument(s) but received {}",
                    head,
                    n,
                    args.len()
                );
            }
            Ok(())
        };
        match head {
            "List" => {
                expect(1)?;
                Ok(Ty::list(self.parse(&args[0])?))
            }
            "Optional" => {
                expect(1)?;
                Ok(Ty::optional(self.parse(&args[0])?))
            }
            "Future" => {
                expect(1)?;
                Ok(Ty::future(self.parse(&args[0])?))
            }
            "Dict" => {
                expect(2)?;
                let key = self.parse(&args[0])?;
                if !matches!(key, Ty::Int | Ty::Float | Ty::Str | Ty::Tensor) {
                    bail!(
                        Type,
                        args[0].span,
                        "dictionary keys must be int, float, str or Tensor, found {}",
                        key
                    );
                }
                Ok(Ty::dict(key, self.parse(&args[1])?))
            }
            "Tuple" => {
                let elems = args
                    .iter()
                    .map(|arg| self.parse(arg))
                    .collect::<Result<Vec<_>>>()?;
                Ok(Ty::tuple(elems))
            }
            _ => bail!(Type, expr.span, "unknown type constructor '{}'", head),
        }
    }
}

fn dotted_name(expr: &Expr) -> Option<String> {
    match &expr.kind {
        ExprKind::Var(name) => Some(name.clone()),
        ExprKind::Attribute { value, attr } => {
            Some(format!("{}.{}", dotted_name(value)?, attr.name))
        }
        _ => None,
    }
}
