//! Flow-sensitive narrowing of optional variables across boolean tests.

use sir_core::ast::{BinOpKind, Expr, ExprKind, UnOpKind};
use sir_core::ty::unify_types;
use sir_core::{Span, Ty};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub ty: Ty,
    pub span: Span,
}

/// Names narrowed on one side of a test.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct RefinementMap(BTreeMap<String, Refinement>);

impl RefinementMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn single(name: &str, ty: Ty, span: Span) -> Self {
        let mut map = Self::new();
        map.0.insert(name.to_string(), Refinement { ty, span });
        map
    }

    pub fn get(&self, name: &str) -> Option<&Refinement> {
        self.0.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Refinement)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Names narrowed on both sides whose narrowed types unify.
    pub fn intersect(&self, other: &RefinementMap) -> RefinementMap {
        let entries = self
            .0
            .iter()
            .filter_map(|(name, refinement)| {
                let theirs = other.0.get(name)?;
                let ty = unify_types(&refinement.ty, &theirs.ty)?;
                Some((
                    name.clone(),
                    Refinement {
                        ty,
                        span: refinement.span,
                    },
                ))
            })
            .collect();
        RefinementMap(entries)
    }

    /// Names narrowed on either side; names on both sides are unified and
    /// dropped when the types do not unify.
    pub fn union(&self, other: &RefinementMap) -> RefinementMap {
        let mut entries = BTreeMap::new();
        for (name, refinement) in self.0.iter().chain(other.0.iter()) {
            if entries.contains_key(name) {
                continue;
            }
            let merged = match (self.0.get(name), other.0.get(name)) {
                (Some(a), Some(b)) => match unify_types(&a.ty, &b.ty) {
                    Some(ty) => Refinement { ty, span: a.span },
                    None => continue,
                },
                _ => refinement.clone(),
            };
            entries.insert(name.clone(), merged);
        }
        RefinementMap(entries)
    }
}

/// Refinements that hold when a test is true, and when it is false.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct BranchRefinement {
    pub on_true: RefinementMap,
    pub on_false: RefinementMap,
}

impl BranchRefinement {
    pub fn new(on_true: RefinementMap, on_false: RefinementMap) -> Self {
        Self { on_true, on_false }
    }

    pub fn negate(self) -> Self {
        Self {
            on_true: self.on_false,
            on_false: self.on_true,
        }
    }

    pub fn and(&self, other: &BranchRefinement) -> Self {
        Self {
            on_true: self.on_true.intersect(&other.on_true),
            on_false: self.on_false.union(&other.on_false),
        }
    }

    pub fn or(&self, other: &BranchRefinement) -> Self {
        Self {
            on_true: self.on_true.union(&other.on_true),
            on_false: self.on_false.intersect(&other.on_false),
        }
    }
}

/// Compute the refinements of a boolean expression. `type_of` reports the
/// current type of a plain variable without emitting anything.
pub fn find_refinements(expr: &Expr, type_of: &dyn Fn(&str) -> Option<Ty>) -> BranchRefinement {
    match &expr.kind {
        ExprKind::BinOp {
            op: op @ (BinOpKind::Is | BinOpKind::IsNot),
            lhs,
            rhs,
        } => {
            let (name, span) = match (lhs.as_var(), rhs.as_var()) {
                (Some(name), _) if rhs.is_none_literal() => (name, lhs.span),
                (_, Some(name)) if lhs.is_none_literal() => (name, rhs.span),
                _ => return BranchRefinement::default(),
            };
            let Some(Ty::Optional(inner)) = type_of(name) else {
                return BranchRefinement::default();
            };
            let is_none = RefinementMap::single(name, Ty::None, span);
            let not_none = RefinementMap::single(name, *inner, span);
            if *op == BinOpKind::Is {
                BranchRefinement::new(is_none, not_none)
            } else {
                BranchRefinement::new(not_none, is_none)
            }
        }
        ExprKind::UnaryOp {
            op: UnOpKind::Not,
            operand,
        } => find_refinements(operand, type_of).negate(),
        ExprKind::BinOp {
            op: BinOpKind::And,
            lhs,
            rhs,
        } => find_refinements(lhs, type_of).and(&find_refinements(rhs, type_of)),
        ExprKind::BinOp {
            op: BinOpKind::Or,
            lhs,
            rhs,
        } => find_refinements(lhs, type_of).or(&find_refinements(rhs, type_of)),
        _ => BranchRefinement::default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn env(name: &str) -> Option<Ty> {
        match name {
            "a" => Some(Ty::optional(Ty::Tensor)),
            "b" => Some(Ty::optional(Ty::Int)),
            "c" => Some(Ty::Int),
            _ => None,
        }
    }

    fn refine(expr: &Expr) -> BranchRefinement {
        find_refinements(expr, &env)
    }

    #[test]
    fn is_none_narrows_both_sides() {
        let r = refine(&Expr::is_none(Expr::var("a")));
        assert_eq!(r.on_true.get("a").map(|r| r.ty.clone()), Some(Ty::None));
        assert_eq!(r.on_false.get("a").map(|r| r.ty.clone()), Some(Ty::Tensor));

        let r = refine(&Expr::is_not_none(Expr::var("b")));
        assert_eq!(r.on_true.get("b").map(|r| r.ty.clone()), Some(Ty::Int));
        assert_eq!(r.on_false.get("b").map(|r| r.ty.clone()), Some(Ty::None));
    }

    #[test]
    fn non_optional_names_are_not_refined() {
        assert_eq!(refine(&Expr::is_none(Expr::var("c"))), BranchRefinement::default());
        assert_eq!(refine(&Expr::var("a")), BranchRefinement::default());
    }

    #[test]
    fn not_swaps_sides() {
        let plain = refine(&Expr::is_none(Expr::var("a")));
        let negated = refine(&Expr::not(Expr::is_none(Expr::var("a"))));
        assert_eq!(negated, plain.negate());
    }

    #[test]
    fn and_intersects_true_and_unions_false() {
        let r = refine(&Expr::and(
            Expr::is_not_none(Expr::var("a")),
            Expr::is_not_none(Expr::var("b")),
        ));
        assert!(r.on_true.is_empty());
        assert_eq!(r.on_false.len(), 2);

        let same = refine(&Expr::and(
            Expr::is_not_none(Expr::var("a")),
            Expr::is_not_none(Expr::var("a")),
        ));
        assert_eq!(same.on_true.get("a").map(|r| r.ty.clone()), Some(Ty::Tensor));
    }

    #[test]
    fn or_unions_true_and_intersects_false() {
        let r = refine(&Expr::or(
            Expr::is_none(Expr::var("a")),
            Expr::is_none(Expr::var("b")),
        ));
        assert_eq!(r.on_true.len(), 2);
        assert!(r.on_false.is_empty());
    }

    #[test]
    fn de_morgan_holds() {
        let a = Expr::is_not_none(Expr::var("a"));
        let b = Expr::is_none(Expr::var("b"));
        let lhs = refine(&Expr::not(Expr::and(a.clone(), b.clone())));
        let rhs = refine(&Expr::or(Expr::not(a), Expr::not(b)));
        assert_eq!(lhs, rhs);
    }

    #[test]
    fn union_drops_names_that_do_not_unify() {
        let ints = RefinementMap::single("x", Ty::Int, Span::null());
        let strs = RefinementMap::single("x", Ty::Str, Span::null());
        assert!(ints.union(&strs).is_empty());
        assert!(ints.intersect(&strs).is_empty());
        let tensors = RefinementMap::single("x", Ty::DimTensor(2), Span::null());
        let other = RefinementMap::single("x", Ty::DimTensor(3), Span::null());
        assert_eq!(tensors.union(&other).get("x").map(|r| r.ty.clone()), Some(Ty::Tensor));
    }
}
