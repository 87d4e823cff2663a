//! Static types of IR values.
//!
//! The lattice is small: tensors (optionally with a known rank), scalars,
//! `None`, and the usual containers. Lists and dicts are invariant because
//! they are mutable; tuples and futures are covariant.

use itertools::Itertools;
use std::fmt::{Display, Formatter};
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSig {
    pub name: String,
    /// Parameter types, excluding the receiver.
    pub params: Vec<Ty>,
    pub ret: Ty,
}

impl MethodSig {
    pub fn new(name: impl Into<String>, params: Vec<Ty>, ret: Ty) -> Self {
        Self {
            name: name.into(),
            params,
            ret,
        }
    }
}

/// A user-defined class as seen by the frontend: its attributes and methods.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassType {
    pub name: String,
    pub attributes: Vec<(String, Ty)>,
    pub methods: Vec<MethodSig>,
}

impl ClassType {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: Vec::new(),
            methods: Vec::new(),
        }
    }

    pub fn with_attribute(mut self, name: impl Into<String>, ty: Ty) -> Self {
        self.attributes.push((name.into(), ty));
        self
    }

    pub fn with_method(mut self, sig: MethodSig) -> Self {
        self.methods.push(sig);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&Ty> {
        self.attributes
            .iter()
            .find(|(attr, _)| attr == name)
            .map(|(_, ty)| ty)
    }

    pub fn method(&self, name: &str) -> Option<&MethodSig> {
        self.methods.iter().find(|sig| sig.name == name)
    }

    pub fn into_ref(self) -> ClassRef {
        ClassRef(Arc::new(self))
    }
}

/// Shared handle to a class type. Classes are nominal: two handles are equal
/// when their names are.
#[derive(Debug, Clone)]
pub struct ClassRef(Arc<ClassType>);

impl PartialEq for ClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.0.name == other.0.name
    }
}

impl Eq for ClassRef {}

impl Hash for ClassRef {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.name.hash(state);
    }
}

impl Deref for ClassRef {
    type Target = ClassType;

    fn deref(&self) -> &ClassType {
        &self.0
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Ty {
    Tensor,
    /// A tensor whose rank is known statically.
    DimTensor(usize),
    Int,
    Float,
    Bool,
    Str,
    None,
    Number,
    Optional(Box<Ty>),
    List(Box<Ty>),
    Tuple(Vec<Ty>),
    Dict(Box<Ty>, Box<Ty>),
    Future(Box<Ty>),
    Class(ClassRef),
}

impl Ty {
    pub fn optional(inner: Ty) -> Ty {
        match inner {
            Ty::None => Ty::None,
            Ty::Optional(_) => inner,
            other => Ty::Optional(Box::new(other)),
        }
    }

    pub fn list(elem: Ty) -> Ty {
        Ty::List(Box::new(elem))
    }

    pub fn dict(key: Ty, value: Ty) -> Ty {
        Ty::Dict(Box::new(key), Box::new(value))
    }

    pub fn future(inner: Ty) -> Ty {
        Ty::Future(Box::new(inner))
    }

    pub fn tuple(elems: Vec<Ty>) -> Ty {
        Ty::Tuple(elems)
    }

    pub fn optional_tensor() -> Ty {
        Ty::optional(Ty::Tensor)
    }

    pub fn is_tensor(&self) -> bool {
        matches!(self, Ty::Tensor | Ty::DimTensor(_))
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Ty::Int | Ty::Float | Ty::Number)
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Ty::None)
    }

    pub fn as_optional(&self) -> Option<&Ty> {
        match self {
            Ty::Optional(inner) => Some(inner),
            _ => None,
        }
    }

    pub fn as_class(&self) -> Option<&ClassRef> {
        match self {
            Ty::Class(class) => Some(class),
            _ => None,
        }
    }

    pub fn is_subtype_of(&self, other: &Ty) -> bool {
        if self == other {
            return true;
        }
        match (self, other) {
            (Ty::DimTensor(_), Ty::Tensor) => true,
            (Ty::None, Ty::Optional(_)) => true,
            (Ty::Optional(a), Ty::Optional(b)) => a.is_subtype_of(b),
            (_, Ty::Optional(b)) => self.is_subtype_of(b),
            (Ty::Int | Ty::Float, Ty::Number) => true,
            (Ty::Tuple(a), Ty::Tuple(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.is_subtype_of(y))
            }
            (Ty::Future(a), Ty::Future(b)) => a.is_subtype_of(b),
            _ => false,
        }
    }

    /// Erase static tensor shape information, recursively.
    pub fn unshaped(&self) -> Ty {
        match self {
            Ty::DimTensor(_) => Ty::Tensor,
            Ty::Optional(inner) => Ty::Optional(Box::new(inner.unshaped())),
            Ty::List(elem) => Ty::list(elem.unshaped()),
            Ty::Tuple(elems) => Ty::Tuple(elems.iter().map(Ty::unshaped).collect()),
            Ty::Dict(key, value) => Ty::dict(key.unshaped(), value.unshaped()),
            Ty::Future(inner) => Ty::future(inner.unshaped()),
            other => other.clone(),
        }
    }
}

/// Least specific common supertype of two types, if one exists.
pub fn unify_types(t1: &Ty, t2: &Ty) -> Option<Ty> {
    if t1.is_subtype_of(t2) {
        return Some(t2.clone());
    }
    if t2.is_subtype_of(t1) {
        return Some(t1.clone());
    }
    match (t1, t2) {
        (a, b) if a.is_tensor() && b.is_tensor() => Some(Ty::Tensor),
        (Ty::None, other) | (other, Ty::None) => Some(Ty::optional(other.clone())),
        (Ty::Optional(a), b) | (b, Ty::Optional(a)) => unify_types(a, b).map(Ty::optional),
        (Ty::Tuple(a), Ty::Tuple(b)) if a.len() == b.len() => a
            .iter()
            .zip(b)
            .map(|(x, y)| unify_types(x, y))
            .collect::<Option<Vec<_>>>()
            .map(Ty::Tuple),
        // lists of tensors may mix ranks; any other element mismatch is final
        (Ty::List(a), Ty::List(b)) if a.is_tensor() && b.is_tensor() => Some(Ty::list(Ty::Tensor)),
        _ => None,
    }
}

impl Display for Ty {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Ty::Tensor => write!(f, "Tensor"),
            Ty::DimTensor(rank) => write!(f, "Tensor(rank={})", rank),
            Ty::Int => write!(f, "int"),
            Ty::Float => write!(f, "float"),
            Ty::Bool => write!(f, "bool"),
            Ty::Str => write!(f, "str"),
            Ty::None => write!(f, "None"),
            Ty::Number => write!(f, "number"),
            Ty::Optional(inner) => write!(f, "Optional[{}]", inner),
            Ty::List(elem) => write!(f, "List[{}]", elem),
            Ty::Tuple(elems) => write!(f, "Tuple[{}]", elems.iter().join(", ")),
            Ty::Dict(key, value) => write!(f, "Dict[{}, {}]", key, value),
            Ty::Future(inner) => write!(f, "Future[{}]", inner),
            Ty::Class(class) => write!(f, "{}", class.name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn optional_absorbs_none_and_nesting() {
        assert_eq!(Ty::optional(Ty::None), Ty::None);
        assert_eq!(
            Ty::optional(Ty::optional(Ty::Int)),
            Ty::Optional(Box::new(Ty::Int))
        );
    }

    #[test]
    fn subtyping_rules() {
        assert!(Ty::DimTensor(2).is_subtype_of(&Ty::Tensor));
        assert!(!Ty::Tensor.is_subtype_of(&Ty::DimTensor(2)));
        assert!(Ty::None.is_subtype_of(&Ty::optional(Ty::Int)));
        assert!(Ty::Int.is_subtype_of(&Ty::optional(Ty::Int)));
        assert!(Ty::Float.is_subtype_of(&Ty::Number));
        assert!(Ty::tuple(vec![Ty::DimTensor(1), Ty::Int])
            .is_subtype_of(&Ty::tuple(vec![Ty::Tensor, Ty::Int])));
        assert!(!Ty::list(Ty::DimTensor(1)).is_subtype_of(&Ty::list(Ty::Tensor)));
        assert!(!Ty::Int.is_subtype_of(&Ty::Float));
    }

    #[test]
    fn unification() {
        assert_eq!(unify_types(&Ty::Int, &Ty::Int), Some(Ty::Int));
        assert_eq!(unify_types(&Ty::Int, &Ty::Float), None);
        assert_eq!(
            unify_types(&Ty::DimTensor(2), &Ty::DimTensor(3)),
            Some(Ty::Tensor)
        );
        assert_eq!(
            unify_types(&Ty::None, &Ty::Str),
            Some(Ty::optional(Ty::Str))
        );
        assert_eq!(
            unify_types(&Ty::optional(Ty::DimTensor(1)), &Ty::DimTensor(4)),
            Some(Ty::optional(Ty::Tensor))
        );
        assert_eq!(
            unify_types(
                &Ty::tuple(vec![Ty::Int, Ty::None]),
                &Ty::tuple(vec![Ty::Int, Ty::Bool])
            ),
            Some(Ty::tuple(vec![Ty::Int, Ty::optional(Ty::Bool)]))
        );
        assert_eq!(unify_types(&Ty::list(Ty::Int), &Ty::list(Ty::Float)), None);
    }

    #[test]
    fn unshaped_erases_ranks() {
        let ty = Ty::tuple(vec![Ty::DimTensor(3), Ty::list(Ty::DimTensor(1))]);
        assert_eq!(
            ty.unshaped(),
            Ty::tuple(vec![Ty::Tensor, Ty::list(Ty::Tensor)])
        );
    }

    #[test]
    fn display_uses_surface_spelling() {
        let ty = Ty::dict(Ty::Str, Ty::optional(Ty::list(Ty::Int)));
        assert_eq!(ty.to_string(), "Dict[str, Optional[List[int]]]");
        assert_eq!(Ty::tuple(vec![Ty::Int, Ty::Tensor]).to_string(), "Tuple[int, Tensor]");
    }

    #[test]
    fn classes_compare_by_name() {
        let a = ClassType::new("Point").with_attribute("x", Ty::Int).into_ref();
        let b = ClassType::new("Point").into_ref();
        assert_eq!(Ty::Class(a.clone()), Ty::Class(b));
        assert_eq!(a.attribute("x"), Some(&Ty::Int));
        assert!(a.method("__add__").is_none());
    }
}
