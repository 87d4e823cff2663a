use crate::schema::FunctionSchema;
use sir_core::ast::Literal;
use sir_core::ty::ClassRef;
use sir_core::{Span, Ty};
use std::collections::BTreeMap;
use std::sync::Arc;

/// What a host-resolved name refers to.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolved {
    Function(Arc<FunctionSchema>),
    Class(ClassRef),
    Module(Arc<ModuleDef>),
    Constant(Literal),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ModuleDef {
    pub name: String,
    pub members: BTreeMap<String, Resolved>,
}

impl ModuleDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            members: BTreeMap::new(),
        }
    }

    pub fn with_member(mut self, name: &str, member: Resolved) -> Self {
        self.members.insert(name.to_string(), member);
        self
    }
}

/// Host hook for names the program does not define itself.
pub trait Resolver {
    fn resolve_value(&self, name: &str, span: Span) -> Option<Resolved>;
    fn resolve_type(&self, name: &str, span: Span) -> Option<Ty>;
}

/// Resolves nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullResolver;

impl Resolver for NullResolver {
    fn resolve_value(&self, _name: &str, _span: Span) -> Option<Resolved> {
        None
    }

    fn resolve_type(&self, _name: &str, _span: Span) -> Option<Ty> {
        None
    }
}

/// Table-backed resolver.
#[derive(Debug, Clone, Default)]
pub struct MapResolver {
    values: BTreeMap<String, Resolved>,
    types: BTreeMap<String, Ty>,
}

impl MapResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(mut self, name: &str, value: Resolved) -> Self {
        self.values.insert(name.to_string(), value);
        self
    }

    pub fn with_type(mut self, name: &str, ty: Ty) -> Self {
        self.types.insert(name.to_string(), ty);
        self
    }

    pub fn with_function(self, schema: FunctionSchema) -> Self {
        let name = schema.name.clone();
        self.with_value(&name, Resolved::Function(Arc::new(schema)))
    }

    /// Registers the class both as a constructor and as a type name.
    pub fn with_class(self, class: ClassRef) -> Self {
        let name = class.name.clone();
        self.with_value(&name, Resolved::Class(class.clone()))
            .with_type(&name, Ty::Class(class))
    }

    pub fn with_module(self, module: ModuleDef) -> Self {
        let name = module.name.clone();
        self.with_value(&name, Resolved::Module(Arc::new(module)))
    }
}

impl Resolver for MapResolver {
    fn resolve_value(&self, name: &str, _span: Span) -> Option<Resolved> {
        self.values.get(name).cloned()
    }

    fn resolve_type(&self, name: &str, _span: Span) -> Option<Ty> {
        self.types.get(name).cloned()
    }
}
