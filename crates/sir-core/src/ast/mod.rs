//! Syntax tree consumed by the frontend.
//!
//! The tree is produced by an external parser; every node carries the source
//! range it was parsed from. Builder constructors default the span to
//! [`Span::null`], which is what tests and programmatic hosts use.

use crate::span::Span;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

mod expr;
mod ops;
mod stmt;

pub use expr::*;
pub use ops::*;
pub use stmt::*;

#[derive(Debug, Clone, Serialize, Deserialize, Hash, Eq, PartialEq)]
pub struct Ident {
    pub name: String,
    #[serde(default)]
    pub span: Span,
}

impl Ident {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            span: Span::null(),
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = span;
        self
    }

    pub fn as_str(&self) -> &str {
        self.name.as_str()
    }
}

impl Display for Ident {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)
    }
}

impl From<&str> for Ident {
    fn from(name: &str) -> Self {
        Ident::new(name)
    }
}

impl From<String> for Ident {
    fn from(name: String) -> Self {
        Ident::new(name)
    }
}
