//! Lowering of function definitions into typed, block-structured graphs.
//!
//! [`compile`] is the entry point: it walks one [`Def`](sir_core::ast::Def)
//! with a scope chain and a set of refinements, emitting nodes through a
//! [`GraphBuilder`](builder::GraphBuilder), and finally lifts nested
//! closures into standalone subgraphs.

pub mod builder;
pub mod builtins;
mod compile;
pub mod config;
pub mod emit;
pub mod passes;
pub mod refine;
pub mod resolver;
pub mod schema;
pub mod scope;
pub mod sugared;
pub mod type_parser;

pub use compile::*;
pub use config::{FrontendConfig, InlinePolicy};
pub use resolver::{MapResolver, NullResolver, Resolved, Resolver};
