#[macro_use]
pub mod macros;

pub mod ast;
pub mod diagnostics;
pub mod error;
pub mod ir;
pub mod pretty;
pub mod span;
pub mod ty;

// Re-export commonly used items for convenience
pub use tracing;

pub use error::{Error, ErrorKind};
pub use span::Span;
pub use ty::Ty;

pub type Result<T> = crate::error::Result<T>;
