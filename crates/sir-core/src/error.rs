use crate::span::Span;
use miette::Diagnostic;
use std::fmt::{Display, Formatter};
use std::result;
use thiserror::Error;

/// Classification of frontend failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    SyntaxShape,
    Name,
    Type,
    Unsupported,
    Internal,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorKind::SyntaxShape => write!(f, "SyntaxShapeError"),
            ErrorKind::Name => write!(f, "NameError"),
            ErrorKind::Type => write!(f, "TypeError"),
            ErrorKind::Unsupported => write!(f, "UnsupportedFeatureError"),
            ErrorKind::Internal => write!(f, "InternalError"),
        }
    }
}

#[derive(Error, Diagnostic, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("{message}")]
    #[diagnostic(code(sir::syntax_shape))]
    SyntaxShape {
        message: String,
        #[label]
        span: Span,
    },
    #[error("{message}")]
    #[diagnostic(code(sir::name))]
    Name {
        message: String,
        #[label]
        span: Span,
    },
    #[error("{message}")]
    #[diagnostic(code(sir::type_error))]
    Type {
        message: String,
        #[label]
        span: Span,
    },
    #[error("{message}")]
    #[diagnostic(code(sir::unsupported))]
    Unsupported {
        message: String,
        #[label]
        span: Span,
    },
    #[error("internal error: {0}")]
    #[diagnostic(code(sir::internal))]
    Internal(String),
}

pub type Result<T> = result::Result<T, Error>;

impl Error {
    pub fn new(kind: ErrorKind, span: Span, message: impl Into<String>) -> Self {
        let message = message.into();
        match kind {
            ErrorKind::SyntaxShape => Error::SyntaxShape { message, span },
            ErrorKind::Name => Error::Name { message, span },
            ErrorKind::Type => Error::Type { message, span },
            ErrorKind::Unsupported => Error::Unsupported { message, span },
            ErrorKind::Internal => Error::Internal(message),
        }
    }

    pub fn syntax_shape(span: Span, message: impl Into<String>) -> Self {
        Error::new(ErrorKind::SyntaxShape, span, message)
    }

    pub fn name(span: Span, message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Name, span, message)
    }

    pub fn type_error(span: Span, message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Type, span, message)
    }

    pub fn unsupported(span: Span, message: impl Into<String>) -> Self {
        Error::new(ErrorKind::Unsupported, span, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Error::Internal(message.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::SyntaxShape { .. } => ErrorKind::SyntaxShape,
            Error::Name { .. } => ErrorKind::Name,
            Error::Type { .. } => ErrorKind::Type,
            Error::Unsupported { .. } => ErrorKind::Unsupported,
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    pub fn span(&self) -> Option<Span> {
        match self {
            Error::SyntaxShape { span, .. }
            | Error::Name { span, .. }
            | Error::Type { span, .. }
            | Error::Unsupported { span, .. } => Some(*span),
            Error::Internal(_) => None,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            Error::SyntaxShape { message, .. }
            | Error::Name { message, .. }
            | Error::Type { message, .. }
            | Error::Unsupported { message, .. } => message,
            Error::Internal(message) => message,
        }
    }
}

// Convert from eyre::Report to our Error type
impl From<eyre::Report> for Error {
    fn from(err: eyre::Report) -> Self {
        Error::Internal(err.to_string())
    }
}
