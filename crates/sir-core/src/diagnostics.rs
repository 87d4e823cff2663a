use crate::error::{Error, ErrorKind};
use crate::span::Span;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticLevel {
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub message: String,
    pub span: Option<Span>,
    pub suggestions: Vec<String>,
    pub code: Option<String>,
}

impl Diagnostic {
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            message: message.into(),
            span: None,
            suggestions: Vec::new(),
            code: None,
        }
    }

    pub fn with_span(mut self, span: Span) -> Self {
        self.span = Some(span);
        self
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }
}

impl Display for Diagnostic {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)?;

        if let Some(code) = &self.code {
            write!(f, " [{}]", code)?;
        }

        if !self.suggestions.is_empty() {
            let hints = self.suggestions.join("; ");
            write!(f, " (hints: {})", hints)?;
        }

        Ok(())
    }
}

impl From<&Error> for Diagnostic {
    fn from(err: &Error) -> Self {
        let code = match err.kind() {
            ErrorKind::SyntaxShape => "sir::syntax_shape",
            ErrorKind::Name => "sir::name",
            ErrorKind::Type => "sir::type_error",
            ErrorKind::Unsupported => "sir::unsupported",
            ErrorKind::Internal => "sir::internal",
        };
        let diagnostic =
            Diagnostic::error(format!("{}: {}", err.kind(), err.message())).with_code(code);
        match err.span() {
            Some(span) => diagnostic.with_span(span),
            None => diagnostic,
        }
    }
}

/// Outcome of a compilation step together with the diagnostics it produced.
#[derive(Debug, Clone)]
pub struct DiagnosticReport<T> {
    pub value: Option<T>,
    pub diagnostics: Vec<Diagnostic>,
}

impl<T> DiagnosticReport<T> {
    pub fn success(value: T) -> Self {
        Self {
            value: Some(value),
            diagnostics: Vec::new(),
        }
    }

    pub fn failure(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            value: None,
            diagnostics,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|diag| diag.level == DiagnosticLevel::Error)
    }

    pub fn into_result(self) -> Result<(T, Vec<Diagnostic>), Vec<Diagnostic>> {
        match self.value {
            Some(value) => Ok((value, self.diagnostics)),
            None => Err(self.diagnostics),
        }
    }
}

impl<T> From<crate::Result<T>> for DiagnosticReport<T> {
    fn from(result: crate::Result<T>) -> Self {
        match result {
            Ok(value) => DiagnosticReport::success(value),
            Err(err) => DiagnosticReport::failure(vec![Diagnostic::from(&err)]),
        }
    }
}

/// Render diagnostics as plain text lines, one header per diagnostic followed
/// by its location and suggestions.
pub fn render_plain(diagnostics: &[Diagnostic], context: &str) -> Vec<String> {
    let mut lines = Vec::new();
    for diagnostic in diagnostics {
        let level = match diagnostic.level {
            DiagnosticLevel::Error => "ERROR",
            DiagnosticLevel::Warning => "WARNING",
        };

        lines.push(match diagnostic.code.as_ref() {
            Some(code) => format!("[{}] {}: {} ({})", context, level, diagnostic.message, code),
            None => format!("[{}] {}: {}", context, level, diagnostic.message),
        });

        if let Some(span) = &diagnostic.span {
            lines.push(format!("   at {}", span));
        }

        for suggestion in &diagnostic.suggestions {
            lines.push(format!("   suggestion: {}", suggestion));
        }
    }
    lines
}
