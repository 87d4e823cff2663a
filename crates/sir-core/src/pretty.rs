//! Text rendering options for graphs.
//!
//! `Graph`'s `Display` uses [`PrettyOptions::default`]; [`pretty`] renders
//! with other settings, e.g. without types for compact golden strings.

use crate::ir::Graph;
use std::fmt::{self, Formatter};

/// How a [`Graph`] is rendered.
#[derive(Debug, Clone)]
pub struct PrettyOptions {
    /// Spaces per nested block.
    pub indent_size: usize,
    /// Print `%v : Ty` at value definitions.
    pub show_types: bool,
    /// Append `# file:lo-hi` to nodes that carry a source span.
    pub show_spans: bool,
    /// Print the subgraph of lifted closures and forks under their node.
    pub show_subgraphs: bool,
}

impl Default for PrettyOptions {
    fn default() -> Self {
        Self {
            indent_size: 2,
            show_types: true,
            show_spans: false,
            show_subgraphs: true,
        }
    }
}

/// Current indentation while walking nested blocks.
pub struct PrettyCtx<'a> {
    pub options: &'a PrettyOptions,
    indent: usize,
}

impl<'a> PrettyCtx<'a> {
    pub fn new(options: &'a PrettyOptions) -> Self {
        Self { options, indent: 0 }
    }

    pub fn writeln(&self, f: &mut Formatter<'_>, line: impl AsRef<str>) -> fmt::Result {
        writeln!(f, "{:width$}{}", "", line.as_ref(), width = self.indent)
    }

    /// Run `body` one block level deeper.
    pub fn nested<F>(&mut self, mut body: F) -> fmt::Result
    where
        F: FnMut(&mut Self) -> fmt::Result,
    {
        self.indent += self.options.indent_size;
        let result = body(self);
        self.indent -= self.options.indent_size;
        result
    }
}

/// A graph paired with rendering options; implements `Display`.
pub struct PrettyGraph<'a> {
    graph: &'a Graph,
    options: PrettyOptions,
}

impl fmt::Display for PrettyGraph<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        let mut ctx = PrettyCtx::new(&self.options);
        self.graph.fmt_graph(f, &mut ctx)
    }
}

pub fn pretty(graph: &Graph, options: PrettyOptions) -> PrettyGraph<'_> {
    PrettyGraph { graph, options }
}
