use crate::ir::{Attr, BlockId, Graph, NodeId, ValueId};
use crate::pretty::{pretty, PrettyCtx, PrettyOptions};
use itertools::Itertools;
use std::fmt::{self, Display, Formatter};

impl Display for Attr {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Attr::Int(v) => write!(f, "{}", v),
            Attr::Float(v) => write!(f, "{:?}", v),
            Attr::Str(s) => write!(f, "{:?}", s),
            Attr::Bool(b) => write!(f, "{}", b),
            Attr::None => write!(f, "None"),
        }
    }
}

impl Graph {
    fn fmt_value_decl(&self, value: ValueId, ctx: &PrettyCtx<'_>) -> String {
        if ctx.options.show_types {
            format!("{} : {}", self.value_name(value), self.ty(value))
        } else {
            self.value_name(value)
        }
    }

    fn fmt_value_list(&self, values: &[ValueId]) -> String {
        values.iter().map(|v| self.value_name(*v)).join(", ")
    }

    fn fmt_block(
        &self,
        f: &mut Formatter<'_>,
        ctx: &mut PrettyCtx<'_>,
        block: BlockId,
        header: &str,
    ) -> fmt::Result {
        let params = self
            .block(block)
            .params
            .iter()
            .map(|v| self.fmt_value_decl(*v, ctx))
            .join(", ");
        ctx.writeln(f, format!("{}({}):", header, params))?;
        ctx.nested(|ctx| {
            for &node in &self.block(block).nodes {
                self.fmt_node(f, ctx, node)?;
            }
            Ok(())
        })?;
        Ok(())
    }

    fn fmt_node(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>, node: NodeId) -> fmt::Result {
        let data = self.node(node);
        let outputs = data
            .outputs
            .iter()
            .map(|v| self.fmt_value_decl(*v, ctx))
            .join(", ");
        let attrs = if data.attrs.is_empty() {
            String::new()
        } else {
            format!(
                "[{}]",
                data.attrs
                    .iter()
                    .map(|(key, attr)| format!("{}={}", key, attr))
                    .join(", ")
            )
        };
        let mut line = format!(
            "{} = {}{}({})",
            outputs,
            data.op,
            attrs,
            self.fmt_value_list(&data.inputs)
        );
        if outputs.is_empty() {
            line.remove(0);
        }
        if ctx.options.show_spans && !data.span.is_null() {
            line.push_str(&format!(" # {}", data.span));
        }
        ctx.writeln(f, line)?;
        ctx.nested(|ctx| {
            for (i, &block) in data.blocks.iter().enumerate() {
                self.fmt_block(f, ctx, block, &format!("block{}", i))?;
                ctx.nested(|ctx| {
                    ctx.writeln(
                        f,
                        format!("-> ({})", self.fmt_value_list(&self.block(block).returns)),
                    )
                })?;
            }
            match &data.subgraph {
                Some(subgraph) if ctx.options.show_subgraphs => subgraph.fmt_graph(f, ctx)?,
                Some(subgraph) => ctx.writeln(f, format!("graph<{} inputs>", subgraph.inputs().len()))?,
                None => {}
            }
            Ok(())
        })
    }
}

impl Graph {
    pub(crate) fn fmt_graph(&self, f: &mut Formatter<'_>, ctx: &mut PrettyCtx<'_>) -> fmt::Result {
        self.fmt_block(f, ctx, self.root(), "graph")?;
        ctx.nested(|ctx| {
            ctx.writeln(
                f,
                format!("return ({})", self.fmt_value_list(self.outputs())),
            )
        })
    }
}

impl Display for Graph {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", pretty(self, PrettyOptions::default()))
    }
}
