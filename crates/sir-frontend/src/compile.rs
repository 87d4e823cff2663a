use crate::config::{FrontendConfig, InlinePolicy};
use crate::emit::Emitter;
use crate::passes::lift_closures;
use crate::resolver::Resolver;
use crate::schema::FunctionSchema;
use sir_core::ast::Def;
use sir_core::diagnostics::DiagnosticReport;
use sir_core::ir::Graph;
use sir_core::Result;

/// A function definition lowered to a graph.
#[derive(Debug, Clone)]
pub struct CompiledFunction {
    pub name: String,
    pub schema: FunctionSchema,
    pub graph: Graph,
    pub inline_policy: InlinePolicy,
}

/// Lower one function definition. Either the whole graph is produced or the
/// first error encountered is returned.
pub fn compile(def: &Def, resolver: &dyn Resolver, config: &FrontendConfig) -> Result<CompiledFunction> {
    tracing::debug!(function = %def.name, params = def.params.len(), "compiling function");
    let (schema, mut graph) = Emitter::new(resolver, config).emit_function(def)?;
    if config.lift_closures {
        lift_closures(&mut graph)?;
    }
    tracing::trace!(function = %def.name, graph = %graph, "compiled");
    Ok(CompiledFunction {
        name: def.name.name.clone(),
        schema,
        graph,
        inline_policy: config.inline_policy,
    })
}

pub fn compile_report(
    def: &Def,
    resolver: &dyn Resolver,
    config: &FrontendConfig,
) -> DiagnosticReport<CompiledFunction> {
    compile(def, resolver, config).into()
}
