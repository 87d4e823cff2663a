use super::{DefContext, Emitter};
use crate::schema::FunctionSchema;
use crate::sugared::SugaredValue;
use eyre::eyre;
use sir_core::ast::Def;
use sir_core::ir::Op;
use sir_core::{bail, Result, Span, Ty};

impl Emitter<'_> {
    /// A nested `def` becomes a `prim::Closure` node whose block holds the
    /// body. Values it reads from enclosing scopes stay references into the
    /// outer graph until closures are lifted.
    pub(crate) fn emit_closure(&mut self, def: &Def) -> Result<()> {
        let node = self.b.insert(Op::Closure, vec![], vec![Ty::None], def.span);
        let block = self.b.graph_mut().add_node_block(node);
        let schema = self.emit_def_body(def, block, Some(node))?;
        let closure = self.b.graph().output(node);
        tracing::debug!(closure = %schema, "emitted closure");
        self.closure_schemas.insert(closure, schema);
        self.bind(
            def.name.as_str(),
            SugaredValue::Closure(closure),
            None,
            def.name.span,
        )
    }

    /// `fork(f, *args)`: closures are forked directly; any other callable is
    /// wrapped in a closure performing the call.
    pub(crate) fn emit_fork(&mut self, span: Span, args: Vec<SugaredValue>) -> Result<SugaredValue> {
        let mut args = args.into_iter();
        let Some(target) = args.next() else {
            bail!(SyntaxShape, span, "fork expects a function as its first argument");
        };
        let rest: Vec<SugaredValue> = args.collect();

        if let SugaredValue::Closure(closure) = target {
            let schema = self
                .closure_schemas
                .get(&closure)
                .cloned()
                .ok_or_else(|| eyre!("closure {} has no recorded schema", closure))?;
            if rest.len() != schema.params.len() {
                bail!(
                    SyntaxShape,
                    span,
                    "{}() expected {} argument(s) but received {}",
                    schema.name,
                    schema.params.len(),
                    rest.len()
                );
            }
            let mut inputs = vec![closure];
            for (arg, (name, ty)) in rest.into_iter().zip(&schema.params) {
                let arg = arg.resolve_to_plain(span)?;
                let what = format!("argument '{}' of {}", name, schema.name);
                inputs.push(self.coerce(arg, ty, span, &what)?);
            }
            let future = self
                .b
                .insert_value(Op::ForkClosure, inputs, Ty::future(schema.ret), span);
            return Ok(SugaredValue::Plain(future));
        }

        let node = self.b.insert(Op::Closure, vec![], vec![Ty::None], span);
        let block = self.b.graph_mut().add_node_block(node);
        self.scopes.push(block, true, Some(node));
        self.defs.push(DefContext::new("fork", None));
        let prev = self.b.enter_block(block);
        let result = target
            .call(self, span, rest)
            .and_then(|value| value.resolve_to_plain(span));
        self.b.set_insert_point(prev);
        self.defs.pop();
        self.scopes.pop();

        let value = result?;
        self.b.graph_mut().register_output(block, value);
        let closure = self.b.graph().output(node);
        let ret = self.ty(value);
        self.closure_schemas
            .insert(closure, FunctionSchema::new("fork", vec![], ret.clone()));
        let future = self
            .b
            .insert_value(Op::ForkClosure, vec![closure], Ty::future(ret), span);
        Ok(SugaredValue::Plain(future))
    }
}
