use sir_core::ir::{BlockId, Graph, NodeId, Op, ValueId};
use sir_core::{Error, Result};
use std::collections::HashMap;

/// Move every closure body out of the graph into a standalone subgraph on
/// the `prim::Closure` node, and turn `prim::forkClosure` into `prim::fork`.
///
/// The subgraph takes the closure's parameters first, then one input per
/// outer value the body reads. Those outer values become the closure node's
/// inputs.
pub fn lift_closures(graph: &mut Graph) -> Result<()> {
    let root = graph.root();
    lift_block(graph, root)
}

fn lift_block(graph: &mut Graph, block: BlockId) -> Result<()> {
    let nodes = graph.block(block).nodes.clone();
    for node in nodes {
        match graph.node(node).op {
            Op::Closure => lift_closure(graph, node)?,
            Op::ForkClosure => lower_fork(graph, node)?,
            _ => {
                let nested = graph.node(node).blocks.clone();
                for nested in nested {
                    lift_block(graph, nested)?;
                }
            }
        }
    }
    Ok(())
}

fn lift_closure(graph: &mut Graph, node: NodeId) -> Result<()> {
    let Some(&body) = graph.node(node).blocks.first() else {
        return Err(Error::internal(format!("closure {} has no body", node)));
    };
    lower_outer_forks(graph, body)?;
    let (subgraph, captures) = extract_body(graph, body)?;
    tracing::debug!(
        closure = %node,
        captures = captures.len(),
        "lifted closure body"
    );
    let data = graph.node_mut(node);
    data.inputs = captures;
    data.blocks.clear();
    data.subgraph = Some(Box::new(subgraph));
    Ok(())
}

/// Forks inside `body` of closures that were already lifted (defined in an
/// enclosing body) are lowered in place, so the forked body's captures become
/// captures of `body` rather than a bare closure value.
fn lower_outer_forks(graph: &mut Graph, body: BlockId) -> Result<()> {
    for node in graph.walk(body) {
        if graph.node(node).op != Op::ForkClosure {
            continue;
        }
        let lifted = graph
            .node(node)
            .inputs
            .first()
            .and_then(|closure| graph.producer(*closure))
            .is_some_and(|producer| graph.node(producer).subgraph.is_some());
        if lifted {
            lower_fork(graph, node)?;
        }
    }
    Ok(())
}

fn extract_body(graph: &Graph, body: BlockId) -> Result<(Graph, Vec<ValueId>)> {
    let mut subgraph = Graph::new();
    let root = subgraph.root();
    let mut map = HashMap::new();
    for &param in &graph.block(body).params {
        let input = subgraph.add_input(graph.ty(param).clone());
        subgraph.value_mut(input).debug_name = graph.value(param).debug_name.clone();
        map.insert(param, input);
    }

    let mut captures = Vec::new();
    let mut env = |dst: &mut Graph, value: ValueId| {
        captures.push(value);
        let input = dst.add_input(graph.ty(value).clone());
        dst.value_mut(input).debug_name = graph.value(value).debug_name.clone();
        input
    };
    graph.clone_block_into(body, &mut subgraph, root, &mut map, &mut env);
    for &ret in &graph.block(body).returns {
        let output = graph.translate(ret, &mut subgraph, &mut map, &mut env);
        subgraph.register_output(root, output);
    }

    lift_block(&mut subgraph, root)?;
    Ok((subgraph, captures))
}

/// `prim::forkClosure(%closure, args..)` becomes `prim::fork(args.., captures..)`
/// carrying a copy of the lifted body.
fn lower_fork(graph: &mut Graph, node: NodeId) -> Result<()> {
    let inputs = graph.node(node).inputs.clone();
    let Some((&closure, args)) = inputs.split_first() else {
        return Err(Error::internal(format!("fork {} has no target", node)));
    };
    let closure_node = graph
        .producer(closure)
        .filter(|producer| graph.node(*producer).op == Op::Closure)
        .ok_or_else(|| {
            Error::internal(format!(
                "fork {} targets {} which is not produced by a closure",
                node,
                graph.value_name(closure)
            ))
        })?;
    let Some(subgraph) = graph.node(closure_node).subgraph.clone() else {
        return Err(Error::internal(format!(
            "closure {} is forked before it was lifted",
            closure_node
        )));
    };

    let captures = graph.node(closure_node).inputs.clone();
    let fork = graph.node_mut(node);
    fork.op = Op::Fork;
    fork.inputs = args.iter().copied().chain(captures).collect();
    fork.subgraph = Some(subgraph);

    if graph.uses(closure).is_empty() {
        tracing::debug!(closure = %closure_node, "dropping closure consumed by fork");
        graph.remove_node(closure_node);
    }
    Ok(())
}
