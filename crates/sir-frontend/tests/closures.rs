use pretty_assertions::assert_eq;
use sir_core::ast::{BinOpKind, Def, Expr, Param, Stmt};
use sir_core::ir::{Graph, NodeId, Op};
use sir_core::{ErrorKind, Ty};
use sir_frontend::{compile, FrontendConfig, NullResolver};

/// def f(x):
///     def g(y):
///         return x + y
///     fut = fork(g, x)
///     return fut
fn forking_def() -> Def {
    let g = Def::new(
        "g",
        vec![Param::new("y")],
        vec![Stmt::ret(Expr::binop(
            BinOpKind::Add,
            Expr::var("x"),
            Expr::var("y"),
        ))],
    );
    Def::new(
        "f",
        vec![Param::new("x")],
        vec![
            Stmt::def(g),
            Stmt::assign_var(
                "fut",
                Expr::call_named("fork", vec![Expr::var("g"), Expr::var("x")]),
            ),
            Stmt::ret(Expr::var("fut")),
        ],
    )
}

fn find(graph: &Graph, op: Op) -> Option<NodeId> {
    graph
        .walk(graph.root())
        .into_iter()
        .find(|node| graph.node(*node).op == op)
}

#[test]
fn fork_of_nested_def_is_lifted() {
    let compiled = compile(&forking_def(), &NullResolver, &FrontendConfig::default()).unwrap();
    let graph = &compiled.graph;
    assert_eq!(compiled.schema.ret, Ty::future(Ty::Tensor));
    assert!(find(graph, Op::Closure).is_none());
    assert!(find(graph, Op::ForkClosure).is_none());

    let fork = find(graph, Op::Fork).unwrap();
    let data = graph.node(fork);
    let body = data.subgraph.as_ref().unwrap();
    // the forked argument, then the captured `x`
    assert_eq!(data.inputs.len(), 2);
    assert_eq!(body.inputs().len(), 2);
    assert_eq!(body.ty(body.outputs()[0]), &Ty::Tensor);
    assert!(data.blocks.is_empty());
}

#[test]
fn outer_reads_happen_before_the_closure() {
    let config = FrontendConfig::default().with_lift_closures(false);
    let compiled = compile(&forking_def(), &NullResolver, &config).unwrap();
    let graph = &compiled.graph;

    let closure = find(graph, Op::Closure).unwrap();
    let root_nodes = &graph.block(graph.root()).nodes;
    let position = |node: NodeId| root_nodes.iter().position(|n| *n == node);
    let closure_at = position(closure).unwrap();
    let body = graph.node(closure).blocks[0];
    let load_of_x = graph
        .walk(body)
        .into_iter()
        .flat_map(|node| graph.node(node).inputs.clone())
        .filter_map(|value| graph.producer(value))
        .find(|node| graph.node(*node).owner == Some(graph.root()))
        .unwrap();
    assert!(position(load_of_x).unwrap() < closure_at);

    let fork = find(graph, Op::ForkClosure).unwrap();
    assert_eq!(graph.node(fork).inputs[0], graph.output(closure));
}

#[test]
fn fork_of_a_builtin_wraps_the_call() {
    let def = Def::new(
        "f",
        vec![Param::new("xs").with_ty(Expr::subscript(
            Expr::var("List"),
            vec![Expr::var("int")],
        ))],
        vec![Stmt::ret(Expr::call_named(
            "fork",
            vec![Expr::var("len"), Expr::var("xs")],
        ))],
    );
    let compiled = compile(&def, &NullResolver, &FrontendConfig::default()).unwrap();
    assert_eq!(compiled.schema.ret, Ty::future(Ty::Int));
    let fork = find(&compiled.graph, Op::Fork).unwrap();
    let data = compiled.graph.node(fork);
    assert_eq!(data.inputs.len(), 1);
    assert_eq!(data.subgraph.as_ref().unwrap().inputs().len(), 1);
}

#[test]
fn closures_must_be_forked() {
    let def = Def::new(
        "f",
        vec![],
        vec![
            Stmt::def(Def::new("g", vec![], vec![Stmt::ret(Expr::int(1))])),
            Stmt::ret(Expr::call_named("g", vec![])),
        ],
    );
    let err = compile(&def, &NullResolver, &FrontendConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn closures_cannot_be_rebound_to_plain_values_in_inner_blocks() {
    let def = Def::new(
        "f",
        vec![Param::new("c").with_ty(Expr::var("bool"))],
        vec![
            Stmt::def(Def::new("g", vec![], vec![Stmt::ret(Expr::int(1))])),
            Stmt::if_(
                Expr::var("c"),
                vec![Stmt::assign_var("g", Expr::int(2))],
                vec![],
            ),
        ],
    );
    let err = compile(&def, &NullResolver, &FrontendConfig::default()).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(err.message().starts_with("Cannot re-assign 'g'"));
}

#[test]
fn compiling_twice_prints_identically() {
    let config = FrontendConfig::default();
    let first = compile(&forking_def(), &NullResolver, &config).unwrap();
    let second = compile(&forking_def(), &NullResolver, &config).unwrap();
    assert_eq!(first.graph.to_string(), second.graph.to_string());
}

/// Ops of `graph` and of every subgraph nested in it.
fn ops_deep(graph: &Graph) -> Vec<Op> {
    let mut out = Vec::new();
    for node in graph.walk(graph.root()) {
        let data = graph.node(node);
        out.push(data.op);
        if let Some(subgraph) = &data.subgraph {
            out.extend(ops_deep(subgraph));
        }
    }
    out
}

#[test]
fn outer_names_read_by_one_branch_are_captured() {
    // def g(c: bool, y):
    //     if c:
    //         x = y
    //     return x
    let g = Def::new(
        "g",
        vec![
            Param::new("c").with_ty(Expr::var("bool")),
            Param::new("y"),
        ],
        vec![
            Stmt::if_(
                Expr::var("c"),
                vec![Stmt::assign_var("x", Expr::var("y"))],
                vec![],
            ),
            Stmt::ret(Expr::var("x")),
        ],
    );
    let def = Def::new(
        "f",
        vec![Param::new("x")],
        vec![
            Stmt::def(g),
            Stmt::ret(Expr::call_named(
                "fork",
                vec![Expr::var("g"), Expr::bool_lit(true), Expr::var("x")],
            )),
        ],
    );
    let compiled = compile(&def, &NullResolver, &FrontendConfig::default()).unwrap();
    let graph = &compiled.graph;
    let fork = find(graph, Op::Fork).unwrap();
    let data = graph.node(fork);
    let body = data.subgraph.as_ref().unwrap();
    // c, y, then the captured x
    assert_eq!(body.inputs().len(), 3);
    assert_eq!(data.inputs.len(), 3);

    let branch = find(body, Op::If).unwrap();
    let otherwise = body.node(branch).blocks[1];
    assert!(body.block(otherwise).nodes.is_empty());
    assert_eq!(body.block(otherwise).returns, vec![body.inputs()[2]]);
}

#[test]
fn forks_of_outer_closures_inside_closures_are_lowered() {
    // def g(): return x
    // def h(): return fork(g)
    // return fork(h)
    let g = Def::new("g", vec![], vec![Stmt::ret(Expr::var("x"))]);
    let h = Def::new(
        "h",
        vec![],
        vec![Stmt::ret(Expr::call_named("fork", vec![Expr::var("g")]))],
    );
    let def = Def::new(
        "f",
        vec![Param::new("x")],
        vec![
            Stmt::def(g),
            Stmt::def(h),
            Stmt::ret(Expr::call_named("fork", vec![Expr::var("h")])),
        ],
    );
    let compiled = compile(&def, &NullResolver, &FrontendConfig::default()).unwrap();
    assert_eq!(compiled.schema.ret, Ty::future(Ty::future(Ty::Tensor)));

    let all = ops_deep(&compiled.graph);
    assert!(!all.contains(&Op::ForkClosure));
    assert!(!all.contains(&Op::Closure));
    assert_eq!(all.iter().filter(|op| **op == Op::Fork).count(), 2);

    let outer = find(&compiled.graph, Op::Fork).unwrap();
    let outer = compiled.graph.node(outer);
    let h_body = outer.subgraph.as_ref().unwrap();
    // h captures what g captures
    assert_eq!(outer.inputs.len(), 1);
    assert_eq!(h_body.inputs().len(), 1);
    let inner = find(h_body, Op::Fork).unwrap();
    assert_eq!(h_body.node(inner).inputs, vec![h_body.inputs()[0]]);
    assert_eq!(h_body.ty(h_body.inputs()[0]), &Ty::Tensor);
}
