use pretty_assertions::assert_eq;
use sir_core::ast::{BinOpKind, Def, Expr, Param, Stmt};
use sir_core::ir::{Attr, Builtin, Graph, Op};
use sir_core::{ErrorKind, Ty};
use sir_frontend::{compile, CompiledFunction, FrontendConfig, NullResolver};

fn compile_def(def: &Def) -> sir_core::Result<CompiledFunction> {
    compile(def, &NullResolver, &FrontendConfig::default())
}

fn ops(graph: &Graph) -> Vec<Op> {
    graph
        .walk(graph.root())
        .into_iter()
        .map(|node| graph.node(node).op)
        .collect()
}

fn builtins(graph: &Graph) -> Vec<Builtin> {
    ops(graph)
        .into_iter()
        .filter_map(|op| match op {
            Op::Builtin(builtin) => Some(builtin),
            _ => None,
        })
        .collect()
}

fn count_named(graph: &Graph, op: Op, name: &str) -> usize {
    graph
        .walk(graph.root())
        .into_iter()
        .filter(|node| {
            let data = graph.node(*node);
            data.op == op && data.attr("name") == Some(&Attr::Str(name.to_string()))
        })
        .count()
}

fn param(name: &str, ty: &str) -> Param {
    Param::new(name).with_ty(Expr::var(ty))
}

fn optional(ty: &str) -> Expr {
    Expr::subscript(Expr::var("Optional"), vec![Expr::var(ty)])
}

#[test]
fn straight_line_assignment_loads_and_stores_once() {
    let def = Def::new(
        "f",
        vec![],
        vec![Stmt::assign_var("x", Expr::int(1)), Stmt::ret(Expr::var("x"))],
    );
    let compiled = compile_def(&def).unwrap();
    let graph = &compiled.graph;

    let constants = ops(graph).into_iter().filter(|op| *op == Op::Constant).count();
    assert_eq!(constants, 1);
    assert_eq!(count_named(graph, Op::Store, "x"), 1);
    assert_eq!(count_named(graph, Op::Load, "x"), 1);
    assert_eq!(graph.ty(graph.outputs()[0]), &Ty::Int);
    assert_eq!(compiled.schema.ret, Ty::Int);
}

#[test]
fn names_assigned_in_both_branches_get_the_unified_type() {
    let def = Def::new(
        "f",
        vec![param("c", "bool")],
        vec![
            Stmt::if_(
                Expr::var("c"),
                vec![Stmt::assign_var("y", Expr::int(1))],
                vec![Stmt::assign_var("y", Expr::none())],
            ),
            Stmt::ret(Expr::var("y")),
        ],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::optional(Ty::Int));

    let graph = &compiled.graph;
    let if_node = graph
        .walk(graph.root())
        .into_iter()
        .find(|node| graph.node(*node).op == Op::If)
        .unwrap();
    let output = graph.node(if_node).outputs[0];
    assert_eq!(graph.ty(output), &Ty::optional(Ty::Int));
    for block in &graph.node(if_node).blocks {
        assert_eq!(graph.block(*block).returns.len(), 1);
    }
}

#[test]
fn rebinding_in_the_same_block_changes_the_type() {
    let def = Def::new(
        "f",
        vec![],
        vec![
            Stmt::assign_var("a", Expr::int(1)),
            Stmt::assign_var("a", Expr::str_lit("s")),
            Stmt::ret(Expr::var("a")),
        ],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::Str);
}

#[test]
fn conflicting_branch_types_fail_only_when_used() {
    let branches = Stmt::if_(
        Expr::var("c"),
        vec![Stmt::assign_var("a", Expr::int(1))],
        vec![Stmt::assign_var("a", Expr::str_lit("s"))],
    );
    let unused = Def::new("f", vec![param("c", "bool")], vec![branches.clone()]);
    assert!(compile_def(&unused).is_ok());

    let used = Def::new(
        "f",
        vec![param("c", "bool")],
        vec![
            branches,
            Stmt::expr(Expr::call_named("print", vec![Expr::var("a")])),
        ],
    );
    let err = compile_def(&used).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(err.message().contains("int"), "{}", err.message());
    assert!(err.message().contains("str"), "{}", err.message());
}

#[test]
fn is_none_refines_the_false_branch() {
    let def = Def::new(
        "f",
        vec![Param::new("x").with_ty(optional("int"))],
        vec![Stmt::if_(
            Expr::is_none(Expr::var("x")),
            vec![Stmt::ret(Expr::int(0))],
            vec![Stmt::ret(Expr::var("x"))],
        )],
    )
    .with_ret_ty(Expr::var("int"));
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::Int);
    assert!(ops(&compiled.graph).contains(&Op::UncheckedUnwrapOptional));
}

#[test]
fn static_none_checks_emit_only_the_taken_branch() {
    let def = Def::new(
        "f",
        vec![],
        vec![
            Stmt::assign_var("x", Expr::none()),
            Stmt::if_(
                Expr::is_none(Expr::var("x")),
                vec![Stmt::ret(Expr::int(1))],
                vec![Stmt::ret(Expr::str_lit("never"))],
            ),
        ],
    );
    let compiled = compile_def(&def).unwrap();
    assert!(!ops(&compiled.graph).contains(&Op::If));
    assert_eq!(compiled.schema.ret, Ty::Int);
}

#[test]
fn loops_over_tuples_are_unrolled() {
    let def = Def::new(
        "f",
        vec![],
        vec![Stmt::for_(
            Expr::var("v"),
            Expr::tuple(vec![Expr::int(1), Expr::str_lit("a")]),
            vec![Stmt::expr(Expr::call_named("print", vec![Expr::var("v")]))],
        )],
    );
    let compiled = compile_def(&def).unwrap();
    let ops = ops(&compiled.graph);
    assert!(!ops.contains(&Op::Loop));
    assert_eq!(ops.iter().filter(|op| **op == Op::Print).count(), 2);
}

#[test]
fn while_loops_run_with_maximal_trip_count() {
    let def = Def::new(
        "f",
        vec![param("c", "bool")],
        vec![Stmt::while_(Expr::var("c"), vec![Stmt::pass()])],
    );
    let compiled = compile_def(&def).unwrap();
    let graph = &compiled.graph;
    let loop_node = graph
        .walk(graph.root())
        .into_iter()
        .find(|node| graph.node(*node).op == Op::Loop)
        .unwrap();
    let trip = graph.node(loop_node).inputs[0];
    let producer = graph.producer(trip).unwrap();
    assert_eq!(graph.node(producer).attr("value"), Some(&Attr::Int(i64::MAX)));
    assert_eq!(graph.node(loop_node).blocks.len(), 2);
}

#[test]
fn for_range_yields_the_counter() {
    let def = Def::new(
        "f",
        vec![],
        vec![
            Stmt::assign_var("total", Expr::int(0)),
            Stmt::for_(
                Expr::var("i"),
                Expr::call_named("range", vec![Expr::int(10)]),
                vec![Stmt::aug_assign(Expr::var("total"), BinOpKind::Add, Expr::var("i"))],
            ),
            Stmt::ret(Expr::var("total")),
        ],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::Int);
    assert!(builtins(&compiled.graph).contains(&Builtin::Add));
}

#[test]
fn loop_locals_are_not_visible_after_the_loop() {
    let def = Def::new(
        "f",
        vec![],
        vec![
            Stmt::for_(
                Expr::var("i"),
                Expr::call_named("range", vec![Expr::int(3)]),
                vec![Stmt::assign_var("last", Expr::var("i"))],
            ),
            Stmt::ret(Expr::var("last")),
        ],
    );
    let err = compile_def(&def).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Name);
}

#[test]
fn tensor_subscript_assignment_applies_indices_in_order() {
    // x[0, :, None] = y
    let target = Expr::subscript(
        Expr::var("x"),
        vec![Expr::int(0), Expr::full_slice(), Expr::none()],
    );
    let def = Def::new(
        "f",
        vec![param("x", "Tensor"), param("y", "Tensor")],
        vec![Stmt::assign(target, Expr::var("y"))],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(
        builtins(&compiled.graph),
        vec![Builtin::Select, Builtin::Slice, Builtin::Unsqueeze, Builtin::Copy]
    );
}

#[test]
fn tensor_indices_become_an_index_list() {
    let def = Def::new(
        "f",
        vec![param("x", "Tensor"), param("idx", "Tensor")],
        vec![Stmt::ret(Expr::subscript(
            Expr::var("x"),
            vec![Expr::full_slice(), Expr::var("idx")],
        ))],
    );
    let compiled = compile_def(&def).unwrap();
    let graph = &compiled.graph;
    assert_eq!(builtins(graph), vec![Builtin::Slice, Builtin::Index]);
    let list = graph
        .walk(graph.root())
        .into_iter()
        .find(|node| graph.node(*node).op == Op::ListConstruct)
        .unwrap();
    assert_eq!(graph.node(list).inputs.len(), 2);
    assert_eq!(
        graph.ty(graph.node(list).outputs[0]),
        &Ty::list(Ty::optional_tensor())
    );
}

#[test]
fn tensor_indexing_after_an_ellipsis_is_unsupported() {
    let def = Def::new(
        "f",
        vec![param("x", "Tensor"), param("idx", "Tensor")],
        vec![Stmt::ret(Expr::subscript(
            Expr::var("x"),
            vec![Expr::ellipsis(), Expr::var("idx")],
        ))],
    );
    let err = compile_def(&def).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Unsupported);
}

#[test]
fn constant_tuple_indices_select_statically() {
    let tuple = Expr::tuple(vec![Expr::int(1), Expr::str_lit("a")]);
    let def = Def::new(
        "f",
        vec![],
        vec![
            Stmt::assign_var("t", tuple.clone()),
            Stmt::ret(Expr::subscript(Expr::var("t"), vec![Expr::int(-1)])),
        ],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::Str);
    assert!(ops(&compiled.graph).contains(&Op::TupleIndex));

    let out_of_range = Def::new(
        "f",
        vec![],
        vec![
            Stmt::assign_var("t", tuple),
            Stmt::ret(Expr::subscript(Expr::var("t"), vec![Expr::int(5)])),
        ],
    );
    let err = compile_def(&out_of_range).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(
        err.message(),
        "Tuple index out of range. Tuple is length 2 and index is 5"
    );
}

#[test]
fn starred_targets_pack_the_surplus() {
    let def = Def::new(
        "f",
        vec![],
        vec![
            Stmt::assign(
                Expr::tuple(vec![Expr::var("a"), Expr::starred(Expr::var("rest"))]),
                Expr::tuple(vec![Expr::int(1), Expr::int(2), Expr::float(3.0)]),
            ),
            Stmt::ret(Expr::var("rest")),
        ],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::tuple(vec![Ty::Int, Ty::Float]));
}

#[test]
fn unpacking_checks_the_element_count() {
    let def = Def::new(
        "f",
        vec![],
        vec![Stmt::assign(
            Expr::tuple(vec![Expr::var("a"), Expr::var("b")]),
            Expr::tuple(vec![Expr::int(1), Expr::int(2), Expr::int(3)]),
        )],
    );
    let err = compile_def(&def).unwrap_err();
    assert_eq!(err.message(), "too many values to unpack: need 2 but found 3");
}

#[test]
fn list_literals_need_a_single_element_type() {
    let empty = Def::new("f", vec![], vec![Stmt::ret(Expr::list(vec![]))]);
    assert_eq!(
        compile_def(&empty).unwrap().schema.ret,
        Ty::list(Ty::Tensor)
    );

    let mixed = Def::new(
        "f",
        vec![],
        vec![Stmt::ret(Expr::list(vec![Expr::int(1), Expr::str_lit("a")]))],
    );
    let err = compile_def(&mixed).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert!(err.message().starts_with("Lists must contain only a single type"));
}

#[test]
fn dict_literals_unify_keys_and_values() {
    let def = Def::new(
        "f",
        vec![],
        vec![Stmt::ret(Expr::dict(vec![
            (Expr::str_lit("a"), Expr::int(1)),
            (Expr::str_lit("b"), Expr::int(2)),
        ]))],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::dict(Ty::Str, Ty::Int));
}

#[test]
fn list_comprehensions_append_in_a_loop() {
    let def = Def::new(
        "f",
        vec![],
        vec![Stmt::ret(Expr::list_comp(
            Expr::var("i"),
            Expr::var("i"),
            Expr::call_named("range", vec![Expr::int(3)]),
        ))],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::list(Ty::Int));
    assert!(ops(&compiled.graph).contains(&Op::Loop));
    assert!(builtins(&compiled.graph).contains(&Builtin::Append));
}

#[test]
fn augmented_assignment_on_tensors_is_in_place() {
    let def = Def::new(
        "f",
        vec![param("x", "Tensor")],
        vec![
            Stmt::aug_assign(Expr::var("x"), BinOpKind::Add, Expr::int(1)),
            Stmt::ret(Expr::var("x")),
        ],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(builtins(&compiled.graph), vec![Builtin::AddInplace]);
}

#[test]
fn isinstance_is_decided_during_emission() {
    let def = Def::new(
        "f",
        vec![param("x", "int")],
        vec![Stmt::if_(
            Expr::call_named("isinstance", vec![Expr::var("x"), Expr::var("int")]),
            vec![Stmt::ret(Expr::var("x"))],
            vec![Stmt::ret(Expr::str_lit("unreachable"))],
        )],
    );
    let compiled = compile_def(&def).unwrap();
    assert!(!ops(&compiled.graph).contains(&Op::If));
    assert_eq!(compiled.schema.ret, Ty::Int);
}

#[test]
fn missing_return_on_a_path_is_reported() {
    let def = Def::new(
        "f",
        vec![param("c", "bool")],
        vec![Stmt::if_(
            Expr::var("c"),
            vec![Stmt::ret(Expr::int(1))],
            vec![Stmt::pass()],
        )],
    );
    let err = compile_def(&def).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Name);
    assert_eq!(err.message(), "function 'f' does not return along all paths");
}

#[test]
fn functions_without_return_produce_none() {
    let def = Def::new(
        "f",
        vec![],
        vec![Stmt::expr(Expr::call_named("print", vec![Expr::int(1)]))],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::None);

    let annotated = def.clone().with_ret_ty(Expr::var("int"));
    let err = compile_def(&annotated).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
}

fn stored_types(graph: &Graph, name: &str) -> Vec<Ty> {
    graph
        .walk(graph.root())
        .into_iter()
        .filter(|node| {
            let data = graph.node(*node);
            data.op == Op::Store && data.attr("name") == Some(&Attr::Str(name.to_string()))
        })
        .map(|node| graph.ty(graph.node(node).inputs[0]).clone())
        .collect()
}

fn generic(name: &str, args: &[&str]) -> Expr {
    Expr::subscript(Expr::var(name), args.iter().map(|arg| Expr::var(*arg)).collect())
}

fn positive(name: &str) -> Expr {
    Expr::binop(BinOpKind::Gt, Expr::var(name), Expr::int(0))
}

#[test]
fn and_narrows_its_right_operand() {
    let def = Def::new(
        "f",
        vec![Param::new("x").with_ty(optional("int"))],
        vec![Stmt::ret(Expr::and(
            Expr::is_not_none(Expr::var("x")),
            positive("x"),
        ))],
    );
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::Bool);
    let ops = ops(&compiled.graph);
    assert!(ops.contains(&Op::If));
    assert!(ops.contains(&Op::UncheckedUnwrapOptional));
}

#[test]
fn or_narrows_its_right_operand_on_the_false_side() {
    let def = Def::new(
        "f",
        vec![Param::new("x").with_ty(optional("int"))],
        vec![Stmt::ret(Expr::or(Expr::is_none(Expr::var("x")), positive("x")))],
    );
    let compiled = compile_def(&def).unwrap();
    assert!(ops(&compiled.graph).contains(&Op::UncheckedUnwrapOptional));
}

#[test]
fn optional_operands_need_narrowing() {
    let def = Def::new(
        "f",
        vec![Param::new("x").with_ty(optional("int"))],
        vec![Stmt::ret(positive("x"))],
    );
    assert_eq!(compile_def(&def).unwrap_err().kind(), ErrorKind::Type);
}

#[test]
fn ternaries_refine_each_arm() {
    let def = Def::new(
        "f",
        vec![Param::new("x").with_ty(optional("int"))],
        vec![Stmt::ret(Expr::ternary(
            Expr::is_not_none(Expr::var("x")),
            Expr::var("x"),
            Expr::int(0),
        ))],
    )
    .with_ret_ty(Expr::var("int"));
    let compiled = compile_def(&def).unwrap();
    assert_eq!(compiled.schema.ret, Ty::Int);
    assert_eq!(stored_types(&compiled.graph, "x").last(), Some(&Ty::Int));
}

#[test]
fn assert_raises_in_the_false_branch() {
    let def = Def::new(
        "f",
        vec![param("x", "bool")],
        vec![Stmt::assert(Expr::var("x"), None)],
    );
    let compiled = compile_def(&def).unwrap();
    let graph = &compiled.graph;
    let if_node = graph
        .walk(graph.root())
        .into_iter()
        .find(|node| graph.node(*node).op == Op::If)
        .unwrap();
    let blocks = &graph.node(if_node).blocks;
    assert!(graph.block(blocks[0]).nodes.is_empty());
    let raised: Vec<Op> = graph
        .block(blocks[1])
        .nodes
        .iter()
        .map(|node| graph.node(*node).op)
        .collect();
    assert_eq!(raised.last(), Some(&Op::Raise));
}

#[test]
fn return_types_must_unify() {
    let def = Def::new(
        "f",
        vec![param("c", "bool")],
        vec![Stmt::if_(
            Expr::var("c"),
            vec![Stmt::ret(Expr::int(1))],
            vec![Stmt::ret(Expr::str_lit("a"))],
        )],
    );
    let err = compile_def(&def).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(
        err.message(),
        "Previous return statement returned a value of type int but this return statement returns a value of type str"
    );
}

#[test]
fn annotated_returns_must_convert() {
    let def = Def::new("f", vec![], vec![Stmt::ret(Expr::str_lit("a"))])
        .with_ret_ty(Expr::var("int"));
    let err = compile_def(&def).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(
        err.message(),
        "Return value was annotated as having type int but is actually of type str"
    );
}

#[test]
fn rebinding_in_an_inner_block_keeps_the_outer_type() {
    let def = Def::new(
        "f",
        vec![param("c", "bool")],
        vec![
            Stmt::assign_var("x", Expr::int(1)),
            Stmt::if_(
                Expr::var("c"),
                vec![Stmt::assign_var("x", Expr::str_lit("s"))],
                vec![],
            ),
        ],
    );
    let err = compile_def(&def).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Type);
    assert_eq!(
        err.message(),
        "Variable 'x' previously has type int but is now being assigned to a value of type str"
    );
}

#[test]
fn dicts_iterate_over_their_keys() {
    let def = Def::new(
        "f",
        vec![Param::new("d").with_ty(generic("Dict", &["str", "int"]))],
        vec![Stmt::for_(
            Expr::var("k"),
            Expr::var("d"),
            vec![Stmt::pass()],
        )],
    );
    let compiled = compile_def(&def).unwrap();
    assert!(builtins(&compiled.graph).contains(&Builtin::Keys));
    assert_eq!(stored_types(&compiled.graph, "k"), vec![Ty::Str]);
}

#[test]
fn enumerate_and_zip_yield_tuples() {
    let def = Def::new(
        "f",
        vec![
            Param::new("xs").with_ty(generic("List", &["int"])),
            Param::new("ys").with_ty(generic("List", &["float"])),
        ],
        vec![
            Stmt::for_(
                Expr::tuple(vec![Expr::var("i"), Expr::var("x")]),
                Expr::call_named("enumerate", vec![Expr::var("xs")]),
                vec![Stmt::pass()],
            ),
            Stmt::for_(
                Expr::tuple(vec![Expr::var("a"), Expr::var("b")]),
                Expr::call_named("zip", vec![Expr::var("xs"), Expr::var("ys")]),
                vec![Stmt::pass()],
            ),
        ],
    );
    let compiled = compile_def(&def).unwrap();
    let graph = &compiled.graph;
    assert_eq!(stored_types(graph, "i"), vec![Ty::Int]);
    assert_eq!(stored_types(graph, "x"), vec![Ty::Int]);
    assert_eq!(stored_types(graph, "a"), vec![Ty::Int]);
    assert_eq!(stored_types(graph, "b"), vec![Ty::Float]);
}
