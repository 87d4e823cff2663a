use pretty_assertions::assert_eq;
use sir_core::ir::{Attr, Builtin, Graph, Op};
use sir_core::pretty::{pretty, PrettyOptions};
use sir_core::{Span, Ty};
use std::collections::HashMap;

fn constant(graph: &mut Graph, block: sir_core::ir::BlockId, value: i64) -> sir_core::ir::ValueId {
    let node = graph.create_node(Op::Constant, vec![], vec![Ty::Int], Span::null());
    graph.set_attr(node, "value", Attr::Int(value));
    graph.append_node(block, node);
    graph.output(node)
}

#[test]
fn prints_straight_line_graph() {
    let mut graph = Graph::new();
    let root = graph.root();
    let x = graph.add_input(Ty::Tensor);
    graph.value_mut(x).debug_name = Some("x".into());
    let one = constant(&mut graph, root, 1);
    let add = graph.create_node(Builtin::Add.into(), vec![x, one], vec![Ty::Tensor], Span::null());
    graph.append_node(root, add);
    let out = graph.output(add);
    graph.register_output(root, out);

    let expected = "\
graph(%x.0 : Tensor):
  %1 : int = prim::Constant[value=1]()
  %2 : Tensor = ops::add(%x.0, %1)
  return (%2)
";
    assert_eq!(graph.to_string(), expected);
}

#[test]
fn prints_nested_blocks_and_hides_types_on_request() {
    let mut graph = Graph::new();
    let root = graph.root();
    let cond = graph.add_input(Ty::Bool);
    let node = graph.create_node(Op::If, vec![cond], vec![Ty::Int], Span::null());
    graph.append_node(root, node);
    let then_block = graph.add_node_block(node);
    let else_block = graph.add_node_block(node);
    let a = constant(&mut graph, then_block, 1);
    graph.register_output(then_block, a);
    let b = constant(&mut graph, else_block, 2);
    graph.register_output(else_block, b);
    let out = graph.output(node);
    graph.register_output(root, out);

    let expected = "\
graph(%0 : bool):
  %1 : int = prim::If(%0)
    block0():
      %2 : int = prim::Constant[value=1]()
      -> (%2)
    block1():
      %3 : int = prim::Constant[value=2]()
      -> (%3)
  return (%1)
";
    assert_eq!(graph.to_string(), expected);

    let options = PrettyOptions {
        show_types: false,
        ..PrettyOptions::default()
    };
    let untyped = pretty(&graph, options).to_string();
    assert!(untyped.contains("%1 = prim::If(%0)"));
    assert!(untyped.starts_with("graph(%0):"));
}

#[test]
fn zero_output_nodes_print_without_lhs() {
    let mut graph = Graph::new();
    let root = graph.root();
    let x = graph.add_input(Ty::Int);
    let store = graph.create_node(Op::Store, vec![x], vec![], Span::null());
    graph.set_attr(store, "name", Attr::Str("x".into()));
    graph.append_node(root, store);
    assert!(graph.to_string().contains("\n  = prim::Store[name=\"x\"](%0)\n"));
}

#[test]
fn clone_block_maps_outer_values_through_env() {
    let mut graph = Graph::new();
    let root = graph.root();
    let outer = graph.add_input(Ty::Tensor);
    let holder = graph.create_node(Op::Closure, vec![], vec![Ty::None], Span::null());
    graph.append_node(root, holder);
    let body = graph.add_node_block(holder);
    let use_twice = graph.create_node(
        Builtin::Mul.into(),
        vec![outer, outer],
        vec![Ty::Tensor],
        Span::null(),
    );
    graph.append_node(body, use_twice);
    let result = graph.output(use_twice);
    graph.register_output(body, result);

    let mut lifted = Graph::new();
    let lifted_root = lifted.root();
    let mut map = HashMap::new();
    let mut captured = Vec::new();
    graph.clone_block_into(body, &mut lifted, lifted_root, &mut map, &mut |dst, value| {
        captured.push(value);
        dst.add_input(Ty::Tensor)
    });

    assert_eq!(captured, vec![outer]);
    assert_eq!(lifted.inputs().len(), 1);
    let copied = lifted.walk(lifted_root);
    assert_eq!(copied.len(), 1);
    let input = lifted.inputs()[0];
    assert_eq!(lifted.node(copied[0]).inputs, vec![input, input]);
}

#[test]
fn walk_and_uses_follow_nested_blocks() {
    let mut graph = Graph::new();
    let root = graph.root();
    let x = graph.add_input(Ty::Int);
    let lp = graph.create_node(Op::Loop, vec![], vec![], Span::null());
    graph.append_node(root, lp);
    let body = graph.add_node_block(lp);
    let user = graph.create_node(Op::Print, vec![x], vec![], Span::null());
    graph.append_node(body, user);

    assert_eq!(graph.walk(root), vec![lp, user]);
    assert_eq!(graph.uses(x), vec![user]);
    graph.remove_node(user);
    assert!(graph.uses(x).is_empty());
}

#[test]
fn subgraphs_can_be_collapsed() {
    let mut body = Graph::new();
    let y = body.add_input(Ty::Tensor);
    let root = body.root();
    body.register_output(root, y);

    let mut graph = Graph::new();
    let root = graph.root();
    let x = graph.add_input(Ty::Tensor);
    let fork = graph.create_node(Op::Fork, vec![x], vec![Ty::future(Ty::Tensor)], Span::null());
    graph.node_mut(fork).subgraph = Some(Box::new(body));
    graph.append_node(root, fork);

    assert!(graph.to_string().contains("    graph(%0 : Tensor):\n"));
    let options = PrettyOptions {
        show_subgraphs: false,
        ..PrettyOptions::default()
    };
    let collapsed = pretty(&graph, options).to_string();
    assert!(collapsed.contains("    graph<1 inputs>\n"));
    assert!(!collapsed.contains("    graph("));
}
