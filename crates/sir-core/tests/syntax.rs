use pretty_assertions::assert_eq;
use sir_core::ast::{BinOpKind, Def, Expr, ExprKind, Param, Stmt, StmtKind};
use sir_core::Span;

#[test]
fn builders_produce_expected_shapes() {
    let def = Def::new(
        "f",
        vec![Param::new("x").with_ty(Expr::var("Tensor"))],
        vec![Stmt::ret(Expr::binop(BinOpKind::Add, Expr::var("x"), Expr::int(1)))],
    )
    .with_ret_ty(Expr::var("Tensor"));

    assert_eq!(def.name.as_str(), "f");
    assert_eq!(def.params[0].ty, Some(Expr::var("Tensor")));
    assert!(def.body[0].is_return());
    match &def.body[0].kind {
        StmtKind::Return(Some(value)) => match &value.kind {
            ExprKind::BinOp { op, .. } => assert_eq!(*op, BinOpKind::Add),
            other => panic!("unexpected {:?}", other),
        },
        other => panic!("unexpected {:?}", other),
    }
}

#[test]
fn operators_display_surface_syntax() {
    assert_eq!(BinOpKind::FloorDiv.to_string(), "//");
    assert_eq!(BinOpKind::IsNot.to_string(), "is not");
    assert_eq!("<=".parse::<BinOpKind>().ok(), Some(BinOpKind::Le));
    assert_eq!(BinOpKind::Div.magic_method(), Some("__truediv__"));
}

#[test]
fn syntax_tree_deserializes_from_json() {
    let json = r#"{
        "kind": { "Assign": {
            "lhs": { "kind": { "Var": "x" }, "span": { "file": 1, "lo": 0, "hi": 1 } },
            "ty": null,
            "rhs": { "kind": { "Const": { "Int": 3 } } }
        } },
        "span": { "file": 1, "lo": 0, "hi": 5 }
    }"#;
    let stmt: Stmt = serde_json::from_str(json).expect("valid syntax tree");
    assert_eq!(stmt.span, Span::new(1, 0, 5));
    match stmt.kind {
        StmtKind::Assign { lhs, rhs, .. } => {
            assert_eq!(lhs.as_var(), Some("x"));
            assert_eq!(lhs.span, Span::new(1, 0, 1));
            assert_eq!(rhs, Some(Expr::int(3)));
        }
        other => panic!("unexpected {:?}", other),
    }
}
