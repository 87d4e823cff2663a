use sir_core::ast::Literal;
use sir_core::ir::{Attr, BlockId, Builtin, Graph, NodeId, Op, ValueId};
use sir_core::{Span, Ty};
use std::collections::HashMap;

/// Where new nodes go: the end of `block`, or right before `before`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InsertPoint {
    pub block: BlockId,
    pub before: Option<NodeId>,
}

/// Graph plus an insertion point, with integer and float constants pooled at
/// the top of the root block.
pub struct GraphBuilder {
    graph: Graph,
    point: InsertPoint,
    ints: HashMap<i64, ValueId>,
    floats: HashMap<u64, ValueId>,
    pooled: usize,
}

impl Default for GraphBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl GraphBuilder {
    pub fn new() -> Self {
        let graph = Graph::new();
        let root = graph.root();
        Self {
            graph,
            point: InsertPoint {
                block: root,
                before: None,
            },
            ints: HashMap::new(),
            floats: HashMap::new(),
            pooled: 0,
        }
    }

    pub fn graph(&self) -> &Graph {
        &self.graph
    }

    pub fn graph_mut(&mut self) -> &mut Graph {
        &mut self.graph
    }

    pub fn finish(self) -> Graph {
        self.graph
    }

    pub fn insert_point(&self) -> InsertPoint {
        self.point
    }

    pub fn current_block(&self) -> BlockId {
        self.point.block
    }

    /// Move the insertion point, returning the previous one.
    pub fn set_insert_point(&mut self, point: InsertPoint) -> InsertPoint {
        std::mem::replace(&mut self.point, point)
    }

    /// Append to the end of `block`, returning the previous point.
    pub fn enter_block(&mut self, block: BlockId) -> InsertPoint {
        self.set_insert_point(InsertPoint {
            block,
            before: None,
        })
    }

    /// Insert before `node`, returning the previous point.
    pub fn enter_before(&mut self, node: NodeId) -> InsertPoint {
        let block = self.graph.node(node).owner.unwrap_or(self.point.block);
        self.set_insert_point(InsertPoint {
            block,
            before: Some(node),
        })
    }

    fn place(&mut self, node: NodeId) {
        match self.point.before {
            Some(before) => self.graph.insert_node_before(before, node),
            None => self.graph.append_node(self.point.block, node),
        }
    }

    pub fn insert(&mut self, op: Op, inputs: Vec<ValueId>, output_tys: Vec<Ty>, span: Span) -> NodeId {
        let node = self.graph.create_node(op, inputs, output_tys, span);
        self.place(node);
        node
    }

    /// Insert a single-output node and return its output.
    pub fn insert_value(&mut self, op: Op, inputs: Vec<ValueId>, ty: Ty, span: Span) -> ValueId {
        let node = self.insert(op, inputs, vec![ty], span);
        self.graph.output(node)
    }

    pub fn insert_builtin(&mut self, op: Builtin, inputs: Vec<ValueId>, ty: Ty, span: Span) -> ValueId {
        self.insert_value(Op::Builtin(op), inputs, ty, span)
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, attr: Attr) {
        self.graph.set_attr(node, name, attr);
    }

    pub fn ty(&self, value: ValueId) -> &Ty {
        self.graph.ty(value)
    }

    fn pooled_constant(&mut self, attr: Attr, ty: Ty) -> ValueId {
        let root = self.graph.root();
        let node = self.graph.create_node(Op::Constant, vec![], vec![ty], Span::null());
        self.graph.set_attr(node, "value", attr);
        self.graph.insert_node_at(root, self.pooled, node);
        self.pooled += 1;
        self.graph.output(node)
    }

    pub fn int(&mut self, value: i64) -> ValueId {
        if let Some(existing) = self.ints.get(&value) {
            return *existing;
        }
        let constant = self.pooled_constant(Attr::Int(value), Ty::Int);
        self.ints.insert(value, constant);
        constant
    }

    pub fn float(&mut self, value: f64) -> ValueId {
        let bits = value.to_bits();
        if let Some(existing) = self.floats.get(&bits) {
            return *existing;
        }
        let constant = self.pooled_constant(Attr::Float(value), Ty::Float);
        self.floats.insert(bits, constant);
        constant
    }

    fn local_constant(&mut self, attr: Attr, ty: Ty, span: Span) -> ValueId {
        let node = self.insert(Op::Constant, vec![], vec![ty], span);
        self.graph.set_attr(node, "value", attr);
        self.graph.output(node)
    }

    pub fn bool(&mut self, value: bool, span: Span) -> ValueId {
        self.local_constant(Attr::Bool(value), Ty::Bool, span)
    }

    pub fn str(&mut self, value: &str, span: Span) -> ValueId {
        self.local_constant(Attr::Str(value.to_string()), Ty::Str, span)
    }

    /// A `None` constant; `ty` may be an optional type it should carry.
    pub fn none(&mut self, ty: Ty, span: Span) -> ValueId {
        self.local_constant(Attr::None, ty, span)
    }

    pub fn literal(&mut self, literal: &Literal, span: Span) -> ValueId {
        match literal {
            Literal::Int(v) => self.int(*v),
            Literal::Float(v) => self.float(*v),
            Literal::Str(s) => self.str(s, span),
            Literal::Bool(b) => self.bool(*b, span),
            Literal::None => self.none(Ty::None, span),
        }
    }

    /// Constant payload of `value`, if it is produced by `prim::Constant`.
    pub fn constant_of(&self, value: ValueId) -> Option<&Attr> {
        let node = self.graph.producer(value)?;
        let data = self.graph.node(node);
        (data.op == Op::Constant).then(|| data.attr("value")).flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn numeric_constants_are_pooled_at_the_top() {
        let mut b = GraphBuilder::new();
        let root = b.graph().root();
        let x = b.graph_mut().add_input(Ty::Tensor);
        let node = b.insert(Op::Print, vec![x], vec![], Span::null());
        let one = b.int(1);
        let half = b.float(0.5);
        assert_eq!(b.int(1), one);
        assert_eq!(b.float(0.5), half);

        let nodes = &b.graph().block(root).nodes;
        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[2], node);
        assert_eq!(b.constant_of(one), Some(&Attr::Int(1)));
        assert_eq!(b.constant_of(x), None);
    }

    #[test]
    fn insertion_points_nest() {
        let mut b = GraphBuilder::new();
        let root = b.graph().root();
        let holder = b.insert(Op::Loop, vec![], vec![], Span::null());
        let body = b.graph_mut().add_node_block(holder);

        let saved = b.enter_block(body);
        let inner = b.bool(true, Span::null());
        b.set_insert_point(saved);
        let before = b.enter_before(holder);
        let outer = b.str("s", Span::null());
        b.set_insert_point(before);

        assert_eq!(b.current_block(), root);
        let graph = b.graph();
        assert_eq!(graph.producer(inner).and_then(|n| graph.node(n).owner), Some(body));
        assert_eq!(graph.block(root).nodes[0], graph.producer(outer).unwrap());
    }
}
