//! Typed, block-structured dataflow graph.
//!
//! Values, nodes and blocks live in arenas owned by [`Graph`] and are
//! referred to by index. Insertion order is preserved everywhere, so
//! printing the same graph twice yields the same text.

use crate::span::Span;
use crate::ty::Ty;
use derive_more::{Display, From};
use std::collections::HashMap;

mod op;
mod pretty;

pub use op::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
#[display("%{_0}")]
pub struct ValueId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
#[display("n{_0}")]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Display, From)]
#[display("block{_0}")]
pub struct BlockId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueOrigin {
    Node { node: NodeId, offset: usize },
    Param { block: BlockId, offset: usize },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ValueData {
    pub ty: Ty,
    pub origin: ValueOrigin,
    pub debug_name: Option<String>,
}

/// Node attribute payloads.
#[derive(Debug, Clone, PartialEq)]
pub enum Attr {
    Int(i64),
    Float(f64),
    Str(String),
    Bool(bool),
    None,
}

impl Attr {
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Attr::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Attr::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Attr::Bool(b) => Some(*b),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeData {
    pub op: Op,
    pub inputs: Vec<ValueId>,
    pub outputs: Vec<ValueId>,
    pub blocks: Vec<BlockId>,
    pub attrs: Vec<(String, Attr)>,
    /// Block the node is inserted in; `None` while detached.
    pub owner: Option<BlockId>,
    pub span: Span,
    /// Standalone body of a lifted closure or fork.
    pub subgraph: Option<Box<Graph>>,
}

impl NodeData {
    pub fn attr(&self, name: &str) -> Option<&Attr> {
        self.attrs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, attr)| attr)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BlockData {
    pub params: Vec<ValueId>,
    pub nodes: Vec<NodeId>,
    pub returns: Vec<ValueId>,
    pub owner: Option<NodeId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Graph {
    values: Vec<ValueData>,
    nodes: Vec<NodeData>,
    blocks: Vec<BlockData>,
    root: BlockId,
}

impl Default for Graph {
    fn default() -> Self {
        Self::new()
    }
}

impl Graph {
    pub fn new() -> Self {
        Self {
            values: Vec::new(),
            nodes: Vec::new(),
            blocks: vec![BlockData::default()],
            root: BlockId(0),
        }
    }

    pub fn root(&self) -> BlockId {
        self.root
    }

    pub fn value(&self, id: ValueId) -> &ValueData {
        &self.values[id.0 as usize]
    }

    pub fn value_mut(&mut self, id: ValueId) -> &mut ValueData {
        &mut self.values[id.0 as usize]
    }

    pub fn ty(&self, id: ValueId) -> &Ty {
        &self.value(id).ty
    }

    pub fn node(&self, id: NodeId) -> &NodeData {
        &self.nodes[id.0 as usize]
    }

    pub fn node_mut(&mut self, id: NodeId) -> &mut NodeData {
        &mut self.nodes[id.0 as usize]
    }

    pub fn block(&self, id: BlockId) -> &BlockData {
        &self.blocks[id.0 as usize]
    }

    pub fn block_mut(&mut self, id: BlockId) -> &mut BlockData {
        &mut self.blocks[id.0 as usize]
    }

    pub fn inputs(&self) -> &[ValueId] {
        &self.block(self.root).params
    }

    pub fn outputs(&self) -> &[ValueId] {
        &self.block(self.root).returns
    }

    /// Node producing `value`, if it is not a block parameter.
    pub fn producer(&self, value: ValueId) -> Option<NodeId> {
        match self.value(value).origin {
            ValueOrigin::Node { node, .. } => Some(node),
            ValueOrigin::Param { .. } => None,
        }
    }

    fn new_value(&mut self, ty: Ty, origin: ValueOrigin) -> ValueId {
        let id = ValueId(self.values.len() as u32);
        self.values.push(ValueData {
            ty,
            origin,
            debug_name: None,
        });
        id
    }

    pub fn add_input(&mut self, ty: Ty) -> ValueId {
        let root = self.root;
        self.add_block_param(root, ty)
    }

    pub fn add_block_param(&mut self, block: BlockId, ty: Ty) -> ValueId {
        let offset = self.block(block).params.len();
        let value = self.new_value(ty, ValueOrigin::Param { block, offset });
        self.block_mut(block).params.push(value);
        value
    }

    pub fn register_output(&mut self, block: BlockId, value: ValueId) {
        self.block_mut(block).returns.push(value);
    }

    /// Create a detached node with one output per entry of `output_tys`.
    pub fn create_node(
        &mut self,
        op: Op,
        inputs: Vec<ValueId>,
        output_tys: Vec<Ty>,
        span: Span,
    ) -> NodeId {
        let node = NodeId(self.nodes.len() as u32);
        self.nodes.push(NodeData {
            op,
            inputs,
            outputs: Vec::new(),
            blocks: Vec::new(),
            attrs: Vec::new(),
            owner: None,
            span,
            subgraph: None,
        });
        for ty in output_tys {
            self.add_node_output(node, ty);
        }
        node
    }

    pub fn add_node_output(&mut self, node: NodeId, ty: Ty) -> ValueId {
        let offset = self.node(node).outputs.len();
        let value = self.new_value(ty, ValueOrigin::Node { node, offset });
        self.node_mut(node).outputs.push(value);
        value
    }

    pub fn add_node_input(&mut self, node: NodeId, value: ValueId) {
        self.node_mut(node).inputs.push(value);
    }

    pub fn add_node_block(&mut self, node: NodeId) -> BlockId {
        let block = BlockId(self.blocks.len() as u32);
        self.blocks.push(BlockData {
            owner: Some(node),
            ..BlockData::default()
        });
        self.node_mut(node).blocks.push(block);
        block
    }

    pub fn set_attr(&mut self, node: NodeId, name: &str, attr: Attr) {
        let data = self.node_mut(node);
        match data.attrs.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = attr,
            None => data.attrs.push((name.to_string(), attr)),
        }
    }

    pub fn output(&self, node: NodeId) -> ValueId {
        self.node(node).outputs[0]
    }

    pub fn append_node(&mut self, block: BlockId, node: NodeId) {
        self.node_mut(node).owner = Some(block);
        self.block_mut(block).nodes.push(node);
    }

    /// Insert `node` into `block` at position `index`.
    pub fn insert_node_at(&mut self, block: BlockId, index: usize, node: NodeId) {
        self.node_mut(node).owner = Some(block);
        let nodes = &mut self.block_mut(block).nodes;
        let index = index.min(nodes.len());
        nodes.insert(index, node);
    }

    /// Insert `node` immediately before `before`, in `before`'s block.
    pub fn insert_node_before(&mut self, before: NodeId, node: NodeId) {
        let Some(block) = self.node(before).owner else {
            return;
        };
        let index = self
            .block(block)
            .nodes
            .iter()
            .position(|n| *n == before)
            .unwrap_or(self.block(block).nodes.len());
        self.insert_node_at(block, index, node);
    }

    /// Detach `node` from its block. Its values stay in the arena.
    pub fn remove_node(&mut self, node: NodeId) {
        if let Some(block) = self.node(node).owner {
            self.block_mut(block).nodes.retain(|n| *n != node);
        }
        self.node_mut(node).owner = None;
    }

    /// Every node reachable from `block`, in pre-order.
    pub fn walk(&self, block: BlockId) -> Vec<NodeId> {
        let mut out = Vec::new();
        self.walk_into(block, &mut out);
        out
    }

    fn walk_into(&self, block: BlockId, out: &mut Vec<NodeId>) {
        for &node in &self.block(block).nodes {
            out.push(node);
            for &nested in &self.node(node).blocks {
                self.walk_into(nested, out);
            }
        }
    }

    /// Nodes (reachable from the root) that consume `value`.
    pub fn uses(&self, value: ValueId) -> Vec<NodeId> {
        self.walk(self.root)
            .into_iter()
            .filter(|node| self.node(*node).inputs.contains(&value))
            .collect()
    }

    /// Copy the nodes of `src` (with their nested blocks) into `dst_block` of
    /// `dst`. `map` carries already-translated values; `env` translates a
    /// value defined outside `src` the first time it is referenced.
    pub fn clone_block_into(
        &self,
        src: BlockId,
        dst: &mut Graph,
        dst_block: BlockId,
        map: &mut HashMap<ValueId, ValueId>,
        env: &mut dyn FnMut(&mut Graph, ValueId) -> ValueId,
    ) {
        for &node in &self.block(src).nodes {
            let data = self.node(node);
            let inputs = data
                .inputs
                .iter()
                .map(|v| self.translate(*v, dst, map, env))
                .collect();
            let output_tys = data
                .outputs
                .iter()
                .map(|v| self.ty(*v).clone())
                .collect();
            let copy = dst.create_node(data.op, inputs, output_tys, data.span);
            dst.node_mut(copy).attrs = data.attrs.clone();
            dst.node_mut(copy).subgraph = data.subgraph.clone();
            for (old, new) in data.outputs.iter().zip(dst.node(copy).outputs.clone()) {
                dst.value_mut(new).debug_name = self.value(*old).debug_name.clone();
                map.insert(*old, new);
            }
            for &nested in &data.blocks {
                let copy_block = dst.add_node_block(copy);
                for &param in &self.block(nested).params {
                    let new = dst.add_block_param(copy_block, self.ty(param).clone());
                    dst.value_mut(new).debug_name = self.value(param).debug_name.clone();
                    map.insert(param, new);
                }
                self.clone_block_into(nested, dst, copy_block, map, env);
                for &ret in &self.block(nested).returns {
                    let new = self.translate(ret, dst, map, env);
                    dst.register_output(copy_block, new);
                }
            }
            dst.append_node(dst_block, copy);
        }
    }

    /// Translate one value for [`Graph::clone_block_into`].
    pub fn translate(
        &self,
        value: ValueId,
        dst: &mut Graph,
        map: &mut HashMap<ValueId, ValueId>,
        env: &mut dyn FnMut(&mut Graph, ValueId) -> ValueId,
    ) -> ValueId {
        if let Some(mapped) = map.get(&value) {
            return *mapped;
        }
        let mapped = env(dst, value);
        map.insert(value, mapped);
        mapped
    }

    /// Name used for a value when printing: `%name.id` for named values.
    pub fn value_name(&self, value: ValueId) -> String {
        match &self.value(value).debug_name {
            Some(name) => format!("%{}.{}", name, value.0),
            None => value.to_string(),
        }
    }
}
