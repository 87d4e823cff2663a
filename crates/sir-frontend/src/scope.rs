//! The scope chain: a stack of frames, one per emitted block.
//!
//! Plain data is tracked by type only; its values are re-materialized with
//! `prim::Load` when read. Everything else is kept as a sugared value.

use crate::sugared::SugaredValue;
use sir_core::ir::{BlockId, NodeId};
use sir_core::{Error, ErrorKind, Span, Ty};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Debug, Formatter};
use std::rc::Rc;

#[derive(Debug, Clone)]
pub enum Binding {
    Plain(Ty),
    Sugared(SugaredValue),
}

#[derive(Debug, Clone)]
pub struct Frame {
    pub block: BlockId,
    /// The frame is the body of a function or closure.
    pub starts_def: bool,
    /// Closure node owning `block`, for closure bodies.
    pub closure: Option<NodeId>,
    pub parent: Option<usize>,
    bindings: BTreeMap<String, Binding>,
    /// Names whose only binding in this frame is a refinement.
    refined: BTreeSet<String>,
    /// Diagnostics deferred until first use; kept on function body frames.
    deferred: BTreeMap<String, DeferredError>,
}

impl Frame {
    fn new(block: BlockId, starts_def: bool, closure: Option<NodeId>, parent: Option<usize>) -> Self {
        Self {
            block,
            starts_def,
            closure,
            parent,
            bindings: BTreeMap::new(),
            refined: BTreeSet::new(),
            deferred: BTreeMap::new(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Binding> {
        self.bindings.get(name)
    }

    /// Binding of `name` assigned in this frame, ignoring refinements.
    pub fn assigned(&self, name: &str) -> Option<&Binding> {
        if self.refined.contains(name) {
            return None;
        }
        self.bindings.get(name)
    }

    pub fn defines(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    /// Names assigned in this frame, in sorted order. Refinement-only
    /// bindings are not assignments.
    pub fn defined_names(&self) -> Vec<String> {
        self.bindings
            .keys()
            .filter(|name| !self.refined.contains(*name))
            .cloned()
            .collect()
    }
}

/// An error recorded for a name that is defined on only some paths; raised
/// if the name is read before being defined again.
#[derive(Clone)]
pub struct DeferredError {
    kind: ErrorKind,
    span: Span,
    render: Rc<dyn Fn() -> String>,
}

impl DeferredError {
    pub fn new(kind: ErrorKind, span: Span, render: impl Fn() -> String + 'static) -> Self {
        Self {
            kind,
            span,
            render: Rc::new(render),
        }
    }

    pub fn to_error(&self) -> Error {
        Error::new(self.kind, self.span, (self.render)())
    }
}

impl Debug for DeferredError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeferredError")
            .field("kind", &self.kind)
            .field("span", &self.span)
            .finish_non_exhaustive()
    }
}

/// Where a lookup succeeded.
#[derive(Debug, Clone)]
pub struct Found {
    pub frame: usize,
    pub binding: Binding,
}

#[derive(Debug, Default)]
pub struct ScopeChain {
    frames: Vec<Frame>,
}

impl ScopeChain {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn push(&mut self, block: BlockId, starts_def: bool, closure: Option<NodeId>) {
        let parent = self.frames.len().checked_sub(1);
        self.frames.push(Frame::new(block, starts_def, closure, parent));
    }

    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn current(&self) -> Option<&Frame> {
        self.frames.last()
    }

    fn current_mut(&mut self) -> Option<&mut Frame> {
        self.frames.last_mut()
    }

    /// Walk from the innermost frame outward.
    fn chain(&self) -> impl Iterator<Item = (usize, &Frame)> {
        let mut next = self.frames.len().checked_sub(1);
        std::iter::from_fn(move || {
            let index = next?;
            let frame = &self.frames[index];
            next = frame.parent;
            Some((index, frame))
        })
    }

    pub fn find(&self, name: &str) -> Option<Found> {
        self.chain().find_map(|(frame, data)| {
            data.get(name).map(|binding| Found {
                frame,
                binding: binding.clone(),
            })
        })
    }

    /// Find `name` in a frame enclosing the current one, without leaving the
    /// current function body.
    pub fn find_enclosing(&self, name: &str) -> Option<Found> {
        let mut chain = self.chain();
        let (_, first) = chain.next()?;
        if first.starts_def {
            return None;
        }
        for (index, frame) in chain {
            if let Some(binding) = frame.get(name) {
                return Some(Found {
                    frame: index,
                    binding: binding.clone(),
                });
            }
            if frame.starts_def {
                break;
            }
        }
        None
    }

    /// Current type of a plain variable.
    pub fn type_of(&self, name: &str) -> Option<Ty> {
        match self.find(name)?.binding {
            Binding::Plain(ty) => Some(ty),
            Binding::Sugared(_) => None,
        }
    }

    /// The outermost closure whose body lies between `frame` and the current
    /// frame. Reads of `frame`'s variables from inside it must happen before
    /// that closure is created.
    pub fn closure_crossed_from(&self, frame: usize) -> Option<NodeId> {
        self.chain()
            .take_while(|(index, _)| *index > frame)
            .filter(|(_, data)| data.starts_def)
            .filter_map(|(_, data)| data.closure)
            .last()
    }

    /// Frame of the innermost function body.
    fn def_frame_mut(&mut self) -> Option<&mut Frame> {
        let index = self
            .chain()
            .find(|(_, frame)| frame.starts_def)
            .map(|(index, _)| index)?;
        self.frames.get_mut(index)
    }

    fn clear_deferred(&mut self, name: &str) {
        if let Some(frame) = self.def_frame_mut() {
            frame.deferred.remove(name);
        }
    }

    pub fn record_plain(&mut self, name: &str, ty: Ty) {
        self.clear_deferred(name);
        if let Some(frame) = self.current_mut() {
            frame.refined.remove(name);
            frame.bindings.insert(name.to_string(), Binding::Plain(ty));
        }
    }

    pub fn record_refined(&mut self, name: &str, ty: Ty) {
        if let Some(frame) = self.current_mut() {
            frame.refined.insert(name.to_string());
            frame.bindings.insert(name.to_string(), Binding::Plain(ty));
        }
    }

    pub fn record_sugared(&mut self, name: &str, value: SugaredValue) {
        self.clear_deferred(name);
        if let Some(frame) = self.current_mut() {
            frame.refined.remove(name);
            frame
                .bindings
                .insert(name.to_string(), Binding::Sugared(value));
        }
    }

    pub fn defer(&mut self, name: &str, error: DeferredError) {
        if let Some(frame) = self.def_frame_mut() {
            frame.deferred.insert(name.to_string(), error);
        }
    }

    /// Deferred diagnostic for `name`, searching the current function body
    /// and then the bodies enclosing it.
    pub fn deferred(&self, name: &str) -> Option<&DeferredError> {
        self.chain()
            .filter(|(_, frame)| frame.starts_def)
            .find_map(|(_, frame)| frame.deferred.get(name))
    }

    /// Deferred diagnostic for `name` in the current function body only.
    pub fn deferred_in_def(&self, name: &str) -> Option<&DeferredError> {
        self.chain()
            .find(|(_, frame)| frame.starts_def)
            .and_then(|(_, frame)| frame.deferred.get(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn block(i: u32) -> BlockId {
        BlockId(i)
    }

    #[test]
    fn lookup_walks_outward_and_shadows() {
        let mut scopes = ScopeChain::new();
        scopes.push(block(0), true, None);
        scopes.record_plain("x", Ty::Int);
        scopes.push(block(1), false, None);
        assert_eq!(scopes.type_of("x"), Some(Ty::Int));
        scopes.record_plain("x", Ty::Float);
        assert_eq!(scopes.type_of("x"), Some(Ty::Float));
        let frame = scopes.pop().unwrap();
        assert_eq!(frame.defined_names(), vec!["x".to_string()]);
        assert_eq!(scopes.type_of("x"), Some(Ty::Int));
    }

    #[test]
    fn enclosing_lookup_stops_at_function_bodies() {
        let mut scopes = ScopeChain::new();
        scopes.push(block(0), true, None);
        scopes.record_plain("x", Ty::Int);
        scopes.push(block(1), false, None);
        assert_eq!(scopes.find_enclosing("x").map(|f| f.frame), Some(0));
        scopes.push(block(2), true, Some(NodeId(7)));
        assert!(scopes.find_enclosing("x").is_none());
        assert_eq!(scopes.find("x").map(|f| f.frame), Some(0));
        assert_eq!(scopes.closure_crossed_from(0), Some(NodeId(7)));
        assert_eq!(scopes.closure_crossed_from(2), None);
    }

    #[test]
    fn outermost_closure_is_reported() {
        let mut scopes = ScopeChain::new();
        scopes.push(block(0), true, None);
        scopes.push(block(1), true, Some(NodeId(1)));
        scopes.push(block(2), false, None);
        scopes.push(block(3), true, Some(NodeId(2)));
        assert_eq!(scopes.closure_crossed_from(0), Some(NodeId(1)));
        assert_eq!(scopes.closure_crossed_from(1), Some(NodeId(2)));
    }

    #[test]
    fn refinements_are_not_assignments() {
        let mut scopes = ScopeChain::new();
        scopes.push(block(0), true, None);
        scopes.record_refined("a", Ty::Tensor);
        scopes.record_plain("b", Ty::Int);
        assert_eq!(scopes.current().unwrap().defined_names(), vec!["b".to_string()]);
        scopes.record_plain("a", Ty::Tensor);
        assert_eq!(scopes.current().unwrap().defined_names().len(), 2);
    }

    #[test]
    fn deferred_errors_clear_on_rebinding() {
        let mut scopes = ScopeChain::new();
        scopes.push(block(0), true, None);
        scopes.defer(
            "a",
            DeferredError::new(ErrorKind::Name, Span::null(), || "a is not defined".into()),
        );
        let err = scopes.deferred("a").unwrap().to_error();
        assert_eq!(err.kind(), ErrorKind::Name);
        assert_eq!(err.message(), "a is not defined");
        scopes.record_plain("a", Ty::Int);
        assert!(scopes.deferred("a").is_none());
    }

    #[test]
    fn deferred_errors_belong_to_their_function_body() {
        let mut scopes = ScopeChain::new();
        scopes.push(block(0), true, None);
        scopes.push(block(1), true, Some(NodeId(3)));
        scopes.defer(
            "a",
            DeferredError::new(ErrorKind::Type, Span::null(), || "a has two types".into()),
        );
        assert!(scopes.deferred_in_def("a").is_some());
        scopes.pop();
        assert!(scopes.deferred("a").is_none());

        scopes.defer(
            "b",
            DeferredError::new(ErrorKind::Name, Span::null(), || "b is not defined".into()),
        );
        scopes.push(block(2), true, Some(NodeId(4)));
        assert!(scopes.deferred("b").is_some());
        assert!(scopes.deferred_in_def("b").is_none());
    }
}
