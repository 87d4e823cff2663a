use super::Emitter;
use crate::refine::RefinementMap;
use crate::scope::Binding;
use crate::sugared::SugaredValue;
use sir_core::ir::{Attr, Op, ValueId};
use sir_core::{bail, Result, Span, Ty};

impl Emitter<'_> {
    /// Resolve a name: scopes first, then the built-in table, then the host
    /// resolver.
    pub(crate) fn lookup(&mut self, name: &str, span: Span) -> Result<SugaredValue> {
        if let Some(found) = self.scopes.find(name) {
            return Ok(match found.binding {
                Binding::Sugared(value) => value,
                Binding::Plain(ty) => SugaredValue::Plain(self.load(name, ty, found.frame, span)),
            });
        }
        if let Some(error) = self.scopes.deferred(name) {
            return Err(error.to_error());
        }
        if let Some(entry) = self.config.builtins.get(name) {
            return Ok(Self::sugar_builtin(entry));
        }
        if let Some(resolved) = self.resolver.resolve_value(name, span) {
            return Ok(self.sugar_resolved(&resolved, span));
        }
        bail!(Name, span, "undefined value {}", name)
    }

    /// Read a plain variable bound in `frame`. Reads crossing into a closure
    /// body are placed before the closure so the body sees a captured value.
    pub(super) fn load(&mut self, name: &str, ty: Ty, frame: usize, span: Span) -> ValueId {
        let prev = self
            .scopes
            .closure_crossed_from(frame)
            .map(|closure| self.b.enter_before(closure));
        let node = self.b.insert(Op::Load, vec![], vec![ty], span);
        self.b.set_attr(node, "name", Attr::Str(name.to_string()));
        let value = self.b.graph().output(node);
        self.name_value(value, name);
        if let Some(prev) = prev {
            self.b.set_insert_point(prev);
        }
        value
    }

    /// Bind `name` in the current frame. Plain values are stored; anything
    /// else is kept as a sugared binding.
    pub(crate) fn bind(
        &mut self,
        name: &str,
        value: SugaredValue,
        annotated: Option<&Ty>,
        span: Span,
    ) -> Result<()> {
        let mut plain = value.as_plain();
        if let Some(plain) = plain {
            self.name_value(plain, name);
        }

        let enclosing = if name.starts_with('$') {
            None
        } else {
            self.scopes.find_enclosing(name)
        };
        if let Some(parent) = enclosing {
            if annotated.is_some() {
                bail!(
                    Type,
                    span,
                    "Attempting to declare and annotate the type of variable '{}' but it is already defined in an outer block",
                    name
                );
            }
            let Some(new_value) = plain else {
                bail!(
                    Type,
                    span,
                    "Cannot re-assign '{}' to a value of type {} because {} is not a first-class value.  Only reassignments to first-class values are allowed",
                    name,
                    value.kind(),
                    name
                );
            };
            let parent_ty = match parent.binding {
                Binding::Plain(ty) => ty,
                Binding::Sugared(parent_value) => bail!(
                    Type,
                    span,
                    "Cannot re-assign '{}' because it has type {} and {} is not a first-class value.  Only reassignments to first-class values are allowed",
                    name,
                    parent_value.kind(),
                    name
                ),
            };
            let erased = parent_ty.unshaped();
            let converted = self.try_convert(new_value, &erased, span);
            let converted_ty = self.ty(converted);
            if !converted_ty.is_subtype_of(&erased) {
                bail!(
                    Type,
                    span,
                    "Variable '{}' previously has type {} but is now being assigned to a value of type {}",
                    name,
                    parent_ty,
                    converted_ty
                );
            }
            plain = Some(converted);
        }

        match plain {
            Some(plain) => {
                let ty = annotated.cloned().unwrap_or_else(|| self.ty(plain));
                self.store(name, plain, ty, span);
            }
            None => self.scopes.record_sugared(name, value),
        }
        Ok(())
    }

    pub(crate) fn store(&mut self, name: &str, value: ValueId, ty: Ty, span: Span) {
        let node = self.b.insert(Op::Store, vec![value], vec![], span);
        self.b.set_attr(node, "name", Attr::Str(name.to_string()));
        self.scopes.record_plain(name, ty);
    }

    /// Re-bind each refined name to its narrowed value at the current point.
    /// The bindings live in the current frame only.
    pub(crate) fn insert_refinements(&mut self, refinements: &RefinementMap) -> Result<()> {
        for (name, refinement) in refinements.iter() {
            if refinement.ty.is_none() {
                continue;
            }
            let Some(current) = self.scopes.type_of(name) else {
                continue;
            };
            if current == refinement.ty {
                continue;
            }
            let value = self.lookup(name, refinement.span)?.resolve_to_plain(refinement.span)?;
            let narrowed = self.b.insert_value(
                Op::UncheckedUnwrapOptional,
                vec![value],
                refinement.ty.clone(),
                refinement.span,
            );
            let node = self.b.insert(Op::Store, vec![narrowed], vec![], refinement.span);
            self.b.set_attr(node, "name", Attr::Str(name.clone()));
            self.scopes.record_refined(name, refinement.ty.clone());
        }
        Ok(())
    }
}
