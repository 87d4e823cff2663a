use super::Emitter;
use sir_core::ast::{Expr, ExprKind};
use sir_core::ir::{Attr, Builtin, Op, ValueId};
use sir_core::{bail, Result, Span, Ty};

/// One position of a tensor index after classification.
enum IndexEntry<'e> {
    Select(ValueId),
    Slice {
        start: Option<&'e Expr>,
        end: Option<&'e Expr>,
        step: Option<&'e Expr>,
    },
    Unsqueeze,
    Tensor(ValueId),
}

/// Advanced indices collected while decomposing a tensor index: the
/// dimension of the sliced tensor each one applies to.
pub(crate) type TensorIndices = Vec<(i64, ValueId)>;

impl Emitter<'_> {
    pub(crate) fn emit_subscript(&mut self, value: &Expr, indices: &[Expr], span: Span) -> Result<ValueId> {
        let base = self.emit_sugared_expr(value, None)?;
        let Some(base) = base.as_plain() else {
            bail!(Type, span, "'{}' object is not subscriptable", base.kind());
        };
        match self.ty(base) {
            ty if ty.is_tensor() => self.emit_tensor_index(base, indices, span),
            Ty::Tuple(elems) => {
                let index = single_index(indices, span, "tuple")?;
                self.emit_tuple_subscript(base, elems, index, span)
            }
            Ty::List(_) | Ty::Str => {
                let index = single_index(indices, span, "list")?;
                match &index.kind {
                    ExprKind::Slice { start, end, step } => {
                        let (start, end, step) =
                            self.emit_slice_bounds(start.as_deref(), end.as_deref(), step.as_deref())?;
                        self.builtin(Builtin::Slice, vec![base, start, end, step], span)
                    }
                    _ => {
                        let index = self.emit_expr(index, None)?;
                        self.builtin(Builtin::GetItem, vec![base, index], span)
                    }
                }
            }
            Ty::Dict(key, _) => {
                let index = single_index(indices, span, "dict")?;
                let key_value = self.emit_expr(index, Some(&key))?;
                let key_value = self.coerce(key_value, &key, index.span, "dict key")?;
                self.builtin(Builtin::GetItem, vec![base, key_value], span)
            }
            Ty::Class(class) if class.method("__getitem__").is_some() => {
                let index = single_index(indices, span, &class.name)?;
                let index = self.emit_expr(index, None)?;
                self.call_method(base, &class, "__getitem__", vec![index], span)
            }
            ty => bail!(Type, span, "'{}' object is not subscriptable", ty),
        }
    }

    fn emit_tensor_index(&mut self, tensor: ValueId, indices: &[Expr], span: Span) -> Result<ValueId> {
        let (sliced, tensor_indices) = self.decompose_index(tensor, indices, span)?;
        if tensor_indices.is_empty() {
            return Ok(sliced);
        }
        let list = self.index_list(&tensor_indices, span);
        self.builtin(Builtin::Index, vec![sliced, list], span)
    }

    /// Apply the basic part of a tensor index (integers, slices and `None`)
    /// in source order. Tensor indices are returned for the caller to apply
    /// with `index` or `index_put_`.
    ///
    /// Positions before an ellipsis count dimensions from the front, those
    /// after it from the back.
    pub(crate) fn decompose_index(
        &mut self,
        tensor: ValueId,
        indices: &[Expr],
        span: Span,
    ) -> Result<(ValueId, TensorIndices)> {
        let mut entries: Vec<Option<IndexEntry<'_>>> = Vec::with_capacity(indices.len());
        let mut ellipsis = None;
        for (pos, index) in indices.iter().enumerate() {
            let entry = match &index.kind {
                ExprKind::Ellipsis => {
                    if ellipsis.is_some() {
                        bail!(
                            SyntaxShape,
                            index.span,
                            "An index can only have a single ellipsis ('...')"
                        );
                    }
                    ellipsis = Some(pos);
                    None
                }
                ExprKind::Slice { start, end, step } => Some(IndexEntry::Slice {
                    start: start.as_deref(),
                    end: end.as_deref(),
                    step: step.as_deref(),
                }),
                _ if index.is_none_literal() => Some(IndexEntry::Unsqueeze),
                _ => {
                    let value = self.emit_expr(index, None)?;
                    match self.ty(value) {
                        Ty::Int => Some(IndexEntry::Select(value)),
                        ty if ty.is_tensor() => Some(IndexEntry::Tensor(value)),
                        ty => bail!(
                            Type,
                            index.span,
                            "Unsupported operation: indexing tensor with unsupported index type '{}'. Only ints, slices, None and tensors are supported",
                            ty
                        ),
                    }
                }
            };
            entries.push(entry);
        }

        let mut dims = vec![0i64; entries.len()];
        let mut dim = 0;
        for pos in 0..ellipsis.unwrap_or(entries.len()) {
            dims[pos] = dim;
            if !matches!(entries[pos], Some(IndexEntry::Select(_))) {
                dim += 1;
            }
        }
        if let Some(ellipsis) = ellipsis {
            let mut dim = -1;
            for pos in (ellipsis + 1..entries.len()).rev() {
                dims[pos] = dim;
                match entries[pos] {
                    Some(IndexEntry::Unsqueeze) => {}
                    Some(IndexEntry::Tensor(_)) => bail!(
                        Unsupported,
                        indices[pos].span,
                        "Ellipses followed by tensor indexing is currently not supported"
                    ),
                    _ => dim -= 1,
                }
            }
        }

        let mut sliced = tensor;
        let mut tensor_indices = Vec::new();
        for (entry, dim) in entries.into_iter().zip(dims) {
            let Some(entry) = entry else {
                continue;
            };
            match entry {
                IndexEntry::Select(index) => {
                    let dim = self.b.int(dim);
                    sliced = self.builtin(Builtin::Select, vec![sliced, dim, index], span)?;
                }
                IndexEntry::Slice { start, end, step } => {
                    let (start, end, step) = self.emit_slice_bounds(start, end, step)?;
                    let dim = self.b.int(dim);
                    sliced = self.builtin(Builtin::Slice, vec![sliced, dim, start, end, step], span)?;
                }
                IndexEntry::Unsqueeze => {
                    let dim = self.b.int(dim);
                    sliced = self.builtin(Builtin::Unsqueeze, vec![sliced, dim], span)?;
                }
                IndexEntry::Tensor(index) => tensor_indices.push((dim, index)),
            }
        }
        Ok((sliced, tensor_indices))
    }

    /// `List[Optional[Tensor]]` with the tensor indices at their dimensions
    /// and `None` elsewhere.
    pub(crate) fn index_list(&mut self, tensor_indices: &[(i64, ValueId)], span: Span) -> ValueId {
        let len = tensor_indices
            .iter()
            .map(|(dim, _)| *dim + 1)
            .max()
            .unwrap_or(0);
        let mut elems = Vec::with_capacity(len as usize);
        for dim in 0..len {
            match tensor_indices.iter().find(|(at, _)| *at == dim) {
                Some((_, index)) => elems.push(*index),
                None => elems.push(self.b.none(Ty::optional_tensor(), span)),
            }
        }
        self.b.insert_value(
            Op::ListConstruct,
            elems,
            Ty::list(Ty::optional_tensor()),
            span,
        )
    }

    fn emit_slice_bounds(
        &mut self,
        start: Option<&Expr>,
        end: Option<&Expr>,
        step: Option<&Expr>,
    ) -> Result<(ValueId, ValueId, ValueId)> {
        let start = self.emit_slice_bound(start, 0)?;
        let end = self.emit_slice_bound(end, i64::MAX)?;
        let step = self.emit_slice_bound(step, 1)?;
        Ok((start, end, step))
    }

    fn emit_slice_bound(&mut self, bound: Option<&Expr>, default: i64) -> Result<ValueId> {
        match bound {
            Some(expr) => {
                let value = self.emit_expr(expr, Some(&Ty::Int))?;
                self.coerce(value, &Ty::Int, expr.span, "slice bound")
            }
            None => Ok(self.b.int(default)),
        }
    }

    fn emit_tuple_subscript(&mut self, tuple: ValueId, elems: Vec<Ty>, index: &Expr, span: Span) -> Result<ValueId> {
        let len = elems.len() as i64;
        if let ExprKind::Slice { start, end, step } = &index.kind {
            if step.is_some() {
                bail!(Unsupported, index.span, "tuple slicing with a step is not supported");
            }
            let clamp = |i: i64| (if i < 0 { i + len } else { i }).clamp(0, len);
            let begin = match start {
                Some(start) => clamp(self.constant_index(start, "tuple slice indices")?),
                None => 0,
            };
            let end = match end {
                Some(end) => clamp(self.constant_index(end, "tuple slice indices")?),
                None => len,
            }
            .max(begin);
            let ty = Ty::tuple(elems[begin as usize..end as usize].to_vec());
            let node = self.b.insert(Op::TupleSlice, vec![tuple], vec![ty], span);
            self.b.set_attr(node, "begin", Attr::Int(begin));
            self.b.set_attr(node, "end", Attr::Int(end));
            return Ok(self.b.graph().output(node));
        }

        let raw = self.constant_index(index, "tuple indices")?;
        let adjusted = if raw < 0 { raw + len } else { raw };
        if !(0..len).contains(&adjusted) {
            bail!(
                Type,
                index.span,
                "Tuple index out of range. Tuple is length {} and index is {}",
                len,
                raw
            );
        }
        let ty = elems[adjusted as usize].clone();
        let node = self.b.insert(Op::TupleIndex, vec![tuple], vec![ty], span);
        self.b.set_attr(node, "index", Attr::Int(adjusted));
        Ok(self.b.graph().output(node))
    }

    fn constant_index(&mut self, expr: &Expr, what: &str) -> Result<i64> {
        let value = self.emit_expr(expr, None)?;
        if self.ty(value) == Ty::Int {
            if let Some(index) = self.b.constant_of(value).and_then(Attr::as_int) {
                return Ok(index);
            }
        }
        bail!(Type, expr.span, "{} must be integer constants", what)
    }
}

pub(super) fn single_index<'e>(indices: &'e [Expr], span: Span, what: &str) -> Result<&'e Expr> {
    match indices {
        [index] => Ok(index),
        _ => bail!(
            SyntaxShape,
            span,
            "{} indexing expects a single index but found {}",
            what,
            indices.len()
        ),
    }
}
