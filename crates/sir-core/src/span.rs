pub type FileId = u64;

/// Byte range inside one source file.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize,
)]
pub struct Span {
    pub file: FileId,
    pub lo: u32,
    pub hi: u32,
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}-{}", self.file, self.lo, self.hi)
    }
}

impl Span {
    pub fn new(file: FileId, lo: u32, hi: u32) -> Span {
        Span { file, lo, hi }
    }

    pub fn null() -> Span {
        Span::default()
    }

    pub fn is_null(&self) -> bool {
        *self == Span::default()
    }

    /// Smallest span covering both `self` and `other`. Spans from different
    /// files keep `self`.
    pub fn to(self, other: Span) -> Span {
        if self.file != other.file || other.is_null() {
            return self;
        }
        if self.is_null() {
            return other;
        }
        Span {
            file: self.file,
            lo: self.lo.min(other.lo),
            hi: self.hi.max(other.hi),
        }
    }

    pub fn len(&self) -> u32 {
        self.hi.saturating_sub(self.lo)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl From<Span> for miette::SourceSpan {
    fn from(span: Span) -> Self {
        miette::SourceSpan::new((span.lo as usize).into(), span.len() as usize)
    }
}
