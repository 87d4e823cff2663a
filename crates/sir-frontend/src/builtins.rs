//! The fixed table of names every program can see without a binding.

use sir_core::ir::Builtin;
use sir_core::Ty;
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IterableKind {
    Range,
    Zip,
    Enumerate,
}

#[derive(Debug, Clone, PartialEq)]
pub enum BuiltinEntry {
    Print,
    /// `int(x)`, `float(x)`, ...; classes may overload through `magic`.
    Cast { target: Ty, magic: &'static str },
    /// A plain library primitive, optionally overloadable by classes.
    Function {
        op: Builtin,
        magic: Option<&'static str>,
    },
    Iterable(IterableKind),
    GetAttr,
    IsInstance,
    Annotate,
    Fork,
    /// Exception constructors; the raised value is the message.
    Exception,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct BuiltinTable {
    entries: BTreeMap<String, BuiltinEntry>,
}

impl BuiltinTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn standard() -> Self {
        let function = |op, magic| BuiltinEntry::Function { op, magic };
        let mut table = Self::empty()
            .with_entry("print", BuiltinEntry::Print)
            .with_entry("getattr", BuiltinEntry::GetAttr)
            .with_entry("isinstance", BuiltinEntry::IsInstance)
            .with_entry("annotate", BuiltinEntry::Annotate)
            .with_entry("fork", BuiltinEntry::Fork)
            .with_entry("range", BuiltinEntry::Iterable(IterableKind::Range))
            .with_entry("zip", BuiltinEntry::Iterable(IterableKind::Zip))
            .with_entry(
                "enumerate",
                BuiltinEntry::Iterable(IterableKind::Enumerate),
            )
            .with_entry("len", function(Builtin::Len, Some("__len__")))
            .with_entry("hex", function(Builtin::Hex, Some("__hex__")))
            .with_entry("oct", function(Builtin::Oct, Some("__oct__")))
            .with_entry("round", function(Builtin::Round, Some("__round__")))
            .with_entry("hash", function(Builtin::Hash, Some("__hash__")))
            .with_entry("min", function(Builtin::Min, None))
            .with_entry("max", function(Builtin::Max, None))
            .with_entry("abs", function(Builtin::Abs, None))
            .with_entry("all", function(Builtin::All, None))
            .with_entry("divmod", function(Builtin::Divmod, None))
            .with_entry("list", function(Builtin::List, None))
            .with_entry("ord", function(Builtin::Ord, None))
            .with_entry("chr", function(Builtin::Chr, None))
            .with_entry("bin", function(Builtin::Bin, None))
            .with_entry("rangelist", function(Builtin::Rangelist, None));
        for (name, target, magic) in [
            ("int", Ty::Int, "__int__"),
            ("float", Ty::Float, "__float__"),
            ("bool", Ty::Bool, "__bool__"),
            ("str", Ty::Str, "__str__"),
        ] {
            table.insert(name, BuiltinEntry::Cast { target, magic });
        }
        for name in ["Exception", "AssertionError", "RuntimeError", "ValueError"] {
            table.insert(name, BuiltinEntry::Exception);
        }
        table
    }

    pub fn with_entry(mut self, name: &str, entry: BuiltinEntry) -> Self {
        self.insert(name, entry);
        self
    }

    pub fn insert(&mut self, name: &str, entry: BuiltinEntry) {
        self.entries.insert(name.to_string(), entry);
    }

    pub fn remove(&mut self, name: &str) -> Option<BuiltinEntry> {
        self.entries.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&BuiltinEntry> {
        self.entries.get(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn standard_table_covers_casts_and_iterables() {
        let table = BuiltinTable::standard();
        assert_eq!(
            table.get("float"),
            Some(&BuiltinEntry::Cast {
                target: Ty::Float,
                magic: "__float__"
            })
        );
        assert_eq!(
            table.get("zip"),
            Some(&BuiltinEntry::Iterable(IterableKind::Zip))
        );
        assert!(table.get("open").is_none());
    }

    #[test]
    fn hosts_can_extend_and_shrink_the_table() {
        let table = BuiltinTable::standard()
            .with_entry(
                "numel",
                BuiltinEntry::Function {
                    op: Builtin::Len,
                    magic: None,
                },
            );
        assert!(table.names().any(|name| name == "numel"));

        let mut table = table;
        assert_eq!(table.remove("print"), Some(BuiltinEntry::Print));
        assert!(table.get("print").is_none());
    }
}
