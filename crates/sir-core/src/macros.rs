/// Return early with a located error of the given kind.
///
/// ```ignore
/// bail!(Type, span, "expected {} but found {}", expected, found);
/// ```
#[macro_export]
macro_rules! bail {
    ($kind:ident, $span:expr, $($arg:tt)*) => {
        return Err($crate::error::Error::new(
            $crate::error::ErrorKind::$kind,
            $span,
            format!($($arg)*),
        ))
    };
}

/// Return a located error unless the condition holds.
#[macro_export]
macro_rules! ensure {
    ($cond:expr, $kind:ident, $span:expr, $($arg:tt)*) => {
        if !($cond) {
            $crate::bail!($kind, $span, $($arg)*);
        }
    };
}
