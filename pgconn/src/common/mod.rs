//! Supporting utility types shared across the crate.
mod bytestr;

pub use bytestr::ByteStr;

/// Define a unit-struct error type with a fixed display message.
///
/// # Example
///
/// ```ignore
/// unit_error! {
///     /// Resource not found.
///     pub struct NotFound("not found");
/// }
/// ```
macro_rules! unit_error {
    ($(#[$meta:meta])* $vis:vis struct $name:ident($msg:literal);) => {
        $(#[$meta])*
        $vis struct $name;

        impl std::error::Error for $name { }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str($msg)
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "\"{self}\"")
            }
        }
    };
}

/// Trace when the `verbose` feature is enabled, fall back to `log` when only
/// `log` is enabled, otherwise compile to nothing.
macro_rules! verbose {
    ($($tt:tt)*) => {
        #[cfg(feature = "verbose")]
        tracing::trace!($($tt)*);
        #[cfg(all(feature = "log", not(feature = "verbose")))]
        log::trace!($($tt)*);
    };
}

pub(crate) use unit_error;
pub(crate) use verbose;
