//! Prepared-statement and portal name identifiers (part of C8).
//!
//! Adapted near-verbatim from `postro::statement`: a fixed 6-byte inline
//! name (`q00001`-style) so naming a statement/portal never allocates, with
//! the unnamed-portal/statement sentinel (`??????`, encodes to `""` on the
//! wire) used by the one-shot simple-extended-query path.
use std::sync::atomic::{AtomicU16, Ordering};

type AtomicId = AtomicU16;

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Id([u8; 6]);

impl Id {
    fn unnamed() -> Self {
        Self([b'?'; 6])
    }

    fn next(atomic: &AtomicId) -> Self {
        let id = atomic.fetch_add(1, Ordering::SeqCst);
        let mut buf = [b'q', b'0', b'0', b'0', b'0', b'0'];
        let len = buf.len();

        let mut b = itoa::Buffer::new();
        let formatted = b.format(id);
        let bytes = formatted.as_bytes();
        buf[len - bytes.len()..].copy_from_slice(bytes);

        Self(buf)
    }

    pub fn as_str(&self) -> &str {
        if self.is_unnamed() {
            return "";
        }
        // SAFETY: built only from ASCII digits/letters above.
        unsafe { std::str::from_utf8_unchecked(&self.0[..]) }
    }

    pub fn is_unnamed(&self) -> bool {
        self.0[0] == b'?'
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("Id").field(&self.as_str()).finish()
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

macro_rules! delegate {
    ($name:ident) => {
        #[derive(Clone, PartialEq, Eq, Hash)]
        pub struct $name(Id);

        impl $name {
            pub(crate) fn unnamed() -> Self {
                Self(Id::unnamed())
            }

            pub(crate) fn next() -> Self {
                static ID: AtomicId = AtomicId::new(0);
                Self(Id::next(&ID))
            }
        }

        impl std::ops::Deref for $name {
            type Target = Id;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl std::fmt::Debug for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.debug_tuple(stringify!($name)).field(&self.as_str()).finish()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

delegate!(StatementName);
delegate!(PortalName);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unnamed_statement_encodes_empty() {
        assert_eq!(StatementName::unnamed().as_str(), "");
    }

    #[test]
    fn named_statements_are_distinct() {
        let a = StatementName::next();
        let b = StatementName::next();
        assert_ne!(a, b);
        assert!(a.as_str().starts_with('q'));
    }
}
