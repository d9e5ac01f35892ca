//! SQL string operations: whether a query string should have its prepared
//! statement cached (C8's LRU statement cache) or is a one-shot.
//!
//! Adapted verbatim from `postro::sql`.

/// A type that represents a SQL string.
pub trait Sql {
    /// Returns the SQL string.
    fn sql(&self) -> &str;

    /// Returns `true` if the prepared statement for this query should be
    /// cached for reuse.
    fn persistent(&self) -> bool;
}

impl Sql for &str {
    fn sql(&self) -> &str {
        self
    }

    fn persistent(&self) -> bool {
        true
    }
}

impl Sql for String {
    fn sql(&self) -> &str {
        self
    }

    fn persistent(&self) -> bool {
        true
    }
}

/// A query string that opts out of statement caching.
#[derive(Debug)]
pub struct SqlOnce<'sql>(&'sql str);

impl Sql for SqlOnce<'_> {
    fn sql(&self) -> &str {
        self.0
    }

    fn persistent(&self) -> bool {
        false
    }
}

/// Extension trait for opting a query string out of statement caching.
pub trait SqlExt<'a> {
    fn once(self) -> SqlOnce<'a>;
}

impl<'a> SqlExt<'a> for &'a str {
    fn once(self) -> SqlOnce<'a> {
        SqlOnce(self)
    }
}

impl<'a> SqlExt<'a> for SqlOnce<'a> {
    fn once(self) -> SqlOnce<'a> {
        self
    }
}
