//! Extended query path (C8): the Parse/Bind/Describe/Execute/Sync pipeline,
//! named-statement caching, and row streaming.
//!
//! Adapted from `postro::fetch`/`postro::query`'s `Query` builder and
//! `prepare`/`portal`/`command_complete` helpers, reworked onto a concrete
//! `&mut Connection` (rather than a generic `Executor`) and `async fn`/
//! `.await` instead of the teacher's poll-based `FetchStream` state machine,
//! matching the deviation already made in [`crate::connection`].
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use crate::{
    connection::Connection,
    encode::{Encode, Encoded},
    error::{Error, Result},
    ext::{BindParams, UsizeExt},
    message::backend::{self, BackendMessage, CommandComplete, FieldDescription},
    message::PgFormat,
    message::frontend,
    row::{FromRow, Row, RowResult},
    sql::Sql,
    statement::{PortalName, StatementName},
};

/// Entry point for the extended query path: bind parameters to `sql` and
/// run it against `conn`.
pub fn query<'a, S: Sql>(sql: S, conn: &'a mut Connection) -> Query<'a, S> {
    Query { sql, conn, params: Vec::new(), max_rows: 0 }
}

/// A query awaiting parameter binding and a terminal `.fetch*()`/`.execute()`
/// call. Nothing is sent to the server until one of those is awaited.
#[must_use = "query builders do nothing until `.fetch_all()`/`.fetch_one()`/`.execute()` is awaited"]
pub struct Query<'a, S> {
    sql: S,
    conn: &'a mut Connection,
    params: Vec<Encoded<'a>>,
    max_rows: u32,
}

impl<'a, S: Sql> Query<'a, S> {
    /// Bind the next positional parameter (`$1`, `$2`, ...).
    pub fn bind<V: Encode + ?Sized>(mut self, value: &'a V) -> Self {
        self.params.push(value.encode());
        self
    }

    /// Cap the number of rows the initial `Execute` requests; `0` (the
    /// default) asks for all of them. A non-zero cap that the result set
    /// exceeds ends the stream at `PortalSuspended` rather than resuming it.
    pub fn max_rows(mut self, n: u32) -> Self {
        self.max_rows = n;
        self
    }

    /// Run the query and collect every row into a `Vec`.
    pub async fn fetch_all<R: FromRow>(self) -> Result<Vec<R>> {
        let mut rows = self.fetch().await?;
        let mut out = Vec::new();
        while let Some(row) = rows.next().await? {
            out.push(row.decode()?);
        }
        Ok(out)
    }

    /// Run the query, requiring exactly one row; errors with
    /// [`crate::error::ErrorKind::RowNotFound`] if the result set is empty.
    pub async fn fetch_one<R: FromRow>(self) -> Result<R> {
        self.fetch_optional().await?.ok_or_else(Error::row_not_found)
    }

    /// Run the query, returning `None` if the result set is empty.
    pub async fn fetch_optional<R: FromRow>(self) -> Result<Option<R>> {
        let mut rows = self.fetch().await?;
        let row = match rows.next().await? {
            Some(row) => Some(row.decode()?),
            None => None,
        };
        // Drain any further rows so the portal/statement can be reused;
        // a well-formed caller using `fetch_optional` expects at most one.
        while rows.next().await?.is_some() {}
        Ok(row)
    }

    /// Run the query for its side effects, discarding any rows.
    pub async fn execute(self) -> Result<RowResult> {
        let mut rows = self.fetch().await?;
        while rows.next().await?.is_some() {}
        Ok(rows.command_complete())
    }

    /// Run the Parse/Bind/Describe/Execute/Sync pipeline and return the
    /// resulting row stream.
    pub async fn fetch(self) -> Result<Rows<'a>> {
        let Query { sql, conn, params, max_rows } = self;
        let sql_text = sql.sql().trim();
        let persist = sql.persistent();

        let sql_id = hash_sql(sql_text);
        let cached = if persist { conn.get_stmt(sql_id) } else { None };
        let cache_hit = cached.is_some();
        let stmt_name = match cached {
            Some(name) => name,
            None if persist => StatementName::next(),
            None => StatementName::unnamed(),
        };

        conn.send(frontend::Parse {
            prepare_name: stmt_name.as_str(),
            sql: sql_text,
            oids_len: params.len().to_u16(),
            oids: params.iter().map(Encoded::oid),
        });

        if !cache_hit {
            // `Flush`, not `Sync`: a cache-miss Parse hasn't reached the
            // pipeline's terminal Sync yet, so only a response flush is
            // requested here, matching `postro::fetch::prepare`.
            conn.send(frontend::Flush);
            conn.flush().await?;
            conn.recv_and_sync::<backend::ParseComplete>().await?;
            if persist {
                conn.add_stmt(sql_id, stmt_name.clone());
            }
        }

        let portal = PortalName::unnamed();
        let params_size_hint = params.iter().fold(0u32, |acc, p| acc + 4 + BindParams::size(p).max(0) as u32);

        conn.send(frontend::Bind {
            portal_name: portal.as_str(),
            stmt_name: stmt_name.as_str(),
            param_formats_len: 1,
            param_formats: [PgFormat::Text as u16],
            params_len: params.len().to_u16(),
            params_size_hint,
            params,
            result_formats_len: 1,
            result_formats: [PgFormat::Text as u16],
        });
        conn.send(frontend::Describe { kind: b'P', name: portal.as_str() });
        conn.send(frontend::Execute { portal_name: portal.as_str(), max_rows });
        conn.send(frontend::Sync);
        conn.flush().await?;

        conn.recv::<backend::BindComplete>().await?;

        let fields = match conn.recv::<BackendMessage>().await? {
            BackendMessage::RowDescription(rd) => Some(Row::shared_fields(&rd)),
            BackendMessage::NoData(_) => None,
            other => return Err(other.unexpected("describe portal").into()),
        };

        Ok(Rows { conn, fields, done: false, cmd: None })
    }
}

fn hash_sql(sql: &str) -> u64 {
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    sql.hash(&mut hasher);
    hasher.finish()
}

/// A streaming result set from the extended query path. Must be driven to
/// completion (`next()` returning `None`) before the connection is fit for
/// another request — half-drained portals leave a `Sync` owed to the server.
pub struct Rows<'a> {
    conn: &'a mut Connection,
    fields: Option<Arc<[FieldDescription]>>,
    done: bool,
    cmd: Option<CommandComplete>,
}

impl Rows<'_> {
    /// Fetch the next row, or `None` once the result set (and the `Sync`
    /// round-trip that follows it) is exhausted.
    pub async fn next(&mut self) -> Result<Option<Row>> {
        if self.done {
            return Ok(None);
        }
        loop {
            match self.conn.recv::<BackendMessage>().await? {
                BackendMessage::DataRow(data) => {
                    let fields = self.fields.clone().expect("DataRow without RowDescription/NoData");
                    return Ok(Some(Row::from_data(fields, data)?));
                }
                BackendMessage::CommandComplete(cmd) => self.cmd = Some(cmd),
                BackendMessage::EmptyQueryResponse(_) => {}
                // TODO: resume via another Execute+Sync instead of treating
                // suspension as terminal, once a caller needs `max_rows`
                // paging rather than all-at-once fetches.
                BackendMessage::PortalSuspended(_) => {}
                BackendMessage::ReadyForQuery(_) => {
                    self.done = true;
                    return Ok(None);
                }
                other => return Err(other.unexpected("extended query row stream").into()),
            }
        }
    }

    /// Rows affected, as reported by `CommandComplete`. Meaningful only
    /// once the stream has been drained (`next()` returned `None`).
    pub fn command_complete(&self) -> RowResult {
        RowResult { rows_affected: self.cmd.as_ref().map(|c| parse_rows_affected(&c.tag)).unwrap_or(0) }
    }
}

/// Parse the row count out of a `CommandComplete` tag (`"SELECT 3"`,
/// `"INSERT 0 1"`, ...), the way `fetch::command_complete` does.
pub(crate) fn parse_rows_affected(tag: &str) -> u64 {
    let mut words = tag.split_whitespace();
    let (Some(verb), Some(second)) = (words.next(), words.next()) else {
        return 0;
    };
    let rows = match verb {
        "INSERT" => words.next().unwrap_or_default(),
        "SELECT" | "UPDATE" | "DELETE" | "MERGE" | "FETCH" | "MOVE" | "COPY" => second,
        _ => return 0,
    };
    rows.parse().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_insert_tag() {
        assert_eq!(parse_rows_affected("INSERT 0 5"), 5);
    }

    #[test]
    fn parses_select_tag() {
        assert_eq!(parse_rows_affected("SELECT 3"), 3);
    }

    #[test]
    fn unrecognised_tag_is_zero() {
        assert_eq!(parse_rows_affected("BEGIN"), 0);
    }
}
