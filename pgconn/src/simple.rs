//! Simple query path (C7): a single `Query` message, always text format,
//! no statement cache, no parameters.
//!
//! Adapted from `qs::protocol::simple_query`'s send-flush-loop shape,
//! generalized to multi-result-set: a simple-query string may hold several
//! `;`-separated statements, each producing its own `RowDescription`/
//! `DataRow*`/`CommandComplete` group before the single terminal
//! `ReadyForQuery` that ends the whole exchange. A `RowDescription`
//! arriving right after a `CommandComplete` starts the next result set;
//! `next()` returns `None` at that boundary and `next_result_set()` steps
//! over it.
use std::sync::Arc;

use crate::{
    connection::Connection,
    error::Result,
    message::backend::{BackendMessage, CommandComplete, FieldDescription},
    message::frontend,
    query::parse_rows_affected,
    row::{Row, RowResult},
};

/// Send `sql` (which may hold several `;`-separated statements) through the
/// simple query protocol and return a cursor over its result sets.
pub async fn query_simple<'a>(sql: &str, conn: &'a mut Connection) -> Result<SimpleQuery<'a>> {
    conn.send(frontend::Query { sql });
    conn.flush().await?;
    Ok(SimpleQuery { conn, fields: None, done: false, set_done: false, cmd: None })
}

/// A cursor over a simple query's (possibly several) result sets.
pub struct SimpleQuery<'a> {
    conn: &'a mut Connection,
    fields: Option<Arc<[FieldDescription]>>,
    /// `true` once `ReadyForQuery` has been seen: no further result sets.
    done: bool,
    /// `true` once the current result set's `CommandComplete`/
    /// `EmptyQueryResponse` has been seen; `next_result_set` clears it.
    set_done: bool,
    cmd: Option<CommandComplete>,
}

impl SimpleQuery<'_> {
    /// Fetch the next row of the current result set, or `None` once it
    /// ends (a further call without `next_result_set` stays `None`).
    pub async fn next(&mut self) -> Result<Option<Row>> {
        if self.set_done {
            return Ok(None);
        }
        loop {
            match self.conn.recv::<BackendMessage>().await? {
                BackendMessage::RowDescription(rd) => self.fields = Some(Row::shared_fields(&rd)),
                BackendMessage::DataRow(data) => {
                    let fields = self.fields.clone().expect("DataRow without a preceding RowDescription");
                    return Ok(Some(Row::from_data(fields, data)?));
                }
                BackendMessage::CommandComplete(cmd) => {
                    self.cmd = Some(cmd);
                    self.set_done = true;
                    return Ok(None);
                }
                BackendMessage::EmptyQueryResponse(_) => {
                    self.cmd = None;
                    self.set_done = true;
                    return Ok(None);
                }
                BackendMessage::ReadyForQuery(_) => {
                    self.done = true;
                    self.set_done = true;
                    return Ok(None);
                }
                other => return Err(other.unexpected("simple query").into()),
            }
        }
    }

    /// Step past the current result-set boundary so the next `next()` call
    /// reads the following statement's rows. Returns `false` once the
    /// whole simple-query exchange (all statements) has concluded.
    pub fn next_result_set(&mut self) -> bool {
        if self.done {
            return false;
        }
        self.set_done = false;
        self.cmd = None;
        self.fields = None;
        true
    }

    /// Rows affected by the most recently completed result set, as
    /// reported by its `CommandComplete` tag.
    pub fn command_complete(&self) -> RowResult {
        RowResult { rows_affected: self.cmd.as_ref().map(|c| parse_rows_affected(&c.tag)).unwrap_or(0) }
    }

    /// `true` once every statement's `ReadyForQuery` has arrived.
    pub fn is_done(&self) -> bool {
        self.done
    }
}

#[cfg(test)]
mod tests {
    // `SimpleQuery` needs a live `Connection` to exercise its
    // result-set-boundary bookkeeping; `parse_rows_affected`'s tag parsing
    // is covered by `query.rs`'s tests, which this module reuses.
}
