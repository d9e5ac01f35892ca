//! COPY subprotocol (C9): `COPY ... FROM STDIN` streaming.
//!
//! Wire mechanics (`CopyInResponse`'s format/column-format fields,
//! `CopyData`/`CopyDone`/`CopyFail`) grounded in the documented-but-dormant
//! COPY branches of `pg::conn`'s `query()` loop; the `#[must_use]`
//! begin/send/finish/abort builder shape grounded in `sqlx-core`'s
//! `postgres::copy::PgCopyIn`. Unlike that teacher, there is no background
//! receive task backing this connection (see `DESIGN.md`), so `send`/
//! `write_row` only ever write; errors surface at `finish`/`abort`.
use bytes::BytesMut;

use crate::{
    connection::{Connection, TxStatus},
    error::{Error, ErrorKind, Result},
    message::backend::{BackendMessage, CopyDirection},
    message::frontend,
    query::parse_rows_affected,
    row::RowResult,
};

/// Largest single `CopyData` payload: the 1 GiB message-length ceiling
/// minus the type byte, the length prefix, and the length field itself.
pub const COPY_MAX_DATA_LEN: usize = 0x3fff_ffff - 1 - 4;

/// Flush once buffered COPY data crosses this size, inside a buffer left
/// some headroom under the 64 KiB round number it approximates.
const FLUSH_THRESHOLD: usize = 63 * 1024;

/// SQLSTATE a `CopyFail` is expected to come back as once the server
/// honours it: `query_canceled`.
const COPY_ABORTED: &str = "57014";

/// Double-quote `name` as a PostgreSQL identifier: embedded `"` doubled,
/// truncated at the first NUL (which can't appear in a valid identifier).
pub fn quote_ident(name: &str) -> String {
    let name = name.split('\0').next().unwrap_or("");
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
    out
}

fn push_escaped(buf: &mut BytesMut, value: &str) {
    // Only these need escaping in COPY text format; everything else,
    // including other control bytes, passes through verbatim.
    for c in value.chars() {
        match c {
            '\\' => buf.extend_from_slice(b"\\\\"),
            '\n' => buf.extend_from_slice(b"\\n"),
            '\r' => buf.extend_from_slice(b"\\r"),
            '\t' => buf.extend_from_slice(b"\\t"),
            '\u{8}' => buf.extend_from_slice(b"\\b"),
            '\u{c}' => buf.extend_from_slice(b"\\f"),
            '\u{b}' => buf.extend_from_slice(b"\\v"),
            other => {
                let mut tmp = [0u8; 4];
                buf.extend_from_slice(other.encode_utf8(&mut tmp).as_bytes());
            }
        }
    }
}

/// A connection transitioned into `COPY ... FROM STDIN` streaming mode.
///
/// Either [`CopyIn::finish`] or [`CopyIn::abort`] must be called before the
/// connection is fit for another request; dropping a `CopyIn` without
/// calling one panics rather than silently leaving the connection stuck
/// mid-COPY; see its `Drop` impl.
#[must_use = "call `.finish()` or `.abort()` or the connection is left stuck mid-COPY"]
pub struct CopyIn<'a> {
    conn: Option<&'a mut Connection>,
    column_formats: Vec<i16>,
    buf: BytesMut,
}

impl<'a> CopyIn<'a> {
    pub(crate) async fn begin(conn: &'a mut Connection, statement: &str) -> Result<Self> {
        if conn.tx_status() != TxStatus::InTransaction {
            return Err(Error::state("COPY IN is only legal inside a transaction"));
        }

        conn.send(frontend::Query { sql: statement });
        conn.flush().await?;

        let response = match conn.recv::<BackendMessage>().await? {
            BackendMessage::CopyResponse(r) if r.direction == CopyDirection::In => r,
            other => return Err(other.unexpected("COPY IN begin").into()),
        };
        if response.overall_format != 0 {
            return Err(Error::state("binary COPY format is not supported"));
        }

        Ok(Self { conn: Some(conn), column_formats: response.column_formats, buf: BytesMut::new() })
    }

    /// Number of columns the server expects per row.
    pub fn num_columns(&self) -> usize {
        self.column_formats.len()
    }

    /// Encode one row as tab-delimited COPY text (`\N` for `None`,
    /// backslash-escaping `\b \f \n \r \t \v \\`), buffering it until the
    /// flush threshold is crossed.
    pub async fn write_row<'v>(&mut self, values: impl IntoIterator<Item = Option<&'v str>>) -> Result<()> {
        let mut first = true;
        for value in values {
            if !first {
                self.buf.extend_from_slice(b"\t");
            }
            first = false;
            match value {
                None => self.buf.extend_from_slice(b"\\N"),
                Some(s) => push_escaped(&mut self.buf, s),
            }
        }
        self.buf.extend_from_slice(b"\n");
        self.maybe_flush().await
    }

    /// Append already-formatted COPY data verbatim (e.g. forwarding a file
    /// already in COPY text/CSV format), buffering it the same way.
    pub async fn send(&mut self, data: &[u8]) -> Result<()> {
        self.buf.extend_from_slice(data);
        self.maybe_flush().await
    }

    async fn maybe_flush(&mut self) -> Result<()> {
        if self.buf.len() >= FLUSH_THRESHOLD {
            self.flush_buf().await?;
        }
        Ok(())
    }

    async fn flush_buf(&mut self) -> Result<()> {
        if self.buf.is_empty() {
            return Ok(());
        }
        let conn = self.conn.as_deref_mut().expect("CopyIn used after finish/abort");
        for chunk in self.buf.chunks(COPY_MAX_DATA_LEN) {
            conn.send(frontend::CopyData { data: chunk });
        }
        self.buf.clear();
        conn.flush().await
    }

    /// Signal that every row has been sent and wait for the server to
    /// commit the COPY. Returns the row count from `CommandComplete`.
    pub async fn finish(mut self) -> Result<RowResult> {
        self.flush_buf().await?;
        let conn = self.conn.take().expect("CopyIn::finish: connection already taken");

        conn.send(frontend::CopyDone);
        conn.flush().await?;

        let cmd = match conn.recv::<BackendMessage>().await? {
            BackendMessage::CommandComplete(cmd) => cmd,
            other => return Err(other.unexpected("COPY IN finish").into()),
        };
        match conn.recv::<BackendMessage>().await? {
            BackendMessage::ReadyForQuery(_) => {}
            other => return Err(other.unexpected("COPY IN finish").into()),
        }

        Ok(RowResult { rows_affected: parse_rows_affected(&cmd.tag) })
    }

    /// Abort the COPY, discarding anything sent so far. `message` is
    /// surfaced in the server's logs as the cancellation reason.
    pub async fn abort(mut self, message: impl Into<String>) -> Result<()> {
        let conn = self.conn.take().expect("CopyIn::abort: connection already taken");
        let message = message.into();

        conn.send(frontend::CopyFail { message: &message });
        conn.flush().await?;

        // The server always answers CopyFail with an ErrorResponse; `recv`
        // turns that into an `Err` and queues the recovery `Sync` itself,
        // so there's nothing left to drive here beyond checking the code.
        match conn.recv::<BackendMessage>().await {
            Err(e) => match e.kind() {
                ErrorKind::Database(resp) if resp.fields.code.as_deref() == Some(COPY_ABORTED) => Ok(()),
                _ => Err(e),
            },
            Ok(other) => Err(other.unexpected("COPY IN abort").into()),
        }
    }
}

impl Drop for CopyIn<'_> {
    fn drop(&mut self) {
        if self.conn.is_some() {
            panic!("CopyIn dropped without calling `.finish()` or `.abort()`");
        }
    }
}

/// Issue `statement` (expected to be a `COPY ... FROM STDIN ...` command)
/// and transition `conn` into COPY IN streaming mode.
pub async fn copy_in<'a>(statement: &str, conn: &'a mut Connection) -> Result<CopyIn<'a>> {
    CopyIn::begin(conn, statement).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quotes_embedded_double_quotes() {
        assert_eq!(quote_ident(r#"weird"name"#), r#""weird""name""#);
    }

    #[test]
    fn quote_ident_truncates_at_nul() {
        assert_eq!(quote_ident("abc\0def"), "\"abc\"");
    }
}
