//! Transaction scope (part of the Begin/Commit/Rollback surface).
//!
//! Adapted from `postro::transaction::Transaction`: an RAII guard that
//! rolls back on drop unless committed (or explicitly rolled back), with
//! the same async-drop workaround the teacher uses — `Drop` can't await,
//! so it queues `ROLLBACK` and bumps the pending-`ReadyForQuery` counter,
//! leaving the actual round trip to the connection's next operation.
use crate::{
    connection::Connection,
    error::Result,
    message::backend,
    message::frontend,
};

/// Begin a transaction (`BEGIN`) on `conn`, returning a guard that commits
/// or rolls it back.
pub async fn begin(conn: &mut Connection) -> Result<Transaction<'_>> {
    conn.send(frontend::Query { sql: "BEGIN" });
    conn.flush().await?;
    conn.recv::<backend::CommandComplete>().await?;
    conn.recv::<backend::ReadyForQuery>().await?;
    Ok(Transaction { conn, resolved: false })
}

/// A transaction in progress. Rolls back automatically if dropped without
/// calling [`Transaction::commit`] or [`Transaction::rollback`].
pub struct Transaction<'a> {
    conn: &'a mut Connection,
    resolved: bool,
}

impl<'a> Transaction<'a> {
    /// Borrow the underlying connection to run queries within the
    /// transaction (`query::query(sql, tx.connection())`, etc).
    pub fn connection(&mut self) -> &mut Connection {
        self.conn
    }

    /// Commit (`COMMIT`) and consume the guard.
    pub async fn commit(mut self) -> Result<()> {
        self.conn.send(frontend::Query { sql: "COMMIT" });
        self.conn.flush().await?;
        self.conn.recv::<backend::CommandComplete>().await?;
        self.conn.recv::<backend::ReadyForQuery>().await?;
        self.resolved = true;
        Ok(())
    }

    /// Roll back (`ROLLBACK`) explicitly and consume the guard.
    pub async fn rollback(mut self) -> Result<()> {
        self.conn.send(frontend::Query { sql: "ROLLBACK" });
        self.conn.flush().await?;
        self.conn.recv::<backend::CommandComplete>().await?;
        self.conn.recv::<backend::ReadyForQuery>().await?;
        self.resolved = true;
        Ok(())
    }
}

impl Drop for Transaction<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.conn.send(frontend::Query { sql: "ROLLBACK" });
            self.conn.ready_request();
        }
    }
}
