//! Query cancellation (C10): dial a fresh connection and send
//! `CancelRequest` carrying the target's `BackendKeyData`.
//!
//! Adapted near-verbatim from `maximebedard-dbzioum/pg/src/cancel.rs`,
//! generalized to dial through [`crate::net::Socket`] (TCP or UNIX) instead
//! of that crate's single `Stream` type.
use std::io;

use tokio::io::AsyncWriteExt;

use crate::{
    config::{Config, Host},
    net::Socket,
};

/// Enough information to issue a `CancelRequest` against a specific backend,
/// obtained from [`crate::message::backend::BackendKeyData`] during startup.
#[derive(Debug, Clone, Copy)]
pub struct CancelToken {
    pub(crate) pid: i32,
    pub(crate) secret_key: i32,
}

impl CancelToken {
    pub(crate) fn new(pid: i32, secret_key: i32) -> Self {
        Self { pid, secret_key }
    }

    /// Open a new connection to the same server and ask it to cancel
    /// whatever the target connection is currently running.
    ///
    /// This is inherently racy per the protocol: if the target connection
    /// is between queries, the cancel request has no effect.
    pub async fn cancel(&self, config: &Config) -> io::Result<()> {
        let mut socket = match &config.host {
            Host::Tcp(host) => Socket::connect_tcp(host, config.port).await?,
            Host::Unix(path) => Socket::connect_unix(path).await?,
        };

        socket.write_i32(16).await?;
        socket.write_i32(80877102).await?;
        socket.write_i32(self.pid).await?;
        socket.write_i32(self.secret_key).await?;
        socket.shutdown().await
    }
}
