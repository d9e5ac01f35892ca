//! `pgconn`: a client-side driver for the PostgreSQL frontend/backend wire
//! protocol (v3.0) — framing and dispatch, `SCRAM-SHA-256`/MD5/cleartext
//! authentication, the simple and extended query sub-protocols, and `COPY
//! ... FROM STDIN` streaming.
//!
//! No connection pooling, no row-to-object derive macros, and no query
//! planning: those are left to a surrounding collaborator (see
//! `DESIGN.md`).
//!
//! # Example
//!
//! ```no_run
//! use pgconn::Connection;
//!
//! # async fn app() -> pgconn::Result<()> {
//! let mut conn = Connection::connect_env().await?;
//!
//! let (answer, name): (i32, String) = pgconn::query("SELECT 420, $1", &mut conn)
//!     .bind(&"Foo")
//!     .fetch_one()
//!     .await?;
//!
//! assert_eq!(answer, 420);
//! assert_eq!(name, "Foo");
//! # Ok(())
//! # }
//! ```
//!
//! Transactions and COPY IN:
//!
//! ```no_run
//! use pgconn::Connection;
//!
//! # async fn app() -> pgconn::Result<()> {
//! let mut conn = Connection::connect_env().await?;
//! let mut tx = pgconn::begin(&mut conn).await?;
//!
//! let mut copy = pgconn::copy_in("COPY foo(id, name) FROM STDIN", tx.connection()).await?;
//! copy.write_row([Some("1"), Some("bar")]).await?;
//! copy.write_row([Some("2"), None]).await?;
//! copy.finish().await?;
//!
//! tx.commit().await?;
//! # Ok(())
//! # }
//! ```

pub mod common;
mod net;
mod ext;

// Protocol
pub mod message;
pub mod config;
mod tls;
pub mod cancel;

// Encoding
mod value;
pub mod encode;
pub mod codec;

// Component
mod statement;
pub mod sql;
pub mod row;
mod auth;

// Operation
pub mod query;
pub mod simple;
pub mod copy;
pub mod transaction;

// Connection
pub mod connection;

mod error;

pub use cancel::CancelToken;
pub use config::{Config, ConfigError, Host, SslMode};
pub use connection::{Connection, TxStatus};
pub use copy::{CopyIn, copy_in, quote_ident};
pub use encode::Encode;
pub use auth::{ScramError, ScramSha256};
pub use error::{AuthError, Error, ErrorKind, Result, StateError};
pub use query::{Query, Rows, query};
pub use row::{Column, Decode, DecodeError, FromRow, Row, RowResult};
pub use simple::{SimpleQuery, query_simple};
pub use sql::SqlExt;
pub use tls::TlsConnector;
pub use transaction::{Transaction, begin};
