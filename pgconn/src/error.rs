//! `pgconn` error types (C12 — the ambient error model).
use std::{backtrace::Backtrace, fmt, io};

use crate::{
    auth::ScramError,
    config::ConfigError,
    message::backend::ErrorResponse,
    message::ProtocolError,
    row::DecodeError,
};

/// A specialized [`Result`] type for `pgconn` operations.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible errors from `pgconn`.
///
/// Wraps an [`ErrorKind`] with a capture-on-construction backtrace, in the
/// same shape the teacher crate uses: `Debug` delegates to quoted `Display`
/// so error values print legibly with `{:?}` inside `.unwrap()` panics.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// `true` iff the failed request may be retried on a fresh connection
    /// without risk of having been partially applied: a transport error
    /// where zero bytes were written before the failure, per §4.6's
    /// retry-safe-write discipline.
    pub fn is_retryable(&self) -> bool {
        matches!(&self.kind, ErrorKind::Transport { retryable: true, .. })
    }

    /// `true` iff the connection that produced this error is latched bad
    /// and must not be reused (§3's bad-connection-flag invariant).
    pub fn is_fatal_to_connection(&self) -> bool {
        match &self.kind {
            ErrorKind::Transport { .. } => true,
            ErrorKind::Protocol(_) => true,
            ErrorKind::Auth(_) => true,
            ErrorKind::Cancelled => true,
            ErrorKind::Database(e) => e.is_fatal(),
            ErrorKind::Config(_) | ErrorKind::State(_) | ErrorKind::Decode(_) | ErrorKind::RowNotFound => false,
        }
    }

    pub(crate) fn transport(io: io::Error, retryable: bool) -> Self {
        Self::from(ErrorKind::Transport { io, retryable })
    }

    pub(crate) fn state(msg: impl Into<String>) -> Self {
        Self::from(ErrorKind::State(StateError(msg.into())))
    }

    pub(crate) fn cancelled() -> Self {
        Self::from(ErrorKind::Cancelled)
    }

    pub(crate) fn row_not_found() -> Self {
        Self::from(ErrorKind::RowNotFound)
    }
}

/// All possible error kinds from `pgconn`, per the taxonomy of §7.
pub enum ErrorKind {
    /// Unexpected tag, malformed payload, length overflow. Always latches
    /// the connection bad.
    Protocol(ProtocolError),
    /// Socket read/write/EOF. `retryable` iff no bytes were written before
    /// the failure.
    Transport { io: io::Error, retryable: bool },
    /// Authentication subcode unhandled, or SCRAM server-signature mismatch.
    Auth(AuthError),
    /// A structured `ErrorResponse` from the server. Recoverable unless the
    /// severity is `FATAL`/`PANIC` (see [`ErrorResponse::is_fatal`]).
    Database(ErrorResponse),
    /// Unsupported `sslmode`, non-UTF8 `client_encoding`, bad URL/DSN,
    /// unknown option, SSL key permissions: fails before sending any bytes.
    Config(ConfigError),
    /// Caller invoked an operation in the wrong state (COPY outside a
    /// transaction, use of a closed statement, concurrent request).
    State(StateError),
    /// A deadline or explicit cancellation fired during blocking I/O.
    Cancelled,
    /// Row/column decode failure.
    Decode(DecodeError),
    /// `fetch_one` found no row.
    RowNotFound,
}

/// Authentication-phase failure: an unimplemented method, or a failed
/// SCRAM exchange (malformed message, server signature mismatch).
#[derive(Debug)]
pub enum AuthError {
    UnsupportedMethod(&'static str),
    Scram(ScramError),
}

impl fmt::Display for AuthError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedMethod(name) => write!(f, "authentication method {name} is not supported"),
            Self::Scram(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for AuthError {}

/// Caller invoked an operation the connection's current state does not
/// permit.
#[derive(Debug)]
pub struct StateError(String);

impl fmt::Display for StateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::error::Error for StateError {}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ProtocolError>e => ErrorKind::Protocol(e));
from!(<ConfigError>e => ErrorKind::Config(e));
from!(<ErrorResponse>e => ErrorKind::Database(e));
from!(<DecodeError>e => ErrorKind::Decode(e));
from!(<AuthError>e => ErrorKind::Auth(e));

impl std::error::Error for Error {}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }
        fmt::Display::fmt(&self.kind, f)
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")?;
        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            write!(f, "\n\nStack backtrace:\n{}", self.backtrace)?;
        }
        Ok(())
    }
}

impl std::error::Error for ErrorKind {}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Protocol(e) => e.fmt(f),
            Self::Transport { io, .. } => io.fmt(f),
            Self::Auth(e) => e.fmt(f),
            Self::Database(e) => e.fmt(f),
            Self::Config(e) => e.fmt(f),
            Self::State(e) => e.fmt(f),
            Self::Cancelled => f.write_str("operation cancelled"),
            Self::Decode(e) => e.fmt(f),
            Self::RowNotFound => f.write_str("row not found"),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
