//! Transport socket: a TCP stream, optionally a UNIX domain socket, and the
//! slot a [`crate::tls`] upgrade plugs into.
//!
//! Adapted from `qs::net::socket::Socket`: same either/or enum transparently
//! implementing `AsyncRead`/`AsyncWrite`, generalized with a third `Tls`
//! variant boxing whatever stream the pluggable `TlsConnector` hands back.
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
#[cfg(unix)]
use tokio::net::UnixStream;

use crate::common::verbose;

/// A stream this driver can read/write frames over: a raw TCP or UNIX
/// socket, or one wrapped by a TLS upgrade.
pub enum Socket {
    Tcp(TcpStream),
    #[cfg(unix)]
    Unix(UnixStream),
    Tls(Box<dyn TlsStream>),
}

/// Anything a [`crate::tls::TlsConnector`] can hand back after upgrading a
/// plain socket.
pub trait TlsStream: AsyncRead + AsyncWrite + Unpin + Send {}
impl<T: AsyncRead + AsyncWrite + Unpin + Send> TlsStream for T {}

impl Socket {
    pub async fn connect_tcp(host: &str, port: u16) -> io::Result<Self> {
        let socket = TcpStream::connect((host, port)).await?;
        socket.set_nodelay(true)?;
        verbose!("connected via TCP to {host}:{port}");
        Ok(Self::Tcp(socket))
    }

    #[cfg(unix)]
    pub async fn connect_unix(path: &std::path::Path) -> io::Result<Self> {
        let socket = UnixStream::connect(path).await?;
        verbose!("connected via UNIX socket at {}", path.display());
        Ok(Self::Unix(socket))
    }

    #[cfg(not(unix))]
    pub async fn connect_unix(path: &std::path::Path) -> io::Result<Self> {
        let _ = path;
        Err(io::Error::new(io::ErrorKind::Unsupported, "UNIX domain sockets are not supported on this platform"))
    }
}

impl AsyncRead for Socket {
    fn poll_read(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Self::Unix(s) => Pin::new(s).poll_read(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Socket {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Self::Unix(s) => Pin::new(s).poll_write(cx, buf),
            Self::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_write_vectored(cx, bufs),
            #[cfg(unix)]
            Self::Unix(s) => Pin::new(s).poll_write_vectored(cx, bufs),
            Self::Tls(s) => Pin::new(s).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        true
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Self::Unix(s) => Pin::new(s).poll_flush(cx),
            Self::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Self::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Self::Unix(s) => Pin::new(s).poll_shutdown(cx),
            Self::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for Socket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Tcp(s) => write!(f, "Socket::Tcp({:?})", s.peer_addr()),
            #[cfg(unix)]
            Self::Unix(_) => f.write_str("Socket::Unix"),
            Self::Tls(_) => f.write_str("Socket::Tls"),
        }
    }
}
