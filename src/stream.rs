//! Convenience wrapper for streams to switch between plain TCP and TLS at runtime.
//!
//! There is no dependency on actual TLS implementations unless the `native-tls`
//! feature is enabled. Everything else only needs the [`Transport`] trait.

use std::{
    fmt::{self, Debug},
    io::{Read, Result as IoResult, Write},
    net::TcpStream,
    time::Duration,
};

#[cfg(feature = "native-tls")]
use native_tls_crate::TlsStream;

/// Stream mode, either plain TCP or TLS.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Plain mode (`ws://` URL).
    Plain,
    /// TLS mode (`wss://` URL).
    Tls,
}

/// A byte stream a WebSocket connection can run over.
///
/// Besides reading and writing, the connection needs to switch the stream between
/// blocking and non-blocking operation and to forward a read deadline.
pub trait Transport: Read + Write {
    /// Move the stream into or out of non-blocking mode.
    fn set_nonblocking(&mut self, nonblocking: bool) -> IoResult<()>;
    /// Set the read deadline; `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> IoResult<()>;
}

impl Transport for TcpStream {
    fn set_nonblocking(&mut self, nonblocking: bool) -> IoResult<()> {
        TcpStream::set_nonblocking(self, nonblocking)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> IoResult<()> {
        TcpStream::set_read_timeout(self, timeout)
    }
}

#[cfg(feature = "native-tls")]
impl<S: Transport> Transport for TlsStream<S> {
    fn set_nonblocking(&mut self, nonblocking: bool) -> IoResult<()> {
        self.get_mut().set_nonblocking(nonblocking)
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> IoResult<()> {
        self.get_mut().set_read_timeout(timeout)
    }
}

/// Trait to switch TCP_NODELAY.
pub trait NoDelay {
    /// Set the TCP_NODELAY option to the given value.
    fn set_nodelay(&mut self, nodelay: bool) -> IoResult<()>;
}

impl NoDelay for TcpStream {
    fn set_nodelay(&mut self, nodelay: bool) -> IoResult<()> {
        TcpStream::set_nodelay(self, nodelay)
    }
}

#[cfg(feature = "native-tls")]
impl<S: Read + Write + NoDelay> NoDelay for TlsStream<S> {
    fn set_nodelay(&mut self, nodelay: bool) -> IoResult<()> {
        self.get_mut().set_nodelay(nodelay)
    }
}

/// A stream that might be protected with TLS.
#[non_exhaustive]
pub enum MaybeTlsStream<S: Read + Write> {
    /// Unencrypted socket stream.
    Plain(S),
    #[cfg(feature = "native-tls")]
    /// Encrypted socket stream using `native-tls`.
    NativeTls(TlsStream<S>),
}

impl<S: Read + Write + Debug> Debug for MaybeTlsStream<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(s) => f.debug_tuple("MaybeTlsStream::Plain").field(s).finish(),
            #[cfg(feature = "native-tls")]
            Self::NativeTls(s) => f.debug_tuple("MaybeTlsStream::NativeTls").field(s).finish(),
        }
    }
}

impl<S: Read + Write> Read for MaybeTlsStream<S> {
    fn read(&mut self, buf: &mut [u8]) -> IoResult<usize> {
        match *self {
            MaybeTlsStream::Plain(ref mut s) => s.read(buf),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(ref mut s) => s.read(buf),
        }
    }
}

impl<S: Read + Write> Write for MaybeTlsStream<S> {
    fn write(&mut self, buf: &[u8]) -> IoResult<usize> {
        match *self {
            MaybeTlsStream::Plain(ref mut s) => s.write(buf),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(ref mut s) => s.write(buf),
        }
    }

    fn flush(&mut self) -> IoResult<()> {
        match *self {
            MaybeTlsStream::Plain(ref mut s) => s.flush(),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(ref mut s) => s.flush(),
        }
    }
}

impl<S: Transport> Transport for MaybeTlsStream<S> {
    fn set_nonblocking(&mut self, nonblocking: bool) -> IoResult<()> {
        match *self {
            MaybeTlsStream::Plain(ref mut s) => s.set_nonblocking(nonblocking),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(ref mut s) => s.set_nonblocking(nonblocking),
        }
    }

    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> IoResult<()> {
        match *self {
            MaybeTlsStream::Plain(ref mut s) => s.set_read_timeout(timeout),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(ref mut s) => s.set_read_timeout(timeout),
        }
    }
}

impl<S: Read + Write + NoDelay> NoDelay for MaybeTlsStream<S> {
    fn set_nodelay(&mut self, nodelay: bool) -> IoResult<()> {
        match *self {
            MaybeTlsStream::Plain(ref mut s) => s.set_nodelay(nodelay),
            #[cfg(feature = "native-tls")]
            MaybeTlsStream::NativeTls(ref mut s) => s.set_nodelay(nodelay),
        }
    }
}
