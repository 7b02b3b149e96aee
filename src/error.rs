//! Error handling.

use std::{io, result};

use http::header::HeaderName;
use thiserror::Error;

/// Result type of all wsstream calls.
pub type Result<T, E = Error> = result::Result<T, E>;

/// Possible WebSocket errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Trying to work with a connection that has already been closed with
    /// [`WebSocket::close`](crate::WebSocket::close).
    ///
    /// This indicates your code tries to operate on the connection when it really
    /// shouldn't anymore, so this really indicates a programmer error on your part.
    #[error("Trying to work with closed connection")]
    AlreadyClosed,
    /// The configured read deadline of the transport expired before the
    /// requested bytes arrived.
    ///
    /// The connection is still usable, the caller may retry the read.
    #[error("Read timeout")]
    ReadTimeout,
    /// The transport delivered fewer bytes than a frame requires.
    ///
    /// This happens when the peer goes away in the middle of a frame, or when a
    /// non-blocking transport runs dry after a frame has started. The connection
    /// should be considered dead.
    #[error("Wanted to read {wanted} bytes but missed {missing}; connection dead?")]
    ShortRead {
        /// Number of bytes the decoder asked for.
        wanted: usize,
        /// Number of bytes that never arrived.
        missing: usize,
    },
    /// Writing a frame to the transport failed. No byte count is reported for
    /// a frame that was not completely written.
    #[error("Write failed: {0}")]
    Write(#[source] io::Error),
    /// Input-output error. Apart from `ReadTimeout` and `ShortRead`, which are
    /// reported separately, these are errors of the underlying connection and you
    /// should probably consider them fatal.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    /// TLS error.
    ///
    /// Note that this error variant is enabled only if the `native-tls` feature
    /// is enabled.
    #[cfg(feature = "native-tls")]
    #[error("TLS error: {0}")]
    Tls(#[from] TlsError),
    /// - When reading: a frame or message exceeds the configured limits.
    /// - When handshaking: the response header block is too large.
    #[error("Space limit exceeded: {0}")]
    Capacity(#[from] CapacityError),
    /// Protocol violation, mostly during the opening handshake.
    #[error("WebSocket protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    /// Invalid URL.
    #[error("URL error: {0}")]
    Url(#[from] UrlError),
    /// The server answered the upgrade request with something other than
    /// `HTTP/1.1 101`. Contains the received status line.
    #[error("HTTP error: {0}")]
    Http(String),
    /// HTTP format error.
    #[error("HTTP format error: {0}")]
    HttpFormat(#[from] http::Error),
}

impl Error {
    /// Whether this error was produced by the opening handshake, in which case
    /// no connection has been created.
    pub fn is_handshake_failure(&self) -> bool {
        match self {
            Error::Http(_) => true,
            Error::Protocol(err) => err.is_handshake(),
            _ => false,
        }
    }
}

impl From<http::header::InvalidHeaderValue> for Error {
    fn from(err: http::header::InvalidHeaderValue) -> Self {
        Error::HttpFormat(err.into())
    }
}

impl From<http::header::InvalidHeaderName> for Error {
    fn from(err: http::header::InvalidHeaderName) -> Self {
        Error::HttpFormat(err.into())
    }
}

impl From<http::uri::InvalidUri> for Error {
    fn from(err: http::uri::InvalidUri) -> Self {
        Error::HttpFormat(err.into())
    }
}

impl From<httparse::Error> for Error {
    fn from(err: httparse::Error) -> Self {
        match err {
            httparse::Error::TooManyHeaders => Error::Capacity(CapacityError::TooManyHeaders),
            e => Error::Protocol(ProtocolError::HttparseError(e)),
        }
    }
}

/// Indicates the specific type/cause of a capacity error.
#[derive(Error, Debug, PartialEq, Eq, Clone, Copy)]
pub enum CapacityError {
    /// Too many headers provided (see [`httparse::Error::TooManyHeaders`]).
    #[error("Too many headers")]
    TooManyHeaders,
    /// Received header is too long.
    #[error("Header too long")]
    HeaderTooLong,
    /// Message or frame is bigger than the maximum allowed size.
    #[error("Message too long: {size} > {max_size}")]
    MessageTooLong {
        /// The size of the message.
        size: usize,
        /// The maximum allowed message size.
        max_size: usize,
    },
}

/// Indicates the specific type/cause of a protocol error.
#[derive(Error, Debug, PartialEq, Eq, Clone)]
pub enum ProtocolError {
    /// Wrong HTTP version used (the upgrade response must be `HTTP/1.1`).
    #[error("HTTP version must be 1.1")]
    WrongHttpVersion,
    /// Missing `Connection: upgrade` HTTP header.
    #[error("No \"Connection: upgrade\" header")]
    MissingConnectionUpgradeHeader,
    /// Missing `Upgrade: websocket` HTTP header.
    #[error("No \"Upgrade: websocket\" header")]
    MissingUpgradeWebSocketHeader,
    /// The `Sec-WebSocket-Accept` header is either not present or does not specify the correct key value.
    #[error("Key mismatch in \"Sec-WebSocket-Accept\" header")]
    SecWebSocketAcceptKeyMismatch,
    /// None of the headers that prove an upgrade were acceptable.
    #[error("No upgrade header matched")]
    NoUpgradeEvidence,
    /// A header could not be added to the upgrade request.
    #[error("Invalid header {0} in request")]
    InvalidHeader(HeaderName),
    /// No more data while still performing handshake.
    #[error("Handshake not finished")]
    HandshakeIncomplete,
    /// Wrapper around a [`httparse::Error`] value.
    #[error("httparse error: {0}")]
    HttparseError(#[from] httparse::Error),
    /// Not allowed to send after the peer has closed the connection.
    #[error("Sending after closing is not allowed")]
    SendAfterClosing,
    /// The payload for the closing frame is invalid.
    #[error("Invalid close sequence")]
    InvalidCloseSequence,
}

impl ProtocolError {
    fn is_handshake(&self) -> bool {
        !matches!(self, ProtocolError::SendAfterClosing | ProtocolError::InvalidCloseSequence)
    }
}

/// Indicates the specific type/cause of URL error.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum UrlError {
    /// TLS is used despite not being compiled with the TLS feature enabled.
    #[error("TLS support not compiled in")]
    TlsFeatureNotEnabled,
    /// The URL does not include a host name.
    #[error("No host name in the URL")]
    NoHostName,
    /// Failed to connect with this URL.
    #[error("Unable to connect to {0}")]
    UnableToConnect(String),
    /// Unsupported URL scheme used (only `ws://` or `wss://` may be used).
    #[error("URL scheme not supported")]
    UnsupportedUrlScheme,
    /// The URL host name, though included, is empty.
    #[error("URL contains empty host name")]
    EmptyHostName,
}

/// TLS errors.
#[cfg(feature = "native-tls")]
#[allow(missing_copy_implementations)]
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum TlsError {
    /// Native TLS error.
    #[error("native-tls error: {0}")]
    Native(#[from] native_tls_crate::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_read_message() {
        let err = Error::ShortRead { wanted: 8, missing: 3 };
        assert_eq!(err.to_string(), "Wanted to read 8 bytes but missed 3; connection dead?");
    }

    #[test]
    fn handshake_classification() {
        assert!(Error::Http("HTTP/1.1 404 Not Found".into()).is_handshake_failure());
        assert!(Error::Protocol(ProtocolError::SecWebSocketAcceptKeyMismatch).is_handshake_failure());
        assert!(!Error::Protocol(ProtocolError::InvalidCloseSequence).is_handshake_failure());
        assert!(!Error::ReadTimeout.is_handshake_failure());
    }

    #[test]
    fn httparse_conversion() {
        assert!(matches!(
            Error::from(httparse::Error::TooManyHeaders),
            Error::Capacity(CapacityError::TooManyHeaders)
        ));
        assert!(matches!(
            Error::from(httparse::Error::Status),
            Error::Protocol(ProtocolError::HttparseError(httparse::Error::Status))
        ));
    }
}
