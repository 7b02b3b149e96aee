//! Methods to connect to a WebSocket as a client.

use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpStream, ToSocketAddrs},
};

use http::{request::Parts, Uri};
use log::*;

use crate::{
    error::{Error, Result, UrlError},
    handshake::{
        client::{perform, Request, Response, VerifyData},
        generate_key,
    },
    protocol::{WebSocket, WebSocketConfig},
    stream::{MaybeTlsStream, Mode, NoDelay},
};

mod encryption {
    use std::io::{Read, Write};

    #[cfg(feature = "native-tls")]
    use native_tls_crate::{HandshakeError as TlsHandshakeError, TlsConnector};

    #[cfg(feature = "native-tls")]
    use crate::error::{ProtocolError, TlsError};
    #[cfg(not(feature = "native-tls"))]
    use crate::error::UrlError;
    use crate::{
        error::{Error, Result},
        stream::{MaybeTlsStream, Mode},
    };

    #[cfg(feature = "native-tls")]
    pub fn wrap_stream<S>(socket: S, domain: &str, mode: Mode) -> Result<MaybeTlsStream<S>>
    where
        S: Read + Write,
    {
        match mode {
            Mode::Plain => Ok(MaybeTlsStream::Plain(socket)),
            Mode::Tls => {
                let connector = TlsConnector::new().map_err(TlsError::Native)?;
                match connector.connect(domain, socket) {
                    Ok(s) => Ok(MaybeTlsStream::NativeTls(s)),
                    Err(TlsHandshakeError::Failure(f)) => Err(Error::Tls(f.into())),
                    // Only reachable on a non-blocking socket.
                    Err(TlsHandshakeError::WouldBlock(_)) => {
                        Err(Error::Protocol(ProtocolError::HandshakeIncomplete))
                    }
                }
            }
        }
    }

    #[cfg(not(feature = "native-tls"))]
    pub fn wrap_stream<S>(socket: S, _domain: &str, mode: Mode) -> Result<MaybeTlsStream<S>>
    where
        S: Read + Write,
    {
        match mode {
            Mode::Plain => Ok(MaybeTlsStream::Plain(socket)),
            Mode::Tls => Err(Error::Url(UrlError::TlsFeatureNotEnabled)),
        }
    }
}

use self::encryption::wrap_stream;

/// Connect to the given WebSocket in blocking mode.
///
/// Uses a websocket configuration passed as an argument to the function. Calling it with `None` is
/// equal to calling `connect()` function.
///
/// The URL may be either ws:// or wss://.
/// To support wss:// URLs, feature `native-tls` must be turned on.
///
/// This function "just works" for those who wants a simple blocking solution
/// similar to `std::net::TcpStream`. If you want a custom stream, call `client` instead.
pub fn connect_with_config<Req: IntoClientRequest>(
    request: Req,
    config: Option<WebSocketConfig>,
) -> Result<(WebSocket<MaybeTlsStream<TcpStream>>, Response)> {
    let request: Request = request.into_client_request()?;
    let uri = request.uri();
    let mode = url_mode(uri)?;
    if cfg!(not(feature = "native-tls")) && mode == Mode::Tls {
        return Err(Error::Url(UrlError::TlsFeatureNotEnabled));
    }
    let host = uri.host().ok_or(Error::Url(UrlError::NoHostName))?;
    let host = if host.starts_with('[') { &host[1..host.len() - 1] } else { host };
    let port = uri.port_u16().unwrap_or(match mode {
        Mode::Plain => 80,
        Mode::Tls => 443,
    });
    let addrs = (host, port).to_socket_addrs()?.collect::<Vec<_>>();
    let mut stream = connect_to_some(&addrs, uri, host, mode)?;
    NoDelay::set_nodelay(&mut stream, true)?;
    client_with_config(request, stream, config)
}

/// Connect to the given WebSocket in blocking mode.
///
/// The URL may be either ws:// or wss://.
/// To support wss:// URLs, feature `native-tls` must be turned on.
///
/// This function "just works" for those who wants a simple blocking solution
/// similar to `std::net::TcpStream`. If you want a custom stream, call `client` instead.
pub fn connect<Req: IntoClientRequest>(
    request: Req,
) -> Result<(WebSocket<MaybeTlsStream<TcpStream>>, Response)> {
    connect_with_config(request, None)
}

fn connect_to_some(
    addrs: &[SocketAddr],
    uri: &Uri,
    domain: &str,
    mode: Mode,
) -> Result<MaybeTlsStream<TcpStream>> {
    for addr in addrs {
        debug!("Trying to contact {} at {}...", uri, addr);
        if let Ok(raw_stream) = TcpStream::connect(addr) {
            if let Ok(stream) = wrap_stream(raw_stream, domain, mode) {
                return Ok(stream);
            }
        }
    }
    Err(Error::Url(UrlError::UnableToConnect(uri.to_string())))
}

/// Get the mode of the given URL.
///
/// This function may be used to ease the creation of custom TLS streams
/// or for use with TLS libraries other than `native-tls`.
pub fn url_mode(uri: &Uri) -> Result<Mode> {
    match uri.scheme_str() {
        Some("ws") => Ok(Mode::Plain),
        Some("wss") => Ok(Mode::Tls),
        _ => Err(Error::Url(UrlError::UnsupportedUrlScheme)),
    }
}

/// Do the client handshake over the given stream given a web socket configuration. Passing `None`
/// as configuration is equal to calling `client()` function.
///
/// Use this function if you want to use a custom stream. Any stream supporting `Read + Write`
/// will do. The handshake itself is always performed in blocking mode.
pub fn client_with_config<Stream, Req>(
    request: Req,
    mut stream: Stream,
    config: Option<WebSocketConfig>,
) -> Result<(WebSocket<Stream>, Response)>
where
    Stream: Read + Write,
    Req: IntoClientRequest,
{
    let request = request.into_client_request()?;
    let config = config.unwrap_or_default();
    let verify = VerifyData::new(generate_key(), config.validation);
    debug!("Client handshake for {} with key {}", request.uri(), verify.key());

    let (response, tail) = perform(&mut stream, request, &verify)?;
    let ws = WebSocket::from_partially_read(stream, tail, verify.key(), Some(config));
    Ok((ws, response))
}

/// Do the client handshake over the given stream.
///
/// Use this function if you want to use a custom stream. Any stream supporting `Read + Write`
/// will do.
pub fn client<Stream, Req>(request: Req, stream: Stream) -> Result<(WebSocket<Stream>, Response)>
where
    Stream: Read + Write,
    Req: IntoClientRequest,
{
    client_with_config(request, stream, None)
}

/// Trait for converting various types into HTTP requests used for a client connection.
///
/// This trait is implemented by default for string slices, strings, `http::Uri` and
/// `http::Request<()>`. Extra headers of a `Request` are sent along; the handshake headers
/// (`Host`, `Connection`, `Upgrade`, `Sec-WebSocket-Version` and `Sec-WebSocket-Key`) are
/// always filled in during the handshake.
pub trait IntoClientRequest {
    /// Convert into a `Request` that can be used for a client connection.
    fn into_client_request(self) -> Result<Request>;
}

impl IntoClientRequest for &str {
    fn into_client_request(self) -> Result<Request> {
        self.parse::<Uri>()?.into_client_request()
    }
}

impl IntoClientRequest for &String {
    fn into_client_request(self) -> Result<Request> {
        <&str as IntoClientRequest>::into_client_request(self)
    }
}

impl IntoClientRequest for String {
    fn into_client_request(self) -> Result<Request> {
        <&str as IntoClientRequest>::into_client_request(&self)
    }
}

impl IntoClientRequest for &Uri {
    fn into_client_request(self) -> Result<Request> {
        self.clone().into_client_request()
    }
}

impl IntoClientRequest for Uri {
    fn into_client_request(self) -> Result<Request> {
        let authority = self.authority().ok_or(Error::Url(UrlError::NoHostName))?.as_str();
        let host = authority.rsplit('@').next().unwrap_or(authority);
        if host.is_empty() {
            return Err(Error::Url(UrlError::EmptyHostName));
        }

        let req = Request::builder().method("GET").uri(self).body(())?;
        Ok(req)
    }
}

impl IntoClientRequest for Request {
    fn into_client_request(self) -> Result<Request> {
        Ok(self)
    }
}

impl IntoClientRequest for Parts {
    fn into_client_request(self) -> Result<Request> {
        Ok(Request::from_parts(self, ()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_modes() {
        assert_eq!(url_mode(&"ws://example.com/".parse().unwrap()).unwrap(), Mode::Plain);
        assert_eq!(url_mode(&"wss://example.com/".parse().unwrap()).unwrap(), Mode::Tls);
        assert!(matches!(
            url_mode(&"http://example.com/".parse().unwrap()),
            Err(Error::Url(UrlError::UnsupportedUrlScheme))
        ));
    }

    #[test]
    fn requests_from_strings() {
        let req = "ws://localhost:9001/path?x=1".into_client_request().unwrap();
        assert_eq!(req.method(), http::Method::GET);
        assert_eq!(req.uri().path(), "/path");
        assert_eq!(req.uri().port_u16(), Some(9001));

        let req = String::from("wss://example.com").into_client_request().unwrap();
        assert_eq!(req.uri().host(), Some("example.com"));
    }

    #[test]
    fn request_without_host() {
        assert!(matches!(
            "/relative".into_client_request(),
            Err(Error::Url(UrlError::NoHostName))
        ));
    }

    #[cfg(not(feature = "native-tls"))]
    #[test]
    fn tls_needs_feature() {
        let socket = std::io::Cursor::new(Vec::new());
        assert!(matches!(
            wrap_stream(socket, "example.com", Mode::Tls),
            Err(Error::Url(UrlError::TlsFeatureNotEnabled))
        ));
    }
}
