//! Client handshake: upgrade request construction and response validation.

use std::io::{Read, Write};

use bytes::Buf;
use http::{
    header::{self, HeaderName},
    HeaderMap, HeaderValue, Request as HttpRequest, Response as HttpResponse, StatusCode, Version,
};
use httparse::Status;
use log::*;

use super::{derive_accept_key, MAX_HEADERS};
use crate::{
    buffer::ReadBuffer,
    error::{CapacityError, Error, ProtocolError, Result},
};

/// Client request type.
pub type Request = HttpRequest<()>;

/// Server response type.
pub type Response = HttpResponse<()>;

/// Largest accepted response header block.
const MAX_RESPONSE_SIZE: usize = 64 * 1024;

/// How strictly the server's upgrade response is checked.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Validation {
    /// `Upgrade: websocket`, `Connection: upgrade` and a matching
    /// `Sec-WebSocket-Accept` must all be present (RFC 6455).
    #[default]
    Strict,
    /// Any one of the three headers is enough to accept the upgrade.
    Lenient,
}

/// Build the headers of an upgrade request around the given key.
///
/// Returns `Connection: Upgrade`, `Upgrade: websocket`,
/// `Sec-WebSocket-Version: 13` and `Sec-WebSocket-Key: <key>`.
pub fn build_request_headers(key: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::with_capacity(4);
    headers.insert(header::CONNECTION, HeaderValue::from_static("Upgrade"));
    headers.insert(header::UPGRADE, HeaderValue::from_static("websocket"));
    headers.insert(header::SEC_WEBSOCKET_VERSION, HeaderValue::from_static("13"));
    headers.insert(header::SEC_WEBSOCKET_KEY, HeaderValue::from_str(key)?);
    Ok(headers)
}

/// Serialize the upgrade request, adding `Host` and the handshake headers.
///
/// Extra headers of the request are kept; handshake headers already present are
/// replaced so they always match `key`.
pub fn generate_request(mut request: Request, key: &str) -> Result<Vec<u8>> {
    let mut req = Vec::new();
    write!(
        req,
        "GET {path} {version:?}\r\n",
        path = request.uri().path_and_query().map(|p| p.as_str()).unwrap_or("/"),
        version = request.version()
    )?;

    if !request.headers().contains_key(header::HOST) {
        let authority = request
            .uri()
            .authority()
            .ok_or(Error::Protocol(ProtocolError::InvalidHeader(header::HOST)))?
            .as_str();
        let host = authority.rsplit('@').next().unwrap_or(authority).to_owned();
        request.headers_mut().insert(header::HOST, HeaderValue::from_str(&host)?);
    }

    let headers = request.headers_mut();
    for (name, value) in build_request_headers(key)? {
        if let Some(name) = name {
            headers.insert(name, value);
        }
    }

    for (name, value) in request.headers() {
        writeln_header(&mut req, name, value)?;
    }
    writeln!(req, "\r")?;
    trace!("Request: {:?}", String::from_utf8_lossy(&req));
    Ok(req)
}

fn writeln_header(out: &mut Vec<u8>, name: &HeaderName, value: &HeaderValue) -> Result<()> {
    write!(out, "{}: ", canonical_name(name))?;
    out.extend_from_slice(value.as_bytes());
    out.extend_from_slice(b"\r\n");
    Ok(())
}

/// Header names are stored lowercase; some servers insist on the usual spelling.
fn canonical_name(name: &HeaderName) -> &str {
    const KNOWN: [(HeaderName, &str); 5] = [
        (header::HOST, "Host"),
        (header::CONNECTION, "Connection"),
        (header::UPGRADE, "Upgrade"),
        (header::SEC_WEBSOCKET_VERSION, "Sec-WebSocket-Version"),
        (header::SEC_WEBSOCKET_KEY, "Sec-WebSocket-Key"),
    ];
    KNOWN.iter().find(|(known, _)| known == name).map_or(name.as_str(), |(_, spelled)| *spelled)
}

/// Information for handshake verification.
#[derive(Debug, Clone)]
pub struct VerifyData {
    /// The key sent in `Sec-WebSocket-Key`.
    key: String,
    /// Accepted server key.
    accept_key: String,
    validation: Validation,
}

impl VerifyData {
    /// Remember the sent key and precompute the expected accept value.
    pub fn new(key: impl Into<String>, validation: Validation) -> Self {
        let key = key.into();
        let accept_key = derive_accept_key(key.as_bytes());
        VerifyData { key, accept_key, validation }
    }

    /// The `Sec-WebSocket-Key` this handshake was started with.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Check the status line and headers the server answered with.
    pub fn validate_response(&self, status_line: &str, headers: &HeaderMap) -> Result<()> {
        // 1. If the status code received from the server is not 101, the
        // client handles the response per HTTP [RFC2616] procedures. (RFC 6455)
        let mut parts = status_line.split_whitespace();
        let version = parts.next().unwrap_or_default();
        let code = parts.next().unwrap_or_default();
        if code != "101" {
            return Err(Error::Http(status_line.to_owned()));
        }
        if version != "HTTP/1.1" {
            return Err(Error::Protocol(ProtocolError::WrongHttpVersion));
        }

        // 2. If the response lacks an |Upgrade| header field or the |Upgrade|
        // header field contains a value that is not an ASCII case-
        // insensitive match for the value "websocket", the client MUST
        // _Fail the WebSocket Connection_. (RFC 6455)
        let upgrade = headers
            .get(header::UPGRADE)
            .and_then(|h| h.to_str().ok())
            .map(|h| h.trim().eq_ignore_ascii_case("websocket"))
            .unwrap_or(false);
        // 3.  If the response lacks a |Connection| header field or the
        // |Connection| header field doesn't contain a token that is an
        // ASCII case-insensitive match for the value "Upgrade", the client
        // MUST _Fail the WebSocket Connection_. (RFC 6455)
        let connection = headers
            .get(header::CONNECTION)
            .and_then(|h| h.to_str().ok())
            .map(|h| h.split(',').any(|token| token.trim().eq_ignore_ascii_case("Upgrade")))
            .unwrap_or(false);
        // 4.  If the response lacks a |Sec-WebSocket-Accept| header field or
        // the |Sec-WebSocket-Accept| contains a value other than the
        // base64-encoded SHA-1 of ... the client MUST _Fail the WebSocket
        // Connection_. (RFC 6455)
        let accept = headers
            .get(header::SEC_WEBSOCKET_ACCEPT)
            .map(|h| h.as_bytes() == self.accept_key.as_bytes())
            .unwrap_or(false);

        match self.validation {
            Validation::Strict => {
                if !upgrade {
                    return Err(Error::Protocol(ProtocolError::MissingUpgradeWebSocketHeader));
                }
                if !connection {
                    return Err(Error::Protocol(ProtocolError::MissingConnectionUpgradeHeader));
                }
                if !accept {
                    return Err(Error::Protocol(ProtocolError::SecWebSocketAcceptKeyMismatch));
                }
            }
            Validation::Lenient => {
                if !(upgrade || connection || accept) {
                    return Err(Error::Protocol(ProtocolError::NoUpgradeEvidence));
                }
                if !(upgrade && connection && accept) {
                    debug!(
                        "Accepting partial upgrade response (upgrade: {}, connection: {}, accept: {})",
                        upgrade, connection, accept
                    );
                }
            }
        }

        Ok(())
    }
}

/// Try to parse a complete response head.
///
/// Returns the number of bytes it took along with the reconstructed status line
/// and the response, or `None` if more input is needed.
pub fn parse_response(buf: &[u8]) -> Result<Option<(usize, String, Response)>> {
    let mut hbuffer = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut raw = httparse::Response::new(&mut hbuffer);
    let size = match raw.parse(buf)? {
        Status::Partial => return Ok(None),
        Status::Complete(size) => size,
    };

    let minor = raw.version.unwrap_or_default();
    let code = raw.code.unwrap_or_default();
    let status_line = format!("HTTP/1.{} {} {}", minor, code, raw.reason.unwrap_or_default());

    let mut response = Response::new(());
    *response.status_mut() = StatusCode::from_u16(code)
        .map_err(|_| Error::Protocol(ProtocolError::HttparseError(httparse::Error::Status)))?;
    *response.version_mut() = if minor == 0 { Version::HTTP_10 } else { Version::HTTP_11 };
    let headers = response.headers_mut();
    headers.reserve(raw.headers.len());
    for h in raw.headers.iter() {
        headers.append(HeaderName::from_bytes(h.name.as_bytes())?, HeaderValue::from_bytes(h.value)?);
    }

    Ok(Some((size, status_line, response)))
}

/// Run the blocking client handshake over `stream`.
///
/// Sends the request, reads the response head and validates it. Returns the
/// response together with any bytes the server sent right after the head.
pub fn perform<S: Read + Write>(
    stream: &mut S,
    request: Request,
    verify: &VerifyData,
) -> Result<(Response, Vec<u8>)> {
    let req = generate_request(request, verify.key())?;
    stream.write_all(&req)?;
    stream.flush()?;

    let mut buf = ReadBuffer::default();
    loop {
        if buf.remaining() > MAX_RESPONSE_SIZE {
            return Err(Error::Capacity(CapacityError::HeaderTooLong));
        }
        if buf.read_from(stream)? == 0 {
            return Err(Error::Protocol(ProtocolError::HandshakeIncomplete));
        }
        if let Some((size, status_line, response)) = parse_response(buf.chunk())? {
            verify.validate_response(&status_line, response.headers())?;
            buf.advance(size);
            debug!("Client handshake done.");
            return Ok((response, buf.into_vec()));
        }
    }
}
