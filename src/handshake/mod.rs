//! WebSocket opening handshake, client side.

pub mod client;

use data_encoding::BASE64;
use rand::Rng;
use sha1::{Digest, Sha1};

/// Limit the number of header lines.
pub(crate) const MAX_HEADERS: usize = 124;

/// Derive the `Sec-WebSocket-Accept` response header from a `Sec-WebSocket-Key` request header.
///
/// This function can be used to perform a handshake before passing a raw TCP stream to
/// [`WebSocket::from_raw_socket`][crate::protocol::WebSocket::from_raw_socket].
pub fn derive_accept_key(request_key: &[u8]) -> String {
    // ... field is constructed by concatenating /key/ ...
    // ... with the string "258EAFA5-E914-47DA-95CA-C5AB0DC85B11" (RFC 6455)
    const WS_GUID: &[u8] = b"258EAFA5-E914-47DA-95CA-C5AB0DC85B11";
    let mut sha1 = Sha1::default();
    sha1.update(request_key);
    sha1.update(WS_GUID);
    BASE64.encode(&sha1.finalize())
}

/// Generate a random key for the `Sec-WebSocket-Key` header.
pub fn generate_key() -> String {
    generate_key_with(&mut rand::rng())
}

/// Generate a `Sec-WebSocket-Key` from the given random source.
pub fn generate_key_with<R: Rng>(rng: &mut R) -> String {
    // a base64-encoded (see Section 4 of [RFC4648]) value that,
    // when decoded, is 16 bytes in length (RFC 6455)
    let r: [u8; 16] = rng.random();
    BASE64.encode(&r)
}
