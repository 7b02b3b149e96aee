//! Blocking and non-blocking client-side WebSocket streams for Rust.
//!
//! A [`WebSocket`] turns a transport that completed the HTTP Upgrade handshake
//! into a byte stream carried in masked binary frames, answering pings and
//! handling the closing handshake on its own.
#![deny(
    missing_docs,
    missing_copy_implementations,
    missing_debug_implementations,
    trivial_casts,
    trivial_numeric_casts,
    unstable_features,
    unused_must_use,
    unused_mut,
    unused_imports,
    unused_import_braces
)]

pub use bytes::Bytes;
pub use http;

pub mod buffer;
pub mod client;
pub mod error;
pub mod handshake;
pub mod protocol;
pub mod stream;

pub use crate::{
    client::{client, connect, IntoClientRequest},
    error::{Error, Result},
    handshake::client::Validation,
    protocol::{frame::coding::CloseCode, Message, WebSocket, WebSocketConfig},
    stream::Transport,
};
