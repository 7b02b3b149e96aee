use std::fmt;

use bytes::{Bytes, BytesMut};

use super::frame::{coding::Data as OpData, coding::CloseCode};
use crate::error::{CapacityError, Error, Result};

/// A struct representing the incomplete message.
#[derive(Debug)]
pub struct IncompleteMessage {
    opcode: OpData,
    data: BytesMut,
    max_size: Option<usize>,
}

impl IncompleteMessage {
    /// Create new.
    ///
    /// The opcode is the one of the frame that started the message; later
    /// continuation frames never change it.
    pub fn new(opcode: OpData, max_size: Option<usize>) -> Self {
        IncompleteMessage { opcode, data: BytesMut::new(), max_size }
    }

    /// Get the current filled size of the buffer.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Add more data to an existing message.
    pub fn extend<T: AsRef<[u8]>>(&mut self, tail: T) -> Result<()> {
        let tail = tail.as_ref();
        // Always have a max size. This ensures an error in case of concatenating two buffers
        // of more than `usize::MAX` bytes in total.
        let max_size = self.max_size.unwrap_or(usize::MAX);
        let my_size = self.len();
        let portion_size = tail.len();
        // Be careful about integer overflows here.
        if my_size > max_size || portion_size > max_size - my_size {
            return Err(Error::Capacity(CapacityError::MessageTooLong {
                size: my_size.saturating_add(portion_size),
                max_size,
            }));
        }

        self.data.extend_from_slice(tail);
        Ok(())
    }

    /// Convert an incomplete message into a complete one.
    pub fn complete(self) -> Message {
        let data = self.data.freeze();
        match self.opcode {
            OpData::Text => Message::Text(data),
            OpData::Binary => Message::Binary(data),
            OpData::Continue => Message::Unknown(0),
            OpData::Reserved(i) => Message::Unknown(i),
        }
    }
}

/// An enum representing the decoded units delivered by the frame reader.
///
/// Ping and pong frames are answered or skipped inside the reader and never
/// show up here.
#[derive(Debug, Eq, PartialEq, Clone)]
pub enum Message {
    /// A text WebSocket message. The payload is passed through as received,
    /// without UTF-8 validation.
    Text(Bytes),
    /// A binary WebSocket message
    Binary(Bytes),
    /// The peer started the closing handshake, with an optional status code.
    Close(Option<CloseCode>),
    /// A complete message with an opcode this implementation does not know.
    /// Its payload has been dropped.
    Unknown(u8),
}

impl Message {
    /// Create a new text WebSocket message.
    pub fn text<S>(string: S) -> Message
    where
        S: Into<String>,
    {
        Message::Text(string.into().into())
    }

    /// Create a new binary WebSocket message.
    pub fn binary<B>(bin: B) -> Message
    where
        B: Into<Bytes>,
    {
        Message::Binary(bin.into())
    }

    /// Get the length of the WebSocket message.
    pub fn len(&self) -> usize {
        match self {
            Message::Text(data) | Message::Binary(data) => data.len(),
            Message::Close(_) | Message::Unknown(_) => 0,
        }
    }

    /// Returns true if the WebSocket message has no content.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Consume the WebSocket message and return its payload.
    pub fn into_payload(self) -> Bytes {
        match self {
            Message::Text(data) | Message::Binary(data) => data,
            Message::Close(_) | Message::Unknown(_) => Bytes::new(),
        }
    }
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Message::Text(data) => write!(f, "{}", String::from_utf8_lossy(data)),
            Message::Binary(data) => write!(f, "Binary Data<length={}>", data.len()),
            Message::Close(Some(code)) => write!(f, "Close<code={}>", code),
            Message::Close(None) => write!(f, "Close"),
            Message::Unknown(opcode) => write!(f, "Unknown<opcode={}>", opcode),
        }
    }
}
