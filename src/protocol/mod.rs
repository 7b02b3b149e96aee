//! Client-side WebSocket channel over an already upgraded transport.

pub mod frame;

mod message;

pub use self::message::Message;

use std::{
    fmt,
    io::{self, Read, Write},
    mem::replace,
    time::Duration,
};

use bytes::{Bytes, BytesMut};
use log::*;

use self::frame::{coding::CloseCode, FrameReader, FrameWriter};
use crate::{
    buffer::DEFAULT_CHUNK_SIZE,
    error::{Error, ProtocolError, Result},
    handshake::client::Validation,
    stream::Transport,
};

/// The configuration for a WebSocket connection.
///
/// # Example
/// ```
/// # use wsstream::protocol::WebSocketConfig;
/// let conf = WebSocketConfig::default()
///     .read_buffer_size(256 * 1024)
///     .max_message_size(Some(1 << 20));
/// ```
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct WebSocketConfig {
    /// Read buffer chunk size. Default 4 KiB.
    ///
    /// This is the number of bytes requested from the transport per read.
    pub read_buffer_size: usize,
    /// The maximum size of an incoming message. `None` means no size limit. The default value is 64 MiB
    /// which should be reasonably big for all normal use-cases but small enough to prevent
    /// memory eating by a malicious user.
    pub max_message_size: Option<usize>,
    /// The maximum size of a single incoming message frame. `None` means no size limit. The limit is for
    /// frame payload NOT including the frame header. The default value is 16 MiB which should
    /// be reasonably big for all normal use-cases but small enough to prevent memory eating
    /// by a malicious user.
    pub max_frame_size: Option<usize>,
    /// How the server's handshake response is checked. Default [`Validation::Strict`].
    pub validation: Validation,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            read_buffer_size: DEFAULT_CHUNK_SIZE,
            max_message_size: Some(64 << 20),
            max_frame_size: Some(16 << 20),
            validation: Validation::Strict,
        }
    }
}

impl WebSocketConfig {
    /// Set [`Self::read_buffer_size`].
    pub fn read_buffer_size(mut self, read_buffer_size: usize) -> Self {
        self.read_buffer_size = read_buffer_size;
        self
    }

    /// Set [`Self::max_message_size`].
    pub fn max_message_size(mut self, max_message_size: Option<usize>) -> Self {
        self.max_message_size = max_message_size;
        self
    }

    /// Set [`Self::max_frame_size`].
    pub fn max_frame_size(mut self, max_frame_size: Option<usize>) -> Self {
        self.max_frame_size = max_frame_size;
        self
    }

    /// Set [`Self::validation`].
    pub fn validation(mut self, validation: Validation) -> Self {
        self.validation = validation;
        self
    }
}

/// WebSocket input-output stream.
///
/// Wraps a transport that already completed the opening handshake. Incoming
/// messages are flattened into a byte stream that can be consumed in arbitrary
/// portions with [`WebSocket::read`]; every [`WebSocket::write`] sends one
/// binary frame.
///
/// The connection starts in blocking mode.
pub struct WebSocket<Stream> {
    /// The underlying transport, released on close.
    stream: Option<Stream>,
    reader: FrameReader,
    writer: FrameWriter,
    /// Decoded payload bytes not handed out yet.
    leftover: BytesMut,
    blocking: bool,
    read_timeout: Option<Duration>,
    state: WebSocketState,
    /// The `Sec-WebSocket-Key` of the handshake that opened the connection.
    key: String,
    config: WebSocketConfig,
}

impl<Stream> WebSocket<Stream> {
    /// Convert a raw socket into a WebSocket without performing a handshake.
    ///
    /// Call this function if you're using the connection on a transport whose
    /// upgrade was negotiated elsewhere.
    pub fn from_raw_socket(
        stream: Stream,
        key: impl Into<String>,
        config: Option<WebSocketConfig>,
    ) -> Self {
        Self::from_partially_read(stream, Vec::new(), key, config)
    }

    /// Convert a raw socket into a WebSocket without performing a handshake.
    ///
    /// `part` holds bytes already pulled off the transport past the handshake
    /// response; they are decoded before anything else is read.
    pub fn from_partially_read(
        stream: Stream,
        part: Vec<u8>,
        key: impl Into<String>,
        config: Option<WebSocketConfig>,
    ) -> Self {
        let config = config.unwrap_or_default();
        WebSocket {
            stream: Some(stream),
            reader: FrameReader::from_partially_read(part, &config),
            writer: FrameWriter::new(),
            leftover: BytesMut::new(),
            blocking: true,
            read_timeout: None,
            state: WebSocketState::Active,
            key: key.into(),
            config,
        }
    }

    /// Replace the source of mask keys, mostly useful to get reproducible output.
    pub fn with_writer(mut self, writer: FrameWriter) -> Self {
        self.writer = writer;
        self
    }

    /// Returns a shared reference to the inner stream, if it was not released yet.
    pub fn get_ref(&self) -> Option<&Stream> {
        self.stream.as_ref()
    }

    /// Returns a mutable reference to the inner stream, if it was not released yet.
    pub fn get_mut(&mut self) -> Option<&mut Stream> {
        self.stream.as_mut()
    }

    /// The key the opening handshake was performed with.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Read the configuration.
    pub fn get_config(&self) -> &WebSocketConfig {
        &self.config
    }

    /// Whether reads block until data arrives.
    pub fn is_blocking(&self) -> bool {
        self.blocking
    }

    /// The read deadline forwarded to the transport.
    pub fn read_timeout(&self) -> Option<Duration> {
        self.read_timeout
    }

    /// Check whether the stream is exhausted.
    ///
    /// True once the transport reported end of input, the peer closed the
    /// connection or we closed it, and every buffered byte has been read.
    pub fn eof(&self) -> bool {
        self.leftover.is_empty()
            && (self.reader.is_eof() || self.state != WebSocketState::Active)
    }
}

impl<Stream: Transport> WebSocket<Stream> {
    /// Read up to `len` bytes of message payload.
    ///
    /// Bytes left over from earlier messages are served first. If fewer than
    /// `len` are buffered, the next message is decoded and appended. In blocking
    /// mode this waits until a data message arrives or the stream ends; in
    /// non-blocking mode a single attempt is made and whatever is buffered is
    /// returned, possibly nothing.
    ///
    /// Ping frames are answered on the way. Message boundaries are not preserved.
    pub fn read(&mut self, len: usize) -> Result<Bytes> {
        if self.stream.is_none() {
            return Err(Error::AlreadyClosed);
        }

        if self.leftover.len() < len {
            loop {
                match self.next_message()? {
                    Some(Message::Text(data)) | Some(Message::Binary(data)) => {
                        self.leftover.extend_from_slice(&data);
                        break;
                    }
                    Some(Message::Unknown(opcode)) => {
                        trace!("Dropped message with unknown opcode {}", opcode);
                        if !self.blocking {
                            break;
                        }
                    }
                    Some(Message::Close(_)) | None => break,
                }
            }
        }

        let take = len.min(self.leftover.len());
        Ok(self.leftover.split_to(take).freeze())
    }

    /// Read the next whole message.
    ///
    /// This bypasses the byte buffer used by [`WebSocket::read`], so mixing both
    /// styles on one connection only makes sense once that buffer is drained.
    /// Returns `None` if no message is available yet (non-blocking) or the stream
    /// ended (blocking).
    pub fn read_message(&mut self) -> Result<Option<Message>> {
        if self.stream.is_none() {
            return Err(Error::AlreadyClosed);
        }
        let message = self.next_message()?;
        if let Some(ref message) = message {
            trace!("Received message {}", message);
        }
        Ok(message)
    }

    /// Send `data` as a single binary frame.
    ///
    /// Returns the number of payload bytes sent. On a non-blocking transport the
    /// tail of the frame may still wait in the writer, see [`WebSocket::flush`].
    pub fn write(&mut self, data: impl Into<Bytes>) -> Result<usize> {
        let data = data.into();
        let len = data.len();
        let (stream, writer) = self.sendable()?;
        writer.write_binary(stream, data)?;
        Ok(len)
    }

    /// Send `text` as a single text frame.
    ///
    /// Returns the number of payload bytes sent.
    pub fn write_text(&mut self, text: impl Into<String>) -> Result<usize> {
        let data = Bytes::from(text.into());
        let len = data.len();
        let (stream, writer) = self.sendable()?;
        writer.write_text(stream, data)?;
        Ok(len)
    }

    /// Send a ping frame. The peer's pong is skipped when it arrives.
    pub fn send_ping(&mut self, payload: impl Into<Bytes>) -> Result<()> {
        let (stream, writer) = self.sendable()?;
        writer.write_ping(stream, payload)?;
        Ok(())
    }

    /// Send whatever is left of a frame the transport could only partly take.
    ///
    /// Only a non-blocking transport leaves such a tail behind. It also goes out
    /// automatically before the next frame.
    pub fn flush(&mut self) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::AlreadyClosed)?;
        self.writer.flush(stream)
    }

    /// Switch the transport between blocking and non-blocking reads.
    pub fn set_blocking(&mut self, blocking: bool) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::AlreadyClosed)?;
        stream.set_nonblocking(!blocking)?;
        self.blocking = blocking;
        Ok(())
    }

    /// Set the read deadline of the transport. A read that runs into it fails
    /// with [`Error::ReadTimeout`] and can be retried.
    pub fn set_read_timeout(&mut self, timeout: Option<Duration>) -> Result<()> {
        let stream = self.stream.as_mut().ok_or(Error::AlreadyClosed)?;
        stream.set_read_timeout(timeout)?;
        self.read_timeout = timeout;
        Ok(())
    }

    /// Close the connection.
    ///
    /// Switches to blocking mode, sends a close frame with status 1001 (going
    /// away), waits for the peer's close frame and releases the transport. The
    /// transport is released even if the exchange fails. If the peer closed the
    /// connection first, it is only released. Calling this again does nothing.
    pub fn close(&mut self) -> Result<()> {
        let Some(mut stream) = self.stream.take() else {
            return Ok(());
        };
        self.leftover.clear();

        match replace(&mut self.state, WebSocketState::Closed) {
            WebSocketState::Active => {
                let result = self.close_exchange(&mut stream);
                if let Err(ref err) = result {
                    debug!("Closing handshake failed: {}", err);
                }
                result
            }
            WebSocketState::ClosedByPeer => {
                debug!("Releasing transport closed by peer");
                Ok(())
            }
            WebSocketState::Closed => Ok(()),
        }
    }

    /// Get a [`Read`]/[`Write`] adapter over this connection.
    pub fn io(&mut self) -> IoAdapter<'_, Stream> {
        IoAdapter { ws: self }
    }

    fn close_exchange(&mut self, stream: &mut Stream) -> Result<()> {
        if !self.blocking {
            stream.set_nonblocking(false)?;
            self.blocking = true;
        }
        self.writer.write_close(stream, CloseCode::Away)?;
        let code = self.reader.read_close_status(stream)?;
        debug!("Close acknowledged by peer with {:?}", code);
        Ok(())
    }

    /// Decode one message and handle a close started by the peer.
    fn next_message(&mut self) -> Result<Option<Message>> {
        if self.state == WebSocketState::ClosedByPeer {
            return Ok(None);
        }
        let stream = self.stream.as_mut().ok_or(Error::AlreadyClosed)?;
        let message = self.reader.read_message(stream, &mut self.writer, self.blocking)?;

        if let Some(Message::Close(code)) = &message {
            debug!("Peer closed the connection with {:?}", code);
            self.state = WebSocketState::ClosedByPeer;
            // The peer may be gone already; its close frame is what matters.
            if let Err(err) = self.writer.write_close(stream, CloseCode::Away) {
                debug!("Failed to acknowledge close: {}", err);
            }
        }
        Ok(message)
    }

    fn sendable(&mut self) -> Result<(&mut Stream, &mut FrameWriter)> {
        match self.state {
            WebSocketState::Active => {}
            WebSocketState::ClosedByPeer => {
                return Err(Error::Protocol(ProtocolError::SendAfterClosing))
            }
            WebSocketState::Closed => return Err(Error::AlreadyClosed),
        }
        let stream = self.stream.as_mut().ok_or(Error::AlreadyClosed)?;
        Ok((stream, &mut self.writer))
    }
}

impl<Stream: fmt::Debug> fmt::Debug for WebSocket<Stream> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebSocket")
            .field("stream", &self.stream)
            .field("buffered", &self.leftover.len())
            .field("blocking", &self.blocking)
            .field("read_timeout", &self.read_timeout)
            .field("state", &self.state)
            .finish()
    }
}

/// The current connection state.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum WebSocketState {
    /// The connection is active.
    Active,
    /// The peer sent a close frame and it was answered.
    ClosedByPeer,
    /// We closed the connection and released the transport.
    Closed,
}

/// Standard [`Read`] and [`Write`] over a [`WebSocket`].
///
/// Reads return message payload bytes. A non-blocking read with nothing to
/// deliver fails with [`io::ErrorKind::WouldBlock`], a read timeout with
/// [`io::ErrorKind::TimedOut`]. Every write sends one binary frame.
#[derive(Debug)]
pub struct IoAdapter<'a, Stream> {
    ws: &'a mut WebSocket<Stream>,
}

impl<Stream: Transport> Read for IoAdapter<'_, Stream> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let data = match self.ws.read(buf.len()) {
            Ok(data) => data,
            Err(Error::AlreadyClosed) => return Ok(0),
            Err(err) => return Err(into_io_error(err)),
        };
        if data.is_empty() && !self.ws.eof() {
            return Err(io::ErrorKind::WouldBlock.into());
        }
        buf[..data.len()].copy_from_slice(&data);
        Ok(data.len())
    }
}

impl<Stream: Transport> Write for IoAdapter<'_, Stream> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.ws.write(Bytes::copy_from_slice(buf)).map_err(into_io_error)
    }

    fn flush(&mut self) -> io::Result<()> {
        match self.ws.flush() {
            Err(Error::AlreadyClosed) => Ok(()),
            flushed => flushed.map_err(into_io_error),
        }
    }
}

fn into_io_error(err: Error) -> io::Error {
    match err {
        Error::Io(err) | Error::Write(err) => err,
        Error::ReadTimeout => io::Error::new(io::ErrorKind::TimedOut, Error::ReadTimeout),
        Error::AlreadyClosed => io::Error::new(io::ErrorKind::NotConnected, Error::AlreadyClosed),
        err => io::Error::other(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::{cell::RefCell, io::Cursor, rc::Rc};

    use rand::{rngs::StdRng, SeedableRng};

    use super::frame::{apply_mask, coding::OpCode, coding::Control, coding::Data, Frame};

    #[derive(Debug, Default)]
    struct Shared {
        output: Vec<u8>,
        nonblocking: bool,
        read_timeout: Option<Duration>,
        timed_out: bool,
        /// Bytes the transport accepts before writes hit `WouldBlock`.
        room: Option<usize>,
    }

    /// Serves a fixed input. Once drained it reports end of input, `WouldBlock`
    /// in non-blocking mode, or `TimedOut` when `timed_out` is set.
    #[derive(Debug)]
    struct MockStream {
        input: Cursor<Vec<u8>>,
        shared: Rc<RefCell<Shared>>,
    }

    impl Read for MockStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            let n = self.input.read(buf)?;
            let shared = self.shared.borrow();
            if n == 0 && shared.nonblocking {
                return Err(io::ErrorKind::WouldBlock.into());
            }
            if n == 0 && shared.timed_out {
                return Err(io::ErrorKind::TimedOut.into());
            }
            Ok(n)
        }
    }

    impl Write for MockStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let mut shared = self.shared.borrow_mut();
            let len = match shared.room {
                Some(0) => return Err(io::ErrorKind::WouldBlock.into()),
                Some(room) => room.min(buf.len()),
                None => buf.len(),
            };
            if let Some(room) = shared.room.as_mut() {
                *room -= len;
            }
            shared.output.extend_from_slice(&buf[..len]);
            Ok(len)
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Transport for MockStream {
        fn set_nonblocking(&mut self, nonblocking: bool) -> io::Result<()> {
            self.shared.borrow_mut().nonblocking = nonblocking;
            Ok(())
        }
        fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
            self.shared.borrow_mut().read_timeout = timeout;
            Ok(())
        }
    }

    fn connect(input: Vec<u8>) -> (WebSocket<MockStream>, Rc<RefCell<Shared>>) {
        let shared = Rc::new(RefCell::new(Shared::default()));
        let stream = MockStream { input: Cursor::new(input), shared: shared.clone() };
        let ws = WebSocket::from_raw_socket(stream, "dGhlIHNhbXBsZSBub25jZQ==", None)
            .with_writer(FrameWriter::with_rng(StdRng::seed_from_u64(7)));
        (ws, shared)
    }

    fn sent_frames(shared: &Rc<RefCell<Shared>>) -> Vec<Frame> {
        let output = shared.borrow().output.clone();
        let mut data = &output[..];
        let mut frames = Vec::new();
        while let Some((size, frame)) = Frame::parse(data).unwrap() {
            frames.push(frame);
            data = &data[size..];
        }
        assert!(data.is_empty());
        frames
    }

    #[test]
    fn read_serves_leftover_first() {
        let mut input = vec![0x81, 0x0B];
        input.extend_from_slice(b"hello world");
        let (mut ws, _) = connect(input);

        assert_eq!(ws.read(5).unwrap(), &b"hello"[..]);
        assert_eq!(ws.read(6).unwrap(), &b" world"[..]);
        assert!(!ws.eof());

        assert!(ws.read(3).unwrap().is_empty());
        assert!(ws.eof());
    }

    #[test]
    fn read_returns_what_one_message_holds() {
        let (mut ws, _) = connect(vec![0x82, 0x03, 1, 2, 3, 0x82, 0x02, 4, 5]);
        assert_eq!(ws.read(100).unwrap(), &[1u8, 2, 3][..]);
        assert_eq!(ws.read(100).unwrap(), &[4u8, 5][..]);
    }

    #[test]
    fn read_skips_unknown_messages_when_blocking() {
        let (mut ws, _) = connect(vec![0x83, 0x01, 0xFF, 0x82, 0x01, 0x2A]);
        assert_eq!(ws.read(1).unwrap(), &[0x2Au8][..]);
    }

    #[test]
    fn nonblocking_read_returns_immediately() {
        let (mut ws, shared) = connect(Vec::new());
        ws.set_blocking(false).unwrap();
        assert!(shared.borrow().nonblocking);

        assert!(ws.read(4).unwrap().is_empty());
        assert!(!ws.eof());
    }

    #[test]
    fn nonblocking_read_hands_out_buffered_bytes() {
        let (mut ws, _) = connect(vec![0x82, 0x04, b'a', b'b', b'c', b'd']);
        assert_eq!(ws.read(1).unwrap(), &b"a"[..]);

        ws.set_blocking(false).unwrap();
        assert_eq!(ws.read(10).unwrap(), &b"bcd"[..]);
        assert!(ws.read(10).unwrap().is_empty());
    }

    #[test]
    fn ping_is_answered_during_read() {
        let (mut ws, shared) = connect(vec![0x89, 0x01, b'x', 0x81, 0x02, b'h', b'i']);
        assert_eq!(ws.read(2).unwrap(), &b"hi"[..]);

        let frames = sent_frames(&shared);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].header().opcode, OpCode::Control(Control::Pong));
        assert_eq!(frames[0].payload(), b"x");
    }

    #[test]
    fn write_sends_one_masked_binary_frame() {
        let (mut ws, shared) = connect(Vec::new());
        assert_eq!(ws.write(&b"payload"[..]).unwrap(), 7);
        assert_eq!(ws.write_text("text").unwrap(), 4);

        let output = shared.borrow().output.clone();
        assert_eq!(output[0], 0x82);
        assert_eq!(output[1], 0x80 | 7);

        let frames = sent_frames(&shared);
        assert_eq!(frames[0].header().opcode, OpCode::Data(Data::Binary));
        assert_eq!(frames[0].payload(), b"payload");
        assert_eq!(frames[1].header().opcode, OpCode::Data(Data::Text));
    }

    #[test]
    fn close_sequence() {
        let (mut ws, shared) = connect(vec![0x88, 0x02, 0x03, 0xE9]);
        ws.set_blocking(false).unwrap();
        ws.close().unwrap();

        assert!(ws.get_ref().is_none());
        assert!(ws.is_blocking());
        assert!(!shared.borrow().nonblocking);

        let output = shared.borrow().output.clone();
        assert_eq!(output.len(), 8);
        assert_eq!(output[0], 0x88);
        assert_eq!(output[1], 0x82);
        let mut payload = [output[6], output[7]];
        apply_mask(&mut payload, [output[2], output[3], output[4], output[5]]);
        assert_eq!(payload, [0x03, 0xE9]);
    }

    #[test]
    fn close_is_idempotent() {
        let (mut ws, shared) = connect(vec![0x88, 0x02, 0x03, 0xE8]);
        ws.close().unwrap();
        let written = shared.borrow().output.len();

        ws.close().unwrap();
        assert_eq!(shared.borrow().output.len(), written);
        assert!(ws.eof());
        assert!(matches!(ws.read(1), Err(Error::AlreadyClosed)));
        assert!(matches!(ws.write(&b"late"[..]), Err(Error::AlreadyClosed)));
    }

    #[test]
    fn close_releases_transport_on_failure() {
        // The peer hangs up in the middle of its close frame.
        let (mut ws, _) = connect(vec![0x88, 0x02, 0x03]);
        assert!(matches!(ws.close(), Err(Error::ShortRead { .. })));
        assert!(ws.get_ref().is_none());
        ws.close().unwrap();
    }

    #[test]
    fn peer_close_is_answered() {
        let (mut ws, shared) = connect(vec![0x82, 0x01, 0x01, 0x88, 0x02, 0x03, 0xE8]);
        assert_eq!(ws.read(1).unwrap(), &[1u8][..]);
        assert!(ws.read(1).unwrap().is_empty());
        assert!(ws.eof());

        let frames = sent_frames(&shared);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), [0x03, 0xE9]);

        assert!(matches!(
            ws.write(&b"late"[..]),
            Err(Error::Protocol(ProtocolError::SendAfterClosing))
        ));

        ws.close().unwrap();
        assert_eq!(sent_frames(&shared).len(), 1);
        assert!(ws.get_ref().is_none());
    }

    #[test]
    fn read_message_reports_close() {
        let (mut ws, _) = connect(vec![0x81, 0x02, b'o', b'k', 0x88, 0x00]);
        assert_eq!(ws.read_message().unwrap(), Some(Message::text("ok")));
        assert_eq!(ws.read_message().unwrap(), Some(Message::Close(None)));
        assert_eq!(ws.read_message().unwrap(), None);
    }

    #[test]
    fn read_timeout_is_recoverable() {
        let (mut ws, shared) = connect(vec![0x82, 0x02, b'a']);
        ws.set_read_timeout(Some(Duration::from_millis(10))).unwrap();
        assert_eq!(shared.borrow().read_timeout, Some(Duration::from_millis(10)));
        shared.borrow_mut().timed_out = true;

        assert!(matches!(ws.read(2), Err(Error::ReadTimeout)));
        let err = ws.io().read(&mut [0u8; 2]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::TimedOut);
    }

    #[test]
    fn io_adapter_reads_stream() {
        let (mut ws, _) = connect(vec![0x81, 0x02, b'a', b'b', 0x82, 0x02, b'c', b'd']);
        let mut out = String::new();
        ws.io().read_to_string(&mut out).unwrap();
        assert_eq!(out, "abcd");
        assert!(ws.eof());
    }

    #[test]
    fn io_adapter_would_block() {
        let (mut ws, shared) = connect(Vec::new());
        ws.set_blocking(false).unwrap();
        let err = ws.io().read(&mut [0u8; 8]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);

        ws.io().write_all(b"xyz").unwrap();
        let frames = sent_frames(&shared);
        assert_eq!(frames[0].payload(), b"xyz");
    }

    #[test]
    fn nonblocking_writes_never_tear_frames() {
        let (mut ws, shared) = connect(Vec::new());
        ws.set_blocking(false).unwrap();
        shared.borrow_mut().room = Some(10);

        assert_eq!(ws.write(vec![7u8; 100]).unwrap(), 100);
        assert_eq!(shared.borrow().output.len(), 10);

        // The tail of the first frame blocks, so the second one is refused whole.
        let err = ws.write(&b"next"[..]).unwrap_err();
        assert!(matches!(err, Error::Write(ref e) if e.kind() == io::ErrorKind::WouldBlock));
        let err = ws.io().write(b"next").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::WouldBlock);
        assert_eq!(shared.borrow().output.len(), 10);

        shared.borrow_mut().room = None;
        assert_eq!(ws.write(&b"next"[..]).unwrap(), 4);
        let frames = sent_frames(&shared);
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0].payload(), &[7u8; 100][..]);
        assert_eq!(frames[1].payload(), b"next");
    }

    #[test]
    fn flush_sends_frame_tail() {
        let (mut ws, shared) = connect(Vec::new());
        ws.set_blocking(false).unwrap();
        shared.borrow_mut().room = Some(3);
        ws.write(&b"hello"[..]).unwrap();

        shared.borrow_mut().room = Some(2);
        assert!(ws.io().flush().is_err());
        shared.borrow_mut().room = None;
        ws.io().flush().unwrap();

        let frames = sent_frames(&shared);
        assert_eq!(frames.len(), 1);
        assert_eq!(frames[0].payload(), b"hello");
    }

    #[test]
    fn config_builder() {
        let config = WebSocketConfig::default()
            .read_buffer_size(16)
            .max_frame_size(None)
            .max_message_size(Some(10))
            .validation(Validation::Lenient);
        assert_eq!(config.read_buffer_size, 16);
        assert_eq!(config.max_frame_size, None);
        assert_eq!(config.max_message_size, Some(10));
        assert_eq!(config.validation, Validation::Lenient);
    }
}
