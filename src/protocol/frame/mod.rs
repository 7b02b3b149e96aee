//! Utilities to work with raw WebSocket frames.

pub mod coding;

#[allow(clippy::module_inception)]
mod frame;
mod mask;

pub use self::{
    frame::{Frame, FrameHeader, LengthFormat},
    mask::apply_mask,
};

use std::io::{self, ErrorKind as IoErrorKind, Read, Write};

use bytes::{Buf, Bytes, BytesMut};
use log::*;
use rand::{rngs::StdRng, SeedableRng};

use self::coding::{CloseCode, Control, Data, OpCode};
use super::{
    message::{IncompleteMessage, Message},
    WebSocketConfig,
};
use crate::{
    buffer::ReadBuffer,
    error::{CapacityError, Error, Result},
};

/// Decodes frames and whole messages from a transport.
///
/// Ping frames are answered through the given [`FrameWriter`] and pong frames
/// are skipped, so callers only ever see data messages and the peer's close.
#[derive(Debug)]
pub struct FrameReader {
    in_buffer: ReadBuffer,
    /// Receive: a message being assembled from fragments.
    incomplete: Option<IncompleteMessage>,
    max_frame_size: Option<usize>,
    max_message_size: Option<usize>,
    eof: bool,
}

impl FrameReader {
    /// Create a new frame reader.
    pub fn new(config: &WebSocketConfig) -> Self {
        Self::from_partially_read(Vec::new(), config)
    }

    /// Create a new frame reader from bytes already pulled off the transport,
    /// typically the ones that followed the handshake response.
    pub fn from_partially_read(part: Vec<u8>, config: &WebSocketConfig) -> Self {
        FrameReader {
            in_buffer: ReadBuffer::from_partially_read(part, config.read_buffer_size),
            incomplete: None,
            max_frame_size: config.max_frame_size,
            max_message_size: config.max_message_size,
            eof: false,
        }
    }

    /// Whether the transport has reported end of input.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// Make sure at least `wanted` bytes are buffered.
    ///
    /// Returns `Ok(false)` when nothing at all could be read at a message boundary:
    /// either the transport is non-blocking and has no data yet, or it reached end
    /// of input. Any other shortfall is a [`Error::ShortRead`].
    fn fill<S: Read>(
        &mut self,
        stream: &mut S,
        wanted: usize,
        blocking: bool,
        at_boundary: bool,
    ) -> Result<bool> {
        while self.in_buffer.remaining() < wanted {
            match self.in_buffer.read_from(stream) {
                Ok(0) => {
                    self.eof = true;
                    break;
                }
                Ok(_) => {}
                Err(err) if err.kind() == IoErrorKind::Interrupted => {}
                // A socket read timeout surfaces as `WouldBlock` on Unix and as
                // `TimedOut` on Windows.
                Err(err)
                    if err.kind() == IoErrorKind::TimedOut
                        || (blocking && err.kind() == IoErrorKind::WouldBlock) =>
                {
                    return Err(Error::ReadTimeout)
                }
                Err(err) if err.kind() == IoErrorKind::WouldBlock => break,
                Err(err) => return Err(err.into()),
            }
        }

        let remaining = self.in_buffer.remaining();
        if remaining >= wanted {
            Ok(true)
        } else if at_boundary && remaining == 0 {
            Ok(false)
        } else {
            Err(Error::ShortRead { wanted, missing: wanted - remaining })
        }
    }

    /// Read a frame from stream, unmasking its payload.
    ///
    /// Nothing is consumed from the internal buffer until the whole frame is
    /// available, so a read timeout leaves the reader in a consistent state.
    pub fn read_frame<S: Read>(
        &mut self,
        stream: &mut S,
        blocking: bool,
        at_boundary: bool,
    ) -> Result<Option<Frame>> {
        if !self.fill(stream, 2, blocking, at_boundary)? {
            trace!("No frame received");
            return Ok(None);
        }

        let header_len = {
            let chunk = self.in_buffer.chunk();
            let (header, length_format) = FrameHeader::from_leading_bytes(chunk[0], chunk[1]);
            2 + length_format.extra_bytes() + if header.mask.is_some() { 4 } else { 0 }
        };
        self.fill(stream, header_len, blocking, false)?;

        let (mut header, length) =
            FrameHeader::parse(&mut std::io::Cursor::new(self.in_buffer.chunk()))?
                .ok_or(Error::ShortRead { wanted: header_len, missing: header_len })?;

        let max_size = self.max_frame_size.unwrap_or(usize::MAX);
        let length = match usize::try_from(length) {
            Ok(length) if length <= max_size => length,
            _ => {
                let size = usize::try_from(length).unwrap_or(usize::MAX);
                return Err(Error::Capacity(CapacityError::MessageTooLong { size, max_size }));
            }
        };

        let total = header_len.checked_add(length).ok_or(Error::Capacity(
            CapacityError::MessageTooLong { size: usize::MAX, max_size },
        ))?;
        self.fill(stream, total, blocking, false)?;

        self.in_buffer.advance(header_len);
        let mut payload = BytesMut::from(&self.in_buffer.chunk()[..length]);
        self.in_buffer.advance(length);

        if let Some(mask) = header.mask.take() {
            apply_mask(&mut payload, mask);
        }

        let frame = Frame::from_payload(header, payload.freeze());
        trace!("received frame {}", frame);
        Ok(Some(frame))
    }

    /// Decode the next message.
    ///
    /// Loops over control frames until a message completes. Returns `None` when
    /// no data was available at a message boundary, which means "try again later"
    /// on a non-blocking transport and end of input otherwise.
    pub fn read_message<S: Read + Write>(
        &mut self,
        stream: &mut S,
        writer: &mut FrameWriter,
        blocking: bool,
    ) -> Result<Option<Message>> {
        loop {
            let at_boundary = self.incomplete.is_none();
            let Some(frame) = self.read_frame(stream, blocking, at_boundary)? else {
                return Ok(None);
            };

            match frame.header().opcode {
                OpCode::Control(Control::Ping) => {
                    // Answered right away and never counted as part of a message.
                    match writer.write_pong(stream, frame.into_payload()) {
                        Err(Error::Write(err)) if err.kind() == IoErrorKind::WouldBlock => {
                            debug!("Transport is full, dropping pong");
                        }
                        written => {
                            written?;
                        }
                    }
                }
                OpCode::Control(Control::Pong) => {
                    trace!("Ignoring pong frame");
                }
                OpCode::Control(Control::Close) => {
                    self.incomplete = None;
                    let code = frame.into_close()?;
                    debug!("Received close frame: {:?}", code);
                    return Ok(Some(Message::Close(code)));
                }
                OpCode::Control(Control::Reserved(i)) => {
                    trace!("Ignoring control frame with reserved opcode {}", i);
                }
                OpCode::Data(data) => {
                    let is_final = frame.header().is_final;
                    let mut msg = match self.incomplete.take() {
                        Some(msg) => msg,
                        None => IncompleteMessage::new(data, self.max_message_size),
                    };
                    msg.extend(frame.into_payload())?;
                    if is_final {
                        return Ok(Some(msg.complete()));
                    }
                    self.incomplete = Some(msg);
                }
            }
        }
    }

    /// Block until the peer acknowledges our close frame and return its status.
    ///
    /// Data and control frames still in flight are discarded. Returns `None` if
    /// the acknowledgement carries no status or the peer hung up without one.
    pub fn read_close_status<S: Read>(&mut self, stream: &mut S) -> Result<Option<CloseCode>> {
        self.incomplete = None;
        loop {
            match self.read_frame(stream, true, true)? {
                None => {
                    debug!("Peer hung up without acknowledging close");
                    return Ok(None);
                }
                Some(frame) if frame.header().opcode == OpCode::Control(Control::Close) => {
                    return frame.into_close();
                }
                Some(frame) => {
                    trace!("Discarding {} frame while closing", frame.header().opcode);
                }
            }
        }
    }
}

/// Encodes and sends single frames with client-side masking.
///
/// Every frame gets a fresh random mask from the writer's own generator.
/// A frame the transport only partly accepted is kept in the out buffer and
/// completed before anything else goes out, so the peer never sees a torn frame.
#[derive(Debug)]
pub struct FrameWriter {
    rng: StdRng,
    /// The most recently encoded frame.
    encoded: Vec<u8>,
    /// Tail of a frame that did not fit into the transport yet.
    out_buffer: Vec<u8>,
}

impl FrameWriter {
    /// Create a frame writer seeded from the operating system.
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_os_rng())
    }

    /// Create a frame writer drawing masks from the given generator.
    pub fn with_rng(rng: StdRng) -> Self {
        FrameWriter { rng, encoded: Vec::new(), out_buffer: Vec::new() }
    }

    /// Encode a single final frame, masked with a fresh key.
    ///
    /// The returned slice stays valid until the next call on this writer.
    pub fn encode_frame(&mut self, opcode: OpCode, payload: impl Into<Bytes>) -> Result<&[u8]> {
        let mut frame = Frame::from_payload(
            FrameHeader { opcode, ..FrameHeader::default() },
            payload.into(),
        );
        frame.set_random_mask(&mut self.rng);
        trace!("writing frame {}", frame);

        self.encoded.clear();
        self.encoded.reserve(frame.len());
        frame.format_into_buf(&mut self.encoded)?;
        Ok(&self.encoded)
    }

    /// Whether part of an earlier frame still waits to be sent.
    pub fn has_pending(&self) -> bool {
        !self.out_buffer.is_empty()
    }

    /// Send the rest of a partly written frame, if any.
    ///
    /// Fails with [`Error::Write`] (`WouldBlock` on a non-blocking transport) if
    /// the transport does not take all of it. Whatever it took is not sent again.
    pub fn flush<S: Write>(&mut self, stream: &mut S) -> Result<()> {
        while !self.out_buffer.is_empty() {
            match stream.write(&self.out_buffer) {
                Ok(0) => {
                    return Err(Error::Write(io::Error::new(
                        IoErrorKind::WriteZero,
                        "failed to write buffered frame",
                    )))
                }
                Ok(len) => {
                    self.out_buffer.drain(0..len);
                }
                Err(err) if err.kind() == IoErrorKind::Interrupted => {}
                Err(err) => return Err(Error::Write(err)),
            }
        }
        stream.flush().map_err(Error::Write)
    }

    /// Encode and send a single frame, returning its encoded size.
    ///
    /// The tail of an earlier frame goes out first; if it does not fit, the new
    /// frame is dropped untouched and the call fails with [`Error::Write`]. A frame
    /// is never torn: once its first byte is on the wire, a `WouldBlock` leaves the
    /// rest in the out buffer for the next write or [`flush`](Self::flush) and the
    /// frame counts as sent.
    pub fn write_frame<S: Write>(
        &mut self,
        stream: &mut S,
        opcode: OpCode,
        payload: impl Into<Bytes>,
    ) -> Result<usize> {
        self.flush(stream)?;
        let len = self.encode_frame(opcode, payload)?.len();

        let mut written = 0;
        while written < len {
            match stream.write(&self.encoded[written..]) {
                Ok(0) => {
                    return Err(Error::Write(io::Error::new(
                        IoErrorKind::WriteZero,
                        "failed to write frame",
                    )))
                }
                Ok(n) => written += n,
                Err(err) if err.kind() == IoErrorKind::Interrupted => {}
                Err(err) if err.kind() == IoErrorKind::WouldBlock && written > 0 => {
                    trace!("Frame partly written, {} bytes left in out buffer", len - written);
                    self.out_buffer.extend_from_slice(&self.encoded[written..]);
                    return Ok(len);
                }
                Err(err) => return Err(Error::Write(err)),
            }
        }
        match stream.flush() {
            Err(err) if err.kind() == IoErrorKind::WouldBlock => {}
            flushed => flushed.map_err(Error::Write)?,
        }
        Ok(len)
    }

    /// Send a text frame.
    pub fn write_text<S: Write>(&mut self, stream: &mut S, payload: impl Into<Bytes>) -> Result<usize> {
        self.write_frame(stream, OpCode::Data(Data::Text), payload)
    }

    /// Send a binary frame.
    pub fn write_binary<S: Write>(
        &mut self,
        stream: &mut S,
        payload: impl Into<Bytes>,
    ) -> Result<usize> {
        self.write_frame(stream, OpCode::Data(Data::Binary), payload)
    }

    /// Send a ping frame.
    pub fn write_ping<S: Write>(&mut self, stream: &mut S, payload: impl Into<Bytes>) -> Result<usize> {
        self.write_frame(stream, OpCode::Control(Control::Ping), payload)
    }

    /// Send a pong frame.
    pub fn write_pong<S: Write>(&mut self, stream: &mut S, payload: impl Into<Bytes>) -> Result<usize> {
        self.write_frame(stream, OpCode::Control(Control::Pong), payload)
    }

    /// Send a close frame carrying the given status code.
    pub fn write_close<S: Write>(&mut self, stream: &mut S, code: CloseCode) -> Result<usize> {
        let raw: u16 = code.into();
        self.write_frame(
            stream,
            OpCode::Control(Control::Close),
            Bytes::copy_from_slice(&raw.to_be_bytes()),
        )
    }
}

impl Default for FrameWriter {
    fn default() -> Self {
        Self::new()
    }
}
