//! A buffer for reading data from the network.
//!
//! The `ReadBuffer` is a buffer of bytes similar to a first-in, first-out queue.
//! It is filled by reading from a stream supporting `Read` in chunks of a
//! configured size and is then accessible as a cursor for reading bytes.

use std::io::{Cursor, Read, Result as IoResult};

use bytes::Buf;

/// Default size of a single read from the transport.
pub const DEFAULT_CHUNK_SIZE: usize = 4096;

/// A FIFO buffer for reading packets from the network.
#[derive(Debug)]
pub struct ReadBuffer {
    storage: Cursor<Vec<u8>>,
    chunk: Box<[u8]>,
}

impl ReadBuffer {
    /// Create a new empty input buffer reading `chunk_size` bytes at a time.
    pub fn new(chunk_size: usize) -> Self {
        Self::from_partially_read(Vec::with_capacity(chunk_size), chunk_size)
    }

    /// Create a input buffer filled with previously read data.
    pub fn from_partially_read(part: Vec<u8>, chunk_size: usize) -> Self {
        Self { storage: Cursor::new(part), chunk: vec![0; chunk_size.max(1)].into_boxed_slice() }
    }

    /// Get a cursor to the data storage.
    pub fn as_cursor(&self) -> &Cursor<Vec<u8>> {
        &self.storage
    }

    /// Get a cursor to the mutable data storage.
    pub fn as_cursor_mut(&mut self) -> &mut Cursor<Vec<u8>> {
        &mut self.storage
    }

    /// Consume the `ReadBuffer` and get the bytes not consumed yet.
    pub fn into_vec(mut self) -> Vec<u8> {
        self.clean_up();
        self.storage.into_inner()
    }

    /// Read next portion of data from the given input stream.
    ///
    /// Returns the number of bytes appended, zero meaning end of input.
    pub fn read_from<S: Read>(&mut self, stream: &mut S) -> IoResult<usize> {
        self.clean_up();
        let size = stream.read(&mut self.chunk)?;
        self.storage.get_mut().extend_from_slice(&self.chunk[..size]);
        Ok(size)
    }

    /// Cleans ups the part of the vector that has been already read by the cursor.
    fn clean_up(&mut self) {
        let pos = self.storage.position() as usize;
        self.storage.get_mut().drain(0..pos).count();
        self.storage.set_position(0);
    }
}

impl Buf for ReadBuffer {
    fn remaining(&self) -> usize {
        Buf::remaining(self.as_cursor())
    }

    fn chunk(&self) -> &[u8] {
        Buf::chunk(self.as_cursor())
    }

    fn advance(&mut self, cnt: usize) {
        Buf::advance(self.as_cursor_mut(), cnt);
    }
}

impl Default for ReadBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn simple_reading() {
        let mut input = Cursor::new(b"Hello World!".to_vec());
        let mut buffer = ReadBuffer::default();
        let size = buffer.read_from(&mut input).unwrap();
        assert_eq!(size, 12);
        assert_eq!(buffer.chunk(), b"Hello World!");
    }

    #[test]
    fn reading_in_chunks() {
        let mut inp = Cursor::new(b"Hello World!".to_vec());
        let mut buf = ReadBuffer::new(4);

        let size = buf.read_from(&mut inp).unwrap();
        assert_eq!(size, 4);
        assert_eq!(buf.chunk(), b"Hell");

        buf.advance(2);
        assert_eq!(buf.chunk(), b"ll");
        assert_eq!(buf.storage.get_mut(), b"Hell");

        let size = buf.read_from(&mut inp).unwrap();
        assert_eq!(size, 4);
        assert_eq!(buf.chunk(), b"llo Wo");
        assert_eq!(buf.storage.get_mut(), b"llo Wo");

        let size = buf.read_from(&mut inp).unwrap();
        assert_eq!(size, 4);
        assert_eq!(buf.chunk(), b"llo World!");

        assert_eq!(buf.read_from(&mut inp).unwrap(), 0);
    }

    #[test]
    fn partially_read_tail_comes_first() {
        let mut inp = Cursor::new(b"cd".to_vec());
        let mut buf = ReadBuffer::from_partially_read(b"ab".to_vec(), 16);
        assert_eq!(buf.chunk(), b"ab");
        buf.read_from(&mut inp).unwrap();
        assert_eq!(buf.chunk(), b"abcd");
        buf.advance(1);
        assert_eq!(buf.into_vec(), b"bcd");
    }
}
