#![no_main]
use libfuzzer_sys::fuzz_target;

use std::io::{self, Cursor, Read, Write};

use wsstream::protocol::{
    frame::{FrameReader, FrameWriter},
    WebSocketConfig,
};

/// Reads the fuzz input, swallows every pong written back.
struct WriteMoc<Stream>(Stream);

impl<Stream> Write for WriteMoc<Stream> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<Stream: Read> Read for WriteMoc<Stream> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.0.read(buf)
    }
}

fuzz_target!(|data: &[u8]| {
    let config = WebSocketConfig::default().max_message_size(Some(1 << 20));
    let mut reader = FrameReader::new(&config);
    let mut writer = FrameWriter::new();
    let mut socket = WriteMoc(Cursor::new(data));
    while let Ok(Some(_)) = reader.read_message(&mut socket, &mut writer, true) {}
});
