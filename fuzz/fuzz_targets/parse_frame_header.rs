#![no_main]
use libfuzzer_sys::fuzz_target;

use std::io::Cursor;

fuzz_target!(|data: &[u8]| {
    let mut cursor = Cursor::new(data);
    if wsstream::protocol::frame::FrameHeader::parse(&mut cursor).ok().flatten().is_none() {
        assert_eq!(cursor.position(), 0);
    }
});
