#![no_main]
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    if let Ok(Some((size, frame))) = wsstream::protocol::frame::Frame::parse(data) {
        assert!(size <= data.len());
        assert!(frame.len() <= size);
    }
});
