//! A minimal WebSocket server for driving the client over loopback TCP.

#![allow(dead_code)]

use std::{
    io::{Read, Write},
    net::{TcpListener, TcpStream},
    process::exit,
    thread::{sleep, spawn, JoinHandle},
    time::Duration,
};

use wsstream::{handshake::derive_accept_key, protocol::frame::Frame};

/// Abort the whole test binary if a test hangs.
pub fn watchdog() {
    env_logger::try_init().ok();
    spawn(|| {
        sleep(Duration::from_secs(30));
        println!("Unit test executed too long, perhaps stuck on a blocking read...");
        exit(1);
    });
}

/// Listen on an ephemeral port and run `server` on the first accepted connection.
///
/// Returns the `ws://` URL to connect to and the server thread handle.
pub fn serve<F>(server: F) -> (String, JoinHandle<()>)
where
    F: FnOnce(TcpStream) + Send + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").expect("Can't listen");
    let port = listener.local_addr().unwrap().port();
    let handle = spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        server(stream);
    });
    (format!("ws://localhost:{port}/socket"), handle)
}

/// Read the upgrade request head byte by byte, so nothing past it is consumed.
pub fn read_request(stream: &mut TcpStream) -> String {
    let mut head = Vec::new();
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        let n = stream.read(&mut byte).unwrap();
        assert_eq!(n, 1, "client hung up during the handshake");
        head.push(byte[0]);
    }
    String::from_utf8(head).unwrap()
}

/// Find a header value in a request head, ignoring the case of the name.
pub fn header<'a>(request: &'a str, name: &str) -> Option<&'a str> {
    request.lines().skip(1).find_map(|line| {
        let (key, value) = line.split_once(':')?;
        key.trim().eq_ignore_ascii_case(name).then(|| value.trim())
    })
}

/// A correct `101` response for the given request.
pub fn upgrade_response(request: &str) -> String {
    let key = header(request, "Sec-WebSocket-Key").expect("no key in request");
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Connection: Upgrade\r\n\
         Upgrade: websocket\r\n\
         Sec-WebSocket-Accept: {}\r\n\r\n",
        derive_accept_key(key.as_bytes())
    )
}

/// Accept the upgrade on `stream` and return a server-side connection.
pub fn accept(mut stream: TcpStream) -> ServerConn {
    let request = read_request(&mut stream);
    stream.write_all(upgrade_response(&request).as_bytes()).unwrap();
    ServerConn { stream, buf: Vec::new() }
}

/// Encode an unmasked server frame.
pub fn server_frame(first_byte: u8, payload: &[u8]) -> Vec<u8> {
    let mut out = vec![first_byte];
    match payload.len() {
        len @ 0..=125 => out.push(len as u8),
        len @ 126..=65535 => {
            out.push(126);
            out.extend_from_slice(&(len as u16).to_be_bytes());
        }
        len => {
            out.push(127);
            out.extend_from_slice(&(len as u64).to_be_bytes());
        }
    }
    out.extend_from_slice(payload);
    out
}

/// Server end of an upgraded connection.
pub struct ServerConn {
    pub stream: TcpStream,
    buf: Vec<u8>,
}

impl ServerConn {
    /// Send one unmasked frame.
    pub fn send(&mut self, first_byte: u8, payload: &[u8]) {
        self.stream.write_all(&server_frame(first_byte, payload)).unwrap();
    }

    /// Receive one client frame, asserting it was masked. `None` on end of input.
    pub fn recv(&mut self) -> Option<Frame> {
        loop {
            if let Some((size, frame)) = Frame::parse(&self.buf).unwrap() {
                assert_eq!(self.buf[1] & 0x80, 0x80, "client frame without mask");
                self.buf.drain(..size);
                return Some(frame);
            }
            let mut chunk = [0u8; 4096];
            let n = self.stream.read(&mut chunk).unwrap();
            if n == 0 {
                return None;
            }
            self.buf.extend_from_slice(&chunk[..n]);
        }
    }
}
