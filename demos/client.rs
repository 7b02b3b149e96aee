use std::io::Read;

use log::*;
use wsstream::connect;

fn main() {
    env_logger::init();

    let url = std::env::args().nth(1).unwrap_or_else(|| "ws://localhost:3012/socket".into());
    let (mut socket, response) = connect(url).expect("Can't connect");

    info!("Connected to the server");
    info!("Response HTTP code: {}", response.status());
    info!("Response contains the following headers:");
    for (header, _value) in response.headers() {
        info!("* {header}");
    }

    socket.write(&b"Hello WebSocket"[..]).unwrap();

    let mut received = [0u8; 1024];
    loop {
        match socket.io().read(&mut received) {
            Ok(0) => break,
            Ok(n) => println!("Received: {}", String::from_utf8_lossy(&received[..n])),
            Err(e) => {
                error!("Error reading: {e}");
                break;
            }
        }
    }
    socket.close().unwrap();
}
