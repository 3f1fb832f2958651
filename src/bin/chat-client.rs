//! Chat Relay Client
//!
//! A thin interactive client for the relay server. Connects, announces a
//! name, then sends each line typed on stdin while printing everything the
//! server relays back. Type /exit to leave; the server only ever sees the
//! disconnect.

use std::env;
use std::process;

use log::error;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use chat_relay::framing::FrameReader;

const DEFAULT_SERVER: &str = "127.0.0.1:2004";
const EXIT_COMMAND: &str = "/exit";
const READ_BUFFER_BYTES: usize = 256;
const MAX_MESSAGE_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() {
    env_logger::init();

    let server_addr = env::args()
        .nth(1)
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());

    let stream = match TcpStream::connect(&server_addr).await {
        Ok(stream) => stream,
        Err(e) => {
            error!("Failed to connect to {}: {}", server_addr, e);
            process::exit(1);
        }
    };

    println!("Connected to {}", server_addr);
    println!("Enter your name:");

    let mut stdin = BufReader::new(tokio::io::stdin()).lines();

    let name = match stdin.next_line().await {
        Ok(Some(line)) if !line.trim().is_empty() => line.trim().to_string(),
        _ => {
            error!("A name is required");
            process::exit(1);
        }
    };

    let (read_half, mut write_half) = stream.into_split();

    if let Err(e) = write_half.write_all(name.as_bytes()).await {
        error!("Failed to send name: {}", e);
        process::exit(1);
    }

    // Print relayed traffic as it arrives
    let printer = tokio::spawn(async move {
        let mut frames = FrameReader::new(read_half, READ_BUFFER_BYTES, MAX_MESSAGE_BYTES);
        loop {
            match frames.next_frame().await {
                Ok(Some(text)) => println!("{}", text),
                Ok(None) => {
                    println!("Server closed the connection");
                    break;
                }
                Err(e) => {
                    error!("Connection lost: {}", e);
                    break;
                }
            }
        }
    });

    println!("You are in the chat now ({} to leave)", EXIT_COMMAND);

    while let Ok(Some(line)) = stdin.next_line().await {
        if line.trim() == EXIT_COMMAND {
            break;
        }
        if line.is_empty() {
            continue;
        }
        if let Err(e) = write_half.write_all(line.as_bytes()).await {
            error!("Failed to send: {}", e);
            break;
        }
    }

    // Closing our side makes the server tear the session down; the printer
    // ends when the server closes its side in response
    let _ = write_half.shutdown().await;
    let _ = printer.await;
}
