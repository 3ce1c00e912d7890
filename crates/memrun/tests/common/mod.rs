//! Shared fixtures for integration tests.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use memrun::{Config, ConfigBuilder};

/// The host shell, read into memory.
pub fn sh_bytes() -> Vec<u8> {
    std::fs::read("/bin/sh").expect("/bin/sh should be readable")
}

/// A config builder that runs the host shell from memory.
///
/// `argv[0]` is pinned to `sh` so multi-call shells (busybox) still work.
pub fn sh_config() -> ConfigBuilder {
    Config::builder().binary(sh_bytes()).arg0("sh")
}

/// A URL on localhost where nothing is listening.
pub fn closed_port_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{port}/bin")
}

/// A minimal HTTP server answering every request with the same response.
#[derive(Debug)]
pub struct TestServer {
    pub url: String,
    connections: Arc<AtomicUsize>,
}

impl TestServer {
    /// Serve `body` with a `200 OK` status.
    pub fn ok(body: Vec<u8>) -> Self {
        Self::start("200 OK", body)
    }

    /// Serve `body` with the given status line, e.g. `"404 Not Found"`.
    pub fn start(status: &'static str, body: Vec<u8>) -> Self {
        let length = body.len();
        Self::serve(status, length, body)
    }

    /// Announce `length` bytes but send only `body`, then hang up.
    pub fn truncated(length: usize, body: Vec<u8>) -> Self {
        Self::serve("200 OK", length, body)
    }

    fn serve(status: &'static str, length: usize, body: Vec<u8>) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        let connections = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&connections);

        std::thread::spawn(move || {
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                counter.fetch_add(1, Ordering::SeqCst);
                read_request_head(&mut stream);
                let head = format!(
                    "HTTP/1.1 {status}\r\nContent-Length: {length}\r\nConnection: close\r\n\r\n"
                );
                let _ = stream.write_all(head.as_bytes());
                let _ = stream.write_all(&body);
            }
        });

        Self {
            url: format!("http://{addr}/bin"),
            connections,
        }
    }

    /// Number of connections accepted so far.
    pub fn connections(&self) -> usize {
        self.connections.load(Ordering::SeqCst)
    }
}

fn read_request_head(stream: &mut TcpStream) {
    let mut request = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match stream.read(&mut chunk) {
            Ok(0) | Err(_) => break,
            Ok(n) => {
                request.extend_from_slice(&chunk[..n]);
                if request.windows(4).any(|w| w == b"\r\n\r\n") {
                    break;
                }
            }
        }
    }
}
