//! Minimal HTTP/1.1 server for transport integration tests.
//!
//! Every response body is `"<METHOD> <target>"`, followed by `" <body>"` when
//! the request carried one. Special targets:
//! - `/status/<code>` answers with that status and body `boom`.
//! - `/slow` sleeps before answering.
//!
//! Each request line is appended to a shared log in arrival order.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

const SLOW_DELAY: Duration = Duration::from_millis(300);

pub struct EchoServer {
    /// Base URL, e.g. "http://127.0.0.1:12345/".
    pub base_url: String,
    log: Arc<Mutex<Vec<String>>>,
}

impl EchoServer {
    /// Request lines ("GET /path") seen so far, in arrival order.
    pub fn requests(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }
}

/// Starts a server in a background thread. Runs until the process exits.
pub fn start() -> EchoServer {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let log = Arc::new(Mutex::new(Vec::new()));
    let server_log = Arc::clone(&log);
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let log = Arc::clone(&server_log);
            thread::spawn(move || handle(stream, &log));
        }
    });
    EchoServer {
        base_url: format!("http://127.0.0.1:{}/", port),
        log,
    }
}

/// A URL on a port nothing listens on.
pub fn refused_url() -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    format!("http://127.0.0.1:{}/", port)
}

fn handle(mut stream: TcpStream, log: &Mutex<Vec<String>>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let Some((method, target, body)) = read_request(&mut stream) else {
        return;
    };
    log.lock().unwrap().push(format!("{} {}", method, target));

    let path = target.split('?').next().unwrap_or("");
    let (status, reply) = if let Some(code) = path.strip_prefix("/status/") {
        (code.to_string(), "boom".to_string())
    } else {
        if path == "/slow" {
            thread::sleep(SLOW_DELAY);
        }
        let mut reply = format!("{} {}", method, target);
        if !body.is_empty() {
            reply.push(' ');
            reply.push_str(&body);
        }
        ("200".to_string(), reply)
    };
    let head = format!(
        "HTTP/1.1 {} X\r\nContent-Length: {}\r\nContent-Type: text/plain\r\n\
X-Echo: 1\r\nConnection: close\r\n\r\n",
        status,
        reply.len()
    );
    let _ = stream.write_all(head.as_bytes());
    if method != "HEAD" {
        let _ = stream.write_all(reply.as_bytes());
    }
}

/// Returns (method, target, body). Reads headers, then Content-Length bytes.
fn read_request(stream: &mut TcpStream) -> Option<(String, String, String)> {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];
    let header_end = loop {
        if let Some(pos) = find(&data, b"\r\n\r\n") {
            break pos + 4;
        }
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            return None;
        }
        data.extend_from_slice(&buf[..n]);
    };
    let head = String::from_utf8_lossy(&data[..header_end]).into_owned();
    let mut lines = head.lines();
    let mut first = lines.next()?.split_whitespace();
    let method = first.next()?.to_string();
    let target = first.next()?.to_string();
    let content_length = lines
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);
    while data.len() < header_end + content_length {
        let n = stream.read(&mut buf).ok()?;
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);
    }
    let end = (header_end + content_length).min(data.len());
    let body = String::from_utf8_lossy(&data[header_end..end]).into_owned();
    Some((method, target, body))
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
