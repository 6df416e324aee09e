//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves one body at any path. HEAD answers with Content-Length, ETag and
//! Accept-Ranges; GET honors `Range: bytes=N-` with 206. Behavior can be
//! switched at runtime (reject ranges, redirect ranged requests, hide the
//! length, slow streaming, forced status) and every request is logged.

use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// If false, GET ignores Range and always returns 200 with the full body.
    pub support_ranges: bool,
    /// Answer every ranged GET with 416.
    pub reject_ranges: bool,
    /// Answer every ranged GET with a 302 to `/moved`, which serves the full body.
    pub redirect_ranged: bool,
    /// If false, GET omits Content-Length and closes the connection after the body.
    pub send_length: bool,
    /// Answer GET with this status and an empty body.
    pub status: Option<u16>,
    pub chunk_size: usize,
    /// Pause between body chunks.
    pub chunk_delay: Option<Duration>,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            support_ranges: true,
            reject_ranges: false,
            redirect_ranged: false,
            send_length: true,
            status: None,
            chunk_size: 16 * 1024,
            chunk_delay: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggedRequest {
    pub method: String,
    pub path: String,
    /// Start offset of `Range: bytes=N-`.
    pub range_start: Option<u64>,
}

struct Shared {
    body: Arc<Vec<u8>>,
    etag: Option<String>,
    opts: ServerOptions,
    log: Vec<LoggedRequest>,
}

pub struct TestServer {
    base: String,
    shared: Arc<Mutex<Shared>>,
}

impl TestServer {
    /// Starts a server in a background thread. It runs until the process exits.
    pub fn start(body: Vec<u8>, etag: Option<&str>) -> Self {
        Self::start_with(body, etag, ServerOptions::default())
    }

    pub fn start_with(body: Vec<u8>, etag: Option<&str>, opts: ServerOptions) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
        let port = listener.local_addr().unwrap().port();
        let shared = Arc::new(Mutex::new(Shared {
            body: Arc::new(body),
            etag: etag.map(str::to_string),
            opts,
            log: Vec::new(),
        }));
        let accept_shared = Arc::clone(&shared);
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let shared = Arc::clone(&accept_shared);
                thread::spawn(move || handle(stream, &shared));
            }
        });
        Self {
            base: format!("http://127.0.0.1:{}", port),
            shared,
        }
    }

    /// URL of `name` on this server, e.g. `url("file.bin")`.
    pub fn url(&self, name: &str) -> String {
        format!("{}/{}", self.base, name)
    }

    /// Replace the served content (simulates the resource changing upstream).
    pub fn set_content(&self, body: Vec<u8>, etag: Option<&str>) {
        let mut shared = self.shared.lock().unwrap();
        shared.body = Arc::new(body);
        shared.etag = etag.map(str::to_string);
    }

    pub fn set_options(&self, f: impl FnOnce(&mut ServerOptions)) {
        f(&mut self.shared.lock().unwrap().opts);
    }

    pub fn requests(&self) -> Vec<LoggedRequest> {
        self.shared.lock().unwrap().log.clone()
    }

    pub fn gets(&self) -> Vec<LoggedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method == "GET")
            .collect()
    }
}

fn handle(mut stream: TcpStream, shared: &Mutex<Shared>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) => return,
        Ok(n) => n,
        Err(_) => return,
    };
    let request = match std::str::from_utf8(&buf[..n]) {
        Ok(s) => s,
        Err(_) => return,
    };
    let logged = parse_request(request);
    let (body, etag, opts) = {
        let mut shared = shared.lock().unwrap();
        shared.log.push(logged.clone());
        (
            Arc::clone(&shared.body),
            shared.etag.clone(),
            shared.opts.clone(),
        )
    };
    let total = body.len() as u64;
    let etag_header = etag
        .map(|e| format!("ETag: \"{}\"\r\n", e))
        .unwrap_or_default();
    let accept_ranges = if opts.support_ranges {
        "Accept-Ranges: bytes\r\n"
    } else {
        ""
    };

    if logged.method == "HEAD" {
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}{}Connection: close\r\n\r\n",
            total, etag_header, accept_ranges
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }
    if logged.method != "GET" {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        return;
    }

    if let Some(code) = opts.status {
        let response = format!(
            "HTTP/1.1 {} Test\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            code
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let ranged = logged.range_start.is_some() && logged.path != "/moved";
    if ranged && opts.redirect_ranged {
        let _ = stream.write_all(
            b"HTTP/1.1 302 Found\r\nLocation: /moved\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
        );
        return;
    }
    if ranged && opts.reject_ranges {
        let response = format!(
            "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
            total
        );
        let _ = stream.write_all(response.as_bytes());
        return;
    }

    let (status, content_range, slice): (&str, String, &[u8]) =
        match logged.range_start.filter(|_| ranged && opts.support_ranges) {
            Some(start) if start >= total => {
                let response = format!(
                    "HTTP/1.1 416 Range Not Satisfiable\r\nContent-Range: bytes */{}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n",
                    total
                );
                let _ = stream.write_all(response.as_bytes());
                return;
            }
            Some(start) => (
                "206 Partial Content",
                format!(
                    "Content-Range: bytes {}-{}/{}\r\n",
                    start,
                    total - 1,
                    total
                ),
                &body[start as usize..],
            ),
            None => ("200 OK", String::new(), &body[..]),
        };
    let length = if opts.send_length {
        format!("Content-Length: {}\r\n", slice.len())
    } else {
        String::new()
    };
    let head = format!(
        "HTTP/1.1 {}\r\n{}{}{}{}Connection: close\r\n\r\n",
        status, length, content_range, etag_header, accept_ranges
    );
    if stream.write_all(head.as_bytes()).is_err() {
        return;
    }
    for chunk in slice.chunks(opts.chunk_size.max(1)) {
        if stream.write_all(chunk).is_err() {
            return;
        }
        let _ = stream.flush();
        if let Some(delay) = opts.chunk_delay {
            thread::sleep(delay);
        }
    }
}

fn parse_request(request: &str) -> LoggedRequest {
    let mut logged = LoggedRequest {
        method: String::new(),
        path: String::new(),
        range_start: None,
    };
    for line in request.lines() {
        let line = line.trim();
        if line.is_empty() {
            break;
        }
        if logged.method.is_empty() {
            let mut parts = line.split_whitespace();
            logged.method = parts.next().unwrap_or("").to_ascii_uppercase();
            logged.path = parts.next().unwrap_or("").to_string();
            continue;
        }
        if let Some((name, value)) = line.split_once(':') {
            if name.trim().eq_ignore_ascii_case("range") {
                let value = value.trim().to_ascii_lowercase();
                if let Some(spec) = value.strip_prefix("bytes=") {
                    if let Some((start, _)) = spec.split_once('-') {
                        logged.range_start = start.trim().parse().ok();
                    }
                }
            }
        }
    }
    logged
}
