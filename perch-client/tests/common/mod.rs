//! In-memory [`Connector`] for driving a [`Client`] without a network.

#![allow(dead_code)]

use std::collections::{HashMap, VecDeque};
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use perch_client::{Client, Config, Connector, Target};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};

pub const TOKEN: &str = "123456:test-token";

// ── Replies ───────────────────────────────────────────────────────────────────

/// What the next connection attempt gets.
pub enum Reply {
    /// Accept, then serve these bytes and EOF.
    Bytes(Vec<u8>),
    /// Accept, then never send anything.
    Hang,
    /// Refuse the connection.
    Refuse,
}

/// A complete `200 OK` response around `json`.
pub fn http_ok(json: &str) -> Reply {
    Reply::Bytes(format!(
        "HTTP/1.1 200 OK\r\nServer: nginx\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{json}",
        json.len(),
    ).into_bytes())
}

/// The response is cut off after `keep` bytes of `json`.
pub fn http_truncated(json: &str, keep: usize) -> Reply {
    let mut bytes = b"HTTP/1.1 200 OK\r\nContent-Type: application/json\r\n\r\n".to_vec();
    bytes.extend_from_slice(&json.as_bytes()[..keep]);
    Reply::Bytes(bytes)
}

pub fn updates_json(update: &str) -> String {
    format!(r#"{{"ok":true,"result":[{update}]}}"#)
}

pub fn text_update(update_id: i64, chat_id: i64, text: &str) -> String {
    updates_json(&format!(
        r#"{{"update_id":{update_id},"message":{{"message_id":10,"from":{{"id":{chat_id},"is_bot":false,"first_name":"Ann"}},"chat":{{"id":{chat_id},"type":"private"}},"date":1700000000,"text":"{text}"}}}}"#
    ))
}

pub const NO_UPDATES: &str = r#"{"ok":true,"result":[]}"#;
pub const SENT: &str = r#"{"ok":true,"result":{"message_id":11,"date":1700000001,"chat":{"id":1,"type":"private"},"text":"x"}}"#;

// ── MockConnector ─────────────────────────────────────────────────────────────

#[derive(Default)]
struct State {
    replies:  VecDeque<Reply>,
    connects: Vec<Target>,
    requests: Vec<Arc<Mutex<Vec<u8>>>>,
    fail_dns: bool,
    open:     usize,
}

#[derive(Clone, Default)]
pub struct MockConnector {
    state: Arc<Mutex<State>>,
}

impl MockConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Host-name targets fail as if the lookup did.
    pub fn failing_dns() -> Self {
        let c = Self::new();
        c.state.lock().unwrap().fail_dns = true;
        c
    }

    pub fn push(&self, reply: Reply) {
        self.state.lock().unwrap().replies.push_back(reply);
    }

    /// Streams handed out and not yet dropped.
    pub fn open_streams(&self) -> usize {
        self.state.lock().unwrap().open
    }

    pub fn connects(&self) -> Vec<Target> {
        self.state.lock().unwrap().connects.clone()
    }

    /// Raw text of every request written so far.
    pub fn requests(&self) -> Vec<String> {
        self.state.lock().unwrap().requests.iter()
            .map(|r| String::from_utf8_lossy(&r.lock().unwrap()).into_owned())
            .collect()
    }

    pub fn last_request(&self) -> Request {
        Request::parse(self.requests().last().expect("no request was sent"))
    }

    fn open(&self, target: &Target) -> io::Result<MockStream> {
        let mut state = self.state.lock().unwrap();
        state.connects.push(target.clone());
        if state.fail_dns && matches!(target, Target::Host { .. }) {
            return Err(io::Error::new(io::ErrorKind::NotFound, "lookup failed"));
        }
        let (data, hang) = match state.replies.pop_front().unwrap_or(Reply::Refuse) {
            Reply::Bytes(b) => (b, false),
            Reply::Hang     => (Vec::new(), true),
            Reply::Refuse   => return Err(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
        };
        let written = Arc::new(Mutex::new(Vec::new()));
        state.requests.push(written.clone());
        state.open += 1;
        Ok(MockStream { data, pos: 0, hang, written, state: self.state.clone() })
    }
}

impl Connector for MockConnector {
    type Stream = MockStream;

    async fn connect(&self, target: &Target) -> io::Result<MockStream> {
        self.open(target)
    }
}

// ── MockStream ────────────────────────────────────────────────────────────────

/// Serves its reply a few bytes at a time and records what is written.
pub struct MockStream {
    data:    Vec<u8>,
    pos:     usize,
    hang:    bool,
    written: Arc<Mutex<Vec<u8>>>,
    state:   Arc<Mutex<State>>,
}

impl Drop for MockStream {
    fn drop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.open -= 1;
        }
    }
}

const READ_CHUNK: usize = 7;

impl AsyncRead for MockStream {
    fn poll_read(mut self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        if self.hang {
            return Poll::Pending;
        }
        let n = READ_CHUNK.min(buf.remaining()).min(self.data.len() - self.pos);
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}

impl AsyncWrite for MockStream {
    fn poll_write(self: Pin<&mut Self>, _cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

// ── Request ───────────────────────────────────────────────────────────────────

/// A parsed `GET` request line plus headers.
#[derive(Debug)]
pub struct Request {
    pub path:    String,
    pub method:  String,
    pub params:  HashMap<String, String>,
    pub headers: Vec<String>,
}

impl Request {
    pub fn parse(raw: &str) -> Self {
        let mut lines = raw.split("\r\n");
        let line = lines.next().unwrap();
        let path = line.strip_prefix("GET ").unwrap().strip_suffix(" HTTP/1.1").unwrap().to_string();
        let (route, query) = path.split_once('?').unwrap_or((path.as_str(), ""));
        let method = route.rsplit('/').next().unwrap().to_string();
        let params = query.split('&').filter(|p| !p.is_empty()).map(|pair| {
            let (k, v) = pair.split_once('=').unwrap();
            (k.to_string(), urlencoding::decode(v).unwrap().into_owned())
        }).collect();
        let headers = lines.take_while(|l| !l.is_empty()).map(str::to_string).collect();
        Self { path: path.clone(), method, params, headers }
    }

    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

// ── Client ────────────────────────────────────────────────────────────────────

pub fn config() -> Config {
    Config {
        token:          TOKEN.into(),
        poll_interval:  Duration::from_millis(2000),
        server_timeout: Duration::from_millis(5000),
        ..Config::default()
    }
}

pub fn client(connector: MockConnector) -> Client<MockConnector> {
    Client::with_connector(config(), connector)
}
