//! Single-object JSON framing over a raw response stream.
//!
//! The backend's HTTP responses are read straight off the socket, without
//! an HTTP parser. [`JsonFramer`] is fed whatever bytes arrive and decides,
//! one byte at a time, when the first top-level JSON object is complete:
//!
//! * Everything before the first `{` (status line and headers) is skipped.
//! * `{` / `}` outside string literals move a plain depth counter; nested
//!   structure is never inspected.
//! * Quotes toggle the string state and a backslash inside a string makes
//!   the next byte inert, so `"a{b}c"` or `"\"}"` never close the object.
//!
//! The framer never yields a partial document: if the byte source ends
//! before the depth returns to zero, [`JsonFramer::finish`] fails.

use std::fmt;
use std::io::{self, Read};

/// Depth value before the opening brace has been seen.
const NOT_OPENED: i32 = -1;

/// Default cap for both the header prefix and the JSON body.
pub const DEFAULT_MAX_LEN: usize = 64 * 1024;

// ─── FrameError ───────────────────────────────────────────────────────────────

/// Why no complete JSON object could be extracted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum FrameError {
    /// The stream ended before the top-level object was closed.
    Incomplete {
        /// Bytes of the object received so far (0 if it never opened).
        received: usize,
    },
    /// The header prefix or the object exceeded the configured limit.
    TooLarge {
        /// The limit that was hit.
        limit: usize,
    },
    /// The framed object is not valid UTF-8.
    InvalidUtf8,
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Incomplete { received: 0 } => write!(f, "stream ended before any JSON object"),
            Self::Incomplete { received } => write!(f, "stream ended inside a JSON object ({received} bytes read)"),
            Self::TooLarge { limit } => write!(f, "response exceeds {limit} bytes"),
            Self::InvalidUtf8 => write!(f, "JSON object is not valid UTF-8"),
        }
    }
}

impl std::error::Error for FrameError {}

// ─── Feed ─────────────────────────────────────────────────────────────────────

/// Result of pushing a chunk into a [`JsonFramer`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Feed {
    /// More bytes are needed.
    Incomplete,
    /// The object closed after `consumed` bytes of the chunk; the rest of the
    /// chunk is not part of it.
    Complete {
        /// Number of bytes of the chunk that were used.
        consumed: usize,
    },
}

// ─── JsonFramer ───────────────────────────────────────────────────────────────

/// Resumable brace-counting state machine.
///
/// ```
/// use perch_codec::{Feed, JsonFramer};
///
/// let mut framer = JsonFramer::new();
/// assert_eq!(framer.feed(b"HTTP/1.1 200 OK\r\n\r\n{\"ok\":").unwrap(), Feed::Incomplete);
/// assert_eq!(framer.feed(b"true}trailing").unwrap(), Feed::Complete { consumed: 5 });
/// assert_eq!(framer.finish().unwrap(), r#"{"ok":true}"#);
/// ```
#[derive(Clone, Debug)]
pub struct JsonFramer {
    depth:      i32,
    in_string:  bool,
    escaped:    bool,
    header_len: usize,
    body:       Vec<u8>,
    max_len:    usize,
}

impl Default for JsonFramer {
    fn default() -> Self {
        Self::with_limit(DEFAULT_MAX_LEN)
    }
}

impl JsonFramer {
    /// Framer with the default [`DEFAULT_MAX_LEN`] limit.
    pub fn new() -> Self {
        Self::default()
    }

    /// Framer that rejects headers or bodies longer than `max_len` bytes.
    pub fn with_limit(max_len: usize) -> Self {
        Self {
            depth:      NOT_OPENED,
            in_string:  false,
            escaped:    false,
            header_len: 0,
            body:       Vec::new(),
            max_len,
        }
    }

    /// Forget all state so the framer can be reused for a new response.
    pub fn reset(&mut self) {
        self.depth = NOT_OPENED;
        self.in_string = false;
        self.escaped = false;
        self.header_len = 0;
        self.body.clear();
    }

    /// `true` once the top-level object has been closed.
    pub fn is_complete(&self) -> bool {
        self.depth == 0
    }

    /// Number of object bytes collected so far.
    pub fn received(&self) -> usize {
        self.body.len()
    }

    /// Push the next chunk of the stream.
    ///
    /// Once the object is complete further chunks are ignored and reported
    /// as `Complete { consumed: 0 }`.
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Feed, FrameError> {
        if self.is_complete() {
            return Ok(Feed::Complete { consumed: 0 });
        }

        for (idx, &byte) in chunk.iter().enumerate() {
            if self.depth == NOT_OPENED {
                if byte != b'{' {
                    self.header_len += 1;
                    if self.header_len > self.max_len {
                        return Err(FrameError::TooLarge { limit: self.max_len });
                    }
                    continue;
                }
                self.depth = 1;
                self.body.push(byte);
                continue;
            }

            if self.body.len() >= self.max_len {
                return Err(FrameError::TooLarge { limit: self.max_len });
            }
            self.body.push(byte);

            if self.escaped {
                self.escaped = false;
                continue;
            }

            match byte {
                b'\\' if self.in_string => self.escaped = true,
                b'"' => self.in_string = !self.in_string,
                b'{' if !self.in_string => self.depth += 1,
                b'}' if !self.in_string => {
                    self.depth -= 1;
                    if self.depth == 0 {
                        log::trace!("JSON object closed after {} bytes", self.body.len());
                        return Ok(Feed::Complete { consumed: idx + 1 });
                    }
                }
                _ => {}
            }
        }

        Ok(Feed::Incomplete)
    }

    /// Take the framed object.
    ///
    /// Fails with [`FrameError::Incomplete`] unless [`feed`](Self::feed) has
    /// reported completion.
    pub fn finish(self) -> Result<String, FrameError> {
        if !self.is_complete() {
            return Err(FrameError::Incomplete { received: self.body.len() });
        }
        String::from_utf8(self.body).map_err(|_| FrameError::InvalidUtf8)
    }
}

// ─── Blocking helper ──────────────────────────────────────────────────────────

/// Read from a blocking source until one JSON object is framed.
///
/// End of stream or a read error before the object closes is reported as
/// [`FrameError::Incomplete`]. Bytes after the closing brace are left unread
/// in the current chunk and discarded.
pub fn frame_reader<R: Read>(reader: &mut R, max_len: usize) -> Result<String, FrameError> {
    let mut framer = JsonFramer::with_limit(max_len);
    let mut buf = [0u8; 512];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::debug!("read failed while framing: {e}");
                break;
            }
        };
        if let Feed::Complete { .. } = framer.feed(&buf[..n])? {
            return framer.finish();
        }
    }

    framer.finish()
}

// ─── Tests ────────────────────────────────────────────────────────────────────
