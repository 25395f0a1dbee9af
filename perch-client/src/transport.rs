//! Request/response transport for the Bot API.
//!
//! Every API call is one short-lived connection: connect, write a `GET`,
//! frame exactly one JSON object out of the response, drop the stream.
//! [`Connector`] is the pluggable byte-stream layer underneath; the default
//! implementation is [`crate::tls::TlsConnector`].

use std::fmt;
use std::future::Future;
use std::io;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use perch_codec::{Feed, JsonFramer};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::time::timeout;

use crate::errors::InvocationError;

/// Host name of the Bot API.
pub const DEFAULT_HOST: &str = "api.telegram.org";

/// Address used when DNS is disabled or fails.
pub const DEFAULT_FIXED_IP: IpAddr = IpAddr::V4(Ipv4Addr::new(149, 154, 167, 220));

/// HTTPS.
pub const DEFAULT_PORT: u16 = 443;

/// Budget for connecting and for receiving a complete response.
pub const DEFAULT_SERVER_TIMEOUT: Duration = Duration::from_millis(5000);

// ─── Target / Endpoint ────────────────────────────────────────────────────────

/// Where a single connection attempt goes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Target {
    /// Resolve `name` through DNS.
    Host { name: String, port: u16 },
    /// Connect to a literal address.
    Ip(SocketAddr),
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host { name, port } => write!(f, "{name}:{port}"),
            Self::Ip(addr)            => write!(f, "{addr}"),
        }
    }
}

/// The backend's host name together with its fixed fallback address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Endpoint {
    pub host:     String,
    pub fixed_ip: IpAddr,
    pub port:     u16,
}

impl Default for Endpoint {
    fn default() -> Self {
        Self {
            host:     DEFAULT_HOST.to_string(),
            fixed_ip: DEFAULT_FIXED_IP,
            port:     DEFAULT_PORT,
        }
    }
}

impl Endpoint {
    pub fn by_name(&self) -> Target {
        Target::Host { name: self.host.clone(), port: self.port }
    }

    pub fn by_ip(&self) -> Target {
        Target::Ip(SocketAddr::new(self.fixed_ip, self.port))
    }
}

// ─── Connector ────────────────────────────────────────────────────────────────

/// Opens byte streams to the backend.
///
/// A successful read means the peer is connected and data was available; EOF
/// or a read error means it disconnected. Dropping the stream closes it.
pub trait Connector: Send + Sync {
    /// The connected stream type.
    type Stream: AsyncRead + AsyncWrite + Unpin + Send;

    /// Open a connection to `target`.
    fn connect(&self, target: &Target) -> impl Future<Output = io::Result<Self::Stream>> + Send;
}

// ─── HttpSession ──────────────────────────────────────────────────────────────

/// Connection policy plus one-shot HTTP exchanges.
pub struct HttpSession<C> {
    connector:        C,
    endpoint:         Endpoint,
    use_dns:          bool,
    timeout:          Duration,
    max_response_len: usize,
}

impl<C: Connector> HttpSession<C> {
    pub fn new(connector: C, endpoint: Endpoint) -> Self {
        Self {
            connector,
            endpoint,
            use_dns:          false,
            timeout:          DEFAULT_SERVER_TIMEOUT,
            max_response_len: perch_codec::framer::DEFAULT_MAX_LEN,
        }
    }

    /// Prefer the host name (`true`) or go straight to the fixed address.
    pub fn set_use_dns(&mut self, value: bool) {
        self.use_dns = value;
    }

    /// `false` once a DNS failure has switched the session to the fixed address.
    pub fn uses_dns(&self) -> bool {
        self.use_dns
    }

    pub fn set_timeout(&mut self, value: Duration) {
        self.timeout = value;
    }

    pub fn set_max_response_len(&mut self, value: usize) {
        self.max_response_len = value;
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    pub fn connector_mut(&mut self) -> &mut C {
        &mut self.connector
    }

    /// Send `GET path` and return the JSON object of the response.
    ///
    /// The connection is closed before this returns, whatever the outcome.
    pub async fn request(&mut self, path: &str) -> Result<String, InvocationError> {
        let mut stream = self.open().await?;

        let request = format!(
            "GET {path} HTTP/1.1\r\nHost: {}\r\nAccept: application/json\r\nConnection: close\r\n\r\n",
            self.endpoint.host,
        );
        let mut framer = JsonFramer::with_limit(self.max_response_len);
        let exchanged = timeout(self.timeout, exchange(&mut stream, request.as_bytes(), &mut framer)).await;
        drop(stream);

        match exchanged {
            Err(_)      => Err(InvocationError::Timeout(self.timeout)),
            Ok(Err(e))  => Err(e),
            Ok(Ok(()))  => Ok(framer.finish()?),
        }
    }

    /// Connect by name (falling back to the fixed address once, permanently)
    /// or by the fixed address directly.
    async fn open(&mut self) -> Result<C::Stream, InvocationError> {
        if self.use_dns {
            let by_name = self.endpoint.by_name();
            match self.connect_bounded(&by_name).await {
                Ok(stream) => {
                    tracing::debug!("[perch] Connected to {by_name}");
                    return Ok(stream);
                }
                Err(e) => tracing::warn!("[perch] {by_name} unreachable ({e}), trying fixed address …"),
            }
        }

        let by_ip = self.endpoint.by_ip();
        let stream = self.connect_bounded(&by_ip).await.map_err(|e| {
            tracing::warn!("[perch] Unable to connect to {by_ip}: {e}");
            InvocationError::Connect(e)
        })?;

        if self.use_dns {
            tracing::info!("[perch] Connected using fixed address {by_ip}; DNS disabled from now on");
            self.use_dns = false;
        } else {
            tracing::debug!("[perch] Connected to {by_ip}");
        }
        Ok(stream)
    }

    async fn connect_bounded(&self, target: &Target) -> io::Result<C::Stream> {
        match timeout(self.timeout, self.connector.connect(target)).await {
            Ok(result) => result,
            Err(_) => Err(io::Error::new(io::ErrorKind::TimedOut, "connect timed out")),
        }
    }
}

/// Write the request, then feed the response into `framer` until it has one
/// complete object or the peer closes.
async fn exchange<S>(stream: &mut S, request: &[u8], framer: &mut JsonFramer) -> Result<(), InvocationError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    stream.write_all(request).await?;
    stream.flush().await?;

    let mut buf = [0u8; 512];
    loop {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            tracing::debug!("[perch] Peer closed after {} body bytes", framer.received());
            return Ok(());
        }
        if let Feed::Complete { .. } = framer.feed(&buf[..n])? {
            return Ok(());
        }
    }
}
