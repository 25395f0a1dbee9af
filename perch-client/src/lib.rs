//! # perch-client
//!
//! Polling Telegram Bot API client for small devices.
//!
//! ## Features
//! - One short-lived HTTPS connection per call, certificate pinned by SHA-1
//!   fingerprint (or full web-PKI validation)
//! - DNS with automatic, sticky fallback to a fixed backend address
//! - Throttled `getUpdates` polling, one update per poll, offset acknowledged
//!   automatically
//! - Typed incoming messages: text, callback queries, locations, contacts
//! - Send messages with reply or inline keyboards, answer callback queries,
//!   remove reply keyboards
//! - Optional `\uXXXX` unescaping of the raw response before decoding
//!
//! ```rust,no_run
//! use perch_client::{Client, Config, IncomingMessage};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let mut client = Client::new(Config::from_env()?)?;
//! loop {
//!     if let IncomingMessage::Text(msg) = client.poll().await {
//!         client.send_message(msg.header.chat.id, &msg.text, None).await?;
//!     }
//! }
//! # }
//! ```

#![deny(unsafe_code)]

mod api;
mod errors;
pub mod keyboard;
pub mod poll;
pub mod tls;
pub mod transport;
pub mod types;
pub mod update;

pub use api::Params;
pub use errors::{ApiError, ConfigError, InvocationError, KeyboardError};
pub use keyboard::{InlineAction, InlineKeyboard, ReplyButton, ReplyKeyboard, ReplyKeyboardRemove, ReplyMarkup};
pub use tls::{Fingerprint, TlsConnector, Verification};
pub use transport::{Connector, Endpoint, HttpSession, Target};
pub use types::{Chat, Contact, Location, User};
pub use update::{CallbackQuery, ContactMessage, IncomingMessage, LocationMessage, MessageHeader, MessageKind, TextMessage};

use std::fmt;
use std::time::Duration;

use serde::de::IgnoredAny;
use tokio::time::Instant;

use api::ApiResponse;
use poll::{DEFAULT_POLL_INTERVAL, PollState};
use transport::DEFAULT_SERVER_TIMEOUT;
use update::RawUpdate;

/// Update kinds requested from `getUpdates`.
const ALLOWED_UPDATES: &str = "message,callback_query";

// ─── Config ───────────────────────────────────────────────────────────────────

/// Configuration for [`Client::new`].
#[derive(Clone)]
pub struct Config {
    /// Bot token as issued by @BotFather.
    pub token:            String,
    /// Resolve the host name first instead of going straight to the fixed address.
    pub use_dns:          bool,
    /// Unescape `\uXXXX` sequences in responses before decoding them.
    pub utf8_decoding:    bool,
    pub fingerprint:      Fingerprint,
    pub verification:     Verification,
    /// Minimum time between two `getUpdates` requests.
    pub poll_interval:    Duration,
    /// Budget for connecting and for receiving one response.
    pub server_timeout:   Duration,
    /// Largest response (headers plus JSON body) accepted, in bytes.
    pub max_response_len: usize,
    pub endpoint:         Endpoint,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token:            String::new(),
            use_dns:          false,
            utf8_decoding:    false,
            fingerprint:      Fingerprint::default(),
            verification:     Verification::default(),
            poll_interval:    DEFAULT_POLL_INTERVAL,
            server_timeout:   DEFAULT_SERVER_TIMEOUT,
            max_response_len: perch_codec::framer::DEFAULT_MAX_LEN,
            endpoint:         Endpoint::default(),
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("token", &if self.token.is_empty() { "" } else { "<redacted>" })
            .field("use_dns", &self.use_dns)
            .field("utf8_decoding", &self.utf8_decoding)
            .field("fingerprint", &self.fingerprint)
            .field("verification", &self.verification)
            .field("poll_interval", &self.poll_interval)
            .field("server_timeout", &self.server_timeout)
            .field("max_response_len", &self.max_response_len)
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

impl Config {
    /// Read the configuration from `PERCH_*` environment variables.
    ///
    /// | Variable | Meaning |
    /// |----------|---------|
    /// | `PERCH_BOT_TOKEN` | bot token (required) |
    /// | `PERCH_USE_DNS` | `true`/`false` |
    /// | `PERCH_UTF8` | `true`/`false` |
    /// | `PERCH_FINGERPRINT` | 40 hex digits, `:` or space separated allowed |
    /// | `PERCH_VERIFY` | `fingerprint` or `webpki` |
    /// | `PERCH_POLL_INTERVAL_MS` | milliseconds |
    /// | `PERCH_SERVER_TIMEOUT_MS` | milliseconds |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// [`Self::from_env`] with a custom variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut config = Config {
            token: get("PERCH_BOT_TOKEN").ok_or(ConfigError::MissingToken)?,
            ..Config::default()
        };
        if let Some(v) = get("PERCH_USE_DNS") {
            config.use_dns = parse_bool("PERCH_USE_DNS", &v)?;
        }
        if let Some(v) = get("PERCH_UTF8") {
            config.utf8_decoding = parse_bool("PERCH_UTF8", &v)?;
        }
        if let Some(v) = get("PERCH_FINGERPRINT") {
            config.fingerprint = v.parse()?;
        }
        if let Some(v) = get("PERCH_VERIFY") {
            config.verification = match v.to_ascii_lowercase().as_str() {
                "fingerprint" => Verification::Fingerprint,
                "webpki"      => Verification::WebPki,
                _ => return Err(invalid("PERCH_VERIFY", format!("expected fingerprint or webpki, got {v:?}"))),
            };
        }
        if let Some(v) = get("PERCH_POLL_INTERVAL_MS") {
            config.poll_interval = parse_millis("PERCH_POLL_INTERVAL_MS", &v)?;
        }
        if let Some(v) = get("PERCH_SERVER_TIMEOUT_MS") {
            config.server_timeout = parse_millis("PERCH_SERVER_TIMEOUT_MS", &v)?;
        }
        Ok(config)
    }
}

fn invalid(key: &'static str, reason: String) -> ConfigError {
    ConfigError::Invalid { key, reason }
}

fn parse_bool(key: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on"  => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(key, format!("expected a boolean, got {value:?}"))),
    }
}

fn parse_millis(key: &'static str, value: &str) -> Result<Duration, ConfigError> {
    value.parse::<u64>()
        .map(Duration::from_millis)
        .map_err(|e| invalid(key, e.to_string()))
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// A Bot API session.
///
/// Every call takes `&mut self`: a session has at most one request in flight.
pub struct Client<C = TlsConnector> {
    token:         String,
    http:          HttpSession<C>,
    poll:          PollState,
    utf8_decoding: bool,
}

impl Client<TlsConnector> {
    /// Build a client that talks TLS to the configured endpoint.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        let connector = TlsConnector::new(&config.endpoint.host, config.verification, config.fingerprint)?;
        Ok(Self::with_connector(config, connector))
    }

    /// Pin a new certificate fingerprint.
    pub fn set_fingerprint(&mut self, fingerprint: Fingerprint) -> Result<(), ConfigError> {
        self.http.connector_mut().set_fingerprint(fingerprint)
    }

    pub fn fingerprint(&self) -> Fingerprint {
        self.http.connector().fingerprint()
    }
}

impl<C: Connector> Client<C> {
    /// Build a client on top of any [`Connector`].
    pub fn with_connector(config: Config, connector: C) -> Self {
        let mut http = HttpSession::new(connector, config.endpoint);
        http.set_use_dns(config.use_dns);
        http.set_timeout(config.server_timeout);
        http.set_max_response_len(config.max_response_len);
        Self {
            token:         config.token,
            http,
            poll:          PollState::new(config.poll_interval),
            utf8_decoding: config.utf8_decoding,
        }
    }

    // ── Settings ───────────────────────────────────────────────────────────

    pub fn set_token(&mut self, token: impl Into<String>) {
        self.token = token.into();
    }

    /// Prefer DNS resolution (`true`) or the fixed address (`false`).
    pub fn use_dns(&mut self, value: bool) {
        self.http.set_use_dns(value);
    }

    /// `false` when DNS is off, including after a failed lookup switched it off.
    pub fn uses_dns(&self) -> bool {
        self.http.uses_dns()
    }

    pub fn enable_utf8_decoding(&mut self, value: bool) {
        self.utf8_decoding = value;
    }

    pub fn set_poll_interval(&mut self, interval: Duration) {
        self.poll.set_interval(interval);
    }

    /// Next update id that [`Self::poll`] will request.
    pub fn update_offset(&self) -> i64 {
        self.poll.offset()
    }

    /// Skip ahead, e.g. past a backlog collected while the device was off.
    /// An offset below the current one is ignored.
    pub fn set_update_offset(&mut self, offset: i64) {
        self.poll.set_offset(offset);
    }

    pub fn connector(&self) -> &C {
        self.http.connector()
    }

    // ── Identity ───────────────────────────────────────────────────────────

    /// Fetch the bot's own account.
    pub async fn get_me(&mut self) -> Result<User, InvocationError> {
        let body = self.invoke("getMe", &Params::new()).await?;
        ApiResponse::<User>::parse(&body)?.into_result()
    }

    /// `true` if the backend is reachable and accepts the token.
    pub async fn test_connection(&mut self) -> bool {
        match self.get_me().await {
            Ok(me) => {
                tracing::info!("[perch] Connected as {} (id {})", me.display_name(), me.id);
                true
            }
            Err(e) => {
                tracing::warn!("[perch] Connection test failed: {e}");
                false
            }
        }
    }

    // ── Updates ────────────────────────────────────────────────────────────

    /// Fetch at most one new update.
    ///
    /// Returns `Ok(NoData)` without any network traffic while the poll
    /// interval has not elapsed since the previous request.
    pub async fn try_poll(&mut self) -> Result<IncomingMessage, InvocationError> {
        let now = Instant::now();
        if !self.poll.ready(now) {
            return Ok(IncomingMessage::NoData);
        }
        self.poll.mark_polled(now);

        let mut params = Params::new()
            .raw("limit", 1)
            .raw("allowed_updates", ALLOWED_UPDATES);
        if let Some(offset) = self.poll.offset_param() {
            params = params.raw("offset", offset);
        }

        let body = self.invoke("getUpdates", &params).await?;
        let body = if self.utf8_decoding { perch_codec::unicode::decode_json(&body) } else { body };
        let updates = ApiResponse::<Vec<RawUpdate>>::parse(&body)?.into_result()?;

        let Some(update) = updates.into_iter().next() else {
            return Ok(IncomingMessage::NoData);
        };
        let update_id = update.update_id;
        if !self.poll.advance(update_id) {
            return Ok(IncomingMessage::NoData);
        }
        let message = update.classify();
        tracing::debug!("[perch] Update {update_id} → {:?}", message.kind());
        Ok(message)
    }

    /// [`Self::try_poll`] that logs failures and reports them as `NoData`.
    pub async fn poll(&mut self) -> IncomingMessage {
        match self.try_poll().await {
            Ok(message) => message,
            Err(e) => {
                tracing::warn!("[perch] getUpdates failed: {e}");
                IncomingMessage::NoData
            }
        }
    }

    // ── Messages ───────────────────────────────────────────────────────────

    /// Send `text` to `chat_id`, optionally with a `reply_markup` JSON object.
    ///
    /// An empty `text` is rejected before anything is sent.
    pub async fn send_message(
        &mut self,
        chat_id: i64,
        text:    &str,
        markup:  Option<&str>,
    ) -> Result<(), InvocationError> {
        if text.is_empty() {
            return Err(InvocationError::Validation("message text is empty"));
        }
        let mut params = Params::new()
            .raw("chat_id", chat_id)
            .encoded("text", text);
        if let Some(markup) = markup.filter(|m| !m.is_empty()) {
            params = params.encoded("reply_markup", markup);
        }
        let body = self.invoke("sendMessage", &params).await?;
        ApiResponse::<IgnoredAny>::check(&body)
    }

    /// Send `text` with a reply or inline keyboard.
    pub async fn send_with_keyboard(
        &mut self,
        chat_id:  i64,
        text:     &str,
        keyboard: &impl ReplyMarkup,
    ) -> Result<(), InvocationError> {
        let markup = keyboard.to_json();
        self.send_message(chat_id, text, Some(&markup)).await
    }

    /// Send `text` and hide the current reply keyboard.
    pub async fn remove_reply_keyboard(
        &mut self,
        chat_id:   i64,
        text:      &str,
        selective: bool,
    ) -> Result<(), InvocationError> {
        self.send_with_keyboard(chat_id, text, &ReplyKeyboardRemove { selective }).await
    }

    // ── Callback queries ───────────────────────────────────────────────────

    /// Acknowledge a callback query, optionally with a toast or alert text.
    ///
    /// `alert` only has an effect together with a non-empty `text`.
    pub async fn answer_callback_query(
        &mut self,
        query_id: &str,
        text:     Option<&str>,
        alert:    bool,
    ) -> Result<(), InvocationError> {
        if query_id.is_empty() {
            return Err(InvocationError::Validation("callback query id is empty"));
        }
        let mut params = Params::new().encoded("callback_query_id", query_id);
        if let Some(text) = text.filter(|t| !t.is_empty()) {
            params = params.encoded("text", text).raw("show_alert", alert);
        }
        let body = self.invoke("answerCallbackQuery", &params).await?;
        ApiResponse::<IgnoredAny>::check(&body)
    }

    // ── Internals ──────────────────────────────────────────────────────────

    async fn invoke(&mut self, method: &str, params: &Params) -> Result<String, InvocationError> {
        if self.token.is_empty() {
            return Err(InvocationError::Validation("bot token is empty"));
        }
        tracing::debug!("[perch] → {method}");
        let path = format!("/bot{}/{method}{params}", self.token);
        let body = self.http.request(&path).await?;
        tracing::trace!("[perch] ← {method}: {body}");
        Ok(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |k: &str| map.get(k).cloned()
    }

    #[test]
    fn config_defaults() {
        let c = Config::default();
        assert!(!c.use_dns);
        assert!(!c.utf8_decoding);
        assert_eq!(c.poll_interval, Duration::from_millis(2000));
        assert_eq!(c.server_timeout, Duration::from_millis(5000));
        assert_eq!(c.endpoint.host, "api.telegram.org");
        assert_eq!(c.endpoint.fixed_ip.to_string(), "149.154.167.220");
        assert_eq!(c.endpoint.port, 443);
    }

    #[test]
    fn config_from_lookup() {
        let c = Config::from_lookup(lookup(&[
            ("PERCH_BOT_TOKEN", "123:abc"),
            ("PERCH_USE_DNS", "yes"),
            ("PERCH_UTF8", "1"),
            ("PERCH_VERIFY", "WebPKI"),
            ("PERCH_POLL_INTERVAL_MS", "500"),
        ])).unwrap();
        assert_eq!(c.token, "123:abc");
        assert!(c.use_dns);
        assert!(c.utf8_decoding);
        assert_eq!(c.verification, Verification::WebPki);
        assert_eq!(c.poll_interval, Duration::from_millis(500));
    }

    #[test]
    fn config_errors() {
        assert!(matches!(Config::from_lookup(lookup(&[])), Err(ConfigError::MissingToken)));
        assert!(matches!(Config::from_lookup(lookup(&[("PERCH_BOT_TOKEN", "  ")])), Err(ConfigError::MissingToken)));
        let err = Config::from_lookup(lookup(&[("PERCH_BOT_TOKEN", "t"), ("PERCH_USE_DNS", "maybe")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PERCH_USE_DNS", .. }));
        let err = Config::from_lookup(lookup(&[("PERCH_BOT_TOKEN", "t"), ("PERCH_POLL_INTERVAL_MS", "-1")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "PERCH_POLL_INTERVAL_MS", .. }));
        let err = Config::from_lookup(lookup(&[("PERCH_BOT_TOKEN", "t"), ("PERCH_FINGERPRINT", "00")])).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { key: "fingerprint", .. }));
    }

    #[test]
    fn debug_redacts_token() {
        let c = Config { token: "123:secret".into(), ..Config::default() };
        let shown = format!("{c:?}");
        assert!(!shown.contains("secret"));
        assert!(shown.contains("<redacted>"));
    }
}
