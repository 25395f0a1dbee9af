//! Bot API wire format: query parameters and the response envelope.

use std::fmt;

use serde::Deserialize;
use serde::de::{DeserializeOwned, IgnoredAny};

use crate::errors::{ApiError, InvocationError};

// ─── Params ───────────────────────────────────────────────────────────────────

/// Ordered query parameters, rendered as `?k=v&k=v` (nothing when empty).
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Params {
    pairs: Vec<(&'static str, String)>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a value that is already URL-safe (numbers, fixed tokens).
    pub fn raw(mut self, key: &'static str, value: impl fmt::Display) -> Self {
        self.pairs.push((key, value.to_string()));
        self
    }

    /// Append free text, percent-encoded.
    pub fn encoded(mut self, key: &'static str, value: &str) -> Self {
        self.pairs.push((key, urlencoding::encode(value).into_owned()));
        self
    }

    /// The rendered value for `key`, as it goes on the wire.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().find(|(k, _)| *k == key).map(|(_, v)| v.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl fmt::Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (k, v)) in self.pairs.iter().enumerate() {
            f.write_str(if i == 0 { "?" } else { "&" })?;
            write!(f, "{k}={v}")?;
        }
        Ok(())
    }
}

// ─── ApiResponse ──────────────────────────────────────────────────────────────

/// `{"ok":…,"result":…}` or `{"ok":false,"error_code":…,"description":…}`.
#[derive(Debug, Deserialize)]
pub(crate) struct ApiResponse<T> {
    ok:          bool,
    result:      Option<T>,
    description: Option<String>,
    error_code:  Option<i32>,
    parameters:  Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

impl<T: DeserializeOwned> ApiResponse<T> {
    pub(crate) fn parse(body: &str) -> Result<Self, InvocationError> {
        Ok(serde_json::from_str(body)?)
    }

    /// The `result` of a successful call.
    pub(crate) fn into_result(self) -> Result<T, InvocationError> {
        self.error()?;
        self.result.ok_or_else(|| InvocationError::Deserialize("response has no result".into()))
    }

    fn error(&self) -> Result<(), ApiError> {
        if self.ok {
            return Ok(());
        }
        Err(ApiError {
            code:        self.error_code.unwrap_or(0),
            description: self.description.clone().unwrap_or_default(),
            retry_after: self.parameters.as_ref().and_then(|p| p.retry_after),
        })
    }
}

impl ApiResponse<IgnoredAny> {
    /// Succeed iff the backend said `"ok": true`.
    pub(crate) fn check(body: &str) -> Result<(), InvocationError> {
        Ok(Self::parse(body)?.error()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_render_in_order() {
        let p = Params::new().raw("limit", 1).raw("offset", 43);
        assert_eq!(p.to_string(), "?limit=1&offset=43");
        assert_eq!(Params::new().to_string(), "");
    }

    #[test]
    fn encoded_values_are_escaped() {
        let p = Params::new().encoded("text", "a b&c=d?é");
        assert_eq!(p.get("text"), Some("a%20b%26c%3Dd%3F%C3%A9"));
    }

    #[test]
    fn ok_false_becomes_api_error() {
        let body = r#"{"ok":false,"error_code":429,"description":"Too Many Requests","parameters":{"retry_after":3}}"#;
        let err = ApiResponse::<Vec<u8>>::parse(body).unwrap().into_result().unwrap_err();
        assert!(err.is("Too Many*"));
        assert_eq!(err.retry_after(), Some(3));
        assert!(ApiResponse::<IgnoredAny>::check(body).is_err());
    }

    #[test]
    fn check_ignores_result_shape() {
        assert!(ApiResponse::<IgnoredAny>::check(r#"{"ok":true,"result":{"message_id":1}}"#).is_ok());
        assert!(ApiResponse::<IgnoredAny>::check(r#"{"ok":true,"result":true}"#).is_ok());
        assert!(matches!(ApiResponse::<IgnoredAny>::check(r#"{"result":true}"#), Err(InvocationError::Deserialize(_))));
    }

    #[test]
    fn missing_result_is_deserialize_error() {
        let err = ApiResponse::<Vec<u8>>::parse(r#"{"ok":true}"#).unwrap().into_result().unwrap_err();
        assert!(matches!(err, InvocationError::Deserialize(_)));
    }
}
