//! Reply and inline keyboard builders.
//!
//! Both builders accumulate rows of buttons and render the JSON markup that
//! goes into a message's `reply_markup` parameter. Rendering is repeatable and
//! never changes the builder.
//!
//! ```rust
//! use perch_client::keyboard::{InlineAction, InlineKeyboard, ReplyMarkup};
//!
//! let mut kb = InlineKeyboard::new();
//! kb.add_button("On", InlineAction::CallbackData("ON".into()))?
//!   .add_button("Off", InlineAction::CallbackData("OFF".into()))?;
//! kb.add_row();
//! kb.add_button("Docs", InlineAction::Url("https://core.telegram.org/bots".into()))?;
//! assert!(kb.to_json().starts_with(r#"{"inline_keyboard":[[{"text":"On""#));
//! # Ok::<(), perch_client::KeyboardError>(())
//! ```

use serde::Serialize;

use crate::errors::KeyboardError;

/// Longest callback data the backend accepts, in bytes.
pub const MAX_CALLBACK_DATA: usize = 64;

/// Anything that renders to a `reply_markup` JSON object.
pub trait ReplyMarkup {
    fn to_json(&self) -> String;

    /// Indented rendering, for logs and debugging.
    fn to_json_pretty(&self) -> String;
}

fn is_false(b: &bool) -> bool {
    !*b
}

// Plain structs with string keys always serialize.
fn render<T: Serialize>(value: &T, pretty: bool) -> String {
    let out = if pretty { serde_json::to_string_pretty(value) } else { serde_json::to_string(value) };
    out.unwrap_or_default()
}

/// Rows as stored, minus the empty ones.
fn non_empty<T>(rows: &[Vec<T>]) -> Vec<&[T]> {
    rows.iter().filter(|r| !r.is_empty()).map(Vec::as_slice).collect()
}

/// Push onto the current row, opening the first row if needed.
fn push_button<T>(rows: &mut Vec<Vec<T>>, button: T) {
    match rows.last_mut() {
        Some(row) => row.push(button),
        None      => rows.push(vec![button]),
    }
}

/// Start a new row unless the current one is still empty.
fn open_row<T>(rows: &mut Vec<Vec<T>>) {
    if rows.last().is_some_and(|r| !r.is_empty()) {
        rows.push(Vec::new());
    }
}

// ─── ReplyKeyboard ────────────────────────────────────────────────────────────

/// What pressing a reply keyboard button sends.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReplyButton {
    /// The label, as a text message.
    #[default]
    Text,
    /// The user's phone contact.
    RequestContact,
    /// The user's current location.
    RequestLocation,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct KeyboardButton {
    text: String,
    #[serde(skip_serializing_if = "is_false")]
    request_contact: bool,
    #[serde(skip_serializing_if = "is_false")]
    request_location: bool,
}

/// A custom keyboard that replaces the user's system keyboard.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReplyKeyboard {
    rows:      Vec<Vec<KeyboardButton>>,
    resize:    bool,
    one_time:  bool,
    selective: bool,
}

#[derive(Serialize)]
struct ReplyKeyboardMarkup<'a> {
    keyboard: Vec<&'a [KeyboardButton]>,
    #[serde(skip_serializing_if = "is_false")]
    resize_keyboard: bool,
    #[serde(skip_serializing_if = "is_false")]
    one_time_keyboard: bool,
    #[serde(skip_serializing_if = "is_false")]
    selective: bool,
}

impl ReplyKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self) -> &mut Self {
        open_row(&mut self.rows);
        self
    }

    pub fn add_button(&mut self, label: impl Into<String>, kind: ReplyButton) -> Result<&mut Self, KeyboardError> {
        let text = label.into();
        if text.is_empty() {
            return Err(KeyboardError::EmptyLabel);
        }
        push_button(&mut self.rows, KeyboardButton {
            text,
            request_contact:  kind == ReplyButton::RequestContact,
            request_location: kind == ReplyButton::RequestLocation,
        });
        Ok(self)
    }

    /// Let clients shrink the keyboard to fit its buttons.
    pub fn enable_resize(&mut self) -> &mut Self {
        self.resize = true;
        self
    }

    /// Hide the keyboard after one press.
    pub fn enable_one_time(&mut self) -> &mut Self {
        self.one_time = true;
        self
    }

    /// Show the keyboard only to mentioned users or the replied-to sender.
    pub fn enable_selective(&mut self) -> &mut Self {
        self.selective = true;
        self
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    fn markup(&self) -> ReplyKeyboardMarkup<'_> {
        ReplyKeyboardMarkup {
            keyboard:          non_empty(&self.rows),
            resize_keyboard:   self.resize,
            one_time_keyboard: self.one_time,
            selective:         self.selective,
        }
    }
}

impl ReplyMarkup for ReplyKeyboard {
    fn to_json(&self) -> String { render(&self.markup(), false) }
    fn to_json_pretty(&self) -> String { render(&self.markup(), true) }
}

// ─── InlineKeyboard ───────────────────────────────────────────────────────────

/// What pressing an inline button does.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InlineAction {
    /// Send a callback query carrying this data (1-64 bytes).
    CallbackData(String),
    /// Open a URL.
    Url(String),
    /// Prompt the user to pick a chat and start an inline query there.
    SwitchInlineQuery(String),
    /// Start an inline query in the current chat.
    SwitchInlineQueryCurrentChat(String),
}

impl InlineAction {
    fn validate(&self) -> Result<(), KeyboardError> {
        match self {
            Self::CallbackData(d) if d.is_empty() => Err(KeyboardError::EmptyAction),
            Self::CallbackData(d) if d.len() > MAX_CALLBACK_DATA => Err(KeyboardError::CallbackDataTooLong(d.len())),
            Self::Url(u) if u.is_empty() => Err(KeyboardError::EmptyAction),
            _ => Ok(()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
struct InlineButton {
    text: String,
    #[serde(flatten)]
    action: InlineAction,
}

/// Buttons attached below a message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct InlineKeyboard {
    rows: Vec<Vec<InlineButton>>,
}

#[derive(Serialize)]
struct InlineKeyboardMarkup<'a> {
    inline_keyboard: Vec<&'a [InlineButton]>,
}

impl InlineKeyboard {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_row(&mut self) -> &mut Self {
        open_row(&mut self.rows);
        self
    }

    pub fn add_button(&mut self, label: impl Into<String>, action: InlineAction) -> Result<&mut Self, KeyboardError> {
        let text = label.into();
        if text.is_empty() {
            return Err(KeyboardError::EmptyLabel);
        }
        action.validate()?;
        push_button(&mut self.rows, InlineButton { text, action });
        Ok(self)
    }

    /// Shorthand for a [`InlineAction::CallbackData`] button.
    pub fn add_callback_button(&mut self, label: impl Into<String>, data: impl Into<String>) -> Result<&mut Self, KeyboardError> {
        self.add_button(label, InlineAction::CallbackData(data.into()))
    }

    /// Shorthand for a [`InlineAction::Url`] button.
    pub fn add_url_button(&mut self, label: impl Into<String>, url: impl Into<String>) -> Result<&mut Self, KeyboardError> {
        self.add_button(label, InlineAction::Url(url.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.rows.iter().all(Vec::is_empty)
    }

    fn markup(&self) -> InlineKeyboardMarkup<'_> {
        InlineKeyboardMarkup { inline_keyboard: non_empty(&self.rows) }
    }
}

impl ReplyMarkup for InlineKeyboard {
    fn to_json(&self) -> String { render(&self.markup(), false) }
    fn to_json_pretty(&self) -> String { render(&self.markup(), true) }
}

// ─── ReplyKeyboardRemove ──────────────────────────────────────────────────────

/// Hides a previously sent [`ReplyKeyboard`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReplyKeyboardRemove {
    #[serde(skip_serializing_if = "is_false")]
    pub selective: bool,
}

#[derive(Serialize)]
struct RemoveMarkup {
    remove_keyboard: bool,
    #[serde(flatten)]
    inner: ReplyKeyboardRemove,
}

impl ReplyMarkup for ReplyKeyboardRemove {
    fn to_json(&self) -> String {
        render(&RemoveMarkup { remove_keyboard: true, inner: *self }, false)
    }

    fn to_json_pretty(&self) -> String {
        render(&RemoveMarkup { remove_keyboard: true, inner: *self }, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reply_keyboard_layout_and_flags() {
        let mut kb = ReplyKeyboard::new();
        kb.add_button("Hi", ReplyButton::Text).unwrap();
        kb.add_row();
        kb.add_button("Phone", ReplyButton::RequestContact).unwrap()
          .add_button("Where", ReplyButton::RequestLocation).unwrap();
        kb.enable_resize().enable_one_time();
        assert_eq!(
            kb.to_json(),
            r#"{"keyboard":[[{"text":"Hi"}],[{"text":"Phone","request_contact":true},{"text":"Where","request_location":true}]],"resize_keyboard":true,"one_time_keyboard":true}"#
        );
    }

    #[test]
    fn flags_are_omitted_when_unset() {
        let mut kb = ReplyKeyboard::new();
        kb.add_button("A", ReplyButton::Text).unwrap();
        assert_eq!(kb.to_json(), r#"{"keyboard":[[{"text":"A"}]]}"#);
        kb.enable_selective();
        assert_eq!(kb.to_json(), r#"{"keyboard":[[{"text":"A"}]],"selective":true}"#);
    }

    #[test]
    fn add_row_on_empty_row_is_noop() {
        let mut kb = InlineKeyboard::new();
        kb.add_row().add_row();
        kb.add_callback_button("A", "a").unwrap();
        kb.add_row().add_row();
        kb.add_callback_button("B", "b").unwrap();
        kb.add_row();
        assert_eq!(
            kb.to_json(),
            r#"{"inline_keyboard":[[{"text":"A","callback_data":"a"}],[{"text":"B","callback_data":"b"}]]}"#
        );
    }

    #[test]
    fn inline_actions_render_their_key() {
        let mut kb = InlineKeyboard::new();
        kb.add_url_button("Site", "https://example.org").unwrap()
          .add_button("Share", InlineAction::SwitchInlineQuery(String::new())).unwrap()
          .add_button("Here", InlineAction::SwitchInlineQueryCurrentChat("q".into())).unwrap();
        assert_eq!(
            kb.to_json(),
            r#"{"inline_keyboard":[[{"text":"Site","url":"https://example.org"},{"text":"Share","switch_inline_query":""},{"text":"Here","switch_inline_query_current_chat":"q"}]]}"#
        );
    }

    #[test]
    fn rendering_is_repeatable() {
        let mut kb = InlineKeyboard::new();
        kb.add_callback_button("A", "a").unwrap();
        let first = kb.to_json();
        assert_eq!(kb.to_json(), first);
        assert!(kb.to_json_pretty().contains("\n"));
        assert_eq!(kb.to_json(), first);
    }

    #[test]
    fn invalid_buttons_are_rejected() {
        let mut kb = InlineKeyboard::new();
        assert_eq!(kb.add_callback_button("", "a").unwrap_err(), KeyboardError::EmptyLabel);
        assert_eq!(kb.add_callback_button("A", "").unwrap_err(), KeyboardError::EmptyAction);
        assert_eq!(kb.add_url_button("A", "").unwrap_err(), KeyboardError::EmptyAction);
        assert_eq!(kb.add_callback_button("A", "x".repeat(65)).unwrap_err(), KeyboardError::CallbackDataTooLong(65));
        assert!(kb.add_callback_button("A", "x".repeat(64)).is_ok());
        assert_eq!(ReplyKeyboard::new().add_button("", ReplyButton::Text).unwrap_err(), KeyboardError::EmptyLabel);
    }

    #[test]
    fn empty_keyboards_render_empty_rows() {
        assert_eq!(ReplyKeyboard::new().to_json(), r#"{"keyboard":[]}"#);
        assert_eq!(InlineKeyboard::new().to_json(), r#"{"inline_keyboard":[]}"#);
        assert!(InlineKeyboard::new().is_empty());
    }

    #[test]
    fn remove_keyboard_payload() {
        assert_eq!(ReplyKeyboardRemove { selective: true }.to_json(), r#"{"remove_keyboard":true,"selective":true}"#);
        assert_eq!(ReplyKeyboardRemove::default().to_json(), r#"{"remove_keyboard":true}"#);
    }
}
