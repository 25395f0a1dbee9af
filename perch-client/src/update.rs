//! Incoming messages delivered by [`crate::Client::poll`].
//!
//! Every update the backend returns is classified into exactly one variant of
//! [`IncomingMessage`]. When an update carries several payloads, the first
//! match in this order wins: callback query, location, contact, text.

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::transport::Connector;
use crate::types::{Chat, Contact, Location, User};
use crate::{Client, InvocationError as Error};

// ─── MessageHeader ───────────────────────────────────────────────────────────

/// Fields shared by every chat message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MessageHeader {
    pub message_id: i64,
    pub sender:     User,
    pub chat:       Chat,
    /// Unix timestamp.
    pub date:       i64,
}

impl MessageHeader {
    /// [`Self::date`] as a UTC timestamp.
    pub fn date_time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date, 0)
    }
}

// ─── Variants ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug, Default, PartialEq)]
pub struct TextMessage {
    pub header: MessageHeader,
    pub text:   String,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocationMessage {
    pub header:   MessageHeader,
    pub location: Location,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ContactMessage {
    pub header:  MessageHeader,
    pub contact: Contact,
}

/// A user pressed an inline keyboard button on a bot message.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CallbackQuery {
    /// Query id, needed to answer the query.
    pub id:            String,
    pub sender:        User,
    /// The bot message that carried the keyboard.
    pub message_id:    i64,
    pub message_text:  String,
    /// Date of the bot message.
    pub date:          i64,
    /// Chat of the bot message, when the backend includes it.
    pub chat:          Option<Chat>,
    pub chat_instance: String,
    /// The button's callback data.
    pub data:          String,
}

impl CallbackQuery {
    /// Stop the loading indicator on the user's client.
    pub async fn answer<C: Connector>(&self, client: &mut Client<C>, text: Option<&str>) -> Result<(), Error> {
        client.answer_callback_query(&self.id, text, false).await
    }

    /// Answer with a popup alert instead of a toast.
    pub async fn answer_alert<C: Connector>(&self, client: &mut Client<C>, text: &str) -> Result<(), Error> {
        client.answer_callback_query(&self.id, Some(text), true).await
    }
}

// ─── IncomingMessage ─────────────────────────────────────────────────────────

/// Which variant an [`IncomingMessage`] is, without its payload.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MessageKind {
    NoData,
    Text,
    Query,
    Location,
    Contact,
}

/// Result of one poll.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum IncomingMessage {
    /// Nothing new, throttled, or the poll failed.
    #[default]
    NoData,
    Text(TextMessage),
    Query(CallbackQuery),
    Location(LocationMessage),
    Contact(ContactMessage),
}

impl IncomingMessage {
    pub fn kind(&self) -> MessageKind {
        match self {
            Self::NoData      => MessageKind::NoData,
            Self::Text(_)     => MessageKind::Text,
            Self::Query(_)    => MessageKind::Query,
            Self::Location(_) => MessageKind::Location,
            Self::Contact(_)  => MessageKind::Contact,
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, Self::NoData)
    }

    /// Who sent the message or pressed the button.
    pub fn sender(&self) -> Option<&User> {
        match self {
            Self::NoData      => None,
            Self::Text(m)     => Some(&m.header.sender),
            Self::Query(q)    => Some(&q.sender),
            Self::Location(m) => Some(&m.header.sender),
            Self::Contact(m)  => Some(&m.header.sender),
        }
    }

    /// Chat to reply into. For queries this is the chat of the bot message,
    /// falling back to the pressing user's private chat.
    pub fn chat_id(&self) -> Option<i64> {
        match self {
            Self::NoData      => None,
            Self::Text(m)     => Some(m.header.chat.id),
            Self::Query(q)    => Some(q.chat.as_ref().map_or(q.sender.id, |c| c.id)),
            Self::Location(m) => Some(m.header.chat.id),
            Self::Contact(m)  => Some(m.header.chat.id),
        }
    }

    /// Message text, or the callback data for queries.
    pub fn text(&self) -> Option<&str> {
        match self {
            Self::Text(m)  => Some(&m.text),
            Self::Query(q) => Some(&q.data),
            _ => None,
        }
    }
}

// ─── Raw wire shapes ─────────────────────────────────────────────────────────

/// One element of `getUpdates`' `result` array.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct RawUpdate {
    #[serde(default)]
    pub update_id:  i64,
    message:        Option<RawMessage>,
    callback_query: Option<RawCallbackQuery>,
}

#[derive(Debug, Default, Deserialize)]
struct RawMessage {
    #[serde(default)]
    message_id: i64,
    from:       Option<User>,
    chat:       Option<Chat>,
    #[serde(default)]
    date:       i64,
    text:       Option<String>,
    location:   Option<Location>,
    contact:    Option<Contact>,
}

#[derive(Debug, Default, Deserialize)]
struct RawCallbackQuery {
    #[serde(default)]
    id:            String,
    from:          Option<User>,
    message:       Option<RawMessage>,
    #[serde(default)]
    chat_instance: String,
    #[serde(default)]
    data:          String,
}

impl RawUpdate {
    /// Map the update onto a single [`IncomingMessage`] variant.
    ///
    /// Updates of any other kind (edited messages, photos, …) give `NoData`.
    pub(crate) fn classify(self) -> IncomingMessage {
        if let Some(q) = self.callback_query.filter(|q| !q.id.is_empty()) {
            let message = q.message.unwrap_or_default();
            return IncomingMessage::Query(CallbackQuery {
                id:            q.id,
                sender:        q.from.unwrap_or_default(),
                message_id:    message.message_id,
                message_text:  message.text.unwrap_or_default(),
                date:          message.date,
                chat:          message.chat,
                chat_instance: q.chat_instance,
                data:          q.data,
            });
        }

        let Some(m) = self.message.filter(|m| m.message_id != 0) else {
            return IncomingMessage::NoData;
        };
        let header = MessageHeader {
            message_id: m.message_id,
            sender:     m.from.unwrap_or_default(),
            chat:       m.chat.unwrap_or_default(),
            date:       m.date,
        };

        if let Some(location) = m.location {
            IncomingMessage::Location(LocationMessage { header, location })
        } else if let Some(contact) = m.contact {
            IncomingMessage::Contact(ContactMessage { header, contact })
        } else if let Some(text) = m.text {
            IncomingMessage::Text(TextMessage { header, text })
        } else {
            IncomingMessage::NoData
        }
    }
}
