//! Plain records decoded from Bot API responses.

use serde::Deserialize;

/// A user or bot account.
///
/// Also the "bot identity" returned by [`crate::Client::get_me`].
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct User {
    #[serde(default)]
    pub id:            i64,
    #[serde(default)]
    pub is_bot:        bool,
    #[serde(default)]
    pub first_name:    String,
    pub last_name:     Option<String>,
    pub username:      Option<String>,
    pub language_code: Option<String>,
}

impl User {
    /// `@username` if set, otherwise the first (and last) name.
    pub fn display_name(&self) -> String {
        if let Some(u) = &self.username {
            return format!("@{u}");
        }
        match &self.last_name {
            Some(last) => format!("{} {last}", self.first_name),
            None => self.first_name.clone(),
        }
    }
}

/// The private chat, group or channel a message belongs to.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Chat {
    #[serde(default)]
    pub id:         i64,
    /// `private`, `group`, `supergroup` or `channel`.
    #[serde(rename = "type", default)]
    pub kind:       String,
    /// Group or channel title.
    pub title:      Option<String>,
    pub username:   Option<String>,
    pub first_name: Option<String>,
    pub last_name:  Option<String>,
}

/// A point shared with the bot.
#[derive(Clone, Copy, Debug, Default, PartialEq, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude:  f64,
}

/// A phone contact shared with the bot.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
pub struct Contact {
    #[serde(default)]
    pub phone_number: String,
    #[serde(default)]
    pub first_name:   String,
    pub last_name:    Option<String>,
    /// Set when the contact is a registered user.
    pub user_id:      Option<i64>,
    pub vcard:        Option<String>,
}
