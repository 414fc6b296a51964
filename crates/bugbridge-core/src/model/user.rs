use serde::{Deserialize, Serialize};
use std::fmt;

/// An account known to a tracker.
///
/// `name` is the display name, `username` the login handle (on Bugzilla-style
/// trackers this is the primary email address).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct User {
    pub name: String,
    pub username: String,
    #[serde(default)]
    pub emails: Vec<String>,
}

impl User {
    #[must_use]
    pub fn new(name: impl Into<String>, username: impl Into<String>, emails: Vec<String>) -> Self {
        Self {
            name: name.into(),
            username: username.into(),
            emails,
        }
    }

    /// Primary email address, if any.
    #[must_use]
    pub fn email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    /// Whether `key` names this user by username, display name, or any email.
    #[must_use]
    pub fn matches(&self, key: &str) -> bool {
        self.username == key || self.name == key || self.emails.iter().any(|e| e == key)
    }
}

impl fmt::Display for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.email() {
            Some(email) => write!(f, "{} <{email}>", self.name),
            None => f.write_str(&self.name),
        }
    }
}
