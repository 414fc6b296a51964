//! Immutable comment values attached to an issue.

use chrono::DateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use super::user::User;
use crate::error::{Result, TrackerError};

/// A single comment: author, epoch-seconds timestamp and text.
///
/// Every part is optional because trackers hand back partial records
/// (system comments without an author, imported text without a time).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Comment {
    user: Option<User>,
    timestamp: Option<u64>,
    content: Option<String>,
}

impl Comment {
    /// Build a comment from typed parts.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] when `timestamp` is negative.
    pub fn new(user: Option<User>, timestamp: Option<i64>, content: Option<String>) -> Result<Self> {
        let timestamp = timestamp
            .map(|ts| {
                u64::try_from(ts).map_err(|_| {
                    TrackerError::Validation(format!(
                        "expected 'timestamp' to be a non-negative integer, got '{ts}'"
                    ))
                })
            })
            .transpose()?;
        Ok(Self {
            user,
            timestamp,
            content,
        })
    }

    /// Build a comment from untyped wire values.
    ///
    /// Digit-only strings are accepted as timestamps. `null` counts as absent.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] when the timestamp is not a
    /// non-negative integer or the content is not a string.
    pub fn from_wire(
        user: Option<User>,
        timestamp: Option<&Value>,
        content: Option<&Value>,
    ) -> Result<Self> {
        let timestamp = match timestamp {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if !s.is_empty() && s.bytes().all(|b| b.is_ascii_digit()) => {
                Some(s.parse::<u64>().map_err(|e| {
                    TrackerError::Validation(format!("timestamp '{s}' out of range: {e}"))
                })?)
            }
            Some(Value::Number(n)) if n.as_u64().is_some() => n.as_u64(),
            Some(other) => {
                return Err(TrackerError::Validation(format!(
                    "expected 'timestamp' to be of type int, got '{other}'"
                )));
            }
        };

        let content = match content {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) => Some(s.clone()),
            Some(other) => {
                return Err(TrackerError::Validation(format!(
                    "expected 'content' to be a string, got '{other}'"
                )));
            }
        };

        Ok(Self {
            user,
            timestamp,
            content,
        })
    }

    #[must_use]
    pub const fn user(&self) -> Option<&User> {
        self.user.as_ref()
    }

    #[must_use]
    pub const fn timestamp(&self) -> Option<u64> {
        self.timestamp
    }

    #[must_use]
    pub fn content(&self) -> Option<&str> {
        self.content.as_deref()
    }
}

impl fmt::Display for Comment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let user = self
            .user
            .as_ref()
            .map_or_else(|| "-".to_string(), ToString::to_string);
        let when = self
            .timestamp
            .and_then(|ts| i64::try_from(ts).ok())
            .and_then(|ts| DateTime::from_timestamp(ts, 0))
            .map_or_else(|| "-".to_string(), |dt| dt.to_rfc3339());
        write!(f, "({user} @ {when}) {}", self.content.as_deref().unwrap_or(""))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn digit_strings_coerce_to_timestamps() {
        let c = Comment::from_wire(None, Some(&json!("1639510960")), Some(&json!("hi"))).unwrap();
        assert_eq!(c.timestamp(), Some(1_639_510_960));
        assert_eq!(c.content(), Some("hi"));
    }

    #[test]
    fn rejects_non_integer_timestamp() {
        let err = Comment::from_wire(None, Some(&json!("yesterday")), None).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));

        let err = Comment::from_wire(None, Some(&json!(1.5)), None).unwrap_err();
        assert!(matches!(err, TrackerError::Validation(_)));
    }

    #[test]
    fn rejects_negative_timestamp() {
        assert!(Comment::new(None, Some(-1), None).is_err());
        assert!(Comment::from_wire(None, Some(&json!(-30)), None).is_err());
    }

    #[test]
    fn rejects_non_text_content() {
        let err = Comment::from_wire(None, None, Some(&json!(["a"]))).unwrap_err();
        assert!(err.to_string().contains("content"));
    }

    #[test]
    fn null_parts_are_absent() {
        let c = Comment::from_wire(None, Some(&Value::Null), Some(&Value::Null)).unwrap();
        assert_eq!(c.timestamp(), None);
        assert_eq!(c.content(), None);
    }

    #[test]
    fn display_renders_utc_time() {
        let user = User::new("Tim", "tim@example.com", vec!["tim@example.com".into()]);
        let c = Comment::new(Some(user), Some(0), Some("first".into())).unwrap();
        assert_eq!(
            c.to_string(),
            "(Tim <tim@example.com> @ 1970-01-01T00:00:00+00:00) first"
        );
        let anon = Comment::new(None, None, None).unwrap();
        assert_eq!(anon.to_string(), "(- @ -) ");
    }
}
