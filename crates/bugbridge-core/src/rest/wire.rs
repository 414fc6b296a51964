//! JSON bodies of the Bugzilla-style REST protocol.
//!
//! Shared by [`RestTracker`](super::RestTracker), which decodes them, and
//! the reference backend, which encodes them. Every response wraps its
//! payload under a top-level key (`bugs`, `users`, `products`, `fields`,
//! `ids`).

use std::collections::BTreeMap;

use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::model::User;

// ---------------------------------------------------------------------------
// Status vocabulary and time format
// ---------------------------------------------------------------------------

pub const STATUS_REOPENED: &str = "REOPENED";
pub const STATUS_RESOLVED: &str = "RESOLVED";
pub const RESOLUTION_FIXED: &str = "FIXED";
pub const RESOLUTION_DUPLICATE: &str = "DUPLICATE";

/// Statuses that count as open. Anything else is resolved.
pub const OPEN_STATUSES: [&str; 6] = [
    "UNCONFIRMED",
    "NEW",
    "ASSIGNED",
    STATUS_REOPENED,
    "IN_PROGRESS",
    "CONFIRMED",
];

#[must_use]
pub fn is_open_status(status: &str) -> bool {
    OPEN_STATUSES.contains(&status)
}

pub const KEYWORD_IN_RADAR: &str = "InRadar";

/// Error codes carried in rejection bodies.
pub const CODE_BUG_NOT_FOUND: u32 = 101;
pub const CODE_USER_NOT_FOUND: u32 = 51;
pub const CODE_REOPEN_WITHOUT_COMMENT: u32 = 32000;

/// Timestamps are rendered in the server's fixed local time, UTC-7, and
/// labelled `Z` anyway.
pub const SERVER_UTC_OFFSET_SECS: i64 = 7 * 3600;
pub const TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

/// Render epoch seconds the way the server does.
#[must_use]
pub fn format_time(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts - SERVER_UTC_OFFSET_SECS, 0))
        .map(|dt| dt.format(TIME_FORMAT).to_string())
        .unwrap_or_default()
}

/// Parse a server timestamp back into epoch seconds.
#[must_use]
pub fn parse_time(raw: &str) -> Option<u64> {
    let naive = NaiveDateTime::parse_from_str(raw, TIME_FORMAT).ok()?;
    u64::try_from(naive.and_utc().timestamp() + SERVER_UTC_OFFSET_SECS).ok()
}

// ---------------------------------------------------------------------------
// Bugs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDetail {
    #[serde(default)]
    pub email: Option<String>,
    /// Login name.
    pub name: String,
    pub real_name: String,
}

impl UserDetail {
    #[must_use]
    pub fn from_user(user: &User) -> Self {
        Self {
            email: user.email().map(str::to_string),
            name: user.username.clone(),
            real_name: user.name.clone(),
        }
    }

    #[must_use]
    pub fn to_user(&self) -> User {
        User::new(
            self.real_name.clone(),
            self.name.clone(),
            self.email.iter().cloned().collect(),
        )
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BugList {
    #[serde(default)]
    pub bugs: Vec<BugRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BugRecord {
    pub id: u64,
    pub summary: String,
    pub creation_time: String,
    pub last_change_time: String,
    pub status: String,
    pub resolution: String,
    pub dupe_of: Option<u64>,
    pub creator: String,
    pub creator_detail: Option<UserDetail>,
    pub assigned_to: Option<String>,
    pub assigned_to_detail: Option<UserDetail>,
    pub cc: Vec<String>,
    pub cc_detail: Vec<UserDetail>,
    pub product: Option<String>,
    pub component: Option<String>,
    pub version: Option<String>,
    pub classification: Option<String>,
    pub keywords: Vec<String>,
    pub depends_on: Vec<u64>,
    pub blocks: Vec<u64>,
    pub regressed_by: Vec<u64>,
    pub regressions: Vec<u64>,
    pub see_also: Vec<String>,
}

/// `{"add": [...]}` list change.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddList {
    #[serde(default)]
    pub add: Vec<String>,
}

/// Keyword change. Exactly one of `set` or `add` may be present.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordChange {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub set: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub add: Option<Vec<String>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentBody {
    pub body: String,
}

/// `PUT /rest/bug/{id}` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BugUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolution: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dupe_of: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<CommentBody>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub component: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<KeywordChange>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cc: Option<AddList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub see_also: Option<AddList>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub depends_on: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocks: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regressed_by: Option<Vec<u64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub regressions: Option<Vec<u64>>,
}

impl BugUpdate {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// `POST /rest/bug` body. Required fields are optional here so the server
/// can reject their absence itself.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BugCreate {
    pub summary: Option<String>,
    pub description: Option<String>,
    pub product: Option<String>,
    pub component: Option<String>,
    pub version: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub keywords: Vec<String>,
}

/// `{"id": n}`, returned by bug and comment creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Created {
    pub id: u64,
}

// ---------------------------------------------------------------------------
// Comments
// ---------------------------------------------------------------------------

/// `POST /rest/bug/{id}/comment` body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewComment {
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentsResponse {
    #[serde(default)]
    pub bugs: BTreeMap<String, CommentBlock>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommentBlock {
    #[serde(default)]
    pub comments: Vec<CommentRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CommentRecord {
    pub bug_id: u64,
    /// Author login name.
    pub creator: String,
    pub creation_time: String,
    pub time: String,
    /// Comment body. Kept untyped so malformed text is reported as a
    /// comment validation failure.
    pub text: Value,
}

// ---------------------------------------------------------------------------
// Users, products, fields
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsersResponse {
    #[serde(default)]
    pub users: Vec<UserDetail>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductIds {
    #[serde(default)]
    pub ids: Vec<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductList {
    #[serde(default)]
    pub products: Vec<ProductRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProductRecord {
    pub name: String,
    pub description: String,
    pub is_active: bool,
    pub components: Vec<ComponentRecord>,
    pub versions: Vec<VersionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ComponentRecord {
    pub name: String,
    pub description: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VersionRecord {
    pub name: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldList {
    #[serde(default)]
    pub fields: Vec<FieldRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FieldRecord {
    pub id: u64,
    pub name: String,
    #[serde(rename = "type")]
    pub kind: u32,
    pub display_name: String,
    pub values: Vec<FieldValue>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValue {
    pub name: String,
}

/// Error payload: `{"code": 101, "error": true, "message": "..."}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ErrorBody {
    pub code: Option<u32>,
    pub error: bool,
    pub message: Option<String>,
}
