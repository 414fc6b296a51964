//! The capability contract every issue backend implements.

use std::fmt;
use std::time::Duration;

use crate::error::Result;
use crate::model::{Comment, Field, Issue, IssueUpdate, RelationUpdate};
use crate::redact::RedactionRules;

/// Name and optional base URL identifying a tracker instance.
///
/// Two issues belong to the same tracker iff their identities are equal.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TrackerIdentity {
    pub name: String,
    pub url: Option<String>,
}

impl TrackerIdentity {
    #[must_use]
    pub fn new(name: impl Into<String>, url: Option<String>) -> Self {
        Self {
            name: name.into(),
            url,
        }
    }
}

impl fmt::Display for TrackerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.url {
            Some(url) => write!(f, "{} ({url})", self.name),
            None => f.write_str(&self.name),
        }
    }
}

/// Options for [`Tracker::cc_radar`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CcRadar {
    /// Wait for the radar link to appear before returning.
    pub block: bool,
    /// Upper bound on the wait when `block` is set.
    pub timeout: Option<Duration>,
    /// Link to an existing radar instead of asking the importer for a new one.
    pub radar: Option<u64>,
}

/// A bug-tracking backend: the sole source of truth for issue fields and
/// the sole executor of mutations.
///
/// Mutating operations return `Ok(false)` (or `Ok(None)`) when the backend
/// rejects the request and reserve `Err` for programmer errors.
pub trait Tracker {
    /// Name and URL of this tracker.
    fn identity(&self) -> &TrackerIdentity;

    /// Fetch one field into `issue`'s cache.
    ///
    /// `None` bootstraps identity fields (the link) and is called once when
    /// an [`Issue`] is constructed. Implementations may fill more than the
    /// requested field, but must not hold [`Issue::fields_mut`] across calls
    /// that can re-enter the issue.
    ///
    /// # Errors
    ///
    /// Returns an error when the issue cannot be read (unknown id, protocol
    /// failure).
    fn populate(&self, issue: &Issue, field: Option<Field>) -> Result<()>;

    /// Apply field changes.
    ///
    /// # Errors
    ///
    /// Returns an error only for programmer errors.
    fn set(&self, issue: &Issue, update: &IssueUpdate) -> Result<bool>;

    /// Add relations to other issues on this tracker.
    ///
    /// # Errors
    ///
    /// Returns an error only for programmer errors.
    fn relate(&self, issue: &Issue, relations: &RelationUpdate) -> Result<bool>;

    /// Post a comment, returning it on success.
    ///
    /// # Errors
    ///
    /// Returns an error only for programmer errors.
    fn add_comment(&self, issue: &Issue, text: &str) -> Result<Option<Comment>>;

    /// Cross-post the issue to the companion radar tracker.
    ///
    /// When `request.block` is set, waits up to `request.timeout` for the
    /// link; a timeout is reported on the diagnostic stream and yields
    /// `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns an error only for programmer errors.
    fn cc_radar(&self, issue: &Issue, request: &CcRadar) -> Result<Option<u64>>;

    /// Ordered redaction and exemption tables.
    fn redaction_rules(&self) -> &RedactionRules;
}
