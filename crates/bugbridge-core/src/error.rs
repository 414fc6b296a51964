use std::fmt;

use crate::model::Field;

/// Machine-readable error codes for tooling that pattern-matches on failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidComment,
    MissingRequiredField,
    InvalidPattern,
    CrossTrackerDuplicate,
    AuthenticationRequired,
    InvalidStateTransition,
    IssueNotFound,
    FieldNotPopulated,
    ProtocolViolation,
}

impl ErrorCode {
    /// Stable code identifier (`E####`) for machine parsing.
    #[must_use]
    pub const fn code(self) -> &'static str {
        match self {
            Self::InvalidComment => "E1001",
            Self::MissingRequiredField => "E1002",
            Self::InvalidPattern => "E1003",
            Self::CrossTrackerDuplicate => "E2001",
            Self::AuthenticationRequired => "E3001",
            Self::InvalidStateTransition => "E4001",
            Self::IssueNotFound => "E4004",
            Self::FieldNotPopulated => "E5001",
            Self::ProtocolViolation => "E9001",
        }
    }

    /// Short human-facing summary for logs and terminal output.
    #[must_use]
    pub const fn message(self) -> &'static str {
        match self {
            Self::InvalidComment => "Malformed comment",
            Self::MissingRequiredField => "Required field missing",
            Self::InvalidPattern => "Invalid redaction pattern",
            Self::CrossTrackerDuplicate => "Duplicate target belongs to another tracker",
            Self::AuthenticationRequired => "Missing or invalid credentials",
            Self::InvalidStateTransition => "Invalid state transition",
            Self::IssueNotFound => "Issue not found",
            Self::FieldNotPopulated => "Field not populated by tracker",
            Self::ProtocolViolation => "Unexpected tracker response",
        }
    }

    /// Optional remediation hint that can be surfaced to operators.
    #[must_use]
    pub const fn hint(self) -> Option<&'static str> {
        match self {
            Self::InvalidComment => {
                Some("Comment timestamps must be non-negative integers and content must be text.")
            }
            Self::MissingRequiredField => {
                Some("Provide summary, description, project, component and version.")
            }
            Self::InvalidPattern => Some("Fix the regular expression in the tracker config."),
            Self::CrossTrackerDuplicate => {
                Some("Only issues on the same tracker can be marked as duplicates.")
            }
            Self::AuthenticationRequired => {
                Some("Set the tracker username and password (e.g. BUGS_EXAMPLE_COM_USERNAME).")
            }
            Self::InvalidStateTransition => {
                Some("Add a comment when reopening, or request status REOPENED explicitly.")
            }
            Self::IssueNotFound | Self::FieldNotPopulated => None,
            Self::ProtocolViolation => Some("Retry once. If persistent, report a bug with logs."),
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

/// Errors raised by the issue model, trackers, and the reference backend.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TrackerError {
    /// Malformed comment fields.
    #[error("validation failed: {0}")]
    Validation(String),

    /// A creation request without one of its required fields.
    #[error("missing required field '{0}'")]
    MissingField(String),

    /// Attempt to link a duplicate to an issue on a different tracker.
    #[error("cannot dupe {issue} to {original}")]
    CrossTracker { issue: String, original: String },

    /// Missing or unrecognised credentials.
    #[error("authentication required for {0}")]
    Authentication(String),

    /// Lifecycle change the tracker refuses, carrying the tracker's wording.
    #[error("{0}")]
    StateTransition(String),

    /// Unknown issue, user or project.
    #[error("{0}")]
    NotFound(String),

    /// The tracker returned from `populate` without filling the field.
    #[error("tracker did not populate '{0}'")]
    NotPopulated(Field),

    /// A redaction rule pattern failed to compile.
    #[error("invalid redaction pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// Unexpected status code or undecodable response body.
    #[error("protocol error: {0}")]
    Protocol(String),
}

impl TrackerError {
    /// Machine-readable code associated with this error.
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        match self {
            Self::Validation(_) => ErrorCode::InvalidComment,
            Self::MissingField(_) => ErrorCode::MissingRequiredField,
            Self::CrossTracker { .. } => ErrorCode::CrossTrackerDuplicate,
            Self::Authentication(_) => ErrorCode::AuthenticationRequired,
            Self::StateTransition(_) => ErrorCode::InvalidStateTransition,
            Self::NotFound(_) => ErrorCode::IssueNotFound,
            Self::NotPopulated(_) => ErrorCode::FieldNotPopulated,
            Self::InvalidPattern { .. } => ErrorCode::InvalidPattern,
            Self::Protocol(_) => ErrorCode::ProtocolViolation,
        }
    }

    /// Optional remediation hint for operators.
    #[must_use]
    pub const fn hint(&self) -> Option<&'static str> {
        self.code().hint()
    }
}

/// Shorthand result type for tracker operations.
pub type Result<T, E = TrackerError> = std::result::Result<T, E>;

#[cfg(test)]
mod tests {
    use super::{ErrorCode, TrackerError};
    use std::collections::HashSet;

    #[test]
    fn all_codes_are_unique() {
        let all = [
            ErrorCode::InvalidComment,
            ErrorCode::MissingRequiredField,
            ErrorCode::InvalidPattern,
            ErrorCode::CrossTrackerDuplicate,
            ErrorCode::AuthenticationRequired,
            ErrorCode::InvalidStateTransition,
            ErrorCode::IssueNotFound,
            ErrorCode::FieldNotPopulated,
            ErrorCode::ProtocolViolation,
        ];

        let mut seen = HashSet::new();
        for code in all {
            assert!(seen.insert(code.code()), "duplicate code {}", code.code());
        }
    }

    #[test]
    fn code_format_is_machine_friendly() {
        let code = ErrorCode::CrossTrackerDuplicate.code();
        assert_eq!(code.len(), 5);
        assert!(code.starts_with('E'));
        assert!(code.chars().skip(1).all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn cross_tracker_message_names_both_links() {
        let err = TrackerError::CrossTracker {
            issue: "https://bugs.example.com/show_bug.cgi?id=1".into(),
            original: "https://other.example.com/show_bug.cgi?id=2".into(),
        };
        assert_eq!(
            err.to_string(),
            "cannot dupe https://bugs.example.com/show_bug.cgi?id=1 to \
             https://other.example.com/show_bug.cgi?id=2"
        );
        assert_eq!(err.code(), ErrorCode::CrossTrackerDuplicate);
    }
}
