//! Per-field cache slots for lazily populated issues.
//!
//! Every informational field of an [`Issue`](super::Issue) lives in a
//! [`Slot`]. A slot starts [`Slot::Unfetched`], becomes [`Slot::Fetched`]
//! the first time its tracker fills it, and drops to [`Slot::Stale`] when a
//! mutation changes the remote value. Reads treat `Stale` like `Unfetched`
//! and ask the tracker again.

use std::fmt;
use std::str::FromStr;

/// Cache state for one issue field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    /// Never fetched from the tracker.
    Unfetched,
    /// Fetched and authoritative until the next mutation.
    Fetched(T),
    /// Invalidated by a mutation, pending refresh.
    Stale,
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Self::Unfetched
    }
}

impl<T> Slot<T> {
    #[must_use]
    pub const fn is_fetched(&self) -> bool {
        matches!(self, Self::Fetched(_))
    }

    #[must_use]
    pub const fn is_stale(&self) -> bool {
        matches!(self, Self::Stale)
    }

    /// The cached value, if fetched.
    #[must_use]
    pub const fn get(&self) -> Option<&T> {
        match self {
            Self::Fetched(value) => Some(value),
            Self::Unfetched | Self::Stale => None,
        }
    }

    /// Fill the slot unless it already holds a fetched value.
    ///
    /// Returns `true` when the value was written. Bulk fetches use this so
    /// they never overwrite a value a caller has already observed.
    pub fn fill(&mut self, value: T) -> bool {
        if self.is_fetched() {
            return false;
        }
        *self = Self::Fetched(value);
        true
    }

    /// Overwrite with an authoritative value.
    pub fn set(&mut self, value: T) {
        *self = Self::Fetched(value);
    }

    /// Mark a fetched value as stale. Unfetched slots stay unfetched.
    pub fn invalidate(&mut self) {
        if self.is_fetched() {
            *self = Self::Stale;
        }
    }
}

/// Selector for a single populatable issue field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Field {
    Link,
    Title,
    Timestamp,
    Modified,
    Creator,
    Description,
    Opened,
    State,
    Substate,
    Original,
    Duplicates,
    Related,
    Assignee,
    Watchers,
    Comments,
    References,
    RelatedLinks,
    Labels,
    Project,
    Component,
    Version,
    Milestone,
    Keywords,
    Classification,
    SourceChanges,
}

/// Error returned when parsing an unknown field name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownField {
    pub raw: String,
}

impl fmt::Display for UnknownField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown issue field '{}'", self.raw)
    }
}

impl std::error::Error for UnknownField {}

impl Field {
    /// All fields in declaration order.
    pub const ALL: [Self; 25] = [
        Self::Link,
        Self::Title,
        Self::Timestamp,
        Self::Modified,
        Self::Creator,
        Self::Description,
        Self::Opened,
        Self::State,
        Self::Substate,
        Self::Original,
        Self::Duplicates,
        Self::Related,
        Self::Assignee,
        Self::Watchers,
        Self::Comments,
        Self::References,
        Self::RelatedLinks,
        Self::Labels,
        Self::Project,
        Self::Component,
        Self::Version,
        Self::Milestone,
        Self::Keywords,
        Self::Classification,
        Self::SourceChanges,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Link => "link",
            Self::Title => "title",
            Self::Timestamp => "timestamp",
            Self::Modified => "modified",
            Self::Creator => "creator",
            Self::Description => "description",
            Self::Opened => "opened",
            Self::State => "state",
            Self::Substate => "substate",
            Self::Original => "original",
            Self::Duplicates => "duplicates",
            Self::Related => "related",
            Self::Assignee => "assignee",
            Self::Watchers => "watchers",
            Self::Comments => "comments",
            Self::References => "references",
            Self::RelatedLinks => "related_links",
            Self::Labels => "labels",
            Self::Project => "project",
            Self::Component => "component",
            Self::Version => "version",
            Self::Milestone => "milestone",
            Self::Keywords => "keywords",
            Self::Classification => "classification",
            Self::SourceChanges => "source_changes",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Field {
    type Err = UnknownField;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|field| field.as_str() == s)
            .ok_or_else(|| UnknownField { raw: s.to_string() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fill_does_not_overwrite_fetched() {
        let mut slot = Slot::default();
        assert!(slot.fill("first"));
        assert!(!slot.fill("second"));
        assert_eq!(slot.get(), Some(&"first"));
    }

    #[test]
    fn invalidate_only_affects_fetched() {
        let mut slot: Slot<u8> = Slot::Unfetched;
        slot.invalidate();
        assert_eq!(slot, Slot::Unfetched);

        slot.set(3);
        slot.invalidate();
        assert!(slot.is_stale());
        assert_eq!(slot.get(), None);

        assert!(slot.fill(4));
        assert_eq!(slot.get(), Some(&4));
    }

    #[test]
    fn field_names_round_trip() {
        for field in Field::ALL {
            let parsed: Field = field.as_str().parse().unwrap();
            assert_eq!(parsed, field);
        }
        assert!("nope".parse::<Field>().is_err());
    }
}
