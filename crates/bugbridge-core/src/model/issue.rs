//! The lazily populated, tracker-backed issue entity.
//!
//! An [`Issue`] is an identity (`tracker`, `id`) plus a cache of remote
//! fields. Nothing is fetched up front except the link: each accessor asks
//! the owning [`Tracker`] to populate its field on first read and serves
//! the cached value afterwards. Mutations are delegated to the tracker and
//! mark the fields they touch as stale.
//!
//! Issues are single-threaded handles (`Rc` + `RefCell`). Related issues
//! (`duplicates`, `original`, `related`, `references`) are fresh issue
//! objects created by the tracker, shared behind `Rc` so their own caches
//! persist across reads.

use std::cell::{Ref, RefCell, RefMut};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use tracing::{debug, warn};

use super::comment::Comment;
use super::field::{Field, Slot};
use super::user::User;
use crate::error::{Result, TrackerError};
use crate::redact::{self, Redaction};
use crate::tracker::{CcRadar, Tracker};

// ---------------------------------------------------------------------------
// Relations
// ---------------------------------------------------------------------------

/// The four directed relation kinds between issues.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Relation {
    Blocks,
    DependsOn,
    Regressions,
    RegressedBy,
}

impl Relation {
    pub const ALL: [Self; 4] = [
        Self::Blocks,
        Self::DependsOn,
        Self::Regressions,
        Self::RegressedBy,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Blocks => "blocks",
            Self::DependsOn => "depends_on",
            Self::Regressions => "regressions",
            Self::RegressedBy => "regressed_by",
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Populated relation lists of an issue.
#[derive(Debug, Clone, Default)]
pub struct Related {
    pub blocks: Vec<Rc<Issue>>,
    pub depends_on: Vec<Rc<Issue>>,
    pub regressions: Vec<Rc<Issue>>,
    pub regressed_by: Vec<Rc<Issue>>,
}

impl Related {
    #[must_use]
    pub fn get(&self, relation: Relation) -> &[Rc<Issue>] {
        match relation {
            Relation::Blocks => &self.blocks,
            Relation::DependsOn => &self.depends_on,
            Relation::Regressions => &self.regressions,
            Relation::RegressedBy => &self.regressed_by,
        }
    }

    pub fn get_mut(&mut self, relation: Relation) -> &mut Vec<Rc<Issue>> {
        match relation {
            Relation::Blocks => &mut self.blocks,
            Relation::DependsOn => &mut self.depends_on,
            Relation::Regressions => &mut self.regressions,
            Relation::RegressedBy => &mut self.regressed_by,
        }
    }

    /// Issue ids for one relation, in order.
    #[must_use]
    pub fn ids(&self, relation: Relation) -> Vec<u64> {
        self.get(relation).iter().map(|issue| issue.id()).collect()
    }
}

/// Relation additions requested through [`Issue::relate`], keyed by kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelationUpdate {
    entries: BTreeMap<Relation, Vec<u64>>,
}

impl RelationUpdate {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `other` under `relation`.
    #[must_use]
    pub fn with(mut self, relation: Relation, other: &Issue) -> Self {
        self.entries.entry(relation).or_default().push(other.id());
        self
    }

    /// Add a raw issue id under `relation`.
    #[must_use]
    pub fn with_id(mut self, relation: Relation, id: u64) -> Self {
        self.entries.entry(relation).or_default().push(id);
        self
    }

    #[must_use]
    pub fn get(&self, relation: Relation) -> Option<&[u64]> {
        self.entries.get(&relation).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (Relation, &[u64])> {
        self.entries.iter().map(|(k, v)| (*k, v.as_slice()))
    }
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Field changes handed to [`Tracker::set`]. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IssueUpdate {
    pub opened: Option<bool>,
    /// Explanation recorded alongside the change, usually as a comment.
    pub why: Option<String>,
    /// Id of the original when closing as a duplicate.
    pub original: Option<u64>,
    pub state: Option<String>,
    pub substate: Option<String>,
    pub assignee: Option<User>,
    pub related_links: Option<Vec<String>>,
    pub labels: Option<Vec<String>>,
    pub keywords: Option<Vec<String>>,
    pub source_changes: Option<Vec<String>>,
    pub project: Option<String>,
    pub component: Option<String>,
    pub version: Option<String>,
}

impl IssueUpdate {
    /// Cached fields whose remote value this update may change.
    #[must_use]
    pub fn touched(&self) -> Vec<Field> {
        let mut fields = Vec::new();
        if self.opened.is_some() || self.state.is_some() || self.substate.is_some() {
            fields.extend([Field::Opened, Field::State, Field::Substate, Field::Original]);
        }
        if self.original.is_some() {
            fields.push(Field::Original);
        }
        if self.why.is_some() || self.source_changes.is_some() {
            fields.extend([Field::Comments, Field::SourceChanges]);
        }
        if self.assignee.is_some() {
            fields.push(Field::Assignee);
        }
        if self.related_links.is_some() {
            fields.extend([Field::RelatedLinks, Field::References]);
        }
        if self.labels.is_some() {
            fields.push(Field::Labels);
        }
        if self.keywords.is_some() {
            fields.push(Field::Keywords);
        }
        if self.project.is_some() || self.component.is_some() || self.version.is_some() {
            fields.extend([Field::Project, Field::Component, Field::Version]);
        }
        if !fields.is_empty() {
            fields.push(Field::Modified);
        }
        fields.sort_unstable();
        fields.dedup();
        fields
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// ---------------------------------------------------------------------------
// Cache
// ---------------------------------------------------------------------------

/// The per-issue field cache written by trackers.
#[derive(Debug, Clone, Default)]
pub struct IssueFields {
    pub link: Slot<String>,
    pub title: Slot<String>,
    pub timestamp: Slot<u64>,
    pub modified: Slot<u64>,
    pub creator: Slot<Option<User>>,
    pub description: Slot<String>,
    pub opened: Slot<bool>,
    pub state: Slot<String>,
    pub substate: Slot<Option<String>>,
    pub original: Slot<Option<Rc<Issue>>>,
    pub duplicates: Slot<Vec<Rc<Issue>>>,
    pub related: Slot<Related>,
    pub assignee: Slot<Option<User>>,
    pub watchers: Slot<Vec<User>>,
    pub comments: Slot<Vec<Comment>>,
    pub references: Slot<Vec<Rc<Issue>>>,
    pub related_links: Slot<Vec<String>>,
    pub labels: Slot<Vec<String>>,
    pub project: Slot<Option<String>>,
    pub component: Slot<Option<String>>,
    pub version: Slot<Option<String>>,
    pub milestone: Slot<Option<String>>,
    pub keywords: Slot<Vec<String>>,
    pub classification: Slot<Option<String>>,
    pub source_changes: Slot<Vec<String>>,
}

impl IssueFields {
    /// Mark one field stale.
    pub fn invalidate(&mut self, field: Field) {
        match field {
            Field::Link => self.link.invalidate(),
            Field::Title => self.title.invalidate(),
            Field::Timestamp => self.timestamp.invalidate(),
            Field::Modified => self.modified.invalidate(),
            Field::Creator => self.creator.invalidate(),
            Field::Description => self.description.invalidate(),
            Field::Opened => self.opened.invalidate(),
            Field::State => self.state.invalidate(),
            Field::Substate => self.substate.invalidate(),
            Field::Original => self.original.invalidate(),
            Field::Duplicates => self.duplicates.invalidate(),
            Field::Related => self.related.invalidate(),
            Field::Assignee => self.assignee.invalidate(),
            Field::Watchers => self.watchers.invalidate(),
            Field::Comments => self.comments.invalidate(),
            Field::References => self.references.invalidate(),
            Field::RelatedLinks => self.related_links.invalidate(),
            Field::Labels => self.labels.invalidate(),
            Field::Project => self.project.invalidate(),
            Field::Component => self.component.invalidate(),
            Field::Version => self.version.invalidate(),
            Field::Milestone => self.milestone.invalidate(),
            Field::Keywords => self.keywords.invalidate(),
            Field::Classification => self.classification.invalidate(),
            Field::SourceChanges => self.source_changes.invalidate(),
        }
    }

    /// Whether `field` currently holds a fetched value.
    #[must_use]
    pub const fn is_fetched(&self, field: Field) -> bool {
        match field {
            Field::Link => self.link.is_fetched(),
            Field::Title => self.title.is_fetched(),
            Field::Timestamp => self.timestamp.is_fetched(),
            Field::Modified => self.modified.is_fetched(),
            Field::Creator => self.creator.is_fetched(),
            Field::Description => self.description.is_fetched(),
            Field::Opened => self.opened.is_fetched(),
            Field::State => self.state.is_fetched(),
            Field::Substate => self.substate.is_fetched(),
            Field::Original => self.original.is_fetched(),
            Field::Duplicates => self.duplicates.is_fetched(),
            Field::Related => self.related.is_fetched(),
            Field::Assignee => self.assignee.is_fetched(),
            Field::Watchers => self.watchers.is_fetched(),
            Field::Comments => self.comments.is_fetched(),
            Field::References => self.references.is_fetched(),
            Field::RelatedLinks => self.related_links.is_fetched(),
            Field::Labels => self.labels.is_fetched(),
            Field::Project => self.project.is_fetched(),
            Field::Component => self.component.is_fetched(),
            Field::Version => self.version.is_fetched(),
            Field::Milestone => self.milestone.is_fetched(),
            Field::Keywords => self.keywords.is_fetched(),
            Field::Classification => self.classification.is_fetched(),
            Field::SourceChanges => self.source_changes.is_fetched(),
        }
    }
}

// ---------------------------------------------------------------------------
// Issue
// ---------------------------------------------------------------------------

/// A remote issue viewed through its tracker.
///
/// Equality, ordering and hashing all go through [`Issue::link`].
pub struct Issue {
    id: u64,
    tracker: Rc<dyn Tracker>,
    fields: RefCell<IssueFields>,
}

impl Issue {
    /// Create an issue handle and let the tracker bootstrap its identity fields.
    ///
    /// # Errors
    ///
    /// Propagates any error the tracker raises while bootstrapping.
    pub fn new(id: u64, tracker: Rc<dyn Tracker>) -> Result<Self> {
        let issue = Self {
            id,
            tracker,
            fields: RefCell::new(IssueFields::default()),
        };
        issue.tracker.populate(&issue, None)?;
        Ok(issue)
    }

    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    #[must_use]
    pub fn tracker(&self) -> &Rc<dyn Tracker> {
        &self.tracker
    }

    /// Read access to the raw field cache.
    ///
    /// # Panics
    ///
    /// Panics if a tracker currently holds [`Issue::fields_mut`].
    #[must_use]
    pub fn fields(&self) -> Ref<'_, IssueFields> {
        self.fields.borrow()
    }

    /// Write access to the field cache, for [`Tracker`] implementations.
    ///
    /// # Panics
    ///
    /// Panics if the cache is already borrowed. Trackers must not hold this
    /// guard across calls back into the issue.
    #[must_use]
    pub fn fields_mut(&self) -> RefMut<'_, IssueFields> {
        self.fields.borrow_mut()
    }

    fn read<T: Clone>(&self, field: Field, slot: fn(&IssueFields) -> &Slot<T>) -> Result<T> {
        if let Some(value) = slot(&self.fields.borrow()).get() {
            return Ok(value.clone());
        }
        debug!(issue = self.id, %field, "populating field");
        self.tracker.populate(self, Some(field))?;
        slot(&self.fields.borrow())
            .get()
            .cloned()
            .ok_or(TrackerError::NotPopulated(field))
    }

    fn invalidate(&self, fields: &[Field]) {
        let mut cache = self.fields.borrow_mut();
        for field in fields {
            cache.invalidate(*field);
        }
    }

    // -- informational accessors ------------------------------------------

    /// Stable display link, bootstrapped at construction.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures; see [`Tracker::populate`].
    pub fn link(&self) -> Result<String> {
        self.read(Field::Link, |f| &f.link)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn title(&self) -> Result<String> {
        self.read(Field::Title, |f| &f.title)
    }

    /// Creation time in epoch seconds.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn timestamp(&self) -> Result<u64> {
        self.read(Field::Timestamp, |f| &f.timestamp)
    }

    /// Last modification time in epoch seconds.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn modified(&self) -> Result<u64> {
        self.read(Field::Modified, |f| &f.modified)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn creator(&self) -> Result<Option<User>> {
        self.read(Field::Creator, |f| &f.creator)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn description(&self) -> Result<String> {
        self.read(Field::Description, |f| &f.description)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn opened(&self) -> Result<bool> {
        self.read(Field::Opened, |f| &f.opened)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn state(&self) -> Result<String> {
        self.read(Field::State, |f| &f.state)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn substate(&self) -> Result<Option<String>> {
        self.read(Field::Substate, |f| &f.substate)
    }

    /// The issue this one was closed as a duplicate of.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn original(&self) -> Result<Option<Rc<Self>>> {
        self.read(Field::Original, |f| &f.original)
    }

    /// Issues closed as duplicates of this one.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn duplicates(&self) -> Result<Vec<Rc<Self>>> {
        self.read(Field::Duplicates, |f| &f.duplicates)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn related(&self) -> Result<Related> {
        self.read(Field::Related, |f| &f.related)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn assignee(&self) -> Result<Option<User>> {
        self.read(Field::Assignee, |f| &f.assignee)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn watchers(&self) -> Result<Vec<User>> {
        self.read(Field::Watchers, |f| &f.watchers)
    }

    /// Comments in posting order, excluding the description.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn comments(&self) -> Result<Vec<Comment>> {
        self.read(Field::Comments, |f| &f.comments)
    }

    /// Other issues on the same tracker this one points at.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn references(&self) -> Result<Vec<Rc<Self>>> {
        self.read(Field::References, |f| &f.references)
    }

    /// External links that are not issues on this tracker.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn related_links(&self) -> Result<Vec<String>> {
        self.read(Field::RelatedLinks, |f| &f.related_links)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn labels(&self) -> Result<Vec<String>> {
        self.read(Field::Labels, |f| &f.labels)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn project(&self) -> Result<Option<String>> {
        self.read(Field::Project, |f| &f.project)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn component(&self) -> Result<Option<String>> {
        self.read(Field::Component, |f| &f.component)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn version(&self) -> Result<Option<String>> {
        self.read(Field::Version, |f| &f.version)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn milestone(&self) -> Result<Option<String>> {
        self.read(Field::Milestone, |f| &f.milestone)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn keywords(&self) -> Result<Vec<String>> {
        self.read(Field::Keywords, |f| &f.keywords)
    }

    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn classification(&self) -> Result<Option<String>> {
        self.read(Field::Classification, |f| &f.classification)
    }

    /// Registered source changes (commit identifiers with descriptions).
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn source_changes(&self) -> Result<Vec<String>> {
        self.read(Field::SourceChanges, |f| &f.source_changes)
    }

    // -- mutations --------------------------------------------------------

    fn apply(&self, update: &IssueUpdate) -> Result<bool> {
        let applied = self.tracker.set(self, update)?;
        if applied {
            self.invalidate(&update.touched());
        }
        Ok(applied)
    }

    /// # Errors
    ///
    /// Propagates programmer errors raised by the tracker.
    pub fn set_state(&self, state: &str, substate: Option<&str>) -> Result<bool> {
        self.apply(&IssueUpdate {
            state: Some(state.to_string()),
            substate: substate.map(str::to_string),
            ..IssueUpdate::default()
        })
    }

    /// Reopen the issue. Returns `false` without contacting the tracker if it
    /// is already open.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn open(&self, why: Option<&str>) -> Result<bool> {
        if self.opened()? {
            return Ok(false);
        }
        self.apply(&IssueUpdate {
            opened: Some(true),
            why: why.map(str::to_string),
            ..IssueUpdate::default()
        })
    }

    /// Close the issue, optionally as a duplicate of `original`.
    ///
    /// Returns `false` without contacting the tracker if already closed.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::CrossTracker`] when `original` belongs to a
    /// tracker with a different name or URL. The check runs before anything
    /// else, so nothing is mutated.
    pub fn close(&self, why: Option<&str>, original: Option<&Self>) -> Result<bool> {
        if let Some(original) = original {
            if self.tracker.identity() != original.tracker.identity() {
                return Err(TrackerError::CrossTracker {
                    issue: self.link_key(),
                    original: original.link_key(),
                });
            }
        }
        if !self.opened()? {
            return Ok(false);
        }
        let applied = self.apply(&IssueUpdate {
            opened: Some(false),
            why: why.map(str::to_string),
            original: original.map(Self::id),
            ..IssueUpdate::default()
        })?;
        if let Some(original) = original.filter(|_| applied) {
            original.invalidate(&[Field::Duplicates]);
        }
        Ok(applied)
    }

    /// # Errors
    ///
    /// Propagates programmer errors raised by the tracker.
    pub fn assign(&self, assignee: &User, why: Option<&str>) -> Result<bool> {
        self.apply(&IssueUpdate {
            assignee: Some(assignee.clone()),
            why: why.map(str::to_string),
            ..IssueUpdate::default()
        })
    }

    /// Add relations to other issues.
    ///
    /// # Errors
    ///
    /// Propagates programmer errors raised by the tracker.
    pub fn relate(&self, relations: &RelationUpdate) -> Result<bool> {
        let applied = self.tracker.relate(self, relations)?;
        if applied {
            self.invalidate(&[Field::Related, Field::Modified]);
        }
        Ok(applied)
    }

    /// # Errors
    ///
    /// Propagates programmer errors raised by the tracker.
    pub fn set_labels(&self, labels: Vec<String>) -> Result<bool> {
        self.apply(&IssueUpdate {
            labels: Some(labels),
            ..IssueUpdate::default()
        })
    }

    /// Replace the keyword list.
    ///
    /// # Errors
    ///
    /// Propagates programmer errors raised by the tracker.
    pub fn set_keywords(&self, keywords: Vec<String>) -> Result<bool> {
        self.apply(&IssueUpdate {
            keywords: Some(keywords),
            ..IssueUpdate::default()
        })
    }

    /// # Errors
    ///
    /// Propagates programmer errors raised by the tracker.
    pub fn add_related_links(&self, links: Vec<String>) -> Result<bool> {
        self.apply(&IssueUpdate {
            related_links: Some(links),
            ..IssueUpdate::default()
        })
    }

    /// Post a comment. `None` means the tracker rejected it.
    ///
    /// # Errors
    ///
    /// Propagates programmer errors raised by the tracker.
    pub fn add_comment(&self, text: &str) -> Result<Option<Comment>> {
        let comment = self.tracker.add_comment(self, text)?;
        if comment.is_some() {
            self.invalidate(&[Field::Comments, Field::SourceChanges, Field::Modified]);
        }
        Ok(comment)
    }

    /// Register a source change such as `"Fix the thing, 251234@main (a1b2c3d4e5f6)"`.
    ///
    /// Changes are compared on their description plus the first 12
    /// characters of the trailing revision; an already registered change is
    /// reported on the diagnostic stream and left alone.
    ///
    /// # Errors
    ///
    /// Propagates tracker failures.
    pub fn add_source_change(&self, line: &str) -> Result<bool> {
        let existing = self.source_changes()?;
        let search_for = source_change_key(line);
        if existing.iter().any(|change| change.starts_with(&search_for)) {
            warn!(issue = self.id, "'{line}' is already a registered source change");
            return Ok(false);
        }
        let mut changes = existing;
        changes.push(line.to_string());
        self.apply(&IssueUpdate {
            source_changes: Some(changes),
            ..IssueUpdate::default()
        })
    }

    /// # Errors
    ///
    /// Propagates programmer errors raised by the tracker.
    pub fn set_component(
        &self,
        project: Option<&str>,
        component: Option<&str>,
        version: Option<&str>,
    ) -> Result<bool> {
        self.apply(&IssueUpdate {
            project: project.map(str::to_string),
            component: component.map(str::to_string),
            version: version.map(str::to_string),
            ..IssueUpdate::default()
        })
    }

    /// Cross-post this issue to the companion radar tracker.
    ///
    /// Returns the linked radar id once known.
    ///
    /// # Errors
    ///
    /// Propagates programmer errors raised by the tracker.
    pub fn cc_radar(&self, request: &CcRadar) -> Result<Option<u64>> {
        let linked = self.tracker.cc_radar(self, request)?;
        self.invalidate(&[Field::Watchers, Field::Comments, Field::Keywords, Field::Modified]);
        Ok(linked)
    }

    /// Whether this issue's metadata may be surfaced publicly.
    #[must_use]
    pub fn redaction(&self) -> Redaction {
        redact::evaluate(self)
    }

    fn link_key(&self) -> String {
        self.link().unwrap_or_default()
    }
}

/// Normalised comparison key for a source change line.
///
/// Splits on `", "`, truncates the last part to 12 characters, and rejoins.
/// Lines whose last part is empty compare verbatim.
#[must_use]
pub fn source_change_key(line: &str) -> String {
    let mut parts: Vec<&str> = line.split(", ").collect();
    let last = parts.pop().unwrap_or_default();
    let truncated = match last.char_indices().nth(12) {
        Some((cut, _)) => &last[..cut],
        None => last,
    };
    if truncated.is_empty() {
        return line.to_string();
    }
    parts.push(truncated);
    parts.join(", ")
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.link_key(), self.title().unwrap_or_default())
    }
}

impl fmt::Debug for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Issue")
            .field("id", &self.id)
            .field("tracker", &self.tracker.identity().name)
            .field("link", &self.fields.try_borrow().ok().and_then(|c| c.link.get().cloned()))
            .finish_non_exhaustive()
    }
}

impl PartialEq for Issue {
    fn eq(&self, other: &Self) -> bool {
        self.link_key() == other.link_key()
    }
}

impl Eq for Issue {}

impl PartialOrd for Issue {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Issue {
    fn cmp(&self, other: &Self) -> Ordering {
        self.link_key().cmp(&other.link_key())
    }
}

impl Hash for Issue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.link_key().hash(state);
    }
}
