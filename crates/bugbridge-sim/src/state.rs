//! Backend state container: issues, users, projects and the comment counter.

use std::collections::BTreeMap;

use bugbridge_core::User;
use bugbridge_core::rest::wire;

use crate::users::UserDirectory;

/// One comment as stored by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommentEntry {
    pub author: User,
    pub timestamp: u64,
    pub text: String,
}

/// Relation id lists of an issue.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RelatedIds {
    pub blocks: Vec<u64>,
    pub depends_on: Vec<u64>,
    pub regressions: Vec<u64>,
    pub regressed_by: Vec<u64>,
}

/// Server-side issue record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IssueRecord {
    pub id: u64,
    pub title: String,
    pub timestamp: u64,
    pub modified: u64,
    pub status: String,
    pub creator: User,
    pub assignee: Option<User>,
    pub description: String,
    pub project: Option<String>,
    pub component: Option<String>,
    pub version: Option<String>,
    pub classification: Option<String>,
    pub keywords: Vec<String>,
    pub watchers: Vec<User>,
    pub comments: Vec<CommentEntry>,
    pub related: RelatedIds,
    /// Id of the issue this one duplicates.
    pub original: Option<u64>,
    /// Same-tracker issues listed in see-also.
    pub references: Vec<u64>,
    /// Other see-also URLs.
    pub related_links: Vec<String>,
}

impl IssueRecord {
    /// A new open issue filed by `creator`.
    #[must_use]
    pub fn new(id: u64, title: &str, creator: &User, description: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            timestamp: 0,
            modified: 0,
            status: "NEW".to_string(),
            creator: creator.clone(),
            assignee: None,
            description: description.to_string(),
            project: None,
            component: None,
            version: None,
            classification: None,
            keywords: Vec::new(),
            watchers: vec![creator.clone()],
            comments: Vec::new(),
            related: RelatedIds::default(),
            original: None,
            references: Vec::new(),
            related_links: Vec::new(),
        }
    }

    #[must_use]
    pub const fn filed_at(mut self, timestamp: u64) -> Self {
        self.timestamp = timestamp;
        self.modified = timestamp;
        self
    }

    #[must_use]
    pub fn in_component(mut self, project: &str, component: &str, version: &str) -> Self {
        self.project = Some(project.to_string());
        self.component = Some(component.to_string());
        self.version = Some(version.to_string());
        self
    }

    #[must_use]
    pub fn assigned_to(mut self, assignee: &User) -> Self {
        if !self.watchers.iter().any(|w| w.username == assignee.username) {
            self.watchers.push(assignee.clone());
        }
        self.assignee = Some(assignee.clone());
        self
    }

    #[must_use]
    pub fn with_keywords(mut self, keywords: &[&str]) -> Self {
        self.keywords = keywords.iter().map(|k| (*k).to_string()).collect();
        self
    }

    #[must_use]
    pub fn with_comment(mut self, author: &User, timestamp: u64, text: &str) -> Self {
        self.comments.push(CommentEntry {
            author: author.clone(),
            timestamp,
            text: text.to_string(),
        });
        self
    }

    #[must_use]
    pub fn resolved(mut self) -> Self {
        self.status = wire::STATUS_RESOLVED.to_string();
        self
    }

    #[must_use]
    pub fn duplicate_of(mut self, original: u64) -> Self {
        self.status = wire::STATUS_RESOLVED.to_string();
        self.original = Some(original);
        self
    }

    #[must_use]
    pub fn with_references(mut self, ids: &[u64]) -> Self {
        self.references = ids.to_vec();
        self
    }

    #[must_use]
    pub fn opened(&self) -> bool {
        wire::is_open_status(&self.status)
    }

    /// `DUPLICATE` with an original, `FIXED` otherwise, empty while open.
    #[must_use]
    pub fn resolution(&self) -> &'static str {
        if self.opened() {
            ""
        } else if self.original.is_some() {
            wire::RESOLUTION_DUPLICATE
        } else {
            wire::RESOLUTION_FIXED
        }
    }

    /// Whether `user` already watches this issue.
    #[must_use]
    pub fn is_watched_by(&self, user: &User) -> bool {
        self.watchers.iter().any(|w| w.username == user.username)
    }
}

/// Project metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectRecord {
    pub id: u64,
    pub description: String,
    /// Component name to description.
    pub components: BTreeMap<String, String>,
    pub versions: Vec<String>,
}

impl ProjectRecord {
    #[must_use]
    pub fn new(id: u64, description: &str) -> Self {
        Self {
            id,
            description: description.to_string(),
            components: BTreeMap::new(),
            versions: Vec::new(),
        }
    }

    #[must_use]
    pub fn component(mut self, name: &str, description: &str) -> Self {
        self.components.insert(name.to_string(), description.to_string());
        self
    }

    #[must_use]
    pub fn version(mut self, name: &str) -> Self {
        self.versions.push(name.to_string());
        self
    }
}

/// Everything the backend knows, owned by one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendState {
    pub users: UserDirectory,
    pub issues: BTreeMap<u64, IssueRecord>,
    pub projects: BTreeMap<String, ProjectRecord>,
    /// Id handed out for the most recent comment.
    pub comment_counter: u64,
}

impl BackendState {
    /// Build state from seed data. The comment counter starts at one plus
    /// every preloaded description and comment.
    #[must_use]
    pub fn new(
        users: UserDirectory,
        issues: BTreeMap<u64, IssueRecord>,
        projects: BTreeMap<String, ProjectRecord>,
    ) -> Self {
        let preloaded: usize = issues.values().map(|i| 1 + i.comments.len()).sum();
        Self {
            users,
            issues,
            projects,
            comment_counter: 1 + u64::try_from(preloaded).unwrap_or(u64::MAX - 1),
        }
    }

    /// Smallest positive id not already in use.
    #[must_use]
    pub fn next_issue_id(&self) -> u64 {
        (1..)
            .find(|id| !self.issues.contains_key(id))
            .unwrap_or(u64::MAX)
    }

    /// Issues closed as duplicates of `id`, in id order.
    #[must_use]
    pub fn duplicates_of(&self, id: u64) -> Vec<u64> {
        self.issues
            .values()
            .filter(|issue| issue.original == Some(id))
            .map(|issue| issue.id)
            .collect()
    }

    /// Count one more comment and return its id.
    pub fn next_comment_id(&mut self) -> u64 {
        self.comment_counter += 1;
        self.comment_counter
    }
}
