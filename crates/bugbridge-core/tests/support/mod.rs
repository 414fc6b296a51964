//! In-memory tracker for exercising the issue model without a transport.
//!
//! Populates exactly the requested field and counts every call, so tests
//! can assert how often the issue reaches its backend.

#![allow(dead_code)]

use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::rc::Rc;

use bugbridge_core::{
    CcRadar, Comment, Field, Issue, IssueUpdate, RedactionRules, RelationUpdate, Result, Rule,
    Tracker, TrackerIdentity, User,
};

#[derive(Debug, Clone, Default)]
pub struct Record {
    pub title: String,
    pub opened: bool,
    pub project: Option<String>,
    pub component: Option<String>,
    pub version: Option<String>,
    pub classification: Option<String>,
    pub keywords: Vec<String>,
    pub original: Option<u64>,
    pub comments: Vec<String>,
    pub source_changes: Vec<String>,
}

impl Record {
    pub fn open(title: &str) -> Self {
        Self {
            title: title.to_string(),
            opened: true,
            ..Self::default()
        }
    }

    pub fn closed(title: &str) -> Self {
        Self {
            title: title.to_string(),
            ..Self::default()
        }
    }

    pub fn in_component(mut self, project: &str, component: &str) -> Self {
        self.project = Some(project.to_string());
        self.component = Some(component.to_string());
        self
    }

    pub fn duplicate_of(mut self, original: u64) -> Self {
        self.opened = false;
        self.original = Some(original);
        self
    }
}

pub struct MemoryTracker {
    identity: TrackerIdentity,
    rules: RedactionRules,
    records: RefCell<BTreeMap<u64, Record>>,
    populates: RefCell<BTreeMap<(u64, Option<Field>), usize>>,
    mutations: Cell<usize>,
}

impl MemoryTracker {
    pub fn new(name: &str, url: Option<&str>) -> Self {
        Self::with_rules(name, url, &[], &[])
    }

    pub fn with_rules(
        name: &str,
        url: Option<&str>,
        redact: &[(&str, bool)],
        exemption: &[(&str, bool)],
    ) -> Self {
        let compile = |rules: &[(&str, bool)]| -> Vec<Rule> {
            rules
                .iter()
                .map(|(pattern, value)| Rule::new(pattern, *value).unwrap())
                .collect()
        };
        Self {
            identity: TrackerIdentity::new(name, url.map(str::to_string)),
            rules: RedactionRules::new(compile(redact), compile(exemption)),
            records: RefCell::new(BTreeMap::new()),
            populates: RefCell::new(BTreeMap::new()),
            mutations: Cell::new(0),
        }
    }

    pub fn insert(&self, id: u64, record: Record) {
        self.records.borrow_mut().insert(id, record);
    }

    pub fn record(&self, id: u64) -> Record {
        self.records.borrow().get(&id).cloned().unwrap_or_default()
    }

    /// Times `field` of issue `id` was populated.
    pub fn populate_count(&self, id: u64, field: Option<Field>) -> usize {
        self.populates.borrow().get(&(id, field)).copied().unwrap_or(0)
    }

    /// Calls to `set`, `relate`, `add_comment` and `cc_radar`.
    pub fn mutation_count(&self) -> usize {
        self.mutations.get()
    }

    pub fn link(&self, id: u64) -> String {
        match &self.identity.url {
            Some(url) => format!("{url}/issue/{id}"),
            None => format!("mem://{}/{id}", self.identity.name),
        }
    }

    fn bump(&self) {
        self.mutations.set(self.mutations.get() + 1);
    }

    fn issues(issue: &Issue, ids: impl IntoIterator<Item = u64>) -> Result<Vec<Rc<Issue>>> {
        ids.into_iter()
            .map(|id| Issue::new(id, Rc::clone(issue.tracker())).map(Rc::new))
            .collect()
    }
}

/// Shared handle plus the trait object issues hold.
pub fn handle(tracker: MemoryTracker) -> (Rc<MemoryTracker>, Rc<dyn Tracker>) {
    let concrete = Rc::new(tracker);
    let dynamic: Rc<dyn Tracker> = concrete.clone();
    (concrete, dynamic)
}

impl Tracker for MemoryTracker {
    fn identity(&self) -> &TrackerIdentity {
        &self.identity
    }

    fn populate(&self, issue: &Issue, field: Option<Field>) -> Result<()> {
        *self
            .populates
            .borrow_mut()
            .entry((issue.id(), field))
            .or_insert(0) += 1;

        let record = self.record(issue.id());
        let Some(field) = field else {
            issue.fields_mut().link.fill(self.link(issue.id()));
            return Ok(());
        };

        match field {
            Field::Duplicates => {
                let ids: Vec<u64> = self
                    .records
                    .borrow()
                    .iter()
                    .filter(|(_, r)| r.original == Some(issue.id()))
                    .map(|(id, _)| *id)
                    .collect();
                let duplicates = Self::issues(issue, ids)?;
                issue.fields_mut().duplicates.fill(duplicates);
            }
            Field::Original => {
                let original = Self::issues(issue, record.original)?.pop();
                issue.fields_mut().original.fill(original);
            }
            other => {
                let mut f = issue.fields_mut();
                match other {
                    Field::Link => {
                        f.link.fill(self.link(issue.id()));
                    }
                    Field::Title => {
                        f.title.fill(record.title);
                    }
                    Field::Timestamp => {
                        f.timestamp.fill(1_700_000_000 + issue.id());
                    }
                    Field::Modified => {
                        f.modified.fill(1_700_000_000 + issue.id());
                    }
                    Field::Creator => {
                        f.creator
                            .fill(Some(User::new("Tim", "tim@example.com", vec![])));
                    }
                    Field::Description => {
                        f.description.fill(format!("About {}", record.title));
                    }
                    Field::Opened => {
                        f.opened.fill(record.opened);
                    }
                    Field::State => {
                        f.state
                            .fill(if record.opened { "NEW" } else { "RESOLVED" }.to_string());
                    }
                    Field::Substate => {
                        f.substate.fill(None);
                    }
                    Field::Related => {
                        f.related.fill(bugbridge_core::Related::default());
                    }
                    Field::Assignee => {
                        f.assignee.fill(None);
                    }
                    Field::Watchers => {
                        f.watchers.fill(Vec::new());
                    }
                    Field::Comments => {
                        let comments = record
                            .comments
                            .iter()
                            .map(|text| Comment::new(None, None, Some(text.clone())).unwrap())
                            .collect();
                        f.comments.fill(comments);
                    }
                    Field::References => {
                        f.references.fill(Vec::new());
                    }
                    Field::RelatedLinks => {
                        f.related_links.fill(Vec::new());
                    }
                    Field::Labels => {
                        f.labels.fill(Vec::new());
                    }
                    Field::Project => {
                        f.project.fill(record.project);
                    }
                    Field::Component => {
                        f.component.fill(record.component);
                    }
                    Field::Version => {
                        f.version.fill(record.version);
                    }
                    Field::Milestone => {
                        f.milestone.fill(None);
                    }
                    Field::Keywords => {
                        f.keywords.fill(record.keywords);
                    }
                    Field::Classification => {
                        f.classification.fill(record.classification);
                    }
                    Field::SourceChanges => {
                        f.source_changes.fill(record.source_changes);
                    }
                    Field::Duplicates | Field::Original => {}
                }
            }
        }
        Ok(())
    }

    fn set(&self, issue: &Issue, update: &IssueUpdate) -> Result<bool> {
        self.bump();
        let mut records = self.records.borrow_mut();
        let record = records.entry(issue.id()).or_default();
        if let Some(opened) = update.opened {
            record.opened = opened;
        }
        if update.original.is_some() {
            record.original = update.original;
        }
        if let Some(why) = &update.why {
            record.comments.push(why.clone());
        }
        if let Some(keywords) = &update.keywords {
            record.keywords.clone_from(keywords);
        }
        if let Some(changes) = &update.source_changes {
            record.source_changes.clone_from(changes);
        }
        Ok(true)
    }

    fn relate(&self, _issue: &Issue, _relations: &RelationUpdate) -> Result<bool> {
        self.bump();
        Ok(true)
    }

    fn add_comment(&self, issue: &Issue, text: &str) -> Result<Option<Comment>> {
        self.bump();
        if text.is_empty() {
            return Ok(None);
        }
        self.records
            .borrow_mut()
            .entry(issue.id())
            .or_default()
            .comments
            .push(text.to_string());
        Comment::new(None, None, Some(text.to_string())).map(Some)
    }

    fn cc_radar(&self, _issue: &Issue, _request: &CcRadar) -> Result<Option<u64>> {
        self.bump();
        Ok(None)
    }

    fn redaction_rules(&self) -> &RedactionRules {
        &self.rules
    }
}
