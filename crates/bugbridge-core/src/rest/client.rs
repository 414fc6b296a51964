//! [`Tracker`] implementation speaking the Bugzilla-style REST protocol.

use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap};
use std::rc::Rc;
use std::thread;
use std::time::{Duration, Instant};

use chrono::Utc;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use super::wire::{
    self, AddList, BugCreate, BugList, BugRecord, BugUpdate, CommentBody, CommentRecord,
    CommentsResponse, Created, FieldList, KeywordChange, ProductIds, ProductList, UsersResponse,
};
use super::{Request, Response, Transport};
use crate::config::{Credentials, TrackerConfig};
use crate::error::{Result, TrackerError};
use crate::model::{Comment, Field, Issue, IssueUpdate, Related, Relation, RelationUpdate, User};
use crate::redact::RedactionRules;
use crate::tracker::{CcRadar, Tracker, TrackerIdentity};

/// Default wait for the radar importer when blocking.
pub const DEFAULT_RADAR_TIMEOUT: Duration = Duration::from_secs(60);
const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Prefix of comments that register a source change.
pub const SOURCE_CHANGE_PREFIX: &str = "Committed ";

/// Fields needed to file a new issue. All text fields are required.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NewIssue {
    pub title: String,
    pub description: String,
    pub project: String,
    pub component: String,
    pub version: String,
    pub assignee: Option<String>,
    pub keywords: Vec<String>,
}

impl NewIssue {
    fn missing_field(&self) -> Option<&'static str> {
        [
            ("summary", &self.title),
            ("description", &self.description),
            ("product", &self.project),
            ("component", &self.component),
            ("version", &self.version),
        ]
        .into_iter()
        .find(|(_, value)| value.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Project metadata from `product/{id}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub id: u64,
    pub description: String,
    /// Component name to description.
    pub components: BTreeMap<String, String>,
    pub versions: Vec<String>,
}

/// A tracker reached through a [`Transport`].
pub struct RestTracker<T: Transport> {
    identity: TrackerIdentity,
    host: String,
    transport: T,
    credentials: Option<Credentials>,
    rules: RedactionRules,
    radar_importer: Option<String>,
    poll_interval: Duration,
    users: RefCell<HashMap<String, User>>,
    duplicates_section: Regex,
    bug_link: Regex,
    radar_token: Regex,
}

impl<T: Transport> RestTracker<T> {
    /// Build a tracker from its configuration.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MissingField`] when the config has no URL and
    /// [`TrackerError::InvalidPattern`] when a rule or scraper pattern fails
    /// to compile.
    pub fn new(config: &TrackerConfig, transport: T) -> Result<Self> {
        let host = config
            .host()
            .ok_or_else(|| TrackerError::MissingField("url".to_string()))?
            .to_string();
        let compile = |pattern: &str| {
            Regex::new(pattern).map_err(|e| TrackerError::InvalidPattern {
                pattern: pattern.to_string(),
                reason: e.to_string(),
            })
        };
        Ok(Self {
            identity: config.identity(),
            credentials: config.resolve_credentials(),
            rules: RedactionRules::compile(&config.redact, &config.redact_exemption)?,
            radar_importer: config.radar_importer.clone(),
            poll_interval: DEFAULT_POLL_INTERVAL,
            users: RefCell::new(HashMap::new()),
            duplicates_section: compile(r#"(?s)<span id="duplicates">(.*?)</span>"#)?,
            bug_link: compile(r#"<a class="bz_bug_link[^"]*">(\d+)</a>"#)?,
            radar_token: compile(r"<rdar://problem/(\d+)>")?,
            host,
            transport,
        })
    }

    #[must_use]
    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    #[must_use]
    pub const fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    #[must_use]
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Display link for issue `id`.
    #[must_use]
    pub fn link_for(&self, id: u64) -> String {
        format!("https://{}/show_bug.cgi?id={id}", self.host)
    }

    // -- request plumbing -------------------------------------------------

    /// `https://{host}/{path}` with credentials spliced into the query.
    fn url(&self, path: &str, query: Option<&str>) -> String {
        let mut params: Vec<String> = Vec::new();
        if let Some(credentials) = &self.credentials {
            params.push(credentials.query());
        }
        if let Some(query) = query {
            params.push(query.to_string());
        }
        if params.is_empty() {
            format!("https://{}/{path}", self.host)
        } else {
            format!("https://{}/{path}?{}", self.host, params.join("&"))
        }
    }

    fn send(&self, request: Request, path: &str) -> Response {
        debug!(method = %request.method, host = %self.host, path, "sending request");
        let response = self.transport.send(&request);
        debug!(status = response.status, path, "received response");
        response
    }

    fn get_json<R: DeserializeOwned>(&self, path: &str, query: Option<&str>) -> Result<R> {
        let response = self.send(Request::get(self.url(path, query)), path);
        if response.is_success() {
            return response.json();
        }
        Err(self.failure(&response, path))
    }

    fn failure(&self, response: &Response, path: &str) -> TrackerError {
        let message = response
            .message()
            .unwrap_or_else(|| format!("{path} returned {}", response.status));
        match (response.status, response.error_code()) {
            (401, _) => TrackerError::Authentication(self.host.clone()),
            (404, _) => TrackerError::NotFound(message),
            (
                400,
                Some(wire::CODE_REOPEN_WITHOUT_COMMENT | wire::CODE_BUG_NOT_FOUND),
            ) => TrackerError::StateTransition(message),
            _ => TrackerError::Protocol(message),
        }
    }

    /// PUT an update. Rejections are logged and reported as `false`.
    fn put_bug(&self, issue: &Issue, update: &BugUpdate) -> bool {
        let path = format!("rest/bug/{}", issue.id());
        let body = serde_json::to_value(update).unwrap_or_default();
        let response = self.send(Request::put(self.url(&path, None), body), &path);
        if response.is_success() {
            info!(issue = issue.id(), "updated issue");
            return true;
        }
        let error = self.failure(&response, &path);
        warn!(
            issue = issue.id(),
            status = response.status,
            code = %error.code(),
            "update rejected: {error}"
        );
        false
    }

    fn new_issue(issue: &Issue, id: u64) -> Result<Rc<Issue>> {
        Issue::new(id, Rc::clone(issue.tracker())).map(Rc::new)
    }

    fn new_issues(issue: &Issue, ids: &[u64]) -> Result<Vec<Rc<Issue>>> {
        ids.iter().map(|id| Self::new_issue(issue, *id)).collect()
    }

    // -- users ------------------------------------------------------------

    /// Resolve a login name to a user. `None` when the server does not know it.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Protocol`] on an undecodable response.
    pub fn user(&self, username: &str) -> Result<Option<User>> {
        if let Some(user) = self.users.borrow().get(username) {
            return Ok(Some(user.clone()));
        }
        let query = format!("names={}", urlencoding::encode(username));
        let response: UsersResponse = match self.get_json("rest/user", Some(&query)) {
            Ok(response) => response,
            Err(TrackerError::NotFound(message)) => {
                debug!(username, "{message}");
                return Ok(None);
            }
            Err(e) => return Err(e),
        };
        let Some(detail) = response.users.first() else {
            return Ok(None);
        };
        let mut user = detail.to_user();
        if user.emails.is_empty() && username.contains('@') {
            user.emails.push(username.to_string());
        }
        self.remember(&user);
        Ok(Some(user))
    }

    fn remember(&self, user: &User) {
        self.users
            .borrow_mut()
            .entry(user.username.clone())
            .or_insert_with(|| user.clone());
    }

    fn user_or_placeholder(&self, username: &str) -> Result<User> {
        Ok(self
            .user(username)?
            .unwrap_or_else(|| User::new(username, username, Vec::new())))
    }

    /// The account the credentials belong to.
    fn me(&self) -> Result<Option<User>> {
        match &self.credentials {
            Some(credentials) => self.user(&credentials.username),
            None => Ok(None),
        }
    }

    // -- reads ------------------------------------------------------------

    fn fetch_bug(&self, id: u64) -> Result<BugRecord> {
        let list: BugList = self.get_json(&format!("rest/bug/{id}"), None)?;
        list.bugs
            .into_iter()
            .next()
            .ok_or_else(|| TrackerError::Protocol(format!("no record for bug {id}")))
    }

    fn fetch_comments(&self, id: u64) -> Result<Vec<CommentRecord>> {
        let mut response: CommentsResponse =
            self.get_json(&format!("rest/bug/{id}/comment"), None)?;
        Ok(response
            .bugs
            .remove(&id.to_string())
            .map(|block| block.comments)
            .unwrap_or_default())
    }

    fn populate_bug(&self, issue: &Issue) -> Result<()> {
        let bug = self.fetch_bug(issue.id())?;
        let time = |raw: &str| {
            wire::parse_time(raw)
                .ok_or_else(|| TrackerError::Protocol(format!("unparseable time '{raw}'")))
        };
        let timestamp = time(&bug.creation_time)?;
        let modified = if bug.last_change_time.is_empty() {
            timestamp
        } else {
            time(&bug.last_change_time)?
        };

        let creator = bug.creator_detail.as_ref().map(wire::UserDetail::to_user);
        let assignee = bug.assigned_to_detail.as_ref().map(wire::UserDetail::to_user);
        let watchers: Vec<User> = bug.cc_detail.iter().map(wire::UserDetail::to_user).collect();
        for user in creator.iter().chain(assignee.iter()).chain(watchers.iter()) {
            self.remember(user);
        }

        let original = bug.dupe_of.map(|id| Self::new_issue(issue, id)).transpose()?;
        let related = Related {
            blocks: Self::new_issues(issue, &bug.blocks)?,
            depends_on: Self::new_issues(issue, &bug.depends_on)?,
            regressions: Self::new_issues(issue, &bug.regressions)?,
            regressed_by: Self::new_issues(issue, &bug.regressed_by)?,
        };

        let same_host = format!("https://{}/show_bug.cgi?id=", self.host);
        let mut reference_ids = Vec::new();
        let mut related_links = Vec::new();
        for link in &bug.see_also {
            match link.strip_prefix(&same_host).and_then(|id| id.parse::<u64>().ok()) {
                Some(id) => reference_ids.push(id),
                None => related_links.push(link.clone()),
            }
        }
        let references = Self::new_issues(issue, &reference_ids)?;
        let substate = (!bug.resolution.is_empty()).then(|| bug.resolution.clone());

        let mut fields = issue.fields_mut();
        fields.title.fill(bug.summary);
        fields.timestamp.fill(timestamp);
        fields.modified.fill(modified);
        fields.creator.fill(creator);
        fields.opened.fill(wire::is_open_status(&bug.status));
        fields.state.fill(bug.status);
        fields.substate.fill(substate);
        fields.original.fill(original);
        fields.related.fill(related);
        fields.assignee.fill(assignee);
        fields.watchers.fill(watchers);
        fields.references.fill(references);
        fields.related_links.fill(related_links);
        fields.project.fill(bug.product);
        fields.component.fill(bug.component);
        fields.version.fill(bug.version);
        fields.classification.fill(bug.classification);
        fields.keywords.fill(bug.keywords);
        Ok(())
    }

    fn populate_comments(&self, issue: &Issue) -> Result<()> {
        let records = self.fetch_comments(issue.id())?;
        let mut description = None;
        let mut comments = Vec::with_capacity(records.len().saturating_sub(1));
        for record in records {
            if description.is_none() {
                let first = Comment::from_wire(None, None, Some(&record.text))?;
                description = Some(first.content().unwrap_or_default().to_string());
                continue;
            }
            let user = self.user_or_placeholder(&record.creator)?;
            let timestamp = wire::parse_time(&record.time).map(Value::from);
            comments.push(Comment::from_wire(
                Some(user),
                timestamp.as_ref(),
                Some(&record.text),
            )?);
        }

        let source_changes = comments
            .iter()
            .filter_map(Comment::content)
            .flat_map(str::lines)
            .filter_map(|line| line.strip_prefix(SOURCE_CHANGE_PREFIX))
            .map(str::to_string)
            .collect();

        let mut fields = issue.fields_mut();
        fields.description.fill(description.unwrap_or_default());
        fields.comments.fill(comments);
        fields.source_changes.fill(source_changes);
        Ok(())
    }

    fn populate_duplicates(&self, issue: &Issue) -> Result<()> {
        let path = "show_bug.cgi";
        let query = format!("id={}", issue.id());
        let response = self.send(Request::get(self.url(path, Some(&query))), path);
        if !response.is_success() {
            return Err(TrackerError::NotFound(format!(
                "Bug #{} does not exist.",
                issue.id()
            )));
        }
        let ids: Vec<u64> = self
            .duplicates_section
            .captures(&response.text)
            .and_then(|section| section.get(1))
            .map(|section| {
                self.bug_link
                    .captures_iter(section.as_str())
                    .filter_map(|c| c.get(1).and_then(|m| m.as_str().parse().ok()))
                    .collect()
            })
            .unwrap_or_default();
        let duplicates = Self::new_issues(issue, &ids)?;
        issue.fields_mut().duplicates.fill(duplicates);
        Ok(())
    }

    // -- radar ------------------------------------------------------------

    /// Radar id announced by the importer account in the issue's comments.
    fn announced_radar(&self, id: u64, importer: &str) -> Result<Option<u64>> {
        Ok(self
            .fetch_comments(id)?
            .iter()
            .filter(|record| record.creator == importer)
            .find_map(|record| {
                record
                    .text
                    .as_str()
                    .and_then(|text| self.radar_token.captures(text))
                    .and_then(|c| c.get(1))
                    .and_then(|m| m.as_str().parse().ok())
            }))
    }

    // -- metadata ---------------------------------------------------------

    /// File a new issue and return its id.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::MissingField`] before contacting the server if
    /// a required field is empty, [`TrackerError::Authentication`] on 401,
    /// and [`TrackerError::Protocol`] for other rejections.
    pub fn create(&self, new: &NewIssue) -> Result<u64> {
        if let Some(field) = new.missing_field() {
            return Err(TrackerError::MissingField(field.to_string()));
        }
        let body = BugCreate {
            summary: Some(new.title.clone()),
            description: Some(new.description.clone()),
            product: Some(new.project.clone()),
            component: Some(new.component.clone()),
            version: Some(new.version.clone()),
            assigned_to: new.assignee.clone(),
            keywords: new.keywords.clone(),
        };
        let path = "rest/bug";
        let json = serde_json::to_value(&body).unwrap_or_default();
        let response = self.send(Request::post(self.url(path, None), json), path);
        if !response.is_success() {
            return Err(self.failure(&response, path));
        }
        let created: Created = response.json()?;
        info!(issue = created.id, title = %new.title, "created issue");
        Ok(created.id)
    }

    /// Projects the current user may file against, keyed by name.
    ///
    /// # Errors
    ///
    /// Propagates protocol failures.
    pub fn projects(&self) -> Result<BTreeMap<String, Project>> {
        let ids: ProductIds = self.get_json("rest/product_enterable", None)?;
        let mut projects = BTreeMap::new();
        for id in ids.ids {
            let list: ProductList = self.get_json(&format!("rest/product/{id}"), None)?;
            for product in list.products.into_iter().filter(|p| p.is_active) {
                projects.insert(
                    product.name,
                    Project {
                        id,
                        description: product.description,
                        components: product
                            .components
                            .into_iter()
                            .filter(|c| c.is_active)
                            .map(|c| (c.name, c.description))
                            .collect(),
                        versions: product
                            .versions
                            .into_iter()
                            .filter(|v| v.is_active)
                            .map(|v| v.name)
                            .collect(),
                    },
                );
            }
        }
        Ok(projects)
    }

    /// Keywords the tracker accepts.
    ///
    /// # Errors
    ///
    /// Propagates protocol failures.
    pub fn keywords(&self) -> Result<Vec<String>> {
        let list: FieldList = self.get_json("rest/field/bug/keywords", None)?;
        Ok(list
            .fields
            .into_iter()
            .filter(|field| field.name == "keywords")
            .flat_map(|field| field.values)
            .map(|value| value.name)
            .collect())
    }
}

/// Fill every relation list `body` leaves out with the issue's current one.
/// The server drops any list an update does not carry.
fn keep_relations(issue: &Issue, body: &mut BugUpdate) -> Result<()> {
    let current = issue.related()?;
    for (relation, list) in [
        (Relation::Blocks, &mut body.blocks),
        (Relation::DependsOn, &mut body.depends_on),
        (Relation::Regressions, &mut body.regressions),
        (Relation::RegressedBy, &mut body.regressed_by),
    ] {
        if list.is_none() {
            *list = Some(current.ids(relation));
        }
    }
    Ok(())
}

impl<T: Transport> Tracker for RestTracker<T> {
    fn identity(&self) -> &TrackerIdentity {
        &self.identity
    }

    fn populate(&self, issue: &Issue, field: Option<Field>) -> Result<()> {
        match field {
            None | Some(Field::Link) => {
                issue.fields_mut().link.fill(self.link_for(issue.id()));
                Ok(())
            }
            Some(Field::Description | Field::Comments | Field::SourceChanges) => {
                self.populate_comments(issue)
            }
            Some(Field::Duplicates) => self.populate_duplicates(issue),
            Some(Field::Labels) => {
                issue.fields_mut().labels.fill(Vec::new());
                Ok(())
            }
            Some(Field::Milestone) => {
                issue.fields_mut().milestone.fill(None);
                Ok(())
            }
            Some(_) => self.populate_bug(issue),
        }
    }

    fn set(&self, issue: &Issue, update: &IssueUpdate) -> Result<bool> {
        if update.labels.is_some() {
            warn!(issue = issue.id(), "{} does not support labels", self.identity.name);
            return Ok(false);
        }

        let mut body = BugUpdate::default();
        match update.opened {
            Some(true) => body.status = Some(wire::STATUS_REOPENED.to_string()),
            Some(false) => {
                body.status = Some(wire::STATUS_RESOLVED.to_string());
                body.resolution = Some(
                    if update.original.is_some() {
                        wire::RESOLUTION_DUPLICATE
                    } else {
                        wire::RESOLUTION_FIXED
                    }
                    .to_string(),
                );
                body.dupe_of = update.original;
            }
            None => {}
        }
        if let Some(state) = &update.state {
            body.status = Some(state.clone());
        }
        if let Some(substate) = &update.substate {
            body.resolution = Some(substate.clone());
        }
        body.assigned_to = update.assignee.as_ref().map(|user| user.username.clone());
        body.product.clone_from(&update.project);
        body.component.clone_from(&update.component);
        body.version.clone_from(&update.version);
        if let Some(keywords) = &update.keywords {
            body.keywords = Some(KeywordChange {
                set: Some(keywords.clone()),
                add: None,
            });
        }
        if let Some(links) = &update.related_links {
            body.see_also = Some(AddList { add: links.clone() });
        }

        let mut lines: Vec<String> = update.why.iter().cloned().collect();
        if let Some(changes) = &update.source_changes {
            let existing = issue.source_changes()?;
            lines.extend(
                changes
                    .iter()
                    .filter(|change| !existing.contains(change))
                    .map(|change| format!("{SOURCE_CHANGE_PREFIX}{change}")),
            );
        }
        if !lines.is_empty() {
            body.comment = Some(CommentBody {
                body: lines.join("\n\n"),
            });
        }

        if body.is_empty() {
            debug!(issue = issue.id(), "nothing to update");
            return Ok(false);
        }
        keep_relations(issue, &mut body)?;
        Ok(self.put_bug(issue, &body))
    }

    fn relate(&self, issue: &Issue, relations: &RelationUpdate) -> Result<bool> {
        if relations.is_empty() {
            return Ok(false);
        }
        // The server clears every relation list on each update, so all four
        // are always sent in full. See `keep_relations`.
        let current = issue.related()?;
        let merged = |relation: Relation| {
            let mut ids = current.ids(relation);
            for id in relations.get(relation).unwrap_or_default() {
                if !ids.contains(id) {
                    ids.push(*id);
                }
            }
            ids
        };
        let body = BugUpdate {
            blocks: Some(merged(Relation::Blocks)),
            depends_on: Some(merged(Relation::DependsOn)),
            regressions: Some(merged(Relation::Regressions)),
            regressed_by: Some(merged(Relation::RegressedBy)),
            ..BugUpdate::default()
        };
        Ok(self.put_bug(issue, &body))
    }

    fn add_comment(&self, issue: &Issue, text: &str) -> Result<Option<Comment>> {
        let path = format!("rest/bug/{}/comment", issue.id());
        let response = self.send(
            Request::post(self.url(&path, None), json!({ "comment": text })),
            &path,
        );
        if !response.is_success() {
            warn!(
                issue = issue.id(),
                status = response.status,
                "comment rejected: {}",
                response.message().unwrap_or_default()
            );
            return Ok(None);
        }
        let created: Created = response.json()?;
        info!(issue = issue.id(), comment = created.id, "posted comment");
        Comment::new(self.me()?, Some(Utc::now().timestamp()), Some(text.to_string())).map(Some)
    }

    fn cc_radar(&self, issue: &Issue, request: &CcRadar) -> Result<Option<u64>> {
        if let Some(radar) = request.radar {
            let mut body = BugUpdate {
                keywords: Some(KeywordChange {
                    set: None,
                    add: Some(vec![wire::KEYWORD_IN_RADAR.to_string()]),
                }),
                comment: Some(CommentBody {
                    body: format!("<rdar://problem/{radar}>"),
                }),
                ..BugUpdate::default()
            };
            keep_relations(issue, &mut body)?;
            return Ok(self.put_bug(issue, &body).then_some(radar));
        }

        let Some(importer) = self.radar_importer.clone() else {
            warn!(issue = issue.id(), "no radar importer configured for {}", self.identity.name);
            return Ok(None);
        };
        let mut body = BugUpdate {
            cc: Some(AddList {
                add: vec![importer.clone()],
            }),
            ..BugUpdate::default()
        };
        keep_relations(issue, &mut body)?;
        if !self.put_bug(issue, &body) {
            return Ok(None);
        }

        let deadline = Instant::now() + request.timeout.unwrap_or(DEFAULT_RADAR_TIMEOUT);
        loop {
            if let Some(radar) = self.announced_radar(issue.id(), &importer)? {
                info!(issue = issue.id(), radar, "radar linked");
                return Ok(Some(radar));
            }
            if !request.block {
                return Ok(None);
            }
            if Instant::now() >= deadline {
                warn!(
                    issue = issue.id(),
                    "timed out waiting for {importer} to link a radar"
                );
                return Ok(None);
            }
            thread::sleep(self.poll_interval);
        }
    }

    fn redaction_rules(&self) -> &RedactionRules {
        &self.rules
    }
}
