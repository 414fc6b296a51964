//! The reference backend: an in-memory protocol engine behind [`Transport`].
//!
//! Requests are routed by URL, authenticated from the query credentials,
//! validated in full, and only then applied to [`BackendState`]. Responses
//! mirror the real tracker's payload shapes and error wording.

use std::cell::{Ref, RefCell};
use std::collections::BTreeMap;

use bugbridge_core::rest::wire::{
    self, BugCreate, BugList, BugRecord, BugUpdate, CommentBlock, CommentRecord,
    CommentsResponse, ComponentRecord, Created, FieldList, FieldRecord, FieldValue, NewComment,
    ProductIds, ProductList, ProductRecord, UserDetail, UsersResponse, VersionRecord,
};
use bugbridge_core::rest::{Method, Request, Response, Transport};
use bugbridge_core::{TrackerError, User};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::clock::{ClockConfig, SessionClock};
use crate::radar::{RadarRecord, RadarSim};
use crate::routes::{Route, Router};
use crate::state::{BackendState, CommentEntry, IssueRecord, ProjectRecord, RelatedIds};
use crate::users::UserDirectory;

pub const REOPEN_WITHOUT_COMMENT: &str =
    "You have to specify a comment when changing the Status of a bug from RESOLVED to REOPENED.";

/// Whether `user` is a radar importer account.
#[must_use]
pub fn is_radar_importer(user: &User) -> bool {
    user.name.contains("Radar") && user.name.contains("Bug Importer")
}

// ---------------------------------------------------------------------------
// Builder
// ---------------------------------------------------------------------------

/// Seeds a [`ReferenceBackend`].
#[derive(Debug, Clone)]
pub struct ReferenceBackendBuilder {
    host: String,
    users: UserDirectory,
    issues: BTreeMap<u64, IssueRecord>,
    projects: BTreeMap<String, ProjectRecord>,
    radar: Option<RadarSim>,
    clock: ClockConfig,
}

impl ReferenceBackendBuilder {
    #[must_use]
    pub fn host(mut self, host: &str) -> Self {
        self.host = host.to_string();
        self
    }

    /// Register an account. `None` accepts any password.
    #[must_use]
    pub fn user(mut self, user: User, password: Option<&str>) -> Self {
        self.users.add(user, password.map(str::to_string));
        self
    }

    #[must_use]
    pub fn issue(mut self, issue: IssueRecord) -> Self {
        self.issues.insert(issue.id, issue);
        self
    }

    #[must_use]
    pub fn project(mut self, name: &str, project: ProjectRecord) -> Self {
        self.projects.insert(name.to_string(), project);
        self
    }

    /// Register the companion radar tracker.
    #[must_use]
    pub fn with_radar(mut self, radar: RadarSim) -> Self {
        self.radar = Some(radar);
        self
    }

    #[must_use]
    pub const fn clock(mut self, clock: ClockConfig) -> Self {
        self.clock = clock;
        self
    }

    /// Build the backend.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::InvalidPattern`] if the host cannot be routed.
    pub fn build(self) -> Result<ReferenceBackend, TrackerError> {
        let router = Router::new(&self.host).map_err(|e| TrackerError::InvalidPattern {
            pattern: self.host.clone(),
            reason: e.to_string(),
        })?;
        let state = BackendState::new(self.users, self.issues, self.projects);
        debug!(
            host = %self.host,
            issues = state.issues.len(),
            comment_counter = state.comment_counter,
            "reference backend ready"
        );
        Ok(ReferenceBackend {
            host: self.host,
            router,
            clock: SessionClock::new(self.clock),
            state: RefCell::new(state),
            radar: RefCell::new(self.radar),
        })
    }
}

// ---------------------------------------------------------------------------
// Backend
// ---------------------------------------------------------------------------

/// In-memory tracker emulating the REST protocol.
#[derive(Debug)]
pub struct ReferenceBackend {
    host: String,
    router: Router,
    clock: SessionClock,
    state: RefCell<BackendState>,
    radar: RefCell<Option<RadarSim>>,
}

impl ReferenceBackend {
    #[must_use]
    pub fn builder() -> ReferenceBackendBuilder {
        ReferenceBackendBuilder {
            host: "bugs.example.com".to_string(),
            users: UserDirectory::new(),
            issues: BTreeMap::new(),
            projects: BTreeMap::new(),
            radar: None,
            clock: ClockConfig::default(),
        }
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Base URL, suitable for a tracker config.
    #[must_use]
    pub fn url(&self) -> String {
        format!("https://{}", self.host)
    }

    /// Snapshot of one issue record.
    #[must_use]
    pub fn issue_record(&self, id: u64) -> Option<IssueRecord> {
        self.state.borrow().issues.get(&id).cloned()
    }

    /// Id of the most recent comment.
    #[must_use]
    pub fn comment_count(&self) -> u64 {
        self.state.borrow().comment_counter
    }

    /// The companion radar tracker, if registered.
    #[must_use]
    pub fn radar(&self) -> Ref<'_, Option<RadarSim>> {
        self.radar.borrow()
    }

    #[must_use]
    pub fn state(&self) -> Ref<'_, BackendState> {
        self.state.borrow()
    }

    #[must_use]
    pub const fn clock(&self) -> &SessionClock {
        &self.clock
    }

    fn authenticate(&self, credentials: Option<&str>) -> Option<User> {
        let login = self.router.login(credentials?)?;
        self.state
            .borrow()
            .users
            .authenticate(&login.login, &login.password)
            .cloned()
    }

    fn bug_not_found(id: u64) -> Response {
        Response::error(404, Some(wire::CODE_BUG_NOT_FOUND), &format!("Bug #{id} does not exist."))
    }

    fn link(&self, id: u64) -> String {
        format!("https://{}/show_bug.cgi?id={id}", self.host)
    }

    fn dispatch(&self, method: Method, route: Route, body: Option<&Value>) -> Response {
        match (method, route) {
            (_, Route::User { username, .. }) => self.get_user(&username),
            (Method::Put, Route::Bug { id, credentials }) => {
                self.put_bug(id, credentials.as_deref(), body)
            }
            (_, Route::Bug { id, .. }) => self.get_bug(id),
            (_, Route::SeeAlso { id }) => self.get_see_also(id),
            (Method::Post, Route::Comments { id, credentials }) => {
                self.post_comment(id, credentials.as_deref(), body)
            }
            (_, Route::Comments { id, .. }) => self.get_comments(id),
            (_, Route::ProductEnterable) => self.get_product_ids(),
            (_, Route::Product { id }) => self.get_product(id),
            (_, Route::Field { .. }) => Self::get_fields(),
            (_, Route::CreateBug { credentials }) => self.create_bug(credentials.as_deref(), body),
            (_, Route::ShowBug { id }) => self.show_bug(id),
        }
    }

    // -- reads ------------------------------------------------------------

    fn get_user(&self, username: &str) -> Response {
        let state = self.state.borrow();
        match state.users.get(username) {
            Some(user) => Response::from_json(&UsersResponse {
                users: vec![UserDetail::from_user(user)],
            }),
            None => Response::error(
                404,
                Some(wire::CODE_USER_NOT_FOUND),
                &format!(
                    "There is no user named '{username}'. Either you mis-typed the name or that \
                     user has not yet registered for a Bugzilla account."
                ),
            ),
        }
    }

    fn bug_record(&self, issue: &IssueRecord) -> BugRecord {
        let detail = |user: &User| UserDetail::from_user(user);
        BugRecord {
            id: issue.id,
            summary: issue.title.clone(),
            creation_time: wire::format_time(issue.timestamp),
            last_change_time: wire::format_time(issue.modified.max(issue.timestamp)),
            status: issue.status.clone(),
            resolution: issue.resolution().to_string(),
            dupe_of: issue.original,
            creator: issue.creator.username.clone(),
            creator_detail: Some(detail(&issue.creator)),
            assigned_to: issue.assignee.as_ref().map(|u| u.username.clone()),
            assigned_to_detail: issue.assignee.as_ref().map(detail),
            cc: issue.watchers.iter().map(|u| u.username.clone()).collect(),
            cc_detail: issue.watchers.iter().map(detail).collect(),
            product: issue.project.clone(),
            component: issue.component.clone(),
            version: issue.version.clone(),
            classification: issue.classification.clone(),
            keywords: issue.keywords.clone(),
            depends_on: issue.related.depends_on.clone(),
            blocks: issue.related.blocks.clone(),
            regressed_by: issue.related.regressed_by.clone(),
            regressions: issue.related.regressions.clone(),
            see_also: issue
                .references
                .iter()
                .map(|id| self.link(*id))
                .chain(issue.related_links.iter().cloned())
                .collect(),
        }
    }

    fn get_bug(&self, id: u64) -> Response {
        let state = self.state.borrow();
        match state.issues.get(&id) {
            Some(issue) => Response::from_json(&BugList {
                bugs: vec![self.bug_record(issue)],
            }),
            None => Self::bug_not_found(id),
        }
    }

    fn get_see_also(&self, id: u64) -> Response {
        let state = self.state.borrow();
        let Some(issue) = state.issues.get(&id) else {
            return Self::bug_not_found(id);
        };
        Response::from_json(&BugList {
            bugs: vec![BugRecord {
                id,
                see_also: issue.references.iter().map(|r| self.link(*r)).collect(),
                ..BugRecord::default()
            }],
        })
    }

    fn get_comments(&self, id: u64) -> Response {
        let state = self.state.borrow();
        let Some(issue) = state.issues.get(&id) else {
            return Self::bug_not_found(id);
        };
        let record = |author: &User, timestamp: u64, text: &str| CommentRecord {
            bug_id: id,
            creator: author.username.clone(),
            creation_time: wire::format_time(timestamp),
            time: wire::format_time(timestamp),
            text: Value::from(text),
        };
        let comments = std::iter::once(record(&issue.creator, issue.timestamp, &issue.description))
            .chain(
                issue
                    .comments
                    .iter()
                    .map(|c| record(&c.author, c.timestamp, &c.text)),
            )
            .collect();
        let mut bugs = BTreeMap::new();
        bugs.insert(id.to_string(), CommentBlock { comments });
        Response::from_json(&CommentsResponse { bugs })
    }

    fn get_product_ids(&self) -> Response {
        Response::from_json(&ProductIds {
            ids: self.state.borrow().projects.values().map(|p| p.id).collect(),
        })
    }

    fn get_product(&self, id: u64) -> Response {
        let state = self.state.borrow();
        let products = state
            .projects
            .iter()
            .filter(|(_, project)| project.id == id)
            .map(|(name, project)| ProductRecord {
                name: name.clone(),
                description: project.description.clone(),
                is_active: true,
                components: project
                    .components
                    .iter()
                    .map(|(name, description)| ComponentRecord {
                        name: name.clone(),
                        description: description.clone(),
                        is_active: true,
                    })
                    .collect(),
                versions: project
                    .versions
                    .iter()
                    .map(|name| VersionRecord {
                        name: name.clone(),
                        is_active: true,
                    })
                    .collect(),
            })
            .collect();
        Response::from_json(&ProductList { products })
    }

    fn get_fields() -> Response {
        Response::from_json(&FieldList {
            fields: vec![FieldRecord {
                id: 10,
                name: "keywords".to_string(),
                kind: 8,
                display_name: "Keywords".to_string(),
                values: vec![FieldValue {
                    name: wire::KEYWORD_IN_RADAR.to_string(),
                }],
            }],
        })
    }

    fn show_bug(&self, id: u64) -> Response {
        let state = self.state.borrow();
        let Some(issue) = state.issues.get(&id) else {
            return Response::html(
                404,
                "<!DOCTYPE html>\n<html lang=\"en\">\n\
                 <head><title>Missing Bug ID</title></head>\n</html>\n"
                    .to_string(),
            );
        };
        let mut html = format!(
            "<!DOCTYPE html>\n<html lang=\"en\">\n<head><title>{id} {}</title></head>\n<body>\n",
            issue.title
        );
        let duplicates = state.duplicates_of(id);
        if !duplicates.is_empty() {
            html.push_str(&format!(
                "<th class=\"field_label\"><label>Duplicates ({})</label>:</th>\n\
                 <td class=\"field_value\">\n<span id=\"duplicates\">\n",
                duplicates.len()
            ));
            for duplicate in duplicates {
                html.push_str(&format!(
                    "<a class=\"bz_bug_link bz_closed\">{duplicate}</a>\n"
                ));
            }
            html.push_str("</span>\n</td>\n");
        }
        html.push_str("</body>\n</html>\n");
        Response::html(200, html)
    }

    // -- writes -----------------------------------------------------------

    fn put_bug(&self, id: u64, credentials: Option<&str>, body: Option<&Value>) -> Response {
        if !self.state.borrow().issues.contains_key(&id) {
            return Self::bug_not_found(id);
        }
        let Some(user) = self.authenticate(credentials) else {
            return Response::status_only(401);
        };
        let update: BugUpdate = match body.cloned().map(serde_json::from_value).transpose() {
            Ok(update) => update.unwrap_or_default(),
            Err(e) => return Response::error(400, None, &format!("Invalid update: {e}")),
        };
        if update.is_empty() {
            return self.get_bug(id);
        }
        if let Err(rejection) = self.validate_update(id, &update) {
            return rejection;
        }
        self.apply_update(id, &user, &update);
        info!(issue = id, user = %user.username, "applied update");
        self.get_bug(id)
    }

    /// Every rejection is decided here, before anything is mutated.
    fn validate_update(&self, id: u64, update: &BugUpdate) -> Result<(), Response> {
        let state = self.state.borrow();
        let Some(issue) = state.issues.get(&id) else {
            return Err(Self::bug_not_found(id));
        };

        if update
            .keywords
            .as_ref()
            .is_some_and(|k| k.set.is_some() && k.add.is_some())
        {
            return Err(Response::error(
                400,
                None,
                "Only one of 'set' or 'add' may be given for keywords.",
            ));
        }

        if let Some(status) = &update.status {
            let has_comment = update.comment.as_ref().is_some_and(|c| !c.body.is_empty());
            let reopening = !issue.opened() && wire::is_open_status(status);
            if reopening && status != wire::STATUS_REOPENED && !has_comment {
                warn!(issue = id, %status, "reopen without comment rejected");
                return Err(Response::error(
                    400,
                    Some(wire::CODE_REOPEN_WITHOUT_COMMENT),
                    REOPEN_WITHOUT_COMMENT,
                ));
            }
        }

        if let Some(original) = update.dupe_of.filter(|o| !state.issues.contains_key(o)) {
            return Err(Response::error(
                400,
                Some(wire::CODE_BUG_NOT_FOUND),
                &format!("Bug #{original} does not exist."),
            ));
        }
        Ok(())
    }

    fn apply_update(&self, id: u64, user: &User, update: &BugUpdate) {
        let mut state = self.state.borrow_mut();
        let now = self.clock.tick();
        let assignee = update
            .assigned_to
            .as_deref()
            .and_then(|key| state.users.get(key))
            .cloned();
        let watchers: Vec<User> = update
            .cc
            .iter()
            .flat_map(|cc| cc.add.iter())
            .filter_map(|key| state.users.get(key).cloned())
            .collect();
        let known_ids: Vec<u64> = state.issues.keys().copied().collect();
        let mut appended = 0_u64;

        let Some(issue) = state.issues.get_mut(&id) else {
            return;
        };
        if assignee.is_some() {
            issue.assignee = assignee;
        }
        if let Some(status) = &update.status {
            issue.status.clone_from(status);
            if issue.opened() {
                issue.original = None;
            } else if update.dupe_of.is_some() {
                issue.original = update.dupe_of;
            }
        }
        if let Some(comment) = update.comment.as_ref().filter(|c| !c.body.is_empty()) {
            issue.comments.push(CommentEntry {
                author: user.clone(),
                timestamp: now,
                text: comment.body.clone(),
            });
            appended += 1;
        }
        if update.product.is_some() {
            issue.project.clone_from(&update.product);
        }
        if update.component.is_some() {
            issue.component.clone_from(&update.component);
        }
        if update.version.is_some() {
            issue.version.clone_from(&update.version);
        }

        // TODO: every update clears all four relation lists before applying
        // the supplied ones; confirm whether clients rely on it before fixing.
        issue.related = RelatedIds::default();
        for (supplied, target) in [
            (&update.depends_on, &mut issue.related.depends_on),
            (&update.blocks, &mut issue.related.blocks),
            (&update.regressed_by, &mut issue.related.regressed_by),
            (&update.regressions, &mut issue.related.regressions),
        ] {
            if let Some(ids) = supplied.as_ref().filter(|ids| !ids.is_empty()) {
                target.clone_from(ids);
            }
        }

        if let Some(see_also) = &update.see_also {
            let same_host = format!("https://{}/show_bug.cgi?id=", self.host);
            add_see_also(issue, &see_also.add, &same_host, &known_ids);
        }

        let adding_in_radar = update
            .keywords
            .as_ref()
            .and_then(|k| k.add.as_ref())
            .is_some_and(|add| add.iter().any(|k| k == wire::KEYWORD_IN_RADAR));
        if let Some(keywords) = &update.keywords {
            apply_keywords(issue, keywords.set.as_deref(), keywords.add.as_deref());
        }

        for watcher in watchers {
            if issue.is_watched_by(&watcher) {
                continue;
            }
            issue.watchers.push(watcher.clone());
            if !is_radar_importer(&watcher) || adding_in_radar {
                continue;
            }
            let radar_id = self.file_radar(issue, &watcher, user, now);
            issue.comments.push(CommentEntry {
                author: watcher,
                timestamp: now,
                text: format!("<rdar://problem/{radar_id}>"),
            });
            appended += 1;
            info!(issue = id, radar = radar_id, "linked radar");
        }

        issue.modified = now;
        state.comment_counter += appended;
    }

    /// Create the linked radar record, or reuse the issue id when no radar
    /// tracker is registered.
    fn file_radar(&self, issue: &IssueRecord, importer: &User, requester: &User, now: u64) -> u64 {
        let mut radar = self.radar.borrow_mut();
        let Some(radar) = radar.as_mut() else {
            return issue.id;
        };
        radar.add(RadarRecord {
            id: 0,
            title: format!("{} ({})", issue.description, issue.id),
            timestamp: now,
            opened: true,
            creator: importer.clone(),
            assignee: Some(requester.clone()),
            description: format!(
                "From <{}>:\n\n{}",
                self.link(issue.id),
                issue.description
            ),
            project: issue.project.clone(),
            component: issue.component.clone(),
            watchers: vec![importer.clone(), requester.clone()],
            keywords: issue.keywords.clone(),
        })
    }

    fn post_comment(&self, id: u64, credentials: Option<&str>, body: Option<&Value>) -> Response {
        let Some(user) = self.authenticate(credentials) else {
            return Response::status_only(401);
        };
        let mut state = self.state.borrow_mut();
        if !state.issues.contains_key(&id) {
            return Response::not_found();
        }
        let text = body
            .cloned()
            .and_then(|value| serde_json::from_value::<NewComment>(value).ok())
            .and_then(|c| c.comment)
            .filter(|text| !text.is_empty());
        let Some(text) = text else {
            return Response::status_only(400);
        };

        let now = self.clock.tick();
        let comment_id = state.next_comment_id();
        if let Some(issue) = state.issues.get_mut(&id) {
            issue.comments.push(CommentEntry {
                author: user,
                timestamp: now,
                text,
            });
            issue.modified = now;
        }
        info!(issue = id, comment = comment_id, "comment posted");
        Response::with_status_json(201, &Created { id: comment_id })
    }

    fn create_bug(&self, credentials: Option<&str>, body: Option<&Value>) -> Response {
        let Some(user) = self.authenticate(credentials) else {
            return Response::status_only(401);
        };
        let create: BugCreate = body
            .cloned()
            .and_then(|value| serde_json::from_value(value).ok())
            .unwrap_or_default();
        let present = |field: &Option<String>| field.as_ref().is_some_and(|v| !v.is_empty());
        if ![
            &create.summary,
            &create.description,
            &create.product,
            &create.component,
            &create.version,
        ]
        .into_iter()
        .all(present)
        {
            return Response::with_status_json(
                400,
                &serde_json::json!({ "message": "Failed to create bug" }),
            );
        }

        let mut state = self.state.borrow_mut();
        let assignee = create
            .assigned_to
            .as_deref()
            .and_then(|key| state.users.get(key))
            .cloned();
        let id = state.next_issue_id();
        let now = self.clock.tick();
        let mut issue = IssueRecord::new(
            id,
            create.summary.as_deref().unwrap_or_default(),
            &user,
            create.description.as_deref().unwrap_or_default(),
        )
        .filed_at(now);
        issue.project = create.product;
        issue.component = create.component;
        issue.version = create.version;
        issue.keywords = create.keywords;
        if let Some(assignee) = &assignee {
            issue = issue.assigned_to(assignee);
        }
        state.issues.insert(id, issue);
        info!(issue = id, user = %user.username, "created issue");
        Response::from_json(&Created { id })
    }
}

/// Route each link to the issue's references when it names a known issue on
/// this host, otherwise to its external links.
fn add_see_also(issue: &mut IssueRecord, links: &[String], same_host: &str, known_ids: &[u64]) {
    for link in links {
        let reference = link
            .strip_prefix(same_host)
            .and_then(|raw| raw.parse::<u64>().ok())
            .filter(|other| known_ids.contains(other));
        match reference {
            Some(other) if !issue.references.contains(&other) => {
                issue.references.push(other);
            }
            Some(_) => {}
            None if !issue.related_links.contains(link) => {
                issue.related_links.push(link.clone());
            }
            None => {}
        }
    }
}

fn apply_keywords(issue: &mut IssueRecord, set: Option<&[String]>, add: Option<&[String]>) {
    if let Some(set) = set {
        issue.keywords = set.to_vec();
    } else if let Some(add) = add {
        for keyword in add {
            if !issue.keywords.contains(keyword) {
                issue.keywords.push(keyword.clone());
            }
        }
    }
}

impl Transport for ReferenceBackend {
    fn send(&self, request: &Request) -> Response {
        let Some(route) = self.router.resolve(request.method, &request.url) else {
            debug!(method = %request.method, "no route for request");
            return Response::not_found();
        };
        self.dispatch(request.method, route, request.json.as_ref())
    }
}
