//! `RestTracker` driven end to end against the reference backend.

use std::rc::Rc;
use std::time::Duration;

use bugbridge_core::{
    CcRadar, Credentials, Issue, NewIssue, Relation, RelationUpdate, RestTracker, Tracker,
    TrackerConfig, TrackerError,
};
use bugbridge_sim::ReferenceBackend;
use bugbridge_sim::fixtures::{self, FILED_AT};

type Client = RestTracker<Rc<ReferenceBackend>>;

fn session(backend: ReferenceBackend) -> (Rc<ReferenceBackend>, Rc<Client>, Rc<dyn Tracker>) {
    let backend = Rc::new(backend);
    let client = Rc::new(fixtures::tracker(Rc::clone(&backend)).unwrap());
    let tracker: Rc<dyn Tracker> = client.clone();
    (backend, client, tracker)
}

fn standard() -> (Rc<ReferenceBackend>, Rc<Client>, Rc<dyn Tracker>) {
    session(fixtures::backend().unwrap())
}

fn ids(issues: &[Rc<Issue>]) -> Vec<u64> {
    issues.iter().map(|issue| issue.id()).collect()
}

// ---------------------------------------------------------------------------
// Reads
// ---------------------------------------------------------------------------

#[test]
fn fields_populate_from_the_backend() {
    let (_, _, tracker) = standard();
    let issue = Issue::new(1, tracker).unwrap();

    assert_eq!(issue.link().unwrap(), "https://bugs.example.com/show_bug.cgi?id=1");
    assert_eq!(issue.title().unwrap(), "Example issue 1");
    assert_eq!(issue.timestamp().unwrap(), FILED_AT);
    assert_eq!(issue.modified().unwrap(), FILED_AT);
    assert_eq!(issue.creator().unwrap(), Some(fixtures::filer()));
    assert_eq!(issue.assignee().unwrap(), Some(fixtures::contributor()));
    assert!(issue.opened().unwrap());
    assert_eq!(issue.state().unwrap(), "NEW");
    assert_eq!(issue.substate().unwrap(), None);
    assert_eq!(issue.project().unwrap().as_deref(), Some("WebKit"));
    assert_eq!(issue.component().unwrap().as_deref(), Some("Text"));
    assert_eq!(issue.version().unwrap().as_deref(), Some("Other"));
    assert_eq!(issue.description().unwrap(), "An example issue for testing");
    assert!(issue.labels().unwrap().is_empty());
    assert_eq!(issue.milestone().unwrap(), None);

    let comments = issue.comments().unwrap();
    assert_eq!(comments.len(), 1);
    assert_eq!(comments[0].user(), Some(&fixtures::contributor()));
    assert_eq!(comments[0].timestamp(), Some(FILED_AT + 60));
    assert_eq!(comments[0].content(), Some("Was able to reproduce on my machine."));

    assert_eq!(issue.to_string(), "https://bugs.example.com/show_bug.cgi?id=1 Example issue 1");
}

#[test]
fn duplicates_are_scraped_and_agree_with_original() {
    let (_, _, tracker) = standard();
    let original = Issue::new(1, Rc::clone(&tracker)).unwrap();
    let duplicate = Issue::new(3, tracker).unwrap();

    assert_eq!(ids(&original.duplicates().unwrap()), vec![3]);
    assert_eq!(duplicate.original().unwrap().map(|o| o.id()), Some(1));
    assert_eq!(duplicate.substate().unwrap().as_deref(), Some("DUPLICATE"));
    assert!(!duplicate.opened().unwrap());
}

#[test]
fn unknown_issue_reads_fail() {
    let (_, _, tracker) = standard();
    let issue = Issue::new(404, tracker).unwrap();
    assert!(issue.link().is_ok());
    assert!(matches!(issue.title(), Err(TrackerError::NotFound(_))));
}

// ---------------------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------------------

#[test]
fn close_as_duplicate_then_reopen() {
    let (backend, _, tracker) = standard();
    let issue = Issue::new(2, Rc::clone(&tracker)).unwrap();
    let original = Issue::new(1, tracker).unwrap();
    assert_eq!(ids(&original.duplicates().unwrap()), vec![3]);

    assert!(issue.open(Some("Still happens.")).unwrap());
    assert_eq!(issue.state().unwrap(), "REOPENED");

    assert!(issue.close(Some("Same crash."), Some(&original)).unwrap());
    assert!(!issue.opened().unwrap());
    assert_eq!(issue.original().unwrap().map(|o| o.id()), Some(1));
    assert_eq!(ids(&original.duplicates().unwrap()), vec![2, 3]);

    let record = backend.issue_record(2).unwrap();
    assert_eq!(record.comments.len(), 2);
    assert_eq!(record.comments[1].text, "Same crash.");
}

#[test]
fn rejected_reopen_reports_false() {
    let (backend, _, tracker) = standard();
    let issue = Issue::new(2, tracker).unwrap();
    let before = backend.issue_record(2).unwrap();

    assert!(!issue.set_state("NEW", None).unwrap());
    assert_eq!(backend.issue_record(2).unwrap(), before);
    assert!(!issue.opened().unwrap());
}

#[test]
fn wrong_password_reports_false() {
    let backend = Rc::new(fixtures::backend().unwrap());
    let client: Rc<dyn Tracker> = Rc::new(
        RestTracker::new(&fixtures::tracker_config(), Rc::clone(&backend))
            .unwrap()
            .with_credentials(Credentials::new(fixtures::contributor().username, "wrong")),
    );
    let issue = Issue::new(1, client).unwrap();
    assert!(!issue.close(Some("done"), None).unwrap());
    assert!(issue.add_comment("hello").unwrap().is_none());
    assert!(backend.issue_record(1).unwrap().opened());
}

#[test]
fn labels_are_unsupported() {
    let (backend, _, tracker) = standard();
    let issue = Issue::new(1, tracker).unwrap();
    let before = backend.issue_record(1).unwrap();
    assert!(!issue.set_labels(vec!["Layout".into()]).unwrap());
    assert_eq!(backend.issue_record(1).unwrap(), before);
}

#[test]
fn assignment_and_component_changes() {
    let (backend, _, tracker) = standard();
    let issue = Issue::new(1, tracker).unwrap();
    assert_eq!(issue.component().unwrap().as_deref(), Some("Text"));

    assert!(issue.assign(&fixtures::watcher(), Some("Wendy owns scrolling.")).unwrap());
    assert!(issue.set_component(None, Some("Scrolling"), Some("WebKit Local Build")).unwrap());

    assert_eq!(issue.assignee().unwrap(), Some(fixtures::watcher()));
    assert_eq!(issue.component().unwrap().as_deref(), Some("Scrolling"));
    assert_eq!(issue.version().unwrap().as_deref(), Some("WebKit Local Build"));
    assert_eq!(backend.issue_record(1).unwrap().assignee, Some(fixtures::watcher()));
}

// ---------------------------------------------------------------------------
// Comments and source changes
// ---------------------------------------------------------------------------

#[test]
fn comments_are_appended_in_order() {
    let (backend, _, tracker) = standard();
    let issue = Issue::new(1, tracker).unwrap();
    let posted = issue.add_comment("Bisected.").unwrap().unwrap();
    assert_eq!(posted.user(), Some(&fixtures::contributor()));
    assert_eq!(posted.content(), Some("Bisected."));
    issue.add_comment("Patch up for review.").unwrap();

    let contents: Vec<String> = issue
        .comments()
        .unwrap()
        .iter()
        .filter_map(|c| c.content().map(str::to_string))
        .collect();
    assert_eq!(
        contents,
        ["Was able to reproduce on my machine.", "Bisected.", "Patch up for review."]
    );
    assert_eq!(backend.comment_count(), 7);
}

#[test]
fn empty_comment_is_rejected() {
    let (backend, _, tracker) = standard();
    let issue = Issue::new(1, tracker).unwrap();
    assert!(issue.add_comment("").unwrap().is_none());
    assert_eq!(backend.comment_count(), 5);
}

#[test]
fn source_changes_round_trip_through_comments() {
    let (backend, _, tracker) = standard();
    let issue = Issue::new(1, tracker).unwrap();
    let line = "Fix text crash, 251234@main (a1b2c3d4e5f6)";

    assert!(issue.add_source_change(line).unwrap());
    assert_eq!(issue.source_changes().unwrap(), vec![line.to_string()]);
    let last = backend.issue_record(1).unwrap().comments.last().unwrap().text.clone();
    assert_eq!(last, format!("Committed {line}"));

    let counter = backend.comment_count();
    assert!(!issue.add_source_change("Fix text crash, 251234@main (a1b2c3d4e5f6ffff)").unwrap());
    assert_eq!(backend.comment_count(), counter);
}

// ---------------------------------------------------------------------------
// Relations and links
// ---------------------------------------------------------------------------

#[test]
fn relations_accumulate_across_calls() {
    let (backend, _, tracker) = standard();
    let issue = Issue::new(1, tracker).unwrap();

    assert!(issue.relate(&RelationUpdate::new().with_id(Relation::Blocks, 2)).unwrap());
    assert!(issue.relate(&RelationUpdate::new().with_id(Relation::DependsOn, 3)).unwrap());

    let related = issue.related().unwrap();
    assert_eq!(related.ids(Relation::Blocks), vec![2]);
    assert_eq!(related.ids(Relation::DependsOn), vec![3]);
    let record = backend.issue_record(1).unwrap();
    assert_eq!(record.related.blocks, vec![2]);
    assert_eq!(record.related.depends_on, vec![3]);

    assert!(!issue.relate(&RelationUpdate::new()).unwrap());
}

#[test]
fn relations_survive_other_updates() {
    let (backend, _, tracker) = standard();
    let issue = Issue::new(1, Rc::clone(&tracker)).unwrap();
    assert!(issue.relate(&RelationUpdate::new().with_id(Relation::Blocks, 2)).unwrap());

    assert!(issue.set_keywords(vec!["InRadar".into()]).unwrap());
    assert!(issue.close(Some("Fixed in trunk."), None).unwrap());

    let record = backend.issue_record(1).unwrap();
    assert_eq!(record.related.blocks, vec![2]);
    assert_eq!(issue.related().unwrap().ids(Relation::Blocks), record.related.blocks);

    let fresh = Issue::new(1, tracker).unwrap();
    assert_eq!(fresh.related().unwrap().ids(Relation::Blocks), vec![2]);

    assert!(issue.relate(&RelationUpdate::new().with_id(Relation::DependsOn, 3)).unwrap());
    let record = backend.issue_record(1).unwrap();
    assert_eq!(record.related.blocks, vec![2]);
    assert_eq!(record.related.depends_on, vec![3]);
}

#[test]
fn related_links_split_into_references() {
    let (_, _, tracker) = standard();
    let issue = Issue::new(1, tracker).unwrap();
    assert!(issue
        .add_related_links(vec![
            "https://bugs.example.com/show_bug.cgi?id=2".into(),
            "https://trac.example.org/ticket/5".into(),
        ])
        .unwrap());

    assert_eq!(ids(&issue.references().unwrap()), vec![2]);
    assert_eq!(issue.related_links().unwrap(), vec!["https://trac.example.org/ticket/5"]);
}

// ---------------------------------------------------------------------------
// Radar
// ---------------------------------------------------------------------------

#[test]
fn cc_radar_links_through_the_importer() {
    let (backend, _, tracker) = session(fixtures::backend_with_radar().unwrap());
    let issue = Issue::new(1, tracker).unwrap();
    assert_eq!(issue.watchers().unwrap().len(), 2);

    assert_eq!(issue.cc_radar(&CcRadar::default()).unwrap(), Some(1));
    assert!(issue.watchers().unwrap().contains(&fixtures::radar_importer()));
    assert_eq!(
        issue.comments().unwrap().last().unwrap().content(),
        Some("<rdar://problem/1>")
    );
    assert_eq!(backend.radar().as_ref().unwrap().len(), 1);
}

#[test]
fn cc_radar_with_known_radar_skips_the_importer() {
    let (backend, _, tracker) = session(fixtures::backend_with_radar().unwrap());
    let issue = Issue::new(1, tracker).unwrap();
    let request = CcRadar {
        radar: Some(77),
        ..CcRadar::default()
    };
    assert_eq!(issue.cc_radar(&request).unwrap(), Some(77));
    assert!(issue.keywords().unwrap().contains(&"InRadar".to_string()));
    assert!(!issue.watchers().unwrap().contains(&fixtures::radar_importer()));
    assert!(backend.radar().as_ref().unwrap().is_empty());
    assert_eq!(
        backend.issue_record(1).unwrap().comments.last().unwrap().text,
        "<rdar://problem/77>"
    );
}

#[test]
fn blocking_cc_radar_gives_up_after_timeout() {
    let backend = Rc::new(fixtures::backend_with_radar().unwrap());
    let config = TrackerConfig {
        radar_importer: Some(fixtures::watcher().username),
        ..fixtures::tracker_config()
    };
    let tracker: Rc<dyn Tracker> = Rc::new(
        RestTracker::new(&config, Rc::clone(&backend))
            .unwrap()
            .with_credentials(Credentials::new(
                fixtures::contributor().username,
                fixtures::PASSWORD,
            ))
            .with_poll_interval(Duration::from_millis(1)),
    );
    let issue = Issue::new(1, tracker).unwrap();
    let request = CcRadar {
        block: true,
        timeout: Some(Duration::from_millis(20)),
        radar: None,
    };
    assert_eq!(issue.cc_radar(&request).unwrap(), None);
    assert!(backend.issue_record(1).unwrap().is_watched_by(&fixtures::watcher()));
}

// ---------------------------------------------------------------------------
// Metadata
// ---------------------------------------------------------------------------

fn new_issue() -> NewIssue {
    NewIssue {
        title: "Crash on launch".into(),
        description: "Launching crashes.".into(),
        project: "CFNetwork".into(),
        component: "IPv6".into(),
        version: "All".into(),
        assignee: Some(fixtures::watcher().username),
        keywords: Vec::new(),
    }
}

#[test]
fn create_validates_before_sending() {
    let (backend, client, _) = standard();
    let incomplete = NewIssue {
        version: String::new(),
        ..new_issue()
    };
    assert_eq!(
        client.create(&incomplete),
        Err(TrackerError::MissingField("version".into()))
    );
    assert_eq!(backend.state().issues.len(), 3);
    assert_eq!(backend.clock().now(), backend.clock().config().base_secs);
}

#[test]
fn created_issues_are_readable() {
    let (_, client, tracker) = standard();
    let id = client.create(&new_issue()).unwrap();
    assert_eq!(id, 4);

    let issue = Issue::new(id, tracker).unwrap();
    assert_eq!(issue.title().unwrap(), "Crash on launch");
    assert_eq!(issue.creator().unwrap(), Some(fixtures::contributor()));
    assert_eq!(issue.assignee().unwrap(), Some(fixtures::watcher()));
    assert_eq!(issue.description().unwrap(), "Launching crashes.");
}

#[test]
fn projects_and_keywords() {
    let (_, client, _) = standard();
    let projects = client.projects().unwrap();
    assert_eq!(projects.keys().collect::<Vec<_>>(), ["CFNetwork", "WebKit"]);
    let webkit = &projects["WebKit"];
    assert_eq!(webkit.id, 1);
    assert!(webkit.components.contains_key("Security"));
    assert_eq!(webkit.versions, vec!["Other", "WebKit Local Build"]);

    assert_eq!(client.keywords().unwrap(), vec!["InRadar"]);
}

#[test]
fn user_lookup() {
    let (_, client, _) = standard();
    assert_eq!(client.user("wwatcher@example.com").unwrap(), Some(fixtures::watcher()));
    assert_eq!(client.user("ghost@example.com").unwrap(), None);
}
