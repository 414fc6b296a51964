//! Standard dataset used by the scripted session and the integration tests.

use std::rc::Rc;

use bugbridge_core::{Credentials, RestTracker, Result, TrackerConfig, User};

use crate::backend::{ReferenceBackend, ReferenceBackendBuilder};
use crate::radar::RadarSim;
use crate::state::{IssueRecord, ProjectRecord};

pub const HOST: &str = "bugs.example.com";
pub const PASSWORD: &str = "password";
pub const FILED_AT: u64 = 1_639_510_960;

#[must_use]
pub fn contributor() -> User {
    User::new(
        "Tim Contributor",
        "tcontributor@example.com",
        vec!["tcontributor@example.com".into()],
    )
}

#[must_use]
pub fn filer() -> User {
    User::new("Felix Filer", "ffiler@example.com", vec!["ffiler@example.com".into()])
}

#[must_use]
pub fn watcher() -> User {
    User::new(
        "Wendy Watcher",
        "wwatcher@example.com",
        vec!["wwatcher@example.com".into()],
    )
}

#[must_use]
pub fn radar_importer() -> User {
    User::new(
        "Radar WebKit Bug Importer",
        "webkit-bug-importer@group.apple.com",
        vec!["webkit-bug-importer@group.apple.com".into()],
    )
}

/// Builder seeded with the standard users, issues and projects.
///
/// Issue 1 is open, issue 2 resolved, issue 3 a duplicate of 1.
#[must_use]
pub fn standard() -> ReferenceBackendBuilder {
    let contributor = contributor();
    let filer = filer();
    ReferenceBackend::builder()
        .host(HOST)
        .user(contributor.clone(), Some(PASSWORD))
        .user(filer.clone(), None)
        .user(watcher(), None)
        .user(radar_importer(), None)
        .issue(
            IssueRecord::new(1, "Example issue 1", &filer, "An example issue for testing")
                .filed_at(FILED_AT)
                .in_component("WebKit", "Text", "Other")
                .assigned_to(&contributor)
                .with_comment(&contributor, FILED_AT + 60, "Was able to reproduce on my machine."),
        )
        .issue(
            IssueRecord::new(2, "Example issue 2", &contributor, "Another example issue")
                .filed_at(FILED_AT + 3600)
                .in_component("WebKit", "Scrolling", "WebKit Local Build")
                .resolved(),
        )
        .issue(
            IssueRecord::new(3, "Example issue 1 again", &filer, "Same as issue 1")
                .filed_at(FILED_AT + 7200)
                .in_component("WebKit", "Text", "Other")
                .duplicate_of(1),
        )
        .project(
            "WebKit",
            ProjectRecord::new(1, "The WebKit browser engine")
                .component("Text", "Text layout and fonts")
                .component("Scrolling", "Scrolling and input")
                .component("Security", "Security issues")
                .version("Other")
                .version("WebKit Local Build"),
        )
        .project(
            "CFNetwork",
            ProjectRecord::new(2, "Darwin networking framework")
                .component("IPv4", "Bugs involving IPv4 networking")
                .component("IPv6", "Bugs involving IPv6 networking")
                .version("All"),
        )
}

/// The standard backend without a radar tracker.
///
/// # Errors
///
/// Fails only if the host cannot be routed.
pub fn backend() -> Result<ReferenceBackend> {
    standard().build()
}

/// The standard backend with an empty radar tracker attached.
///
/// # Errors
///
/// Fails only if the host cannot be routed.
pub fn backend_with_radar() -> Result<ReferenceBackend> {
    standard().with_radar(RadarSim::new()).build()
}

/// Client configuration pointing at [`HOST`], with the importer set.
#[must_use]
pub fn tracker_config() -> TrackerConfig {
    TrackerConfig {
        url: Some(format!("https://{HOST}")),
        radar_importer: Some(radar_importer().username),
        ..TrackerConfig::default()
    }
}

/// A client logged in as the contributor.
///
/// # Errors
///
/// Propagates tracker construction failures.
pub fn tracker(backend: Rc<ReferenceBackend>) -> Result<RestTracker<Rc<ReferenceBackend>>> {
    Ok(RestTracker::new(&tracker_config(), backend)?
        .with_credentials(Credentials::new(contributor().username, PASSWORD)))
}
