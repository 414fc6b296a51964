#![forbid(unsafe_code)]

use std::env;
use std::rc::Rc;

use anyhow::{Context, Result};
use bugbridge_core::{CcRadar, Credentials, Issue, NewIssue, RestTracker, RuleConfig, Tracker};
use bugbridge_sim::fixtures;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing() {
    let filter = EnvFilter::try_from_env("BUGBRIDGE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(if env::var("DEBUG").is_ok() {
            "bugbridge=debug,info"
        } else {
            "bugbridge=info,warn"
        })
    });

    let format = env::var("BUGBRIDGE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry.with(fmt::layer().json().with_ansi(false)).init();
        }
        _ => {
            registry.with(fmt::layer().compact()).init();
        }
    }
}

fn main() -> Result<()> {
    init_tracing();

    let backend = Rc::new(fixtures::backend_with_radar().context("failed to seed backend")?);
    let mut config = fixtures::tracker_config();
    config.redact = vec![RuleConfig::new("component:Security", true)];
    let client = Rc::new(
        RestTracker::new(&config, Rc::clone(&backend))
            .context("failed to configure tracker")?
            .with_credentials(Credentials::new(
                fixtures::contributor().username,
                fixtures::PASSWORD,
            )),
    );
    let tracker: Rc<dyn Tracker> = client.clone();

    let issue = Issue::new(1, Rc::clone(&tracker))?;
    info!(issue = %issue, "loaded issue");
    issue.add_comment("Still reproduces on trunk.")?;

    let report_id = client.create(&NewIssue {
        title: "Crash when scrolling a sandboxed frame".to_string(),
        description: "Same backtrace as the text crash.".to_string(),
        project: "WebKit".to_string(),
        component: "Security".to_string(),
        version: "Other".to_string(),
        assignee: None,
        keywords: Vec::new(),
    })?;
    let report = Issue::new(report_id, Rc::clone(&tracker))?;
    let closed = report.close(Some("Same root cause."), Some(&issue))?;

    let radar = issue.cc_radar(&CcRadar::default())?;
    let redaction = issue.redaction();

    println!(
        "session complete: comments={} duplicates={} closed={} radar={} {}",
        issue.comments()?.len(),
        issue.duplicates()?.len(),
        closed,
        radar.map_or_else(|| "none".to_string(), |id| id.to_string()),
        redaction
    );

    Ok(())
}
