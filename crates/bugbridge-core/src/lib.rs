//! bugbridge-core library.
//!
//! A uniform, lazily populated issue model over heterogeneous bug trackers.
//!
//! # Conventions
//!
//! - **Errors**: Library APIs return [`error::Result`]; configuration loading
//!   uses `anyhow::Result` with context.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`). `warn!`
//!   is the diagnostic stream for non-fatal conditions.
//! - **Threading**: Issues and trackers are single-threaded (`Rc`/`RefCell`).

pub mod config;
pub mod error;
pub mod model;
pub mod redact;
pub mod rest;
pub mod tracker;

pub use config::{Credentials, RuleConfig, TrackerConfig, load_tracker_config};
pub use error::{ErrorCode, Result, TrackerError};
pub use model::{Comment, Field, Issue, IssueUpdate, Related, Relation, RelationUpdate, User};
pub use redact::{Redaction, RedactionRules, Rule};
pub use rest::{NewIssue, Project, RestTracker, Transport};
pub use tracker::{CcRadar, Tracker, TrackerIdentity};
