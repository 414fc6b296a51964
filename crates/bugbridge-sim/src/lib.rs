//! bugbridge-sim library.
//!
//! An in-memory tracker that speaks the bug REST protocol, so clients can be
//! exercised end to end without a network.
//!
//! # Conventions
//!
//! - **Errors**: Protocol failures are HTTP-shaped [`Response`]s; setup
//!   failures use `bugbridge_core::Result`.
//! - **Logging**: Use `tracing` macros (`info!`, `warn!`, `debug!`).
//! - **Time**: Every recorded timestamp comes from [`SessionClock`].
//!
//! [`Response`]: bugbridge_core::rest::Response

pub mod backend;
pub mod clock;
pub mod fixtures;
pub mod radar;
pub mod routes;
pub mod state;
pub mod users;

pub use backend::{ReferenceBackend, ReferenceBackendBuilder, is_radar_importer};
pub use clock::{ClockConfig, SessionClock};
pub use radar::{RadarRecord, RadarSim};
pub use routes::{Login, Route, Router};
pub use state::{BackendState, CommentEntry, IssueRecord, ProjectRecord, RelatedIds};
pub use users::{Account, UserDirectory};
