//! Companion radar tracker simulation.
//!
//! The reference backend files records here when the radar importer account
//! is added as a watcher.

use std::collections::BTreeMap;

use bugbridge_core::User;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RadarRecord {
    pub id: u64,
    pub title: String,
    pub timestamp: u64,
    pub opened: bool,
    pub creator: User,
    pub assignee: Option<User>,
    pub description: String,
    pub project: Option<String>,
    pub component: Option<String>,
    pub watchers: Vec<User>,
    pub keywords: Vec<String>,
}

/// In-memory radar store. Ids are allocated as `max + 1`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RadarSim {
    records: BTreeMap<u64, RadarRecord>,
}

impl RadarSim {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an existing record under its own id.
    #[must_use]
    pub fn with_record(mut self, record: RadarRecord) -> Self {
        self.records.insert(record.id, record);
        self
    }

    /// File a record, ignoring its `id`, and return the allocated id.
    pub fn add(&mut self, mut record: RadarRecord) -> u64 {
        let id = self.records.keys().next_back().map_or(1, |max| max + 1);
        record.id = id;
        self.records.insert(id, record);
        id
    }

    #[must_use]
    pub fn get(&self, id: u64) -> Option<&RadarRecord> {
        self.records.get(&id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &RadarRecord> {
        self.records.values()
    }
}
