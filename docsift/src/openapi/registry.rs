//! Per-run schema deduplication
//!
//! A [`SchemaRegistry`] lives for exactly one ingestion pass and is handed to
//! every specification by `&mut`. The first sighting of a dedup key creates
//! the record; every sighting with a usage context appends to that key's
//! usage list; [`SchemaRegistry::finish`] back-fills `usedBy`.

use crate::records::{SchemaRecord, UsageRef};
use std::collections::HashMap;

/// Dedup key: the schema name, or a structural hash for anonymous schemas
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum DedupKey {
    Name(String),
    Hash(String),
}

#[derive(Debug, Default)]
pub struct SchemaRegistry {
    records: Vec<SchemaRecord>,
    index: HashMap<DedupKey, usize>,
    usage: HashMap<DedupKey, Vec<UsageRef>>,
}

impl SchemaRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a sighting. `create` runs only the first time `key` is seen.
    /// Returns `true` when a new record was created.
    pub fn observe(
        &mut self,
        key: DedupKey,
        usage: Option<UsageRef>,
        create: impl FnOnce() -> SchemaRecord,
    ) -> bool {
        let created = if self.index.contains_key(&key) {
            false
        } else {
            self.index.insert(key.clone(), self.records.len());
            self.records.push(create());
            true
        };

        if let Some(usage) = usage {
            let list = self.usage.entry(key).or_default();
            if !list.contains(&usage) {
                list.push(usage);
            }
        }

        created
    }

    /// Back-fill `usedBy` and hand out the records in first-sighting order
    pub fn finish(mut self) -> Vec<SchemaRecord> {
        for (key, position) in self.index {
            if let Some(usages) = self.usage.remove(&key) {
                self.records[position].used_by.extend(usages);
            }
        }
        self.records
    }
}
