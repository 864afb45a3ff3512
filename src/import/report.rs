use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use crate::observability::ImportMetricsSnapshot;
use crate::store::ItemFileMeta;

/// Coordinator states, in the order a run passes through them
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportPhase {
    Planning,
    FetchingIds,
    FetchingMetadata,
    FetchingFileMeta,
    Done,
}

impl fmt::Display for ImportPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ImportPhase::Planning => "planning",
            ImportPhase::FetchingIds => "fetching_ids",
            ImportPhase::FetchingMetadata => "fetching_metadata",
            ImportPhase::FetchingFileMeta => "fetching_file_meta",
            ImportPhase::Done => "done",
        };
        f.write_str(name)
    }
}

/// An item the store accepted
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsertedItem {
    pub item_id: String,
    pub internal_id: String,
}

/// Outcome of one import run.
///
/// Every submitted item id ends up in exactly one of `inserted` and
/// `error_items`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportReport {
    pub job_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub collection_id: Option<String>,
    pub is_scheduled: bool,
    /// Distinct item ids submitted to the metadata phase
    pub submitted: Vec<String>,
    /// In completion order
    pub inserted: Vec<InsertedItem>,
    pub error_items: Vec<String>,
    /// Internal id to file metadata
    pub files: BTreeMap<String, ItemFileMeta>,
    pub metrics: ImportMetricsSnapshot,
    pub phase: ImportPhase,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl ImportReport {
    pub fn inserted_item_ids(&self) -> BTreeSet<&str> {
        self.inserted.iter().map(|item| item.item_id.as_str()).collect()
    }

    pub fn internal_id(&self, item_id: &str) -> Option<&str> {
        self.inserted
            .iter()
            .find(|item| item.item_id == item_id)
            .map(|item| item.internal_id.as_str())
    }

    /// Whether inserted and errored items are disjoint and cover `submitted`
    pub fn is_partition(&self) -> bool {
        let inserted = self.inserted_item_ids();
        let errors: BTreeSet<&str> = self.error_items.iter().map(String::as_str).collect();
        let submitted: BTreeSet<&str> = self.submitted.iter().map(String::as_str).collect();

        inserted.len() == self.inserted.len()
            && errors.len() == self.error_items.len()
            && inserted.is_disjoint(&errors)
            && inserted.union(&errors).copied().collect::<BTreeSet<_>>() == submitted
    }

    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}
