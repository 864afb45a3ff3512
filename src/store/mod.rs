//! Content store seam
//!
//! The pipeline hands mapped records to a [`ContentStore`] and gets back the
//! store's own identifier for each item. Persistence is the store's concern;
//! [`MemoryStore`] keeps everything in process for the CLI and for tests.

mod memory;

pub use memory::{MemoryStore, StoredItem};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use thiserror::Error;

use crate::mapping::FieldValueRecord;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Store rejected item {item_id}: {reason}")]
    Rejected { item_id: String, reason: String },

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Binary-file metadata for one inserted item.
///
/// A failed lookup still produces a value: empty content type, zero length
/// and language `"en"` (see [`ItemFileMeta::unavailable`]).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemFileMeta {
    pub item_id: String,
    pub url: String,
    pub handle: String,
    pub content_type: String,
    pub content_length: u64,
    pub language: String,
}

impl ItemFileMeta {
    /// Language recorded when the file lookup failed
    pub const FAILURE_LANGUAGE: &'static str = "en";

    pub fn unavailable(item_id: impl Into<String>, url: impl Into<String>, handle: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            url: url.into(),
            handle: handle.into(),
            content_type: String::new(),
            content_length: 0,
            language: Self::FAILURE_LANGUAGE.to_string(),
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.content_type.is_empty() && self.content_length == 0 && self.language == Self::FAILURE_LANGUAGE
    }
}

/// Everything the store receives for one item write
#[derive(Debug, Clone, Copy)]
pub struct ItemWrite<'a> {
    pub item_id: &'a str,
    pub handle: &'a str,
    pub records: &'a [FieldValueRecord],
    pub post_type: &'a serde_json::Value,
    pub collection_id: Option<&'a str>,
    /// Number of items submitted in this import
    pub total_count: usize,
    /// Internal ids written so far, in completion order
    pub inserted_so_far: &'a [String],
    pub error_items: &'a [String],
    pub all_item_ids: &'a [String],
    pub handles: &'a BTreeMap<String, String>,
    pub existing_items: &'a BTreeSet<String>,
    pub is_scheduled: bool,
    pub job_id: &'a str,
}

impl ItemWrite<'_> {
    pub fn is_existing(&self) -> bool {
        self.existing_items.contains(self.item_id)
    }
}

/// External content store
#[async_trait]
pub trait ContentStore: Send + Sync {
    /// Create or update the item and return the store's identifier for it
    async fn write_item(&self, write: ItemWrite<'_>) -> Result<String>;

    /// Attach file metadata to an already written item
    async fn update_file_meta(
        &self,
        internal_id: &str,
        file_fields: &[FieldValueRecord],
        meta: &ItemFileMeta,
    ) -> Result<()>;
}
