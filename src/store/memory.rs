use async_trait::async_trait;
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

use super::{ContentStore, ItemFileMeta, ItemWrite, Result, StoreError};
use crate::mapping::FieldValueRecord;

/// One item as held by [`MemoryStore`]
#[derive(Debug, Clone, Serialize)]
pub struct StoredItem {
    pub internal_id: String,
    pub item_id: String,
    pub handle: String,
    pub collection_id: Option<String>,
    pub job_id: String,
    pub post_type: serde_json::Value,
    pub records: Vec<FieldValueRecord>,
    /// Number of writes this item received
    pub revisions: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub file_fields: Vec<FieldValueRecord>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_meta: Option<ItemFileMeta>,
}

#[derive(Debug, Default)]
struct Inner {
    items: BTreeMap<String, StoredItem>,
    by_item_id: BTreeMap<String, String>,
}

/// In-process [`ContentStore`].
///
/// Internal ids are sequential numbers starting at 1. Writing an item id
/// that is already stored updates it in place and keeps its internal id.
#[derive(Debug, Default)]
pub struct MemoryStore {
    next_id: AtomicU64,
    inner: RwLock<Inner>,
    rejected: BTreeSet<String>,
    unavailable: bool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse writes for these item ids
    pub fn rejecting<I, S>(mut self, item_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejected.extend(item_ids.into_iter().map(Into::into));
        self
    }

    /// Fail every file-metadata update
    pub fn without_file_updates(mut self) -> Self {
        self.unavailable = true;
        self
    }

    pub async fn len(&self) -> usize {
        self.inner.read().await.items.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    pub async fn get(&self, internal_id: &str) -> Option<StoredItem> {
        self.inner.read().await.items.get(internal_id).cloned()
    }

    pub async fn find_by_item_id(&self, item_id: &str) -> Option<StoredItem> {
        let inner = self.inner.read().await;
        inner
            .by_item_id
            .get(item_id)
            .and_then(|internal_id| inner.items.get(internal_id))
            .cloned()
    }

    /// All stored items ordered by internal id
    pub async fn items(&self) -> Vec<StoredItem> {
        let inner = self.inner.read().await;
        let mut items: Vec<StoredItem> = inner.items.values().cloned().collect();
        items.sort_by_key(|item| item.internal_id.parse::<u64>().unwrap_or(u64::MAX));
        items
    }
}

#[async_trait]
impl ContentStore for MemoryStore {
    async fn write_item(&self, write: ItemWrite<'_>) -> Result<String> {
        if self.rejected.contains(write.item_id) {
            return Err(StoreError::Rejected {
                item_id: write.item_id.to_string(),
                reason: "item refused by store".to_string(),
            });
        }

        let mut inner = self.inner.write().await;

        let known = inner.by_item_id.get(write.item_id).cloned();
        if let Some((internal_id, item)) =
            known.and_then(|id| inner.items.get_mut(&id).map(|item| (id, item)))
        {
            item.handle = write.handle.to_string();
            item.collection_id = write.collection_id.map(str::to_string);
            item.job_id = write.job_id.to_string();
            item.post_type = write.post_type.clone();
            item.records = write.records.to_vec();
            item.revisions += 1;

            debug!(item_id = write.item_id, internal_id = %internal_id, existing = write.is_existing(), "Item updated");
            return Ok(internal_id);
        }

        let internal_id = (self.next_id.fetch_add(1, Ordering::SeqCst) + 1).to_string();
        inner.items.insert(
            internal_id.clone(),
            StoredItem {
                internal_id: internal_id.clone(),
                item_id: write.item_id.to_string(),
                handle: write.handle.to_string(),
                collection_id: write.collection_id.map(str::to_string),
                job_id: write.job_id.to_string(),
                post_type: write.post_type.clone(),
                records: write.records.to_vec(),
                revisions: 1,
                file_fields: Vec::new(),
                file_meta: None,
            },
        );
        inner
            .by_item_id
            .insert(write.item_id.to_string(), internal_id.clone());

        debug!(item_id = write.item_id, internal_id = %internal_id, "Item created");
        Ok(internal_id)
    }

    async fn update_file_meta(
        &self,
        internal_id: &str,
        file_fields: &[FieldValueRecord],
        meta: &ItemFileMeta,
    ) -> Result<()> {
        if self.unavailable {
            return Err(StoreError::Unavailable("file updates disabled".to_string()));
        }

        let mut inner = self.inner.write().await;
        let item = inner.items.get_mut(internal_id).ok_or_else(|| StoreError::Rejected {
            item_id: meta.item_id.clone(),
            reason: format!("unknown internal id {internal_id}"),
        })?;

        item.file_fields = file_fields.to_vec();
        item.file_meta = Some(meta.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixture {
        records: Vec<FieldValueRecord>,
        post_type: serde_json::Value,
        handles: BTreeMap<String, String>,
        existing: BTreeSet<String>,
        ids: Vec<String>,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                records: Vec::new(),
                post_type: serde_json::json!({"post_type": "document"}),
                handles: BTreeMap::new(),
                existing: BTreeSet::new(),
                ids: vec!["10".to_string(), "11".to_string()],
            }
        }

        fn write<'a>(&'a self, item_id: &'a str) -> ItemWrite<'a> {
            ItemWrite {
                item_id,
                handle: "123456789/1",
                records: &self.records,
                post_type: &self.post_type,
                collection_id: Some("7"),
                total_count: self.ids.len(),
                inserted_so_far: &[],
                error_items: &[],
                all_item_ids: &self.ids,
                handles: &self.handles,
                existing_items: &self.existing,
                is_scheduled: false,
                job_id: "job-1",
            }
        }
    }

    #[tokio::test]
    async fn test_write_assigns_sequential_ids() {
        let store = MemoryStore::new();
        let fx = Fixture::new();

        assert_eq!(store.write_item(fx.write("10")).await.unwrap(), "1");
        assert_eq!(store.write_item(fx.write("11")).await.unwrap(), "2");
        assert_eq!(store.len().await, 2);
        assert_eq!(store.get("2").await.unwrap().item_id, "11");
    }

    #[tokio::test]
    async fn test_rewrite_keeps_internal_id() {
        let store = MemoryStore::new();
        let fx = Fixture::new();

        let first = store.write_item(fx.write("10")).await.unwrap();
        let second = store.write_item(fx.write("10")).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(store.len().await, 1);
        assert_eq!(store.find_by_item_id("10").await.unwrap().revisions, 2);
    }

    #[tokio::test]
    async fn test_rejected_item() {
        let store = MemoryStore::new().rejecting(["11"]);
        let fx = Fixture::new();

        let err = store.write_item(fx.write("11")).await.unwrap_err();
        assert!(matches!(err, StoreError::Rejected { ref item_id, .. } if item_id == "11"));
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn test_file_meta_update() {
        let store = MemoryStore::new();
        let fx = Fixture::new();
        let id = store.write_item(fx.write("10")).await.unwrap();

        let meta = ItemFileMeta::unavailable("10", "http://x/handle/h/10?sequence=1", "h");
        store.update_file_meta(&id, &[], &meta).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().file_meta, Some(meta.clone()));

        assert!(store.update_file_meta("99", &[], &meta).await.is_err());
        let closed = MemoryStore::new().without_file_updates();
        assert!(matches!(
            closed.update_file_meta(&id, &[], &meta).await,
            Err(StoreError::Unavailable(_))
        ));
    }
}
