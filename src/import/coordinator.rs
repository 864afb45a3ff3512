use chrono::Utc;
use futures::StreamExt;
use std::collections::{BTreeMap, HashSet};
use std::pin::pin;
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::job::ImportJob;
use super::report::{ImportPhase, ImportReport, InsertedItem};
use super::{ImportError, Result};
use crate::client::{CollectionSelection, RepositoryClient};
use crate::fetcher::{FetchRequest, FetchResult};
use crate::mapping::{DEFAULT_LANGUAGE, FieldMapper, FieldValueRecord};
use crate::observability::ImportMetrics;
use crate::store::{ContentStore, ItemFileMeta, ItemWrite};
use crate::xml::XmlDocument;

/// Runs import jobs against a repository and a content store.
///
/// Both fan-out phases are drained by this task alone, one completion at a
/// time, so the aggregation state below is never shared between tasks.
pub struct ImportCoordinator {
    client: RepositoryClient,
    store: Arc<dyn ContentStore>,
}

/// Aggregation state of the metadata phase
#[derive(Default)]
struct MetadataOutcome {
    inserted: Vec<InsertedItem>,
    inserted_internal_ids: Vec<String>,
    error_items: Vec<String>,
}

impl ImportCoordinator {
    pub fn new(client: RepositoryClient, store: Arc<dyn ContentStore>) -> Self {
        Self { client, store }
    }

    pub fn client(&self) -> &RepositoryClient {
        &self.client
    }

    /// Import every item of `job.collection_id`.
    ///
    /// Looks up the item count, lists the collection page by page, resolves
    /// handles, then runs [`import_items`](Self::import_items). Item ids and
    /// handles already on the job are kept and extended.
    pub async fn import_collection(&self, mut job: ImportJob) -> Result<ImportReport> {
        let collection_id = job
            .collection_id
            .clone()
            .ok_or_else(|| ImportError::InvalidRequest("collection_id is required".to_string()))?;

        info!(job_id = %job.job_id, collection_id = %collection_id, phase = %ImportPhase::Planning, "Import phase");
        let item_count = self
            .client
            .collection_item_count(&collection_id)
            .await
            .map_err(|source| ImportError::Planning {
                collection_id: collection_id.clone(),
                source,
            })?;

        info!(
            job_id = %job.job_id,
            collection_id = %collection_id,
            item_count,
            phase = %ImportPhase::FetchingIds,
            "Import phase"
        );
        let selection = CollectionSelection {
            collection_id: collection_id.clone(),
            item_count,
            existing_ids: job.existing_item_ids.clone(),
        };
        let summaries = self
            .client
            .items_in_collections(std::slice::from_ref(&selection))
            .await;

        for summary in summaries {
            if summary.existing {
                job.existing_item_ids.insert(summary.id.clone());
            }
            job.item_ids.push(summary.id);
        }
        job.item_ids = job.unique_item_ids();

        let missing: Vec<String> = job
            .item_ids
            .iter()
            .filter(|id| !job.item_handles.contains_key(*id))
            .cloned()
            .collect();
        let handles = self.client.item_handles(&missing).await;
        debug!(requested = missing.len(), resolved = handles.len(), "Resolved item handles");
        job.item_handles.extend(handles);

        Ok(self.import_items(job).await)
    }

    /// Import a known set of items.
    ///
    /// Per-item failures never abort the run: a failed metadata fetch, an
    /// unreadable document or a store rejection puts the item in
    /// `error_items`, and a failed file lookup yields a placeholder
    /// [`ItemFileMeta`].
    pub async fn import_items(&self, job: ImportJob) -> ImportReport {
        let started_at = Utc::now();
        let metrics = ImportMetrics::new();
        let item_ids = job.unique_item_ids();
        let mapper = FieldMapper::new(&job.mapping);

        if item_ids.len() != job.item_ids.len() {
            debug!(
                job_id = %job.job_id,
                submitted = job.item_ids.len(),
                distinct = item_ids.len(),
                "Collapsed duplicate item ids"
            );
        }

        info!(
            job_id = %job.job_id,
            items = item_ids.len(),
            concurrency = self.client.metadata_fetcher().concurrency(),
            phase = %ImportPhase::FetchingMetadata,
            "Import phase"
        );
        let outcome = self.fetch_metadata(&job, &item_ids, mapper, &metrics).await;

        info!(
            job_id = %job.job_id,
            items = outcome.inserted.len(),
            concurrency = self.client.file_fetcher().concurrency(),
            phase = %ImportPhase::FetchingFileMeta,
            "Import phase"
        );
        let files = self
            .fetch_file_meta(&job, &outcome.inserted, mapper, &metrics)
            .await;

        let report = ImportReport {
            job_id: job.job_id,
            collection_id: job.collection_id,
            is_scheduled: job.is_scheduled,
            submitted: item_ids,
            inserted: outcome.inserted,
            error_items: outcome.error_items,
            files,
            metrics: metrics.snapshot(),
            phase: ImportPhase::Done,
            started_at,
            finished_at: Utc::now(),
        };

        info!(
            job_id = %report.job_id,
            inserted = report.inserted.len(),
            errors = report.error_items.len(),
            files = report.files.len(),
            elapsed_ms = report.duration().num_milliseconds(),
            phase = %ImportPhase::Done,
            "Import finished"
        );

        report
    }

    async fn fetch_metadata(
        &self,
        job: &ImportJob,
        item_ids: &[String],
        mapper: FieldMapper<'_>,
        metrics: &ImportMetrics,
    ) -> MetadataOutcome {
        let endpoints = self.client.endpoints();
        let requests = item_ids
            .iter()
            .map(|id| FetchRequest::new(id.clone(), endpoints.item_metadata(id)))
            .collect();

        let mut outcome = MetadataOutcome::default();
        let mut handled: HashSet<String> = HashSet::with_capacity(item_ids.len());
        let mut completions = pin!(self.client.metadata_fetcher().stream(requests));

        while let Some(result) = completions.next().await {
            let FetchResult { key: item_id, url, outcome: fetched } = result;

            // At most one mapping and write per item
            if !handled.insert(item_id.clone()) {
                warn!(item_id = %item_id, "Ignoring repeated completion");
                continue;
            }

            let response = match fetched {
                Ok(response) => response,
                Err(error) => {
                    warn!(item_id = %item_id, url = %url, error = %error, "Metadata fetch failed");
                    metrics.metadata_failed();
                    outcome.error_items.push(item_id);
                    continue;
                }
            };

            let doc = match XmlDocument::parse(&response.body) {
                Ok(doc) => doc,
                Err(error) => {
                    warn!(item_id = %item_id, error = %error, "Metadata document unreadable");
                    metrics.metadata_failed();
                    outcome.error_items.push(item_id);
                    continue;
                }
            };
            metrics.metadata_succeeded();

            let records = mapper.map_document(&doc);
            let handle = job.item_handles.get(&item_id).map(String::as_str).unwrap_or("");

            let write = ItemWrite {
                item_id: &item_id,
                handle,
                records: &records,
                post_type: &job.post_type,
                collection_id: job.collection_id.as_deref(),
                total_count: item_ids.len(),
                inserted_so_far: &outcome.inserted_internal_ids,
                error_items: &outcome.error_items,
                all_item_ids: item_ids,
                handles: &job.item_handles,
                existing_items: &job.existing_item_ids,
                is_scheduled: job.is_scheduled,
                job_id: &job.job_id,
            };

            match self.store.write_item(write).await {
                Ok(internal_id) => {
                    debug!(item_id = %item_id, internal_id = %internal_id, records = records.len(), "Item written");
                    outcome.inserted_internal_ids.push(internal_id.clone());
                    outcome.inserted.push(InsertedItem {
                        item_id,
                        internal_id,
                    });
                }
                Err(error) => {
                    warn!(item_id = %item_id, error = %error, "Store write failed");
                    metrics.write_failed();
                    outcome.error_items.push(item_id);
                }
            }
        }

        outcome
    }

    async fn fetch_file_meta(
        &self,
        job: &ImportJob,
        inserted: &[InsertedItem],
        mapper: FieldMapper<'_>,
        metrics: &ImportMetrics,
    ) -> BTreeMap<String, ItemFileMeta> {
        let endpoints = self.client.endpoints();
        let file_fields = mapper.file_placeholders();
        let mut files = BTreeMap::new();
        let mut requests = Vec::with_capacity(inserted.len());

        for item in inserted {
            match job.item_handles.get(&item.item_id).filter(|h| !h.is_empty()) {
                Some(handle) => {
                    let url = endpoints.bitstream(handle, &item.item_id);
                    requests.push(FetchRequest::new(item.clone(), url).headers_only());
                }
                None => {
                    // Without a handle there is no file URL to ask for
                    debug!(item_id = %item.item_id, "No handle, skipping file lookup");
                    let meta = ItemFileMeta::unavailable(item.item_id.as_str(), "", "");
                    metrics.file_meta_degraded();
                    self.record_file_meta(item, &file_fields, meta, &mut files, metrics)
                        .await;
                }
            }
        }

        let mut completions = pin!(self.client.file_fetcher().stream(requests));
        while let Some(result) = completions.next().await {
            let FetchResult { key: item, url, outcome } = result;
            let handle = job.item_handles.get(&item.item_id).cloned().unwrap_or_default();

            let meta = match outcome {
                Ok(response) => {
                    metrics.file_meta_resolved();
                    let language = response
                        .header("content-language")
                        .map(str::trim)
                        .filter(|lang| !lang.is_empty())
                        .unwrap_or(DEFAULT_LANGUAGE);

                    ItemFileMeta {
                        item_id: item.item_id.clone(),
                        handle,
                        content_type: response.header("content-type").unwrap_or_default().to_string(),
                        content_length: response
                            .header("content-length")
                            .and_then(|len| len.trim().parse().ok())
                            .unwrap_or(0),
                        language: language.to_string(),
                        url,
                    }
                }
                Err(error) => {
                    warn!(item_id = %item.item_id, url = %url, error = %error, "File lookup failed");
                    metrics.file_meta_degraded();
                    ItemFileMeta::unavailable(item.item_id.as_str(), url, handle)
                }
            };

            self.record_file_meta(&item, &file_fields, meta, &mut files, metrics)
                .await;
        }

        files
    }

    async fn record_file_meta(
        &self,
        item: &InsertedItem,
        file_fields: &[FieldValueRecord],
        meta: ItemFileMeta,
        files: &mut BTreeMap<String, ItemFileMeta>,
        metrics: &ImportMetrics,
    ) {
        if let Err(error) = self
            .store
            .update_file_meta(&item.internal_id, file_fields, &meta)
            .await
        {
            warn!(item_id = %item.item_id, internal_id = %item.internal_id, error = %error, "File metadata update failed");
            metrics.file_update_failed();
        }
        files.insert(item.internal_id.clone(), meta);
    }
}
