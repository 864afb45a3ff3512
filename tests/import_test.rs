mod common;

use common::{COLLECTION_ID, FILE_SIZE, MockOptions, handle_of, ids, start_mock_repository};
use docharvest::import::{ImportCoordinator, ImportError, ImportJob};
use docharvest::mapping::{FieldType, MappingRule};
use docharvest::store::{ItemFileMeta, MemoryStore};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Duration;

fn mapping() -> Vec<MappingRule> {
    vec![
        MappingRule::new("field_title", "dc.title", "document_title"),
        MappingRule::new("field_authors", "contributor.author", "document_authors")
            .with_type(FieldType::Repeater)
            .with_sub_fields(
                vec![MappingRule::new("field_author_name", "name", "author_name")],
                vec!["author_name".to_string()],
            ),
        MappingRule::new("field_url", "full_text_url", "document_url"),
        MappingRule::new("field_size", "full_text_size", "document_size"),
    ]
}

fn handles(item_ids: &[&str]) -> BTreeMap<String, String> {
    item_ids
        .iter()
        .map(|id| (id.to_string(), handle_of(id)))
        .collect()
}

#[tokio::test]
async fn test_collection_of_250_with_two_failures() {
    let mock = start_mock_repository(MockOptions {
        failing_metadata: ids(&["17", "203"]),
        metadata_delay: Duration::from_millis(5),
        ..MockOptions::with_items(250)
    })
    .await;

    let store = Arc::new(MemoryStore::new());
    let coordinator = ImportCoordinator::new(mock.client(), store.clone());

    let job = ImportJob::builder()
        .collection_id(COLLECTION_ID)
        .mapping(mapping())
        .build();

    let report = coordinator.import_collection(job).await.unwrap();

    assert_eq!(report.submitted.len(), 250);
    assert_eq!(report.inserted.len(), 248);
    assert_eq!(
        report.error_items.iter().cloned().collect::<BTreeSet<_>>(),
        ["17".to_string(), "203".to_string()].into_iter().collect()
    );
    assert!(report.is_partition());

    assert_eq!(mock.stats.metadata_hits(), 250);
    assert!(mock.stats.max_in_flight() <= 100);

    assert_eq!(store.len().await, 248);
    assert_eq!(report.files.len(), 248);
    assert!(report.files.values().all(|meta| meta.content_type == "application/pdf"));

    let metrics = report.metrics;
    assert_eq!(metrics.metadata_succeeded, 248);
    assert_eq!(metrics.metadata_failed, 2);
    assert_eq!(metrics.file_meta_resolved, 248);
}

#[tokio::test]
async fn test_records_are_mapped_and_stored() {
    let mock = start_mock_repository(MockOptions::with_items(3)).await;
    let store = Arc::new(MemoryStore::new());
    let coordinator = ImportCoordinator::new(mock.client(), store.clone());

    let job = ImportJob::builder()
        .item_ids(vec!["1".into(), "2".into()])
        .item_handles(handles(&["1", "2"]))
        .mapping(mapping())
        .post_type(serde_json::json!({"post_type": "document"}))
        .job_id("job-42")
        .build();

    let report = coordinator.import_items(job).await;
    assert_eq!(report.job_id, "job-42");
    assert!(report.error_items.is_empty());

    let stored = store.find_by_item_id("1").await.unwrap();
    assert_eq!(stored.handle, handle_of("1"));
    assert_eq!(stored.job_id, "job-42");

    let values: Vec<(&str, &str, &str)> = stored
        .records
        .iter()
        .map(|r| (r.field_id.as_str(), r.field_value.as_str(), r.language.as_str()))
        .collect();
    assert_eq!(
        values,
        vec![
            ("field_title", "Title 1", "en"),
            ("field_authors", "Doe, Jane", "N/A"),
            ("field_authors", "Roe, Richard", "N/A"),
            ("field_url", "", "N/A"),
            ("field_size", "", "N/A"),
        ]
    );
    assert_eq!(stored.records[1].sub_field_names, vec!["author_name"]);

    // The file phase hands the placeholders of the file rules to the store
    assert_eq!(stored.file_fields.len(), 2);
    let meta = stored.file_meta.unwrap();
    assert_eq!(meta.content_length, FILE_SIZE as u64);
    assert_eq!(meta.language, "N/A");
    assert_eq!(
        meta.url,
        format!("{}/handle/{}/1?sequence=1", mock.bitstream_url(), handle_of("1"))
    );
}

#[tokio::test]
async fn test_failed_file_lookup_yields_placeholder() {
    let mock = start_mock_repository(MockOptions {
        failing_files: ids(&["2"]),
        ..MockOptions::with_items(3)
    })
    .await;
    let store = Arc::new(MemoryStore::new());
    let coordinator = ImportCoordinator::new(mock.client(), store.clone());

    let job = ImportJob::builder()
        .item_ids(vec!["1".into(), "2".into(), "3".into()])
        .item_handles(handles(&["1", "2", "3"]))
        .mapping(mapping())
        .build();

    let report = coordinator.import_items(job).await;
    assert_eq!(report.files.len(), 3);

    let internal_id = report.internal_id("2").unwrap();
    let meta = &report.files[internal_id];
    assert_eq!(meta.content_type, "");
    assert_eq!(meta.content_length, 0);
    assert_eq!(meta.language, "en");
    assert_eq!(meta.handle, handle_of("2"));
    assert!(meta.is_unavailable());

    let ok = &report.files[report.internal_id("1").unwrap()];
    assert_eq!(ok.content_type, "application/pdf");
    assert_eq!(ok.language, "N/A");

    assert_eq!(report.metrics.file_meta_degraded, 1);
    assert_eq!(
        store.get(internal_id).await.unwrap().file_meta,
        Some(meta.clone())
    );
}

#[tokio::test]
async fn test_item_without_handle_skips_file_request() {
    let mock = start_mock_repository(MockOptions::with_items(2)).await;
    let coordinator = ImportCoordinator::new(mock.client(), Arc::new(MemoryStore::new()));

    let job = ImportJob::builder()
        .item_ids(vec!["1".into(), "2".into()])
        .item_handles(handles(&["1"]))
        .mapping(mapping())
        .build();

    let report = coordinator.import_items(job).await;
    assert_eq!(report.inserted.len(), 2);
    assert_eq!(mock.stats.file_hits(), 1);

    let meta = &report.files[report.internal_id("2").unwrap()];
    assert_eq!(meta, &ItemFileMeta::unavailable("2", "", ""));
}

#[tokio::test]
async fn test_store_rejection_and_bad_documents_are_item_errors() {
    let mock = start_mock_repository(MockOptions {
        malformed_metadata: ids(&["4"]),
        ..MockOptions::with_items(5)
    })
    .await;
    let store = Arc::new(MemoryStore::new().rejecting(["2"]));
    let coordinator = ImportCoordinator::new(mock.client(), store.clone());

    let job = ImportJob::builder()
        .item_ids(vec!["1".into(), "2".into(), "3".into(), "4".into(), "5".into()])
        .item_handles(handles(&["1", "2", "3", "4", "5"]))
        .mapping(mapping())
        .build();

    let report = coordinator.import_items(job).await;

    let errors: BTreeSet<&str> = report.error_items.iter().map(String::as_str).collect();
    assert_eq!(errors, ["2", "4"].into_iter().collect());
    assert!(report.is_partition());
    assert_eq!(report.metrics.writes_failed, 1);
    assert_eq!(store.len().await, 3);
    // Only inserted items reach the file phase
    assert_eq!(mock.stats.file_hits(), 3);
}

#[tokio::test]
async fn test_duplicate_ids_are_fetched_once() {
    let mock = start_mock_repository(MockOptions::with_items(3)).await;
    let store = Arc::new(MemoryStore::new());
    let coordinator = ImportCoordinator::new(mock.client(), store.clone());

    let job = ImportJob::builder()
        .item_ids(vec!["1".into(), "2".into(), "1".into(), "3".into(), "2".into()])
        .mapping(mapping())
        .build();

    let report = coordinator.import_items(job).await;
    assert_eq!(report.submitted, vec!["1", "2", "3"]);
    assert_eq!(report.inserted.len(), 3);
    assert_eq!(mock.stats.metadata_hits(), 3);
    assert_eq!(store.len().await, 3);
    assert!(report.is_partition());
}

#[tokio::test]
async fn test_unknown_collection_cannot_be_planned() {
    let mock = start_mock_repository(MockOptions::with_items(3)).await;
    let coordinator = ImportCoordinator::new(mock.client(), Arc::new(MemoryStore::new()));

    let job = ImportJob::builder().collection_id("missing").build();
    let result = coordinator.import_collection(job).await;
    assert!(matches!(result, Err(ImportError::Planning { .. })));

    let job = ImportJob::builder().build();
    let result = coordinator.import_collection(job).await;
    assert!(matches!(result, Err(ImportError::InvalidRequest(_))));
}

#[tokio::test]
async fn test_existing_items_are_flagged_to_store() {
    let mock = start_mock_repository(MockOptions::with_items(4)).await;
    let store = Arc::new(MemoryStore::new());
    let coordinator = ImportCoordinator::new(mock.client(), store.clone());

    // First run creates, second run with the same store updates in place
    let first = coordinator
        .import_collection(
            ImportJob::builder()
                .collection_id(COLLECTION_ID)
                .mapping(mapping())
                .build(),
        )
        .await
        .unwrap();

    let second = coordinator
        .import_collection(
            ImportJob::builder()
                .collection_id(COLLECTION_ID)
                .existing_item_ids(["1", "2", "3", "4"].iter().map(|s| s.to_string()).collect())
                .mapping(mapping())
                .build(),
        )
        .await
        .unwrap();

    assert_eq!(store.len().await, 4);
    for item_id in ["1", "2", "3", "4"] {
        assert_eq!(first.internal_id(item_id), second.internal_id(item_id));
        assert_eq!(store.find_by_item_id(item_id).await.unwrap().revisions, 2);
    }
}
