//! In-process mock of the repository REST API and its bitstream server

#![allow(dead_code)]

use axum::extract::{Path, Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use docharvest::client::RepositoryClient;
use docharvest::config::Config;
use serde::Deserialize;
use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const COLLECTION_ID: &str = "col-1";
pub const FILE_SIZE: usize = 2048;

/// What the mock serves
#[derive(Debug, Clone, Default)]
pub struct MockOptions {
    /// Items in `COLLECTION_ID`, ids "1" to "N"
    pub items: u64,
    /// Metadata requests for these ids answer 500
    pub failing_metadata: HashSet<String>,
    /// Metadata requests for these ids answer with a broken document
    pub malformed_metadata: HashSet<String>,
    /// Bitstream requests for these ids answer 404
    pub failing_files: HashSet<String>,
    /// Item lookups for these ids answer without a handle
    pub without_handle: HashSet<String>,
    pub metadata_delay: Duration,
}

impl MockOptions {
    pub fn with_items(items: u64) -> Self {
        Self {
            items,
            ..Self::default()
        }
    }
}

#[derive(Debug, Default)]
pub struct MockStats {
    in_flight: AtomicUsize,
    pub max_in_flight: AtomicUsize,
    pub metadata_hits: AtomicUsize,
    pub file_hits: AtomicUsize,
}

impl MockStats {
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    pub fn metadata_hits(&self) -> usize {
        self.metadata_hits.load(Ordering::SeqCst)
    }

    pub fn file_hits(&self) -> usize {
        self.file_hits.load(Ordering::SeqCst)
    }
}

struct MockState {
    options: MockOptions,
    stats: Arc<MockStats>,
}

pub struct MockRepository {
    pub addr: SocketAddr,
    pub stats: Arc<MockStats>,
}

impl MockRepository {
    pub fn base_url(&self) -> String {
        format!("http://{}/rest", self.addr)
    }

    pub fn bitstream_url(&self) -> String {
        format!("http://{}/bitstream", self.addr)
    }

    pub fn handle_url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Configuration pointing every endpoint at this mock
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.repository.base_url = self.base_url();
        config.repository.bitstream_base_url = self.bitstream_url();
        config.repository.handle_base_url = self.handle_url();
        config.fetch.listing.timeout_secs = 5;
        config.fetch.metadata.timeout_secs = 5;
        config.fetch.files.timeout_secs = 5;
        config
    }

    pub fn client(&self) -> RepositoryClient {
        RepositoryClient::from_config(&self.config()).unwrap()
    }
}

pub fn handle_of(item_id: &str) -> String {
    format!("123456789/{item_id}")
}

pub fn ids(ids: &[&str]) -> HashSet<String> {
    ids.iter().map(|id| id.to_string()).collect()
}

pub async fn start_mock_repository(options: MockOptions) -> MockRepository {
    let stats = Arc::new(MockStats::default());
    let state = Arc::new(MockState {
        options,
        stats: stats.clone(),
    });

    let app = Router::new()
        .route("/rest/communities/top-communities", get(top_communities))
        .route("/rest/communities/{id}/communities/", get(sub_communities))
        .route("/rest/communities/{id}/collections/", get(collections))
        .route("/rest/collections/{id}", get(collection))
        .route("/rest/collections/{id}/items/", get(collection_items))
        .route("/rest/items/{id}", get(item))
        .route("/rest/items/{id}/metadata/", get(item_metadata))
        .route("/bitstream/handle/{prefix}/{suffix}/{id}", get(bitstream))
        .with_state(state);

    // Bind to random available port
    let listener = tokio::net::TcpListener::bind(SocketAddr::from(([127, 0, 0, 1], 0)))
        .await
        .unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    MockRepository { addr, stats }
}

fn xml(body: String) -> Response {
    ([(header::CONTENT_TYPE, "application/xml")], body).into_response()
}

async fn top_communities() -> Response {
    xml(r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<communities>
  <community><id>1</id><name>Health &amp; Nutrition</name><type>community</type><countItems>120</countItems></community>
  <community><id>2</id><name>Governance</name><type>community</type><countItems>75</countItems></community>
</communities>"#
        .to_string())
}

async fn sub_communities(Path(id): Path<String>) -> Response {
    xml(format!(
        "<communities><community><id>{id}-a</id><name>Sub of {id}</name><type>community</type><countItems>3</countItems></community></communities>"
    ))
}

async fn collections(Path(id): Path<String>, State(state): State<Arc<MockState>>) -> Response {
    xml(format!(
        "<collections><collection><id>{COLLECTION_ID}</id><name>Papers of {id}</name><type>collection</type><numberItems>{}</numberItems></collection></collections>",
        state.options.items
    ))
}

async fn collection(Path(id): Path<String>, State(state): State<Arc<MockState>>) -> Response {
    if id != COLLECTION_ID {
        return StatusCode::NOT_FOUND.into_response();
    }
    xml(format!(
        "<collection><id>{id}</id><name>Papers</name><type>collection</type><numberItems>{}</numberItems></collection>",
        state.options.items
    ))
}

#[derive(Deserialize)]
struct Offset {
    offset: u64,
}

async fn collection_items(
    Path(id): Path<String>,
    Query(page): Query<Offset>,
    State(state): State<Arc<MockState>>,
) -> Response {
    if id != COLLECTION_ID {
        return StatusCode::NOT_FOUND.into_response();
    }

    let end = (page.offset + 100).min(state.options.items);
    let items: String = (page.offset..end)
        .map(|n| {
            let id = n + 1;
            format!("<item><id>{id}</id><name>Item {id}</name><handle>{}</handle></item>", handle_of(&id.to_string()))
        })
        .collect();

    xml(format!("<items>{items}</items>"))
}

async fn item(Path(id): Path<String>, State(state): State<Arc<MockState>>) -> Response {
    let handle = if state.options.without_handle.contains(&id) {
        String::new()
    } else {
        format!("<handle>{}</handle>", handle_of(&id))
    };
    xml(format!("<item><id>{id}</id><name>Item {id}</name>{handle}<type>item</type></item>"))
}

async fn item_metadata(Path(id): Path<String>, State(state): State<Arc<MockState>>) -> Response {
    let stats = &state.stats;
    stats.metadata_hits.fetch_add(1, Ordering::SeqCst);
    let now = stats.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
    stats.max_in_flight.fetch_max(now, Ordering::SeqCst);

    if !state.options.metadata_delay.is_zero() {
        tokio::time::sleep(state.options.metadata_delay).await;
    }
    stats.in_flight.fetch_sub(1, Ordering::SeqCst);

    if state.options.failing_metadata.contains(&id) {
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }
    if state.options.malformed_metadata.contains(&id) {
        return xml("<metadataEntries><metadataentry><key>dc.title".to_string());
    }

    xml(format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<metadataEntries>
  <metadataentry><key>dc.title</key><value>Title {id}</value><language>en</language></metadataentry>
  <metadataentry><key>dc.contributor.author</key><value>Doe, Jane</value><value>Roe, Richard</value></metadataentry>
  <metadataentry><key>dc.identifier.uri</key><value>http://hdl.handle.net/{handle}</value></metadataentry>
</metadataEntries>"#,
        handle = handle_of(&id)
    ))
}

async fn bitstream(
    Path((_prefix, _suffix, id)): Path<(String, String, String)>,
    State(state): State<Arc<MockState>>,
) -> Response {
    state.stats.file_hits.fetch_add(1, Ordering::SeqCst);

    if state.options.failing_files.contains(&id) {
        return StatusCode::NOT_FOUND.into_response();
    }

    ([(header::CONTENT_TYPE, "application/pdf")], vec![0u8; FILE_SIZE]).into_response()
}
