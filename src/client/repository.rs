use std::collections::BTreeMap;
use tracing::{debug, info, warn};

use super::endpoints::Endpoints;
use super::models::{CollectionSelection, Container, ItemInfo, ItemSummary, child_text};
use super::{ClientError, Result};
use crate::config::{Config, FetchProfile};
use crate::fetcher::{ConcurrentFetcher, FetchRequest, HttpClient};
use crate::mapping::metadata_keys;
use crate::planner::{PageRequest, plan_pages};
use crate::xml::XmlDocument;

/// Typed access to the repository REST API.
///
/// Holds one [`ConcurrentFetcher`] per request profile: listings and item
/// lookups, item metadata documents, and binary file headers. Each profile
/// has its own timeouts and in-flight cap.
#[derive(Debug, Clone)]
pub struct RepositoryClient {
    endpoints: Endpoints,
    listing: ConcurrentFetcher,
    metadata: ConcurrentFetcher,
    files: ConcurrentFetcher,
}

impl RepositoryClient {
    pub fn new(
        endpoints: Endpoints,
        listing: ConcurrentFetcher,
        metadata: ConcurrentFetcher,
        files: ConcurrentFetcher,
    ) -> Self {
        Self {
            endpoints,
            listing,
            metadata,
            files,
        }
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        if !config.repository.verify_tls {
            warn!(
                base_url = %config.repository.base_url,
                "TLS certificate verification is disabled for repository requests"
            );
        }

        let fetcher = |profile: &FetchProfile| -> Result<ConcurrentFetcher> {
            let client = HttpClient::new(config.http_config(profile))?;
            Ok(ConcurrentFetcher::new(client, profile.concurrency))
        };

        Ok(Self::new(
            Endpoints::from_config(&config.repository),
            fetcher(&config.fetch.listing)?,
            fetcher(&config.fetch.metadata)?,
            fetcher(&config.fetch.files)?,
        ))
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn metadata_fetcher(&self) -> &ConcurrentFetcher {
        &self.metadata
    }

    pub fn file_fetcher(&self) -> &ConcurrentFetcher {
        &self.files
    }

    /// Top-level communities. Empty when the listing cannot be fetched.
    pub async fn communities(&self) -> Vec<Container> {
        self.containers(self.endpoints.top_communities(), "community", "countItems")
            .await
    }

    pub async fn sub_communities(&self, community_id: &str) -> Vec<Container> {
        self.containers(
            self.endpoints.sub_communities(community_id),
            "community",
            "countItems",
        )
        .await
    }

    pub async fn collections(&self, community_id: &str) -> Vec<Container> {
        self.containers(
            self.endpoints.community_collections(community_id),
            "collection",
            "numberItems",
        )
        .await
    }

    /// Number of items in a collection (`numberItems`)
    pub async fn collection_item_count(&self, collection_id: &str) -> Result<u64> {
        let url = self.endpoints.collection(collection_id);
        let doc = self.fetch_document(&url).await?;

        let value = doc
            .first_text("numberItems")
            .ok_or_else(|| ClientError::MissingField {
                url: url.clone(),
                field: "numberItems".to_string(),
            })?;

        value.trim().parse().map_err(|_| ClientError::InvalidField {
            url,
            field: "numberItems".to_string(),
            value,
        })
    }

    /// List the items of several collections.
    ///
    /// Pages of every selection are fetched concurrently. The result follows
    /// selection order, then page order, then document order within a page.
    /// Pages that fail are logged and contribute nothing.
    pub async fn items_in_collections(&self, selections: &[CollectionSelection]) -> Vec<ItemSummary> {
        let requests: Vec<FetchRequest<(usize, PageRequest)>> = selections
            .iter()
            .enumerate()
            .flat_map(|(index, selection)| {
                plan_pages(&selection.collection_id, selection.item_count)
                    .into_iter()
                    .map(move |page| (index, page))
            })
            .map(|(index, page)| {
                let url = self.endpoints.collection_items(&page.resource_id, page.offset);
                FetchRequest::new((index, page), url)
            })
            .collect();

        debug!(pages = requests.len(), "Fetching collection item pages");

        let mut items = Vec::new();
        for result in self.listing.fetch_ordered(requests).await {
            let (index, page) = result.key;
            let selection = &selections[index];

            let response = match result.outcome {
                Ok(response) => response,
                Err(error) => {
                    warn!(
                        collection_id = %page.resource_id,
                        offset = page.offset,
                        url = %result.url,
                        error = %error,
                        "Item page fetch failed"
                    );
                    continue;
                }
            };

            let doc = XmlDocument::parse_lenient(&response.body);
            for item in doc.elements_by_tag("item") {
                let Some(id) = child_text(item, "id") else {
                    continue;
                };
                items.push(ItemSummary {
                    existing: selection.existing_ids.contains(&id),
                    name: child_text(item, "name").unwrap_or_default(),
                    collection_id: selection.collection_id.clone(),
                    id,
                });
            }
        }

        items
    }

    /// Item ids of one collection, in listing order
    pub async fn item_ids_in_collection(&self, collection_id: &str, item_count: u64) -> Vec<String> {
        let selection = CollectionSelection::new(collection_id, item_count);
        self.items_in_collections(std::slice::from_ref(&selection))
            .await
            .into_iter()
            .map(|item| item.id)
            .collect()
    }

    /// Handle of every item that could be fetched; failures are skipped
    pub async fn item_handles(&self, item_ids: &[String]) -> BTreeMap<String, String> {
        self.item_documents(item_ids)
            .await
            .into_iter()
            .filter_map(|(id, doc)| {
                let handle = doc.first_text("handle").filter(|h| !h.is_empty())?;
                Some((id, handle))
            })
            .collect()
    }

    /// Name and public handle link of every item that could be fetched
    pub async fn items_info(&self, item_ids: &[String]) -> BTreeMap<String, ItemInfo> {
        self.item_documents(item_ids)
            .await
            .into_iter()
            .filter_map(|(id, doc)| {
                let root = doc.root()?;
                let handle = child_text(root, "handle").unwrap_or_default();
                let info = ItemInfo {
                    name: child_text(root, "name").unwrap_or_default(),
                    handle_url: self.endpoints.handle_url(&handle),
                };
                Some((id, info))
            })
            .collect()
    }

    /// Distinct metadata keys used across a collection, in first-seen order.
    ///
    /// Items are visited in listing order.
    pub async fn collection_metadata_keys(&self, collection_id: &str) -> Result<Vec<String>> {
        let count = self.collection_item_count(collection_id).await?;
        let item_ids = self.item_ids_in_collection(collection_id, count).await;

        let requests = item_ids
            .iter()
            .map(|id| FetchRequest::new(id.clone(), self.endpoints.item_metadata(id)))
            .collect();

        let mut keys: Vec<String> = Vec::new();
        for result in self.metadata.fetch_ordered(requests).await {
            match result.outcome {
                Ok(response) => {
                    let doc = XmlDocument::parse_lenient(&response.body);
                    for key in metadata_keys(&doc) {
                        if !keys.contains(&key) {
                            keys.push(key);
                        }
                    }
                }
                Err(error) => {
                    warn!(item_id = %result.key, error = %error, "Metadata fetch failed");
                }
            }
        }

        info!(collection_id, items = item_ids.len(), keys = keys.len(), "Collected metadata keys");
        Ok(keys)
    }

    async fn containers(&self, url: String, tag: &str, count_tag: &str) -> Vec<Container> {
        match self.fetch_document(&url).await {
            Ok(doc) => doc
                .elements_by_tag(tag)
                .filter_map(|element| Container::from_element(element, count_tag))
                .collect(),
            Err(error) => {
                warn!(url = %url, error = %error, "Listing fetch failed");
                Vec::new()
            }
        }
    }

    async fn item_documents(&self, item_ids: &[String]) -> Vec<(String, XmlDocument)> {
        let requests = item_ids
            .iter()
            .map(|id| FetchRequest::new(id.clone(), self.endpoints.item(id)))
            .collect();

        let mut documents = Vec::with_capacity(item_ids.len());
        for result in self.listing.fetch_ordered(requests).await {
            match result.outcome {
                Ok(response) => match XmlDocument::parse(&response.body) {
                    Ok(doc) => documents.push((result.key, doc)),
                    Err(error) => warn!(item_id = %result.key, error = %error, "Unreadable item document"),
                },
                Err(error) => warn!(item_id = %result.key, error = %error, "Item fetch failed"),
            }
        }
        documents
    }

    async fn fetch_document(&self, url: &str) -> Result<XmlDocument> {
        let response = self.listing.client().get(url, true).await?;
        Ok(XmlDocument::parse(&response.body)?)
    }
}
