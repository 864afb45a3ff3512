//! Bounded-concurrency batch execution
//!
//! Every request runs on its own tokio task, so a slow response never holds up
//! its siblings. At most `concurrency` tasks exist at any moment. Completions
//! are yielded in the order they finish, each carrying the correlation key of
//! the request that produced it.

use futures::stream::{self, Stream, StreamExt};

use super::http::{FetchError, FetchedResponse, HttpClient};

/// One GET to issue, tagged with the logical entity it answers for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest<K> {
    pub key: K,
    pub url: String,
    pub read_body: bool,
}

impl<K> FetchRequest<K> {
    pub fn new(key: K, url: impl Into<String>) -> Self {
        Self {
            key,
            url: url.into(),
            read_body: true,
        }
    }

    /// Skip downloading the response body; only status and headers are kept
    pub fn headers_only(mut self) -> Self {
        self.read_body = false;
        self
    }
}

/// Terminal state of one request
#[derive(Debug)]
pub struct FetchResult<K> {
    pub key: K,
    pub url: String,
    pub outcome: Result<FetchedResponse, FetchError>,
}

impl<K> FetchResult<K> {
    pub fn is_success(&self) -> bool {
        self.outcome.is_ok()
    }

    fn map_key<T>(self, f: impl FnOnce(K) -> T) -> FetchResult<T> {
        FetchResult {
            key: f(self.key),
            url: self.url,
            outcome: self.outcome,
        }
    }
}

/// Executes request batches with a fixed in-flight cap
#[derive(Debug, Clone)]
pub struct ConcurrentFetcher {
    client: HttpClient,
    concurrency: usize,
}

impl ConcurrentFetcher {
    pub fn new(client: HttpClient, concurrency: usize) -> Self {
        Self {
            client,
            concurrency: concurrency.max(1),
        }
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// The client shared by every request of this fetcher
    pub fn client(&self) -> &HttpClient {
        &self.client
    }

    /// Stream completions as they arrive.
    ///
    /// The stream ends once every request has reached success or failure.
    /// Failures are yielded, never dropped, and are never retried here beyond
    /// what the underlying client is configured to do.
    pub fn stream<K>(
        &self,
        requests: Vec<FetchRequest<K>>,
    ) -> impl Stream<Item = FetchResult<K>> + Send + use<K>
    where
        K: Clone + Send + 'static,
    {
        let client = self.client.clone();

        stream::iter(requests)
            .map(move |request| {
                let client = client.clone();
                let key = request.key.clone();
                let url = request.url.clone();

                let handle = tokio::spawn(async move {
                    let outcome = client.get(&request.url, request.read_body).await;
                    FetchResult {
                        key: request.key,
                        url: request.url,
                        outcome,
                    }
                });

                async move {
                    match handle.await {
                        Ok(result) => result,
                        Err(e) => FetchResult {
                            key,
                            url,
                            outcome: Err(FetchError::Aborted(e.to_string())),
                        },
                    }
                }
            })
            .buffer_unordered(self.concurrency)
    }

    /// Wait for every request, then return results in request order
    pub async fn fetch_ordered<K>(&self, requests: Vec<FetchRequest<K>>) -> Vec<FetchResult<K>>
    where
        K: Clone + Send + 'static,
    {
        let indexed = requests
            .into_iter()
            .enumerate()
            .map(|(index, request)| FetchRequest {
                key: (index, request.key),
                url: request.url,
                read_body: request.read_body,
            })
            .collect();

        let mut results: Vec<FetchResult<(usize, K)>> = self.stream(indexed).collect().await;
        results.sort_by_key(|result| result.key.0);

        results
            .into_iter()
            .map(|result| result.map_key(|(_, key)| key))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetcher::http::HttpConfig;

    #[test]
    fn test_request_builders() {
        let request = FetchRequest::new("42".to_string(), "http://repo/items/42");
        assert!(request.read_body);

        let request = request.headers_only();
        assert!(!request.read_body);
        assert_eq!(request.key, "42");
    }

    #[test]
    fn test_concurrency_floor() {
        let client = HttpClient::new(HttpConfig::default()).unwrap();
        let fetcher = ConcurrentFetcher::new(client, 0);
        assert_eq!(fetcher.concurrency(), 1);
    }

    #[tokio::test]
    async fn test_empty_batch_completes() {
        let client = HttpClient::new(HttpConfig::default()).unwrap();
        let fetcher = ConcurrentFetcher::new(client, 4);

        let results = fetcher.fetch_ordered::<String>(Vec::new()).await;
        assert!(results.is_empty());
    }
}
