//! Concurrent HTTP retrieval
//!
//! [`HttpClient`] performs single requests with per-profile timeouts and
//! optional retry. [`ConcurrentFetcher`] runs batches of [`FetchRequest`]s with
//! a bounded number in flight and yields a [`FetchResult`] per request, keyed
//! by the caller's correlation token.

pub mod batch;
pub mod http;

pub use batch::{ConcurrentFetcher, FetchRequest, FetchResult};
pub use http::{FetchError, FetchedResponse, HttpClient, HttpConfig};
