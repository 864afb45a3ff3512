//! Repository API client
//!
//! Listing, lookup and discovery operations on top of the concurrent fetcher
//! and the XML parser. Bulk operations isolate failures per request: a page or
//! item that cannot be fetched is logged and left out.

mod endpoints;
mod models;
mod repository;

pub use endpoints::Endpoints;
pub use models::{CollectionSelection, Container, ItemInfo, ItemSummary};
pub use repository::RepositoryClient;

use thiserror::Error;

use crate::fetcher::FetchError;
use crate::xml::XmlError;

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("Malformed response: {0}")]
    Xml(#[from] XmlError),

    #[error("Response from {url} has no <{field}> element")]
    MissingField { url: String, field: String },

    #[error("Invalid <{field}> value '{value}' in response from {url}")]
    InvalidField {
        url: String,
        field: String,
        value: String,
    },
}

pub type Result<T> = std::result::Result<T, ClientError>;
