//! Import orchestration
//!
//! An [`ImportJob`] runs through `Planning → FetchingIds → FetchingMetadata →
//! FetchingFileMeta → Done`. The two fetching phases fan out over the
//! repository client's fetchers and fan back in on the coordinator's own task.
//! Only failures that prevent the run from starting are [`ImportError`]s;
//! per-item failures are reported in the [`ImportReport`].

mod coordinator;
mod job;
mod report;

pub use coordinator::ImportCoordinator;
pub use job::{ImportJob, ImportRequest};
pub use report::{ImportPhase, ImportReport, InsertedItem};

use thiserror::Error;

use crate::client::ClientError;
use crate::mapping::MappingError;

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("Cannot plan import of collection {collection_id}: {source}")]
    Planning {
        collection_id: String,
        #[source]
        source: ClientError,
    },

    #[error("Invalid import request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Mapping(#[from] MappingError),
}

pub type Result<T> = std::result::Result<T, ImportError>;
