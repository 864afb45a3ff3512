//! Field mapping
//!
//! Turns an item's metadata document into [`FieldValueRecord`]s according to a
//! list of [`MappingRule`]s. Rules arrive at the boundary in several shapes
//! ([`RawMappingRule`]) and are normalized once, before mapping starts.

mod engine;
mod rules;

pub use engine::{DEFAULT_LANGUAGE, FILE_FIELDS, FieldMapper, FieldValueRecord, metadata_keys};
pub use rules::{FieldType, KeyedRule, MappingRule, PositionalRule, RawMappingRule, normalize_rules};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("invalid mapping rule: {0}")]
    InvalidRule(String),
}
