use bon::Builder;
use serde::{Deserialize, Deserializer};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashSet};
use uuid::Uuid;

use super::{ImportError, Result};
use crate::mapping::{MappingRule, RawMappingRule, normalize_rules};

/// One import invocation. Built once, consumed by the coordinator.
#[derive(Debug, Clone, Builder)]
pub struct ImportJob {
    #[builder(into, default = new_job_id())]
    pub job_id: String,
    #[builder(default)]
    pub item_ids: Vec<String>,
    /// Item id to repository handle
    #[builder(default)]
    pub item_handles: BTreeMap<String, String>,
    /// Items the content store already holds
    #[builder(default)]
    pub existing_item_ids: BTreeSet<String>,
    #[builder(default)]
    pub mapping: Vec<MappingRule>,
    /// Opaque target description passed through to the store
    #[builder(default)]
    pub post_type: Value,
    #[builder(into)]
    pub collection_id: Option<String>,
    #[builder(default)]
    pub is_scheduled: bool,
}

impl ImportJob {
    /// Item ids with duplicates removed, first occurrence kept
    pub fn unique_item_ids(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.item_ids
            .iter()
            .filter(|id| seen.insert(id.as_str()))
            .cloned()
            .collect()
    }
}

fn new_job_id() -> String {
    Uuid::now_v7().to_string()
}

/// An import job as submitted from outside, before normalization.
///
/// Mapping rules may come in the positional or the keyed shape. Scheduled
/// runs carry their id in `scheduled_job_id`, interactive ones in
/// `interactive_job_id`; either way the pipeline is the same.
#[derive(Debug, Clone, Deserialize)]
pub struct ImportRequest {
    #[serde(default, deserialize_with = "id_list")]
    pub item_ids: Vec<String>,
    #[serde(default)]
    pub item_handles: BTreeMap<String, String>,
    #[serde(default, deserialize_with = "id_set")]
    pub existing_item_ids: BTreeSet<String>,
    pub mapping: Vec<RawMappingRule>,
    #[serde(default)]
    pub post_type: Value,
    #[serde(default)]
    pub collection_id: Option<String>,
    #[serde(default)]
    pub is_scheduled: bool,
    #[serde(default)]
    pub scheduled_job_id: Option<String>,
    #[serde(default)]
    pub interactive_job_id: Option<String>,
}

impl ImportRequest {
    pub fn from_json(body: &str) -> Result<Self> {
        serde_json::from_str(body).map_err(|e| ImportError::InvalidRequest(e.to_string()))
    }

    /// Normalize into an [`ImportJob`]
    pub fn into_job(self) -> Result<ImportJob> {
        if self.item_ids.is_empty() && self.collection_id.is_none() {
            return Err(ImportError::InvalidRequest(
                "either item_ids or collection_id is required".to_string(),
            ));
        }

        let job_id = if self.is_scheduled {
            self.scheduled_job_id
        } else {
            self.interactive_job_id
        }
        .filter(|id| !id.is_empty())
        .unwrap_or_else(new_job_id);

        Ok(ImportJob {
            job_id,
            item_ids: self.item_ids,
            item_handles: self.item_handles,
            existing_item_ids: self.existing_item_ids,
            mapping: normalize_rules(self.mapping)?,
            post_type: self.post_type,
            collection_id: self.collection_id.filter(|id| !id.is_empty()),
            is_scheduled: self.is_scheduled,
        })
    }
}

// Repository ids show up both as JSON strings and as numbers
fn id_list<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let values = Vec::<Value>::deserialize(deserializer)?;
    values
        .into_iter()
        .map(|value| match value {
            Value::String(s) => Ok(s),
            Value::Number(n) => Ok(n.to_string()),
            other => Err(serde::de::Error::custom(format!("invalid item id: {other}"))),
        })
        .collect()
}

fn id_set<'de, D>(deserializer: D) -> std::result::Result<BTreeSet<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(id_list(deserializer)?.into_iter().collect())
}
