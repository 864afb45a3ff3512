use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::xml::Element;

/// A community or collection as listed by the repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Container {
    pub id: String,
    pub name: String,
    /// `countItems` for communities, `numberItems` for collections
    pub count: u64,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Container {
    pub(crate) fn from_element(element: Element<'_>, count_tag: &str) -> Option<Self> {
        Some(Self {
            id: child_text(element, "id")?,
            name: child_text(element, "name").unwrap_or_default(),
            count: child_text(element, count_tag)
                .and_then(|count| count.trim().parse().ok())
                .unwrap_or(0),
            kind: child_text(element, "type").unwrap_or_default(),
        })
    }
}

/// One item of a collection listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemSummary {
    pub id: String,
    pub name: String,
    pub collection_id: String,
    /// Already present in the content store
    pub existing: bool,
}

/// Display information for one item
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInfo {
    pub name: String,
    pub handle_url: String,
}

/// A collection to list, with the item ids the store already holds
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CollectionSelection {
    pub collection_id: String,
    pub item_count: u64,
    #[serde(default)]
    pub existing_ids: BTreeSet<String>,
}

impl CollectionSelection {
    pub fn new(collection_id: impl Into<String>, item_count: u64) -> Self {
        Self {
            collection_id: collection_id.into(),
            item_count,
            existing_ids: BTreeSet::new(),
        }
    }
}

/// Text of the first direct child with the given name
pub(crate) fn child_text(element: Element<'_>, name: &str) -> Option<String> {
    element
        .children()
        .find(|child| child.name() == name)
        .map(|child| child.text())
}
