use serde::{Deserialize, Serialize};
use tracing::debug;

use super::rules::{FieldType, MappingRule};
use crate::xml::XmlDocument;

/// Rules with these names are filled by the file-metadata phase, not from
/// the metadata document
pub const FILE_FIELDS: [&str; 3] = ["full_text_url", "full_text_type", "full_text_size"];

/// Language recorded when a value carries none
pub const DEFAULT_LANGUAGE: &str = "N/A";

/// One mapped value ready for the content store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldValueRecord {
    pub field_id: String,
    pub field_name: String,
    pub field_value: String,
    pub acf_name: String,
    pub language: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_fields: Vec<MappingRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_field_names: Vec<String>,
}

impl MappingRule {
    pub fn is_file_field(&self) -> bool {
        FILE_FIELDS.contains(&self.field_name.as_str())
    }

    fn record(&self, value: String, language: String, with_sub_fields: bool) -> FieldValueRecord {
        let (sub_fields, sub_field_names) = if with_sub_fields {
            (self.sub_fields.clone(), self.sub_field_names.clone())
        } else {
            (Vec::new(), Vec::new())
        };

        FieldValueRecord {
            field_id: self.field_id.clone(),
            field_name: self.field_name.clone(),
            field_value: value,
            acf_name: self.acf_name.clone(),
            language,
            field_type: self.field_type.clone(),
            sub_fields,
            sub_field_names,
        }
    }

    /// Empty record standing in for a file field until its value is known
    pub fn placeholder(&self) -> FieldValueRecord {
        let keep_shape = self.is_repeater() || !self.sub_fields.is_empty();
        self.record(String::new(), DEFAULT_LANGUAGE.to_string(), keep_shape)
    }
}

/// Applies a rule set to item metadata documents.
///
/// Stateless: the same document and rules always give the same records.
#[derive(Debug, Clone, Copy)]
pub struct FieldMapper<'r> {
    rules: &'r [MappingRule],
}

impl<'r> FieldMapper<'r> {
    pub fn new(rules: &'r [MappingRule]) -> Self {
        Self { rules }
    }

    /// Map one metadata document.
    ///
    /// Rules are applied in declaration order; within a rule, records follow
    /// the document order of the matched values. A rule without matches
    /// contributes nothing.
    pub fn map_document(&self, doc: &XmlDocument) -> Vec<FieldValueRecord> {
        let mut records = Vec::new();

        for rule in self.rules {
            if rule.is_file_field() {
                records.push(rule.placeholder());
                continue;
            }

            if rule.field_name.is_empty() {
                debug!(field_id = %rule.field_id, "Skipping rule with empty field name");
                continue;
            }

            for entry in doc.elements_by_tag("metadataentry") {
                let key_matches = entry
                    .children_by_tag("key")
                    .any(|key| key.text().contains(rule.field_name.as_str()));
                if !key_matches {
                    continue;
                }

                let language = entry
                    .select("language")
                    .first()
                    .map(|lang| lang.text())
                    .filter(|lang| !lang.is_empty())
                    .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string());

                for value in entry.children_by_tag("value") {
                    records.push(rule.record(value.text(), language.clone(), rule.is_repeater()));
                }
            }
        }

        records
    }

    /// The rules the file-metadata phase fills in
    pub fn file_rules(self) -> impl Iterator<Item = &'r MappingRule> {
        self.rules.iter().filter(|rule| rule.is_file_field())
    }

    /// Placeholder records for every file rule, handed to the store alongside
    /// the resolved file metadata
    pub fn file_placeholders(&self) -> Vec<FieldValueRecord> {
        self.file_rules().map(MappingRule::placeholder).collect()
    }
}

/// Distinct metadata keys of a document, in first-seen order
pub fn metadata_keys(doc: &XmlDocument) -> Vec<String> {
    let mut keys: Vec<String> = Vec::new();
    for key in doc.select("//metadataentry/key") {
        let key = key.text();
        if !keys.contains(&key) {
            keys.push(key);
        }
    }
    keys
}
