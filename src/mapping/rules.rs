use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::fmt;

use super::MappingError;

/// Target field type of a mapping rule
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FieldType {
    /// Grouped sub-fields, one group per matched value
    Repeater,
    Other(String),
}

impl From<String> for FieldType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "repeater" => FieldType::Repeater,
            _ => FieldType::Other(value),
        }
    }
}

impl From<FieldType> for String {
    fn from(value: FieldType) -> Self {
        match value {
            FieldType::Repeater => "repeater".to_string(),
            FieldType::Other(other) => other,
        }
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldType::Repeater => f.write_str("repeater"),
            FieldType::Other(other) => f.write_str(other),
        }
    }
}

/// Canonical mapping rule: one remote metadata key to one target field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingRule {
    pub field_id: String,
    /// Matched as a substring of `metadataentry/key`
    pub field_name: String,
    #[serde(default)]
    pub acf_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub field_type: Option<FieldType>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_fields: Vec<MappingRule>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sub_field_names: Vec<String>,
}

impl MappingRule {
    pub fn new(field_id: impl Into<String>, field_name: impl Into<String>, acf_name: impl Into<String>) -> Self {
        Self {
            field_id: field_id.into(),
            field_name: field_name.into(),
            acf_name: acf_name.into(),
            field_type: None,
            sub_fields: Vec::new(),
            sub_field_names: Vec::new(),
        }
    }

    pub fn with_type(mut self, field_type: FieldType) -> Self {
        self.field_type = Some(field_type);
        self
    }

    pub fn with_sub_fields(mut self, sub_fields: Vec<MappingRule>, names: Vec<String>) -> Self {
        self.sub_fields = sub_fields;
        self.sub_field_names = names;
        self
    }

    pub fn is_repeater(&self) -> bool {
        self.field_type == Some(FieldType::Repeater)
    }
}

/// A mapping rule as it arrives at the boundary, in any of its three shapes.
///
/// The keyed shape names every attribute. The positional shape is a JSON
/// object with numeric keys (`"0"` id, `"1"` name, `"3"` target name, `"4"`
/// sub-field names) plus optional `field_type`/`sub_fields`. The sequence
/// shape is the same positional layout as a plain array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawMappingRule {
    // Tried first: derived structs also accept JSON arrays
    Sequence(Vec<Value>),
    Keyed(KeyedRule),
    Positional(PositionalRule),
}

#[derive(Debug, Clone, Deserialize)]
pub struct KeyedRule {
    #[serde(deserialize_with = "scalar_string")]
    pub field_id: String,
    #[serde(deserialize_with = "scalar_string")]
    pub field_name: String,
    #[serde(default, deserialize_with = "scalar_string")]
    pub acf_name: String,
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub sub_fields: Vec<RawMappingRule>,
    #[serde(default, deserialize_with = "string_list")]
    pub sub_field_names: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PositionalRule {
    #[serde(rename = "0", deserialize_with = "scalar_string")]
    pub field_id: String,
    #[serde(rename = "1", deserialize_with = "scalar_string")]
    pub field_name: String,
    #[serde(rename = "3", default, deserialize_with = "scalar_string")]
    pub acf_name: String,
    #[serde(rename = "4", default, deserialize_with = "string_list")]
    pub sub_field_names: Vec<String>,
    #[serde(default)]
    pub field_type: Option<String>,
    #[serde(default)]
    pub sub_fields: Vec<RawMappingRule>,
}

impl TryFrom<RawMappingRule> for MappingRule {
    type Error = MappingError;

    fn try_from(raw: RawMappingRule) -> Result<Self, Self::Error> {
        match raw {
            RawMappingRule::Keyed(rule) => Ok(MappingRule {
                field_id: rule.field_id,
                field_name: rule.field_name,
                acf_name: rule.acf_name,
                field_type: rule.field_type.map(FieldType::from),
                sub_fields: normalize_rules(rule.sub_fields)?,
                sub_field_names: rule.sub_field_names,
            }),
            RawMappingRule::Positional(rule) => Ok(MappingRule {
                field_id: rule.field_id,
                field_name: rule.field_name,
                acf_name: rule.acf_name,
                field_type: rule.field_type.map(FieldType::from),
                sub_fields: normalize_rules(rule.sub_fields)?,
                sub_field_names: rule.sub_field_names,
            }),
            RawMappingRule::Sequence(values) => {
                let field_id = values
                    .first()
                    .and_then(value_to_string)
                    .ok_or_else(|| MappingError::InvalidRule("missing field id at position 0".into()))?;
                let field_name = values
                    .get(1)
                    .and_then(value_to_string)
                    .ok_or_else(|| MappingError::InvalidRule("missing field name at position 1".into()))?;
                let acf_name = values.get(3).and_then(value_to_string).unwrap_or_default();
                let sub_field_names = values.get(4).map(value_to_list).unwrap_or_default();

                Ok(MappingRule {
                    field_id,
                    field_name,
                    acf_name,
                    field_type: None,
                    sub_fields: Vec::new(),
                    sub_field_names,
                })
            }
        }
    }
}

/// Normalize boundary rules of any shape into canonical rules, keeping order
pub fn normalize_rules(raw: Vec<RawMappingRule>) -> Result<Vec<MappingRule>, MappingError> {
    raw.into_iter().map(MappingRule::try_from).collect()
}

fn value_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

fn value_to_list(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(value_to_string).collect(),
        other => value_to_string(other)
            .filter(|s| !s.is_empty())
            .into_iter()
            .collect(),
    }
}

fn scalar_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    match value {
        Value::Null => Ok(String::new()),
        other => value_to_string(&other)
            .ok_or_else(|| serde::de::Error::custom("expected a string or number")),
    }
}

fn string_list<'de, D>(deserializer: D) -> Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Value::deserialize(deserializer)?;
    Ok(value_to_list(&value))
}
