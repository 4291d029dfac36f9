// Upstream field feed
// Loads labeled key/value records extracted from a source document


use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::Path;
use tracing::debug;

use crate::{RagError, Result};

/// One labeled field of a source document, e.g. `State: GUJARAT`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldRecord {
    pub label: String,
    #[serde(deserialize_with = "value_as_text")]
    pub value: String,
}

impl FieldRecord {
    #[inline]
    pub fn new(label: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            value: value.into(),
        }
    }

    /// Render the record as a single `"<label>: <value>"` line
    #[inline]
    pub fn render(&self) -> String {
        format!("{}: {}", self.label, self.value)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RecordFeed {
    Document {
        #[serde(rename = "headerFields")]
        header_fields: Vec<FieldRecord>,
    },
    Records(Vec<FieldRecord>),
}

fn value_as_text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    })
}

/// Parse a record feed from JSON text.
///
/// Accepts either an extraction document with a `headerFields` array or a bare
/// array of `{label, value}` objects.
#[inline]
pub fn parse_records(json: &str) -> Result<Vec<FieldRecord>> {
    let feed: RecordFeed = serde_json::from_str(json)
        .map_err(|e| RagError::Records(format!("Failed to parse record feed: {}", e)))?;

    Ok(match feed {
        RecordFeed::Document { header_fields } => header_fields,
        RecordFeed::Records(records) => records,
    })
}

/// Load a record feed from a JSON file
#[inline]
pub fn load_records<P: AsRef<Path>>(path: P) -> Result<Vec<FieldRecord>> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|e| {
        RagError::Records(format!("Failed to read {}: {}", path.display(), e))
    })?;

    let records = parse_records(&content)?;
    debug!("Loaded {} records from {}", records.len(), path.display());
    Ok(records)
}
