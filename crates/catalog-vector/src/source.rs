//! JSON catalog loader.
//!
//! Reads a product catalog (a JSON array of objects) into `IngestRecord`s.
//! The id and text fields are configurable. Other fields are carried as
//! payload strings.

use std::path::Path;

use serde_json::{Map, Value};
use tracing::{info, warn};

use catalog_core::config::IngestConfig;
use catalog_core::error::CatalogError;
use catalog_core::types::{IngestRecord, Payload};

/// Field name holding a stored embedding in exported catalogs. Never
/// copied into the payload.
const VECTOR_FIELD: &str = "vector";

/// Which catalog fields hold the record id and the text to embed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceMapping {
    pub id_field: String,
    pub text_field: String,
}

impl Default for SourceMapping {
    fn default() -> Self {
        Self {
            id_field: "productId".to_string(),
            text_field: "description".to_string(),
        }
    }
}

impl From<&IngestConfig> for SourceMapping {
    fn from(config: &IngestConfig) -> Self {
        Self {
            id_field: config.id_field.clone(),
            text_field: config.text_field.clone(),
        }
    }
}

/// Load a catalog file into ingest records, in file order.
pub fn load_catalog(path: &Path, mapping: &SourceMapping) -> Result<Vec<IngestRecord>, CatalogError> {
    let content = std::fs::read_to_string(path)?;
    let records = parse_catalog(&content, mapping)?;
    info!(path = %path.display(), count = records.len(), "Catalog loaded");
    Ok(records)
}

/// Parse catalog JSON text. Entries without a usable id or text are
/// skipped with a warning.
pub fn parse_catalog(json: &str, mapping: &SourceMapping) -> Result<Vec<IngestRecord>, CatalogError> {
    let value: Value = serde_json::from_str(json)?;
    let Value::Array(entries) = value else {
        return Err(CatalogError::Serialization(
            "Catalog must be a JSON array of objects".to_string(),
        ));
    };

    let mut records = Vec::with_capacity(entries.len());
    for (position, entry) in entries.into_iter().enumerate() {
        let Value::Object(fields) = entry else {
            warn!(position, "Skipping catalog entry that is not an object");
            continue;
        };
        match to_record(fields, mapping) {
            Some(record) => records.push(record),
            None => warn!(
                position,
                id_field = %mapping.id_field,
                text_field = %mapping.text_field,
                "Skipping catalog entry without id or text"
            ),
        }
    }
    Ok(records)
}

fn to_record(fields: Map<String, Value>, mapping: &SourceMapping) -> Option<IngestRecord> {
    let id = match fields.get(&mapping.id_field)? {
        Value::String(s) if !s.trim().is_empty() => s.clone(),
        Value::Number(n) => n.to_string(),
        _ => return None,
    };
    let text = fields.get(&mapping.text_field)?.as_str()?.to_string();

    let mut payload = Payload::new();
    for (name, value) in fields {
        if name == mapping.id_field || name == VECTOR_FIELD {
            continue;
        }
        let value = match value {
            Value::Null => continue,
            Value::String(s) => s,
            Value::Bool(b) => b.to_string(),
            Value::Number(n) => n.to_string(),
            nested @ (Value::Array(_) | Value::Object(_)) => nested.to_string(),
        };
        payload.insert(name, value);
    }

    Some(IngestRecord { id, text, payload })
}
