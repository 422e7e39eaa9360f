//! Native schema embedding on translated Avro roots.
//!
//! The embedded value is a map stored under `EMBEDDED_SCHEMA_KEY`:
//!
//! ```json
//! {"schema": {...native schema...}, "optionalDefaultMode": "TRANSLATE_DEFAULT", "extra": ...}
//! ```
//!
//! `extra` holds whatever the root already carried under the key.

use serde_json::{Map, Value};
use tracing::debug;

use crate::schema::{AvroSchema, Properties};
use crate::translate::OptionalDefaultMode;

/// Reserved property key holding the embedded native schema.
pub const EMBEDDED_SCHEMA_KEY: &str = "com.linkedin.data";

const SCHEMA_SUBKEY: &str = "schema";
const OPTIONAL_DEFAULT_MODE_SUBKEY: &str = "optionalDefaultMode";
const EXTRA_SUBKEY: &str = "extra";

/// Contents of the embedding property.
#[derive(Debug, Clone, PartialEq)]
pub struct EmbeddedSchema {
    pub schema: Value,
    pub optional_default_mode: Option<OptionalDefaultMode>,
}

/// Attach `native` to the root. Only roots that carry a property bag
/// (record, enum, fixed, array, map) can hold it; returns whether it was
/// attached.
pub(crate) fn embed_schema(root: &mut AvroSchema, native: Value, mode: OptionalDefaultMode) -> bool {
    let Some(properties) = root.properties_mut() else {
        debug!(kind = root.type_name(), "root cannot carry an embedded schema");
        return false;
    };

    let mut embedded = Map::new();
    embedded.insert(SCHEMA_SUBKEY.to_string(), native);
    embedded.insert(
        OPTIONAL_DEFAULT_MODE_SUBKEY.to_string(),
        Value::String(mode.as_str().to_string()),
    );
    if let Some(previous) = properties.remove(EMBEDDED_SCHEMA_KEY) {
        embedded.insert(EXTRA_SUBKEY.to_string(), previous);
    }
    properties.insert(EMBEDDED_SCHEMA_KEY.to_string(), Value::Object(embedded));
    true
}

/// Read the embedded schema from the root, if present and well formed.
pub fn embedded_schema(root: &AvroSchema) -> Option<EmbeddedSchema> {
    let embedded = root.properties()?.get(EMBEDDED_SCHEMA_KEY)?.as_object()?;
    let schema = embedded.get(SCHEMA_SUBKEY)?.clone();
    let optional_default_mode = embedded
        .get(OPTIONAL_DEFAULT_MODE_SUBKEY)
        .and_then(|v| v.as_str())
        .and_then(OptionalDefaultMode::parse);
    Some(EmbeddedSchema {
        schema,
        optional_default_mode,
    })
}

/// Remove the embedding property, putting back any value it displaced.
pub(crate) fn strip_embedded_schema(properties: &mut Properties) {
    let Some(removed) = properties.remove(EMBEDDED_SCHEMA_KEY) else {
        return;
    };
    if let Some(extra) = removed
        .as_object()
        .and_then(|embedded| embedded.get(EXTRA_SUBKEY))
    {
        properties.insert(EMBEDDED_SCHEMA_KEY.to_string(), extra.clone());
    }
}
