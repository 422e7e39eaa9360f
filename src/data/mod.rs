//! Native data schemas and values.
//!
//! The native model is the richer side of every translation: records with
//! included records, optional fields with defaults, typerefs and unions
//! whose members may be addressed by alias.

mod encoder;
mod parser;
mod types;
mod value;

pub use encoder::{data_schema_to_json, DataSchemaEncoder};
pub use parser::{
    parse_data_schema, parse_data_schema_with_resolver, DataSchemaParser, InMemoryResolver,
    NamedSchemaResolver,
};
pub use types::*;
pub use value::{latin1_bytes, DataValue};

/// A native schema together with the arena that owns it.
#[derive(Debug, Clone)]
pub struct DataSchemaTree {
    pub arena: DataSchemaArena,
    pub root: SchemaRef,
}

impl DataSchemaTree {
    pub fn node(&self) -> DataSchemaNode<'_> {
        self.arena.node(self.root)
    }

    /// Render the schema as native JSON.
    pub fn to_json_value(&self) -> serde_json::Value {
        data_schema_to_json(&self.arena, self.root)
    }
}
