//! Named type lookup for Avro schemas.
//!
//! Translated and parsed schemas define every named type once and refer to
//! it afterwards through `AvroSchema::Named`. Walkers that follow a schema
//! (equality checks, value translation, encoding) use a
//! `SchemaResolutionContext` to turn those references back into definitions.

use std::collections::HashMap;

use crate::error::SchemaError;
use crate::schema::AvroSchema;

/// A registry of named types (records, enums, fixed) by full name.
#[derive(Debug, Clone, Default)]
pub struct SchemaResolutionContext {
    named_types: HashMap<String, AvroSchema>,
}

impl SchemaResolutionContext {
    /// Create a new empty resolution context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Definition registered under `name`.
    pub fn get(&self, name: &str) -> Option<&AvroSchema> {
        self.named_types.get(name)
    }

    /// Check if a named type exists in the context.
    pub fn contains(&self, name: &str) -> bool {
        self.named_types.contains_key(name)
    }

    /// Build a resolution context by extracting all named types from a schema.
    pub fn build_from_schema(schema: &AvroSchema) -> Self {
        let mut context = Self::new();
        context.extract_named_types(schema);
        context
    }

    fn extract_named_types(&mut self, schema: &AvroSchema) {
        match schema {
            AvroSchema::Record(record) => {
                let fullname = record.fullname();
                if self.named_types.contains_key(&fullname) {
                    return;
                }
                self.named_types.insert(fullname, schema.clone());
                for field in &record.fields {
                    self.extract_named_types(&field.schema);
                }
            }
            AvroSchema::Enum(_) | AvroSchema::Fixed(_) => {
                self.named_types.insert(schema.member_key(), schema.clone());
            }
            AvroSchema::Array(array) => self.extract_named_types(&array.items),
            AvroSchema::Map(map) => self.extract_named_types(&map.values),
            AvroSchema::Union(variants) => {
                for variant in variants {
                    self.extract_named_types(variant);
                }
            }
            // Primitives and Named references don't contain named type definitions
            _ => {}
        }
    }

    /// Follow a `Named` reference to its definition; other schemas are
    /// returned unchanged.
    pub fn deref<'a>(&'a self, schema: &'a AvroSchema) -> Result<&'a AvroSchema, SchemaError> {
        match schema {
            AvroSchema::Named(name) => self
                .named_types
                .get(name)
                .ok_or_else(|| SchemaError::UnresolvedName(name.clone())),
            other => Ok(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EnumSchema, FieldSchema, FixedSchema, RecordSchema};

    #[test]
    fn test_build_context_with_nested_named_types() {
        let color = EnumSchema::new("Color", vec!["RED".to_string(), "GREEN".to_string()])
            .with_namespace("com.example");
        let hash = FixedSchema::new("Hash", 32).with_namespace("com.example");
        let record = RecordSchema::new(
            "Item",
            vec![
                FieldSchema::new("color", AvroSchema::Enum(color)),
                FieldSchema::new("hashes", AvroSchema::array(AvroSchema::Fixed(hash))),
            ],
        )
        .with_namespace("com.example");

        let context = SchemaResolutionContext::build_from_schema(&AvroSchema::Record(record));

        assert!(context.contains("com.example.Item"));
        assert!(context.contains("com.example.Color"));
        assert!(context.contains("com.example.Hash"));
    }

    #[test]
    fn test_deref_recursive_reference() {
        let linked_list = RecordSchema::new(
            "LinkedList",
            vec![
                FieldSchema::new("value", AvroSchema::Int),
                FieldSchema::new(
                    "next",
                    AvroSchema::Union(vec![
                        AvroSchema::Null,
                        AvroSchema::Named("LinkedList".to_string()),
                    ]),
                ),
            ],
        );
        let schema = AvroSchema::Record(linked_list);
        let context = SchemaResolutionContext::build_from_schema(&schema);

        let reference = AvroSchema::Named("LinkedList".to_string());
        assert_eq!(context.deref(&reference).unwrap(), &schema);
        assert_eq!(context.deref(&AvroSchema::Int).unwrap(), &AvroSchema::Int);
    }

    #[test]
    fn test_deref_unresolved_reference_error() {
        let context = SchemaResolutionContext::new();
        let named_ref = AvroSchema::Named("NonExistent".to_string());
        assert_eq!(
            context.deref(&named_ref).unwrap_err(),
            SchemaError::UnresolvedName("NonExistent".to_string())
        );
    }
}
