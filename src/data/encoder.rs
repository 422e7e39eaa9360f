//! Render native data schemas back to JSON.
//!
//! Each named type is written out in full the first time it is reached and
//! by full name afterwards, which keeps cyclic schemas finite and lets the
//! output be parsed again by `DataSchemaParser`.

use std::collections::HashSet;

use serde_json::{json, Map, Value};

use crate::data::{DataSchema, DataSchemaArena, Field, SchemaRef};
use crate::schema::{FieldOrder, Properties};

/// Render the schema at `root` as a JSON value.
pub fn data_schema_to_json(arena: &DataSchemaArena, root: SchemaRef) -> Value {
    DataSchemaEncoder::new(arena).encode(root)
}

/// Stateful encoder; named types defined by earlier `encode` calls are
/// referenced by name in later ones.
pub struct DataSchemaEncoder<'a> {
    arena: &'a DataSchemaArena,
    defined: HashSet<String>,
    current_namespace: Option<String>,
}

impl<'a> DataSchemaEncoder<'a> {
    pub fn new(arena: &'a DataSchemaArena) -> Self {
        Self {
            arena,
            defined: HashSet::new(),
            current_namespace: None,
        }
    }

    pub fn encode(&mut self, id: SchemaRef) -> Value {
        let arena = self.arena;
        let schema = &arena[id];
        if let Some(full) = schema.fullname() {
            if !self.defined.insert(full.clone()) {
                return json!(full);
            }
        }

        match schema {
            DataSchema::Primitive(p) => json!(p.name()),
            DataSchema::Record(record) => {
                let mut obj = self.named_header("record", &record.name, record.namespace.as_deref(), record.doc.as_deref());
                let saved = std::mem::replace(&mut self.current_namespace, record.namespace.clone());
                if !record.include.is_empty() {
                    let include: Vec<Value> = record.include.iter().map(|i| self.encode(*i)).collect();
                    obj.insert("include".to_string(), Value::Array(include));
                }
                let fields: Vec<Value> = record.fields.iter().map(|f| self.encode_field(f)).collect();
                obj.insert("fields".to_string(), Value::Array(fields));
                self.current_namespace = saved;
                extend(&mut obj, &record.properties);
                Value::Object(obj)
            }
            DataSchema::Enum(e) => {
                let mut obj = self.named_header("enum", &e.name, e.namespace.as_deref(), e.doc.as_deref());
                obj.insert("symbols".to_string(), json!(e.symbols));
                if !e.symbol_docs.is_empty() {
                    let docs: Map<String, Value> = e
                        .symbol_docs
                        .iter()
                        .map(|(k, v)| (k.clone(), json!(v)))
                        .collect();
                    obj.insert("symbolDocs".to_string(), Value::Object(docs));
                }
                extend(&mut obj, &e.properties);
                Value::Object(obj)
            }
            DataSchema::Fixed(f) => {
                let mut obj = self.named_header("fixed", &f.name, f.namespace.as_deref(), f.doc.as_deref());
                obj.insert("size".to_string(), json!(f.size));
                extend(&mut obj, &f.properties);
                Value::Object(obj)
            }
            DataSchema::Typeref(t) => {
                let mut obj = self.named_header("typeref", &t.name, t.namespace.as_deref(), t.doc.as_deref());
                let saved = std::mem::replace(&mut self.current_namespace, t.namespace.clone());
                obj.insert("ref".to_string(), self.encode(t.referenced));
                self.current_namespace = saved;
                extend(&mut obj, &t.properties);
                Value::Object(obj)
            }
            DataSchema::Array(a) => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("array"));
                obj.insert("items".to_string(), self.encode(a.items));
                extend(&mut obj, &a.properties);
                Value::Object(obj)
            }
            DataSchema::Map(m) => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("map"));
                obj.insert("values".to_string(), self.encode(m.values));
                extend(&mut obj, &m.properties);
                Value::Object(obj)
            }
            DataSchema::Union(u) => Value::Array(
                u.members
                    .iter()
                    .map(|member| {
                        let schema = self.encode(member.schema);
                        match &member.alias {
                            Some(alias) => json!({"alias": alias, "type": schema}),
                            None => schema,
                        }
                    })
                    .collect(),
            ),
        }
    }

    fn named_header(
        &self,
        kind: &str,
        name: &str,
        namespace: Option<&str>,
        doc: Option<&str>,
    ) -> Map<String, Value> {
        let mut obj = Map::new();
        obj.insert("type".to_string(), json!(kind));
        obj.insert("name".to_string(), json!(name));
        match namespace {
            Some(ns) => {
                obj.insert("namespace".to_string(), json!(ns));
            }
            // An empty namespace resets an inherited one
            None if self.current_namespace.is_some() => {
                obj.insert("namespace".to_string(), json!(""));
            }
            None => {}
        }
        if let Some(doc) = doc {
            obj.insert("doc".to_string(), json!(doc));
        }
        obj
    }

    fn encode_field(&mut self, field: &Field) -> Value {
        let mut obj = Map::new();
        obj.insert("name".to_string(), json!(field.name));
        obj.insert("type".to_string(), self.encode(field.schema));
        if field.optional {
            obj.insert("optional".to_string(), json!(true));
        }
        if let Some(default) = &field.default {
            obj.insert("default".to_string(), default.clone());
        }
        if let Some(doc) = &field.doc {
            obj.insert("doc".to_string(), json!(doc));
        }
        if field.order != FieldOrder::Ascending {
            obj.insert("order".to_string(), json!(field.order.as_str()));
        }
        extend(&mut obj, &field.properties);
        Value::Object(obj)
    }
}

fn extend(obj: &mut Map<String, Value>, properties: &Properties) {
    for (key, value) in properties {
        if !obj.contains_key(key) {
            obj.insert(key.clone(), value.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{parse_data_schema, PrimitiveType, RecordDataSchema, UnionDataSchema, UnionMember};

    #[test]
    fn test_cyclic_record_renders_reference() {
        let mut arena = DataSchemaArena::new();
        let foo = arena.reserve();
        arena.define(
            foo,
            DataSchema::Record(RecordDataSchema::new("foo", vec![Field::new("bar", foo).optional()])),
        );

        let rendered = data_schema_to_json(&arena, foo);
        assert_eq!(
            rendered,
            json!({"type": "record", "name": "foo", "fields": [
                {"name": "bar", "type": "foo", "optional": true}
            ]})
        );
    }

    #[test]
    fn test_aliased_union_renders_alias_objects() {
        let mut arena = DataSchemaArena::new();
        let string = arena.primitive(PrimitiveType::String);
        let union = arena.add(DataSchema::Union(UnionDataSchema {
            members: vec![
                UnionMember::aliased(string, "success"),
                UnionMember::aliased(string, "failure"),
            ],
        }));
        assert_eq!(
            data_schema_to_json(&arena, union),
            json!([{"alias": "success", "type": "string"}, {"alias": "failure", "type": "string"}])
        );
    }

    #[test]
    fn test_rendered_schema_parses_back() {
        let text = r#"{"type": "record", "name": "Outer", "namespace": "a", "fields": [
            {"name": "inner", "type": {"type": "record", "name": "Inner", "fields": [
                {"name": "color", "type": {"type": "enum", "name": "Color", "namespace": "b", "symbols": ["RED"], "symbolDocs": {"RED": "warm"}}}
            ]}},
            {"name": "again", "type": "Inner", "order": "descending"},
            {"name": "tint", "type": "b.Color", "default": "RED"}
        ]}"#;
        let tree = parse_data_schema(text).unwrap();
        let rendered = data_schema_to_json(&tree.arena, tree.root);
        let reparsed = parse_data_schema(&rendered.to_string()).unwrap();
        assert_eq!(data_schema_to_json(&reparsed.arena, reparsed.root), rendered);
    }
}
