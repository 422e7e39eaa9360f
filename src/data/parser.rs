//! JSON parser for native data schemas.
//!
//! Parses `.pdsc`-style JSON documents into a `DataSchemaArena`. Named types
//! are registered before their bodies are parsed so records (and typerefs)
//! may refer to themselves. Names that are not defined earlier in the
//! document are looked up through an optional `NamedSchemaResolver`.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::data::{
    ArrayDataSchema, DataSchema, DataSchemaArena, DataSchemaTree, EnumDataSchema, Field,
    FixedDataSchema, MapDataSchema, PrimitiveType, RecordDataSchema, SchemaRef,
    TyperefDataSchema, UnionDataSchema, UnionMember,
};
use crate::error::SchemaError;
use crate::schema::{fullname, FieldOrder, Properties};

const RECORD_KEYS: &[&str] = &[
    "type", "name", "namespace", "doc", "aliases", "include", "fields",
];
const ENUM_KEYS: &[&str] = &["type", "name", "namespace", "doc", "aliases", "symbols", "symbolDocs"];
const FIXED_KEYS: &[&str] = &["type", "name", "namespace", "doc", "aliases", "size"];
const TYPEREF_KEYS: &[&str] = &["type", "name", "namespace", "doc", "aliases", "ref"];
const FIELD_KEYS: &[&str] = &["name", "type", "optional", "default", "doc", "order", "aliases"];

/// Supplies the text of named schemas that a document refers to but does
/// not define.
pub trait NamedSchemaResolver: Send + Sync {
    /// Return the JSON text defining `full_name`, if known.
    fn resolve(&self, full_name: &str) -> Option<String>;
}

/// A resolver backed by an in-memory table of schema documents.
#[derive(Debug, Clone, Default)]
pub struct InMemoryResolver {
    documents: HashMap<String, String>,
}

impl InMemoryResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make `text` available under `full_name`.
    pub fn add(&mut self, full_name: impl Into<String>, text: impl Into<String>) -> &mut Self {
        self.documents.insert(full_name.into(), text.into());
        self
    }
}

impl NamedSchemaResolver for InMemoryResolver {
    fn resolve(&self, full_name: &str) -> Option<String> {
        self.documents.get(full_name).cloned()
    }
}

/// Parse a native schema document with no external resolver.
///
/// # Example
/// ```
/// use pegasus_avro::data::{parse_data_schema, DataSchema};
///
/// let tree = parse_data_schema(r#"{"type": "record", "name": "foo", "fields": []}"#).unwrap();
/// assert!(matches!(tree.arena[tree.root], DataSchema::Record(_)));
/// ```
pub fn parse_data_schema(text: &str) -> Result<DataSchemaTree, SchemaError> {
    parse_data_schema_with_resolver(text, None)
}

/// Parse a native schema document, resolving unknown names through `resolver`.
pub fn parse_data_schema_with_resolver(
    text: &str,
    resolver: Option<&dyn NamedSchemaResolver>,
) -> Result<DataSchemaTree, SchemaError> {
    let mut parser = DataSchemaParser::new(resolver);
    let root = parser.parse_str(text)?;
    Ok(parser.finish(root))
}

/// Native schema parser with a name registry shared across documents.
pub struct DataSchemaParser<'r> {
    arena: DataSchemaArena,
    names: HashMap<String, SchemaRef>,
    current_namespace: Option<String>,
    resolver: Option<&'r dyn NamedSchemaResolver>,
}

impl<'r> DataSchemaParser<'r> {
    pub fn new(resolver: Option<&'r dyn NamedSchemaResolver>) -> Self {
        Self {
            arena: DataSchemaArena::new(),
            names: HashMap::new(),
            current_namespace: None,
            resolver,
        }
    }

    /// Parse one JSON document into the parser's arena.
    pub fn parse_str(&mut self, text: &str) -> Result<SchemaRef, SchemaError> {
        let value: Value = serde_json::from_str(text)
            .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;
        self.parse(&value)
    }

    /// Parse a JSON value into the parser's arena.
    pub fn parse(&mut self, value: &Value) -> Result<SchemaRef, SchemaError> {
        match value {
            Value::String(s) => self.parse_type_name(s),
            Value::Object(obj) => self.parse_object(obj),
            Value::Array(members) => self.parse_union(members),
            other => Err(SchemaError::InvalidSchema(format!(
                "Expected string, object, or array, found: {}",
                other
            ))),
        }
    }

    /// Look up a named type registered so far.
    pub fn lookup(&self, full_name: &str) -> Option<SchemaRef> {
        self.names.get(full_name).copied()
    }

    pub fn finish(self, root: SchemaRef) -> DataSchemaTree {
        DataSchemaTree {
            arena: self.arena,
            root,
        }
    }

    fn parse_type_name(&mut self, name: &str) -> Result<SchemaRef, SchemaError> {
        if let Some(primitive) = PrimitiveType::from_name(name) {
            return Ok(self.arena.primitive(primitive));
        }
        self.resolve_reference(name)
    }

    fn resolve_reference(&mut self, name: &str) -> Result<SchemaRef, SchemaError> {
        let candidates = match (&self.current_namespace, name.contains('.')) {
            (Some(ns), false) => vec![format!("{}.{}", ns, name), name.to_string()],
            _ => vec![name.to_string()],
        };
        if let Some(id) = candidates.iter().find_map(|c| self.lookup(c)) {
            return Ok(id);
        }

        let resolver = self.resolver;
        for candidate in &candidates {
            if let Some(text) = resolver.and_then(|r| r.resolve(candidate)) {
                debug!(name = %candidate, "resolving external named schema");
                let saved = self.current_namespace.take();
                let parsed = self.parse_str(&text);
                self.current_namespace = saved;
                parsed?;
                return self
                    .lookup(candidate)
                    .ok_or_else(|| SchemaError::UnresolvedName(candidate.clone()));
            }
        }
        Err(SchemaError::UnresolvedName(candidates[0].clone()))
    }

    fn parse_object(&mut self, obj: &Map<String, Value>) -> Result<SchemaRef, SchemaError> {
        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::InvalidSchema("Missing 'type' field".to_string()))?;

        let type_str = match type_value {
            Value::String(s) => s.as_str(),
            other => return self.parse(other),
        };

        match type_str {
            "record" => self.parse_record(obj),
            "enum" => self.parse_enum(obj),
            "fixed" => self.parse_fixed(obj),
            "typeref" => self.parse_typeref(obj),
            "array" => {
                let items = required(obj, "items", "Array")?;
                let items = self.parse(items)?;
                Ok(self.arena.add(DataSchema::Array(ArrayDataSchema {
                    items,
                    properties: extra_properties(obj, &["type", "items"]),
                })))
            }
            "map" => {
                let values = required(obj, "values", "Map")?;
                let values = self.parse(values)?;
                Ok(self.arena.add(DataSchema::Map(MapDataSchema {
                    values,
                    properties: extra_properties(obj, &["type", "values"]),
                })))
            }
            other => self.parse_type_name(other),
        }
    }

    fn parse_union(&mut self, members: &[Value]) -> Result<SchemaRef, SchemaError> {
        let mut parsed = Vec::with_capacity(members.len());
        for member in members {
            let member = match member {
                Value::Object(obj) if obj.contains_key("alias") => {
                    let alias = obj
                        .get("alias")
                        .and_then(|v| v.as_str())
                        .ok_or_else(|| {
                            SchemaError::InvalidSchema("Union member alias must be a string".into())
                        })?;
                    let schema = self.parse(required(obj, "type", "Aliased union member")?)?;
                    UnionMember::aliased(schema, alias)
                }
                other => UnionMember::new(self.parse(other)?),
            };
            parsed.push(member);
        }
        let union = UnionDataSchema { members: parsed };
        self.validate_union(&union)?;
        Ok(self.arena.add(DataSchema::Union(union)))
    }

    fn validate_union(&self, union: &UnionDataSchema) -> Result<(), SchemaError> {
        let mut seen = Vec::new();
        for member in &union.members {
            if matches!(self.arena[member.schema], DataSchema::Union(_)) {
                return Err(SchemaError::InvalidSchema(
                    "Union cannot directly contain another union".to_string(),
                ));
            }
            let key = self.arena.member_key(member);
            if seen.contains(&key) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Union contains duplicate member '{}'",
                    key
                )));
            }
            seen.push(key);
        }
        let aliased = union.members.iter().filter(|m| m.alias.is_some()).count();
        let non_null = union
            .members
            .iter()
            .filter(|m| !matches!(self.arena[m.schema], DataSchema::Primitive(PrimitiveType::Null)))
            .count();
        if aliased > 0 && aliased != non_null {
            return Err(SchemaError::InvalidSchema(
                "Union members must either all be aliased or none, except null".to_string(),
            ));
        }
        Ok(())
    }

    /// Name and namespace of a named type definition, registered to `id`.
    fn define_name(
        &mut self,
        obj: &Map<String, Value>,
        kind: &str,
        id: SchemaRef,
    ) -> Result<(String, Option<String>), SchemaError> {
        let raw = obj
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SchemaError::InvalidSchema(format!("{} missing 'name' field", kind)))?;

        let (name, namespace) = match raw.rsplit_once('.') {
            Some((ns, short)) => (short.to_string(), Some(ns.to_string())),
            None => {
                let namespace = match obj.get("namespace").and_then(|v| v.as_str()) {
                    Some("") => None,
                    Some(ns) => Some(ns.to_string()),
                    None => self.current_namespace.clone(),
                };
                (raw.to_string(), namespace)
            }
        };

        let full = fullname(&name, namespace.as_deref());
        if self.names.contains_key(&full) {
            return Err(SchemaError::InvalidSchema(format!("Can't redefine: {}", full)));
        }
        trace!(name = %full, "registered native named type");
        self.names.insert(full, id);
        Ok((name, namespace))
    }

    fn parse_record(&mut self, obj: &Map<String, Value>) -> Result<SchemaRef, SchemaError> {
        let id = self.arena.reserve();
        let (name, namespace) = self.define_name(obj, "Record", id)?;
        let saved = std::mem::replace(&mut self.current_namespace, namespace.clone());
        let body = self.parse_record_body(obj);
        self.current_namespace = saved;
        let (include, fields) = body?;

        self.arena.define(
            id,
            DataSchema::Record(RecordDataSchema {
                name,
                namespace,
                doc: string_property(obj, "doc"),
                include,
                fields,
                properties: extra_properties(obj, RECORD_KEYS),
            }),
        );
        Ok(id)
    }

    fn parse_record_body(
        &mut self,
        obj: &Map<String, Value>,
    ) -> Result<(Vec<SchemaRef>, Vec<Field>), SchemaError> {
        let mut include = Vec::new();
        if let Some(value) = obj.get("include") {
            let list = value.as_array().ok_or_else(|| {
                SchemaError::InvalidSchema("Record 'include' must be an array".to_string())
            })?;
            for item in list {
                let included = self.parse(item)?;
                if !matches!(self.arena[self.arena.dereference(included)], DataSchema::Record(_)) {
                    return Err(SchemaError::InvalidSchema(
                        "Record can only include other records".to_string(),
                    ));
                }
                include.push(included);
            }
        }

        let fields = obj
            .get("fields")
            .and_then(|v| v.as_array())
            .ok_or_else(|| SchemaError::InvalidSchema("Record missing 'fields' array".to_string()))?
            .iter()
            .map(|f| self.parse_field(f))
            .collect::<Result<Vec<_>, _>>()?;

        let mut seen = Vec::new();
        for field in &fields {
            if seen.contains(&&field.name) {
                return Err(SchemaError::InvalidSchema(format!(
                    "Field '{}' defined more than once",
                    field.name
                )));
            }
            seen.push(&field.name);
        }
        Ok((include, fields))
    }

    fn parse_field(&mut self, value: &Value) -> Result<Field, SchemaError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::InvalidSchema("Field must be an object".to_string()))?;
        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SchemaError::InvalidSchema("Field missing 'name'".to_string()))?
            .to_string();
        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::InvalidSchema(format!("Field '{}' missing 'type'", name)))?;
        let optional = match obj.get("optional") {
            None => false,
            Some(Value::Bool(b)) => *b,
            Some(other) => {
                return Err(SchemaError::InvalidSchema(format!(
                    "Field '{}' has non-boolean 'optional': {}",
                    name, other
                )))
            }
        };

        Ok(Field {
            schema: self.parse(type_value)?,
            optional,
            default: obj.get("default").cloned(),
            order: obj
                .get("order")
                .and_then(|v| v.as_str())
                .map(FieldOrder::parse)
                .unwrap_or_default(),
            doc: string_property(obj, "doc"),
            properties: extra_properties(obj, FIELD_KEYS),
            name,
        })
    }

    fn parse_enum(&mut self, obj: &Map<String, Value>) -> Result<SchemaRef, SchemaError> {
        let id = self.arena.reserve();
        let (name, namespace) = self.define_name(obj, "Enum", id)?;

        let symbols = obj
            .get("symbols")
            .and_then(|v| v.as_array())
            .ok_or_else(|| SchemaError::InvalidSchema("Enum missing 'symbols' array".to_string()))?
            .iter()
            .map(|v| {
                v.as_str().map(String::from).ok_or_else(|| {
                    SchemaError::InvalidSchema(format!("Enum symbol must be a string: {}", v))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let symbol_docs = obj
            .get("symbolDocs")
            .and_then(|v| v.as_object())
            .map(|docs| {
                docs.iter()
                    .filter_map(|(k, v)| v.as_str().map(|d| (k.clone(), d.to_string())))
                    .collect::<IndexMap<_, _>>()
            })
            .unwrap_or_default();

        self.arena.define(
            id,
            DataSchema::Enum(EnumDataSchema {
                name,
                namespace,
                doc: string_property(obj, "doc"),
                symbols,
                symbol_docs,
                properties: extra_properties(obj, ENUM_KEYS),
            }),
        );
        Ok(id)
    }

    fn parse_fixed(&mut self, obj: &Map<String, Value>) -> Result<SchemaRef, SchemaError> {
        let id = self.arena.reserve();
        let (name, namespace) = self.define_name(obj, "Fixed", id)?;
        let size = obj
            .get("size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| SchemaError::InvalidSchema("Fixed missing 'size' field".to_string()))?
            as usize;

        self.arena.define(
            id,
            DataSchema::Fixed(FixedDataSchema {
                name,
                namespace,
                doc: string_property(obj, "doc"),
                size,
                properties: extra_properties(obj, FIXED_KEYS),
            }),
        );
        Ok(id)
    }

    fn parse_typeref(&mut self, obj: &Map<String, Value>) -> Result<SchemaRef, SchemaError> {
        let id = self.arena.reserve();
        let (name, namespace) = self.define_name(obj, "Typeref", id)?;
        let saved = std::mem::replace(&mut self.current_namespace, namespace.clone());
        let referenced = required(obj, "ref", "Typeref").and_then(|r| self.parse(r));
        self.current_namespace = saved;
        let referenced = referenced?;

        if referenced == id {
            return Err(SchemaError::InvalidSchema(format!(
                "Typeref '{}' refers to itself",
                fullname(&name, namespace.as_deref())
            )));
        }

        self.arena.define(
            id,
            DataSchema::Typeref(TyperefDataSchema {
                name,
                namespace,
                doc: string_property(obj, "doc"),
                referenced,
                properties: extra_properties(obj, TYPEREF_KEYS),
            }),
        );
        Ok(id)
    }
}

fn required<'a>(obj: &'a Map<String, Value>, key: &str, kind: &str) -> Result<&'a Value, SchemaError> {
    obj.get(key)
        .ok_or_else(|| SchemaError::InvalidSchema(format!("{} missing '{}' field", kind, key)))
}

fn string_property(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn extra_properties(obj: &Map<String, Value>, reserved: &[&str]) -> Properties {
    obj.iter()
        .filter(|(k, _)| !reserved.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
