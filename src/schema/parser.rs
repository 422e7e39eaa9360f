//! Avro schema JSON to `AvroSchema`.
//!
//! Attributes outside the Avro vocabulary are kept as properties on the node
//! that carries them. Every named reference must resolve within the document.

use std::collections::{HashMap, HashSet};

use serde_json::{Map, Value};
use tracing::warn;

use crate::error::SchemaError;
use crate::schema::{
    fullname, AvroSchema, ArraySchema, EnumSchema, FieldOrder, FieldSchema, FixedSchema,
    MapSchema, Properties, RecordSchema,
};

const RECORD_KEYS: &[&str] = &["type", "name", "namespace", "doc", "aliases", "fields"];
const ENUM_KEYS: &[&str] = &[
    "type", "name", "namespace", "doc", "aliases", "symbols", "default",
];
const FIXED_KEYS: &[&str] = &["type", "name", "namespace", "doc", "aliases", "size"];
const FIELD_KEYS: &[&str] = &["name", "type", "default", "doc", "order", "aliases"];

/// Parse an Avro schema from a JSON string.
///
/// Every named type reference must resolve to a type defined in the same
/// document.
///
/// # Example
/// ```
/// use pegasus_avro::schema::{parse_schema, AvroSchema};
///
/// let schema = parse_schema(r#""string""#).unwrap();
/// assert_eq!(schema, AvroSchema::String);
/// ```
pub fn parse_schema(json: &str) -> Result<AvroSchema, SchemaError> {
    parse_schema_with_options(json, false)
}

/// Like [`parse_schema`]. With `strict` set, duplicate or nested union
/// branches and malformed names are errors instead of warnings.
pub fn parse_schema_with_options(json: &str, strict: bool) -> Result<AvroSchema, SchemaError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| SchemaError::ParseError(format!("Invalid JSON: {}", e)))?;

    let mut parser = SchemaParser::new().with_strict(strict);
    let schema = parser.parse(&value)?;
    parser.check_references()?;
    Ok(schema)
}

/// Parser state: named types seen so far and the enclosing namespace.
#[derive(Debug, Default)]
pub struct SchemaParser {
    named_types: HashMap<String, AvroSchema>,
    /// Every name referenced by a `Named` node
    referenced: HashSet<String>,
    current_namespace: Option<String>,
    strict_schema: bool,
}

impl SchemaParser {
    /// A permissive parser.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_strict(mut self, strict: bool) -> Self {
        self.strict_schema = strict;
        self
    }

    pub fn parse(&mut self, value: &Value) -> Result<AvroSchema, SchemaError> {
        match value {
            Value::String(s) => Ok(self.parse_string_schema(s)),
            Value::Object(obj) => self.parse_object_schema(obj),
            Value::Array(arr) => self.parse_union_schema(arr),
            _ => Err(SchemaError::InvalidSchema(format!(
                "Expected string, object, or array, found: {}",
                value
            ))),
        }
    }

    /// Fail if any referenced name was never defined.
    pub fn check_references(&self) -> Result<(), SchemaError> {
        let mut missing: Vec<&String> = self
            .referenced
            .iter()
            .filter(|name| !self.named_types.contains_key(*name))
            .collect();
        missing.sort();
        match missing.first() {
            Some(name) => Err(SchemaError::UnresolvedName((*name).clone())),
            None => Ok(()),
        }
    }

    /// Definition of a type parsed so far, by full name.
    pub fn get_named_type(&self, name: &str) -> Option<&AvroSchema> {
        self.named_types.get(name)
    }

    fn parse_string_schema(&mut self, s: &str) -> AvroSchema {
        match primitive(s) {
            Some(p) => p,
            None => {
                let fullname = self.resolve_name(s);
                self.referenced.insert(fullname.clone());
                AvroSchema::Named(fullname)
            }
        }
    }

    fn parse_object_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::InvalidSchema("Missing 'type' field".to_string()))?;

        let type_str = match type_value {
            Value::String(s) => s.as_str(),
            // {"type": {...}} or {"type": [...]} wraps another schema
            other => return self.parse(other),
        };

        match type_str {
            "record" | "error" => self.parse_record_schema(obj),
            "enum" => self.parse_enum_schema(obj),
            "array" => self.parse_array_schema(obj),
            "map" => self.parse_map_schema(obj),
            "fixed" => self.parse_fixed_schema(obj),
            // Primitive types can also appear as objects; annotations such as
            // logicalType are not modelled and the base type is used
            other => Ok(self.parse_string_schema(other)),
        }
    }

    fn parse_union_schema(&mut self, arr: &[Value]) -> Result<AvroSchema, SchemaError> {
        if arr.is_empty() {
            return Err(SchemaError::InvalidSchema(
                "Union schema cannot be empty".to_string(),
            ));
        }

        let variants = arr
            .iter()
            .map(|v| self.parse(v))
            .collect::<Result<Vec<_>, _>>()?;

        self.validate_union(&variants)?;

        Ok(AvroSchema::Union(variants))
    }

    /// Resolve name + namespace of a named type definition.
    fn named_definition(
        &mut self,
        obj: &Map<String, Value>,
        kind: &str,
    ) -> Result<(String, Option<String>), SchemaError> {
        let raw = obj
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SchemaError::InvalidSchema(format!("{} missing 'name' field", kind)))?;

        let explicit_ns = obj
            .get("namespace")
            .and_then(|v| v.as_str())
            .filter(|ns| !ns.is_empty())
            .map(String::from);

        let (name, namespace) = match raw.rsplit_once('.') {
            Some((ns, short)) => (short.to_string(), Some(ns.to_string())),
            None => (
                raw.to_string(),
                explicit_ns.or_else(|| self.current_namespace.clone()),
            ),
        };
        self.validate_name(&name, kind)?;

        let full = fullname(&name, namespace.as_deref());
        if self.named_types.contains_key(&full) {
            return Err(SchemaError::InvalidSchema(format!(
                "Can't redefine: {}",
                full
            )));
        }
        Ok((name, namespace))
    }

    fn parse_record_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let (name, namespace) = self.named_definition(obj, "Record")?;
        let full = fullname(&name, namespace.as_deref());

        // Register before parsing fields so recursive references resolve
        self.named_types
            .insert(full.clone(), AvroSchema::Named(full.clone()));

        let prev_namespace = std::mem::replace(&mut self.current_namespace, namespace.clone());

        let fields_value = obj
            .get("fields")
            .and_then(|v| v.as_array())
            .ok_or_else(|| {
                SchemaError::InvalidSchema("Record missing 'fields' array".to_string())
            })?;

        let fields: Result<Vec<FieldSchema>, SchemaError> = fields_value
            .iter()
            .map(|f| self.parse_field_schema(f))
            .collect();

        self.current_namespace = prev_namespace;

        let record = RecordSchema {
            name,
            namespace,
            fields: fields?,
            doc: string_property(obj, "doc"),
            aliases: string_list(obj, "aliases"),
            properties: extra_properties(obj, RECORD_KEYS),
        };

        let schema = AvroSchema::Record(record);
        self.named_types.insert(full, schema.clone());
        Ok(schema)
    }

    fn parse_field_schema(&mut self, value: &Value) -> Result<FieldSchema, SchemaError> {
        let obj = value
            .as_object()
            .ok_or_else(|| SchemaError::InvalidSchema("Field must be an object".to_string()))?;

        let name = obj
            .get("name")
            .and_then(|v| v.as_str())
            .ok_or_else(|| SchemaError::InvalidSchema("Field missing 'name'".to_string()))?
            .to_string();
        self.validate_name(&name, "Field")?;

        let type_value = obj
            .get("type")
            .ok_or_else(|| SchemaError::InvalidSchema(format!("Field '{}' missing 'type'", name)))?;

        Ok(FieldSchema {
            schema: self.parse(type_value)?,
            default: obj.get("default").cloned(),
            doc: string_property(obj, "doc"),
            order: obj
                .get("order")
                .and_then(|v| v.as_str())
                .map(FieldOrder::parse)
                .unwrap_or_default(),
            aliases: string_list(obj, "aliases"),
            properties: extra_properties(obj, FIELD_KEYS),
            name,
        })
    }

    fn parse_enum_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let (name, namespace) = self.named_definition(obj, "Enum")?;

        let symbols = obj
            .get("symbols")
            .and_then(|v| v.as_array())
            .ok_or_else(|| SchemaError::InvalidSchema("Enum missing 'symbols' array".to_string()))?
            .iter()
            .filter_map(|v| v.as_str().map(String::from))
            .collect::<Vec<_>>();

        for symbol in &symbols {
            self.validate_name(symbol, "Enum symbol")?;
        }

        let enum_schema = EnumSchema {
            symbols,
            doc: string_property(obj, "doc"),
            aliases: string_list(obj, "aliases"),
            default: string_property(obj, "default"),
            properties: extra_properties(obj, ENUM_KEYS),
            name,
            namespace,
        };

        let schema = AvroSchema::Enum(enum_schema);
        self.named_types
            .insert(schema.member_key(), schema.clone());
        Ok(schema)
    }

    fn parse_array_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let items = obj
            .get("items")
            .ok_or_else(|| SchemaError::InvalidSchema("Array missing 'items' field".to_string()))?;

        Ok(AvroSchema::Array(ArraySchema {
            items: Box::new(self.parse(items)?),
            properties: extra_properties(obj, &["type", "items"]),
        }))
    }

    fn parse_map_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let values = obj
            .get("values")
            .ok_or_else(|| SchemaError::InvalidSchema("Map missing 'values' field".to_string()))?;

        Ok(AvroSchema::Map(MapSchema {
            values: Box::new(self.parse(values)?),
            properties: extra_properties(obj, &["type", "values"]),
        }))
    }

    fn parse_fixed_schema(&mut self, obj: &Map<String, Value>) -> Result<AvroSchema, SchemaError> {
        let (name, namespace) = self.named_definition(obj, "Fixed")?;

        let size = obj
            .get("size")
            .and_then(|v| v.as_u64())
            .ok_or_else(|| SchemaError::InvalidSchema("Fixed missing 'size' field".to_string()))?
            as usize;

        let fixed_schema = FixedSchema {
            size,
            doc: string_property(obj, "doc"),
            aliases: string_list(obj, "aliases"),
            properties: extra_properties(obj, FIXED_KEYS),
            name,
            namespace,
        };

        let schema = AvroSchema::Fixed(fixed_schema);
        self.named_types
            .insert(schema.member_key(), schema.clone());
        Ok(schema)
    }

    /// Qualify `name` with the enclosing namespace unless only the bare
    /// name is defined.
    fn resolve_name(&self, name: &str) -> String {
        if name.contains('.') {
            name.to_string()
        } else if let Some(ns) = &self.current_namespace {
            let qualified = format!("{}.{}", ns, name);
            // Fall back to the null namespace if only the bare name is defined
            if !self.named_types.contains_key(&qualified) && self.named_types.contains_key(name) {
                name.to_string()
            } else {
                qualified
            }
        } else {
            name.to_string()
        }
    }

    /// Names match `[A-Za-z_][A-Za-z0-9_]*`.
    fn validate_name(&self, name: &str, context: &str) -> Result<(), SchemaError> {
        let mut chars = name.chars();
        let problem = match chars.next() {
            None => Some(format!("{} name cannot be empty", context)),
            Some(first) if !first.is_ascii_alphabetic() && first != '_' => Some(format!(
                "{} name '{}' must start with a letter or underscore",
                context, name
            )),
            Some(_) => chars
                .find(|ch| !ch.is_ascii_alphanumeric() && *ch != '_')
                .map(|ch| {
                    format!(
                        "{} name '{}' contains invalid character '{}'",
                        context, name, ch
                    )
                }),
        };

        match problem {
            Some(msg) if self.strict_schema => Err(SchemaError::InvalidSchema(msg)),
            Some(msg) => {
                warn!("{}", msg);
                Ok(())
            }
            None => Ok(()),
        }
    }

    fn validate_union(&self, variants: &[AvroSchema]) -> Result<(), SchemaError> {
        let mut seen_types = HashSet::new();
        for (i, variant) in variants.iter().enumerate() {
            let msg = if matches!(variant, AvroSchema::Union(_)) {
                Some(format!(
                    "Union contains nested union at position {} (unions cannot be nested)",
                    i
                ))
            } else if !seen_types.insert(variant.member_key()) {
                Some(format!(
                    "Union contains duplicate type '{}' at position {}",
                    variant.member_key(),
                    i
                ))
            } else {
                None
            };

            if let Some(msg) = msg {
                if self.strict_schema {
                    return Err(SchemaError::InvalidSchema(msg));
                }
                warn!("{}", msg);
            }
        }
        Ok(())
    }
}

fn primitive(s: &str) -> Option<AvroSchema> {
    match s {
        "null" => Some(AvroSchema::Null),
        "boolean" => Some(AvroSchema::Boolean),
        "int" => Some(AvroSchema::Int),
        "long" => Some(AvroSchema::Long),
        "float" => Some(AvroSchema::Float),
        "double" => Some(AvroSchema::Double),
        "bytes" => Some(AvroSchema::Bytes),
        "string" => Some(AvroSchema::String),
        _ => None,
    }
}

fn string_property(obj: &Map<String, Value>, key: &str) -> Option<String> {
    obj.get(key).and_then(|v| v.as_str()).map(String::from)
}

fn string_list(obj: &Map<String, Value>, key: &str) -> Vec<String> {
    obj.get(key)
        .and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

fn extra_properties(obj: &Map<String, Value>, reserved: &[&str]) -> Properties {
    obj.iter()
        .filter(|(k, _)| !reserved.contains(&k.as_str()))
        .map(|(k, v)| (k.clone(), v.clone()))
        .collect()
}
