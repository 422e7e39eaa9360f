//! Avro to native schema translation.

use std::collections::HashMap;

use serde_json::{Map, Value};
use tracing::{debug, trace};

use crate::codec::avro_adapter;
use crate::data::{
    ArrayDataSchema, DataSchema, DataSchemaArena, DataSchemaParser, DataSchemaTree, EnumDataSchema,
    Field, FixedDataSchema, MapDataSchema, PrimitiveType, RecordDataSchema, SchemaRef,
    UnionDataSchema, UnionMember,
};
use crate::error::TranslationError;
use crate::schema::{
    avro_schemas_equal, fullname, AvroSchema, EnumSchema, FixedSchema, RecordSchema,
    SchemaResolutionContext,
};
use crate::translate::embed::{embedded_schema, strip_embedded_schema, EmbeddedSchema};
use crate::translate::to_avro::{data_to_avro_schema, AVRO_NAMESPACE_PREFIX, SYMBOL_DOCS_PROPERTY};
use crate::translate::{AvroToDataSchemaMode, AvroToDataSchemaOptions, DataToAvroSchemaOptions};

/// Result of backward translation: the native schema and its arena.
pub type TranslatedDataSchema = DataSchemaTree;

/// Parse Avro schema JSON with the active codec adapter and translate it.
pub fn avro_json_to_data_schema(
    text: &str,
    options: &AvroToDataSchemaOptions,
) -> Result<TranslatedDataSchema, TranslationError> {
    let schema = avro_adapter()?.parse_schema(text)?;
    avro_to_data_schema(&schema, options)
}

/// Translate an Avro schema into a native schema.
///
/// In `Translate` mode the conversion is purely structural. The embedded
/// schema modes prefer the native schema carried on the root, if any.
pub fn avro_to_data_schema(
    schema: &AvroSchema,
    options: &AvroToDataSchemaOptions,
) -> Result<TranslatedDataSchema, TranslationError> {
    match options.mode {
        AvroToDataSchemaMode::Translate => translate(schema, options),
        AvroToDataSchemaMode::ReturnEmbeddedSchema => match embedded_schema(schema) {
            Some(embedded) => parse_embedded(&embedded, options),
            None => {
                debug!("no embedded schema on root, translating structurally");
                translate(schema, options)
            }
        },
        AvroToDataSchemaMode::VerifyEmbeddedSchema => {
            let embedded = embedded_schema(schema).ok_or_else(|| {
                TranslationError::Verification(format!(
                    "schema '{}' carries no embedded native schema",
                    schema.member_key()
                ))
            })?;
            let from_embedded = parse_embedded(&embedded, options)?;
            let forward_options = DataToAvroSchemaOptions::default()
                .with_optional_default_mode(embedded.optional_default_mode.unwrap_or_default())
                .with_override_namespace(options.override_namespace);
            let expected =
                data_to_avro_schema(&from_embedded.arena, from_embedded.root, &forward_options)?;

            let mut actual = schema.clone();
            if let Some(props) = actual.properties_mut() {
                strip_embedded_schema(props);
            }
            if !avro_schemas_equal(&expected, &actual) {
                return Err(TranslationError::Verification(format!(
                    "embedded schema translates to {} but the Avro schema is {}",
                    expected.to_json(),
                    actual.to_json()
                )));
            }
            Ok(from_embedded)
        }
    }
}

fn parse_embedded(
    embedded: &EmbeddedSchema,
    options: &AvroToDataSchemaOptions,
) -> Result<TranslatedDataSchema, TranslationError> {
    let mut parser = DataSchemaParser::new(options.resolver.as_deref());
    let root = parser.parse(&embedded.schema)?;
    debug!("using embedded native schema");
    Ok(parser.finish(root))
}

fn translate(
    schema: &AvroSchema,
    options: &AvroToDataSchemaOptions,
) -> Result<TranslatedDataSchema, TranslationError> {
    let mut root_schema = schema.clone();
    if let Some(props) = root_schema.properties_mut() {
        strip_embedded_schema(props);
    }

    let context = SchemaResolutionContext::build_from_schema(&root_schema);
    let mut translator = BackwardTranslator {
        arena: DataSchemaArena::new(),
        context: &context,
        translated: HashMap::new(),
        override_namespace: options.override_namespace,
    };
    let root = translator.translate_type(&root_schema, "")?;
    Ok(DataSchemaTree {
        arena: translator.arena,
        root,
    })
}

struct BackwardTranslator<'s> {
    arena: DataSchemaArena,
    context: &'s SchemaResolutionContext,
    /// Avro full name to the native node translated from it
    translated: HashMap<String, SchemaRef>,
    override_namespace: bool,
}

impl<'s> BackwardTranslator<'s> {
    fn namespace(&self, namespace: Option<&str>) -> Option<String> {
        match (self.override_namespace, namespace) {
            (true, Some(ns)) if !ns.is_empty() => Some(format!("{}.{}", AVRO_NAMESPACE_PREFIX, ns)),
            (true, _) => Some(AVRO_NAMESPACE_PREFIX.to_string()),
            (false, ns) => ns.filter(|ns| !ns.is_empty()).map(str::to_string),
        }
    }

    fn translate_type(&mut self, schema: &AvroSchema, path: &str) -> Result<SchemaRef, TranslationError> {
        Ok(match schema {
            AvroSchema::Null => self.arena.primitive(PrimitiveType::Null),
            AvroSchema::Boolean => self.arena.primitive(PrimitiveType::Boolean),
            AvroSchema::Int => self.arena.primitive(PrimitiveType::Int),
            AvroSchema::Long => self.arena.primitive(PrimitiveType::Long),
            AvroSchema::Float => self.arena.primitive(PrimitiveType::Float),
            AvroSchema::Double => self.arena.primitive(PrimitiveType::Double),
            AvroSchema::Bytes => self.arena.primitive(PrimitiveType::Bytes),
            AvroSchema::String => self.arena.primitive(PrimitiveType::String),
            AvroSchema::Named(name) => {
                if let Some(id) = self.translated.get(name) {
                    trace!(name = %name, "reusing translated named type");
                    return Ok(*id);
                }
                let context = self.context;
                let target = context.get(name).ok_or_else(|| TranslationError::InvalidSchema {
                    path: path.to_string(),
                    reason: format!("unresolved named type '{}'", name),
                })?;
                return self.translate_type(target, path);
            }
            AvroSchema::Record(record) => return self.translate_record(record),
            AvroSchema::Enum(e) => return Ok(self.translate_enum(e)),
            AvroSchema::Fixed(f) => return Ok(self.translate_fixed(f)),
            AvroSchema::Array(array) => {
                let items = self.translate_type(&array.items, path)?;
                self.arena.add(DataSchema::Array(ArrayDataSchema {
                    items,
                    properties: array.properties.clone(),
                }))
            }
            AvroSchema::Map(map) => {
                let values = self.translate_type(&map.values, path)?;
                self.arena.add(DataSchema::Map(MapDataSchema {
                    values,
                    properties: map.properties.clone(),
                }))
            }
            AvroSchema::Union(branches) => {
                let members = branches
                    .iter()
                    .map(|branch| self.translate_type(branch, path).map(UnionMember::new))
                    .collect::<Result<Vec<_>, _>>()?;
                self.arena.add(DataSchema::Union(UnionDataSchema { members }))
            }
        })
    }

    fn translate_enum(&mut self, e: &EnumSchema) -> SchemaRef {
        if let Some(id) = self.translated.get(&e.fullname()) {
            return *id;
        }
        let mut properties = e.properties.clone();
        let symbol_docs = properties
            .remove(SYMBOL_DOCS_PROPERTY)
            .and_then(|docs| match docs {
                Value::Object(docs) => Some(
                    docs.into_iter()
                        .filter_map(|(symbol, doc)| doc.as_str().map(|doc| (symbol, doc.to_string())))
                        .collect(),
                ),
                _ => None,
            })
            .unwrap_or_default();

        let id = self.arena.add(DataSchema::Enum(EnumDataSchema {
            name: e.name.clone(),
            namespace: self.namespace(e.namespace.as_deref()),
            doc: e.doc.clone(),
            symbols: e.symbols.clone(),
            symbol_docs,
            properties,
        }));
        self.translated.insert(e.fullname(), id);
        id
    }

    fn translate_fixed(&mut self, f: &FixedSchema) -> SchemaRef {
        if let Some(id) = self.translated.get(&f.fullname()) {
            return *id;
        }
        let id = self.arena.add(DataSchema::Fixed(FixedDataSchema {
            name: f.name.clone(),
            namespace: self.namespace(f.namespace.as_deref()),
            doc: f.doc.clone(),
            size: f.size,
            properties: f.properties.clone(),
        }));
        self.translated.insert(f.fullname(), id);
        id
    }

    fn translate_record(&mut self, record: &RecordSchema) -> Result<SchemaRef, TranslationError> {
        let wire_name = record.fullname();
        if let Some(id) = self.translated.get(&wire_name) {
            return Ok(*id);
        }
        let id = self.arena.reserve();
        self.translated.insert(wire_name.clone(), id);
        debug!(name = %wire_name, "translating Avro record");

        let mut fields = Vec::with_capacity(record.fields.len());
        for wire_field in &record.fields {
            let path = format!("{}.{}", wire_name, wire_field.name);
            let (schema, optional, default) = match &wire_field.schema {
                AvroSchema::Union(branches) if branches.contains(&AvroSchema::Null) => {
                    let non_null: Vec<&AvroSchema> = branches
                        .iter()
                        .filter(|b| **b != AvroSchema::Null)
                        .collect();
                    let schema = match non_null.as_slice() {
                        [single] => self.translate_type(single, &path)?,
                        _ => {
                            let members = non_null
                                .iter()
                                .map(|b| self.translate_type(b, &path).map(UnionMember::new))
                                .collect::<Result<Vec<_>, _>>()?;
                            self.arena.add(DataSchema::Union(UnionDataSchema { members }))
                        }
                    };
                    let default = match &wire_field.default {
                        None | Some(Value::Null) => None,
                        Some(value) => Some(self.optional_default(value, branches, &path)?),
                    };
                    (schema, true, default)
                }
                other => {
                    let schema = self.translate_type(other, &path)?;
                    let default = wire_field
                        .default
                        .as_ref()
                        .map(|value| self.native_default(value, other, &path))
                        .transpose()?;
                    (schema, false, default)
                }
            };

            fields.push(Field {
                name: wire_field.name.clone(),
                schema,
                optional,
                default,
                order: wire_field.order,
                doc: wire_field.doc.clone(),
                properties: wire_field.properties.clone(),
            });
        }

        self.arena.define(
            id,
            DataSchema::Record(RecordDataSchema {
                name: record.name.clone(),
                namespace: self.namespace(record.namespace.as_deref()),
                doc: record.doc.clone(),
                include: Vec::new(),
                fields,
                properties: record.properties.clone(),
            }),
        );
        Ok(id)
    }

    /// Native key of the native member translated from `branch`.
    fn member_key(&self, branch: &AvroSchema, path: &str) -> Result<String, TranslationError> {
        let resolved = self.resolve_owned(branch, path)?;
        Ok(match resolved {
            AvroSchema::Record(RecordSchema { name, namespace, .. })
            | AvroSchema::Enum(EnumSchema { name, namespace, .. })
            | AvroSchema::Fixed(FixedSchema { name, namespace, .. }) => {
                fullname(name, self.namespace(namespace.as_deref()).as_deref())
            }
            other => other.type_name().to_string(),
        })
    }

    fn resolve_owned<'b>(&self, schema: &'b AvroSchema, path: &str) -> Result<&'b AvroSchema, TranslationError>
    where
        's: 'b,
    {
        let context = self.context;
        match schema {
            AvroSchema::Named(name) => context.get(name).ok_or_else(|| TranslationError::InvalidSchema {
                path: path.to_string(),
                reason: format!("unresolved named type '{}'", name),
            }),
            other => Ok(other),
        }
    }

    /// Default of an optional field: a value of the union's first branch.
    fn optional_default(
        &self,
        value: &Value,
        branches: &[AvroSchema],
        path: &str,
    ) -> Result<Value, TranslationError> {
        let first = branches.first().filter(|b| **b != AvroSchema::Null).ok_or_else(|| {
            TranslationError::DefaultValue {
                path: path.to_string(),
                reason: format!("{} does not match the null first branch", value),
            }
        })?;
        let converted = self.native_default(value, first, path)?;
        let non_null = branches.iter().filter(|b| **b != AvroSchema::Null).count();
        if non_null == 1 {
            Ok(converted)
        } else {
            Ok(single_entry(self.member_key(first, path)?, converted))
        }
    }

    /// Convert an Avro default of `schema` into native form.
    fn native_default(&self, value: &Value, schema: &AvroSchema, path: &str) -> Result<Value, TranslationError> {
        let invalid = |reason: String| TranslationError::DefaultValue {
            path: path.to_string(),
            reason,
        };
        match self.resolve_owned(schema, path)? {
            AvroSchema::Record(record) => {
                let obj = value
                    .as_object()
                    .ok_or_else(|| invalid(format!("expected a record, found {}", value)))?;
                let mut out = Map::new();
                for field in &record.fields {
                    let Some(field_value) = obj.get(&field.name) else {
                        continue;
                    };
                    let field_path = format!("{}/{}", path, field.name);
                    match &field.schema {
                        AvroSchema::Union(branches) if branches.contains(&AvroSchema::Null) => {
                            if !field_value.is_null() {
                                out.insert(
                                    field.name.clone(),
                                    self.optional_default(field_value, branches, &field_path)?,
                                );
                            }
                        }
                        other => {
                            out.insert(
                                field.name.clone(),
                                self.native_default(field_value, other, &field_path)?,
                            );
                        }
                    }
                }
                Ok(Value::Object(out))
            }
            AvroSchema::Array(array) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| invalid(format!("expected an array, found {}", value)))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.native_default(item, &array.items, &format!("{}/{}", path, i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            AvroSchema::Map(map) => {
                let entries = value
                    .as_object()
                    .ok_or_else(|| invalid(format!("expected a map, found {}", value)))?;
                let mut out = Map::new();
                for (key, entry) in entries {
                    out.insert(
                        key.clone(),
                        self.native_default(entry, &map.values, &format!("{}/{}", path, key))?,
                    );
                }
                Ok(Value::Object(out))
            }
            AvroSchema::Union(branches) => match branches.first() {
                Some(AvroSchema::Null) if value.is_null() => Ok(Value::Null),
                Some(first) if !value.is_null() => Ok(single_entry(
                    self.member_key(first, path)?,
                    self.native_default(value, first, path)?,
                )),
                _ => Err(invalid(format!(
                    "{} is not a value of the union's first branch",
                    value
                ))),
            },
            _ => Ok(value.clone()),
        }
    }
}

fn single_entry(key: String, value: Value) -> Value {
    let mut entry = Map::new();
    entry.insert(key, value);
    Value::Object(entry)
}
