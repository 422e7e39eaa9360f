//! Native to Avro schema translation.

use std::collections::HashMap;

use tracing::{debug, trace};

use crate::convert::{override_at, override_owner, OVERRIDE_PROPERTY};
use crate::data::{data_schema_to_json, DataSchema, DataSchemaArena, Field, PrimitiveType, SchemaRef, UnionDataSchema};
use crate::error::{SchemaError, TranslationError};
use crate::schema::{
    data_schemas_equal, fullname, ArraySchema, AvroSchema, EnumSchema, FieldSchema, FixedSchema,
    MapSchema, Properties, RecordSchema, SchemaParser,
};
use crate::translate::alias_union::{
    build_alias_record, discriminator_name, name_candidates, AliasedMember, NULL_DISCRIMINATOR,
};
use crate::translate::defaults::{Branch, DefaultTranslator, FieldShape};
use crate::translate::embed::embed_schema;
use crate::translate::{DataToAvroSchemaOptions, EmbedSchemaMode};

/// Namespace segment prepended when namespaces are overridden.
pub const AVRO_NAMESPACE_PREFIX: &str = "avro";

/// Enum property carrying per-symbol documentation.
pub(crate) const SYMBOL_DOCS_PROPERTY: &str = "symbolDocs";

/// Translate the native schema rooted at `root` into an Avro schema.
///
/// Named types are written in full at their first occurrence and referenced
/// by full name afterwards, so cyclic records translate to finite schemas.
///
/// # Example
/// ```
/// use pegasus_avro::data::parse_data_schema;
/// use pegasus_avro::translate::{data_to_avro_schema, DataToAvroSchemaOptions};
///
/// let native = parse_data_schema(
///     r#"{"type": "record", "name": "Foo", "fields": [{"name": "x", "type": "int", "optional": true}]}"#,
/// ).unwrap();
/// let avro = data_to_avro_schema(&native.arena, native.root, &DataToAvroSchemaOptions::default()).unwrap();
/// assert_eq!(avro.to_json_value()["fields"][0]["type"], serde_json::json!(["null", "int"]));
/// ```
pub fn data_to_avro_schema(
    arena: &DataSchemaArena,
    root: SchemaRef,
    options: &DataToAvroSchemaOptions,
) -> Result<AvroSchema, TranslationError> {
    let mut translator = ForwardTranslator::new(arena, options);
    let mut schema = translator.translate(root, "")?;

    if options.embed_mode == EmbedSchemaMode::RootOnly {
        let native = data_schema_to_json(arena, root);
        if embed_schema(&mut schema, native, options.optional_default_mode) {
            debug!(mode = %options.optional_default_mode, "embedded native schema on root");
        }
    }
    debug!(
        named_types = translator.names.len(),
        "translated native schema to Avro"
    );
    Ok(schema)
}

/// Translate and render as pretty-printed Avro JSON.
pub fn data_to_avro_schema_json(
    arena: &DataSchemaArena,
    root: SchemaRef,
    options: &DataToAvroSchemaOptions,
) -> Result<String, TranslationError> {
    let schema = data_to_avro_schema(arena, root, options)?;
    serde_json::to_string_pretty(&schema.to_json_value())
        .map_err(|e| TranslationError::Schema(SchemaError::ParseError(e.to_string())))
}

/// Who claimed an Avro full name during one translation.
#[derive(Debug, Clone, PartialEq)]
enum NameOwner {
    Native(SchemaRef),
    /// Record (or its discriminator) expanded from an aliased union
    Generated { record: SchemaRef, field: String },
    Override(SchemaRef),
}

struct EnclosingRecord {
    id: SchemaRef,
    name: String,
    namespace: Option<String>,
}

struct ForwardTranslator<'a> {
    arena: &'a DataSchemaArena,
    options: &'a DataToAvroSchemaOptions,
    defaults: DefaultTranslator<'a>,
    names: HashMap<String, NameOwner>,
    /// Native nodes already written, by the Avro full name they got
    translated: HashMap<SchemaRef, String>,
    records: Vec<EnclosingRecord>,
}

impl<'a> ForwardTranslator<'a> {
    fn new(arena: &'a DataSchemaArena, options: &'a DataToAvroSchemaOptions) -> Self {
        Self {
            arena,
            options,
            defaults: DefaultTranslator::new(arena, options.optional_default_mode),
            names: HashMap::new(),
            translated: HashMap::new(),
            records: Vec::new(),
        }
    }

    fn namespace(&self, namespace: Option<&str>) -> Option<String> {
        match (self.options.override_namespace, namespace) {
            (true, Some(ns)) if !ns.is_empty() => Some(format!("{}.{}", AVRO_NAMESPACE_PREFIX, ns)),
            (true, _) => Some(AVRO_NAMESPACE_PREFIX.to_string()),
            (false, Some(ns)) if !ns.is_empty() => Some(ns.to_string()),
            (false, _) => None,
        }
    }

    /// Translate a type outside of a field slot.
    fn translate(&mut self, id: SchemaRef, path: &str) -> Result<AvroSchema, TranslationError> {
        let (mut schema, typeref_props) = self.translate_slot(id, path, None)?;
        attach_typeref_properties(&mut schema, typeref_props);
        Ok(schema)
    }

    /// Translate the type in one slot, returning the merged properties of
    /// the typerefs it was reached through. `field` names the record field
    /// when the slot is a field type.
    fn translate_slot(
        &mut self,
        id: SchemaRef,
        path: &str,
        field: Option<&str>,
    ) -> Result<(AvroSchema, Properties), TranslationError> {
        let arena = self.arena;
        let overridden = override_owner(arena, id);
        let mut props = Properties::new();
        let mut current = id;

        for _ in 0..=arena.len() {
            if Some(current) == overridden {
                return Ok((self.translate_override(current, path)?, props));
            }
            let DataSchema::Typeref(typeref) = &arena[current] else {
                break;
            };
            for (key, value) in &typeref.properties {
                if key == OVERRIDE_PROPERTY
                    || self.options.typeref_properties_exclude.contains(key)
                    || props.contains_key(key)
                {
                    continue;
                }
                props.insert(key.clone(), value.clone());
            }
            current = typeref.referenced;
        }

        let schema = match &arena[current] {
            DataSchema::Primitive(p) => primitive(*p),
            DataSchema::Record(_) | DataSchema::Enum(_) | DataSchema::Fixed(_) => {
                self.translate_named(current, path)?
            }
            DataSchema::Array(array) => AvroSchema::Array(ArraySchema {
                items: Box::new(self.translate(array.items, path)?),
                properties: without_override(&array.properties),
            }),
            DataSchema::Map(map) => AvroSchema::Map(MapSchema {
                values: Box::new(self.translate(map.values, path)?),
                properties: without_override(&map.properties),
            }),
            DataSchema::Union(union) if union.has_aliases() => match field {
                Some(field) => self.translate_aliased_union(union, field, path)?,
                None => {
                    return Err(TranslationError::InvalidSchema {
                        path: path.to_string(),
                        reason: "a union with aliased members can only be the type of a record field".to_string(),
                    })
                }
            },
            DataSchema::Union(union) => {
                let members = union
                    .members
                    .iter()
                    .map(|m| self.translate(m.schema, path))
                    .collect::<Result<Vec<_>, _>>()?;
                check_unique_branches(&members, path)?;
                AvroSchema::Union(members)
            }
            DataSchema::Typeref(t) => {
                return Err(TranslationError::InvalidSchema {
                    path: path.to_string(),
                    reason: format!("typeref '{}' refers to itself", t.fullname()),
                })
            }
        };
        Ok((schema, props))
    }

    /// Claim `name` for `owner`, or report who already has it.
    fn claim(&mut self, name: &str, owner: NameOwner) -> Result<(), TranslationError> {
        match self.names.get(name) {
            None => {
                self.names.insert(name.to_string(), owner);
                Ok(())
            }
            Some(existing) if *existing == owner => Ok(()),
            Some(existing) => Err(TranslationError::NameConflict {
                full_name: name.to_string(),
                message: match existing {
                    NameOwner::Native(_) => "name is already defined by a different native schema".to_string(),
                    NameOwner::Generated { field, .. } => {
                        format!("name is already used by the record generated for field '{}'", field)
                    }
                    NameOwner::Override(_) => "name is already used by an override schema".to_string(),
                },
            }),
        }
    }

    fn translate_named(&mut self, id: SchemaRef, path: &str) -> Result<AvroSchema, TranslationError> {
        if let Some(name) = self.translated.get(&id) {
            trace!(name = %name, "reusing translated named type");
            return Ok(AvroSchema::Named(name.clone()));
        }

        let arena = self.arena;
        let schema = &arena[id];
        let (name, namespace) = match schema {
            DataSchema::Record(r) => (&r.name, self.namespace(r.namespace.as_deref())),
            DataSchema::Enum(e) => (&e.name, self.namespace(e.namespace.as_deref())),
            DataSchema::Fixed(f) => (&f.name, self.namespace(f.namespace.as_deref())),
            other => {
                return Err(TranslationError::InvalidSchema {
                    path: path.to_string(),
                    reason: format!("{} is not a named type", other.type_name()),
                })
            }
        };
        let full_name = fullname(name, namespace.as_deref());

        // A structurally identical copy of a type already written is the same type
        if let Some(NameOwner::Native(other)) = self.names.get(&full_name) {
            if data_schemas_equal(arena, *other, arena, id) {
                trace!(name = %full_name, "reusing structurally equal named type");
                self.translated.insert(id, full_name.clone());
                return Ok(AvroSchema::Named(full_name));
            }
        }
        self.claim(&full_name, NameOwner::Native(id))?;
        self.translated.insert(id, full_name.clone());
        debug!(name = %full_name, kind = schema.type_name(), "registered named type");

        Ok(match schema {
            DataSchema::Enum(e) => {
                let mut properties = without_override(&e.properties);
                if !e.symbol_docs.is_empty() {
                    let docs = e
                        .symbol_docs
                        .iter()
                        .map(|(symbol, doc)| (symbol.clone(), serde_json::Value::String(doc.clone())))
                        .collect();
                    properties.insert(SYMBOL_DOCS_PROPERTY.to_string(), serde_json::Value::Object(docs));
                }
                AvroSchema::Enum(EnumSchema {
                    namespace,
                    doc: e.doc.clone(),
                    properties,
                    ..EnumSchema::new(e.name.clone(), e.symbols.clone())
                })
            }
            DataSchema::Fixed(f) => AvroSchema::Fixed(FixedSchema {
                namespace,
                doc: f.doc.clone(),
                properties: without_override(&f.properties),
                ..FixedSchema::new(f.name.clone(), f.size)
            }),
            DataSchema::Record(r) => {
                self.records.push(EnclosingRecord {
                    id,
                    name: r.name.clone(),
                    namespace: namespace.clone(),
                });
                let fields = self.translate_fields(id, &full_name);
                self.records.pop();
                AvroSchema::Record(RecordSchema {
                    namespace,
                    doc: r.doc.clone(),
                    properties: without_override(&r.properties),
                    ..RecordSchema::new(r.name.clone(), fields?)
                })
            }
            other => {
                return Err(TranslationError::InvalidSchema {
                    path: path.to_string(),
                    reason: format!("{} is not a named type", other.type_name()),
                })
            }
        })
    }

    fn translate_fields(&mut self, record: SchemaRef, record_name: &str) -> Result<Vec<FieldSchema>, TranslationError> {
        let arena = self.arena;
        arena
            .all_fields(record)
            .into_iter()
            .map(|field| {
                let path = format!("{}.{}", record_name, field.name);
                self.translate_field(field, &path)
            })
            .collect()
    }

    fn translate_field(&mut self, field: &Field, path: &str) -> Result<FieldSchema, TranslationError> {
        let (schema, typeref_props) = match self.defaults.field_shape(field, path)? {
            FieldShape::Plain => self.translate_slot(field.schema, path, Some(&field.name))?,
            FieldShape::Union(branches) => {
                let mut members = Vec::with_capacity(branches.len());
                let mut typeref_props = Properties::new();
                for branch in branches {
                    members.push(match branch {
                        Branch::Null => AvroSchema::Null,
                        Branch::Member { schema, .. } => self.translate(schema, path)?,
                        Branch::Whole(schema) => {
                            let (translated, props) = self.translate_slot(schema, path, Some(&field.name))?;
                            typeref_props = props;
                            translated
                        }
                    });
                }
                check_unique_branches(&members, path)?;
                (AvroSchema::Union(members), typeref_props)
            }
        };

        let mut properties = field.properties.clone();
        properties.extend(typeref_props);

        Ok(FieldSchema {
            default: self.defaults.field_default(field, path)?,
            doc: field.doc.clone(),
            order: field.order,
            properties,
            ..FieldSchema::new(field.name.clone(), schema)
        })
    }

    fn translate_aliased_union(
        &mut self,
        union: &UnionDataSchema,
        field: &str,
        path: &str,
    ) -> Result<AvroSchema, TranslationError> {
        let Some(enclosing) = self.records.last() else {
            return Err(TranslationError::InvalidSchema {
                path: path.to_string(),
                reason: "aliased union outside of a record".to_string(),
            });
        };
        let owner = NameOwner::Generated {
            record: enclosing.id,
            field: field.to_string(),
        };
        let namespace = enclosing.namespace.clone();
        let chain: Vec<String> = self.records.iter().map(|r| r.name.clone()).collect();

        let is_free = |candidate: &String| {
            let record = fullname(candidate, namespace.as_deref());
            let discriminator = fullname(&discriminator_name(candidate), namespace.as_deref());
            [record, discriminator]
                .iter()
                .all(|name| self.names.get(name).map_or(true, |existing| *existing == owner))
        };
        let name = name_candidates(&chain, field)
            .find(is_free)
            .ok_or_else(|| TranslationError::InvalidSchema {
                path: path.to_string(),
                reason: "no free name for the aliased union record".to_string(),
            })?;

        self.claim(&fullname(&name, namespace.as_deref()), owner.clone())?;
        self.claim(
            &fullname(&discriminator_name(&name), namespace.as_deref()),
            owner,
        )?;
        debug!(name = %name, field = field, "expanding aliased union into record");

        let arena = self.arena;
        let mut members = Vec::new();
        let mut symbols = Vec::new();
        for member in &union.members {
            match &member.alias {
                Some(alias) => {
                    symbols.push(alias.clone());
                    members.push(AliasedMember {
                        alias: alias.clone(),
                        schema: self.translate(member.schema, path)?,
                    });
                }
                None if is_null(arena, member.schema) => symbols.push(NULL_DISCRIMINATOR.to_string()),
                None => {
                    return Err(TranslationError::InvalidSchema {
                        path: path.to_string(),
                        reason: "every non-null member of an aliased union needs an alias".to_string(),
                    })
                }
            }
        }
        Ok(build_alias_record(name, namespace, members, symbols))
    }

    fn translate_override(&mut self, owner: SchemaRef, path: &str) -> Result<AvroSchema, TranslationError> {
        if let Some(name) = self.translated.get(&owner) {
            return Ok(AvroSchema::Named(name.clone()));
        }
        let Some(declared) = override_at(self.arena, owner)? else {
            return Err(TranslationError::InvalidSchema {
                path: path.to_string(),
                reason: "override property disappeared".to_string(),
            });
        };
        if let Some(factory) = self.options.override_factory.as_deref() {
            declared.instantiate(Some(factory))?;
        }

        let mut parser = SchemaParser::new();
        let schema = parser.parse(&declared.schema)?;
        parser.check_references()?;

        self.claim(&declared.avro_schema_full_name, NameOwner::Override(owner))?;
        self.translated
            .insert(owner, declared.avro_schema_full_name.clone());
        debug!(
            owner = %declared.owner,
            schema = %declared.avro_schema_full_name,
            "applied Avro override"
        );
        Ok(schema)
    }
}

fn primitive(p: PrimitiveType) -> AvroSchema {
    match p {
        PrimitiveType::Null => AvroSchema::Null,
        PrimitiveType::Boolean => AvroSchema::Boolean,
        PrimitiveType::Int => AvroSchema::Int,
        PrimitiveType::Long => AvroSchema::Long,
        PrimitiveType::Float => AvroSchema::Float,
        PrimitiveType::Double => AvroSchema::Double,
        PrimitiveType::Bytes => AvroSchema::Bytes,
        PrimitiveType::String => AvroSchema::String,
    }
}

fn is_null(arena: &DataSchemaArena, id: SchemaRef) -> bool {
    matches!(
        arena[arena.dereference(id)],
        DataSchema::Primitive(PrimitiveType::Null)
    )
}

fn without_override(properties: &Properties) -> Properties {
    let mut copied = properties.clone();
    copied.remove(OVERRIDE_PROPERTY);
    copied
}

/// Typeref properties outside a field slot land on array and map nodes,
/// the only unnamed Avro types with a property bag.
fn attach_typeref_properties(schema: &mut AvroSchema, typeref_props: Properties) {
    if typeref_props.is_empty() {
        return;
    }
    match schema {
        AvroSchema::Array(ArraySchema { properties, .. }) | AvroSchema::Map(MapSchema { properties, .. }) => {
            properties.extend(typeref_props);
        }
        other => {
            debug!(
                kind = other.type_name(),
                keys = ?typeref_props.keys().collect::<Vec<_>>(),
                "dropping typeref properties with no place on the Avro type"
            );
        }
    }
}

fn check_unique_branches(members: &[AvroSchema], path: &str) -> Result<(), TranslationError> {
    let mut seen = std::collections::HashSet::new();
    for member in members {
        let key = member.member_key();
        if !seen.insert(key.clone()) {
            return Err(TranslationError::InvalidSchema {
                path: path.to_string(),
                reason: format!("union has more than one '{}' branch", key),
            });
        }
    }
    Ok(())
}
