//! Native values to Avro values.

use indexmap::IndexMap;

use crate::codec::AvroValue;
use crate::convert::walk::{collect, Step, Walker};
use crate::convert::DataTranslationOptions;
use crate::data::{latin1_bytes, DataSchema, DataSchemaArena, DataValue, Field, PrimitiveType, SchemaRef, UnionDataSchema};
use crate::error::DataTranslationError;
use crate::schema::{AvroSchema, RecordSchema, SchemaResolutionContext};
use crate::translate::{DISCRIMINATOR_FIELD, NULL_DISCRIMINATOR};

/// Translate a native value of the schema at `native_root` into an Avro
/// value of `wire`, the Avro translation of that schema.
///
/// Every problem found is reported; the call fails if there is any.
pub fn data_to_avro(
    value: &DataValue,
    arena: &DataSchemaArena,
    native_root: SchemaRef,
    wire: &AvroSchema,
    options: &DataTranslationOptions,
) -> Result<AvroValue, DataTranslationError> {
    let wire_names = SchemaResolutionContext::build_from_schema(wire);
    let mut walker = Walker::new(arena, &wire_names, options)?;
    let result = walker.to_avro(value, native_root, wire);
    walker.finish(result)
}

impl<'a> Walker<'a> {
    fn to_avro(&mut self, value: &DataValue, native: SchemaRef, wire: &'a AvroSchema) -> Step<AvroValue> {
        let arena = self.arena;
        let wire = self.resolve(wire)?;
        let native_id = arena.dereference(native);

        // Optional slots wrap the translated type; unwrap before overrides apply
        if let AvroSchema::Union(branches) = wire {
            if !matches!(&arena[native_id], DataSchema::Union(u) if !u.has_aliases()) {
                return self.optional_to_avro(value, native, branches);
            }
        }

        if let Some(translator) = self.override_for(native)? {
            let errors = self.ctx.error_count();
            let translated = translator.data_to_avro(&mut self.ctx, value, arena.node(native), wire);
            if translated.is_none() && self.ctx.error_count() == errors {
                self.ctx.add_message("custom translator produced no value");
            }
            return Ok(translated);
        }

        match (&arena[native_id], wire) {
            (DataSchema::Union(union), AvroSchema::Record(record)) if union.has_aliases() => {
                self.aliased_union_to_avro(value, union, record)
            }
            (DataSchema::Union(union), AvroSchema::Union(branches)) => {
                self.union_to_avro(value, union, branches)
            }
            (DataSchema::Primitive(p), wire) => self.primitive_to_avro(value, *p, wire),
            (DataSchema::Enum(e), AvroSchema::Enum(wire_enum)) => match value {
                DataValue::String(symbol) => match self.adapter.create_enum_value(wire_enum, symbol) {
                    Some(enum_value) => Ok(Some(enum_value)),
                    None => self.item_error(format!("'{}' is not a symbol of enum '{}'", symbol, e.fullname())),
                },
                other => self.item_error(format!("expected an enum symbol, found {}", other.kind())),
            },
            (DataSchema::Fixed(_), AvroSchema::Fixed(fixed)) => {
                let bytes = match value {
                    DataValue::Bytes(bytes) => bytes.clone(),
                    DataValue::String(s) => match latin1_bytes(s) {
                        Ok(bytes) => bytes,
                        Err(e) => return self.item_error(e),
                    },
                    other => return self.item_error(format!("expected fixed bytes, found {}", other.kind())),
                };
                if bytes.len() != fixed.size {
                    return self.item_error(format!(
                        "fixed '{}' needs {} bytes, found {}",
                        fixed.fullname(),
                        fixed.size,
                        bytes.len()
                    ));
                }
                Ok(Some(AvroValue::Fixed(bytes)))
            }
            (DataSchema::Array(array), AvroSchema::Array(wire_array)) => {
                let DataValue::List(items) = value else {
                    return self.item_error(format!("expected a list, found {}", value.kind()));
                };
                let mut out = Some(Vec::with_capacity(items.len()));
                for (i, item) in items.iter().enumerate() {
                    let converted = self.within(i.to_string(), |w| w.to_avro(item, array.items, &wire_array.items))?;
                    collect(&mut out, converted);
                }
                Ok(out.map(AvroValue::Array))
            }
            (DataSchema::Map(map), AvroSchema::Map(wire_map)) => {
                let DataValue::Map(entries) = value else {
                    return self.item_error(format!("expected a map, found {}", value.kind()));
                };
                let mut out = Some(Vec::with_capacity(entries.len()));
                for (key, entry) in entries {
                    let converted = self.within(key.clone(), |w| w.to_avro(entry, map.values, &wire_map.values))?;
                    collect(&mut out, converted.map(|v| (key.clone(), v)));
                }
                Ok(out.map(AvroValue::Map))
            }
            (DataSchema::Record(_), AvroSchema::Record(record)) => self.record_to_avro(value, native_id, record),
            (native_schema, wire) => self.mismatch(format!(
                "native {} schema does not line up with Avro {} schema",
                native_schema.type_name(),
                wire.type_name()
            )),
        }
    }

    fn primitive_to_avro(&mut self, value: &DataValue, primitive: PrimitiveType, wire: &AvroSchema) -> Step<AvroValue> {
        let converted = match (primitive, wire, value) {
            (PrimitiveType::Null, AvroSchema::Null, DataValue::Null) => Some(AvroValue::Null),
            (PrimitiveType::Boolean, AvroSchema::Boolean, DataValue::Boolean(b)) => Some(AvroValue::Boolean(*b)),
            (PrimitiveType::Int, AvroSchema::Int, DataValue::Int(i)) => Some(AvroValue::Int(*i)),
            (PrimitiveType::Long, AvroSchema::Long, DataValue::Long(l)) => Some(AvroValue::Long(*l)),
            (PrimitiveType::Long, AvroSchema::Long, DataValue::Int(i)) => Some(AvroValue::Long(i64::from(*i))),
            (PrimitiveType::Float, AvroSchema::Float, DataValue::Float(f)) => Some(AvroValue::Float(*f)),
            (PrimitiveType::Double, AvroSchema::Double, DataValue::Double(d)) => Some(AvroValue::Double(*d)),
            (PrimitiveType::Double, AvroSchema::Double, DataValue::Float(f)) => Some(AvroValue::Double(f64::from(*f))),
            (PrimitiveType::String, AvroSchema::String, DataValue::String(s)) => Some(AvroValue::String(s.clone())),
            (PrimitiveType::Bytes, AvroSchema::Bytes, DataValue::Bytes(b)) => Some(AvroValue::Bytes(b.clone())),
            (PrimitiveType::Bytes, AvroSchema::Bytes, DataValue::String(s)) => match latin1_bytes(s) {
                Ok(bytes) => Some(AvroValue::Bytes(bytes)),
                Err(e) => return self.item_error(e),
            },
            _ => None,
        };
        if converted.is_some() {
            return Ok(converted);
        }
        if primitive.name() != wire.type_name() {
            return self.mismatch(format!(
                "native {} schema does not line up with Avro {} schema",
                primitive.name(),
                wire.type_name()
            ));
        }
        self.item_error(format!("expected {}, found {}", primitive.name(), value.kind()))
    }

    fn union_to_avro(&mut self, value: &DataValue, union: &UnionDataSchema, branches: &'a [AvroSchema]) -> Step<AvroValue> {
        let (key, inner) = match value {
            DataValue::Null => {
                return match branches.iter().position(|b| *b == AvroSchema::Null) {
                    Some(index) => Ok(Some(AvroValue::Union(index as i32, Box::new(AvroValue::Null)))),
                    None => self.item_error("null is not a member of the union"),
                };
            }
            DataValue::Map(entries) if entries.len() == 1 => match entries.iter().next() {
                Some(entry) => entry,
                None => return self.item_error("empty union value"),
            },
            other => return self.item_error(format!("expected a union value, found {}", other.kind())),
        };

        let Some(member) = self.arena.find_member(union, key) else {
            return self.item_error(format!("'{}' is not a member of the union", key));
        };
        let wire_key = self.wire_key(member.schema);
        let Some(index) = branches.iter().position(|b| self.branch_matches(b, &wire_key)) else {
            return self.mismatch(format!("no Avro union branch for member '{}'", key));
        };
        let converted = self.within(key.clone(), |w| w.to_avro(inner, member.schema, &branches[index]))?;
        Ok(converted.map(|v| AvroValue::Union(index as i32, Box::new(v))))
    }

    /// A non-union native type behind an Avro union with null, as produced
    /// for optional fields.
    fn optional_to_avro(&mut self, value: &DataValue, native: SchemaRef, branches: &'a [AvroSchema]) -> Step<AvroValue> {
        if *value == DataValue::Null {
            if let Some(index) = branches.iter().position(|b| *b == AvroSchema::Null) {
                return Ok(Some(AvroValue::Union(index as i32, Box::new(AvroValue::Null))));
            }
        }
        let mut non_null = branches
            .iter()
            .enumerate()
            .filter(|(_, b)| **b != AvroSchema::Null);
        let (Some((index, branch)), None) = (non_null.next(), non_null.next()) else {
            return self.mismatch("native type does not line up with a nullable Avro union");
        };
        let converted = self.to_avro(value, native, branch)?;
        Ok(converted.map(|v| AvroValue::Union(index as i32, Box::new(v))))
    }

    fn aliased_union_to_avro(&mut self, value: &DataValue, union: &UnionDataSchema, record: &'a RecordSchema) -> Step<AvroValue> {
        let selected = match value {
            DataValue::Null => None,
            DataValue::Map(entries) if entries.len() == 1 => entries.iter().next(),
            other => return self.item_error(format!("expected a union value, found {}", other.kind())),
        };
        let member = match selected {
            Some((alias, _)) => match union.members.iter().find(|m| m.alias.as_ref() == Some(alias)) {
                Some(member) => Some(member),
                None => return self.item_error(format!("'{}' is not an alias of the union", alias)),
            },
            None => None,
        };

        let mut out = Some(Vec::with_capacity(record.fields.len()));
        for field in &record.fields {
            let wire = self.resolve(&field.schema)?;
            if field.name == DISCRIMINATOR_FIELD {
                let AvroSchema::Enum(discriminator) = wire else {
                    return self.mismatch("discriminator field is not an enum");
                };
                let symbol = selected.map_or(NULL_DISCRIMINATOR, |(alias, _)| alias.as_str());
                let converted = match self.adapter.create_enum_value(discriminator, symbol) {
                    Some(v) => Some(v),
                    None => self.item_error(format!("'{}' is not a discriminator symbol", symbol))?,
                };
                collect(&mut out, converted.map(|v| (field.name.clone(), v)));
                continue;
            }

            let AvroSchema::Union(branches) = wire else {
                return self.mismatch(format!("alias field '{}' is not a nullable union", field.name));
            };
            let converted = match (selected, member) {
                (Some((alias, inner)), Some(member)) if *alias == field.name => {
                    let inner_schema = member.schema;
                    self.within(alias.clone(), |w| w.optional_to_avro(inner, inner_schema, branches))?
                }
                _ => match branches.iter().position(|b| *b == AvroSchema::Null) {
                    Some(index) => Some(AvroValue::Union(index as i32, Box::new(AvroValue::Null))),
                    None => return self.mismatch(format!("alias field '{}' has no null branch", field.name)),
                },
            };
            collect(&mut out, converted.map(|v| (field.name.clone(), v)));
        }
        Ok(out.map(AvroValue::Record))
    }

    fn record_to_avro(&mut self, value: &DataValue, native_id: SchemaRef, record: &'a RecordSchema) -> Step<AvroValue> {
        let arena = self.arena;
        let DataValue::Map(entries) = value else {
            return self.item_error(format!("expected a record, found {}", value.kind()));
        };
        let fields = arena.all_fields(native_id);

        let mut out = Some(Vec::with_capacity(record.fields.len()));
        for wire_field in &record.fields {
            let Some(field) = fields.iter().find(|f| f.name == wire_field.name) else {
                return self.mismatch(format!("Avro field '{}' has no native counterpart", wire_field.name));
            };
            let converted = self.within(wire_field.name.clone(), |w| {
                w.field_to_avro(entries, field, &wire_field.schema)
            })?;
            collect(&mut out, converted.map(|v| (wire_field.name.clone(), v)));
        }

        for key in entries.keys() {
            if !fields.iter().any(|f| &f.name == key) {
                self.within(key.clone(), |w| w.item_error::<()>("not a field of the record"))?;
                out = None;
            }
        }
        Ok(out.map(AvroValue::Record))
    }

    fn field_to_avro(
        &mut self,
        entries: &IndexMap<String, DataValue>,
        field: &Field,
        wire: &'a AvroSchema,
    ) -> Step<AvroValue> {
        let present = entries
            .get(&field.name)
            .filter(|v| !(field.optional && **v == DataValue::Null));
        match present {
            Some(value) => self.to_avro(value, field.schema, wire),
            None if field.optional => match self.resolve(wire)? {
                AvroSchema::Union(branches) => match branches.iter().position(|b| *b == AvroSchema::Null) {
                    Some(index) => Ok(Some(AvroValue::Union(index as i32, Box::new(AvroValue::Null)))),
                    None => self.mismatch("optional field has no null branch"),
                },
                _ => self.mismatch("optional field is not a nullable union"),
            },
            None => match &field.default {
                Some(default) => match DataValue::from_json_with_schema(default, self.arena, field.schema) {
                    Ok(value) => self.to_avro(&value, field.schema, wire),
                    Err(e) => self.item_error(format!("invalid default: {}", e)),
                },
                None => self.item_error("required field is missing"),
            },
        }
    }
}
