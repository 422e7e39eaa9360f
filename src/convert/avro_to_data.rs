//! Avro values back to native values.

use indexmap::IndexMap;

use crate::codec::AvroValue;
use crate::convert::walk::{collect, Abort, Step, Walker};
use crate::convert::DataTranslationOptions;
use crate::data::{DataSchema, DataSchemaArena, DataValue, PrimitiveType, SchemaRef, UnionDataSchema};
use crate::error::DataTranslationError;
use crate::schema::{AvroSchema, RecordSchema, SchemaResolutionContext};
use crate::translate::{DISCRIMINATOR_FIELD, NULL_DISCRIMINATOR};

/// Translate an Avro value of `wire` into a native value of the schema at
/// `native_root`. `wire` must be the Avro translation of that schema.
pub fn avro_to_data(
    value: &AvroValue,
    wire: &AvroSchema,
    arena: &DataSchemaArena,
    native_root: SchemaRef,
    options: &DataTranslationOptions,
) -> Result<DataValue, DataTranslationError> {
    let wire_names = SchemaResolutionContext::build_from_schema(wire);
    let mut walker = Walker::new(arena, &wire_names, options)?;
    let result = walker.from_avro(value, wire, native_root);
    walker.finish(result)
}

impl<'a> Walker<'a> {
    fn from_avro(&mut self, value: &AvroValue, wire: &'a AvroSchema, native: SchemaRef) -> Step<DataValue> {
        let arena = self.arena;
        let wire = self.resolve(wire)?;
        let native_id = arena.dereference(native);

        if let AvroSchema::Union(branches) = wire {
            if !matches!(&arena[native_id], DataSchema::Union(u) if !u.has_aliases()) {
                return self.optional_from_avro(value, branches, native);
            }
        }

        if let Some(translator) = self.override_for(native)? {
            let errors = self.ctx.error_count();
            let translated = translator.avro_to_data(&mut self.ctx, value, arena.node(native), wire);
            if translated.is_none() && self.ctx.error_count() == errors {
                self.ctx.add_message("custom translator produced no value");
            }
            return Ok(translated);
        }

        match (&arena[native_id], wire) {
            (DataSchema::Union(union), AvroSchema::Record(record)) if union.has_aliases() => {
                self.aliased_union_from_avro(value, union, record)
            }
            (DataSchema::Union(union), AvroSchema::Union(branches)) => self.union_from_avro(value, union, branches),
            (DataSchema::Primitive(p), wire) => self.primitive_from_avro(value, *p, wire),
            (DataSchema::Enum(e), AvroSchema::Enum(_)) => {
                let symbol = match value {
                    AvroValue::Enum(_, symbol) | AvroValue::String(symbol) => symbol,
                    other => return self.item_error(format!("expected an enum symbol, found {}", other.kind())),
                };
                if !e.symbols.contains(symbol) {
                    return self.item_error(format!("'{}' is not a symbol of enum '{}'", symbol, e.fullname()));
                }
                Ok(Some(DataValue::String(symbol.clone())))
            }
            (DataSchema::Fixed(f), AvroSchema::Fixed(_)) => match value {
                AvroValue::Fixed(bytes) | AvroValue::Bytes(bytes) if bytes.len() == f.size => {
                    Ok(Some(DataValue::Bytes(bytes.clone())))
                }
                AvroValue::Fixed(bytes) | AvroValue::Bytes(bytes) => self.item_error(format!(
                    "fixed '{}' needs {} bytes, found {}",
                    f.fullname(),
                    f.size,
                    bytes.len()
                )),
                other => self.item_error(format!("expected fixed bytes, found {}", other.kind())),
            },
            (DataSchema::Array(array), AvroSchema::Array(wire_array)) => {
                let AvroValue::Array(items) = value else {
                    return self.item_error(format!("expected an array, found {}", value.kind()));
                };
                let mut out = Some(Vec::with_capacity(items.len()));
                for (i, item) in items.iter().enumerate() {
                    let converted = self.within(i.to_string(), |w| w.from_avro(item, &wire_array.items, array.items))?;
                    collect(&mut out, converted);
                }
                Ok(out.map(DataValue::List))
            }
            (DataSchema::Map(map), AvroSchema::Map(wire_map)) => {
                let AvroValue::Map(entries) = value else {
                    return self.item_error(format!("expected a map, found {}", value.kind()));
                };
                let mut out = Some(Vec::with_capacity(entries.len()));
                for (key, entry) in entries {
                    let converted = self.within(key.clone(), |w| w.from_avro(entry, &wire_map.values, map.values))?;
                    collect(&mut out, converted.map(|v| (key.clone(), v)));
                }
                Ok(out.map(|entries| DataValue::Map(entries.into_iter().collect())))
            }
            (DataSchema::Record(_), AvroSchema::Record(record)) => self.record_from_avro(value, native_id, record),
            (native_schema, wire) => self.mismatch(format!(
                "native {} schema does not line up with Avro {} schema",
                native_schema.type_name(),
                wire.type_name()
            )),
        }
    }

    fn primitive_from_avro(&mut self, value: &AvroValue, primitive: PrimitiveType, wire: &AvroSchema) -> Step<DataValue> {
        if primitive.name() != wire.type_name() {
            return self.mismatch(format!(
                "native {} schema does not line up with Avro {} schema",
                primitive.name(),
                wire.type_name()
            ));
        }
        let converted = match (primitive, value) {
            (PrimitiveType::Null, AvroValue::Null) => DataValue::Null,
            (PrimitiveType::Boolean, AvroValue::Boolean(b)) => DataValue::Boolean(*b),
            (PrimitiveType::Int, AvroValue::Int(i)) => DataValue::Int(*i),
            (PrimitiveType::Long, AvroValue::Long(l)) => DataValue::Long(*l),
            (PrimitiveType::Long, AvroValue::Int(i)) => DataValue::Long(i64::from(*i)),
            (PrimitiveType::Float, AvroValue::Float(f)) => DataValue::Float(*f),
            (PrimitiveType::Double, AvroValue::Double(d)) => DataValue::Double(*d),
            (PrimitiveType::Double, AvroValue::Float(f)) => DataValue::Double(f64::from(*f)),
            (PrimitiveType::String, AvroValue::String(s)) => DataValue::String(s.clone()),
            (PrimitiveType::Bytes, AvroValue::Bytes(b)) => DataValue::Bytes(b.clone()),
            (primitive, other) => {
                return self.item_error(format!("expected {}, found {}", primitive.name(), other.kind()))
            }
        };
        Ok(Some(converted))
    }

    /// Split a union value into the branch it was written with and its
    /// payload. Bare values are accepted when exactly one branch is not null.
    fn select_branch<'v>(
        &mut self,
        value: &'v AvroValue,
        branches: &'a [AvroSchema],
    ) -> Result<Option<(&'a AvroSchema, &'v AvroValue)>, Abort> {
        match value {
            AvroValue::Union(index, inner) => match usize::try_from(*index).ok().and_then(|i| branches.get(i)) {
                Some(branch) => Ok(Some((branch, &**inner))),
                None => {
                    self.item_error::<()>(format!("union branch index {} is out of range", index))?;
                    Ok(None)
                }
            },
            AvroValue::Null => match branches.iter().find(|b| **b == AvroSchema::Null) {
                Some(branch) => Ok(Some((branch, value))),
                None => {
                    self.item_error::<()>("null is not a member of the union")?;
                    Ok(None)
                }
            },
            other => {
                let mut non_null = branches.iter().filter(|b| **b != AvroSchema::Null);
                match (non_null.next(), non_null.next()) {
                    (Some(branch), None) => Ok(Some((branch, other))),
                    _ => {
                        self.item_error::<()>(format!("expected a union value, found {}", other.kind()))?;
                        Ok(None)
                    }
                }
            }
        }
    }

    /// A non-union native type behind an Avro union with null.
    fn optional_from_avro(&mut self, value: &AvroValue, branches: &'a [AvroSchema], native: SchemaRef) -> Step<DataValue> {
        let Some((branch, inner)) = self.select_branch(value, branches)? else {
            return Ok(None);
        };
        if *branch == AvroSchema::Null {
            return Ok(Some(DataValue::Null));
        }
        self.from_avro(inner, branch, native)
    }

    fn union_from_avro(&mut self, value: &AvroValue, union: &UnionDataSchema, branches: &'a [AvroSchema]) -> Step<DataValue> {
        let Some((branch, inner)) = self.select_branch(value, branches)? else {
            return Ok(None);
        };
        if *branch == AvroSchema::Null {
            return Ok(Some(DataValue::Null));
        }
        let arena = self.arena;
        let Some(member) = union
            .members
            .iter()
            .find(|m| self.branch_matches(branch, &self.wire_key(m.schema)))
        else {
            return self.mismatch(format!("no native union member for Avro branch '{}'", branch.member_key()));
        };
        let key = arena.member_key(member);
        let converted = self.within(key.clone(), |w| w.from_avro(inner, branch, member.schema))?;
        Ok(converted.map(|v| DataValue::union(key, v)))
    }

    fn aliased_union_from_avro(&mut self, value: &AvroValue, union: &UnionDataSchema, record: &'a RecordSchema) -> Step<DataValue> {
        let symbol = match value.field(DISCRIMINATOR_FIELD) {
            Some(AvroValue::Enum(_, symbol)) | Some(AvroValue::String(symbol)) => symbol,
            Some(other) => return self.item_error(format!("expected a discriminator symbol, found {}", other.kind())),
            None => return self.item_error("discriminator field is missing"),
        };
        if symbol == NULL_DISCRIMINATOR {
            return Ok(Some(DataValue::Null));
        }

        let Some(member) = union.members.iter().find(|m| m.alias.as_deref() == Some(symbol.as_str())) else {
            return self.item_error(format!("'{}' is not an alias of the union", symbol));
        };
        let Some(wire_field) = record.field(symbol) else {
            return self.mismatch(format!("no Avro field for alias '{}'", symbol));
        };
        let wire = self.resolve(&wire_field.schema)?;
        let AvroSchema::Union(branches) = wire else {
            return self.mismatch(format!("alias field '{}' is not a nullable union", symbol));
        };
        let payload = value.field(symbol).unwrap_or(&AvroValue::Null);

        let converted = self.within(symbol.clone(), |w| {
            let Some((branch, inner)) = w.select_branch(payload, branches)? else {
                return Ok(None);
            };
            if *branch == AvroSchema::Null {
                return w.item_error("discriminator selects this alias but its field is null");
            }
            w.from_avro(inner, branch, member.schema)
        })?;
        Ok(converted.map(|v| DataValue::union(symbol.clone(), v)))
    }

    fn record_from_avro(&mut self, value: &AvroValue, native_id: SchemaRef, record: &'a RecordSchema) -> Step<DataValue> {
        let arena = self.arena;
        let AvroValue::Record(entries) = value else {
            return self.item_error(format!("expected a record, found {}", value.kind()));
        };

        let mut out = Some(IndexMap::new());
        for field in arena.all_fields(native_id) {
            let Some(wire_field) = record.field(&field.name) else {
                return self.mismatch(format!("native field '{}' has no Avro counterpart", field.name));
            };
            let converted = self.within(field.name.clone(), |w| match value.field(&field.name) {
                Some(entry) => w.from_avro(entry, &wire_field.schema, field.schema),
                None => w.item_error("field is missing"),
            })?;
            match (converted, out.as_mut()) {
                // An optional field written as null was absent
                (Some(DataValue::Null), Some(_)) if field.optional => {}
                (Some(v), Some(fields)) => {
                    fields.insert(field.name.clone(), v);
                }
                _ => out = None,
            }
        }

        for (name, _) in entries {
            if record.field(name).is_none() {
                self.within(name.clone(), |w| w.item_error::<()>("not a field of the record"))?;
                out = None;
            }
        }
        Ok(out.map(DataValue::Map))
    }
}
