//! Structural schema equality.
//!
//! Two schemas are equal when they describe the same types with the same
//! names, properties, defaults and member order. Named references are
//! followed, and a record pair already being compared is assumed equal so
//! cyclic schemas terminate.

use std::collections::HashSet;

use crate::data::{DataSchema, DataSchemaArena, Field, SchemaRef};
use crate::schema::{AvroSchema, FieldSchema, SchemaResolutionContext};

/// Structural equality of two Avro schemas.
pub fn avro_schemas_equal(a: &AvroSchema, b: &AvroSchema) -> bool {
    let mut checker = AvroEquality {
        left: SchemaResolutionContext::build_from_schema(a),
        right: SchemaResolutionContext::build_from_schema(b),
        visited: HashSet::new(),
    };
    checker.equal(a, b)
}

struct AvroEquality {
    left: SchemaResolutionContext,
    right: SchemaResolutionContext,
    visited: HashSet<(String, String)>,
}

impl AvroEquality {
    fn equal(&mut self, a: &AvroSchema, b: &AvroSchema) -> bool {
        let a = match self.left.deref(a) {
            Ok(schema) => schema.clone(),
            Err(_) => return false,
        };
        let b = match self.right.deref(b) {
            Ok(schema) => schema.clone(),
            Err(_) => return false,
        };

        match (&a, &b) {
            (AvroSchema::Record(ra), AvroSchema::Record(rb)) => {
                let pair = (ra.fullname(), rb.fullname());
                if pair.0 != pair.1
                    || ra.doc != rb.doc
                    || ra.aliases != rb.aliases
                    || ra.properties != rb.properties
                    || ra.fields.len() != rb.fields.len()
                {
                    return false;
                }
                if !self.visited.insert(pair) {
                    return true;
                }
                ra.fields
                    .iter()
                    .zip(&rb.fields)
                    .all(|(fa, fb)| self.fields_equal(fa, fb))
            }
            (AvroSchema::Enum(ea), AvroSchema::Enum(eb)) => ea == eb,
            (AvroSchema::Fixed(fa), AvroSchema::Fixed(fb)) => fa == fb,
            (AvroSchema::Array(aa), AvroSchema::Array(ab)) => {
                aa.properties == ab.properties && self.equal(&aa.items, &ab.items)
            }
            (AvroSchema::Map(ma), AvroSchema::Map(mb)) => {
                ma.properties == mb.properties && self.equal(&ma.values, &mb.values)
            }
            (AvroSchema::Union(ua), AvroSchema::Union(ub)) => {
                ua.len() == ub.len() && ua.iter().zip(ub).all(|(x, y)| self.equal(x, y))
            }
            (x, y) => x.is_primitive() && x == y,
        }
    }

    fn fields_equal(&mut self, a: &FieldSchema, b: &FieldSchema) -> bool {
        a.name == b.name
            && a.default == b.default
            && a.doc == b.doc
            && a.order == b.order
            && a.aliases == b.aliases
            && a.properties == b.properties
            && self.equal(&a.schema, &b.schema)
    }
}

/// Structural equality of two native schemas, possibly in different arenas.
///
/// Records are compared by their effective field lists, so a record that
/// includes another compares equal to one declaring the same fields inline.
pub fn data_schemas_equal(
    arena_a: &DataSchemaArena,
    a: SchemaRef,
    arena_b: &DataSchemaArena,
    b: SchemaRef,
) -> bool {
    DataEquality {
        left: arena_a,
        right: arena_b,
        visited: HashSet::new(),
    }
    .equal(a, b)
}

struct DataEquality<'a> {
    left: &'a DataSchemaArena,
    right: &'a DataSchemaArena,
    visited: HashSet<(SchemaRef, SchemaRef)>,
}

impl DataEquality<'_> {
    fn equal(&mut self, a: SchemaRef, b: SchemaRef) -> bool {
        let (left, right) = (self.left, self.right);
        match (&left[a], &right[b]) {
            (DataSchema::Primitive(x), DataSchema::Primitive(y)) => x == y,
            (DataSchema::Record(ra), DataSchema::Record(rb)) => {
                if ra.fullname() != rb.fullname()
                    || ra.doc != rb.doc
                    || ra.properties != rb.properties
                {
                    return false;
                }
                if !self.visited.insert((a, b)) {
                    return true;
                }
                let fa = left.all_fields(a);
                let fb = right.all_fields(b);
                fa.len() == fb.len() && fa.iter().zip(&fb).all(|(x, y)| self.fields_equal(x, y))
            }
            (DataSchema::Enum(ea), DataSchema::Enum(eb)) => ea == eb,
            (DataSchema::Fixed(fa), DataSchema::Fixed(fb)) => fa == fb,
            (DataSchema::Array(aa), DataSchema::Array(ab)) => {
                aa.properties == ab.properties && self.equal(aa.items, ab.items)
            }
            (DataSchema::Map(ma), DataSchema::Map(mb)) => {
                ma.properties == mb.properties && self.equal(ma.values, mb.values)
            }
            (DataSchema::Union(ua), DataSchema::Union(ub)) => {
                ua.members.len() == ub.members.len()
                    && ua
                        .members
                        .iter()
                        .zip(&ub.members)
                        .all(|(x, y)| x.alias == y.alias && self.equal(x.schema, y.schema))
            }
            (DataSchema::Typeref(ta), DataSchema::Typeref(tb)) => {
                if ta.fullname() != tb.fullname()
                    || ta.doc != tb.doc
                    || ta.properties != tb.properties
                {
                    return false;
                }
                if !self.visited.insert((a, b)) {
                    return true;
                }
                self.equal(ta.referenced, tb.referenced)
            }
            _ => false,
        }
    }

    fn fields_equal(&mut self, a: &Field, b: &Field) -> bool {
        a.name == b.name
            && a.optional == b.optional
            && effective_default(a) == effective_default(b)
            && a.order == b.order
            && a.doc == b.doc
            && a.properties == b.properties
            && self.equal(a.schema, b.schema)
    }
}

/// An optional field's `null` default means the same as no default.
fn effective_default(field: &Field) -> Option<&serde_json::Value> {
    if field.optional {
        field.non_null_default()
    } else {
        field.default.as_ref()
    }
}
