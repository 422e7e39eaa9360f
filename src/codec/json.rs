//! Avro JSON encoding.
//!
//! Unions are written as `null` or as a single-entry object keyed by the
//! branch's member key; bytes and fixed values are strings whose chars are
//! the byte values (ISO-8859-1). Record field defaults use the untagged
//! form, where a union default is the bare value of the first branch.

use bytes::Bytes;
use serde_json::{Map, Number, Value};

use crate::codec::{AvroValue, DatumDecoder, DatumEncoder};
use crate::data::latin1_bytes;
use crate::error::{DecodeError, EncodeError};
use crate::schema::{AvroSchema, SchemaResolutionContext};

/// Reads consecutive JSON datums from a text stream.
#[derive(Debug)]
pub struct JsonDecoder {
    values: std::vec::IntoIter<Value>,
}

impl JsonDecoder {
    /// Split `text` into whitespace-separated JSON documents.
    pub fn new(text: &str) -> Result<Self, DecodeError> {
        let values = serde_json::Deserializer::from_str(text)
            .into_iter::<Value>()
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            values: values.into_iter(),
        })
    }
}

impl DatumDecoder for JsonDecoder {
    fn read(&mut self, schema: &AvroSchema) -> Result<AvroValue, DecodeError> {
        let json = self.values.next().ok_or(DecodeError::UnexpectedEof)?;
        let context = SchemaResolutionContext::build_from_schema(schema);
        json_to_avro(&json, schema, &context, true)
    }
}

fn json_to_avro(
    json: &Value,
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
    tagged_unions: bool,
) -> Result<AvroValue, DecodeError> {
    let mismatch = || {
        DecodeError::TypeMismatch(format!(
            "JSON value {} is not a valid {}",
            json,
            schema.type_name()
        ))
    };

    match (schema, json) {
        (AvroSchema::Named(name), _) => {
            let resolved = context.get(name).ok_or_else(|| {
                DecodeError::InvalidData(format!("Unresolved named type reference: '{}'", name))
            })?;
            json_to_avro(json, resolved, context, tagged_unions)
        }
        (AvroSchema::Null, Value::Null) => Ok(AvroValue::Null),
        (AvroSchema::Boolean, Value::Bool(b)) => Ok(AvroValue::Boolean(*b)),
        (AvroSchema::Int, Value::Number(n)) => n
            .as_i64()
            .and_then(|v| i32::try_from(v).ok())
            .map(AvroValue::Int)
            .ok_or_else(mismatch),
        (AvroSchema::Long, Value::Number(n)) => n.as_i64().map(AvroValue::Long).ok_or_else(mismatch),
        (AvroSchema::Float, Value::Number(n)) => n
            .as_f64()
            .filter(|v| v.abs() <= f64::from(f32::MAX))
            .map(|v| AvroValue::Float(v as f32))
            .ok_or_else(mismatch),
        (AvroSchema::Double, Value::Number(n)) => n.as_f64().map(AvroValue::Double).ok_or_else(mismatch),
        (AvroSchema::String, Value::String(s)) => Ok(AvroValue::String(s.clone())),
        (AvroSchema::Bytes, Value::String(s)) => latin1_bytes(s)
            .map(AvroValue::Bytes)
            .map_err(DecodeError::InvalidData),
        (AvroSchema::Fixed(fixed), Value::String(s)) => {
            let bytes = latin1_bytes(s).map_err(DecodeError::InvalidData)?;
            if bytes.len() != fixed.size {
                return Err(DecodeError::InvalidData(format!(
                    "Fixed '{}' expects {} bytes, got {}",
                    fixed.fullname(),
                    fixed.size,
                    bytes.len()
                )));
            }
            Ok(AvroValue::Fixed(bytes))
        }
        (AvroSchema::Enum(e), Value::String(s)) => {
            let index = e.symbol_index(s).ok_or_else(|| {
                DecodeError::InvalidData(format!(
                    "Unknown enum symbol '{}' for enum '{}'",
                    s,
                    e.fullname()
                ))
            })?;
            Ok(AvroValue::Enum(index as i32, s.clone()))
        }
        (AvroSchema::Array(array), Value::Array(items)) => items
            .iter()
            .map(|item| json_to_avro(item, &array.items, context, tagged_unions))
            .collect::<Result<Vec<_>, _>>()
            .map(AvroValue::Array),
        (AvroSchema::Map(map), Value::Object(obj)) => obj
            .iter()
            .map(|(k, v)| Ok((k.clone(), json_to_avro(v, &map.values, context, tagged_unions)?)))
            .collect::<Result<Vec<_>, DecodeError>>()
            .map(AvroValue::Map),
        (AvroSchema::Record(record), Value::Object(obj)) => {
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                let value = match (obj.get(&field.name), &field.default) {
                    (Some(v), _) => json_to_avro(v, &field.schema, context, tagged_unions)?,
                    (None, Some(default)) => json_to_avro(default, &field.schema, context, false)?,
                    (None, None) => {
                        return Err(DecodeError::InvalidData(format!(
                            "Missing required field '{}' of record '{}'",
                            field.name,
                            record.fullname()
                        )))
                    }
                };
                fields.push((field.name.clone(), value));
            }
            Ok(AvroValue::Record(fields))
        }
        (AvroSchema::Union(variants), _) if !tagged_unions => {
            let first = variants
                .first()
                .ok_or_else(|| DecodeError::InvalidData("Empty union".to_string()))?;
            let value = json_to_avro(json, first, context, false)?;
            Ok(AvroValue::Union(0, Box::new(value)))
        }
        (AvroSchema::Union(variants), Value::Null) => {
            let index = variants
                .iter()
                .position(|v| matches!(v, AvroSchema::Null))
                .ok_or_else(mismatch)?;
            Ok(AvroValue::Union(index as i32, Box::new(AvroValue::Null)))
        }
        (AvroSchema::Union(variants), Value::Object(obj)) if obj.len() == 1 => {
            let (key, inner) = obj.iter().next().ok_or_else(mismatch)?;
            let index = variants
                .iter()
                .position(|v| &v.member_key() == key)
                .ok_or_else(|| {
                    DecodeError::InvalidData(format!("'{}' is not a branch of the union", key))
                })?;
            let value = json_to_avro(inner, &variants[index], context, true)?;
            Ok(AvroValue::Union(index as i32, Box::new(value)))
        }
        _ => Err(mismatch()),
    }
}

/// Accumulates JSON datums, one per line.
#[derive(Debug, Default)]
pub struct JsonEncoder {
    lines: Vec<String>,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatumEncoder for JsonEncoder {
    fn write(&mut self, schema: &AvroSchema, value: &AvroValue) -> Result<(), EncodeError> {
        let context = SchemaResolutionContext::build_from_schema(schema);
        let json = avro_to_json(schema, value, &context)?;
        self.lines.push(json.to_string());
        Ok(())
    }

    fn finish(self: Box<Self>) -> Bytes {
        Bytes::from(self.lines.join("\n"))
    }
}

/// Render `value` of `schema` in the Avro JSON encoding.
pub fn avro_to_json(
    schema: &AvroSchema,
    value: &AvroValue,
    context: &SchemaResolutionContext,
) -> Result<Value, EncodeError> {
    match (schema, value) {
        (AvroSchema::Named(name), _) => {
            let resolved = context.get(name).ok_or_else(|| {
                EncodeError::InvalidData(format!("Unresolved named type reference: '{}'", name))
            })?;
            avro_to_json(resolved, value, context)
        }
        (AvroSchema::Null, AvroValue::Null) => Ok(Value::Null),
        (AvroSchema::Boolean, AvroValue::Boolean(b)) => Ok(Value::Bool(*b)),
        (AvroSchema::Int, AvroValue::Int(i)) => Ok(Value::from(*i)),
        (AvroSchema::Long, AvroValue::Long(l)) => Ok(Value::from(*l)),
        (AvroSchema::Float, AvroValue::Float(f)) => float(f64::from(*f)),
        (AvroSchema::Double, AvroValue::Double(d)) => float(*d),
        (AvroSchema::String, AvroValue::String(s)) => Ok(Value::String(s.clone())),
        (AvroSchema::Bytes, AvroValue::Bytes(b)) | (AvroSchema::Fixed(_), AvroValue::Fixed(b)) => {
            Ok(Value::String(b.iter().map(|&c| c as char).collect()))
        }
        (AvroSchema::Enum(_), AvroValue::Enum(_, symbol)) => Ok(Value::String(symbol.clone())),
        (AvroSchema::Array(array), AvroValue::Array(items)) => items
            .iter()
            .map(|item| avro_to_json(&array.items, item, context))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        (AvroSchema::Map(map), AvroValue::Map(entries)) => entries
            .iter()
            .map(|(k, v)| Ok((k.clone(), avro_to_json(&map.values, v, context)?)))
            .collect::<Result<Map<_, _>, EncodeError>>()
            .map(Value::Object),
        (AvroSchema::Record(record), AvroValue::Record(fields)) => {
            let mut obj = Map::new();
            for field in &record.fields {
                let field_value = fields
                    .iter()
                    .find(|(name, _)| name == &field.name)
                    .map(|(_, v)| v)
                    .ok_or_else(|| {
                        EncodeError::InvalidData(format!(
                            "Record '{}' is missing field '{}'",
                            record.fullname(),
                            field.name
                        ))
                    })?;
                obj.insert(field.name.clone(), avro_to_json(&field.schema, field_value, context)?);
            }
            Ok(Value::Object(obj))
        }
        (AvroSchema::Union(variants), AvroValue::Union(index, inner)) => {
            let variant = usize::try_from(*index)
                .ok()
                .and_then(|i| variants.get(i))
                .ok_or_else(|| EncodeError::InvalidData(format!("Union index {} out of range", index)))?;
            if matches!(variant, AvroSchema::Null) {
                return Ok(Value::Null);
            }
            let mut obj = Map::new();
            obj.insert(variant.member_key(), avro_to_json(variant, inner, context)?);
            Ok(Value::Object(obj))
        }
        (schema, value) => Err(EncodeError::TypeMismatch(format!(
            "cannot write {} value as {}",
            value.kind(),
            schema.type_name()
        ))),
    }
}

fn float(value: f64) -> Result<Value, EncodeError> {
    Number::from_f64(value)
        .map(Value::Number)
        .ok_or_else(|| EncodeError::InvalidData(format!("{} has no JSON representation", value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::parse_schema;
    use serde_json::json;

    const SCHEMA: &str = r#"{"type": "record", "name": "Event", "namespace": "a", "fields": [
        {"name": "kind", "type": {"type": "enum", "name": "Kind", "symbols": ["OPEN", "CLOSE"]}},
        {"name": "payload", "type": ["null", "bytes", "Kind"]},
        {"name": "count", "type": "long", "default": 7}
    ]}"#;

    #[test]
    fn test_tagged_union_round_trip() {
        let schema = parse_schema(SCHEMA).unwrap();
        let value = AvroValue::Record(vec![
            ("kind".into(), AvroValue::Enum(1, "CLOSE".into())),
            ("payload".into(), AvroValue::Union(2, Box::new(AvroValue::Enum(0, "OPEN".into())))),
            ("count".into(), AvroValue::Long(3)),
        ]);

        let mut encoder: Box<dyn DatumEncoder> = Box::new(JsonEncoder::new());
        encoder.write(&schema, &value).unwrap();
        let text = String::from_utf8(encoder.finish().to_vec()).unwrap();
        let rendered: Value = serde_json::from_str(&text).unwrap();
        assert_eq!(
            rendered,
            json!({"kind": "CLOSE", "payload": {"a.Kind": "OPEN"}, "count": 3})
        );

        let mut decoder = JsonDecoder::new(&text).unwrap();
        assert_eq!(decoder.read(&schema).unwrap(), value);
    }

    #[test]
    fn test_missing_field_uses_default() {
        let schema = parse_schema(SCHEMA).unwrap();
        let mut decoder =
            JsonDecoder::new(r#"{"kind": "OPEN", "payload": {"bytes": "ÿ"}}"#).unwrap();
        let value = decoder.read(&schema).unwrap();
        assert_eq!(value.field("count"), Some(&AvroValue::Long(7)));
        assert_eq!(
            value.field("payload"),
            Some(&AvroValue::Union(1, Box::new(AvroValue::Bytes(vec![0xff]))))
        );
    }

    #[test]
    fn test_missing_union_field_default_uses_first_branch() {
        let schema = parse_schema(
            r#"{"type": "record", "name": "R", "fields": [
                {"name": "n", "type": ["int", "null"], "default": 5}
            ]}"#,
        )
        .unwrap();
        let mut decoder = JsonDecoder::new("{}").unwrap();
        assert_eq!(
            decoder.read(&schema).unwrap().field("n"),
            Some(&AvroValue::Union(0, Box::new(AvroValue::Int(5))))
        );
    }

    #[test]
    fn test_float_out_of_range() {
        let mut decoder = JsonDecoder::new("1.5 1e300").unwrap();
        assert_eq!(decoder.read(&AvroSchema::Float).unwrap(), AvroValue::Float(1.5));
        assert!(matches!(
            decoder.read(&AvroSchema::Float),
            Err(DecodeError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_multiple_datums() {
        let mut decoder = JsonDecoder::new("1 2\n3").unwrap();
        let ints: Vec<_> = (0..3).map(|_| decoder.read(&AvroSchema::Int).unwrap()).collect();
        assert_eq!(ints, vec![AvroValue::Int(1), AvroValue::Int(2), AvroValue::Int(3)]);
        assert!(matches!(decoder.read(&AvroSchema::Int), Err(DecodeError::UnexpectedEof)));
    }
}
