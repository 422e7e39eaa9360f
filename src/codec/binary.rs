//! Avro binary encoding.
//!
//! Values are written against a schema: zigzag varints for int/long,
//! little-endian IEEE floats, length-prefixed bytes/strings, blocked arrays
//! and maps, and a branch index in front of every union value.

use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::varint::{decode_int, decode_long, decode_varint, encode_long};
use crate::codec::{AvroValue, DatumDecoder, DatumEncoder};
use crate::error::{DecodeError, EncodeError};
use crate::schema::{AvroSchema, EnumSchema, SchemaResolutionContext};

/// Reads consecutive binary datums from a buffer.
#[derive(Debug, Clone)]
pub struct BinaryDecoder {
    data: Bytes,
    position: usize,
}

impl BinaryDecoder {
    pub fn new(data: Bytes) -> Self {
        Self { data, position: 0 }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.position
    }
}

impl DatumDecoder for BinaryDecoder {
    fn read(&mut self, schema: &AvroSchema) -> Result<AvroValue, DecodeError> {
        let context = SchemaResolutionContext::build_from_schema(schema);
        let mut cursor: &[u8] = &self.data[self.position..];
        let before = cursor.len();
        let value = decode_value(&mut cursor, schema, &context)?;
        self.position += before - cursor.len();
        Ok(value)
    }
}

/// Decode a single value of `schema` from the cursor.
pub fn decode_value(
    data: &mut &[u8],
    schema: &AvroSchema,
    context: &SchemaResolutionContext,
) -> Result<AvroValue, DecodeError> {
    match schema {
        AvroSchema::Null => Ok(AvroValue::Null),
        AvroSchema::Boolean => match take(data, 1)?[0] {
            0 => Ok(AvroValue::Boolean(false)),
            1 => Ok(AvroValue::Boolean(true)),
            other => Err(DecodeError::InvalidData(format!(
                "Invalid boolean byte: {}",
                other
            ))),
        },
        AvroSchema::Int => Ok(AvroValue::Int(decode_int(data)?)),
        AvroSchema::Long => Ok(AvroValue::Long(decode_long(data)?)),
        AvroSchema::Float => {
            let raw = take(data, 4)?;
            Ok(AvroValue::Float(f32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]])))
        }
        AvroSchema::Double => {
            let raw = take(data, 8)?;
            let mut buf = [0u8; 8];
            buf.copy_from_slice(raw);
            Ok(AvroValue::Double(f64::from_le_bytes(buf)))
        }
        AvroSchema::Bytes => Ok(AvroValue::Bytes(decode_bytes(data)?.to_vec())),
        AvroSchema::String => {
            let raw = decode_bytes(data)?.to_vec();
            Ok(AvroValue::String(String::from_utf8(raw)?))
        }
        AvroSchema::Record(record) => {
            let mut fields = Vec::with_capacity(record.fields.len());
            for field in &record.fields {
                fields.push((field.name.clone(), decode_value(data, &field.schema, context)?));
            }
            Ok(AvroValue::Record(fields))
        }
        AvroSchema::Enum(e) => {
            let (index, symbol) = decode_enum(data, e)?;
            Ok(AvroValue::Enum(index, symbol))
        }
        AvroSchema::Array(array) => {
            let mut items = Vec::new();
            decode_blocks(data, |data| {
                items.push(decode_value(data, &array.items, context)?);
                Ok(())
            })?;
            Ok(AvroValue::Array(items))
        }
        AvroSchema::Map(map) => {
            let mut entries = Vec::new();
            decode_blocks(data, |data| {
                let key = String::from_utf8(decode_bytes(data)?.to_vec())?;
                entries.push((key, decode_value(data, &map.values, context)?));
                Ok(())
            })?;
            Ok(AvroValue::Map(entries))
        }
        AvroSchema::Union(variants) => {
            let index = decode_long(data)?;
            let variant = usize::try_from(index)
                .ok()
                .and_then(|i| variants.get(i))
                .ok_or_else(|| {
                    DecodeError::InvalidData(format!(
                        "Union index {} out of range (union has {} variants)",
                        index,
                        variants.len()
                    ))
                })?;
            let value = decode_value(data, variant, context)?;
            Ok(AvroValue::Union(index as i32, Box::new(value)))
        }
        AvroSchema::Fixed(fixed) => Ok(AvroValue::Fixed(take(data, fixed.size)?.to_vec())),
        AvroSchema::Named(name) => match context.get(name) {
            Some(resolved) => decode_value(data, resolved, context),
            None => Err(DecodeError::InvalidData(format!(
                "Unresolved named type reference: '{}'",
                name
            ))),
        },
    }
}

fn take<'a>(data: &mut &'a [u8], len: usize) -> Result<&'a [u8], DecodeError> {
    if data.len() < len {
        return Err(DecodeError::UnexpectedEof);
    }
    let (head, rest) = data.split_at(len);
    *data = rest;
    Ok(head)
}

fn decode_bytes<'a>(data: &mut &'a [u8]) -> Result<&'a [u8], DecodeError> {
    let len = decode_long(data)?;
    let len = usize::try_from(len)
        .map_err(|_| DecodeError::InvalidData(format!("Negative length: {}", len)))?;
    take(data, len)
}

fn decode_enum(data: &mut &[u8], schema: &EnumSchema) -> Result<(i32, String), DecodeError> {
    let index = decode_int(data)?;
    let symbol = usize::try_from(index)
        .ok()
        .and_then(|i| schema.symbols.get(i))
        .ok_or_else(|| {
            DecodeError::InvalidData(format!(
                "Enum index {} out of range (enum has {} symbols)",
                index,
                schema.symbols.len()
            ))
        })?;
    Ok((index, symbol.clone()))
}

/// Walk the blocks of an array or map; a negative count is followed by the
/// block size in bytes.
fn decode_blocks(
    data: &mut &[u8],
    mut item: impl FnMut(&mut &[u8]) -> Result<(), DecodeError>,
) -> Result<(), DecodeError> {
    loop {
        let count = decode_long(data)?;
        if count == 0 {
            return Ok(());
        }
        let count = if count < 0 {
            decode_varint(data)?;
            count.unsigned_abs()
        } else {
            count as u64
        };
        for _ in 0..count {
            item(data)?;
        }
    }
}

/// Accumulates binary datums into a buffer.
#[derive(Debug, Default)]
pub struct BinaryEncoder {
    buf: BytesMut,
}

impl BinaryEncoder {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DatumEncoder for BinaryEncoder {
    fn write(&mut self, schema: &AvroSchema, value: &AvroValue) -> Result<(), EncodeError> {
        let context = SchemaResolutionContext::build_from_schema(schema);
        encode_value(&mut self.buf, schema, value, &context)
    }

    fn finish(self: Box<Self>) -> Bytes {
        self.buf.freeze()
    }
}

/// Encode `value` as `schema` onto `buf`.
pub fn encode_value(
    buf: &mut BytesMut,
    schema: &AvroSchema,
    value: &AvroValue,
    context: &SchemaResolutionContext,
) -> Result<(), EncodeError> {
    match (schema, value) {
        (AvroSchema::Named(name), _) => {
            let resolved = context.get(name).ok_or_else(|| {
                EncodeError::InvalidData(format!("Unresolved named type reference: '{}'", name))
            })?;
            encode_value(buf, resolved, value, context)
        }
        (AvroSchema::Null, AvroValue::Null) => Ok(()),
        (AvroSchema::Boolean, AvroValue::Boolean(b)) => {
            buf.put_u8(u8::from(*b));
            Ok(())
        }
        (AvroSchema::Int, AvroValue::Int(i)) => {
            encode_long(i64::from(*i), buf);
            Ok(())
        }
        (AvroSchema::Long, AvroValue::Long(l)) => {
            encode_long(*l, buf);
            Ok(())
        }
        (AvroSchema::Float, AvroValue::Float(f)) => {
            buf.put_f32_le(*f);
            Ok(())
        }
        (AvroSchema::Double, AvroValue::Double(d)) => {
            buf.put_f64_le(*d);
            Ok(())
        }
        (AvroSchema::Bytes, AvroValue::Bytes(b)) => {
            put_bytes(buf, b);
            Ok(())
        }
        (AvroSchema::String, AvroValue::String(s)) => {
            put_bytes(buf, s.as_bytes());
            Ok(())
        }
        (AvroSchema::Record(record), AvroValue::Record(fields)) => {
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
                encode_value(buf, &field.schema, field_value, context)?;
            }
            Ok(())
        }
        (AvroSchema::Enum(e), AvroValue::Enum(_, symbol)) => {
            let index = e.symbol_index(symbol).ok_or_else(|| {
                EncodeError::InvalidData(format!(
                    "'{}' is not a symbol of enum '{}'",
                    symbol,
                    e.fullname()
                ))
            })?;
            encode_long(index as i64, buf);
            Ok(())
        }
        (AvroSchema::Array(array), AvroValue::Array(items)) => {
            if !items.is_empty() {
                encode_long(items.len() as i64, buf);
                for item in items {
                    encode_value(buf, &array.items, item, context)?;
                }
            }
            encode_long(0, buf);
            Ok(())
        }
        (AvroSchema::Map(map), AvroValue::Map(entries)) => {
            if !entries.is_empty() {
                encode_long(entries.len() as i64, buf);
                for (key, entry) in entries {
                    put_bytes(buf, key.as_bytes());
                    encode_value(buf, &map.values, entry, context)?;
                }
            }
            encode_long(0, buf);
            Ok(())
        }
        (AvroSchema::Union(variants), AvroValue::Union(index, inner)) => {
            let variant = usize::try_from(*index)
                .ok()
                .and_then(|i| variants.get(i))
                .ok_or_else(|| {
                    EncodeError::InvalidData(format!("Union index {} out of range", index))
                })?;
            encode_long(i64::from(*index), buf);
            encode_value(buf, variant, inner, context)
        }
        (AvroSchema::Fixed(fixed), AvroValue::Fixed(bytes)) => {
            if bytes.len() != fixed.size {
                return Err(EncodeError::InvalidData(format!(
                    "Fixed '{}' expects {} bytes, got {}",
                    fixed.fullname(),
                    fixed.size,
                    bytes.len()
                )));
            }
            buf.put_slice(bytes);
            Ok(())
        }
        (schema, value) => Err(EncodeError::TypeMismatch(format!(
            "cannot write {} value as {}",
            value.kind(),
            schema.type_name()
        ))),
    }
}

fn put_bytes(buf: &mut BytesMut, bytes: &[u8]) {
    encode_long(bytes.len() as i64, buf);
    buf.put_slice(bytes);
}
