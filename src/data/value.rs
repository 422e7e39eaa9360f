//! Native data values.

use indexmap::IndexMap;
use serde_json::{Map, Number, Value};

use crate::data::{DataSchema, DataSchemaArena, PrimitiveType, SchemaRef};

/// A native value tree.
///
/// Records and maps are both `Map`; a union value is `Null` or a
/// single-entry `Map` keyed by the member key.
#[derive(Debug, Clone, PartialEq)]
pub enum DataValue {
    Null,
    Boolean(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    Map(IndexMap<String, DataValue>),
    List(Vec<DataValue>),
}

impl DataValue {
    /// Build a map value from `(key, value)` pairs.
    pub fn map<K: Into<String>>(entries: impl IntoIterator<Item = (K, DataValue)>) -> Self {
        DataValue::Map(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }

    /// Build a union value selecting `member`.
    pub fn union(member: impl Into<String>, value: DataValue) -> Self {
        DataValue::map([(member.into(), value)])
    }

    /// Short description of the value's kind, for messages.
    pub fn kind(&self) -> &'static str {
        match self {
            DataValue::Null => "null",
            DataValue::Boolean(_) => "boolean",
            DataValue::Int(_) => "int",
            DataValue::Long(_) => "long",
            DataValue::Float(_) => "float",
            DataValue::Double(_) => "double",
            DataValue::String(_) => "string",
            DataValue::Bytes(_) => "bytes",
            DataValue::Map(_) => "map",
            DataValue::List(_) => "list",
        }
    }

    pub fn as_map(&self) -> Option<&IndexMap<String, DataValue>> {
        match self {
            DataValue::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Convert JSON without a schema: integers become `Int` when they fit,
    /// otherwise `Long`; other numbers become `Double`.
    pub fn from_json(json: &Value) -> Self {
        match json {
            Value::Null => DataValue::Null,
            Value::Bool(b) => DataValue::Boolean(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => match i32::try_from(i) {
                    Ok(small) => DataValue::Int(small),
                    Err(_) => DataValue::Long(i),
                },
                None => DataValue::Double(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => DataValue::String(s.clone()),
            Value::Array(items) => DataValue::List(items.iter().map(DataValue::from_json).collect()),
            Value::Object(obj) => DataValue::Map(
                obj.iter()
                    .map(|(k, v)| (k.clone(), DataValue::from_json(v)))
                    .collect(),
            ),
        }
    }

    /// Convert JSON guided by a native schema, so that numbers get the
    /// declared width and bytes/fixed strings become byte arrays.
    pub fn from_json_with_schema(
        json: &Value,
        arena: &DataSchemaArena,
        schema: SchemaRef,
    ) -> Result<Self, String> {
        let id = arena.dereference(schema);
        match (&arena[id], json) {
            (DataSchema::Primitive(p), _) => primitive_from_json(*p, json),
            (DataSchema::Enum(_), Value::String(s)) => Ok(DataValue::String(s.clone())),
            (DataSchema::Fixed(_), Value::String(s)) => latin1_bytes(s).map(DataValue::Bytes),
            (DataSchema::Array(a), Value::Array(items)) => items
                .iter()
                .map(|item| DataValue::from_json_with_schema(item, arena, a.items))
                .collect::<Result<Vec<_>, _>>()
                .map(DataValue::List),
            (DataSchema::Map(m), Value::Object(obj)) => obj
                .iter()
                .map(|(k, v)| Ok((k.clone(), DataValue::from_json_with_schema(v, arena, m.values)?)))
                .collect::<Result<IndexMap<_, _>, String>>()
                .map(DataValue::Map),
            (DataSchema::Record(_), Value::Object(obj)) => {
                let fields = arena.all_fields(id);
                obj.iter()
                    .map(|(k, v)| {
                        let converted = match fields.iter().find(|f| &f.name == k) {
                            Some(field) => DataValue::from_json_with_schema(v, arena, field.schema)?,
                            None => DataValue::from_json(v),
                        };
                        Ok((k.clone(), converted))
                    })
                    .collect::<Result<IndexMap<_, _>, String>>()
                    .map(DataValue::Map)
            }
            (DataSchema::Union(_), Value::Null) => Ok(DataValue::Null),
            (DataSchema::Union(u), Value::Object(obj)) if obj.len() == 1 => {
                let (key, v) = obj
                    .iter()
                    .next()
                    .ok_or_else(|| "empty union value".to_string())?;
                let member = arena
                    .find_member(u, key)
                    .ok_or_else(|| format!("'{}' is not a member of the union", key))?;
                Ok(DataValue::union(
                    key.clone(),
                    DataValue::from_json_with_schema(v, arena, member.schema)?,
                ))
            }
            (schema, other) => Err(format!(
                "JSON value {} does not match {} schema",
                other,
                schema.type_name()
            )),
        }
    }

    /// Render as native JSON. Bytes become Latin-1 strings.
    pub fn to_json(&self) -> Value {
        match self {
            DataValue::Null => Value::Null,
            DataValue::Boolean(b) => Value::Bool(*b),
            DataValue::Int(i) => Value::from(*i),
            DataValue::Long(l) => Value::from(*l),
            DataValue::Float(f) => Number::from_f64(f64::from(*f))
                .map(Value::Number)
                .unwrap_or(Value::Null),
            DataValue::Double(d) => Number::from_f64(*d)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            DataValue::String(s) => Value::String(s.clone()),
            DataValue::Bytes(b) => Value::String(b.iter().map(|&c| c as char).collect()),
            DataValue::Map(m) => Value::Object(
                m.iter()
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect::<Map<_, _>>(),
            ),
            DataValue::List(items) => Value::Array(items.iter().map(|v| v.to_json()).collect()),
        }
    }
}

fn primitive_from_json(primitive: PrimitiveType, json: &Value) -> Result<DataValue, String> {
    let mismatch = || format!("JSON value {} is not a valid {}", json, primitive.name());
    match primitive {
        PrimitiveType::Null => json.is_null().then_some(DataValue::Null).ok_or_else(mismatch),
        PrimitiveType::Boolean => json.as_bool().map(DataValue::Boolean).ok_or_else(mismatch),
        PrimitiveType::Int => json
            .as_i64()
            .and_then(|i| i32::try_from(i).ok())
            .map(DataValue::Int)
            .ok_or_else(mismatch),
        PrimitiveType::Long => json.as_i64().map(DataValue::Long).ok_or_else(mismatch),
        PrimitiveType::Float => json
            .as_f64()
            .map(|f| DataValue::Float(f as f32))
            .ok_or_else(mismatch),
        PrimitiveType::Double => json.as_f64().map(DataValue::Double).ok_or_else(mismatch),
        PrimitiveType::String => json
            .as_str()
            .map(|s| DataValue::String(s.to_string()))
            .ok_or_else(mismatch),
        PrimitiveType::Bytes => match json.as_str() {
            Some(s) => latin1_bytes(s).map(DataValue::Bytes),
            None => Err(mismatch()),
        },
    }
}

/// Decode a string whose chars are all in `\u0000..=ÿ` into bytes.
pub fn latin1_bytes(s: &str) -> Result<Vec<u8>, String> {
    s.chars()
        .map(|c| u8::try_from(u32::from(c)).map_err(|_| format!("character {:?} is not a byte", c)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::{ArrayDataSchema, Field, RecordDataSchema};
    use serde_json::json;

    #[test]
    fn test_untyped_numbers_pick_narrowest_width() {
        assert_eq!(DataValue::from_json(&json!(1)), DataValue::Int(1));
        assert_eq!(
            DataValue::from_json(&json!(5_000_000_000i64)),
            DataValue::Long(5_000_000_000)
        );
        assert_eq!(DataValue::from_json(&json!(1.5)), DataValue::Double(1.5));
    }

    #[test]
    fn test_schema_guided_conversion() {
        let mut arena = DataSchemaArena::new();
        let long = arena.primitive(PrimitiveType::Long);
        let bytes = arena.primitive(PrimitiveType::Bytes);
        let longs = arena.add(DataSchema::Array(ArrayDataSchema {
            items: long,
            properties: Default::default(),
        }));
        let record = arena.add(DataSchema::Record(RecordDataSchema::new(
            "R",
            vec![Field::new("ids", longs), Field::new("payload", bytes)],
        )));

        let value =
            DataValue::from_json_with_schema(&json!({"ids": [1, 2], "payload": "\u{00ff}a"}), &arena, record)
                .unwrap();
        assert_eq!(
            value,
            DataValue::map([
                ("ids", DataValue::List(vec![DataValue::Long(1), DataValue::Long(2)])),
                ("payload", DataValue::Bytes(vec![0xff, b'a'])),
            ])
        );
    }

    #[test]
    fn test_bytes_render_as_latin1() {
        let value = DataValue::Bytes(vec![0, 0xe9]);
        assert_eq!(value.to_json(), json!("\u{0000}\u{00e9}"));
        assert!(latin1_bytes("\u{0100}").is_err());
    }
}
