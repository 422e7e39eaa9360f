//! Property-based tests for schema and value translation.
//!
//! These tests use proptest to check the round-trip properties over many
//! generated record schemas and values.

use proptest::prelude::*;
use serde_json::{json, Value};

use pegasus_avro::codec::{AvroAdapter, DatumDecoder, DatumEncoder, DefaultAvroAdapter};
use pegasus_avro::convert::{avro_to_data, data_to_avro, DataTranslationOptions};
use pegasus_avro::data::{parse_data_schema, DataValue};
use pegasus_avro::schema::data_schemas_equal;
use pegasus_avro::translate::*;

// ============================================================================
// Generators
// ============================================================================

const PRIMITIVES: &[&str] = &["boolean", "int", "long", "float", "double", "string", "bytes"];

const RESERVED: &[&str] = &[
    "null", "boolean", "int", "long", "float", "double", "string", "bytes", "record", "enum", "array",
    "map", "fixed", "typeref",
];

/// Valid names: a letter or underscore, then letters, digits and underscores.
fn arb_name() -> impl Strategy<Value = String> {
    "[A-Za-z_][A-Za-z0-9_]{0,10}".prop_filter("type names cannot name records", |s| !RESERVED.contains(&s.as_str()))
}

fn arb_namespace() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        arb_name().prop_map(Some),
        (arb_name(), arb_name()).prop_map(|(a, b)| Some(format!("{}.{}", a, b))),
    ]
}

/// Field names paired with primitive type names, names unique.
fn arb_fields() -> impl Strategy<Value = Vec<(String, &'static str)>> {
    prop::collection::vec((arb_name(), prop::sample::select(PRIMITIVES)), 0..8).prop_map(|fields| {
        let mut seen = std::collections::HashSet::new();
        fields
            .into_iter()
            .filter(|(name, _)| seen.insert(name.clone()))
            .collect()
    })
}

fn record_json(name: &str, namespace: &Option<String>, fields: &[(String, &str)], optional: bool) -> Value {
    let fields: Vec<Value> = fields
        .iter()
        .map(|(field, kind)| {
            if optional {
                json!({"name": field, "type": kind, "optional": true})
            } else {
                json!({"name": field, "type": kind})
            }
        })
        .collect();
    let mut record = json!({"type": "record", "name": name, "fields": fields});
    if let Some(ns) = namespace {
        record["namespace"] = json!(ns);
    }
    record
}

fn arb_primitive_value(kind: &str) -> BoxedStrategy<Value> {
    match kind {
        "boolean" => any::<bool>().prop_map(Value::from).boxed(),
        "int" => any::<i32>().prop_map(Value::from).boxed(),
        "long" => any::<i64>().prop_map(Value::from).boxed(),
        // Small magnitudes survive the f32 narrowing unchanged
        "float" => (-1000i32..1000).prop_map(|v| Value::from(f64::from(v) / 4.0)).boxed(),
        "double" => (-1.0e9f64..1.0e9).prop_map(Value::from).boxed(),
        "string" => ".{0,12}".prop_map(Value::from).boxed(),
        _ => prop::collection::vec(any::<u8>(), 0..8)
            .prop_map(|bytes| Value::from(bytes.into_iter().map(char::from).collect::<String>()))
            .boxed(),
    }
}

/// A record schema of required primitive fields and a matching value.
fn arb_record_with_value() -> impl Strategy<Value = (Value, Value)> {
    (arb_name(), arb_namespace(), arb_fields()).prop_flat_map(|(name, namespace, fields)| {
        let schema = record_json(&name, &namespace, &fields, false);
        let values: Vec<BoxedStrategy<Value>> = fields.iter().map(|(_, kind)| arb_primitive_value(kind)).collect();
        let names: Vec<String> = fields.iter().map(|(field, _)| field.clone()).collect();
        (Just(schema), values).prop_map(move |(schema, values)| {
            let value: serde_json::Map<String, Value> = names.iter().cloned().zip(values).collect();
            (schema, Value::Object(value))
        })
    })
}

// ============================================================================
// Schema Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_required_fields_round_trip(
        name in arb_name(),
        namespace in arb_namespace(),
        fields in arb_fields(),
    ) {
        let text = record_json(&name, &namespace, &fields, false).to_string();
        let original = parse_data_schema(&text).unwrap();
        let avro = data_to_avro_schema(&original.arena, original.root, &DataToAvroSchemaOptions::default()).unwrap();
        let back = avro_to_data_schema(&avro, &AvroToDataSchemaOptions::default()).unwrap();
        prop_assert!(data_schemas_equal(&original.arena, original.root, &back.arena, back.root));
    }

    #[test]
    fn prop_optional_fields_translate_to_null_first(
        name in arb_name(),
        fields in arb_fields(),
        to_null in any::<bool>(),
    ) {
        let text = record_json(&name, &None, &fields, true).to_string();
        let original = parse_data_schema(&text).unwrap();
        let mode = if to_null { OptionalDefaultMode::TranslateToNull } else { OptionalDefaultMode::TranslateDefault };
        let options = DataToAvroSchemaOptions::default().with_optional_default_mode(mode);
        let avro = data_to_avro_schema(&original.arena, original.root, &options).unwrap().to_json_value();

        for (i, (_, kind)) in fields.iter().enumerate() {
            prop_assert_eq!(&avro["fields"][i]["type"], &json!(["null", kind]));
            prop_assert_eq!(&avro["fields"][i]["default"], &Value::Null);
        }
    }

    #[test]
    fn prop_embedded_schema_verifies(
        name in arb_name(),
        namespace in arb_namespace(),
        fields in arb_fields(),
    ) {
        let text = record_json(&name, &namespace, &fields, false).to_string();
        let original = parse_data_schema(&text).unwrap();
        let options = DataToAvroSchemaOptions::default().with_embed_mode(EmbedSchemaMode::RootOnly);
        let avro = data_to_avro_schema(&original.arena, original.root, &options).unwrap();

        let verify = AvroToDataSchemaOptions::default().with_mode(AvroToDataSchemaMode::VerifyEmbeddedSchema);
        let back = avro_to_data_schema(&avro, &verify).unwrap();
        prop_assert!(data_schemas_equal(&original.arena, original.root, &back.arena, back.root));
    }
}

// ============================================================================
// Value Properties
// ============================================================================

proptest! {
    #[test]
    fn prop_values_round_trip_through_binary((schema, json) in arb_record_with_value()) {
        let native = parse_data_schema(&schema.to_string()).unwrap();
        let avro_schema = data_to_avro_schema(&native.arena, native.root, &DataToAvroSchemaOptions::default()).unwrap();
        let value = DataValue::from_json_with_schema(&json, &native.arena, native.root).unwrap();
        let options = DataTranslationOptions::default();

        let avro = data_to_avro(&value, &native.arena, native.root, &avro_schema, &options).unwrap();

        let adapter = DefaultAvroAdapter::new();
        let mut encoder = adapter.new_binary_encoder();
        encoder.write(&avro_schema, &avro).unwrap();
        let decoded = adapter.new_binary_decoder(encoder.finish()).read(&avro_schema).unwrap();

        let back = avro_to_data(&decoded, &avro_schema, &native.arena, native.root, &options).unwrap();
        prop_assert_eq!(back, value);
    }
}
