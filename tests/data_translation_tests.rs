//! Tests for value translation between native data and Avro.

use std::sync::Arc;

use serde_json::json;

use pegasus_avro::codec::{AvroAdapter, AvroValue, DatumDecoder, DatumEncoder, DefaultAvroAdapter};
use pegasus_avro::convert::*;
use pegasus_avro::data::{parse_data_schema, DataSchemaNode, DataSchemaTree, DataValue};
use pegasus_avro::schema::AvroSchema;
use pegasus_avro::translate::{data_to_avro_schema, DataToAvroSchemaOptions, DISCRIMINATOR_FIELD};
use pegasus_avro::TranslationError;

/// Route translator logs to the test output; `RUST_LOG=pegasus_avro=trace` shows them.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

struct Fixture {
    native: DataSchemaTree,
    avro: AvroSchema,
    options: DataTranslationOptions,
}

impl Fixture {
    fn new(text: &str) -> Self {
        Self::with_options(text, DataTranslationOptions::default())
    }

    fn with_options(text: &str, options: DataTranslationOptions) -> Self {
        Self::build(text, &DataToAvroSchemaOptions::default(), options)
    }

    fn with_schema_options(text: &str, schema_options: &DataToAvroSchemaOptions) -> Self {
        Self::build(text, schema_options, DataTranslationOptions::default())
    }

    fn build(text: &str, schema_options: &DataToAvroSchemaOptions, options: DataTranslationOptions) -> Self {
        init_tracing();
        let native = parse_data_schema(text).unwrap();
        let avro = data_to_avro_schema(&native.arena, native.root, schema_options).unwrap();
        Self { native, avro, options }
    }

    fn value(&self, json: serde_json::Value) -> DataValue {
        DataValue::from_json_with_schema(&json, &self.native.arena, self.native.root).unwrap()
    }

    fn to_avro(&self, value: &DataValue) -> Result<AvroValue, pegasus_avro::DataTranslationError> {
        data_to_avro(value, &self.native.arena, self.native.root, &self.avro, &self.options)
    }

    fn to_data(&self, value: &AvroValue) -> Result<DataValue, pegasus_avro::DataTranslationError> {
        avro_to_data(value, &self.avro, &self.native.arena, self.native.root, &self.options)
    }
}

const PROFILE: &str = r#"{"type": "record", "name": "Profile", "namespace": "com.example", "fields": [
    {"name": "id", "type": "long"},
    {"name": "name", "type": "string"},
    {"name": "nickname", "type": "string", "optional": true},
    {"name": "visits", "type": "int", "default": 0},
    {"name": "tags", "type": {"type": "array", "items": "string"}},
    {"name": "scores", "type": {"type": "map", "values": "double"}},
    {"name": "status", "type": {"type": "enum", "name": "Status", "symbols": ["ACTIVE", "BANNED"]}},
    {"name": "hash", "type": {"type": "fixed", "name": "Hash", "size": 2}}
]}"#;

// ============================================================================
// Records
// ============================================================================

#[test]
fn test_record_round_trip() {
    let fixture = Fixture::new(PROFILE);
    let value = fixture.value(json!({
        "id": 7,
        "name": "ada",
        "nickname": "countess",
        "visits": 3,
        "tags": ["a", "b"],
        "scores": {"x": 1.5},
        "status": "ACTIVE",
        "hash": "\u{0001}\u{00ff}"
    }));

    let avro = fixture.to_avro(&value).unwrap();
    assert_eq!(avro.field("id"), Some(&AvroValue::Long(7)));
    assert_eq!(
        avro.field("nickname"),
        Some(&AvroValue::Union(1, Box::new(AvroValue::String("countess".into()))))
    );
    assert_eq!(avro.field("status"), Some(&AvroValue::Enum(0, "ACTIVE".into())));
    assert_eq!(avro.field("hash"), Some(&AvroValue::Fixed(vec![1, 255])));

    assert_eq!(fixture.to_data(&avro).unwrap(), value);
}

#[test]
fn test_missing_optional_and_defaulted_fields() {
    let fixture = Fixture::new(PROFILE);
    let value = fixture.value(json!({
        "id": 1,
        "name": "bob",
        "tags": [],
        "scores": {},
        "status": "BANNED",
        "hash": "ab"
    }));

    let avro = fixture.to_avro(&value).unwrap();
    // Optional field without a default translates to [null, string]
    assert_eq!(avro.field("nickname"), Some(&AvroValue::Union(0, Box::new(AvroValue::Null))));
    assert_eq!(avro.field("visits"), Some(&AvroValue::Int(0)));

    let back = fixture.to_data(&avro).unwrap();
    let fields = back.as_map().unwrap();
    assert!(!fields.contains_key("nickname"));
    assert_eq!(fields["visits"], DataValue::Int(0));
}

#[test]
fn test_every_bad_field_is_reported() {
    let fixture = Fixture::new(PROFILE);
    let value = DataValue::map([
        ("id", DataValue::Long(1)),
        ("name", DataValue::Int(5)),
        ("tags", DataValue::List(vec![DataValue::String("ok".into()), DataValue::Boolean(true)])),
        ("scores", DataValue::map::<String>([])),
        ("status", DataValue::String("UNKNOWN".into())),
        ("hash", DataValue::Bytes(vec![1, 2, 3])),
        ("extra", DataValue::Null),
    ]);

    let err = fixture.to_avro(&value).unwrap_err();
    assert!(err.has_path("/name"));
    assert!(err.has_path("/tags/1"));
    assert!(err.has_path("/status"));
    assert!(err.has_path("/hash"));
    assert!(err.has_path("/extra"));
    assert_eq!(err.diagnostics.len(), 5);
}

#[test]
fn test_missing_required_field_is_reported() {
    let fixture = Fixture::new(PROFILE);
    let value = DataValue::map([("id", DataValue::Long(1))]);
    let err = fixture.to_avro(&value).unwrap_err();
    assert!(err.has_path("/name"));
    assert!(err.has_path("/status"));
    assert!(!err.has_path("/visits"));
}

#[test]
fn test_numeric_widening() {
    let fixture = Fixture::new(
        r#"{"type": "record", "name": "R", "fields": [
            {"name": "l", "type": "long"},
            {"name": "d", "type": "double"}
        ]}"#,
    );
    let value = DataValue::map([("l", DataValue::Int(3)), ("d", DataValue::Float(0.5))]);
    let avro = fixture.to_avro(&value).unwrap();
    assert_eq!(avro.field("l"), Some(&AvroValue::Long(3)));
    assert_eq!(avro.field("d"), Some(&AvroValue::Double(0.5)));

    let narrowing = DataValue::map([("l", DataValue::Double(1.0)), ("d", DataValue::Double(1.0))]);
    let err = fixture.to_avro(&narrowing).unwrap_err();
    assert!(err.has_path("/l"));
}

#[test]
fn test_bytes_accept_latin1_strings() {
    let fixture = Fixture::new(r#"{"type": "record", "name": "R", "fields": [{"name": "b", "type": "bytes"}]}"#);
    let avro = fixture
        .to_avro(&DataValue::map([("b", DataValue::String("\u{00e9}a".into()))]))
        .unwrap();
    assert_eq!(avro.field("b"), Some(&AvroValue::Bytes(vec![0xe9, b'a'])));

    let err = fixture
        .to_avro(&DataValue::map([("b", DataValue::String("\u{20ac}".into()))]))
        .unwrap_err();
    assert!(err.has_path("/b"));
}

// ============================================================================
// Unions
// ============================================================================

#[test]
fn test_union_branch_follows_default_order() {
    let fixture = Fixture::new(
        r#"{"type": "record", "name": "R", "fields": [
            {"name": "u", "type": ["int", "string"], "optional": true, "default": {"string": "x"}}
        ]}"#,
    );
    // Avro union is [string, int, null]
    let value = fixture.value(json!({"u": {"int": 4}}));
    let avro = fixture.to_avro(&value).unwrap();
    assert_eq!(avro.field("u"), Some(&AvroValue::Union(1, Box::new(AvroValue::Int(4)))));
    assert_eq!(fixture.to_data(&avro).unwrap(), value);

    let absent = fixture.to_avro(&DataValue::map::<String>([])).unwrap();
    assert_eq!(absent.field("u"), Some(&AvroValue::Union(2, Box::new(AvroValue::Null))));
}

#[test]
fn test_union_of_named_types() {
    let fixture = Fixture::new(
        r#"{"type": "record", "name": "R", "namespace": "ns", "fields": [
            {"name": "shape", "type": [
                {"type": "record", "name": "Circle", "fields": [{"name": "r", "type": "double"}]},
                {"type": "record", "name": "Square", "fields": [{"name": "side", "type": "double"}]}
            ]}
        ]}"#,
    );
    let value = fixture.value(json!({"shape": {"ns.Square": {"side": 2.0}}}));
    let avro = fixture.to_avro(&value).unwrap();
    assert!(matches!(avro.field("shape"), Some(AvroValue::Union(1, _))));
    assert_eq!(fixture.to_data(&avro).unwrap(), value);

    let unknown = DataValue::map([("shape", DataValue::union("ns.Triangle", DataValue::map::<String>([])))]);
    assert!(fixture.to_avro(&unknown).unwrap_err().has_path("/shape"));
}

#[test]
fn test_union_member_under_overridden_namespace() {
    let fixture = Fixture::with_schema_options(
        r#"{"type": "record", "name": "R", "namespace": "com.x", "fields": [
            {"name": "u", "type": [
                {"type": "record", "name": "A", "fields": [{"name": "i", "type": "int"}]},
                "string"
            ]}
        ]}"#,
        &DataToAvroSchemaOptions::default().with_override_namespace(true),
    );
    let AvroSchema::Record(record) = &fixture.avro else {
        panic!("expected record");
    };
    let AvroSchema::Union(branches) = &record.fields[0].schema else {
        panic!("expected union");
    };
    assert_eq!(branches[0].member_key(), "avro.com.x.A");

    let value = fixture.value(json!({"u": {"com.x.A": {"i": 1}}}));
    let avro = fixture.to_avro(&value).unwrap();
    assert!(matches!(avro.field("u"), Some(AvroValue::Union(0, _))));
    assert_eq!(fixture.to_data(&avro).unwrap(), value);
}

#[test]
fn test_aliased_union_translates_to_record() {
    let fixture = Fixture::new(
        r#"{"type": "record", "name": "Result", "fields": [
            {"name": "outcome", "type": [
                {"alias": "success", "type": "string"},
                {"alias": "failure", "type": "int"}
            ]}
        ]}"#,
    );
    let value = fixture.value(json!({"outcome": {"failure": 500}}));

    let avro = fixture.to_avro(&value).unwrap();
    let outcome = avro.field("outcome").unwrap();
    assert_eq!(outcome.field("success"), Some(&AvroValue::Union(0, Box::new(AvroValue::Null))));
    assert_eq!(outcome.field("failure"), Some(&AvroValue::Union(1, Box::new(AvroValue::Int(500)))));
    assert_eq!(outcome.field(DISCRIMINATOR_FIELD), Some(&AvroValue::Enum(1, "failure".into())));

    assert_eq!(fixture.to_data(&avro).unwrap(), value);
}

#[test]
fn test_aliased_union_with_null() {
    let fixture = Fixture::new(
        r#"{"type": "record", "name": "R", "fields": [
            {"name": "u", "type": ["null", {"alias": "a", "type": "int"}], "default": null}
        ]}"#,
    );
    let value = DataValue::map([("u", DataValue::Null)]);
    let avro = fixture.to_avro(&value).unwrap();
    let u = avro.field("u").unwrap();
    assert_eq!(u.field(DISCRIMINATOR_FIELD), Some(&AvroValue::Enum(0, "null".into())));
    assert_eq!(fixture.to_data(&avro).unwrap(), value);
}

// ============================================================================
// Avro to Data
// ============================================================================

#[test]
fn test_avro_value_errors_are_collected() {
    let fixture = Fixture::new(PROFILE);
    let avro = AvroValue::Record(vec![
        ("id".into(), AvroValue::Long(1)),
        ("name".into(), AvroValue::String("x".into())),
        ("nickname".into(), AvroValue::Union(0, Box::new(AvroValue::Null))),
        ("visits".into(), AvroValue::Int(0)),
        ("tags".into(), AvroValue::Array(vec![])),
        ("scores".into(), AvroValue::Map(vec![])),
        ("status".into(), AvroValue::Enum(9, "GONE".into())),
        ("hash".into(), AvroValue::Fixed(vec![1])),
    ]);
    let err = fixture.to_data(&avro).unwrap_err();
    assert!(err.has_path("/status"));
    assert!(err.has_path("/hash"));
    assert_eq!(err.diagnostics.len(), 2);
}

#[test]
fn test_structural_mismatch_stops_the_walk() {
    let fixture = Fixture::new(r#"{"type": "record", "name": "R", "fields": [{"name": "a", "type": "int"}]}"#);
    let other = AvroSchema::Record(pegasus_avro::schema::RecordSchema::new(
        "R",
        vec![pegasus_avro::schema::FieldSchema::new("a", AvroSchema::String)],
    ));
    let value = DataValue::map([("a", DataValue::Int(1))]);
    let err = data_to_avro(&value, &fixture.native.arena, fixture.native.root, &other, &fixture.options).unwrap_err();
    assert_eq!(err.diagnostics.len(), 1);
    assert!(err.has_path("/a"));
}

#[test]
fn test_binary_encoding_round_trip() {
    let fixture = Fixture::new(PROFILE);
    let value = fixture.value(json!({
        "id": 42,
        "name": "grace",
        "tags": ["x"],
        "scores": {"y": 2.0},
        "status": "ACTIVE",
        "hash": "zz"
    }));
    let avro = fixture.to_avro(&value).unwrap();

    let adapter = DefaultAvroAdapter::new();
    let mut encoder = adapter.new_binary_encoder();
    encoder.write(&fixture.avro, &avro).unwrap();
    let bytes = encoder.finish();

    let decoded = adapter.new_binary_decoder(bytes).read(&fixture.avro).unwrap();
    assert_eq!(decoded, avro);

    let back = fixture.to_data(&decoded).unwrap();
    assert_eq!(back.as_map().unwrap()["name"], DataValue::String("grace".into()));
    assert_eq!(back.as_map().unwrap()["visits"], DataValue::Int(0));
}

// ============================================================================
// Overrides
// ============================================================================

/// Packs a `{x, y}` record of small ints into two bytes.
#[derive(Default)]
struct PointTranslator;

impl CustomDataTranslator for PointTranslator {
    fn data_to_avro(
        &self,
        ctx: &mut TranslationContext,
        value: &DataValue,
        _native: DataSchemaNode<'_>,
        _wire: &AvroSchema,
    ) -> Option<AvroValue> {
        let fields = value.as_map()?;
        let coordinate = |name: &str| match fields.get(name) {
            Some(DataValue::Int(v)) => u8::try_from(*v).ok(),
            _ => None,
        };
        match (coordinate("x"), coordinate("y")) {
            (Some(x), Some(y)) => Some(AvroValue::Fixed(vec![x, y])),
            _ => {
                ctx.add_message("point coordinates must fit in a byte");
                None
            }
        }
    }

    fn avro_to_data(
        &self,
        ctx: &mut TranslationContext,
        value: &AvroValue,
        _native: DataSchemaNode<'_>,
        _wire: &AvroSchema,
    ) -> Option<DataValue> {
        match value {
            AvroValue::Fixed(bytes) if bytes.len() == 2 => Some(DataValue::map([
                ("x", DataValue::Int(i32::from(bytes[0]))),
                ("y", DataValue::Int(i32::from(bytes[1]))),
            ])),
            other => {
                ctx.add_message(format!("cannot read a point from {}", other.kind()));
                None
            }
        }
    }
}

const OVERRIDDEN: &str = r#"{"type": "record", "name": "Shape", "fields": [
    {"name": "origin", "type": {
        "type": "typeref", "name": "PackedPoint",
        "ref": {"type": "record", "name": "Point", "fields": [
            {"name": "x", "type": "int"}, {"name": "y", "type": "int"}
        ]},
        "avro": {
            "schema": {"type": "fixed", "name": "PointBytes", "namespace": "com.example", "size": 2},
            "translator": {"class": "com.example.PointTranslator"}
        }
    }}
]}"#;

fn registry() -> Arc<TranslatorRegistry> {
    let mut registry = TranslatorRegistry::new();
    registry.register::<PointTranslator>("com.example.PointTranslator");
    Arc::new(registry)
}

#[test]
fn test_override_replaces_schema_and_values() {
    let fixture = Fixture::with_options(
        OVERRIDDEN,
        DataTranslationOptions::default().with_override_factory(registry()),
    );
    assert_eq!(
        fixture.avro.to_json_value()["fields"][0]["type"]["name"],
        json!("PointBytes")
    );

    let value = fixture.value(json!({"origin": {"x": 3, "y": 4}}));
    let avro = fixture.to_avro(&value).unwrap();
    assert_eq!(avro.field("origin"), Some(&AvroValue::Fixed(vec![3, 4])));
    assert_eq!(fixture.to_data(&avro).unwrap(), value);

    let err = fixture
        .to_avro(&fixture.value(json!({"origin": {"x": 300, "y": 4}})))
        .unwrap_err();
    assert!(err.has_path("/origin"));
}

#[test]
fn test_override_without_factory_is_reported() {
    let fixture = Fixture::new(OVERRIDDEN);
    let value = fixture.value(json!({"origin": {"x": 1, "y": 2}}));
    let err = fixture.to_avro(&value).unwrap_err();
    assert!(err.diagnostics[0].message.contains("com.example.PointTranslator"));
}

#[test]
fn test_unknown_translator_class_fails_schema_translation() {
    let native = parse_data_schema(OVERRIDDEN).unwrap();
    let options = DataToAvroSchemaOptions::default().with_override_factory(Arc::new(TranslatorRegistry::new()));
    let err = data_to_avro_schema(&native.arena, native.root, &options);
    assert!(matches!(
        err,
        Err(TranslationError::Override(pegasus_avro::OverrideError::Instantiation { .. }))
    ));
}

#[test]
fn test_half_declared_override_is_invalid() {
    let native = parse_data_schema(
        r#"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": {"type": "typeref", "name": "T", "ref": "string",
                "avro": {"schema": {"type": "fixed", "name": "F", "size": 1}}}}
        ]}"#,
    )
    .unwrap();
    let err = data_to_avro_schema(&native.arena, native.root, &DataToAvroSchemaOptions::default());
    assert!(matches!(
        err,
        Err(TranslationError::Override(pegasus_avro::OverrideError::Invalid { .. }))
    ));
}
