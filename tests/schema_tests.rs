//! Tests for the Avro and native schema parsers.

use serde_json::json;

use pegasus_avro::data::{
    data_schema_to_json, parse_data_schema, parse_data_schema_with_resolver, DataSchema,
    InMemoryResolver, PrimitiveType,
};
use pegasus_avro::error::SchemaError;
use pegasus_avro::schema::*;

// ============================================================================
// Avro Parser
// ============================================================================

#[test]
fn test_parse_primitives_in_both_forms() {
    for (name, expected) in [
        ("null", AvroSchema::Null),
        ("boolean", AvroSchema::Boolean),
        ("int", AvroSchema::Int),
        ("long", AvroSchema::Long),
        ("float", AvroSchema::Float),
        ("double", AvroSchema::Double),
        ("bytes", AvroSchema::Bytes),
        ("string", AvroSchema::String),
    ] {
        assert_eq!(parse_schema(&format!("\"{}\"", name)).unwrap(), expected);
        assert_eq!(parse_schema(&format!(r#"{{"type": "{}"}}"#, name)).unwrap(), expected);
    }
}

#[test]
fn test_parse_record_inherits_namespace() {
    let schema = parse_schema(
        r#"{"type": "record", "name": "Outer", "namespace": "com.example", "fields": [
            {"name": "inner", "type": {"type": "record", "name": "Inner", "fields": [
                {"name": "flag", "type": "boolean"}
            ]}},
            {"name": "again", "type": "Inner"},
            {"name": "elsewhere", "type": {"type": "enum", "name": "other.Kind", "symbols": ["A"]}}
        ]}"#,
    )
    .unwrap();

    let AvroSchema::Record(outer) = &schema else {
        panic!("expected record");
    };
    assert_eq!(outer.fullname(), "com.example.Outer");
    assert_eq!(outer.fields[0].schema.fullname().as_deref(), Some("com.example.Inner"));
    assert_eq!(outer.fields[1].schema, AvroSchema::Named("com.example.Inner".into()));
    assert_eq!(outer.fields[2].schema.fullname().as_deref(), Some("other.Kind"));
}

#[test]
fn test_parse_field_attributes() {
    let schema = parse_schema(
        r#"{"type": "record", "name": "R", "fields": [
            {"name": "n", "type": "int", "default": 3, "doc": "count", "order": "descending",
             "aliases": ["m"], "validate": {"positive": {}}}
        ]}"#,
    )
    .unwrap();
    let AvroSchema::Record(record) = schema else {
        panic!("expected record");
    };
    let field = record.field("n").unwrap();
    assert_eq!(field.default, Some(json!(3)));
    assert_eq!(field.doc.as_deref(), Some("count"));
    assert_eq!(field.order, FieldOrder::Descending);
    assert_eq!(field.aliases, vec!["m".to_string()]);
    assert_eq!(field.properties.get("validate"), Some(&json!({"positive": {}})));
}

#[test]
fn test_parse_containers_and_fixed() {
    let schema = parse_schema(
        r#"{"type": "map", "values": {"type": "array", "items":
            {"type": "fixed", "name": "Hash", "namespace": "h", "size": 4}}}"#,
    )
    .unwrap();
    let AvroSchema::Map(map) = schema else {
        panic!("expected map");
    };
    let AvroSchema::Array(array) = map.values.as_ref() else {
        panic!("expected array");
    };
    let AvroSchema::Fixed(fixed) = array.items.as_ref() else {
        panic!("expected fixed");
    };
    assert_eq!(fixed.fullname(), "h.Hash");
    assert_eq!(fixed.size, 4);
}

#[test]
fn test_parse_union_member_keys() {
    let schema = parse_schema(
        r#"["null", "string", {"type": "enum", "name": "E", "namespace": "n", "symbols": ["X"]}]"#,
    )
    .unwrap();
    let AvroSchema::Union(branches) = &schema else {
        panic!("expected union");
    };
    let keys: Vec<String> = branches.iter().map(|b| b.member_key()).collect();
    assert_eq!(keys, vec!["null", "string", "n.E"]);
    assert_eq!(schema.null_index(), Some(0));
}

#[test]
fn test_parse_errors() {
    let cases = [
        "not json",
        "[]",
        r#"{"type": "record", "fields": []}"#,
        r#"{"type": "record", "name": "R"}"#,
        r#"{"type": "enum", "name": "E"}"#,
        r#"{"type": "fixed", "name": "F"}"#,
        r#"{"type": "array"}"#,
        r#"{"type": "map"}"#,
        r#"{"name": "NoType"}"#,
    ];
    for text in cases {
        assert!(parse_schema(text).is_err(), "expected failure for {}", text);
    }
    assert!(matches!(
        parse_schema(r#"{"type": "array", "items": "Missing"}"#),
        Err(SchemaError::UnresolvedName(name)) if name == "Missing"
    ));
}

#[test]
fn test_strict_mode_rejects_what_permissive_accepts() {
    let cases = [
        r#"["int", "int"]"#,
        r#"["null", ["int", "string"]]"#,
        r#"{"type": "record", "name": "1Bad", "fields": []}"#,
        r#"{"type": "record", "name": "R", "fields": [{"name": "a-b", "type": "int"}]}"#,
        r#"{"type": "enum", "name": "E", "symbols": ["OK", "not ok"]}"#,
    ];
    for text in cases {
        assert!(parse_schema(text).is_ok(), "permissive should accept {}", text);
        assert!(matches!(
            parse_schema_with_options(text, true),
            Err(SchemaError::InvalidSchema(_))
        ));
    }
}

#[test]
fn test_to_json_parses_back() {
    let text = r#"{"type": "record", "name": "Doc", "namespace": "d", "doc": "top", "fields": [
        {"name": "tags", "type": {"type": "array", "items": "string"}, "default": []},
        {"name": "kind", "type": {"type": "enum", "name": "Kind", "symbols": ["A", "B"], "default": "A"}},
        {"name": "next", "type": ["null", "Doc"], "default": null}
    ], "owner": "team"}"#;
    let schema = parse_schema(text).unwrap();
    let reparsed = parse_schema(&schema.to_json()).unwrap();
    assert_eq!(schema, reparsed);
    assert_eq!(schema.to_json_value()["owner"], json!("team"));
}

#[test]
fn test_parser_registry_exposes_named_types() {
    let mut parser = SchemaParser::new();
    parser
        .parse(&json!({"type": "fixed", "name": "a.MD5", "size": 16}))
        .unwrap();
    parser.check_references().unwrap();
    assert!(matches!(parser.get_named_type("a.MD5"), Some(AvroSchema::Fixed(_))));
    assert!(parser.get_named_type("MD5").is_none());
}

// ============================================================================
// Native Parser
// ============================================================================

#[test]
fn test_native_typeref_keeps_properties() {
    let tree = parse_data_schema(
        r#"{"type": "typeref", "name": "Url", "namespace": "web", "ref": "string",
            "validate": {"url": {}}}"#,
    )
    .unwrap();
    let DataSchema::Typeref(typeref) = &tree.arena[tree.root] else {
        panic!("expected typeref");
    };
    assert_eq!(typeref.fullname(), "web.Url");
    assert_eq!(typeref.properties.get("validate"), Some(&json!({"url": {}})));
    let target = tree.arena.dereference(tree.root);
    assert_eq!(tree.arena[target], DataSchema::Primitive(PrimitiveType::String));
}

#[test]
fn test_native_include_order_and_override() {
    let tree = parse_data_schema(
        r#"{"type": "record", "name": "Child", "include": [
            {"type": "record", "name": "Base", "fields": [
                {"name": "id", "type": "long"},
                {"name": "label", "type": "string"}
            ]}
        ], "fields": [
            {"name": "label", "type": "string", "optional": true},
            {"name": "extra", "type": "int"}
        ]}"#,
    )
    .unwrap();
    let fields = tree.arena.all_fields(tree.root);
    let names: Vec<&str> = fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["id", "label", "extra"]);
    assert!(fields[1].optional);
}

#[test]
fn test_native_rejections() {
    let cases = [
        r#"{"type": "record", "name": "R", "fields": [
            {"name": "a", "type": "int"}, {"name": "a", "type": "long"}]}"#,
        r#"{"type": "record", "name": "R", "include": ["int"], "fields": []}"#,
        r#"{"type": "record", "name": "R", "fields": [{"name": "a", "type": "int", "optional": "yes"}]}"#,
        r#"["int", "int"]"#,
        r#"[{"alias": "a", "type": "int"}, "string"]"#,
        r#"{"type": "typeref", "name": "T"}"#,
    ];
    for text in cases {
        assert!(parse_data_schema(text).is_err(), "expected failure for {}", text);
    }
}

#[test]
fn test_native_resolver_supplies_missing_names() {
    let mut resolver = InMemoryResolver::new();
    resolver.add(
        "shared.Address",
        r#"{"type": "record", "name": "Address", "namespace": "shared", "fields": [
            {"name": "city", "type": "string"}
        ]}"#,
    );
    let text = r#"{"type": "record", "name": "Person", "fields": [
        {"name": "home", "type": "shared.Address"}
    ]}"#;

    assert!(matches!(
        parse_data_schema(text),
        Err(SchemaError::UnresolvedName(name)) if name == "shared.Address"
    ));
    let tree = parse_data_schema_with_resolver(text, Some(&resolver)).unwrap();
    let home = tree.arena.all_fields(tree.root)[0].schema;
    assert_eq!(tree.arena[home].fullname().as_deref(), Some("shared.Address"));
}

#[test]
fn test_native_json_rendering_is_stable() {
    let text = r#"{"type": "record", "name": "Node", "namespace": "g", "fields": [
        {"name": "value", "type": {"type": "enum", "name": "Color", "symbols": ["RED"],
                                   "symbolDocs": {"RED": "warm"}}},
        {"name": "next", "type": "Node", "optional": true},
        {"name": "choice", "type": [{"alias": "count", "type": "int"}, "null"]}
    ]}"#;
    let tree = parse_data_schema(text).unwrap();
    let rendered = data_schema_to_json(&tree.arena, tree.root);
    let reparsed = parse_data_schema(&rendered.to_string()).unwrap();
    assert!(data_schemas_equal(&tree.arena, tree.root, &reparsed.arena, reparsed.root));
    assert_eq!(rendered["fields"][1]["type"], json!("g.Node"));
}
