//! Expansion of aliased unions into Avro records.
//!
//! Avro unions cannot hold two branches of the same type, so a native union
//! whose members are addressed by alias becomes a record: one nullable field
//! per alias plus a `fieldDiscriminator` enum naming the member that is set.
//! The record is named after the enclosing record and the field,
//! `<EnclosingRecord><Field>`. When that name is already taken the
//! enclosing records' own parents are prefixed one level at a time, and
//! once those run out a numeric suffix is appended.

use serde_json::Value;

use crate::schema::{AvroSchema, EnumSchema, FieldSchema, RecordSchema};

/// Name of the discriminator field of an expanded aliased union.
pub const DISCRIMINATOR_FIELD: &str = "fieldDiscriminator";
/// Discriminator symbol meaning the union holds null.
pub const NULL_DISCRIMINATOR: &str = "null";

/// Non-null member of an aliased union, already translated.
pub(crate) struct AliasedMember {
    pub alias: String,
    pub schema: AvroSchema,
}

/// Uppercase the first character.
pub(crate) fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Candidate record names in preference order.
///
/// `enclosing` lists the simple names of the enclosing records, outermost
/// first; the last entry is the record declaring the field.
pub(crate) fn name_candidates<'a>(
    enclosing: &'a [String],
    field: &'a str,
) -> impl Iterator<Item = String> + 'a {
    let suffix = capitalize(field);
    let base = format!("{}{}", enclosing.last().map(String::as_str).unwrap_or(""), suffix);
    let prefixed = (0..enclosing.len())
        .rev()
        .map(move |start| format!("{}{}", enclosing[start..].concat(), capitalize(field)));
    prefixed.chain((2u32..).map(move |n| format!("{}{}", base, n)))
}

/// Name of the discriminator enum of a generated record.
pub(crate) fn discriminator_name(record_name: &str) -> String {
    format!("{}Discriminator", record_name)
}

/// Build the expanded record. `symbols` lists the discriminator symbols in
/// member order, `"null"` included when the union has a null member.
pub(crate) fn build_alias_record(
    name: String,
    namespace: Option<String>,
    members: Vec<AliasedMember>,
    symbols: Vec<String>,
) -> AvroSchema {
    let mut discriminator = EnumSchema::new(discriminator_name(&name), symbols);
    discriminator.namespace = namespace.clone();

    let mut fields: Vec<FieldSchema> = members
        .into_iter()
        .map(|member| {
            FieldSchema::new(member.alias, AvroSchema::Union(vec![AvroSchema::Null, member.schema]))
                .with_default(Value::Null)
        })
        .collect();
    fields.push(FieldSchema::new(DISCRIMINATOR_FIELD, AvroSchema::Enum(discriminator)));

    let mut record = RecordSchema::new(name, fields);
    record.namespace = namespace;
    AvroSchema::Record(record)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_candidates_prefix_parents_then_count() {
        let chain = vec!["Outer".to_string(), "Inner".to_string()];
        let names: Vec<String> = name_candidates(&chain, "result").take(4).collect();
        assert_eq!(
            names,
            vec!["InnerResult", "OuterInnerResult", "InnerResult2", "InnerResult3"]
        );
    }

    #[test]
    fn test_record_layout() {
        let record = build_alias_record(
            "FooResult".to_string(),
            Some("com.example".to_string()),
            vec![
                AliasedMember {
                    alias: "success".to_string(),
                    schema: AvroSchema::String,
                },
                AliasedMember {
                    alias: "failure".to_string(),
                    schema: AvroSchema::String,
                },
            ],
            vec!["success".to_string(), "failure".to_string()],
        );

        let AvroSchema::Record(record) = record else {
            panic!("expected record");
        };
        assert_eq!(record.fullname(), "com.example.FooResult");
        let names: Vec<&str> = record.fields.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["success", "failure", DISCRIMINATOR_FIELD]);
        assert_eq!(record.fields[0].default, Some(Value::Null));
        assert!(record.fields[2].default.is_none());
        let AvroSchema::Enum(discriminator) = &record.fields[2].schema else {
            panic!("expected enum");
        };
        assert_eq!(discriminator.fullname(), "com.example.FooResultDiscriminator");
    }
}
