//! The Avro schema model.
//!
//! This module defines the Avro schema type system used as the wire side of
//! every translation: primitives, complex types, named type references and
//! the property bags Avro allows on records, enums, fixed, arrays, maps and
//! fields.

use serde_json::{json, Map, Value};

/// Arbitrary string-keyed JSON properties attached to a schema or field.
///
/// Key order is preserved so that rendered schemas are stable.
pub type Properties = Map<String, Value>;

/// An Avro schema node.
///
/// Named types are defined once per document; later occurrences are
/// `Named` references resolved through `SchemaResolutionContext`.
#[derive(Debug, Clone, PartialEq)]
pub enum AvroSchema {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
    Record(RecordSchema),
    Enum(EnumSchema),
    Array(ArraySchema),
    Map(MapSchema),
    /// Branches in declaration order; the branch index is what gets encoded.
    Union(Vec<AvroSchema>),
    Fixed(FixedSchema),
    /// Full name of a type defined elsewhere in the same document.
    Named(String),
}

/// Avro record.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub fields: Vec<FieldSchema>,
    pub doc: Option<String>,
    pub aliases: Vec<String>,
    /// Attributes outside the Avro vocabulary, in document order.
    pub properties: Properties,
}

impl RecordSchema {
    pub fn new(name: impl Into<String>, fields: Vec<FieldSchema>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            fields,
            doc: None,
            aliases: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn fullname(&self) -> String {
        fullname(&self.name, self.namespace.as_deref())
    }

    /// Look up a field by name.
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = named_header("record", &self.name, self.namespace.as_deref(), self.doc.as_deref(), &self.aliases);

        obj.insert(
            "fields".to_string(),
            self.fields.iter().map(FieldSchema::to_json_value).collect(),
        );

        extend_properties(&mut obj, &self.properties);
        Value::Object(obj)
    }
}

/// A record field.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSchema {
    pub name: String,
    pub schema: AvroSchema,
    /// Optional default value for the field, in Avro JSON form.
    pub default: Option<Value>,
    pub doc: Option<String>,
    pub order: FieldOrder,
    pub aliases: Vec<String>,
    pub properties: Properties,
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, schema: AvroSchema) -> Self {
        Self {
            name: name.into(),
            schema,
            default: None,
            doc: None,
            order: FieldOrder::Ascending,
            aliases: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_doc(mut self, doc: impl Into<String>) -> Self {
        self.doc = Some(doc.into());
        self
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = Map::new();
        obj.insert("name".to_string(), json!(&self.name));
        obj.insert("type".to_string(), self.schema.to_json_value());

        if let Some(default) = &self.default {
            obj.insert("default".to_string(), default.clone());
        }

        if let Some(doc) = &self.doc {
            obj.insert("doc".to_string(), json!(doc));
        }

        if self.order != FieldOrder::Ascending {
            obj.insert("order".to_string(), json!(self.order.as_str()));
        }

        if !self.aliases.is_empty() {
            obj.insert("aliases".to_string(), json!(&self.aliases));
        }

        extend_properties(&mut obj, &self.properties);
        Value::Object(obj)
    }
}

/// Sort order declared on a record field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FieldOrder {
    #[default]
    Ascending,
    Descending,
    Ignore,
}

impl FieldOrder {
    /// The JSON spelling of the ordering.
    pub fn as_str(&self) -> &'static str {
        match self {
            FieldOrder::Ascending => "ascending",
            FieldOrder::Descending => "descending",
            FieldOrder::Ignore => "ignore",
        }
    }

    /// Parse the JSON spelling; unknown values fall back to ascending.
    pub fn parse(s: &str) -> Self {
        match s {
            "descending" => FieldOrder::Descending,
            "ignore" => FieldOrder::Ignore,
            _ => FieldOrder::Ascending,
        }
    }
}

/// Avro enum. Symbol order defines the encoded index.
#[derive(Debug, Clone, PartialEq)]
pub struct EnumSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub symbols: Vec<String>,
    pub doc: Option<String>,
    pub aliases: Vec<String>,
    /// Symbol readers fall back to for unknown symbols.
    pub default: Option<String>,
    pub properties: Properties,
}

impl EnumSchema {
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            symbols,
            doc: None,
            aliases: Vec::new(),
            default: None,
            properties: Properties::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn fullname(&self) -> String {
        fullname(&self.name, self.namespace.as_deref())
    }

    pub fn symbol_index(&self, symbol: &str) -> Option<usize> {
        self.symbols.iter().position(|s| s == symbol)
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = named_header("enum", &self.name, self.namespace.as_deref(), self.doc.as_deref(), &self.aliases);

        obj.insert("symbols".to_string(), json!(self.symbols));
        if let Some(symbol) = &self.default {
            obj.insert("default".to_string(), json!(symbol));
        }

        extend_properties(&mut obj, &self.properties);
        Value::Object(obj)
    }
}

/// Avro fixed.
#[derive(Debug, Clone, PartialEq)]
pub struct FixedSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub size: usize,
    pub doc: Option<String>,
    pub aliases: Vec<String>,
    pub properties: Properties,
}

impl FixedSchema {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            size,
            doc: None,
            aliases: Vec::new(),
            properties: Properties::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn fullname(&self) -> String {
        fullname(&self.name, self.namespace.as_deref())
    }

    pub fn to_json_value(&self) -> Value {
        let mut obj = named_header("fixed", &self.name, self.namespace.as_deref(), self.doc.as_deref(), &self.aliases);

        obj.insert("size".to_string(), json!(self.size));

        extend_properties(&mut obj, &self.properties);
        Value::Object(obj)
    }
}

/// Schema for an array type.
#[derive(Debug, Clone, PartialEq)]
pub struct ArraySchema {
    /// The schema of each item.
    pub items: Box<AvroSchema>,
    pub properties: Properties,
}

impl ArraySchema {
    pub fn new(items: AvroSchema) -> Self {
        Self {
            items: Box::new(items),
            properties: Properties::new(),
        }
    }
}

/// Schema for a map type. Keys are always strings.
#[derive(Debug, Clone, PartialEq)]
pub struct MapSchema {
    /// The schema of each value.
    pub values: Box<AvroSchema>,
    pub properties: Properties,
}

impl MapSchema {
    pub fn new(values: AvroSchema) -> Self {
        Self {
            values: Box::new(values),
            properties: Properties::new(),
        }
    }
}

/// Join a name and optional namespace into a full name.
pub fn fullname(name: &str, namespace: Option<&str>) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() && !name.contains('.') => format!("{}.{}", ns, name),
        _ => name.to_string(),
    }
}

/// Split a full name into `(namespace, name)`.
pub fn split_fullname(fullname: &str) -> (Option<String>, String) {
    match fullname.rsplit_once('.') {
        Some((ns, name)) => (Some(ns.to_string()), name.to_string()),
        None => (None, fullname.to_string()),
    }
}

/// `type`, `name` and the optional header keys shared by named types.
fn named_header(
    kind: &str,
    name: &str,
    namespace: Option<&str>,
    doc: Option<&str>,
    aliases: &[String],
) -> Map<String, Value> {
    let mut obj = Map::new();
    obj.insert("type".to_string(), json!(kind));
    obj.insert("name".to_string(), json!(name));
    if let Some(ns) = namespace {
        obj.insert("namespace".to_string(), json!(ns));
    }
    if let Some(doc) = doc {
        obj.insert("doc".to_string(), json!(doc));
    }
    if !aliases.is_empty() {
        obj.insert("aliases".to_string(), json!(aliases));
    }
    obj
}

fn extend_properties(obj: &mut Map<String, Value>, properties: &Properties) {
    for (key, value) in properties {
        if !obj.contains_key(key) {
            obj.insert(key.clone(), value.clone());
        }
    }
}

impl AvroSchema {
    /// Convenience constructor for an array schema.
    pub fn array(items: AvroSchema) -> Self {
        AvroSchema::Array(ArraySchema::new(items))
    }

    /// Convenience constructor for a map schema.
    pub fn map(values: AvroSchema) -> Self {
        AvroSchema::Map(MapSchema::new(values))
    }

    pub fn is_primitive(&self) -> bool {
        matches!(
            self,
            AvroSchema::Null
                | AvroSchema::Boolean
                | AvroSchema::Int
                | AvroSchema::Long
                | AvroSchema::Float
                | AvroSchema::Double
                | AvroSchema::Bytes
                | AvroSchema::String
        )
    }

    /// Records, enums and fixed; `Named` references count too.
    pub fn is_named(&self) -> bool {
        matches!(
            self,
            AvroSchema::Record(_) | AvroSchema::Enum(_) | AvroSchema::Fixed(_)
        )
    }

    pub fn fullname(&self) -> Option<String> {
        match self {
            AvroSchema::Record(r) => Some(r.fullname()),
            AvroSchema::Enum(e) => Some(e.fullname()),
            AvroSchema::Fixed(f) => Some(f.fullname()),
            AvroSchema::Named(n) => Some(n.clone()),
            _ => None,
        }
    }

    /// The Avro type name (`"record"`, `"int"`, ...).
    pub fn type_name(&self) -> &'static str {
        match self {
            AvroSchema::Null => "null",
            AvroSchema::Boolean => "boolean",
            AvroSchema::Int => "int",
            AvroSchema::Long => "long",
            AvroSchema::Float => "float",
            AvroSchema::Double => "double",
            AvroSchema::Bytes => "bytes",
            AvroSchema::String => "string",
            AvroSchema::Record(_) => "record",
            AvroSchema::Enum(_) => "enum",
            AvroSchema::Array(_) => "array",
            AvroSchema::Map(_) => "map",
            AvroSchema::Union(_) => "union",
            AvroSchema::Fixed(_) => "fixed",
            AvroSchema::Named(_) => "named",
        }
    }

    /// Key identifying this schema as a union branch.
    ///
    /// Named types (and references to them) are keyed by full name, all
    /// other types by their type name. A union never holds two branches
    /// with the same key.
    pub fn member_key(&self) -> String {
        match self.fullname() {
            Some(name) => name,
            None => self.type_name().to_string(),
        }
    }

    /// Mutable access to the property bag, for schemas that carry one.
    pub fn properties_mut(&mut self) -> Option<&mut Properties> {
        match self {
            AvroSchema::Record(r) => Some(&mut r.properties),
            AvroSchema::Enum(e) => Some(&mut e.properties),
            AvroSchema::Fixed(f) => Some(&mut f.properties),
            AvroSchema::Array(a) => Some(&mut a.properties),
            AvroSchema::Map(m) => Some(&mut m.properties),
            _ => None,
        }
    }

    /// The property bag, for schemas that carry one.
    pub fn properties(&self) -> Option<&Properties> {
        match self {
            AvroSchema::Record(r) => Some(&r.properties),
            AvroSchema::Enum(e) => Some(&e.properties),
            AvroSchema::Fixed(f) => Some(&f.properties),
            AvroSchema::Array(a) => Some(&a.properties),
            AvroSchema::Map(m) => Some(&m.properties),
            _ => None,
        }
    }

    /// True for a union with a null branch.
    pub fn is_nullable(&self) -> bool {
        match self {
            AvroSchema::Union(variants) => variants.iter().any(|v| matches!(v, AvroSchema::Null)),
            _ => false,
        }
    }

    /// Position of the null branch in a union.
    pub fn null_index(&self) -> Option<usize> {
        match self {
            AvroSchema::Union(variants) => {
                variants.iter().position(|v| matches!(v, AvroSchema::Null))
            }
            _ => None,
        }
    }

    /// For a two-branch nullable union, get the non-null schema.
    pub fn nullable_inner(&self) -> Option<&AvroSchema> {
        match self {
            AvroSchema::Union(variants) if variants.len() == 2 => {
                variants.iter().find(|v| !matches!(v, AvroSchema::Null))
            }
            _ => None,
        }
    }

    /// Compact Avro JSON text.
    pub fn to_json(&self) -> String {
        self.to_json_value().to_string()
    }

    /// Render as Avro JSON. `Named` nodes render as their full name.
    pub fn to_json_value(&self) -> Value {
        match self {
            AvroSchema::Null => json!("null"),
            AvroSchema::Boolean => json!("boolean"),
            AvroSchema::Int => json!("int"),
            AvroSchema::Long => json!("long"),
            AvroSchema::Float => json!("float"),
            AvroSchema::Double => json!("double"),
            AvroSchema::Bytes => json!("bytes"),
            AvroSchema::String => json!("string"),

            AvroSchema::Record(r) => r.to_json_value(),
            AvroSchema::Enum(e) => e.to_json_value(),
            AvroSchema::Array(a) => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("array"));
                obj.insert("items".to_string(), a.items.to_json_value());
                extend_properties(&mut obj, &a.properties);
                Value::Object(obj)
            }
            AvroSchema::Map(m) => {
                let mut obj = Map::new();
                obj.insert("type".to_string(), json!("map"));
                obj.insert("values".to_string(), m.values.to_json_value());
                extend_properties(&mut obj, &m.properties);
                Value::Object(obj)
            }
            AvroSchema::Union(variants) => {
                Value::Array(variants.iter().map(|v| v.to_json_value()).collect())
            }
            AvroSchema::Fixed(f) => f.to_json_value(),

            AvroSchema::Named(name) => json!(name),
        }
    }
}
