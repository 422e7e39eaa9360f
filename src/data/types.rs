//! Native data schema types.
//!
//! Native schemas live in a `DataSchemaArena` and refer to each other by
//! `SchemaRef` index. A record that refers to itself simply holds its own
//! index, so cyclic definitions need no special representation and node
//! identity (not structural value) is what translation caches key on.

use indexmap::IndexMap;
use serde_json::Value;

use crate::schema::{fullname, FieldOrder, Properties};

/// Index of a schema node inside a `DataSchemaArena`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SchemaRef(usize);

impl SchemaRef {
    pub fn index(self) -> usize {
        self.0
    }
}

/// Native primitive types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PrimitiveType {
    Null,
    Boolean,
    Int,
    Long,
    Float,
    Double,
    Bytes,
    String,
}

impl PrimitiveType {
    /// The type name as written in schema documents.
    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveType::Null => "null",
            PrimitiveType::Boolean => "boolean",
            PrimitiveType::Int => "int",
            PrimitiveType::Long => "long",
            PrimitiveType::Float => "float",
            PrimitiveType::Double => "double",
            PrimitiveType::Bytes => "bytes",
            PrimitiveType::String => "string",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "null" => Some(PrimitiveType::Null),
            "boolean" => Some(PrimitiveType::Boolean),
            "int" => Some(PrimitiveType::Int),
            "long" => Some(PrimitiveType::Long),
            "float" => Some(PrimitiveType::Float),
            "double" => Some(PrimitiveType::Double),
            "bytes" => Some(PrimitiveType::Bytes),
            "string" => Some(PrimitiveType::String),
            _ => None,
        }
    }
}

/// A native schema node.
#[derive(Debug, Clone, PartialEq)]
pub enum DataSchema {
    Primitive(PrimitiveType),
    Record(RecordDataSchema),
    Enum(EnumDataSchema),
    Fixed(FixedDataSchema),
    Array(ArrayDataSchema),
    Map(MapDataSchema),
    Union(UnionDataSchema),
    Typeref(TyperefDataSchema),
}

/// Record with ordered fields and optionally included records.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordDataSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    /// Records whose fields are spliced in ahead of this record's own fields.
    pub include: Vec<SchemaRef>,
    pub fields: Vec<Field>,
    pub properties: Properties,
}

impl RecordDataSchema {
    pub fn new(name: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            doc: None,
            include: Vec::new(),
            fields,
            properties: Properties::new(),
        }
    }

    pub fn with_namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn with_include(mut self, include: Vec<SchemaRef>) -> Self {
        self.include = include;
        self
    }

    pub fn fullname(&self) -> String {
        fullname(&self.name, self.namespace.as_deref())
    }
}

/// A record field.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    pub name: String,
    pub schema: SchemaRef,
    pub optional: bool,
    /// Default value in native JSON form.
    pub default: Option<Value>,
    pub order: FieldOrder,
    pub doc: Option<String>,
    pub properties: Properties,
}

impl Field {
    pub fn new(name: impl Into<String>, schema: SchemaRef) -> Self {
        Self {
            name: name.into(),
            schema,
            optional: false,
            default: None,
            order: FieldOrder::Ascending,
            doc: None,
            properties: Properties::new(),
        }
    }

    /// Mark the field optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn with_default(mut self, default: Value) -> Self {
        self.default = Some(default);
        self
    }

    pub fn with_property(mut self, key: impl Into<String>, value: Value) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    /// The default, treating an explicit JSON `null` as absent.
    pub fn non_null_default(&self) -> Option<&Value> {
        self.default.as_ref().filter(|d| !d.is_null())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumDataSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub symbols: Vec<String>,
    pub symbol_docs: IndexMap<String, String>,
    pub properties: Properties,
}

impl EnumDataSchema {
    pub fn new(name: impl Into<String>, symbols: Vec<String>) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            doc: None,
            symbols,
            symbol_docs: IndexMap::new(),
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
}

#[derive(Debug, Clone, PartialEq)]
pub struct FixedDataSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub size: usize,
    pub properties: Properties,
}

impl FixedDataSchema {
    pub fn new(name: impl Into<String>, size: usize) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            doc: None,
            size,
            properties: Properties::new(),
        }
    }

    pub fn fullname(&self) -> String {
        fullname(&self.name, self.namespace.as_deref())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ArrayDataSchema {
    pub items: SchemaRef,
    pub properties: Properties,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MapDataSchema {
    pub values: SchemaRef,
    pub properties: Properties,
}

/// Union member, optionally addressed by an alias instead of its type.
#[derive(Debug, Clone, PartialEq)]
pub struct UnionMember {
    pub schema: SchemaRef,
    pub alias: Option<String>,
}

impl UnionMember {
    pub fn new(schema: SchemaRef) -> Self {
        Self {
            schema,
            alias: None,
        }
    }

    pub fn aliased(schema: SchemaRef, alias: impl Into<String>) -> Self {
        Self {
            schema,
            alias: Some(alias.into()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnionDataSchema {
    pub members: Vec<UnionMember>,
}

impl UnionDataSchema {
    /// True if any member carries an alias.
    pub fn has_aliases(&self) -> bool {
        self.members.iter().any(|m| m.alias.is_some())
    }
}

/// A named alias for another type, carrying its own properties.
#[derive(Debug, Clone, PartialEq)]
pub struct TyperefDataSchema {
    pub name: String,
    pub namespace: Option<String>,
    pub doc: Option<String>,
    pub referenced: SchemaRef,
    pub properties: Properties,
}

impl TyperefDataSchema {
    pub fn new(name: impl Into<String>, referenced: SchemaRef) -> Self {
        Self {
            name: name.into(),
            namespace: None,
            doc: None,
            referenced,
            properties: Properties::new(),
        }
    }

    pub fn fullname(&self) -> String {
        fullname(&self.name, self.namespace.as_deref())
    }
}

impl DataSchema {
    /// Full name of a named schema (record, enum, fixed, typeref).
    pub fn fullname(&self) -> Option<String> {
        match self {
            DataSchema::Record(r) => Some(r.fullname()),
            DataSchema::Enum(e) => Some(e.fullname()),
            DataSchema::Fixed(f) => Some(f.fullname()),
            DataSchema::Typeref(t) => Some(t.fullname()),
            _ => None,
        }
    }

    /// Type name as written in schema documents.
    pub fn type_name(&self) -> &'static str {
        match self {
            DataSchema::Primitive(p) => p.name(),
            DataSchema::Record(_) => "record",
            DataSchema::Enum(_) => "enum",
            DataSchema::Fixed(_) => "fixed",
            DataSchema::Array(_) => "array",
            DataSchema::Map(_) => "map",
            DataSchema::Union(_) => "union",
            DataSchema::Typeref(_) => "typeref",
        }
    }

    pub fn properties(&self) -> Option<&Properties> {
        match self {
            DataSchema::Record(r) => Some(&r.properties),
            DataSchema::Enum(e) => Some(&e.properties),
            DataSchema::Fixed(f) => Some(&f.properties),
            DataSchema::Array(a) => Some(&a.properties),
            DataSchema::Map(m) => Some(&m.properties),
            DataSchema::Typeref(t) => Some(&t.properties),
            DataSchema::Primitive(_) | DataSchema::Union(_) => None,
        }
    }
}

/// Owner of all native schema nodes of one translation unit.
#[derive(Debug, Clone, Default)]
pub struct DataSchemaArena {
    nodes: Vec<DataSchema>,
}

impl DataSchemaArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node and return its reference.
    pub fn add(&mut self, schema: DataSchema) -> SchemaRef {
        self.nodes.push(schema);
        SchemaRef(self.nodes.len() - 1)
    }

    /// Shorthand for adding a primitive node.
    pub fn primitive(&mut self, primitive: PrimitiveType) -> SchemaRef {
        self.add(DataSchema::Primitive(primitive))
    }

    /// Reserve a slot for a node that refers to itself. The slot holds a
    /// placeholder until `define` is called.
    pub fn reserve(&mut self) -> SchemaRef {
        self.add(DataSchema::Primitive(PrimitiveType::Null))
    }

    /// Fill a slot obtained from `reserve`.
    pub fn define(&mut self, id: SchemaRef, schema: DataSchema) {
        self.nodes[id.0] = schema;
    }

    pub fn get(&self, id: SchemaRef) -> Option<&DataSchema> {
        self.nodes.get(id.0)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Follow typerefs until a non-typeref node is reached.
    pub fn dereference(&self, mut id: SchemaRef) -> SchemaRef {
        // A typeref chain longer than the arena can only be a cycle
        for _ in 0..=self.nodes.len() {
            match &self[id] {
                DataSchema::Typeref(t) => id = t.referenced,
                _ => return id,
            }
        }
        id
    }

    /// All fields of a record: included records' fields first, in include
    /// order, then the record's own fields.
    pub fn all_fields(&self, id: SchemaRef) -> Vec<&Field> {
        let mut fields = Vec::new();
        let mut visiting = Vec::new();
        self.collect_fields(id, &mut fields, &mut visiting);
        fields
    }

    fn collect_fields<'a>(
        &'a self,
        id: SchemaRef,
        out: &mut Vec<&'a Field>,
        visiting: &mut Vec<SchemaRef>,
    ) {
        let id = self.dereference(id);
        if visiting.contains(&id) {
            return;
        }
        if let DataSchema::Record(record) = &self[id] {
            visiting.push(id);
            for include in &record.include {
                self.collect_fields(*include, out, visiting);
            }
            for field in &record.fields {
                if let Some(pos) = out.iter().position(|f| f.name == field.name) {
                    out[pos] = field;
                } else {
                    out.push(field);
                }
            }
            visiting.pop();
        }
    }

    /// Key of a union member: its alias, else the member's full name for
    /// named types and typerefs, else its type name.
    pub fn member_key(&self, member: &UnionMember) -> String {
        if let Some(alias) = &member.alias {
            return alias.clone();
        }
        let schema = &self[member.schema];
        schema
            .fullname()
            .unwrap_or_else(|| schema.type_name().to_string())
    }

    /// Find a union member by key.
    pub fn find_member<'a>(&self, union: &'a UnionDataSchema, key: &str) -> Option<&'a UnionMember> {
        union.members.iter().find(|m| self.member_key(m) == key)
    }

    /// Borrow a node together with this arena.
    pub fn node(&self, id: SchemaRef) -> DataSchemaNode<'_> {
        DataSchemaNode { arena: self, id }
    }
}

impl std::ops::Index<SchemaRef> for DataSchemaArena {
    type Output = DataSchema;

    fn index(&self, id: SchemaRef) -> &DataSchema {
        &self.nodes[id.0]
    }
}

/// A schema node paired with the arena that owns it.
#[derive(Debug, Clone, Copy)]
pub struct DataSchemaNode<'a> {
    pub arena: &'a DataSchemaArena,
    pub id: SchemaRef,
}

impl<'a> DataSchemaNode<'a> {
    pub fn schema(&self) -> &'a DataSchema {
        &self.arena[self.id]
    }

    /// The node with typerefs followed.
    pub fn dereferenced(&self) -> DataSchemaNode<'a> {
        DataSchemaNode {
            arena: self.arena,
            id: self.arena.dereference(self.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_referential_record() {
        let mut arena = DataSchemaArena::new();
        let foo = arena.reserve();
        let record = RecordDataSchema::new("foo", vec![Field::new("bar", foo).optional()]);
        arena.define(foo, DataSchema::Record(record));

        let fields = arena.all_fields(foo);
        assert_eq!(fields.len(), 1);
        assert_eq!(fields[0].schema, foo);
    }

    #[test]
    fn test_dereference_typeref_chain() {
        let mut arena = DataSchemaArena::new();
        let int = arena.primitive(PrimitiveType::Int);
        let inner = arena.add(DataSchema::Typeref(TyperefDataSchema::new("Inner", int)));
        let outer = arena.add(DataSchema::Typeref(TyperefDataSchema::new("Outer", inner)));
        assert_eq!(arena.dereference(outer), int);
        assert_eq!(arena.dereference(int), int);
    }

    #[test]
    fn test_included_fields_come_first() {
        let mut arena = DataSchemaArena::new();
        let int = arena.primitive(PrimitiveType::Int);
        let base = arena.add(DataSchema::Record(RecordDataSchema::new(
            "Base",
            vec![Field::new("id", int)],
        )));
        let derived = arena.add(DataSchema::Record(
            RecordDataSchema::new("Derived", vec![Field::new("count", int)]).with_include(vec![base]),
        ));
        let names: Vec<&str> = arena
            .all_fields(derived)
            .iter()
            .map(|f| f.name.as_str())
            .collect();
        assert_eq!(names, vec!["id", "count"]);
    }

    #[test]
    fn test_member_keys() {
        let mut arena = DataSchemaArena::new();
        let string = arena.primitive(PrimitiveType::String);
        let fixed = arena.add(DataSchema::Fixed(FixedDataSchema {
            namespace: Some("a.b".into()),
            ..FixedDataSchema::new("Md5", 16)
        }));
        assert_eq!(arena.member_key(&UnionMember::new(string)), "string");
        assert_eq!(arena.member_key(&UnionMember::new(fixed)), "a.b.Md5");
        assert_eq!(
            arena.member_key(&UnionMember::aliased(string, "success")),
            "success"
        );
    }
}
