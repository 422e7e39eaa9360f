//! Field default translation.
//!
//! An Avro union default must be a value of the union's first branch, so
//! translating a native default means knowing the branch order of every
//! union the value passes through. That order is fully determined by the
//! native field and the `OptionalDefaultMode`, which lets defaults be
//! translated from the native schema alone, even while the Avro record a
//! default refers to is still being built.

use serde_json::{Map, Value};

use crate::data::{latin1_bytes, DataSchema, DataSchemaArena, Field, PrimitiveType, SchemaRef, UnionDataSchema};
use crate::error::TranslationError;
use crate::translate::alias_union::{DISCRIMINATOR_FIELD, NULL_DISCRIMINATOR};
use crate::translate::OptionalDefaultMode;

/// One branch of a field's Avro union, in Avro order.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Branch {
    Null,
    /// A non-null member of the field's native union
    Member { schema: SchemaRef, key: String },
    /// The whole type of an optional field whose type is not a union
    Whole(SchemaRef),
}

/// The Avro type layout of a record field.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum FieldShape {
    /// The field's type translated as is
    Plain,
    Union(Vec<Branch>),
}

pub(crate) struct DefaultTranslator<'a> {
    arena: &'a DataSchemaArena,
    mode: OptionalDefaultMode,
    /// Required fields whose own default is being unfolded
    unfolding: Vec<(SchemaRef, String)>,
}

impl<'a> DefaultTranslator<'a> {
    pub fn new(arena: &'a DataSchemaArena, mode: OptionalDefaultMode) -> Self {
        Self {
            arena,
            mode,
            unfolding: Vec::new(),
        }
    }

    /// The field's type as a plain (non-aliased) native union, if it is one.
    pub fn native_union(&self, schema: SchemaRef) -> Option<&'a UnionDataSchema> {
        let arena = self.arena;
        match &arena[arena.dereference(schema)] {
            DataSchema::Union(u) if !u.has_aliases() => Some(u),
            _ => None,
        }
    }

    fn member_branches(&self, union: &UnionDataSchema) -> Vec<Branch> {
        union
            .members
            .iter()
            .map(|member| {
                let target = self.arena.dereference(member.schema);
                match &self.arena[target] {
                    DataSchema::Primitive(PrimitiveType::Null) => Branch::Null,
                    _ => Branch::Member {
                        schema: member.schema,
                        key: self.arena.member_key(member),
                    },
                }
            })
            .collect()
    }

    /// Compute the Avro union layout of a field.
    ///
    /// Optional fields get a null branch, first unless the mode keeps a
    /// default, in which case the default's branch leads and null goes
    /// last. A native union that already holds null is not wrapped again.
    /// Under `TranslateDefault` a required union field's default branch is
    /// moved to the front as well.
    pub fn field_shape(&self, field: &Field, path: &str) -> Result<FieldShape, TranslationError> {
        let union = self.native_union(field.schema);

        if !field.optional {
            let Some(union) = union else {
                return Ok(FieldShape::Plain);
            };
            let mut branches = self.member_branches(union);
            if let (OptionalDefaultMode::TranslateDefault, Some(default)) = (self.mode, &field.default) {
                let selected = self.select_branch(&branches, default, true, path)?;
                let branch = branches.remove(selected);
                branches.insert(0, branch);
            }
            return Ok(FieldShape::Union(branches));
        }

        let mut branches = match union {
            Some(union) => self
                .member_branches(union)
                .into_iter()
                .filter(|b| *b != Branch::Null)
                .collect(),
            None => vec![Branch::Whole(field.schema)],
        };
        match (self.mode, field.non_null_default()) {
            (OptionalDefaultMode::TranslateDefault, Some(default)) => {
                let selected = self.select_branch(&branches, default, union.is_some(), path)?;
                let branch = branches.remove(selected);
                branches.insert(0, branch);
                branches.push(Branch::Null);
            }
            _ => branches.insert(0, Branch::Null),
        }
        Ok(FieldShape::Union(branches))
    }

    /// The Avro default of a field, if it has one.
    pub fn field_default(&mut self, field: &Field, path: &str) -> Result<Option<Value>, TranslationError> {
        match self.field_shape(field, path)? {
            FieldShape::Plain => field
                .default
                .as_ref()
                .map(|d| self.value(d, field.schema, path))
                .transpose(),
            FieldShape::Union(branches) if field.optional => {
                match (self.mode, field.non_null_default()) {
                    (OptionalDefaultMode::TranslateDefault, Some(default)) => {
                        Ok(Some(self.branch_value(&branches[0], default, path)?))
                    }
                    _ => Ok(Some(Value::Null)),
                }
            }
            FieldShape::Union(branches) => field
                .default
                .as_ref()
                .map(|d| self.first_branch_value(&branches, d, true, path))
                .transpose(),
        }
    }

    fn select_branch(
        &self,
        branches: &[Branch],
        value: &Value,
        union_typed: bool,
        path: &str,
    ) -> Result<usize, TranslationError> {
        let found = if value.is_null() {
            branches.iter().position(|b| *b == Branch::Null)
        } else if union_typed {
            let key = single_key(value).ok_or_else(|| TranslationError::DefaultValue {
                path: path.to_string(),
                reason: format!("union value must be null or a single-entry map, found {}", value),
            })?;
            let found = branches
                .iter()
                .position(|b| matches!(b, Branch::Member { key: k, .. } if k == key));
            if found.is_none() {
                return Err(TranslationError::DefaultValue {
                    path: path.to_string(),
                    reason: format!("'{}' is not a member of the union", key),
                });
            }
            found
        } else {
            branches.iter().position(|b| matches!(b, Branch::Whole(_)))
        };
        found.ok_or_else(|| TranslationError::DefaultValue {
            path: path.to_string(),
            reason: format!("{} does not match any member of the union", value),
        })
    }

    fn branch_label(&self, branch: &Branch) -> String {
        match branch {
            Branch::Null => "null".to_string(),
            Branch::Member { key, .. } => key.clone(),
            Branch::Whole(schema) => {
                let schema = &self.arena[*schema];
                schema
                    .fullname()
                    .unwrap_or_else(|| schema.type_name().to_string())
            }
        }
    }

    fn branch_value(&mut self, branch: &Branch, value: &Value, path: &str) -> Result<Value, TranslationError> {
        match branch {
            Branch::Null => Ok(Value::Null),
            Branch::Member { schema, key } => {
                let inner = value.get(key).ok_or_else(|| TranslationError::DefaultValue {
                    path: path.to_string(),
                    reason: format!("expected a value for union member '{}'", key),
                })?;
                self.value(inner, *schema, path)
            }
            Branch::Whole(schema) => self.value(value, *schema, path),
        }
    }

    /// Translate a value that must select the first branch.
    fn first_branch_value(
        &mut self,
        branches: &[Branch],
        value: &Value,
        union_typed: bool,
        path: &str,
    ) -> Result<Value, TranslationError> {
        let selected = self.select_branch(branches, value, union_typed, path)?;
        if selected != 0 {
            return Err(TranslationError::UnionDefaultOrder {
                path: path.to_string(),
                member: self.branch_label(&branches[selected]),
            });
        }
        self.branch_value(&branches[0], value, path)
    }

    /// Translate a native value of `schema` into its Avro default form.
    fn value(&mut self, value: &Value, schema: SchemaRef, path: &str) -> Result<Value, TranslationError> {
        let arena = self.arena;
        let id = arena.dereference(schema);
        let invalid = |reason: String| TranslationError::DefaultValue {
            path: path.to_string(),
            reason,
        };

        match &arena[id] {
            DataSchema::Primitive(p) => {
                if primitive_accepts(*p, value) {
                    Ok(value.clone())
                } else {
                    Err(invalid(format!("{} is not a valid {}", value, p.name())))
                }
            }
            DataSchema::Enum(e) => match value.as_str() {
                Some(symbol) if e.symbols.iter().any(|s| s == symbol) => Ok(value.clone()),
                _ => Err(invalid(format!("{} is not a symbol of enum '{}'", value, e.fullname()))),
            },
            DataSchema::Fixed(f) => match value.as_str().map(latin1_bytes) {
                Some(Ok(bytes)) if bytes.len() == f.size => Ok(value.clone()),
                _ => Err(invalid(format!(
                    "{} is not a {}-byte value of fixed '{}'",
                    value,
                    f.size,
                    f.fullname()
                ))),
            },
            DataSchema::Array(a) => {
                let items = value
                    .as_array()
                    .ok_or_else(|| invalid(format!("expected an array, found {}", value)))?;
                items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.value(item, a.items, &format!("{}/{}", path, i)))
                    .collect::<Result<Vec<_>, _>>()
                    .map(Value::Array)
            }
            DataSchema::Map(m) => {
                let entries = value
                    .as_object()
                    .ok_or_else(|| invalid(format!("expected a map, found {}", value)))?;
                let mut out = Map::new();
                for (key, entry) in entries {
                    out.insert(key.clone(), self.value(entry, m.values, &format!("{}/{}", path, key))?);
                }
                Ok(Value::Object(out))
            }
            DataSchema::Record(_) => self.record(id, value, path),
            DataSchema::Union(u) if u.has_aliases() => self.aliased_union(u, value, path),
            DataSchema::Union(u) => {
                let branches = self.member_branches(u);
                self.first_branch_value(&branches, value, true, path)
            }
            DataSchema::Typeref(t) => Err(invalid(format!(
                "typeref '{}' does not resolve to a type",
                t.fullname()
            ))),
        }
    }

    fn record(&mut self, id: SchemaRef, value: &Value, path: &str) -> Result<Value, TranslationError> {
        let arena = self.arena;
        let obj = value.as_object().ok_or_else(|| TranslationError::DefaultValue {
            path: path.to_string(),
            reason: format!("expected a record, found {}", value),
        })?;
        let fields = arena.all_fields(id);
        if let Some(unknown) = obj.keys().find(|k| !fields.iter().any(|f| &f.name == *k)) {
            return Err(TranslationError::DefaultValue {
                path: path.to_string(),
                reason: format!("'{}' is not a field of the record", unknown),
            });
        }

        let mut out = Map::new();
        for field in fields {
            let field_path = format!("{}/{}", path, field.name);
            let shape = self.field_shape(field, &field_path)?;
            let present = obj
                .get(&field.name)
                .filter(|v| !(field.optional && v.is_null()));

            let translated = match (present, &shape) {
                (Some(v), FieldShape::Plain) => self.value(v, field.schema, &field_path)?,
                (Some(v), FieldShape::Union(branches)) => {
                    let union_typed = self.native_union(field.schema).is_some();
                    self.first_branch_value(branches, v, union_typed, &field_path)?
                }
                (None, FieldShape::Union(branches)) if field.optional => match branches[0] {
                    Branch::Null => Value::Null,
                    _ => {
                        return Err(TranslationError::InconsistentDefault {
                            path: field_path,
                            reason: "the field is absent here but has its own default, which the Avro union lists before null".to_string(),
                        })
                    }
                },
                (None, _) => self.unfold_own_default(id, field, &field_path)?,
            };
            out.insert(field.name.clone(), translated);
        }
        Ok(Value::Object(out))
    }

    /// Fill an absent required field from its own default.
    fn unfold_own_default(&mut self, record: SchemaRef, field: &Field, path: &str) -> Result<Value, TranslationError> {
        let key = (record, field.name.clone());
        if self.unfolding.contains(&key) {
            return Err(TranslationError::InconsistentDefault {
                path: path.to_string(),
                reason: "the default unfolds through its own record without end".to_string(),
            });
        }
        if field.default.is_none() {
            return Err(TranslationError::DefaultValue {
                path: path.to_string(),
                reason: "required field is missing and has no default of its own".to_string(),
            });
        }

        self.unfolding.push(key);
        let result = self.field_default(field, path);
        self.unfolding.pop();
        result?.ok_or_else(|| TranslationError::DefaultValue {
            path: path.to_string(),
            reason: "required field is missing and has no default of its own".to_string(),
        })
    }

    /// An aliased union becomes a record whose alias fields are `[null, T]`,
    /// so only the null selection can be expressed as a default.
    fn aliased_union(&self, union: &UnionDataSchema, value: &Value, path: &str) -> Result<Value, TranslationError> {
        if let Some(alias) = single_key(value) {
            if !union.members.iter().any(|m| m.alias.as_deref() == Some(alias)) {
                return Err(TranslationError::DefaultValue {
                    path: path.to_string(),
                    reason: format!("'{}' is not an alias of the union", alias),
                });
            }
            return Err(TranslationError::UnionDefaultOrder {
                path: format!("{}/{}", path, alias),
                member: alias.to_string(),
            });
        }

        let has_null = union.members.iter().any(|m| {
            matches!(
                self.arena[self.arena.dereference(m.schema)],
                DataSchema::Primitive(PrimitiveType::Null)
            )
        });
        if !value.is_null() || !has_null {
            return Err(TranslationError::DefaultValue {
                path: path.to_string(),
                reason: format!("{} does not select a member of the aliased union", value),
            });
        }

        let mut out = Map::new();
        for alias in union.members.iter().filter_map(|m| m.alias.as_ref()) {
            out.insert(alias.clone(), Value::Null);
        }
        out.insert(
            DISCRIMINATOR_FIELD.to_string(),
            Value::String(NULL_DISCRIMINATOR.to_string()),
        );
        Ok(Value::Object(out))
    }
}

fn single_key(value: &Value) -> Option<&str> {
    match value.as_object() {
        Some(obj) if obj.len() == 1 => obj.keys().next().map(String::as_str),
        _ => None,
    }
}

fn primitive_accepts(primitive: PrimitiveType, value: &Value) -> bool {
    match primitive {
        PrimitiveType::Null => value.is_null(),
        PrimitiveType::Boolean => value.is_boolean(),
        PrimitiveType::Int => value.as_i64().map_or(false, |i| i32::try_from(i).is_ok()),
        PrimitiveType::Long => value.as_i64().is_some(),
        PrimitiveType::Float | PrimitiveType::Double => value.is_number(),
        PrimitiveType::String => value.is_string(),
        PrimitiveType::Bytes => value.as_str().map_or(false, |s| latin1_bytes(s).is_ok()),
    }
}
