//! Custom translator overrides declared on native schemas.
//!
//! A native node can replace both its Avro schema and the way its values
//! are translated by carrying an `avro` property:
//!
//! ```json
//! "avro": {
//!   "schema": {"type": "fixed", "name": "Uuid", "namespace": "com.example", "size": 16},
//!   "translator": {"class": "com.example.UuidTranslator"}
//! }
//! ```
//!
//! Translator classes are looked up by name in a `CustomTranslatorFactory`
//! supplied by the host application.

use std::collections::HashMap;
use std::fmt;

use serde_json::Value;
use tracing::debug;

use crate::codec::AvroValue;
use crate::convert::TranslationContext;
use crate::data::{DataSchema, DataSchemaArena, DataSchemaNode, DataValue, SchemaRef};
use crate::error::{ClassLookupError, OverrideError};
use crate::schema::{fullname, AvroSchema, Properties};

/// Property key declaring an override.
pub const OVERRIDE_PROPERTY: &str = "avro";

const SCHEMA_KEY: &str = "schema";
const TRANSLATOR_KEY: &str = "translator";
const CLASS_KEY: &str = "class";

/// Translates the values of one overridden schema in both directions.
///
/// Returning `None` means the value could not be translated; the reason
/// should be recorded with `ctx.add_message`.
pub trait CustomDataTranslator: Send + Sync {
    fn data_to_avro(
        &self,
        ctx: &mut TranslationContext,
        value: &DataValue,
        native: DataSchemaNode<'_>,
        wire: &AvroSchema,
    ) -> Option<AvroValue>;

    fn avro_to_data(
        &self,
        ctx: &mut TranslationContext,
        value: &AvroValue,
        native: DataSchemaNode<'_>,
        wire: &AvroSchema,
    ) -> Option<DataValue>;
}

/// Builds custom translators by class name.
pub trait CustomTranslatorFactory: Send + Sync {
    fn create(&self, class_name: &str) -> Result<Box<dyn CustomDataTranslator>, ClassLookupError>;
}

type TranslatorConstructor = Box<dyn Fn() -> Box<dyn CustomDataTranslator> + Send + Sync>;

/// A `CustomTranslatorFactory` backed by registered constructors.
#[derive(Default)]
pub struct TranslatorRegistry {
    constructors: HashMap<String, TranslatorConstructor>,
}

impl TranslatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a translator type under `class_name`.
    pub fn register<T>(&mut self, class_name: impl Into<String>) -> &mut Self
    where
        T: CustomDataTranslator + Default + 'static,
    {
        self.register_with(class_name, || Box::new(T::default()))
    }

    pub fn register_with<F>(&mut self, class_name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn CustomDataTranslator> + Send + Sync + 'static,
    {
        self.constructors
            .insert(class_name.into(), Box::new(constructor));
        self
    }
}

impl fmt::Debug for TranslatorRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.constructors.keys().collect();
        names.sort();
        f.debug_struct("TranslatorRegistry")
            .field("classes", &names)
            .finish()
    }
}

impl CustomTranslatorFactory for TranslatorRegistry {
    fn create(&self, class_name: &str) -> Result<Box<dyn CustomDataTranslator>, ClassLookupError> {
        self.constructors
            .get(class_name)
            .map(|constructor| constructor())
            .ok_or(ClassLookupError::NotFound)
    }
}

/// A parsed `avro` override property.
#[derive(Debug, Clone, PartialEq)]
pub struct AvroOverride {
    /// Name of the native schema declaring the override
    pub owner: String,
    /// Substitute Avro schema, as JSON
    pub schema: Value,
    /// Full name of the substitute schema
    pub avro_schema_full_name: String,
    pub translator_class: String,
}

impl AvroOverride {
    /// Read the override declared in `properties`, if any.
    pub fn from_properties(owner: &str, properties: &Properties) -> Result<Option<Self>, OverrideError> {
        let Some(declared) = properties.get(OVERRIDE_PROPERTY) else {
            return Ok(None);
        };
        let invalid = |message: &str| OverrideError::Invalid {
            schema: owner.to_string(),
            message: message.to_string(),
        };

        let declared = declared
            .as_object()
            .ok_or_else(|| invalid("override must be a map"))?;
        let (schema, translator) = match (declared.get(SCHEMA_KEY), declared.get(TRANSLATOR_KEY)) {
            (Some(schema), Some(translator)) => (schema, translator),
            (None, None) => return Err(invalid("override needs both 'schema' and 'translator'")),
            (Some(_), None) => return Err(invalid("'schema' is declared without a 'translator'")),
            (None, Some(_)) => return Err(invalid("'translator' is declared without a 'schema'")),
        };

        let schema_obj = schema
            .as_object()
            .ok_or_else(|| invalid("'schema' must be an Avro schema map"))?;
        let name = schema_obj
            .get("name")
            .and_then(Value::as_str)
            .filter(|name| !name.is_empty())
            .ok_or_else(|| invalid("'schema' has no name"))?;
        let namespace = match schema_obj.get("namespace") {
            None | Some(Value::Null) => None,
            Some(Value::String(ns)) => Some(ns.as_str()),
            Some(_) => return Err(invalid("'schema' namespace must be a string")),
        };

        let translator_class = translator
            .as_object()
            .ok_or_else(|| invalid("'translator' must be a map"))?
            .get(CLASS_KEY)
            .and_then(Value::as_str)
            .filter(|class| !class.is_empty())
            .ok_or_else(|| invalid("'translator' has no class"))?;

        Ok(Some(Self {
            owner: owner.to_string(),
            schema: schema.clone(),
            avro_schema_full_name: fullname(name, namespace),
            translator_class: translator_class.to_string(),
        }))
    }

    /// Construct the declared translator.
    pub fn instantiate(
        &self,
        factory: Option<&dyn CustomTranslatorFactory>,
    ) -> Result<Box<dyn CustomDataTranslator>, OverrideError> {
        let instantiation = |message: String| OverrideError::Instantiation {
            schema: self.owner.clone(),
            class_name: self.translator_class.clone(),
            message,
        };
        let factory = factory.ok_or_else(|| instantiation("no translator factory is configured".to_string()))?;
        let translator = factory
            .create(&self.translator_class)
            .map_err(|e| instantiation(e.to_string()))?;
        debug!(
            owner = %self.owner,
            class = %self.translator_class,
            "instantiated custom translator"
        );
        Ok(translator)
    }
}

/// The node declaring an override for `id`: the outermost node of its
/// typeref chain carrying the property.
pub(crate) fn override_owner(arena: &DataSchemaArena, id: SchemaRef) -> Option<SchemaRef> {
    let mut current = id;
    for _ in 0..=arena.len() {
        let schema = &arena[current];
        if schema
            .properties()
            .map_or(false, |props| props.contains_key(OVERRIDE_PROPERTY))
        {
            return Some(current);
        }
        match schema {
            DataSchema::Typeref(t) => current = t.referenced,
            _ => return None,
        }
    }
    None
}

/// Parse the override declared on `owner`.
pub(crate) fn override_at(arena: &DataSchemaArena, owner: SchemaRef) -> Result<Option<AvroOverride>, OverrideError> {
    let schema = &arena[owner];
    let name = schema
        .fullname()
        .unwrap_or_else(|| schema.type_name().to_string());
    match schema.properties() {
        Some(props) => AvroOverride::from_properties(&name, props),
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Passthrough;

    impl CustomDataTranslator for Passthrough {
        fn data_to_avro(
            &self,
            _ctx: &mut TranslationContext,
            _value: &DataValue,
            _native: DataSchemaNode<'_>,
            _wire: &AvroSchema,
        ) -> Option<AvroValue> {
            Some(AvroValue::Null)
        }

        fn avro_to_data(
            &self,
            _ctx: &mut TranslationContext,
            _value: &AvroValue,
            _native: DataSchemaNode<'_>,
            _wire: &AvroSchema,
        ) -> Option<DataValue> {
            Some(DataValue::Null)
        }
    }

    fn props(value: Value) -> Properties {
        let mut props = Properties::new();
        props.insert(OVERRIDE_PROPERTY.to_string(), value);
        props
    }

    #[test]
    fn test_parse_override() {
        let declared = props(json!({
            "schema": {"type": "fixed", "name": "Uuid", "namespace": "com.example", "size": 16},
            "translator": {"class": "UuidTranslator"}
        }));
        let parsed = AvroOverride::from_properties("Id", &declared).unwrap().unwrap();
        assert_eq!(parsed.avro_schema_full_name, "com.example.Uuid");
        assert_eq!(parsed.translator_class, "UuidTranslator");
        assert!(AvroOverride::from_properties("Id", &Properties::new()).unwrap().is_none());
    }

    #[test]
    fn test_half_declared_override_is_invalid() {
        let declared = props(json!({"schema": {"type": "fixed", "name": "Uuid", "size": 16}}));
        assert!(matches!(
            AvroOverride::from_properties("Id", &declared),
            Err(OverrideError::Invalid { .. })
        ));
        let declared = props(json!({"schema": {"type": "fixed", "size": 16}, "translator": {"class": "X"}}));
        assert!(matches!(
            AvroOverride::from_properties("Id", &declared),
            Err(OverrideError::Invalid { .. })
        ));
    }

    #[test]
    fn test_instantiation() {
        let declared = props(json!({
            "schema": {"type": "fixed", "name": "Uuid", "size": 16},
            "translator": {"class": "Passthrough"}
        }));
        let parsed = AvroOverride::from_properties("Id", &declared).unwrap().unwrap();

        let mut registry = TranslatorRegistry::new();
        assert!(matches!(
            parsed.instantiate(Some(&registry)),
            Err(OverrideError::Instantiation { .. })
        ));
        assert!(matches!(
            parsed.instantiate(None),
            Err(OverrideError::Instantiation { .. })
        ));
        registry.register::<Passthrough>("Passthrough");
        assert!(parsed.instantiate(Some(&registry)).is_ok());
    }
}
