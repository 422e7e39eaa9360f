//! Schema translation options.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use crate::convert::CustomTranslatorFactory;
use crate::data::NamedSchemaResolver;

/// How an optional field's default is carried into the Avro union.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OptionalDefaultMode {
    /// Keep the default: the default's branch goes first and null last.
    #[default]
    TranslateDefault,
    /// Drop the default: null goes first and the Avro default is `null`.
    TranslateToNull,
}

impl OptionalDefaultMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OptionalDefaultMode::TranslateDefault => "TRANSLATE_DEFAULT",
            OptionalDefaultMode::TranslateToNull => "TRANSLATE_TO_NULL",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "TRANSLATE_DEFAULT" => Some(OptionalDefaultMode::TranslateDefault),
            "TRANSLATE_TO_NULL" => Some(OptionalDefaultMode::TranslateToNull),
            _ => None,
        }
    }
}

impl fmt::Display for OptionalDefaultMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether the native schema is embedded in the translated Avro schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EmbedSchemaMode {
    #[default]
    None,
    /// Embed the whole native schema on the translated root.
    RootOnly,
}

/// Options for native to Avro schema translation.
#[derive(Clone, Default)]
pub struct DataToAvroSchemaOptions {
    pub optional_default_mode: OptionalDefaultMode,
    pub embed_mode: EmbedSchemaMode,
    /// Prefix every translated namespace with `avro.`
    pub override_namespace: bool,
    /// Typeref property keys that are not carried onto the Avro schema
    pub typeref_properties_exclude: HashSet<String>,
    /// When set, override translator classes are instantiated during schema
    /// translation so misconfiguration surfaces early.
    pub override_factory: Option<Arc<dyn CustomTranslatorFactory>>,
}

impl DataToAvroSchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_optional_default_mode(mut self, mode: OptionalDefaultMode) -> Self {
        self.optional_default_mode = mode;
        self
    }

    pub fn with_embed_mode(mut self, mode: EmbedSchemaMode) -> Self {
        self.embed_mode = mode;
        self
    }

    pub fn with_override_namespace(mut self, enabled: bool) -> Self {
        self.override_namespace = enabled;
        self
    }

    pub fn with_typeref_properties_exclude<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.typeref_properties_exclude = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_override_factory(mut self, factory: Arc<dyn CustomTranslatorFactory>) -> Self {
        self.override_factory = Some(factory);
        self
    }
}

impl fmt::Debug for DataToAvroSchemaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataToAvroSchemaOptions")
            .field("optional_default_mode", &self.optional_default_mode)
            .field("embed_mode", &self.embed_mode)
            .field("override_namespace", &self.override_namespace)
            .field("typeref_properties_exclude", &self.typeref_properties_exclude)
            .field("override_factory", &self.override_factory.is_some())
            .finish()
    }
}

/// What backward translation does with an embedded native schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AvroToDataSchemaMode {
    /// Always translate structurally; any embedded schema is ignored.
    #[default]
    Translate,
    /// Return the embedded schema when present, else translate.
    ReturnEmbeddedSchema,
    /// Require an embedded schema, translate it forward again and check the
    /// result against the Avro schema it came with.
    VerifyEmbeddedSchema,
}

/// Options for Avro to native schema translation.
#[derive(Clone, Default)]
pub struct AvroToDataSchemaOptions {
    pub mode: AvroToDataSchemaMode,
    /// Prefix every translated namespace with `avro.`
    pub override_namespace: bool,
    /// Resolves names the embedded native schema refers to but does not define
    pub resolver: Option<Arc<dyn NamedSchemaResolver>>,
}

impl AvroToDataSchemaOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mode(mut self, mode: AvroToDataSchemaMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_override_namespace(mut self, enabled: bool) -> Self {
        self.override_namespace = enabled;
        self
    }

    pub fn with_resolver(mut self, resolver: Arc<dyn NamedSchemaResolver>) -> Self {
        self.resolver = Some(resolver);
        self
    }
}

impl fmt::Debug for AvroToDataSchemaOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AvroToDataSchemaOptions")
            .field("mode", &self.mode)
            .field("override_namespace", &self.override_namespace)
            .field("resolver", &self.resolver.is_some())
            .finish()
    }
}
