use std::fmt;
use std::sync::Arc;

use crate::codec::AvroAdapter;
use crate::convert::CustomTranslatorFactory;

/// Options for value translation.
#[derive(Clone, Default)]
pub struct DataTranslationOptions {
    /// Builds the translators named by `avro` override properties
    pub override_factory: Option<Arc<dyn CustomTranslatorFactory>>,
    /// Codec adapter to use instead of the process-wide one
    pub adapter: Option<Arc<dyn AvroAdapter>>,
}

impl DataTranslationOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_override_factory(mut self, factory: Arc<dyn CustomTranslatorFactory>) -> Self {
        self.override_factory = Some(factory);
        self
    }

    pub fn with_adapter(mut self, adapter: Arc<dyn AvroAdapter>) -> Self {
        self.adapter = Some(adapter);
        self
    }
}

impl fmt::Debug for DataTranslationOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DataTranslationOptions")
            .field("override_factory", &self.override_factory.is_some())
            .field("adapter", &self.adapter.as_ref().map(|a| a.name().to_string()))
            .finish()
    }
}
