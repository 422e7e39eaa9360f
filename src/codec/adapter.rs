//! Codec adapter selection.
//!
//! The adapter is picked by class name from an `AdapterRegistry`: an
//! explicitly configured adapter class wins, otherwise a chooser class is
//! instantiated and asked for the adapter. The process-wide adapter is
//! resolved once and cached, including a failed resolution.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::OnceCell;
use tracing::{debug, warn};

use crate::codec::{AvroAdapter, AvroAdapterChooser, DefaultAvroAdapter, DefaultAvroAdapterChooser};
use crate::error::{AdapterResolutionError, ClassLookupError};

/// Environment key naming the adapter class to use.
pub const ADAPTER_CLASS_ENV: &str = "PEGASUS_AVRO_ADAPTER";
/// Environment key naming the chooser class to use when no adapter is set.
pub const CHOOSER_CLASS_ENV: &str = "PEGASUS_AVRO_ADAPTER_CHOOSER";

/// Registered name of `DefaultAvroAdapter`.
pub const DEFAULT_ADAPTER_CLASS: &str = "pegasus_avro::codec::DefaultAvroAdapter";
/// Registered name of `DefaultAvroAdapterChooser`.
pub const DEFAULT_CHOOSER_CLASS: &str = "pegasus_avro::codec::DefaultAvroAdapterChooser";

static AVRO_ADAPTER: OnceCell<Result<Arc<dyn AvroAdapter>, AdapterResolutionError>> =
    OnceCell::new();

/// Adapter selection settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AdapterConfig {
    /// Adapter class to instantiate directly; takes priority over the chooser
    pub adapter_class: Option<String>,
    /// Chooser class consulted when no adapter class is set
    pub chooser_class: Option<String>,
}

impl AdapterConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read the selection keys from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the selection keys through `lookup`; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let read = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        Self {
            adapter_class: read(ADAPTER_CLASS_ENV),
            chooser_class: read(CHOOSER_CLASS_ENV),
        }
    }

    pub fn with_adapter_class(mut self, class_name: impl Into<String>) -> Self {
        self.adapter_class = Some(class_name.into());
        self
    }

    pub fn with_chooser_class(mut self, class_name: impl Into<String>) -> Self {
        self.chooser_class = Some(class_name.into());
        self
    }
}

type AdapterConstructor = Box<dyn Fn() -> Arc<dyn AvroAdapter> + Send + Sync>;
type ChooserConstructor = Box<dyn Fn() -> Box<dyn AvroAdapterChooser> + Send + Sync>;

enum RegisteredClass {
    Adapter(AdapterConstructor),
    Chooser(ChooserConstructor),
}

/// Named constructors for adapters and choosers.
pub struct AdapterRegistry {
    classes: HashMap<String, RegisteredClass>,
}

impl Default for AdapterRegistry {
    /// A registry knowing the built-in adapter and chooser.
    fn default() -> Self {
        let mut registry = Self::empty();
        registry
            .register_adapter(DEFAULT_ADAPTER_CLASS, || Arc::new(DefaultAvroAdapter::new()))
            .register_chooser(DEFAULT_CHOOSER_CLASS, || Box::new(DefaultAvroAdapterChooser));
        registry
    }
}

impl std::fmt::Debug for AdapterRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&String> = self.classes.keys().collect();
        names.sort();
        f.debug_struct("AdapterRegistry").field("classes", &names).finish()
    }
}

impl AdapterRegistry {
    /// A registry with nothing registered.
    pub fn empty() -> Self {
        Self {
            classes: HashMap::new(),
        }
    }

    pub fn register_adapter<F>(&mut self, class_name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Arc<dyn AvroAdapter> + Send + Sync + 'static,
    {
        self.classes
            .insert(class_name.into(), RegisteredClass::Adapter(Box::new(constructor)));
        self
    }

    pub fn register_chooser<F>(&mut self, class_name: impl Into<String>, constructor: F) -> &mut Self
    where
        F: Fn() -> Box<dyn AvroAdapterChooser> + Send + Sync + 'static,
    {
        self.classes
            .insert(class_name.into(), RegisteredClass::Chooser(Box::new(constructor)));
        self
    }

    fn new_adapter(&self, class_name: &str) -> Result<Arc<dyn AvroAdapter>, ClassLookupError> {
        match self.classes.get(class_name) {
            Some(RegisteredClass::Adapter(constructor)) => Ok(constructor()),
            Some(RegisteredClass::Chooser(_)) => Err(ClassLookupError::NotAssignable {
                expected: "AvroAdapter",
            }),
            None => Err(ClassLookupError::NotFound),
        }
    }

    fn new_chooser(&self, class_name: &str) -> Result<Box<dyn AvroAdapterChooser>, ClassLookupError> {
        match self.classes.get(class_name) {
            Some(RegisteredClass::Chooser(constructor)) => Ok(constructor()),
            Some(RegisteredClass::Adapter(_)) => Err(ClassLookupError::NotAssignable {
                expected: "AvroAdapterChooser",
            }),
            None => Err(ClassLookupError::NotFound),
        }
    }
}

/// Resolve an adapter from `config` without touching the process-wide cache.
pub fn resolve_adapter(
    config: &AdapterConfig,
    registry: &AdapterRegistry,
) -> Result<Arc<dyn AvroAdapter>, AdapterResolutionError> {
    let failed = |class_name: &str, source: ClassLookupError| {
        warn!(class = %class_name, error = %source, "cannot resolve Avro adapter");
        AdapterResolutionError {
            class_name: class_name.to_string(),
            source,
        }
    };

    if let Some(class_name) = &config.adapter_class {
        let adapter = registry
            .new_adapter(class_name)
            .map_err(|e| failed(class_name, e))?;
        debug!(class = %class_name, "using configured Avro adapter");
        return Ok(adapter);
    }

    let chooser_name = config
        .chooser_class
        .as_deref()
        .unwrap_or(DEFAULT_CHOOSER_CLASS);
    let chooser = registry
        .new_chooser(chooser_name)
        .map_err(|e| failed(chooser_name, e))?;
    let adapter = chooser.avro_adapter();
    debug!(chooser = %chooser_name, adapter = adapter.name(), "Avro adapter chosen");
    Ok(adapter)
}

/// The process-wide adapter, resolved from the environment on first use.
///
/// A failed resolution is cached as well; it signals misconfiguration and
/// is returned to every later caller.
pub fn avro_adapter() -> Result<Arc<dyn AvroAdapter>, AdapterResolutionError> {
    AVRO_ADAPTER
        .get_or_init(|| resolve_adapter(&AdapterConfig::from_env(), &AdapterRegistry::default()))
        .clone()
}

/// Resolve the process-wide adapter with explicit settings.
///
/// Only the first initialization takes effect; later calls return the
/// cached result regardless of their arguments.
pub fn init_avro_adapter(
    config: &AdapterConfig,
    registry: &AdapterRegistry,
) -> Result<Arc<dyn AvroAdapter>, AdapterResolutionError> {
    AVRO_ADAPTER
        .get_or_init(|| resolve_adapter(config, registry))
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_chooser_is_used_when_nothing_configured() {
        let adapter = resolve_adapter(&AdapterConfig::new(), &AdapterRegistry::default()).unwrap();
        assert_eq!(adapter.name(), DEFAULT_ADAPTER_CLASS);
    }

    #[test]
    fn test_empty_env_values_are_unset() {
        let config = AdapterConfig::from_lookup(|key| match key {
            ADAPTER_CLASS_ENV => Some("  ".to_string()),
            CHOOSER_CLASS_ENV => Some("custom".to_string()),
            _ => None,
        });
        assert_eq!(config, AdapterConfig::new().with_chooser_class("custom"));
    }

    #[test]
    fn test_adapter_name_registered_as_chooser_is_not_assignable() {
        let config = AdapterConfig::new().with_adapter_class(DEFAULT_CHOOSER_CLASS);
        let err = resolve_adapter(&config, &AdapterRegistry::default()).unwrap_err();
        assert_eq!(err.class_name, DEFAULT_CHOOSER_CLASS);
        assert_eq!(
            err.source,
            ClassLookupError::NotAssignable {
                expected: "AvroAdapter"
            }
        );
    }
}
