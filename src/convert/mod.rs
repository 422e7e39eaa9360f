//! Value translation between native data and Avro.
//!
//! Both directions walk a value alongside its native schema and the Avro
//! translation of that schema. Problems with individual values are
//! collected as diagnostics keyed by path, so a single call reports every
//! bad field rather than only the first.

mod avro_to_data;
mod context;
mod data_to_avro;
mod options;
mod overrides;
mod walk;

pub use avro_to_data::avro_to_data;
pub use context::TranslationContext;
pub use data_to_avro::data_to_avro;
pub use options::DataTranslationOptions;
pub use overrides::{
    AvroOverride, CustomDataTranslator, CustomTranslatorFactory, TranslatorRegistry, OVERRIDE_PROPERTY,
};

pub(crate) use overrides::{override_at, override_owner};
