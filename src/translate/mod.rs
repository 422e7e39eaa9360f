//! Schema translation between the native model and Avro.
//!
//! The forward direction compiles a native schema into an Avro schema:
//! optional fields become unions with null, typerefs dissolve into their
//! targets, aliased unions are expanded into records and defaults are
//! re-encoded for Avro's first-branch rule. The backward direction is the
//! structural inverse, optionally replaced by a native schema embedded in
//! the Avro root.

mod alias_union;
mod defaults;
mod embed;
mod from_avro;
mod options;
mod to_avro;

pub use alias_union::{DISCRIMINATOR_FIELD, NULL_DISCRIMINATOR};
pub use embed::{embedded_schema, EmbeddedSchema, EMBEDDED_SCHEMA_KEY};
pub use from_avro::{avro_json_to_data_schema, avro_to_data_schema, TranslatedDataSchema};
pub use options::{
    AvroToDataSchemaMode, AvroToDataSchemaOptions, DataToAvroSchemaOptions, EmbedSchemaMode,
    OptionalDefaultMode,
};
pub use to_avro::{data_to_avro_schema, data_to_avro_schema_json, AVRO_NAMESPACE_PREFIX};
