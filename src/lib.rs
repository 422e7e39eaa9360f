//! Translation between a record data schema language and Apache Avro
//!
//! This library compiles native data schemas (records with includes,
//! optional fields, typerefs and aliased unions) into Avro schemas and back,
//! and translates value trees between the two models so native data can be
//! written with Avro's binary and JSON encodings.

pub mod codec;
pub mod convert;
pub mod data;
pub mod error;
pub mod schema;
pub mod translate;

// Re-export main types
pub use codec::{
    avro_adapter, init_avro_adapter, resolve_adapter, AdapterConfig, AdapterRegistry, AvroAdapter,
    AvroAdapterChooser, AvroValue, DatumDecoder, DatumEncoder, DefaultAvroAdapter,
};
pub use convert::{
    avro_to_data, data_to_avro, AvroOverride, CustomDataTranslator, CustomTranslatorFactory,
    DataTranslationOptions, TranslationContext, TranslatorRegistry,
};
pub use data::{
    parse_data_schema, parse_data_schema_with_resolver, DataSchema, DataSchemaArena,
    DataSchemaNode, DataSchemaTree, DataValue, InMemoryResolver, NamedSchemaResolver, SchemaRef,
};
pub use error::{
    AdapterResolutionError, ClassLookupError, DataTranslationError, DecodeError, EncodeError,
    OverrideError, ProcessingDiagnostic, SchemaError, TranslationError,
};
pub use schema::{parse_schema, AvroSchema, SchemaParser, SchemaResolutionContext};
pub use translate::{
    avro_json_to_data_schema, avro_to_data_schema, data_to_avro_schema, data_to_avro_schema_json,
    AvroToDataSchemaMode, AvroToDataSchemaOptions, DataToAvroSchemaOptions, EmbedSchemaMode,
    OptionalDefaultMode,
};
