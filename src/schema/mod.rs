//! Avro schema types and parsing.
//!
//! This module defines the Avro schema type system used on the wire side of
//! every translation, its JSON parser, named type resolution and structural
//! equality for both Avro and native schemas.

mod equality;
mod parser;
mod resolution;
mod types;

pub use equality::{avro_schemas_equal, data_schemas_equal};
pub use parser::{parse_schema, parse_schema_with_options, SchemaParser};
pub use resolution::SchemaResolutionContext;
pub use types::*;
