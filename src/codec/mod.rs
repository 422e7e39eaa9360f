//! Avro codec integration.
//!
//! Translation never encodes bytes itself; it talks to the wire-format
//! runtime through an `AvroAdapter`. The crate ships a self-contained
//! `DefaultAvroAdapter` with binary and JSON codecs for `AvroValue` trees,
//! and resolves the active adapter through `adapter::avro_adapter`.

mod adapter;
mod binary;
mod json;
mod value;
pub mod varint;

use std::fmt::Debug;
use std::sync::Arc;

use bytes::Bytes;

use crate::error::{DecodeError, EncodeError, SchemaError};
use crate::schema::{parse_schema, AvroSchema, EnumSchema};

pub use adapter::{
    avro_adapter, init_avro_adapter, resolve_adapter, AdapterConfig, AdapterRegistry,
    ADAPTER_CLASS_ENV, CHOOSER_CLASS_ENV, DEFAULT_ADAPTER_CLASS, DEFAULT_CHOOSER_CLASS,
};
pub use binary::{BinaryDecoder, BinaryEncoder};
pub use json::{avro_to_json, JsonDecoder, JsonEncoder};
pub use value::AvroValue;

/// Reads datums of a given schema from some input.
pub trait DatumDecoder {
    fn read(&mut self, schema: &AvroSchema) -> Result<AvroValue, DecodeError>;
}

/// Writes datums of a given schema to an output buffer.
pub trait DatumEncoder {
    fn write(&mut self, schema: &AvroSchema, value: &AvroValue) -> Result<(), EncodeError>;

    /// Consume the encoder and return everything written.
    fn finish(self: Box<Self>) -> Bytes;
}

/// A wire-format runtime integration.
pub trait AvroAdapter: Send + Sync + Debug {
    /// Name the adapter is registered under.
    fn name(&self) -> &str;

    /// Parse Avro schema JSON.
    fn parse_schema(&self, text: &str) -> Result<AvroSchema, SchemaError>;

    fn new_binary_decoder(&self, data: Bytes) -> Box<dyn DatumDecoder>;

    fn new_binary_encoder(&self) -> Box<dyn DatumEncoder>;

    fn new_json_decoder(&self, text: &str) -> Result<Box<dyn DatumDecoder>, DecodeError>;

    fn new_json_encoder(&self) -> Box<dyn DatumEncoder>;

    /// Build the runtime's enum value, or `None` if `symbol` is not a
    /// symbol of `schema`.
    fn create_enum_value(&self, schema: &EnumSchema, symbol: &str) -> Option<AvroValue>;

    /// Whether union branches of named types are keyed by full name rather
    /// than simple name.
    fn union_member_uses_full_name(&self) -> bool;
}

/// Picks an adapter, typically by inspecting the runtime environment.
pub trait AvroAdapterChooser: Send + Sync {
    fn avro_adapter(&self) -> Arc<dyn AvroAdapter>;
}

/// Adapter backed by this crate's own schema parser and codecs.
#[derive(Debug, Clone, Default)]
pub struct DefaultAvroAdapter;

impl DefaultAvroAdapter {
    pub fn new() -> Self {
        Self
    }
}

impl AvroAdapter for DefaultAvroAdapter {
    fn name(&self) -> &str {
        DEFAULT_ADAPTER_CLASS
    }

    fn parse_schema(&self, text: &str) -> Result<AvroSchema, SchemaError> {
        parse_schema(text)
    }

    fn new_binary_decoder(&self, data: Bytes) -> Box<dyn DatumDecoder> {
        Box::new(BinaryDecoder::new(data))
    }

    fn new_binary_encoder(&self) -> Box<dyn DatumEncoder> {
        Box::new(BinaryEncoder::new())
    }

    fn new_json_decoder(&self, text: &str) -> Result<Box<dyn DatumDecoder>, DecodeError> {
        Ok(Box::new(JsonDecoder::new(text)?))
    }

    fn new_json_encoder(&self) -> Box<dyn DatumEncoder> {
        Box::new(JsonEncoder::new())
    }

    fn create_enum_value(&self, schema: &EnumSchema, symbol: &str) -> Option<AvroValue> {
        schema
            .symbol_index(symbol)
            .map(|index| AvroValue::Enum(index as i32, symbol.to_string()))
    }

    fn union_member_uses_full_name(&self) -> bool {
        true
    }
}

/// Chooser that always supplies `DefaultAvroAdapter`.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultAvroAdapterChooser;

impl AvroAdapterChooser for DefaultAvroAdapterChooser {
    fn avro_adapter(&self) -> Arc<dyn AvroAdapter> {
        Arc::new(DefaultAvroAdapter::new())
    }
}
