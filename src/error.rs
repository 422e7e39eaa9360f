//! Error types for schema and data translation

use thiserror::Error;

/// Errors that can occur while parsing or validating a schema document
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SchemaError {
    /// Well-formed JSON that does not describe a valid schema
    #[error("Invalid schema: {0}")]
    InvalidSchema(String),
    /// Text that is not JSON
    #[error("Parse error: {0}")]
    ParseError(String),
    /// A name that no definition or resolver supplies
    #[error("Unresolved named type reference: '{0}'")]
    UnresolvedName(String),
}

/// Errors that can occur while decoding Avro data
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Invalid data: {0}")]
    InvalidData(String),
    #[error("Unexpected end of input")]
    UnexpectedEof,
    /// Input shape does not match the reader schema
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// More than ten continuation bytes
    #[error("Invalid varint encoding")]
    InvalidVarint,
    #[error("Invalid UTF-8: {0}")]
    InvalidUtf8(#[from] std::string::FromUtf8Error),
    #[error("Invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that can occur while encoding Avro data
#[derive(Debug, Error)]
pub enum EncodeError {
    /// Value does not match the schema it is written with
    #[error("Type mismatch: {0}")]
    TypeMismatch(String),
    /// Value is well typed but not representable
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Errors raised while resolving a custom translator override declared on a schema
#[derive(Debug, Clone, PartialEq, Error)]
pub enum OverrideError {
    /// The override property is malformed
    #[error("Invalid Avro override on '{schema}': {message}")]
    Invalid { schema: String, message: String },
    /// The translator class could not be constructed
    #[error("Cannot instantiate custom translator '{class_name}' for '{schema}': {message}")]
    Instantiation {
        schema: String,
        class_name: String,
        message: String,
    },
}

/// Why a class name could not be turned into an instance
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ClassLookupError {
    /// Nothing is registered under the name
    #[error("no class registered under this name")]
    NotFound,
    /// Something is registered under the name but it provides a different capability
    #[error("class does not implement {expected}")]
    NotAssignable { expected: &'static str },
}

/// The configured Avro adapter could not be resolved
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unable to resolve Avro adapter from class '{class_name}': {source}")]
pub struct AdapterResolutionError {
    /// The configured class name that failed to resolve
    pub class_name: String,
    /// The underlying lookup failure
    #[source]
    pub source: ClassLookupError,
}

/// Errors that abort a schema translation
#[derive(Debug, Error)]
pub enum TranslationError {
    /// Two different schemas share one full name
    #[error("Name conflict for '{full_name}': {message}")]
    NameConflict { full_name: String, message: String },

    /// A default value cannot be expressed in the target model
    #[error("Cannot translate default value of field '{path}': {reason}")]
    DefaultValue { path: String, reason: String },

    /// A union default selects a branch that cannot be moved to the front
    #[error(
        "Default value of '{path}' selects union member '{member}', which is not the first branch of the Avro union"
    )]
    UnionDefaultOrder { path: String, member: String },

    /// The default and a nested field default disagree, or unfold forever
    #[error("Inconsistent default value at '{path}': {reason}")]
    InconsistentDefault { path: String, reason: String },

    /// Embedded schema and structurally translated schema differ
    #[error("Embedded schema verification failed: {0}")]
    Verification(String),

    /// The input schema cannot be translated
    #[error("Invalid schema at '{path}': {reason}")]
    InvalidSchema { path: String, reason: String },

    /// Malformed or unconstructible custom translator override
    #[error(transparent)]
    Override(#[from] OverrideError),

    /// Parser error surfaced from a schema document
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// The codec adapter could not be resolved
    #[error(transparent)]
    Adapter(#[from] AdapterResolutionError),
}

/// A single problem found while translating a value tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessingDiagnostic {
    /// `/`-delimited location of the value, e.g. `/a/b/0`
    pub path: String,
    /// Human-readable error message
    pub message: String,
}

impl ProcessingDiagnostic {
    /// Create a new diagnostic
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ProcessingDiagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "/ :: {}", self.message)
        } else {
            write!(f, "{} :: {}", self.path, self.message)
        }
    }
}

/// A value tree failed to translate; carries every diagnostic gathered
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Data translation failed with {} error(s): {}", diagnostics.len(), join_diagnostics(diagnostics))]
pub struct DataTranslationError {
    pub diagnostics: Vec<ProcessingDiagnostic>,
}

fn join_diagnostics(diagnostics: &[ProcessingDiagnostic]) -> String {
    diagnostics
        .iter()
        .map(|d| d.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl DataTranslationError {
    /// True if some diagnostic was recorded at exactly `path`
    pub fn has_path(&self, path: &str) -> bool {
        self.diagnostics.iter().any(|d| d.path == path)
    }
}
