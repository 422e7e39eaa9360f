//! State shared by both data translation directions.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::trace;

use crate::codec::{avro_adapter, AvroAdapter};
use crate::convert::overrides::{override_at, override_owner, CustomDataTranslator};
use crate::convert::{DataTranslationOptions, TranslationContext};
use crate::data::{DataSchemaArena, SchemaRef, UnionMember};
use crate::error::{DataTranslationError, ProcessingDiagnostic};
use crate::schema::{AvroSchema, SchemaResolutionContext};
use crate::translate::AVRO_NAMESPACE_PREFIX;

/// The walk cannot continue; diagnostics say why.
pub(crate) struct Abort;

/// `Ok(None)` means the value failed to translate and a diagnostic was
/// recorded, but sibling values can still be checked.
pub(crate) type Step<T> = Result<Option<T>, Abort>;

pub(crate) struct Walker<'a> {
    pub arena: &'a DataSchemaArena,
    pub wire_names: &'a SchemaResolutionContext,
    pub adapter: Arc<dyn AvroAdapter>,
    pub ctx: TranslationContext,
    options: &'a DataTranslationOptions,
    overrides: HashMap<SchemaRef, Arc<dyn CustomDataTranslator>>,
}

impl<'a> Walker<'a> {
    pub fn new(
        arena: &'a DataSchemaArena,
        wire_names: &'a SchemaResolutionContext,
        options: &'a DataTranslationOptions,
    ) -> Result<Self, DataTranslationError> {
        let adapter = match &options.adapter {
            Some(adapter) => adapter.clone(),
            None => avro_adapter().map_err(|e| DataTranslationError {
                diagnostics: vec![ProcessingDiagnostic::new("", e.to_string())],
            })?,
        };
        Ok(Self {
            arena,
            wire_names,
            adapter,
            ctx: TranslationContext::new(),
            options,
            overrides: HashMap::new(),
        })
    }

    pub fn finish<T>(self, result: Step<T>) -> Result<T, DataTranslationError> {
        self.ctx.finish(result.unwrap_or(None))
    }

    /// Record a problem with one value and keep walking.
    pub fn item_error<T>(&mut self, message: impl Into<String>) -> Step<T> {
        self.ctx.add_message(message);
        Ok(None)
    }

    /// Record a schema mismatch and stop.
    pub fn mismatch<T>(&mut self, message: impl Into<String>) -> Step<T> {
        self.ctx.add_message(message);
        Err(Abort)
    }

    /// Run `f` with `segment` appended to the path.
    pub fn within<T>(&mut self, segment: impl Into<String>, f: impl FnOnce(&mut Self) -> Step<T>) -> Step<T> {
        self.ctx.push(segment);
        let result = f(self);
        self.ctx.pop();
        result
    }

    /// Follow a `Named` reference into its definition.
    pub fn resolve(&mut self, schema: &'a AvroSchema) -> Result<&'a AvroSchema, Abort> {
        let names = self.wire_names;
        names.deref(schema).map_err(|e| {
            self.ctx.add_message(e.to_string());
            Abort
        })
    }

    /// The custom translator overriding `native`, if one is declared.
    pub fn override_for(&mut self, native: SchemaRef) -> Result<Option<Arc<dyn CustomDataTranslator>>, Abort> {
        let Some(owner) = override_owner(self.arena, native) else {
            return Ok(None);
        };
        if let Some(translator) = self.overrides.get(&owner) {
            return Ok(Some(translator.clone()));
        }

        let instantiated = override_at(self.arena, owner).and_then(|declared| match declared {
            Some(declared) => declared
                .instantiate(self.options.override_factory.as_deref())
                .map(Some),
            None => Ok(None),
        });
        match instantiated {
            Ok(Some(translator)) => {
                let translator: Arc<dyn CustomDataTranslator> = Arc::from(translator);
                self.overrides.insert(owner, translator.clone());
                Ok(Some(translator))
            }
            Ok(None) => Ok(None),
            Err(e) => {
                self.ctx.add_message(e.to_string());
                Err(Abort)
            }
        }
    }

    /// Key of the Avro branch a native union member translates to.
    pub fn wire_key(&self, member: SchemaRef) -> String {
        let arena = self.arena;
        if let Some(owner) = override_owner(arena, member) {
            if let Ok(Some(declared)) = override_at(arena, owner) {
                return declared.avro_schema_full_name;
            }
        }
        arena.member_key(&UnionMember::new(arena.dereference(member)))
    }

    /// Whether Avro union branch `branch` stands for a native member keyed
    /// `native_key`.
    pub fn branch_matches(&self, branch: &AvroSchema, native_key: &str) -> bool {
        let wire_key = branch.member_key();
        if wire_key == native_key {
            return true;
        }
        // Either side may carry the overridden namespace prefix
        let unprefixed = |key: &str| {
            key.strip_prefix(AVRO_NAMESPACE_PREFIX)
                .and_then(|rest| rest.strip_prefix('.'))
                .map(str::to_string)
        };
        if unprefixed(native_key).as_deref() == Some(wire_key.as_str())
            || unprefixed(&wire_key).as_deref() == Some(native_key)
        {
            return true;
        }
        if !self.adapter.union_member_uses_full_name() && branch.fullname().is_some() {
            let simple = |name: &str| name.rsplit('.').next().map(str::to_string);
            if simple(&wire_key) == simple(native_key) {
                trace!(branch = %wire_key, member = native_key, "matched union branch by simple name");
                return true;
            }
        }
        false
    }
}

/// Append to a partial result; one failed item spoils the whole.
pub(crate) fn collect<T>(out: &mut Option<Vec<T>>, item: Option<T>) {
    match (out.as_mut(), item) {
        (Some(items), Some(item)) => items.push(item),
        _ => *out = None,
    }
}
