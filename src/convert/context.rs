//! Diagnostics collected while walking a value tree.

use crate::error::{DataTranslationError, ProcessingDiagnostic};

/// Per-call traversal state of the data translator.
///
/// Tracks the location of the value being visited and every problem found
/// so far. Custom translators receive it to report their own failures.
#[derive(Debug, Default)]
pub struct TranslationContext {
    path: Vec<String>,
    diagnostics: Vec<ProcessingDiagnostic>,
}

impl TranslationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current location, e.g. `/a/b/0`. Empty at the root.
    pub fn path(&self) -> String {
        self.path.iter().map(|segment| format!("/{}", segment)).collect()
    }

    pub fn push(&mut self, segment: impl Into<String>) {
        self.path.push(segment.into());
    }

    pub fn pop(&mut self) {
        self.path.pop();
    }

    /// Record a problem at the current location.
    pub fn add_message(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(ProcessingDiagnostic::new(self.path(), message));
    }

    pub fn diagnostics(&self) -> &[ProcessingDiagnostic] {
        &self.diagnostics
    }

    pub fn has_errors(&self) -> bool {
        !self.diagnostics.is_empty()
    }

    pub(crate) fn error_count(&self) -> usize {
        self.diagnostics.len()
    }

    /// Turn the walk's outcome into the call result. Any recorded
    /// diagnostic fails the call, whatever value was produced.
    pub(crate) fn finish<T>(self, value: Option<T>) -> Result<T, DataTranslationError> {
        match value {
            Some(value) if self.diagnostics.is_empty() => Ok(value),
            Some(_) | None => {
                let mut diagnostics = self.diagnostics;
                if diagnostics.is_empty() {
                    diagnostics.push(ProcessingDiagnostic::new("", "translation produced no value"));
                }
                Err(DataTranslationError { diagnostics })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_carry_current_path() {
        let mut ctx = TranslationContext::new();
        ctx.add_message("root problem");
        ctx.push("a");
        ctx.push("0");
        ctx.add_message("nested problem");
        ctx.pop();
        assert_eq!(ctx.path(), "/a");

        let err = ctx.finish(Some(())).unwrap_err();
        assert_eq!(err.diagnostics[0].path, "");
        assert!(err.has_path("/a/0"));
    }

    #[test]
    fn test_clean_walk_succeeds() {
        assert_eq!(TranslationContext::new().finish(Some(7)).unwrap(), 7);
    }
}
