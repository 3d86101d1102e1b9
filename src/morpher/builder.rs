//! Builder pattern for creating Morpher instances.
//!
//! The `MorpherBuilder` provides a fluent API for constructing a
//! [`Morpher`] with optional configuration and grammar validation.

use crate::error::MorphError;
use crate::language::Language;

use super::trace::RuleKey;
use super::{Morpher, MorpherSettings};

/// Builder for constructing a [`Morpher`] with a fluent API.
///
/// # Example
///
/// ```rust
/// use libmorpher::char_table::CharacterDefinitionTable;
/// use libmorpher::language::{Language, Stratum};
/// use libmorpher::morpher::MorpherBuilder;
///
/// let mut language = Language::new("demo", CharacterDefinitionTable::new("demo"));
/// language.add_stratum(Stratum::new("word"));
///
/// let morpher = MorpherBuilder::new()
///     .language(language)
///     .deletion_reapplications(1)
///     .build()?;
/// assert_eq!(morpher.settings().deletion_reapplications, 1);
/// # Ok::<(), libmorpher::morpher::BuilderError>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct MorpherBuilder {
    language: Option<Language>,
    settings: MorpherSettings,
}

/// Error type for builder validation failures.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum BuilderError {
    /// No language was provided
    #[error("Language is required. Use .language() to set it.")]
    MissingLanguage,
    /// The language failed validation
    #[error("Grammar failed to compile: {0}")]
    Grammar(#[from] MorphError),
}

impl MorpherBuilder {
    /// Create a new builder with default settings.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the grammar to compile.
    ///
    /// # Arguments
    ///
    /// * `language` - Strata, lexicon and rules of the language
    pub fn language(mut self, language: Language) -> Self {
        self.language = Some(language);
        self
    }

    /// Extra passes a deleting phonological rule gets on its own output.
    pub fn deletion_reapplications(mut self, count: usize) -> Self {
        self.settings.deletion_reapplications = count;
        self
    }

    /// Cap the analyses kept per stratum (0 = unbounded).
    pub fn max_unapplications(mut self, count: usize) -> Self {
        self.settings.max_unapplications = count;
        self
    }

    /// Largest shape a derivation may build.
    pub fn max_shape_len(mut self, len: usize) -> Self {
        self.settings.max_shape_len = len;
        self
    }

    /// Record trace events for every rule.
    pub fn trace_all(mut self) -> Self {
        self.settings.trace.all = true;
        self
    }

    /// Record trace events for one rule.
    ///
    /// # Example
    ///
    /// ```rust,ignore
    /// let builder = MorpherBuilder::new()
    ///     .trace_rule(RuleKey::MorphologicalRule(0))
    ///     .trace_rule(RuleKey::Lexicon);
    /// ```
    pub fn trace_rule(mut self, key: RuleKey) -> Self {
        self.settings.trace.enable(key);
        self
    }

    /// Replace every setting at once.
    pub fn settings(mut self, settings: MorpherSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Build the `Morpher`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Language was not set (use `.language()`)
    /// - The language references unknown strata or rules, or a rule is
    ///   malformed
    pub fn build(self) -> Result<Morpher, BuilderError> {
        let language = self.language.ok_or(BuilderError::MissingLanguage)?;
        Ok(Morpher::new(language, self.settings)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_table::CharacterDefinitionTable;
    use crate::language::Stratum;

    fn language() -> Language {
        let mut language = Language::new("t", CharacterDefinitionTable::new("t"));
        language.add_stratum(Stratum::new("s"));
        language
    }

    #[test]
    fn test_builder_complete() {
        let morpher = MorpherBuilder::new()
            .language(language())
            .max_unapplications(10)
            .max_shape_len(32)
            .trace_rule(RuleKey::Stratum(0))
            .build()
            .unwrap();

        assert_eq!(morpher.settings().max_unapplications, 10);
        assert_eq!(morpher.settings().max_shape_len, 32);
        assert!(morpher.is_trace_enabled(RuleKey::Stratum(0)));
        assert!(!morpher.is_trace_enabled(RuleKey::Lexicon));
    }

    #[test]
    fn test_builder_missing_language() {
        let result = MorpherBuilder::new().trace_all().build();
        assert_eq!(result.unwrap_err(), BuilderError::MissingLanguage);
    }

    #[test]
    fn test_builder_invalid_grammar() {
        let empty = Language::new("t", CharacterDefinitionTable::new("t"));
        let result = MorpherBuilder::new().language(empty).build();
        assert!(matches!(
            result,
            Err(BuilderError::Grammar(MorphError::InvalidGrammar(_)))
        ));
    }

    #[test]
    fn test_builder_error_display() {
        assert!(BuilderError::MissingLanguage.to_string().contains("Language"));
        let err = BuilderError::from(MorphError::InvalidGrammar("no strata".into()));
        assert!(err.to_string().contains("no strata"));
    }
}
