//! Rule abstractions and cascades.
//!
//! Every compiled rule of the engine (affix process rules, templates, strata,
//! the whole language) is a [`Rule`]: it maps one input word to the set of
//! words it derives. Phonological rewrite rules rewrite a word in place and
//! implement [`InPlaceRule`] instead. Cascades combine rules of one kind
//! under an ordering policy and are themselves rules.

mod cascade;

pub use cascade::{
    CombinationRuleCascade, InPlaceRuleCascade, LinearRuleCascade, PermutationRuleCascade,
};

use crate::error::Result;
use crate::language::Language;
use crate::morpher::{MorpherSettings, RuleKey};
use crate::word::Word;

/// Read-only state shared by every rule application.
#[derive(Debug, Clone, Copy)]
pub struct RuleContext<'a> {
    /// The grammar
    pub language: &'a Language,
    /// Engine settings, trace settings included
    pub settings: &'a MorpherSettings,
}

impl<'a> RuleContext<'a> {
    /// Create a context.
    pub fn new(language: &'a Language, settings: &'a MorpherSettings) -> Self {
        RuleContext { language, settings }
    }

    /// Whether applications of `key` should be recorded.
    #[inline]
    pub fn is_tracing(&self, key: RuleKey) -> bool {
        self.settings.trace.is_enabled(key)
    }
}

/// A rule producing zero or more derived words.
///
/// An empty result means the rule did not apply; the input is never part of
/// the result.
pub trait Rule {
    /// Apply to one word.
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word>;
}

/// A rule that rewrites a word in place.
pub trait InPlaceRule {
    /// Rewrite `word`, returning whether anything changed.
    ///
    /// An error means the derivation path is broken and must be dropped.
    fn apply_in_place(&self, ctx: &RuleContext<'_>, word: &mut Word) -> Result<bool>;
}

impl<R: Rule + ?Sized> Rule for &R {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        (**self).apply(ctx, input)
    }
}

impl<R: Rule + ?Sized> Rule for std::sync::Arc<R> {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        (**self).apply(ctx, input)
    }
}

/// Push `word` unless an equal word is already present.
pub(crate) fn push_unique(words: &mut Vec<Word>, word: Word) -> bool {
    if words.contains(&word) {
        false
    } else {
        words.push(word);
        true
    }
}
