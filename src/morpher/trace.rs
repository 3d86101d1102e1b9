//! Trace records and trace configuration.
//!
//! Tracing is opt-in per rule through [`TraceSettings`]. Traced rules attach
//! [`TraceEvent`]s to the words they produce, so every candidate carries the
//! history of its own derivation path. Recording never changes which words are
//! derived.

use std::fmt;

use rustc_hash::FxHashSet;

use crate::feature::FeatureStruct;
use crate::shape::Shape;
use crate::word::Word;

/// Identity of a traceable rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RuleKey {
    /// A stratum, by index
    Stratum(usize),
    /// A morphological rule, by index into the language's rule list
    MorphologicalRule(usize),
    /// A phonological rule, by index into the language's rule list
    PhonologicalRule(usize),
    /// A compounding rule, by index into the language's compounding rules
    CompoundingRule(usize),
    /// A template, by stratum and position
    Template {
        /// Stratum index
        stratum: usize,
        /// Template index within the stratum
        index: usize,
    },
    /// Lexical lookup
    Lexicon,
}

/// Which rules to trace.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TraceSettings {
    /// Trace everything
    pub all: bool,
    rules: FxHashSet<RuleKey>,
}

impl TraceSettings {
    /// Tracing disabled.
    pub fn none() -> Self {
        Self::default()
    }

    /// Trace every rule.
    pub fn everything() -> Self {
        TraceSettings {
            all: true,
            rules: FxHashSet::default(),
        }
    }

    /// Enable one rule.
    pub fn enable(&mut self, key: RuleKey) {
        self.rules.insert(key);
    }

    /// Disable one rule.
    pub fn disable(&mut self, key: RuleKey) {
        self.rules.remove(&key);
    }

    /// Whether `key` is traced.
    #[inline]
    pub fn is_enabled(&self, key: RuleKey) -> bool {
        self.all || self.rules.contains(&key)
    }

    /// Whether anything at all is traced.
    pub fn is_active(&self) -> bool {
        self.all || !self.rules.is_empty()
    }
}

/// What a trace event records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TraceKind {
    /// Word entering a stratum during synthesis
    StratumSynthesisInput,
    /// Word leaving a stratum during synthesis
    StratumSynthesisOutput,
    /// Word entering a stratum during analysis
    StratumAnalysisInput,
    /// Word leaving a stratum during analysis
    StratumAnalysisOutput,
    /// A morphological rule applied
    MorphologicalRuleSynthesis,
    /// A morphological rule unapplied
    MorphologicalRuleAnalysis,
    /// A phonological rule applied
    PhonologicalRuleSynthesis,
    /// A phonological rule unapplied
    PhonologicalRuleAnalysis,
    /// A template applied
    TemplateSynthesis,
    /// A template unapplied
    TemplateAnalysis,
    /// A root allomorph was found for an analysis
    LexicalLookup,
    /// A candidate was rejected
    Rejected,
}

/// Shallow copy of a word's observable state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WordSnapshot {
    /// Shape at the time of the event
    pub shape: Shape,
    /// Syntactic features at the time of the event
    pub syntactic_fs: FeatureStruct,
    /// Stratum at the time of the event
    pub stratum: usize,
}

impl From<&Word> for WordSnapshot {
    fn from(word: &Word) -> Self {
        WordSnapshot {
            shape: word.shape().clone(),
            syntactic_fs: word.syntactic_fs().clone(),
            stratum: word.stratum(),
        }
    }
}

/// One recorded step of a derivation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TraceEvent {
    /// Event kind
    pub kind: TraceKind,
    /// Rule that produced the event
    pub key: RuleKey,
    /// Subrule or allomorph index, where relevant
    pub subrule: Option<usize>,
    /// Word before the step
    pub input: Option<WordSnapshot>,
    /// Word after the step
    pub output: Option<WordSnapshot>,
    /// Why the candidate was rejected, for [`TraceKind::Rejected`]
    pub failure: Option<FailureReason>,
}

impl TraceEvent {
    /// An input/output event.
    pub fn step(kind: TraceKind, key: RuleKey, subrule: Option<usize>, input: &Word, output: &Word) -> Self {
        TraceEvent {
            kind,
            key,
            subrule,
            input: Some(input.into()),
            output: Some(output.into()),
            failure: None,
        }
    }

    /// A single-word event (stratum entry or exit).
    pub fn mark(kind: TraceKind, key: RuleKey, word: &Word) -> Self {
        TraceEvent {
            kind,
            key,
            subrule: None,
            input: Some(word.into()),
            output: None,
            failure: None,
        }
    }

    /// A rejection.
    pub fn rejected(word: &Word, failure: FailureReason) -> Self {
        TraceEvent {
            kind: TraceKind::Rejected,
            key: RuleKey::Lexicon,
            subrule: None,
            input: Some(word.into()),
            output: None,
            failure: Some(failure),
        }
    }
}

/// Why a candidate word was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureReason {
    /// A rule recorded during analysis was never applied
    PendingRules,
    /// A bound root surfaced without any affix
    BoundRoot,
    /// The root's stem name does not cover the word's features
    RequiredStemName,
    /// A sibling allomorph's stem name covers the word's features
    ExcludedStemName,
    /// An allomorph's phonetic environment is not satisfied
    Environments,
    /// An allomorph co-occurrence rule failed
    AllomorphCoOccurrence,
    /// A morpheme co-occurrence rule failed
    MorphemeCoOccurrence,
    /// A higher-precedence allomorph was also valid
    DisjunctiveAllomorph,
    /// Re-synthesis does not reproduce the input string
    SurfaceMismatch,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tag = match self {
            FailureReason::PendingRules => "pending rules",
            FailureReason::BoundRoot => "bound root",
            FailureReason::RequiredStemName => "required stem name",
            FailureReason::ExcludedStemName => "excluded stem name",
            FailureReason::Environments => "environments",
            FailureReason::AllomorphCoOccurrence => "allomorph co-occurrence",
            FailureReason::MorphemeCoOccurrence => "morpheme co-occurrence",
            FailureReason::DisjunctiveAllomorph => "disjunctive allomorph",
            FailureReason::SurfaceMismatch => "surface mismatch",
        };
        write!(f, "{}", tag)
    }
}
