//! The morpher: compiled strata, lexical lookup and the parse/generate
//! drivers.
//!
//! A [`Morpher`] compiles a [`Language`] once into analysis and synthesis
//! rules plus one [`ShapeTrie`] of root allomorphs per stratum. Parsing a
//! surface string then runs
//!
//! ```text
//! segment -> analysis -> lexical lookup -> synthesis -> validity
//!         -> surface comparison -> allomorph disjunction
//! ```
//!
//! Analysis over-generates: it only proposes underlying forms. Every
//! proposal is synthesized again and kept only if the result is well formed
//! and reproduces the input string.
//!
//! # Example
//!
//! ```
//! use libmorpher::char_table::CharacterDefinitionTable;
//! use libmorpher::feature::FeatureStruct;
//! use libmorpher::language::{Language, LexEntry, RootAllomorph, Stratum};
//! use libmorpher::morpher::Morpher;
//! use libmorpher::morphology::{AffixProcessAllomorph, AffixProcessRule};
//!
//! let mut table = CharacterDefinitionTable::new("demo");
//! for c in ["k", "a", "t", "z"] {
//!     table.add_segment(&[c], FeatureStruct::new().with("seg", c));
//! }
//! let mut language = Language::new("demo", table);
//! language.add_stratum(Stratum::new("word"));
//! let kat = language.char_table.segment("kat")?;
//! let z = language.char_table.segment("z")?;
//! language.add_entry(0, LexEntry::new("cat", RootAllomorph::new(kat)));
//! language.add_mrule(0, AffixProcessRule::new("PL", vec![AffixProcessAllomorph::suffix(z)]));
//!
//! let morpher = Morpher::new(language, Default::default())?;
//! assert_eq!(morpher.generate_words(0, &[0], FeatureStruct::new())?, vec!["katz"]);
//!
//! let parses = morpher.parse_word("katz")?;
//! assert_eq!(parses.len(), 1);
//! assert_eq!(parses[0].root_entry(), Some(0));
//! # Ok::<(), libmorpher::error::MorphError>(())
//! ```

mod builder;
mod settings;
mod stratum;
mod trace;
mod validity;

pub use builder::{BuilderError, MorpherBuilder};
pub use settings::MorpherSettings;
pub use stratum::{
    AnalysisLanguageRule, AnalysisStratumRule, SynthesisLanguageRule, SynthesisStratumRule,
};
pub use trace::{FailureReason, RuleKey, TraceEvent, TraceKind, TraceSettings, WordSnapshot};

use tracing::debug;

use crate::dictionary::ShapeTrie;
use crate::error::{MorphError, Result};
use crate::feature::FeatureStruct;
use crate::language::{AllomorphId, Language, MorphemeId};
use crate::pattern::NodeFilter;
use crate::rules::{push_unique, Rule, RuleContext};
use crate::word::Word;

/// Outcome of [`Morpher::parse_word_traced`].
#[derive(Debug, Clone, Default)]
pub struct ParseResult {
    /// Words that survived every check
    pub words: Vec<Word>,
    /// Synthesized candidates that were rejected, with the reason
    pub rejected: Vec<(Word, FailureReason)>,
}

/// A compiled grammar.
#[derive(Debug, Clone)]
pub struct Morpher {
    language: Language,
    settings: MorpherSettings,
    analysis: AnalysisLanguageRule,
    synthesis: SynthesisLanguageRule,
    lexicon: Vec<ShapeTrie<AllomorphId>>,
}

impl Morpher {
    /// Validate and compile `language`.
    ///
    /// # Errors
    ///
    /// [`MorphError::InvalidGrammar`] when the language references unknown
    /// strata or rules, or a rule is malformed.
    pub fn new(language: Language, settings: MorpherSettings) -> Result<Self> {
        let mut morpher = Morpher {
            analysis: AnalysisLanguageRule::default(),
            synthesis: SynthesisLanguageRule::default(),
            lexicon: Vec::new(),
            language,
            settings,
        };
        morpher.compile()?;
        Ok(morpher)
    }

    /// Build the analysis and synthesis rules of every stratum and index the
    /// root allomorphs.
    ///
    /// Called by [`new`](Self::new); call it again after changing the
    /// grammar through [`language_mut`](Self::language_mut).
    pub fn compile(&mut self) -> Result<()> {
        self.language.validate()?;
        self.analysis = AnalysisLanguageRule::new(&self.language);
        self.synthesis = SynthesisLanguageRule::new(&self.language);

        let mut lexicon: Vec<ShapeTrie<AllomorphId>> = (0..self.language.strata.len())
            .map(|_| ShapeTrie::new(NodeFilter::SEGMENTS))
            .collect();
        for (e, entry) in self.language.entries.iter().enumerate() {
            let Some(trie) = lexicon.get_mut(entry.stratum) else {
                continue;
            };
            for (i, allomorph) in entry.allomorphs.iter().enumerate() {
                trie.insert(&allomorph.shape, AllomorphId::new(MorphemeId::Entry(e), i));
            }
        }
        self.lexicon = lexicon;
        debug!(
            language = %self.language.name,
            strata = self.language.strata.len(),
            entries = self.language.entries.len(),
            "compiled morpher"
        );
        Ok(())
    }

    /// The grammar.
    pub fn language(&self) -> &Language {
        &self.language
    }

    /// Mutable grammar access; [`compile`](Self::compile) must run before
    /// the next parse.
    pub fn language_mut(&mut self) -> &mut Language {
        &mut self.language
    }

    /// The settings.
    pub fn settings(&self) -> &MorpherSettings {
        &self.settings
    }

    /// Replace the trace configuration.
    pub fn set_trace(&mut self, trace: TraceSettings) {
        self.settings.trace = trace;
    }

    /// Whether applications of `key` are recorded.
    pub fn is_trace_enabled(&self, key: RuleKey) -> bool {
        self.settings.trace.is_enabled(key)
    }

    fn context(&self) -> RuleContext<'_> {
        RuleContext::new(&self.language, &self.settings)
    }

    // ========================================================================
    // Cascades
    // ========================================================================

    /// Run `word` through every stratum from its own upwards.
    pub fn apply_synthesis(&self, word: &Word) -> Vec<Word> {
        self.synthesis.apply(&self.context(), word)
    }

    /// Undo every stratum from the surface downwards, returning the
    /// candidates of all strata.
    pub fn apply_analysis(&self, word: &Word) -> Vec<Word> {
        self.analysis.apply(&self.context(), word)
    }

    /// Root allomorphs whose shape fits an analysis, each swapped into a copy
    /// of the analysis.
    ///
    /// Non-heads split off by compounding rules are resolved too; an analysis
    /// with a non-head no root fits yields nothing.
    pub fn lexical_lookup(&self, word: &Word) -> Vec<Word> {
        let Some(trie) = self.lexicon.get(word.stratum()) else {
            return Vec::new();
        };
        let tracing = self.is_trace_enabled(RuleKey::Lexicon);
        let mut output = Vec::new();
        for &root in trie.search_exact(word.shape()) {
            let mut found = word.clone();
            if found
                .set_root(&self.language, root, word.syntactic_fs().clone())
                .is_none()
            {
                continue;
            }
            for mut found in self.resolve_non_heads(found) {
                if tracing {
                    let event = TraceEvent::step(TraceKind::LexicalLookup, RuleKey::Lexicon, None, word, &found);
                    found.record(event);
                }
                push_unique(&mut output, found);
            }
        }
        output
    }

    /// Every way of resolving the word's non-heads to roots of the
    /// compounding rule's stratum or deeper.
    fn resolve_non_heads(&self, word: Word) -> Vec<Word> {
        let mut words = vec![word];
        for i in 0..words[0].non_heads().len() {
            let mut next = Vec::new();
            for word in &words {
                let non_head = &word.non_heads()[i];
                let deepest = self
                    .language
                    .compounding_rules
                    .get(non_head.rule)
                    .map_or(0, |r| r.stratum);
                for trie in self.lexicon.iter().take(deepest + 1) {
                    for &root in trie.search_exact(&non_head.shape) {
                        let mut found = word.clone();
                        if found.set_non_head_root(&self.language, i, root).is_some() {
                            push_unique(&mut next, found);
                        }
                    }
                }
            }
            words = next;
        }
        words
    }

    /// Check a synthesized word.
    ///
    /// Rejects words with rules left over from analysis, bound roots without
    /// affixes, and words violating stem-name, environment or co-occurrence
    /// restrictions.
    pub fn check_word(&self, word: &Word) -> std::result::Result<(), FailureReason> {
        validity::check_word(&self.language, word)
    }

    // ========================================================================
    // Drivers
    // ========================================================================

    /// Every analysis of a surface string.
    ///
    /// # Errors
    ///
    /// [`MorphError::InvalidShape`] when the string contains a symbol the
    /// character table does not define. Faults inside individual
    /// derivations only remove candidates.
    pub fn parse_word(&self, word: &str) -> Result<Vec<Word>> {
        Ok(self.parse_word_traced(word)?.words)
    }

    /// Like [`parse_word`](Self::parse_word), also returning the rejected
    /// candidates.
    pub fn parse_word_traced(&self, word: &str) -> Result<ParseResult> {
        let shape = self.language.char_table.segment(word)?;
        let surface_stratum = self.language.strata.len().saturating_sub(1);
        let input = Word::for_analysis(shape, surface_stratum);

        let analyses = self.apply_analysis(&input);
        let mut candidates = Vec::new();
        for analysis in &analyses {
            for found in self.lexical_lookup(analysis) {
                push_unique(&mut candidates, found);
            }
        }
        let synthesized = self.synthesize_all(&candidates);

        let mut result = ParseResult::default();
        let mut valid = Vec::new();
        for word_out in synthesized {
            let verdict = self.check_word(&word_out).and_then(|()| {
                if self.language.char_table.is_match(word, word_out.shape()) {
                    Ok(())
                } else {
                    Err(FailureReason::SurfaceMismatch)
                }
            });
            match verdict {
                Ok(()) => {
                    push_unique(&mut valid, word_out);
                }
                Err(reason) => self.reject(&mut result, word_out, reason),
            }
        }
        let (kept, beaten) = validity::apply_disjunction(&self.language, valid);
        for word_out in beaten {
            self.reject(&mut result, word_out, FailureReason::DisjunctiveAllomorph);
        }
        result.words = kept;

        debug!(
            input = word,
            analyses = analyses.len(),
            candidates = candidates.len(),
            parses = result.words.len(),
            rejected = result.rejected.len(),
            "parsed word"
        );
        Ok(result)
    }

    /// Surface forms of lexical entry `entry` with `rules` applied in order.
    ///
    /// Every allomorph of the entry is tried; only well-formed results that
    /// use the highest-precedence allomorphs are returned.
    ///
    /// # Errors
    ///
    /// [`MorphError::InvalidGrammar`] when `entry` or a rule index is
    /// unknown.
    pub fn generate_words(&self, entry: usize, rules: &[usize], syntactic_fs: FeatureStruct) -> Result<Vec<String>> {
        self.generate_realized_words(entry, rules, syntactic_fs, FeatureStruct::new())
    }

    /// Like [`generate_words`](Self::generate_words), also asking the
    /// realizational rules of the grammar to spell out `realizational_fs`.
    pub fn generate_realized_words(
        &self,
        entry: usize,
        rules: &[usize],
        syntactic_fs: FeatureStruct,
        realizational_fs: FeatureStruct,
    ) -> Result<Vec<String>> {
        let lex = self
            .language
            .entries
            .get(entry)
            .ok_or_else(|| MorphError::InvalidGrammar(format!("unknown lexical entry {}", entry)))?;
        if let Some(&r) = rules.iter().find(|&&r| r >= self.language.mrules.len()) {
            return Err(MorphError::InvalidGrammar(format!("unknown morphological rule {}", r)));
        }

        let roots: Vec<Word> = (0..lex.allomorphs.len())
            .filter_map(|i| {
                let root = AllomorphId::new(MorphemeId::Entry(entry), i);
                Word::from_root(&self.language, root, syntactic_fs.clone(), rules)
                    .map(|w| w.with_realizational_fs(realizational_fs.clone()))
            })
            .collect();
        let mut valid = Vec::new();
        for word in self.synthesize_all(&roots) {
            if self.check_word(&word).is_ok() {
                push_unique(&mut valid, word);
            }
        }
        let (kept, _) = validity::apply_disjunction(&self.language, valid);

        let mut surfaces: Vec<String> = Vec::new();
        for word in &kept {
            let surface = self.language.char_table.render(word.shape());
            if !surfaces.contains(&surface) {
                surfaces.push(surface);
            }
        }
        debug!(entry = %lex.id, forms = surfaces.len(), "generated words");
        Ok(surfaces)
    }

    fn reject(&self, result: &mut ParseResult, mut word: Word, reason: FailureReason) {
        if self.is_trace_enabled(RuleKey::Lexicon) {
            let event = TraceEvent::rejected(&word, reason);
            word.record(event);
        }
        result.rejected.push((word, reason));
    }

    #[cfg(feature = "parallel")]
    fn synthesize_all(&self, words: &[Word]) -> Vec<Word> {
        use rayon::prelude::*;

        let per_word: Vec<Vec<Word>> = words.par_iter().map(|w| self.apply_synthesis(w)).collect();
        let mut output = Vec::new();
        for word in per_word.into_iter().flatten() {
            push_unique(&mut output, word);
        }
        output
    }

    #[cfg(not(feature = "parallel"))]
    fn synthesize_all(&self, words: &[Word]) -> Vec<Word> {
        let mut output = Vec::new();
        for word in words {
            for out in self.apply_synthesis(word) {
                push_unique(&mut output, out);
            }
        }
        output
    }
}
