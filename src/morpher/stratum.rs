//! Stratum rules and the cascades that thread words through every stratum.
//!
//! A stratum combines its morphological rules, its templates and its
//! phonological rules into one [`Rule`]. Synthesis runs
//!
//! ```text
//! compounding rules -> morphological rules -> templates -> phonological rules
//! ```
//!
//! and analysis undoes the same steps in reverse order. The language-level
//! rules chain the strata: synthesis pipes each word upwards from the stratum
//! of its root, analysis walks downwards from the surface and keeps the
//! candidates of every stratum, since each stratum owns its own lexicon.

use tracing::{debug, trace};

use crate::language::{Language, RuleOrder};
use crate::morphology::{
    AnalysisAffixProcessRule, AnalysisAffixTemplate, AnalysisCompoundingRule,
    SynthesisAffixProcessRule, SynthesisAffixTemplate, SynthesisCompoundingRule,
};
use crate::phonetic::{AnalysisRewriteRule, SynthesisRewriteRule};
use crate::rules::{
    push_unique, CombinationRuleCascade, InPlaceRule, InPlaceRuleCascade, LinearRuleCascade,
    PermutationRuleCascade, Rule, RuleContext,
};
use crate::word::Word;

use super::trace::{RuleKey, TraceEvent, TraceKind};

// ============================================================================
// Morphological cascades
// ============================================================================

/// The cascade a stratum's rule order selects.
#[derive(Debug, Clone)]
enum MorphologicalCascade<R> {
    Linear(LinearRuleCascade<R>),
    Permutation(PermutationRuleCascade<R>),
    Combination(CombinationRuleCascade<R>),
}

impl<R: Rule> Rule for MorphologicalCascade<R> {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        match self {
            MorphologicalCascade::Linear(c) => c.apply(ctx, input),
            MorphologicalCascade::Permutation(c) => c.apply(ctx, input),
            MorphologicalCascade::Combination(c) => c.apply(ctx, input),
        }
    }
}

/// `words` plus everything `rules` derive from them, applied repeatedly.
fn closure<R: Rule>(ctx: &RuleContext<'_>, rules: &[R], words: Vec<Word>) -> Vec<Word> {
    let mut output = Vec::new();
    let mut work = Vec::new();
    for word in words {
        if push_unique(&mut output, word.clone()) {
            work.push(word);
        }
    }
    while let Some(word) = work.pop() {
        for rule in rules {
            for out in rule.apply(ctx, &word) {
                if push_unique(&mut output, out.clone()) {
                    work.push(out);
                }
            }
        }
    }
    output
}

fn mark(ctx: &RuleContext<'_>, kind: TraceKind, key: RuleKey, word: &mut Word) {
    if ctx.is_tracing(key) {
        let event = TraceEvent::mark(kind, key, word);
        word.record(event);
    }
}

// ============================================================================
// Synthesis
// ============================================================================

/// Synthesis through one stratum.
#[derive(Debug, Clone)]
pub struct SynthesisStratumRule {
    index: usize,
    compounding: Vec<SynthesisCompoundingRule>,
    mrules: MorphologicalCascade<SynthesisAffixProcessRule>,
    templates: Vec<SynthesisAffixTemplate>,
    prules: InPlaceRuleCascade<SynthesisRewriteRule>,
}

impl SynthesisStratumRule {
    /// Compile stratum `index` of `language`.
    pub fn new(language: &Language, index: usize) -> Self {
        let stratum = language.strata.get(index).cloned().unwrap_or_default();
        let compounding = stratum
            .compounding_rules
            .iter()
            .map(|&c| SynthesisCompoundingRule::new(language, c))
            .collect();
        let mrules: Vec<_> = stratum
            .mrules
            .iter()
            .map(|&r| SynthesisAffixProcessRule::new(language, r))
            .collect();
        let mrules = match stratum.mrule_order {
            RuleOrder::Linear => MorphologicalCascade::Linear(LinearRuleCascade::new(mrules, true)),
            RuleOrder::Permutation => {
                MorphologicalCascade::Combination(CombinationRuleCascade::new(mrules))
            }
        };
        let templates = (0..stratum.templates.len())
            .map(|t| SynthesisAffixTemplate::new(language, index, t))
            .collect();
        let prules = stratum
            .prules
            .iter()
            .map(|&r| SynthesisRewriteRule::new(language, r))
            .collect();
        SynthesisStratumRule {
            index,
            compounding,
            mrules,
            templates,
            prules: InPlaceRuleCascade::new(prules, stratum.prule_order),
        }
    }

    /// Index (depth) of the stratum.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Outputs of every applicable template, or the word itself when no
    /// template applies.
    fn apply_templates(&self, ctx: &RuleContext<'_>, word: &Word) -> Vec<Word> {
        let mut output = Vec::new();
        let mut applicable = false;
        for template in self.templates.iter().filter(|t| t.is_applicable(ctx, word)) {
            applicable = true;
            for out in template.apply(ctx, word) {
                push_unique(&mut output, out);
            }
        }
        if !applicable {
            output.push(word.clone());
        }
        output
    }
}

impl Rule for SynthesisStratumRule {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let key = RuleKey::Stratum(self.index);
        let mut input = input.clone();
        mark(ctx, TraceKind::StratumSynthesisInput, key, &mut input);

        // compounds are built before affixes attach to them
        let bases = closure(ctx, &self.compounding, vec![input.clone()]);
        // the underived word stays a candidate for rules that did not fire
        let mut derived = Vec::new();
        for base in &bases {
            push_unique(&mut derived, base.clone());
            for word in self.mrules.apply(ctx, base) {
                push_unique(&mut derived, word);
            }
        }

        let mut output = Vec::new();
        for word in &derived {
            for mut word in self.apply_templates(ctx, word) {
                if word.has_remaining_rules_from_stratum(ctx.language, self.index) {
                    trace!(stratum = self.index, "rules left unapplied");
                    continue;
                }
                if let Err(err) = self.prules.apply_in_place(ctx, &mut word) {
                    debug!(stratum = self.index, error = %err, "dropping synthesis path");
                    continue;
                }
                word.set_stratum(self.index);
                mark(ctx, TraceKind::StratumSynthesisOutput, key, &mut word);
                word.freeze();
                push_unique(&mut output, word);
            }
        }
        output
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Analysis through one stratum.
#[derive(Debug, Clone)]
pub struct AnalysisStratumRule {
    index: usize,
    prules: InPlaceRuleCascade<AnalysisRewriteRule>,
    templates: Vec<AnalysisAffixTemplate>,
    mrules: MorphologicalCascade<AnalysisAffixProcessRule>,
    compounding: Vec<AnalysisCompoundingRule>,
}

impl AnalysisStratumRule {
    /// Compile stratum `index` of `language`.
    pub fn new(language: &Language, index: usize) -> Self {
        let stratum = language.strata.get(index).cloned().unwrap_or_default();
        let prules = stratum
            .prules
            .iter()
            .rev()
            .map(|&r| AnalysisRewriteRule::new(language, r))
            .collect();
        let templates = (0..stratum.templates.len())
            .map(|t| AnalysisAffixTemplate::new(language, index, t))
            .collect();
        // unapplication may stop after any rule, so every ordered subset of
        // the reversed rules is a candidate
        let mrules = match stratum.mrule_order {
            RuleOrder::Linear => {
                let rules = stratum
                    .mrules
                    .iter()
                    .rev()
                    .map(|&r| AnalysisAffixProcessRule::new(language, r))
                    .collect();
                MorphologicalCascade::Permutation(PermutationRuleCascade::new(rules, true))
            }
            RuleOrder::Permutation => {
                let rules = stratum
                    .mrules
                    .iter()
                    .map(|&r| AnalysisAffixProcessRule::new(language, r))
                    .collect();
                MorphologicalCascade::Combination(CombinationRuleCascade::new(rules))
            }
        };
        let compounding = stratum
            .compounding_rules
            .iter()
            .map(|&c| AnalysisCompoundingRule::new(language, c))
            .collect();
        AnalysisStratumRule {
            index,
            prules: InPlaceRuleCascade::new(prules, stratum.prule_order),
            templates,
            mrules,
            compounding,
        }
    }

    /// Index (depth) of the stratum.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Rule for AnalysisStratumRule {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let key = RuleKey::Stratum(self.index);
        let mut word = input.clone();
        word.set_stratum(self.index);
        mark(ctx, TraceKind::StratumAnalysisInput, key, &mut word);
        if let Err(err) = self.prules.apply_in_place(ctx, &mut word) {
            debug!(stratum = self.index, error = %err, "dropping analysis path");
            return Vec::new();
        }

        let mut unapplied = vec![word.clone()];
        for template in &self.templates {
            for out in template.apply(ctx, &word) {
                push_unique(&mut unapplied, out);
            }
        }
        let mut affixed = unapplied.clone();
        for word in &unapplied {
            for out in self.mrules.apply(ctx, word) {
                push_unique(&mut affixed, out);
            }
        }
        let mut output = closure(ctx, &self.compounding, affixed);

        let limit = ctx.settings.max_unapplications;
        if limit > 0 && output.len() > limit {
            debug!(stratum = self.index, candidates = output.len(), limit, "capping analyses");
            output.truncate(limit);
        }
        for word in &mut output {
            mark(ctx, TraceKind::StratumAnalysisOutput, key, word);
            word.freeze();
        }
        output
    }
}

// ============================================================================
// Whole language
// ============================================================================

/// Synthesis through every stratum, deepest first.
#[derive(Debug, Clone, Default)]
pub struct SynthesisLanguageRule {
    strata: Vec<SynthesisStratumRule>,
}

impl SynthesisLanguageRule {
    /// Compile every stratum of `language`.
    pub fn new(language: &Language) -> Self {
        SynthesisLanguageRule {
            strata: (0..language.strata.len())
                .map(|s| SynthesisStratumRule::new(language, s))
                .collect(),
        }
    }
}

impl Rule for SynthesisLanguageRule {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let mut current = vec![input.clone()];
        for stratum in &self.strata {
            let mut next = Vec::new();
            for word in current {
                // roots start in their own stratum
                if word.stratum() > stratum.index() {
                    push_unique(&mut next, word);
                    continue;
                }
                for out in stratum.apply(ctx, &word) {
                    push_unique(&mut next, out);
                }
            }
            current = next;
            if current.is_empty() {
                break;
            }
        }
        current
    }
}

/// Analysis through every stratum, surface first.
///
/// The result holds the candidates of every stratum; each one carries the
/// stratum it was produced in, which decides where its root is looked up.
#[derive(Debug, Clone, Default)]
pub struct AnalysisLanguageRule {
    strata: Vec<AnalysisStratumRule>,
}

impl AnalysisLanguageRule {
    /// Compile every stratum of `language`.
    pub fn new(language: &Language) -> Self {
        AnalysisLanguageRule {
            strata: (0..language.strata.len())
                .rev()
                .map(|s| AnalysisStratumRule::new(language, s))
                .collect(),
        }
    }
}

impl Rule for AnalysisLanguageRule {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let mut output = Vec::new();
        let mut current = vec![input.clone()];
        for stratum in &self.strata {
            let mut next = Vec::new();
            for word in &current {
                for out in stratum.apply(ctx, word) {
                    push_unique(&mut next, out);
                }
            }
            for word in &next {
                push_unique(&mut output, word.clone());
            }
            current = next;
        }
        output
    }
}
