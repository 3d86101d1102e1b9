//! Compounding rules.
//!
//! A compounding rule joins the word being derived (the head) with a second
//! root (the non-head). Each subrule splits both constituents into named
//! parts and rebuilds the compound from them with the same output actions
//! affix process rules use; a part name says which constituent it reads.
//!
//! Analysis splits a word into head and non-head and queues the non-head on
//! the word; lexical lookup resolves it to a root and synthesis attaches it
//! again.

use tracing::{debug, trace};

use super::analysis::{rebuild, rhs_pattern};
use super::{lhs_pattern, validate_rhs, LhsPart, MorphologicalOutputAction};
use crate::constraints::MprFeatureSet;
use crate::error::{MorphError, Result};
use crate::feature::{FeatureStruct, VariableBindings};
use crate::language::Language;
use crate::morpher::{RuleKey, TraceEvent, TraceKind};
use crate::pattern::{Match, Matcher, MatcherSettings, NodeFilter};
use crate::rules::{push_unique, Rule, RuleContext};
use crate::shape::{NodeType, Shape, ShapeNode};
use crate::word::{NonHead, Word};

/// Part name of the whole head in [`CompoundingSubrule::head_first`] and
/// [`CompoundingSubrule::non_head_first`].
pub const HEAD: &str = "head";

/// Part name of the whole non-head in the stock subrules.
pub const NON_HEAD: &str = "nonhead";

/// One way of building a compound.
#[derive(Debug, Clone)]
pub struct CompoundingSubrule {
    /// Parts of the head
    pub head_lhs: Vec<LhsPart>,
    /// Parts of the non-head
    pub non_head_lhs: Vec<LhsPart>,
    /// Output actions, reading parts of either constituent
    pub rhs: Vec<MorphologicalOutputAction>,
    /// MPR features the head must carry
    pub required_mpr: MprFeatureSet,
    /// MPR features that block this subrule
    pub excluded_mpr: MprFeatureSet,
    /// MPR features added to the output
    pub out_mpr: MprFeatureSet,
}

impl CompoundingSubrule {
    /// A subrule with the given sides and no restrictions.
    pub fn new(
        head_lhs: Vec<LhsPart>,
        non_head_lhs: Vec<LhsPart>,
        rhs: Vec<MorphologicalOutputAction>,
    ) -> Self {
        CompoundingSubrule {
            head_lhs,
            non_head_lhs,
            rhs,
            required_mpr: MprFeatureSet::new(),
            excluded_mpr: MprFeatureSet::new(),
            out_mpr: MprFeatureSet::new(),
        }
    }

    /// Head followed by non-head.
    pub fn head_first() -> Self {
        Self::new(
            vec![LhsPart::any(HEAD)],
            vec![LhsPart::any(NON_HEAD)],
            vec![
                MorphologicalOutputAction::CopyFromInput { part: HEAD.into() },
                MorphologicalOutputAction::CopyFromInput {
                    part: NON_HEAD.into(),
                },
            ],
        )
    }

    /// Non-head followed by head.
    pub fn non_head_first() -> Self {
        Self::new(
            vec![LhsPart::any(HEAD)],
            vec![LhsPart::any(NON_HEAD)],
            vec![
                MorphologicalOutputAction::CopyFromInput {
                    part: NON_HEAD.into(),
                },
                MorphologicalOutputAction::CopyFromInput { part: HEAD.into() },
            ],
        )
    }

    /// Builder: insert `linker` between the two constituents.
    pub fn with_linker(mut self, linker: Shape) -> Self {
        let at = self.rhs.len().saturating_sub(1);
        self.rhs
            .insert(at, MorphologicalOutputAction::InsertSegments { shape: linker });
        self
    }

    fn part(&self, name: &str) -> Option<&LhsPart> {
        self.head_lhs
            .iter()
            .chain(&self.non_head_lhs)
            .find(|p| p.name == name)
    }

    fn is_non_head_part(&self, name: &str) -> bool {
        self.non_head_lhs.iter().any(|p| p.name == name)
    }

    fn admits(&self, word: &Word) -> bool {
        (self.required_mpr.is_empty() || self.required_mpr.is_match(word.mpr_features()))
            && !self.excluded_mpr.excludes(word.mpr_features())
    }

    fn validate(&self, rule: &str) -> Result<()> {
        if let Some(dup) = self.head_lhs.iter().find(|p| self.is_non_head_part(&p.name)) {
            return Err(MorphError::InvalidGrammar(format!(
                "rule '{}' uses part '{}' for both constituents",
                rule, dup.name
            )));
        }
        validate_rhs(rule, &self.rhs, |part| self.part(part).is_some())
    }
}

/// A compounding rule.
#[derive(Debug, Clone)]
pub struct CompoundingRule {
    /// Name
    pub name: String,
    /// Gloss
    pub gloss: String,
    /// Owning stratum (set on registration)
    pub stratum: usize,
    /// Compounds of this rule allowed per derivation
    pub max_application_count: u32,
    /// Syntactic features the head must unify with
    pub head_required_fs: FeatureStruct,
    /// Syntactic features the non-head's entry must unify with
    pub non_head_required_fs: FeatureStruct,
    /// Syntactic features written onto the output
    pub out_syntactic_fs: FeatureStruct,
    /// Subrules in precedence order
    pub subrules: Vec<CompoundingSubrule>,
}

impl CompoundingRule {
    /// A rule applying at most once.
    pub fn new(name: impl Into<String>, subrules: Vec<CompoundingSubrule>) -> Self {
        let name = name.into();
        CompoundingRule {
            gloss: name.clone(),
            name,
            stratum: 0,
            max_application_count: 1,
            head_required_fs: FeatureStruct::new(),
            non_head_required_fs: FeatureStruct::new(),
            out_syntactic_fs: FeatureStruct::new(),
            subrules,
        }
    }

    /// Builder: head requirements.
    pub fn with_head_required_fs(mut self, fs: FeatureStruct) -> Self {
        self.head_required_fs = fs;
        self
    }

    /// Builder: non-head requirements.
    pub fn with_non_head_required_fs(mut self, fs: FeatureStruct) -> Self {
        self.non_head_required_fs = fs;
        self
    }

    /// Builder: output features.
    pub fn with_out_fs(mut self, fs: FeatureStruct) -> Self {
        self.out_syntactic_fs = fs;
        self
    }

    /// Check the rule is well formed.
    pub fn validate(&self) -> Result<()> {
        if self.subrules.is_empty() {
            return Err(MorphError::InvalidGrammar(format!(
                "compounding rule '{}' has no subrules",
                self.name
            )));
        }
        if self.max_application_count == 0 {
            return Err(MorphError::InvalidGrammar(format!(
                "compounding rule '{}' can never apply",
                self.name
            )));
        }
        self.subrules.iter().try_for_each(|s| s.validate(&self.name))
    }
}

fn matcher_settings() -> MatcherSettings {
    MatcherSettings {
        filter: NodeFilter::SEGMENTS_AND_ANCHORS,
        ..Default::default()
    }
}

// ============================================================================
// Synthesis
// ============================================================================

/// Synthesis side of a [`CompoundingRule`].
#[derive(Debug, Clone)]
pub struct SynthesisCompoundingRule {
    index: usize,
    // head and non-head matcher per subrule
    matchers: Vec<(Matcher, Matcher)>,
}

impl SynthesisCompoundingRule {
    /// Compile compounding rule `index` of `language`.
    pub fn new(language: &Language, index: usize) -> Self {
        let matchers = language
            .compounding_rules
            .get(index)
            .map(|rule| {
                rule.subrules
                    .iter()
                    .map(|s| {
                        (
                            Matcher::new(lhs_pattern(&s.head_lhs), matcher_settings()),
                            Matcher::new(lhs_pattern(&s.non_head_lhs), matcher_settings()),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        SynthesisCompoundingRule { index, matchers }
    }

    /// Index of the rule in the language.
    pub fn index(&self) -> usize {
        self.index
    }

    #[allow(clippy::too_many_arguments)]
    fn build(
        &self,
        ctx: &RuleContext<'_>,
        rule: &CompoundingRule,
        subrule: &CompoundingSubrule,
        input: &Word,
        fs: &FeatureStruct,
        head: &Match,
        non_head: &Match,
    ) -> Result<Word> {
        let mut output = input.clone();
        let Some(NonHead {
            root: Some(root),
            shape: non_head_shape,
            ..
        }) = output.compounding_rule_applied()
        else {
            return Err(MorphError::InvalidGrammar(format!(
                "compounding rule '{}' has no non-head root",
                rule.name
            )));
        };
        let tag = output.next_morph_tag(root);
        let mut shape = Shape::new();

        for action in &subrule.rhs {
            let from_non_head = action.part().is_some_and(|p| subrule.is_non_head_part(p));
            let (source, m) = if from_non_head {
                (&non_head_shape, non_head)
            } else {
                (input.shape(), head)
            };
            let retag = |node: ShapeNode| {
                if from_non_head {
                    node.with_morph(Some(tag))
                } else {
                    node
                }
            };
            match action {
                MorphologicalOutputAction::CopyFromInput { part } => {
                    if let Some((first, last)) = m.group_span(part) {
                        for id in source.range(first, last) {
                            shape.push_node(retag(source[id].detached()));
                        }
                    }
                }
                MorphologicalOutputAction::ModifyFromInput { part, fs } => {
                    let modification = fs.instantiate(&m.bindings)?;
                    if let Some((first, last)) = m.group_span(part) {
                        for id in source.range(first, last) {
                            let mut node = source[id].detached();
                            if node.node_type == NodeType::Segment {
                                node.fs.priority_union(&modification);
                            }
                            shape.push_node(retag(node));
                        }
                    }
                }
                MorphologicalOutputAction::InsertSegments { shape: insert } => {
                    for id in insert.iter() {
                        shape.push_node(insert[id].detached());
                    }
                }
                MorphologicalOutputAction::InsertSimpleContext { fs } => {
                    shape.push_node(ShapeNode::segment(fs.instantiate(&head.bindings)?));
                }
            }
        }
        shape.check_len(ctx.settings.max_shape_len)?;

        let mut out_fs = fs.clone();
        out_fs.priority_union(&rule.out_syntactic_fs);
        output.set_shape(shape);
        output.set_syntactic_fs(out_fs);
        output.mpr_features_mut().add_output(&subrule.out_mpr);
        Ok(output)
    }
}

impl Rule for SynthesisCompoundingRule {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let Some(rule) = ctx.language.compounding_rules.get(self.index) else {
            return Vec::new();
        };
        let Some(non_head) = input.non_heads().last() else {
            return Vec::new();
        };
        if non_head.rule != self.index || non_head.root.is_none() {
            return Vec::new();
        }
        if !rule.non_head_required_fs.is_unifiable(&non_head.syntactic_fs) {
            trace!(rule = %rule.name, "non-head features do not fit");
            return Vec::new();
        }
        let Some(fs) = rule
            .head_required_fs
            .unify(input.syntactic_fs(), &mut VariableBindings::new())
        else {
            return Vec::new();
        };

        let key = RuleKey::CompoundingRule(self.index);
        let mut output = Vec::new();
        for (i, (subrule, (head_matcher, non_head_matcher))) in
            rule.subrules.iter().zip(&self.matchers).enumerate()
        {
            if !subrule.admits(input) {
                continue;
            }
            let Some(head) = head_matcher.first_match(input.shape()) else {
                continue;
            };
            let Some(other) = non_head_matcher.first_match(&non_head.shape) else {
                continue;
            };
            match self.build(ctx, rule, subrule, input, &fs, &head, &other) {
                Ok(mut word) => {
                    if ctx.is_tracing(key) {
                        let event = TraceEvent::step(
                            TraceKind::MorphologicalRuleSynthesis,
                            key,
                            Some(i),
                            input,
                            &word,
                        );
                        word.record(event);
                    }
                    push_unique(&mut output, word);
                    break;
                }
                Err(err) => {
                    debug!(rule = %rule.name, subrule = i, error = %err, "dropping synthesis path");
                }
            }
        }
        output
    }
}

// ============================================================================
// Analysis
// ============================================================================

/// Analysis side of a [`CompoundingRule`].
#[derive(Debug, Clone)]
pub struct AnalysisCompoundingRule {
    index: usize,
    matchers: Vec<Matcher>,
}

impl AnalysisCompoundingRule {
    /// Compile compounding rule `index` of `language`.
    pub fn new(language: &Language, index: usize) -> Self {
        let matchers = language
            .compounding_rules
            .get(index)
            .map(|rule| {
                rule.subrules
                    .iter()
                    .map(|s| Matcher::new(rhs_pattern(&s.rhs, |p| s.part(p)), matcher_settings()))
                    .collect()
            })
            .unwrap_or_default();
        AnalysisCompoundingRule { index, matchers }
    }

    /// Index of the rule in the language.
    pub fn index(&self) -> usize {
        self.index
    }
}

impl Rule for AnalysisCompoundingRule {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let Some(rule) = ctx.language.compounding_rules.get(self.index) else {
            return Vec::new();
        };
        if input.compounding_count(self.index) >= rule.max_application_count {
            return Vec::new();
        }
        if !rule.out_syntactic_fs.is_unifiable(input.syntactic_fs()) {
            return Vec::new();
        }
        let mut base = input.syntactic_fs().clone();
        for (name, _) in rule.out_syntactic_fs.iter() {
            base.remove(name);
        }
        let Some(fs) = base.unify(&rule.head_required_fs, &mut VariableBindings::new()) else {
            return Vec::new();
        };

        let key = RuleKey::CompoundingRule(self.index);
        let mut output = Vec::new();
        for (i, (subrule, matcher)) in rule.subrules.iter().zip(&self.matchers).enumerate() {
            for m in matcher.every_match(input.shape()) {
                let mut head = Shape::new();
                rebuild(&mut head, input.shape(), &m, &subrule.head_lhs, &subrule.rhs);
                let mut non_head = Shape::new();
                rebuild(&mut non_head, input.shape(), &m, &subrule.non_head_lhs, &subrule.rhs);
                if head.check_len(ctx.settings.max_shape_len).is_err() {
                    continue;
                }

                let mut word = input.clone();
                word.set_shape(head);
                word.set_syntactic_fs(fs.clone());
                word.compounding_rule_unapplied(self.index, non_head);
                trace!(rule = %rule.name, subrule = i, shape = %word.shape(), "split compound");
                if ctx.is_tracing(key) {
                    let event = TraceEvent::step(
                        TraceKind::MorphologicalRuleAnalysis,
                        key,
                        Some(i),
                        input,
                        &word,
                    );
                    word.record(event);
                }
                push_unique(&mut output, word);
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_table::CharacterDefinitionTable;
    use crate::language::{AllomorphId, LexEntry, MorphemeId, RootAllomorph, Stratum};
    use crate::morpher::MorpherSettings;

    fn shape(segs: &str) -> Shape {
        let mut shape = Shape::new();
        for c in segs.chars() {
            shape.push(NodeType::Segment, FeatureStruct::new().with("seg", c.to_string().as_str()));
        }
        shape
    }

    fn names(shape: &Shape) -> String {
        shape
            .iter()
            .filter_map(|id| shape[id].fs.symbols("seg").map(|s| s.to_string()))
            .collect()
    }

    /// Nouns "ban" and "kup", one head-first compounding rule for nouns.
    fn language(subrule: CompoundingSubrule) -> Language {
        let noun = FeatureStruct::new().with("pos", "N");
        let mut lang = Language::new("t", CharacterDefinitionTable::new("t"));
        lang.add_stratum(Stratum::new("s"));
        lang.add_entry(0, LexEntry::new("ban", RootAllomorph::new(shape("ban"))).with_syntactic_fs(noun.clone()));
        lang.add_entry(0, LexEntry::new("kup", RootAllomorph::new(shape("kup"))).with_syntactic_fs(noun.clone()));
        lang.add_compounding_rule(
            0,
            CompoundingRule::new("NN", vec![subrule])
                .with_head_required_fs(noun.clone())
                .with_non_head_required_fs(noun)
                .with_out_fs(FeatureStruct::new().with("compound", "+")),
        );
        lang
    }

    fn root(entry: usize) -> AllomorphId {
        AllomorphId::new(MorphemeId::Entry(entry), 0)
    }

    fn head_word(lang: &Language) -> Word {
        let mut word = Word::from_root(lang, root(0), FeatureStruct::new(), &[]).unwrap();
        word.push_non_head(lang, 0, root(1)).unwrap();
        word
    }

    #[test]
    fn test_compound_synthesis() {
        let lang = language(CompoundingSubrule::head_first());
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let out = SynthesisCompoundingRule::new(&lang, 0).apply(&ctx, &head_word(&lang));

        assert_eq!(out.len(), 1);
        assert_eq!(names(out[0].shape()), "bankup");
        assert!(out[0].non_heads().is_empty());
        assert_eq!(out[0].morphemes(), vec![MorphemeId::Entry(0), MorphemeId::Entry(1)]);
        assert_eq!(out[0].shape().morphs().len(), 2);
        assert!(out[0].syntactic_fs().symbols("compound").is_some_and(|s| s.contains("+")));
    }

    #[test]
    fn test_non_head_first_with_linker() {
        let lang = language(CompoundingSubrule::non_head_first().with_linker(shape("o")));
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let out = SynthesisCompoundingRule::new(&lang, 0).apply(&ctx, &head_word(&lang));
        assert_eq!(names(out[0].shape()), "kupoban");
    }

    #[test]
    fn test_non_head_requirements() {
        let mut lang = language(CompoundingSubrule::head_first());
        lang.entries[1].syntactic_fs = FeatureStruct::new().with("pos", "V");
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let out = SynthesisCompoundingRule::new(&lang, 0).apply(&ctx, &head_word(&lang));
        assert!(out.is_empty());

        // a word without a queued non-head is left alone
        let bare = Word::from_root(&lang, root(0), FeatureStruct::new(), &[]).unwrap();
        assert!(SynthesisCompoundingRule::new(&lang, 0).apply(&ctx, &bare).is_empty());
    }

    #[test]
    fn test_compound_analysis_splits_every_way() {
        let lang = language(CompoundingSubrule::head_first());
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let mut surface = Word::for_analysis(shape("bankup"), 0);
        surface.set_syntactic_fs(FeatureStruct::new().with("compound", "+"));
        let out = AnalysisCompoundingRule::new(&lang, 0).apply(&ctx, &surface);

        let splits: Vec<(String, String)> = out
            .iter()
            .map(|w| (names(w.shape()), names(&w.non_heads()[0].shape)))
            .collect();
        assert_eq!(splits.len(), 5);
        assert!(splits.contains(&("ban".to_string(), "kup".to_string())));
        let ban = out.iter().find(|w| names(w.shape()) == "ban").unwrap();
        assert!(ban.non_heads()[0].root.is_none());
        assert!(ban.syntactic_fs().get("compound").is_none());
        assert!(ban.pending_rules().is_empty());

        // one compound per derivation
        assert!(AnalysisCompoundingRule::new(&lang, 0).apply(&ctx, ban).is_empty());
    }

    #[test]
    fn test_validation() {
        assert!(CompoundingRule::new("c", vec![CompoundingSubrule::head_first()]).validate().is_ok());
        assert!(CompoundingRule::new("c", Vec::new()).validate().is_err());

        let clash = CompoundingSubrule::new(
            vec![LhsPart::any("x")],
            vec![LhsPart::any("x")],
            vec![MorphologicalOutputAction::CopyFromInput { part: "x".into() }],
        );
        assert!(CompoundingRule::new("c", vec![clash]).validate().is_err());

        let mut undeclared = CompoundingSubrule::head_first();
        undeclared
            .rhs
            .push(MorphologicalOutputAction::CopyFromInput { part: "y".into() });
        assert!(CompoundingRule::new("c", vec![undeclared]).validate().is_err());
    }
}
