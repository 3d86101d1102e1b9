//! Applying affix process rules.

use tracing::debug;

use super::{AffixProcessAllomorph, AffixProcessRule, MorphologicalOutputAction};
use crate::error::Result;
use crate::feature::{FeatureStruct, FeatureValue, VariableBindings};
use crate::language::{AllomorphId, AllomorphRef, Language, MorphemeId};
use crate::morpher::{RuleKey, TraceEvent, TraceKind};
use crate::pattern::{Match, Matcher, MatcherSettings, NodeFilter};
use crate::rules::{push_unique, Rule, RuleContext};
use crate::shape::{NodeType, Shape, ShapeNode};
use crate::word::Word;

/// Synthesis side of an [`AffixProcessRule`].
#[derive(Debug, Clone)]
pub struct SynthesisAffixProcessRule {
    index: usize,
    matchers: Vec<Matcher>,
}

impl SynthesisAffixProcessRule {
    /// Compile rule `index` of `language`.
    pub fn new(language: &Language, index: usize) -> Self {
        let settings = MatcherSettings {
            filter: NodeFilter::SEGMENTS_AND_ANCHORS,
            ..Default::default()
        };
        let matchers = language
            .mrules
            .get(index)
            .map(|rule| {
                rule.allomorphs
                    .iter()
                    .map(|a| Matcher::new(a.lhs_pattern(), settings))
                    .collect()
            })
            .unwrap_or_default();
        SynthesisAffixProcessRule { index, matchers }
    }

    /// Index of the rule in the language.
    pub fn index(&self) -> usize {
        self.index
    }

    fn root_stem_name<'a>(language: &'a Language, word: &Word) -> Option<&'a str> {
        let root = language.root_allomorph(word.root()?)?;
        root.stem_name.as_ref().map(|s| s.name())
    }

    fn is_applicable(&self, ctx: &RuleContext<'_>, rule: &AffixProcessRule, input: &Word) -> bool {
        let selected = match &rule.realizational_fs {
            Some(fs) => fs.subsumes(input.realizational_fs()) && !is_realized(fs, input.syntactic_fs()),
            None => input.is_morphological_rule_applicable(self.index),
        };
        if !selected {
            return false;
        }
        if input.application_count(self.index) >= rule.max_application_count {
            return false;
        }
        match &rule.required_stem_name {
            Some(required) => {
                Self::root_stem_name(ctx.language, input) == Some(required.as_str())
            }
            None => true,
        }
    }

    fn build(
        &self,
        ctx: &RuleContext<'_>,
        rule: &AffixProcessRule,
        allomorph_index: usize,
        input: &Word,
        fs: &FeatureStruct,
        m: &Match,
    ) -> Result<Word> {
        let allomorph = &rule.allomorphs[allomorph_index];
        let id = AllomorphId::new(MorphemeId::Rule(self.index), allomorph_index);
        let mut output = input.clone();
        let tag = output.next_morph_tag(id);
        let source = input.shape();
        let mut shape = Shape::new();

        for action in &allomorph.rhs {
            match action {
                MorphologicalOutputAction::CopyFromInput { part } => {
                    if let Some((first, last)) = m.group_span(part) {
                        for node in source.range(first, last) {
                            shape.push_node(source[node].detached());
                        }
                    }
                }
                MorphologicalOutputAction::ModifyFromInput { part, fs } => {
                    let modification = fs.instantiate(&m.bindings)?;
                    if let Some((first, last)) = m.group_span(part) {
                        for node in source.range(first, last) {
                            let mut node = source[node].detached();
                            if node.node_type == NodeType::Segment {
                                node.fs.priority_union(&modification);
                            }
                            shape.push_node(node);
                        }
                    }
                }
                MorphologicalOutputAction::InsertSegments { shape: insert } => {
                    for node in insert.iter() {
                        shape.push_node(insert[node].detached().with_morph(Some(tag)));
                    }
                }
                MorphologicalOutputAction::InsertSimpleContext { fs } => {
                    let fs = fs.instantiate(&m.bindings)?;
                    shape.push_node(ShapeNode::segment(fs).with_morph(Some(tag)));
                }
            }
        }
        shape.check_len(ctx.settings.max_shape_len)?;

        let mut out_fs = fs.clone();
        out_fs.priority_union(&rule.out_syntactic_fs);
        if let Some(realized) = &rule.realizational_fs {
            out_fs.priority_union(realized);
        }
        output.set_shape(shape);
        output.set_syntactic_fs(out_fs);
        output.mpr_features_mut().add_output(&allomorph.out_mpr);
        output.morphological_rule_applied(self.index, id);
        Ok(output)
    }

    fn allomorph_admits(allomorph: &AffixProcessAllomorph, fs: &FeatureStruct, word: &Word) -> bool {
        if !allomorph.required_syntactic_fs.is_unifiable(fs) {
            return false;
        }
        if !allomorph.required_mpr.is_empty() && !allomorph.required_mpr.is_match(word.mpr_features()) {
            return false;
        }
        !allomorph.excluded_mpr.excludes(word.mpr_features())
    }
}

/// True when `syntactic_fs` already names every feature of a non-empty
/// realizational structure, so a more specific form has spelled it out.
fn is_realized(realizational_fs: &FeatureStruct, syntactic_fs: &FeatureStruct) -> bool {
    !realizational_fs.is_empty()
        && realizational_fs
            .iter()
            .all(|(name, value)| match (value, syntactic_fs.get(name)) {
                (FeatureValue::Complex(inner), Some(FeatureValue::Complex(outer))) => {
                    is_realized(inner, outer) || inner.is_empty()
                }
                (_, found) => found.is_some(),
            })
}

impl Rule for SynthesisAffixProcessRule {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let Some(rule) = ctx.language.mrules.get(self.index) else {
            return Vec::new();
        };
        if !self.is_applicable(ctx, rule, input) {
            return Vec::new();
        }
        let Some(fs) = rule
            .required_syntactic_fs
            .unify(input.syntactic_fs(), &mut VariableBindings::new())
        else {
            return Vec::new();
        };

        let key = RuleKey::MorphologicalRule(self.index);
        let mut output = Vec::new();
        for (i, (allomorph, matcher)) in rule.allomorphs.iter().zip(&self.matchers).enumerate() {
            if !Self::allomorph_admits(allomorph, &fs, input) {
                continue;
            }
            let Some(m) = matcher.first_match(input.shape()) else {
                continue;
            };
            match self.build(ctx, rule, i, input, &fs, &m) {
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
                }
                Err(err) => {
                    debug!(rule = %rule.name, allomorph = i, error = %err, "dropping synthesis path");
                    continue;
                }
            }

            // later allomorphs are only alternatives when this one is conditioned
            let fluctuates = rule.allomorphs.get(i + 1).is_some_and(|next| {
                AllomorphRef::Affix(allomorph).free_fluctuates_with(&AllomorphRef::Affix(next))
            });
            if allomorph.environments.is_empty()
                && allomorph.required_syntactic_fs.is_empty()
                && !fluctuates
            {
                break;
            }
        }
        output
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_table::CharacterDefinitionTable;
    use crate::constraints::{MprFeature, MprFeatureSet};
    use crate::language::{LexEntry, RootAllomorph, Stratum};
    use crate::morpher::MorpherSettings;
    use crate::morphology::{AffixProcessAllomorph, LhsPart, STEM};
    use crate::pattern::Pattern;

    fn seg(s: &str) -> FeatureStruct {
        FeatureStruct::new().with("seg", s)
    }

    fn shape(segs: &[&str]) -> Shape {
        let mut shape = Shape::new();
        for s in segs {
            shape.push(NodeType::Segment, seg(s));
        }
        shape
    }

    fn names(shape: &Shape) -> String {
        shape
            .iter()
            .filter_map(|id| shape[id].fs.symbols("seg").map(|s| s.to_string()))
            .collect()
    }

    fn language(rule: AffixProcessRule) -> Language {
        let mut lang = Language::new("t", CharacterDefinitionTable::new("t"));
        lang.add_stratum(Stratum::new("s"));
        lang.add_entry(
            0,
            LexEntry::new("kat", RootAllomorph::new(shape(&["k", "a", "t"])))
                .with_syntactic_fs(FeatureStruct::new().with("pos", "N")),
        );
        lang.add_mrule(0, rule);
        lang
    }

    fn root_word(lang: &Language) -> Word {
        Word::from_root(
            lang,
            AllomorphId::new(MorphemeId::Entry(0), 0),
            FeatureStruct::new(),
            &[0],
        )
        .unwrap()
    }

    #[test]
    fn test_suffix_applies_and_updates_features() {
        let rule = AffixProcessRule::new("pl", vec![AffixProcessAllomorph::suffix(shape(&["z"]))])
            .with_required_fs(FeatureStruct::new().with("pos", "N"))
            .with_out_fs(FeatureStruct::new().with("num", "pl"));
        let lang = language(rule);
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let compiled = SynthesisAffixProcessRule::new(&lang, 0);

        let out = compiled.apply(&ctx, &root_word(&lang));
        assert_eq!(out.len(), 1);
        assert_eq!(names(out[0].shape()), "katz");
        assert!(out[0].syntactic_fs().symbols("num").is_some_and(|s| s.contains("pl")));
        assert!(out[0].pending_rules().is_empty());
        assert_eq!(out[0].shape().morphs().len(), 2);

        // not pending any more
        assert!(compiled.apply(&ctx, &out[0]).is_empty());
    }

    #[test]
    fn test_required_features_block_rule() {
        let rule = AffixProcessRule::new("pl", vec![AffixProcessAllomorph::suffix(shape(&["z"]))])
            .with_required_fs(FeatureStruct::new().with("pos", "V"));
        let lang = language(rule);
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let out = SynthesisAffixProcessRule::new(&lang, 0).apply(&ctx, &root_word(&lang));
        assert!(out.is_empty());
    }

    #[test]
    fn test_reduplication_and_modification() {
        let allo = AffixProcessAllomorph::new(
            vec![
                LhsPart::new("c", Pattern::segments([FeatureStruct::new()])),
                LhsPart::any(STEM),
            ],
            vec![
                MorphologicalOutputAction::ModifyFromInput {
                    part: "c".into(),
                    fs: seg("g"),
                },
                MorphologicalOutputAction::CopyFromInput { part: "c".into() },
                MorphologicalOutputAction::CopyFromInput { part: STEM.into() },
            ],
        );
        let lang = language(AffixProcessRule::new("redup", vec![allo]));
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let out = SynthesisAffixProcessRule::new(&lang, 0).apply(&ctx, &root_word(&lang));
        assert_eq!(out.len(), 1);
        assert_eq!(names(out[0].shape()), "gkat");
    }

    #[test]
    fn test_first_unconditioned_allomorph_wins() {
        let plain = AffixProcessAllomorph::suffix(shape(&["z"]));
        let other = AffixProcessAllomorph::suffix(shape(&["s"]));
        let lang = language(AffixProcessRule::new("pl", vec![plain, other]));
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let out = SynthesisAffixProcessRule::new(&lang, 0).apply(&ctx, &root_word(&lang));
        assert_eq!(out.len(), 1);
        assert_eq!(names(out[0].shape()), "katz");
    }

    #[test]
    fn test_mpr_requirements() {
        let mut allo = AffixProcessAllomorph::suffix(shape(&["z"]));
        allo.required_mpr = MprFeatureSet::from_iter([MprFeature::new("irregular")]);
        let lang = language(AffixProcessRule::new("pl", vec![allo]));
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let compiled = SynthesisAffixProcessRule::new(&lang, 0);
        assert!(compiled.apply(&ctx, &root_word(&lang)).is_empty());

        let mut word = root_word(&lang);
        word.mpr_features_mut().insert(MprFeature::new("irregular"));
        assert_eq!(compiled.apply(&ctx, &word).len(), 1);
    }

    fn realizational_language(entry_fs: FeatureStruct) -> Language {
        let mut lang = Language::new("t", CharacterDefinitionTable::new("t"));
        lang.add_stratum(Stratum::new("s"));
        lang.add_entry(
            0,
            LexEntry::new("sag", RootAllomorph::new(shape(&["s", "a", "g"]))).with_syntactic_fs(entry_fs),
        );
        lang.add_template_rule(
            0,
            AffixProcessRule::realizational(
                "PAST",
                FeatureStruct::new().with("tense", "past"),
                vec![AffixProcessAllomorph::suffix(shape(&["d"]))],
            ),
        );
        lang
    }

    fn bare_root(lang: &Language) -> Word {
        Word::from_root(lang, AllomorphId::new(MorphemeId::Entry(0), 0), FeatureStruct::new(), &[]).unwrap()
    }

    #[test]
    fn test_realizational_rule_follows_features() {
        let lang = realizational_language(FeatureStruct::new().with("pos", "V"));
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let compiled = SynthesisAffixProcessRule::new(&lang, 0);

        // nothing pending, nothing requested
        assert!(compiled.apply(&ctx, &bare_root(&lang)).is_empty());

        let past = bare_root(&lang).with_realizational_fs(
            FeatureStruct::new().with("tense", "past").with("pers", "3"),
        );
        let out = compiled.apply(&ctx, &past);
        assert_eq!(out.len(), 1);
        assert_eq!(names(out[0].shape()), "sagd");
        assert!(out[0].syntactic_fs().symbols("tense").is_some_and(|s| s.contains("past")));
        assert_eq!(out[0].morphemes(), vec![MorphemeId::Entry(0), MorphemeId::Rule(0)]);

        let present = bare_root(&lang).with_realizational_fs(FeatureStruct::new().with("tense", "pres"));
        assert!(compiled.apply(&ctx, &present).is_empty());
    }

    #[test]
    fn test_realizational_rule_blocked_by_lexical_form() {
        // an irregular root that already carries the tense
        let lang = realizational_language(FeatureStruct::new().with("tense", "past"));
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let word = bare_root(&lang).with_realizational_fs(FeatureStruct::new().with("tense", "past"));
        assert!(SynthesisAffixProcessRule::new(&lang, 0).apply(&ctx, &word).is_empty());
    }

    #[test]
    fn test_max_shape_len_drops_path() {
        let lang = language(AffixProcessRule::new(
            "pl",
            vec![AffixProcessAllomorph::suffix(shape(&["z", "z"]))],
        ));
        let settings = MorpherSettings {
            max_shape_len: 4,
            ..Default::default()
        };
        let ctx = RuleContext::new(&lang, &settings);
        let out = SynthesisAffixProcessRule::new(&lang, 0).apply(&ctx, &root_word(&lang));
        assert!(out.is_empty());
    }
}
