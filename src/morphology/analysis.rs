//! Unapplying affix process rules.
//!
//! The right-hand side of each allomorph is turned into a pattern: copied
//! parts become groups holding the part's own constraints, modified parts
//! hold those constraints overwritten by the modification, and inserted
//! material becomes literal constraints. Every way the pattern covers the
//! word yields one candidate underlying form, rebuilt part by part from the
//! left-hand side. Material the rule deleted comes back as optional segments.

use tracing::{debug, trace};

use super::{AffixProcessAllomorph, AffixProcessRule, LhsPart, MorphologicalOutputAction};
use crate::feature::{FeatureStruct, FeatureValue, VariableBindings};
use crate::language::Language;
use crate::morpher::{RuleKey, TraceEvent, TraceKind};
use crate::pattern::{
    ConstraintKind, Match, Matcher, MatcherSettings, NodeFilter, Pattern, PatternNode,
};
use crate::rules::{push_unique, Rule, RuleContext};
use crate::shape::{NodeType, Shape, ShapeNode};
use crate::word::Word;

/// Analysis side of an [`AffixProcessRule`].
#[derive(Debug, Clone)]
pub struct AnalysisAffixProcessRule {
    index: usize,
    matchers: Vec<Matcher>,
}

impl AnalysisAffixProcessRule {
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
                    .map(|a| Matcher::new(rhs_pattern(&a.rhs, |p| a.lhs_part(p)), settings))
                    .collect()
            })
            .unwrap_or_default();
        AnalysisAffixProcessRule { index, matchers }
    }

    /// Index of the rule in the language.
    pub fn index(&self) -> usize {
        self.index
    }

    fn unapply(
        &self,
        ctx: &RuleContext<'_>,
        rule: &AffixProcessRule,
        allomorph: &AffixProcessAllomorph,
        input: &Word,
        fs: &FeatureStruct,
        m: &Match,
    ) -> Option<Word> {
        let mut shape = Shape::new();
        rebuild(&mut shape, input.shape(), m, &allomorph.lhs, &allomorph.rhs);
        if let Err(err) = shape.check_len(ctx.settings.max_shape_len) {
            debug!(rule = %rule.name, error = %err, "dropping analysis path");
            return None;
        }

        let mut output = input.clone();
        output.set_shape(shape);
        output.set_syntactic_fs(fs.clone());
        match &rule.realizational_fs {
            Some(realized) => output.realizational_rule_unapplied(self.index, realized)?,
            None => output.morphological_rule_unapplied(self.index),
        }
        Some(output)
    }
}

impl Rule for AnalysisAffixProcessRule {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let Some(rule) = ctx.language.mrules.get(self.index) else {
            return Vec::new();
        };
        if input.unapplication_count(self.index) >= rule.max_application_count {
            return Vec::new();
        }
        if !rule.out_syntactic_fs.is_unifiable(input.syntactic_fs()) {
            return Vec::new();
        }
        let realized = rule.realizational_fs.as_ref();
        if realized.is_some_and(|fs| !fs.is_unifiable(input.syntactic_fs())) {
            return Vec::new();
        }
        // features the rule wrote are unknown underneath
        let mut base = input.syntactic_fs().clone();
        for (name, _) in rule.out_syntactic_fs.iter().chain(realized.into_iter().flat_map(|fs| fs.iter())) {
            base.remove(name);
        }
        let Some(base) = base.unify(&rule.required_syntactic_fs, &mut VariableBindings::new())
        else {
            return Vec::new();
        };

        let key = RuleKey::MorphologicalRule(self.index);
        let mut output = Vec::new();
        for (i, (allomorph, matcher)) in rule.allomorphs.iter().zip(&self.matchers).enumerate() {
            let Some(fs) = base.unify(&allomorph.required_syntactic_fs, &mut VariableBindings::new())
            else {
                continue;
            };
            for m in matcher.every_match(input.shape()) {
                let Some(mut word) = self.unapply(ctx, rule, allomorph, input, &fs, &m) else {
                    continue;
                };
                trace!(rule = %rule.name, allomorph = i, shape = %word.shape(), "unapplied");
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

/// Analysis pattern for a right-hand side; `lhs_part` resolves part names.
pub(super) fn rhs_pattern<'a>(
    rhs: &'a [MorphologicalOutputAction],
    lhs_part: impl Fn(&str) -> Option<&'a LhsPart>,
) -> Pattern {
    let mut pattern = Pattern::new().then(PatternNode::anchor());
    let mut seen: Vec<&str> = Vec::new();
    for (k, action) in rhs.iter().enumerate() {
        match action {
            MorphologicalOutputAction::CopyFromInput { part }
            | MorphologicalOutputAction::ModifyFromInput { part, .. } => {
                let Some(lhs) = lhs_part(part) else {
                    continue;
                };
                let mut nodes = lhs.pattern.clone();
                if let MorphologicalOutputAction::ModifyFromInput { fs, .. } = action {
                    nodes = nodes.map(|c| {
                        let mut c = c.clone();
                        if c.kind == ConstraintKind::Segment {
                            c.fs.priority_union(fs);
                        }
                        Some(c)
                    });
                }
                // a part realized twice is only read back from its first copy
                let name = if seen.contains(&part.as_str()) {
                    format!("{}#{}", part, k)
                } else {
                    seen.push(part);
                    part.clone()
                };
                pattern.push(PatternNode::group(&name, nodes.nodes().to_vec()));
            }
            MorphologicalOutputAction::InsertSegments { shape } => {
                for id in shape.iter() {
                    if shape[id].node_type == NodeType::Segment {
                        pattern.push(PatternNode::segment(shape[id].fs.clone()));
                    }
                }
            }
            MorphologicalOutputAction::InsertSimpleContext { fs } => {
                pattern.push(PatternNode::segment(fs.clone()));
            }
        }
    }
    pattern.then(PatternNode::anchor())
}

/// Rebuild the input parts `lhs` from a match of the right-hand side `rhs`
/// against `source`, appending them to `shape`.
pub(super) fn rebuild(
    shape: &mut Shape,
    source: &Shape,
    m: &Match,
    lhs: &[LhsPart],
    rhs: &[MorphologicalOutputAction],
) {
    for part in lhs {
        let action = rhs.iter().find(|a| a.part() == Some(part.name.as_str()));
        match action {
            Some(MorphologicalOutputAction::ModifyFromInput { fs: modified, .. }) => {
                let constraints: Vec<_> = part.pattern.constraints();
                let nodes = group_nodes(source, m, &part.name);
                let segments = nodes
                    .iter()
                    .filter(|&&n| source[n].node_type == NodeType::Segment)
                    .count();
                let paired = constraints.len() == segments;
                let mut segment = 0;
                for id in nodes {
                    let mut node = source[id].detached();
                    if node.node_type == NodeType::Segment {
                        let constraint = if paired { constraints.get(segment).copied() } else { None };
                        unmodify(&mut node.fs, modified, constraint.map(|c| &c.fs));
                        segment += 1;
                    }
                    shape.push_node(node);
                }
            }
            Some(_) => {
                for id in group_nodes(source, m, &part.name) {
                    shape.push_node(source[id].detached());
                }
            }
            None => restore_deleted(shape, part, &m.bindings),
        }
    }
}

/// Every node of a captured group, boundaries included.
fn group_nodes(shape: &Shape, m: &Match, name: &str) -> Vec<crate::shape::NodeId> {
    match m.group_span(name) {
        Some((first, last)) => shape.range(first, last),
        None => Vec::new(),
    }
}

/// Undo a modification: each modified feature goes back to what the
/// left-hand side allowed, or becomes unconstrained.
fn unmodify(fs: &mut FeatureStruct, modified: &FeatureStruct, lhs: Option<&FeatureStruct>) {
    for (name, _) in modified.iter() {
        match lhs.and_then(|l| l.get(name)) {
            Some(value @ FeatureValue::Symbol(_)) => fs.set(name, value.clone()),
            _ => {
                fs.remove(name);
            }
        }
    }
}

/// Re-insert a part the rule did not realize, as optional segments.
fn restore_deleted(shape: &mut Shape, part: &LhsPart, bindings: &VariableBindings) {
    if !part.pattern.is_simple() {
        return;
    }
    for c in part.pattern.constraints() {
        if c.kind == ConstraintKind::Segment {
            shape.push_node(ShapeNode::segment(c.fs.instantiate_partial(bindings)).optional());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_table::CharacterDefinitionTable;
    use crate::language::Stratum;
    use crate::morpher::MorpherSettings;
    use crate::morphology::STEM;

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
            .map(|id| {
                let s = shape[id].fs.symbols("seg").map(|s| s.to_string()).unwrap_or("_".into());
                if shape[id].optional {
                    format!("({})", s)
                } else {
                    s
                }
            })
            .collect()
    }

    fn language(rule: AffixProcessRule) -> Language {
        let mut lang = Language::new("t", CharacterDefinitionTable::new("t"));
        lang.add_stratum(Stratum::new("s"));
        lang.add_mrule(0, rule);
        lang
    }

    #[test]
    fn test_suffix_unapplies() {
        let rule = AffixProcessRule::new("pl", vec![AffixProcessAllomorph::suffix(shape(&["z"]))])
            .with_out_fs(FeatureStruct::new().with("num", "pl"));
        let lang = language(rule);
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let compiled = AnalysisAffixProcessRule::new(&lang, 0);

        let mut word = Word::for_analysis(shape(&["k", "a", "t", "z"]), 0);
        word.set_syntactic_fs(FeatureStruct::new().with("num", "pl"));
        let out = compiled.apply(&ctx, &word);
        assert_eq!(out.len(), 1);
        assert_eq!(names(out[0].shape()), "kat");
        assert_eq!(out[0].pending_rules(), &[0]);
        assert!(out[0].syntactic_fs().get("num").is_none());

        // the affix is missing
        assert!(compiled
            .apply(&ctx, &Word::for_analysis(shape(&["k", "a", "t"]), 0))
            .is_empty());
        // already unapplied once
        assert!(compiled.apply(&ctx, &out[0]).is_empty());
    }

    #[test]
    fn test_out_features_must_unify() {
        let rule = AffixProcessRule::new("pl", vec![AffixProcessAllomorph::suffix(shape(&["z"]))])
            .with_out_fs(FeatureStruct::new().with("num", "pl"));
        let lang = language(rule);
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let mut word = Word::for_analysis(shape(&["k", "a", "t", "z"]), 0);
        word.set_syntactic_fs(FeatureStruct::new().with("num", "sg"));
        assert!(AnalysisAffixProcessRule::new(&lang, 0).apply(&ctx, &word).is_empty());
    }

    #[test]
    fn test_truncation_restores_optional_segment() {
        let allo = AffixProcessAllomorph::new(
            vec![
                LhsPart::any(STEM),
                LhsPart::new("last", Pattern::segments([seg("t")])),
            ],
            vec![MorphologicalOutputAction::CopyFromInput { part: STEM.into() }],
        );
        let lang = language(AffixProcessRule::new("trunc", vec![allo]));
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let out = AnalysisAffixProcessRule::new(&lang, 0)
            .apply(&ctx, &Word::for_analysis(shape(&["k", "a"]), 0));
        assert_eq!(out.len(), 1);
        assert_eq!(names(out[0].shape()), "ka(t)");
    }

    #[test]
    fn test_modification_is_widened() {
        let allo = AffixProcessAllomorph::new(
            vec![
                LhsPart::new("c", Pattern::segments([FeatureStruct::new().with("cons", "+")])),
                LhsPart::any(STEM),
            ],
            vec![
                MorphologicalOutputAction::ModifyFromInput {
                    part: "c".into(),
                    fs: FeatureStruct::new().with("voice", "+"),
                },
                MorphologicalOutputAction::CopyFromInput { part: STEM.into() },
            ],
        );
        let lang = language(AffixProcessRule::new("voice", vec![allo]));
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let mut surface = Shape::new();
        surface.push(
            NodeType::Segment,
            seg("g").with("cons", "+").with("voice", "+"),
        );
        surface.push(NodeType::Segment, seg("a"));
        let out = AnalysisAffixProcessRule::new(&lang, 0).apply(&ctx, &Word::for_analysis(surface, 0));
        assert_eq!(out.len(), 1);
        let first = out[0].shape().iter().next().unwrap();
        assert!(out[0].shape()[first].fs.get("voice").is_none());
    }
}
