//! Unapplying rewrite rules.
//!
//! Analysis works on surface forms, so boundaries are ignored and the scan
//! runs against the rule's direction. A rewrite cannot be undone exactly;
//! each unapplication widens the word instead:
//!
//! - feature changes widen the changed features to admit the underlying values
//! - a narrowed target gets the underlying segments back as optional nodes, and
//!   its replacement becomes optional
//! - epenthetic segments become optional

use tracing::trace;

use super::types::{
    anchors_in_place, rule_pattern, target_nodes, ReapplyType, RewriteRule, SubruleKind, TARGET,
};
use crate::error::Result;
use crate::feature::{FeatureStruct, FeatureValue};
use crate::language::Language;
use crate::morpher::{RuleKey, TraceEvent, TraceKind};
use crate::pattern::{Match, Matcher, MatcherSettings, NodeFilter, Pattern};
use crate::rules::{InPlaceRule, RuleContext};
use crate::shape::{Shape, ShapeNode};
use crate::word::Word;

#[derive(Debug, Clone)]
struct Subrule {
    kind: SubruleKind,
    matcher: Matcher,
}

/// Analysis side of a [`RewriteRule`].
#[derive(Debug, Clone)]
pub struct AnalysisRewriteRule {
    index: usize,
    reapply: ReapplyType,
    subrules: Vec<Subrule>,
}

impl AnalysisRewriteRule {
    /// Compile phonological rule `index` of `language`.
    pub fn new(language: &Language, index: usize) -> Self {
        let Some(rule) = language.prules.get(index) else {
            return AnalysisRewriteRule {
                index,
                reapply: ReapplyType::Normal,
                subrules: Vec::new(),
            };
        };
        let settings = MatcherSettings {
            filter: NodeFilter::SEGMENTS_AND_ANCHORS,
            direction: rule.direction.opposite(),
        };
        let subrules = rule
            .subrules
            .iter()
            .map(|s| {
                let kind = rule.subrule_kind(s);
                let target = match kind {
                    SubruleKind::FeatureChange => feature_change_target(&rule.lhs, &s.rhs),
                    SubruleKind::Narrow | SubruleKind::Epenthesis => s.rhs.clone(),
                };
                Subrule {
                    kind,
                    matcher: Matcher::new(
                        rule_pattern(
                            &s.left_env.without_boundaries(),
                            target_nodes(&target, true),
                            &s.right_env.without_boundaries(),
                        ),
                        settings,
                    ),
                }
            })
            .collect();
        AnalysisRewriteRule {
            index,
            reapply: rule.reapply_type(),
            subrules,
        }
    }

    /// Index of the rule in the language.
    pub fn index(&self) -> usize {
        self.index
    }

    fn unrewrite(&self, rule: &RewriteRule, subrule: usize, shape: &mut Shape, m: &Match) {
        let rhs = rule.subrules[subrule].rhs.constraints();
        let lhs = rule.lhs.constraints();
        let targets = m.group(TARGET).to_vec();
        match self.subrules[subrule].kind {
            SubruleKind::FeatureChange => {
                for ((&id, l), r) in targets.iter().zip(&lhs).zip(&rhs) {
                    let node = &mut shape[id];
                    widen(&mut node.fs, &l.fs, &r.fs);
                    node.searched = true;
                }
            }
            SubruleKind::Narrow => {
                // the underlying node goes after the replacement, or where it would
                // have been when nothing replaced it
                let anchor = targets
                    .last()
                    .copied()
                    .or_else(|| m.group_before(TARGET))
                    .unwrap_or_else(|| shape.begin());
                let mut at = anchor;
                for c in &lhs {
                    let mut node = ShapeNode::segment(c.fs.instantiate_partial(&m.bindings)).optional();
                    node.searched = true;
                    at = shape.insert_after(at, node);
                }
                for id in targets {
                    let node = &mut shape[id];
                    node.optional = true;
                    node.searched = true;
                }
            }
            SubruleKind::Epenthesis => {
                for id in targets {
                    let node = &mut shape[id];
                    node.optional = true;
                    node.searched = true;
                }
            }
        }
    }

    fn pass(&self, ctx: &RuleContext<'_>, rule: &RewriteRule, word: &mut Word) -> Result<bool> {
        let mut changed = false;
        for (i, subrule) in self.subrules.iter().enumerate() {
            loop {
                let shape = word.shape();
                let found = subrule.matcher.find_from(shape, None, &Default::default(), |m| {
                    anchors_in_place(shape, m)
                        && !(m.group(TARGET).is_empty() && !insertion_open(shape, m))
                });
                let Some(m) = found else {
                    break;
                };
                self.unrewrite(rule, i, word.shape_mut(), &m);
                word.shape().check_len(ctx.settings.max_shape_len)?;
                changed = true;
            }
        }
        Ok(changed)
    }
}

/// An empty target can take back deleted material only between two visible
/// nodes (anchors included) that this pass has not restored yet.
fn insertion_open(shape: &Shape, m: &Match) -> bool {
    match (m.group_before(TARGET), m.group_after(TARGET)) {
        (Some(before), Some(after)) => !shape[before].searched && !shape[after].searched,
        _ => false,
    }
}

/// Surface target of a feature change: each `lhs` constraint overwritten by
/// its replacement.
fn feature_change_target(lhs: &Pattern, rhs: &Pattern) -> Pattern {
    let rhs = rhs.constraints();
    let mut k = 0;
    lhs.map(|c| {
        let mut c = c.clone();
        if let Some(r) = rhs.get(k) {
            c.fs.priority_union(&r.fs.without_variables());
        }
        k += 1;
        Some(c)
    })
}

/// Let each feature the rule wrote take either the written value or the
/// value the rule started from.
fn widen(fs: &mut FeatureStruct, lhs: &FeatureStruct, rhs: &FeatureStruct) {
    for (name, written) in rhs.iter() {
        let widened = match (lhs.get(name), written) {
            (Some(FeatureValue::Symbol(before)), FeatureValue::Symbol(after)) => {
                Some(before.union(after))
            }
            _ => None,
        };
        match widened {
            Some(set) if !set.is_any() => fs.set(name, FeatureValue::Symbol(set)),
            _ => {
                fs.remove(name);
            }
        }
    }
}

impl InPlaceRule for AnalysisRewriteRule {
    fn apply_in_place(&self, ctx: &RuleContext<'_>, word: &mut Word) -> Result<bool> {
        let Some(rule) = ctx.language.prules.get(self.index) else {
            return Ok(false);
        };
        let key = RuleKey::PhonologicalRule(self.index);
        let snapshot = ctx.is_tracing(key).then(|| word.clone());
        let passes = match self.reapply {
            ReapplyType::Deletion => 1 + ctx.settings.deletion_reapplications,
            ReapplyType::Normal | ReapplyType::SelfOpaquing => 1,
        };

        let mut changed = false;
        for _ in 0..passes {
            word.shape_mut().clear_searched();
            let pass_changed = self.pass(ctx, rule, word)?;
            changed |= pass_changed;
            if !pass_changed {
                break;
            }
        }
        word.shape_mut().clear_searched();

        if changed {
            trace!(rule = %rule.name, shape = %word.shape(), "unrewrote");
            if let Some(input) = snapshot {
                let event = TraceEvent::step(TraceKind::PhonologicalRuleAnalysis, key, None, &input, word);
                word.record(event);
            }
        }
        Ok(changed)
    }
}
