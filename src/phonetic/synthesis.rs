//! Applying rewrite rules.

use std::cmp::Ordering;

use tracing::trace;

use super::types::{
    anchors_in_place, rule_pattern, target_nodes, ApplicationMode, ReapplyType, RewriteRule, SubruleKind, TARGET,
};
use crate::error::Result;
use crate::language::Language;
use crate::morpher::{RuleKey, TraceEvent, TraceKind};
use crate::pattern::{Match, Matcher, MatcherSettings, NodeFilter};
use crate::rules::{InPlaceRule, RuleContext};
use crate::shape::{Direction, NodeId, Shape, ShapeNode};
use crate::word::Word;

#[derive(Debug, Clone)]
struct Subrule {
    kind: SubruleKind,
    matcher: Matcher,
}

/// Synthesis side of a [`RewriteRule`].
#[derive(Debug, Clone)]
pub struct SynthesisRewriteRule {
    index: usize,
    direction: Direction,
    mode: ApplicationMode,
    reapply: ReapplyType,
    subrules: Vec<Subrule>,
}

impl SynthesisRewriteRule {
    /// Compile phonological rule `index` of `language`.
    pub fn new(language: &Language, index: usize) -> Self {
        let Some(rule) = language.prules.get(index) else {
            return SynthesisRewriteRule {
                index,
                direction: Direction::LeftToRight,
                mode: ApplicationMode::Iterative,
                reapply: ReapplyType::Normal,
                subrules: Vec::new(),
            };
        };
        let settings = MatcherSettings {
            filter: NodeFilter::ALL,
            direction: rule.direction,
        };
        let iterative = rule.application_mode == ApplicationMode::Iterative;
        let subrules = rule
            .subrules
            .iter()
            .map(|s| Subrule {
                kind: rule.subrule_kind(s),
                matcher: Matcher::new(
                    rule_pattern(&s.left_env, target_nodes(&rule.lhs, iterative), &s.right_env),
                    settings,
                ),
            })
            .collect();
        SynthesisRewriteRule {
            index,
            direction: rule.direction,
            mode: rule.application_mode,
            reapply: rule.reapply_type(),
            subrules,
        }
    }

    /// Index of the rule in the language.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Position a match rewrites at: its first target node, or the node an
    /// insertion goes in front of.
    fn target_position(m: &Match) -> Option<NodeId> {
        m.group(TARGET).first().copied().or_else(|| m.group_after(TARGET))
    }

    /// An empty target next to material this pass already produced is refused.
    fn insertion_blocked(shape: &Shape, m: &Match) -> bool {
        [m.group_before(TARGET), m.group_after(TARGET)]
            .into_iter()
            .flatten()
            .any(|id| shape[id].searched)
    }

    /// Earliest match in scan order over the admitted subrules; ties go to
    /// the first subrule.
    fn find(
        &self,
        shape: &Shape,
        admitted: &[usize],
        from: Option<NodeId>,
        mut accept: impl FnMut(&Match) -> bool,
    ) -> Option<(usize, Match)> {
        let mut best: Option<(usize, Match, NodeId)> = None;
        for &i in admitted {
            let subrule = &self.subrules[i];
            let found = subrule.matcher.find_from(shape, from, &Default::default(), |m| {
                if !anchors_in_place(shape, m) {
                    return false;
                }
                if subrule.kind == SubruleKind::Epenthesis && Self::insertion_blocked(shape, m) {
                    return false;
                }
                accept(m)
            });
            let Some(m) = found else {
                continue;
            };
            let Some(pos) = Self::target_position(&m) else {
                continue;
            };
            let better = match &best {
                None => true,
                Some((_, _, b)) => {
                    let ord = shape.compare(pos, *b);
                    match self.direction {
                        Direction::LeftToRight => ord == Ordering::Less,
                        Direction::RightToLeft => ord == Ordering::Greater,
                    }
                }
            };
            if better {
                best = Some((i, m, pos));
            }
        }
        best.map(|(i, m, _)| (i, m))
    }

    fn rewrite(&self, rule: &RewriteRule, subrule: usize, shape: &mut Shape, m: &Match) -> Result<()> {
        let rhs = rule.subrules[subrule].rhs.constraints();
        let targets = m.group(TARGET).to_vec();
        match self.subrules[subrule].kind {
            SubruleKind::FeatureChange => {
                for (&id, c) in targets.iter().zip(&rhs) {
                    if !shape.contains(id) {
                        continue;
                    }
                    let fs = c.fs.instantiate(&m.bindings)?;
                    let node = &mut shape[id];
                    node.fs.priority_union(&fs);
                    node.searched = true;
                }
            }
            SubruleKind::Narrow => {
                let Some(&first) = targets.iter().find(|&&id| shape.contains(id)) else {
                    return Ok(());
                };
                let morph = shape[first].morph;
                for c in &rhs {
                    let mut node = ShapeNode::segment(c.fs.instantiate(&m.bindings)?).with_morph(morph);
                    node.searched = true;
                    shape.insert_before(first, node);
                }
                for id in targets {
                    if shape.contains(id) {
                        shape.remove(id);
                    }
                }
            }
            SubruleKind::Epenthesis => {
                let after = m.group_after(TARGET).filter(|&id| shape.contains(id));
                let before = m.group_before(TARGET).filter(|&id| shape.contains(id));
                let morph = before.and_then(|id| shape[id].morph);
                let mut prev = before;
                for c in &rhs {
                    let mut node = ShapeNode::segment(c.fs.instantiate(&m.bindings)?).with_morph(morph);
                    node.searched = true;
                    let id = match (after, prev) {
                        (Some(a), _) => shape.insert_before(a, node),
                        (None, Some(p)) => shape.insert_after(p, node),
                        (None, None) => shape.push_node(node),
                    };
                    prev = Some(id);
                }
            }
        }
        Ok(())
    }

    fn pass(&self, rule: &RewriteRule, word: &mut Word, admitted: &[usize]) -> Result<bool> {
        let mut changed = false;
        match self.mode {
            ApplicationMode::Iterative => {
                let mut from = None;
                while let Some((i, m)) = self.find(word.shape(), admitted, from, |_| true) {
                    let before = m.before();
                    let start = m.first();
                    self.rewrite(rule, i, word.shape_mut(), &m)?;
                    changed = true;
                    // resume at the match start so rewritten nodes can act as
                    // environment; searched targets are not matched twice
                    let shape = word.shape();
                    from = match self.direction {
                        Direction::LeftToRight => before.and_then(|b| shape.next(b)),
                        Direction::RightToLeft => start.filter(|&s| shape.contains(s)).or(before),
                    };
                }
            }
            ApplicationMode::Simultaneous => {
                let shape = word.shape();
                let mut found: Vec<(usize, Match)> = Vec::new();
                let mut from = None;
                let mut last_target: Option<NodeId> = None;
                loop {
                    let dir = self.direction;
                    let next = self.find(shape, admitted, from, |m| match (last_target, Self::target_position(m)) {
                        (Some(last), Some(pos)) => match dir {
                            Direction::LeftToRight => shape.compare(pos, last).is_gt(),
                            Direction::RightToLeft => shape.compare(pos, last).is_lt(),
                        },
                        _ => true,
                    });
                    let Some((i, m)) = next else {
                        break;
                    };
                    let Some(start) = m.first() else {
                        break;
                    };
                    last_target = match dir {
                        Direction::LeftToRight => m.group(TARGET).last().copied().or(Self::target_position(&m)),
                        Direction::RightToLeft => Self::target_position(&m),
                    };
                    from = shape.step(start, dir);
                    found.push((i, m));
                    if from.is_none() {
                        break;
                    }
                }
                for (i, m) in &found {
                    self.rewrite(rule, *i, word.shape_mut(), m)?;
                    changed = true;
                }
            }
        }
        Ok(changed)
    }
}

impl InPlaceRule for SynthesisRewriteRule {
    fn apply_in_place(&self, ctx: &RuleContext<'_>, word: &mut Word) -> Result<bool> {
        let Some(rule) = ctx.language.prules.get(self.index) else {
            return Ok(false);
        };
        let admitted: Vec<usize> = rule
            .subrules
            .iter()
            .enumerate()
            .filter(|(_, s)| s.admits(word.syntactic_fs(), word.mpr_features()))
            .map(|(i, _)| i)
            .collect();
        if admitted.is_empty() {
            return Ok(false);
        }

        let key = RuleKey::PhonologicalRule(self.index);
        let snapshot = ctx.is_tracing(key).then(|| word.clone());
        // one pass; search marks keep a rule off its own output
        let passes = match self.reapply {
            ReapplyType::Deletion => 1 + ctx.settings.deletion_reapplications,
            ReapplyType::Normal | ReapplyType::SelfOpaquing => 1,
        };

        let mut changed = false;
        for _ in 0..passes {
            word.shape_mut().clear_searched();
            let pass_changed = self.pass(rule, word, &admitted)?;
            word.shape().check_len(ctx.settings.max_shape_len)?;
            changed |= pass_changed;
            if !pass_changed {
                break;
            }
        }
        word.shape_mut().clear_searched();

        if changed {
            trace!(rule = %rule.name, shape = %word.shape(), "rewrote");
            if let Some(input) = snapshot {
                let event = TraceEvent::step(TraceKind::PhonologicalRuleSynthesis, key, None, &input, word);
                word.record(event);
            }
        }
        Ok(changed)
    }
}

