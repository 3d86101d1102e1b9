//! Type definitions for phonological rewrite rules.
//!
//! A rule rewrites a target sequence `lhs` into each subrule's `rhs` when the
//! target sits between the subrule's left and right environments:
//!
//! ```text
//! lhs -> rhs / left_env _ right_env
//! ```
//!
//! The shape of a subrule decides how it rewrites:
//!
//! | `lhs` | `rhs` | Kind |
//! |---|---|---|
//! | n segments | n segments | [`SubruleKind::FeatureChange`] |
//! | n segments | m ≠ n segments | [`SubruleKind::Narrow`] (deletion when m = 0) |
//! | empty | m segments | [`SubruleKind::Epenthesis`] |

use crate::constraints::MprFeatureSet;
use crate::error::{MorphError, Result};
use crate::feature::FeatureStruct;
use crate::pattern::{Constraint, ConstraintKind, Match, Pattern, PatternNode};
use crate::shape::{Direction, Shape};

/// Target/environment group names.
pub(crate) const LEFT: &str = "left";
pub(crate) const TARGET: &str = "target";
pub(crate) const RIGHT: &str = "right";

/// How matches are found in one pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ApplicationMode {
    /// Rewrite one match at a time; outputs feed later matches
    #[default]
    Iterative,
    /// Find every match first, then rewrite them all
    Simultaneous,
}

/// How a subrule rewrites its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubruleKind {
    /// Same length: features are overwritten in place
    FeatureChange,
    /// Different length: the target is replaced
    Narrow,
    /// Empty target: material is inserted
    Epenthesis,
}

/// When a rule is rerun on its own output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ReapplyType {
    /// One pass
    Normal,
    /// The rule deletes material; rerun a configured number of times
    Deletion,
    /// The rule's output can satisfy its own environment; rerun to a fixed point
    SelfOpaquing,
}

/// One environment/output pair of a rule.
#[derive(Debug, Clone, Default)]
pub struct RewriteSubrule {
    /// Replacement
    pub rhs: Pattern,
    /// Left environment
    pub left_env: Pattern,
    /// Right environment
    pub right_env: Pattern,
    /// Syntactic features the word must unify with
    pub required_syntactic_fs: FeatureStruct,
    /// MPR features the word must carry
    pub required_mpr: MprFeatureSet,
}

impl RewriteSubrule {
    /// A subrule without word-level requirements.
    pub fn new(rhs: Pattern, left_env: Pattern, right_env: Pattern) -> Self {
        RewriteSubrule {
            rhs,
            left_env,
            right_env,
            ..Default::default()
        }
    }

    /// Whether word-level requirements hold.
    pub(crate) fn admits(&self, fs: &FeatureStruct, mpr: &MprFeatureSet) -> bool {
        self.required_syntactic_fs.is_unifiable(fs)
            && (self.required_mpr.is_empty() || self.required_mpr.is_match(mpr))
    }
}

/// A phonological rewrite rule.
#[derive(Debug, Clone)]
pub struct RewriteRule {
    /// Name
    pub name: String,
    /// Target
    pub lhs: Pattern,
    /// Disjunctively ordered subrules
    pub subrules: Vec<RewriteSubrule>,
    /// Match strategy
    pub application_mode: ApplicationMode,
    /// Scan direction
    pub direction: Direction,
}

impl RewriteRule {
    /// An iterative left-to-right rule.
    pub fn new(name: impl Into<String>, lhs: Pattern, subrules: Vec<RewriteSubrule>) -> Self {
        RewriteRule {
            name: name.into(),
            lhs,
            subrules,
            application_mode: ApplicationMode::Iterative,
            direction: Direction::LeftToRight,
        }
    }

    /// Builder: application mode.
    pub fn with_mode(mut self, mode: ApplicationMode) -> Self {
        self.application_mode = mode;
        self
    }

    /// Builder: direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Kind of a subrule.
    pub fn subrule_kind(&self, subrule: &RewriteSubrule) -> SubruleKind {
        if self.lhs.is_empty() {
            SubruleKind::Epenthesis
        } else if self.lhs.len() == subrule.rhs.len() {
            SubruleKind::FeatureChange
        } else {
            SubruleKind::Narrow
        }
    }

    /// Reapplication policy of the whole rule.
    pub fn reapply_type(&self) -> ReapplyType {
        if self.subrules.iter().any(|s| s.rhs.len() < self.lhs.len()) {
            return ReapplyType::Deletion;
        }
        let opaquing = self.subrules.iter().any(|s| {
            let envs: Vec<&Constraint> = s
                .left_env
                .constraints()
                .into_iter()
                .chain(s.right_env.constraints())
                .filter(|c| c.kind == ConstraintKind::Segment)
                .collect();
            s.rhs
                .constraints()
                .iter()
                .any(|r| envs.iter().any(|e| e.fs.is_unifiable(&r.fs)))
        });
        if opaquing {
            ReapplyType::SelfOpaquing
        } else {
            ReapplyType::Normal
        }
    }

    /// Check the rule is well formed.
    pub fn validate(&self) -> Result<()> {
        let bad = |what: &str| Err(MorphError::InvalidGrammar(format!("rule '{}' {}", self.name, what)));
        if self.subrules.is_empty() {
            return bad("has no subrules");
        }
        if !self.lhs.is_simple() || !segments_only(&self.lhs) {
            return bad("has a target that is not a segment sequence");
        }
        for subrule in &self.subrules {
            if !subrule.rhs.is_simple() || !segments_only(&subrule.rhs) {
                return bad("has a replacement that is not a segment sequence");
            }
            if self.lhs.is_empty() && subrule.rhs.is_empty() {
                return bad("neither matches nor inserts anything");
            }
        }
        Ok(())
    }
}

fn segments_only(pattern: &Pattern) -> bool {
    pattern
        .constraints()
        .iter()
        .all(|c| c.kind == ConstraintKind::Segment)
}

/// `left` + `target` + `right` as named groups.
pub(crate) fn rule_pattern(left: &Pattern, target: Vec<PatternNode>, right: &Pattern) -> Pattern {
    Pattern::from_nodes(vec![
        PatternNode::group(LEFT, left.nodes().to_vec()),
        PatternNode::group(TARGET, target),
        PatternNode::group(RIGHT, right.nodes().to_vec()),
    ])
}

/// Anchors only stand for the word edge on their own side: the begin anchor
/// never satisfies a right environment, nor the end anchor a left one.
pub(crate) fn anchors_in_place(shape: &Shape, m: &Match) -> bool {
    !m.group(RIGHT).contains(&shape.begin()) && !m.group(LEFT).contains(&shape.end())
}

/// Target constraints, optionally restricted to unsearched nodes.
pub(crate) fn target_nodes(target: &Pattern, unsearched: bool) -> Vec<PatternNode> {
    target
        .map(|c| Some(if unsearched { c.clone().unsearched() } else { c.clone() }))
        .nodes()
        .to_vec()
}
