//! Affix process rules and affix templates.
//!
//! An [`AffixProcessRule`] rewrites a stem: its left-hand side splits the
//! input into named parts, and each allomorph's right-hand side rebuilds the
//! output from copies of those parts, modified copies and inserted material.
//! Affixation, reduplication, infixation and truncation are all special cases.
//!
//! Rules are compiled twice. [`SynthesisAffixProcessRule`] applies a rule,
//! [`AnalysisAffixProcessRule`] undoes it by matching the right-hand side and
//! reconstructing the left. [`AffixTemplate`]s group rules into ordered slots.
//!
//! A realizational rule is an affix process rule keyed on features instead of
//! on the pending rule stack: it spells out a word's realizational features
//! inside a template slot. A [`CompoundingRule`] joins a head with a
//! non-head root.

mod analysis;
mod compounding;
mod synthesis;
mod template;

pub use analysis::AnalysisAffixProcessRule;
pub use compounding::{
    AnalysisCompoundingRule, CompoundingRule, CompoundingSubrule, SynthesisCompoundingRule,
    HEAD, NON_HEAD,
};
pub use synthesis::SynthesisAffixProcessRule;
pub use template::{
    AffixTemplate, AffixTemplateSlot, AnalysisAffixTemplate, SynthesisAffixTemplate,
};

use crate::constraints::{AllomorphEnvironment, CoOccurrenceRule, MprFeatureSet};
use crate::error::{MorphError, Result};
use crate::feature::FeatureStruct;
use crate::language::{AllomorphId, MorphemeId};
use crate::pattern::{Pattern, PatternNode};
use crate::shape::{NodeType, Shape};

/// Name of the stem part used by [`AffixProcessAllomorph::suffix`] and
/// [`AffixProcessAllomorph::prefix`].
pub const STEM: &str = "stem";

/// A named part of a rule's left-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LhsPart {
    /// Part name, referenced by output actions
    pub name: String,
    /// What the part matches
    pub pattern: Pattern,
}

impl LhsPart {
    /// Create a part.
    pub fn new(name: impl Into<String>, pattern: Pattern) -> Self {
        LhsPart {
            name: name.into(),
            pattern,
        }
    }

    /// A part matching one or more segments of any kind.
    pub fn any(name: impl Into<String>) -> Self {
        Self::new(
            name,
            Pattern::from_nodes(vec![PatternNode::one_or_more(PatternNode::segment(
                FeatureStruct::new(),
            ))]),
        )
    }
}

/// One step of an allomorph's right-hand side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MorphologicalOutputAction {
    /// Copy a part unchanged
    CopyFromInput {
        /// Part name
        part: String,
    },
    /// Copy a part, overwriting features on each of its segments
    ModifyFromInput {
        /// Part name
        part: String,
        /// Features to write (may use variables bound by the match)
        fs: FeatureStruct,
    },
    /// Insert literal material
    InsertSegments {
        /// Material to insert
        shape: Shape,
    },
    /// Insert one segment built from a feature description
    InsertSimpleContext {
        /// Segment features (may use variables bound by the match)
        fs: FeatureStruct,
    },
}

impl MorphologicalOutputAction {
    /// The input part this action reads, if any.
    pub fn part(&self) -> Option<&str> {
        match self {
            MorphologicalOutputAction::CopyFromInput { part }
            | MorphologicalOutputAction::ModifyFromInput { part, .. } => Some(part),
            _ => None,
        }
    }
}

/// One realization of an affix process rule.
#[derive(Debug, Clone)]
pub struct AffixProcessAllomorph {
    /// Input parts, in order
    pub lhs: Vec<LhsPart>,
    /// Output actions, in order
    pub rhs: Vec<MorphologicalOutputAction>,
    /// Syntactic features the word must be compatible with
    pub required_syntactic_fs: FeatureStruct,
    /// MPR features the word must carry
    pub required_mpr: MprFeatureSet,
    /// MPR features that block this allomorph
    pub excluded_mpr: MprFeatureSet,
    /// MPR features added to the output
    pub out_mpr: MprFeatureSet,
    /// Phonetic context conditions
    pub environments: Vec<AllomorphEnvironment>,
    /// Allomorph co-occurrence rules
    pub co_occurrences: Vec<CoOccurrenceRule<AllomorphId>>,
    /// Allomorphs with the same group number vary freely
    pub free_fluctuation: Option<u32>,
}

impl AffixProcessAllomorph {
    /// An allomorph with the given sides and no restrictions.
    pub fn new(lhs: Vec<LhsPart>, rhs: Vec<MorphologicalOutputAction>) -> Self {
        AffixProcessAllomorph {
            lhs,
            rhs,
            required_syntactic_fs: FeatureStruct::new(),
            required_mpr: MprFeatureSet::new(),
            excluded_mpr: MprFeatureSet::new(),
            out_mpr: MprFeatureSet::new(),
            environments: Vec::new(),
            co_occurrences: Vec::new(),
            free_fluctuation: None,
        }
    }

    /// Append `affix` to the whole stem.
    pub fn suffix(affix: Shape) -> Self {
        Self::new(
            vec![LhsPart::any(STEM)],
            vec![
                MorphologicalOutputAction::CopyFromInput { part: STEM.into() },
                MorphologicalOutputAction::InsertSegments { shape: affix },
            ],
        )
    }

    /// Prepend `affix` to the whole stem.
    pub fn prefix(affix: Shape) -> Self {
        Self::new(
            vec![LhsPart::any(STEM)],
            vec![
                MorphologicalOutputAction::InsertSegments { shape: affix },
                MorphologicalOutputAction::CopyFromInput { part: STEM.into() },
            ],
        )
    }

    /// Builder: require syntactic features.
    pub fn with_required_fs(mut self, fs: FeatureStruct) -> Self {
        self.required_syntactic_fs = fs;
        self
    }

    /// Builder: add an environment.
    pub fn with_environment(mut self, env: AllomorphEnvironment) -> Self {
        self.environments.push(env);
        self
    }

    pub(crate) fn lhs_part(&self, name: &str) -> Option<&LhsPart> {
        self.lhs.iter().find(|p| p.name == name)
    }

    /// Synthesis pattern: the parts as groups between the word anchors.
    pub(crate) fn lhs_pattern(&self) -> Pattern {
        lhs_pattern(&self.lhs)
    }

    fn validate(&self, rule: &str) -> Result<()> {
        validate_rhs(rule, &self.rhs, |part| self.lhs_part(part).is_some())
    }
}

/// The parts as groups between the word anchors.
pub(crate) fn lhs_pattern(parts: &[LhsPart]) -> Pattern {
    let mut pattern = Pattern::new().then(PatternNode::anchor());
    for part in parts {
        pattern.push(PatternNode::group(&part.name, part.pattern.nodes().to_vec()));
    }
    pattern.then(PatternNode::anchor())
}

/// Output actions may only read declared parts and never insert anchors.
fn validate_rhs(
    rule: &str,
    rhs: &[MorphologicalOutputAction],
    declared: impl Fn(&str) -> bool,
) -> Result<()> {
    for action in rhs {
        if let Some(part) = action.part() {
            if !declared(part) {
                return Err(MorphError::InvalidGrammar(format!(
                    "rule '{}' copies undeclared part '{}'",
                    rule, part
                )));
            }
        }
        if let MorphologicalOutputAction::InsertSegments { shape } = action {
            if shape.iter().any(|id| shape[id].node_type == NodeType::Anchor) {
                return Err(MorphError::InvalidGrammar(format!(
                    "rule '{}' inserts an anchor",
                    rule
                )));
            }
        }
    }
    Ok(())
}

/// A morphological rule.
#[derive(Debug, Clone)]
pub struct AffixProcessRule {
    /// Name
    pub name: String,
    /// Gloss
    pub gloss: String,
    /// Owning stratum (set on registration)
    pub stratum: usize,
    /// Applications allowed per derivation
    pub max_application_count: u32,
    /// Syntactic features the input must unify with
    pub required_syntactic_fs: FeatureStruct,
    /// Syntactic features written onto the output
    pub out_syntactic_fs: FeatureStruct,
    /// Stem name the root allomorph must carry
    pub required_stem_name: Option<String>,
    /// Allomorphs in precedence order
    pub allomorphs: Vec<AffixProcessAllomorph>,
    /// Morpheme co-occurrence rules
    pub co_occurrences: Vec<CoOccurrenceRule<MorphemeId>>,
    /// Features a realizational rule spells out; `None` for ordinary rules
    pub realizational_fs: Option<FeatureStruct>,
}

impl AffixProcessRule {
    /// A rule applying at most once.
    pub fn new(name: impl Into<String>, allomorphs: Vec<AffixProcessAllomorph>) -> Self {
        let name = name.into();
        AffixProcessRule {
            gloss: name.clone(),
            name,
            stratum: 0,
            max_application_count: 1,
            required_syntactic_fs: FeatureStruct::new(),
            out_syntactic_fs: FeatureStruct::new(),
            required_stem_name: None,
            allomorphs,
            co_occurrences: Vec::new(),
            realizational_fs: None,
        }
    }

    /// A realizational rule spelling out `fs`.
    ///
    /// It applies to any word whose realizational features carry `fs`, unless
    /// the word's syntactic features already hold every feature `fs` names.
    /// Realizational rules only run inside template slots.
    pub fn realizational(
        name: impl Into<String>,
        fs: FeatureStruct,
        allomorphs: Vec<AffixProcessAllomorph>,
    ) -> Self {
        AffixProcessRule {
            realizational_fs: Some(fs),
            ..Self::new(name, allomorphs)
        }
    }

    /// True for realizational rules.
    pub fn is_realizational(&self) -> bool {
        self.realizational_fs.is_some()
    }

    /// Builder: gloss.
    pub fn with_gloss(mut self, gloss: impl Into<String>) -> Self {
        self.gloss = gloss.into();
        self
    }

    /// Builder: required input features.
    pub fn with_required_fs(mut self, fs: FeatureStruct) -> Self {
        self.required_syntactic_fs = fs;
        self
    }

    /// Builder: output features.
    pub fn with_out_fs(mut self, fs: FeatureStruct) -> Self {
        self.out_syntactic_fs = fs;
        self
    }

    /// Builder: application limit.
    pub fn with_max_applications(mut self, count: u32) -> Self {
        self.max_application_count = count;
        self
    }

    /// Builder: required stem name.
    pub fn with_required_stem_name(mut self, name: impl Into<String>) -> Self {
        self.required_stem_name = Some(name.into());
        self
    }

    /// Check the rule is well formed.
    pub fn validate(&self) -> Result<()> {
        if self.allomorphs.is_empty() {
            return Err(MorphError::InvalidGrammar(format!(
                "rule '{}' has no allomorphs",
                self.name
            )));
        }
        if self.max_application_count == 0 {
            return Err(MorphError::InvalidGrammar(format!(
                "rule '{}' can never apply",
                self.name
            )));
        }
        self.allomorphs.iter().try_for_each(|a| a.validate(&self.name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_undeclared_parts() {
        let good = AffixProcessRule::new("pl", vec![AffixProcessAllomorph::suffix(Shape::new())]);
        assert!(good.validate().is_ok());

        let mut bad = good.clone();
        bad.allomorphs[0]
            .rhs
            .push(MorphologicalOutputAction::CopyFromInput {
                part: "nope".into(),
            });
        assert!(matches!(bad.validate(), Err(MorphError::InvalidGrammar(_))));

        assert!(AffixProcessRule::new("x", Vec::new()).validate().is_err());
        assert!(good.with_max_applications(0).validate().is_err());
    }

    #[test]
    fn test_realizational_constructor() {
        let past = FeatureStruct::new().with("tense", "past");
        let rule = AffixProcessRule::realizational(
            "PAST",
            past.clone(),
            vec![AffixProcessAllomorph::suffix(Shape::new())],
        );
        assert!(rule.is_realizational());
        assert_eq!(rule.realizational_fs, Some(past));
        assert_eq!(rule.max_application_count, 1);
        assert!(!AffixProcessRule::new("x", Vec::new()).is_realizational());
    }

    #[test]
    fn test_lhs_pattern_is_anchored() {
        let allo = AffixProcessAllomorph::prefix(Shape::new());
        let pattern = allo.lhs_pattern();
        assert_eq!(pattern.len(), 3);
        assert_eq!(allo.rhs[1].part(), Some(STEM));
    }
}
