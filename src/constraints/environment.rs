//! Allomorph environments: phonetic context conditions on the final surface
//! shape around a morph.

use super::cooccurrence::ConstraintType;
use crate::feature::VariableBindings;
use crate::pattern::{Matcher, MatcherSettings, NodeFilter, Pattern};
use crate::shape::{MorphSpan, NodeId, Shape};

/// Left and/or right context an allomorph requires or excludes.
#[derive(Debug, Clone)]
pub struct AllomorphEnvironment {
    /// Require or exclude
    pub constraint: ConstraintType,
    left: Option<Matcher>,
    right: Option<Matcher>,
}

impl AllomorphEnvironment {
    /// Create an environment; an absent side is unconstrained.
    pub fn new(constraint: ConstraintType, left: Option<Pattern>, right: Option<Pattern>) -> Self {
        let settings = MatcherSettings {
            filter: NodeFilter::ALL,
            ..Default::default()
        };
        AllomorphEnvironment {
            constraint,
            left: left.map(|p| Matcher::new(p, settings)),
            right: right.map(|p| Matcher::new(p, settings)),
        }
    }

    /// True when the context around `span` matches both sides.
    pub fn is_match(&self, shape: &Shape, span: &MorphSpan) -> bool {
        let left_ok = self.left.as_ref().map_or(true, |m| {
            let target = visible_before(m, shape, span.first);
            target.is_some()
                && m
                    .find_from(shape, None, &VariableBindings::new(), |found| {
                        found.last() == target
                    })
                    .is_some()
        });
        let right_ok = self.right.as_ref().map_or(true, |m| {
            let target = visible_after(m, shape, span.last);
            target.is_some()
                && m
                    .find_from(shape, target, &VariableBindings::new(), |found| {
                        found.first() == target
                    })
                    .is_some()
        });
        left_ok && right_ok
    }

    /// True when the word satisfies this environment's polarity.
    pub fn is_word_valid(&self, shape: &Shape, span: &MorphSpan) -> bool {
        match self.constraint {
            ConstraintType::Require => self.is_match(shape, span),
            ConstraintType::Exclude => !self.is_match(shape, span),
        }
    }
}

/// One required environment must hold (when any exist); no excluded one may.
pub fn check_environments(envs: &[AllomorphEnvironment], shape: &Shape, span: &MorphSpan) -> bool {
    let mut required = envs
        .iter()
        .filter(|e| e.constraint == ConstraintType::Require)
        .peekable();
    let required_ok = required.peek().is_none() || required.any(|e| e.is_match(shape, span));
    required_ok
        && envs
            .iter()
            .filter(|e| e.constraint == ConstraintType::Exclude)
            .all(|e| e.is_word_valid(shape, span))
}

fn visible_before(m: &Matcher, shape: &Shape, node: NodeId) -> Option<NodeId> {
    m.project(shape)
        .into_iter()
        .rev()
        .find(|&id| shape.compare(id, node).is_lt())
}

fn visible_after(m: &Matcher, shape: &Shape, node: NodeId) -> Option<NodeId> {
    m.project(shape)
        .into_iter()
        .find(|&id| shape.compare(id, node).is_gt())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::FeatureStruct;
    use crate::language::{AllomorphId, MorphemeId};
    use crate::pattern::PatternNode;
    use crate::shape::{MorphTag, NodeType};

    fn vowel() -> FeatureStruct {
        FeatureStruct::new().with("cons", "-")
    }

    fn cons() -> FeatureStruct {
        FeatureStruct::new().with("cons", "+")
    }

    /// Shape `C V | C` where the last consonant is the morph under test.
    fn word() -> (Shape, MorphSpan) {
        let mut shape = Shape::new();
        shape.push(NodeType::Segment, cons());
        shape.push(NodeType::Segment, vowel());
        let z = shape.push(NodeType::Segment, cons());
        let tag = MorphTag {
            allomorph: AllomorphId::new(MorphemeId::Rule(0), 0),
            morph_id: 1,
        };
        shape[z].morph = Some(tag);
        (shape, MorphSpan { tag, first: z, last: z })
    }

    #[test]
    fn test_left_and_right_contexts() {
        let (shape, span) = word();
        let after_vowel = AllomorphEnvironment::new(
            ConstraintType::Require,
            Some(Pattern::segments([vowel()])),
            None,
        );
        assert!(after_vowel.is_match(&shape, &span));

        let after_cons = AllomorphEnvironment::new(
            ConstraintType::Require,
            Some(Pattern::segments([cons()])),
            None,
        );
        assert!(!after_cons.is_match(&shape, &span));

        let word_final = AllomorphEnvironment::new(
            ConstraintType::Require,
            None,
            Some(Pattern::new().then(PatternNode::anchor())),
        );
        assert!(word_final.is_match(&shape, &span));
    }

    #[test]
    fn test_check_environments_polarity() {
        let (shape, span) = word();
        let envs = vec![
            AllomorphEnvironment::new(ConstraintType::Require, Some(Pattern::segments([cons()])), None),
            AllomorphEnvironment::new(ConstraintType::Require, Some(Pattern::segments([vowel()])), None),
        ];
        assert!(check_environments(&envs, &shape, &span));

        let excluded = vec![AllomorphEnvironment::new(
            ConstraintType::Exclude,
            Some(Pattern::segments([vowel()])),
            None,
        )];
        assert!(!check_environments(&excluded, &shape, &span));
    }
}
