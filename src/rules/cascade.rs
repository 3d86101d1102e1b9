//! Rule cascades.
//!
//! | Cascade | Order | Result |
//! |---|---|---|
//! | [`LinearRuleCascade`] | declaration order, each rule obligatory where it applies | the words after the last rule |
//! | [`PermutationRuleCascade`] | ordered subsets of the rules | every distinct derived word |
//! | [`CombinationRuleCascade`] | any order, any subset | every distinct derived word |
//! | [`InPlaceRuleCascade`] | linear, or repeated to a fixed point | the rewritten word |

use super::{push_unique, InPlaceRule, Rule, RuleContext};
use crate::error::Result;
use crate::language::RuleOrder;
use crate::word::Word;

// ============================================================================
// Linear
// ============================================================================

/// Rules tried in declaration order.
///
/// A word a rule does not apply to passes on unchanged; a word it applies to
/// is replaced by the rule's outputs. With multiple applications enabled a
/// rule is reapplied to its own outputs before the next rule runs.
#[derive(Debug, Clone)]
pub struct LinearRuleCascade<R> {
    rules: Vec<R>,
    multiple_applications: bool,
}

impl<R: Rule> LinearRuleCascade<R> {
    /// Create a cascade.
    pub fn new(rules: Vec<R>, multiple_applications: bool) -> Self {
        LinearRuleCascade {
            rules,
            multiple_applications,
        }
    }

    /// The rules.
    pub fn rules(&self) -> &[R] {
        &self.rules
    }
}

impl<R: Rule> Rule for LinearRuleCascade<R> {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let mut current = vec![input.clone()];
        for rule in &self.rules {
            let mut next = Vec::new();
            for word in current {
                let outputs = rule.apply(ctx, &word);
                if outputs.is_empty() {
                    push_unique(&mut next, word);
                    continue;
                }
                let mut work = outputs;
                while let Some(out) = work.pop() {
                    if self.multiple_applications {
                        work.extend(rule.apply(ctx, &out));
                    }
                    push_unique(&mut next, out);
                }
            }
            current = next;
        }
        current
    }
}

// ============================================================================
// Permutation
// ============================================================================

/// Every ordered subset of the rules.
///
/// After rule `i` applies, only rules `i + 1..` (or `i..` with multiple
/// applications) are tried on its output.
#[derive(Debug, Clone)]
pub struct PermutationRuleCascade<R> {
    rules: Vec<R>,
    multiple_applications: bool,
}

impl<R: Rule> PermutationRuleCascade<R> {
    /// Create a cascade.
    pub fn new(rules: Vec<R>, multiple_applications: bool) -> Self {
        PermutationRuleCascade {
            rules,
            multiple_applications,
        }
    }

    fn apply_from(&self, ctx: &RuleContext<'_>, input: &Word, start: usize, output: &mut Vec<Word>) {
        for (i, rule) in self.rules.iter().enumerate().skip(start) {
            for out in rule.apply(ctx, input) {
                if push_unique(output, out.clone()) {
                    let next = if self.multiple_applications { i } else { i + 1 };
                    self.apply_from(ctx, &out, next, output);
                }
            }
        }
    }
}

impl<R: Rule> Rule for PermutationRuleCascade<R> {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let mut output = Vec::new();
        self.apply_from(ctx, input, 0, &mut output);
        output
    }
}

// ============================================================================
// Combination
// ============================================================================

/// Every subset of the rules in every order.
#[derive(Debug, Clone)]
pub struct CombinationRuleCascade<R> {
    rules: Vec<R>,
}

impl<R: Rule> CombinationRuleCascade<R> {
    /// Create a cascade.
    pub fn new(rules: Vec<R>) -> Self {
        CombinationRuleCascade { rules }
    }

    fn apply_all(&self, ctx: &RuleContext<'_>, input: &Word, output: &mut Vec<Word>) {
        for rule in &self.rules {
            for out in rule.apply(ctx, input) {
                if push_unique(output, out.clone()) {
                    self.apply_all(ctx, &out, output);
                }
            }
        }
    }
}

impl<R: Rule> Rule for CombinationRuleCascade<R> {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let mut output = Vec::new();
        self.apply_all(ctx, input, &mut output);
        output
    }
}

// ============================================================================
// In place
// ============================================================================

/// In-place rules run in sequence.
///
/// `Permutation` order reruns the whole sequence until a pass changes
/// nothing, for at most `rules.len() + 1` passes.
#[derive(Debug, Clone)]
pub struct InPlaceRuleCascade<R> {
    rules: Vec<R>,
    order: RuleOrder,
}

impl<R: InPlaceRule> InPlaceRuleCascade<R> {
    /// Create a cascade.
    pub fn new(rules: Vec<R>, order: RuleOrder) -> Self {
        InPlaceRuleCascade { rules, order }
    }

    /// True when there is nothing to run.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}

impl<R: InPlaceRule> InPlaceRule for InPlaceRuleCascade<R> {
    fn apply_in_place(&self, ctx: &RuleContext<'_>, word: &mut Word) -> Result<bool> {
        let passes = match self.order {
            RuleOrder::Linear => 1,
            RuleOrder::Permutation => self.rules.len() + 1,
        };
        let mut changed_any = false;
        for _ in 0..passes {
            let mut changed = false;
            for rule in &self.rules {
                changed |= rule.apply_in_place(ctx, word)?;
            }
            changed_any |= changed;
            if !changed {
                break;
            }
        }
        Ok(changed_any)
    }
}
