//! Allomorph and morpheme co-occurrence rules.

/// Where the other morphs must sit relative to the key morph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CoOccurrenceAdjacency {
    /// Anywhere in the word
    Anywhere,
    /// In order, somewhere before the key
    SomewhereToLeft,
    /// In order, somewhere after the key
    SomewhereToRight,
    /// Immediately before the key
    AdjacentToLeft,
    /// Immediately after the key
    AdjacentToRight,
}

/// Whether a rule requires or forbids its configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConstraintType {
    /// The configuration must hold
    Require,
    /// The configuration must not hold
    Exclude,
}

/// A co-occurrence rule keyed by allomorph or morpheme identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CoOccurrenceRule<K> {
    /// Require or exclude
    pub constraint: ConstraintType,
    /// The other morphs, in order
    pub others: Vec<K>,
    /// Placement policy
    pub adjacency: CoOccurrenceAdjacency,
}

impl<K: Copy + Eq> CoOccurrenceRule<K> {
    /// Create a rule.
    pub fn new(constraint: ConstraintType, others: Vec<K>, adjacency: CoOccurrenceAdjacency) -> Self {
        CoOccurrenceRule {
            constraint,
            others,
            adjacency,
        }
    }

    /// True when the configuration holds for some occurrence of `key` in
    /// `morphs` (the word's morphs in surface order).
    pub fn is_match(&self, key: K, morphs: &[K]) -> bool {
        if self.adjacency == CoOccurrenceAdjacency::Anywhere {
            return self.others.iter().all(|o| morphs.contains(o));
        }
        morphs
            .iter()
            .enumerate()
            .filter(|(_, m)| **m == key)
            .any(|(i, _)| self.is_match_at(i, morphs))
    }

    fn is_match_at(&self, index: usize, morphs: &[K]) -> bool {
        let n = self.others.len();
        let (left, right) = (&morphs[..index], &morphs[index + 1..]);
        match self.adjacency {
            CoOccurrenceAdjacency::Anywhere => true,
            CoOccurrenceAdjacency::SomewhereToLeft => is_subsequence(&self.others, left),
            CoOccurrenceAdjacency::SomewhereToRight => is_subsequence(&self.others, right),
            CoOccurrenceAdjacency::AdjacentToLeft => {
                left.len() >= n && left[left.len() - n..] == self.others[..]
            }
            CoOccurrenceAdjacency::AdjacentToRight => right.len() >= n && right[..n] == self.others[..],
        }
    }

    /// True when the word satisfies this rule's polarity.
    pub fn is_word_valid(&self, key: K, morphs: &[K]) -> bool {
        match self.constraint {
            ConstraintType::Require => self.is_match(key, morphs),
            ConstraintType::Exclude => !self.is_match(key, morphs),
        }
    }
}

/// Check a morph's rule list: one required rule must hold (when any exist)
/// and no excluded rule may hold.
pub fn check_co_occurrences<K: Copy + Eq>(
    rules: &[CoOccurrenceRule<K>],
    key: K,
    morphs: &[K],
) -> bool {
    let mut required = rules
        .iter()
        .filter(|r| r.constraint == ConstraintType::Require)
        .peekable();
    let required_ok = required.peek().is_none() || required.any(|r| r.is_match(key, morphs));
    required_ok
        && rules
            .iter()
            .filter(|r| r.constraint == ConstraintType::Exclude)
            .all(|r| r.is_word_valid(key, morphs))
}

fn is_subsequence<K: Eq>(needle: &[K], haystack: &[K]) -> bool {
    let mut it = haystack.iter();
    needle.iter().all(|n| it.any(|h| h == n))
}
