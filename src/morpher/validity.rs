//! Validity checks on synthesized words.
//!
//! A word that made it through synthesis can still be ill-formed: a rule or
//! compound recorded by analysis may never have applied, a bound root may stand
//! alone, or a stem name, environment or co-occurrence restriction may fail
//! on the finished word. Each check is a pure predicate; the first failure
//! names the reason.

use crate::constraints::{check_co_occurrences, check_environments};
use crate::language::{AllomorphId, Language, MorphemeId};
use crate::word::Word;

use super::trace::FailureReason;

/// Allomorphs in surface order; allomorphs without surface material follow
/// in application order.
fn allomorphs_in_morph_order(word: &Word) -> Vec<AllomorphId> {
    let mut order: Vec<AllomorphId> = Vec::new();
    for span in word.shape().morphs() {
        order.push(span.tag.allomorph);
    }
    for &allomorph in word.allomorphs() {
        if !order.contains(&allomorph) {
            order.push(allomorph);
        }
    }
    order
}

fn check_stem_names(language: &Language, word: &Word) -> Result<(), FailureReason> {
    let Some(root) = word.root() else {
        return Ok(());
    };
    let MorphemeId::Entry(e) = root.morpheme else {
        return Ok(());
    };
    let Some(entry) = language.entries.get(e) else {
        return Ok(());
    };
    let Some(used) = entry.allomorphs.get(root.index) else {
        return Ok(());
    };
    let fs = word.syntactic_fs();
    if let Some(stem_name) = &used.stem_name {
        if !stem_name.is_required_match(fs) {
            return Err(FailureReason::RequiredStemName);
        }
    }
    let blocked = entry
        .allomorphs
        .iter()
        .enumerate()
        .filter(|&(i, _)| i != root.index)
        .filter_map(|(_, sibling)| sibling.stem_name.as_ref())
        .any(|sibling| sibling.is_excluded_match(fs, used.stem_name.as_ref()));
    if blocked {
        return Err(FailureReason::ExcludedStemName);
    }
    Ok(())
}

/// Check a synthesized word.
pub(crate) fn check_word(language: &Language, word: &Word) -> Result<(), FailureReason> {
    if !word.pending_rules().is_empty() || !word.non_heads().is_empty() {
        return Err(FailureReason::PendingRules);
    }
    if let Some(root) = word.root().and_then(|r| language.root_allomorph(r)) {
        if root.is_bound && word.allomorphs().len() == 1 {
            return Err(FailureReason::BoundRoot);
        }
    }
    check_stem_names(language, word)?;

    let shape = word.shape();
    for span in shape.morphs() {
        let Some(allomorph) = language.allomorph(span.tag.allomorph) else {
            continue;
        };
        if !check_environments(allomorph.environments(), shape, &span) {
            return Err(FailureReason::Environments);
        }
    }

    let allomorphs = allomorphs_in_morph_order(word);
    for &id in &allomorphs {
        let Some(allomorph) = language.allomorph(id) else {
            continue;
        };
        if !check_co_occurrences(allomorph.co_occurrences(), id, &allomorphs) {
            return Err(FailureReason::AllomorphCoOccurrence);
        }
    }
    let morphemes: Vec<MorphemeId> = allomorphs.iter().map(|a| a.morpheme).collect();
    for &id in &morphemes {
        if !check_co_occurrences(language.morpheme_co_occurrences(id), id, &morphemes) {
            return Err(FailureReason::MorphemeCoOccurrence);
        }
    }
    Ok(())
}

/// True when `word` loses to `other`: both realize the same morphemes, and at
/// the first allomorph where they differ `other` uses a higher-precedence
/// allomorph that does not vary freely with the one `word` uses.
fn is_outranked(language: &Language, word: &[AllomorphId], other: &[AllomorphId]) -> bool {
    let same_morphemes = word.len() == other.len()
        && word.iter().zip(other).all(|(a, b)| a.morpheme == b.morpheme);
    if !same_morphemes {
        return false;
    }
    let Some((a, b)) = word.iter().zip(other).find(|(a, b)| a.index != b.index) else {
        return false;
    };
    if b.index > a.index {
        return false;
    }
    match (language.allomorph(*a), language.allomorph(*b)) {
        (Some(x), Some(y)) => !x.free_fluctuates_with(&y),
        _ => true,
    }
}

/// Split valid words into those that use the highest-precedence allomorphs
/// available and those beaten by a competitor.
pub(crate) fn apply_disjunction(language: &Language, words: Vec<Word>) -> (Vec<Word>, Vec<Word>) {
    let orders: Vec<Vec<AllomorphId>> = words.iter().map(allomorphs_in_morph_order).collect();
    let mut kept = Vec::new();
    let mut beaten = Vec::new();
    for (i, word) in words.into_iter().enumerate() {
        let outranked = orders
            .iter()
            .enumerate()
            .any(|(j, other)| i != j && is_outranked(language, &orders[i], other));
        if outranked {
            beaten.push(word);
        } else {
            kept.push(word);
        }
    }
    (kept, beaten)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_table::CharacterDefinitionTable;
    use crate::constraints::{CoOccurrenceAdjacency, CoOccurrenceRule, ConstraintType, StemName};
    use crate::feature::FeatureStruct;
    use crate::language::{LexEntry, RootAllomorph, Stratum};
    use crate::morphology::{AffixProcessAllomorph, AffixProcessRule};
    use crate::shape::{NodeType, Shape};

    fn shape(segs: &str) -> Shape {
        let mut shape = Shape::new();
        for c in segs.chars() {
            shape.push(NodeType::Segment, FeatureStruct::new().with("seg", c.to_string().as_str()));
        }
        shape
    }

    fn base() -> Language {
        let mut lang = Language::new("t", CharacterDefinitionTable::new("t"));
        lang.add_stratum(Stratum::new("s"));
        lang
    }

    fn entry_root(e: usize, i: usize) -> AllomorphId {
        AllomorphId::new(MorphemeId::Entry(e), i)
    }

    #[test]
    fn test_bound_root_alone_is_rejected() {
        let mut lang = base();
        lang.add_entry(0, LexEntry::new("kat", RootAllomorph::new(shape("kat")).bound()));
        lang.add_mrule(0, AffixProcessRule::new("z", vec![AffixProcessAllomorph::suffix(shape("z"))]));

        let alone = Word::from_root(&lang, entry_root(0, 0), FeatureStruct::new(), &[]).unwrap();
        assert_eq!(check_word(&lang, &alone), Err(FailureReason::BoundRoot));

        let mut affixed = alone.clone();
        affixed.morphological_rule_applied(0, AllomorphId::new(MorphemeId::Rule(0), 0));
        assert_eq!(check_word(&lang, &affixed), Ok(()));
    }

    #[test]
    fn test_pending_rules_are_rejected() {
        let mut lang = base();
        lang.add_entry(0, LexEntry::new("kat", RootAllomorph::new(shape("kat"))));
        lang.add_mrule(0, AffixProcessRule::new("z", vec![AffixProcessAllomorph::suffix(shape("z"))]));
        let word = Word::from_root(&lang, entry_root(0, 0), FeatureStruct::new(), &[0]).unwrap();
        assert_eq!(check_word(&lang, &word), Err(FailureReason::PendingRules));
    }

    #[test]
    fn test_stem_name_exclusivity() {
        let mut lang = base();
        let past = FeatureStruct::new().with("tense", "past");
        let present = FeatureStruct::new().with("tense", "pres");
        let entry = LexEntry {
            allomorphs: vec![
                RootAllomorph::new(shape("kat"))
                    .with_stem_name(StemName::new("past", vec![past.clone()]).unwrap()),
                RootAllomorph::new(shape("kit"))
                    .with_stem_name(StemName::new("present", vec![present.clone()]).unwrap()),
            ],
            ..LexEntry::new("kat", RootAllomorph::new(shape("kat")))
        };
        lang.add_entry(0, entry);

        let valid: Vec<usize> = (0..2)
            .filter(|&i| {
                let word = Word::from_root(&lang, entry_root(0, i), past.clone(), &[]).unwrap();
                check_word(&lang, &word).is_ok()
            })
            .collect();
        assert_eq!(valid, vec![0]);

        let word = Word::from_root(&lang, entry_root(0, 1), past, &[]).unwrap();
        assert_eq!(check_word(&lang, &word), Err(FailureReason::RequiredStemName));
    }

    #[test]
    fn test_unnamed_sibling_is_blocked_by_stem_name_region() {
        let mut lang = base();
        let past = FeatureStruct::new().with("tense", "past");
        let entry = LexEntry {
            allomorphs: vec![
                RootAllomorph::new(shape("kat")),
                RootAllomorph::new(shape("kit"))
                    .with_stem_name(StemName::new("past", vec![past.clone()]).unwrap()),
            ],
            ..LexEntry::new("kat", RootAllomorph::new(shape("kat")))
        };
        lang.add_entry(0, entry);
        let plain = Word::from_root(&lang, entry_root(0, 0), past, &[]).unwrap();
        assert_eq!(check_word(&lang, &plain), Err(FailureReason::ExcludedStemName));
        let other = Word::from_root(&lang, entry_root(0, 0), FeatureStruct::new().with("tense", "pres"), &[]).unwrap();
        assert_eq!(check_word(&lang, &other), Ok(()));
    }

    #[test]
    fn test_morpheme_co_occurrence() {
        let mut lang = base();
        let mut entry = LexEntry::new("kat", RootAllomorph::new(shape("kat")));
        entry.co_occurrences.push(CoOccurrenceRule::new(
            ConstraintType::Require,
            vec![MorphemeId::Rule(0)],
            CoOccurrenceAdjacency::Anywhere,
        ));
        lang.add_entry(0, entry);
        lang.add_mrule(0, AffixProcessRule::new("z", vec![AffixProcessAllomorph::suffix(shape("z"))]));
        let word = Word::from_root(&lang, entry_root(0, 0), FeatureStruct::new(), &[]).unwrap();
        assert_eq!(check_word(&lang, &word), Err(FailureReason::MorphemeCoOccurrence));
    }

    #[test]
    fn test_disjunction_prefers_earlier_allomorph() {
        let mut lang = base();
        let entry = LexEntry {
            allomorphs: vec![RootAllomorph::new(shape("kat")), RootAllomorph::new(shape("kit"))],
            ..LexEntry::new("kat", RootAllomorph::new(shape("kat")))
        };
        lang.add_entry(0, entry);
        let first = Word::from_root(&lang, entry_root(0, 0), FeatureStruct::new(), &[]).unwrap();
        let second = Word::from_root(&lang, entry_root(0, 1), FeatureStruct::new(), &[]).unwrap();

        let (kept, beaten) = apply_disjunction(&lang, vec![second.clone(), first.clone()]);
        assert_eq!(kept, vec![first.clone()]);
        assert_eq!(beaten, vec![second.clone()]);

        lang.entries[0].allomorphs[0].free_fluctuation = Some(1);
        lang.entries[0].allomorphs[1].free_fluctuation = Some(1);
        let (kept, _) = apply_disjunction(&lang, vec![second, first]);
        assert_eq!(kept.len(), 2);
    }
}
