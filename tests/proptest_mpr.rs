//! Property-based tests for MPR feature set matching.

use libmorpher::constraints::{
    MprFeature, MprFeatureGroup, MprFeatureGroupMatchType, MprFeatureGroupOutput, MprFeatureSet,
};
use proptest::prelude::*;

const NAMES: [&str; 6] = ["a", "b", "c", "d", "e", "f"];

fn group(match_type: MprFeatureGroupMatchType) -> std::sync::Arc<MprFeatureGroup> {
    MprFeatureGroup::new("g", match_type, MprFeatureGroupOutput::Append)
}

fn set(names: &[&str]) -> MprFeatureSet {
    names.iter().map(|n| MprFeature::new(n)).collect()
}

// Candidate sets drawn from a small alphabet
fn candidate_strategy() -> impl Strategy<Value = Vec<&'static str>> {
    prop::sample::subsequence(NAMES.to_vec(), 0..=NAMES.len())
}

#[test]
fn test_all_group_needs_every_member() {
    let g = group(MprFeatureGroupMatchType::All);
    let required: MprFeatureSet = [MprFeature::grouped("a", &g), MprFeature::grouped("b", &g)]
        .into_iter()
        .collect();
    assert!(required.is_match(&set(&["a", "b", "c"])));
    assert!(!required.is_match(&set(&["a", "c"])));
}

#[test]
fn test_any_group_needs_one_member() {
    let g = group(MprFeatureGroupMatchType::Any);
    let required: MprFeatureSet = [MprFeature::grouped("a", &g), MprFeature::grouped("b", &g)]
        .into_iter()
        .collect();
    assert!(required.is_match(&set(&["a", "c"])));
    assert!(!required.is_match(&set(&["c", "d"])));
}

#[test]
fn test_overwrite_group_output() {
    let g = MprFeatureGroup::new(
        "class",
        MprFeatureGroupMatchType::Any,
        MprFeatureGroupOutput::Overwrite,
    );
    let mut word: MprFeatureSet = [MprFeature::grouped("x", &g), MprFeature::new("other")]
        .into_iter()
        .collect();
    let output: MprFeatureSet = [MprFeature::grouped("y", &g)].into_iter().collect();
    word.add_output(&output);
    assert_eq!(word, set(&["other", "y"]));
}

proptest! {
    #[test]
    fn prop_all_group_is_subset_test(
        required in prop::sample::subsequence(NAMES.to_vec(), 1..=3),
        candidate in candidate_strategy(),
    ) {
        let g = group(MprFeatureGroupMatchType::All);
        let req: MprFeatureSet = required.iter().map(|n| MprFeature::grouped(n, &g)).collect();
        let expected = required.iter().all(|n| candidate.contains(n));
        prop_assert_eq!(req.is_match(&set(&candidate)), expected);
    }

    #[test]
    fn prop_any_group_is_intersection_test(
        required in prop::sample::subsequence(NAMES.to_vec(), 1..=3),
        candidate in candidate_strategy(),
    ) {
        let g = group(MprFeatureGroupMatchType::Any);
        let req: MprFeatureSet = required.iter().map(|n| MprFeature::grouped(n, &g)).collect();
        let expected = required.iter().any(|n| candidate.contains(n));
        prop_assert_eq!(req.is_match(&set(&candidate)), expected);
    }

    #[test]
    fn prop_empty_requirement_matches_anything(candidate in candidate_strategy()) {
        prop_assert!(MprFeatureSet::new().is_match(&set(&candidate)));
        prop_assert!(!MprFeatureSet::new().excludes(&set(&candidate)));
    }

    #[test]
    fn prop_append_output_is_union(
        before in candidate_strategy(),
        added in candidate_strategy(),
    ) {
        let mut word = set(&before);
        word.add_output(&set(&added));
        for name in before.iter().chain(added.iter()) {
            prop_assert!(word.contains(&MprFeature::new(name)));
        }
        prop_assert!(word.len() <= before.len() + added.len());
    }
}
