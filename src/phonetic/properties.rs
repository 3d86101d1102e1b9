//! Property-based tests for rewrite rules.
//!
//! 1. **Length**: feature changes never change the length of a word
//! 2. **Recoverability**: unapplying a feature change admits the underlying form
//! 3. **Boundedness**: a deletion pass never lengthens a word
//! 4. **Monotonicity**: unapplying epenthesis never removes a node

use proptest::prelude::*;

use super::test_support::{language, seg, shape};
use super::{AnalysisRewriteRule, RewriteRule, RewriteSubrule, SynthesisRewriteRule};
use crate::feature::FeatureStruct;
use crate::morpher::MorpherSettings;
use crate::pattern::Pattern;
use crate::rules::{InPlaceRule, RuleContext};
use crate::shape::Shape;
use crate::word::Word;

// ========================================================================
// Generators
// ========================================================================

fn arb_word() -> impl Strategy<Value = String> {
    prop::collection::vec(prop::sample::select(vec!['a', 'i', 't', 'd', 'k', 'h']), 0..10)
        .prop_map(|cs| cs.into_iter().collect())
}

fn voicing() -> RewriteRule {
    let vowel = FeatureStruct::new().with("vowel", "+");
    RewriteRule::new(
        "voicing",
        Pattern::segments([FeatureStruct::new().with("seg", "t")]),
        vec![RewriteSubrule::new(
            Pattern::segments([seg("d")]),
            Pattern::segments([vowel.clone()]),
            Pattern::segments([vowel]),
        )],
    )
}

fn h_drop() -> RewriteRule {
    RewriteRule::new(
        "h-drop",
        Pattern::segments([FeatureStruct::new().with("seg", "h")]),
        vec![RewriteSubrule::new(
            Pattern::new(),
            Pattern::segments([FeatureStruct::new().with("cons", "+")]),
            Pattern::new(),
        )],
    )
}

fn epenthesis() -> RewriteRule {
    let cons = FeatureStruct::new().with("cons", "+");
    RewriteRule::new(
        "epenthesis",
        Pattern::new(),
        vec![RewriteSubrule::new(
            Pattern::segments([seg("i")]),
            Pattern::segments([cons.clone()]),
            Pattern::segments([cons]),
        )],
    )
}

fn synthesize(rule: RewriteRule, input: &str) -> Shape {
    let lang = language(vec![rule]);
    let settings = MorpherSettings::default();
    let ctx = RuleContext::new(&lang, &settings);
    let mut word = Word::for_analysis(shape(input), 0);
    SynthesisRewriteRule::new(&lang, 0)
        .apply_in_place(&ctx, &mut word)
        .expect("rewrite succeeds");
    word.shape().clone()
}

fn analyze(rule: RewriteRule, surface: Shape) -> Shape {
    let lang = language(vec![rule]);
    let settings = MorpherSettings::default();
    let ctx = RuleContext::new(&lang, &settings);
    let mut word = Word::for_analysis(surface, 0);
    AnalysisRewriteRule::new(&lang, 0)
        .apply_in_place(&ctx, &mut word)
        .expect("unrewrite succeeds");
    word.shape().clone()
}

// ========================================================================
// Properties
// ========================================================================

proptest! {
    #[test]
    fn prop_feature_change_preserves_length(input in arb_word()) {
        let output = synthesize(voicing(), &input);
        prop_assert_eq!(output.len(), input.chars().count());
    }

    #[test]
    fn prop_feature_change_is_recoverable(input in arb_word()) {
        let underlying = shape(&input);
        let surface = synthesize(voicing(), &input);
        let analyzed = analyze(voicing(), surface);
        prop_assert_eq!(analyzed.len(), underlying.len());
        for (a, u) in analyzed.iter().zip(underlying.iter()) {
            prop_assert!(analyzed[a].fs.is_unifiable(&underlying[u].fs));
        }
    }

    #[test]
    fn prop_deletion_never_lengthens(input in arb_word()) {
        let output = synthesize(h_drop(), &input);
        prop_assert!(output.len() <= input.chars().count());
    }

    #[test]
    fn prop_epenthesis_analysis_keeps_nodes(input in arb_word()) {
        let surface = synthesize(epenthesis(), &input);
        let before = surface.len();
        let analyzed = analyze(epenthesis(), surface);
        prop_assert_eq!(analyzed.len(), before);
        let required = analyzed.iter().filter(|&id| !analyzed[id].optional).count();
        prop_assert!(required <= input.chars().count() + 1);
    }
}
