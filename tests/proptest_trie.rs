//! Property-based tests for the shape trie used in lexical lookup.

use libmorpher::dictionary::ShapeTrie;
use libmorpher::feature::FeatureStruct;
use libmorpher::pattern::NodeFilter;
use libmorpher::shape::{NodeType, Shape};
use proptest::prelude::*;

fn shape(word: &str) -> Shape {
    let mut shape = Shape::new();
    for c in word.chars() {
        shape.push(NodeType::Segment, FeatureStruct::new().with("seg", &c.to_string()));
    }
    shape
}

// Lexicon words never start with 'z'
fn lexicon_strategy() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec("[a-m][a-z]{0,7}", 1..=20)
}

fn build(words: &[String]) -> ShapeTrie<usize> {
    let mut trie = ShapeTrie::new(NodeFilter::SEGMENTS);
    for (id, word) in words.iter().enumerate() {
        trie.insert(&shape(word), id);
    }
    trie
}

proptest! {
    #[test]
    fn prop_every_inserted_shape_is_found(words in lexicon_strategy()) {
        let trie = build(&words);
        for (id, word) in words.iter().enumerate() {
            let found = trie.search_exact(&shape(word));
            prop_assert!(found.contains(&&id), "{} (id {}) not found: {:?}", word, id, found);
        }
    }

    #[test]
    fn prop_exact_search_returns_only_equal_shapes(words in lexicon_strategy()) {
        let trie = build(&words);
        for word in &words {
            for &id in trie.search_exact(&shape(word)) {
                prop_assert_eq!(&words[id], word);
            }
        }
    }

    #[test]
    fn prop_prefix_search_includes_own_id(words in lexicon_strategy(), tail in "[a-z]{0,3}") {
        let trie = build(&words);
        for (id, word) in words.iter().enumerate() {
            let query = format!("{}{}", word, tail);
            prop_assert!(trie.search(&shape(&query)).contains(&&id));
        }
    }

    #[test]
    fn prop_disjoint_prefix_finds_nothing(words in lexicon_strategy(), query in "z[a-z]{0,7}") {
        let trie = build(&words);
        prop_assert!(trie.search_exact(&shape(&query)).is_empty());
        prop_assert!(trie.search(&shape(&query)).is_empty());
    }
}

#[test]
fn test_duplicate_shapes_keep_every_value() {
    let words = vec!["kat".to_string(), "kat".to_string()];
    let trie = build(&words);
    let mut found: Vec<usize> = trie.search_exact(&shape("kat")).into_iter().copied().collect();
    found.sort_unstable();
    assert_eq!(found, vec![0, 1]);
    assert_eq!(trie.len(), 2);
}
