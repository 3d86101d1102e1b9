//! Phonological rewrite rules.
//!
//! This module provides feature-based rewrite rules of the form
//! `lhs -> rhs / left_env _ right_env` and their two compiled forms:
//!
//! - [`SynthesisRewriteRule`] rewrites an underlying form in place
//! - [`AnalysisRewriteRule`] undoes the rewrite on a surface form, producing
//!   a widened form that every possible underlying form unifies with
//!
//! # Example
//!
//! ```
//! use libmorpher::feature::FeatureStruct;
//! use libmorpher::pattern::Pattern;
//! use libmorpher::phonetic::{RewriteRule, RewriteSubrule};
//!
//! let vowel = FeatureStruct::new().with("vowel", "+");
//! // t -> d / V _ V
//! let rule = RewriteRule::new(
//!     "intervocalic voicing",
//!     Pattern::segments([FeatureStruct::new().with("seg", "t")]),
//!     vec![RewriteSubrule::new(
//!         Pattern::segments([FeatureStruct::new().with("seg", "d")]),
//!         Pattern::segments([vowel.clone()]),
//!         Pattern::segments([vowel]),
//!     )],
//! );
//! assert!(rule.validate().is_ok());
//! ```

mod analysis;
mod synthesis;
mod types;

#[cfg(test)]
mod properties;

pub use analysis::AnalysisRewriteRule;
pub use synthesis::SynthesisRewriteRule;
pub use types::{ApplicationMode, ReapplyType, RewriteRule, RewriteSubrule, SubruleKind};

#[cfg(test)]
pub(crate) mod test_support {
    use crate::char_table::CharacterDefinitionTable;
    use crate::feature::FeatureStruct;
    use crate::language::{Language, Stratum};
    use crate::shape::{NodeType, Shape};

    pub fn seg(name: &str) -> FeatureStruct {
        let vowel = matches!(name, "a" | "e" | "i" | "o" | "u");
        FeatureStruct::new()
            .with("seg", name)
            .with("vowel", if vowel { "+" } else { "-" })
            .with("cons", if vowel { "-" } else { "+" })
    }

    pub fn shape(word: &str) -> Shape {
        let mut shape = Shape::new();
        for c in word.chars() {
            shape.push(NodeType::Segment, seg(&c.to_string()));
        }
        shape
    }

    /// Segment names; optional nodes in parentheses, ambiguous ones as `{..}`.
    pub fn names(shape: &Shape) -> String {
        shape
            .iter()
            .map(|id| {
                let node = &shape[id];
                let name = match node.fs.symbols("seg") {
                    Some(s) if s.symbols().count() == 1 && !s.is_negated() => s.to_string(),
                    Some(s) => format!("{{{}}}", s.symbols().collect::<Vec<_>>().join("")),
                    None => "_".to_string(),
                };
                if node.optional {
                    format!("({})", name)
                } else {
                    name
                }
            })
            .collect()
    }

    pub fn language(rules: Vec<super::RewriteRule>) -> Language {
        let mut lang = Language::new("t", CharacterDefinitionTable::new("t"));
        lang.add_stratum(Stratum::new("s"));
        for rule in rules {
            lang.add_prule(0, rule);
        }
        lang
    }
}
