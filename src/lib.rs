//! # libmorpher
//!
//! A stratified morphological and phonological rule engine.
//!
//! Given a lexical root and the morphological rules to apply, the engine
//! synthesizes every surface form the grammar derives; given a surface
//! string, it analyzes it back into roots and rules. The grammar is split
//! into strata, each with its own affix process rules, affix templates and
//! phonological rewrite rules.
//!
//! The approach follows the classic two-level generator/parser design:
//! analysis undoes the rules as loosely as needed to never miss a parse, and
//! every proposed parse is confirmed by synthesizing it again.
//!
//! ## Example
//!
//! ```rust
//! use libmorpher::prelude::*;
//!
//! let mut table = CharacterDefinitionTable::new("demo");
//! for c in ["k", "a", "t", "z"] {
//!     table.add_segment(&[c], FeatureStruct::new().with("seg", c));
//! }
//! table.add_morph_boundary("+");
//!
//! let mut language = Language::new("demo", table);
//! language.add_stratum(Stratum::new("word"));
//! let root = language.char_table.segment("kat")?;
//! let suffix = language.char_table.segment("+z")?;
//! language.add_entry(0, LexEntry::new("cat", RootAllomorph::new(root)));
//! language.add_mrule(0, AffixProcessRule::new("PL", vec![AffixProcessAllomorph::suffix(suffix)]));
//!
//! let morpher = MorpherBuilder::new().language(language).build()?;
//! let parses = morpher.parse_word("katz")?;
//! assert_eq!(parses.len(), 1);
//! let table = &morpher.language().char_table;
//! assert_eq!(table.render_with(parses[0].shape(), true), "kat+z");
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Features
//!
//! - `parallel`: re-synthesize independent analyses on the rayon thread pool
//! - `serialization`: serde derives on ids and the feature/shape data model

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod char_table;
pub mod constraints;
pub mod dictionary;
pub mod error;
pub mod feature;
pub mod language;
pub mod morpher;
pub mod morphology;
pub mod pattern;
pub mod phonetic;
pub mod rules;
pub mod shape;
pub mod word;

/// Common imports for convenient usage
pub mod prelude {
    pub use crate::char_table::CharacterDefinitionTable;
    pub use crate::constraints::{
        AllomorphEnvironment, CoOccurrenceAdjacency, CoOccurrenceRule, ConstraintType, MprFeature,
        MprFeatureGroup, MprFeatureSet, StemName,
    };
    pub use crate::dictionary::ShapeTrie;
    pub use crate::error::{MorphError, Result};
    pub use crate::feature::{FeatureStruct, FeatureValue, SymbolSet};
    pub use crate::language::{
        AllomorphId, Language, LexEntry, MorphemeId, RootAllomorph, RuleOrder, Stratum,
    };
    pub use crate::morpher::{
        FailureReason, Morpher, MorpherBuilder, MorpherSettings, RuleKey, TraceSettings,
    };
    pub use crate::morphology::{
        AffixProcessAllomorph, AffixProcessRule, AffixTemplate, AffixTemplateSlot,
        CompoundingRule, CompoundingSubrule, LhsPart, MorphologicalOutputAction,
    };
    pub use crate::pattern::{Pattern, PatternNode};
    pub use crate::phonetic::{ApplicationMode, RewriteRule, RewriteSubrule};
    pub use crate::shape::{Direction, NodeType, Shape};
    pub use crate::word::Word;
}
