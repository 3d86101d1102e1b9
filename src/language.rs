//! The grammar a morpher runs: strata, lexical entries and rules.
//!
//! A [`Language`] owns every morpheme definition. Words and shapes refer to
//! them by id ([`MorphemeId`], [`AllomorphId`]), so derivation state stays
//! small and `Copy`-friendly.

use std::fmt;

use crate::char_table::CharacterDefinitionTable;
use crate::constraints::{AllomorphEnvironment, CoOccurrenceRule, MprFeatureSet, StemName};
use crate::error::{MorphError, Result};
use crate::feature::FeatureStruct;
use crate::morphology::{AffixProcessAllomorph, AffixProcessRule, AffixTemplate, CompoundingRule};
use crate::phonetic::RewriteRule;
use crate::shape::Shape;

// ============================================================================
// Ids
// ============================================================================

/// A lexical entry or a morphological rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum MorphemeId {
    /// Index into [`Language::entries`]
    Entry(usize),
    /// Index into [`Language::mrules`]
    Rule(usize),
}

/// One allomorph of a morpheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct AllomorphId {
    /// Owning morpheme
    pub morpheme: MorphemeId,
    /// Position in the morpheme's allomorph list (lower = higher precedence)
    pub index: usize,
}

impl AllomorphId {
    /// Create an id.
    pub fn new(morpheme: MorphemeId, index: usize) -> Self {
        AllomorphId { morpheme, index }
    }
}

impl fmt::Display for MorphemeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MorphemeId::Entry(i) => write!(f, "entry#{}", i),
            MorphemeId::Rule(i) => write!(f, "rule#{}", i),
        }
    }
}

impl fmt::Display for AllomorphId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.morpheme, self.index)
    }
}

// ============================================================================
// Lexical entries
// ============================================================================

/// A root allomorph: a fixed underlying shape.
#[derive(Debug, Clone)]
pub struct RootAllomorph {
    /// Underlying shape
    pub shape: Shape,
    /// Bound roots need at least one affix
    pub is_bound: bool,
    /// Optional syntactic-region restriction
    pub stem_name: Option<StemName>,
    /// Phonetic context conditions
    pub environments: Vec<AllomorphEnvironment>,
    /// Allomorph co-occurrence rules
    pub co_occurrences: Vec<CoOccurrenceRule<AllomorphId>>,
    /// Allomorphs with the same group number vary freely
    pub free_fluctuation: Option<u32>,
}

impl RootAllomorph {
    /// An unbound allomorph without restrictions.
    pub fn new(shape: Shape) -> Self {
        RootAllomorph {
            shape,
            is_bound: false,
            stem_name: None,
            environments: Vec::new(),
            co_occurrences: Vec::new(),
            free_fluctuation: None,
        }
    }

    /// Builder: mark bound.
    pub fn bound(mut self) -> Self {
        self.is_bound = true;
        self
    }

    /// Builder: attach a stem name.
    pub fn with_stem_name(mut self, stem_name: StemName) -> Self {
        self.stem_name = Some(stem_name);
        self
    }
}

/// A lexical entry (root morpheme).
#[derive(Debug, Clone)]
pub struct LexEntry {
    /// Identifier shown in results
    pub id: String,
    /// Gloss
    pub gloss: String,
    /// Stratum the entry's roots start in
    pub stratum: usize,
    /// Syntactic features
    pub syntactic_fs: FeatureStruct,
    /// Exception features
    pub mpr_features: MprFeatureSet,
    /// Allomorphs in precedence order
    pub allomorphs: Vec<RootAllomorph>,
    /// Morpheme co-occurrence rules
    pub co_occurrences: Vec<CoOccurrenceRule<MorphemeId>>,
}

impl LexEntry {
    /// Entry with a single allomorph.
    pub fn new(id: impl Into<String>, allomorph: RootAllomorph) -> Self {
        let id = id.into();
        LexEntry {
            gloss: id.clone(),
            id,
            stratum: 0,
            syntactic_fs: FeatureStruct::new(),
            mpr_features: MprFeatureSet::new(),
            allomorphs: vec![allomorph],
            co_occurrences: Vec::new(),
        }
    }

    /// Builder: set the syntactic features.
    pub fn with_syntactic_fs(mut self, fs: FeatureStruct) -> Self {
        self.syntactic_fs = fs;
        self
    }
}

// ============================================================================
// Strata
// ============================================================================

/// Rule ordering inside a stratum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RuleOrder {
    /// Declaration order
    #[default]
    Linear,
    /// Any order; phonological rules rerun to a fixed point
    Permutation,
}

/// One level of the derivation.
#[derive(Debug, Clone, Default)]
pub struct Stratum {
    /// Name
    pub name: String,
    /// Morphological rule order
    pub mrule_order: RuleOrder,
    /// Phonological rule order
    pub prule_order: RuleOrder,
    /// Morphological rules, by index into [`Language::mrules`]
    pub mrules: Vec<usize>,
    /// Phonological rules, by index into [`Language::prules`]
    pub prules: Vec<usize>,
    /// Affix templates
    pub templates: Vec<AffixTemplate>,
    /// Compounding rules, by index into [`Language::compounding_rules`]
    pub compounding_rules: Vec<usize>,
}

impl Stratum {
    /// Empty stratum with linear ordering.
    pub fn new(name: impl Into<String>) -> Self {
        Stratum {
            name: name.into(),
            ..Default::default()
        }
    }
}

/// An allomorph of either kind.
#[derive(Debug, Clone, Copy)]
pub enum AllomorphRef<'a> {
    /// Root allomorph of a lexical entry
    Root(&'a RootAllomorph),
    /// Allomorph of an affix process rule
    Affix(&'a AffixProcessAllomorph),
}

impl<'a> AllomorphRef<'a> {
    /// Context conditions.
    pub fn environments(&self) -> &'a [AllomorphEnvironment] {
        match self {
            AllomorphRef::Root(a) => &a.environments,
            AllomorphRef::Affix(a) => &a.environments,
        }
    }

    /// Allomorph co-occurrence rules.
    pub fn co_occurrences(&self) -> &'a [CoOccurrenceRule<AllomorphId>] {
        match self {
            AllomorphRef::Root(a) => &a.co_occurrences,
            AllomorphRef::Affix(a) => &a.co_occurrences,
        }
    }

    /// Free-fluctuation group.
    pub fn free_fluctuation(&self) -> Option<u32> {
        match self {
            AllomorphRef::Root(a) => a.free_fluctuation,
            AllomorphRef::Affix(a) => a.free_fluctuation,
        }
    }

    /// True when both allomorphs sit in the same free-fluctuation group.
    pub fn free_fluctuates_with(&self, other: &AllomorphRef<'_>) -> bool {
        matches!((self.free_fluctuation(), other.free_fluctuation()), (Some(a), Some(b)) if a == b)
    }
}

// ============================================================================
// Language
// ============================================================================

/// A complete grammar.
#[derive(Debug, Clone)]
pub struct Language {
    /// Name
    pub name: String,
    /// Writing system
    pub char_table: CharacterDefinitionTable,
    /// Strata, deepest (lexical) first
    pub strata: Vec<Stratum>,
    /// Lexical entries
    pub entries: Vec<LexEntry>,
    /// Morphological rules
    pub mrules: Vec<AffixProcessRule>,
    /// Compounding rules
    pub compounding_rules: Vec<CompoundingRule>,
    /// Phonological rules
    pub prules: Vec<RewriteRule>,
}

impl Language {
    /// Empty language using `char_table`.
    pub fn new(name: impl Into<String>, char_table: CharacterDefinitionTable) -> Self {
        Language {
            name: name.into(),
            char_table,
            strata: Vec::new(),
            entries: Vec::new(),
            mrules: Vec::new(),
            compounding_rules: Vec::new(),
            prules: Vec::new(),
        }
    }

    /// Add a stratum, returning its index (its depth).
    pub fn add_stratum(&mut self, stratum: Stratum) -> usize {
        self.strata.push(stratum);
        self.strata.len() - 1
    }

    /// Add a lexical entry to `stratum`.
    pub fn add_entry(&mut self, stratum: usize, mut entry: LexEntry) -> usize {
        entry.stratum = stratum;
        self.entries.push(entry);
        self.entries.len() - 1
    }

    /// Add a morphological rule to `stratum`'s rule list.
    pub fn add_mrule(&mut self, stratum: usize, rule: AffixProcessRule) -> usize {
        let index = self.add_template_rule(stratum, rule);
        if let Some(s) = self.strata.get_mut(stratum) {
            s.mrules.push(index);
        }
        index
    }

    /// Register a morphological rule that is only used inside templates.
    pub fn add_template_rule(&mut self, stratum: usize, mut rule: AffixProcessRule) -> usize {
        rule.stratum = stratum;
        self.mrules.push(rule);
        self.mrules.len() - 1
    }

    /// Add a compounding rule to `stratum`.
    pub fn add_compounding_rule(&mut self, stratum: usize, mut rule: CompoundingRule) -> usize {
        rule.stratum = stratum;
        self.compounding_rules.push(rule);
        let index = self.compounding_rules.len() - 1;
        if let Some(s) = self.strata.get_mut(stratum) {
            s.compounding_rules.push(index);
        }
        index
    }

    /// Add a template to `stratum`.
    pub fn add_template(&mut self, stratum: usize, template: AffixTemplate) {
        if let Some(s) = self.strata.get_mut(stratum) {
            s.templates.push(template);
        }
    }

    /// Add a phonological rule to `stratum`.
    pub fn add_prule(&mut self, stratum: usize, rule: RewriteRule) -> usize {
        self.prules.push(rule);
        let index = self.prules.len() - 1;
        if let Some(s) = self.strata.get_mut(stratum) {
            s.prules.push(index);
        }
        index
    }

    /// Resolve an allomorph id.
    pub fn allomorph(&self, id: AllomorphId) -> Option<AllomorphRef<'_>> {
        match id.morpheme {
            MorphemeId::Entry(e) => self
                .entries
                .get(e)?
                .allomorphs
                .get(id.index)
                .map(AllomorphRef::Root),
            MorphemeId::Rule(r) => self
                .mrules
                .get(r)?
                .allomorphs
                .get(id.index)
                .map(AllomorphRef::Affix),
        }
    }

    /// Root allomorph by id.
    pub fn root_allomorph(&self, id: AllomorphId) -> Option<&RootAllomorph> {
        match self.allomorph(id)? {
            AllomorphRef::Root(a) => Some(a),
            AllomorphRef::Affix(_) => None,
        }
    }

    /// Stratum a morpheme belongs to.
    pub fn morpheme_stratum(&self, id: MorphemeId) -> Option<usize> {
        match id {
            MorphemeId::Entry(e) => self.entries.get(e).map(|x| x.stratum),
            MorphemeId::Rule(r) => self.mrules.get(r).map(|x| x.stratum),
        }
    }

    /// Morpheme co-occurrence rules.
    pub fn morpheme_co_occurrences(&self, id: MorphemeId) -> &[CoOccurrenceRule<MorphemeId>] {
        match id {
            MorphemeId::Entry(e) => self.entries.get(e).map_or(&[][..], |x| x.co_occurrences.as_slice()),
            MorphemeId::Rule(r) => self.mrules.get(r).map_or(&[][..], |x| x.co_occurrences.as_slice()),
        }
    }

    /// Display name of a morpheme.
    pub fn morpheme_name(&self, id: MorphemeId) -> &str {
        match id {
            MorphemeId::Entry(e) => self.entries.get(e).map_or("?", |x| x.id.as_str()),
            MorphemeId::Rule(r) => self.mrules.get(r).map_or("?", |x| x.name.as_str()),
        }
    }

    /// Check cross references before compilation.
    pub fn validate(&self) -> Result<()> {
        if self.strata.is_empty() {
            return Err(MorphError::InvalidGrammar("language has no strata".into()));
        }
        let bad = |what: String| Err(MorphError::InvalidGrammar(what));
        for (i, entry) in self.entries.iter().enumerate() {
            if entry.stratum >= self.strata.len() {
                return bad(format!("entry {} references unknown stratum {}", i, entry.stratum));
            }
            if entry.allomorphs.is_empty() {
                return bad(format!("entry '{}' has no allomorphs", entry.id));
            }
        }
        for (i, stratum) in self.strata.iter().enumerate() {
            let template_rules = stratum
                .templates
                .iter()
                .flat_map(|t| t.slots.iter().flat_map(|s| s.rules.iter()));
            for &r in stratum.mrules.iter().chain(template_rules) {
                if r >= self.mrules.len() {
                    return bad(format!("stratum {} references unknown rule {}", i, r));
                }
            }
            if let Some(&r) = stratum.mrules.iter().find(|&&r| self.mrules[r].is_realizational()) {
                return bad(format!(
                    "realizational rule '{}' is only allowed in template slots",
                    self.mrules[r].name
                ));
            }
            if let Some(&c) = stratum
                .compounding_rules
                .iter()
                .find(|&&c| c >= self.compounding_rules.len())
            {
                return bad(format!("stratum {} references unknown compounding rule {}", i, c));
            }
            if let Some(&p) = stratum.prules.iter().find(|&&p| p >= self.prules.len()) {
                return bad(format!("stratum {} references unknown phonological rule {}", i, p));
            }
        }
        for rule in &self.mrules {
            rule.validate()?;
        }
        for rule in &self.compounding_rules {
            rule.validate()?;
        }
        for rule in &self.prules {
            rule.validate()?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lang() -> Language {
        let mut lang = Language::new("test", CharacterDefinitionTable::new("t"));
        lang.add_stratum(Stratum::new("s0"));
        lang
    }

    #[test]
    fn test_add_entry_and_resolve() {
        let mut lang = lang();
        let e = lang.add_entry(0, LexEntry::new("cat", RootAllomorph::new(Shape::new()).bound()));
        let id = AllomorphId::new(MorphemeId::Entry(e), 0);
        assert!(lang.root_allomorph(id).is_some_and(|a| a.is_bound));
        assert!(lang.allomorph(AllomorphId::new(MorphemeId::Entry(e), 1)).is_none());
        assert_eq!(lang.morpheme_stratum(MorphemeId::Entry(e)), Some(0));
        assert_eq!(lang.morpheme_name(MorphemeId::Entry(e)), "cat");
    }

    #[test]
    fn test_validate_catches_bad_references() {
        let mut lang = lang();
        assert!(lang.validate().is_ok());
        lang.strata[0].prules.push(3);
        assert!(matches!(lang.validate(), Err(MorphError::InvalidGrammar(_))));

        let empty = Language::new("x", CharacterDefinitionTable::new("t"));
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_realizational_rules_stay_in_templates() {
        let realizational = || {
            AffixProcessRule::realizational(
                "PAST",
                FeatureStruct::new().with("tense", "past"),
                vec![AffixProcessAllomorph::suffix(Shape::new())],
            )
        };
        let mut lang = lang();
        lang.add_template_rule(0, realizational());
        assert!(lang.validate().is_ok());

        lang.add_mrule(0, realizational());
        assert!(matches!(lang.validate(), Err(MorphError::InvalidGrammar(_))));
    }

    #[test]
    fn test_compounding_rules_are_registered() {
        use crate::morphology::CompoundingSubrule;

        let mut lang = lang();
        let c = lang.add_compounding_rule(0, CompoundingRule::new("NN", vec![CompoundingSubrule::head_first()]));
        assert_eq!(lang.strata[0].compounding_rules, vec![c]);
        assert_eq!(lang.compounding_rules[c].stratum, 0);
        assert!(lang.validate().is_ok());

        lang.strata[0].compounding_rules.push(9);
        assert!(lang.validate().is_err());
    }
}
