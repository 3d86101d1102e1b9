//! Derivation state.
//!
//! A [`Word`] is one candidate in flight: its shape, syntactic and MPR
//! features, the stratum it has reached, the rules still pending from
//! analysis, the non-head roots of compounds still to build, and per-rule
//! application counters. Branching clones the word;
//! a word finished with a stratum is frozen, and editing a frozen word
//! unfreezes it so the edit is a new derivation of its own.

use std::hash::{Hash, Hasher};

use smallvec::SmallVec;

use crate::constraints::MprFeatureSet;
use crate::feature::FeatureStruct;
use crate::language::{AllomorphId, Language, MorphemeId};
use crate::morpher::TraceEvent;
use crate::shape::{MorphTag, Shape};

type Counters = SmallVec<[(usize, u32); 4]>;

/// The non-head constituent of a compound still to be built.
///
/// Analysis leaves the root unresolved; lexical lookup fills it in.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NonHead {
    /// Compounding rule, by index into [`Language::compounding_rules`]
    pub rule: usize,
    /// Shape of the constituent
    pub shape: Shape,
    /// Root allomorph, once known
    pub root: Option<AllomorphId>,
    /// Syntactic features of the root's entry, once known
    pub syntactic_fs: FeatureStruct,
}

/// A derivation in progress.
#[derive(Debug)]
pub struct Word {
    shape: Shape,
    stratum: usize,
    root: Option<AllomorphId>,
    syntactic_fs: FeatureStruct,
    realizational_fs: FeatureStruct,
    mpr_features: MprFeatureSet,
    // analysis pushes, synthesis pops: the last element is applied next
    pending: Vec<usize>,
    non_heads: Vec<NonHead>,
    applications: Counters,
    unapplications: Counters,
    allomorphs: Vec<AllomorphId>,
    morph_counter: u32,
    trace: Vec<TraceEvent>,
    frozen: bool,
}

impl Clone for Word {
    fn clone(&self) -> Self {
        Word {
            shape: self.shape.clone(),
            stratum: self.stratum,
            root: self.root,
            syntactic_fs: self.syntactic_fs.clone(),
            realizational_fs: self.realizational_fs.clone(),
            mpr_features: self.mpr_features.clone(),
            pending: self.pending.clone(),
            non_heads: self.non_heads.clone(),
            applications: self.applications.clone(),
            unapplications: self.unapplications.clone(),
            allomorphs: self.allomorphs.clone(),
            morph_counter: self.morph_counter,
            trace: self.trace.clone(),
            frozen: false,
        }
    }
}

impl Word {
    /// A surface word entering analysis at `stratum`.
    pub fn for_analysis(shape: Shape, stratum: usize) -> Self {
        Word {
            shape,
            stratum,
            root: None,
            syntactic_fs: FeatureStruct::new(),
            realizational_fs: FeatureStruct::new(),
            mpr_features: MprFeatureSet::new(),
            pending: Vec::new(),
            non_heads: Vec::new(),
            applications: Counters::new(),
            unapplications: Counters::new(),
            allomorphs: Vec::new(),
            morph_counter: 0,
            trace: Vec::new(),
            frozen: false,
        }
    }

    /// A word built on a root allomorph, ready for synthesis.
    ///
    /// `rules` are the morphological rules to apply, in application order.
    /// Returns `None` when the id does not name a root allomorph.
    pub fn from_root(
        language: &Language,
        root: AllomorphId,
        syntactic_fs: FeatureStruct,
        rules: &[usize],
    ) -> Option<Self> {
        let MorphemeId::Entry(e) = root.morpheme else {
            return None;
        };
        let entry = language.entries.get(e)?;
        let allomorph = entry.allomorphs.get(root.index)?;
        let mut word = Word::for_analysis(allomorph.shape.clone(), entry.stratum);
        word.set_root(language, root, syntactic_fs)?;
        word.pending = rules.iter().rev().copied().collect();
        Some(word)
    }

    /// Swap in a root allomorph, replacing the shape with the root's.
    ///
    /// The syntactic features become the unification of `syntactic_fs` with
    /// the entry's; `None` when they clash.
    pub fn set_root(
        &mut self,
        language: &Language,
        root: AllomorphId,
        syntactic_fs: FeatureStruct,
    ) -> Option<()> {
        self.thaw();
        let MorphemeId::Entry(e) = root.morpheme else {
            return None;
        };
        let entry = language.entries.get(e)?;
        let allomorph = entry.allomorphs.get(root.index)?;
        let fs = syntactic_fs.unify(&entry.syntactic_fs, &mut Default::default())?;

        let mut shape = allomorph.shape.clone();
        let tag = MorphTag {
            allomorph: root,
            morph_id: 0,
        };
        let ids: Vec<_> = shape.iter().collect();
        for id in ids {
            shape[id].morph = Some(tag);
        }
        self.shape = shape;
        self.root = Some(root);
        self.stratum = entry.stratum;
        self.syntactic_fs = fs;
        self.mpr_features = entry.mpr_features.clone();
        self.applications.clear();
        self.unapplications.clear();
        self.allomorphs = vec![root];
        self.morph_counter = 1;
        Some(())
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    /// The shape.
    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    /// Mutable shape access.
    pub fn shape_mut(&mut self) -> &mut Shape {
        self.thaw();
        &mut self.shape
    }

    /// Replace the shape.
    pub fn set_shape(&mut self, shape: Shape) {
        self.thaw();
        self.shape = shape;
    }

    /// Stratum the word has reached.
    pub fn stratum(&self) -> usize {
        self.stratum
    }

    /// Move the word to a stratum.
    pub fn set_stratum(&mut self, stratum: usize) {
        self.thaw();
        self.stratum = stratum;
    }

    /// Root allomorph, once known.
    pub fn root(&self) -> Option<AllomorphId> {
        self.root
    }

    /// Root lexical entry index, once known.
    pub fn root_entry(&self) -> Option<usize> {
        match self.root?.morpheme {
            MorphemeId::Entry(e) => Some(e),
            MorphemeId::Rule(_) => None,
        }
    }

    /// Syntactic features.
    pub fn syntactic_fs(&self) -> &FeatureStruct {
        &self.syntactic_fs
    }

    /// Replace the syntactic features.
    pub fn set_syntactic_fs(&mut self, fs: FeatureStruct) {
        self.thaw();
        self.syntactic_fs = fs;
    }

    /// Features realizational rules are asked to spell out.
    pub fn realizational_fs(&self) -> &FeatureStruct {
        &self.realizational_fs
    }

    /// Replace the realizational features.
    pub fn set_realizational_fs(&mut self, fs: FeatureStruct) {
        self.thaw();
        self.realizational_fs = fs;
    }

    /// Builder: realizational features.
    pub fn with_realizational_fs(mut self, fs: FeatureStruct) -> Self {
        self.set_realizational_fs(fs);
        self
    }

    /// MPR features.
    pub fn mpr_features(&self) -> &MprFeatureSet {
        &self.mpr_features
    }

    /// Mutable MPR features.
    pub fn mpr_features_mut(&mut self) -> &mut MprFeatureSet {
        self.thaw();
        &mut self.mpr_features
    }

    /// Allomorphs realized so far: root first, then affixes in application
    /// order.
    pub fn allomorphs(&self) -> &[AllomorphId] {
        &self.allomorphs
    }

    /// Morphemes realized so far, in the order of [`allomorphs`](Self::allomorphs).
    pub fn morphemes(&self) -> Vec<MorphemeId> {
        self.allomorphs.iter().map(|a| a.morpheme).collect()
    }

    /// Rules still to apply, next one last.
    pub fn pending_rules(&self) -> &[usize] {
        &self.pending
    }

    /// Recorded trace events.
    pub fn trace(&self) -> &[TraceEvent] {
        &self.trace
    }

    /// Append a trace event.
    pub fn record(&mut self, event: TraceEvent) {
        self.trace.push(event);
    }

    /// Freeze the word and its shape.
    pub fn freeze(&mut self) {
        self.frozen = true;
        self.shape.freeze();
    }

    /// Whether the word is frozen.
    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    // every mutator goes through here: an edit starts a new, unfrozen derivation
    fn thaw(&mut self) {
        self.frozen = false;
    }

    // ========================================================================
    // Rule bookkeeping
    // ========================================================================

    fn count(counters: &Counters, rule: usize) -> u32 {
        counters
            .iter()
            .find(|(r, _)| *r == rule)
            .map_or(0, |(_, c)| *c)
    }

    fn bump(counters: &mut Counters, rule: usize) {
        match counters.iter_mut().find(|(r, _)| *r == rule) {
            Some((_, c)) => *c += 1,
            None => counters.push((rule, 1)),
        }
    }

    /// Times `rule` has been applied on this path.
    pub fn application_count(&self, rule: usize) -> u32 {
        Self::count(&self.applications, rule)
    }

    /// Times `rule` has been unapplied on this path.
    pub fn unapplication_count(&self, rule: usize) -> u32 {
        Self::count(&self.unapplications, rule)
    }

    /// True if `rule` is the next pending rule.
    pub fn is_morphological_rule_applicable(&self, rule: usize) -> bool {
        self.pending.last() == Some(&rule)
    }

    /// True if a pending rule or an unbuilt compound belongs to `stratum`.
    pub fn has_remaining_rules_from_stratum(&self, language: &Language, stratum: usize) -> bool {
        self.pending
            .iter()
            .any(|&r| language.morpheme_stratum(MorphemeId::Rule(r)) == Some(stratum))
            || self.non_heads.iter().any(|n| {
                language
                    .compounding_rules
                    .get(n.rule)
                    .is_some_and(|r| r.stratum == stratum)
            })
    }

    /// A fresh morph tag for an allomorph about to be realized.
    pub fn next_morph_tag(&mut self, allomorph: AllomorphId) -> MorphTag {
        let tag = MorphTag {
            allomorph,
            morph_id: self.morph_counter,
        };
        self.morph_counter += 1;
        tag
    }

    /// Record the application of `rule` through `allomorph`.
    pub fn morphological_rule_applied(&mut self, rule: usize, allomorph: AllomorphId) {
        self.thaw();
        if self.pending.last() == Some(&rule) {
            self.pending.pop();
        }
        Self::bump(&mut self.applications, rule);
        self.allomorphs.push(allomorph);
    }

    /// Record the unapplication of `rule`.
    pub fn morphological_rule_unapplied(&mut self, rule: usize) {
        self.thaw();
        self.pending.push(rule);
        Self::bump(&mut self.unapplications, rule);
    }

    /// Record the unapplication of realizational `rule`, which spells out
    /// `fs`. Synthesis finds the rule again through the features, so nothing
    /// is pushed on the pending stack.
    ///
    /// `None` when `fs` clashes with features already recorded.
    pub fn realizational_rule_unapplied(&mut self, rule: usize, fs: &FeatureStruct) -> Option<()> {
        let merged = self.realizational_fs.unify(fs, &mut Default::default())?;
        self.thaw();
        self.realizational_fs = merged;
        Self::bump(&mut self.unapplications, rule);
        Some(())
    }

    // ========================================================================
    // Compounds
    // ========================================================================

    /// Non-head constituents still to attach, next one last.
    pub fn non_heads(&self) -> &[NonHead] {
        &self.non_heads
    }

    /// Queue root allomorph `root` as the non-head of compounding `rule`.
    ///
    /// Returns `None` when the id does not name a root allomorph.
    pub fn push_non_head(&mut self, language: &Language, rule: usize, root: AllomorphId) -> Option<()> {
        let non_head = Self::resolved_non_head(language, rule, root)?;
        self.thaw();
        self.non_heads.push(non_head);
        Some(())
    }

    /// Record the unapplication of compounding `rule`, which split off
    /// `shape` as the non-head.
    pub fn compounding_rule_unapplied(&mut self, rule: usize, shape: Shape) {
        self.thaw();
        self.non_heads.push(NonHead {
            rule,
            shape,
            root: None,
            syntactic_fs: FeatureStruct::new(),
        });
    }

    /// Non-heads of `rule` split off on this path.
    pub fn compounding_count(&self, rule: usize) -> u32 {
        self.non_heads.iter().filter(|n| n.rule == rule).count() as u32
    }

    /// Resolve the non-head at `index` to root allomorph `root`.
    pub fn set_non_head_root(&mut self, language: &Language, index: usize, root: AllomorphId) -> Option<()> {
        let rule = self.non_heads.get(index)?.rule;
        let non_head = Self::resolved_non_head(language, rule, root)?;
        self.thaw();
        self.non_heads[index] = non_head;
        Some(())
    }

    /// Take the next non-head off the stack, recording its root as realized.
    pub fn compounding_rule_applied(&mut self) -> Option<NonHead> {
        self.thaw();
        let non_head = self.non_heads.pop()?;
        if let Some(root) = non_head.root {
            self.allomorphs.push(root);
        }
        Some(non_head)
    }

    fn resolved_non_head(language: &Language, rule: usize, root: AllomorphId) -> Option<NonHead> {
        let MorphemeId::Entry(e) = root.morpheme else {
            return None;
        };
        let entry = language.entries.get(e)?;
        let allomorph = entry.allomorphs.get(root.index)?;
        Some(NonHead {
            rule,
            shape: allomorph.shape.clone(),
            root: Some(root),
            syntactic_fs: entry.syntactic_fs.clone(),
        })
    }
}

impl PartialEq for Word {
    fn eq(&self, other: &Self) -> bool {
        self.shape == other.shape
            && self.stratum == other.stratum
            && self.root == other.root
            && self.syntactic_fs == other.syntactic_fs
            && self.realizational_fs == other.realizational_fs
            && self.mpr_features == other.mpr_features
            && self.pending == other.pending
            && self.non_heads == other.non_heads
            && self.allomorphs == other.allomorphs
    }
}

impl Eq for Word {}

impl Hash for Word {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.shape.hash(state);
        self.stratum.hash(state);
        self.root.hash(state);
        self.syntactic_fs.hash(state);
        self.realizational_fs.hash(state);
        self.mpr_features.hash(state);
        self.pending.hash(state);
        self.non_heads.hash(state);
        self.allomorphs.hash(state);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_table::CharacterDefinitionTable;
    use crate::language::{LexEntry, RootAllomorph, Stratum};
    use crate::morphology::{AffixProcessAllomorph, AffixProcessRule};
    use crate::shape::NodeType;

    fn lang() -> Language {
        let mut lang = Language::new("t", CharacterDefinitionTable::new("t"));
        lang.add_stratum(Stratum::new("s0"));
        lang.add_stratum(Stratum::new("s1"));
        let mut shape = Shape::new();
        shape.push(NodeType::Segment, FeatureStruct::new().with("seg", "k"));
        lang.add_entry(
            1,
            LexEntry::new("k", RootAllomorph::new(shape))
                .with_syntactic_fs(FeatureStruct::new().with("pos", "N")),
        );
        lang.add_mrule(1, AffixProcessRule::new("r", vec![AffixProcessAllomorph::suffix(Shape::new())]));
        lang
    }

    #[test]
    fn test_from_root_tags_shape_and_sets_stratum() {
        let lang = lang();
        let root = AllomorphId::new(MorphemeId::Entry(0), 0);
        let word = Word::from_root(&lang, root, FeatureStruct::new(), &[0]).unwrap();
        assert_eq!(word.stratum(), 1);
        assert_eq!(word.shape().morphs().len(), 1);
        assert_eq!(word.allomorphs(), &[root]);
        assert!(word.is_morphological_rule_applicable(0));
        assert!(word.has_remaining_rules_from_stratum(&lang, 1));
        assert!(!word.has_remaining_rules_from_stratum(&lang, 0));

        let clash = FeatureStruct::new().with("pos", "V");
        assert!(Word::from_root(&lang, root, clash, &[]).is_none());
    }

    #[test]
    fn test_rule_bookkeeping() {
        let mut word = Word::for_analysis(Shape::new(), 0);
        word.morphological_rule_unapplied(3);
        word.morphological_rule_unapplied(5);
        assert_eq!(word.pending_rules(), &[3, 5]);
        assert_eq!(word.unapplication_count(5), 1);

        let affix = AllomorphId::new(MorphemeId::Rule(5), 0);
        word.morphological_rule_applied(5, affix);
        assert_eq!(word.pending_rules(), &[3]);
        assert_eq!(word.application_count(5), 1);
        assert_eq!(word.next_morph_tag(affix).morph_id, 0);
        assert_eq!(word.next_morph_tag(affix).morph_id, 1);
    }

    #[test]
    fn test_equality_ignores_trace_and_counters() {
        let mut a = Word::for_analysis(Shape::new(), 0);
        let b = a.clone();
        a.record(TraceEvent::mark(
            crate::morpher::TraceKind::Rejected,
            crate::morpher::RuleKey::Lexicon,
            &b,
        ));
        assert_eq!(a, b);
        a.freeze();
        assert!(!a.clone().is_frozen());
    }

    #[test]
    fn test_non_head_stack() {
        use crate::morphology::{CompoundingRule, CompoundingSubrule};

        let mut lang = lang();
        lang.add_compounding_rule(1, CompoundingRule::new("c", vec![CompoundingSubrule::head_first()]));
        let root = AllomorphId::new(MorphemeId::Entry(0), 0);

        let mut word = Word::for_analysis(Shape::new(), 1);
        word.compounding_rule_unapplied(0, Shape::new());
        assert_eq!(word.compounding_count(0), 1);
        assert!(word.non_heads()[0].root.is_none());
        assert!(word.has_remaining_rules_from_stratum(&lang, 1));

        word.set_non_head_root(&lang, 0, root).unwrap();
        assert_eq!(word.non_heads()[0].root, Some(root));
        assert!(word.non_heads()[0].syntactic_fs.symbols("pos").is_some());
        // only roots can be non-heads
        let affix = AllomorphId::new(MorphemeId::Rule(0), 0);
        assert!(word.set_non_head_root(&lang, 0, affix).is_none());

        let taken = word.compounding_rule_applied().unwrap();
        assert_eq!(taken.root, Some(root));
        assert_eq!(word.allomorphs(), &[root]);
        assert!(word.non_heads().is_empty());
        assert!(!word.has_remaining_rules_from_stratum(&lang, 1));
    }

    #[test]
    fn test_realizational_unapplication_accumulates_features() {
        let mut word = Word::for_analysis(Shape::new(), 0);
        let past = FeatureStruct::new().with("tense", "past");
        word.realizational_rule_unapplied(2, &past).unwrap();
        word.realizational_rule_unapplied(3, &FeatureStruct::new().with("pers", "3")).unwrap();
        assert!(word.pending_rules().is_empty());
        assert_eq!(word.unapplication_count(2), 1);
        assert_eq!(word.realizational_fs().len(), 2);

        let present = FeatureStruct::new().with("tense", "pres");
        assert!(word.realizational_rule_unapplied(4, &present).is_none());
        assert_eq!(word.unapplication_count(4), 0);
    }

    #[test]
    fn test_editing_a_frozen_word_unfreezes_it() {
        let mut word = Word::for_analysis(Shape::new(), 0);
        word.freeze();
        let snapshot = word.clone();

        word.set_stratum(1);
        assert!(!word.is_frozen());
        word.shape_mut()
            .push(NodeType::Segment, FeatureStruct::new().with("seg", "a"));
        assert!(!word.shape().is_frozen());
        assert_ne!(word, snapshot);
        assert_eq!(snapshot.stratum(), 0);
    }
}
