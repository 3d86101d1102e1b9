//! Affix templates: rules grouped into ordered slots.

use super::{AnalysisAffixProcessRule, SynthesisAffixProcessRule};
use crate::feature::FeatureStruct;
use crate::language::Language;
use crate::morpher::{RuleKey, TraceEvent, TraceKind};
use crate::rules::{push_unique, Rule, RuleContext};
use crate::word::Word;

/// One slot of a template.
#[derive(Debug, Clone, Default)]
pub struct AffixTemplateSlot {
    /// Name
    pub name: String,
    /// Alternative rules, by index into the language's rule list
    pub rules: Vec<usize>,
    /// An optional slot may stay empty
    pub optional: bool,
}

impl AffixTemplateSlot {
    /// A required slot.
    pub fn new(name: impl Into<String>, rules: Vec<usize>) -> Self {
        AffixTemplateSlot {
            name: name.into(),
            rules,
            optional: false,
        }
    }

    /// Builder: make optional.
    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }
}

/// An ordered sequence of slots, applied innermost first.
#[derive(Debug, Clone, Default)]
pub struct AffixTemplate {
    /// Name
    pub name: String,
    /// Syntactic features the word must unify with
    pub required_syntactic_fs: FeatureStruct,
    /// Slots, innermost first
    pub slots: Vec<AffixTemplateSlot>,
}

impl AffixTemplate {
    /// A template without feature requirements.
    pub fn new(name: impl Into<String>, slots: Vec<AffixTemplateSlot>) -> Self {
        AffixTemplate {
            name: name.into(),
            required_syntactic_fs: FeatureStruct::new(),
            slots,
        }
    }

    /// Whether the template may apply to `word`.
    pub fn is_applicable(&self, word: &Word) -> bool {
        self.required_syntactic_fs.is_unifiable(word.syntactic_fs())
    }
}

/// Run `words` through one slot.
///
/// A word no rule applies to survives only if the slot is optional.
fn synthesize_slot<R: Rule>(
    ctx: &RuleContext<'_>,
    rules: &[R],
    optional: bool,
    words: Vec<Word>,
) -> Vec<Word> {
    let mut next = Vec::new();
    for word in words {
        let mut applied = false;
        for rule in rules {
            for out in rule.apply(ctx, &word) {
                applied = true;
                push_unique(&mut next, out);
            }
        }
        if !applied && optional {
            push_unique(&mut next, word);
        }
    }
    next
}

/// Undo one slot.
///
/// Material an optional slot's rules could strip may belong to the stem, so
/// for an optional slot every input word survives next to its
/// unapplications.
fn analyze_slot<R: Rule>(
    ctx: &RuleContext<'_>,
    rules: &[R],
    optional: bool,
    words: Vec<Word>,
) -> Vec<Word> {
    let mut next = Vec::new();
    for word in words {
        for rule in rules {
            for out in rule.apply(ctx, &word) {
                push_unique(&mut next, out);
            }
        }
        if optional {
            push_unique(&mut next, word);
        }
    }
    next
}

fn trace_all(ctx: &RuleContext<'_>, key: RuleKey, kind: TraceKind, input: &Word, words: &mut [Word]) {
    if ctx.is_tracing(key) {
        for word in words.iter_mut() {
            let event = TraceEvent::step(kind, key, None, input, word);
            word.record(event);
        }
    }
}

/// Synthesis side of an [`AffixTemplate`].
#[derive(Debug, Clone)]
pub struct SynthesisAffixTemplate {
    stratum: usize,
    index: usize,
    slots: Vec<(bool, Vec<SynthesisAffixProcessRule>)>,
}

impl SynthesisAffixTemplate {
    /// Compile template `index` of `stratum`.
    pub fn new(language: &Language, stratum: usize, index: usize) -> Self {
        let slots = template(language, stratum, index)
            .map(|t| {
                t.slots
                    .iter()
                    .map(|s| {
                        let rules = s
                            .rules
                            .iter()
                            .map(|&r| SynthesisAffixProcessRule::new(language, r))
                            .collect();
                        (s.optional, rules)
                    })
                    .collect()
            })
            .unwrap_or_default();
        SynthesisAffixTemplate {
            stratum,
            index,
            slots,
        }
    }

    /// Whether the template may apply to `word`.
    pub fn is_applicable(&self, ctx: &RuleContext<'_>, word: &Word) -> bool {
        template(ctx.language, self.stratum, self.index).is_some_and(|t| t.is_applicable(word))
    }
}

impl Rule for SynthesisAffixTemplate {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        if !self.is_applicable(ctx, input) {
            return Vec::new();
        }
        let mut words = vec![input.clone()];
        for (optional, rules) in &self.slots {
            words = synthesize_slot(ctx, rules, *optional, words);
            if words.is_empty() {
                break;
            }
        }
        let key = RuleKey::Template {
            stratum: self.stratum,
            index: self.index,
        };
        trace_all(ctx, key, TraceKind::TemplateSynthesis, input, &mut words);
        words
    }
}

/// Analysis side of an [`AffixTemplate`]: slots are undone outermost first.
#[derive(Debug, Clone)]
pub struct AnalysisAffixTemplate {
    stratum: usize,
    index: usize,
    slots: Vec<(bool, Vec<AnalysisAffixProcessRule>)>,
}

impl AnalysisAffixTemplate {
    /// Compile template `index` of `stratum`.
    pub fn new(language: &Language, stratum: usize, index: usize) -> Self {
        let slots = template(language, stratum, index)
            .map(|t| {
                t.slots
                    .iter()
                    .rev()
                    .map(|s| {
                        let rules = s
                            .rules
                            .iter()
                            .map(|&r| AnalysisAffixProcessRule::new(language, r))
                            .collect();
                        (s.optional, rules)
                    })
                    .collect()
            })
            .unwrap_or_default();
        AnalysisAffixTemplate {
            stratum,
            index,
            slots,
        }
    }
}

impl Rule for AnalysisAffixTemplate {
    fn apply(&self, ctx: &RuleContext<'_>, input: &Word) -> Vec<Word> {
        let Some(template) = template(ctx.language, self.stratum, self.index) else {
            return Vec::new();
        };
        if !template.is_applicable(input) {
            return Vec::new();
        }
        let mut words = vec![input.clone()];
        for (optional, rules) in &self.slots {
            words = analyze_slot(ctx, rules, *optional, words);
            if words.is_empty() {
                break;
            }
        }
        let key = RuleKey::Template {
            stratum: self.stratum,
            index: self.index,
        };
        trace_all(ctx, key, TraceKind::TemplateAnalysis, input, &mut words);
        words
    }
}

fn template(language: &Language, stratum: usize, index: usize) -> Option<&AffixTemplate> {
    language.strata.get(stratum)?.templates.get(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::char_table::CharacterDefinitionTable;
    use crate::language::{AllomorphId, LexEntry, MorphemeId, RootAllomorph, Stratum};
    use crate::morpher::MorpherSettings;
    use crate::morphology::{AffixProcessAllomorph, AffixProcessRule};
    use crate::shape::{NodeType, Shape};

    fn shape(segs: &[&str]) -> Shape {
        let mut shape = Shape::new();
        for s in segs {
            shape.push(NodeType::Segment, FeatureStruct::new().with("seg", s));
        }
        shape
    }

    fn names(shape: &Shape) -> String {
        shape
            .iter()
            .filter_map(|id| shape[id].fs.symbols("seg").map(|s| s.to_string()))
            .collect()
    }

    /// Verb template: optional aspect slot, required person slot.
    fn language() -> Language {
        let mut lang = Language::new("t", CharacterDefinitionTable::new("t"));
        lang.add_stratum(Stratum::new("s"));
        lang.add_entry(
            0,
            LexEntry::new("dan", RootAllomorph::new(shape(&["d", "a", "n"])))
                .with_syntactic_fs(FeatureStruct::new().with("pos", "V")),
        );
        let asp = lang.add_template_rule(
            0,
            AffixProcessRule::new("asp", vec![AffixProcessAllomorph::suffix(shape(&["i"]))]),
        );
        let per = lang.add_template_rule(
            0,
            AffixProcessRule::new("1sg", vec![AffixProcessAllomorph::suffix(shape(&["m"]))]),
        );
        let mut template = AffixTemplate::new(
            "verb",
            vec![
                AffixTemplateSlot::new("aspect", vec![asp]).optional(),
                AffixTemplateSlot::new("person", vec![per]),
            ],
        );
        template.required_syntactic_fs = FeatureStruct::new().with("pos", "V");
        lang.add_template(0, template);
        lang
    }

    fn root(lang: &Language, rules: &[usize]) -> Word {
        Word::from_root(
            lang,
            AllomorphId::new(MorphemeId::Entry(0), 0),
            FeatureStruct::new(),
            rules,
        )
        .unwrap()
    }

    #[test]
    fn test_synthesis_fills_slots_in_order() {
        let lang = language();
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let template = SynthesisAffixTemplate::new(&lang, 0, 0);

        let out = template.apply(&ctx, &root(&lang, &[0, 1]));
        assert_eq!(out.len(), 1);
        assert_eq!(names(out[0].shape()), "danim");

        let out = template.apply(&ctx, &root(&lang, &[1]));
        assert_eq!(names(out[0].shape()), "danm");

        // the required person slot stays empty
        assert!(template.apply(&ctx, &root(&lang, &[0])).is_empty());
    }

    #[test]
    fn test_analysis_undoes_outer_slot_first() {
        let lang = language();
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let template = AnalysisAffixTemplate::new(&lang, 0, 0);

        let out = template.apply(&ctx, &Word::for_analysis(shape(&["d", "a", "n", "i", "m"]), 0));
        let forms: Vec<String> = out.iter().map(|w| names(w.shape())).collect();
        assert!(forms.contains(&"dan".to_string()));
        assert!(forms.contains(&"dani".to_string()));
        let full = out.iter().find(|w| names(w.shape()) == "dan").unwrap();
        assert_eq!(full.pending_rules(), &[1, 0]);

        assert!(template
            .apply(&ctx, &Word::for_analysis(shape(&["d", "a", "n"]), 0))
            .is_empty());
    }

    #[test]
    fn test_analysis_keeps_empty_optional_slot_reading() {
        let lang = language();
        let settings = MorpherSettings::default();
        let ctx = RuleContext::new(&lang, &settings);
        let template = AnalysisAffixTemplate::new(&lang, 0, 0);

        // "dani" may be a stem ending in the aspect vowel
        let out = template.apply(&ctx, &Word::for_analysis(shape(&["d", "a", "n", "i", "m"]), 0));
        let stem = out
            .iter()
            .find(|w| names(w.shape()) == "dani")
            .expect("the aspect slot may be empty");
        assert_eq!(stem.pending_rules(), &[1]);
        assert!(out
            .iter()
            .any(|w| names(w.shape()) == "dan" && w.pending_rules() == [1, 0]));
    }
}
