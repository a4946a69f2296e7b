// Grammar engine: a catalog of part-of-speech line templates.
//
// Syntax is approximated, not parsed: a template is an ordered list of
// part-of-speech slots (article, adjective, noun, ...) that the realizer
// fills left to right. Template ids carry their family as a prefix
// (`np_`, `vp_`, `svo`, `pp`, `line_`), and category lookups are prefix
// matches on the id.
//
// Template length is estimated as `slots * syllables_per_slot`, which is
// how `pick_template` matches templates to a line's syllable target within
// a tolerance.
//
// The catalog is a `BTreeMap`, so listing and random picks are stable for a
// given seed.

use crate::config::GeneratorConfig;
use crate::meter::MeterPattern;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use wordrare_lexicon::PartOfSpeech;
use wordrare_prng::RunRng;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PosSlot {
    pub pos: PartOfSpeech,
    /// Optional slots may be skipped when no word fits.
    pub required: bool,
}

impl PosSlot {
    pub fn required(pos: PartOfSpeech) -> Self {
        PosSlot {
            pos,
            required: true,
        }
    }

    pub fn optional(pos: PartOfSpeech) -> Self {
        PosSlot {
            pos,
            required: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyntacticTemplate {
    pub id: String,
    pub name: String,
    pub slots: Vec<PosSlot>,
    pub description: String,
}

impl SyntacticTemplate {
    pub fn pos_sequence(&self) -> Vec<PartOfSpeech> {
        self.slots.iter().map(|s| s.pos).collect()
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

fn template(
    id: &str,
    name: &str,
    pattern: &[PartOfSpeech],
    description: &str,
) -> SyntacticTemplate {
    SyntacticTemplate {
        id: id.to_string(),
        name: name.to_string(),
        slots: pattern.iter().map(|&p| PosSlot::required(p)).collect(),
        description: description.to_string(),
    }
}

/// The built-in template catalog.
pub fn default_templates() -> Vec<SyntacticTemplate> {
    use PartOfSpeech::*;
    vec![
        // Noun phrases
        template("np_simple", "Simple NP", &[Article, Noun], "Article + Noun"),
        template(
            "np_adj",
            "NP with Adjective",
            &[Article, Adjective, Noun],
            "Article + Adjective + Noun",
        ),
        template(
            "np_complex",
            "Complex NP",
            &[Article, Adjective, Adjective, Noun],
            "Article + Adjective + Adjective + Noun",
        ),
        // Verb phrases
        template("vp_simple", "Simple VP", &[Verb, Article, Noun], "Verb + NP"),
        template(
            "vp_adverb",
            "VP with Adverb",
            &[Adverb, Verb, Article, Noun],
            "Adverb + Verb + NP",
        ),
        // Clauses
        template(
            "svo",
            "Subject-Verb-Object",
            &[Article, Noun, Verb, Article, Noun],
            "Simple SVO clause",
        ),
        template(
            "svo_adj",
            "SVO with Adjectives",
            &[Article, Adjective, Noun, Verb, Article, Adjective, Noun],
            "SVO with adjectives",
        ),
        template(
            "svoc",
            "Subject-Verb-Object-Complement",
            &[Article, Noun, Verb, Article, Noun, Adjective],
            "SVO with complement",
        ),
        // Prepositional phrases
        template("pp", "Prepositional Phrase", &[Preposition, Article, Noun], "Preposition + NP"),
        template(
            "pp_adj",
            "PP with Adjective",
            &[Preposition, Article, Adjective, Noun],
            "Preposition + Adjective + NP",
        ),
        // Whole lines
        template(
            "line_svo_pp",
            "SVO + PP",
            &[Article, Noun, Verb, Article, Noun, Preposition, Article, Noun],
            "SVO clause with prepositional phrase",
        ),
        template(
            "line_adj_n_v_adv",
            "Adjective-Noun-Verb-Adverb",
            &[Article, Adjective, Noun, Verb, Adverb],
            "Descriptive subject with adverbial verb",
        ),
        template("line_np_v", "NP-Verb", &[Article, Noun, Verb], "Bare subject and verb"),
        template(
            "line_adj_n_v",
            "Adjective-Noun-Verb",
            &[Article, Adjective, Noun, Verb],
            "Descriptive subject and verb",
        ),
        template(
            "line_pp_np",
            "PP Fragment",
            &[Preposition, Article, Adjective, Noun],
            "Prepositional fragment",
        ),
        template(
            "line_adv_v_pp",
            "Adverb-Verb-PP",
            &[Adverb, Verb, Preposition, Article, Noun],
            "Adverbial verb with prepositional phrase",
        ),
        template(
            "line_n_v_pp_adj",
            "NP-Verb-PP with Adjective",
            &[Article, Noun, Verb, Preposition, Article, Adjective, Noun],
            "Subject and verb with descriptive prepositional phrase",
        ),
    ]
}

pub struct GrammarEngine {
    templates: BTreeMap<String, SyntacticTemplate>,
    syllables_per_slot: usize,
    syllable_tolerance: usize,
}

impl GrammarEngine {
    pub fn new(config: &GeneratorConfig) -> Self {
        GrammarEngine {
            templates: default_templates()
                .into_iter()
                .map(|t| (t.id.clone(), t))
                .collect(),
            syllables_per_slot: config.syllables_per_slot,
            syllable_tolerance: config.template_syllable_tolerance,
        }
    }

    pub fn get_template(&self, id: &str) -> Option<&SyntacticTemplate> {
        self.templates.get(id)
    }

    /// Template ids starting with `category` (all ids for `None`), sorted.
    pub fn list_templates(&self, category: Option<&str>) -> Vec<&str> {
        self.templates
            .keys()
            .filter(|id| category.is_none_or(|c| id.starts_with(c)))
            .map(String::as_str)
            .collect()
    }

    fn approx_syllables(&self, template: &SyntacticTemplate) -> usize {
        template.len() * self.syllables_per_slot
    }

    /// Random template from `category` whose estimated length is within
    /// tolerance of `syllable_target`.
    ///
    /// An empty category falls back to the whole catalog; if no template is
    /// close enough in length the length filter is dropped.
    pub fn pick_template(
        &self,
        category: Option<&str>,
        syllable_target: Option<usize>,
        rng: &mut RunRng,
    ) -> Option<&SyntacticTemplate> {
        let mut candidates = self.list_templates(category);
        if candidates.is_empty() {
            candidates = self.list_templates(None);
        }
        if let Some(target) = syllable_target {
            let close: Vec<&str> = candidates
                .iter()
                .copied()
                .filter(|id| {
                    self.templates
                        .get(*id)
                        .is_some_and(|t| {
                            self.approx_syllables(t).abs_diff(target) <= self.syllable_tolerance
                        })
                })
                .collect();
            if !close.is_empty() {
                candidates = close;
            }
        }
        let id = rng.choose(&candidates)?;
        self.templates.get(*id)
    }

    /// Register a custom template, replacing any with the same id.
    pub fn create_template(
        &mut self,
        id: &str,
        name: &str,
        slots: Vec<PosSlot>,
        description: &str,
    ) -> &SyntacticTemplate {
        let t = SyntacticTemplate {
            id: id.to_string(),
            name: name.to_string(),
            slots,
            description: description.to_string(),
        };
        self.templates.insert(id.to_string(), t);
        &self.templates[id]
    }

    /// Fill a template's slots with `select(slot, index)`, joining the words
    /// with spaces. Returns `None` if a required slot cannot be filled.
    pub fn expand_template(
        &self,
        template: &SyntacticTemplate,
        mut select: impl FnMut(&PosSlot, usize) -> Option<String>,
    ) -> Option<String> {
        let mut words = Vec::with_capacity(template.len());
        for (i, slot) in template.slots.iter().enumerate() {
            match select(slot, i) {
                Some(word) => words.push(word),
                None if slot.required => {
                    warn!(template = %template.id, pos = %slot.pos, "could not fill required slot");
                    return None;
                }
                None => {}
            }
        }
        Some(words.join(" "))
    }

    /// Templates whose estimated length is within two syllables of the
    /// meter's line length.
    pub fn suggest_templates_for_meter(&self, meter: &MeterPattern) -> Vec<&str> {
        let target = meter.expected_syllables();
        self.templates
            .values()
            .filter(|t| self.approx_syllables(t).abs_diff(target) <= 2)
            .map(|t| t.id.as_str())
            .collect()
    }
}
