// Poem scaffolding: turns a `FormSpec` into per-line generation targets.
//
// The scaffold is the structural state of one run. Each `LineScaffold`
// records where the line sits (stanza, 1-indexed line number), what it must
// rhyme with (rhyme symbol), what meter and syllable count it aims for, and
// which part-of-speech template the realizer fills. The scaffold also owns
// `rhyme_groups`: base rhyme symbol to the ordered line numbers sharing it.
//
// Base symbols strip trailing digits, so a villanelle's "A1" and "A2"
// refrains group with its plain "A" lines and all rhyme together.
//
// Refrains: every occurrence of a refrain (source line and repetitions) is
// marked `is_refrain`; repetitions also carry `refrain_source`, the line
// number whose text they copy once it is realized.
//
// Target syllables come from, in order: the form's per-line
// `syllable_pattern`, the stanza meter's expected length, and finally
// `default_target_syllables` from the config (for "syllabic" and other
// meters outside the catalog).

use crate::config::GeneratorConfig;
use crate::form::FormSpec;
use crate::grammar::{GrammarEngine, SyntacticTemplate};
use crate::meter::{MeterPattern, meter_catalog};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::info;
use wordrare_prng::RunRng;

/// Template category the scaffolder draws from.
const LINE_CATEGORY: &str = "line";

/// Strip trailing digits: "A1" -> "A".
pub fn base_symbol(symbol: &str) -> &str {
    symbol.trim_end_matches(|c: char| c.is_ascii_digit())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineScaffold {
    /// 1-indexed across the whole poem.
    pub line_number: usize,
    pub stanza_number: u32,
    pub rhyme_symbol: Option<String>,
    pub meter_pattern: String,
    pub target_syllables: usize,
    pub syntactic_template: Option<SyntacticTemplate>,
    pub is_refrain: bool,
    pub refrain_text: Option<String>,
    /// For refrain repetitions, the line whose text this line repeats.
    pub refrain_source: Option<usize>,
}

impl LineScaffold {
    pub fn base_rhyme_symbol(&self) -> Option<&str> {
        self.rhyme_symbol.as_deref().map(base_symbol)
    }

    /// A refrain occurrence that copies another line rather than being
    /// generated.
    pub fn is_refrain_repetition(&self) -> bool {
        self.refrain_source.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanzaScaffold {
    pub stanza_number: u32,
    pub lines: Vec<LineScaffold>,
}

#[derive(Debug, Clone)]
pub struct PoemScaffold {
    pub form: Arc<FormSpec>,
    pub stanzas: Vec<StanzaScaffold>,
    /// Base rhyme symbol -> line numbers, in poem order.
    pub rhyme_groups: BTreeMap<String, Vec<usize>>,
}

impl PoemScaffold {
    pub fn lines(&self) -> impl Iterator<Item = &LineScaffold> {
        self.stanzas.iter().flat_map(|s| s.lines.iter())
    }

    fn lines_mut(&mut self) -> impl Iterator<Item = &mut LineScaffold> {
        self.stanzas.iter_mut().flat_map(|s| s.lines.iter_mut())
    }

    /// Line by 1-indexed number.
    pub fn line(&self, line_number: usize) -> Option<&LineScaffold> {
        self.lines().find(|l| l.line_number == line_number)
    }

    pub fn line_mut(&mut self, line_number: usize) -> Option<&mut LineScaffold> {
        self.lines_mut().find(|l| l.line_number == line_number)
    }

    pub fn total_lines(&self) -> usize {
        self.stanzas.iter().map(|s| s.lines.len()).sum()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateStrategy {
    /// Keep the per-line picks made while building.
    #[default]
    Varied,
    /// One template per distinct syllable target.
    Consistent,
    /// Re-pick every line.
    Random,
}

pub struct Scaffolder<'g> {
    grammar: &'g GrammarEngine,
    meters: BTreeMap<String, MeterPattern>,
    default_target_syllables: usize,
}

impl<'g> Scaffolder<'g> {
    pub fn new(grammar: &'g GrammarEngine, config: &GeneratorConfig) -> Self {
        Scaffolder {
            grammar,
            meters: meter_catalog(),
            default_target_syllables: config.default_target_syllables,
        }
    }

    /// Build the scaffold for `form`. Template picks draw from `rng`.
    pub fn build_scaffold(&self, form: Arc<FormSpec>, rng: &mut RunRng) -> PoemScaffold {
        let mut stanzas = Vec::with_capacity(form.stanza_specs.len());
        let mut line_number = 1;
        for spec in &form.stanza_specs {
            let meter = form.stanza_meter(spec);
            let mut lines = Vec::with_capacity(spec.lines);
            for i in 0..spec.lines {
                let target_syllables = self.target_syllables(&form, meter, line_number);
                lines.push(LineScaffold {
                    line_number,
                    stanza_number: spec.stanza_id,
                    rhyme_symbol: spec.rhyme_pattern.get(i).cloned().flatten(),
                    meter_pattern: meter.to_string(),
                    target_syllables,
                    syntactic_template: self.pick_line_template(target_syllables, rng),
                    is_refrain: false,
                    refrain_text: None,
                    refrain_source: None,
                });
                line_number += 1;
            }
            stanzas.push(StanzaScaffold {
                stanza_number: spec.stanza_id,
                lines,
            });
        }

        let mut scaffold = PoemScaffold {
            form,
            stanzas,
            rhyme_groups: BTreeMap::new(),
        };
        scaffold.rhyme_groups = build_rhyme_groups(&scaffold);
        apply_refrains(&mut scaffold);

        info!(
            form = %scaffold.form.form_id,
            lines = scaffold.total_lines(),
            rhyme_groups = scaffold.rhyme_groups.len(),
            "scaffold built"
        );
        scaffold
    }

    fn target_syllables(&self, form: &FormSpec, meter: &str, line_number: usize) -> usize {
        form.special_rules
            .syllable_pattern
            .as_ref()
            .and_then(|p| p.get(line_number - 1).copied())
            .or_else(|| self.meters.get(meter).map(MeterPattern::expected_syllables))
            .unwrap_or(self.default_target_syllables)
    }

    fn pick_line_template(&self, target: usize, rng: &mut RunRng) -> Option<SyntacticTemplate> {
        self.grammar
            .pick_template(Some(LINE_CATEGORY), Some(target), rng)
            .cloned()
    }

    /// Reassign line templates according to `strategy`.
    pub fn assign_templates(
        &self,
        scaffold: &mut PoemScaffold,
        strategy: TemplateStrategy,
        rng: &mut RunRng,
    ) {
        match strategy {
            TemplateStrategy::Varied => {}
            TemplateStrategy::Consistent => {
                let mut by_length: BTreeMap<usize, Option<SyntacticTemplate>> = BTreeMap::new();
                for line in scaffold.lines_mut() {
                    let template = by_length
                        .entry(line.target_syllables)
                        .or_insert_with(|| self.pick_line_template(line.target_syllables, rng));
                    line.syntactic_template = template.clone();
                }
            }
            TemplateStrategy::Random => {
                for line in scaffold.lines_mut() {
                    line.syntactic_template = self.pick_line_template(line.target_syllables, rng);
                }
            }
        }
    }
}

fn build_rhyme_groups(scaffold: &PoemScaffold) -> BTreeMap<String, Vec<usize>> {
    let mut groups: BTreeMap<String, Vec<usize>> = BTreeMap::new();
    for line in scaffold.lines() {
        if let Some(base) = line.base_rhyme_symbol() {
            groups.entry(base.to_string()).or_default().push(line.line_number);
        }
    }
    groups
}

fn apply_refrains(scaffold: &mut PoemScaffold) {
    let form = Arc::clone(&scaffold.form);
    for refrain in form.special_rules.refrains.values() {
        if let Some(line) = scaffold.line_mut(refrain.line_number) {
            line.is_refrain = true;
        }
        for &n in &refrain.repetitions {
            if let Some(line) = scaffold.line_mut(n) {
                line.is_refrain = true;
                line.refrain_source = Some(refrain.line_number);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::form::{FormLibrary, SpecialRules, StanzaSpec};
    use proptest::prelude::*;

    fn build(form_id: &str, seed: u64) -> PoemScaffold {
        let config = GeneratorConfig::default();
        let grammar = GrammarEngine::new(&config);
        let scaffolder = Scaffolder::new(&grammar, &config);
        let form = FormLibrary::builtin().get_form(form_id).unwrap();
        scaffolder.build_scaffold(form, &mut RunRng::new(seed))
    }

    #[test]
    fn test_base_symbol() {
        assert_eq!(base_symbol("A1"), "A");
        assert_eq!(base_symbol("A"), "A");
        assert_eq!(base_symbol("B12"), "B");
    }

    #[test]
    fn test_haiku_scaffold() {
        let scaffold = build("haiku", 1);
        assert_eq!(scaffold.total_lines(), 3);
        let targets: Vec<usize> = scaffold.lines().map(|l| l.target_syllables).collect();
        assert_eq!(targets, vec![5, 7, 5]);
        assert!(scaffold.rhyme_groups.is_empty());
        assert!(scaffold.lines().all(|l| l.syntactic_template.is_some()));
    }

    #[test]
    fn test_sonnet_scaffold() {
        let scaffold = build("shakespearean_sonnet", 2);
        assert_eq!(scaffold.total_lines(), 14);
        assert!(scaffold.lines().all(|l| l.target_syllables == 10));
        assert_eq!(scaffold.rhyme_groups["A"], vec![1, 3]);
        assert_eq!(scaffold.rhyme_groups["G"], vec![13, 14]);
        assert_eq!(scaffold.rhyme_groups.len(), 7);
        let numbers: Vec<usize> = scaffold.lines().map(|l| l.line_number).collect();
        assert_eq!(numbers, (1..=14).collect::<Vec<_>>());
    }

    #[test]
    fn test_villanelle_refrains() {
        let scaffold = build("villanelle", 3);
        assert_eq!(scaffold.total_lines(), 19);
        assert_eq!(
            scaffold.rhyme_groups["A"],
            vec![1, 3, 4, 6, 7, 9, 10, 12, 13, 15, 16, 18, 19]
        );
        assert!(!scaffold.rhyme_groups.contains_key("A1"));

        let source = scaffold.line(1).unwrap();
        assert!(source.is_refrain);
        assert_eq!(source.refrain_source, None);
        for n in [6, 12, 18] {
            assert_eq!(scaffold.line(n).unwrap().refrain_source, Some(1));
        }
        for n in [9, 15, 19] {
            assert_eq!(scaffold.line(n).unwrap().refrain_source, Some(3));
        }
        assert!(!scaffold.line(2).unwrap().is_refrain);
    }

    #[test]
    fn test_unknown_meter_uses_default_target() {
        let config = GeneratorConfig {
            default_target_syllables: 9,
            ..GeneratorConfig::default()
        };
        let grammar = GrammarEngine::new(&config);
        let scaffolder = Scaffolder::new(&grammar, &config);
        let mut library = FormLibrary::new();
        let form = library
            .create_form_spec(
                "free",
                "Free",
                "",
                vec![StanzaSpec {
                    stanza_id: 1,
                    lines: 2,
                    rhyme_pattern: vec![None, None],
                    meter_pattern: String::new(),
                }],
                "free_verse",
                SpecialRules::default(),
                BTreeMap::new(),
            )
            .unwrap();
        let scaffold = scaffolder.build_scaffold(form, &mut RunRng::new(0));
        assert!(scaffold.lines().all(|l| l.target_syllables == 9));
    }

    #[test]
    fn test_consistent_strategy_shares_templates() {
        let config = GeneratorConfig::default();
        let grammar = GrammarEngine::new(&config);
        let scaffolder = Scaffolder::new(&grammar, &config);
        let form = FormLibrary::builtin().get_form("shakespearean_sonnet").unwrap();
        let mut rng = RunRng::new(5);
        let mut scaffold = scaffolder.build_scaffold(form, &mut rng);
        scaffolder.assign_templates(&mut scaffold, TemplateStrategy::Consistent, &mut rng);
        let first = scaffold.line(1).unwrap().syntactic_template.clone();
        assert!(scaffold.lines().all(|l| l.syntactic_template == first));
    }

    #[test]
    fn test_build_is_deterministic() {
        let a = build("terza_rima", 77);
        let b = build("terza_rima", 77);
        let ids = |s: &PoemScaffold| -> Vec<String> {
            s.lines()
                .map(|l| l.syntactic_template.as_ref().unwrap().id.clone())
                .collect()
        };
        assert_eq!(ids(&a), ids(&b));
    }

    fn arb_stanza() -> impl Strategy<Value = Vec<Option<String>>> {
        prop::collection::vec(
            prop::option::of(prop::sample::select(vec!["A", "B", "C", "A1", "A2"]))
                .prop_map(|s| s.map(str::to_string)),
            1..6,
        )
    }

    proptest! {
        #[test]
        fn test_scaffold_invariants(
            stanzas in prop::collection::vec(arb_stanza(), 1..6),
            seed in any::<u64>(),
        ) {
            let config = GeneratorConfig::default();
            let grammar = GrammarEngine::new(&config);
            let scaffolder = Scaffolder::new(&grammar, &config);
            let specs: Vec<StanzaSpec> = stanzas
                .iter()
                .enumerate()
                .map(|(i, symbols)| StanzaSpec {
                    stanza_id: i as u32 + 1,
                    lines: symbols.len(),
                    rhyme_pattern: symbols.clone(),
                    meter_pattern: String::new(),
                })
                .collect();
            let mut library = FormLibrary::new();
            let form = library
                .create_form_spec(
                    "prop",
                    "Prop",
                    "",
                    specs,
                    "iambic_tetrameter",
                    SpecialRules::default(),
                    BTreeMap::new(),
                )
                .unwrap();
            let scaffold = scaffolder.build_scaffold(Arc::clone(&form), &mut RunRng::new(seed));

            prop_assert_eq!(scaffold.total_lines(), form.total_lines);
            for line in scaffold.lines() {
                if let Some(base) = line.base_rhyme_symbol() {
                    prop_assert!(scaffold.rhyme_groups[base].contains(&line.line_number));
                }
            }
            let grouped: usize = scaffold.rhyme_groups.values().map(Vec::len).sum();
            let rhymed = scaffold.lines().filter(|l| l.rhyme_symbol.is_some()).count();
            prop_assert_eq!(grouped, rhymed);
        }
    }
}
