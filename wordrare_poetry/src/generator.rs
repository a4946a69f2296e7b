// Top-level generation pipeline.
//
// `PoemGenerator::generate` runs one request end to end:
//
//   1. validate the request (all violations reported together)
//   2. resolve the form and seed the run's `RunRng`
//   3. build the scaffold and assign line templates
//   4. realize every line, threading a fresh `RhymeAnchors` through the run
//   5. repair each generated line with the iterative repairer
//   6. re-copy refrain repetitions from their (possibly repaired) source
//   7. score every final line for the report
//
// Steps 3-7 cannot fail: a line that cannot be realized becomes a
// placeholder and is carried through unrepaired. The only errors are
// validation failures and an unknown form.
//
// The palette is optional. When the caller supplies none and the request
// names a theme, a palette is built from the store's domain tags. Without a
// palette, or when no palette word has an embedding, there is no theme
// centroid and semantic scores stay neutral.
//
// Every random draw comes from one `RunRng` seeded with `request.seed`, so
// identical requests against the same store produce identical poems.

use crate::config::GeneratorConfig;
use crate::constraint::{ConstraintModel, TargetSpec};
use crate::error::Result;
use crate::form::FormLibrary;
use crate::grammar::GrammarEngine;
use crate::meter::meter_catalog;
use crate::realize::{LineRealizer, RealizedLine, RhymeAnchors, SelectionParams, WordSelector};
use crate::repair::{ConflictDetector, IterativeRepairer, LineRepairer, RepairOutcome};
use crate::request::GenerationRequest;
use crate::scaffold::{LineScaffold, PoemScaffold, Scaffolder};
use crate::semantic::ThemeCentroid;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info};
use wordrare_lexicon::{SemanticPalette, WordStore};
use wordrare_prng::RunRng;

/// Hex digits in a run id.
const RUN_ID_LEN: usize = 12;

/// Per-line debug data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineReport {
    pub line_number: usize,
    pub stanza_number: u32,
    pub rhyme_symbol: Option<String>,
    /// Constraint name -> score for the final text.
    pub scores: BTreeMap<String, f64>,
    pub utility: f64,
    /// Score the realizer gave the kept candidate.
    pub realization_score: f64,
    pub repaired: bool,
    pub strategies: Vec<String>,
    pub is_refrain: bool,
    pub is_placeholder: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedPoem {
    pub run_id: String,
    pub form_id: String,
    pub seed: u64,
    pub lines: Vec<String>,
    /// Line count of each stanza, in order.
    pub stanza_sizes: Vec<usize>,
    /// Base rhyme symbol -> anchor word.
    pub rhyme_anchors: BTreeMap<String, String>,
    pub line_reports: Vec<LineReport>,
}

impl GeneratedPoem {
    /// Plain text, stanzas separated by a blank line.
    pub fn to_text(&self) -> String {
        let mut lines = self.lines.iter();
        self.stanza_sizes
            .iter()
            .map(|&n| lines.by_ref().take(n).cloned().collect::<Vec<_>>().join("\n"))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    pub fn placeholder_count(&self) -> usize {
        self.line_reports.iter().filter(|r| r.is_placeholder).count()
    }

    pub fn mean_utility(&self) -> f64 {
        if self.line_reports.is_empty() {
            return 0.0;
        }
        self.line_reports.iter().map(|r| r.utility).sum::<f64>() / self.line_reports.len() as f64
    }
}

pub struct PoemGenerator<'a> {
    store: &'a dyn WordStore,
    forms: &'a FormLibrary,
    grammar: GrammarEngine,
    config: GeneratorConfig,
}

impl<'a> PoemGenerator<'a> {
    pub fn new(store: &'a dyn WordStore, forms: &'a FormLibrary, config: GeneratorConfig) -> Self {
        PoemGenerator {
            store,
            forms,
            grammar: GrammarEngine::new(&config),
            config,
        }
    }

    pub fn config(&self) -> &GeneratorConfig {
        &self.config
    }

    pub fn forms(&self) -> &FormLibrary {
        self.forms
    }

    pub fn grammar(&self) -> &GrammarEngine {
        &self.grammar
    }

    /// Generate one poem. `palette` overrides the theme-derived palette.
    pub fn generate(
        &self,
        request: &GenerationRequest,
        palette: Option<&SemanticPalette>,
    ) -> Result<GeneratedPoem> {
        request.validate(self.forms)?;
        let form = self.forms.get_form(&request.form)?;

        let mut rng = RunRng::new(request.seed);
        let run_id = rng.hex_id(RUN_ID_LEN);
        info!(
            run_id = %run_id,
            form = %form.form_id,
            seed = request.seed,
            "generation started"
        );

        let palette = match palette {
            Some(p) => Some(p.clone()),
            None => request
                .theme
                .as_deref()
                .map(|theme| {
                    SemanticPalette::from_theme(self.store, theme, self.config.palette_pool_size)
                }),
        };
        let centroid = palette
            .as_ref()
            .and_then(|p| ThemeCentroid::from_palette(self.store, p));
        debug!(
            palette_words = palette.as_ref().map_or(0, |p| p.word_count()),
            centroid_support = centroid.as_ref().map_or(0, |c| c.support),
            "theme resolved"
        );

        let scaffolder = Scaffolder::new(&self.grammar, &self.config);
        let mut scaffold = scaffolder.build_scaffold(form, &mut rng);
        scaffolder.assign_templates(&mut scaffold, request.template_strategy, &mut rng);

        let weights = request.weights();
        let mut selector =
            WordSelector::new(self.store, SelectionParams::from_request(request), &self.config);
        if let Some(p) = &palette {
            selector = selector.with_palette(p);
        }
        let mut realizer = LineRealizer::new(selector, &self.config, &weights);
        let mut anchors = RhymeAnchors::new();
        let realized = realizer.realize_poem(&mut scaffold, &mut anchors, &mut rng);

        let model = ConstraintModel::new(self.store, &self.config, weights).with_centroid(centroid);
        let mut policy = request.policy.policy();
        policy.max_repairs = request.repair_budget();
        let repairer = IterativeRepairer::new(
            LineRepairer::new(ConflictDetector::new(model), policy, &self.config),
            &self.config,
        );

        let line_reports =
            self.repair_and_report(&scaffold, &realized, &anchors, request, &repairer);
        let poem = GeneratedPoem {
            run_id,
            form_id: scaffold.form.form_id.clone(),
            seed: request.seed,
            lines: line_reports.iter().map(|(text, _)| text.clone()).collect(),
            stanza_sizes: scaffold.stanzas.iter().map(|s| s.lines.len()).collect(),
            rhyme_anchors: anchors.into_map(),
            line_reports: line_reports.into_iter().map(|(_, report)| report).collect(),
        };
        info!(
            run_id = %poem.run_id,
            lines = poem.lines.len(),
            placeholders = poem.placeholder_count(),
            mean_utility = poem.mean_utility(),
            "generation finished"
        );
        Ok(poem)
    }

    /// Repair generated lines, then re-copy refrains and score every line.
    fn repair_and_report(
        &self,
        scaffold: &PoemScaffold,
        realized: &[RealizedLine],
        anchors: &RhymeAnchors,
        request: &GenerationRequest,
        repairer: &IterativeRepairer<'_>,
    ) -> Vec<(String, LineReport)> {
        let catalog = meter_catalog();
        let target_for = |line: &LineScaffold| {
            let mut target = TargetSpec::new().syllables(line.target_syllables);
            if catalog.contains_key(&line.meter_pattern) {
                target = target.meter(&line.meter_pattern);
            }
            if let Some(anchor) = line.base_rhyme_symbol().and_then(|s| anchors.get(s)) {
                target = target.rhyme_word(anchor);
            }
            if let Some(affect) = &request.affect_profile {
                target = target.affect(affect);
            }
            target
        };

        let mut texts: BTreeMap<usize, String> = BTreeMap::new();
        let mut outcomes: BTreeMap<usize, RepairOutcome> = BTreeMap::new();
        for (line, out) in scaffold.lines().zip(realized) {
            if out.is_placeholder || line.is_refrain_repetition() {
                texts.insert(line.line_number, out.text.clone());
                continue;
            }
            let outcome = repairer.repair_with_iterations(&out.text, &target_for(line));
            if outcome.repaired() {
                debug!(
                    line = line.line_number,
                    from = outcome.initial_utility,
                    to = outcome.utility,
                    "line repaired"
                );
            }
            texts.insert(line.line_number, outcome.line.clone());
            outcomes.insert(line.line_number, outcome);
        }

        // Repetitions follow their source's final text.
        for line in scaffold.lines() {
            if let Some(source) = line.refrain_source {
                if let Some(text) = texts.get(&source).cloned() {
                    texts.insert(line.line_number, text);
                }
            }
        }

        let model = repairer.model();
        scaffold
            .lines()
            .zip(realized)
            .map(|(line, out)| {
                let text = texts
                    .get(&line.line_number)
                    .cloned()
                    .unwrap_or_else(|| out.text.clone());
                let placeholder = out.is_placeholder;
                let (scores, utility) = if placeholder {
                    (BTreeMap::new(), 0.0)
                } else {
                    let evaluated = model.evaluate_line(&text, &target_for(line));
                    let constraints: Vec<_> = evaluated.values().cloned().collect();
                    let scores = evaluated
                        .iter()
                        .map(|(kind, c)| (kind.as_str().to_string(), c.score))
                        .collect();
                    (scores, model.compute_utility(&constraints))
                };
                let outcome = outcomes.get(&line.line_number);
                let report = LineReport {
                    line_number: line.line_number,
                    stanza_number: line.stanza_number,
                    rhyme_symbol: line.rhyme_symbol.clone(),
                    scores,
                    utility,
                    realization_score: out.score,
                    repaired: outcome.is_some_and(RepairOutcome::repaired),
                    strategies: outcome
                        .map(|o| o.strategies.iter().map(|s| s.to_string()).collect())
                        .unwrap_or_default(),
                    is_refrain: line.is_refrain,
                    is_placeholder: placeholder,
                };
                (text, report)
            })
            .collect()
    }
}
