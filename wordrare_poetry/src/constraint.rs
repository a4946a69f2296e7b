// Multi-tier constraint model.
//
// A candidate line is scored along named dimensions (`ConstraintKind`), each
// producing a `Constraint` with a score in [0, 1], a priority tier, and a
// weight. The tier of each kind is fixed:
//
//   structure                     -> Hard
//   rhyme, meter                  -> SoftHigh
//   semantics, affect, coherence  -> SoftMed
//   style, devices, rarity        -> SoftLow
//
// Weights come from `ConstraintWeights` (per request); kinds without a
// weight count for nothing in the utility.
//
// `evaluate_line` scores the four dimensions a single line can be judged on
// in isolation:
//   - meter: 1 - stress deviation, when the target names a meter
//   - rhyme: similarity of the last word to the rhyme anchor, when there is
//     one (0 if they do not rhyme)
//   - semantics: mean theme alignment of content words, 0.5 when there is no
//     theme centroid or no word has an embedding
//   - affect: share of affect-tagged words carrying the target affect, 0.5
//     when no word is tagged, 1.0 when no affect was requested
//
// Utility is the weight-normalized mean of the scores; a constraint list
// with zero total weight has utility 0.

use crate::config::GeneratorConfig;
use crate::meter::{MeterEngine, tokenize};
use crate::semantic::ThemeCentroid;
use crate::sound::SoundEngine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use wordrare_lexicon::WordStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstraintTier {
    Hard,
    SoftHigh,
    SoftMed,
    SoftLow,
}

impl ConstraintTier {
    /// Lower is examined first.
    pub fn priority(self) -> u8 {
        match self {
            ConstraintTier::Hard => 0,
            ConstraintTier::SoftHigh => 1,
            ConstraintTier::SoftMed => 2,
            ConstraintTier::SoftLow => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConstraintKind {
    Structure,
    Rhyme,
    Meter,
    Semantics,
    Affect,
    Coherence,
    Style,
    Devices,
    Rarity,
}

impl ConstraintKind {
    pub const ALL: [ConstraintKind; 9] = [
        ConstraintKind::Structure,
        ConstraintKind::Rhyme,
        ConstraintKind::Meter,
        ConstraintKind::Semantics,
        ConstraintKind::Affect,
        ConstraintKind::Coherence,
        ConstraintKind::Style,
        ConstraintKind::Devices,
        ConstraintKind::Rarity,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            ConstraintKind::Structure => "structure",
            ConstraintKind::Rhyme => "rhyme",
            ConstraintKind::Meter => "meter",
            ConstraintKind::Semantics => "semantics",
            ConstraintKind::Affect => "affect",
            ConstraintKind::Coherence => "coherence",
            ConstraintKind::Style => "style",
            ConstraintKind::Devices => "devices",
            ConstraintKind::Rarity => "rarity",
        }
    }

    pub fn tier(self) -> ConstraintTier {
        match self {
            ConstraintKind::Structure => ConstraintTier::Hard,
            ConstraintKind::Rhyme | ConstraintKind::Meter => ConstraintTier::SoftHigh,
            ConstraintKind::Semantics | ConstraintKind::Affect | ConstraintKind::Coherence => {
                ConstraintTier::SoftMed
            }
            ConstraintKind::Style | ConstraintKind::Devices | ConstraintKind::Rarity => {
                ConstraintTier::SoftLow
            }
        }
    }
}

impl fmt::Display for ConstraintKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConstraintKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ConstraintKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown constraint '{s}'"))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Constraint {
    pub kind: ConstraintKind,
    pub tier: ConstraintTier,
    pub weight: f64,
    pub score: f64,
    pub satisfied: bool,
}

impl Constraint {
    pub fn name(&self) -> &'static str {
        self.kind.as_str()
    }

    pub fn weighted_score(&self) -> f64 {
        self.score * self.weight
    }
}

/// Per-kind constraint weights.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConstraintWeights(BTreeMap<ConstraintKind, f64>);

impl Default for ConstraintWeights {
    fn default() -> Self {
        ConstraintWeights(default_weight_table().into_iter().collect())
    }
}

/// Default weights by name, summing to 1.
pub fn default_weight_table() -> [(ConstraintKind, f64); 6] {
    [
        (ConstraintKind::Rhyme, 0.25),
        (ConstraintKind::Meter, 0.25),
        (ConstraintKind::Semantics, 0.20),
        (ConstraintKind::Affect, 0.15),
        (ConstraintKind::Coherence, 0.10),
        (ConstraintKind::Style, 0.05),
    ]
}

impl ConstraintWeights {
    /// Weights from a name -> weight map. Unknown names are returned as
    /// errors, one per name.
    pub fn from_named(named: &BTreeMap<String, f64>) -> Result<Self, Vec<String>> {
        let mut weights = BTreeMap::new();
        let mut unknown = Vec::new();
        for (name, &w) in named {
            match name.parse::<ConstraintKind>() {
                Ok(kind) => {
                    weights.insert(kind, w);
                }
                Err(e) => unknown.push(e),
            }
        }
        if unknown.is_empty() {
            Ok(ConstraintWeights(weights))
        } else {
            Err(unknown)
        }
    }

    /// Weight of `kind`, zero when unset.
    pub fn get(&self, kind: ConstraintKind) -> f64 {
        self.0.get(&kind).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, kind: ConstraintKind, weight: f64) {
        self.0.insert(kind, weight);
    }

    pub fn sum(&self) -> f64 {
        self.0.values().sum()
    }
}

/// What a line is being judged against.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    /// Catalog meter id. `None` for syllabic lines.
    pub meter: Option<String>,
    pub target_syllables: Option<usize>,
    /// The rhyme group's anchor word.
    pub rhyme_word: Option<String>,
    pub affect_profile: Option<String>,
}

impl TargetSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn meter(mut self, meter: &str) -> Self {
        self.meter = Some(meter.to_string());
        self
    }

    pub fn syllables(mut self, n: usize) -> Self {
        self.target_syllables = Some(n);
        self
    }

    pub fn rhyme_word(mut self, word: &str) -> Self {
        self.rhyme_word = Some(word.to_string());
        self
    }

    pub fn affect(mut self, affect: &str) -> Self {
        self.affect_profile = Some(affect.to_string());
        self
    }
}

const NEUTRAL_SCORE: f64 = 0.5;

pub struct ConstraintModel<'a> {
    store: &'a dyn WordStore,
    meter: MeterEngine<'a>,
    sound: SoundEngine<'a>,
    weights: ConstraintWeights,
    centroid: Option<ThemeCentroid>,
    threshold: f64,
}

impl<'a> ConstraintModel<'a> {
    pub fn new(
        store: &'a dyn WordStore,
        config: &GeneratorConfig,
        weights: ConstraintWeights,
    ) -> Self {
        ConstraintModel {
            store,
            meter: MeterEngine::new(store, config),
            sound: SoundEngine::new(store, config),
            weights,
            centroid: None,
            threshold: config.satisfaction_threshold,
        }
    }

    /// Score semantics against `centroid` from now on.
    pub fn with_centroid(mut self, centroid: Option<ThemeCentroid>) -> Self {
        self.centroid = centroid;
        self
    }

    pub fn store(&self) -> &'a dyn WordStore {
        self.store
    }

    pub fn meter_engine(&self) -> &MeterEngine<'a> {
        &self.meter
    }

    pub fn sound_engine(&self) -> &SoundEngine<'a> {
        &self.sound
    }

    pub fn centroid(&self) -> Option<&ThemeCentroid> {
        self.centroid.as_ref()
    }

    pub fn weights(&self) -> &ConstraintWeights {
        &self.weights
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// A constraint with its kind's tier and configured weight.
    pub fn create_constraint(&self, kind: ConstraintKind, score: f64) -> Constraint {
        let score = score.clamp(0.0, 1.0);
        Constraint {
            kind,
            tier: kind.tier(),
            weight: self.weights.get(kind),
            score,
            satisfied: score >= self.threshold,
        }
    }

    pub fn evaluate_line(
        &self,
        line: &str,
        target: &TargetSpec,
    ) -> BTreeMap<ConstraintKind, Constraint> {
        let mut constraints = BTreeMap::new();
        let mut add = |kind, score| {
            constraints.insert(kind, self.create_constraint(kind, score));
        };

        if let Some(meter) = &target.meter {
            let analysis = self.meter.analyze_line(line, meter);
            add(ConstraintKind::Meter, 1.0 - analysis.stress_deviation);
        }

        if let Some(anchor) = target.rhyme_word.as_deref().filter(|w| !w.is_empty()) {
            let score = tokenize(line)
                .last()
                .and_then(|last| self.sound.check_rhyme(anchor, last))
                .map_or(0.0, |m| m.similarity);
            add(ConstraintKind::Rhyme, score);
        }

        add(ConstraintKind::Semantics, self.semantic_score(line));
        add(ConstraintKind::Affect, self.affect_score(line, target.affect_profile.as_deref()));

        constraints
    }

    fn semantic_score(&self, line: &str) -> f64 {
        self.centroid
            .as_ref()
            .and_then(|c| c.line_alignment(self.store, line))
            .unwrap_or(NEUTRAL_SCORE)
    }

    fn affect_score(&self, line: &str, affect: Option<&str>) -> f64 {
        let Some(affect) = affect else {
            return 1.0;
        };
        let tagged: Vec<bool> = tokenize(line)
            .iter()
            .filter_map(|w| self.store.lookup(w))
            .filter(|r| !r.affect_tags.is_empty())
            .map(|r| r.has_affect(affect))
            .collect();
        if tagged.is_empty() {
            return NEUTRAL_SCORE;
        }
        tagged.iter().filter(|&&hit| hit).count() as f64 / tagged.len() as f64
    }

    /// Weight-normalized mean score; 0 when the total weight is 0.
    pub fn compute_utility(&self, constraints: &[Constraint]) -> f64 {
        compute_utility(constraints)
    }

    /// Utility of a line, evaluated from scratch.
    pub fn line_utility(&self, line: &str, target: &TargetSpec) -> f64 {
        let constraints: Vec<Constraint> = self.evaluate_line(line, target).into_values().collect();
        compute_utility(&constraints)
    }

    pub fn check_hard_constraints(&self, constraints: &[Constraint]) -> bool {
        constraints
            .iter()
            .filter(|c| c.tier == ConstraintTier::Hard)
            .all(|c| c.satisfied)
    }

    /// Constraints scoring below `min_score`, most urgent first: by tier
    /// priority, then by descending weight.
    pub fn get_violated_constraints(
        &self,
        constraints: &[Constraint],
        min_score: f64,
    ) -> Vec<Constraint> {
        get_violated_constraints(constraints, min_score)
    }
}

pub fn compute_utility(constraints: &[Constraint]) -> f64 {
    let total_weight: f64 = constraints.iter().map(|c| c.weight).sum();
    if total_weight == 0.0 {
        return 0.0;
    }
    constraints.iter().map(Constraint::weighted_score).sum::<f64>() / total_weight
}

pub fn get_violated_constraints(constraints: &[Constraint], min_score: f64) -> Vec<Constraint> {
    let mut violated: Vec<Constraint> = constraints
        .iter()
        .filter(|c| c.score < min_score)
        .cloned()
        .collect();
    violated.sort_by(|a, b| {
        a.tier
            .priority()
            .cmp(&b.tier.priority())
            .then(b.weight.total_cmp(&a.weight))
    });
    violated
}
