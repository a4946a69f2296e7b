// Conflict detection and line repair.
//
// Repair is a small state machine over `ConflictType`. The detector scores a
// line with the constraint model and reduces the most urgent violation
// (lowest tier, then highest weight) to a conflict type. The line repairer
// then walks a fixed strategy list for that conflict, in order:
//
//   Rhyme      local substitution, slant tolerance*, rhyme-class pivot*
//   Meter      meter micro-edits, local substitution, structural relaxation*
//   Semantic   semantic correction, local substitution
//   Coherence  coherence smoothing, local substitution
//
// (* gated by the steering policy.) A strategy succeeds when it changes the
// line and the re-detected conflict is gone or of a different type.
//
// Strategy notes:
//   - Local substitution swaps one non-final word for a store word with the
//     same syllable count and guessed part of speech, accepting the first
//     swap that leaves no conflict at all. The final word carries the rhyme
//     and is never touched.
//   - Slant tolerance accepts the line as it is, which is never a change, so
//     it never succeeds on its own.
//   - Rhyme-class pivot, coherence smoothing, and structural relaxation have
//     no defined edit and always report "no repair available".
//
// The iterative repairer runs bounded greedy rounds on top of this, keeping
// the best line seen and stopping at the first round that fails or lowers
// utility. Lines already at `acceptable_utility` are returned untouched.
//
// Part-of-speech guessing sits behind `PosGuesser` so a real tagger can
// replace the suffix heuristic without touching repair logic.

use crate::config::GeneratorConfig;
use crate::constraint::{Constraint, ConstraintKind, ConstraintModel, TargetSpec};
use crate::meter::TOKEN_PUNCTUATION;
use crate::policy::SteeringPolicy;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;
use wordrare_lexicon::{PartOfSpeech, WordFilter, WordStore};

const DETERMINERS: [&str; 3] = ["the", "a", "an"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictType {
    Rhyme,
    Meter,
    Semantic,
    Coherence,
}

impl ConflictType {
    /// Conflict for a violated constraint. Kinds without a repair family
    /// of their own are treated as meter problems.
    pub fn from_kind(kind: ConstraintKind) -> Self {
        match kind {
            ConstraintKind::Rhyme => ConflictType::Rhyme,
            ConstraintKind::Meter => ConflictType::Meter,
            ConstraintKind::Semantics => ConflictType::Semantic,
            ConstraintKind::Coherence => ConflictType::Coherence,
            _ => ConflictType::Meter,
        }
    }
}

impl fmt::Display for ConflictType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ConflictType::Rhyme => "rhyme",
            ConflictType::Meter => "meter",
            ConflictType::Semantic => "semantic",
            ConflictType::Coherence => "coherence",
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RepairStrategy {
    LocalSubstitution,
    SlantRhymeTolerance,
    RhymeClassPivot,
    MeterMicroEdits,
    SemanticCorrection,
    CoherenceSmoothing,
    StructuralRelaxation,
}

impl RepairStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairStrategy::LocalSubstitution => "local_substitution",
            RepairStrategy::SlantRhymeTolerance => "slant_rhyme_tolerance",
            RepairStrategy::RhymeClassPivot => "rhyme_class_pivot",
            RepairStrategy::MeterMicroEdits => "meter_micro_edits",
            RepairStrategy::SemanticCorrection => "semantic_correction",
            RepairStrategy::CoherenceSmoothing => "coherence_smoothing",
            RepairStrategy::StructuralRelaxation => "structural_relaxation",
        }
    }
}

impl fmt::Display for RepairStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ordered strategies for a conflict under a policy.
pub fn strategies_for(conflict: ConflictType, policy: &SteeringPolicy) -> Vec<RepairStrategy> {
    use RepairStrategy::*;
    match conflict {
        ConflictType::Rhyme => {
            let mut strategies = vec![LocalSubstitution];
            if policy.allow_slant {
                strategies.push(SlantRhymeTolerance);
            }
            if policy.allow_pivot {
                strategies.push(RhymeClassPivot);
            }
            strategies
        }
        ConflictType::Meter => {
            let mut strategies = vec![MeterMicroEdits, LocalSubstitution];
            if policy.allow_breaks {
                strategies.push(StructuralRelaxation);
            }
            strategies
        }
        ConflictType::Semantic => vec![SemanticCorrection, LocalSubstitution],
        ConflictType::Coherence => vec![CoherenceSmoothing, LocalSubstitution],
    }
}

// ---------------------------------------------------------------------------
// Part-of-speech guessing
// ---------------------------------------------------------------------------

pub trait PosGuesser {
    fn guess(&self, word: &str) -> PartOfSpeech;
}

/// `-ly` adverbs, `-ing`/`-ed` verbs, nouns otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct SuffixPosGuesser;

impl PosGuesser for SuffixPosGuesser {
    fn guess(&self, word: &str) -> PartOfSpeech {
        if word.ends_with("ly") {
            PartOfSpeech::Adverb
        } else if word.ends_with("ing") || word.ends_with("ed") {
            PartOfSpeech::Verb
        } else {
            PartOfSpeech::Noun
        }
    }
}

// ---------------------------------------------------------------------------
// Detection
// ---------------------------------------------------------------------------

pub struct ConflictDetector<'a> {
    model: ConstraintModel<'a>,
}

impl<'a> ConflictDetector<'a> {
    pub fn new(model: ConstraintModel<'a>) -> Self {
        ConflictDetector { model }
    }

    pub fn model(&self) -> &ConstraintModel<'a> {
        &self.model
    }

    /// The most urgent violated constraint of `line`, if any.
    pub fn primary_violation(&self, line: &str, target: &TargetSpec) -> Option<Constraint> {
        let constraints: Vec<Constraint> =
            self.model.evaluate_line(line, target).into_values().collect();
        self.model
            .get_violated_constraints(&constraints, self.model.threshold())
            .into_iter()
            .next()
    }

    pub fn detect_conflict(&self, line: &str, target: &TargetSpec) -> Option<ConflictType> {
        self.primary_violation(line, target)
            .map(|c| ConflictType::from_kind(c.kind))
    }
}

// ---------------------------------------------------------------------------
// Single repair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub struct RepairedLine {
    pub line: String,
    pub strategy: RepairStrategy,
}

pub struct LineRepairer<'a> {
    detector: ConflictDetector<'a>,
    policy: SteeringPolicy,
    guesser: Box<dyn PosGuesser + 'a>,
    substitution_candidates: usize,
    candidate_limit: usize,
    semantic_fix_threshold: f64,
    semantic_min_improvement: f64,
}

impl<'a> LineRepairer<'a> {
    pub fn new(
        detector: ConflictDetector<'a>,
        policy: SteeringPolicy,
        config: &GeneratorConfig,
    ) -> Self {
        LineRepairer {
            detector,
            policy,
            guesser: Box::new(SuffixPosGuesser),
            substitution_candidates: config.substitution_candidates,
            candidate_limit: config.candidate_limit,
            semantic_fix_threshold: config.semantic_fix_threshold,
            semantic_min_improvement: config.semantic_min_improvement,
        }
    }

    pub fn with_guesser(mut self, guesser: Box<dyn PosGuesser + 'a>) -> Self {
        self.guesser = guesser;
        self
    }

    pub fn detector(&self) -> &ConflictDetector<'a> {
        &self.detector
    }

    pub fn policy(&self) -> &SteeringPolicy {
        &self.policy
    }

    fn store(&self) -> &'a dyn WordStore {
        self.detector.model().store()
    }

    pub fn select_strategies(&self, conflict: ConflictType) -> Vec<RepairStrategy> {
        strategies_for(conflict, &self.policy)
    }

    /// Try each strategy for `conflict` in order; the first that changes the
    /// line and clears or changes the conflict wins.
    pub fn repair_line(
        &self,
        line: &str,
        target: &TargetSpec,
        conflict: ConflictType,
    ) -> Option<RepairedLine> {
        for strategy in self.select_strategies(conflict) {
            let Some(repaired) = self.apply_strategy(line, target, strategy) else {
                continue;
            };
            if repaired == line {
                continue;
            }
            let after = self.detector.detect_conflict(&repaired, target);
            if after != Some(conflict) {
                debug!(%strategy, %conflict, line = %repaired, "repair accepted");
                return Some(RepairedLine {
                    line: repaired,
                    strategy,
                });
            }
        }
        None
    }

    pub fn apply_strategy(
        &self,
        line: &str,
        target: &TargetSpec,
        strategy: RepairStrategy,
    ) -> Option<String> {
        match strategy {
            RepairStrategy::LocalSubstitution => self.local_substitution(line, target),
            RepairStrategy::SlantRhymeTolerance => Some(line.to_string()),
            RepairStrategy::MeterMicroEdits => self.meter_micro_edits(line, target),
            RepairStrategy::SemanticCorrection => self.semantic_correction(line),
            RepairStrategy::RhymeClassPivot
            | RepairStrategy::CoherenceSmoothing
            | RepairStrategy::StructuralRelaxation => None,
        }
    }

    /// Swap one non-final word for a same-length word of the guessed part
    /// of speech, accepting the first swap that leaves no conflict.
    pub fn local_substitution(&self, line: &str, target: &TargetSpec) -> Option<String> {
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() < 2 {
            return None;
        }
        let meter = self.detector.model().meter_engine();
        for i in 0..words.len() - 1 {
            let bare = bare_word(words[i]);
            if bare.is_empty() {
                continue;
            }
            let filter = WordFilter::new()
                .pos(self.guesser.guess(&bare))
                .syllables(meter.word_syllables(&bare) as u32)
                .exclude(&bare);
            for candidate in self.store().query(&filter, self.substitution_candidates) {
                let mut trial = words.iter().map(|w| w.to_string()).collect::<Vec<_>>();
                trial[i] = replace_token(words[i], &candidate.lemma);
                let trial = trial.join(" ");
                if self.detector.detect_conflict(&trial, target).is_none() {
                    return Some(trial);
                }
            }
        }
        None
    }

    /// Drop determiners from a long line, or lead a short one with "The".
    pub fn meter_micro_edits(&self, line: &str, target: &TargetSpec) -> Option<String> {
        let meter = self.detector.model().meter_engine();
        let expected = target
            .meter
            .as_deref()
            .and_then(|m| meter.pattern(m))
            .map(|p| p.expected_syllables())
            .or(target.target_syllables)?;
        let (count, _) = meter.measure(line);
        let words: Vec<&str> = line.split_whitespace().collect();

        if count > expected {
            let kept: Vec<&str> = words
                .iter()
                .copied()
                .filter(|w| !DETERMINERS.contains(&bare_word(w).as_str()))
                .collect();
            if kept.len() == words.len() || kept.is_empty() {
                return None;
            }
            let mut edited = kept.join(" ");
            if line.starts_with(|c: char| c.is_uppercase()) {
                edited = capitalize(&edited);
            }
            return Some(edited);
        }

        if count < expected {
            let first = *words.first()?;
            if !first.starts_with(|c: char| c.is_uppercase()) {
                return None;
            }
            let bare = bare_word(first);
            let noun_like = self.store().lookup(&bare).is_none_or(|r| {
                r.has_pos(PartOfSpeech::Noun) || r.has_pos(PartOfSpeech::Adjective)
            });
            if !noun_like {
                return None;
            }
            let rest = words[1..].join(" ");
            let lowered = lowercase_first(first);
            return Some(if rest.is_empty() {
                format!("The {lowered}")
            } else {
                format!("The {lowered} {rest}")
            });
        }

        None
    }

    /// Replace the interior word least aligned with the theme by the
    /// same-shaped store word most aligned with it.
    pub fn semantic_correction(&self, line: &str) -> Option<String> {
        let model = self.detector.model();
        let centroid = model.centroid()?;
        let store = self.store();
        let words: Vec<&str> = line.split_whitespace().collect();
        if words.len() < 3 {
            return None;
        }

        let (index, worst) = (1..words.len() - 1)
            .filter_map(|i| {
                centroid
                    .raw_alignment(store, &bare_word(words[i]))
                    .map(|a| (i, a))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1))?;
        if worst >= self.semantic_fix_threshold {
            return None;
        }

        let bare = bare_word(words[index]);
        let record = store.lookup(&bare)?;
        let filter = WordFilter::new()
            .pos(record.pos)
            .syllables(record.syllables)
            .exclude(&bare);
        let mut best: Option<(&str, f64)> = None;
        for candidate in store.query(&filter, self.candidate_limit) {
            let Some(score) = centroid.raw_alignment(store, &candidate.lemma) else {
                continue;
            };
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((&candidate.lemma, score));
            }
        }
        let (lemma, score) = best?;
        if score - worst <= self.semantic_min_improvement {
            return None;
        }
        let mut edited: Vec<String> = words.iter().map(|w| w.to_string()).collect();
        edited[index] = replace_token(words[index], lemma);
        Some(edited.join(" "))
    }
}

// ---------------------------------------------------------------------------
// Iterative repair
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
    pub line: String,
    pub initial_utility: f64,
    pub utility: f64,
    /// Best utility after each round, starting with the initial utility.
    pub trace: Vec<f64>,
    pub strategies: Vec<RepairStrategy>,
}

impl RepairOutcome {
    pub fn repaired(&self) -> bool {
        !self.strategies.is_empty()
    }
}

pub struct IterativeRepairer<'a> {
    repairer: LineRepairer<'a>,
    acceptable_utility: f64,
}

impl<'a> IterativeRepairer<'a> {
    pub fn new(repairer: LineRepairer<'a>, config: &GeneratorConfig) -> Self {
        IterativeRepairer {
            repairer,
            acceptable_utility: config.acceptable_utility,
        }
    }

    pub fn repairer(&self) -> &LineRepairer<'a> {
        &self.repairer
    }

    pub fn model(&self) -> &ConstraintModel<'a> {
        self.repairer.detector().model()
    }

    /// Greedy bounded repair. Never returns a line with lower utility than
    /// the input.
    pub fn repair_with_iterations(&self, line: &str, target: &TargetSpec) -> RepairOutcome {
        let initial = self.model().line_utility(line, target);
        let mut outcome = RepairOutcome {
            line: line.to_string(),
            initial_utility: initial,
            utility: initial,
            trace: vec![initial],
            strategies: Vec::new(),
        };
        if initial >= self.acceptable_utility {
            return outcome;
        }

        let detector = self.repairer.detector();
        for round in 0..self.repairer.policy().max_repairs {
            let Some(conflict) = detector.detect_conflict(&outcome.line, target) else {
                break;
            };
            let Some(repaired) = self.repairer.repair_line(&outcome.line, target, conflict) else {
                break;
            };
            let utility = self.model().line_utility(&repaired.line, target);
            if utility < outcome.utility {
                break;
            }
            debug!(round, utility, strategy = %repaired.strategy, "repair round improved line");
            outcome.line = repaired.line;
            outcome.utility = utility;
            outcome.trace.push(utility);
            outcome.strategies.push(repaired.strategy);
        }
        outcome
    }
}

// ---------------------------------------------------------------------------
// Token helpers
// ---------------------------------------------------------------------------

fn bare_word(token: &str) -> String {
    token.trim_matches(TOKEN_PUNCTUATION).to_lowercase()
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn lowercase_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(c) => c.to_lowercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// `lemma` in place of `token`, keeping the token's leading capital and
/// trailing punctuation.
fn replace_token(token: &str, lemma: &str) -> String {
    let core = token.trim_end_matches(TOKEN_PUNCTUATION);
    let suffix = &token[core.len()..];
    let word = if token.starts_with(|c: char| c.is_uppercase()) {
        capitalize(lemma)
    } else {
        lemma.to_string()
    };
    format!("{word}{suffix}")
}
