// Data-driven generator configuration.
//
// Every tunable threshold of the pipeline lives in `GeneratorConfig`:
// meter tolerance, rhyme classification cut-offs, the constraint
// satisfaction threshold, realization retry budget, repair candidate
// limits. Algorithms read these values instead of hard-coding them, so a
// run can be re-tuned from a JSON file without recompiling.
//
// Missing fields fall back to the defaults below, so a config file only
// needs to name what it overrides.
//
// See also: `request.rs` for the per-run `GenerationRequest`, which carries
// the user-facing knobs (form, theme, rarity band, temperature, weights).

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneratorConfig {
    // -- Meter --
    /// Maximum normalized stress deviation for a metrically valid line.
    pub stress_tolerance: f64,
    /// Maximum syllable-count deviation for a metrically valid line.
    pub max_syllable_deviation: usize,
    /// Target syllables for a line whose meter is not in the catalog and
    /// whose form gives no per-line override.
    pub default_target_syllables: usize,

    // -- Rhyme --
    pub perfect_rhyme_threshold: f64,
    pub slant_rhyme_threshold: f64,
    /// How many store records `find_rhymes_for_word` examines at most.
    pub rhyme_scan_limit: usize,

    // -- Constraints --
    /// A constraint scoring below this is violated.
    pub satisfaction_threshold: f64,
    /// A line at or above this utility is left alone by the repairer.
    pub acceptable_utility: f64,

    // -- Realization --
    pub realize_retries: usize,
    /// Stop retrying once a candidate line scores above this.
    pub realize_early_stop: f64,
    /// Syllable deviation at which the closeness score reaches zero.
    pub syllable_score_window: f64,
    pub syllable_score_weight: f64,
    /// Maximum records fetched per slot query.
    pub candidate_limit: usize,

    // -- Templates --
    pub template_syllable_tolerance: usize,
    /// Rough syllables per template slot, for template length estimates.
    pub syllables_per_slot: usize,

    // -- Repair --
    /// Candidates tried per word by local substitution.
    pub substitution_candidates: usize,
    /// Semantic correction leaves a line alone when its least aligned
    /// word is at least this close to the theme.
    pub semantic_fix_threshold: f64,
    /// Minimum alignment gain for a semantic substitution.
    pub semantic_min_improvement: f64,

    // -- Palette --
    /// Lemmas per motif pool when a palette is built from the theme.
    pub palette_pool_size: usize,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        GeneratorConfig {
            stress_tolerance: 0.2,
            max_syllable_deviation: 1,
            default_target_syllables: 10,
            perfect_rhyme_threshold: 0.95,
            slant_rhyme_threshold: 0.7,
            rhyme_scan_limit: 1000,
            satisfaction_threshold: 0.7,
            acceptable_utility: 0.8,
            realize_retries: 5,
            realize_early_stop: 0.8,
            syllable_score_window: 3.0,
            syllable_score_weight: 0.1,
            candidate_limit: 100,
            template_syllable_tolerance: 3,
            syllables_per_slot: 2,
            substitution_candidates: 10,
            semantic_fix_threshold: 0.4,
            semantic_min_improvement: 0.1,
            palette_pool_size: 12,
        }
    }
}

impl GeneratorConfig {
    /// Parse a config from JSON. Absent fields take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Read and parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_serializes() {
        let config = GeneratorConfig::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let restored = GeneratorConfig::from_json(&json).unwrap();
        assert_eq!(config, restored);
    }

    #[test]
    fn partial_json_uses_defaults() {
        let config = GeneratorConfig::from_json(r#"{"stress_tolerance": 0.35}"#).unwrap();
        assert_eq!(config.stress_tolerance, 0.35);
        assert_eq!(config.realize_retries, 5);
        assert_eq!(config.perfect_rhyme_threshold, 0.95);
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(GeneratorConfig::from_json("{").is_err());
        assert!(GeneratorConfig::from_json(r#"{"realize_retries": -1}"#).is_err());
    }
}
