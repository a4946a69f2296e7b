// Meter engine: stress-pattern measurement and validation.
//
// A line's stress string is the concatenation of each token's stress
// digits. Tokens found in the word store contribute their recorded stress
// pattern; unknown tokens fall back to a vowel-group syllable estimate with
// every syllable assumed unstressed. The measured string is compared with a
// named `MeterPattern` from a fixed catalog:
//
// - `foot_accuracy`: fraction of expected feet (consecutive windows of the
//   foot's length) that exactly equal the foot pattern
// - `stress_deviation`: Hamming distance between actual and expected
//   strings, both right-padded with '0' to the longer length, divided by
//   that length
// - `syllable_deviation`: absolute difference from the expected count
//
// A line is metrically valid when both deviations are within the tolerances
// from `GeneratorConfig`.
//
// The engine only measures. Mutating a line to fix its meter is the
// repairer's job (`repair.rs`); `suggest_repairs` just describes what is
// wrong.

use crate::config::GeneratorConfig;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::warn;
use wordrare_lexicon::WordStore;

/// Punctuation trimmed from token edges before lookup.
pub const TOKEN_PUNCTUATION: &[char] = &['.', ',', '!', '?', ';', ':', '\'', '"'];

// ---------------------------------------------------------------------------
// Meter patterns
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeterPattern {
    /// Catalog key, e.g. `iambic_pentameter`.
    pub id: String,
    /// Display name.
    pub name: String,
    /// One foot as a binary stress string, e.g. `"01"`.
    pub foot_pattern: String,
    pub feet_per_line: usize,
}

impl MeterPattern {
    pub fn new(id: &str, name: &str, foot_pattern: &str, feet_per_line: usize) -> Self {
        MeterPattern {
            id: id.to_string(),
            name: name.to_string(),
            foot_pattern: foot_pattern.to_string(),
            feet_per_line,
        }
    }

    pub fn syllables_per_foot(&self) -> usize {
        self.foot_pattern.len()
    }

    pub fn expected_syllables(&self) -> usize {
        self.syllables_per_foot() * self.feet_per_line
    }

    /// The foot pattern repeated across the whole line.
    pub fn expected_stress(&self) -> String {
        self.foot_pattern.repeat(self.feet_per_line)
    }
}

/// The built-in meter catalog, keyed by id.
pub fn meter_catalog() -> BTreeMap<String, MeterPattern> {
    [
        MeterPattern::new("iambic_pentameter", "Iambic Pentameter", "01", 5),
        MeterPattern::new("iambic_tetrameter", "Iambic Tetrameter", "01", 4),
        MeterPattern::new("trochaic_tetrameter", "Trochaic Tetrameter", "10", 4),
        MeterPattern::new("anapestic_tetrameter", "Anapestic Tetrameter", "001", 4),
        MeterPattern::new("anapestic_trimeter", "Anapestic Trimeter", "001", 3),
        MeterPattern::new("dactylic_hexameter", "Dactylic Hexameter", "100", 6),
    ]
    .into_iter()
    .map(|p| (p.id.clone(), p))
    .collect()
}

// ---------------------------------------------------------------------------
// Analysis results
// ---------------------------------------------------------------------------

/// Result of measuring one line against one meter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineAnalysis {
    pub text: String,
    pub syllable_count: usize,
    pub stress_pattern: String,
    /// The target meter's id when the line is valid for it.
    pub meter_match: Option<String>,
    pub foot_accuracy: f64,
    pub syllable_deviation: usize,
    pub stress_deviation: f64,
    pub is_valid: bool,
    /// Expected syllables of the target meter (0 for an unknown meter).
    pub expected_syllables: usize,
}

impl LineAnalysis {
    /// Whether the line has more syllables than the meter wants.
    pub fn is_long(&self) -> bool {
        self.expected_syllables > 0 && self.syllable_count > self.expected_syllables
    }

    pub fn is_short(&self) -> bool {
        self.syllable_count < self.expected_syllables
    }
}

/// Per-line analyses of a stanza plus aggregate figures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanzaAnalysis {
    pub lines: Vec<LineAnalysis>,
    pub valid_lines: usize,
    pub mean_foot_accuracy: f64,
    pub mean_stress_deviation: f64,
}

impl StanzaAnalysis {
    pub fn is_valid(&self) -> bool {
        self.valid_lines == self.lines.len()
    }
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Split a line into lowercase lookup tokens, trimming edge punctuation.
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|w| w.trim_matches(TOKEN_PUNCTUATION).to_lowercase())
        .filter(|w| !w.is_empty())
        .collect()
}

/// Vowel-group syllable estimate for words the store does not know.
///
/// Counts runs of `aeiouy`, subtracts one for a trailing `e`, and never
/// returns less than one.
pub fn estimate_syllables(word: &str) -> usize {
    let word = word.to_lowercase();
    let mut count: usize = 0;
    let mut previous_was_vowel = false;
    for c in word.chars() {
        let is_vowel = "aeiouy".contains(c);
        if is_vowel && !previous_was_vowel {
            count += 1;
        }
        previous_was_vowel = is_vowel;
    }
    if word.ends_with('e') {
        count = count.saturating_sub(1);
    }
    count.max(1)
}

pub struct MeterEngine<'a> {
    store: &'a dyn WordStore,
    patterns: BTreeMap<String, MeterPattern>,
    stress_tolerance: f64,
    max_syllable_deviation: usize,
}

impl<'a> MeterEngine<'a> {
    pub fn new(store: &'a dyn WordStore, config: &GeneratorConfig) -> Self {
        MeterEngine {
            store,
            patterns: meter_catalog(),
            stress_tolerance: config.stress_tolerance,
            max_syllable_deviation: config.max_syllable_deviation,
        }
    }

    pub fn pattern(&self, meter_id: &str) -> Option<&MeterPattern> {
        self.patterns.get(meter_id)
    }

    pub fn patterns(&self) -> impl Iterator<Item = &MeterPattern> {
        self.patterns.values()
    }

    /// Stress digits for one token. Store data wins; otherwise every
    /// estimated syllable is unstressed.
    pub fn word_stress(&self, word: &str) -> String {
        match self.store.lookup(word) {
            Some(record) => match record.stress.as_deref() {
                Some(stress) if !stress.is_empty() => stress.to_string(),
                _ => "0".repeat(record.syllables.max(1) as usize),
            },
            None => "0".repeat(estimate_syllables(word)),
        }
    }

    pub fn word_syllables(&self, word: &str) -> usize {
        self.word_stress(&word.to_lowercase()).len()
    }

    /// Syllable count and stress string of a line, independent of any meter.
    pub fn measure(&self, text: &str) -> (usize, String) {
        let stress: String = tokenize(text)
            .iter()
            .map(|t| self.word_stress(t))
            .collect();
        (stress.len(), stress)
    }

    /// Measure `text` against the meter named `meter_id`.
    pub fn analyze_line(&self, text: &str, meter_id: &str) -> LineAnalysis {
        let (syllable_count, stress_pattern) = self.measure(text);

        if syllable_count == 0 {
            return LineAnalysis {
                text: text.to_string(),
                syllable_count,
                stress_pattern,
                meter_match: None,
                foot_accuracy: 0.0,
                syllable_deviation: 0,
                stress_deviation: 1.0,
                is_valid: false,
                expected_syllables: self.pattern(meter_id).map_or(0, |p| p.expected_syllables()),
            };
        }

        let Some(pattern) = self.pattern(meter_id) else {
            warn!(meter = meter_id, "unknown meter pattern");
            return LineAnalysis {
                text: text.to_string(),
                syllable_count,
                stress_pattern,
                meter_match: None,
                foot_accuracy: 0.0,
                syllable_deviation: 0,
                stress_deviation: 0.0,
                is_valid: false,
                expected_syllables: 0,
            };
        };

        let expected_syllables = pattern.expected_syllables();
        let syllable_deviation = syllable_count.abs_diff(expected_syllables);
        let foot_accuracy = foot_accuracy(
            &stress_pattern,
            &pattern.foot_pattern,
            pattern.feet_per_line,
        );
        let stress_deviation = stress_deviation(&stress_pattern, &pattern.expected_stress());
        let is_valid = syllable_deviation <= self.max_syllable_deviation
            && stress_deviation <= self.stress_tolerance;

        LineAnalysis {
            text: text.to_string(),
            syllable_count,
            stress_pattern,
            meter_match: is_valid.then(|| pattern.id.clone()),
            foot_accuracy,
            syllable_deviation,
            stress_deviation,
            is_valid,
            expected_syllables,
        }
    }

    /// Human-readable hints for an invalid line. Empty for a valid one.
    pub fn suggest_repairs(&self, text: &str, meter_id: &str) -> Vec<String> {
        let analysis = self.analyze_line(text, meter_id);
        if analysis.is_valid {
            return Vec::new();
        }
        let mut hints = Vec::new();
        if analysis.is_long() {
            hints.push(format!(
                "Remove {} syllable(s) to match meter",
                analysis.syllable_deviation
            ));
        } else if analysis.is_short() {
            hints.push(format!(
                "Add {} syllable(s) to match meter",
                analysis.syllable_deviation
            ));
        }
        if analysis.foot_accuracy < 0.6 {
            hints.push("Rearrange words to improve stress pattern".to_string());
        }
        if hints.is_empty() {
            hints.push("Adjust word choice to better match meter".to_string());
        }
        hints
    }

    /// Analyze every line of a stanza against one meter.
    pub fn validate_stanza(&self, lines: &[&str], meter_id: &str) -> StanzaAnalysis {
        let analyses: Vec<LineAnalysis> = lines
            .iter()
            .map(|l| self.analyze_line(l, meter_id))
            .collect();
        let n = analyses.len().max(1) as f64;
        StanzaAnalysis {
            valid_lines: analyses.iter().filter(|a| a.is_valid).count(),
            mean_foot_accuracy: analyses.iter().map(|a| a.foot_accuracy).sum::<f64>() / n,
            mean_stress_deviation: analyses.iter().map(|a| a.stress_deviation).sum::<f64>() / n,
            lines: analyses,
        }
    }
}

fn foot_accuracy(stress: &str, foot: &str, feet: usize) -> f64 {
    if feet == 0 {
        return 0.0;
    }
    let len = foot.len();
    let matching = (0..feet)
        .filter(|i| stress.get(i * len..(i + 1) * len) == Some(foot))
        .count();
    matching as f64 / feet as f64
}

fn stress_deviation(actual: &str, expected: &str) -> f64 {
    if actual.is_empty() || expected.is_empty() {
        return 1.0;
    }
    let len = actual.len().max(expected.len());
    let padded = |s: &str| -> Vec<u8> {
        let mut v = s.as_bytes().to_vec();
        v.resize(len, b'0');
        v
    };
    let (a, e) = (padded(actual), padded(expected));
    let mismatches = a.iter().zip(&e).filter(|(x, y)| x != y).count();
    mismatches as f64 / len as f64
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordrare_lexicon::{Lexicon, default_lexicon};

    fn engine(store: &dyn WordStore) -> MeterEngine<'_> {
        MeterEngine::new(store, &GeneratorConfig::default())
    }

    #[test]
    fn test_catalog_expectations() {
        let catalog = meter_catalog();
        let ip = &catalog["iambic_pentameter"];
        assert_eq!(ip.expected_syllables(), 10);
        assert_eq!(ip.expected_stress(), "0101010101");
        assert_eq!(catalog["dactylic_hexameter"].expected_syllables(), 18);
        assert_eq!(catalog["anapestic_trimeter"].expected_stress(), "001001001");
    }

    #[test]
    fn test_estimate_syllables() {
        assert_eq!(estimate_syllables("summer"), 2);
        assert_eq!(estimate_syllables("stone"), 1);
        assert_eq!(estimate_syllables("the"), 1);
        assert_eq!(estimate_syllables("rhythm"), 1);
        assert_eq!(estimate_syllables("beautiful"), 3);
        assert_eq!(estimate_syllables("xyz"), 1);
    }

    #[test]
    fn test_tokenize_strips_edge_punctuation() {
        assert_eq!(
            tokenize("\"Shall I compare thee to a summer's day?\""),
            vec!["shall", "i", "compare", "thee", "to", "a", "summer's", "day"]
        );
        assert!(tokenize("  ... ").is_empty());
    }

    #[test]
    fn test_shall_i_compare() {
        let lexicon = default_lexicon();
        let engine = engine(&lexicon);
        let a = engine.analyze_line(
            "Shall I compare thee to a summer's day",
            "iambic_pentameter",
        );
        assert!(
            (9..=11).contains(&a.syllable_count),
            "expected ~10 syllables, got {}",
            a.syllable_count
        );
        assert!((0.0..=1.0).contains(&a.foot_accuracy));
        assert!((0.0..=1.0).contains(&a.stress_deviation));
        assert_eq!(a.expected_syllables, 10);
    }

    #[test]
    fn test_perfect_iambic_line_is_valid() {
        let json = r#"{"words": [
            {"lemma": "the", "pos": "article", "syllables": 1, "stress": "0"},
            {"lemma": "compare", "pos": "verb", "syllables": 2, "stress": "01"}
        ]}"#;
        let lexicon = Lexicon::from_json(json).unwrap();
        let engine = engine(&lexicon);
        let a = engine.analyze_line(
            "compare compare compare compare compare",
            "iambic_pentameter",
        );
        assert_eq!(a.stress_pattern, "0101010101");
        assert_eq!(a.foot_accuracy, 1.0);
        assert_eq!(a.stress_deviation, 0.0);
        assert!(a.is_valid);
        assert_eq!(a.meter_match.as_deref(), Some("iambic_pentameter"));
    }

    #[test]
    fn test_short_line_padded_deviation() {
        let json = r#"{"words": [
            {"lemma": "compare", "pos": "verb", "syllables": 2, "stress": "01"}
        ]}"#;
        let lexicon = Lexicon::from_json(json).unwrap();
        let engine = engine(&lexicon);
        let a = engine.analyze_line("compare", "iambic_pentameter");
        // "01" padded to "0100000000" vs "0101010101": 4 mismatches of 10.
        assert_eq!(a.syllable_deviation, 8);
        assert!((a.stress_deviation - 0.4).abs() < 1e-9);
        assert_eq!(a.foot_accuracy, 0.2);
        assert!(!a.is_valid);
        assert!(a.is_short());
    }

    #[test]
    fn test_unknown_meter() {
        let lexicon = default_lexicon();
        let engine = engine(&lexicon);
        let a = engine.analyze_line("the night", "sprung_rhythm");
        assert!(!a.is_valid);
        assert!(a.meter_match.is_none());
        assert_eq!(a.syllable_deviation, 0);
        assert_eq!(a.stress_deviation, 0.0);
        assert_eq!(a.syllable_count, 2);
    }

    #[test]
    fn test_empty_line() {
        let lexicon = default_lexicon();
        let a = engine(&lexicon).analyze_line("", "iambic_pentameter");
        assert_eq!(a.syllable_count, 0);
        assert_eq!(a.stress_deviation, 1.0);
        assert!(!a.is_valid);
    }

    #[test]
    fn test_suggest_repairs() {
        let json = r#"{"words": [
            {"lemma": "compare", "pos": "verb", "syllables": 2, "stress": "01"},
            {"lemma": "summer", "pos": "noun", "syllables": 2, "stress": "10"}
        ]}"#;
        let lexicon = Lexicon::from_json(json).unwrap();
        let engine = engine(&lexicon);

        let short = engine.suggest_repairs("summer", "iambic_pentameter");
        assert!(short[0].starts_with("Add 8"));
        assert!(short.iter().any(|h| h.contains("Rearrange")));

        let long = engine.suggest_repairs(
            "compare compare compare compare compare compare compare",
            "iambic_pentameter",
        );
        assert!(long[0].starts_with("Remove 4"));

        let valid = engine.suggest_repairs(
            "compare compare compare compare compare",
            "iambic_pentameter",
        );
        assert!(valid.is_empty());
    }

    #[test]
    fn test_validate_stanza() {
        let json = r#"{"words": [
            {"lemma": "compare", "pos": "verb", "syllables": 2, "stress": "01"}
        ]}"#;
        let lexicon = Lexicon::from_json(json).unwrap();
        let engine = engine(&lexicon);
        let stanza = engine.validate_stanza(
            &["compare compare compare compare", "compare"],
            "iambic_tetrameter",
        );
        assert_eq!(stanza.lines.len(), 2);
        assert_eq!(stanza.valid_lines, 1);
        assert!(!stanza.is_valid());
        assert!((stanza.mean_foot_accuracy - 0.625).abs() < 1e-9);
    }

    #[test]
    fn test_store_record_without_stress_counts_syllables() {
        let json = r#"{"words": [
            {"lemma": "river", "pos": "noun", "syllables": 2}
        ]}"#;
        let lexicon = Lexicon::from_json(json).unwrap();
        assert_eq!(engine(&lexicon).word_stress("river"), "00");
    }
}
