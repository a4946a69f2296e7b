// Sound engine: rhyme keys, rhyme classification, and sound devices.
//
// Every word maps to a rhyme key (its phones from the last stressed vowel
// to the end), taken from the store record or derived from the record's
// pronunciation. Two keys are compared by counting matching phones from the
// end, stopping at the first mismatch, and dividing by the longer key's
// length; identical keys short-circuit to 1.0. Similarity at or above the
// perfect threshold is a perfect rhyme, at or above the slant threshold a
// slant rhyme.
//
// Below the slant threshold, partial-rhyme classification (assonance or
// consonance between the two rhyme words) is an open extension point:
// `classify_partial_rhyme` currently never matches, so such pairs report no
// rhyme at all. Assonance and consonance *across adjacent words in a line*
// are separate checks (`check_assonance`, `check_consonance`) and are
// implemented.
//
// Words unknown to the store, or known without any phonetic data, have no
// rhyme key; rhyme checks involving them report no match rather than
// failing.

use crate::config::GeneratorConfig;
use crate::meter::tokenize;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use tracing::warn;
use wordrare_lexicon::{WordFilter, WordStore, phonetics};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RhymeType {
    Perfect,
    Slant,
    Assonance,
    Consonance,
}

impl fmt::Display for RhymeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RhymeType::Perfect => "perfect",
            RhymeType::Slant => "slant",
            RhymeType::Assonance => "assonance",
            RhymeType::Consonance => "consonance",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RhymeMatch {
    pub word1: String,
    pub word2: String,
    pub rhyme_type: RhymeType,
    pub similarity: f64,
}

/// Sound devices found between adjacent words of a line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SoundDevices {
    pub alliteration: bool,
    pub assonance: bool,
    pub consonance: bool,
}

pub struct SoundEngine<'a> {
    store: &'a dyn WordStore,
    perfect_threshold: f64,
    slant_threshold: f64,
    scan_limit: usize,
}

impl<'a> SoundEngine<'a> {
    pub fn new(store: &'a dyn WordStore, config: &GeneratorConfig) -> Self {
        SoundEngine {
            store,
            perfect_threshold: config.perfect_rhyme_threshold,
            slant_threshold: config.slant_rhyme_threshold,
            scan_limit: config.rhyme_scan_limit,
        }
    }

    /// Rhyme key for `word`, or `None` when the store has no phonetic data.
    pub fn rhyme_key(&self, word: &str) -> Option<String> {
        let record = self.store.lookup(&word.to_lowercase())?;
        if let Some(key) = record.rhyme_key.as_deref().filter(|k| !k.is_empty()) {
            return Some(key.to_string());
        }
        let key = phonetics::rhyme_key(&record.phones());
        (!key.is_empty()).then_some(key)
    }

    /// Tail-match similarity between two rhyme keys, in [0, 1].
    pub fn compute_rhyme_similarity(&self, key1: &str, key2: &str) -> f64 {
        let p1: Vec<&str> = key1.split_whitespace().collect();
        let p2: Vec<&str> = key2.split_whitespace().collect();
        if p1.is_empty() || p2.is_empty() {
            return 0.0;
        }
        if p1 == p2 {
            return 1.0;
        }
        let matches = p1
            .iter()
            .rev()
            .zip(p2.iter().rev())
            .take_while(|(a, b)| a == b)
            .count();
        matches as f64 / p1.len().max(p2.len()) as f64
    }

    /// Classify the rhyme between two words, or `None` if they do not rhyme
    /// (or either lacks a rhyme key).
    pub fn check_rhyme(&self, word1: &str, word2: &str) -> Option<RhymeMatch> {
        let key1 = self.rhyme_key(word1)?;
        let key2 = self.rhyme_key(word2)?;
        let similarity = self.compute_rhyme_similarity(&key1, &key2);
        let rhyme_type = if similarity >= self.perfect_threshold {
            RhymeType::Perfect
        } else if similarity >= self.slant_threshold {
            RhymeType::Slant
        } else {
            self.classify_partial_rhyme(word1, word2)?
        };
        Some(RhymeMatch {
            word1: word1.to_string(),
            word2: word2.to_string(),
            rhyme_type,
            similarity,
        })
    }

    /// Assonance/consonance classification of a sub-slant rhyme pair.
    /// Not implemented; always `None`.
    fn classify_partial_rhyme(&self, _word1: &str, _word2: &str) -> Option<RhymeType> {
        None
    }

    /// Rhymes for `word` from the store within a rarity band, best first.
    ///
    /// Scans at most `rhyme_scan_limit` keyed records in store order and
    /// stops as soon as twice `limit` matches have been collected, so this
    /// is a bounded search, not an exhaustive one.
    pub fn find_rhymes_for_word(
        &self,
        word: &str,
        limit: usize,
        min_rarity: f64,
        max_rarity: f64,
        only: Option<RhymeType>,
    ) -> Vec<RhymeMatch> {
        if self.rhyme_key(word).is_none() {
            warn!(word, "no rhyme key");
            return Vec::new();
        }
        let filter = WordFilter::new()
            .has_rhyme_key()
            .rarity(min_rarity, max_rarity)
            .exclude(word);
        let mut matches = Vec::new();
        for candidate in self.store.query(&filter, self.scan_limit) {
            let found = self
                .check_rhyme(word, &candidate.lemma)
                .filter(|m| only.is_none_or(|t| m.rhyme_type == t));
            if let Some(m) = found {
                matches.push(m);
            }
            if matches.len() >= limit * 2 {
                break;
            }
        }
        sort_by_similarity(&mut matches);
        matches.truncate(limit);
        matches
    }

    /// Rhymes for `word` among explicit candidates, best first.
    pub fn find_rhymes(
        &self,
        word: &str,
        candidates: &[&str],
        only: Option<RhymeType>,
    ) -> Vec<RhymeMatch> {
        let mut matches: Vec<RhymeMatch> = candidates
            .iter()
            .filter(|c| **c != word)
            .filter_map(|c| self.check_rhyme(word, c))
            .filter(|m| only.is_none_or(|t| m.rhyme_type == t))
            .collect();
        sort_by_similarity(&mut matches);
        matches
    }

    // -- Sound devices --

    fn phones_of(&self, word: &str) -> Vec<String> {
        self.store
            .lookup(word)
            .map(|r| r.phones().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// Whether every word starts with the same onset phone (first letter
    /// for words without phonetic data).
    pub fn check_alliteration(&self, words: &[&str]) -> bool {
        if words.len() < 2 {
            return false;
        }
        let leads: Vec<String> = words
            .iter()
            .map(|w| {
                let phones = self.phones_of(w);
                let refs: Vec<&str> = phones.iter().map(String::as_str).collect();
                match phonetics::onset(&refs).first() {
                    Some(p) => p.to_string(),
                    None => w
                        .chars()
                        .next()
                        .map(|c| c.to_lowercase().to_string())
                        .unwrap_or_default(),
                }
            })
            .collect();
        !leads[0].is_empty() && leads.iter().all(|l| *l == leads[0])
    }

    /// Whether all words share at least one vowel phone.
    pub fn check_assonance(&self, words: &[&str]) -> bool {
        self.shared_phones(words, |phones| {
            phonetics::nucleus(phones).into_iter().map(str::to_string).collect()
        })
    }

    /// Whether all words share at least one final consonant.
    pub fn check_consonance(&self, words: &[&str]) -> bool {
        self.shared_phones(words, |phones| {
            phonetics::coda(phones).into_iter().map(str::to_string).collect()
        })
    }

    fn shared_phones(
        &self,
        words: &[&str],
        extract: impl Fn(&[&str]) -> BTreeSet<String>,
    ) -> bool {
        let sets: Vec<BTreeSet<String>> = words
            .iter()
            .map(|w| {
                let phones = self.phones_of(w);
                let refs: Vec<&str> = phones.iter().map(String::as_str).collect();
                extract(&refs)
            })
            .filter(|s| !s.is_empty())
            .collect();
        if sets.len() < 2 {
            return false;
        }
        let mut common = sets[0].clone();
        for s in &sets[1..] {
            common.retain(|p| s.contains(p));
        }
        !common.is_empty()
    }

    /// Check each pair of adjacent words for each device.
    pub fn analyze_sound_devices(&self, line: &str) -> SoundDevices {
        let tokens = tokenize(line);
        let mut devices = SoundDevices::default();
        for pair in tokens.windows(2) {
            let pair = [pair[0].as_str(), pair[1].as_str()];
            devices.alliteration |= self.check_alliteration(&pair);
            devices.assonance |= self.check_assonance(&pair);
            devices.consonance |= self.check_consonance(&pair);
        }
        devices
    }
}

fn sort_by_similarity(matches: &mut [RhymeMatch]) {
    matches.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordrare_lexicon::{Lexicon, default_lexicon};

    fn engine(store: &dyn WordStore) -> SoundEngine<'_> {
        SoundEngine::new(store, &GeneratorConfig::default())
    }

    #[test]
    fn test_day_way_perfect() {
        let lexicon = default_lexicon();
        let m = engine(&lexicon).check_rhyme("day", "way").unwrap();
        assert_eq!(m.rhyme_type, RhymeType::Perfect);
        assert!(m.similarity >= 0.95);
    }

    #[test]
    fn test_day_night_no_rhyme() {
        let lexicon = default_lexicon();
        let m = engine(&lexicon).check_rhyme("day", "night");
        assert!(m.is_none_or(|m| m.similarity < 0.7));
    }

    #[test]
    fn test_similarity_tail_match() {
        let lexicon = Lexicon::from_json(r#"{"words": []}"#).unwrap();
        let e = engine(&lexicon);
        assert_eq!(e.compute_rhyme_similarity("AY T", "AY T"), 1.0);
        // T matches, then AY vs EY stops the scan: 1 of 2.
        assert_eq!(e.compute_rhyme_similarity("AY T", "EY T"), 0.5);
        assert_eq!(e.compute_rhyme_similarity("EH R", "AY"), 0.0);
        assert_eq!(e.compute_rhyme_similarity("", "AY"), 0.0);
        // Three of four trailing phones.
        assert_eq!(e.compute_rhyme_similarity("IH N T ER", "EH N T ER"), 0.75);
    }

    #[test]
    fn test_slant_rhyme() {
        let json = r#"{"words": [
            {"lemma": "winter", "pos": "noun", "syllables": 2, "rhyme_key": "IH N T ER"},
            {"lemma": "splinter", "pos": "noun", "syllables": 2, "rhyme_key": "EH N T ER"}
        ]}"#;
        let lexicon = Lexicon::from_json(json).unwrap();
        let m = engine(&lexicon).check_rhyme("winter", "splinter").unwrap();
        assert_eq!(m.rhyme_type, RhymeType::Slant);
    }

    #[test]
    fn test_unknown_word_no_rhyme_key() {
        let lexicon = default_lexicon();
        let e = engine(&lexicon);
        assert!(e.rhyme_key("qwzx").is_none());
        assert!(e.check_rhyme("day", "qwzx").is_none());
    }

    #[test]
    fn test_rhyme_key_derived_from_pronunciation() {
        let lexicon = default_lexicon();
        assert_eq!(engine(&lexicon).rhyme_key("night").as_deref(), Some("AY T"));
        assert_eq!(engine(&lexicon).rhyme_key("Day").as_deref(), Some("EY"));
    }

    #[test]
    fn test_find_rhymes_for_word() {
        let lexicon = default_lexicon();
        let e = engine(&lexicon);
        let rhymes = e.find_rhymes_for_word("day", 3, 0.0, 1.0, None);
        assert_eq!(rhymes.len(), 3);
        assert!(rhymes.iter().all(|m| m.word2 != "day"));
        assert!(rhymes.iter().all(|m| m.rhyme_type == RhymeType::Perfect));
        for pair in rhymes.windows(2) {
            assert!(pair[0].similarity >= pair[1].similarity);
        }
    }

    #[test]
    fn test_find_rhymes_respects_rarity_band() {
        let lexicon = default_lexicon();
        let e = engine(&lexicon);
        let rhymes = e.find_rhymes_for_word("day", 50, 0.3, 0.45, None);
        assert!(!rhymes.is_empty());
        for m in &rhymes {
            let r = lexicon.lookup(&m.word2).unwrap().rarity;
            assert!((0.3..=0.45).contains(&r), "{} has rarity {r}", m.word2);
        }
    }

    #[test]
    fn test_find_rhymes_among_candidates() {
        let lexicon = default_lexicon();
        let e = engine(&lexicon);
        let rhymes = e.find_rhymes("night", &["light", "day", "night", "flight"], None);
        let words: Vec<&str> = rhymes.iter().map(|m| m.word2.as_str()).collect();
        assert_eq!(words, vec!["light", "flight"]);
    }

    #[test]
    fn test_alliteration() {
        let lexicon = default_lexicon();
        let e = engine(&lexicon);
        assert!(e.check_alliteration(&["silver", "sea"]));
        assert!(!e.check_alliteration(&["silver", "moon"]));
        // Letter fallback for unknown words.
        assert!(e.check_alliteration(&["zorbly", "zibbet"]));
        assert!(!e.check_alliteration(&["silver"]));
    }

    #[test]
    fn test_assonance_and_consonance() {
        let lexicon = default_lexicon();
        let e = engine(&lexicon);
        // AY in both.
        assert!(e.check_assonance(&["night", "fire"]));
        assert!(!e.check_assonance(&["day", "moon"]));
        // Both end in T.
        assert!(e.check_consonance(&["night", "heart"]));
        assert!(!e.check_consonance(&["night", "moon"]));
    }

    #[test]
    fn test_analyze_sound_devices() {
        let lexicon = default_lexicon();
        let devices = engine(&lexicon).analyze_sound_devices("silver sea beneath the night");
        assert!(devices.alliteration);
        let none = engine(&lexicon).analyze_sound_devices("moon");
        assert_eq!(none, SoundDevices::default());
    }
}
