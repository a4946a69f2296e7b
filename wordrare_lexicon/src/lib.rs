// Word-store crate for the WordRare poem generator.
//
// Provides the read-only lexical data the generator consumes: a
// `WordStore` trait (the lookup/filter/rhyme-key query interface), a
// JSON-backed in-memory `Lexicon` implementing it, ARPAbet phonetic
// helpers, and the `SemanticPalette` structure that carries theme word
// pools into the constraint model.
//
// Architecture:
// - `types.rs`: `PartOfSpeech`, `WordRecord`
// - `phonetics.rs`: stress strings, rhyme keys, onset/nucleus/coda splits
// - `palette.rs`: `SemanticPalette` and a minimal theme-based builder
// - `lib.rs` (this file): `WordStore`, `WordFilter`, `Lexicon`
//
// The lexicon is loaded from `data/lexicon.json` via `Lexicon::from_json()`
// (JSON string in, typed struct out). `default_lexicon()` embeds the default
// file with `include_str!`. On load, records that carry a pronunciation but
// no stress string or rhyme key get them derived.
//
// Determinism constraint: queries return records in file order and never
// consult a hash-ordered collection, so two runs against the same lexicon
// see candidates in the same order.

pub mod palette;
pub mod phonetics;
pub mod types;

pub use palette::SemanticPalette;
pub use types::{PartOfSpeech, WordRecord};

use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Query interface
// ---------------------------------------------------------------------------

/// Read-only access to word records.
///
/// The generator never writes through this interface. Implementations
/// must be deterministic: the same filter against the same store returns the
/// same records in the same order.
pub trait WordStore {
    /// Exact lookup by lemma.
    fn lookup(&self, lemma: &str) -> Option<&WordRecord>;

    /// Records matching `filter`, in store order, at most `limit` of them.
    fn query(&self, filter: &WordFilter, limit: usize) -> Vec<&WordRecord>;

    /// Records whose rhyme key equals `key`.
    fn with_rhyme_key(&self, key: &str, limit: usize) -> Vec<&WordRecord> {
        self.query(&WordFilter::new().rhyme_key(key), limit)
    }
}

/// Conjunctive filter over word records. Unset fields match everything.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WordFilter {
    pub pos: Option<PartOfSpeech>,
    pub syllables: Option<u32>,
    pub min_rarity: Option<f64>,
    pub max_rarity: Option<f64>,
    pub rhyme_key: Option<String>,
    /// Only records with a non-empty rhyme key.
    pub require_rhyme_key: bool,
    /// Any-of match against `domain_tags`. Empty matches everything.
    pub domain_tags: Vec<String>,
    pub affect_tag: Option<String>,
    /// Lemmas to leave out.
    pub exclude: Vec<String>,
}

impl WordFilter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn pos(mut self, pos: PartOfSpeech) -> Self {
        self.pos = Some(pos);
        self
    }

    pub fn syllables(mut self, n: u32) -> Self {
        self.syllables = Some(n);
        self
    }

    pub fn rarity(mut self, min: f64, max: f64) -> Self {
        self.min_rarity = Some(min);
        self.max_rarity = Some(max);
        self
    }

    pub fn rhyme_key(mut self, key: &str) -> Self {
        self.rhyme_key = Some(key.to_string());
        self
    }

    pub fn has_rhyme_key(mut self) -> Self {
        self.require_rhyme_key = true;
        self
    }

    pub fn domains<S: AsRef<str>>(mut self, tags: &[S]) -> Self {
        self.domain_tags = tags.iter().map(|t| t.as_ref().to_string()).collect();
        self
    }

    pub fn affect(mut self, tag: &str) -> Self {
        self.affect_tag = Some(tag.to_string());
        self
    }

    pub fn exclude(mut self, lemma: &str) -> Self {
        self.exclude.push(lemma.to_string());
        self
    }

    /// Whether `record` passes every set criterion.
    pub fn matches(&self, record: &WordRecord) -> bool {
        if self.pos.is_some_and(|pos| !record.has_pos(pos)) {
            return false;
        }
        if self.syllables.is_some_and(|n| record.syllables != n) {
            return false;
        }
        if self.min_rarity.is_some_and(|min| record.rarity < min)
            || self.max_rarity.is_some_and(|max| record.rarity > max)
        {
            return false;
        }
        let key = record.rhyme_key.as_deref().unwrap_or("");
        if self.require_rhyme_key && key.is_empty() {
            return false;
        }
        if self.rhyme_key.as_deref().is_some_and(|wanted| key != wanted) {
            return false;
        }
        if !self.domain_tags.is_empty()
            && !self.domain_tags.iter().any(|t| record.has_domain(t))
        {
            return false;
        }
        if self
            .affect_tag
            .as_deref()
            .is_some_and(|tag| !record.has_affect(tag))
        {
            return false;
        }
        !self.exclude.iter().any(|l| *l == record.lemma)
    }
}

// ---------------------------------------------------------------------------
// In-memory lexicon
// ---------------------------------------------------------------------------

/// The top-level JSON structure for the lexicon file.
#[derive(Debug, serde::Deserialize)]
struct LexiconFile {
    words: Vec<WordRecord>,
}

/// A loaded lexicon.
///
/// Preserves entry order from the JSON file; the lemma index points at the
/// first record for each lemma.
#[derive(Debug, Clone)]
pub struct Lexicon {
    entries: Vec<WordRecord>,
    index: BTreeMap<String, usize>,
}

impl Lexicon {
    /// Parse a lexicon from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let file: LexiconFile = serde_json::from_str(json)?;
        Ok(Self::from_records(file.words))
    }

    /// Read and parse a lexicon file.
    pub fn load(path: &Path) -> std::io::Result<Self> {
        let json = std::fs::read_to_string(path)?;
        Ok(Self::from_json(&json)?)
    }

    /// Build from records, deriving missing stress strings and rhyme keys.
    pub fn from_records(records: Vec<WordRecord>) -> Self {
        let mut entries = records;
        let mut index = BTreeMap::new();
        for (i, record) in entries.iter_mut().enumerate() {
            fill_derived_phonetics(record);
            index.entry(record.lemma.clone()).or_insert(i);
        }
        debug!(words = entries.len(), "lexicon loaded");
        Lexicon { entries, index }
    }

    /// All entries, in file order.
    pub fn all(&self) -> &[WordRecord] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Filter entries by part of speech (primary or secondary).
    pub fn by_pos(&self, pos: PartOfSpeech) -> Vec<&WordRecord> {
        self.entries.iter().filter(|e| e.has_pos(pos)).collect()
    }
}

impl WordStore for Lexicon {
    fn lookup(&self, lemma: &str) -> Option<&WordRecord> {
        self.index.get(lemma).map(|&i| &self.entries[i])
    }

    fn query(&self, filter: &WordFilter, limit: usize) -> Vec<&WordRecord> {
        self.entries
            .iter()
            .filter(|e| filter.matches(e))
            .take(limit)
            .collect()
    }
}

fn fill_derived_phonetics(record: &mut WordRecord) {
    let Some(pron) = record.pronunciation.clone() else {
        return;
    };
    let phones: Vec<&str> = pron.split_whitespace().collect();
    if record.stress.is_none() {
        let stress = phonetics::stress_pattern(&phones);
        if !stress.is_empty() {
            if stress.len() != record.syllables as usize {
                warn!(
                    lemma = %record.lemma,
                    syllables = record.syllables,
                    stress = %stress,
                    "pronunciation disagrees with syllable count"
                );
            }
            record.stress = Some(stress);
        }
    }
    if record.rhyme_key.is_none() {
        let key = phonetics::rhyme_key(&phones);
        if !key.is_empty() {
            record.rhyme_key = Some(key);
        }
    }
}

/// Load the default lexicon embedded at compile time.
///
/// Uses `include_str!` to embed `data/lexicon.json`. Panics if the embedded
/// JSON is malformed (should never happen in a released build).
pub fn default_lexicon() -> Lexicon {
    let json = include_str!("../../data/lexicon.json");
    Lexicon::from_json(json).expect("embedded lexicon.json is malformed")
}
