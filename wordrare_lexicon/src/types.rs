// Core word-store types: parts of speech and word records.
//
// A `WordRecord` is the read-only view the generator has of one lemma:
// syntax (part of speech), sound (syllables, stress, ARPAbet pronunciation,
// rhyme key), rarity, semantic tags, and an optional embedding vector. The
// generator filters and queries these records but never creates or mutates
// them; populating them is the job of upstream ingestion.
//
// The type hierarchy is:
// - `PartOfSpeech`: the closed set of syntactic classes template slots use
// - `WordRecord`: a JSON-loadable lexical entry with owned Strings
//
// Determinism constraint: records are iterated in file order by `Lexicon`,
// so nothing here may introduce hash-ordered collections.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Syntactic class of a word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PartOfSpeech {
    Noun,
    Verb,
    Adjective,
    Adverb,
    Article,
    Preposition,
    Pronoun,
    Conjunction,
}

impl PartOfSpeech {
    pub const ALL: [PartOfSpeech; 8] = [
        PartOfSpeech::Noun,
        PartOfSpeech::Verb,
        PartOfSpeech::Adjective,
        PartOfSpeech::Adverb,
        PartOfSpeech::Article,
        PartOfSpeech::Preposition,
        PartOfSpeech::Pronoun,
        PartOfSpeech::Conjunction,
    ];

    /// Lowercase name, matching the serde representation.
    pub fn as_str(self) -> &'static str {
        match self {
            PartOfSpeech::Noun => "noun",
            PartOfSpeech::Verb => "verb",
            PartOfSpeech::Adjective => "adjective",
            PartOfSpeech::Adverb => "adverb",
            PartOfSpeech::Article => "article",
            PartOfSpeech::Preposition => "preposition",
            PartOfSpeech::Pronoun => "pronoun",
            PartOfSpeech::Conjunction => "conjunction",
        }
    }

    /// Content words carry meaning; function words glue them together.
    pub fn is_content(self) -> bool {
        matches!(
            self,
            PartOfSpeech::Noun | PartOfSpeech::Verb | PartOfSpeech::Adjective | PartOfSpeech::Adverb
        )
    }
}

impl fmt::Display for PartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error for an unrecognized part-of-speech name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownPartOfSpeech(pub String);

impl fmt::Display for UnknownPartOfSpeech {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown part of speech '{}'", self.0)
    }
}

impl std::error::Error for UnknownPartOfSpeech {}

impl FromStr for PartOfSpeech {
    type Err = UnknownPartOfSpeech;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PartOfSpeech::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownPartOfSpeech(s.to_string()))
    }
}

/// A JSON-loadable word record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WordRecord {
    /// Dictionary form, lowercase.
    pub lemma: String,
    /// Primary part of speech.
    pub pos: PartOfSpeech,
    /// Secondary part of speech, if the word commonly serves two roles.
    #[serde(default)]
    pub pos_secondary: Option<PartOfSpeech>,
    /// Syllable count.
    pub syllables: u32,
    /// Binary stress string, one digit per syllable (e.g. `"01"`).
    /// Derived from `pronunciation` on load when absent.
    #[serde(default)]
    pub stress: Option<String>,
    /// ARPAbet phones separated by spaces, vowels carrying stress digits
    /// (e.g. `"D EY1"`).
    #[serde(default)]
    pub pronunciation: Option<String>,
    /// Phones from the last stressed vowel to the end, stress digits
    /// stripped (e.g. `"EY"`). Derived from `pronunciation` on load when absent.
    #[serde(default)]
    pub rhyme_key: Option<String>,
    /// 0.0 = everyday, 1.0 = vanishingly rare.
    #[serde(default)]
    pub rarity: f64,
    #[serde(default)]
    pub domain_tags: Vec<String>,
    #[serde(default)]
    pub affect_tags: Vec<String>,
    #[serde(default)]
    pub imagery_tags: Vec<String>,
    /// Optional semantic embedding. All embeddings in one store share a
    /// dimension.
    #[serde(default)]
    pub embedding: Option<Vec<f32>>,
}

impl WordRecord {
    /// Minimal record, mostly for tests and programmatic stores.
    pub fn new(lemma: &str, pos: PartOfSpeech, syllables: u32) -> Self {
        WordRecord {
            lemma: lemma.to_string(),
            pos,
            pos_secondary: None,
            syllables,
            stress: None,
            pronunciation: None,
            rhyme_key: None,
            rarity: 0.0,
            domain_tags: Vec::new(),
            affect_tags: Vec::new(),
            imagery_tags: Vec::new(),
            embedding: None,
        }
    }

    /// ARPAbet phones, empty when no pronunciation is recorded.
    pub fn phones(&self) -> Vec<&str> {
        self.pronunciation
            .as_deref()
            .map(|p| p.split_whitespace().collect())
            .unwrap_or_default()
    }

    /// Whether the record serves as `pos` in either its primary or
    /// secondary role.
    pub fn has_pos(&self, pos: PartOfSpeech) -> bool {
        self.pos == pos || self.pos_secondary == Some(pos)
    }

    pub fn has_domain(&self, tag: &str) -> bool {
        self.domain_tags.iter().any(|t| t == tag)
    }

    pub fn has_affect(&self, tag: &str) -> bool {
        self.affect_tags.iter().any(|t| t == tag)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pos_serde_roundtrip() {
        let json = serde_json::to_string(&PartOfSpeech::Adverb).unwrap();
        assert_eq!(json, "\"adverb\"");
        let parsed: PartOfSpeech = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, PartOfSpeech::Adverb);
    }

    #[test]
    fn test_pos_from_str() {
        assert_eq!("noun".parse::<PartOfSpeech>(), Ok(PartOfSpeech::Noun));
        assert_eq!(
            "preposition".parse::<PartOfSpeech>(),
            Ok(PartOfSpeech::Preposition)
        );
        assert!("gerund".parse::<PartOfSpeech>().is_err());
    }

    #[test]
    fn test_content_words() {
        assert!(PartOfSpeech::Noun.is_content());
        assert!(PartOfSpeech::Adverb.is_content());
        assert!(!PartOfSpeech::Article.is_content());
        assert!(!PartOfSpeech::Preposition.is_content());
    }

    #[test]
    fn test_record_defaults() {
        let json = r#"{"lemma": "day", "pos": "noun", "syllables": 1}"#;
        let record: WordRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.lemma, "day");
        assert!(record.stress.is_none());
        assert!(record.rhyme_key.is_none());
        assert!(record.domain_tags.is_empty());
        assert!(record.embedding.is_none());
        assert_eq!(record.rarity, 0.0);
    }

    #[test]
    fn test_phones_split() {
        let mut record = WordRecord::new("night", PartOfSpeech::Noun, 1);
        assert!(record.phones().is_empty());
        record.pronunciation = Some("N AY1 T".to_string());
        assert_eq!(record.phones(), vec!["N", "AY1", "T"]);
    }

    #[test]
    fn test_secondary_pos() {
        let mut record = WordRecord::new("light", PartOfSpeech::Noun, 1);
        record.pos_secondary = Some(PartOfSpeech::Adjective);
        assert!(record.has_pos(PartOfSpeech::Noun));
        assert!(record.has_pos(PartOfSpeech::Adjective));
        assert!(!record.has_pos(PartOfSpeech::Verb));
    }
}
