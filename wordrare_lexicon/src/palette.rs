// Semantic palette: theme and motif word pools.
//
// A palette is produced upstream of the generator (normally by a concept
// graph builder) and consumed read-only: the constraint model reads its word
// pools to build a theme centroid, and nothing in the generator mutates it.
//
// `SemanticPalette::from_theme` is a minimal stand-in builder that groups
// the store's words tagged with the theme (as a domain tag) into motif pools
// keyed by their first imagery tag.

use crate::{WordFilter, WordStore};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::debug;

/// Motif id for words that carry no imagery tag.
pub const GENERAL_MOTIF: &str = "general";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SemanticPalette {
    pub theme: String,
    /// Motif ids in the order they were first seen.
    pub motifs: Vec<String>,
    /// Motif id -> lemmas.
    pub word_pools: BTreeMap<String, Vec<String>>,
    /// Pairs of lemmas that can stand in for one another figuratively.
    pub metaphor_bridges: Vec<(String, String)>,
}

impl SemanticPalette {
    /// Build a palette from words tagged with any whitespace-separated word
    /// of `theme`. Each motif pool holds at most `pool_size` lemmas.
    pub fn from_theme<S: WordStore + ?Sized>(store: &S, theme: &str, pool_size: usize) -> Self {
        let tags: Vec<String> = theme
            .split_whitespace()
            .map(|t| t.to_lowercase())
            .collect();
        let mut palette = SemanticPalette {
            theme: theme.to_string(),
            ..Default::default()
        };
        if tags.is_empty() || pool_size == 0 {
            return palette;
        }

        for record in store.query(&WordFilter::new().domains(tags.as_slice()), usize::MAX) {
            let motif = record
                .imagery_tags
                .first()
                .map(String::as_str)
                .unwrap_or(GENERAL_MOTIF);
            if !palette.word_pools.contains_key(motif) {
                palette.motifs.push(motif.to_string());
            }
            let pool = palette.word_pools.entry(motif.to_string()).or_default();
            if pool.len() < pool_size && !pool.contains(&record.lemma) {
                pool.push(record.lemma.clone());
            }
        }

        // Chain the lead word of each motif to the next one.
        let leads: Vec<&String> = palette
            .motifs
            .iter()
            .filter_map(|m| palette.word_pools.get(m).and_then(|p| p.first()))
            .collect();
        palette.metaphor_bridges = leads
            .windows(2)
            .map(|w| (w[0].clone(), w[1].clone()))
            .collect();

        debug!(
            theme,
            motifs = palette.motifs.len(),
            words = palette.word_count(),
            "palette built"
        );
        palette
    }

    /// Every pooled lemma, motif by motif, without duplicates.
    pub fn all_words(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for motif in &self.motifs {
            for lemma in self.word_pools.get(motif).into_iter().flatten() {
                if !out.contains(&lemma.as_str()) {
                    out.push(lemma);
                }
            }
        }
        // Pools not listed in `motifs` (hand-built palettes).
        for (motif, pool) in &self.word_pools {
            if self.motifs.contains(motif) {
                continue;
            }
            for lemma in pool {
                if !out.contains(&lemma.as_str()) {
                    out.push(lemma);
                }
            }
        }
        out
    }

    pub fn word_count(&self) -> usize {
        self.word_pools.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.word_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Lexicon;

    const STORE: &str = r#"{"words": [
        {"lemma": "river", "pos": "noun", "syllables": 2,
         "domain_tags": ["nature"], "imagery_tags": ["water"]},
        {"lemma": "stone", "pos": "noun", "syllables": 1,
         "domain_tags": ["nature"], "imagery_tags": ["earth"]},
        {"lemma": "rain", "pos": "noun", "syllables": 1,
         "domain_tags": ["nature", "weather"], "imagery_tags": ["water"]},
        {"lemma": "clock", "pos": "noun", "syllables": 1,
         "domain_tags": ["time"]},
        {"lemma": "wild", "pos": "adjective", "syllables": 1,
         "domain_tags": ["nature"]}
    ]}"#;

    #[test]
    fn test_from_theme_groups_by_imagery() {
        let lexicon = Lexicon::from_json(STORE).unwrap();
        let palette = SemanticPalette::from_theme(&lexicon, "nature", 10);
        assert_eq!(palette.motifs, vec!["water", "earth", GENERAL_MOTIF]);
        assert_eq!(palette.word_pools["water"], vec!["river", "rain"]);
        assert_eq!(palette.word_pools["earth"], vec!["stone"]);
        assert_eq!(palette.word_pools[GENERAL_MOTIF], vec!["wild"]);
        assert_eq!(palette.word_count(), 4);
        assert_eq!(
            palette.metaphor_bridges,
            vec![
                ("river".to_string(), "stone".to_string()),
                ("stone".to_string(), "wild".to_string())
            ]
        );
    }

    #[test]
    fn test_pool_size_caps_each_motif() {
        let lexicon = Lexicon::from_json(STORE).unwrap();
        let palette = SemanticPalette::from_theme(&lexicon, "nature", 1);
        assert_eq!(palette.word_pools["water"], vec!["river"]);
    }

    #[test]
    fn test_unknown_theme_is_empty() {
        let lexicon = Lexicon::from_json(STORE).unwrap();
        let palette = SemanticPalette::from_theme(&lexicon, "astronomy", 10);
        assert!(palette.is_empty());
        assert!(palette.all_words().is_empty());
        assert_eq!(palette.theme, "astronomy");
    }

    #[test]
    fn test_multi_word_theme() {
        let lexicon = Lexicon::from_json(STORE).unwrap();
        let palette = SemanticPalette::from_theme(&lexicon, "Time Weather", 10);
        let words = palette.all_words();
        assert_eq!(words, vec!["rain", "clock"]);
    }
}
