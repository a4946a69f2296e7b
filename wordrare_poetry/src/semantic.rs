// Embedding helpers for theme alignment.
//
// The theme centroid is the mean embedding of every palette word the store
// can resolve. A word's alignment is its cosine similarity to the centroid,
// clamped to [0, 1] where it feeds a score; repair compares raw cosines so
// anti-aligned words keep their order. Words without an embedding, or whose embedding has a
// different dimension than the centroid, have no alignment; callers treat
// that as missing data, not as a zero score.

use crate::meter::tokenize;
use wordrare_lexicon::{SemanticPalette, WordStore};

/// Cosine similarity of two vectors. `None` for mismatched lengths, empty
/// vectors, or a zero vector.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> Option<f64> {
    if a.is_empty() || a.len() != b.len() {
        return None;
    }
    let mut dot = 0.0f64;
    let mut na = 0.0f64;
    let mut nb = 0.0f64;
    for (x, y) in a.iter().zip(b) {
        let (x, y) = (*x as f64, *y as f64);
        dot += x * y;
        na += x * x;
        nb += y * y;
    }
    if na == 0.0 || nb == 0.0 {
        return None;
    }
    Some(dot / (na.sqrt() * nb.sqrt()))
}

#[derive(Debug, Clone, PartialEq)]
pub struct ThemeCentroid {
    vector: Vec<f32>,
    /// How many palette words contributed.
    pub support: usize,
}

impl ThemeCentroid {
    /// Mean embedding of the palette's pooled words. `None` if no word
    /// resolves to an embedding.
    pub fn from_palette(store: &dyn WordStore, palette: &SemanticPalette) -> Option<Self> {
        let mut sum: Vec<f64> = Vec::new();
        let mut support = 0;
        for lemma in palette.all_words() {
            let Some(embedding) = store.lookup(lemma).and_then(|r| r.embedding.as_ref()) else {
                continue;
            };
            if sum.is_empty() {
                sum = vec![0.0; embedding.len()];
            }
            if embedding.len() != sum.len() {
                continue;
            }
            for (s, v) in sum.iter_mut().zip(embedding) {
                *s += *v as f64;
            }
            support += 1;
        }
        if support == 0 {
            return None;
        }
        Some(ThemeCentroid {
            vector: sum.iter().map(|s| (s / support as f64) as f32).collect(),
            support,
        })
    }

    pub fn vector(&self) -> &[f32] {
        &self.vector
    }

    /// Unclamped cosine of one word to the centroid, in [-1, 1].
    pub fn raw_alignment(&self, store: &dyn WordStore, word: &str) -> Option<f64> {
        let embedding = store.lookup(&word.to_lowercase())?.embedding.as_ref()?;
        cosine_similarity(embedding, &self.vector)
    }

    /// Alignment of one word to the theme, in [0, 1].
    pub fn word_alignment(&self, store: &dyn WordStore, word: &str) -> Option<f64> {
        self.raw_alignment(store, word).map(|s| s.clamp(0.0, 1.0))
    }

    /// Mean alignment of the line's content words that have embeddings.
    pub fn line_alignment(&self, store: &dyn WordStore, line: &str) -> Option<f64> {
        let scores: Vec<f64> = tokenize(line)
            .iter()
            .filter(|w| store.lookup(w).is_some_and(|r| r.pos.is_content()))
            .filter_map(|w| self.word_alignment(store, w))
            .collect();
        if scores.is_empty() {
            return None;
        }
        Some(scores.iter().sum::<f64>() / scores.len() as f64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wordrare_lexicon::{Lexicon, PartOfSpeech, WordRecord};

    fn record(lemma: &str, pos: PartOfSpeech, embedding: Option<Vec<f32>>) -> WordRecord {
        let mut r = WordRecord::new(lemma, pos, 1);
        r.embedding = embedding;
        r
    }

    fn store() -> Lexicon {
        Lexicon::from_records(vec![
            record("sea", PartOfSpeech::Noun, Some(vec![1.0, 0.0])),
            record("wave", PartOfSpeech::Noun, Some(vec![0.8, 0.2])),
            record("fire", PartOfSpeech::Noun, Some(vec![0.0, 1.0])),
            record("the", PartOfSpeech::Article, Some(vec![1.0, 0.0])),
            record("odd", PartOfSpeech::Adjective, Some(vec![1.0, 0.0, 0.0])),
            record("bare", PartOfSpeech::Adjective, None),
        ])
    }

    fn palette(words: &[&str]) -> SemanticPalette {
        let mut p = SemanticPalette {
            theme: "sea".into(),
            ..Default::default()
        };
        p.motifs.push("water".into());
        p.word_pools
            .insert("water".into(), words.iter().map(|w| w.to_string()).collect());
        p
    }

    #[test]
    fn test_cosine_similarity() {
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[1.0, 0.0]), Some(1.0));
        assert_eq!(cosine_similarity(&[1.0, 0.0], &[0.0, 1.0]), Some(0.0));
        assert!(cosine_similarity(&[1.0], &[1.0, 0.0]).is_none());
        assert!(cosine_similarity(&[], &[]).is_none());
        assert!(cosine_similarity(&[0.0, 0.0], &[1.0, 0.0]).is_none());
    }

    #[test]
    fn test_centroid_skips_mismatched_dimensions() {
        let store = store();
        let pool = palette(&["sea", "odd", "bare", "ghost"]);
        let centroid = ThemeCentroid::from_palette(&store, &pool).unwrap();
        assert_eq!(centroid.support, 1);
        assert_eq!(centroid.vector(), &[1.0, 0.0]);
    }

    #[test]
    fn test_no_embeddings_no_centroid() {
        let store = store();
        assert!(ThemeCentroid::from_palette(&store, &palette(&["bare"])).is_none());
        assert!(ThemeCentroid::from_palette(&store, &SemanticPalette::default()).is_none());
    }

    #[test]
    fn test_line_alignment_uses_content_words() {
        let store = store();
        let centroid = ThemeCentroid::from_palette(&store, &palette(&["sea"])).unwrap();
        assert_eq!(centroid.word_alignment(&store, "Fire"), Some(0.0));
        // "the" is a function word and does not count.
        let mean = centroid.line_alignment(&store, "The sea, the fire").unwrap();
        assert!((mean - 0.5).abs() < 1e-9);
        assert!(centroid.line_alignment(&store, "the bare ghost").is_none());
    }

    #[test]
    fn test_raw_alignment_keeps_sign() {
        let store = Lexicon::from_records(vec![
            record("sea", PartOfSpeech::Noun, Some(vec![1.0, 0.0])),
            record("ash", PartOfSpeech::Noun, Some(vec![-1.0, 0.0])),
        ]);
        let centroid = ThemeCentroid::from_palette(&store, &palette(&["sea"])).unwrap();
        assert_eq!(centroid.raw_alignment(&store, "ash"), Some(-1.0));
        assert_eq!(centroid.word_alignment(&store, "ash"), Some(0.0));
    }
}
