// Line realization: filling scaffold lines with words from the store.
//
// Three pieces, all scoped to one generation run:
//
// - `RhymeAnchors`: the per-run rhyme context. Maps each base rhyme symbol
//   to its anchor (the first word that ended a line of that group) and
//   remembers every end word used per group. It is created empty by the
//   caller and passed into every `realize_line` call; nothing else holds it.
// - `WordSelector`: picks words for template slots. Candidates for a
//   (part of speech, syllable count) slot are queried once per run and
//   cached, ranked by imagery match then by closeness of their rarity to the
//   request's `rarity_bias`, and drawn with temperature sampling.
// - `LineRealizer`: builds candidate lines left to right, scores them on
//   meter, syllable closeness, and rhyme against the group anchor, keeps the
//   best over a small retry budget, and falls back to a placeholder line
//   when no candidate can be built.
//
// Content slots search progressively wider filters: the rarity band with
// the request's domain and affect tags, the band alone, then any rarity.
// Function words ignore the band and tags. When no word has the exact
// syllable quota, the closest syllable count wins.
//
// Rhymed lines pick their end word first. The first line of a group
// proposes an anchor whose rhyme family is large enough to supply the rest
// of the group, preferring a family no other group has claimed; later lines
// take unused members of the anchor's family, and repeat the anchor itself
// only when the family is exhausted.

use crate::config::GeneratorConfig;
use crate::constraint::{ConstraintKind, ConstraintWeights};
use crate::meter::{MeterEngine, tokenize};
use crate::request::GenerationRequest;
use crate::scaffold::{LineScaffold, PoemScaffold};
use crate::sound::SoundEngine;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use wordrare_lexicon::{PartOfSpeech, SemanticPalette, WordFilter, WordRecord, WordStore};
use wordrare_prng::RunRng;

// ---------------------------------------------------------------------------
// Rhyme anchors
// ---------------------------------------------------------------------------

/// Per-run rhyme state, keyed by base rhyme symbol.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RhymeAnchors {
    anchors: BTreeMap<String, String>,
    used: BTreeMap<String, Vec<String>>,
}

impl RhymeAnchors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.anchors.get(symbol).map(String::as_str)
    }

    /// Record `word` as the end of a line in `symbol`'s group. The first
    /// word recorded for a symbol becomes its anchor.
    pub fn record(&mut self, symbol: &str, word: &str) {
        self.anchors
            .entry(symbol.to_string())
            .or_insert_with(|| word.to_string());
        let used = self.used.entry(symbol.to_string()).or_default();
        if !used.iter().any(|w| w == word) {
            used.push(word.to_string());
        }
    }

    /// End words already used by `symbol`'s group, in order.
    pub fn used(&self, symbol: &str) -> &[String] {
        self.used.get(symbol).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn anchors(&self) -> &BTreeMap<String, String> {
        &self.anchors
    }

    pub fn into_map(self) -> BTreeMap<String, String> {
        self.anchors
    }

    pub fn len(&self) -> usize {
        self.anchors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.anchors.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Word selection
// ---------------------------------------------------------------------------

/// The request fields that steer word choice.
#[derive(Debug, Clone, PartialEq)]
pub struct SelectionParams {
    pub min_rarity: f64,
    pub max_rarity: f64,
    pub rarity_bias: f64,
    pub temperature: f64,
    pub domain_tags: Vec<String>,
    pub imagery_tags: Vec<String>,
    pub affect: Option<String>,
    pub motif_density: f64,
}

impl SelectionParams {
    pub fn from_request(request: &GenerationRequest) -> Self {
        SelectionParams {
            min_rarity: request.min_rarity,
            max_rarity: request.max_rarity,
            rarity_bias: request.rarity_bias,
            temperature: request.temperature,
            domain_tags: request.domain_tags.clone(),
            imagery_tags: request.imagery_tags.clone(),
            affect: request.affect_profile.clone(),
            motif_density: request.motif_density,
        }
    }
}

impl Default for SelectionParams {
    fn default() -> Self {
        Self::from_request(&GenerationRequest::default())
    }
}

/// Index into a ranked list of `len` candidates.
///
/// Temperature 0 always takes the first candidate and 1 (or above) samples
/// uniformly. In between, rank `i` is weighted `(1 - i/len)^(1/t)`, so lower
/// temperatures concentrate on the head of the ranking.
pub fn sample_index(len: usize, temperature: f64, rng: &mut RunRng) -> Option<usize> {
    if len == 0 {
        return None;
    }
    if temperature <= 0.0 {
        return Some(0);
    }
    if temperature >= 1.0 {
        return Some(rng.range_usize(0, len));
    }
    let exponent = 1.0 / temperature;
    let weights: Vec<f64> = (0..len)
        .map(|i| (1.0 - i as f64 / len as f64).powf(exponent))
        .collect();
    rng.weighted_index(&weights)
}

type SlotKey = (PartOfSpeech, u32);

pub struct WordSelector<'a> {
    store: &'a dyn WordStore,
    params: SelectionParams,
    candidate_limit: usize,
    motif_words: Vec<String>,
    slot_cache: BTreeMap<SlotKey, Vec<&'a WordRecord>>,
    family_cache: BTreeMap<String, Vec<&'a WordRecord>>,
}

impl<'a> WordSelector<'a> {
    pub fn new(
        store: &'a dyn WordStore,
        params: SelectionParams,
        config: &GeneratorConfig,
    ) -> Self {
        WordSelector {
            store,
            params,
            candidate_limit: config.candidate_limit.max(1),
            motif_words: Vec::new(),
            slot_cache: BTreeMap::new(),
            family_cache: BTreeMap::new(),
        }
    }

    /// Draw motif words from `palette` with probability `motif_density`.
    pub fn with_palette(mut self, palette: &SemanticPalette) -> Self {
        self.motif_words = palette.all_words().into_iter().map(str::to_string).collect();
        self
    }

    pub fn store(&self) -> &'a dyn WordStore {
        self.store
    }

    pub fn params(&self) -> &SelectionParams {
        &self.params
    }

    /// Ranked candidates for a slot. Computed once per run and cached.
    pub fn candidates(&mut self, pos: PartOfSpeech, syllables: u32) -> &[&'a WordRecord] {
        let store = self.store;
        let params = &self.params;
        let limit = self.candidate_limit;
        self.slot_cache
            .entry((pos, syllables))
            .or_insert_with(|| rank_slot(store, params, limit, pos, syllables))
    }

    /// Pick a word for an ordinary slot. Lemmas in `exclude` are avoided
    /// unless nothing else fits.
    pub fn select_word(
        &mut self,
        pos: PartOfSpeech,
        syllables: u32,
        exclude: &[String],
        rng: &mut RunRng,
    ) -> Option<&'a WordRecord> {
        let ranked = self.candidates(pos, syllables).to_vec();
        let mut pool: Vec<&'a WordRecord> = ranked
            .iter()
            .copied()
            .filter(|r| !exclude.contains(&r.lemma))
            .collect();
        if pool.is_empty() {
            pool = ranked;
        }
        if pos.is_content() {
            pool = self.prefer_motif(pool, rng);
        }
        sample_index(pool.len(), self.params.temperature, rng).map(|i| pool[i])
    }

    /// Pick the word that ends a line in `symbol`'s rhyme group.
    ///
    /// `group_len` is how many generated lines the group has; it bounds the
    /// rhyme family a new anchor must come from.
    pub fn select_rhyme_word(
        &mut self,
        pos: PartOfSpeech,
        symbol: &str,
        group_len: usize,
        anchors: &RhymeAnchors,
        exclude: &[String],
        rng: &mut RunRng,
    ) -> Option<&'a WordRecord> {
        match anchors.get(symbol) {
            Some(anchor) => self.select_rhyming(pos, symbol, anchor, anchors, exclude, rng),
            None => self.select_anchor(pos, group_len, anchors, exclude, rng),
        }
    }

    fn select_rhyming(
        &mut self,
        pos: PartOfSpeech,
        symbol: &str,
        anchor: &str,
        anchors: &RhymeAnchors,
        exclude: &[String],
        rng: &mut RunRng,
    ) -> Option<&'a WordRecord> {
        let store = self.store;
        let anchor_record = store.lookup(anchor)?;
        let Some(key) = anchor_record.rhyme_key.clone() else {
            return Some(anchor_record);
        };
        let used = anchors.used(symbol);
        let family: Vec<&'a WordRecord> = self
            .family(&key)
            .into_iter()
            .filter(|r| r.pos.is_content())
            .filter(|r| !used.contains(&r.lemma) && !exclude.contains(&r.lemma))
            .collect();
        let same_pos: Vec<&'a WordRecord> =
            family.iter().copied().filter(|r| r.has_pos(pos)).collect();
        let mut pool = if same_pos.is_empty() { family } else { same_pos };
        if pool.is_empty() {
            debug!(symbol, anchor, "rhyme family exhausted, repeating anchor");
            return Some(anchor_record);
        }
        rank_by_preference(&mut pool, &self.params);
        sample_index(pool.len(), self.params.temperature, rng).map(|i| pool[i])
    }

    fn select_anchor(
        &mut self,
        pos: PartOfSpeech,
        group_len: usize,
        anchors: &RhymeAnchors,
        exclude: &[String],
        rng: &mut RunRng,
    ) -> Option<&'a WordRecord> {
        let store = self.store;
        let anchor_pos = if pos.is_content() { pos } else { PartOfSpeech::Noun };

        let mut pool: Vec<&'a WordRecord> = Vec::new();
        for p in [anchor_pos, PartOfSpeech::Noun] {
            let keyed = WordFilter::new().pos(p).has_rhyme_key();
            let banded = store.query(
                &keyed.clone().rarity(self.params.min_rarity, self.params.max_rarity),
                usize::MAX,
            );
            pool = if banded.is_empty() {
                store.query(&keyed, usize::MAX)
            } else {
                banded
            };
            pool.retain(|r| !exclude.contains(&r.lemma));
            if !pool.is_empty() {
                break;
            }
        }
        if pool.is_empty() {
            return None;
        }

        let taken: Vec<String> = anchors
            .anchors()
            .values()
            .filter_map(|w| store.lookup(w))
            .filter_map(|r| r.rhyme_key.clone())
            .collect();
        let mut sized = Vec::with_capacity(pool.len());
        for &record in &pool {
            let key = record.rhyme_key.as_deref().unwrap_or("");
            let size = self.family_size(key);
            sized.push((record, size, taken.iter().any(|t| t == key)));
        }

        let min_family = group_len.max(1);
        let mut chosen: Vec<&'a WordRecord> = Vec::new();
        let passes = [
            (min_family, true),
            (min_family, false),
            (min_family.min(2), false),
        ];
        for (min_size, fresh_only) in passes {
            chosen = sized
                .iter()
                .filter(|(_, size, claimed)| *size >= min_size && !(fresh_only && *claimed))
                .map(|(r, _, _)| *r)
                .collect();
            if !chosen.is_empty() {
                break;
            }
        }
        if chosen.is_empty() {
            chosen = pool;
        }
        rank_by_preference(&mut chosen, &self.params);
        let chosen = self.prefer_motif(chosen, rng);
        sample_index(chosen.len(), self.params.temperature, rng).map(|i| chosen[i])
    }

    /// Records sharing `key`, cached per run.
    fn family(&mut self, key: &str) -> Vec<&'a WordRecord> {
        let store = self.store;
        self.family_cache
            .entry(key.to_string())
            .or_insert_with(|| store.with_rhyme_key(key, usize::MAX))
            .clone()
    }

    /// Content words in the rhyme family of `key`.
    fn family_size(&mut self, key: &str) -> usize {
        if key.is_empty() {
            return 0;
        }
        self.family(key).iter().filter(|r| r.pos.is_content()).count()
    }

    /// With probability `motif_density`, narrow `pool` to palette words
    /// (when any are present).
    fn prefer_motif(&self, pool: Vec<&'a WordRecord>, rng: &mut RunRng) -> Vec<&'a WordRecord> {
        if self.motif_words.is_empty() || !rng.random_bool(self.params.motif_density) {
            return pool;
        }
        let motif: Vec<&'a WordRecord> = pool
            .iter()
            .copied()
            .filter(|r| self.motif_words.contains(&r.lemma))
            .collect();
        if motif.is_empty() { pool } else { motif }
    }
}

fn rank_slot<'a>(
    store: &'a dyn WordStore,
    params: &SelectionParams,
    limit: usize,
    pos: PartOfSpeech,
    syllables: u32,
) -> Vec<&'a WordRecord> {
    if !pos.is_content() {
        let exact = store.query(&WordFilter::new().pos(pos).syllables(syllables), limit);
        if !exact.is_empty() {
            return exact;
        }
        return closest_syllables(store.query(&WordFilter::new().pos(pos), usize::MAX), syllables);
    }

    let band = WordFilter::new()
        .pos(pos)
        .syllables(syllables)
        .rarity(params.min_rarity, params.max_rarity);
    let mut tiers = Vec::with_capacity(3);
    if !params.domain_tags.is_empty() || params.affect.is_some() {
        let mut tagged = band.clone().domains(params.domain_tags.as_slice());
        if let Some(affect) = &params.affect {
            tagged = tagged.affect(affect);
        }
        tiers.push(tagged);
    }
    tiers.push(band);
    tiers.push(WordFilter::new().pos(pos).syllables(syllables));

    let mut found = tiers
        .iter()
        .map(|f| store.query(f, limit))
        .find(|c| !c.is_empty())
        .unwrap_or_default();
    if found.is_empty() {
        let banded = store.query(
            &WordFilter::new().pos(pos).rarity(params.min_rarity, params.max_rarity),
            usize::MAX,
        );
        let pool = if banded.is_empty() {
            store.query(&WordFilter::new().pos(pos), usize::MAX)
        } else {
            banded
        };
        found = closest_syllables(pool, syllables);
    }
    rank_by_preference(&mut found, params);
    found
}

/// The records whose syllable count is nearest `target`, in store order.
fn closest_syllables(pool: Vec<&WordRecord>, target: u32) -> Vec<&WordRecord> {
    let Some(best) = pool.iter().map(|r| r.syllables.abs_diff(target)).min() else {
        return pool;
    };
    pool.into_iter()
        .filter(|r| r.syllables.abs_diff(target) == best)
        .collect()
}

/// Stable sort: imagery matches first, then rarity nearest the bias.
fn rank_by_preference(records: &mut [&WordRecord], params: &SelectionParams) {
    let misses_imagery = |r: &WordRecord| {
        !params.imagery_tags.is_empty()
            && !params.imagery_tags.iter().any(|t| r.imagery_tags.contains(t))
    };
    let bias = params.rarity_bias;
    records.sort_by(|a, b| {
        misses_imagery(*a)
            .cmp(&misses_imagery(*b))
            .then_with(|| (a.rarity - bias).abs().total_cmp(&(b.rarity - bias).abs()))
    });
}

// ---------------------------------------------------------------------------
// Line realization
// ---------------------------------------------------------------------------

/// Text for a line that could not be realized.
pub fn placeholder_text(line_number: usize) -> String {
    format!("[Line {line_number} - generation failed]")
}

/// Join words into display text: first letter and the pronoun "I"
/// capitalized.
pub fn compose_line(words: &[String]) -> String {
    let text = words
        .iter()
        .map(|w| if w == "i" { "I" } else { w.as_str() })
        .collect::<Vec<_>>()
        .join(" ");
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => text,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RealizedLine {
    pub line_number: usize,
    pub text: String,
    /// Score of the kept candidate; 0 for placeholders.
    pub score: f64,
    pub is_placeholder: bool,
}

struct Candidate {
    text: String,
    end_word: Option<String>,
}

pub struct LineRealizer<'a> {
    selector: WordSelector<'a>,
    meter: MeterEngine<'a>,
    sound: SoundEngine<'a>,
    meter_weight: f64,
    rhyme_weight: f64,
    syllable_weight: f64,
    syllable_window: f64,
    retries: usize,
    early_stop: f64,
}

impl<'a> LineRealizer<'a> {
    pub fn new(
        selector: WordSelector<'a>,
        config: &GeneratorConfig,
        weights: &ConstraintWeights,
    ) -> Self {
        let store = selector.store();
        LineRealizer {
            selector,
            meter: MeterEngine::new(store, config),
            sound: SoundEngine::new(store, config),
            meter_weight: weights.get(ConstraintKind::Meter),
            rhyme_weight: weights.get(ConstraintKind::Rhyme),
            syllable_weight: config.syllable_score_weight,
            syllable_window: config.syllable_score_window.max(1.0),
            retries: config.realize_retries.max(1),
            early_stop: config.realize_early_stop,
        }
    }

    pub fn selector(&self) -> &WordSelector<'a> {
        &self.selector
    }

    /// Realize one line, keeping the best candidate over the retry budget.
    ///
    /// On success the line's end word is recorded in `anchors`. A line for
    /// which no candidate can be built comes back as a placeholder.
    pub fn realize_line(
        &mut self,
        line: &LineScaffold,
        group_len: usize,
        anchors: &mut RhymeAnchors,
        rng: &mut RunRng,
    ) -> RealizedLine {
        let symbol = line.base_rhyme_symbol();
        let anchor = symbol.and_then(|s| anchors.get(s)).map(str::to_string);

        let mut best: Option<(Candidate, f64)> = None;
        for attempt in 0..self.retries {
            let Some(candidate) = self.build_candidate(line, group_len, anchors, rng) else {
                debug!(line = line.line_number, attempt, "no candidate");
                continue;
            };
            let score = self.score_candidate(&candidate.text, line, anchor.as_deref());
            if best.as_ref().is_none_or(|(_, s)| score > *s) {
                best = Some((candidate, score));
            }
            if score > self.early_stop {
                break;
            }
        }

        let Some((candidate, score)) = best else {
            warn!(line = line.line_number, "line realization failed, using placeholder");
            return RealizedLine {
                line_number: line.line_number,
                text: placeholder_text(line.line_number),
                score: 0.0,
                is_placeholder: true,
            };
        };
        if let (Some(symbol), Some(word)) = (symbol, candidate.end_word.as_deref()) {
            anchors.record(symbol, word);
        }
        debug!(line = line.line_number, score, text = %candidate.text, "line realized");
        RealizedLine {
            line_number: line.line_number,
            text: candidate.text,
            score,
            is_placeholder: false,
        }
    }

    /// Realize every line of `scaffold` in order. Refrain repetitions copy
    /// their source line, and every refrain line gets its `refrain_text`.
    pub fn realize_poem(
        &mut self,
        scaffold: &mut PoemScaffold,
        anchors: &mut RhymeAnchors,
        rng: &mut RunRng,
    ) -> Vec<RealizedLine> {
        let lines: Vec<LineScaffold> = scaffold.lines().cloned().collect();
        let mut realized: Vec<RealizedLine> = Vec::with_capacity(lines.len());
        for line in &lines {
            let copy = line
                .refrain_source
                .and_then(|source| realized.iter().find(|r| r.line_number == source))
                .cloned();
            let out = match copy {
                Some(source) => RealizedLine {
                    line_number: line.line_number,
                    ..source
                },
                None => {
                    let group_len = line
                        .base_rhyme_symbol()
                        .map_or(1, |s| generated_group_len(scaffold, s));
                    self.realize_line(line, group_len, anchors, rng)
                }
            };
            if line.is_refrain && !out.is_placeholder {
                if let Some(target) = scaffold.line_mut(line.line_number) {
                    target.refrain_text = Some(out.text.clone());
                }
            }
            realized.push(out);
        }

        info!(
            lines = realized.len(),
            placeholders = realized.iter().filter(|r| r.is_placeholder).count(),
            anchors = anchors.len(),
            "poem realized"
        );
        realized
    }

    fn build_candidate(
        &mut self,
        line: &LineScaffold,
        group_len: usize,
        anchors: &RhymeAnchors,
        rng: &mut RunRng,
    ) -> Option<Candidate> {
        let template = line.syntactic_template.as_ref()?;
        let (last, head) = template.slots.split_last()?;
        let mut remaining = line.target_syllables;
        let mut exclude: Vec<String> = Vec::new();

        let end_word = match line.base_rhyme_symbol() {
            Some(symbol) => {
                let record = self
                    .selector
                    .select_rhyme_word(last.pos, symbol, group_len, anchors, &[], rng)?;
                remaining = remaining.saturating_sub(record.syllables as usize);
                exclude.push(record.lemma.clone());
                Some(record.lemma.clone())
            }
            None => None,
        };
        let body = if end_word.is_some() { head } else { template.slots.as_slice() };

        let mut words: Vec<String> = Vec::with_capacity(template.slots.len());
        for (i, slot) in body.iter().enumerate() {
            let required_after = body[i + 1..].iter().filter(|s| s.required).count();
            if !slot.required && remaining <= required_after {
                continue;
            }
            let slots_left = (body.len() - i) as f64;
            let quota = ((remaining as f64 / slots_left).round() as u32).max(1);
            match self.selector.select_word(slot.pos, quota, &exclude, rng) {
                Some(record) => {
                    remaining = remaining.saturating_sub(record.syllables as usize);
                    exclude.push(record.lemma.clone());
                    words.push(record.lemma.clone());
                }
                None if slot.required => return None,
                None => {}
            }
        }
        if let Some(word) = &end_word {
            words.push(word.clone());
        }
        if words.is_empty() {
            return None;
        }
        Some(Candidate {
            text: compose_line(&words),
            end_word,
        })
    }

    /// Weighted blend of meter fit, syllable closeness, and rhyme against
    /// the group anchor. Meter counts only for catalog meters and rhyme
    /// only once the group has an anchor.
    /// Blend of meter, syllable closeness, and rhyme against the anchor.
    ///
    /// The meter term only counts for catalog meters. Syllabic or custom
    /// meters have no stress pattern to deviate from, so their lines are
    /// ranked on syllables and rhyme alone instead of receiving a free
    /// perfect meter score.
    fn score_candidate(&self, text: &str, line: &LineScaffold, anchor: Option<&str>) -> f64 {
        let mut total = 0.0;
        let mut weight = 0.0;

        if self.meter_weight > 0.0 && self.meter.pattern(&line.meter_pattern).is_some() {
            let analysis = self.meter.analyze_line(text, &line.meter_pattern);
            total += self.meter_weight * (1.0 - analysis.stress_deviation);
            weight += self.meter_weight;
        }

        let (syllables, _) = self.meter.measure(text);
        let deviation = syllables.abs_diff(line.target_syllables) as f64;
        total += self.syllable_weight * (1.0 - deviation / self.syllable_window).max(0.0);
        weight += self.syllable_weight;

        if let Some(anchor) = anchor.filter(|_| self.rhyme_weight > 0.0) {
            let last = tokenize(text).pop().unwrap_or_default();
            let similarity = self
                .sound
                .check_rhyme(&last, anchor)
                .map_or(0.0, |m| m.similarity);
            total += self.rhyme_weight * similarity;
            weight += self.rhyme_weight;
        }

        if weight > 0.0 { total / weight } else { 0.0 }
    }
}

/// Lines of a rhyme group that are generated rather than copied.
fn generated_group_len(scaffold: &PoemScaffold, symbol: &str) -> usize {
    scaffold.rhyme_groups.get(symbol).map_or(1, |lines| {
        lines
            .iter()
            .filter(|&&n| scaffold.line(n).is_some_and(|l| !l.is_refrain_repetition()))
            .count()
            .max(1)
    })
}
