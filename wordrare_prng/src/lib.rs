// Deterministic, run-scoped pseudo-random number generator.
//
// Implements xoshiro256++ (Blackman & Vigna, 2019) with SplitMix64 seeding,
// hand-rolled so that output is identical on every platform and compiler.
//
// Every generation run owns exactly one `RunRng`. It drives template
// choice in the scaffolder, temperature sampling in the word selector, and
// the run id. Nothing in the workspace touches OS entropy or a global
// generator: a caller that wants reproducible poems passes a seed, and two
// runs with the same seed, request, and lexicon snapshot produce the same
// poem.
//
// **Critical constraint: determinism.** Callers must draw from the
// generator in a fixed order. Float helpers (`next_f64`, `weighted_index`)
// derive from the integer stream and add no hidden state.

use serde::{Deserialize, Serialize};

/// Xoshiro256++ PRNG scoped to a single generation run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunRng {
    s: [u64; 4],
}

impl RunRng {
    /// Create a generator from a `u64` seed.
    ///
    /// SplitMix64 expands the seed into the 256-bit state, so nearby seeds
    /// still produce unrelated streams.
    pub fn new(seed: u64) -> Self {
        let mut sm = seed;
        Self {
            s: [
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
                splitmix64(&mut sm),
            ],
        }
    }

    /// Generate the next `u64` in the sequence.
    pub fn next_u64(&mut self) -> u64 {
        let result = (self.s[0].wrapping_add(self.s[3]))
            .rotate_left(23)
            .wrapping_add(self.s[0]);

        let t = self.s[1] << 17;

        self.s[2] ^= self.s[0];
        self.s[3] ^= self.s[1];
        self.s[1] ^= self.s[2];
        self.s[0] ^= self.s[3];

        self.s[2] ^= t;
        self.s[3] = self.s[3].rotate_left(45);

        result
    }

    /// Generate a uniform `f64` in [0, 1) from the upper 53 bits.
    pub fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Generate a uniform random integer in `[low, high)`.
    ///
    /// Rejection sampling avoids modulo bias. Panics if `low >= high`.
    pub fn range_u64(&mut self, low: u64, high: u64) -> u64 {
        assert!(low < high, "range_u64: low must be less than high");
        let range = high - low;
        if range.is_power_of_two() {
            return low + (self.next_u64() & (range - 1));
        }
        let threshold = range.wrapping_neg() % range;
        loop {
            let r = self.next_u64();
            if r >= threshold {
                return low + (r % range);
            }
        }
    }

    /// Generate a uniform random `usize` in `[low, high)`.
    pub fn range_usize(&mut self, low: usize, high: usize) -> usize {
        self.range_u64(low as u64, high as u64) as usize
    }

    /// Return `true` with probability `p`.
    pub fn random_bool(&mut self, p: f64) -> bool {
        self.next_f64() < p
    }

    /// Pick a uniformly random element, or `None` for an empty slice.
    pub fn choose<'a, T>(&mut self, items: &'a [T]) -> Option<&'a T> {
        if items.is_empty() {
            return None;
        }
        let idx = self.range_usize(0, items.len());
        items.get(idx)
    }

    /// Pick an index with probability proportional to `weights[i]`.
    ///
    /// Negative and non-finite weights count as zero. Returns `None` when
    /// the slice is empty or every weight is zero.
    pub fn weighted_index(&mut self, weights: &[f64]) -> Option<usize> {
        let clean = |w: f64| if w.is_finite() && w > 0.0 { w } else { 0.0 };
        let total: f64 = weights.iter().map(|&w| clean(w)).sum();
        if total <= 0.0 {
            return None;
        }
        let r = self.next_f64() * total;
        let mut cum = 0.0;
        let mut last_positive = None;
        for (i, &w) in weights.iter().enumerate() {
            let w = clean(w);
            if w == 0.0 {
                continue;
            }
            cum += w;
            last_positive = Some(i);
            if cum > r {
                return Some(i);
            }
        }
        // Rounding can leave r == total; fall back to the last live entry.
        last_positive
    }

    /// Short lowercase hex identifier (used for run ids).
    pub fn hex_id(&mut self, len: usize) -> String {
        let mut out = String::with_capacity(len);
        while out.len() < len {
            let word = self.next_u64();
            out.push_str(&format!("{word:016x}"));
        }
        out.truncate(len);
        out
    }
}

/// SplitMix64, used only to expand a `u64` seed into xoshiro state.
fn splitmix64(state: &mut u64) -> u64 {
    *state = state.wrapping_add(0x9e37_79b9_7f4a_7c15);
    let mut z = *state;
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_stream() {
        let mut a = RunRng::new(42);
        let mut b = RunRng::new(42);
        for _ in 0..1000 {
            assert_eq!(a.next_u64(), b.next_u64());
        }
    }

    #[test]
    fn test_different_seeds_diverge() {
        let mut a = RunRng::new(42);
        let mut b = RunRng::new(43);
        assert_ne!(a.next_u64(), b.next_u64());
    }

    #[test]
    fn test_f64_in_unit_range() {
        let mut rng = RunRng::new(12345);
        for _ in 0..10_000 {
            let v = rng.next_f64();
            assert!((0.0..1.0).contains(&v), "f64 out of range: {v}");
        }
    }

    #[test]
    fn test_range_usize_within_bounds() {
        let mut rng = RunRng::new(555);
        for _ in 0..10_000 {
            let v = rng.range_usize(5, 15);
            assert!((5..15).contains(&v), "range_usize out of range: {v}");
        }
    }

    #[test]
    fn test_choose_empty_is_none() {
        let mut rng = RunRng::new(1);
        let empty: [u8; 0] = [];
        assert!(rng.choose(&empty).is_none());
        assert_eq!(rng.choose(&[7]), Some(&7));
    }

    #[test]
    fn test_weighted_index_skips_zero_weights() {
        let mut rng = RunRng::new(9);
        for _ in 0..1000 {
            let idx = rng.weighted_index(&[0.0, 1.0, 0.0, 2.0]).unwrap();
            assert!(idx == 1 || idx == 3, "picked zero-weight index {idx}");
        }
        assert_eq!(rng.weighted_index(&[0.0, -1.0]), None);
        assert_eq!(rng.weighted_index(&[]), None);
    }

    #[test]
    fn test_weighted_index_follows_weights() {
        let mut rng = RunRng::new(2024);
        let mut counts = [0usize; 2];
        for _ in 0..10_000 {
            counts[rng.weighted_index(&[1.0, 3.0]).unwrap()] += 1;
        }
        let share = counts[1] as f64 / 10_000.0;
        assert!(
            (0.70..0.80).contains(&share),
            "heavy index should win ~75%, got {:.1}%",
            share * 100.0
        );
    }

    #[test]
    fn test_hex_id_length() {
        let mut rng = RunRng::new(3);
        let id = rng.hex_id(8);
        assert_eq!(id.len(), 8);
        assert!(id.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_serialization_roundtrip_continues_stream() {
        let mut rng = RunRng::new(42);
        for _ in 0..100 {
            rng.next_u64();
        }
        let json = serde_json::to_string(&rng).unwrap();
        let mut restored: RunRng = serde_json::from_str(&json).unwrap();
        for _ in 0..100 {
            assert_eq!(rng.next_u64(), restored.next_u64());
        }
    }
}
