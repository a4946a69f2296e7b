// ARPAbet phone helpers.
//
// Pronunciations are stored as space-separated ARPAbet phones, with a
// stress digit (0 = unstressed, 1 = primary, 2 = secondary) on every vowel
// phone, e.g. `"K AH0 M P EH1 R"` for "compare". These helpers derive the
// two things the generator actually consumes from a pronunciation:
//
// - a binary stress string, one digit per vowel (`1` for primary or
//   secondary stress, `0` otherwise)
// - a rhyme key: the phones from the last stressed vowel to the end of the
//   word, stress digits stripped, falling back to the last vowel when the
//   word carries no stress marks
//
// plus onset/nucleus/coda splits used for alliteration, assonance, and
// consonance checks.

/// The fifteen ARPAbet vowel phonemes, without stress digits.
const VOWELS: [&str; 15] = [
    "AA", "AE", "AH", "AO", "AW", "AY", "EH", "ER", "EY", "IH", "IY", "OW", "OY", "UH", "UW",
];

/// Remove a trailing stress digit from a phone (`"EY1"` -> `"EY"`).
pub fn strip_stress(phone: &str) -> &str {
    phone.trim_end_matches(['0', '1', '2'])
}

/// Whether `phone` (with or without a stress digit) is a vowel.
pub fn is_vowel_phone(phone: &str) -> bool {
    VOWELS.contains(&strip_stress(phone))
}

/// Stress digit of a vowel phone, or `None` for consonants and unmarked
/// vowels.
fn stress_digit(phone: &str) -> Option<char> {
    phone.chars().last().filter(|c| matches!(c, '0' | '1' | '2'))
}

fn is_stressed(phone: &str) -> bool {
    matches!(stress_digit(phone), Some('1' | '2'))
}

/// Binary stress string for a phone sequence.
pub fn stress_pattern(phones: &[&str]) -> String {
    phones
        .iter()
        .filter(|p| is_vowel_phone(p))
        .map(|p| if is_stressed(p) { '1' } else { '0' })
        .collect()
}

/// Rhyme key for a phone sequence, or an empty string if there is no vowel.
pub fn rhyme_key(phones: &[&str]) -> String {
    let start = phones
        .iter()
        .rposition(|p| is_vowel_phone(p) && is_stressed(p))
        .or_else(|| phones.iter().rposition(|p| is_vowel_phone(p)));
    match start {
        Some(i) => phones[i..]
            .iter()
            .map(|p| strip_stress(p))
            .collect::<Vec<_>>()
            .join(" "),
        None => String::new(),
    }
}

/// Consonants before the first vowel.
pub fn onset<'a>(phones: &[&'a str]) -> Vec<&'a str> {
    phones
        .iter()
        .take_while(|p| !is_vowel_phone(p))
        .copied()
        .collect()
}

/// Vowel phones, stress digits stripped.
pub fn nucleus<'a>(phones: &[&'a str]) -> Vec<&'a str> {
    phones
        .iter()
        .copied()
        .filter(|p| is_vowel_phone(p))
        .map(strip_stress)
        .collect()
}

/// Consonants after the last vowel.
pub fn coda<'a>(phones: &[&'a str]) -> Vec<&'a str> {
    match phones.iter().rposition(|p| is_vowel_phone(p)) {
        Some(i) => phones[i + 1..].to_vec(),
        None => phones.to_vec(),
    }
}
