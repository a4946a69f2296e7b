// WordRare Poem Generator
//
// Generates poems that satisfy a bundle of formal constraints (meter, rhyme,
// rarity, theme and affect alignment) by scaffolding a structural skeleton
// from a named poetic form, filling each line with constrained word choices,
// and iteratively repairing lines that violate constraints. Lexical data is
// read through the `WordStore` trait from the `wordrare_lexicon` crate.
//
// Architecture:
// - config.rs: `GeneratorConfig`, the tunable thresholds and budgets
// - error.rs: `PoetryError` and the crate `Result`
// - meter.rs: meter catalog, stress analysis, syllable estimation
// - sound.rs: rhyme keys, rhyme classification, sound devices
// - grammar.rs: part-of-speech line templates
// - form.rs: `FormSpec` and the `FormLibrary` cache (built-in JSON forms)
// - scaffold.rs: per-line targets, rhyme groups, refrains
// - request.rs: `GenerationRequest`, presets, aggregated validation
// - constraint.rs: constraint tiers, weights, line evaluation, utility
// - semantic.rs: cosine similarity and the theme centroid
// - policy.rs: steering policies for repair
// - repair.rs: conflict detection, strategy table, iterative repair
// - realize.rs: rhyme anchors, word selection, line realization
// - generator.rs: the end-to-end pipeline and `GeneratedPoem`
//
// Generation is single-threaded per run and deterministic given the
// request's seed: all randomness comes from one `RunRng` owned by the run.

pub mod config;
pub mod constraint;
pub mod error;
pub mod form;
pub mod generator;
pub mod grammar;
pub mod meter;
pub mod policy;
pub mod realize;
pub mod repair;
pub mod request;
pub mod scaffold;
pub mod semantic;
pub mod sound;

pub use config::GeneratorConfig;
pub use error::{PoetryError, Result};
pub use form::{FormLibrary, FormSpec};
pub use generator::{GeneratedPoem, LineReport, PoemGenerator};
pub use request::{GenerationRequest, PolicyPreset};
