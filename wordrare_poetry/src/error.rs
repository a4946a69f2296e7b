// Error type for the poem generator.
//
// Only caller-visible failures live here: a malformed generation request,
// an unknown or inconsistent form, and the JSON/IO errors of loading forms,
// configs, and requests from disk. Missing phonetic or semantic data and
// per-line generation failures are not errors; they resolve to neutral
// scores and placeholder lines inside the pipeline.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum PoetryError {
    /// Every violated request rule, reported together.
    #[error("invalid generation request: {}", .violations.join("; "))]
    InvalidRequest { violations: Vec<String> },

    #[error("unknown form '{0}'")]
    UnknownForm(String),

    #[error("invalid form '{form_id}': {reason}")]
    InvalidForm { form_id: String, reason: String },

    #[error("malformed JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PoetryError>;
