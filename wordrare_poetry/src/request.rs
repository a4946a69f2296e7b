// Generation requests: the per-run knobs a caller supplies.
//
// A `GenerationRequest` names the form, an optional theme and affect, the
// rarity band and bias for word choice, motif density, sampling temperature,
// constraint weights, the repair budget, and the run seed. Requests are
// serde types so they can be supplied as JSON; absent fields take the
// defaults of `GenerationRequest::default()`.
//
// `validate` checks every rule and reports all violations at once as a
// single `PoetryError::InvalidRequest`, before any generation work starts.
// An unknown form is one of those violations.

use crate::constraint::{ConstraintKind, ConstraintWeights, default_weight_table};
use crate::error::{PoetryError, Result};
use crate::form::FormLibrary;
use crate::policy::SteeringPolicy;
use crate::scaffold::TemplateStrategy;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// Tolerance on the sum of constraint weights.
const WEIGHT_SUM_TOLERANCE: f64 = 0.01;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PolicyPreset {
    Strict,
    #[default]
    Loose,
    Free,
}

impl PolicyPreset {
    pub fn policy(self) -> SteeringPolicy {
        match self {
            PolicyPreset::Strict => SteeringPolicy::strict_sonnet(),
            PolicyPreset::Loose => SteeringPolicy::loose_tercet(),
            PolicyPreset::Free => SteeringPolicy::free_verse(),
        }
    }
}

impl fmt::Display for PolicyPreset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PolicyPreset::Strict => "strict",
            PolicyPreset::Loose => "loose",
            PolicyPreset::Free => "free",
        })
    }
}

impl FromStr for PolicyPreset {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strict" => Ok(PolicyPreset::Strict),
            "loose" => Ok(PolicyPreset::Loose),
            "free" => Ok(PolicyPreset::Free),
            _ => Err(format!("unknown policy '{s}' (expected strict, loose, or free)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationRequest {
    pub form: String,
    pub theme: Option<String>,
    pub affect_profile: Option<String>,

    /// 0 favors common words, 1 rare ones.
    pub rarity_bias: f64,
    pub min_rarity: f64,
    pub max_rarity: f64,

    /// Preferred domains for content words.
    pub domain_tags: Vec<String>,
    /// Preferred imagery for content words.
    pub imagery_tags: Vec<String>,
    /// Probability that a content slot draws from the theme palette.
    pub motif_density: f64,

    /// Constraint name -> weight. Must sum to 1.
    pub constraint_weights: BTreeMap<String, f64>,

    /// Repair rounds per line, further capped by the policy.
    pub max_iterations: usize,
    /// 0 always takes the best-ranked candidate, 1 samples uniformly.
    pub temperature: f64,
    pub seed: u64,

    pub policy: PolicyPreset,
    pub template_strategy: TemplateStrategy,
}

impl Default for GenerationRequest {
    fn default() -> Self {
        GenerationRequest {
            form: "shakespearean_sonnet".to_string(),
            theme: None,
            affect_profile: None,
            rarity_bias: 0.5,
            min_rarity: 0.3,
            max_rarity: 0.9,
            domain_tags: Vec::new(),
            imagery_tags: Vec::new(),
            motif_density: 0.3,
            constraint_weights: default_weight_table()
                .into_iter()
                .map(|(k, w)| (k.as_str().to_string(), w))
                .collect(),
            max_iterations: 10,
            temperature: 0.7,
            seed: 0,
            policy: PolicyPreset::default(),
            template_strategy: TemplateStrategy::default(),
        }
    }
}

pub const PRESET_NAMES: [&str; 3] = ["melancholic_nature", "joyful_simple", "mysterious_archaic"];

impl GenerationRequest {
    /// Defaults with a form, optional theme, and rarity bias.
    pub fn new(form: &str, theme: Option<&str>, rarity_bias: f64) -> Self {
        GenerationRequest {
            form: form.to_string(),
            theme: theme.map(str::to_string),
            rarity_bias,
            ..Self::default()
        }
    }

    pub fn melancholic_nature() -> Self {
        GenerationRequest {
            form: "shakespearean_sonnet".to_string(),
            theme: Some("nature".to_string()),
            affect_profile: Some("melancholic".to_string()),
            rarity_bias: 0.6,
            imagery_tags: vec!["tree".into(), "flower".into(), "water".into()],
            motif_density: 0.4,
            ..Self::default()
        }
    }

    /// Short, common-word haiku.
    pub fn joyful_simple() -> Self {
        GenerationRequest {
            form: "haiku".to_string(),
            theme: Some("nature".to_string()),
            affect_profile: Some("joyful".to_string()),
            rarity_bias: 0.2,
            min_rarity: 0.0,
            max_rarity: 0.5,
            imagery_tags: vec!["light".into(), "sound".into()],
            ..Self::default()
        }
    }

    pub fn mysterious_archaic() -> Self {
        GenerationRequest {
            form: "villanelle".to_string(),
            theme: Some("night".to_string()),
            affect_profile: Some("mysterious".to_string()),
            rarity_bias: 0.8,
            min_rarity: 0.6,
            motif_density: 0.5,
            ..Self::default()
        }
    }

    pub fn preset(name: &str) -> Option<Self> {
        match name {
            "melancholic_nature" => Some(Self::melancholic_nature()),
            "joyful_simple" => Some(Self::joyful_simple()),
            "mysterious_archaic" => Some(Self::mysterious_archaic()),
            _ => None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Every rule this request breaks, empty if it is valid.
    pub fn violations(&self, forms: &FormLibrary) -> Vec<String> {
        let mut errors = Vec::new();

        if !forms.contains(&self.form) {
            errors.push(format!("unknown form '{}'", self.form));
        }

        for (name, value) in [
            ("rarity_bias", self.rarity_bias),
            ("min_rarity", self.min_rarity),
            ("max_rarity", self.max_rarity),
            ("motif_density", self.motif_density),
            ("temperature", self.temperature),
        ] {
            if !(0.0..=1.0).contains(&value) {
                errors.push(format!("{name} must be within 0.0-1.0, got {value}"));
            }
        }
        if self.min_rarity > self.max_rarity {
            errors.push(format!(
                "min_rarity ({}) > max_rarity ({})",
                self.min_rarity, self.max_rarity
            ));
        }

        if let Err(unknown) = ConstraintWeights::from_named(&self.constraint_weights) {
            errors.extend(unknown);
        }
        for (name, &w) in &self.constraint_weights {
            if w.is_nan() || w < 0.0 {
                errors.push(format!("weight for {name} must be non-negative, got {w}"));
            }
        }
        let sum: f64 = self.constraint_weights.values().sum();
        if (sum - 1.0).abs() > WEIGHT_SUM_TOLERANCE {
            errors.push(format!("constraint_weights must sum to 1.0, got {sum:.3}"));
        }

        if self.max_iterations == 0 {
            errors.push("max_iterations must be positive".to_string());
        }

        errors
    }

    pub fn validate(&self, forms: &FormLibrary) -> Result<()> {
        let violations = self.violations(forms);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(PoetryError::InvalidRequest { violations })
        }
    }

    /// Typed weights. Unknown names are dropped; `validate` reports them.
    pub fn weights(&self) -> ConstraintWeights {
        let known: BTreeMap<String, f64> = self
            .constraint_weights
            .iter()
            .filter(|(name, _)| name.parse::<ConstraintKind>().is_ok())
            .map(|(n, w)| (n.clone(), *w))
            .collect();
        ConstraintWeights::from_named(&known).unwrap_or_default()
    }

    /// Repair rounds allowed per line under this request's policy.
    pub fn repair_budget(&self) -> usize {
        self.policy.policy().max_repairs.min(self.max_iterations)
    }
}
