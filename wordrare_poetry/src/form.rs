// Poetic form specifications and the form library.
//
// A `FormSpec` describes a form's skeleton: stanzas with per-line rhyme
// symbols (or `null` for unrhymed lines), a meter per stanza, and special
// rules (a per-line syllable override list for syllabic forms like the
// haiku, and refrain rules for the villanelle). Forms are plain JSON files;
// six are embedded at compile time (`data/forms/`), and more can be loaded
// from a directory or built programmatically with `create_form_spec`.
//
// Forms are immutable once loaded. The library hands out `Arc<FormSpec>`
// so one instance is shared read-only by every run using that form.
//
// Every form is validated on insertion: stanza line counts must sum to
// `total_lines`, each stanza's rhyme pattern must have one entry per line,
// and refrain line numbers must fall inside the poem.

use crate::error::{PoetryError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StanzaSpec {
    pub stanza_id: u32,
    pub lines: usize,
    /// One entry per line; `None` for an unrhymed line.
    pub rhyme_pattern: Vec<Option<String>>,
    /// Empty means "use the form's meter".
    #[serde(default)]
    pub meter_pattern: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefrainSpec {
    /// The line whose text the refrain repeats (1-indexed).
    pub line_number: usize,
    /// Lines that repeat it.
    pub repetitions: Vec<usize>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpecialRules {
    /// Per-line syllable targets, overriding the meter, indexed by line.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub syllable_pattern: Option<Vec<usize>>,
    /// Refrain id (e.g. "A1") to refrain rule.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub refrains: BTreeMap<String, RefrainSpec>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormSpec {
    pub form_id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub total_lines: usize,
    pub stanza_specs: Vec<StanzaSpec>,
    /// Display form of the rhyme scheme, e.g. "ABAB CDCD EFEF GG".
    #[serde(default)]
    pub rhyme_pattern: String,
    pub meter_pattern: String,
    #[serde(default)]
    pub special_rules: SpecialRules,
    #[serde(default)]
    pub device_profile_defaults: BTreeMap<String, f64>,
}

impl FormSpec {
    /// Check structural consistency.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason: String| PoetryError::InvalidForm {
            form_id: self.form_id.clone(),
            reason,
        };
        if self.stanza_specs.is_empty() {
            return Err(invalid("form has no stanzas".to_string()));
        }
        let sum: usize = self.stanza_specs.iter().map(|s| s.lines).sum();
        if sum != self.total_lines {
            return Err(invalid(format!(
                "stanza lines sum to {sum}, total_lines is {}",
                self.total_lines
            )));
        }
        for stanza in &self.stanza_specs {
            if stanza.rhyme_pattern.len() != stanza.lines {
                return Err(invalid(format!(
                    "stanza {} has {} lines but {} rhyme symbols",
                    stanza.stanza_id,
                    stanza.lines,
                    stanza.rhyme_pattern.len()
                )));
            }
        }
        for (id, refrain) in &self.special_rules.refrains {
            let in_range = |n: &usize| (1..=self.total_lines).contains(n);
            if !in_range(&refrain.line_number) || !refrain.repetitions.iter().all(in_range) {
                return Err(invalid(format!("refrain {id} refers to a line outside the poem")));
            }
        }
        Ok(())
    }

    /// Meter of a stanza, falling back to the form's meter.
    pub fn stanza_meter<'s>(&'s self, stanza: &'s StanzaSpec) -> &'s str {
        if stanza.meter_pattern.is_empty() {
            &self.meter_pattern
        } else {
            &stanza.meter_pattern
        }
    }

    /// Rhyme symbol of a 1-indexed line, `None` if unrhymed or out of range.
    pub fn line_rhyme_symbol(&self, line_number: usize) -> Option<&str> {
        if line_number == 0 {
            return None;
        }
        self.stanza_specs
            .iter()
            .flat_map(|s| s.rhyme_pattern.iter())
            .nth(line_number - 1)
            .and_then(|s| s.as_deref())
    }

    /// 1-indexed lines whose rhyme symbol is exactly `symbol`.
    pub fn lines_with_rhyme_symbol(&self, symbol: &str) -> Vec<usize> {
        self.stanza_specs
            .iter()
            .flat_map(|s| s.rhyme_pattern.iter())
            .enumerate()
            .filter(|(_, s)| s.as_deref() == Some(symbol))
            .map(|(i, _)| i + 1)
            .collect()
    }
}

const BUILTIN_FORMS: [&str; 6] = [
    include_str!("../../data/forms/haiku.json"),
    include_str!("../../data/forms/shakespearean_sonnet.json"),
    include_str!("../../data/forms/petrarchan_sonnet.json"),
    include_str!("../../data/forms/villanelle.json"),
    include_str!("../../data/forms/limerick.json"),
    include_str!("../../data/forms/terza_rima.json"),
];

/// Cache of validated forms keyed by `form_id`.
#[derive(Debug, Clone, Default)]
pub struct FormLibrary {
    forms: BTreeMap<String, Arc<FormSpec>>,
}

impl FormLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    /// Library holding the embedded forms.
    pub fn builtin() -> Self {
        let mut library = Self::new();
        for json in BUILTIN_FORMS {
            library
                .insert_json(json)
                .expect("embedded form JSON should be valid");
        }
        library
    }

    /// The embedded forms plus every `*.json` file in `dir`, in file name
    /// order. A file whose `form_id` matches a built-in replaces it.
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut library = Self::builtin();
        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|e| e == "json") {
                paths.push(path);
            }
        }
        paths.sort();
        for path in &paths {
            let form = library.insert_json(&std::fs::read_to_string(path)?)?;
            debug!(form = %form.form_id, path = %path.display(), "loaded form");
        }
        info!(count = library.forms.len(), dir = %dir.display(), "form library loaded");
        Ok(library)
    }

    /// Parse, validate, and cache one form.
    pub fn insert_json(&mut self, json: &str) -> Result<Arc<FormSpec>> {
        let form: FormSpec = serde_json::from_str(json)?;
        self.insert(form)
    }

    pub fn insert(&mut self, form: FormSpec) -> Result<Arc<FormSpec>> {
        form.validate()?;
        let form = Arc::new(form);
        self.forms.insert(form.form_id.clone(), Arc::clone(&form));
        Ok(form)
    }

    pub fn get_form(&self, form_id: &str) -> Result<Arc<FormSpec>> {
        self.forms
            .get(form_id)
            .cloned()
            .ok_or_else(|| PoetryError::UnknownForm(form_id.to_string()))
    }

    pub fn contains(&self, form_id: &str) -> bool {
        self.forms.contains_key(form_id)
    }

    /// Known form ids, sorted.
    pub fn list_forms(&self) -> Vec<&str> {
        self.forms.keys().map(String::as_str).collect()
    }

    /// Build and cache a form from its stanzas. `total_lines` and the
    /// display rhyme pattern are derived; stanzas without a meter take
    /// `meter_pattern`.
    #[allow(clippy::too_many_arguments)]
    pub fn create_form_spec(
        &mut self,
        form_id: &str,
        name: &str,
        description: &str,
        mut stanza_specs: Vec<StanzaSpec>,
        meter_pattern: &str,
        special_rules: SpecialRules,
        device_profile_defaults: BTreeMap<String, f64>,
    ) -> Result<Arc<FormSpec>> {
        for stanza in &mut stanza_specs {
            if stanza.meter_pattern.is_empty() {
                stanza.meter_pattern = meter_pattern.to_string();
            }
        }
        let rhyme_pattern = stanza_specs
            .iter()
            .flat_map(|s| s.rhyme_pattern.iter())
            .map(|s| s.as_deref().unwrap_or("_"))
            .collect::<Vec<_>>()
            .join(" ");
        let form = FormSpec {
            form_id: form_id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            total_lines: stanza_specs.iter().map(|s| s.lines).sum(),
            stanza_specs,
            rhyme_pattern,
            meter_pattern: meter_pattern.to_string(),
            special_rules,
            device_profile_defaults,
        };
        self.insert(form)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stanza(id: u32, symbols: &[Option<&str>]) -> StanzaSpec {
        StanzaSpec {
            stanza_id: id,
            lines: symbols.len(),
            rhyme_pattern: symbols.iter().map(|s| s.map(str::to_string)).collect(),
            meter_pattern: String::new(),
        }
    }

    #[test]
    fn test_builtin_forms_load() {
        let library = FormLibrary::builtin();
        assert_eq!(
            library.list_forms(),
            vec![
                "haiku",
                "limerick",
                "petrarchan_sonnet",
                "shakespearean_sonnet",
                "terza_rima",
                "villanelle"
            ]
        );
        let haiku = library.get_form("haiku").unwrap();
        assert_eq!(haiku.total_lines, 3);
        assert_eq!(haiku.special_rules.syllable_pattern, Some(vec![5, 7, 5]));
        let villanelle = library.get_form("villanelle").unwrap();
        assert_eq!(villanelle.total_lines, 19);
        assert_eq!(villanelle.special_rules.refrains["A1"].repetitions, vec![6, 12, 18]);
    }

    #[test]
    fn test_get_form_shares_instance() {
        let library = FormLibrary::builtin();
        let a = library.get_form("shakespearean_sonnet").unwrap();
        let b = library.get_form("shakespearean_sonnet").unwrap();
        assert!(Arc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_unknown_form() {
        let library = FormLibrary::builtin();
        let err = library.get_form("sestina").unwrap_err();
        assert!(matches!(err, PoetryError::UnknownForm(ref id) if id == "sestina"));
    }

    #[test]
    fn test_rhyme_symbol_lookup() {
        let library = FormLibrary::builtin();
        let sonnet = library.get_form("shakespearean_sonnet").unwrap();
        assert_eq!(sonnet.line_rhyme_symbol(1), Some("A"));
        assert_eq!(sonnet.line_rhyme_symbol(14), Some("G"));
        assert_eq!(sonnet.line_rhyme_symbol(0), None);
        assert_eq!(sonnet.line_rhyme_symbol(15), None);
        assert_eq!(sonnet.lines_with_rhyme_symbol("B"), vec![2, 4]);

        let haiku = library.get_form("haiku").unwrap();
        assert_eq!(haiku.line_rhyme_symbol(2), None);

        let villanelle = library.get_form("villanelle").unwrap();
        assert_eq!(villanelle.lines_with_rhyme_symbol("A1"), vec![1, 6, 12, 18]);
    }

    #[test]
    fn test_mismatched_total_lines_rejected() {
        let json = r#"{
            "form_id": "broken", "name": "Broken", "total_lines": 5,
            "stanza_specs": [{"stanza_id": 1, "lines": 4,
                              "rhyme_pattern": ["A", "B", "A", "B"],
                              "meter_pattern": "iambic_pentameter"}],
            "meter_pattern": "iambic_pentameter"
        }"#;
        let mut library = FormLibrary::new();
        let err = library.insert_json(json).unwrap_err();
        assert!(matches!(err, PoetryError::InvalidForm { .. }));
        assert!(!library.contains("broken"));
    }

    #[test]
    fn test_rhyme_pattern_length_rejected() {
        let mut library = FormLibrary::new();
        let mut bad = stanza(1, &[Some("A"), Some("A")]);
        bad.lines = 3;
        let err = library
            .create_form_spec(
                "bad",
                "Bad",
                "",
                vec![bad],
                "iambic_pentameter",
                SpecialRules::default(),
                BTreeMap::new(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("rhyme symbols"));
    }

    #[test]
    fn test_refrain_out_of_range_rejected() {
        let mut library = FormLibrary::new();
        let mut rules = SpecialRules::default();
        rules.refrains.insert(
            "A1".into(),
            RefrainSpec {
                line_number: 1,
                repetitions: vec![9],
            },
        );
        let result = library.create_form_spec(
            "short",
            "Short",
            "",
            vec![stanza(1, &[Some("A1"), Some("B"), Some("A1")])],
            "iambic_tetrameter",
            rules,
            BTreeMap::new(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_create_form_spec_derives_fields() {
        let mut library = FormLibrary::new();
        let form = library
            .create_form_spec(
                "couplets",
                "Couplets",
                "Two rhymed couplets.",
                vec![
                    stanza(1, &[Some("A"), Some("A")]),
                    stanza(2, &[Some("B"), None]),
                ],
                "iambic_tetrameter",
                SpecialRules::default(),
                BTreeMap::new(),
            )
            .unwrap();
        assert_eq!(form.total_lines, 4);
        assert_eq!(form.rhyme_pattern, "A A B _");
        assert_eq!(form.stanza_specs[1].meter_pattern, "iambic_tetrameter");
        assert!(library.get_form("couplets").is_ok());
    }

    #[test]
    fn test_from_dir_overrides_builtin() {
        let dir = std::env::temp_dir().join(format!("wordrare_forms_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("haiku.json"),
            r#"{"form_id": "haiku", "name": "Long Haiku", "total_lines": 3,
                "stanza_specs": [{"stanza_id": 1, "lines": 3,
                                  "rhyme_pattern": [null, null, null]}],
                "meter_pattern": "syllabic",
                "special_rules": {"syllable_pattern": [6, 8, 6]}}"#,
        )
        .unwrap();
        std::fs::write(dir.join("notes.txt"), "ignored").unwrap();

        let library = FormLibrary::from_dir(&dir).unwrap();
        let haiku = library.get_form("haiku").unwrap();
        assert_eq!(haiku.name, "Long Haiku");
        assert_eq!(haiku.stanza_meter(&haiku.stanza_specs[0]), "syllabic");
        assert!(library.contains("villanelle"));

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
