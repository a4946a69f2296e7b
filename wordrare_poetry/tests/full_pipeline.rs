// End-to-end tests for the generation pipeline.
//
// Runs whole requests against the embedded lexicon and built-in forms:
// line counts per form, rhyme quality across rhyme groups, refrain
// repetition, seeded determinism, and aggregated request validation.

use wordrare_lexicon::{Lexicon, default_lexicon};
use wordrare_poetry::meter::tokenize;
use wordrare_poetry::request::PRESET_NAMES;
use wordrare_poetry::sound::SoundEngine;
use wordrare_poetry::{
    FormLibrary, GeneratedPoem, GenerationRequest, GeneratorConfig, PoemGenerator, PoetryError,
};

fn generate_with(
    lexicon: &Lexicon,
    forms: &FormLibrary,
    request: &GenerationRequest,
) -> GeneratedPoem {
    PoemGenerator::new(lexicon, forms, GeneratorConfig::default())
        .generate(request, None)
        .unwrap()
}

fn generate(request: &GenerationRequest) -> GeneratedPoem {
    generate_with(&default_lexicon(), &FormLibrary::builtin(), request)
}

fn last_word(line: &str) -> String {
    tokenize(line).pop().unwrap_or_default()
}

#[test]
fn test_haiku_has_three_lines() {
    let request = GenerationRequest {
        form: "haiku".into(),
        theme: Some("nature".into()),
        seed: 3,
        ..GenerationRequest::default()
    };
    let poem = generate(&request);
    assert_eq!(poem.lines.len(), 3);
    assert_eq!(poem.placeholder_count(), 0);
    assert_eq!(poem.to_text().lines().count(), 3);
}

#[test]
fn test_sonnet_rhyme_groups_rhyme() {
    let lexicon = default_lexicon();
    let config = GeneratorConfig::default();
    let sound = SoundEngine::new(&lexicon, &config);
    let forms = FormLibrary::builtin();
    let form = forms.get_form("shakespearean_sonnet").unwrap();

    for seed in [1, 2, 3] {
        let request = GenerationRequest {
            seed,
            ..GenerationRequest::default()
        };
        let poem = generate_with(&lexicon, &forms, &request);
        assert_eq!(poem.lines.len(), 14);
        assert_eq!(poem.placeholder_count(), 0);

        for symbol in ["A", "B", "C", "D", "E", "F", "G"] {
            let lines = form.lines_with_rhyme_symbol(symbol);
            assert!(lines.len() >= 2);
            for pair in lines.windows(2) {
                let a = last_word(&poem.lines[pair[0] - 1]);
                let b = last_word(&poem.lines[pair[1] - 1]);
                let m = sound.check_rhyme(&a, &b);
                assert!(
                    m.is_some_and(|m| m.similarity >= config.slant_rhyme_threshold),
                    "seed {seed}: '{a}' / '{b}' in group {symbol}"
                );
            }
        }
    }
}

#[test]
fn test_villanelle_refrains_repeat() {
    let request = GenerationRequest::mysterious_archaic();
    let poem = generate(&request);
    assert_eq!(poem.lines.len(), 19);
    for n in [6, 12, 18] {
        assert_eq!(poem.lines[n - 1], poem.lines[0], "line {n}");
    }
    for n in [9, 15, 19] {
        assert_eq!(poem.lines[n - 1], poem.lines[2], "line {n}");
    }
    let refrains = poem.line_reports.iter().filter(|r| r.is_refrain).count();
    assert_eq!(refrains, 8);
}

#[test]
fn test_seeded_runs_are_deterministic() {
    let lexicon = default_lexicon();
    let forms = FormLibrary::builtin();
    for temperature in [0.0, 0.7] {
        let request = GenerationRequest {
            form: "terza_rima".into(),
            theme: Some("sea".into()),
            temperature,
            seed: 42,
            ..GenerationRequest::default()
        };
        let first = generate_with(&lexicon, &forms, &request);
        let second = generate_with(&lexicon, &forms, &request);
        assert_eq!(first, second, "temperature {temperature}");
    }
}

#[test]
fn test_seed_changes_run_id() {
    let a = generate(&GenerationRequest {
        form: "haiku".into(),
        seed: 1,
        ..GenerationRequest::default()
    });
    let b = generate(&GenerationRequest {
        form: "haiku".into(),
        seed: 2,
        ..GenerationRequest::default()
    });
    assert_ne!(a.run_id, b.run_id);
}

#[test]
fn test_presets_generate() {
    for name in PRESET_NAMES {
        let request = GenerationRequest::preset(name).unwrap();
        let poem = generate(&request);
        assert_eq!(poem.form_id, request.form, "{name}");
        assert_eq!(poem.placeholder_count(), 0, "{name}");
        assert!(poem.line_reports.iter().all(|r| (0.0..=1.0).contains(&r.utility)));
    }
}

#[test]
fn test_validation_reports_every_violation() {
    let request = GenerationRequest {
        form: "ghazal".into(),
        rarity_bias: 1.5,
        motif_density: -0.1,
        max_iterations: 0,
        ..GenerationRequest::default()
    };
    let lexicon = default_lexicon();
    let forms = FormLibrary::builtin();
    let err = PoemGenerator::new(&lexicon, &forms, GeneratorConfig::default())
        .generate(&request, None)
        .unwrap_err();
    let PoetryError::InvalidRequest { violations } = err else {
        panic!("expected InvalidRequest, got {err:?}");
    };
    assert_eq!(violations.len(), 4, "{violations:?}");
}

#[test]
fn test_custom_form() {
    let mut forms = FormLibrary::builtin();
    forms
        .insert_json(
            r#"{
                "form_id": "couplet",
                "name": "Couplet",
                "total_lines": 2,
                "stanza_specs": [
                    {"stanza_id": 1, "lines": 2, "rhyme_pattern": ["A", "A"],
                     "meter_pattern": "iambic_tetrameter"}
                ],
                "rhyme_pattern": "AA",
                "meter_pattern": "iambic_tetrameter"
            }"#,
        )
        .unwrap();
    let lexicon = default_lexicon();
    let request = GenerationRequest {
        form: "couplet".into(),
        seed: 5,
        ..GenerationRequest::default()
    };
    let poem = generate_with(&lexicon, &forms, &request);
    assert_eq!(poem.lines.len(), 2);
    assert_eq!(poem.rhyme_anchors.len(), 1);
    let json = serde_json::to_value(&poem).unwrap();
    assert_eq!(json["form_id"], "couplet");
}
