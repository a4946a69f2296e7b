// WordRare poem generator: CLI entry point.
//
// Builds a `GenerationRequest` from (in increasing precedence) the defaults,
// a named preset or a request JSON file, and individual flags; then runs the
// pipeline and prints the poem. `--json` prints the full `GeneratedPoem`
// with per-line reports instead of plain text.
//
// Usage:
//   cargo run -p wordrare_poetry -- --form haiku --theme sea --seed 7
//   cargo run -p wordrare_poetry -- --preset mysterious_archaic --json
//   cargo run -p wordrare_poetry -- --list-forms
//
// Logs go to stderr; set RUST_LOG (e.g. RUST_LOG=debug) for more detail.

use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use wordrare_lexicon::{Lexicon, default_lexicon};
use wordrare_poetry::request::PRESET_NAMES;
use wordrare_poetry::{
    FormLibrary, GenerationRequest, GeneratorConfig, PoemGenerator, PoetryError, PolicyPreset,
};

#[derive(Parser)]
#[command(name = "generate")]
#[command(about = "Generate a poem under meter, rhyme, and theme constraints", long_about = None)]
#[command(version)]
struct Cli {
    /// Form id (see --list-forms)
    #[arg(long)]
    form: Option<String>,

    /// Theme words; builds the semantic palette from matching domain tags
    #[arg(long)]
    theme: Option<String>,

    /// Affect profile (e.g. melancholic, joyful, mysterious)
    #[arg(long)]
    affect: Option<String>,

    /// Rarity bias, 0 = common words, 1 = rare words
    #[arg(long)]
    rarity: Option<f64>,

    #[arg(long)]
    min_rarity: Option<f64>,

    #[arg(long)]
    max_rarity: Option<f64>,

    /// Sampling temperature, 0 = always the best-ranked word
    #[arg(long)]
    temperature: Option<f64>,

    #[arg(long)]
    seed: Option<u64>,

    /// Repair policy
    #[arg(long)]
    policy: Option<PolicyPreset>,

    /// Repair rounds per line
    #[arg(long)]
    max_iterations: Option<usize>,

    /// Start from a named preset request
    #[arg(long, conflicts_with = "request")]
    preset: Option<String>,

    /// Start from a request JSON file
    #[arg(long)]
    request: Option<PathBuf>,

    /// Generator config JSON file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Lexicon JSON file (defaults to the embedded lexicon)
    #[arg(long)]
    lexicon: Option<PathBuf>,

    /// Directory of extra form JSON files
    #[arg(long)]
    forms_dir: Option<PathBuf>,

    /// List available forms and exit
    #[arg(long)]
    list_forms: bool,

    /// Print the full result as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .without_time()
                .with_writer(std::io::stderr),
        )
        .init();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(PoetryError::InvalidRequest { violations }) => {
            eprintln!("Invalid request:");
            for v in &violations {
                eprintln!("  - {v}");
            }
            ExitCode::from(2)
        }
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), PoetryError> {
    let forms = match &cli.forms_dir {
        Some(dir) => FormLibrary::from_dir(dir)?,
        None => FormLibrary::builtin(),
    };
    if cli.list_forms {
        for id in forms.list_forms() {
            let form = forms.get_form(id)?;
            println!("{id:<22} {:>2} lines  {}", form.total_lines, form.name);
        }
        return Ok(());
    }

    let config = match &cli.config {
        Some(path) => GeneratorConfig::load(path)?,
        None => GeneratorConfig::default(),
    };
    let lexicon = match &cli.lexicon {
        Some(path) => Lexicon::load(path)?,
        None => default_lexicon(),
    };
    let request = build_request(&cli)?;

    let generator = PoemGenerator::new(&lexicon, &forms, config);
    let poem = generator.generate(&request, None)?;
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&poem)?);
    } else {
        println!("{}", poem.to_text());
    }
    Ok(())
}

fn build_request(cli: &Cli) -> Result<GenerationRequest, PoetryError> {
    let mut request = if let Some(path) = &cli.request {
        GenerationRequest::load(path)?
    } else if let Some(name) = &cli.preset {
        GenerationRequest::preset(name).ok_or_else(|| PoetryError::InvalidRequest {
            violations: vec![format!(
                "unknown preset '{name}' (expected one of: {})",
                PRESET_NAMES.join(", ")
            )],
        })?
    } else {
        GenerationRequest::default()
    };

    if let Some(form) = &cli.form {
        request.form = form.clone();
    }
    if let Some(theme) = &cli.theme {
        request.theme = Some(theme.clone());
    }
    if let Some(affect) = &cli.affect {
        request.affect_profile = Some(affect.clone());
    }
    if let Some(v) = cli.rarity {
        request.rarity_bias = v;
    }
    if let Some(v) = cli.min_rarity {
        request.min_rarity = v;
    }
    if let Some(v) = cli.max_rarity {
        request.max_rarity = v;
    }
    if let Some(v) = cli.temperature {
        request.temperature = v;
    }
    if let Some(v) = cli.seed {
        request.seed = v;
    }
    if let Some(p) = cli.policy {
        request.policy = p;
    }
    if let Some(v) = cli.max_iterations {
        request.max_iterations = v;
    }
    Ok(request)
}
