//! CLI binary for docuglot.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `TranslationConfig`, runs one job (or a batch) and writes the results.

use anyhow::{Context, Result};
use clap::Parser;
use docuglot::pipeline::input::resolve_input;
use docuglot::{
    extract_markup, render_docx, run_job, translate_batch, write_output, DocumentRecord,
    JobProgressCallback, ListNesting, ProgressCallback, ReadingOrder, Stage, TranslationConfig,
    SUPPORTED_LANGUAGES,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress callback: one spinner line showing the running stage and
/// a log line per finished stage.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }
}

fn stage_label(stage: Stage) -> &'static str {
    match stage {
        Stage::Input => "Reading input",
        Stage::Parse => "Parsing document",
        Stage::Translate => "Translating",
        Stage::Reconstruct => "Rebuilding structure",
        Stage::Pack => "Writing .docx",
        Stage::Output => "Saving",
    }
}

impl JobProgressCallback for CliProgressCallback {
    fn on_job_created(&self, record: &DocumentRecord) {
        self.bar.set_prefix(record.filename.clone());
    }

    fn on_stage_start(&self, stage: Stage) {
        self.bar.set_message(format!("{}…", stage_label(stage)));
    }

    fn on_stage_complete(&self, stage: Stage, record: &DocumentRecord) {
        let detail = match stage {
            Stage::Parse => format!("{} chars of markup", record.original_markdown.len()),
            Stage::Translate => format!("{} chars translated", record.translated_markdown.len()),
            _ => String::new(),
        };
        self.bar.println(format!(
            "  {} {:<22} {}",
            green("✓"),
            stage_label(stage),
            dim(&detail)
        ));
    }

    fn on_job_finished(&self, record: &DocumentRecord) {
        if let Some(ref msg) = record.error_message {
            self.bar.println(format!("  {} {}", red("✗"), red(msg)));
        }
        self.bar.finish_and_clear();
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Translate a PDF into Spanish (writes "report - Spanish.docx")
  docuglot report.pdf --to es

  # Word document into French, explicit output path
  docuglot notes.docx --from en --to fr -o notes-fr.docx

  # Extra instructions for the translator
  docuglot flyer.pdf --to es --prompt "Use informal {targetLanguage}."

  # Only show the normalized markup (no API key needed)
  docuglot --extract-only report.pdf

  # Rebuild a .docx from edited markup (no API key needed)
  docuglot --from-markup translated.md -o translated.docx

  # Several documents at once into a directory
  docuglot a.pdf b.docx c.pdf --to de -o out/

  # JSON response (base64 document) and the job record
  docuglot report.pdf --to es --json --record job.json > response.json

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory) for PDF input
"#;

/// Translate PDF and Word documents into styled .docx files.
#[derive(Parser, Debug)]
#[command(
    name = "docuglot",
    version,
    about = "Translate PDF and Word documents into styled .docx files",
    long_about = "Translate PDF and Word documents (local files or URLs) with a language model. \
Each document is normalized into Markdown, translated, and rebuilt as a .docx with headings, \
lists and emphasis preserved.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local .pdf/.docx file paths or HTTP/HTTPS URLs.
    #[arg(required_unless_present_any = ["from_markup", "list_languages"])]
    inputs: Vec<String>,

    /// Output .docx file (one input) or directory (several inputs).
    #[arg(short, long, env = "DOCUGLOT_OUTPUT")]
    output: Option<PathBuf>,

    /// Target language code.
    #[arg(long = "to", env = "DOCUGLOT_TARGET", default_value = "es")]
    target: String,

    /// Source language code.
    #[arg(long = "from", env = "DOCUGLOT_SOURCE", default_value = "en")]
    source: String,

    /// Do not ask the model to keep Markdown markers (drops the few-shot examples).
    #[arg(long, env = "DOCUGLOT_NO_PRESERVE_FORMATTING")]
    no_preserve_formatting: bool,

    /// Additional translation instructions; `{targetLanguage}` is substituted.
    #[arg(long, env = "DOCUGLOT_PROMPT", conflicts_with = "prompt_file")]
    prompt: Option<String>,

    /// Read additional translation instructions from a file.
    #[arg(long)]
    prompt_file: Option<PathBuf>,

    /// Replace the built-in translator guidelines with the contents of a file.
    #[arg(long, env = "DOCUGLOT_SYSTEM_PROMPT")]
    system_prompt: Option<PathBuf>,

    /// LLM model ID. Default: gpt-4o-mini.
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// Max LLM output tokens.
    #[arg(long, env = "DOCUGLOT_MAX_TOKENS", default_value_t = 4000)]
    max_tokens: usize,

    /// LLM temperature (0.0–2.0).
    #[arg(long, env = "DOCUGLOT_TEMPERATURE", default_value_t = 0.3)]
    temperature: f32,

    /// Retries on LLM failure.
    #[arg(long, env = "DOCUGLOT_MAX_RETRIES", default_value_t = 3)]
    max_retries: u32,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "DOCUGLOT_PASSWORD")]
    password: Option<String>,

    /// Render every list item at level 0.
    #[arg(long, env = "DOCUGLOT_FLAT_LISTS")]
    flat_lists: bool,

    /// Re-sort PDF text top-to-bottom, left-to-right instead of extractor order.
    #[arg(long, env = "DOCUGLOT_POSITIONAL_ORDER")]
    positional_order: bool,

    /// Documents translated at once when several inputs are given.
    #[arg(short, long, env = "DOCUGLOT_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Print the translated markup to stdout instead of writing a .docx.
    #[arg(long)]
    markdown_only: bool,

    /// Print the JSON response (base64 document) to stdout.
    #[arg(long, env = "DOCUGLOT_JSON")]
    json: bool,

    /// Write the job record as JSON to this path (a directory when several
    /// inputs are given).
    #[arg(long)]
    record: Option<PathBuf>,

    /// Print the normalized source markup and stop. No API key needed.
    #[arg(long)]
    extract_only: bool,

    /// Build a .docx from a markup file instead of translating. No API key needed.
    #[arg(long, value_name = "FILE")]
    from_markup: Option<PathBuf>,

    /// List supported language codes and exit.
    #[arg(long)]
    list_languages: bool,

    /// Disable the progress spinner.
    #[arg(long, env = "DOCUGLOT_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCUGLOT_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCUGLOT_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "DOCUGLOT_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// LLM call timeout in seconds.
    #[arg(long, env = "DOCUGLOT_API_TIMEOUT", default_value_t = 120)]
    api_timeout: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner carries the feedback; library INFO logs would tear it.
    let show_progress = !cli.quiet
        && !cli.no_progress
        && !cli.json
        && !cli.markdown_only
        && cli.inputs.len() == 1;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    if cli.list_languages {
        for lang in SUPPORTED_LANGUAGES {
            println!("{:<4} {:<22} {}", lang.code, lang.name, lang.native_name);
        }
        return Ok(());
    }

    let progress_cb: Option<ProgressCallback> = if show_progress && !cli.extract_only {
        Some(CliProgressCallback::new() as Arc<dyn JobProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb).await?;

    // ── Markup → .docx ───────────────────────────────────────────────────
    if let Some(ref markup_path) = cli.from_markup {
        let markup = tokio::fs::read_to_string(markup_path)
            .await
            .with_context(|| format!("Failed to read markup from {:?}", markup_path))?;
        let bytes = render_docx(&markup, &config).context("Failed to build document")?;
        let path = cli
            .output
            .clone()
            .unwrap_or_else(|| markup_path.with_extension("docx"));
        tokio::fs::write(&path, &bytes)
            .await
            .with_context(|| format!("Failed to write {:?}", path))?;
        if !cli.quiet {
            eprintln!("{}  →  {}", green("✔"), bold(&path.display().to_string()));
        }
        return Ok(());
    }

    // ── Extract only ─────────────────────────────────────────────────────
    if cli.extract_only {
        for input in &cli.inputs {
            let extracted = extract_markup(input, &config)
                .await
                .with_context(|| format!("Failed to parse {input}"))?;
            if cli.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&extracted)
                        .context("Failed to serialise markup")?
                );
            } else {
                print_markup(&extracted.markup)?;
            }
        }
        return Ok(());
    }

    if cli.inputs.len() > 1 {
        return run_batch(&cli, &config).await;
    }

    // ── Single document ──────────────────────────────────────────────────
    let Some(input) = cli.inputs.first() else {
        anyhow::bail!("No input given");
    };
    let document = resolve_input(input, config.download_timeout_secs)
        .await
        .with_context(|| format!("Failed to read {input}"))?;
    let outcome = run_job(document, &config).await;

    if let Some(ref record_path) = cli.record {
        write_record(record_path, &outcome.record)?;
    }

    let output = outcome.result.context("Translation failed")?;

    if cli.json {
        let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
        println!("{json}");
    } else if cli.markdown_only {
        print_markup(&output.content)?;
    } else {
        let target = cli
            .output
            .clone()
            .unwrap_or_else(|| PathBuf::from(&output.filename));
        let path = write_output(&target, &output).context("Failed to write document")?;
        if !cli.quiet {
            eprintln!(
                "{}  {} blocks  {}ms  →  {}",
                green("✔"),
                output.stats.block_count,
                output.stats.total_duration_ms,
                bold(&path.display().to_string()),
            );
            eprintln!(
                "   {} tokens in  /  {} tokens out",
                dim(&output.stats.input_tokens.to_string()),
                dim(&output.stats.output_tokens.to_string()),
            );
        }
    }

    Ok(())
}

/// Translate several inputs into the output directory.
async fn run_batch(cli: &Cli, config: &TranslationConfig) -> Result<()> {
    let dir = cli.output.clone().unwrap_or_else(|| PathBuf::from("."));
    tokio::fs::create_dir_all(&dir)
        .await
        .with_context(|| format!("Failed to create {:?}", dir))?;

    if let Some(ref record_dir) = cli.record {
        tokio::fs::create_dir_all(record_dir)
            .await
            .with_context(|| format!("Failed to create {:?}", record_dir))?;
    }

    let items = translate_batch(cli.inputs.clone(), config).await;
    let mut failed = 0usize;

    for item in items {
        let message = match item.outcome {
            Err(e) => Err(e.to_string()),
            Ok(outcome) => {
                if let Some(ref record_dir) = cli.record {
                    let path = record_dir.join(format!("{}.json", outcome.record.id));
                    write_record(&path, &outcome.record)?;
                }
                match outcome.result {
                    Ok(output) => write_output(&dir, &output)
                        .map(|p| p.display().to_string())
                        .map_err(|e| e.to_string()),
                    Err(e) => Err(e.job_message()),
                }
            }
        };

        match message {
            Ok(path) if !cli.quiet => eprintln!("{} {}  →  {}", green("✓"), item.input, path),
            Ok(_) => {}
            Err(msg) => {
                failed += 1;
                eprintln!("{} {}  {}", red("✗"), item.input, red(&msg));
            }
        }
    }

    if failed > 0 {
        anyhow::bail!("{failed} of {} documents failed", cli.inputs.len());
    }
    Ok(())
}

/// Map CLI args to `TranslationConfig`.
async fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<TranslationConfig> {
    let mut builder = TranslationConfig::builder()
        .source_language(&cli.source)
        .target_language(&cli.target)
        .preserve_formatting(!cli.no_preserve_formatting)
        .max_tokens(cli.max_tokens)
        .temperature(cli.temperature)
        .max_retries(cli.max_retries)
        .concurrency(cli.concurrency)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(ref prompt) = cli.prompt {
        builder = builder.custom_prompt(prompt);
    } else if let Some(ref path) = cli.prompt_file {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read prompt from {:?}", path))?;
        builder = builder.custom_prompt(prompt);
    }
    if let Some(ref path) = cli.system_prompt {
        let prompt = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read system prompt from {:?}", path))?;
        builder = builder.system_prompt(prompt);
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model);
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password);
    }
    if cli.flat_lists {
        builder = builder.list_nesting(ListNesting::Flat);
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    let mut config = builder.build().context("Invalid configuration")?;
    if cli.positional_order {
        config.layout.reading_order = ReadingOrder::Positional;
    }
    Ok(config)
}

fn write_record(path: &Path, record: &DocumentRecord) -> Result<()> {
    let json = serde_json::to_string_pretty(record).context("Failed to serialise record")?;
    std::fs::write(path, json).with_context(|| format!("Failed to write record to {:?}", path))
}

fn print_markup(markup: &str) -> Result<()> {
    let stdout = io::stdout();
    let mut handle = stdout.lock();
    handle
        .write_all(markup.as_bytes())
        .context("Failed to write to stdout")?;
    if !markup.ends_with('\n') {
        handle.write_all(b"\n").ok();
    }
    Ok(())
}
