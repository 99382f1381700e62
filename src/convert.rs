//! Job orchestration entry points.
//!
//! A job runs four stages strictly in sequence, each consuming the previous
//! stage's complete output:
//!
//! ```text
//! parse ──▶ translate ──▶ reconstruct ──▶ pack
//! (markup)   (markup)      (blocks)        (.docx)
//! ```
//!
//! [`run_job`] is the job boundary: whatever happens inside (an error from
//! any stage or a panic) ends up as a terminal record, and document bytes are
//! only returned for a `completed` record. The other entry points are thin
//! wrappers that resolve input first and unwrap the outcome.

use crate::config::TranslationConfig;
use crate::error::{DocuglotError, Stage};
use crate::languages::language_name;
use crate::output::{ContentMetadata, JobOutcome, TranslationOutput, TranslationStats};
use crate::pipeline::docx_html::read_docx_nodes;
use crate::pipeline::extract::extract_pages;
use crate::pipeline::html::normalize_nodes;
use crate::pipeline::input::{self, FileType, SourceDocument};
use crate::pipeline::layout::normalize_pages;
use crate::pipeline::pack::pack;
use crate::pipeline::reconstruct::{reconstruct, DocumentBlock};
use crate::pipeline::tokenize::tokenize;
use crate::pipeline::translate::{LlmTranslator, TranslationRequest, Translator};
use crate::record::DocumentRecord;
use edgequake_llm::{LLMProvider, ProviderFactory};
use futures::FutureExt;
use serde::Serialize;
use std::io::Write;
use std::panic::AssertUnwindSafe;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info};

/// Normalized markup of a source document plus what was learned parsing it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractedContent {
    pub markup: String,
    pub metadata: ContentMetadata,
}

/// Translate a local file or URL.
///
/// # Errors
/// Input resolution errors are returned before any job starts. Everything
/// after that goes through [`run_job`]; its error is returned here.
pub async fn translate_document(
    input_str: impl AsRef<str>,
    config: &TranslationConfig,
) -> Result<TranslationOutput, DocuglotError> {
    let input_str = input_str.as_ref();
    info!("Starting translation: {}", input_str);
    let document = input::resolve_input(input_str, config.download_timeout_secs).await?;
    run_job(document, config).await.result
}

/// Translate a document already held in memory.
pub async fn translate_bytes(
    bytes: Vec<u8>,
    filename: &str,
    config: &TranslationConfig,
) -> Result<TranslationOutput, DocuglotError> {
    let document = input::from_bytes(bytes, filename)?;
    run_job(document, config).await.result
}

/// Translate and write the .docx to `output_path`.
///
/// When `output_path` is an existing directory the generated filename is used
/// inside it. The write is atomic (temp file in the target directory, then
/// rename), so a failed job never leaves a partial document behind.
pub async fn translate_to_file(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    config: &TranslationConfig,
) -> Result<(PathBuf, TranslationOutput), DocuglotError> {
    let output = translate_document(input_str, config).await?;
    let path = write_output(output_path, &output)?;
    Ok((path, output))
}

/// Write a finished document to `output_path` (or into it, when it is an
/// existing directory) and return the final path.
pub fn write_output(
    output_path: impl AsRef<Path>,
    output: &TranslationOutput,
) -> Result<PathBuf, DocuglotError> {
    let mut path = output_path.as_ref().to_path_buf();
    if path.is_dir() {
        path = path.join(&output.filename);
    }
    write_atomic(&path, &output.document)?;
    info!("Wrote {}", path.display());
    Ok(path)
}

/// Synchronous wrapper around [`translate_document`].
///
/// Creates a temporary tokio runtime internally.
pub fn translate_sync(
    input_str: impl AsRef<str>,
    config: &TranslationConfig,
) -> Result<TranslationOutput, DocuglotError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| DocuglotError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(translate_document(input_str, config))
}

/// Parse a file or URL into normalized markup. No translation, no API key.
pub async fn extract_markup(
    input_str: impl AsRef<str>,
    config: &TranslationConfig,
) -> Result<ExtractedContent, DocuglotError> {
    let document =
        input::resolve_input(input_str.as_ref(), config.download_timeout_secs).await?;
    parse_document(&document, config).await
}

/// Rebuild a .docx from stored (translated) markup.
pub fn render_docx(markup: &str, config: &TranslationConfig) -> Result<Vec<u8>, DocuglotError> {
    let blocks = build_blocks(markup, config)?;
    pack(&blocks, &config.page_style)
}

/// Tokenize and reconstruct markup into document blocks.
///
/// # Errors
/// [`DocuglotError::NoBlocks`] when the markup holds no heading, paragraph,
/// list item or rule.
pub fn build_blocks(
    markup: &str,
    config: &TranslationConfig,
) -> Result<Vec<DocumentBlock>, DocuglotError> {
    let tokens = tokenize(markup, &config.tokenizer);
    let blocks = reconstruct(&tokens, config.list_nesting);
    debug!("{} tokens → {} blocks", tokens.len(), blocks.len());
    if blocks.is_empty() {
        return Err(DocuglotError::NoBlocks);
    }
    Ok(blocks)
}

/// `"<stem> - <Target language name>.docx"`.
pub fn output_filename(stem: &str, target_language: &str) -> String {
    format!("{} - {}.docx", stem, language_name(target_language))
}

/// Run one job to a terminal record. Never fails and never panics.
pub async fn run_job(document: SourceDocument, config: &TranslationConfig) -> JobOutcome {
    let mut record = DocumentRecord::new(
        document.name.clone(),
        document.file_type,
        config.source_language.clone(),
        config.target_language.clone(),
        config.preserve_formatting,
        config.custom_prompt.clone(),
    );
    if let Some(ref cb) = config.progress_callback {
        cb.on_job_created(&record);
    }

    let mut stage = Stage::Parse;
    let run = AssertUnwindSafe(run_stages(&document, config, &mut record, &mut stage));
    let caught = run.catch_unwind().await;
    let result = match caught {
        Ok(result) => result,
        Err(panic) => Err(DocuglotError::TaskPanicked {
            stage,
            detail: panic_message(panic.as_ref()),
        }),
    };

    let closed = match &result {
        Ok(_) => record.complete(),
        Err(e) => {
            error!("Job {} ({}): {}", record.id, record.filename, e);
            record.fail(e.job_message())
        }
    };
    if let Err(e) = closed {
        error!("{}", e);
    }

    if let Some(ref cb) = config.progress_callback {
        cb.on_job_finished(&record);
    }

    JobOutcome { record, result }
}

// ── Internal helpers ─────────────────────────────────────────────────────

async fn run_stages(
    document: &SourceDocument,
    config: &TranslationConfig,
    record: &mut DocumentRecord,
    stage: &mut Stage,
) -> Result<TranslationOutput, DocuglotError> {
    let total_start = Instant::now();
    let callback = config.progress_callback.as_ref();
    let mut stats = TranslationStats::default();

    // ── Stage 1: Parse ───────────────────────────────────────────────────
    *stage = Stage::Parse;
    if let Some(cb) = callback {
        cb.on_stage_start(Stage::Parse);
    }
    let started = Instant::now();
    let extracted = parse_document(document, config).await?;
    stats.parse_duration_ms = started.elapsed().as_millis() as u64;
    record
        .set_original(&extracted.markup, extracted.metadata.flags)
        .map_err(|e| DocuglotError::Internal(e.to_string()))?;
    if let Some(cb) = callback {
        cb.on_stage_complete(Stage::Parse, record);
    }
    info!(
        "Parsed {} into {} bytes of markup in {}ms",
        document.name,
        extracted.markup.len(),
        stats.parse_duration_ms
    );

    // ── Stage 2: Translate ───────────────────────────────────────────────
    *stage = Stage::Translate;
    if let Some(cb) = callback {
        cb.on_stage_start(Stage::Translate);
    }
    let started = Instant::now();
    let translator = resolve_translator(config)?;
    let request = TranslationRequest::from_config(config);
    let translated = translator.translate(&extracted.markup, &request).await?;
    if translated.markup.trim().is_empty() {
        return Err(DocuglotError::EmptyTranslation);
    }
    stats.translator = translator.name().to_string();
    stats.input_tokens = translated.input_tokens as u64;
    stats.output_tokens = translated.output_tokens as u64;
    stats.retries = translated.retries;
    stats.translate_duration_ms = started.elapsed().as_millis() as u64;
    record
        .set_translated(&translated.markup)
        .map_err(|e| DocuglotError::Internal(e.to_string()))?;
    if let Some(cb) = callback {
        cb.on_stage_complete(Stage::Translate, record);
    }
    info!(
        "Translated with {} in {}ms ({} in / {} out tokens)",
        stats.translator, stats.translate_duration_ms, stats.input_tokens, stats.output_tokens
    );

    // ── Stage 3: Reconstruct ─────────────────────────────────────────────
    *stage = Stage::Reconstruct;
    if let Some(cb) = callback {
        cb.on_stage_start(Stage::Reconstruct);
    }
    let blocks = build_blocks(&translated.markup, config)?;
    stats.block_count = blocks.len();
    if let Some(cb) = callback {
        cb.on_stage_complete(Stage::Reconstruct, record);
    }

    // ── Stage 4: Pack ────────────────────────────────────────────────────
    *stage = Stage::Pack;
    if let Some(cb) = callback {
        cb.on_stage_start(Stage::Pack);
    }
    let started = Instant::now();
    let bytes = pack(&blocks, &config.page_style)?;
    stats.pack_duration_ms = started.elapsed().as_millis() as u64;
    if let Some(cb) = callback {
        cb.on_stage_complete(Stage::Pack, record);
    }

    stats.total_duration_ms = total_start.elapsed().as_millis() as u64;
    info!(
        "Job complete: {} blocks, {} bytes, {}ms total",
        stats.block_count,
        bytes.len(),
        stats.total_duration_ms
    );

    Ok(TranslationOutput {
        document: bytes,
        filename: output_filename(document.stem(), &config.target_language),
        content: translated.markup,
        original_content: extracted.markup,
        metadata: extracted.metadata,
        stats,
    })
}

/// Run the binary parser and the matching normalizer.
async fn parse_document(
    document: &SourceDocument,
    config: &TranslationConfig,
) -> Result<ExtractedContent, DocuglotError> {
    let mut metadata = ContentMetadata {
        source_filename: document.name.clone(),
        file_type: Some(document.file_type),
        ..Default::default()
    };

    let markup = match document.file_type {
        FileType::Pdf => {
            let pages = extract_pages(
                document.bytes.clone(),
                &document.name,
                config.password.as_deref(),
            )
            .await?;
            let normalized = normalize_pages(&pages, &config.layout);
            metadata.page_count = Some(normalized.page_count);
            metadata.flags = normalized.flags;
            normalized.markup
        }
        FileType::Docx => {
            let nodes = read_docx_nodes(&document.bytes, &document.name)?;
            let normalized = normalize_nodes(&nodes, &config.tokenizer);
            metadata.flags = normalized.flags;
            normalized.markup
        }
    };

    if markup.trim().is_empty() {
        return Err(DocuglotError::EmptyContent {
            stage: Stage::Parse,
        });
    }

    Ok(ExtractedContent { markup, metadata })
}

fn resolve_translator(config: &TranslationConfig) -> Result<Arc<dyn Translator>, DocuglotError> {
    if let Some(ref translator) = config.translator {
        return Ok(Arc::clone(translator));
    }
    let provider = resolve_provider(config)?;
    Ok(Arc::new(LlmTranslator::new(provider, config)))
}

/// Instantiate a named provider with the given model.
fn create_provider(
    provider_name: &str,
    model: &str,
) -> Result<Arc<dyn LLMProvider>, DocuglotError> {
    ProviderFactory::create_llm_provider(provider_name, model).map_err(|e| {
        DocuglotError::ProviderNotConfigured {
            provider: provider_name.to_string(),
            hint: format!("{e}"),
        }
    })
}

/// Resolve the LLM provider, from most-specific to least-specific.
///
/// 1. **Pre-built provider** (`config.provider`).
/// 2. **Named provider + model** (`config.provider_name`); the factory reads
///    the matching API key from the environment.
/// 3. **Environment pair** (`EDGEQUAKE_LLM_PROVIDER` + `EDGEQUAKE_MODEL`),
///    used only when both are set.
/// 4. **OpenAI** when `OPENAI_API_KEY` is present.
/// 5. **Full auto-detection** (`ProviderFactory::from_env`).
fn resolve_provider(config: &TranslationConfig) -> Result<Arc<dyn LLMProvider>, DocuglotError> {
    if let Some(ref provider) = config.provider {
        return Ok(Arc::clone(provider));
    }

    if let Some(ref name) = config.provider_name {
        return create_provider(name, config.model_or_default());
    }

    if let (Ok(prov), Ok(model)) = (
        std::env::var("EDGEQUAKE_LLM_PROVIDER"),
        std::env::var("EDGEQUAKE_MODEL"),
    ) {
        if !prov.is_empty() && !model.is_empty() {
            return create_provider(&prov, &model);
        }
    }

    if let Ok(openai_key) = std::env::var("OPENAI_API_KEY") {
        if !openai_key.is_empty() {
            return create_provider("openai", config.model_or_default());
        }
    }

    let (llm_provider, _embedding) =
        ProviderFactory::from_env().map_err(|e| DocuglotError::ProviderNotConfigured {
            provider: "auto".to_string(),
            hint: format!(
                "No LLM provider could be auto-detected from environment.\n\
                Set OPENAI_API_KEY, ANTHROPIC_API_KEY, or configure a provider.\n\
                Error: {}",
                e
            ),
        })?;

    Ok(llm_provider)
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DocuglotError> {
    let write_err = |source: std::io::Error| DocuglotError::OutputWriteFailed {
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&parent).map_err(write_err)?;

    let mut tmp = tempfile::NamedTempFile::new_in(&parent).map_err(write_err)?;
    tmp.write_all(bytes).map_err(write_err)?;
    tmp.persist(path).map_err(|e| write_err(e.error))?;
    Ok(())
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
