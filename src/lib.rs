//! # docuglot
//!
//! Translate PDF and Word documents with a language model and rebuild the
//! result as a styled `.docx`.
//!
//! Binary documents never reach the model. Both input formats are first
//! normalized into one small Markdown dialect (headings, bold/italic, lists,
//! rules), the model translates that text, and the translated markup is
//! reconstructed into Word paragraphs, list items and runs.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF / DOCX
//!  │
//!  ├─ 1. Input        resolve local file or download from URL, sniff format
//!  ├─ 2. Parse        pdfium fragments → geometry heuristics   (PDF)
//!  │                  docx-rs tree → HTML rewrite              (DOCX)
//!  ├─ 3. Normalize    named cleanup rules → normalized markup
//!  ├─ 4. Translate    LLM call with retry/backoff (or any Translator)
//!  ├─ 5. Reconstruct  tokenize → headings / paragraphs / list items / rules
//!  └─ 6. Pack         styled .docx bytes
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use docuglot::{translate_document, TranslationConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Provider auto-detected from OPENAI_API_KEY / ANTHROPIC_API_KEY / ...
//!     let config = TranslationConfig::builder()
//!         .source_language("en")
//!         .target_language("es")
//!         .build()?;
//!     let output = translate_document("report.pdf", &config).await?;
//!     std::fs::write(&output.filename, &output.document)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `docuglot` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! PDF input needs the pdfium shared library at runtime: install it
//! system-wide or point `PDFIUM_LIB_PATH` at it. Word input and
//! [`render_docx`] need nothing external.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod batch;
pub mod config;
pub mod convert;
pub mod error;
pub mod languages;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod prompts;
pub mod record;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use batch::{translate_batch, translate_batch_stream, BatchItem, BatchStream};
pub use config::{TranslationConfig, TranslationConfigBuilder};
pub use convert::{
    build_blocks, extract_markup, output_filename, render_docx, run_job, translate_bytes,
    translate_document, translate_sync, translate_to_file, write_output, ExtractedContent,
};
pub use error::{DocuglotError, RecordError, Stage};
pub use languages::{language_name, Language, SUPPORTED_LANGUAGES};
pub use output::{ContentMetadata, JobOutcome, TranslationOutput, TranslationStats};
pub use pipeline::input::{FileType, SourceDocument};
pub use pipeline::layout::{
    LayoutFlags, LayoutOptions, PageLayout, PositionedFragment, ReadingOrder,
};
pub use pipeline::pack::PageStyle;
pub use pipeline::reconstruct::{DocumentBlock, Inline, ListNesting};
pub use pipeline::tokenize::TokenizerOptions;
pub use pipeline::translate::{LlmTranslator, Translated, TranslationRequest, Translator};
pub use progress::{JobProgressCallback, NoopProgressCallback, ProgressCallback};
pub use record::{DocumentRecord, JobStatus};
