//! Error types for the docuglot library.
//!
//! Two distinct failure modes exist and they are kept apart:
//!
//! * [`DocuglotError`] is **fatal**: the job cannot produce a document
//!   (unreadable input, empty extraction, provider not configured, packer
//!   failure). Every variant knows which pipeline [`Stage`] it came from.
//!
//! * Malformed structure inside otherwise readable content (an unbalanced
//!   list, an open token with no text after it) is **not** an error at all.
//!   The normalizers and the reconstructor skip such spans and log them at
//!   `debug` level.
//!
//! [`RecordError`] covers misuse of the job record lifecycle.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// The pipeline stage an error originated in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    /// Resolving the path or URL and reading the bytes.
    Input,
    /// Binary parsing and normalization into markup.
    Parse,
    /// The external translation call.
    Translate,
    /// Tokenizing the translated markup and building document blocks.
    Reconstruct,
    /// Writing the blocks into a binary .docx buffer.
    Pack,
    /// Writing results to disk.
    Output,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Input => "input",
            Stage::Parse => "parse",
            Stage::Translate => "translate",
            Stage::Reconstruct => "reconstruct",
            Stage::Pack => "pack",
            Stage::Output => "output",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// All fatal errors returned by the docuglot library.
#[derive(Debug, Error)]
pub enum DocuglotError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The input string is not a valid file path or URL.
    #[error("Invalid input '{input}': not a file path or a valid HTTP/HTTPS URL")]
    InvalidInput { input: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    /// The bytes are neither a PDF nor a .docx package.
    #[error("Unsupported document '{name}': expected a PDF or a .docx file.\nFirst bytes: {magic:?}")]
    UnsupportedFormat { name: String, magic: Vec<u8> },

    // ── Parse errors ──────────────────────────────────────────────────────
    /// PDF header/trailer/xref is corrupt and cannot be parsed.
    #[error("PDF '{name}' is corrupt: {detail}\nTry repairing with: qpdf --decrypt input.pdf output.pdf")]
    CorruptPdf { name: String, detail: String },

    /// PDF requires a password but none was provided.
    #[error("PDF '{name}' is encrypted and requires a password.\nProvide it with --password <PASSWORD>.")]
    PasswordRequired { name: String },

    /// A password was provided but it is wrong.
    #[error("Wrong password for PDF '{name}'")]
    WrongPassword { name: String },

    /// The .docx package could not be read.
    #[error("Word document '{name}' could not be read: {detail}")]
    CorruptDocx { name: String, detail: String },

    /// The parser ran but produced no text at all.
    #[error("No text could be extracted during the {stage} stage")]
    EmptyContent { stage: Stage },

    // ── Translate errors ──────────────────────────────────────────────────
    /// The configured provider is not initialised (missing API key etc.).
    #[error("LLM provider '{provider}' is not configured.\n{hint}")]
    ProviderNotConfigured { provider: String, hint: String },

    /// The LLM call failed after every retry.
    #[error("Translation failed after {retries} retries: {message}")]
    TranslationFailed { retries: u32, message: String },

    /// The LLM call returned an empty completion.
    #[error("The translation service returned an empty response")]
    EmptyTranslation,

    // ── Reconstruct / pack errors ─────────────────────────────────────────
    /// The translated markup produced no document blocks.
    #[error("Translated markup contains no headings, paragraphs or list items")]
    NoBlocks,

    /// docx-rs failed to serialise the package.
    #[error("Failed to pack the Word document: {0}")]
    PackFailed(String),

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
PDF input needs the pdfium shared library.\n\
  • Install pdfium system-wide, or\n\
  • Set PDFIUM_LIB_PATH=/path/to/libpdfium (file or directory).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// A blocking worker or job task panicked.
    #[error("The {stage} task panicked: {detail}")]
    TaskPanicked { stage: Stage, detail: String },

    /// Unexpected internal error (runtime or temp file setup).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DocuglotError {
    /// The stage this error is attributed to.
    pub fn stage(&self) -> Stage {
        match self {
            DocuglotError::FileNotFound { .. }
            | DocuglotError::PermissionDenied { .. }
            | DocuglotError::InvalidInput { .. }
            | DocuglotError::DownloadFailed { .. }
            | DocuglotError::DownloadTimeout { .. }
            | DocuglotError::UnsupportedFormat { .. }
            | DocuglotError::InvalidConfig(_)
            | DocuglotError::Internal(_) => Stage::Input,

            DocuglotError::CorruptPdf { .. }
            | DocuglotError::PasswordRequired { .. }
            | DocuglotError::WrongPassword { .. }
            | DocuglotError::CorruptDocx { .. }
            | DocuglotError::PdfiumBindingFailed(_) => Stage::Parse,

            DocuglotError::EmptyContent { stage } | DocuglotError::TaskPanicked { stage, .. } => {
                *stage
            }

            DocuglotError::ProviderNotConfigured { .. }
            | DocuglotError::TranslationFailed { .. }
            | DocuglotError::EmptyTranslation => Stage::Translate,

            DocuglotError::NoBlocks => Stage::Reconstruct,
            DocuglotError::PackFailed(_) => Stage::Pack,
            DocuglotError::OutputWriteFailed { .. } => Stage::Output,
        }
    }

    /// One-line message stored on a failed job record.
    pub fn job_message(&self) -> String {
        let first_line = self.to_string();
        let first_line = first_line.lines().next().unwrap_or_default();
        format!("{} failed: {}", self.stage(), first_line)
    }
}

/// Misuse of the [`crate::record::DocumentRecord`] lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RecordError {
    /// The record already reached `completed` or `error`.
    #[error("Document record {id} is already {status} and cannot be modified")]
    Terminal { id: String, status: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_content_reports_its_stage() {
        let e = DocuglotError::EmptyContent {
            stage: Stage::Parse,
        };
        assert_eq!(e.stage(), Stage::Parse);
        assert!(e.to_string().contains("parse"), "got: {e}");
    }

    #[test]
    fn job_message_prefixes_stage() {
        let e = DocuglotError::TranslationFailed {
            retries: 3,
            message: "HTTP 503".into(),
        };
        assert_eq!(
            e.job_message(),
            "translate failed: Translation failed after 3 retries: HTTP 503"
        );
    }

    #[test]
    fn job_message_keeps_only_first_line() {
        let e = DocuglotError::PasswordRequired {
            name: "secret.pdf".into(),
        };
        let msg = e.job_message();
        assert!(msg.starts_with("parse failed: PDF 'secret.pdf'"));
        assert!(!msg.contains('\n'));
    }

    #[test]
    fn pack_failure_maps_to_pack_stage() {
        assert_eq!(DocuglotError::PackFailed("zip".into()).stage(), Stage::Pack);
        assert_eq!(DocuglotError::NoBlocks.stage(), Stage::Reconstruct);
    }

    #[test]
    fn terminal_record_display() {
        let e = RecordError::Terminal {
            id: "abc".into(),
            status: "completed".into(),
        };
        assert!(e.to_string().contains("already completed"));
    }
}
