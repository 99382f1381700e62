//! Result types returned by the translation entry points.

use crate::error::DocuglotError;
use crate::pipeline::input::FileType;
use crate::pipeline::layout::LayoutFlags;
use crate::record::DocumentRecord;
use serde::{Deserialize, Serialize};

/// A finished translation.
///
/// Serialises in the shape of the original web API response: `document`
/// (base64 .docx), `filename` and `content` (translated markup), plus the
/// source markup, metadata and stats.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TranslationOutput {
    /// Generated .docx bytes.
    #[serde(with = "base64_bytes")]
    pub document: Vec<u8>,
    /// `"<input stem> - <Target language name>.docx"`.
    pub filename: String,
    /// Translated normalized markup.
    pub content: String,
    /// Normalized markup of the source document.
    pub original_content: String,
    pub metadata: ContentMetadata,
    pub stats: TranslationStats,
}

/// What the parse stage learned about the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub source_filename: String,
    pub file_type: Option<FileType>,
    /// PDF page count; `None` for Word input.
    pub page_count: Option<usize>,
    pub flags: LayoutFlags,
}

/// Aggregate statistics for one job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranslationStats {
    /// Translator that produced the content (provider name or "custom").
    pub translator: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub retries: u32,
    /// Blocks written into the document.
    pub block_count: usize,
    pub parse_duration_ms: u64,
    pub translate_duration_ms: u64,
    pub pack_duration_ms: u64,
    pub total_duration_ms: u64,
}

/// What [`crate::convert::run_job`] hands back: the terminal record, and the
/// output only when the record is `completed`.
#[derive(Debug)]
pub struct JobOutcome {
    pub record: DocumentRecord,
    pub result: Result<TranslationOutput, DocuglotError>,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_ok()
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}
