//! The persisted document record and its status lifecycle.
//!
//! A record is created in [`JobStatus::Processing`] with empty markup when a
//! job starts, filled in stage by stage, and closed exactly once with
//! [`DocumentRecord::complete`] or [`DocumentRecord::fail`]. After that every
//! mutation returns [`RecordError::Terminal`].
//!
//! Storage itself is out of scope: the record is plain serde data handed to
//! [`crate::progress::JobProgressCallback`].

use crate::error::RecordError;
use crate::pipeline::input::FileType;
use crate::pipeline::layout::LayoutFlags;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobStatus::Processing)
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One translation job as handed to storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentRecord {
    pub id: String,
    pub filename: String,
    pub file_type: FileType,
    pub original_markdown: String,
    pub translated_markdown: String,
    pub source_language: String,
    pub target_language: String,
    pub preserve_formatting: bool,
    pub custom_prompt: Option<String>,
    pub status: JobStatus,
    pub error_message: Option<String>,
    /// Byte length of the original markup.
    pub file_size: usize,
    pub flags: LayoutFlags,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl DocumentRecord {
    pub fn new(
        filename: impl Into<String>,
        file_type: FileType,
        source_language: impl Into<String>,
        target_language: impl Into<String>,
        preserve_formatting: bool,
        custom_prompt: Option<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            filename: filename.into(),
            file_type,
            original_markdown: String::new(),
            translated_markdown: String::new(),
            source_language: source_language.into(),
            target_language: target_language.into(),
            preserve_formatting,
            custom_prompt,
            status: JobStatus::Processing,
            error_message: None,
            file_size: 0,
            flags: LayoutFlags::default(),
            created_at: now,
            updated_at: now,
        }
    }

    fn ensure_open(&self) -> Result<(), RecordError> {
        if self.status.is_terminal() {
            return Err(RecordError::Terminal {
                id: self.id.clone(),
                status: self.status.to_string(),
            });
        }
        Ok(())
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    /// Store the normalized source markup and the layout evidence found with it.
    pub fn set_original(&mut self, markup: &str, flags: LayoutFlags) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.original_markdown = markup.to_string();
        self.file_size = markup.len();
        self.flags = flags;
        self.touch();
        Ok(())
    }

    pub fn set_translated(&mut self, markup: &str) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.translated_markdown = markup.to_string();
        self.touch();
        Ok(())
    }

    pub fn complete(&mut self) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.status = JobStatus::Completed;
        self.touch();
        Ok(())
    }

    pub fn fail(&mut self, message: impl Into<String>) -> Result<(), RecordError> {
        self.ensure_open()?;
        self.status = JobStatus::Error;
        self.error_message = Some(message.into());
        self.touch();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> DocumentRecord {
        DocumentRecord::new("report.pdf", FileType::Pdf, "en", "es", true, None)
    }

    #[test]
    fn starts_processing_and_empty() {
        let r = record();
        assert_eq!(r.status, JobStatus::Processing);
        assert!(r.original_markdown.is_empty());
        assert_eq!(r.file_size, 0);
        assert_eq!(r.id.len(), 36);
    }

    #[test]
    fn file_size_tracks_original_markup() {
        let mut r = record();
        r.set_original("# Título\n", LayoutFlags::default()).unwrap();
        assert_eq!(r.file_size, "# Título\n".len());
        assert!(r.updated_at >= r.created_at);
    }

    #[test]
    fn complete_is_final() {
        let mut r = record();
        r.complete().unwrap();
        assert_eq!(r.status, JobStatus::Completed);
        assert!(matches!(r.fail("late"), Err(RecordError::Terminal { .. })));
        assert!(r.set_translated("x").is_err());
        assert_eq!(r.status, JobStatus::Completed);
        assert!(r.error_message.is_none());
    }

    #[test]
    fn fail_keeps_message_and_is_final() {
        let mut r = record();
        r.fail("parse failed: bad xref").unwrap();
        assert_eq!(r.status, JobStatus::Error);
        assert_eq!(r.error_message.as_deref(), Some("parse failed: bad xref"));
        assert!(r.complete().is_err());
    }

    #[test]
    fn serialises_with_lowercase_status() {
        let mut r = record();
        r.complete().unwrap();
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["status"], "completed");
        assert_eq!(json["fileType"], "pdf");
        assert_eq!(json["targetLanguage"], "es");
    }
}
