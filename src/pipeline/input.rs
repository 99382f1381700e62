//! Input resolution: turn a path, URL or byte buffer into a [`SourceDocument`].
//!
//! Both parsers work from memory, so URLs are downloaded straight into a
//! buffer. The document kind comes from the magic bytes; the file extension
//! only decides when the magic bytes match neither kind, in which case the
//! chosen parser reports the file as corrupt.

use crate::error::DocuglotError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// PDF allows junk before the header; readers look this far for it.
const PDF_HEADER_WINDOW: usize = 1024;

/// Which parser a document goes through.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    Pdf,
    Docx,
}

impl FileType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileType::Pdf => "pdf",
            FileType::Docx => "docx",
        }
    }
}

/// A document held in memory, ready for parsing.
#[derive(Debug, Clone)]
pub struct SourceDocument {
    /// Original file name (last path or URL segment).
    pub name: String,
    pub file_type: FileType,
    pub bytes: Vec<u8>,
}

impl SourceDocument {
    /// File name without its extension.
    pub fn stem(&self) -> &str {
        Path::new(&self.name)
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("document")
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

/// Classify a buffer, using `name`'s extension only when the magic bytes are inconclusive.
pub fn detect_file_type(bytes: &[u8], name: &str) -> Option<FileType> {
    let window = &bytes[..bytes.len().min(PDF_HEADER_WINDOW)];
    if window.windows(4).any(|w| w == b"%PDF") {
        return Some(FileType::Pdf);
    }
    if bytes.starts_with(b"PK\x03\x04") {
        return Some(FileType::Docx);
    }

    let ext = Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("pdf") => Some(FileType::Pdf),
        Some("docx") => Some(FileType::Docx),
        _ => None,
    }
}

/// Wrap an in-memory buffer.
pub fn from_bytes(bytes: Vec<u8>, name: &str) -> Result<SourceDocument, DocuglotError> {
    let file_type =
        detect_file_type(&bytes, name).ok_or_else(|| DocuglotError::UnsupportedFormat {
            name: name.to_string(),
            magic: bytes.iter().take(4).copied().collect(),
        })?;
    debug!("{}: {} bytes, {}", name, bytes.len(), file_type.as_str());
    Ok(SourceDocument {
        name: name.to_string(),
        file_type,
        bytes,
    })
}

/// Resolve a local path or an HTTP(S) URL.
pub async fn resolve_input(
    input: &str,
    timeout_secs: u64,
) -> Result<SourceDocument, DocuglotError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input).await
    }
}

async fn resolve_local(path_str: &str) -> Result<SourceDocument, DocuglotError> {
    let path = PathBuf::from(path_str);

    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DocuglotError::PermissionDenied { path });
        }
        Err(_) => return Err(DocuglotError::FileNotFound { path }),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path_str.to_string());
    from_bytes(bytes, &name)
}

async fn download_url(url: &str, timeout_secs: u64) -> Result<SourceDocument, DocuglotError> {
    info!("Downloading document from: {}", url);

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()
        .map_err(|e| DocuglotError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    let response = client.get(url).send().await.map_err(|e| {
        if e.is_timeout() {
            DocuglotError::DownloadTimeout {
                url: url.to_string(),
                secs: timeout_secs,
            }
        } else {
            DocuglotError::DownloadFailed {
                url: url.to_string(),
                reason: e.to_string(),
            }
        }
    })?;

    if !response.status().is_success() {
        return Err(DocuglotError::DownloadFailed {
            url: url.to_string(),
            reason: format!("HTTP {}", response.status()),
        });
    }

    let bytes = response
        .bytes()
        .await
        .map_err(|e| DocuglotError::DownloadFailed {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

    info!("Downloaded {} bytes", bytes.len());
    from_bytes(bytes.to_vec(), &filename_from_url(url))
}

/// Last URL path segment when it looks like a file name.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if !last.is_empty() && last.contains('.') {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_url() {
        assert!(is_url("https://example.com/doc.pdf"));
        assert!(is_url("http://example.com/doc.docx"));
        assert!(!is_url("/tmp/doc.pdf"));
        assert!(!is_url(""));
    }

    #[test]
    fn magic_bytes_win_over_extension() {
        assert_eq!(detect_file_type(b"%PDF-1.7\n", "x.docx"), Some(FileType::Pdf));
        assert_eq!(detect_file_type(b"PK\x03\x04rest", "x.pdf"), Some(FileType::Docx));
    }

    #[test]
    fn pdf_header_may_follow_junk() {
        let mut bytes = vec![b' '; 100];
        bytes.extend_from_slice(b"%PDF-1.4");
        assert_eq!(detect_file_type(&bytes, "scan"), Some(FileType::Pdf));
    }

    #[test]
    fn extension_breaks_ties() {
        assert_eq!(detect_file_type(b"garbage", "report.PDF"), Some(FileType::Pdf));
        assert_eq!(detect_file_type(b"garbage", "notes.docx"), Some(FileType::Docx));
        assert_eq!(detect_file_type(b"garbage", "notes.txt"), None);
    }

    #[test]
    fn unsupported_bytes_report_magic() {
        let err = from_bytes(b"hello world".to_vec(), "a.txt").unwrap_err();
        match err {
            DocuglotError::UnsupportedFormat { name, magic } => {
                assert_eq!(name, "a.txt");
                assert_eq!(magic, b"hell".to_vec());
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn stem_drops_extension() {
        let doc = from_bytes(b"%PDF".to_vec(), "Annual Report.pdf").unwrap();
        assert_eq!(doc.stem(), "Annual Report");
    }

    #[test]
    fn filename_from_url_path() {
        assert_eq!(filename_from_url("https://x.org/files/a.docx"), "a.docx");
        assert_eq!(filename_from_url("https://x.org/files/"), "downloaded");
    }

    #[tokio::test]
    async fn missing_local_file() {
        let err = resolve_input("/definitely/not/here.pdf", 5).await.unwrap_err();
        assert!(matches!(err, DocuglotError::FileNotFound { .. }));
    }
}
