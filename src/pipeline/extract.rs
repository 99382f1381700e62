//! PDF extraction: page objects → [`PageLayout`] via pdfium.
//!
//! ## Why spawn_blocking?
//!
//! `pdfium-render` wraps the pdfium C++ library, which keeps thread-local
//! state and must not be driven from an async worker thread. All pdfium work
//! happens inside `tokio::task::spawn_blocking`.
//!
//! Only text and image objects are read. Text objects become
//! [`PositionedFragment`]s in the order pdfium reports them; image objects are
//! only counted.

use crate::error::{DocuglotError, Stage};
use crate::pipeline::layout::{PageLayout, PositionedFragment};
use pdfium_render::prelude::*;
use std::path::PathBuf;
use tracing::{debug, info};

/// Environment variable pointing at the pdfium shared library (file or directory).
pub const PDFIUM_LIB_ENV: &str = "PDFIUM_LIB_PATH";

/// Extract every page of a PDF held in memory.
pub async fn extract_pages(
    bytes: Vec<u8>,
    name: &str,
    password: Option<&str>,
) -> Result<Vec<PageLayout>, DocuglotError> {
    let name = name.to_string();
    let password = password.map(str::to_string);

    tokio::task::spawn_blocking(move || extract_pages_blocking(&bytes, &name, password.as_deref()))
        .await
        .map_err(|e| DocuglotError::TaskPanicked {
            stage: Stage::Parse,
            detail: e.to_string(),
        })?
}

/// Bind pdfium: `PDFIUM_LIB_PATH` first, then the system library.
fn bind_pdfium() -> Result<Pdfium, DocuglotError> {
    if let Ok(path) = std::env::var(PDFIUM_LIB_ENV) {
        let pb = PathBuf::from(path);
        let lib_path = if pb.is_dir() {
            Pdfium::pdfium_platform_library_name_at_path(&pb)
        } else {
            pb
        };
        match Pdfium::bind_to_library(&lib_path) {
            Ok(bindings) => return Ok(Pdfium::new(bindings)),
            Err(e) => debug!("pdfium at {} not usable: {}", lib_path.display(), e),
        }
    }

    Pdfium::bind_to_system_library()
        .map(Pdfium::new)
        .map_err(|e| DocuglotError::PdfiumBindingFailed(e.to_string()))
}

fn load_error(err: PdfiumError, name: &str, password: Option<&str>) -> DocuglotError {
    let detail = format!("{:?}", err);
    if detail.contains("Password") || detail.contains("password") {
        if password.is_some() {
            DocuglotError::WrongPassword {
                name: name.to_string(),
            }
        } else {
            DocuglotError::PasswordRequired {
                name: name.to_string(),
            }
        }
    } else {
        DocuglotError::CorruptPdf {
            name: name.to_string(),
            detail,
        }
    }
}

fn extract_pages_blocking(
    bytes: &[u8],
    name: &str,
    password: Option<&str>,
) -> Result<Vec<PageLayout>, DocuglotError> {
    let pdfium = bind_pdfium()?;
    let document = pdfium
        .load_pdf_from_byte_slice(bytes, password)
        .map_err(|e| load_error(e, name, password))?;

    let pages = document.pages();
    info!("PDF loaded: {} pages", pages.len());

    let mut layouts = Vec::with_capacity(pages.len() as usize);
    for (idx, page) in pages.iter().enumerate() {
        let mut layout = PageLayout {
            height: page.height().value,
            ..Default::default()
        };

        for object in page.objects().iter() {
            match object.object_type() {
                PdfPageObjectType::Text => {
                    let Some(text_object) = object.as_text_object() else {
                        continue;
                    };
                    let text = text_object.text();
                    if text.is_empty() {
                        continue;
                    }
                    layout.fragments.push(PositionedFragment::new(
                        text,
                        text_object.scaled_font_size().value,
                        text_object.font().name(),
                        object.get_horizontal_translation().value,
                        object.get_vertical_translation().value,
                    ));
                }
                PdfPageObjectType::Image => layout.image_count += 1,
                _ => {}
            }
        }

        debug!(
            "Page {}: {} text fragments, {} images",
            idx + 1,
            layout.fragments.len(),
            layout.image_count
        );
        layouts.push(layout);
    }

    Ok(layouts)
}
