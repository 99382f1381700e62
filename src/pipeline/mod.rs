//! Pipeline stages for document translation.
//!
//! Each submodule implements exactly one transformation step.
//!
//! ## Data Flow
//!
//! ```text
//!          ┌─ PDF ──▶ extract ──▶ layout ─┐
//! input ───┤                              ├──▶ postprocess ──▶ translate
//!          └─ DOCX ─▶ docx_html ─▶ html ──┘
//!
//! translate ──▶ tokenize ──▶ reconstruct (+ inline) ──▶ pack
//! ```
//!
//! 1. [`input`]      resolve a path, URL or buffer and sniff PDF vs DOCX
//! 2. [`extract`]    pdfium page objects → positioned fragments (`spawn_blocking`)
//! 3. [`docx_html`]  docx-rs document → HTML-like node tree
//! 4. [`layout`]     geometry heuristics → normalized markup
//! 5. [`html`]       node-type rewrite → normalized markup
//! 6. [`postprocess`] named, idempotent cleanup rules for both paths and for
//!    model output
//! 7. [`translate`]  the translation collaborator, with retry/backoff
//! 8. [`tokenize`]   markup → flat token sequence (pulldown-cmark)
//! 9. [`reconstruct`] tokens → document blocks; [`inline`] splits block text
//!    into bold/italic runs
//! 10. [`pack`]      document blocks → .docx bytes (docx-rs)

pub mod docx_html;
pub mod extract;
pub mod html;
pub mod inline;
pub mod input;
pub mod layout;
pub mod pack;
pub mod postprocess;
pub mod reconstruct;
pub mod tokenize;
pub mod translate;
