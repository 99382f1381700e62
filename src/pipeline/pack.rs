//! Document packer: ordered [`DocumentBlock`]s → `.docx` bytes via docx-rs.
//!
//! Fonts, margins, spacing and the two numbering schemes come from
//! [`PageStyle`]. Every ordered item shares one decimal numbering instance, so
//! numbering runs on across the document, matching the normalized markup.

use crate::error::DocuglotError;
use crate::pipeline::reconstruct::{DocumentBlock, Inline};
use docx_rs::{
    AbstractNumbering, BorderType, BreakType, Docx, IndentLevel, Level, LevelJc, LevelText,
    LineSpacing, NumberFormat, Numbering, NumberingId, PageMargin, Paragraph, ParagraphBorder,
    ParagraphBorderPosition, ParagraphBorders, Run, RunFonts, SpecialIndentType, Start, Style,
    StyleType,
};
use serde::{Deserialize, Serialize};
use std::io::Cursor;
use tracing::debug;

const BULLET_NUMBERING: usize = 1;
const DECIMAL_NUMBERING: usize = 2;
/// Word supports list levels 0..=8.
const MAX_LEVEL: usize = 8;

/// Fixed page and paragraph defaults of the generated document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageStyle {
    pub font: String,
    /// Body size in half-points (24 = 12 pt).
    pub font_size: usize,
    /// Page margin on every side, in twips (1440 = 1 inch).
    pub margin: i32,
    /// Paragraph spacing before, in twips.
    pub spacing_before: u32,
    /// Paragraph spacing after, in twips.
    pub spacing_after: u32,
    /// Line spacing in 240ths of a line (360 = 1.5 lines).
    pub line: i32,
    pub bullet: String,
    /// Level text of ordered items; `%1` is replaced with the level's counter.
    pub decimal: String,
}

impl Default for PageStyle {
    fn default() -> Self {
        Self {
            font: "Calibri".to_string(),
            font_size: 24,
            margin: 1440,
            spacing_before: 200,
            spacing_after: 200,
            line: 360,
            bullet: "•".to_string(),
            decimal: "%1.".to_string(),
        }
    }
}

/// Heading size in half-points for levels 1..=6.
fn heading_size(level: u8) -> usize {
    match level {
        1 => 32,
        2 => 28,
        3 => 26,
        4 => 24,
        _ => 22,
    }
}

fn base_document(style: &PageStyle) -> Docx {
    let mut docx = Docx::new()
        .default_fonts(RunFonts::new().ascii(&style.font).hi_ansi(&style.font))
        .default_size(style.font_size)
        .page_margin(
            PageMargin::new()
                .top(style.margin)
                .bottom(style.margin)
                .left(style.margin)
                .right(style.margin),
        );

    for level in 1..=6u8 {
        docx = docx.add_style(
            Style::new(&format!("Heading{level}"), StyleType::Paragraph)
                .name(&format!("Heading {level}"))
                .size(heading_size(level))
                .bold(),
        );
    }

    let mut bullets = AbstractNumbering::new(BULLET_NUMBERING);
    let mut decimals = AbstractNumbering::new(DECIMAL_NUMBERING);
    for lvl in 0..=MAX_LEVEL {
        let left = 720 * (lvl as i32 + 1);
        bullets = bullets.add_level(
            Level::new(
                lvl,
                Start::new(1),
                NumberFormat::new("bullet"),
                LevelText::new(&style.bullet),
                LevelJc::new("left"),
            )
            .indent(Some(left), Some(SpecialIndentType::Hanging(360)), None, None),
        );
        decimals = decimals.add_level(
            Level::new(
                lvl,
                Start::new(1),
                NumberFormat::new("decimal"),
                LevelText::new(&style.decimal.replace("%1", &format!("%{}", lvl + 1))),
                LevelJc::new("left"),
            )
            .indent(Some(left), Some(SpecialIndentType::Hanging(360)), None, None),
        );
    }

    docx.add_abstract_numbering(bullets)
        .add_abstract_numbering(decimals)
        .add_numbering(Numbering::new(BULLET_NUMBERING, BULLET_NUMBERING))
        .add_numbering(Numbering::new(DECIMAL_NUMBERING, DECIMAL_NUMBERING))
}

fn spacing(style: &PageStyle) -> LineSpacing {
    LineSpacing::new()
        .before(style.spacing_before)
        .after(style.spacing_after)
        .line(style.line)
}

fn add_content(mut paragraph: Paragraph, content: &[Inline]) -> Paragraph {
    for inline in content {
        let run = match inline {
            Inline::Break => Run::new().add_break(BreakType::TextWrapping),
            Inline::Run(styled) => {
                let mut run = Run::new().add_text(&styled.text);
                if styled.bold {
                    run = run.bold();
                }
                if styled.italic {
                    run = run.italic();
                }
                run
            }
        };
        paragraph = paragraph.add_run(run);
    }
    paragraph
}

fn block_paragraph(block: &DocumentBlock, style: &PageStyle) -> Paragraph {
    match block {
        DocumentBlock::Heading { level, content } => add_content(
            Paragraph::new()
                .style(&format!("Heading{}", (*level).clamp(1, 6)))
                .line_spacing(spacing(style)),
            content,
        ),
        DocumentBlock::Paragraph { content } => {
            add_content(Paragraph::new().line_spacing(spacing(style)), content)
        }
        DocumentBlock::ListItem {
            ordered,
            level,
            content,
        } => {
            let numbering = if *ordered {
                DECIMAL_NUMBERING
            } else {
                BULLET_NUMBERING
            };
            add_content(
                Paragraph::new()
                    .numbering(
                        NumberingId::new(numbering),
                        IndentLevel::new((*level).min(MAX_LEVEL)),
                    )
                    .line_spacing(spacing(style)),
                content,
            )
        }
        DocumentBlock::Rule => Paragraph::new()
            .add_run(Run::new().add_break(BreakType::TextWrapping))
            .set_borders(
                ParagraphBorders::with_empty().set(
                    ParagraphBorder::new(ParagraphBorderPosition::Bottom)
                        .val(BorderType::Single)
                        .size(6)
                        .color("999999"),
                ),
            ),
    }
}

/// Pack blocks into a `.docx` byte buffer.
pub fn pack(blocks: &[DocumentBlock], style: &PageStyle) -> Result<Vec<u8>, DocuglotError> {
    let docx = blocks
        .iter()
        .fold(base_document(style), |docx, block| {
            docx.add_paragraph(block_paragraph(block, style))
        });

    let mut buf = Cursor::new(Vec::new());
    docx.build()
        .pack(&mut buf)
        .map_err(|e| DocuglotError::PackFailed(e.to_string()))?;

    let bytes = buf.into_inner();
    debug!("Packed {} blocks into {} bytes", blocks.len(), bytes.len());
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::inline::StyledRun;
    use docx_rs::{read_docx, DocumentChild, ParagraphChild, RunChild};

    fn sample_blocks() -> Vec<DocumentBlock> {
        vec![
            DocumentBlock::Heading {
                level: 1,
                content: vec![Inline::Run(StyledRun::plain("Title"))],
            },
            DocumentBlock::Paragraph {
                content: vec![
                    Inline::Run(StyledRun::bold("Name")),
                    Inline::Run(StyledRun::plain(": ")),
                    Inline::Run(StyledRun::plain("Ada")),
                    Inline::Break,
                    Inline::Run(StyledRun::italic("second line")),
                ],
            },
            DocumentBlock::ListItem {
                ordered: true,
                level: 1,
                content: vec![Inline::Run(StyledRun::plain("item"))],
            },
            DocumentBlock::Rule,
        ]
    }

    #[test]
    fn output_is_a_zip_package() {
        let bytes = pack(&sample_blocks(), &PageStyle::default()).unwrap();
        assert!(bytes.starts_with(b"PK\x03\x04"));
    }

    #[test]
    fn one_paragraph_per_block() {
        let bytes = pack(&sample_blocks(), &PageStyle::default()).unwrap();
        let docx = read_docx(&bytes).unwrap();
        let paragraphs: Vec<_> = docx
            .document
            .children
            .iter()
            .filter_map(|c| match c {
                DocumentChild::Paragraph(p) => Some(p),
                _ => None,
            })
            .collect();
        assert_eq!(paragraphs.len(), 4);

        let heading_style = paragraphs[0].property.style.as_ref().map(|s| s.val.clone());
        assert_eq!(heading_style.as_deref(), Some("Heading1"));

        let numbering = paragraphs[2].property.numbering_property.as_ref().unwrap();
        assert_eq!(numbering.id.as_ref().unwrap().id, DECIMAL_NUMBERING);
    }

    #[test]
    fn run_formatting_survives() {
        let bytes = pack(&sample_blocks(), &PageStyle::default()).unwrap();
        let docx = read_docx(&bytes).unwrap();
        let DocumentChild::Paragraph(para) = &docx.document.children[1] else {
            panic!("expected a paragraph");
        };
        let runs: Vec<_> = para
            .children
            .iter()
            .filter_map(|c| match c {
                ParagraphChild::Run(r) => Some(r),
                _ => None,
            })
            .collect();
        assert_eq!(runs.len(), 5);
        assert!(runs[0].run_property.bold.is_some());
        assert!(runs[1].run_property.bold.is_none());
        assert!(runs[3]
            .children
            .iter()
            .any(|c| matches!(c, RunChild::Break(_))));
        assert!(runs[4].run_property.italic.is_some());
    }

    #[test]
    fn empty_block_list_still_packs() {
        let bytes = pack(&[], &PageStyle::default()).unwrap();
        assert!(bytes.starts_with(b"PK"));
    }
}
