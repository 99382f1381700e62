//! Geometry-to-markup normalizer: positioned PDF fragments → normalized markup.
//!
//! Structure is inferred purely from typography and position:
//!
//! * font size picks the heading level (20 / 16 / 14 pt by default),
//! * a leading bullet glyph or `N.` makes a list item,
//! * a bold font name makes `**bold**` (only the label when the fragment
//!   reads `Label: value`), an italic font name makes `*italic*`,
//! * the vertical distance to the previous fragment picks the separator:
//!   same line, line break, paragraph break or wide paragraph break.
//!
//! Pages are joined by a `---` rule line. The concatenated string is handed to
//! [`crate::pipeline::postprocess::clean_pdf_markup`] for the idempotent
//! cleanup pass.

use crate::pipeline::postprocess::clean_pdf_markup;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One positioned piece of text as extracted from a PDF page.
///
/// `y` is measured from the bottom of the page (PDF user space), so larger
/// values are higher on the page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionedFragment {
    pub text: String,
    pub font_size: f32,
    pub font_name: String,
    pub x: f32,
    pub y: f32,
}

impl PositionedFragment {
    pub fn new(
        text: impl Into<String>,
        font_size: f32,
        font_name: impl Into<String>,
        x: f32,
        y: f32,
    ) -> Self {
        Self {
            text: text.into(),
            font_size,
            font_name: font_name.into(),
            x,
            y,
        }
    }
}

/// Everything the normalizer needs from one page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PageLayout {
    /// Page height in points.
    pub height: f32,
    pub fragments: Vec<PositionedFragment>,
    /// Number of image objects painted on the page.
    pub image_count: usize,
}

/// Informational evidence gathered alongside the markup. Never affects it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LayoutFlags {
    pub has_header: bool,
    pub has_footer: bool,
    pub has_tables: bool,
    pub has_images: bool,
}

/// Order in which a page's fragments are visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ReadingOrder {
    /// Keep the order the extractor produced. (default)
    #[default]
    Extractor,
    /// Re-sort top-to-bottom, then left-to-right within a line.
    Positional,
}

/// Thresholds used by the normalizer. All distances are in points.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutOptions {
    /// Minimum font size for a level-1 heading.
    pub h1_size: f32,
    /// Minimum font size for a level-2 heading.
    pub h2_size: f32,
    /// Minimum font size for a level-3 heading.
    pub h3_size: f32,
    /// Vertical deltas below this are the same line.
    pub line_tolerance: f32,
    /// Vertical deltas above this start a new paragraph.
    pub paragraph_gap: f32,
    /// Vertical deltas above this start a new paragraph with a wider gap.
    pub wide_gap: f32,
    /// Horizontal jump on the same line that is rendered as a tab stop.
    pub tab_gap: f32,
    /// Fraction of the page height treated as header / footer band on page 1.
    pub band: f32,
    pub reading_order: ReadingOrder,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self {
            h1_size: 20.0,
            h2_size: 16.0,
            h3_size: 14.0,
            line_tolerance: 3.0,
            paragraph_gap: 12.0,
            wide_gap: 24.0,
            tab_gap: 18.0,
            band: 0.1,
            reading_order: ReadingOrder::Extractor,
        }
    }
}

impl LayoutOptions {
    /// Heading level for a font size, 0 when the text is not a heading.
    pub fn heading_level(&self, font_size: f32) -> u8 {
        let size = font_size.abs();
        if size >= self.h1_size {
            1
        } else if size >= self.h2_size {
            2
        } else if size >= self.h3_size {
            3
        } else {
            0
        }
    }
}

/// Result of normalizing a whole PDF.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedPdf {
    pub markup: String,
    pub flags: LayoutFlags,
    pub page_count: usize,
}

// ── Fragment classification ──────────────────────────────────────────────────

static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[•\-*]").unwrap());
static RE_NUMBERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+\.").unwrap());
static RE_TABLE_PIPES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\|.*\|").unwrap());

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ListKind {
    Bullet,
    Numbered,
}

impl ListKind {
    fn prefix(self) -> &'static str {
        match self {
            ListKind::Bullet => "- ",
            ListKind::Numbered => "1. ",
        }
    }
}

/// One fragment rewritten into markup, plus what the separator logic needs.
#[derive(Debug, Clone, PartialEq, Eq)]
struct FragmentMarkup {
    /// Formatted text without the heading or list prefix.
    body: String,
    heading: u8,
    list: Option<ListKind>,
}

impl FragmentMarkup {
    fn render(&self) -> String {
        if let Some(kind) = self.list {
            format!("{}{}", kind.prefix(), self.body)
        } else if self.heading > 0 {
            format!("{} {}", "#".repeat(self.heading as usize), self.body)
        } else {
            self.body.clone()
        }
    }

    fn starts_line(&self) -> bool {
        self.heading > 0 || self.list.is_some()
    }
}

fn split_list_prefix(text: &str) -> (Option<ListKind>, &str) {
    if let Some(m) = RE_BULLET.find(text) {
        (Some(ListKind::Bullet), text[m.end()..].trim())
    } else if let Some(m) = RE_NUMBERED.find(text) {
        (Some(ListKind::Numbered), text[m.end()..].trim())
    } else {
        (None, text)
    }
}

fn apply_font_style(text: &str, font_name: &str) -> String {
    let font = font_name.to_lowercase();
    let bold = font.contains("bold");
    let italic = font.contains("italic");

    if bold {
        if let Some((label, rest)) = text.split_once(':') {
            let label = label.trim();
            if !label.is_empty() {
                return format!("**{}**: {}", label, rest.trim());
            }
        }
    }

    let mut out = text.to_string();
    if bold {
        out = format!("**{out}**");
    }
    if italic {
        out = format!("*{out}*");
    }
    out
}

fn classify(
    text: &str,
    font_size: f32,
    font_name: &str,
    options: &LayoutOptions,
) -> FragmentMarkup {
    let (list, rest) = split_list_prefix(text);
    let heading = if list.is_some() {
        0
    } else {
        options.heading_level(font_size)
    };
    FragmentMarkup {
        body: apply_font_style(rest, font_name),
        heading,
        list,
    }
}

// ── Separators ───────────────────────────────────────────────────────────────

/// Rough end-of-text x position; PDF fragments carry no width.
fn estimated_end(fragment: &PositionedFragment) -> f32 {
    fragment.x + fragment.text.chars().count() as f32 * fragment.font_size.abs() * 0.5
}

fn geometric_separator(
    prev: &PositionedFragment,
    cur: &PositionedFragment,
    options: &LayoutOptions,
) -> &'static str {
    let dy = (cur.y - prev.y).abs();
    if dy < options.line_tolerance {
        if cur.x - estimated_end(prev) > options.tab_gap {
            "    "
        } else {
            " "
        }
    } else if dy > options.wide_gap {
        "\n\n\n"
    } else if dy > options.paragraph_gap {
        "\n\n"
    } else {
        "\n"
    }
}

// ── Page / document ──────────────────────────────────────────────────────────

fn ordered_fragments<'a>(
    page: &'a PageLayout,
    options: &LayoutOptions,
) -> Vec<&'a PositionedFragment> {
    let mut fragments: Vec<&PositionedFragment> = page.fragments.iter().collect();
    if options.reading_order == ReadingOrder::Extractor {
        return fragments;
    }

    fragments.sort_by(|a, b| b.y.total_cmp(&a.y));

    let mut lines: Vec<Vec<&PositionedFragment>> = Vec::new();
    for fragment in fragments {
        match lines.last_mut() {
            Some(line) if (line[0].y - fragment.y).abs() < options.line_tolerance => {
                line.push(fragment)
            }
            _ => lines.push(vec![fragment]),
        }
    }
    for line in &mut lines {
        line.sort_by(|a, b| a.x.total_cmp(&b.x));
    }
    lines.into_iter().flatten().collect()
}

/// Render one page's fragments into markup (before cleanup).
pub fn page_markup(page: &PageLayout, options: &LayoutOptions) -> String {
    let mut out = String::new();
    let mut prev: Option<(&PositionedFragment, FragmentMarkup)> = None;
    let mut pending_bullet: Option<ListKind> = None;

    for fragment in ordered_fragments(page, options) {
        let text = fragment.text.trim();
        if text.is_empty() {
            continue;
        }

        let mut markup = classify(text, fragment.font_size, &fragment.font_name, options);

        // A marker extracted as its own fragment applies to the next one.
        if markup.list.is_some() && markup.body.is_empty() {
            pending_bullet = markup.list;
            continue;
        }
        if let Some(kind) = pending_bullet.take() {
            markup.list = Some(kind);
            markup.heading = 0;
        }

        match &prev {
            None => out.push_str(&markup.render()),
            Some((prev_fragment, prev_markup)) => {
                let sep = geometric_separator(prev_fragment, fragment, options);
                let same_line = !sep.contains('\n');

                if same_line
                    && prev_markup.heading > 0
                    && markup.heading == prev_markup.heading
                    && markup.list.is_none()
                {
                    // Heading text split across fragments.
                    out.push(' ');
                    out.push_str(&markup.body);
                } else {
                    if same_line && (markup.starts_line() || prev_markup.heading > 0) {
                        out.push('\n');
                    } else {
                        out.push_str(sep);
                    }
                    out.push_str(&markup.render());
                }
            }
        }

        prev = Some((fragment, markup));
    }

    out
}

/// Collect header/footer/table/image evidence.
pub fn detect_flags(pages: &[PageLayout], options: &LayoutOptions) -> LayoutFlags {
    let mut flags = LayoutFlags {
        has_images: pages.iter().any(|p| p.image_count > 0),
        ..Default::default()
    };

    if let Some(first) = pages.first() {
        let top = first.height * (1.0 - options.band);
        let bottom = first.height * options.band;
        for fragment in first.fragments.iter().filter(|f| !f.text.trim().is_empty()) {
            flags.has_header |= fragment.y > top;
            flags.has_footer |= fragment.y < bottom;
        }
    }

    flags.has_tables = pages.iter().flat_map(|p| &p.fragments).any(|f| {
        RE_TABLE_PIPES.is_match(&f.text)
            || f.text.chars().any(|c| ('\u{2500}'..='\u{257F}').contains(&c))
    });

    flags
}

/// Normalize every page of a PDF into one markup string.
pub fn normalize_pages(pages: &[PageLayout], options: &LayoutOptions) -> NormalizedPdf {
    let raw = pages
        .iter()
        .map(|page| page_markup(page, options))
        .collect::<Vec<_>>()
        .join("\n\n---\n\n");

    let markup = clean_pdf_markup(&raw);
    let flags = detect_flags(pages, options);
    debug!(
        "Normalized {} pages into {} bytes of markup ({:?})",
        pages.len(),
        markup.len(),
        flags
    );

    NormalizedPdf {
        markup,
        flags,
        page_count: pages.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frag(text: &str, size: f32, font: &str, x: f32, y: f32) -> PositionedFragment {
        PositionedFragment::new(text, size, font, x, y)
    }

    fn page(fragments: Vec<PositionedFragment>) -> PageLayout {
        PageLayout {
            height: 800.0,
            fragments,
            image_count: 0,
        }
    }

    fn markup(fragments: Vec<PositionedFragment>) -> String {
        normalize_pages(&[page(fragments)], &LayoutOptions::default()).markup
    }

    #[test]
    fn heading_thresholds() {
        let opts = LayoutOptions::default();
        assert_eq!(opts.heading_level(20.0), 1);
        assert_eq!(opts.heading_level(19.9), 2);
        assert_eq!(opts.heading_level(16.0), 2);
        assert_eq!(opts.heading_level(14.0), 3);
        assert_eq!(opts.heading_level(13.9), 0);
    }

    #[test]
    fn size_twenty_is_level_one() {
        assert_eq!(markup(vec![frag("Title", 20.0, "Helvetica", 72.0, 700.0)]), "# Title\n");
    }

    #[test]
    fn size_just_below_twenty_is_level_two() {
        assert_eq!(
            markup(vec![frag("Title", 19.9, "Helvetica", 72.0, 700.0)]),
            "## Title\n"
        );
    }

    #[test]
    fn small_text_is_plain() {
        assert_eq!(markup(vec![frag("Body", 12.0, "Helvetica", 72.0, 700.0)]), "Body\n");
    }

    #[test]
    fn bullet_prefix_is_canonicalized() {
        assert_eq!(
            markup(vec![frag("• Apples", 12.0, "Helvetica", 72.0, 700.0)]),
            "- Apples\n"
        );
    }

    #[test]
    fn list_wins_over_heading() {
        assert_eq!(
            markup(vec![frag("3. Large item", 22.0, "Helvetica", 72.0, 700.0)]),
            "1. Large item\n"
        );
    }

    #[test]
    fn bold_label_only_wraps_label() {
        assert_eq!(
            markup(vec![frag("Name: John: Doe", 12.0, "Arial-BoldMT", 72.0, 700.0)]),
            "**Name**: John: Doe\n"
        );
    }

    #[test]
    fn bold_italic_without_colon_wraps_twice() {
        assert_eq!(
            markup(vec![frag("Note", 12.0, "Times-BoldItalic", 72.0, 700.0)]),
            "***Note***\n"
        );
    }

    #[test]
    fn bold_list_item_styles_text_after_prefix() {
        assert_eq!(
            markup(vec![frag("- Key point", 12.0, "Arial-Bold", 72.0, 700.0)]),
            "- **Key point**\n"
        );
    }

    #[test]
    fn vertical_gaps_pick_separators() {
        let out = markup(vec![
            frag("one", 12.0, "F", 72.0, 700.0),
            frag("two", 12.0, "F", 100.0, 699.0),
            frag("three", 12.0, "F", 72.0, 690.0),
            frag("four", 12.0, "F", 72.0, 675.0),
            frag("five", 12.0, "F", 72.0, 640.0),
        ]);
        assert_eq!(out, "one two\nthree\n\nfour\n\n\nfive\n");
    }

    #[test]
    fn horizontal_jump_is_a_tab() {
        let out = markup(vec![
            frag("Qty", 12.0, "F", 72.0, 700.0),
            frag("12", 12.0, "F", 300.0, 700.0),
        ]);
        assert_eq!(out, "Qty    12\n");
    }

    #[test]
    fn heading_gets_its_own_line_and_spacing() {
        let out = markup(vec![
            frag("Intro", 24.0, "F", 72.0, 700.0),
            frag("text right after", 12.0, "F", 72.0, 690.0),
        ]);
        assert_eq!(out, "# Intro\n\ntext right after\n");
    }

    #[test]
    fn split_heading_fragments_join() {
        let out = markup(vec![
            frag("Annual", 24.0, "F", 72.0, 700.0),
            frag("Report", 24.0, "F", 160.0, 700.0),
        ]);
        assert_eq!(out, "# Annual Report\n");
    }

    #[test]
    fn detached_bullet_applies_to_next_fragment() {
        let out = markup(vec![
            frag("•", 12.0, "Symbol", 72.0, 700.0),
            frag("Detached item", 12.0, "F", 84.0, 700.0),
        ]);
        assert_eq!(out, "- Detached item\n");
    }

    #[test]
    fn three_pages_two_rules() {
        let pages: Vec<PageLayout> = (1..=3)
            .map(|n| page(vec![frag(&format!("Page {n}"), 12.0, "F", 72.0, 700.0)]))
            .collect();
        let out = normalize_pages(&pages, &LayoutOptions::default());
        assert_eq!(out.markup, "Page 1\n\n---\n\nPage 2\n\n---\n\nPage 3\n");
        assert_eq!(out.page_count, 3);
    }

    #[test]
    fn positional_order_sorts_lines() {
        let opts = LayoutOptions {
            reading_order: ReadingOrder::Positional,
            ..Default::default()
        };
        let p = page(vec![
            frag("second", 12.0, "F", 72.0, 680.0),
            frag("world", 12.0, "F", 110.0, 700.0),
            frag("hello", 12.0, "F", 72.0, 701.0),
        ]);
        assert_eq!(normalize_pages(&[p], &opts).markup, "hello world\n\nsecond\n");
    }

    #[test]
    fn flags_from_first_page_bands() {
        let p = PageLayout {
            height: 1000.0,
            fragments: vec![
                frag("Running head", 9.0, "F", 72.0, 950.0),
                frag("| a | b |", 12.0, "F", 72.0, 500.0),
            ],
            image_count: 1,
        };
        let flags = detect_flags(&[p], &LayoutOptions::default());
        assert!(flags.has_header);
        assert!(!flags.has_footer);
        assert!(flags.has_tables);
        assert!(flags.has_images);
    }

    #[test]
    fn box_drawing_counts_as_table() {
        let p = page(vec![frag("┌──┐", 12.0, "F", 72.0, 400.0)]);
        assert!(detect_flags(&[p], &LayoutOptions::default()).has_tables);
    }

    #[test]
    fn normalization_is_idempotent() {
        let out = markup(vec![
            frag("Heading", 18.0, "F", 72.0, 700.0),
            frag("• first", 12.0, "F", 72.0, 680.0),
            frag("• second", 12.0, "F", 72.0, 668.0),
            frag("Closing words", 12.0, "F", 72.0, 600.0),
        ]);
        assert_eq!(clean_pdf_markup(&out), out);
    }
}
