//! Rich-text-to-markup normalizer: HTML tree → normalized markup.
//!
//! The Word path converts a `.docx` into a small HTML-shaped tree
//! ([`RichNode`]) and this module rewrites it node by node:
//!
//! * `h1`..`h6` → `#` prefixes, surrounded by blank lines,
//! * `ul` / `ol` → one `- ` / `N. ` line per item, existing markers stripped,
//!   nested lists indented under their parent item,
//! * `p` → its inline text between blank lines, with a wider gap when the
//!   paragraph carries a top or bottom margin of 2em or more,
//! * `strong`/`b` and `em`/`i` → `**bold**`, `*italic*`, and `_italic_` where
//!   an asterisk would touch a bold marker.
//!
//! The raw result goes through [`clean_word_markup`], whose last step
//! canonicalizes it into the same dialect the PDF path produces.

use crate::pipeline::layout::LayoutFlags;
use crate::pipeline::postprocess::clean_word_markup;
use crate::pipeline::tokenize::TokenizerOptions;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use tracing::debug;

/// One node of an HTML-shaped document tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RichNode {
    Element {
        /// Lower-case tag name.
        tag: String,
        /// Raw `style` attribute, if any.
        style: Option<String>,
        children: Vec<RichNode>,
    },
    Text(String),
}

impl RichNode {
    pub fn element(tag: &str, children: Vec<RichNode>) -> Self {
        RichNode::Element {
            tag: tag.to_ascii_lowercase(),
            style: None,
            children,
        }
    }

    pub fn styled(tag: &str, style: impl Into<String>, children: Vec<RichNode>) -> Self {
        RichNode::Element {
            tag: tag.to_ascii_lowercase(),
            style: Some(style.into()),
            children,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        RichNode::Text(text.into())
    }

    fn tag(&self) -> Option<&str> {
        match self {
            RichNode::Element { tag, .. } => Some(tag),
            RichNode::Text(_) => None,
        }
    }

    fn children(&self) -> &[RichNode] {
        match self {
            RichNode::Element { children, .. } => children,
            RichNode::Text(_) => &[],
        }
    }

    /// True if this node or any descendant has the given tag.
    fn contains_tag(&self, wanted: &str) -> bool {
        self.tag() == Some(wanted) || self.children().iter().any(|c| c.contains_tag(wanted))
    }
}

/// Result of normalizing a Word document.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedHtml {
    pub markup: String,
    pub flags: LayoutFlags,
}

// ── HTML parsing ─────────────────────────────────────────────────────────────

/// Parse an HTML string (a fragment or a whole document) into rich nodes.
pub fn parse_html(html: &str) -> Vec<RichNode> {
    let document = Html::parse_fragment(html);
    convert_children(document.root_element())
}

fn convert_children(parent: ElementRef<'_>) -> Vec<RichNode> {
    let mut out = Vec::new();
    for child in parent.children() {
        if let Some(element) = ElementRef::wrap(child) {
            let tag = element.value().name().to_ascii_lowercase();
            match tag.as_str() {
                "script" | "style" | "head" | "title" => {}
                // Document wrappers add nothing.
                "html" | "body" => out.extend(convert_children(element)),
                _ => out.push(RichNode::Element {
                    style: element.value().attr("style").map(str::to_string),
                    children: convert_children(element),
                    tag,
                }),
            }
        } else if let Some(text) = child.value().as_text() {
            let text: &str = text;
            out.push(RichNode::Text(text.to_string()));
        }
    }
    out
}

// ── Normalization ────────────────────────────────────────────────────────────

/// Parse and normalize an HTML string.
pub fn normalize_html(html: &str, options: &TokenizerOptions) -> NormalizedHtml {
    normalize_nodes(&parse_html(html), options)
}

/// Normalize an already-built node tree.
pub fn normalize_nodes(nodes: &[RichNode], options: &TokenizerOptions) -> NormalizedHtml {
    let raw = rewrite(nodes);
    let markup = clean_word_markup(&raw, options);
    let flags = LayoutFlags {
        has_tables: nodes.iter().any(|n| n.contains_tag("table")),
        has_images: nodes.iter().any(|n| n.contains_tag("img")),
        ..Default::default()
    };
    debug!("Normalized HTML into {} bytes of markup ({:?})", markup.len(), flags);
    NormalizedHtml { markup, flags }
}

/// Node-type-driven rewrite, before any cleanup rule runs.
pub fn rewrite(nodes: &[RichNode]) -> String {
    let mut out = String::new();
    write_blocks(nodes, &mut out);
    out
}

fn is_inline(node: &RichNode) -> bool {
    match node.tag() {
        None => true,
        Some(tag) => matches!(
            tag,
            "strong"
                | "b"
                | "em"
                | "i"
                | "u"
                | "span"
                | "a"
                | "br"
                | "sup"
                | "sub"
                | "s"
                | "del"
                | "code"
                | "mark"
                | "font"
                | "img"
        ),
    }
}

fn heading_level(tag: &str) -> Option<usize> {
    match tag {
        "h1" => Some(1),
        "h2" => Some(2),
        "h3" => Some(3),
        "h4" => Some(4),
        "h5" => Some(5),
        "h6" => Some(6),
        _ => None,
    }
}

fn write_blocks(nodes: &[RichNode], out: &mut String) {
    let mut pending: Vec<RichNode> = Vec::new();

    for node in nodes {
        if is_inline(node) {
            pending.push(node.clone());
            continue;
        }
        flush_loose_inline(&mut pending, out);

        let Some(tag) = node.tag() else { continue };
        let children = node.children();

        if let Some(level) = heading_level(tag) {
            let text = collapse_spaces(&plain_text(children).replace('\n', " "));
            if !text.is_empty() {
                out.push_str(&format!("\n\n{} {}\n\n", "#".repeat(level), text));
            }
            continue;
        }

        match tag {
            "p" | "pre" => {
                let text = inline_markup(children);
                if text.is_empty() {
                    continue;
                }
                let gap = if has_wide_margin(node) { "\n\n\n" } else { "\n\n" };
                out.push_str(gap);
                out.push_str(&text);
                out.push_str(gap);
            }
            "ul" | "ol" => {
                out.push_str("\n\n");
                out.push_str(&list_lines(node, ""));
                out.push_str("\n\n");
            }
            "hr" => out.push_str("\n\n---\n\n"),
            "table" => write_table(node, out),
            _ => write_blocks(children, out),
        }
    }

    flush_loose_inline(&mut pending, out);
}

fn flush_loose_inline(pending: &mut Vec<RichNode>, out: &mut String) {
    if pending.is_empty() {
        return;
    }
    let text = inline_markup(pending);
    pending.clear();
    if !text.is_empty() {
        out.push_str("\n\n");
        out.push_str(&text);
        out.push_str("\n\n");
    }
}

static RE_MARGIN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"margin-(?:top|bottom)\s*:\s*([0-9.]+)\s*(em|pt)").unwrap());

fn has_wide_margin(node: &RichNode) -> bool {
    let RichNode::Element { style: Some(style), .. } = node else {
        return false;
    };
    RE_MARGIN.captures_iter(style).any(|caps| {
        let value = caps[1].parse::<f32>().unwrap_or(0.0);
        match &caps[2] {
            "em" => value >= 2.0,
            _ => value >= 24.0,
        }
    })
}

// ── Lists ────────────────────────────────────────────────────────────────────

static RE_EXISTING_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(?:[-*•][ \t]+|•|\d+\.[ \t]+)").unwrap());

/// One line per item; nested lists follow their parent item, indented by the
/// parent marker's width.
fn list_lines(list: &RichNode, indent: &str) -> String {
    let ordered = list.tag() == Some("ol");
    let mut lines: Vec<String> = Vec::new();
    let mut position = 0usize;

    for item in list.children().iter().filter(|c| c.tag() == Some("li")) {
        position += 1;
        let marker = if ordered {
            format!("{position}. ")
        } else {
            "- ".to_string()
        };

        let (nested, own): (Vec<&RichNode>, Vec<&RichNode>) = item
            .children()
            .iter()
            .partition(|c| matches!(c.tag(), Some("ul") | Some("ol")));

        let own: Vec<RichNode> = own.into_iter().cloned().collect();
        let text = inline_markup(&flatten_item_blocks(&own)).replace('\n', " ");
        let text = RE_EXISTING_MARKER.replace(text.trim(), "").trim().to_string();
        lines.push(format!("{indent}{marker}{text}").trim_end().to_string());

        let child_indent = format!("{indent}{}", " ".repeat(marker.len()));
        for sub in nested {
            lines.push(list_lines(sub, &child_indent));
        }
    }

    lines.join("\n")
}

/// Paragraphs inside an item are inline content of the item itself.
fn flatten_item_blocks(nodes: &[RichNode]) -> Vec<RichNode> {
    let mut out = Vec::new();
    for node in nodes {
        match node.tag() {
            Some("p") | Some("div") | Some("span") => {
                if !out.is_empty() {
                    out.push(RichNode::text(" "));
                }
                out.extend(node.children().iter().cloned());
            }
            _ => out.push(node.clone()),
        }
    }
    out
}

// ── Tables ───────────────────────────────────────────────────────────────────

/// Tables are not laid out; each row becomes a paragraph of its cell texts.
fn write_table(table: &RichNode, out: &mut String) {
    let mut rows = Vec::new();
    collect_rows(table, &mut rows);
    for row in rows {
        let cells: Vec<String> = row
            .children()
            .iter()
            .filter(|c| matches!(c.tag(), Some("td") | Some("th")))
            .map(|cell| collapse_spaces(&plain_text(cell.children()).replace('\n', " ")))
            .filter(|t| !t.is_empty())
            .collect();
        if !cells.is_empty() {
            out.push_str("\n\n");
            out.push_str(&cells.join(" | "));
            out.push_str("\n\n");
        }
    }
}

fn collect_rows<'a>(node: &'a RichNode, rows: &mut Vec<&'a RichNode>) {
    for child in node.children() {
        if child.tag() == Some("tr") {
            rows.push(child);
        } else {
            collect_rows(child, rows);
        }
    }
}

// ── Inline content ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
enum Piece {
    Run { text: String, bold: bool, italic: bool },
    Break,
}

static RE_WHITESPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());
static RE_SPACES: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").unwrap());

fn collapse_spaces(text: &str) -> String {
    RE_SPACES.replace_all(text, " ").trim().to_string()
}

fn plain_text(nodes: &[RichNode]) -> String {
    let mut out = String::new();
    for node in nodes {
        match node {
            RichNode::Text(text) => out.push_str(&RE_WHITESPACE.replace_all(text, " ")),
            RichNode::Element { tag, .. } if tag == "br" => out.push('\n'),
            RichNode::Element { children, .. } => out.push_str(&plain_text(children)),
        }
    }
    out
}

fn flatten_inline(nodes: &[RichNode], bold: bool, italic: bool, pieces: &mut Vec<Piece>) {
    for node in nodes {
        match node {
            RichNode::Text(text) => {
                let text = RE_WHITESPACE.replace_all(text, " ");
                if text.is_empty() {
                    continue;
                }
                match pieces.last_mut() {
                    Some(Piece::Run {
                        text: prev,
                        bold: b,
                        italic: i,
                    }) if *b == bold && *i == italic => prev.push_str(&text),
                    _ => pieces.push(Piece::Run {
                        text: text.into_owned(),
                        bold,
                        italic,
                    }),
                }
            }
            RichNode::Element { tag, children, .. } => match tag.as_str() {
                "br" => pieces.push(Piece::Break),
                "strong" | "b" => flatten_inline(children, true, italic, pieces),
                "em" | "i" => flatten_inline(children, bold, true, pieces),
                "img" => {}
                _ => flatten_inline(children, bold, italic, pieces),
            },
        }
    }
}

/// Wrap the non-blank core of `text` in `marker`, keeping edge whitespace
/// outside the markers.
fn wrap(text: &str, marker: &str) -> String {
    let core = text.trim();
    if core.is_empty() {
        return text.to_string();
    }
    let lead = &text[..text.len() - text.trim_start().len()];
    let trail = &text[text.trim_end().len()..];
    format!("{lead}{marker}{core}{marker}{trail}")
}

/// One bold-or-not group of `(text, italic)` runs.
struct Group {
    bold: bool,
    runs: Vec<(String, bool)>,
}

fn render_line(runs: &[(String, bool, bool)]) -> String {
    let mut groups: Vec<Group> = Vec::new();
    for (text, bold, italic) in runs {
        match groups.last_mut() {
            Some(group) if group.bold == *bold => group.runs.push((text.clone(), *italic)),
            _ => groups.push(Group {
                bold: *bold,
                runs: vec![(text.clone(), *italic)],
            }),
        }
    }

    let mut out = String::new();
    for (g, group) in groups.iter().enumerate() {
        let last = group.runs.len() - 1;
        let mut inner = String::new();
        for (k, (text, italic)) in group.runs.iter().enumerate() {
            if !italic {
                inner.push_str(text);
                continue;
            }
            let touches_bold = if group.bold {
                k == 0 || k == last
            } else {
                (k == 0 && g > 0 && groups[g - 1].bold)
                    || (k == last && groups.get(g + 1).is_some_and(|n| n.bold))
            };
            inner.push_str(&wrap(text, if touches_bold { "_" } else { "*" }));
        }
        if group.bold {
            out.push_str(&wrap(&inner, "**"));
        } else {
            out.push_str(&inner);
        }
    }
    out
}

/// Render inline nodes as one markup string; `<br>` becomes `\n`.
fn inline_markup(nodes: &[RichNode]) -> String {
    let mut pieces = Vec::new();
    flatten_inline(nodes, false, false, &mut pieces);

    let mut lines: Vec<Vec<(String, bool, bool)>> = vec![Vec::new()];
    for piece in pieces {
        match piece {
            Piece::Break => lines.push(Vec::new()),
            Piece::Run { text, bold, italic } => {
                if let Some(line) = lines.last_mut() {
                    line.push((text, bold, italic));
                }
            }
        }
    }

    lines
        .iter()
        .map(|line| collapse_spaces(&render_line(line)))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn md(html: &str) -> String {
        normalize_html(html, &TokenizerOptions::default()).markup
    }

    #[test]
    fn headings_and_paragraphs() {
        assert_eq!(
            md("<h1>Title</h1><p>First   paragraph.</p><h2>Sub</h2><p>Second.</p>"),
            "# Title\n\nFirst paragraph.\n\n## Sub\n\nSecond.\n"
        );
    }

    #[test]
    fn heading_drops_emphasis() {
        assert_eq!(md("<h3><strong>Bold</strong> head</h3>"), "### Bold head\n");
    }

    #[test]
    fn inline_emphasis() {
        assert_eq!(
            md("<p>A <strong>bold</strong> and <em>italic</em> word.</p>"),
            "A **bold** and *italic* word.\n"
        );
    }

    #[test]
    fn italic_inside_bold_uses_underscores_at_edges() {
        assert_eq!(
            md("<p><strong><em>all</em> of it</strong></p>"),
            "**_all_ of it**\n"
        );
    }

    #[test]
    fn italic_touching_bold_uses_underscores() {
        assert_eq!(
            md("<p><em>lead</em><strong>bold</strong></p>"),
            "_lead_**bold**\n"
        );
    }

    #[test]
    fn edge_whitespace_moves_outside_markers() {
        assert_eq!(
            md("<p>x<strong> y </strong>z</p>"),
            "x **y** z\n"
        );
    }

    #[test]
    fn unordered_list_strips_existing_markers() {
        assert_eq!(
            md("<ul><li>• one</li><li>- two</li></ul>"),
            "- one\n\n- two\n"
        );
    }

    #[test]
    fn ordered_list_numbers_by_position() {
        assert_eq!(
            md("<ol><li>1. first</li><li>second</li><li>7. third</li></ol>"),
            "1. first\n\n2. second\n\n3. third\n"
        );
    }

    #[test]
    fn nested_list_is_indented() {
        assert_eq!(
            md("<ul><li>parent<ul><li>child</li></ul></li><li>sibling</li></ul>"),
            "- parent\n\n  - child\n\n- sibling\n"
        );
    }

    #[test]
    fn nested_list_keeps_its_level_after_a_two_digit_marker() {
        use crate::pipeline::reconstruct::{reconstruct, DocumentBlock, ListNesting};
        use crate::pipeline::tokenize::tokenize;

        let items: String = (0..9).map(|_| "<li>i</li>").collect();
        let html = format!(
            "<ol>{items}</ol><p>mid</p><ol><li>parent<ul><li>child</li></ul></li></ol>"
        );
        let out = md(&html);
        assert!(out.ends_with("10. parent\n\n    - child\n"), "got: {out:?}");

        let tokens = tokenize(&out, &TokenizerOptions::default());
        let blocks = reconstruct(&tokens, ListNesting::Tracked);
        assert!(
            matches!(
                blocks.last(),
                Some(DocumentBlock::ListItem { ordered: false, level: 1, .. })
            ),
            "got: {:?}",
            blocks.last()
        );
    }

    #[test]
    fn wide_margin_paragraph_is_kept() {
        let out = md(r#"<p>before</p><p style="margin-top: 2em">spaced</p>"#);
        assert_eq!(out, "before\n\nspaced\n");
        let raw = rewrite(&parse_html(r#"<p style="margin-bottom:2em">spaced</p>"#));
        assert_eq!(raw, "\n\n\nspaced\n\n\n");
    }

    #[test]
    fn line_break_splits_paragraph() {
        assert_eq!(md("<p>line one<br>line two</p>"), "line one\n\nline two\n");
    }

    #[test]
    fn loose_inline_content_becomes_paragraph() {
        assert_eq!(md("plain <b>text</b><p>para</p>"), "plain **text**\n\npara\n");
    }

    #[test]
    fn flags_from_tags() {
        let out = normalize_html(
            "<p>x</p><table><tr><td>a</td><td>b</td></tr></table><p><img src=\"x.png\"></p>",
            &TokenizerOptions::default(),
        );
        assert!(out.flags.has_tables);
        assert!(out.flags.has_images);
        assert!(!out.flags.has_header);
        assert_eq!(out.markup, "x\n\na | b\n");
    }

    #[test]
    fn empty_html_gives_blank_markup() {
        assert_eq!(md("<p>   </p>"), "\n");
    }

    #[test]
    fn built_tree_matches_parsed_html() {
        let nodes = vec![
            RichNode::element("h2", vec![RichNode::text("Menu")]),
            RichNode::element(
                "p",
                vec![
                    RichNode::element("strong", vec![RichNode::text("Soup")]),
                    RichNode::text(": tomato"),
                ],
            ),
        ];
        let built = normalize_nodes(&nodes, &TokenizerOptions::default()).markup;
        assert_eq!(built, md("<h2>Menu</h2><p><strong>Soup</strong>: tomato</p>"));
        assert_eq!(built, "## Menu\n\n**Soup**: tomato\n");
    }
}
