//! `.docx` bytes → HTML-shaped [`RichNode`] tree.
//!
//! Only what the rich-text normalizer reads is carried over: heading styles,
//! list membership and nesting, bold/italic runs, line breaks, paragraph
//! spacing, tables and drawings (as bare `img` nodes for detection).

use crate::error::DocuglotError;
use crate::pipeline::html::RichNode;
use docx_rs::{DocumentChild, Paragraph, ParagraphChild, Run, RunChild};
use std::collections::HashMap;
use tracing::debug;

/// Paragraph spacing (twips) at or above which a paragraph is "widely spaced".
const WIDE_SPACING_TWIPS: u64 = 480;

/// Read a `.docx` package and convert its body into rich nodes.
pub fn read_docx_nodes(bytes: &[u8], name: &str) -> Result<Vec<RichNode>, DocuglotError> {
    let docx = docx_rs::read_docx(bytes).map_err(|e| DocuglotError::CorruptDocx {
        name: name.to_string(),
        detail: e.to_string(),
    })?;

    let formats = list_formats(&docx.numberings);
    let mut nodes = Vec::new();
    let mut pending_items: Vec<ListParagraph> = Vec::new();

    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(para) => {
                if let Some(item) = list_paragraph(para, &formats) {
                    pending_items.push(item);
                    continue;
                }
                flush_lists(&mut pending_items, &mut nodes);
                nodes.push(paragraph_node(para));
            }
            DocumentChild::Table(table) => {
                flush_lists(&mut pending_items, &mut nodes);
                nodes.push(table_node(table));
            }
            _ => {}
        }
    }
    flush_lists(&mut pending_items, &mut nodes);

    debug!("Read {} top-level nodes from '{}'", nodes.len(), name);
    Ok(nodes)
}

// ── Paragraphs ───────────────────────────────────────────────────────────────

fn heading_level(para: &Paragraph) -> Option<usize> {
    let style = para.property.style.as_ref()?;
    let val = style.val.as_str();
    match val {
        "Title" => Some(1),
        "Subtitle" => Some(2),
        _ if val.starts_with("Heading") || val.starts_with("heading") => {
            let level = val
                .chars()
                .last()
                .and_then(|c| c.to_digit(10))
                .unwrap_or(1);
            Some(level.clamp(1, 6) as usize)
        }
        _ => None,
    }
}

fn paragraph_node(para: &Paragraph) -> RichNode {
    let inlines = paragraph_inlines(para);
    if let Some(level) = heading_level(para) {
        return RichNode::element(&format!("h{level}"), inlines);
    }
    match spacing_style(para) {
        Some(style) => RichNode::styled("p", style, inlines),
        None => RichNode::element("p", inlines),
    }
}

/// `margin-top` / `margin-bottom` for widely spaced paragraphs.
///
/// `LineSpacing` keeps its fields private, so its serialised form is read.
fn spacing_style(para: &Paragraph) -> Option<String> {
    let spacing = serde_json::to_value(para.property.line_spacing.as_ref()?).ok()?;
    let twips = |key: &str| spacing.get(key).and_then(|v| v.as_u64()).unwrap_or(0);

    let mut style = Vec::new();
    if twips("before") >= WIDE_SPACING_TWIPS {
        style.push("margin-top: 2em");
    }
    if twips("after") >= WIDE_SPACING_TWIPS {
        style.push("margin-bottom: 2em");
    }
    (!style.is_empty()).then(|| style.join("; "))
}

fn paragraph_inlines(para: &Paragraph) -> Vec<RichNode> {
    let mut out = Vec::new();
    push_children(&para.children, &mut out);
    out
}

fn push_children(children: &[ParagraphChild], out: &mut Vec<RichNode>) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => push_run(run, out),
            ParagraphChild::Insert(insert) => {
                for child in &insert.children {
                    if let docx_rs::InsertChild::Run(run) = child {
                        push_run(run, out);
                    }
                }
            }
            ParagraphChild::Hyperlink(link) => push_children(&link.children, out),
            _ => {}
        }
    }
}

fn push_run(run: &Run, out: &mut Vec<RichNode>) {
    let bold = run.run_property.bold.is_some();
    let italic = run.run_property.italic.is_some();
    let mut text = String::new();

    let flush = |text: &mut String, out: &mut Vec<RichNode>| {
        if text.is_empty() {
            return;
        }
        let mut node = RichNode::text(std::mem::take(text));
        if italic {
            node = RichNode::element("em", vec![node]);
        }
        if bold {
            node = RichNode::element("strong", vec![node]);
        }
        out.push(node);
    };

    for child in &run.children {
        match child {
            RunChild::Text(t) => text.push_str(&t.text),
            RunChild::Tab(_) => text.push(' '),
            RunChild::Break(_) => {
                flush(&mut text, out);
                out.push(RichNode::element("br", Vec::new()));
            }
            RunChild::Drawing(_) => {
                flush(&mut text, out);
                out.push(RichNode::element("img", Vec::new()));
            }
            _ => {}
        }
    }
    flush(&mut text, out);
}

// ── Lists ────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct ListParagraph {
    level: usize,
    ordered: bool,
    inlines: Vec<RichNode>,
}

/// `(numId, level)` → ordered, read from the numbering definitions.
///
/// Numbering types do not expose their fields uniformly across docx-rs
/// releases; the serialised form is stable.
fn list_formats(numberings: &docx_rs::Numberings) -> HashMap<(u64, u64), bool> {
    let mut formats = HashMap::new();
    let Ok(json) = serde_json::to_value(numberings) else {
        return formats;
    };

    let mut abstract_levels: HashMap<u64, Vec<(u64, bool)>> = HashMap::new();
    for abs in json["abstractNums"].as_array().into_iter().flatten() {
        let Some(id) = abs["id"].as_u64() else { continue };
        let levels = abs["levels"]
            .as_array()
            .into_iter()
            .flatten()
            .filter_map(|level| {
                let lvl = level["level"].as_u64()?;
                let format = match &level["format"] {
                    serde_json::Value::String(s) => s.clone(),
                    other => other["val"].as_str().unwrap_or_default().to_string(),
                };
                Some((lvl, format != "bullet" && format != "none"))
            })
            .collect();
        abstract_levels.insert(id, levels);
    }

    for num in json["numberings"].as_array().into_iter().flatten() {
        let (Some(id), Some(abs_id)) = (num["id"].as_u64(), num["abstractNumId"].as_u64()) else {
            continue;
        };
        for (lvl, ordered) in abstract_levels.get(&abs_id).into_iter().flatten() {
            formats.insert((id, *lvl), *ordered);
        }
    }
    formats
}

fn list_paragraph(para: &Paragraph, formats: &HashMap<(u64, u64), bool>) -> Option<ListParagraph> {
    let num_pr = para.property.numbering_property.as_ref()?;
    let num_id = num_pr.id.as_ref()?.id as u64;
    // numId 0 switches numbering off.
    if num_id == 0 {
        return None;
    }
    let level = num_pr.level.as_ref().map(|l| l.val as usize).unwrap_or(0);
    Some(ListParagraph {
        level,
        ordered: formats.get(&(num_id, level as u64)).copied().unwrap_or(false),
        inlines: paragraph_inlines(para),
    })
}

fn flush_lists(items: &mut Vec<ListParagraph>, nodes: &mut Vec<RichNode>) {
    let mut start = 0;
    while start < items.len() {
        let level = items[start].level;
        nodes.push(build_list(items, &mut start, level));
    }
    items.clear();
}

/// Build one `ul`/`ol` from `items[*start..]` at `level`; deeper items nest
/// into the preceding `li`.
fn build_list(items: &[ListParagraph], start: &mut usize, level: usize) -> RichNode {
    let ordered = items[*start].ordered;
    let mut lis: Vec<RichNode> = Vec::new();

    while *start < items.len() {
        let item = &items[*start];
        if item.level < level {
            break;
        }
        if item.level > level {
            let nested = build_list(items, start, item.level);
            match lis.last_mut() {
                Some(RichNode::Element { children, .. }) => children.push(nested),
                _ => lis.push(RichNode::element("li", vec![nested])),
            }
            continue;
        }
        if item.ordered != ordered && !lis.is_empty() {
            break;
        }
        lis.push(RichNode::element("li", item.inlines.clone()));
        *start += 1;
    }

    RichNode::element(if ordered { "ol" } else { "ul" }, lis)
}

// ── Tables ───────────────────────────────────────────────────────────────────

fn table_node(table: &docx_rs::Table) -> RichNode {
    let mut rows = Vec::new();
    for table_child in &table.rows {
        let docx_rs::TableChild::TableRow(row) = table_child;
        let mut cells = Vec::new();
        for row_child in &row.cells {
            let docx_rs::TableRowChild::TableCell(cell) = row_child;
            let mut inlines = Vec::new();
            for content in &cell.children {
                if let docx_rs::TableCellContent::Paragraph(para) = content {
                    if !inlines.is_empty() {
                        inlines.push(RichNode::text(" "));
                    }
                    inlines.extend(paragraph_inlines(para));
                }
            }
            cells.push(RichNode::element("td", inlines));
        }
        rows.push(RichNode::element("tr", cells));
    }
    RichNode::element("table", rows)
}
