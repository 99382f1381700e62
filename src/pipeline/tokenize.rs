//! Markup tokenizer: normalized markup → flat token sequence.
//!
//! Parsing is delegated to `pulldown-cmark`; this module narrows its event
//! stream to the small token vocabulary the reconstructor understands and
//! records the nesting depth of every token so that list and list-item spans
//! can be matched by index with [`match_close`].
//!
//! Inline content is not parsed here. The `Text` token of a heading or
//! paragraph carries the raw markup of its inline span (emphasis markers
//! included) so the inline segmenter sees exactly what the normalizer wrote.
//!
//! Tight list items have no paragraph in CommonMark; a hidden paragraph is
//! synthesised around their inline content so every list item looks the same
//! to the consumer.

use pulldown_cmark::{Event, Options, Parser, Tag, TagEnd};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// Parser options. Passed explicitly into every [`tokenize`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TokenizerOptions {
    /// Recognise `~~strike~~` spans. Default: false.
    pub strikethrough: bool,
    /// Recognise GFM pipe tables. Default: false (table rows stay paragraphs).
    pub tables: bool,
}

impl TokenizerOptions {
    fn parser_options(&self) -> Options {
        let mut options = Options::empty();
        if self.strikethrough {
            options.insert(Options::ENABLE_STRIKETHROUGH);
        }
        if self.tables {
            options.insert(Options::ENABLE_TABLES);
        }
        options
    }
}

/// One typed token with its nesting depth.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarkupToken {
    pub kind: TokenKind,
    /// Number of enclosing open tokens. An open token and its close share
    /// the same depth.
    pub depth: usize,
}

impl MarkupToken {
    pub fn new(kind: TokenKind, depth: usize) -> Self {
        Self { kind, depth }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TokenKind {
    OpenHeading(u8),
    CloseHeading,
    OpenParagraph,
    CloseParagraph,
    OpenList { ordered: bool },
    CloseList,
    OpenListItem,
    CloseListItem,
    Text(String),
    HorizontalRule,
    /// Any construct outside the dialect (raw HTML blocks, tables).
    /// Consumers skip these.
    Other(String),
}

/// Open/close token families used for span matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenFamily {
    Heading,
    Paragraph,
    List,
    ListItem,
}

impl TokenKind {
    /// The family and whether this token opens (`true`) or closes it.
    pub fn family(&self) -> Option<(TokenFamily, bool)> {
        match self {
            TokenKind::OpenHeading(_) => Some((TokenFamily::Heading, true)),
            TokenKind::CloseHeading => Some((TokenFamily::Heading, false)),
            TokenKind::OpenParagraph => Some((TokenFamily::Paragraph, true)),
            TokenKind::CloseParagraph => Some((TokenFamily::Paragraph, false)),
            TokenKind::OpenList { .. } => Some((TokenFamily::List, true)),
            TokenKind::CloseList => Some((TokenFamily::List, false)),
            TokenKind::OpenListItem => Some((TokenFamily::ListItem, true)),
            TokenKind::CloseListItem => Some((TokenFamily::ListItem, false)),
            _ => None,
        }
    }
}

/// Find the index of the close token matching the open token at `open`.
///
/// Every open token of the same family pushes, every close pops; the close
/// that empties the stack is the match. Returns `None` when `open` is not an
/// open token or the stream ends with the span still open.
pub fn match_close(tokens: &[MarkupToken], open: usize) -> Option<usize> {
    let (family, is_open) = tokens.get(open)?.kind.family()?;
    if !is_open {
        return None;
    }

    let mut stack = 0usize;
    for (idx, token) in tokens.iter().enumerate().skip(open) {
        match token.kind.family() {
            Some((f, true)) if f == family => stack += 1,
            Some((f, false)) if f == family => {
                stack -= 1;
                if stack == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse normalized markup into a flat token sequence in a single pass.
pub fn tokenize(markup: &str, options: &TokenizerOptions) -> Vec<MarkupToken> {
    let mut builder = TokenBuilder::new(markup);
    for (event, range) in Parser::new_ext(markup, options.parser_options()).into_offset_iter() {
        builder.event(event, range);
    }
    builder.finish()
}

/// Where inline content is currently being collected.
enum TextSink {
    /// Raw source span of the inline content of a heading or paragraph.
    Inline(Option<Range<usize>>),
    /// Literal text of an indented or fenced code block.
    Literal(String),
}

struct TokenBuilder<'a> {
    source: &'a str,
    tokens: Vec<MarkupToken>,
    depth: usize,
    sink: Option<TextSink>,
    /// True while inside a paragraph synthesised for a tight list item.
    hidden_paragraph: bool,
    /// Content depth of every open list item, innermost last.
    item_depths: Vec<usize>,
    /// Nesting of constructs whose text is dropped (tables, HTML blocks).
    skipped: usize,
    /// Open block quotes; their `>` markers are stripped from spans.
    quote_depth: usize,
}

impl<'a> TokenBuilder<'a> {
    fn new(source: &'a str) -> Self {
        Self {
            source,
            tokens: Vec::new(),
            depth: 0,
            sink: None,
            hidden_paragraph: false,
            item_depths: Vec::new(),
            skipped: 0,
            quote_depth: 0,
        }
    }

    fn open(&mut self, kind: TokenKind) {
        self.tokens.push(MarkupToken::new(kind, self.depth));
        self.depth += 1;
    }

    fn close(&mut self, kind: TokenKind) {
        self.depth = self.depth.saturating_sub(1);
        self.tokens.push(MarkupToken::new(kind, self.depth));
    }

    fn leaf(&mut self, kind: TokenKind) {
        self.tokens.push(MarkupToken::new(kind, self.depth));
    }

    fn event(&mut self, event: Event<'_>, range: Range<usize>) {
        if self.skipped > 0 {
            match event {
                Event::Start(Tag::Table(_)) | Event::Start(Tag::HtmlBlock) => self.skipped += 1,
                Event::End(TagEnd::Table) | Event::End(TagEnd::HtmlBlock) => self.skipped -= 1,
                _ => {}
            }
            return;
        }

        match event {
            Event::Start(tag) => self.start(tag, range),
            Event::End(tag) => self.end(tag),
            Event::Text(text) => match &mut self.sink {
                Some(TextSink::Literal(buf)) => buf.push_str(&text),
                _ => self.inline(range),
            },
            Event::Rule => {
                self.close_hidden_paragraph();
                self.leaf(TokenKind::HorizontalRule);
            }
            Event::Code(_)
            | Event::InlineHtml(_)
            | Event::InlineMath(_)
            | Event::Html(_)
            | Event::FootnoteReference(_)
            | Event::SoftBreak
            | Event::HardBreak => self.inline(range),
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>, range: Range<usize>) {
        match tag {
            Tag::Heading { level, .. } => {
                self.close_hidden_paragraph();
                self.open(TokenKind::OpenHeading(level as u8));
                self.sink = Some(TextSink::Inline(None));
            }
            Tag::Paragraph => {
                self.close_hidden_paragraph();
                self.open(TokenKind::OpenParagraph);
                self.sink = Some(TextSink::Inline(None));
            }
            Tag::CodeBlock(_) => {
                self.close_hidden_paragraph();
                self.open(TokenKind::OpenParagraph);
                self.sink = Some(TextSink::Literal(String::new()));
            }
            Tag::List(start) => {
                self.close_hidden_paragraph();
                self.open(TokenKind::OpenList {
                    ordered: start.is_some(),
                });
            }
            Tag::Item => {
                self.close_hidden_paragraph();
                self.open(TokenKind::OpenListItem);
                self.item_depths.push(self.depth);
            }
            Tag::BlockQuote(_) => {
                self.close_hidden_paragraph();
                self.quote_depth += 1;
            }
            Tag::Table(_) | Tag::HtmlBlock => {
                self.close_hidden_paragraph();
                self.leaf(TokenKind::Other("skipped_block".into()));
                self.skipped += 1;
            }
            Tag::Emphasis
            | Tag::Strong
            | Tag::Strikethrough
            | Tag::Link { .. }
            | Tag::Image { .. } => self.inline(range),
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::Heading(_) => {
                self.flush_text();
                self.close(TokenKind::CloseHeading);
            }
            TagEnd::Paragraph | TagEnd::CodeBlock => {
                self.flush_text();
                self.close(TokenKind::CloseParagraph);
            }
            TagEnd::List(_) => {
                self.close_hidden_paragraph();
                self.close(TokenKind::CloseList);
            }
            TagEnd::Item => {
                self.close_hidden_paragraph();
                self.item_depths.pop();
                self.close(TokenKind::CloseListItem);
            }
            TagEnd::BlockQuote(_) => {
                self.close_hidden_paragraph();
                self.quote_depth = self.quote_depth.saturating_sub(1);
            }
            _ => {}
        }
    }

    /// Record an inline event's source span.
    fn inline(&mut self, range: Range<usize>) {
        if self.sink.is_none() {
            // Bare inline content directly inside a list item.
            if self.item_depths.last() != Some(&self.depth) {
                return;
            }
            self.open(TokenKind::OpenParagraph);
            self.sink = Some(TextSink::Inline(None));
            self.hidden_paragraph = true;
        }

        if let Some(TextSink::Inline(span)) = &mut self.sink {
            *span = Some(match span.take() {
                Some(prev) => prev.start.min(range.start)..prev.end.max(range.end),
                None => range,
            });
        }
    }

    fn close_hidden_paragraph(&mut self) {
        if self.hidden_paragraph {
            self.hidden_paragraph = false;
            self.flush_text();
            self.close(TokenKind::CloseParagraph);
        }
    }

    fn flush_text(&mut self) {
        let text = match self.sink.take() {
            Some(TextSink::Inline(Some(span))) => self
                .source
                .get(span)
                .map(|raw| trim_lines(&strip_quote_markers(raw, self.quote_depth)))
                .unwrap_or_default(),
            Some(TextSink::Literal(buf)) => trim_lines(buf.trim_end_matches('\n')),
            _ => String::new(),
        };
        self.leaf(TokenKind::Text(text));
    }

    fn finish(mut self) -> Vec<MarkupToken> {
        self.close_hidden_paragraph();
        self.tokens
    }
}

/// Drop up to `depth` leading `>` markers from every line of a span that sits
/// inside block quotes. The first line of a span starts after its markers.
fn strip_quote_markers(text: &str, depth: usize) -> String {
    if depth == 0 {
        return text.to_string();
    }
    text.lines()
        .map(|line| {
            let mut rest = line.trim_start();
            for _ in 0..depth {
                match rest.strip_prefix('>') {
                    Some(after) => rest = after.trim_start(),
                    None => break,
                }
            }
            rest
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Trim every line and drop the indentation CommonMark treats as structure.
fn trim_lines(text: &str) -> String {
    text.lines()
        .map(str::trim)
        .collect::<Vec<_>>()
        .join("\n")
        .trim()
        .to_string()
}

/// Re-emit a token sequence as canonical normalized markup.
///
/// Blocks are separated by one blank line, list items included, nested list
/// content is indented by the width of its parent marker, and ordered items
/// are numbered with one running counter across the whole document.
pub fn render_markup(tokens: &[MarkupToken]) -> String {
    let mut emitter = Emitter::default();
    emitter.blocks(tokens, 0, tokens.len(), "");
    let mut out = emitter.blocks_out.join("\n\n");
    out.push('\n');
    out
}

#[derive(Default)]
struct Emitter {
    blocks_out: Vec<String>,
    ordinal: usize,
}

impl Emitter {
    fn blocks(&mut self, tokens: &[MarkupToken], start: usize, end: usize, indent: &str) {
        let mut i = start;
        while i < end {
            match &tokens[i].kind {
                TokenKind::OpenHeading(level) => {
                    if let Some(TokenKind::Text(text)) = tokens.get(i + 1).map(|t| &t.kind) {
                        let hashes = "#".repeat(usize::from(*level));
                        self.push(indent, &format!("{hashes} {text}"));
                    }
                    i = match_close(tokens, i).unwrap_or(i) + 1;
                }
                TokenKind::OpenParagraph => {
                    if let Some(TokenKind::Text(text)) = tokens.get(i + 1).map(|t| &t.kind) {
                        if !text.is_empty() {
                            self.push(indent, text);
                        }
                    }
                    i = match_close(tokens, i).unwrap_or(i) + 1;
                }
                TokenKind::OpenList { ordered } => {
                    let Some(close) = match_close(tokens, i) else {
                        i += 1;
                        continue;
                    };
                    self.list(tokens, i + 1, close, *ordered, indent);
                    i = close + 1;
                }
                TokenKind::HorizontalRule => {
                    self.push(indent, "---");
                    i += 1;
                }
                _ => i += 1,
            }
        }
    }

    fn list(
        &mut self,
        tokens: &[MarkupToken],
        start: usize,
        end: usize,
        ordered: bool,
        indent: &str,
    ) {
        let mut i = start;
        while i < end {
            if tokens[i].kind != TokenKind::OpenListItem {
                i += 1;
                continue;
            }
            let Some(close) = match_close(tokens, i).filter(|c| *c < end) else {
                i += 1;
                continue;
            };

            let marker = if ordered {
                self.ordinal += 1;
                format!("{}. ", self.ordinal)
            } else {
                "- ".to_string()
            };
            let child_indent = format!("{indent}{}", " ".repeat(marker.len()));

            let first = self.blocks_out.len();
            self.blocks(tokens, i + 1, close, &child_indent);
            if self.blocks_out.len() == first {
                self.blocks_out.push(format!("{indent}{}", marker.trim_end()));
            } else {
                // The first block of the item sits on the marker line.
                let body = self.blocks_out[first].trim_start().to_string();
                self.blocks_out[first] = format!("{indent}{marker}{body}");
            }
            i = close + 1;
        }
    }

    fn push(&mut self, indent: &str, text: &str) {
        let block = text
            .lines()
            .map(|line| format!("{indent}{line}"))
            .collect::<Vec<_>>()
            .join("\n");
        self.blocks_out.push(block);
    }
}
