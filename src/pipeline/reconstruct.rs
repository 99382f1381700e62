//! Word-document reconstructor: token sequence → ordered document blocks.
//!
//! One block per heading, paragraph, list item and rule, in source order.
//! The walk never fails. Spans it cannot make sense of are skipped:
//!
//! * an open heading or paragraph not followed by a `Text` token,
//! * a list whose close token cannot be found (its items are not emitted),
//! * a list item whose close token cannot be found inside its list.
//!
//! List items take their text from the first paragraph that is a direct child
//! of the item; nested lists become their own items one level deeper.

use crate::pipeline::inline::{segment_lines, StyledRun};
use crate::pipeline::tokenize::{match_close, MarkupToken, TokenKind};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One element of a block's content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Inline {
    Run(StyledRun),
    /// A forced line break inside the block (not a paragraph break).
    Break,
}

/// One structural output unit ready for the packer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DocumentBlock {
    Heading { level: u8, content: Vec<Inline> },
    Paragraph { content: Vec<Inline> },
    ListItem {
        ordered: bool,
        /// Nesting level, 0 for top-level items.
        level: usize,
        content: Vec<Inline>,
    },
    Rule,
}

impl DocumentBlock {
    /// Concatenated run text with breaks rendered as `\n`.
    pub fn plain_text(&self) -> String {
        let content = match self {
            DocumentBlock::Heading { content, .. }
            | DocumentBlock::Paragraph { content }
            | DocumentBlock::ListItem { content, .. } => content,
            DocumentBlock::Rule => return String::new(),
        };
        content
            .iter()
            .map(|inline| match inline {
                Inline::Run(run) => run.text.as_str(),
                Inline::Break => "\n",
            })
            .collect()
    }
}

/// How list items are assigned a nesting level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ListNesting {
    /// Level follows the real nesting depth of the list. (default)
    #[default]
    Tracked,
    /// Every item is emitted at level 0.
    Flat,
}

/// Split block text on embedded newlines and segment each line, with a
/// [`Inline::Break`] between lines.
pub fn format_content(text: &str) -> Vec<Inline> {
    let mut content = Vec::new();
    for (n, runs) in segment_lines(text).into_iter().enumerate() {
        if n > 0 {
            content.push(Inline::Break);
        }
        content.extend(runs.into_iter().map(Inline::Run));
    }
    content
}

/// Walk the token sequence once and emit blocks in source order.
pub fn reconstruct(tokens: &[MarkupToken], nesting: ListNesting) -> Vec<DocumentBlock> {
    let mut blocks = Vec::new();
    let mut i = 0;

    while i < tokens.len() {
        match &tokens[i].kind {
            TokenKind::OpenHeading(level) => {
                match following_text(tokens, i) {
                    Some(text) => blocks.push(DocumentBlock::Heading {
                        level: *level,
                        content: format_content(text),
                    }),
                    None => debug!("heading at token {} has no text, skipped", i),
                }
                i += 1;
            }
            TokenKind::OpenParagraph => {
                match following_text(tokens, i) {
                    Some(text) => blocks.push(DocumentBlock::Paragraph {
                        content: format_content(text),
                    }),
                    None => debug!("paragraph at token {} has no text, skipped", i),
                }
                i += 1;
            }
            TokenKind::OpenList { ordered } => match match_close(tokens, i) {
                Some(close) => {
                    emit_list(tokens, i, close, *ordered, 0, nesting, &mut blocks);
                    i = close + 1;
                }
                None => {
                    debug!("list at token {} is never closed, skipped", i);
                    i += 1;
                }
            },
            TokenKind::HorizontalRule => {
                blocks.push(DocumentBlock::Rule);
                i += 1;
            }
            _ => i += 1,
        }
    }

    blocks
}

fn following_text(tokens: &[MarkupToken], open: usize) -> Option<&str> {
    match tokens.get(open + 1).map(|t| &t.kind) {
        Some(TokenKind::Text(text)) => Some(text.as_str()),
        _ => None,
    }
}

/// Emit every item of the list spanning `open..=close`.
fn emit_list(
    tokens: &[MarkupToken],
    open: usize,
    close: usize,
    ordered: bool,
    level: usize,
    nesting: ListNesting,
    blocks: &mut Vec<DocumentBlock>,
) {
    let mut j = open + 1;
    while j < close {
        if tokens[j].kind != TokenKind::OpenListItem {
            j += 1;
            continue;
        }
        match match_close(tokens, j).filter(|item_close| *item_close < close) {
            Some(item_close) => {
                emit_item(tokens, j, item_close, ordered, level, nesting, blocks);
                j = item_close + 1;
            }
            None => {
                debug!("list item at token {} is never closed, skipped", j);
                j += 1;
            }
        }
    }
}

fn emit_item(
    tokens: &[MarkupToken],
    open: usize,
    close: usize,
    ordered: bool,
    level: usize,
    nesting: ListNesting,
    blocks: &mut Vec<DocumentBlock>,
) {
    let child_depth = tokens[open].depth + 1;

    let content = (open + 1..close)
        .find(|&k| tokens[k].depth == child_depth && tokens[k].kind == TokenKind::OpenParagraph)
        .and_then(|k| following_text(tokens, k))
        .map(format_content)
        .unwrap_or_default();

    blocks.push(DocumentBlock::ListItem {
        ordered,
        level: match nesting {
            ListNesting::Tracked => level,
            ListNesting::Flat => 0,
        },
        content,
    });

    let mut k = open + 1;
    while k < close {
        if let TokenKind::OpenList { ordered: nested } = tokens[k].kind {
            if tokens[k].depth == child_depth {
                if let Some(nested_close) = match_close(tokens, k).filter(|c| *c < close) {
                    emit_list(tokens, k, nested_close, nested, level + 1, nesting, blocks);
                    k = nested_close + 1;
                    continue;
                }
                debug!("nested list at token {} is never closed, skipped", k);
            }
        }
        k += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tokenize::{tokenize, TokenizerOptions};

    fn blocks(markup: &str) -> Vec<DocumentBlock> {
        reconstruct(
            &tokenize(markup, &TokenizerOptions::default()),
            ListNesting::Tracked,
        )
    }

    fn tok(kind: TokenKind, depth: usize) -> MarkupToken {
        MarkupToken::new(kind, depth)
    }

    #[test]
    fn one_block_per_structure() {
        let md = "# Title\n\nIntro.\n\n- a\n- b\n\n1. c\n\n---\n\n## Next\n\nEnd.\n";
        let out = blocks(md);
        // 2 headings + 2 paragraphs + 3 list items + 1 rule
        assert_eq!(out.len(), 8);
        assert!(matches!(out[0], DocumentBlock::Heading { level: 1, .. }));
        assert!(matches!(out[1], DocumentBlock::Paragraph { .. }));
        assert!(matches!(
            out[2],
            DocumentBlock::ListItem {
                ordered: false,
                level: 0,
                ..
            }
        ));
        assert!(matches!(out[4], DocumentBlock::ListItem { ordered: true, .. }));
        assert_eq!(out[5], DocumentBlock::Rule);
        assert!(matches!(out[6], DocumentBlock::Heading { level: 2, .. }));
        assert_eq!(out[7].plain_text(), "End.");
    }

    #[test]
    fn soft_breaks_become_break_markers() {
        let out = blocks("first line\nsecond **line**\n");
        assert_eq!(
            out,
            vec![DocumentBlock::Paragraph {
                content: vec![
                    Inline::Run(StyledRun::plain("first line")),
                    Inline::Break,
                    Inline::Run(StyledRun::plain("second ")),
                    Inline::Run(StyledRun::bold("line")),
                ]
            }]
        );
    }

    #[test]
    fn nested_items_track_depth() {
        let out = blocks("- outer\n  - inner\n    1. deepest\n- next\n");
        let levels: Vec<(String, usize)> = out
            .iter()
            .map(|b| match b {
                DocumentBlock::ListItem { level, .. } => (b.plain_text(), *level),
                other => panic!("unexpected block {other:?}"),
            })
            .collect();
        assert_eq!(
            levels,
            vec![
                ("outer".to_string(), 0),
                ("inner".to_string(), 1),
                ("deepest".to_string(), 2),
                ("next".to_string(), 0),
            ]
        );
    }

    #[test]
    fn flat_nesting_matches_reference_level_zero() {
        let tokens = tokenize("- outer\n  - inner\n", &TokenizerOptions::default());
        let out = reconstruct(&tokens, ListNesting::Flat);
        assert_eq!(out.len(), 2);
        assert!(out
            .iter()
            .all(|b| matches!(b, DocumentBlock::ListItem { level: 0, .. })));
    }

    #[test]
    fn item_text_excludes_nested_list() {
        let out = blocks("- parent\n  - child\n");
        assert_eq!(out[0].plain_text(), "parent");
        assert_eq!(out[1].plain_text(), "child");
    }

    #[test]
    fn unterminated_list_emits_no_items() {
        let tokens = vec![
            tok(TokenKind::OpenParagraph, 0),
            tok(TokenKind::Text("before".into()), 1),
            tok(TokenKind::CloseParagraph, 0),
            tok(TokenKind::OpenList { ordered: false }, 0),
            tok(TokenKind::OpenListItem, 1),
            tok(TokenKind::OpenParagraph, 2),
            tok(TokenKind::Text("orphan".into()), 3),
            tok(TokenKind::CloseParagraph, 2),
            tok(TokenKind::CloseListItem, 1),
            tok(TokenKind::HorizontalRule, 0),
        ];
        let out = reconstruct(&tokens, ListNesting::Tracked);
        assert!(out
            .iter()
            .all(|b| !matches!(b, DocumentBlock::ListItem { .. })));
        assert_eq!(out.first().map(DocumentBlock::plain_text).as_deref(), Some("before"));
        assert_eq!(out.last(), Some(&DocumentBlock::Rule));
    }

    #[test]
    fn unclosed_item_is_skipped_but_siblings_survive() {
        let tokens = vec![
            tok(TokenKind::OpenList { ordered: true }, 0),
            tok(TokenKind::OpenListItem, 1),
            tok(TokenKind::OpenParagraph, 2),
            tok(TokenKind::Text("broken".into()), 3),
            tok(TokenKind::CloseParagraph, 2),
            tok(TokenKind::CloseList, 0),
        ];
        let out = reconstruct(&tokens, ListNesting::Tracked);
        assert!(out
            .iter()
            .all(|b| !matches!(b, DocumentBlock::ListItem { .. })));
    }

    #[test]
    fn open_without_text_is_skipped() {
        let tokens = vec![
            tok(TokenKind::OpenHeading(2), 0),
            tok(TokenKind::CloseHeading, 0),
            tok(TokenKind::OpenParagraph, 0),
            tok(TokenKind::Text("kept".into()), 1),
            tok(TokenKind::CloseParagraph, 0),
        ];
        let out = reconstruct(&tokens, ListNesting::Tracked);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].plain_text(), "kept");
    }

    #[test]
    fn unknown_tokens_are_ignored() {
        let tokens = vec![
            tok(TokenKind::Other("skipped_block".into()), 0),
            tok(TokenKind::HorizontalRule, 0),
        ];
        assert_eq!(
            reconstruct(&tokens, ListNesting::Tracked),
            vec![DocumentBlock::Rule]
        );
    }

    #[test]
    fn empty_item_still_counts() {
        let out = blocks("- \n- filled\n");
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].plain_text(), "");
    }
}
