//! Post-processing: deterministic cleanup of normalized markup.
//!
//! Three chains share one set of small, named rules. Every rule is a pure
//! `&str → String` function that is idempotent on its own, so each chain is
//! idempotent as a whole:
//!
//! * [`clean_pdf_markup`] runs after the geometry normalizer,
//! * [`clean_word_markup`] runs after the rich-text normalizer and ends with a
//!   tokenize/re-emit canonicalization pass,
//! * [`clean_translated_markup`] runs on whatever the translation service
//!   returned, before it is tokenized.
//!
//! ## Rule Order
//!
//! Line endings are normalised first so every later rule can work on `\n`.
//! Spacing rules run before blank-line collapsing, and the final-newline rule
//! always runs last.

use crate::pipeline::tokenize::{render_markup, tokenize, TokenizerOptions};
use once_cell::sync::Lazy;
use regex::Regex;

/// Cleanup chain for markup produced from PDF geometry.
///
/// Rules (applied in order):
/// 1. Normalise line endings (CRLF → LF)
/// 2. Strip invisible Unicode (zero-width spaces, BOM, soft hyphens)
/// 3. Trim trailing whitespace per line
/// 4. Exactly one blank line around headings, list items and rules
/// 5. Collapse 3+ consecutive blank lines down to 2
/// 6. Drop leading blank lines, end with exactly one newline
pub fn clean_pdf_markup(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = structural_spacing(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

/// Cleanup chain for markup produced from a Word document's HTML.
///
/// Rules (applied in order):
/// 1. Normalise line endings
/// 2. Strip invisible Unicode
/// 3. Collapse runs of 3+ asterisks to `**`
/// 4. Resolve bullet/number conflicts on one line (keep the numeral)
/// 5. Renumber ordered markers with one running count over the text
/// 6. Trim trailing whitespace per line
/// 7. Blank line before and after every heading
/// 8. Turn single newlines between text lines into paragraph breaks
/// 9. Collapse 3+ consecutive blank lines down to 2
/// 10. Canonicalize through the tokenizer and re-emitter
/// 11. End with exactly one newline
pub fn clean_word_markup(input: &str, options: &TokenizerOptions) -> String {
    let s = normalise_line_endings(input);
    let s = remove_invisible_chars(&s);
    let s = collapse_asterisk_runs(&s);
    let s = resolve_marker_conflicts(&s);
    let s = renumber_ordered_markers(&s);
    let s = trim_trailing_whitespace(&s);
    let s = heading_blank_lines(&s);
    let s = merge_orphan_newlines(&s);
    let s = collapse_blank_lines(&s);
    let s = canonicalize(&s, options);
    ensure_final_newline(&s)
}

/// Cleanup chain for the translation service's response.
///
/// Rules (applied in order):
/// 1. Strip outer markdown fences (models sometimes disobey the prompt)
/// 2. Normalise line endings
/// 3. Strip invisible Unicode
/// 4. Trim trailing whitespace per line
/// 5. Collapse 3+ consecutive blank lines down to 2
/// 6. End with exactly one newline
pub fn clean_translated_markup(input: &str) -> String {
    let s = strip_markdown_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

// ── Rule: Strip outer markdown fences ────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:markdown|md)?\r?\n(.*)\r?\n```\s*$").unwrap());

fn strip_markdown_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule: Normalise line endings ─────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule: Remove invisible Unicode characters ────────────────────────────────

fn remove_invisible_chars(input: &str) -> String {
    input.replace(
        [
            '\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}',
        ],
        "",
    )
}

// ── Rule: Trim trailing whitespace per line ──────────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule: Structural spacing ─────────────────────────────────────────────────

static RE_HEADING_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^#{1,6}\s").unwrap());
static RE_LIST_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*(?:[-*•]|\d+\.)\s").unwrap());
static RE_RULE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^-{3,}$").unwrap());

fn is_structural(line: &str) -> bool {
    RE_HEADING_LINE.is_match(line)
        || RE_LIST_LINE.is_match(line)
        || RE_RULE_LINE.is_match(line.trim())
}

/// Force exactly one blank line between a heading, list or rule line and its
/// neighbours; keep other blank runs as they are. Leading and trailing blank
/// lines are dropped.
fn structural_spacing(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut blank_run = 0usize;
    let mut prev_structural = false;

    for line in input.lines() {
        if line.trim().is_empty() {
            blank_run += 1;
            continue;
        }
        let structural = is_structural(line);
        if !out.is_empty() {
            let blanks = if structural || prev_structural { 1 } else { blank_run };
            out.extend(std::iter::repeat_n("", blanks));
        }
        out.push(line);
        prev_structural = structural;
        blank_run = 0;
    }

    out.join("\n")
}

// ── Rule: Collapse excessive blank lines ─────────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{4,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n\n").to_string()
}

// ── Rule: Collapse asterisk runs ─────────────────────────────────────────────

static RE_ASTERISK_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*{3,}").unwrap());

fn collapse_asterisk_runs(input: &str) -> String {
    RE_ASTERISK_RUN.replace_all(input, "**").to_string()
}

// ── Rule: Bullet / number conflicts ──────────────────────────────────────────

static RE_BULLET_BEFORE_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)[-*•][ \t]+(\d+\.\s)").unwrap());

static RE_BULLET_AFTER_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^([ \t]*)(\d+\.)[ \t]+[-*•][ \t]+").unwrap());

fn resolve_marker_conflicts(input: &str) -> String {
    let s = RE_BULLET_BEFORE_NUMBER.replace_all(input, "$1$2");
    RE_BULLET_AFTER_NUMBER.replace_all(&s, "$1$2 ").to_string()
}

// ── Rule: Renumber ordered markers ───────────────────────────────────────────

static RE_ORDERED_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([ \t]*)(\d+\.[ \t]+)").unwrap());

/// Every ordered marker becomes `N. ` where N counts the ordered markers
/// before it in the whole text.
///
/// A marker that changes width moves its item's content column, so every
/// line nested under that item is re-indented by the same amount.
fn renumber_ordered_markers(input: &str) -> String {
    let mut count = 0usize;
    // (indent of an open ordered item, width change of its marker)
    let mut open: Vec<(usize, isize)> = Vec::new();
    let mut out: Vec<String> = Vec::new();

    for line in input.split('\n') {
        if line.trim().is_empty() {
            out.push(line.to_string());
            continue;
        }
        let indent = line.len() - line.trim_start_matches([' ', '\t']).len();
        while open.last().is_some_and(|(item_indent, _)| *item_indent >= indent) {
            open.pop();
        }
        let shift: isize = open.iter().map(|(_, delta)| delta).sum();
        let line = shift_indent(line, shift);

        let Some(caps) = RE_ORDERED_MARKER.captures(&line) else {
            out.push(line);
            continue;
        };
        count += 1;
        let marker = format!("{count}. ");
        let delta = marker.len() as isize - caps[2].len() as isize;
        let rest = &line[caps[0].len()..];
        out.push(format!("{}{}{}", &caps[1], marker, rest));
        open.push((indent, delta));
    }

    out.join("\n")
}

fn shift_indent(line: &str, shift: isize) -> String {
    if shift > 0 {
        format!("{}{}", " ".repeat(shift as usize), line)
    } else if shift < 0 {
        let spaces = line.len() - line.trim_start_matches(' ').len();
        line[spaces.min(shift.unsigned_abs())..].to_string()
    } else {
        line.to_string()
    }
}

// ── Rule: Blank lines around headings ────────────────────────────────────────

fn heading_blank_lines(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();
    let mut after_heading = false;

    for line in input.lines() {
        let heading = RE_HEADING_LINE.is_match(line);
        let blank = line.trim().is_empty();
        let needs_gap = (heading || after_heading) && !blank;
        if needs_gap && out.last().is_some_and(|prev| !prev.trim().is_empty()) {
            out.push("");
        }
        out.push(line);
        after_heading = heading;
    }

    out.join("\n")
}

// ── Rule: Merge orphan newlines ──────────────────────────────────────────────

fn merge_orphan_newlines(input: &str) -> String {
    let mut out: Vec<&str> = Vec::new();

    for line in input.lines() {
        let blank = line.trim().is_empty();
        if !blank && out.last().is_some_and(|prev| !prev.trim().is_empty()) {
            out.push("");
        }
        out.push(line);
    }

    out.join("\n")
}

// ── Rule: Canonicalize ───────────────────────────────────────────────────────

fn canonicalize(input: &str, options: &TokenizerOptions) -> String {
    render_markup(&tokenize(input, options))
}

// ── Rule: Ensure file ends with single newline ───────────────────────────────

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_start_matches('\n').trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_idempotent(rule: fn(&str) -> String, input: &str) {
        let once = rule(input);
        assert_eq!(rule(&once), once, "rule is not idempotent for {input:?}");
    }

    const MESSY: &str = "Intro line\r\n# Head\nbody   \n\n\n\n\n- a\n- b\n---\ntail\n* 3. x\n7. - y\n****bold****";

    #[test]
    fn test_strip_fences() {
        let input = "```markdown\n# Hello\nWorld\n```";
        assert_eq!(strip_markdown_fences(input), "# Hello\nWorld");
    }

    #[test]
    fn test_strip_fences_no_lang() {
        let input = "```\n# Hello\nWorld\n```";
        assert_eq!(strip_markdown_fences(input), "# Hello\nWorld");
    }

    #[test]
    fn test_no_fences_passthrough() {
        let input = "# Hello\nWorld";
        assert_eq!(strip_markdown_fences(input), "# Hello\nWorld");
    }

    #[test]
    fn test_normalise_line_endings() {
        assert_eq!(normalise_line_endings("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn test_trim_trailing_whitespace() {
        assert_eq!(
            trim_trailing_whitespace("  hello   \nworld  "),
            "  hello\nworld"
        );
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\n\n\nb"), "a\n\n\nb");
        assert_eq!(collapse_blank_lines("a\n\n\nb"), "a\n\n\nb");
    }

    #[test]
    fn test_ensure_final_newline() {
        assert_eq!(ensure_final_newline("hello"), "hello\n");
        assert_eq!(ensure_final_newline("\n\nhello\n\n\n"), "hello\n");
        assert_eq!(ensure_final_newline(""), "\n");
    }

    #[test]
    fn test_remove_invisible() {
        let input = "hello\u{200B}world\u{FEFF}foo\u{00AD}bar";
        assert_eq!(remove_invisible_chars(input), "helloworldfoobar");
    }

    #[test]
    fn test_structural_spacing() {
        let input = "text\n## H\nmore\n\n\n\n- a\n- b\nplain\n\n\nplain two";
        assert_eq!(
            structural_spacing(input),
            "text\n\n## H\n\nmore\n\n- a\n\n- b\n\nplain\n\n\nplain two"
        );
    }

    #[test]
    fn test_structural_spacing_rule_line() {
        assert_eq!(structural_spacing("a\n---\nb"), "a\n\n---\n\nb");
    }

    #[test]
    fn test_collapse_asterisk_runs() {
        assert_eq!(collapse_asterisk_runs("****x****"), "**x**");
        assert_eq!(collapse_asterisk_runs("**x**"), "**x**");
    }

    #[test]
    fn test_marker_conflicts_keep_numeral() {
        assert_eq!(resolve_marker_conflicts("- 2. item"), "2. item");
        assert_eq!(resolve_marker_conflicts("• 4. item"), "4. item");
        assert_eq!(resolve_marker_conflicts("3. - item"), "3. item");
    }

    #[test]
    fn test_marker_conflicts_leave_bold_alone() {
        assert_eq!(resolve_marker_conflicts("1. **bold**"), "1. **bold**");
        assert_eq!(resolve_marker_conflicts("**2.5 million**"), "**2.5 million**");
    }

    #[test]
    fn test_renumber_is_document_global() {
        let input = "1. a\n1. b\n\ntext\n\n1. c\n  1. nested";
        assert_eq!(
            renumber_ordered_markers(input),
            "1. a\n2. b\n\ntext\n\n3. c\n  4. nested"
        );
    }

    #[test]
    fn test_renumber_moves_nested_lines_with_a_wider_marker() {
        let mut input = "1. i\n".repeat(9);
        input.push_str("\nmid\n\n1. parent\n\n   - child\n   more\n\n- after");
        let out = renumber_ordered_markers(&input);
        assert!(out.contains("10. parent\n\n    - child\n    more\n\n- after"), "{out}");
        assert_eq!(renumber_ordered_markers(&out), out);
    }

    #[test]
    fn test_renumber_moves_nested_lines_with_a_narrower_marker() {
        assert_eq!(
            renumber_ordered_markers("12. parent\n    - child"),
            "1. parent\n   - child"
        );
    }

    #[test]
    fn test_heading_blank_lines() {
        assert_eq!(heading_blank_lines("a\n# H\nb"), "a\n\n# H\n\nb");
        assert_eq!(heading_blank_lines("a\n\n# H\n\nb"), "a\n\n# H\n\nb");
    }

    #[test]
    fn test_merge_orphan_newlines() {
        assert_eq!(merge_orphan_newlines("a\nb\nc"), "a\n\nb\n\nc");
        assert_eq!(merge_orphan_newlines("a\n\nb"), "a\n\nb");
    }

    #[test]
    fn every_rule_is_idempotent() {
        let rules: [fn(&str) -> String; 12] = [
            strip_markdown_fences,
            normalise_line_endings,
            remove_invisible_chars,
            trim_trailing_whitespace,
            structural_spacing,
            collapse_blank_lines,
            collapse_asterisk_runs,
            resolve_marker_conflicts,
            renumber_ordered_markers,
            heading_blank_lines,
            merge_orphan_newlines,
            ensure_final_newline,
        ];
        for rule in rules {
            assert_idempotent(rule, MESSY);
        }
    }

    #[test]
    fn pdf_chain_is_idempotent() {
        let once = clean_pdf_markup(MESSY);
        assert_eq!(clean_pdf_markup(&once), once);
        assert!(!once.contains("\n\n\n\n"));
        assert!(once.contains("\n\n# Head\n\n"));
    }

    #[test]
    fn word_chain_is_idempotent() {
        let opts = TokenizerOptions::default();
        let once = clean_word_markup(MESSY, &opts);
        assert_eq!(clean_word_markup(&once, &opts), once);
    }

    #[test]
    fn word_chain_output_is_canonical() {
        let input = "# Title\nFirst para\nsecond para\n\n- one\n- two\n\n1. x\n1. y\n";
        assert_eq!(
            clean_word_markup(input, &TokenizerOptions::default()),
            "# Title\n\nFirst para\n\nsecond para\n\n- one\n\n- two\n\n1. x\n\n2. y\n"
        );
    }

    #[test]
    fn translated_chain_strips_fences_and_crlf() {
        let input = "```markdown\r\n# Hola\r\n\r\nMundo  \r\n```";
        assert_eq!(clean_translated_markup(input), "# Hola\n\nMundo\n");
    }
}
