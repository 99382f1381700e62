//! Inline-formatting segmenter: one line of markup → ordered styled runs.
//!
//! The dialect is deliberately small: `**bold**`, `*italic*`, `_italic_`,
//! `***bold italic***`, and literal runs of three or more underscores that
//! stand for form blanks ("Name: ______"). The segmenter never fails; text
//! it cannot interpret stays in a plain run.
//!
//! ## Priority order
//!
//! 1. Underscore blanks are swapped for placeholders before anything else.
//! 2. `**label**: rest` is always exactly three runs.
//! 3. Outermost `**…**` spans are split first, then `*…*` / `_…_` inside and
//!    outside them.
//! 4. Placeholders are restored in every run.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

/// A contiguous span of text sharing one bold/italic state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StyledRun {
    pub text: String,
    pub bold: bool,
    pub italic: bool,
}

impl StyledRun {
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: false,
        }
    }

    pub fn bold(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            italic: false,
        }
    }

    pub fn italic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: false,
            italic: true,
        }
    }

    pub fn bold_italic(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            bold: true,
            italic: true,
        }
    }
}

// Private-use code points never appear in extracted text, and the length in
// between contains no emphasis characters.
const BLANK_OPEN: char = '\u{E000}';
const BLANK_CLOSE: char = '\u{E001}';

static RE_UNDERSCORE_BLANK: Lazy<Regex> = Lazy::new(|| Regex::new(r"_{3,}").unwrap());

static RE_BLANK_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new("\u{E000}([0-9]+)\u{E001}").unwrap());

static RE_BOLD_LABEL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\*\*([^*]+)\*\*\s*:\s*(.*)$").unwrap());

/// Alternatives are tried in order: `***both***`, bold whose content is
/// plain text and whole `*italic*` spans (so `**a *b***` closes after the
/// italic), then any bold span.
static RE_BOLD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\*\*\*(.+?)\*\*\*|\*\*((?:[^*]|\*[^*]+\*)+?)\*\*|\*\*(.+?)\*\*").unwrap()
});

static RE_ITALIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"\*([^*]+?)\*|_([^_]+?)_").unwrap());

/// Split one line of markup into styled runs in source order.
///
/// A line without emphasis markers yields exactly one plain run equal to the
/// input, including the empty line.
pub fn segment(line: &str) -> Vec<StyledRun> {
    let protected = protect_blanks(line);

    let mut runs = match RE_BOLD_LABEL.captures(&protected) {
        Some(caps) => vec![
            StyledRun::bold(&caps[1]),
            StyledRun::plain(": "),
            StyledRun::plain(&caps[2]),
        ],
        None => split_bold(&protected),
    };

    if runs.is_empty() {
        runs.push(StyledRun::plain(protected.as_str()));
    }

    for run in &mut runs {
        run.text = restore_blanks(&run.text);
    }
    runs
}

/// Segment a block of text that may contain `\n`, returning one run list per
/// line.
pub fn segment_lines(text: &str) -> Vec<Vec<StyledRun>> {
    text.split('\n').map(segment).collect()
}

fn protect_blanks(line: &str) -> String {
    RE_UNDERSCORE_BLANK
        .replace_all(line, |caps: &Captures| {
            format!("{BLANK_OPEN}{}{BLANK_CLOSE}", caps[0].len())
        })
        .into_owned()
}

fn restore_blanks(text: &str) -> String {
    RE_BLANK_PLACEHOLDER
        .replace_all(text, |caps: &Captures| {
            let len = caps[1].parse::<usize>().unwrap_or(3);
            "_".repeat(len)
        })
        .into_owned()
}

fn split_bold(text: &str) -> Vec<StyledRun> {
    let mut runs = Vec::new();
    let mut last = 0;

    for caps in RE_BOLD.captures_iter(text) {
        let Some(whole) = caps.get(0) else { continue };
        split_italic(&text[last..whole.start()], false, &mut runs);

        if let Some(both) = caps.get(1) {
            push_run(&mut runs, both.as_str(), true, true);
        } else if let Some(inner) = caps.get(2).or_else(|| caps.get(3)) {
            split_italic(inner.as_str(), true, &mut runs);
        }
        last = whole.end();
    }

    split_italic(&text[last..], false, &mut runs);
    runs
}

fn split_italic(text: &str, bold: bool, runs: &mut Vec<StyledRun>) {
    let mut last = 0;
    let mut pos = 0;

    while let Some(caps) = RE_ITALIC.captures_at(text, pos) {
        let Some(whole) = caps.get(0) else { break };

        // `snake_case_words` are not emphasis.
        if caps.get(2).is_some() && is_intraword(text, whole.start(), whole.end()) {
            pos = whole.start() + 1;
            continue;
        }

        push_run(runs, &text[last..whole.start()], bold, false);
        let inner = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
        push_run(runs, inner, bold, true);

        last = whole.end();
        pos = whole.end();
    }

    push_run(runs, &text[last..], bold, false);
}

fn is_intraword(text: &str, start: usize, end: usize) -> bool {
    let before = text[..start].chars().next_back();
    let after = text[end..].chars().next();
    before.is_some_and(char::is_alphanumeric) || after.is_some_and(char::is_alphanumeric)
}

fn push_run(runs: &mut Vec<StyledRun>, text: &str, bold: bool, italic: bool) {
    if text.is_empty() {
        return;
    }
    runs.push(StyledRun {
        text: text.to_string(),
        bold,
        italic,
    });
}
