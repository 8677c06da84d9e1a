//! Assembler diagnostics
//!
//! as31 reports progress and errors on stderr:
//!
//! ```text
//! Begin Pass #1
//! lab.asm: line 7: Undefined symbol "lopp"
//! Begin Pass #2
//! ```
//!
//! Every line that is not a progress line is a [`Diagnostic`]. The first
//! `line <N>` in the message links it to a source line.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::OnceLock;

use regex_lite::Regex;

/// One error reported by the assembler
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// 1-based source line, if the message names one
    pub line: Option<usize>,
    /// Message as printed by the assembler
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

fn line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"line ([0-9]+)").expect("valid line pattern"))
}

/// Extract the line number from any text mentioning `line <N>`
///
/// Line 0 does not exist and yields `None`.
pub fn line_reference(text: &str) -> Option<usize> {
    let captures = line_pattern().captures(text)?;
    captures[1].parse().ok().filter(|&line| line > 0)
}

/// Whether a stderr line is one of as31's `Begin Pass #N` progress lines
pub fn is_progress_line(line: &str) -> bool {
    line.trim().starts_with("Begin Pass #")
}

/// Parse assembler stderr into diagnostics
pub fn parse_diagnostics(stderr: &str) -> Vec<Diagnostic> {
    stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty() && !is_progress_line(line))
        .map(|line| Diagnostic {
            line: line_reference(line),
            message: line.to_string(),
        })
        .collect()
}

/// Sorted, de-duplicated source lines referenced by the diagnostics
pub fn error_lines(diagnostics: &[Diagnostic]) -> Vec<usize> {
    diagnostics
        .iter()
        .filter_map(|d| d.line)
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// One line of a source excerpt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExcerptLine<'a> {
    /// 1-based line number
    pub number: usize,
    /// Source text of the line
    pub text: &'a str,
    /// Messages reported for this line; empty for context lines
    pub messages: Vec<&'a str>,
}

impl ExcerptLine<'_> {
    /// Whether the assembler reported an error on this line
    pub fn is_error(&self) -> bool {
        !self.messages.is_empty()
    }
}

/// Build an excerpt of `source` around every erroneous line
///
/// `context` lines before and after each error are included. Overlapping
/// windows are merged and a `None` entry separates disjoint windows.
/// References beyond the end of the source are skipped.
pub fn excerpt<'a>(
    source: &'a str,
    diagnostics: &'a [Diagnostic],
    context: usize,
) -> Vec<Option<ExcerptLine<'a>>> {
    let lines: Vec<&str> = source.lines().collect();
    let errors: Vec<usize> = error_lines(diagnostics)
        .into_iter()
        .filter(|&line| line <= lines.len())
        .collect();

    let mut wanted = BTreeSet::new();
    for &line in &errors {
        let first = line.saturating_sub(context).max(1);
        let last = (line + context).min(lines.len());
        wanted.extend(first..=last);
    }

    let mut out = Vec::new();
    let mut previous = None;
    for number in wanted {
        if matches!(previous, Some(p) if p + 1 != number) {
            out.push(None);
        }
        previous = Some(number);
        let messages = diagnostics
            .iter()
            .filter(|d| d.line == Some(number))
            .map(|d| d.message.as_str())
            .collect();
        out.push(Some(ExcerptLine {
            number,
            text: lines[number - 1],
            messages,
        }));
    }
    out
}
