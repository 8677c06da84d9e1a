//! Assembly source normalisation
//!
//! Two levels of clean-up are provided:
//!
//! - [`prepare`] keeps every line where it is, so assembler line numbers
//!   still refer to the file the user is editing. It is applied before every
//!   assembly.
//! - [`clean`] additionally squeezes runs of blank lines. It is meant for
//!   rewriting a file (`r31jp clean`), e.g. after pasting code from a PDF.

/// Normalise source text without moving any line
///
/// Tabs expand to `tab_length` spaces, `\r\n` and lone `\r` become `\n`,
/// trailing whitespace is dropped and the text ends with exactly one
/// newline. as31 rejects a final line without a terminator.
pub fn prepare(code: &str, tab_length: usize) -> String {
    let tab = " ".repeat(tab_length);
    let mut out = String::with_capacity(code.len() + 1);
    for line in lines(code) {
        out.push_str(line.replace('\t', &tab).trim_end());
        out.push('\n');
    }
    trim_trailing_blank_lines(&mut out);
    out
}

/// Normalise source text and collapse blank lines
///
/// Same as [`prepare`], and any run of blank lines is reduced to a single
/// blank line.
pub fn clean(code: &str, tab_length: usize) -> String {
    let prepared = prepare(code, tab_length);
    let mut out = String::with_capacity(prepared.len());
    let mut previous_blank = false;
    for line in prepared.lines() {
        let blank = line.is_empty();
        if blank && previous_blank {
            continue;
        }
        previous_blank = blank;
        out.push_str(line);
        out.push('\n');
    }
    trim_trailing_blank_lines(&mut out);
    out
}

/// Split on `\r\n`, `\r` and `\n` alike
fn lines(code: &str) -> impl Iterator<Item = &str> {
    let mut rest = Some(code);
    std::iter::from_fn(move || {
        let text = rest?;
        match text.find(['\r', '\n']) {
            Some(pos) => {
                let skip = if text[pos..].starts_with("\r\n") { 2 } else { 1 };
                rest = Some(&text[pos + skip..]);
                Some(&text[..pos])
            }
            None => {
                rest = None;
                Some(text)
            }
        }
    })
}

fn trim_trailing_blank_lines(out: &mut String) {
    while out.ends_with("\n\n") {
        out.pop();
    }
    if out.is_empty() {
        out.push('\n');
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prepare_adds_final_newline() {
        assert_eq!(prepare("mov a, #1", 4), "mov a, #1\n");
        assert_eq!(prepare("", 4), "\n");
    }

    #[test]
    fn test_prepare_keeps_line_numbers() {
        let code = "start:\r\n\tmov a, #1   \r\n\r\n\r\n\tsjmp start\t\n\n\n";
        let prepared = prepare(code, 4);
        assert_eq!(prepared, "start:\n    mov a, #1\n\n\n    sjmp start\n");
        assert_eq!(prepared.lines().nth(4), Some("    sjmp start"));
    }

    #[test]
    fn test_lone_carriage_return_is_newline() {
        assert_eq!(prepare("a\rb\r", 4), "a\nb\n");
    }

    #[test]
    fn test_clean_collapses_blank_runs() {
        let code = "a\n\n\n\nb\n   \n\t\nc";
        assert_eq!(clean(code, 2), "a\n\nb\n\nc\n");
    }

    #[test]
    fn test_normalisation_is_idempotent() {
        let code = "\tloop: djnz r0, loop ; spin\r\n\r\n\r\n   \n end";
        let once = clean(code, 4);
        assert_eq!(clean(&once, 4), once);
        let once = prepare(code, 4);
        assert_eq!(prepare(&once, 4), once);
    }
}
