// ============================================================
// Layer 4 — Text Preprocessor
// ============================================================
// Normalises article and summary text before tokenisation.
//
// Scraped articles often carry:
//   - Non-breaking spaces (U+00A0)
//   - Zero-width spaces (U+200B) and byte order marks
//   - Windows line endings and tabs
//   - Runs of blank lines between paragraphs
//
// The pretrained BPE tokenizer would spend tokens on these, so
// every whitespace run (newlines included) collapses to a single
// space and the result is trimmed.
//
// Reference: Rust Book §8 (Strings in Rust)
//            Rust Book §13 (Iterators)

use crate::domain::article::SummaryPair;

pub struct Preprocessor;

impl Preprocessor {
    pub fn new() -> Self {
        Self
    }

    /// Clean a raw text string for downstream tokenisation.
    pub fn clean(&self, text: &str) -> String {
        let mapped = text.chars().map(|c| match c {
            '\u{00A0}' | '\u{200B}' | '\u{FEFF}' => ' ',
            c if c.is_control() => ' ',
            c => c,
        });

        let mut out = String::with_capacity(text.len());
        let mut pending_space = false;
        for c in mapped {
            if c.is_whitespace() {
                pending_space = !out.is_empty();
            } else {
                if pending_space {
                    out.push(' ');
                    pending_space = false;
                }
                out.push(c);
            }
        }
        out
    }

    /// Clean both sides of a training pair.
    pub fn clean_pair(&self, pair: SummaryPair) -> SummaryPair {
        SummaryPair {
            text:    self.clean(&pair.text),
            summary: self.clean(&pair.summary),
        }
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Unit Tests ───────────────────────────────────────────────────────────────
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapses_multiple_spaces() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello   world"), "hello world");
    }

    #[test]
    fn test_trims_edges() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("  hello world  "), "hello world");
    }

    #[test]
    fn test_removes_control_chars() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("hello\x01world"), "hello world");
    }

    #[test]
    fn test_joins_paragraphs() {
        let p = Preprocessor::new();
        assert_eq!(p.clean("line1\r\n\r\n\tline2\u{00A0}end"), "line1 line2 end");
    }

    #[test]
    fn test_empty_string() {
        let p = Preprocessor::new();
        assert_eq!(p.clean(""), "");
        assert_eq!(p.clean(" \u{200B} \n"), "");
    }

    #[test]
    fn test_clean_pair() {
        let p = Preprocessor::new();
        let pair = p.clean_pair(SummaryPair::new(" a  b ", "c\n\nd"));
        assert_eq!(pair, SummaryPair::new("a b", "c d"));
    }
}
