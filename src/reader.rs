//! Meaningful-line reader for the log format.
//!
//! Blank lines and full-line `#` comments are ignored everywhere in the log,
//! so every consumer goes through [`LineReader`] instead of reading the
//! stream directly.

use crate::error::Result;
use std::io::BufRead;

/// Reads semantically meaningful lines from a byte stream.
///
/// Generic over `R: BufRead` so tests can use `&[u8]` and production code
/// can use stdin or a buffered file.
pub struct LineReader<R: BufRead> {
    inner: R,
    line_number: u64,
}

impl<R: BufRead> LineReader<R> {
    /// Wrap a buffered stream.
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            line_number: 0,
        }
    }

    /// Number of the last line returned, 1-based. Used in diagnostics.
    pub fn line_number(&self) -> u64 {
        self.line_number
    }

    /// Next meaningful line, or `None` at end of stream.
    ///
    /// Skips lines that are empty, whitespace-only, or whose first
    /// non-whitespace character is `#`. The returned line has its trailing
    /// newline stripped.
    pub fn next_line(&mut self) -> Result<Option<String>> {
        let mut line = String::new();
        loop {
            line.clear();
            if self.inner.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            self.line_number += 1;

            let trimmed = line.trim_start();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            while line.ends_with('\n') || line.ends_with('\r') {
                line.pop();
            }
            return Ok(Some(line));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lines_of(text: &str) -> Vec<String> {
        let mut reader = LineReader::new(text.as_bytes());
        let mut out = Vec::new();
        while let Some(line) = reader.next_line().unwrap() {
            out.push(line);
        }
        out
    }

    #[test]
    fn test_skips_blank_and_comment_lines() {
        let text = "\n   \n# a comment\n  # indented comment\nfirst\n\nsecond\n";
        assert_eq!(lines_of(text), vec!["first", "second"]);
    }

    #[test]
    fn test_preserves_leading_whitespace_of_content() {
        assert_eq!(lines_of("  key = value\n"), vec!["  key = value"]);
    }

    #[test]
    fn test_empty_stream() {
        assert!(lines_of("").is_empty());
    }

    #[test]
    fn test_missing_trailing_newline() {
        assert_eq!(lines_of("last line"), vec!["last line"]);
    }

    #[test]
    fn test_line_numbers_count_skipped_lines() {
        let mut reader = LineReader::new("# one\n\nthree\n".as_bytes());
        assert_eq!(reader.next_line().unwrap().as_deref(), Some("three"));
        assert_eq!(reader.line_number(), 3);
    }
}
