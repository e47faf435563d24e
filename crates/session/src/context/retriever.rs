//! Keyword context retrieval.
//!
//! Scans a plain-text document for lines containing the query
//! (case-insensitive) and returns the lines around every hit, deduplicated
//! by content in first-seen order.
//!
//! A document that cannot be read is never an error here: grounding is
//! optional, so the failure is traced and an empty snippet is returned.

use std::collections::HashSet;
use std::path::Path;
use recurchat_core::error::ContextError;
use tracing::{debug, warn};

/// Lines kept on each side of a matching line when no radius is configured.
pub const DEFAULT_WINDOW: usize = 2;

/// Extracts snippets from a document on disk.
#[derive(Debug, Clone, Copy)]
pub struct ContextRetriever {
    window: usize,
}

impl Default for ContextRetriever {
    fn default() -> Self {
        Self::new(DEFAULT_WINDOW)
    }
}

impl ContextRetriever {
    /// Create a retriever with the given window radius.
    pub fn new(window: usize) -> Self {
        Self { window }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Read `document` and return the snippet for `query`.
    ///
    /// Returns an empty string when nothing matches or the document is
    /// unreadable (missing, permission denied, not valid UTF-8).
    pub fn retrieve(&self, document: &Path, query: &str) -> String {
        match read_lines(document) {
            Ok(lines) => {
                let snippet = extract_snippet(&lines, query, self.window);
                debug!(
                    document = %document.display(),
                    lines = lines.len(),
                    snippet_chars = snippet.len(),
                    "Retrieved context snippet"
                );
                snippet
            }
            Err(e) => {
                warn!(error = %e, "Context document unavailable, continuing without context");
                String::new()
            }
        }
    }
}

/// Read a document as a list of lines.
fn read_lines(path: &Path) -> Result<Vec<String>, ContextError> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            ContextError::NotFound(path.to_path_buf())
        } else {
            ContextError::Unreadable {
                path: path.to_path_buf(),
                reason: e.to_string(),
            }
        }
    })?;

    Ok(split_lines(&content).into_iter().map(str::to_string).collect())
}

/// Characters that end a line. `\r\n` counts as a single break.
fn is_line_break(c: char) -> bool {
    matches!(
        c,
        '\n' | '\r' | '\x0b' | '\x0c' | '\x1c' | '\x1d' | '\x1e' | '\u{85}' | '\u{2028}' | '\u{2029}'
    )
}

/// Split text into lines on every line-break character.
///
/// Old Mac (`\r`), DOS (`\r\n`) and Unix endings all work, and so do form
/// feeds and Unicode line/paragraph separators. A trailing break does not
/// produce an empty last line; empty lines in the middle are kept.
pub fn split_lines(text: &str) -> Vec<&str> {
    let mut lines = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();

    while let Some((idx, c)) = chars.next() {
        if !is_line_break(c) {
            continue;
        }
        lines.push(&text[start..idx]);
        start = idx + c.len_utf8();
        if c == '\r' {
            if let Some(&(next, '\n')) = chars.peek() {
                chars.next();
                start = next + 1;
            }
        }
    }

    if start < text.len() {
        lines.push(&text[start..]);
    }
    lines
}

/// Collect the windows around every matching line, then deduplicate.
///
/// An empty query matches every line.
pub fn extract_snippet<S: AsRef<str>>(lines: &[S], query: &str, window: usize) -> String {
    let needle = query.to_lowercase();

    let mut collected: Vec<&str> = Vec::new();
    for (idx, line) in lines.iter().enumerate() {
        let text: &str = line.as_ref();
        if text.to_lowercase().contains(&needle) {
            let start = idx.saturating_sub(window);
            let end = idx.saturating_add(window).saturating_add(1).min(lines.len());
            collected.extend(lines[start..end].iter().map(|l| l.as_ref()));
        }
    }

    let mut seen = HashSet::new();
    let unique: Vec<&str> = collected
        .into_iter()
        .filter(|line| seen.insert(*line))
        .collect();

    unique.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn ten_lines() -> Vec<String> {
        (0..10)
            .map(|i| {
                if i == 5 {
                    "The cat sat.".to_string()
                } else {
                    format!("line {i}")
                }
            })
            .collect()
    }

    #[test]
    fn window_around_single_match() {
        let snippet = extract_snippet(&ten_lines(), "cat", 2);
        assert_eq!(snippet, "line 3\nline 4\nThe cat sat.\nline 6\nline 7");
    }

    #[test]
    fn match_is_case_insensitive() {
        let snippet = extract_snippet(&ten_lines(), "CAT", 0);
        assert_eq!(snippet, "The cat sat.");
    }

    #[test]
    fn no_match_is_empty() {
        assert_eq!(extract_snippet(&ten_lines(), "dog", 2), "");
    }

    #[test]
    fn windows_clip_to_document_bounds() {
        let lines = vec!["cat first", "b", "c", "d", "cat last"];
        let snippet = extract_snippet(&lines, "cat", 3);
        assert_eq!(snippet, "cat first\nb\nc\nd\ncat last");
    }

    #[test]
    fn overlapping_windows_are_deduplicated_in_first_seen_order() {
        let lines = vec!["a", "cat one", "b", "cat two", "c"];
        let snippet = extract_snippet(&lines, "cat", 1);
        assert_eq!(snippet, "a\ncat one\nb\ncat two\nc");
    }

    #[test]
    fn repeated_line_content_appears_once() {
        let lines = vec!["---", "cat", "---", "x", "---", "cat", "---"];
        let snippet = extract_snippet(&lines, "cat", 1);
        let returned: Vec<&str> = snippet.split('\n').collect();
        let unique: HashSet<&str> = returned.iter().copied().collect();
        assert_eq!(returned.len(), unique.len());
        assert_eq!(snippet, "---\ncat");
    }

    #[test]
    fn empty_query_matches_everything() {
        let lines = vec!["a", "b", "a", "c"];
        assert_eq!(extract_snippet(&lines, "", 0), "a\nb\nc");
    }

    #[test]
    fn zero_window_returns_only_matches() {
        let snippet = extract_snippet(&ten_lines(), "line 1", 0);
        assert_eq!(snippet, "line 1");
    }

    #[test]
    fn retrieve_reads_document_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("story.txt");
        let mut f = std::fs::File::create(&path).unwrap();
        for line in ten_lines() {
            writeln!(f, "{line}").unwrap();
        }

        let snippet = ContextRetriever::default().retrieve(&path, "cat");
        assert_eq!(snippet, "line 3\nline 4\nThe cat sat.\nline 6\nline 7");
    }

    #[test]
    fn crlf_documents_match_like_lf() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dos.txt");
        std::fs::write(&path, "one\r\nthe cat\r\nthree\r\n").unwrap();

        let snippet = ContextRetriever::new(1).retrieve(&path, "cat");
        assert_eq!(snippet, "one\nthe cat\nthree");
    }

    #[test]
    fn carriage_return_only_documents_split_per_line() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mac.txt");
        std::fs::write(&path, "intro\rthe cat sat\routro\rfar\rfarther").unwrap();

        assert_eq!(ContextRetriever::new(0).retrieve(&path, "cat"), "the cat sat");
        assert_eq!(
            ContextRetriever::new(1).retrieve(&path, "cat"),
            "intro\nthe cat sat\noutro"
        );
    }

    #[test]
    fn form_feed_is_a_line_break() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("paged.txt");
        std::fs::write(&path, "page one\x0cthe cat sat\nnext").unwrap();

        assert_eq!(ContextRetriever::new(0).retrieve(&path, "cat"), "the cat sat");
    }

    #[test]
    fn split_lines_break_rules() {
        assert_eq!(split_lines(""), Vec::<&str>::new());
        assert_eq!(split_lines("a\n"), vec!["a"]);
        assert_eq!(split_lines("a\n\nb"), vec!["a", "", "b"]);
        assert_eq!(split_lines("a\r\nb\rc\nd"), vec!["a", "b", "c", "d"]);
        assert_eq!(split_lines("a\r\n\r\n"), vec!["a", ""]);
        assert_eq!(
            split_lines("a\x0bb\x1cc\u{85}d\u{2028}e\u{2029}f"),
            vec!["a", "b", "c", "d", "e", "f"]
        );
    }

    #[test]
    fn missing_document_yields_empty_snippet() {
        let snippet =
            ContextRetriever::default().retrieve(Path::new("/nonexistent/notes.txt"), "cat");
        assert_eq!(snippet, "");
    }

    #[test]
    fn non_utf8_document_yields_empty_snippet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.txt");
        std::fs::write(&path, [0x63, 0x61, 0x74, 0xff, 0xfe]).unwrap();

        assert_eq!(ContextRetriever::default().retrieve(&path, "cat"), "");
    }
}
