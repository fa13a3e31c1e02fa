//! Query-focused excerpts and matched-term highlights.

use docsearch_core::text::{find_word, query_terms, truncate_chars, words, MIN_TERM_LEN};

const ELLIPSIS: &str = "...";

#[derive(Debug, Clone, Copy)]
pub struct SnippetHighlighter {
    max_length: usize,
    max_count: usize,
}

impl Default for SnippetHighlighter {
    fn default() -> Self {
        Self { max_length: 300, max_count: 5 }
    }
}

impl SnippetHighlighter {
    pub fn new(max_length: usize, max_count: usize) -> Self {
        Self { max_length, max_count }
    }

    pub fn snippet(&self, content: &str, query: &str) -> String {
        self.snippet_with_fallback(content, query, None)
    }

    /// Concatenates the sentences that mention a query term, up to `max_length`
    /// chars. With no matching sentence, `fallback` (a store headline) is used,
    /// then the leading chars of `content`.
    pub fn snippet_with_fallback(&self, content: &str, query: &str, fallback: Option<&str>) -> String {
        let terms = query_terms(query, 0);
        let mut out = String::new();
        let mut out_len = 0usize;
        let mut truncated = false;

        for sentence in sentences(content) {
            if !words(sentence).any(|w| terms.contains(&w)) {
                continue;
            }
            let sep = usize::from(!out.is_empty());
            let len = sentence.chars().count();
            if out_len + sep + len > self.max_length {
                truncated = true;
                if out.is_empty() {
                    out.push_str(truncate_chars(sentence, self.max_length));
                }
                break;
            }
            if sep == 1 {
                out.push(' ');
            }
            out.push_str(sentence);
            out_len += sep + len;
        }

        if out.is_empty() {
            let base = fallback.map(str::trim).filter(|h| !h.is_empty()).unwrap_or_else(|| content.trim());
            return self.leading(base);
        }
        if truncated {
            out.push_str(ELLIPSIS);
        }
        out
    }

    fn leading(&self, text: &str) -> String {
        let head = truncate_chars(text, self.max_length);
        if head.len() < text.len() {
            format!("{}{ELLIPSIS}", head.trim_end())
        } else {
            head.to_string()
        }
    }

    /// Whole-word matches of each query term longer than two chars, in
    /// query order, with the casing found in `content`.
    pub fn highlights(&self, content: &str, query: &str) -> Vec<String> {
        let mut out: Vec<String> = Vec::new();
        for term in query_terms(query, MIN_TERM_LEN) {
            if out.len() >= self.max_count {
                break;
            }
            if let Some(found) = find_word(content, &term) {
                if !out.iter().any(|h| h.eq_ignore_ascii_case(found)) {
                    out.push(found.to_string());
                }
            }
        }
        out
    }
}

/// Sentences split after `.`, `!` or `?` followed by whitespace; trimmed, non-empty.
fn sentences(content: &str) -> Vec<&str> {
    let mut out = Vec::new();
    let mut start = 0;
    let mut chars = content.char_indices().peekable();
    while let Some((i, c)) = chars.next() {
        if matches!(c, '.' | '!' | '?') && chars.peek().is_some_and(|(_, n)| n.is_whitespace()) {
            let end = i + c.len_utf8();
            let s = content[start..end].trim();
            if !s.is_empty() {
                out.push(s);
            }
            start = end;
        }
    }
    let tail = content[start..].trim();
    if !tail.is_empty() {
        out.push(tail);
    }
    out
}
