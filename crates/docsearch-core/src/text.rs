//! Query-term and word-boundary helpers shared by ranking and highlighting.

/// Stop words dropped from keyword queries by the text backends.
pub const STOP_WORDS: &[&str] = &[
    "a", "an", "and", "are", "as", "at", "be", "by", "for", "from", "has", "he", "in", "is", "it", "its", "of", "on",
    "that", "the", "to", "was", "will", "with", "or", "but", "not", "this", "these", "they", "them", "their", "there",
    "then", "than", "so", "if", "when", "where", "why", "how", "what", "which", "who", "whom", "whose", "can", "could",
    "should", "would", "may", "might", "must", "shall", "do", "does", "did", "have", "had", "having",
];

/// Minimum term length (exclusive) for title matching and highlights.
pub const MIN_TERM_LEN: usize = 2;

/// Lowercased alphanumeric words of `text`, in order.
pub fn words(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_lowercase)
}

/// Distinct lowercased query terms longer than `min_len` chars, first-seen order.
pub fn query_terms(query: &str, min_len: usize) -> Vec<String> {
    let mut seen = Vec::new();
    for w in words(query) {
        if w.chars().count() > min_len && !seen.contains(&w) {
            seen.push(w);
        }
    }
    seen
}

/// Whole-word, case-insensitive containment of an already-lowercased term.
pub fn contains_word(haystack: &str, term: &str) -> bool {
    words(haystack).any(|w| w == term)
}

/// First whole-word occurrence of `term` in `text`, with its original casing.
pub fn find_word<'a>(text: &'a str, term: &str) -> Option<&'a str> {
    text.split(|c: char| !c.is_alphanumeric())
        .find(|w| !w.is_empty() && w.to_lowercase() == term)
}

/// Truncates to at most `max_chars` chars without splitting a code point.
pub fn truncate_chars(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Whitespace-word window of `content` starting at word `first_word`, holding
/// between `min_words` and `max_words` words. The start moves back when too
/// few words remain after it.
pub fn headline_window(content: &str, first_word: usize, (min_words, max_words): (usize, usize)) -> String {
    let all: Vec<&str> = content.split_whitespace().collect();
    let mut start = first_word.min(all.len());
    if all.len() - start < min_words {
        start = all.len().saturating_sub(min_words);
    }
    let end = (start + max_words).min(all.len());
    all[start..end].join(" ")
}

/// Maps an unbounded lexical score onto `[0, 1)`, preserving order.
pub fn squash_relevance(raw: f32) -> f32 {
    if raw <= 0.0 {
        0.0
    } else {
        raw / (raw + 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_terms_filter_short_and_duplicate_words() {
        assert_eq!(query_terms("REST api, an API pagination", 2), vec!["rest", "api", "pagination"]);
    }

    #[test]
    fn contains_word_respects_boundaries() {
        assert!(contains_word("Paginating the REST-API", "rest"));
        assert!(!contains_word("Restful services", "rest"));
    }

    #[test]
    fn find_word_keeps_original_case() {
        assert_eq!(find_word("Use Tokio runtimes", "tokio"), Some("Tokio"));
        assert_eq!(find_word("tokenize", "tokio"), None);
    }

    #[test]
    fn headline_window_backs_up_near_the_end() {
        let content = "one two three four five six";
        assert_eq!(headline_window(content, 1, (2, 3)), "two three four");
        assert_eq!(headline_window(content, 5, (3, 4)), "four five six");
    }

    #[test]
    fn squash_is_monotone_and_bounded() {
        assert_eq!(squash_relevance(0.0), 0.0);
        assert!(squash_relevance(1.0) < squash_relevance(4.0));
        assert!(squash_relevance(1e6) < 1.0);
    }

    #[test]
    fn truncate_is_utf8_safe() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("hi", 10), "hi");
    }
}
