//! Retrieval filter builder.
//!
//! A request's [`SearchFilters`] are compiled once into a [`FilterSet`] of
//! tagged clauses. Every backend consumes the same set: the in-memory store
//! evaluates [`FilterSet::matches`], LanceDB receives [`FilterSet::to_sql`],
//! and Tantivy maps each clause onto a term-set query.

use serde::{Deserialize, Serialize};

use crate::types::{ContentType, Document, SearchFilters, Source};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "values", rename_all = "camelCase")]
pub enum FilterClause {
    /// Document lists at least one of these technologies (case-insensitive).
    Technologies(Vec<String>),
    Difficulty(Vec<u8>),
    ContentTypes(Vec<ContentType>),
    /// Source name is one of these.
    Sources(Vec<String>),
}

impl FilterClause {
    pub fn matches(&self, doc: &Document, source: &Source) -> bool {
        match self {
            Self::Technologies(wanted) => doc
                .metadata
                .technology
                .iter()
                .any(|t| wanted.iter().any(|w| w.eq_ignore_ascii_case(t))),
            Self::Difficulty(levels) => levels.contains(&doc.difficulty_level),
            Self::ContentTypes(types) => types.contains(&doc.content_type),
            Self::Sources(names) => names.iter().any(|n| n == &source.name),
        }
    }

    /// Predicate over the `documents` table columns.
    pub fn to_sql(&self) -> String {
        match self {
            Self::Technologies(wanted) => {
                let ors = wanted
                    .iter()
                    .map(|t| sql_like("technologies", &format!("%|{}|%", like_escape(&t.to_lowercase()))))
                    .collect::<Vec<_>>()
                    .join(" OR ");
                format!("({ors})")
            }
            Self::Difficulty(levels) => {
                let list = levels.iter().map(u8::to_string).collect::<Vec<_>>().join(", ");
                format!("difficulty_level IN ({list})")
            }
            Self::ContentTypes(types) => {
                let list = types.iter().map(|t| sql_string(t.as_str())).collect::<Vec<_>>().join(", ");
                format!("content_type IN ({list})")
            }
            Self::Sources(names) => format!("source IN ({})", sql_list(names)),
        }
    }
}

/// Conjunction of zero or more clauses.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterSet {
    pub clauses: Vec<FilterClause>,
}

impl FilterSet {
    /// Each optional filter contributes zero or one clause; empty lists contribute none.
    pub fn from_filters(filters: &SearchFilters) -> Self {
        let mut clauses = Vec::new();
        if let Some(tech) = filters.technologies.as_ref().filter(|v| !v.is_empty()) {
            clauses.push(FilterClause::Technologies(tech.clone()));
        }
        if let Some(levels) = filters.difficulty.as_ref().filter(|v| !v.is_empty()) {
            clauses.push(FilterClause::Difficulty(levels.clone()));
        }
        if let Some(types) = filters.content_types.as_ref().filter(|v| !v.is_empty()) {
            clauses.push(FilterClause::ContentTypes(types.clone()));
        }
        if let Some(sources) = filters.sources.as_ref().filter(|v| !v.is_empty()) {
            clauses.push(FilterClause::Sources(sources.clone()));
        }
        Self { clauses }
    }

    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }

    pub fn matches(&self, doc: &Document, source: &Source) -> bool {
        source.is_active && self.clauses.iter().all(|c| c.matches(doc, source))
    }

    /// SQL conjunction of all clauses, or `None` when unfiltered.
    pub fn to_sql(&self) -> Option<String> {
        if self.clauses.is_empty() {
            return None;
        }
        Some(self.clauses.iter().map(FilterClause::to_sql).collect::<Vec<_>>().join(" AND "))
    }
}

/// Single-quoted SQL literal with embedded quotes doubled.
pub fn sql_string(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Escapes LIKE wildcards so `value` matches literally inside a pattern
/// rendered by [`sql_like`].
pub fn like_escape(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        if matches!(c, '\\' | '%' | '_') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `column LIKE 'pattern' ESCAPE '\'`.
pub fn sql_like(column: &str, pattern: &str) -> String {
    format!("{} LIKE {} ESCAPE '\\'", column, sql_string(pattern))
}

pub fn sql_list<S: AsRef<str>>(values: &[S]) -> String {
    values.iter().map(|v| sql_string(v.as_ref())).collect::<Vec<_>>().join(", ")
}

/// Delimited encoding of technology tags for `LIKE` matching: `|rust|tokio|`.
pub fn encode_tag_column(tags: &[String]) -> String {
    if tags.is_empty() {
        return String::new();
    }
    let mut out = String::from("|");
    for t in tags {
        out.push_str(&t.to_lowercase());
        out.push('|');
    }
    out
}
