use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, ConstScoreQuery, Occur, Query, QueryParser, TermSetQuery};
use tantivy::schema::{Field, Value};
use tantivy::snippet::SnippetGenerator;
use tantivy::{Index, IndexReader, TantivyDocument, Term};

use docsearch_core::filter::FilterClause;
use docsearch_core::text::{headline_window, squash_relevance};
use docsearch_core::traits::TextQuery;
use docsearch_core::types::TextHit;
use docsearch_core::Result;

use crate::index::tantivy_err;
use crate::schema::Fields;

/// Zero-score restriction: matches documents without touching relevance.
fn restrict(terms: Vec<Term>) -> Box<dyn Query> {
	Box::new(ConstScoreQuery::new(Box::new(TermSetQuery::new(terms)), 0.0))
}

fn text_terms(field: Field, values: impl IntoIterator<Item = String>) -> Vec<Term> {
	values.into_iter().map(|v| Term::from_field_text(field, &v)).collect()
}

pub fn clause_query(fields: &Fields, clause: &FilterClause) -> Box<dyn Query> {
	match clause {
		FilterClause::Technologies(tech) => restrict(text_terms(fields.technology, tech.iter().map(|t| t.to_lowercase()))),
		FilterClause::Difficulty(levels) => {
			restrict(levels.iter().map(|l| Term::from_field_u64(fields.difficulty, u64::from(*l))).collect())
		}
		FilterClause::ContentTypes(types) => {
			restrict(text_terms(fields.content_type, types.iter().map(|t| t.as_str().to_string())))
		}
		FilterClause::Sources(names) => restrict(text_terms(fields.source, names.iter().cloned())),
	}
}

/// Blocking BM25 search. [`crate::TantivyIndexer`] runs it on Tokio's
/// blocking pool.
pub fn run_search(index: &Index, reader: &IndexReader, f: &Fields, query: &TextQuery) -> Result<Vec<TextHit>> {
	if query.limit == 0 || query.active_sources.is_empty() || query.text.trim().is_empty() {
		return Ok(vec![]);
	}
	let parser = QueryParser::for_index(index, vec![f.title, f.content]);
	let (text_query, errors) = parser.parse_query_lenient(&query.text);
	if !errors.is_empty() {
		tracing::debug!(errors = errors.len(), "lenient keyword parse dropped parts of the query");
	}

	let mut clauses: Vec<(Occur, Box<dyn Query>)> = vec![(Occur::Must, text_query.box_clone())];
	clauses.push((Occur::Must, restrict(text_terms(f.source, query.active_sources.iter().cloned()))));
	for clause in &query.filters.clauses {
		clauses.push((Occur::Must, clause_query(f, clause)));
	}
	let full = BooleanQuery::new(clauses);

	let searcher = reader.searcher();
	let top_docs = searcher.search(&full, &TopDocs::with_limit(query.limit)).map_err(tantivy_err)?;
	let mut snippets = SnippetGenerator::create(&searcher, &*text_query, f.content).map_err(tantivy_err)?;
	snippets.set_max_num_chars(query.headline_words.1.max(1) * 8);

	let mut hits = Vec::with_capacity(top_docs.len());
	for (score, addr) in top_docs {
		let doc: TantivyDocument = searcher.doc(addr).map_err(tantivy_err)?;
		let Some(id) = doc.get_first(f.id).and_then(|v| v.as_str()).map(str::to_string) else {
			continue;
		};
		let content = doc.get_first(f.content).and_then(|v| v.as_str()).unwrap_or("");
		let headline = headline_for(content, snippets.snippet(content).fragment(), query.headline_words);
		hits.push(TextHit { document_id: id, score: squash_relevance(score), headline });
	}
	Ok(hits)
}

/// Bounded word window anchored where Tantivy's best fragment starts.
fn headline_for(content: &str, fragment: &str, bounds: (usize, usize)) -> Option<String> {
	let fragment = fragment.trim();
	if fragment.is_empty() {
		return None;
	}
	let start = content.find(fragment).unwrap_or(0);
	let first_word = content[..start].split_whitespace().count();
	Some(headline_window(content, first_word, bounds))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn headline_starts_at_fragment() {
		let content = "alpha beta gamma delta epsilon zeta";
		assert_eq!(headline_for(content, "gamma delta", (2, 3)).as_deref(), Some("gamma delta epsilon"));
		assert_eq!(headline_for(content, "  ", (2, 3)), None);
	}
}
