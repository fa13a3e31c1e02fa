//! docsearch-text
//!
//! Tantivy-backed keyword index. Documents are keyed by url; searches apply the
//! shared filter set as zero-score term-set clauses and return a bounded
//! headline per hit.
pub mod schema;
pub mod index;
pub mod search;

pub use index::TantivyIndexer;
