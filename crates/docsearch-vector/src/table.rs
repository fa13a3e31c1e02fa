//! LanceDB connection and housekeeping helpers.
//!
//! Opens the database, creates empty tables on first use, and wraps the
//! scan/upsert patterns shared by the store and the cache.
use arrow_array::{Array, RecordBatch, RecordBatchIterator};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{connect, Connection, Table};
use std::sync::Arc;

use docsearch_core::{Error, Result};

pub(crate) fn retrieval_err(e: impl std::fmt::Display) -> Error {
	Error::Retrieval(format!("lancedb: {}", e))
}

pub(crate) fn indexing_err(e: impl std::fmt::Display) -> Error {
	Error::Indexing(format!("lancedb: {}", e))
}

pub async fn open_db(uri: &str) -> Result<Connection> {
	connect(uri).execute().await.map_err(retrieval_err)
}

pub async fn ensure_table(conn: &Connection, name: &str, schema: Arc<arrow_schema::Schema>) -> Result<()> {
	let names = conn.table_names().execute().await.map_err(retrieval_err)?;
	if names.iter().any(|n| n == name) {
		return Ok(());
	}
	// create empty table with 0 rows
	let iter = RecordBatchIterator::new(vec![].into_iter(), schema.clone());
	conn.create_table(name, Box::new(iter)).execute().await.map_err(indexing_err)?;
	Ok(())
}

/// Insert-or-update `batch` keyed on `on` columns.
pub async fn merge_upsert(table: &Table, on: &[&str], batch: RecordBatch) -> Result<()> {
	let schema = batch.schema();
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
	let mut mi = table.merge_insert(on);
	mi.when_matched_update_all(None).when_not_matched_insert_all();
	let _ = mi.execute(reader).await.map_err(indexing_err)?;
	Ok(())
}

pub async fn append(table: &Table, batch: RecordBatch) -> Result<()> {
	let schema = batch.schema();
	let reader = Box::new(RecordBatchIterator::new(vec![Ok(batch)].into_iter(), schema));
	table.add(reader).execute().await.map_err(indexing_err)?;
	Ok(())
}

/// All batches matching an optional SQL predicate.
pub async fn scan(table: &Table, predicate: Option<&str>, limit: Option<usize>) -> Result<Vec<RecordBatch>> {
	let mut query = table.query();
	if let Some(p) = predicate {
		query = query.only_if(p);
	}
	if let Some(l) = limit {
		query = query.limit(l);
	}
	let mut stream = query.execute().await.map_err(retrieval_err)?;
	let mut out = Vec::new();
	while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await.map_err(retrieval_err)? {
		if batch.num_rows() > 0 {
			out.push(batch);
		}
	}
	Ok(out)
}

/// Typed column lookup; a missing or mistyped column is a retrieval error.
pub fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<T>())
		.ok_or_else(|| Error::Retrieval(format!("column '{}' missing or mistyped", name)))
}
