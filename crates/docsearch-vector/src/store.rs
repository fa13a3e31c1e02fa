use arrow_array::{
	Array, BooleanArray, FixedSizeListArray, Float32Array, Int32Array, RecordBatch, StringArray, TimestampMillisecondArray,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::{Connection, DistanceType, Table};
use std::collections::HashMap;
use std::sync::Arc;

use docsearch_core::filter::{encode_tag_column, sql_list, sql_string, FilterSet};
use docsearch_core::traits::{DocumentCatalog, VectorIndexer};
use docsearch_core::types::{
	document_id_for_url, ChunkHit, ContentType, Document, DocumentId, DocumentMetadata, DocumentRow, EmbeddingChunk, Source,
};
use docsearch_core::{Error, Result};

use crate::schema::{
	build_chunks_schema, build_documents_schema, build_sources_schema, CHUNKS_TABLE, DOCUMENTS_TABLE, SOURCES_TABLE,
};
use crate::table::{append, column, ensure_table, indexing_err, merge_upsert, open_db, retrieval_err, scan};

/// LanceDB-backed document catalog and chunk vector index.
pub struct LanceStore {
	db: Connection,
	dim: usize,
}

impl LanceStore {
	pub async fn open(uri: &str, dim: usize) -> Result<Self> {
		let db = open_db(uri).await?;
		ensure_table(&db, DOCUMENTS_TABLE, build_documents_schema()).await?;
		ensure_table(&db, SOURCES_TABLE, build_sources_schema()).await?;
		ensure_table(&db, CHUNKS_TABLE, build_chunks_schema(dim)).await?;
		Ok(Self { db, dim })
	}

	pub fn connection(&self) -> &Connection {
		&self.db
	}

	async fn table(&self, name: &str) -> Result<Table> {
		self.db.open_table(name).execute().await.map_err(retrieval_err)
	}

	async fn source_map(&self) -> Result<HashMap<String, Source>> {
		Ok(self.sources().await?.into_iter().map(|s| (s.name.clone(), s)).collect())
	}
}

fn document_batch(doc: &Document, id: &str) -> Result<RecordBatch> {
	let metadata_json = serde_json::to_string(&doc.metadata).map_err(indexing_err)?;
	RecordBatch::try_new(
		build_documents_schema(),
		vec![
			Arc::new(StringArray::from(vec![id.to_string()])),
			Arc::new(StringArray::from(vec![doc.url.clone()])),
			Arc::new(StringArray::from(vec![doc.title.clone()])),
			Arc::new(StringArray::from(vec![doc.content.clone()])),
			Arc::new(StringArray::from(vec![doc.content_type.as_str().to_string()])),
			Arc::new(StringArray::from(vec![doc.source.clone()])),
			Arc::new(StringArray::from(vec![encode_tag_column(&doc.metadata.technology)])),
			Arc::new(StringArray::from(vec![metadata_json])),
			Arc::new(Int32Array::from(vec![i32::from(doc.difficulty_level)])),
			Arc::new(Float32Array::from(vec![doc.authority_score])),
			Arc::new(Int32Array::from(vec![doc.word_count as i32])),
			Arc::new(Int32Array::from(vec![doc.reading_time as i32])),
			Arc::new(StringArray::from(vec![doc.content_hash.clone()])),
			Arc::new(TimestampMillisecondArray::from(vec![doc.updated_at.map(|t| t.timestamp_millis())])),
		],
	)
	.map_err(indexing_err)
}

fn documents_from_batch(batch: &RecordBatch) -> Result<Vec<Document>> {
	let ids = column::<StringArray>(batch, "id")?;
	let urls = column::<StringArray>(batch, "url")?;
	let titles = column::<StringArray>(batch, "title")?;
	let contents = column::<StringArray>(batch, "content")?;
	let types = column::<StringArray>(batch, "content_type")?;
	let sources = column::<StringArray>(batch, "source")?;
	let metadata = column::<StringArray>(batch, "metadata_json")?;
	let difficulty = column::<Int32Array>(batch, "difficulty_level")?;
	let authority = column::<Float32Array>(batch, "authority_score")?;
	let word_count = column::<Int32Array>(batch, "word_count")?;
	let reading_time = column::<Int32Array>(batch, "reading_time")?;
	let hashes = column::<StringArray>(batch, "content_hash")?;
	let updated = column::<TimestampMillisecondArray>(batch, "updated_at")?;
	let mut out = Vec::with_capacity(batch.num_rows());
	for i in 0..batch.num_rows() {
		let metadata: DocumentMetadata = serde_json::from_str(metadata.value(i)).map_err(retrieval_err)?;
		let updated_at = if updated.is_null(i) { None } else { DateTime::<Utc>::from_timestamp_millis(updated.value(i)) };
		out.push(Document {
			id: ids.value(i).to_string(),
			title: titles.value(i).to_string(),
			content: contents.value(i).to_string(),
			url: urls.value(i).to_string(),
			content_type: ContentType::parse(types.value(i)),
			metadata,
			difficulty_level: difficulty.value(i).clamp(0, i32::from(u8::MAX)) as u8,
			authority_score: authority.value(i),
			word_count: word_count.value(i).max(0) as u32,
			reading_time: reading_time.value(i).max(0) as u32,
			content_hash: hashes.value(i).to_string(),
			source: sources.value(i).to_string(),
			updated_at,
		});
	}
	Ok(out)
}

#[async_trait]
impl DocumentCatalog for LanceStore {
	async fn upsert_document(&self, doc: &Document) -> Result<DocumentId> {
		if doc.url.trim().is_empty() {
			return Err(Error::Indexing("document url is empty".into()));
		}
		let id = document_id_for_url(&doc.url);
		let table = self.table(DOCUMENTS_TABLE).await?;
		merge_upsert(&table, &["url"], document_batch(doc, &id)?).await?;
		tracing::debug!(url = %doc.url, id = %id, "document upserted");
		Ok(id)
	}

	async fn get_document_by_url(&self, url: &str) -> Result<Option<Document>> {
		let table = self.table(DOCUMENTS_TABLE).await?;
		let predicate = format!("url = {}", sql_string(url));
		for batch in scan(&table, Some(&predicate), Some(1)).await? {
			if let Some(doc) = documents_from_batch(&batch)?.into_iter().next() {
				return Ok(Some(doc));
			}
		}
		Ok(None)
	}

	async fn fetch_documents(&self, ids: &[DocumentId], filters: &FilterSet) -> Result<Vec<DocumentRow>> {
		if ids.is_empty() {
			return Ok(vec![]);
		}
		let mut predicate = format!("id IN ({})", sql_list(ids));
		if let Some(clauses) = filters.to_sql() {
			predicate = format!("{} AND {}", predicate, clauses);
		}
		let table = self.table(DOCUMENTS_TABLE).await?;
		let sources = self.source_map().await?;
		let mut rows = Vec::new();
		for batch in scan(&table, Some(&predicate), None).await? {
			for document in documents_from_batch(&batch)? {
				let source = sources.get(&document.source).cloned().unwrap_or_else(|| Source::new(&document.source));
				if filters.matches(&document, &source) {
					rows.push(DocumentRow { document, source });
				}
			}
		}
		Ok(rows)
	}

	async fn upsert_source(&self, source: &Source) -> Result<()> {
		let batch = RecordBatch::try_new(
			build_sources_schema(),
			vec![
				Arc::new(StringArray::from(vec![source.name.clone()])),
				Arc::new(StringArray::from(vec![source.source_type.clone()])),
				Arc::new(Float32Array::from(vec![source.authority_weight])),
				Arc::new(BooleanArray::from(vec![source.is_active])),
			],
		)
		.map_err(indexing_err)?;
		let table = self.table(SOURCES_TABLE).await?;
		merge_upsert(&table, &["name"], batch).await
	}

	async fn sources(&self) -> Result<Vec<Source>> {
		let table = self.table(SOURCES_TABLE).await?;
		let mut out = Vec::new();
		for batch in scan(&table, None, None).await? {
			let names = column::<StringArray>(&batch, "name")?;
			let types = column::<StringArray>(&batch, "source_type")?;
			let weights = column::<Float32Array>(&batch, "authority_weight")?;
			let active = column::<BooleanArray>(&batch, "is_active")?;
			for i in 0..batch.num_rows() {
				out.push(Source {
					name: names.value(i).to_string(),
					source_type: types.value(i).to_string(),
					authority_weight: weights.value(i),
					is_active: active.value(i),
				});
			}
		}
		out.sort_by(|a, b| a.name.cmp(&b.name));
		Ok(out)
	}

	async fn count_documents(&self) -> Result<usize> {
		self.table(DOCUMENTS_TABLE).await?.count_rows(None).await.map_err(retrieval_err)
	}
}

#[async_trait]
impl VectorIndexer for LanceStore {
	async fn replace_chunks(&self, document_id: &str, chunks: &[EmbeddingChunk]) -> Result<()> {
		if let Some(bad) = chunks.iter().find(|c| c.vector.len() != self.dim) {
			return Err(Error::Indexing(format!(
				"chunk {} has dimension {}, expected {}",
				bad.chunk_index,
				bad.vector.len(),
				self.dim
			)));
		}
		let table = self.table(CHUNKS_TABLE).await?;
		table.delete(&format!("document_id = {}", sql_string(document_id))).await.map_err(indexing_err)?;
		if chunks.is_empty() {
			return Ok(());
		}
		let ids: Vec<String> = chunks.iter().map(|c| format!("{}:{}", document_id, c.chunk_index)).collect();
		let doc_ids: Vec<String> = chunks.iter().map(|_| document_id.to_string()).collect();
		let indices: Vec<i32> = chunks.iter().map(|c| c.chunk_index as i32).collect();
		let texts: Vec<String> = chunks.iter().map(|c| c.content_text.clone()).collect();
		let vectors: Vec<Option<Vec<Option<f32>>>> = chunks.iter().map(|c| Some(c.vector.iter().map(|&x| Some(x)).collect())).collect();
		let batch = RecordBatch::try_new(
			build_chunks_schema(self.dim),
			vec![
				Arc::new(StringArray::from(ids)),
				Arc::new(StringArray::from(doc_ids)),
				Arc::new(Int32Array::from(indices)),
				Arc::new(StringArray::from(texts)),
				Arc::new(FixedSizeListArray::from_iter_primitive::<arrow_array::types::Float32Type, _, _>(vectors.into_iter(), self.dim as i32)),
			],
		)
		.map_err(indexing_err)?;
		append(&table, batch).await?;
		tracing::debug!(document_id, chunks = chunks.len(), "chunk vectors replaced");
		Ok(())
	}

	async fn search_vec(&self, query_vec: &[f32], k: usize) -> Result<Vec<ChunkHit>> {
		if k == 0 {
			return Ok(vec![]);
		}
		if query_vec.len() != self.dim {
			return Err(Error::Retrieval(format!("query vector has dimension {}, expected {}", query_vec.len(), self.dim)));
		}
		let table = self.table(CHUNKS_TABLE).await?;
		if table.count_rows(None).await.map_err(retrieval_err)? == 0 {
			return Ok(vec![]);
		}
		let mut stream = table
			.vector_search(query_vec.to_vec())
			.map_err(retrieval_err)?
			.distance_type(DistanceType::Cosine)
			.limit(k)
			.execute()
			.await
			.map_err(retrieval_err)?;
		let mut hits = Vec::new();
		while let Some(batch) = futures::TryStreamExt::try_next(&mut stream).await.map_err(retrieval_err)? {
			let doc_ids = column::<StringArray>(&batch, "document_id")?;
			let indices = column::<Int32Array>(&batch, "chunk_index")?;
			let texts = column::<StringArray>(&batch, "content_text")?;
			let distances = column::<Float32Array>(&batch, "_distance")?;
			for i in 0..batch.num_rows() {
				hits.push(ChunkHit {
					document_id: doc_ids.value(i).to_string(),
					chunk_index: indices.value(i).max(0) as u32,
					content_text: texts.value(i).to_string(),
					similarity: 1.0 - distances.value(i),
				});
			}
		}
		hits.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
		Ok(hits)
	}
}
