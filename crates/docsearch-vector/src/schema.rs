//! Arrow schemas of the Lance tables.
use arrow_schema::{DataType, Field, Schema, TimeUnit};
use std::sync::Arc;

pub const DOCUMENTS_TABLE: &str = "documents";
pub const SOURCES_TABLE: &str = "sources";
pub const CHUNKS_TABLE: &str = "chunks";
pub const CACHE_TABLE: &str = "query_cache";

fn timestamp(name: &str, nullable: bool) -> Field {
	Field::new(name, DataType::Timestamp(TimeUnit::Millisecond, None), nullable)
}

pub fn build_documents_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("url", DataType::Utf8, false),
		Field::new("title", DataType::Utf8, false),
		Field::new("content", DataType::Utf8, false),
		Field::new("content_type", DataType::Utf8, false),
		Field::new("source", DataType::Utf8, false),
		// `|tag|tag|` encoding, see `docsearch_core::filter::encode_tag_column`
		Field::new("technologies", DataType::Utf8, false),
		Field::new("metadata_json", DataType::Utf8, false),
		Field::new("difficulty_level", DataType::Int32, false),
		Field::new("authority_score", DataType::Float32, false),
		Field::new("word_count", DataType::Int32, false),
		Field::new("reading_time", DataType::Int32, false),
		Field::new("content_hash", DataType::Utf8, false),
		timestamp("updated_at", true),
	]))
}

pub fn build_sources_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("name", DataType::Utf8, false),
		Field::new("source_type", DataType::Utf8, false),
		Field::new("authority_weight", DataType::Float32, false),
		Field::new("is_active", DataType::Boolean, false),
	]))
}

pub fn build_chunks_schema(dim: usize) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::Utf8, false),
		Field::new("document_id", DataType::Utf8, false),
		Field::new("chunk_index", DataType::Int32, false),
		Field::new("content_text", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim as i32), true),
	]))
}

pub fn build_cache_schema() -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("key", DataType::Utf8, false),
		Field::new("payload", DataType::Binary, false),
		timestamp("expires_at", false),
	]))
}
