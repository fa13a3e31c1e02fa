use tantivy::schema::{Field, IndexRecordOption, NumericOptions, Schema, TextFieldIndexing, TextOptions, STORED, STRING};
use tantivy::tokenizer::{LowerCaser, SimpleTokenizer, StopWordFilter, TextAnalyzer};
use tantivy::Index;

use docsearch_core::text::STOP_WORDS;
use docsearch_core::{Error, Result};

pub const TOKENIZER: &str = "text_with_stopwords";

/// Resolved field handles of the documents schema.
#[derive(Clone, Copy)]
pub struct Fields {
	pub id: Field,
	pub url: Field,
	pub title: Field,
	pub content: Field,
	pub technology: Field,
	pub difficulty: Field,
	pub content_type: Field,
	pub source: Field,
}

impl Fields {
	pub fn resolve(schema: &Schema) -> Result<Self> {
		let get = |name: &str| schema.get_field(name).map_err(|e| Error::Retrieval(format!("tantivy schema: {}", e)));
		Ok(Self {
			id: get("id")?,
			url: get("url")?,
			title: get("title")?,
			content: get("content")?,
			technology: get("technology")?,
			difficulty: get("difficulty")?,
			content_type: get("content_type")?,
			source: get("source")?,
		})
	}
}

pub fn build_schema() -> Schema {
	let mut schema_builder = Schema::builder();
	schema_builder.add_text_field("id", STRING | STORED);
	schema_builder.add_text_field("url", STRING | STORED);
	let text_field_indexing = TextFieldIndexing::default().set_tokenizer(TOKENIZER).set_index_option(IndexRecordOption::WithFreqsAndPositions);
	let text_options = TextOptions::default().set_indexing_options(text_field_indexing).set_stored();
	schema_builder.add_text_field("title", text_options.clone());
	schema_builder.add_text_field("content", text_options);
	// Raw lowercased tags, one value per technology.
	schema_builder.add_text_field("technology", STRING);
	schema_builder.add_u64_field("difficulty", NumericOptions::default().set_indexed());
	schema_builder.add_text_field("content_type", STRING);
	schema_builder.add_text_field("source", STRING | STORED);
	schema_builder.build()
}

pub fn register_tokenizer(index: &Index) {
	let tokenizer = TextAnalyzer::builder(SimpleTokenizer::default())
		.filter(LowerCaser)
		.filter(StopWordFilter::remove(STOP_WORDS.iter().map(|s| s.to_string())))
		.build();
	index.tokenizers().register(TOKENIZER, tokenizer);
}
