use async_trait::async_trait;
use parking_lot::Mutex;
use std::path::Path;
use tantivy::directory::MmapDirectory;
use tantivy::{Index, IndexReader, IndexWriter, ReloadPolicy, TantivyDocument, Term};

use docsearch_core::traits::{TextIndexer, TextQuery};
use docsearch_core::types::{document_id_for_url, Document, TextHit};
use docsearch_core::{Error, Result};

use crate::schema::{build_schema, register_tokenizer, Fields};
use crate::search::run_search;

const WRITER_HEAP_BYTES: usize = 50_000_000;

pub(crate) fn tantivy_err(e: tantivy::TantivyError) -> Error {
	Error::Retrieval(format!("tantivy: {}", e))
}

pub struct TantivyIndexer {
	pub(crate) index: Index,
	pub(crate) reader: IndexReader,
	writer: Mutex<IndexWriter>,
	pub(crate) fields: Fields,
}

impl TantivyIndexer {
	/// Opens the index in `index_dir`, creating it when absent.
	pub fn open_or_create(index_dir: &Path) -> Result<Self> {
		std::fs::create_dir_all(index_dir).map_err(|e| Error::Indexing(format!("create {}: {}", index_dir.display(), e)))?;
		let dir = MmapDirectory::open(index_dir).map_err(|e| Error::Indexing(format!("open {}: {}", index_dir.display(), e)))?;
		let index = Index::open_or_create(dir, build_schema()).map_err(tantivy_err)?;
		Self::from_index(index)
	}

	pub fn create_in_ram() -> Result<Self> {
		Self::from_index(Index::create_in_ram(build_schema()))
	}

	fn from_index(index: Index) -> Result<Self> {
		register_tokenizer(&index);
		let fields = Fields::resolve(&index.schema())?;
		let reader = index.reader_builder().reload_policy(ReloadPolicy::Manual).try_into().map_err(tantivy_err)?;
		let writer = index.writer(WRITER_HEAP_BYTES).map_err(tantivy_err)?;
		Ok(Self { index, reader, writer: Mutex::new(writer), fields })
	}

	pub fn num_docs(&self) -> u64 {
		self.reader.searcher().num_docs()
	}

	fn to_tantivy_doc(&self, doc: &Document) -> TantivyDocument {
		let f = &self.fields;
		let mut d = TantivyDocument::default();
		d.add_text(f.id, document_id_for_url(&doc.url));
		d.add_text(f.url, &doc.url);
		d.add_text(f.title, &doc.title);
		d.add_text(f.content, &doc.content);
		for tech in &doc.metadata.technology {
			d.add_text(f.technology, tech.to_lowercase());
		}
		d.add_u64(f.difficulty, u64::from(doc.difficulty_level));
		d.add_text(f.content_type, doc.content_type.as_str());
		d.add_text(f.source, &doc.source);
		d
	}
}

#[async_trait]
impl TextIndexer for TantivyIndexer {
	async fn index(&self, doc: &Document) -> Result<()> {
		let indexing = |e: tantivy::TantivyError| Error::Indexing(format!("tantivy: {}", e));
		{
			let mut writer = self.writer.lock();
			writer.delete_term(Term::from_field_text(self.fields.url, &doc.url));
			writer.add_document(self.to_tantivy_doc(doc)).map_err(indexing)?;
			writer.commit().map_err(indexing)?;
		}
		self.reader.reload().map_err(indexing)?;
		tracing::debug!(url = %doc.url, "text index updated");
		Ok(())
	}

	async fn search(&self, query: &TextQuery) -> Result<Vec<TextHit>> {
		let (index, reader, fields, query) = (self.index.clone(), self.reader.clone(), self.fields, query.clone());
		tokio::task::spawn_blocking(move || run_search(&index, &reader, &fields, &query))
			.await
			.map_err(|e| Error::Retrieval(format!("keyword search task: {}", e)))?
	}
}
