//! Lance-backed response cache keyed by `key`, with per-entry expiry.
//!
//! Expired rows are ignored on read and overwritten on the next write for the
//! same key.
use arrow_array::{BinaryArray, RecordBatch, StringArray, TimestampMillisecondArray};
use async_trait::async_trait;
use chrono::Utc;
use lancedb::{Connection, Table};
use std::sync::Arc;
use std::time::Duration;

use docsearch_core::filter::{like_escape, sql_like, sql_string};
use docsearch_core::traits::CacheStore;
use docsearch_core::{Error, Result};

use crate::schema::{build_cache_schema, CACHE_TABLE};
use crate::table::{column, ensure_table, merge_upsert, open_db, scan};

fn cache_err(e: Error) -> Error {
	match e {
		Error::Cache(_) => e,
		other => Error::Cache(other.to_string()),
	}
}

pub struct LanceCache {
	db: Connection,
}

impl LanceCache {
	pub async fn open(uri: &str) -> Result<Self> {
		let db = open_db(uri).await.map_err(cache_err)?;
		Self::with_connection(db).await
	}

	pub async fn with_connection(db: Connection) -> Result<Self> {
		ensure_table(&db, CACHE_TABLE, build_cache_schema()).await.map_err(cache_err)?;
		Ok(Self { db })
	}

	async fn table(&self) -> Result<Table> {
		self.db.open_table(CACHE_TABLE).execute().await.map_err(|e| Error::Cache(e.to_string()))
	}
}

#[async_trait]
impl CacheStore for LanceCache {
	async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
		let table = self.table().await?;
		let predicate = format!("key = {}", sql_string(key));
		let now = Utc::now().timestamp_millis();
		for batch in scan(&table, Some(&predicate), Some(1)).await.map_err(cache_err)? {
			let payloads = column::<BinaryArray>(&batch, "payload").map_err(cache_err)?;
			let expires = column::<TimestampMillisecondArray>(&batch, "expires_at").map_err(cache_err)?;
			if batch.num_rows() > 0 && expires.value(0) > now {
				return Ok(Some(payloads.value(0).to_vec()));
			}
		}
		Ok(None)
	}

	async fn set_with_ttl(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
		let expires_at = Utc::now().timestamp_millis() + ttl.as_millis() as i64;
		let batch = RecordBatch::try_new(
			build_cache_schema(),
			vec![
				Arc::new(StringArray::from(vec![key.to_string()])),
				Arc::new(BinaryArray::from_vec(vec![value.as_slice()])),
				Arc::new(TimestampMillisecondArray::from(vec![expires_at])),
			],
		)
		.map_err(|e| Error::Cache(e.to_string()))?;
		let table = self.table().await?;
		merge_upsert(&table, &["key"], batch).await.map_err(cache_err)
	}

	async fn invalidate_prefix(&self, prefix: &str) -> Result<()> {
		let table = self.table().await?;
		table
			.delete(&sql_like("key", &format!("{}%", like_escape(prefix))))
			.await
			.map_err(|e| Error::Cache(e.to_string()))?;
		Ok(())
	}
}
