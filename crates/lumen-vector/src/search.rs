use std::sync::Arc;

use arrow_array::{Float32Array, RecordBatch, StringArray};
use async_trait::async_trait;
use futures::TryStreamExt;
use lancedb::query::{ExecutableQuery, QueryBase};
use lancedb::Table;

use lumen_core::traits::{Embedder, IndexHandle};
use lumen_core::types::RetrievedChunk;
use lumen_core::{Error, Result};

/// Read-only handle over a persisted chunk table.
pub struct LanceIndex {
	table: Table,
	embedder: Arc<dyn Embedder>,
	len: usize,
}

impl LanceIndex {
	pub(crate) fn new(table: Table, embedder: Arc<dyn Embedder>, len: usize) -> Self {
		Self { table, embedder, len }
	}
}

#[async_trait]
impl IndexHandle for LanceIndex {
	fn len(&self) -> usize {
		self.len
	}

	async fn similar(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
		let query_embedding = self.embedder.embed_one(query).await?;
		let mut results = self
			.table
			.vector_search(query_embedding)
			.map_err(|e| Error::Retrieval(e.to_string()))?
			.limit(k)
			.execute()
			.await
			.map_err(|e| Error::Retrieval(e.to_string()))?;

		let mut hits = Vec::new();
		while let Some(batch) = results.try_next().await.map_err(|e| Error::Retrieval(e.to_string()))? {
			hits.extend(batch_hits(&batch)?);
		}
		Ok(hits)
	}
}

fn batch_hits(batch: &RecordBatch) -> Result<Vec<RetrievedChunk>> {
	let paths = string_column(batch, "source_path")?;
	let texts = string_column(batch, "text")?;
	let distances = batch.column_by_name("_distance").and_then(|c| c.as_any().downcast_ref::<Float32Array>());

	Ok((0..batch.num_rows())
		.map(|i| RetrievedChunk {
			source_path: paths.value(i).to_string(),
			text: texts.value(i).to_string(),
			score: distances.map_or(0.0, |d| 1.0 - d.value(i)),
		})
		.collect())
}

fn string_column<'a>(batch: &'a RecordBatch, name: &str) -> Result<&'a StringArray> {
	batch
		.column_by_name(name)
		.and_then(|c| c.as_any().downcast_ref::<StringArray>())
		.ok_or_else(|| Error::Retrieval(format!("column '{name}' missing from results")))
}
