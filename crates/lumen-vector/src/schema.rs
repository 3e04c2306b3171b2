use std::sync::Arc;

use arrow_array::types::Float32Type;
use arrow_array::{FixedSizeListArray, RecordBatch, StringArray, UInt64Array};
use arrow_schema::{DataType, Field, Schema};

use lumen_core::types::DocumentChunk;

pub fn build_chunk_schema(dim: i32) -> Arc<Schema> {
	Arc::new(Schema::new(vec![
		Field::new("id", DataType::UInt64, false),
		Field::new("source_path", DataType::Utf8, false),
		Field::new("text", DataType::Utf8, false),
		Field::new("vector", DataType::FixedSizeList(Arc::new(Field::new("item", DataType::Float32, true)), dim), true),
	]))
}

/// Rows for `chunks` paired with their embeddings; ids continue from `first_id`.
pub fn chunks_to_record_batch(
	chunks: &[DocumentChunk],
	vectors: Vec<Vec<f32>>,
	first_id: u64,
	dim: i32,
) -> Result<RecordBatch, arrow_schema::ArrowError> {
	let ids: Vec<u64> = (first_id..).take(chunks.len()).collect();
	let paths: Vec<&str> = chunks.iter().map(|c| c.source_path.as_str()).collect();
	let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
	let vectors = vectors.into_iter().map(|v| Some(v.into_iter().map(Some).collect::<Vec<_>>()));

	RecordBatch::try_new(
		build_chunk_schema(dim),
		vec![
			Arc::new(UInt64Array::from(ids)),
			Arc::new(StringArray::from(paths)),
			Arc::new(StringArray::from(texts)),
			Arc::new(FixedSizeListArray::from_iter_primitive::<Float32Type, _, _>(vectors, dim)),
		],
	)
}
