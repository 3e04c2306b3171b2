use std::path::Path;

use arrow_array::RecordBatchIterator;
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use lancedb::Connection;
use tracing::info;

use lumen_core::traits::Embedder;
use lumen_core::types::{Corpus, DocumentChunk};
use lumen_core::{Error, Result};

use crate::manifest::Manifest;
use crate::schema::{build_chunk_schema, chunks_to_record_batch};
use crate::table::{open_db, CHUNK_TABLE};

pub const EMBED_BATCH_SIZE: usize = 64;

/// Embed every chunk of `corpus` and write the chunk table plus manifest
/// into `dir`, which must already be empty.
pub async fn write_index(corpus: &Corpus, embedder: &dyn Embedder, dir: &Path) -> Result<Manifest> {
    let chunks: Vec<DocumentChunk> = corpus.iter().cloned().collect();
    let dim = i32::try_from(embedder.dim()).map_err(|_| Error::Embedding(format!("dimension {} too large", embedder.dim())))?;
    let db = open_db(dir).await?;

    info!("Indexing {} chunks into {} with {}", chunks.len(), dir.display(), embedder.id());
    let pb = ProgressBar::new(chunks.len() as u64);
    pb.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} chunks ({percent}%) {msg}",
        )
        .map(|s| s.progress_chars("#>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let mut created = false;
    for (batch_index, batch) in chunks.chunks(EMBED_BATCH_SIZE).enumerate() {
        let texts: Vec<String> = batch.iter().map(|c| c.text.clone()).collect();
        let vectors = embedder.embed_batch(&texts).await?;
        if vectors.len() != batch.len() || vectors.iter().any(|v| v.len() != embedder.dim()) {
            return Err(Error::Embedding(format!(
                "embedder {} returned vectors of the wrong shape",
                embedder.id()
            )));
        }
        let first_id = (batch_index * EMBED_BATCH_SIZE) as u64;
        insert_batch(&db, batch, vectors, first_id, dim, created).await?;
        created = true;
        pb.inc(batch.len() as u64);
    }
    pb.finish_with_message("done");

    let manifest = Manifest {
        embedder_id: embedder.id().to_string(),
        dim: embedder.dim(),
        chunk_count: chunks.len(),
        built_at: Utc::now(),
    };
    manifest.write(dir)?;
    info!("Indexed {} chunks from {} files", manifest.chunk_count, corpus.file_count());
    Ok(manifest)
}

async fn insert_batch(
    db: &Connection,
    chunks: &[DocumentChunk],
    vectors: Vec<Vec<f32>>,
    first_id: u64,
    dim: i32,
    table_exists: bool,
) -> Result<()> {
    let record_batch =
        chunks_to_record_batch(chunks, vectors, first_id, dim).map_err(|e| Error::Persistence(e.to_string()))?;
    let reader = Box::new(RecordBatchIterator::new(vec![Ok(record_batch)].into_iter(), build_chunk_schema(dim)));
    if table_exists {
        let table = db
            .open_table(CHUNK_TABLE)
            .execute()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
        table.add(reader).execute().await.map_err(|e| Error::Persistence(e.to_string()))?;
    } else {
        db.create_table(CHUNK_TABLE, reader)
            .execute()
            .await
            .map_err(|e| Error::Persistence(e.to_string()))?;
    }
    Ok(())
}

