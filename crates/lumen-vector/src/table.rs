//! LanceDB connection helpers.

use std::path::Path;

use lancedb::{connect, Connection, Table};
use lumen_core::{Error, Result};

pub const CHUNK_TABLE: &str = "chunks";

pub async fn open_db(dir: &Path) -> Result<Connection> {
    connect(dir.to_string_lossy().as_ref())
        .execute()
        .await
        .map_err(|e| Error::Persistence(format!("cannot open {}: {e}", dir.display())))
}

pub async fn open_chunk_table(conn: &Connection) -> Result<Table> {
    let names = conn
        .table_names()
        .execute()
        .await
        .map_err(|e| Error::Persistence(e.to_string()))?;
    if !names.iter().any(|n| n == CHUNK_TABLE) {
        return Err(Error::Persistence(format!("table '{CHUNK_TABLE}' is missing")));
    }
    conn.open_table(CHUNK_TABLE)
        .execute()
        .await
        .map_err(|e| Error::Persistence(e.to_string()))
}
