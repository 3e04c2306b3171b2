//! Sidecar describing how a persisted index was built. Written after the
//! table, so its presence marks a complete build.

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use lumen_core::{Error, Result};

pub const MANIFEST_FILE: &str = "lumen-manifest.json";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    pub embedder_id: String,
    pub dim: usize,
    pub chunk_count: usize,
    pub built_at: DateTime<Utc>,
}

impl Manifest {
    pub fn read(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILE);
        let raw = fs::read_to_string(&path)
            .map_err(|e| Error::Persistence(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&raw).map_err(|e| Error::Persistence(format!("corrupt {}: {e}", path.display())))
    }

    pub fn write(&self, dir: &Path) -> Result<()> {
        let path = dir.join(MANIFEST_FILE);
        let raw = serde_json::to_string_pretty(self).map_err(|e| Error::Persistence(e.to_string()))?;
        fs::write(&path, raw).map_err(|e| Error::Persistence(format!("cannot write {}: {e}", path.display())))
    }
}
