//! File classification and per-format text extraction.
//!
//! [`Extractor::extract`] maps one file to its chunks. Unsupported files
//! fail with [`Error::UnsupportedFormat`] and broken files with
//! [`Error::Extraction`]; both are per-file and callers treat them as
//! zero chunks. Lock and temp artifacts of office suites yield zero chunks
//! regardless of extension.

pub mod office;
pub mod pdf;
pub mod tabular;
pub mod text;

use std::path::Path;

use tracing::{debug, warn};

pub use text::ChunkingConfig;

use crate::config::IndexSettings;
use crate::error::{Error, Result};
use crate::types::DocumentChunk;

const TEXT_EXTENSIONS: &[&str] = &[
    "txt", "md", "markdown", "rst", "log", "json", "yaml", "yml", "toml", "xml", "html", "htm", "ini", "cfg",
];

const CODE_EXTENSIONS: &[&str] = &[
    "rs", "py", "js", "jsx", "ts", "tsx", "java", "kt", "scala", "c", "h", "cc", "cpp", "hpp", "cs", "go", "rb",
    "php", "swift", "sh", "bash", "sql", "r", "lua", "pl",
];

const SPREADSHEET_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];

const WORD_EXTENSIONS: &[&str] = &["docx", "docm", "dotx"];

const TRANSIENT_SUFFIXES: &[&str] = &[".tmp", ".wbk"];

/// Supported document families, decided by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileKind {
    Text,
    Code,
    Csv,
    Tsv,
    Spreadsheet,
    Pdf,
    Word,
    Presentation,
}

impl FileKind {
    /// Case-insensitive extension lookup. `None` for unsupported files.
    pub fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let ext = ext.as_str();
        let kind = match ext {
            "csv" => Self::Csv,
            "tsv" => Self::Tsv,
            "pdf" => Self::Pdf,
            "pptx" => Self::Presentation,
            _ if TEXT_EXTENSIONS.contains(&ext) => Self::Text,
            _ if CODE_EXTENSIONS.contains(&ext) => Self::Code,
            _ if SPREADSHEET_EXTENSIONS.contains(&ext) => Self::Spreadsheet,
            _ if WORD_EXTENSIONS.contains(&ext) => Self::Word,
            _ => return None,
        };
        Some(kind)
    }

    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Text => "text",
            Self::Code => "code",
            Self::Csv | Self::Tsv => "table",
            Self::Spreadsheet => "spreadsheet",
            Self::Pdf => "pdf",
            Self::Word => "document",
            Self::Presentation => "presentation",
        }
    }
}

/// Office lock files (`~$x.docx`, `.~$x.docx`) and transient saves.
#[must_use]
pub fn is_transient(path: &Path) -> bool {
    let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
        return false;
    };
    let lower = name.to_ascii_lowercase();
    name.starts_with("~$") || name.starts_with(".~$") || TRANSIENT_SUFFIXES.iter().any(|s| lower.ends_with(s))
}

#[derive(Debug, Clone)]
pub struct ExtractOptions {
    pub chunking: ChunkingConfig,
    pub sheet_rows_per_chunk: usize,
}

impl Default for ExtractOptions {
    fn default() -> Self {
        Self { chunking: ChunkingConfig::default(), sheet_rows_per_chunk: 10 }
    }
}

impl From<&IndexSettings> for ExtractOptions {
    fn from(settings: &IndexSettings) -> Self {
        Self {
            chunking: ChunkingConfig {
                max_tokens: settings.chunk_max_tokens,
                overlap_percent: settings.chunk_overlap_percent,
            },
            sheet_rows_per_chunk: settings.sheet_rows_per_chunk,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Extractor {
    options: ExtractOptions,
}

impl Extractor {
    #[must_use]
    pub fn new(options: ExtractOptions) -> Self {
        Self { options }
    }

    pub fn extract(&self, path: &Path) -> Result<Vec<DocumentChunk>> {
        if !path.exists() {
            return Err(Error::PathNotFound(path.to_path_buf()));
        }
        if is_transient(path) {
            debug!("Ignoring transient file {}", path.display());
            return Ok(Vec::new());
        }
        let kind = FileKind::of(path).ok_or_else(|| Error::UnsupportedFormat(path.to_path_buf()))?;

        let texts = match kind {
            FileKind::Text => text::split_text(&text::read_lossy(path)?, &self.options.chunking),
            FileKind::Code => text::split_text(&text::read_lossy(path)?, &self.options.chunking),
            FileKind::Csv => tabular::delimited_records(path, b',')?,
            FileKind::Tsv => tabular::delimited_records(path, b'\t')?,
            FileKind::Spreadsheet => tabular::workbook_rows(path, self.options.sheet_rows_per_chunk)?,
            FileKind::Pdf => pdf::page_texts(path)
                .iter()
                .flat_map(|page| text::split_text(page, &self.options.chunking))
                .collect(),
            FileKind::Word => text::split_text(&office::word_text(path)?, &self.options.chunking),
            FileKind::Presentation => office::slide_texts(path)?,
        };

        let source = path
            .canonicalize()
            .unwrap_or_else(|_| path.to_path_buf())
            .to_string_lossy()
            .into_owned();
        Ok(text::cap_chars(texts, self.options.chunking.max_chars())
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .map(|t| DocumentChunk::new(source.clone(), t))
            .collect())
    }

    /// Like [`Extractor::extract`], but per-file failures become zero chunks.
    /// Only a missing path is still an error.
    pub fn extract_or_skip(&self, path: &Path) -> Result<Vec<DocumentChunk>> {
        match self.extract(path) {
            Err(Error::UnsupportedFormat(_)) => {
                debug!("Unsupported file {}", path.display());
                Ok(Vec::new())
            }
            Err(e) if !e.is_fatal_for_ingestion() => {
                warn!("{e}");
                Ok(Vec::new())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn classification_ignores_case() {
        assert_eq!(FileKind::of(Path::new("/d/Report.PDF")), Some(FileKind::Pdf));
        assert_eq!(FileKind::of(Path::new("a.Xlsx")), Some(FileKind::Spreadsheet));
        assert_eq!(FileKind::of(Path::new("deck.pptx")), Some(FileKind::Presentation));
        assert_eq!(FileKind::of(Path::new("main.rs")), Some(FileKind::Code));
        assert_eq!(FileKind::of(Path::new("photo.jpeg")), None);
        assert_eq!(FileKind::of(Path::new("Makefile")), None);
    }

    #[test]
    fn transient_names() {
        for name in ["~$PRD.docx", ".~$PRD.docx", "draft.tmp", "backup.WBK"] {
            assert!(is_transient(&PathBuf::from(name)), "{name}");
        }
        assert!(!is_transient(Path::new("notes.txt")));
        assert!(!is_transient(Path::new("$budget.xlsx")));
    }
}
