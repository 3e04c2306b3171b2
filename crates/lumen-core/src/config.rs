//! Configuration loader, typed settings and path helpers.
//!
//! Uses Figment to merge `config.toml` + `config.<env>.toml` + `APP_*` env vars
//! (nested keys split on `__`, e.g. `APP_OPENAI__API_KEY`). Provides helpers to
//! expand `~` and `${VAR}` and to resolve relative paths against the directory
//! holding the config file.

use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

pub struct Config {
    figment: Figment,
    base_dir: PathBuf,
}

impl Config {
    /// Load `config.toml` (and its per-environment overlay) from the working directory.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.toml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let env_name = env::var("RUST_ENV").unwrap_or_else(|_| "dev".to_string());
        let base_dir = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .map_or_else(|| PathBuf::from("."), Path::to_path_buf);

        let mut figment = Figment::new().merge(Toml::file(path));
        let overlay = match env_name.as_str() {
            "dev" | "development" => Some("config.dev.toml"),
            "prod" | "production" => Some("config.prod.toml"),
            "test" | "testing" => Some("config.test.toml"),
            _ => None,
        };
        if let Some(name) = overlay {
            figment = figment.merge(Toml::file(base_dir.join(name)));
        }
        figment = figment.merge(Env::prefixed("APP_").split("__"));

        Ok(Self { figment, base_dir })
    }

    /// Typed settings with paths expanded and resolved, and the
    /// `OPENAI_API_KEY` fallback applied.
    pub fn settings(&self) -> Result<Settings> {
        let mut settings: Settings = self
            .figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))?;
        settings.index.search_dirs = settings
            .index
            .search_dirs
            .iter()
            .map(|p| resolve_with_base(&self.base_dir, p.to_string_lossy()))
            .collect();
        settings.index.persist_dir = settings
            .index
            .persist_dir
            .as_ref()
            .map(|p| resolve_with_base(&self.base_dir, p.to_string_lossy()));
        if settings.openai.api_key.is_none() {
            settings.openai.api_key = env::var("OPENAI_API_KEY").ok();
        }
        Ok(settings)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub index: IndexSettings,
    pub openai: OpenAiSettings,
    pub query: QuerySettings,
}

impl Settings {
    /// Folders, a persistence directory and a credential are all present.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.index.search_dirs.is_empty() && self.index.persist_dir.is_some() && self.credential().is_some()
    }

    /// Non-blank API key, if any.
    #[must_use]
    pub fn credential(&self) -> Option<&str> {
        self.openai.api_key.as_deref().map(str::trim).filter(|k| !k.is_empty())
    }

    /// True when `other` would make an index built under `self` stale.
    #[must_use]
    pub fn index_identity_changed(&self, other: &Settings) -> bool {
        self.index.search_dirs != other.index.search_dirs
            || self.index.persist_dir != other.index.persist_dir
            || self.openai.api_key != other.openai.api_key
            || self.openai.embedding_model != other.openai.embedding_model
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexSettings {
    pub search_dirs: Vec<PathBuf>,
    pub persist_dir: Option<PathBuf>,
    pub chunk_max_tokens: usize,
    pub chunk_overlap_percent: f32,
    pub sheet_rows_per_chunk: usize,
}

impl Default for IndexSettings {
    fn default() -> Self {
        Self {
            search_dirs: Vec::new(),
            persist_dir: None,
            chunk_max_tokens: 500,
            chunk_overlap_percent: 0.2,
            sheet_rows_per_chunk: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenAiSettings {
    pub api_key: Option<String>,
    pub base_url: String,
    pub embedding_model: String,
    pub chat_model: String,
    pub temperature: f32,
    pub request_timeout_secs: u64,
}

impl Default for OpenAiSettings {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://api.openai.com/v1".to_string(),
            embedding_model: "text-embedding-ada-002".to_string(),
            chat_model: "gpt-3.5-turbo".to_string(),
            temperature: 0.0,
            request_timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuerySettings {
    pub top_k: usize,
    pub render: RenderMode,
}

impl Default for QuerySettings {
    fn default() -> Self { Self { top_k: 4, render: RenderMode::Plain } }
}

/// How answers are rendered for the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RenderMode {
    #[default]
    Plain,
    Html,
}

/// Expand a user-provided path string:
/// - Expands leading '~' to the user's home directory
/// - Expands ${VAR} and $VAR environment variables
/// - Returns a PathBuf without attempting to canonicalize
pub fn expand_path<S: AsRef<str>>(input: S) -> PathBuf {
    let s = input.as_ref();
    // Expand env vars first
    let expanded_env = shellexpand::env(s).unwrap_or(std::borrow::Cow::Borrowed(s));
    // Expand ~ at start
    let expanded = shellexpand::tilde(&expanded_env);
    PathBuf::from(expanded.as_ref())
}

/// Resolve a possibly relative path against a given base directory after expansion.
/// If `p` is absolute, it's returned as-is; otherwise `base.join(p)` is returned.
pub fn resolve_with_base<S: AsRef<str>>(base: &Path, p: S) -> PathBuf {
    let p = expand_path(p);
    if p.is_absolute() { p } else { base.join(p) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn complete() -> Settings {
        let mut s = Settings::default();
        s.index.search_dirs = vec![PathBuf::from("/docs")];
        s.index.persist_dir = Some(PathBuf::from("/tmp/lumen"));
        s.openai.api_key = Some("sk-test".to_string());
        s
    }

    #[test]
    fn completeness_requires_folders_dir_and_key() {
        assert!(complete().is_complete());

        let mut blank_key = complete();
        blank_key.openai.api_key = Some("   ".to_string());
        assert!(!blank_key.is_complete());

        let mut no_dirs = complete();
        no_dirs.index.search_dirs.clear();
        assert!(!no_dirs.is_complete());
    }

    #[test]
    fn query_tuning_does_not_change_index_identity() {
        let a = complete();
        let mut b = complete();
        b.query.top_k = 8;
        b.openai.chat_model = "gpt-4o-mini".to_string();
        assert!(!a.index_identity_changed(&b));

        b.index.search_dirs.push(PathBuf::from("/more"));
        assert!(a.index_identity_changed(&b));
    }

    #[test]
    fn relative_paths_resolve_against_config_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let cfg = tmp.path().join("config.toml");
        fs::write(
            &cfg,
            "[index]\nsearch_dirs = [\"docs\"]\npersist_dir = \"state/index\"\n\n[openai]\napi_key = \"sk-file\"\n\n[query]\ntop_k = 6\nrender = \"html\"\n",
        )
        .unwrap();

        let settings = Config::load_from(&cfg).unwrap().settings().unwrap();
        assert_eq!(settings.index.search_dirs, vec![tmp.path().join("docs")]);
        assert_eq!(settings.index.persist_dir, Some(tmp.path().join("state/index")));
        assert_eq!(settings.credential(), Some("sk-file"));
        assert_eq!(settings.query.top_k, 6);
        assert_eq!(settings.query.render, RenderMode::Html);
        assert_eq!(settings.index.chunk_max_tokens, 500);
    }

    #[test]
    fn absolute_paths_are_kept() {
        let base = Path::new("/base");
        assert_eq!(resolve_with_base(base, "/abs/dir"), PathBuf::from("/abs/dir"));
        assert_eq!(resolve_with_base(base, "rel"), PathBuf::from("/base/rel"));
    }
}
