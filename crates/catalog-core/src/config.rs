use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{CatalogError, Result};
use crate::types::{DuplicatePolicy, SimilarityMetric};

/// Top-level configuration for the catalog search service.
///
/// Loaded from `~/.catalog/config.toml` by default. Every section falls back
/// to its defaults when omitted, so an empty file is a valid config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CatalogConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl CatalogConfig {
    /// Load configuration from a TOML file and validate it.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: CatalogConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the configuration as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Check cross-field constraints that serde cannot express.
    pub fn validate(&self) -> Result<()> {
        if self.index.dimension == 0 {
            return Err(CatalogError::Config(
                "index.dimension must be greater than zero".to_string(),
            ));
        }
        if self.search.default_k == 0 {
            return Err(CatalogError::Config(
                "search.default_k must be at least 1".to_string(),
            ));
        }
        if self.search.default_k > self.search.max_k {
            return Err(CatalogError::Config(format!(
                "search.default_k ({}) exceeds search.max_k ({})",
                self.search.default_k, self.search.max_k
            )));
        }
        if self.ingest.id_field == self.ingest.text_field {
            return Err(CatalogError::Config(
                "ingest.id_field and ingest.text_field must differ".to_string(),
            ));
        }
        Ok(())
    }

    /// Data directory with a leading `~` expanded to the home directory.
    pub fn data_dir(&self) -> PathBuf {
        expand_home(&self.general.data_dir)
    }
}

/// Expand a leading `~/` to the current user's home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Directory holding the SQLite record store.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.catalog/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Vector index configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IndexConfig {
    /// Vector dimension D. Must match the embedder.
    pub dimension: usize,
    /// Similarity metric used for ranking.
    pub metric: SimilarityMetric,
    /// Write records through to the SQLite store and warm the index from it.
    pub persist: bool,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: 384,
            metric: SimilarityMetric::Cosine,
            persist: true,
        }
    }
}

/// Embedding backend selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// "hashing" (built in, no model files) or "onnx".
    pub backend: String,
    /// Directory holding `model.onnx` and `tokenizer.json` for the onnx backend.
    pub model_dir: Option<String>,
    /// Model name, informational.
    pub model_name: String,
    /// Upper bound on a single query embedding call, in milliseconds. 0 disables.
    pub timeout_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            backend: "hashing".to_string(),
            model_dir: None,
            model_name: "all-MiniLM-L6-v2".to_string(),
            timeout_ms: 10_000,
        }
    }
}

impl EmbeddingConfig {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

/// Catalog ingestion settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct IngestConfig {
    /// JSON file of products loaded on startup.
    pub catalog_path: String,
    /// Field holding the record id.
    pub id_field: String,
    /// Field holding the text to embed.
    pub text_field: String,
    /// Behaviour when a record id is already indexed.
    pub duplicate_policy: DuplicatePolicy,
    /// Ingest `catalog_path` during startup.
    pub load_on_startup: bool,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            catalog_path: "data/products.json".to_string(),
            id_field: "productId".to_string(),
            text_field: "description".to_string(),
            duplicate_policy: DuplicatePolicy::Skip,
            load_on_startup: true,
        }
    }
}

/// Query defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Results returned when the caller gives no k.
    pub default_k: usize,
    /// Upper bound on k.
    pub max_k: usize,
    /// Payload fields returned with each hit. Empty returns all fields.
    pub fields: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_k: 5,
            max_k: 50,
            fields: vec!["productName".to_string(), "description".to_string()],
        }
    }
}

impl SearchConfig {
    /// Resolve a requested k against the configured default and bounds.
    pub fn clamp_k(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_k)
            .clamp(1, self.max_k.max(1))
    }
}

/// HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3030,
        }
    }
}
