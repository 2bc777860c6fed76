//! CLI argument definitions for the catalog binary.
//!
//! Uses `clap` with derive macros for ergonomic argument parsing.
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Semantic product search over a JSON catalog.
#[derive(Parser, Debug)]
#[command(name = "catalog", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// API server port.
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Data directory for the SQLite record store.
    #[arg(short = 'd', long = "data-dir")]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// JSON product catalog to ingest on startup.
    #[arg(long = "catalog")]
    pub catalog: Option<PathBuf>,

    /// Do not ingest the catalog file on startup.
    #[arg(long = "skip-ingest")]
    pub skip_ingest: bool,

    /// Answer a single query, print the results as JSON, and exit.
    #[arg(short = 'q', long = "query")]
    pub query: Option<String>,

    /// Number of results for --query.
    #[arg(short = 'k')]
    pub k: Option<usize>,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > CATALOG_CONFIG env var > ~/.catalog/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("CATALOG_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the API server port.
    ///
    /// Priority: --port flag > CATALOG_PORT env var > config file value > 3030.
    pub fn resolve_port(&self, config_port: u16) -> u16 {
        if let Some(p) = self.port {
            return p;
        }
        if let Ok(val) = std::env::var("CATALOG_PORT") {
            if let Ok(p) = val.parse::<u16>() {
                return p;
            }
        }
        if config_port != 0 {
            return config_port;
        }
        3030
    }

    /// Data directory override from --data-dir, if given.
    pub fn resolve_data_dir(&self) -> Option<String> {
        self.data_dir
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    /// Catalog file override from --catalog, if given.
    pub fn resolve_catalog_path(&self) -> Option<String> {
        self.catalog
            .as_ref()
            .map(|p| p.to_string_lossy().to_string())
    }

    pub fn resolve_log_level(&self) -> Option<String> {
        self.log_level.clone()
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".catalog").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".catalog").join("config.toml");
    }
    PathBuf::from("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_query_mode() {
        let args = CliArgs::parse_from(["catalog", "--query", "wireless mouse", "-k", "3", "--skip-ingest"]);
        assert_eq!(args.query.as_deref(), Some("wireless mouse"));
        assert_eq!(args.k, Some(3));
        assert!(args.skip_ingest);
    }

    #[test]
    fn test_flags_take_priority() {
        let args = CliArgs::parse_from([
            "catalog",
            "--config",
            "/etc/catalog.toml",
            "--port",
            "8080",
            "--data-dir",
            "/var/lib/catalog",
            "--catalog",
            "items.json",
        ]);
        assert_eq!(args.resolve_config_path(), PathBuf::from("/etc/catalog.toml"));
        assert_eq!(args.resolve_port(3030), 8080);
        assert_eq!(args.resolve_data_dir().as_deref(), Some("/var/lib/catalog"));
        assert_eq!(args.resolve_catalog_path().as_deref(), Some("items.json"));
    }

    #[test]
    fn test_no_overrides() {
        let args = CliArgs::parse_from(["catalog"]);
        assert!(args.resolve_data_dir().is_none());
        assert!(args.resolve_catalog_path().is_none());
        assert!(args.resolve_log_level().is_none());
        assert!(!args.skip_ingest);
    }
}
