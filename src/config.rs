use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct SightingsConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub embedding: EmbeddingConfig,
    pub search: SearchConfig,
    pub ids: IdConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub transport: String,
    pub log_level: String,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct StorageConfig {
    /// `"sqlite"` or `"postgres"`.
    pub backend: String,
    pub db_path: String,
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    /// When false, search falls back to substring matching.
    pub enabled: bool,
    pub provider: String,
    /// Base URL of an OpenAI-compatible API, e.g. `http://localhost:1234/v1`.
    pub endpoint: String,
    pub model: String,
    pub dimensions: usize,
    pub api_key: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct SearchConfig {
    /// Cosine distance cutoff for semantic search (0 = identical, 2 = opposite).
    pub default_max_distance: f64,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct IdConfig {
    /// Occasionally skip ahead when assigning ids.
    pub chaos: bool,
    pub one_in: u32,
    pub max_skip: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            transport: "stdio".into(),
            log_level: "info".into(),
            host: "127.0.0.1".into(),
            port: 8000,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        let db_path = default_sightings_dir()
            .join("sightings.db")
            .to_string_lossy()
            .into_owned();
        Self {
            backend: "sqlite".into(),
            db_path,
            database_url: "postgres://localhost/sightings".into(),
            max_connections: 5,
            acquire_timeout_secs: 10,
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            provider: "openai".into(),
            endpoint: "http://localhost:1234/v1".into(),
            model: "text-embedding-nomic-embed-text-v1.5".into(),
            dimensions: 768,
            api_key: None,
            timeout_secs: 30,
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            default_max_distance: 0.5,
        }
    }
}

impl Default for IdConfig {
    fn default() -> Self {
        Self {
            chaos: false,
            one_in: 23,
            max_skip: 23,
        }
    }
}

/// Returns `~/.sightings/`, or `./.sightings/` when no home directory is known.
pub fn default_sightings_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".sightings")
}

/// Returns the default config file path: `~/.sightings/config.toml`
pub fn default_config_path() -> PathBuf {
    default_sightings_dir().join("config.toml")
}

impl SightingsConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            SightingsConfig::default()
        };

        config.apply_env_overrides()?;
        config.check()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Ok(val) = std::env::var("SIGHTINGS_BACKEND") {
            self.storage.backend = val;
        }
        if let Ok(val) = std::env::var("SIGHTINGS_DB") {
            self.storage.db_path = val;
        }
        if let Ok(val) = std::env::var("SIGHTINGS_DATABASE_URL") {
            self.storage.database_url = val;
        }
        if let Ok(val) = std::env::var("SIGHTINGS_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("SIGHTINGS_EMBEDDING_URL") {
            self.embedding.endpoint = val;
            self.embedding.enabled = true;
        }
        if let Ok(val) = std::env::var("SIGHTINGS_EMBEDDING_MODEL") {
            self.embedding.model = val;
        }
        if let Ok(val) = std::env::var("SIGHTINGS_WEB_PORT") {
            self.server.port = val
                .parse()
                .with_context(|| format!("SIGHTINGS_WEB_PORT is not a port number: {val}"))?;
        }
        Ok(())
    }

    fn check(&self) -> Result<()> {
        match self.storage.backend.as_str() {
            "sqlite" | "postgres" => {}
            other => bail!("unknown storage backend: {other}. Supported: sqlite, postgres"),
        }
        if self.embedding.enabled && self.embedding.dimensions == 0 {
            bail!("embedding.dimensions must be greater than zero");
        }
        if !(0.0..=2.0).contains(&self.search.default_max_distance) {
            bail!("search.default_max_distance must be within 0.0..=2.0");
        }
        if self.ids.chaos && self.ids.one_in == 0 {
            bail!("ids.one_in must be at least 1 when chaos ids are enabled");
        }
        Ok(())
    }

    /// Resolve the SQLite database path, expanding `~` if needed.
    pub fn resolved_db_path(&self) -> PathBuf {
        expand_tilde(&self.storage.db_path)
    }
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        let config = SightingsConfig::default();
        assert_eq!(config.server.transport, "stdio");
        assert_eq!(config.server.log_level, "info");
        assert_eq!(config.storage.backend, "sqlite");
        assert!(!config.embedding.enabled);
        assert_eq!(config.search.default_max_distance, 0.5);
        assert!(!config.ids.chaos);
        assert!(config.storage.db_path.ends_with("sightings.db"));
        config.check().unwrap();
    }

    #[test]
    fn parse_toml_config() {
        let toml_str = r#"
[server]
log_level = "debug"

[storage]
backend = "postgres"
database_url = "postgres://u:p@db/sightings"

[embedding]
enabled = true
dimensions = 384
"#;
        let config: SightingsConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.server.log_level, "debug");
        assert_eq!(config.storage.backend, "postgres");
        assert_eq!(config.storage.database_url, "postgres://u:p@db/sightings");
        assert!(config.embedding.enabled);
        assert_eq!(config.embedding.dimensions, 384);
        // defaults still apply for unset fields
        assert_eq!(config.embedding.timeout_secs, 30);
        assert_eq!(config.ids.one_in, 23);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let mut config = SightingsConfig::default();
        config.storage.backend = "mongo".into();
        let err = config.check().unwrap_err();
        assert!(err.to_string().contains("unknown storage backend"));
    }

    #[test]
    fn env_overrides_apply() {
        let mut config = SightingsConfig::default();
        std::env::set_var("SIGHTINGS_DB", "/tmp/override.db");
        std::env::set_var("SIGHTINGS_LOG_LEVEL", "trace");
        std::env::set_var("SIGHTINGS_EMBEDDING_URL", "http://embed:1234/v1");
        std::env::set_var("SIGHTINGS_WEB_PORT", "8023");

        config.apply_env_overrides().unwrap();

        assert_eq!(config.storage.db_path, "/tmp/override.db");
        assert_eq!(config.server.log_level, "trace");
        assert_eq!(config.embedding.endpoint, "http://embed:1234/v1");
        assert!(config.embedding.enabled);
        assert_eq!(config.server.port, 8023);

        // Clean up
        std::env::remove_var("SIGHTINGS_DB");
        std::env::remove_var("SIGHTINGS_LOG_LEVEL");
        std::env::remove_var("SIGHTINGS_EMBEDDING_URL");
        std::env::remove_var("SIGHTINGS_WEB_PORT");
    }

    #[test]
    fn tilde_expands_to_home() {
        let expanded = expand_tilde("~/x/sightings.db");
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expanded, home.join("x/sightings.db"));
        }
        assert_eq!(expand_tilde("/abs/path.db"), PathBuf::from("/abs/path.db"));
    }
}
