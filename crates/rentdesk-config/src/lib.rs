//! Shared configuration for rentdesk tools.
//!
//! One TOML file layered under `RENTDESK_*` environment overrides, plus
//! translation into `rentdesk_cache::CacheConfig` and the grid's locale and
//! pagination settings. API tokens resolve from the environment first and
//! the file second.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use rentdesk_cache::{CacheConfig, DEFAULT_STORAGE_PREFIX, SlotConfig};
use rentdesk_grid::{Locale, PaginationConfig};

pub const ENV_PREFIX: &str = "RENTDESK_";
pub const DEFAULT_TOKEN_ENV: &str = "RENTDESK_API_TOKEN";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no API token configured (set ${env} or api.token)")]
    NoCredentials { env: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub cache: CacheSection,

    #[serde(default)]
    pub grid: GridSection,

    #[serde(default)]
    pub api: ApiSection,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct CacheSection {
    #[serde(default = "default_true")]
    pub persistence: bool,

    /// Expiry sweep period in seconds. `0` disables the sweeper.
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,

    /// Where persisted slots live. Defaults to the platform cache dir.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_dir: Option<PathBuf>,

    #[serde(default = "default_storage_prefix")]
    pub storage_prefix: String,

    #[serde(default = "default_slots")]
    pub slots: Vec<SlotEntry>,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            persistence: true,
            sweep_interval_secs: default_sweep_interval(),
            storage_dir: None,
            storage_prefix: default_storage_prefix(),
            slots: default_slots(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct SlotEntry {
    pub key: String,
    pub ttl_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct GridSection {
    /// BCP 47 tag of a built-in locale (`pt-BR`, `en-US`).
    #[serde(default = "default_locale")]
    pub locale: String,

    #[serde(default = "default_page_size")]
    pub page_size: usize,

    #[serde(default = "default_page_size_options")]
    pub page_size_options: Vec<usize>,
}

impl Default for GridSection {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            page_size: default_page_size(),
            page_size_options: default_page_size_options(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct ApiSection {
    /// Base URL of the dashboard API (e.g., "https://rentdesk.example.com/api").
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the bearer token.
    #[serde(default = "default_token_env")]
    pub token_env: String,

    /// Bearer token in plaintext. Prefer the env var.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: None,
            token_env: default_token_env(),
            token: None,
            timeout: default_timeout(),
        }
    }
}

fn default_true() -> bool {
    true
}
fn default_sweep_interval() -> u64 {
    60
}
fn default_storage_prefix() -> String {
    DEFAULT_STORAGE_PREFIX.into()
}
fn default_locale() -> String {
    "pt-BR".into()
}
fn default_page_size() -> usize {
    PaginationConfig::default().page_size
}
fn default_page_size_options() -> Vec<usize> {
    PaginationConfig::default().page_size_options
}
fn default_token_env() -> String {
    DEFAULT_TOKEN_ENV.into()
}
fn default_timeout() -> u64 {
    30
}

fn default_slots() -> Vec<SlotEntry> {
    CacheConfig::dashboard()
        .slots
        .into_iter()
        .map(|slot| SlotEntry {
            key: slot.key,
            ttl_secs: slot.ttl.as_secs(),
        })
        .collect()
}

// ── Translation ─────────────────────────────────────────────────────

impl Config {
    /// Cache settings as the cache crate expects them.
    pub fn cache_config(&self) -> Result<CacheConfig, ConfigError> {
        let mut seen = std::collections::HashSet::new();
        let mut slots = Vec::with_capacity(self.cache.slots.len());
        for entry in &self.cache.slots {
            if entry.key.is_empty() {
                return Err(ConfigError::Validation {
                    field: "cache.slots".into(),
                    reason: "slot key must not be empty".into(),
                });
            }
            if !seen.insert(entry.key.as_str()) {
                return Err(ConfigError::Validation {
                    field: "cache.slots".into(),
                    reason: format!("duplicate slot '{}'", entry.key),
                });
            }
            slots.push(SlotConfig::new(
                entry.key.clone(),
                Duration::from_secs(entry.ttl_secs),
            ));
        }

        let mut config = CacheConfig::new(slots)
            .with_persistence(self.cache.persistence)
            .with_sweep_interval(Duration::from_secs(self.cache.sweep_interval_secs));
        config.storage_prefix.clone_from(&self.cache.storage_prefix);
        Ok(config)
    }

    pub fn locale(&self) -> Result<Locale, ConfigError> {
        Locale::from_tag(&self.grid.locale).ok_or_else(|| ConfigError::Validation {
            field: "grid.locale".into(),
            reason: format!("unsupported locale '{}', expected pt-BR or en-US", self.grid.locale),
        })
    }

    /// Pagination enabled with the configured sizes.
    pub fn pagination(&self) -> PaginationConfig {
        PaginationConfig {
            enabled: true,
            page_size: self.grid.page_size,
            page_size_options: self.grid.page_size_options.clone(),
        }
    }

    /// Configured storage dir, or the platform cache dir.
    pub fn storage_dir(&self) -> PathBuf {
        self.cache.storage_dir.clone().unwrap_or_else(cache_dir)
    }

    pub fn base_url(&self) -> Result<url::Url, ConfigError> {
        let raw = self
            .api
            .base_url
            .as_deref()
            .ok_or_else(|| ConfigError::Validation {
                field: "api.base_url".into(),
                reason: "not set".into(),
            })?;
        raw.parse().map_err(|_| ConfigError::Validation {
            field: "api.base_url".into(),
            reason: format!("invalid URL: {raw}"),
        })
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout)
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "rentdesk", "rentdesk")
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".config").join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Default directory for persisted cache slots.
pub fn cache_dir() -> PathBuf {
    project_dirs().map_or_else(
        || dirs_fallback(".cache"),
        |dirs| dirs.cache_dir().to_path_buf(),
    )
}

fn dirs_fallback(base: &str) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(base);
    p.push("rentdesk");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file path. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    debug!(path = %path.display(), "loading config");
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file is missing or invalid.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<PathBuf, ConfigError> {
    let path = config_path();
    save_config_to(cfg, &path)?;
    Ok(path)
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the API bearer token: `api.token_env` first, then `api.token`.
pub fn resolve_token(api: &ApiSection) -> Result<SecretString, ConfigError> {
    if let Ok(val) = std::env::var(&api.token_env) {
        if !val.is_empty() {
            return Ok(SecretString::from(val));
        }
    }

    if let Some(ref token) = api.token {
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoCredentials {
        env: api.token_env.clone(),
    })
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;
    use figment::Jail;
    use pretty_assertions::assert_eq;
    use secrecy::ExposeSecret;

    #[test]
    fn defaults_mirror_dashboard_slots() {
        let cfg = Config::default();
        let cache = cfg.cache_config().unwrap();
        assert_eq!(cache, CacheConfig::dashboard().with_persistence(true));
        assert_eq!(cfg.locale().unwrap(), Locale::pt_br());
    }

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, Config::default());
    }

    #[test]
    fn file_and_env_layering() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "rentdesk.toml",
                r#"
                [grid]
                locale = "en-US"
                page_size = 10

                [cache]
                persistence = false

                [[cache.slots]]
                key = "owners"
                ttl_secs = 30
                "#,
            )?;
            jail.set_env("RENTDESK_GRID__PAGE_SIZE", "50");
            jail.set_env("RENTDESK_API__BASE_URL", "https://api.example.com");

            let cfg = load_config_from(Path::new("rentdesk.toml")).map_err(|e| e.to_string())?;
            assert_eq!(cfg.grid.locale, "en-US");
            assert_eq!(cfg.grid.page_size, 50);
            assert_eq!(cfg.api.base_url.as_deref(), Some("https://api.example.com"));

            let cache = cfg.cache_config().map_err(|e| e.to_string())?;
            assert!(!cache.persistence);
            assert_eq!(cache.slots, vec![SlotConfig::new("owners", Duration::from_secs(30))]);
            Ok(())
        });
    }

    #[test]
    fn duplicate_slots_rejected() {
        let mut cfg = Config::default();
        cfg.cache.slots.push(SlotEntry {
            key: "imoveis".into(),
            ttl_secs: 1,
        });
        let err = cfg.cache_config().unwrap_err();
        assert!(matches!(err, ConfigError::Validation { ref field, .. } if field == "cache.slots"));
    }

    #[test]
    fn unknown_locale_rejected() {
        let mut cfg = Config::default();
        cfg.grid.locale = "fr-FR".into();
        assert!(cfg.locale().is_err());
    }

    #[test]
    fn base_url_validation() {
        let mut cfg = Config::default();
        assert!(cfg.base_url().is_err());
        cfg.api.base_url = Some("not a url".into());
        assert!(cfg.base_url().is_err());
        cfg.api.base_url = Some("https://api.example.com/v1/".into());
        assert_eq!(cfg.base_url().unwrap().path(), "/v1/");
    }

    #[test]
    fn save_round_trips_through_loader() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut cfg = Config::default();
        cfg.grid.page_size = 50;
        cfg.api.base_url = Some("https://api.example.com".into());
        save_config_to(&cfg, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.grid.page_size, 50);
        assert_eq!(loaded.api.base_url, cfg.api.base_url);
    }

    #[test]
    fn token_resolution_order() {
        Jail::expect_with(|jail| {
            let mut api = ApiSection {
                token_env: "RENTDESK_TEST_TOKEN".into(),
                token: Some("from-file".into()),
                ..ApiSection::default()
            };
            assert_eq!(resolve_token(&api).unwrap().expose_secret(), "from-file");

            jail.set_env("RENTDESK_TEST_TOKEN", "from-env");
            assert_eq!(resolve_token(&api).unwrap().expose_secret(), "from-env");

            jail.set_env("RENTDESK_TEST_TOKEN", "");
            api.token = None;
            assert!(matches!(
                resolve_token(&api),
                Err(ConfigError::NoCredentials { .. })
            ));
            Ok(())
        });
    }
}
