// ── Cache configuration ──

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// A named slot with a fixed TTL. Slots are declared once, at construction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotConfig {
    pub key: String,
    #[serde(with = "millis")]
    pub ttl: Duration,
}

impl SlotConfig {
    pub fn new(key: impl Into<String>, ttl: Duration) -> Self {
        Self {
            key: key.into(),
            ttl,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    pub slots: Vec<SlotConfig>,
    /// Persist slots to the `KvStore` and reload them at construction.
    #[serde(default)]
    pub persistence: bool,
    /// Period of the expiry sweep. Zero disables `spawn_sweeper`.
    #[serde(default = "default_sweep_interval", with = "millis")]
    pub sweep_interval: Duration,
    #[serde(default = "default_prefix")]
    pub storage_prefix: String,
}

pub const DEFAULT_STORAGE_PREFIX: &str = "cache_";

fn default_sweep_interval() -> Duration {
    Duration::from_secs(60)
}

fn default_prefix() -> String {
    DEFAULT_STORAGE_PREFIX.into()
}

impl CacheConfig {
    pub fn new(slots: Vec<SlotConfig>) -> Self {
        Self {
            slots,
            persistence: false,
            sweep_interval: default_sweep_interval(),
            storage_prefix: default_prefix(),
        }
    }

    /// The dashboard's standard slots.
    pub fn dashboard() -> Self {
        let minutes = |m: u64| Duration::from_secs(m * 60);
        Self::new(vec![
            SlotConfig::new("proprietarios", minutes(5)),
            SlotConfig::new("imoveis", minutes(5)),
            SlotConfig::new("usuarios", minutes(10)),
            SlotConfig::new("participacoes_datas", minutes(2)),
            SlotConfig::new("anos_disponiveis", minutes(5)),
        ])
    }

    pub fn slot(mut self, key: impl Into<String>, ttl: Duration) -> Self {
        self.slots.push(SlotConfig::new(key, ttl));
        self
    }

    pub fn with_persistence(mut self, enabled: bool) -> Self {
        self.persistence = enabled;
        self
    }

    pub fn with_sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }

    pub fn storage_key(&self, key: &str) -> String {
        format!("{}{key}", self.storage_prefix)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::dashboard()
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn dashboard_slots_match_standard_ttls() {
        let cfg = CacheConfig::dashboard();
        let ttl = |k: &str| cfg.slots.iter().find(|s| s.key == k).map(|s| s.ttl);
        assert_eq!(ttl("proprietarios"), Some(Duration::from_millis(300_000)));
        assert_eq!(ttl("usuarios"), Some(Duration::from_millis(600_000)));
        assert_eq!(ttl("participacoes_datas"), Some(Duration::from_millis(120_000)));
        assert_eq!(cfg.storage_key("imoveis"), "cache_imoveis");
        assert!(!cfg.persistence);
    }

    #[test]
    fn ttl_serializes_as_millis() {
        let json = serde_json::to_value(SlotConfig::new("a", Duration::from_secs(2))).unwrap();
        assert_eq!(json, serde_json::json!({"key": "a", "ttl": 2000}));
    }
}
