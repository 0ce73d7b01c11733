// ── Usage statistics ──
//
// Observability only; nothing in the cache reads these back.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SlotStats {
    pub key: String,
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    /// Percentage in `0.0..=100.0`.
    pub hit_rate: f64,
    pub has_data: bool,
    /// Milliseconds since the slot was last populated, `0` when empty.
    pub age_ms: i64,
    pub is_valid: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsTotals {
    pub hits: u64,
    pub misses: u64,
    pub total: u64,
    pub hit_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub slots: Vec<SlotStats>,
    pub totals: StatsTotals,
}

/// `hits / total` as a percentage, `0.0` with no traffic.
#[allow(clippy::cast_precision_loss, clippy::as_conversions)]
pub fn hit_rate(hits: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        hits as f64 / total as f64 * 100.0
    }
}

/// Two-decimal percentage label, e.g. `"66.67%"`.
pub fn format_rate(rate: f64) -> String {
    format!("{rate:.2}%")
}

impl CacheStats {
    pub(crate) fn from_slots(slots: Vec<SlotStats>) -> Self {
        let hits = slots.iter().map(|s| s.hits).sum();
        let misses = slots.iter().map(|s| s.misses).sum();
        let total = hits + misses;
        Self {
            slots,
            totals: StatsTotals {
                hits,
                misses,
                total,
                hit_rate: hit_rate(hits, total),
            },
        }
    }

    pub fn slot(&self, key: &str) -> Option<&SlotStats> {
        self.slots.iter().find(|s| s.key == key)
    }
}
