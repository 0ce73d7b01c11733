//! `cache`: inspect or clear persisted slots.

use serde::Serialize;
use tabled::Tabled;
use tracing::info;

use rentdesk_cache::{SlotStats, format_rate};
use rentdesk_config::Config;

use crate::cli::{CacheArgs, CacheCommand, GlobalOpts};
use crate::commands::{open_cache, require_slot};
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct SlotView {
    #[serde(flatten)]
    stats: SlotStats,
    ttl_secs: u64,
}

#[derive(Tabled)]
struct SlotRow {
    #[tabled(rename = "Slot")]
    key: String,
    #[tabled(rename = "TTL")]
    ttl: String,
    #[tabled(rename = "Cached")]
    has_data: bool,
    #[tabled(rename = "Fresh")]
    is_valid: bool,
    #[tabled(rename = "Age")]
    age: String,
    #[tabled(rename = "Hit rate")]
    hit_rate: String,
}

impl From<&SlotView> for SlotRow {
    fn from(view: &SlotView) -> Self {
        let s = &view.stats;
        Self {
            key: s.key.clone(),
            ttl: humantime::format_duration(std::time::Duration::from_secs(view.ttl_secs))
                .to_string(),
            has_data: s.has_data,
            is_valid: s.is_valid,
            age: if s.has_data { format_age(s.age_ms) } else { "-".into() },
            hit_rate: format_rate(s.hit_rate),
        }
    }
}

/// Age rounded to whole seconds.
fn format_age(age_ms: i64) -> String {
    let secs = u64::try_from(age_ms.max(0) / 1000).unwrap_or(0);
    humantime::format_duration(std::time::Duration::from_secs(secs)).to_string()
}

pub fn handle(args: CacheArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let cache = open_cache(config)?;

    match args.command {
        CacheCommand::Stats { slot, output: format } => {
            if let Some(ref slot) = slot {
                require_slot(&cache, slot)?;
            }
            let stats = cache.stats(slot.as_deref());
            let views: Vec<SlotView> = stats
                .slots
                .into_iter()
                .map(|stats| {
                    let ttl_secs = cache
                        .config()
                        .slots
                        .iter()
                        .find(|s| s.key == stats.key)
                        .map_or(0, |s| s.ttl.as_secs());
                    SlotView { stats, ttl_secs }
                })
                .collect();
            let rendered = output::render_list(format, &views, |v| SlotRow::from(v))?;
            output::print_output(&rendered, global.quiet);
        }

        CacheCommand::Clear { slot: Some(slot) } => {
            require_slot(&cache, &slot)?;
            cache.invalidate(&slot);
            info!(slot = %slot, "slot cleared");
            if !global.quiet {
                eprintln!("Cleared cache slot '{slot}'");
            }
        }

        CacheCommand::Clear { slot: None } => {
            cache.invalidate_all();
            info!("all slots cleared");
            if !global.quiet {
                eprintln!("Cleared {} cache slots", cache.keys().len());
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn age_formats_whole_seconds() {
        assert_eq!(format_age(90_500), "1m 30s");
        assert_eq!(format_age(-5), "0s");
    }
}
