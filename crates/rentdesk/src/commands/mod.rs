//! Command handlers.

pub mod cache;
pub mod config_cmd;
pub mod fetch;
pub mod render;

use std::sync::Arc;

use rentdesk_cache::{FileStore, SystemClock, TtlCache};
use rentdesk_config::Config;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

pub async fn dispatch(cmd: Command, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Render(args) => render::handle(args, config, global).await,
        Command::Fetch(args) => fetch::handle(args, config, global).await,
        Command::Cache(args) => cache::handle(args, config, global),
        Command::Config(_) | Command::Completions(_) => unreachable!("handled in main"),
    }
}

// ── Shared helpers ───────────────────────────────────────────────────

/// The persistent cache backed by the configured storage dir.
pub(crate) fn open_cache(config: &Config) -> Result<TtlCache, CliError> {
    let cache_config = config.cache_config()?;
    let dir = config.storage_dir();
    let store = FileStore::new(&dir)?;
    tracing::debug!(dir = %dir.display(), persistence = cache_config.persistence, "opening cache");
    Ok(TtlCache::with_parts(
        cache_config,
        Arc::new(SystemClock),
        Arc::new(store),
    ))
}

/// Reject slot names the cache was not configured with.
pub(crate) fn require_slot(cache: &TtlCache, slot: &str) -> Result<(), CliError> {
    if cache.contains(slot) {
        Ok(())
    } else {
        Err(CliError::UnknownSlot {
            slot: slot.to_owned(),
            available: cache.keys().join(", "),
        })
    }
}
