//! Clap derive structures for the `rentdesk` CLI.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// rentdesk -- dashboard grids and cached reference data from the terminal
#[derive(Debug, Parser)]
#[command(
    name = "rentdesk",
    version,
    about = "Render dashboard grids and query cached rentdesk API data",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Config file (defaults to the platform config dir)
    #[arg(long, env = "RENTDESK_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output Enums ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum RenderFormat {
    /// Grid markup as the dashboard would mount it
    Html,
    /// Current page as a terminal table
    Table,
    /// Current page rows as JSON
    Json,
    /// Every matching row as CSV
    Csv,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Render rows through a grid definition
    #[command(alias = "r")]
    Render(RenderArgs),

    /// Fetch a reference-data slot through the cache
    #[command(alias = "f")]
    Fetch(FetchArgs),

    /// Inspect or clear the persisted cache
    Cache(CacheArgs),

    /// Manage CLI configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Render ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RenderArgs {
    /// JSON array of rows: a file path, `-` for stdin, or an http(s) URL
    #[arg(long)]
    pub rows: String,

    /// Grid definition (TOML with `[[columns]]` and optional settings)
    #[arg(long)]
    pub columns: PathBuf,

    /// Search term applied before rendering
    #[arg(long)]
    pub search: Option<String>,

    /// Column key to sort by
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Page to show (1-based)
    #[arg(long, default_value = "1")]
    pub page: usize,

    /// Rows (or groups) per page; overrides the config
    #[arg(long)]
    pub page_size: Option<usize>,

    /// Show every row on one page
    #[arg(long, conflicts_with_all = ["page", "page_size"])]
    pub no_paginate: bool,

    /// Group rows by this field path
    #[arg(long)]
    pub group_by: Option<String>,

    /// Render the mobile layout
    #[arg(long)]
    pub mobile: bool,

    /// Render as an administrator (shows admin-only actions)
    #[arg(long)]
    pub admin: bool,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value = "html")]
    pub output: RenderFormat,

    /// Write output to a file instead of stdout
    #[arg(long)]
    pub out: Option<PathBuf>,
}

// ── Fetch ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct FetchArgs {
    /// Cache slot to serve (e.g. "imoveis")
    pub slot: String,

    /// API path relative to `api.base_url` (defaults to the slot name)
    #[arg(long)]
    pub path: Option<String>,

    /// Bypass a fresh cached value and refetch
    #[arg(long, short = 'f')]
    pub force: bool,

    /// Output format
    #[arg(long, short = 'o', value_enum, default_value = "json")]
    pub output: OutputFormat,
}

// ── Cache ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CacheArgs {
    #[command(subcommand)]
    pub command: CacheCommand,
}

#[derive(Debug, Subcommand)]
pub enum CacheCommand {
    /// Show per-slot freshness and usage
    Stats {
        /// Only this slot
        slot: Option<String>,

        /// Output format
        #[arg(long, short = 'o', value_enum, default_value = "table")]
        output: OutputFormat,
    },

    /// Drop cached data (all slots unless one is named)
    Clear {
        /// Only this slot
        slot: Option<String>,
    },
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display current resolved configuration
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
