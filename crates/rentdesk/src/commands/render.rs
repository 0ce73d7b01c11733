//! `render`: run rows through a grid definition and print the result.

use std::io::Read;
use std::path::Path;

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info};

use rentdesk_config::Config;
use rentdesk_grid::render::plain_cells;
use rentdesk_grid::row::is_truthy;
use rentdesk_grid::{
    Action, Column, DeviceClass, Grid, GridConfig, GridEnv, MemoryDocument, PaginationConfig,
    ResponsiveConfig, Row, RowIdentity, SearchConfig, SelectionConfig, SortConfig, SortDirection,
    value_at,
};

use crate::cli::{GlobalOpts, RenderArgs, RenderFormat};
use crate::error::CliError;
use crate::output;

const MOUNT_ID: &str = "grid";

// ── Grid definition file ─────────────────────────────────────────────

/// TOML grid definition: columns plus any grid settings.
#[derive(Debug, Deserialize)]
struct GridFile {
    columns: Vec<Column>,
    #[serde(default)]
    actions: Vec<ActionSpec>,
    #[serde(default)]
    search: Option<SearchConfig>,
    #[serde(default)]
    sort: Option<SortConfig>,
    #[serde(default)]
    selection: SelectionConfig,
    /// Overrides `[grid]` page sizes from the config file.
    #[serde(default)]
    pagination: Option<PaginationConfig>,
    #[serde(default)]
    responsive: ResponsiveConfig,
    #[serde(default)]
    group_by: Option<String>,
    #[serde(default)]
    empty_message: Option<String>,
    #[serde(default)]
    loading_message: Option<String>,
    /// Field holding each row's identity, instead of `id` / `_id`.
    #[serde(default)]
    id_field: Option<String>,
}

/// Row action declared in TOML. Clicks have no handler outside a browser;
/// the CLI only renders the buttons.
#[derive(Debug, Deserialize)]
struct ActionSpec {
    name: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    icon: Option<String>,
    #[serde(default)]
    variant: Option<String>,
    #[serde(default)]
    admin_only: bool,
    /// Field path that must be truthy for the button to show.
    #[serde(default)]
    visible_if: Option<String>,
}

impl ActionSpec {
    fn into_action(self) -> Action {
        let name = self.name.clone();
        let mut action = Action::new(self.name, move |_, _| {
            debug!(action = %name, "action clicked");
        });
        if let Some(label) = self.label {
            action = action.label(label);
        }
        if let Some(icon) = self.icon {
            action = action.icon(icon);
        }
        if let Some(variant) = self.variant {
            action = action.variant(variant);
        }
        if self.admin_only {
            action = action.admin_only();
        }
        if let Some(field) = self.visible_if {
            action = action.condition(move |row| value_at(row, &field).is_some_and(is_truthy));
        }
        action
    }
}

// ── Handler ──────────────────────────────────────────────────────────

pub async fn handle(args: RenderArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let definition: GridFile = toml::from_str(&std::fs::read_to_string(&args.columns)?)?;
    let rows = load_rows(&args.rows, config).await?;
    let locale = config.locale()?;

    let grid_config = build_config(definition, rows, &args, config)?;
    grid_config.validate()?;

    let device = if args.mobile {
        DeviceClass::Mobile
    } else {
        DeviceClass::Desktop
    };
    let admin = args.admin;
    let env = GridEnv::new(device)
        .admin(move || admin)
        .locale(locale.clone());

    let mut document = MemoryDocument::new();
    let surface = document.add_surface(MOUNT_ID);
    let mut grid = Grid::mount(&document, MOUNT_ID, grid_config, env);

    if let Some(ref term) = args.search {
        grid.set_search(term.clone());
    }
    if args.page != 1 && !grid.go_to_page(args.page) {
        return Err(CliError::Validation {
            field: "page".into(),
            reason: format!("{} is outside 1..={}", args.page, grid.total_pages()),
        });
    }

    info!(
        rows = grid.state().data().len(),
        matching = grid.state().filtered_len(),
        page = grid.state().current_page(),
        pages = grid.total_pages(),
        "grid rendered"
    );

    let rendered = match args.output {
        RenderFormat::Html => surface.contents(),
        RenderFormat::Table => {
            let columns = &grid.config().columns;
            let header = columns.iter().map(|c| c.label.clone()).collect();
            let cells = grid
                .page_rows()
                .into_iter()
                .map(|row| plain_cells(row, columns, &locale))
                .collect();
            output::render_grid_table(header, cells)
        }
        RenderFormat::Json => output::render_json(&grid.page_rows(), false)?,
        RenderFormat::Csv => {
            let mut buf = Vec::new();
            let written = grid.export_csv(&mut buf)?;
            debug!(rows = written, "csv exported");
            String::from_utf8_lossy(&buf).trim_end().to_owned()
        }
    };

    output::emit(&rendered, args.out.as_deref(), global.quiet)
}

fn build_config(
    definition: GridFile,
    rows: Vec<Row>,
    args: &RenderArgs,
    config: &Config,
) -> Result<GridConfig, CliError> {
    let available = || {
        definition
            .columns
            .iter()
            .map(|c| c.key.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };

    let mut sort = definition.sort.clone().unwrap_or_default();
    if let Some(ref key) = args.sort {
        let column = definition
            .columns
            .iter()
            .find(|c| &c.key == key)
            .ok_or_else(|| CliError::UnknownColumn {
                column: key.clone(),
                available: available(),
            })?;
        if !column.sortable {
            return Err(CliError::Validation {
                field: "sort".into(),
                reason: format!("column '{key}' is not sortable"),
            });
        }
        sort.enabled = true;
        sort.column = Some(key.clone());
        sort.direction = if args.desc {
            SortDirection::Desc
        } else {
            SortDirection::Asc
        };
    }

    let mut pagination = definition
        .pagination
        .clone()
        .unwrap_or_else(|| config.pagination());
    if let Some(size) = args.page_size {
        pagination.enabled = true;
        pagination.page_size = size;
        if !pagination.page_size_options.contains(&size) {
            pagination.page_size_options.push(size);
            pagination.page_size_options.sort_unstable();
        }
    }
    if args.no_paginate {
        pagination.enabled = false;
    }

    let mut search = definition.search.clone().unwrap_or_default();
    if args.search.is_some() {
        search.enabled = true;
    }

    let GridFile {
        columns,
        actions,
        selection,
        responsive,
        group_by,
        empty_message,
        loading_message,
        id_field,
        ..
    } = definition;

    let mut grid_config = GridConfig::new(columns).data(rows);
    for spec in actions {
        grid_config = grid_config.action(spec.into_action());
    }
    grid_config.search = search;
    grid_config.sort = sort;
    grid_config.pagination = pagination;
    grid_config.selection = selection;
    grid_config.responsive = responsive;
    grid_config.group_by = args.group_by.clone().or(group_by);
    grid_config.empty_message = empty_message;
    grid_config.loading_message = loading_message;
    if let Some(field) = id_field {
        grid_config.identity = RowIdentity::Field(field);
    }
    Ok(grid_config)
}

// ── Row sources ──────────────────────────────────────────────────────

async fn load_rows(source: &str, config: &Config) -> Result<Vec<Row>, CliError> {
    let value: Value = if source.starts_with("http://") || source.starts_with("https://") {
        fetch_rows(source, config).await?
    } else if source == "-" {
        let mut raw = String::new();
        std::io::stdin().read_to_string(&mut raw)?;
        serde_json::from_str(&raw)?
    } else {
        read_rows_file(Path::new(source))?
    };

    match value {
        Value::Array(rows) => Ok(rows),
        other => Err(CliError::Validation {
            field: "rows".into(),
            reason: format!("expected a JSON array, got {}", json_kind(&other)),
        }),
    }
}

fn read_rows_file(path: &Path) -> Result<Value, CliError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

/// GET a JSON document, sending the API token when one is configured.
async fn fetch_rows(url: &str, config: &Config) -> Result<Value, CliError> {
    use secrecy::ExposeSecret;

    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| CliError::from_http(url, &e))?;
    let mut request = client.get(url);
    if let Ok(token) = rentdesk_config::resolve_token(&config.api) {
        request = request.bearer_auth(token.expose_secret());
    }
    let response = request
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| CliError::from_http(url, &e))?;
    response
        .json()
        .await
        .map_err(|e| CliError::from_http(url, &e))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
