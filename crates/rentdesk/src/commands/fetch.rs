//! `fetch`: serve one reference-data slot through the persistent cache.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde_json::Value;
use tabled::Tabled;
use tracing::{debug, info};

use rentdesk_config::Config;

use crate::cli::{FetchArgs, GlobalOpts, OutputFormat};
use crate::commands::{open_cache, require_slot};
use crate::error::{CliError, HttpFailure};
use crate::output;

pub async fn handle(args: FetchArgs, config: &Config, global: &GlobalOpts) -> Result<(), CliError> {
    let cache = open_cache(config)?;
    require_slot(&cache, &args.slot)?;

    let path = args.path.as_deref().unwrap_or(&args.slot);
    let url = endpoint(config, path)?;
    let was_fresh = cache.is_valid(&args.slot) && !args.force;

    // Credentials are only needed on a miss.
    let token = if was_fresh {
        None
    } else {
        Some(rentdesk_config::resolve_token(&config.api)?)
    };
    let client = reqwest::Client::builder()
        .timeout(config.timeout())
        .build()
        .map_err(|e| CliError::from_http(url.as_str(), &e))?;

    let data = cache
        .get(
            &args.slot,
            move || {
                let token = token.map(|t| t.expose_secret().to_owned());
                async move { get_json(&client, &url, token.as_deref()).await }
            },
            args.force,
        )
        .await?;

    info!(
        slot = %args.slot,
        cached = was_fresh,
        "slot served"
    );

    let rendered = render_value(args.output, &data)?;
    output::print_output(&rendered, global.quiet);
    Ok(())
}

fn endpoint(config: &Config, path: &str) -> Result<url::Url, CliError> {
    let mut base = config.base_url()?;
    // `join` drops the last segment of a base without a trailing slash.
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path.trim_start_matches('/'))
        .map_err(|e| CliError::Validation {
            field: "path".into(),
            reason: e.to_string(),
        })
}

async fn get_json(
    client: &reqwest::Client,
    url: &url::Url,
    token: Option<&str>,
) -> Result<Value, HttpFailure> {
    debug!(url = %url, "fetching");
    let mut request = client.get(url.clone());
    if let Some(token) = token {
        request = request.bearer_auth(token);
    }
    let response = request
        .send()
        .await
        .and_then(reqwest::Response::error_for_status)
        .map_err(|e| HttpFailure::new(url.as_str(), &e))?;
    response
        .json()
        .await
        .map_err(|e| HttpFailure::new(url.as_str(), &e))
}

// ── Rendering ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct FieldRow {
    #[tabled(rename = "Field")]
    field: String,
    #[tabled(rename = "Value")]
    value: String,
}

/// Arrays of objects become one table row per element; anything else is
/// printed as a field/value listing or raw JSON.
fn render_value(format: OutputFormat, data: &Arc<Value>) -> Result<String, CliError> {
    match (format, data.as_ref()) {
        (OutputFormat::Json, value) => output::render_json(value, false),
        (OutputFormat::JsonCompact, value) => output::render_json(value, true),
        (OutputFormat::Table, Value::Array(items)) => Ok(array_table(items)),
        (OutputFormat::Table, Value::Object(map)) => {
            let rows: Vec<FieldRow> = map
                .iter()
                .map(|(k, v)| FieldRow {
                    field: k.clone(),
                    value: scalar(v),
                })
                .collect();
            Ok(output::render_table(&rows))
        }
        (OutputFormat::Table, value) => Ok(scalar(value)),
    }
}

fn array_table(items: &[Value]) -> String {
    let mut header: Vec<String> = Vec::new();
    for item in items {
        if let Value::Object(map) = item {
            for key in map.keys() {
                if !header.contains(key) {
                    header.push(key.clone());
                }
            }
        }
    }
    if header.is_empty() {
        let cells = items.iter().map(|v| vec![scalar(v)]).collect();
        return output::render_grid_table(vec!["Value".into()], cells);
    }

    let cells = items
        .iter()
        .map(|item| {
            header
                .iter()
                .map(|key| item.get(key).map(scalar).unwrap_or_default())
                .collect()
        })
        .collect();
    output::render_grid_table(header, cells)
}

fn scalar(value: &Value) -> String {
    rentdesk_grid::row::display_string(value)
}
