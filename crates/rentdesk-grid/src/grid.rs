// ── Grid ──
//
// Owns its configuration and render state exclusively. Every mutation
// recomputes the derived state from scratch and re-renders synchronously
// into the mounted surface.

use std::fmt;
use std::io::Write;
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, trace, warn};

use crate::action::{EventOutcome, GridEvent};
use crate::config::{GridConfig, SortDirection};
use crate::error::ExportError;
use crate::export::write_csv;
use crate::render::{RenderContext, render};
use crate::row::{Row, RowId};
use crate::state::{GridState, Page, build_page, filter_indices, sort_indices};
use crate::surface::{Document, GridEnv, Surface};

/// A data grid mounted into a host surface.
pub struct Grid {
    mount_id: String,
    surface: Option<Arc<dyn Surface>>,
    config: GridConfig,
    env: GridEnv,
    state: GridState,
    html: String,
}

impl Grid {
    /// Ingest the initial data, derive state, render, and start accepting
    /// events.
    ///
    /// A missing mount point does not fail: the grid logs a warning and
    /// becomes a detached instance that ignores every call.
    pub fn mount(
        document: &dyn Document,
        mount_id: impl Into<String>,
        config: GridConfig,
        env: GridEnv,
    ) -> Self {
        let mount_id = mount_id.into();
        let surface = document.surface(&mount_id);
        if surface.is_none() {
            warn!(mount_id = %mount_id, "grid mount point not found, grid is detached");
        }

        let mut config = config.normalized();
        let initial = std::mem::take(&mut config.data);
        let state = GridState::new(&config);

        let mut grid = Self {
            mount_id,
            surface,
            config,
            env,
            state,
            html: String::new(),
        };
        if grid.is_mounted() {
            grid.state.data = initial;
            grid.derive();
            grid.render();
            debug!(
                mount_id = %grid.mount_id,
                rows = grid.state.data.len(),
                "grid mounted"
            );
        }
        grid
    }

    pub fn is_mounted(&self) -> bool {
        self.surface.is_some()
    }

    pub fn mount_id(&self) -> &str {
        &self.mount_id
    }

    pub fn config(&self) -> &GridConfig {
        &self.config
    }

    pub fn state(&self) -> &GridState {
        &self.state
    }

    /// Markup from the most recent render.
    pub fn html(&self) -> &str {
        &self.html
    }

    // ── Data ─────────────────────────────────────────────────────────

    /// Replace the rows. Search term, sort, page and selection are kept;
    /// the page is clamped if the new data has fewer pages.
    pub fn set_data(&mut self, rows: Vec<Row>) {
        if !self.is_mounted() {
            return;
        }
        self.state.data = rows;
        self.derive();
        self.render();
    }

    /// Replace the rows from an arbitrary JSON value. Anything other than an
    /// array is treated as no rows.
    pub fn set_json(&mut self, value: Value) {
        match value {
            Value::Array(rows) => self.set_data(rows),
            other => {
                warn!(
                    mount_id = %self.mount_id,
                    kind = json_kind(&other),
                    "grid data is not an array, showing no rows"
                );
                self.set_data(Vec::new());
            }
        }
    }

    pub fn set_loading(&mut self, loading: bool) {
        if !self.is_mounted() {
            return;
        }
        self.state.loading = loading;
        self.render();
    }

    /// Re-derive and re-render without changing any input.
    pub fn refresh(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.derive();
        self.render();
    }

    /// Clear the surface and detach. Later calls are ignored.
    pub fn destroy(&mut self) {
        if let Some(surface) = self.surface.take() {
            surface.clear();
            debug!(mount_id = %self.mount_id, "grid destroyed");
        }
        self.html.clear();
        self.state = GridState::new(&self.config);
    }

    // ── Search, sort, pagination ─────────────────────────────────────

    /// Apply a search term and return to the first page.
    pub fn set_search(&mut self, term: impl Into<String>) {
        if !self.is_mounted() {
            return;
        }
        self.state.search_term = term.into();
        self.state.current_page = 1;
        self.derive();
        self.render();
    }

    /// Header-click semantics: the active column flips direction, any other
    /// column becomes active ascending. Returns whether the sort changed.
    pub fn sort_by(&mut self, key: &str) -> bool {
        if !self.is_mounted() || !self.config.sort.enabled {
            return false;
        }
        if !self.config.column(key).is_some_and(|c| c.sortable) {
            trace!(column = key, "ignoring sort on non-sortable column");
            return false;
        }
        if self.state.sort_column.as_deref() == Some(key) {
            self.state.sort_direction = self.state.sort_direction.toggled();
        } else {
            self.state.sort_column = Some(key.to_owned());
            self.state.sort_direction = SortDirection::Asc;
        }
        self.derive();
        self.render();
        true
    }

    /// Show page `page` (1-based). Pages outside `1..=total_pages()` are
    /// rejected and the current page is kept.
    pub fn go_to_page(&mut self, page: usize) -> bool {
        if !self.is_mounted() {
            return false;
        }
        let total = self.total_pages();
        if page < 1 || page > total {
            debug!(page, total, "rejected out-of-range page");
            return false;
        }
        self.state.current_page = page;
        self.render();
        true
    }

    /// Change the page size to one of the configured options and return to
    /// the first page.
    pub fn set_page_size(&mut self, size: usize) -> bool {
        if !self.is_mounted() || !self.config.pagination.page_size_options.contains(&size) {
            return false;
        }
        self.state.page_size = size;
        self.state.current_page = 1;
        self.render();
        true
    }

    pub fn total_pages(&self) -> usize {
        self.page().total_pages
    }

    /// Rows matching the search, in sort order.
    pub fn filtered_rows(&self) -> Vec<&Row> {
        self.state.filtered_rows().collect()
    }

    /// Rows on the current page, in display order.
    pub fn page_rows(&self) -> Vec<&Row> {
        self.page()
            .groups
            .iter()
            .flat_map(|(_, indices)| indices.iter())
            .filter_map(|&i| self.state.data.get(i))
            .collect()
    }

    // ── Selection ────────────────────────────────────────────────────

    /// Add or remove one row from the selection. Single-selection grids
    /// drop any other selected row when a new one is checked.
    pub fn toggle_row(&mut self, row_id: &str, checked: bool) -> bool {
        if !self.is_mounted() || !self.config.selection.enabled {
            return false;
        }
        if checked {
            if !self.config.selection.multiple {
                self.state.selected.clear();
            }
            self.state.selected.insert(row_id.to_owned());
        } else {
            self.state.selected.shift_remove(row_id);
        }
        self.render();
        true
    }

    /// Select or deselect every row matching the current search, across all
    /// pages.
    pub fn select_all(&mut self, checked: bool) -> bool {
        if !self.is_mounted()
            || !self.config.selection.enabled
            || !self.config.selection.multiple
        {
            return false;
        }
        let ids: Vec<RowId> = self
            .state
            .filtered_rows()
            .map(|row| self.config.identity.id_of(row))
            .collect();
        if checked {
            self.state.selected.extend(ids);
        } else {
            for id in &ids {
                self.state.selected.shift_remove(id);
            }
        }
        self.render();
        true
    }

    /// Rows whose identity is selected, in data order. Identities with no
    /// matching row in the current data are skipped.
    pub fn selected_rows(&self) -> Vec<&Row> {
        self.state
            .data
            .iter()
            .filter(|row| self.state.selected.contains(&self.config.identity.id_of(row)))
            .collect()
    }

    pub fn clear_selection(&mut self) {
        if !self.is_mounted() {
            return;
        }
        self.state.selected.clear();
        self.render();
    }

    // ── Events ───────────────────────────────────────────────────────

    /// Single entry point for delegated DOM events.
    pub fn handle(&mut self, event: &GridEvent) -> EventOutcome {
        if !self.is_mounted() {
            return EventOutcome::Ignored;
        }
        trace!(mount_id = %self.mount_id, ?event, "grid event");

        let rerendered = match event {
            GridEvent::SearchInput(term) => {
                if !self.config.search.enabled {
                    return EventOutcome::Ignored;
                }
                self.set_search(term.clone());
                true
            }
            GridEvent::HeaderClick(key) => self.sort_by(key),
            GridEvent::PageClick(page) => self.go_to_page(*page),
            GridEvent::PageSizeChange(size) => self.set_page_size(*size),
            GridEvent::RowToggle { row_id, checked } => self.toggle_row(row_id, *checked),
            GridEvent::SelectAll(checked) => self.select_all(*checked),
            GridEvent::ActionClick { action, row_id } => {
                return self.dispatch_action(action, row_id, event);
            }
            GridEvent::RowClick(row_id) => return self.dispatch_row_click(row_id, event),
        };

        if rerendered {
            EventOutcome::Rerendered
        } else {
            EventOutcome::Ignored
        }
    }

    fn dispatch_action(&self, name: &str, row_id: &str, event: &GridEvent) -> EventOutcome {
        let Some(row) = self.find_row(row_id) else {
            debug!(row_id, "action click for unknown row");
            return EventOutcome::Ignored;
        };
        let is_admin = self.env.user_is_admin();
        let Some(action) = self
            .config
            .actions
            .iter()
            .find(|a| a.name == name && a.is_visible(row, is_admin))
        else {
            debug!(action = name, row_id, "action not available for row");
            return EventOutcome::Ignored;
        };
        (action.on_click)(row, event);
        EventOutcome::Dispatched
    }

    fn dispatch_row_click(&self, row_id: &str, event: &GridEvent) -> EventOutcome {
        let (Some(handler), Some(row)) = (&self.config.on_row_click, self.find_row(row_id)) else {
            return EventOutcome::Ignored;
        };
        handler(row, event);
        EventOutcome::Dispatched
    }

    fn find_row(&self, row_id: &str) -> Option<&Row> {
        self.state
            .data
            .iter()
            .find(|row| self.config.identity.id_of(row) == row_id)
    }

    // ── Export ───────────────────────────────────────────────────────

    /// Write the filtered, sorted rows as CSV. Returns the number of rows
    /// written.
    pub fn export_csv<W: Write>(&self, writer: W) -> Result<usize, ExportError> {
        write_csv(
            writer,
            &self.config.columns,
            self.state.filtered_rows(),
            &self.env.locale,
        )
    }

    // ── Internals ────────────────────────────────────────────────────

    fn derive(&mut self) {
        let fields = self.config.search_fields();
        let mut filtered = filter_indices(&self.state.data, &self.state.search_term, &fields);

        let sort_column = self
            .state
            .sort_column
            .as_deref()
            .and_then(|key| self.config.column(key))
            .filter(|c| c.sortable);
        if let Some(column) = sort_column {
            sort_indices(
                &mut filtered,
                &self.state.data,
                column,
                self.state.sort_direction,
            );
        }
        self.state.filtered = filtered;

        let last = self.total_pages().max(1);
        if self.state.current_page > last {
            debug!(from = self.state.current_page, to = last, "clamping grid page");
        }
        self.state.current_page = self.state.current_page.clamp(1, last);
    }

    fn page(&self) -> Page {
        build_page(
            &self.state.filtered,
            &self.state.data,
            self.config.group_by.as_deref(),
            self.config.pagination.enabled,
            self.state.current_page,
            self.state.page_size,
        )
    }

    fn render(&mut self) {
        let Some(surface) = &self.surface else {
            return;
        };
        let page = self.page();
        let ctx = RenderContext {
            config: &self.config,
            state: &self.state,
            env: &self.env,
            page: &page,
        };
        self.html = render(&ctx);
        surface.replace_contents(&self.html);
    }
}

impl fmt::Debug for Grid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Grid")
            .field("mount_id", &self.mount_id)
            .field("mounted", &self.is_mounted())
            .field("rows", &self.state.data.len())
            .field("filtered", &self.state.filtered.len())
            .field("page", &self.state.current_page)
            .finish_non_exhaustive()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
