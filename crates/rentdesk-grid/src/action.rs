// ── Row actions and delegated events ──
//
// The host page translates DOM events into `GridEvent`s using the data
// attributes the renderer emits (`data-column`, `data-page`, `data-action`,
// `data-row-id`) and hands them to `Grid::handle`.

use std::fmt;
use std::sync::Arc;

use crate::row::{Row, RowId};

/// Callback invoked with the clicked row and the triggering event.
pub type RowHandler = Arc<dyn Fn(&Row, &GridEvent) + Send + Sync>;

/// Pure per-row visibility predicate.
pub type RowPredicate = Arc<dyn Fn(&Row) -> bool + Send + Sync>;

/// A button rendered for every row that passes its visibility checks.
#[derive(Clone)]
pub struct Action {
    pub name: String,
    pub label: Option<String>,
    pub icon: Option<String>,
    pub variant: String,
    pub admin_only: bool,
    pub condition: Option<RowPredicate>,
    pub on_click: RowHandler,
}

impl Action {
    pub fn new(
        name: impl Into<String>,
        on_click: impl Fn(&Row, &GridEvent) + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            label: None,
            icon: None,
            variant: "primary".into(),
            admin_only: false,
            condition: None,
            on_click: Arc::new(on_click),
        }
    }

    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn icon(mut self, icon: impl Into<String>) -> Self {
        self.icon = Some(icon.into());
        self
    }

    pub fn variant(mut self, variant: impl Into<String>) -> Self {
        self.variant = variant.into();
        self
    }

    pub fn admin_only(mut self) -> Self {
        self.admin_only = true;
        self
    }

    pub fn condition(mut self, f: impl Fn(&Row) -> bool + Send + Sync + 'static) -> Self {
        self.condition = Some(Arc::new(f));
        self
    }

    /// Hidden, not disabled, when admin-only for a non-admin or when the
    /// row condition fails.
    pub fn is_visible(&self, row: &Row, is_admin: bool) -> bool {
        if self.admin_only && !is_admin {
            return false;
        }
        self.condition.as_ref().is_none_or(|cond| cond(row))
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("label", &self.label)
            .field("admin_only", &self.admin_only)
            .field("condition", &self.condition.as_ref().map(|_| ".."))
            .finish_non_exhaustive()
    }
}

// ── Events ──────────────────────────────────────────────────────────

/// User interaction delivered to the grid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GridEvent {
    /// Search box input.
    SearchInput(String),
    /// Click on a column header (`data-column`).
    HeaderClick(String),
    /// Click on a pagination link (`data-page`).
    PageClick(usize),
    /// Page-size selector change.
    PageSizeChange(usize),
    /// Click on a row action button.
    ActionClick { action: String, row_id: RowId },
    /// Row checkbox change.
    RowToggle { row_id: RowId, checked: bool },
    /// Header "select all" checkbox change.
    SelectAll(bool),
    /// Click anywhere on a row or card.
    RowClick(RowId),
}

/// What `Grid::handle` did with an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventOutcome {
    /// State changed and the grid re-rendered.
    Rerendered,
    /// A caller callback ran; grid state is untouched.
    Dispatched,
    /// Rejected or not applicable.
    Ignored,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn admin_only_hidden_for_non_admin() {
        let action = Action::new("delete", |_, _| {}).admin_only();
        let row = json!({"id": 1});
        assert!(!action.is_visible(&row, false));
        assert!(action.is_visible(&row, true));
    }

    #[test]
    fn condition_filters_rows() {
        let action = Action::new("pay", |_, _| {})
            .condition(|row| row.get("pending").and_then(serde_json::Value::as_bool) == Some(true));
        assert!(action.is_visible(&json!({"pending": true}), false));
        assert!(!action.is_visible(&json!({"pending": false}), false));
        assert!(!action.is_visible(&json!({}), false));
    }
}
