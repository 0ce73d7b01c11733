// ── Grid configuration ──
//
// Everything a grid needs at construction. Plain settings are serde types so
// hosts can load them from files; callbacks are attached in code.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::action::{Action, RowHandler};
use crate::column::Column;
use crate::error::GridConfigError;
use crate::row::{Row, RowIdentity};

pub const DEFAULT_PAGE_SIZE: usize = 20;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, strum::Display,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum SortDirection {
    #[default]
    Asc,
    Desc,
}

impl SortDirection {
    pub fn toggled(self) -> Self {
        match self {
            Self::Asc => Self::Desc,
            Self::Desc => Self::Asc,
        }
    }
}

/// Body layout used on mobile devices. Desktop always gets a table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MobileLayout {
    #[default]
    Cards,
    Table,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ResponsiveConfig {
    #[serde(default)]
    pub mobile: MobileLayout,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginationConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    #[serde(default = "default_page_size_options")]
    pub page_size_options: Vec<usize>,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            page_size: DEFAULT_PAGE_SIZE,
            page_size_options: default_page_size_options(),
        }
    }
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

fn default_page_size_options() -> Vec<usize> {
    vec![10, 20, 50, 100]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub enabled: bool,
    /// Falls back to the locale's placeholder when unset.
    #[serde(default)]
    pub placeholder: Option<String>,
    /// Fields to match. Empty means every column not marked `filterable = false`.
    #[serde(default)]
    pub fields: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SortConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub column: Option<String>,
    #[serde(default)]
    pub direction: SortDirection,
}

impl Default for SortConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            column: None,
            direction: SortDirection::Asc,
        }
    }
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct SelectionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub multiple: bool,
}

/// Full grid configuration.
#[derive(Clone, Default)]
pub struct GridConfig {
    pub columns: Vec<Column>,
    pub data: Vec<Row>,
    pub actions: Vec<Action>,
    pub responsive: ResponsiveConfig,
    pub pagination: PaginationConfig,
    pub search: SearchConfig,
    pub sort: SortConfig,
    pub selection: SelectionConfig,
    /// Field path whose stringified value partitions rows into groups.
    pub group_by: Option<String>,
    /// Falls back to the locale's message when unset.
    pub empty_message: Option<String>,
    /// Falls back to the locale's message when unset.
    pub loading_message: Option<String>,
    pub on_row_click: Option<RowHandler>,
    pub identity: RowIdentity,
}

impl GridConfig {
    pub fn new(columns: Vec<Column>) -> Self {
        Self {
            columns,
            ..Self::default()
        }
    }

    pub fn data(mut self, data: Vec<Row>) -> Self {
        self.data = data;
        self
    }

    pub fn action(mut self, action: Action) -> Self {
        self.actions.push(action);
        self
    }

    pub fn on_row_click(
        mut self,
        f: impl Fn(&Row, &crate::GridEvent) + Send + Sync + 'static,
    ) -> Self {
        self.on_row_click = Some(std::sync::Arc::new(f));
        self
    }

    pub fn column(&self, key: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.key == key)
    }

    /// Fields the search box matches against.
    pub fn search_fields(&self) -> Vec<&str> {
        if self.search.fields.is_empty() {
            self.columns
                .iter()
                .filter(|c| c.filterable)
                .map(|c| c.key.as_str())
                .collect()
        } else {
            self.search.fields.iter().map(String::as_str).collect()
        }
    }

    /// Number of `<td>`s in a table row: data columns plus the optional
    /// selection and action columns.
    pub fn table_span(&self) -> usize {
        self.columns.len()
            + usize::from(self.selection.enabled)
            + usize::from(!self.actions.is_empty())
    }

    /// Check the configuration without modifying it.
    pub fn validate(&self) -> Result<(), GridConfigError> {
        let mut seen = HashSet::new();
        for column in &self.columns {
            if !seen.insert(column.key.as_str()) {
                return Err(GridConfigError::DuplicateColumn {
                    key: column.key.clone(),
                });
            }
        }
        if self.pagination.page_size == 0 {
            return Err(GridConfigError::ZeroPageSize);
        }
        if self.pagination.page_size_options.contains(&0) {
            return Err(GridConfigError::ZeroPageSizeOption);
        }
        if let Some(field) = self
            .search
            .fields
            .iter()
            .find(|f| f.is_empty() || f.split('.').any(str::is_empty))
        {
            return Err(GridConfigError::InvalidSearchField {
                field: field.clone(),
            });
        }
        Ok(())
    }

    /// Repair whatever `validate` would reject, logging each fix.
    pub(crate) fn normalized(mut self) -> Self {
        let mut seen = HashSet::new();
        self.columns.retain(|column| {
            let fresh = seen.insert(column.key.clone());
            if !fresh {
                warn!(key = %column.key, "dropping duplicate grid column");
            }
            fresh
        });

        if self.pagination.page_size == 0 {
            warn!(default = DEFAULT_PAGE_SIZE, "grid page size of 0 replaced");
            self.pagination.page_size = DEFAULT_PAGE_SIZE;
        }
        self.pagination.page_size_options.retain(|&n| n > 0);

        self.search.fields.retain(|f| {
            let ok = !f.is_empty() && !f.split('.').any(str::is_empty);
            if !ok {
                warn!(field = %f, "dropping invalid search field");
            }
            ok
        });
        self
    }
}
