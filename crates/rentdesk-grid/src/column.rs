// ── Column descriptors ──

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::row::Row;

/// Custom cell formatter. Its output is inserted as markup, unescaped,
/// so the formatter owns escaping of anything it interpolates.
pub type Formatter = Arc<dyn Fn(&Value, &Row) -> String + Send + Sync>;

/// Declared value type of a column. Drives both formatting and sorting.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Default,
    Serialize,
    Deserialize,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ColumnType {
    Number,
    Currency,
    Percent,
    Date,
    Datetime,
    Boolean,
    #[default]
    Text,
}

impl ColumnType {
    /// Whether the sort comparator treats this column as numeric.
    pub fn sorts_numerically(self) -> bool {
        matches!(self, Self::Number | Self::Currency)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum Align {
    Left,
    Center,
    Right,
}

/// One column of the grid. `key` is a dotted path into each row and must be
/// unique within a grid.
#[derive(Clone, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct Column {
    pub key: String,
    pub label: String,
    #[serde(default)]
    pub width: Option<String>,
    #[serde(default)]
    pub align: Option<Align>,
    #[serde(default = "default_true")]
    pub sortable: bool,
    #[serde(default = "default_true")]
    pub filterable: bool,
    #[serde(default, rename = "type")]
    pub kind: ColumnType,
    #[serde(skip)]
    pub formatter: Option<Formatter>,
    #[serde(default)]
    pub empty_value: Option<String>,
    #[serde(default)]
    pub hide_on_mobile: bool,
    #[serde(default)]
    pub card_title: bool,
}

fn default_true() -> bool {
    true
}

impl Column {
    pub fn new(key: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            label: label.into(),
            width: None,
            align: None,
            sortable: true,
            filterable: true,
            kind: ColumnType::Text,
            formatter: None,
            empty_value: None,
            hide_on_mobile: false,
            card_title: false,
        }
    }

    pub fn kind(mut self, kind: ColumnType) -> Self {
        self.kind = kind;
        self
    }

    pub fn width(mut self, width: impl Into<String>) -> Self {
        self.width = Some(width.into());
        self
    }

    pub fn align(mut self, align: Align) -> Self {
        self.align = Some(align);
        self
    }

    pub fn sortable(mut self, sortable: bool) -> Self {
        self.sortable = sortable;
        self
    }

    pub fn filterable(mut self, filterable: bool) -> Self {
        self.filterable = filterable;
        self
    }

    pub fn formatter(mut self, f: impl Fn(&Value, &Row) -> String + Send + Sync + 'static) -> Self {
        self.formatter = Some(Arc::new(f));
        self
    }

    pub fn empty_value(mut self, empty: impl Into<String>) -> Self {
        self.empty_value = Some(empty.into());
        self
    }

    pub fn hide_on_mobile(mut self) -> Self {
        self.hide_on_mobile = true;
        self
    }

    pub fn card_title(mut self) -> Self {
        self.card_title = true;
        self
    }

    /// Display text for a missing value.
    pub fn empty_display(&self) -> &str {
        self.empty_value.as_deref().unwrap_or("-")
    }
}

impl fmt::Debug for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("key", &self.key)
            .field("label", &self.label)
            .field("kind", &self.kind)
            .field("sortable", &self.sortable)
            .field("filterable", &self.filterable)
            .field("formatter", &self.formatter.as_ref().map(|_| ".."))
            .finish_non_exhaustive()
    }
}
