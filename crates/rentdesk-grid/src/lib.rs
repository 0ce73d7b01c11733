//! Data-grid engine for the rentdesk admin dashboard.
//!
//! A [`Grid`] takes opaque JSON rows plus a [`GridConfig`] and renders an
//! HTML table (or mobile cards) with search, type-aware sorting, pagination,
//! grouping, row selection and per-row actions. Host pages forward DOM
//! events as [`GridEvent`]s to [`Grid::handle`].
//!
//! ```
//! use rentdesk_grid::{Column, ColumnType, Grid, GridConfig, GridEnv, MemoryDocument};
//! use serde_json::json;
//!
//! let mut doc = MemoryDocument::new();
//! let surface = doc.add_surface("owners");
//!
//! let mut config = GridConfig::new(vec![
//!     Column::new("nome", "Nome"),
//!     Column::new("aluguel", "Aluguel").kind(ColumnType::Currency),
//! ])
//! .data(vec![json!({"id": 1, "nome": "Ana", "aluguel": 1500})]);
//! config.search.enabled = true;
//!
//! let mut grid = Grid::mount(&doc, "owners", config, GridEnv::default());
//! grid.set_search("an");
//! assert_eq!(grid.filtered_rows().len(), 1);
//! assert!(surface.contents().contains("R$\u{a0}1.500,00"));
//! ```

pub mod action;
pub mod column;
pub mod config;
pub mod error;
pub mod export;
pub mod format;
pub mod grid;
pub mod html;
pub mod render;
pub mod row;
pub mod state;
pub mod surface;

pub use action::{Action, EventOutcome, GridEvent};
pub use column::{Align, Column, ColumnType};
pub use config::{
    GridConfig, MobileLayout, PaginationConfig, ResponsiveConfig, SearchConfig, SelectionConfig,
    SortConfig, SortDirection,
};
pub use error::{ExportError, GridConfigError};
pub use format::Locale;
pub use grid::Grid;
pub use row::{Row, RowId, RowIdentity, value_at};
pub use state::GridState;
pub use surface::{DeviceClass, Document, GridEnv, MemoryDocument, MemorySurface, Surface};
