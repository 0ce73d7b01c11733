// ── Render state and the derive pipeline ──
//
// `filtered` holds indices into `data` and is always rebuilt from scratch by
// filter-then-sort; it is never patched incrementally.

use std::cmp::Ordering;

use indexmap::{IndexMap, IndexSet};
use serde_json::Value;

use crate::column::{Column, ColumnType};
use crate::config::{GridConfig, SortDirection};
use crate::row::{Row, RowId, display_string, parse_timestamp, sort_number, value_at};

/// Render state owned by one grid.
#[derive(Debug, Clone, Default)]
pub struct GridState {
    pub(crate) data: Vec<Row>,
    pub(crate) filtered: Vec<usize>,
    pub(crate) current_page: usize,
    pub(crate) page_size: usize,
    pub(crate) search_term: String,
    pub(crate) sort_column: Option<String>,
    pub(crate) sort_direction: SortDirection,
    pub(crate) selected: IndexSet<RowId>,
    pub(crate) loading: bool,
}

impl GridState {
    pub(crate) fn new(config: &GridConfig) -> Self {
        Self {
            data: Vec::new(),
            filtered: Vec::new(),
            current_page: 1,
            page_size: config.pagination.page_size,
            search_term: String::new(),
            sort_column: config.sort.column.clone(),
            sort_direction: config.sort.direction,
            selected: IndexSet::new(),
            loading: false,
        }
    }

    pub fn data(&self) -> &[Row] {
        &self.data
    }

    pub fn filtered_len(&self) -> usize {
        self.filtered.len()
    }

    pub fn filtered_rows(&self) -> impl Iterator<Item = &Row> + '_ {
        self.filtered.iter().filter_map(|&i| self.data.get(i))
    }

    pub fn current_page(&self) -> usize {
        self.current_page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn search_term(&self) -> &str {
        &self.search_term
    }

    pub fn sort_column(&self) -> Option<&str> {
        self.sort_column.as_deref()
    }

    pub fn sort_direction(&self) -> SortDirection {
        self.sort_direction
    }

    /// Selected identities in selection order.
    pub fn selected(&self) -> &IndexSet<RowId> {
        &self.selected
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }
}

// ── Filter ──────────────────────────────────────────────────────────

/// Indices of rows where any of `fields` contains `term`, case-insensitively.
/// An empty term keeps every row in its original order.
pub(crate) fn filter_indices(data: &[Row], term: &str, fields: &[&str]) -> Vec<usize> {
    if term.is_empty() {
        return (0..data.len()).collect();
    }
    let needle = term.to_lowercase();
    data.iter()
        .enumerate()
        .filter(|(_, row)| {
            fields.iter().any(|field| {
                value_at(row, field)
                    .is_some_and(|v| display_string(v).to_lowercase().contains(&needle))
            })
        })
        .map(|(i, _)| i)
        .collect()
}

// ── Sort ────────────────────────────────────────────────────────────

/// Three-way comparison of two cells under a column's declared type.
pub(crate) fn compare_cells(a: Option<&Value>, b: Option<&Value>, kind: ColumnType) -> Ordering {
    if kind.sorts_numerically() {
        let (x, y) = (sort_number(a), sort_number(b));
        return x.partial_cmp(&y).unwrap_or(Ordering::Equal);
    }
    if kind == ColumnType::Date {
        // Invalid dates sort as the epoch.
        let stamp = |v: Option<&Value>| v.and_then(parse_timestamp).unwrap_or(0);
        return stamp(a).cmp(&stamp(b));
    }
    let text = |v: Option<&Value>| v.map(display_string).unwrap_or_default().to_lowercase();
    text(a).cmp(&text(b))
}

/// Stable sort of `indices` by `column`; descending reverses the comparator,
/// so ties keep their relative order in both directions.
pub(crate) fn sort_indices(
    indices: &mut [usize],
    data: &[Row],
    column: &Column,
    direction: SortDirection,
) {
    let cell = |i: usize| data.get(i).and_then(|row| value_at(row, &column.key));
    indices.sort_by(|&a, &b| {
        let ord = compare_cells(cell(a), cell(b), column.kind);
        match direction {
            SortDirection::Asc => ord,
            SortDirection::Desc => ord.reverse(),
        }
    });
}

// ── Grouping ────────────────────────────────────────────────────────

/// Partition indices by the stringified `group_by` value, in first-seen order.
pub(crate) fn group_indices(
    indices: &[usize],
    data: &[Row],
    group_by: &str,
) -> IndexMap<String, Vec<usize>> {
    let mut groups: IndexMap<String, Vec<usize>> = IndexMap::new();
    for &i in indices {
        let label = data
            .get(i)
            .and_then(|row| value_at(row, group_by))
            .map(display_string)
            .unwrap_or_default();
        groups.entry(label).or_default().push(i);
    }
    groups
}

// ── Pagination ──────────────────────────────────────────────────────

/// One page of output. With grouping active the page unit is a whole group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Page {
    /// Groups on this page; a single unnamed group when not grouping.
    pub groups: Vec<(Option<String>, Vec<usize>)>,
    /// Zero-based offset of the first row on this page within `filtered`.
    pub first_row: usize,
    pub row_count: usize,
    pub total_pages: usize,
}

pub(crate) fn total_pages(units: usize, page_size: usize) -> usize {
    units.div_ceil(page_size.max(1))
}

/// Build the page to display. `page` is 1-based and is assumed clamped.
pub(crate) fn build_page(
    filtered: &[usize],
    data: &[Row],
    group_by: Option<&str>,
    paginate: bool,
    page: usize,
    page_size: usize,
) -> Page {
    let size = page_size.max(1);
    let start_unit = page.saturating_sub(1) * size;

    match group_by {
        None => {
            let (slice, first_row, pages) = if paginate {
                let start = start_unit.min(filtered.len());
                let end = (start + size).min(filtered.len());
                (filtered.get(start..end).unwrap_or_default(), start, total_pages(filtered.len(), size))
            } else {
                (filtered, 0, usize::from(!filtered.is_empty()))
            };
            Page {
                row_count: slice.len(),
                groups: vec![(None, slice.to_vec())],
                first_row,
                total_pages: pages,
            }
        }
        Some(field) => {
            let groups = group_indices(filtered, data, field);
            let group_count = groups.len();
            let (skip, take, pages) = if paginate {
                (start_unit, size, total_pages(group_count, size))
            } else {
                (0, group_count, usize::from(group_count > 0))
            };
            let first_row = groups.values().take(skip).map(Vec::len).sum();
            let selected: Vec<(Option<String>, Vec<usize>)> = groups
                .into_iter()
                .skip(skip)
                .take(take)
                .map(|(label, rows)| (Some(label), rows))
                .collect();
            Page {
                row_count: selected.iter().map(|(_, rows)| rows.len()).sum(),
                groups: selected,
                first_row,
                total_pages: pages,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn people() -> Vec<Row> {
        vec![
            json!({"id": 1, "name": "Ana", "city": "Recife", "rent": "1500.50", "since": "2021-05-01"}),
            json!({"id": 2, "name": "Bea", "city": "Olinda", "rent": 900, "since": "2019-02-10"}),
            json!({"id": 3, "name": "Cid", "city": "Recife", "rent": "abc", "since": "garbage"}),
        ]
    }

    #[test]
    fn empty_term_keeps_everything_in_order() {
        let data = people();
        assert_eq!(filter_indices(&data, "", &["name"]), vec![0, 1, 2]);
    }

    #[test]
    fn filter_is_case_insensitive_or_across_fields() {
        let data = people();
        assert_eq!(filter_indices(&data, "A", &["name"]), vec![0, 1]);
        assert_eq!(filter_indices(&data, "olinda", &["name", "city"]), vec![1]);
        assert_eq!(filter_indices(&data, "zzz", &["name", "city"]), Vec::<usize>::new());
    }

    #[test]
    fn numeric_sort_treats_garbage_as_zero() {
        let data = people();
        let col = Column::new("rent", "Rent").kind(ColumnType::Currency);
        let mut idx = vec![0, 1, 2];
        sort_indices(&mut idx, &data, &col, SortDirection::Asc);
        assert_eq!(idx, vec![2, 1, 0]);
    }

    #[test]
    fn date_sort_puts_invalid_dates_at_epoch() {
        let data = people();
        let col = Column::new("since", "Since").kind(ColumnType::Date);
        let mut idx = vec![0, 1, 2];
        sort_indices(&mut idx, &data, &col, SortDirection::Desc);
        assert_eq!(idx, vec![0, 1, 2]);
        sort_indices(&mut idx, &data, &col, SortDirection::Asc);
        assert_eq!(idx, vec![2, 1, 0]);
    }

    #[test]
    fn text_sort_is_stable_on_ties() {
        let data = people();
        let col = Column::new("city", "City");
        let mut idx = vec![0, 1, 2];
        sort_indices(&mut idx, &data, &col, SortDirection::Asc);
        assert_eq!(idx, vec![1, 0, 2]);
        sort_indices(&mut idx, &data, &col, SortDirection::Desc);
        assert_eq!(idx, vec![0, 2, 1]);
    }

    #[test]
    fn groups_keep_first_seen_order() {
        let data = people();
        let groups = group_indices(&[0, 1, 2], &data, "city");
        let labels: Vec<&str> = groups.keys().map(String::as_str).collect();
        assert_eq!(labels, vec!["Recife", "Olinda"]);
        assert_eq!(groups["Recife"], vec![0, 2]);
    }

    #[test]
    fn page_slices_rows_and_clamps_out_of_range() {
        let data: Vec<Row> = (0..5).map(|i| json!({"id": i})).collect();
        let filtered: Vec<usize> = (0..5).collect();
        let page = build_page(&filtered, &data, None, true, 3, 2);
        assert_eq!(page.groups, vec![(None, vec![4])]);
        assert_eq!(page.first_row, 4);
        assert_eq!(page.total_pages, 3);

        let beyond = build_page(&filtered, &data, None, true, 9, 2);
        assert_eq!(beyond.row_count, 0);
    }

    #[test]
    fn grouped_pages_never_split_a_group() {
        let data = people();
        let page = build_page(&[0, 1, 2], &data, Some("city"), true, 1, 1);
        assert_eq!(page.total_pages, 2);
        assert_eq!(page.groups, vec![(Some("Recife".into()), vec![0, 2])]);

        let second = build_page(&[0, 1, 2], &data, Some("city"), true, 2, 1);
        assert_eq!(second.first_row, 2);
        assert_eq!(second.groups, vec![(Some("Olinda".into()), vec![1])]);
    }
}
