// ── CSV export ──

use std::io::Write;

use crate::column::Column;
use crate::error::ExportError;
use crate::format::Locale;
use crate::render::plain_cells;
use crate::row::Row;

/// Write `rows` as CSV: one header record of column labels, then one record
/// per row with plain (unescaped, formatter-free) cell values.
pub fn write_csv<'a, W: Write>(
    writer: W,
    columns: &[Column],
    rows: impl IntoIterator<Item = &'a Row>,
    locale: &Locale,
) -> Result<usize, ExportError> {
    let mut out = csv::Writer::from_writer(writer);
    out.write_record(columns.iter().map(|c| c.label.as_str()))?;

    let mut written = 0;
    for row in rows {
        out.write_record(plain_cells(row, columns, locale))?;
        written += 1;
    }
    out.flush()?;
    Ok(written)
}
