//! Locale-aware cell formatting.
//!
//! `plain_value` produces unescaped text (CSV, terminal tables);
//! `cell_markup` produces the HTML fragment placed inside a cell.

use chrono::DateTime;
use serde_json::Value;

use crate::column::{Column, ColumnType};
use crate::html::escape;
use crate::row::{Row, display_string, is_truthy, numeric_value, parse_timestamp};

/// User-facing strings rendered by the grid chrome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiText {
    pub search_placeholder: String,
    pub empty_message: String,
    pub loading_message: String,
    pub actions_header: String,
    pub previous: String,
    pub next: String,
    /// Joins the range and total in the toolbar ("1-20 de 57").
    pub of: String,
    pub records: String,
    pub per_page: String,
}

/// Number, currency and date conventions plus chrome strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Locale {
    pub tag: String,
    pub decimal_separator: char,
    pub thousands_separator: char,
    /// Prepended to currency amounts, including any spacing.
    pub currency_prefix: String,
    pub date_pattern: String,
    pub datetime_pattern: String,
    pub text: UiText,
}

impl Locale {
    pub fn pt_br() -> Self {
        Self {
            tag: "pt-BR".into(),
            decimal_separator: ',',
            thousands_separator: '.',
            currency_prefix: "R$\u{a0}".into(),
            date_pattern: "%d/%m/%Y".into(),
            datetime_pattern: "%d/%m/%Y, %H:%M:%S".into(),
            text: UiText {
                search_placeholder: "Buscar...".into(),
                empty_message: "Nenhum registro encontrado".into(),
                loading_message: "Carregando...".into(),
                actions_header: "Ações".into(),
                previous: "Anterior".into(),
                next: "Próximo".into(),
                of: "de".into(),
                records: "registros".into(),
                per_page: "por página".into(),
            },
        }
    }

    pub fn en_us() -> Self {
        Self {
            tag: "en-US".into(),
            decimal_separator: '.',
            thousands_separator: ',',
            currency_prefix: "$".into(),
            date_pattern: "%-m/%-d/%Y".into(),
            datetime_pattern: "%-m/%-d/%Y, %-I:%M:%S %p".into(),
            text: UiText {
                search_placeholder: "Search...".into(),
                empty_message: "No records found".into(),
                loading_message: "Loading...".into(),
                actions_header: "Actions".into(),
                previous: "Previous".into(),
                next: "Next".into(),
                of: "of".into(),
                records: "records".into(),
                per_page: "per page".into(),
            },
        }
    }

    /// Look up a built-in locale by BCP 47 tag, case-insensitively.
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag.to_ascii_lowercase().replace('_', "-").as_str() {
            "pt-br" | "pt" => Some(Self::pt_br()),
            "en-us" | "en" => Some(Self::en_us()),
            _ => None,
        }
    }

    /// Group the integer part and join with the locale's decimal separator.
    ///
    /// Rounds to `max_fraction` digits, then trims trailing zeros down to
    /// `min_fraction`.
    pub fn format_decimal(&self, value: f64, min_fraction: usize, max_fraction: usize) -> String {
        let fixed = format!("{:.*}", max_fraction, value.abs());
        let (int_part, frac_part) = fixed.split_once('.').unwrap_or((fixed.as_str(), ""));

        let mut frac = frac_part.trim_end_matches('0').to_string();
        while frac.len() < min_fraction {
            frac.push('0');
        }

        let mut out = String::with_capacity(fixed.len() + int_part.len() / 3 + 1);
        let is_zero = int_part.bytes().all(|b| b == b'0') && frac.bytes().all(|b| b == b'0');
        if value.is_sign_negative() && !is_zero {
            out.push('-');
        }
        for (i, ch) in int_part.chars().enumerate() {
            if i > 0 && (int_part.len() - i) % 3 == 0 {
                out.push(self.thousands_separator);
            }
            out.push(ch);
        }
        if !frac.is_empty() {
            out.push(self.decimal_separator);
            out.push_str(&frac);
        }
        out
    }

    pub fn format_currency(&self, value: f64) -> String {
        let amount = self.format_decimal(value.abs(), 2, 2);
        if value < 0.0 && amount.bytes().any(|b| b.is_ascii_digit() && b != b'0') {
            format!("-{}{amount}", self.currency_prefix)
        } else {
            format!("{}{amount}", self.currency_prefix)
        }
    }

    pub fn format_number(&self, value: f64) -> String {
        self.format_decimal(value, 0, 3)
    }

    pub fn format_timestamp(&self, millis: i64, with_time: bool) -> Option<String> {
        let dt = DateTime::from_timestamp_millis(millis)?;
        let pattern = if with_time {
            &self.datetime_pattern
        } else {
            &self.date_pattern
        };
        Some(dt.format(pattern).to_string())
    }
}

impl Default for Locale {
    fn default() -> Self {
        Self::pt_br()
    }
}

/// Fixed two-decimal percentage, always with a `.` separator.
pub fn format_percent(value: f64) -> String {
    format!("{value:.2}%")
}

/// Unescaped display text for a cell, ignoring any custom formatter.
///
/// Values that cannot be shown as their declared type (a non-numeric
/// currency, an unparseable date) fall back to the column's empty display.
pub fn plain_value(value: Option<&Value>, column: &Column, locale: &Locale) -> String {
    let Some(value) = value else {
        return column.empty_display().to_string();
    };
    let typed = match column.kind {
        ColumnType::Currency => numeric_value(value).map(|n| locale.format_currency(n)),
        ColumnType::Number => numeric_value(value).map(|n| locale.format_number(n)),
        ColumnType::Percent => numeric_value(value).map(format_percent),
        ColumnType::Date => parse_timestamp(value).and_then(|ms| locale.format_timestamp(ms, false)),
        ColumnType::Datetime => {
            parse_timestamp(value).and_then(|ms| locale.format_timestamp(ms, true))
        }
        ColumnType::Boolean => Some(if is_truthy(value) { "✓" } else { "✗" }.to_string()),
        ColumnType::Text => Some(display_string(value)),
    };
    typed.unwrap_or_else(|| column.empty_display().to_string())
}

/// HTML fragment for a cell. A custom formatter takes full precedence and
/// is trusted to escape its own output; everything else is escaped here.
pub fn cell_markup(value: Option<&Value>, row: &Row, column: &Column, locale: &Locale) -> String {
    match (value, &column.formatter) {
        (Some(v), Some(formatter)) => formatter(v, row),
        _ => escape(&plain_value(value, column, locale)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    fn col(kind: ColumnType) -> Column {
        Column::new("v", "V").kind(kind)
    }

    #[test]
    fn pt_br_currency_and_numbers() {
        let br = Locale::pt_br();
        assert_eq!(br.format_currency(1234.5), "R$\u{a0}1.234,50");
        assert_eq!(br.format_currency(-0.004), "R$\u{a0}0,00");
        assert_eq!(br.format_currency(-12.0), "-R$\u{a0}12,00");
        assert_eq!(br.format_number(1_234_567.891_2), "1.234.567,891");
        assert_eq!(br.format_number(1000.0), "1.000");
        assert_eq!(br.format_number(0.5), "0,5");
    }

    #[test]
    fn en_us_currency_and_dates() {
        let us = Locale::en_us();
        assert_eq!(us.format_currency(987_654.321), "$987,654.32");
        let ms = parse_timestamp(&json!("2024-03-05T14:07:09Z")).unwrap_or_default();
        assert_eq!(us.format_timestamp(ms, false).as_deref(), Some("3/5/2024"));
        assert_eq!(us.format_timestamp(ms, true).as_deref(), Some("3/5/2024, 2:07:09 PM"));
    }

    #[test]
    fn plain_value_per_type() {
        let br = Locale::pt_br();
        assert_eq!(plain_value(Some(&json!("12.5")), &col(ColumnType::Percent), &br), "12.50%");
        assert_eq!(plain_value(Some(&json!("2024-01-15")), &col(ColumnType::Date), &br), "15/01/2024");
        assert_eq!(
            plain_value(Some(&json!("2024-01-15T08:30:00Z")), &col(ColumnType::Datetime), &br),
            "15/01/2024, 08:30:00"
        );
        assert_eq!(plain_value(Some(&json!(1)), &col(ColumnType::Boolean), &br), "✓");
        assert_eq!(plain_value(Some(&json!(0)), &col(ColumnType::Boolean), &br), "✗");
        assert_eq!(plain_value(None, &col(ColumnType::Text), &br), "-");
    }

    #[test]
    fn invalid_typed_values_fall_back_to_empty_display() {
        let br = Locale::pt_br();
        let date = col(ColumnType::Date).empty_value("—");
        assert_eq!(plain_value(Some(&json!("soon")), &date, &br), "—");
        assert_eq!(plain_value(Some(&json!("abc")), &col(ColumnType::Currency), &br), "-");
    }

    #[test]
    fn cell_markup_escapes_text_but_trusts_formatter() {
        let br = Locale::pt_br();
        let row = json!({});
        let text = col(ColumnType::Text);
        assert_eq!(
            cell_markup(Some(&json!("<b>x</b>")), &row, &text, &br),
            "&lt;b&gt;x&lt;/b&gt;"
        );

        let custom = col(ColumnType::Text).formatter(|v, _| format!("<em>{}</em>", escape(&display_string(v))));
        assert_eq!(cell_markup(Some(&json!("a&b")), &row, &custom, &br), "<em>a&amp;b</em>");
        // Missing values never reach the formatter.
        assert_eq!(cell_markup(None, &row, &custom, &br), "-");
    }

    #[test]
    fn locale_lookup_by_tag() {
        assert_eq!(Locale::from_tag("PT_br").map(|l| l.tag), Some("pt-BR".to_string()));
        assert_eq!(Locale::from_tag("en").map(|l| l.tag), Some("en-US".to_string()));
        assert!(Locale::from_tag("fr-FR").is_none());
    }
}
