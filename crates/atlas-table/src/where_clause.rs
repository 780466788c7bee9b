//! SQL definition queries for "apply to map".
//!
//! The table's column filters and global search can be pushed to the map as
//! the layer's grid filter, so the map shows the same features the table
//! does. The map speaks ArcGIS-flavoured SQL: `UPPER(col) LIKE '...'` for
//! text, `DATE 'M/D/YYYY'` literals for dates.

use crate::column::{ColumnFilterValue, ColumnFilters, ColumnKind, MatchOptions};
use crate::config::ColumnSpecs;

/// Escape character for `%` and `_` inside `LIKE` patterns. Chosen so that
/// nobody types it by accident.
const LIKE_ESCAPE: char = 'ௌ';

/// Global search shorter than this is not pushed to the map.
const MIN_SEARCH_LEN: usize = 3;

/// Builds `WHERE` clauses from table filters.
#[derive(Debug, Clone, Copy)]
pub struct WhereClauseBuilder<'a> {
    specs: &'a ColumnSpecs,
    options: MatchOptions,
}

impl<'a> WhereClauseBuilder<'a> {
    pub fn new(specs: &'a ColumnSpecs, options: MatchOptions) -> Self {
        Self { specs, options }
    }

    /// The clause for `columns` and `search`, or `None` if nothing filters.
    pub fn build(&self, columns: &ColumnFilters, search: &str) -> Option<String> {
        let mut parts: Vec<String> = columns
            .iter()
            .filter_map(|(column, value)| self.column_clause(column, value))
            .collect();
        if search.trim().chars().count() >= MIN_SEARCH_LEN {
            let search = self.search_clause(search.trim());
            parts.push(format!("({search})"));
        }
        (!parts.is_empty()).then(|| parts.join(" AND "))
    }

    fn column_clause(&self, column: &str, value: &ColumnFilterValue) -> Option<String> {
        match value {
            ColumnFilterValue::Text { pattern } if !pattern.is_empty() => Some(self.text_clause(column, pattern)),
            ColumnFilterValue::NumberRange { min, max } => match (min, max) {
                (Some(min), Some(max)) => Some(format!("{column} >= {min} AND {column} <= {max}")),
                (Some(min), None) => Some(format!("{column} >= {min}")),
                (None, Some(max)) => Some(format!("{column} <= {max}")),
                (None, None) => None,
            },
            ColumnFilterValue::DateRange { from, to } => {
                let date = |d: &chrono::NaiveDate| d.format("%-m/%-d/%Y").to_string();
                match (from, to) {
                    (Some(from), Some(to)) => Some(format!(
                        "{column} >= DATE '{}' AND {column} <= DATE '{}'",
                        date(from),
                        date(to)
                    )),
                    (Some(from), None) => Some(format!("{column} >= DATE '{}'", date(from))),
                    (None, Some(to)) => Some(format!("{column} <= DATE '{}'", date(to))),
                    (None, None) => None,
                }
            }
            ColumnFilterValue::Selector { values } if !values.is_empty() => {
                let list = values
                    .iter()
                    .map(|v| format!("'{}'", quote(v).to_uppercase()))
                    .collect::<Vec<_>>()
                    .join(", ");
                Some(format!("UPPER({column}) IN ({list})"))
            }
            _ => None,
        }
    }

    fn text_clause(&self, column: &str, pattern: &str) -> String {
        let mut escaped = String::with_capacity(pattern.len());
        for c in quote(pattern).chars() {
            if c == '%' || c == '_' {
                escaped.push(LIKE_ESCAPE);
            }
            escaped.push(c);
        }
        if self.options.lazy {
            escaped = format!("*{}", escaped.replace(' ', "*"));
        }
        let like = escaped.replace('*', "%").to_uppercase();
        let clause = format!("UPPER({column}) LIKE '{like}%'");
        if like.contains(LIKE_ESCAPE) {
            format!("{clause} ESCAPE '{LIKE_ESCAPE}'")
        } else {
            clause
        }
    }

    fn search_clause(&self, search: &str) -> String {
        let like = format!(
            "%{}",
            quote(search)
                .replace('*', "%")
                .split_whitespace()
                .collect::<Vec<_>>()
                .join("%")
                .to_uppercase()
        );
        let clauses: Vec<String> = self
            .specs
            .iter()
            .filter(|(_, spec)| spec.searchable && matches!(spec.kind, ColumnKind::Text | ColumnKind::Selector))
            .map(|(column, _)| format!("UPPER({column}) LIKE '{like}%'"))
            .collect();
        if clauses.is_empty() {
            // Nothing can match the search.
            "1=2".to_string()
        } else {
            clauses.join(" OR ")
        }
    }
}

fn quote(s: &str) -> String {
    s.replace('\'', "''")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ColumnFilterSpec;
    use chrono::NaiveDate;

    fn specs() -> ColumnSpecs {
        let spec = |kind, searchable| ColumnFilterSpec {
            kind,
            searchable,
            is_static: false,
            initial_value: None,
        };
        ColumnSpecs::from([
            ("NAME".to_string(), spec(ColumnKind::Text, true)),
            ("NOTES".to_string(), spec(ColumnKind::Text, false)),
            ("TYPE".to_string(), spec(ColumnKind::Selector, true)),
            ("AREA".to_string(), spec(ColumnKind::NumericRange, true)),
        ])
    }

    fn build(columns: ColumnFilters, search: &str, lazy: bool) -> Option<String> {
        let specs = specs();
        WhereClauseBuilder::new(&specs, MatchOptions { lazy, strict: false }).build(&columns, search)
    }

    #[test]
    fn test_nothing_to_filter() {
        assert_eq!(build(ColumnFilters::new(), "", false), None);
        assert_eq!(build(ColumnFilters::new(), "ab", false), None);
        assert_eq!(
            build(ColumnFilters::from([("NAME".to_string(), ColumnFilterValue::text(""))]), "", false),
            None
        );
    }

    #[test]
    fn test_text_prefix_and_wildcard() {
        let columns = ColumnFilters::from([("NAME".to_string(), ColumnFilterValue::text("st*lake"))]);
        assert_eq!(build(columns, "", false).as_deref(), Some("UPPER(NAME) LIKE 'ST%LAKE%'"));
    }

    #[test]
    fn test_text_quotes_and_escapes() {
        let columns = ColumnFilters::from([("NAME".to_string(), ColumnFilterValue::text("o'neil_1"))]);
        assert_eq!(
            build(columns, "", false).as_deref(),
            Some("UPPER(NAME) LIKE 'O''NEILௌ_1%' ESCAPE 'ௌ'")
        );
    }

    #[test]
    fn test_lazy_text_matches_anywhere() {
        let columns = ColumnFilters::from([("NAME".to_string(), ColumnFilterValue::text("big lake"))]);
        assert_eq!(build(columns, "", true).as_deref(), Some("UPPER(NAME) LIKE '%BIG%LAKE%'"));
    }

    #[test]
    fn test_ranges_and_selector() {
        let columns = ColumnFilters::from([
            ("AREA".to_string(), ColumnFilterValue::number_range(Some(1.5), Some(10.0))),
            (
                "SURVEYED".to_string(),
                ColumnFilterValue::date_range(NaiveDate::from_ymd_opt(2020, 3, 7), None),
            ),
            ("TYPE".to_string(), ColumnFilterValue::selector(["Lake", "Pond"])),
        ]);
        assert_eq!(
            build(columns, "", false).as_deref(),
            Some(
                "AREA >= 1.5 AND AREA <= 10 AND SURVEYED >= DATE '3/7/2020' AND UPPER(TYPE) IN ('LAKE', 'POND')"
            )
        );
    }

    #[test]
    fn test_global_search_over_searchable_text_columns() {
        let columns = ColumnFilters::from([("AREA".to_string(), ColumnFilterValue::number_range(None, Some(3.0)))]);
        assert_eq!(
            build(columns, "salt lake", false).as_deref(),
            Some("AREA <= 3 AND (UPPER(NAME) LIKE '%SALT%LAKE%' OR UPPER(TYPE) LIKE '%SALT%LAKE%')")
        );
    }

    #[test]
    fn test_global_search_without_text_columns_matches_nothing() {
        let specs = ColumnSpecs::new();
        let builder = WhereClauseBuilder::new(&specs, MatchOptions::default());
        assert_eq!(builder.build(&ColumnFilters::new(), "lake").as_deref(), Some("(1=2)"));
    }
}
