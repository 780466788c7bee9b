//! Table configuration and its resolution into initial filter state.
//!
//! A table is configured declaratively (usually as part of the layer's JSON
//! config). [`ColumnFilterConfigResolver`] reads that configuration once, at
//! table-open time, together with the layer's field schema, and produces the
//! per-column filter specs and global-search defaults the
//! [`FilterSession`](crate::FilterSession) starts from.
//!
//! # Example
//!
//! ```
//! use atlas_table::config::{ColumnFilterConfigResolver, FieldInfo, FieldType, TableConfig};
//!
//! let config = TableConfig::from_json(r#"{
//!     "search": { "value": "lake" },
//!     "columns": [
//!         { "data": "AREA", "filter": { "value": "1,", "static": true } },
//!         { "data": "TYPE", "filter": { "type": "selector" } }
//!     ]
//! }"#).unwrap();
//!
//! let fields = vec![
//!     FieldInfo::new("OID", FieldType::Number),
//!     FieldInfo::new("AREA", FieldType::Number),
//!     FieldInfo::new("TYPE", FieldType::Text),
//! ];
//!
//! let resolved = ColumnFilterConfigResolver::new(&fields).resolve(&config).unwrap();
//! assert_eq!(resolved.global_search.default_text, "lake");
//! assert!(resolved.columns["AREA"].is_static);
//! ```

use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::Value;

use atlas_table_core::logging::targets;

use crate::column::{ColumnFilterValue, ColumnFilters, ColumnId, ColumnKind, MatchOptions};
use crate::error::ConfigError;
use crate::session::SessionSettings;

/// Filter spec of every filterable column, keyed by column id.
pub type ColumnSpecs = BTreeMap<ColumnId, ColumnFilterSpec>;

/// Declarative table configuration.
///
/// Presentation-only keys (`title`, `showFilter`, `printEnabled`) belong to
/// the panel and are ignored here.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TableConfig {
    /// Global search settings.
    pub search: Option<SearchConfig>,
    /// Text filters match anywhere in the value.
    pub lazy_filter: Option<bool>,
    /// Text comparison is exact.
    pub search_strict_match: Option<bool>,
    /// Configured filters are pushed to the map on open.
    pub apply_map: Option<bool>,
    /// Panel opens maximized.
    pub maximize: Option<bool>,
    /// Rows are limited to the current map viewport.
    pub filter_by_extent: Option<bool>,
    /// Per-column settings.
    pub columns: Vec<ColumnConfig>,
}

impl TableConfig {
    /// Parses a configuration from JSON.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// Global search settings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Whether the search box is offered. Defaults to `true`.
    pub enabled: Option<bool>,
    /// Search text applied on open.
    pub value: Option<String>,
}

/// Settings of one column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnConfig {
    /// Attribute the column displays.
    pub data: String,
    /// Whether the column can be filtered and searched. Defaults to `true`.
    pub searchable: Option<bool>,
    /// Filter settings.
    pub filter: Option<ColumnFilterConfig>,
}

/// Filter settings of one column.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ColumnFilterConfig {
    /// `"selector"` turns a text column into a pick-list.
    #[serde(rename = "type")]
    pub filter_type: Option<String>,
    /// Initial value.
    pub value: Option<Value>,
    /// The user cannot change the value.
    #[serde(rename = "static")]
    pub is_static: Option<bool>,
}

/// Storage type of a layer field, as far as filtering cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldType {
    Number,
    Date,
    Text,
    /// Geometry, blobs and the like: no filter.
    Other,
}

impl FieldType {
    /// Maps an ESRI field type name.
    pub fn from_esri(name: &str) -> Self {
        match name {
            "esriFieldTypeOID" | "esriFieldTypeDouble" | "esriFieldTypeInteger"
            | "esriFieldTypeSingle" | "esriFieldTypeSmallInteger" => Self::Number,
            "esriFieldTypeDate" => Self::Date,
            "esriFieldTypeString" => Self::Text,
            _ => Self::Other,
        }
    }
}

/// A field of the layer schema.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Attribute name.
    pub name: String,
    /// Storage type.
    pub field_type: FieldType,
}

impl FieldInfo {
    /// Creates a field description.
    pub fn new(name: impl Into<String>, field_type: FieldType) -> Self {
        Self {
            name: name.into(),
            field_type,
        }
    }
}

/// Resolved filter settings of one column.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnFilterSpec {
    /// Kind of filter offered.
    pub kind: ColumnKind,
    /// Whether the column can be filtered and is part of the global search.
    pub searchable: bool,
    /// The configured value is fixed.
    pub is_static: bool,
    /// Value applied on open.
    pub initial_value: Option<ColumnFilterValue>,
}

/// Global search defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSearchDefaults {
    /// Whether the search box is offered.
    pub enabled: bool,
    /// Text applied on open and used when a restore finds no saved text.
    pub default_text: String,
}

/// Everything a table needs from its configuration at open time.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedTableConfig {
    pub global_search: GlobalSearchDefaults,
    pub match_options: MatchOptions,
    /// Push the filters to the layer's grid filter on open.
    pub apply_map: bool,
    pub maximized: bool,
    pub filter_by_extent: bool,
    pub columns: ColumnSpecs,
}

impl ResolvedTableConfig {
    /// Column filters the session starts with.
    pub fn initial_column_filters(&self) -> ColumnFilters {
        self.columns
            .iter()
            .filter_map(|(column, spec)| {
                spec.initial_value
                    .clone()
                    .map(|value| (column.clone(), value))
            })
            .collect()
    }

    /// Session settings for a dataset whose ids live in `id_field`.
    pub fn session_settings(&self, id_field: impl Into<String>) -> SessionSettings {
        SessionSettings {
            id_field: id_field.into(),
            default_search: if self.global_search.enabled {
                self.global_search.default_text.clone()
            } else {
                String::new()
            },
            match_options: self.match_options,
            unsearchable_columns: self
                .columns
                .iter()
                .filter(|(_, spec)| !spec.searchable)
                .map(|(column, _)| column.clone())
                .collect::<HashSet<_>>(),
        }
    }
}

/// Turns a [`TableConfig`] plus the layer schema into initial filter state.
#[derive(Debug, Clone)]
pub struct ColumnFilterConfigResolver<'a> {
    fields: &'a [FieldInfo],
}

impl<'a> ColumnFilterConfigResolver<'a> {
    /// Creates a resolver for a layer with the given fields.
    pub fn new(fields: &'a [FieldInfo]) -> Self {
        Self { fields }
    }

    /// Resolves the configuration.
    ///
    /// Every field with a filterable type gets a spec; column entries refine
    /// it. Column entries naming unknown fields are skipped with a warning.
    pub fn resolve(&self, config: &TableConfig) -> Result<ResolvedTableConfig, ConfigError> {
        let mut columns = ColumnSpecs::new();
        for field in self.fields {
            let kind = match field.field_type {
                FieldType::Number => ColumnKind::NumericRange,
                FieldType::Date => ColumnKind::DateRange,
                FieldType::Text => ColumnKind::Text,
                FieldType::Other => continue,
            };
            columns.insert(
                field.name.clone(),
                ColumnFilterSpec {
                    kind,
                    searchable: true,
                    is_static: false,
                    initial_value: None,
                },
            );
        }

        for column in &config.columns {
            let Some(spec) = columns.get_mut(&column.data) else {
                tracing::warn!(target: targets::CONFIG, column = %column.data, "configured column has no filterable field, skipping");
                continue;
            };
            spec.searchable = column.searchable.unwrap_or(true);
            let Some(filter) = &column.filter else {
                continue;
            };
            match filter.filter_type.as_deref() {
                Some("selector") if spec.kind == ColumnKind::Text => spec.kind = ColumnKind::Selector,
                Some("selector") | Some("text") | Some("number") | Some("date") | None => {}
                Some(other) => {
                    tracing::warn!(target: targets::CONFIG, column = %column.data, filter_type = other, "unknown filter type ignored");
                }
            }
            spec.is_static = filter.is_static.unwrap_or(false);
            if spec.searchable {
                spec.initial_value = match &filter.value {
                    Some(value) => parse_initial_value(&column.data, spec.kind, value)?,
                    None => None,
                };
            }
        }

        let search = config.search.clone().unwrap_or_default();
        let resolved = ResolvedTableConfig {
            global_search: GlobalSearchDefaults {
                enabled: search.enabled.unwrap_or(true),
                default_text: search.value.unwrap_or_default(),
            },
            match_options: MatchOptions {
                lazy: config.lazy_filter.unwrap_or(false),
                strict: config.search_strict_match.unwrap_or(false),
            },
            apply_map: config.apply_map.unwrap_or(false),
            maximized: config.maximize.unwrap_or(false),
            filter_by_extent: config.filter_by_extent.unwrap_or(false),
            columns,
        };
        tracing::debug!(
            target: targets::CONFIG,
            columns = resolved.columns.len(),
            filter_by_extent = resolved.filter_by_extent,
            "table configuration resolved"
        );
        Ok(resolved)
    }
}

fn parse_initial_value(
    column: &str,
    kind: ColumnKind,
    value: &Value,
) -> Result<Option<ColumnFilterValue>, ConfigError> {
    let value = match (kind, value) {
        (_, Value::Null) => return Ok(None),
        (ColumnKind::Text, Value::String(s)) => ColumnFilterValue::text(s.clone()),
        (ColumnKind::Text, Value::Number(n)) => ColumnFilterValue::text(n.to_string()),
        (ColumnKind::NumericRange, Value::Number(n)) => {
            let n = n.as_f64();
            ColumnFilterValue::number_range(n, n)
        }
        (ColumnKind::NumericRange, Value::String(s)) => {
            let (min, max) = split_bounds(s);
            let parse = |part: &str| {
                part.parse::<f64>()
                    .map_err(|_| ConfigError::invalid_value(column, format!("'{part}' is not a number")))
            };
            ColumnFilterValue::number_range(
                min.map(parse).transpose()?,
                max.map(parse).transpose()?,
            )
        }
        (ColumnKind::DateRange, Value::String(s)) => {
            let (from, to) = split_bounds(s);
            let parse = |part: &str| {
                NaiveDate::parse_from_str(part, "%Y-%m-%d")
                    .map_err(|_| ConfigError::invalid_value(column, format!("'{part}' is not a YYYY-MM-DD date")))
            };
            ColumnFilterValue::date_range(
                from.map(parse).transpose()?,
                to.map(parse).transpose()?,
            )
        }
        (ColumnKind::Selector, Value::String(s)) => ColumnFilterValue::selector([s.clone()]),
        (ColumnKind::Selector, Value::Array(items)) => {
            let values = items
                .iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s.clone()),
                    Value::Number(n) => Ok(n.to_string()),
                    other => Err(ConfigError::invalid_value(column, format!("unsupported selector value {other}"))),
                })
                .collect::<Result<Vec<_>, _>>()?;
            ColumnFilterValue::selector(values)
        }
        (kind, other) => {
            return Err(ConfigError::invalid_value(
                column,
                format!("{other} is not a valid {kind:?} filter value"),
            ));
        }
    };
    Ok((!value.is_empty()).then_some(value))
}

/// Splits `"min,max"`; blank sides are open bounds.
fn split_bounds(s: &str) -> (Option<&str>, Option<&str>) {
    let (lo, hi) = s.split_once(',').unwrap_or((s, ""));
    fn side(part: &str) -> Option<&str> {
        let part = part.trim();
        (!part.is_empty()).then_some(part)
    }
    (side(lo), side(hi))
}
