//! Per-column filter values and how they match cell values.
//!
//! A column filter is stored as a plain [`ColumnFilterValue`] so it can be
//! snapshotted, compared and handed to the grid as its filter model. Matching
//! goes through a [`ColumnMatcher`], compiled once whenever the session's
//! filters change.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};

use chrono::NaiveDate;
use regex::Regex;
use serde::{Deserialize, Serialize};

use atlas_table_core::logging::targets;

use crate::row::FieldValue;

/// Identifier of a table column (the attribute name it displays).
pub type ColumnId = String;

/// Current value of every filtered column.
pub type ColumnFilters = BTreeMap<ColumnId, ColumnFilterValue>;

/// The kind of filter a column offers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ColumnKind {
    /// Free-text pattern.
    Text,
    /// Inclusive numeric bounds.
    NumericRange,
    /// Inclusive date bounds.
    DateRange,
    /// Pick-list of exact values.
    Selector,
}

/// The value of one column filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ColumnFilterValue {
    /// Text pattern; `*` is a wildcard unless lazy matching is on.
    Text { pattern: String },
    /// Inclusive numeric range; a missing bound is open.
    NumberRange { min: Option<f64>, max: Option<f64> },
    /// Inclusive date range; a missing bound is open.
    DateRange {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    /// Cell text must equal one of the values.
    Selector { values: Vec<String> },
}

impl ColumnFilterValue {
    /// Text filter shorthand.
    pub fn text(pattern: impl Into<String>) -> Self {
        Self::Text {
            pattern: pattern.into(),
        }
    }

    /// Numeric range shorthand.
    pub fn number_range(min: Option<f64>, max: Option<f64>) -> Self {
        Self::NumberRange { min, max }
    }

    /// Date range shorthand.
    pub fn date_range(from: Option<NaiveDate>, to: Option<NaiveDate>) -> Self {
        Self::DateRange { from, to }
    }

    /// Selector shorthand.
    pub fn selector<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Selector {
            values: values.into_iter().map(Into::into).collect(),
        }
    }

    /// The column kind this value applies to.
    pub fn kind(&self) -> ColumnKind {
        match self {
            Self::Text { .. } => ColumnKind::Text,
            Self::NumberRange { .. } => ColumnKind::NumericRange,
            Self::DateRange { .. } => ColumnKind::DateRange,
            Self::Selector { .. } => ColumnKind::Selector,
        }
    }

    /// Whether this value restricts nothing.
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Text { pattern } => pattern.is_empty(),
            Self::NumberRange { min, max } => min.is_none() && max.is_none(),
            Self::DateRange { from, to } => from.is_none() && to.is_none(),
            Self::Selector { values } => values.is_empty(),
        }
    }
}

/// Text comparison options taken from the table configuration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MatchOptions {
    /// Text filters match anywhere in the value and `*` is literal.
    pub lazy: bool,
    /// Compare text exactly: no case or accent folding.
    pub strict: bool,
}

/// Lowercases `s` and strips the common Latin accents.
pub fn fold_text(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars().flat_map(char::to_lowercase) {
        match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' => out.push('a'),
            'æ' => out.push_str("ae"),
            'ç' => out.push('c'),
            'è' | 'é' | 'ê' | 'ë' => out.push('e'),
            'ì' | 'í' | 'î' | 'ï' => out.push('i'),
            'ñ' => out.push('n'),
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' => out.push('o'),
            'œ' => out.push_str("oe"),
            'ù' | 'ú' | 'û' | 'ü' => out.push('u'),
            'ý' | 'ÿ' => out.push('y'),
            other => out.push(other),
        }
    }
    out
}

/// Applies the folding rules in `options` to `s`.
pub(crate) fn normalize<'a>(s: &'a str, options: MatchOptions) -> Cow<'a, str> {
    if options.strict {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(fold_text(s))
    }
}

/// A column filter compiled for repeated evaluation.
#[derive(Debug, Clone)]
pub(crate) enum ColumnMatcher {
    /// Restricts nothing.
    Any,
    /// Anchored wildcard pattern over normalized text.
    Pattern(Regex),
    /// Plain prefix over normalized text.
    Prefix(String),
    /// Substring over normalized text.
    Contains(String),
    /// Inclusive numeric bounds.
    Range { min: Option<f64>, max: Option<f64> },
    /// Inclusive date bounds.
    Dates {
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    },
    /// Membership ignoring case, as `UPPER(column) IN (...)` on the map.
    OneOf(HashSet<String>),
}

impl ColumnMatcher {
    pub(crate) fn compile(value: &ColumnFilterValue, options: MatchOptions) -> Self {
        if value.is_empty() {
            return Self::Any;
        }
        match value {
            ColumnFilterValue::Text { pattern } => {
                let pattern = normalize(pattern, options);
                if options.lazy {
                    return Self::Contains(pattern.into_owned());
                }
                if !pattern.contains('*') {
                    return Self::Prefix(pattern.into_owned());
                }
                let source = format!(
                    "^{}",
                    pattern
                        .split('*')
                        .map(regex::escape)
                        .collect::<Vec<_>>()
                        .join(".*")
                );
                match Regex::new(&source) {
                    Ok(re) => Self::Pattern(re),
                    Err(err) => {
                        tracing::warn!(target: targets::SESSION, %err, "wildcard pattern rejected, matching literally");
                        Self::Prefix(pattern.into_owned())
                    }
                }
            }
            ColumnFilterValue::NumberRange { min, max } => Self::Range {
                min: *min,
                max: *max,
            },
            ColumnFilterValue::DateRange { from, to } => Self::Dates {
                from: *from,
                to: *to,
            },
            ColumnFilterValue::Selector { values } => {
                Self::OneOf(values.iter().map(|value| value.to_uppercase()).collect())
            }
        }
    }

    pub(crate) fn matches(&self, value: Option<&FieldValue>, options: MatchOptions) -> bool {
        let value = match (self, value) {
            (Self::Any, _) => return true,
            (_, None) | (_, Some(FieldValue::Null)) => return false,
            (_, Some(value)) => value,
        };
        match self {
            Self::Any => true,
            Self::Pattern(re) => re.is_match(&normalize(&value.to_string(), options)),
            Self::Prefix(prefix) => normalize(&value.to_string(), options).starts_with(prefix.as_str()),
            Self::Contains(needle) => normalize(&value.to_string(), options).contains(needle.as_str()),
            Self::Range { min, max } => value.as_f64().is_some_and(|n| {
                min.is_none_or(|lo| n >= lo) && max.is_none_or(|hi| n <= hi)
            }),
            Self::Dates { from, to } => value.as_date().is_some_and(|d| {
                from.is_none_or(|lo| d >= lo) && to.is_none_or(|hi| d <= hi)
            }),
            Self::OneOf(values) => values.contains(&value.to_string().to_uppercase()),
        }
    }
}
