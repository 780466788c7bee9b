//! Error types for the table engine.

use crate::column::ColumnKind;

/// Result type alias for table operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while opening or driving a table.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The table configuration could not be resolved.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A filter edit was rejected.
    #[error(transparent)]
    Filter(#[from] FilterError),

    /// A table with this id is already registered.
    #[error("Table '{0}' is already open")]
    TableAlreadyOpen(String),

    /// No table with this id is registered.
    #[error("Table '{0}' is not open")]
    TableNotOpen(String),
}

/// Errors raised while reading a table configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration is not valid JSON for the expected shape.
    #[error("Invalid table configuration: {0}")]
    Json(#[from] serde_json::Error),

    /// A column's configured initial filter value cannot be used.
    #[error("Invalid initial filter for column '{column}': {message}")]
    InvalidFilterValue { column: String, message: String },
}

impl ConfigError {
    /// Create an invalid initial value error.
    pub fn invalid_value(column: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFilterValue {
            column: column.into(),
            message: message.into(),
        }
    }
}

/// Filter edits rejected before they reach the session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// The column has no filter.
    #[error("Column '{0}' is not filterable")]
    UnknownColumn(String),

    /// The column's filter is fixed by configuration.
    #[error("Column '{0}' has a static filter")]
    StaticColumn(String),

    /// The value does not fit the column's filter kind.
    #[error("Column '{column}' expects a {expected:?} filter, got {found:?}")]
    KindMismatch {
        column: String,
        expected: ColumnKind,
        found: ColumnKind,
    },

    /// Global search is turned off for this table.
    #[error("Global search is disabled for this table")]
    SearchDisabled,

    /// The table was not opened with extent filtering.
    #[error("Extent filtering is not configured for this table")]
    ExtentUnavailable,
}

/// Failures of the spatial filter provider.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LookupError {
    /// The provider rejected or failed the query.
    #[error("Spatial filter lookup failed: {0}")]
    Provider(String),

    /// The lookup was abandoned before it resolved.
    #[error("Spatial filter lookup was cancelled")]
    Cancelled,
}
