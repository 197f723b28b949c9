use thiserror::Error;

/// Core error type shared across starschema crates.
#[derive(Debug, Error)]
pub enum Error {
    /// An expected entity or dimension table is absent from the input set.
    #[error("missing input table: {table}")]
    MissingTable { table: String },
    /// An expected column is absent from a table.
    #[error("missing input column: {table}.{column}")]
    MissingColumn { table: String, column: String },
    /// The table violates a structural or warehouse invariant.
    #[error("invalid table: {0}")]
    InvalidTable(String),
    /// Catch-all error for unexpected failures.
    #[error("other error: {0}")]
    Other(String),
}

impl Error {
    pub fn missing_table(table: impl Into<String>) -> Self {
        Error::MissingTable {
            table: table.into(),
        }
    }

    pub fn missing_column(table: impl Into<String>, column: impl Into<String>) -> Self {
        Error::MissingColumn {
            table: table.into(),
            column: column.into(),
        }
    }
}

/// Convenience alias for results returned by starschema crates.
pub type Result<T> = std::result::Result<T, Error>;
