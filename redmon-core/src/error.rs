use thiserror::Error;

/// Errors raised by the aggregation engine and its row sources.
#[derive(Debug, Error)]
pub enum Error {
    /// A custom-query descriptor is malformed.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Executing a statement against the warehouse failed.
    #[error("Row source error ({query}): {message}")]
    RowSource { query: String, message: String },

    /// A result row does not have the shape its query promises.
    #[error("Unexpected row shape for {query}: column {column} {detail}")]
    RowShape {
        query: &'static str,
        column: usize,
        detail: String,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub fn row_source(query: impl Into<String>, message: impl ToString) -> Self {
        Error::RowSource {
            query: query.into(),
            message: message.to_string(),
        }
    }
}

impl From<duckdb::Error> for Error {
    fn from(err: duckdb::Error) -> Self {
        Error::row_source("duckdb", err)
    }
}

impl From<adbc_core::error::Error> for Error {
    fn from(err: adbc_core::error::Error) -> Self {
        Error::row_source("adbc", err)
    }
}

impl From<arrow_schema::ArrowError> for Error {
    fn from(err: arrow_schema::ArrowError) -> Self {
        Error::row_source("arrow", err)
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Serialization(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
