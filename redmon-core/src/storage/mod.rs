//! Row sources for diagnostic queries.
//!
//! This module provides the seam between the aggregation engine and the
//! warehouse connection:
//! - `adbc`: Arrow Database Connectivity, used to reach the warehouse through
//!   its PostgreSQL-compatible driver
//! - `duckdb`: embedded DuckDB, for local dry runs against tables that mimic
//!   the system views
//! - `memory`: scripted answers keyed by a SQL marker, for tests
//!
//! Each backend implements the `RowSource` trait. Result rows are addressed
//! positionally; transformers turn them into typed shapes through `FromRow`.

pub mod adbc;
pub mod duckdb;
pub mod memory;

use crate::error::{Error, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// A single cell of a result row.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Timestamp(DateTime<Utc>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Numeric view of the cell. Text is parsed, which covers drivers that
    /// hand NUMERIC columns back as strings.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Int(i) => Some(*i as f64),
            Value::Float(f) => Some(*f),
            Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            Value::Text(s) => s.trim().parse().ok(),
            Value::Null | Value::Timestamp(_) => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            Value::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            Value::Text(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Timestamp(_) => "timestamp",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::Timestamp(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// An ordered result row.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Row {
    values: Vec<Value>,
}

impl Row {
    pub fn new(values: Vec<Value>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }

    /// Starts typed extraction for the named query.
    pub fn reader(&self, query: &'static str) -> RowReader<'_> {
        RowReader { row: self, query }
    }
}

impl From<Vec<Value>> for Row {
    fn from(values: Vec<Value>) -> Self {
        Row::new(values)
    }
}

/// Positional, typed access to a row that reports schema drift as
/// `Error::RowShape`.
pub struct RowReader<'a> {
    row: &'a Row,
    query: &'static str,
}

impl<'a> RowReader<'a> {
    fn cell(&self, column: usize) -> Result<&'a Value> {
        self.row.get(column).ok_or_else(|| Error::RowShape {
            query: self.query,
            column,
            detail: format!("is missing (row has {} columns)", self.row.len()),
        })
    }

    fn mismatch(&self, column: usize, expected: &str, found: &Value) -> Error {
        Error::RowShape {
            query: self.query,
            column,
            detail: format!("expected {}, found {}", expected, found.type_name()),
        }
    }

    pub fn text(&self, column: usize) -> Result<String> {
        self.opt_text(column)?
            .ok_or_else(|| self.mismatch(column, "text", &Value::Null))
    }

    pub fn opt_text(&self, column: usize) -> Result<Option<String>> {
        match self.cell(column)? {
            Value::Null => Ok(None),
            Value::Text(s) => Ok(Some(s.trim_end().to_string())),
            Value::Int(i) => Ok(Some(i.to_string())),
            other => Err(self.mismatch(column, "text", other)),
        }
    }

    pub fn opt_f64(&self, column: usize) -> Result<Option<f64>> {
        let cell = self.cell(column)?;
        if cell.is_null() {
            return Ok(None);
        }
        cell.as_f64()
            .map(Some)
            .ok_or_else(|| self.mismatch(column, "number", cell))
    }

    pub fn f64(&self, column: usize) -> Result<f64> {
        self.opt_f64(column)?
            .ok_or_else(|| self.mismatch(column, "number", &Value::Null))
    }

    pub fn i64(&self, column: usize) -> Result<i64> {
        let cell = self.cell(column)?;
        cell.as_i64()
            .ok_or_else(|| self.mismatch(column, "integer", cell))
    }

    pub fn timestamp(&self, column: usize) -> Result<DateTime<Utc>> {
        match self.cell(column)? {
            Value::Timestamp(ts) => Ok(*ts),
            Value::Text(s) => DateTime::parse_from_rfc3339(s.trim())
                .map(|ts| ts.with_timezone(&Utc))
                .map_err(|_| self.mismatch(column, "timestamp", &Value::Text(s.clone()))),
            other => Err(self.mismatch(column, "timestamp", other)),
        }
    }
}

/// A strongly typed result row for one diagnostic query.
pub trait FromRow: Sized {
    /// Label used in logs and shape errors.
    const QUERY: &'static str;

    fn from_row(row: &Row) -> Result<Self>;
}

/// Decodes every row of a result set into its typed shape.
pub fn decode_rows<T: FromRow>(rows: &[Row]) -> Result<Vec<T>> {
    rows.iter().map(T::from_row).collect()
}

/// Flattens a statement onto one line for logging. Only line breaks are
/// replaced; spacing inside literals is kept.
pub fn inline_sql(sql: &str) -> String {
    sql.replace("\r\n", " ").replace('\n', " ")
}

/// Connection capable of executing SQL and returning ordered rows.
///
/// Calls block until the warehouse answers; there is no timeout or retry.
/// A source is owned by a single run and never used concurrently.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RowSource: Send + Sync {
    /// Executes a query and returns all result rows.
    async fn execute(&self, sql: &str) -> Result<Vec<Row>>;

    /// Executes a statement that returns no rows, such as `SET`.
    async fn execute_update(&self, sql: &str) -> Result<()>;

    /// Executes a query and returns the first column of the first row.
    /// `None` when the result is empty or the cell is null.
    async fn fetch_scalar(&self, sql: &str) -> Result<Option<Value>> {
        let rows = self.execute(sql).await?;
        Ok(rows
            .into_iter()
            .next()
            .and_then(|row| row.into_values().into_iter().next())
            .filter(|value| !value.is_null()))
    }
}

/// Runs a query whose rows decode into `T`, logging it first.
pub async fn query_as<T: FromRow>(source: &dyn RowSource, sql: &str) -> Result<Vec<T>> {
    tracing::info!(query = T::QUERY, statement = %inline_sql(sql), "Running query");
    let rows = source.execute(sql).await?;
    decode_rows(&rows)
}
