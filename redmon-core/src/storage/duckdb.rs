//! DuckDB row source.
//!
//! Runs diagnostic statements against an embedded DuckDB database. Useful
//! for dry runs against a snapshot of the warehouse system views exported to
//! a local file, and for integration tests.
//!
//! ```toml
//! [engine]
//! engine = "duckdb"
//! connection = ":memory:"  # Use ":memory:" for in-memory or file path
//! options = { threads = "2" }
//! ```

use crate::error::{Error, Result};
use crate::storage::{Row, RowSource, Value};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use duckdb::types::{TimeUnit, Value as DuckValue};
use duckdb::{Config, Connection};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;

/// DuckDB-backed row source.
#[derive(Clone)]
pub struct DuckDbRowSource {
    conn: Arc<Mutex<Connection>>,
}

impl DuckDbRowSource {
    /// Opens a database file, or an in-memory database for `:memory:`.
    pub fn new(connection_string: &str, options: &HashMap<String, String>) -> Result<Self> {
        let mut config = Config::default();
        if let Some(threads) = options.get("threads") {
            let threads: i64 = threads
                .parse()
                .map_err(|_| Error::Config(format!("Invalid duckdb threads option: {}", threads)))?;
            config = config.threads(threads)?;
        }

        let conn = if connection_string == ":memory:" {
            Connection::open_in_memory_with_flags(config)?
        } else {
            Connection::open_with_flags(connection_string, config)?
        };

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn new_in_memory() -> Result<Self> {
        Self::new(":memory:", &HashMap::new())
    }
}

fn timestamp_from(unit: TimeUnit, raw: i64) -> Option<DateTime<Utc>> {
    let micros = match unit {
        TimeUnit::Second => raw.checked_mul(1_000_000)?,
        TimeUnit::Millisecond => raw.checked_mul(1_000)?,
        TimeUnit::Microsecond => raw,
        TimeUnit::Nanosecond => raw / 1_000,
    };
    DateTime::from_timestamp_micros(micros)
}

fn convert(value: DuckValue) -> Value {
    match value {
        DuckValue::Null => Value::Null,
        DuckValue::Boolean(b) => Value::Bool(b),
        DuckValue::TinyInt(i) => Value::Int(i.into()),
        DuckValue::SmallInt(i) => Value::Int(i.into()),
        DuckValue::Int(i) => Value::Int(i.into()),
        DuckValue::BigInt(i) => Value::Int(i),
        DuckValue::HugeInt(i) => i64::try_from(i).map(Value::Int).unwrap_or(Value::Float(i as f64)),
        DuckValue::UTinyInt(i) => Value::Int(i.into()),
        DuckValue::USmallInt(i) => Value::Int(i.into()),
        DuckValue::UInt(i) => Value::Int(i.into()),
        DuckValue::UBigInt(i) => i64::try_from(i).map(Value::Int).unwrap_or(Value::Float(i as f64)),
        DuckValue::Float(f) => Value::Float(f.into()),
        DuckValue::Double(f) => Value::Float(f),
        DuckValue::Decimal(d) => d
            .to_string()
            .parse()
            .map(Value::Float)
            .unwrap_or(Value::Text(d.to_string())),
        DuckValue::Timestamp(unit, raw) => timestamp_from(unit, raw)
            .map(Value::Timestamp)
            .unwrap_or(Value::Null),
        DuckValue::Date32(days) => NaiveDate::from_num_days_from_ce_opt(days + 719_163)
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| Value::Timestamp(dt.and_utc()))
            .unwrap_or(Value::Null),
        DuckValue::Text(s) => Value::Text(s),
        DuckValue::Enum(s) => Value::Text(s),
        other => Value::Text(format!("{:?}", other)),
    }
}

#[async_trait]
impl RowSource for DuckDbRowSource {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(sql)?;
        let mut rows = stmt.query([])?;

        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            let width = row.as_ref().column_count();
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(convert(row.get::<_, DuckValue>(i)?));
            }
            out.push(Row::new(values));
        }

        Ok(out)
    }

    async fn execute_update(&self, sql: &str) -> Result<()> {
        let conn = self.conn.lock().await;
        conn.execute_batch(sql)?;
        Ok(())
    }
}
