//! ADBC (Arrow Database Connectivity) row source.
//!
//! This is the production path to the warehouse: its PostgreSQL-compatible
//! endpoint is reached through the ADBC PostgreSQL driver, loaded dynamically
//! through the driver manager.
//!
//! ```toml
//! [engine]
//! engine = "adbc"
//! driver_path = "/usr/local/lib/libadbc_driver_postgresql.so"
//! ```
//!
//! The connection URI carries host, port and database only. Credentials are
//! set as database options so they never appear in the URI.
//!
//! Results arrive as Arrow record batches and are flattened into positional
//! rows.

use adbc_core::{
    driver_manager::{ManagedConnection, ManagedDriver},
    options::{AdbcVersion, OptionDatabase, OptionValue},
    Connection, Database, Driver, Optionable, Statement,
};
use arrow_array::cast::AsArray;
use arrow_array::types::{
    Date32Type, Decimal128Type, Float32Type, Float64Type, Int16Type, Int32Type, Int64Type,
    Int8Type, TimestampMicrosecondType, TimestampMillisecondType, TimestampNanosecondType,
    TimestampSecondType, UInt16Type, UInt32Type, UInt64Type, UInt8Type,
};
use arrow_array::{Array, ArrayRef, RecordBatch};
use arrow_schema::{DataType, TimeUnit};
use async_trait::async_trait;
use chrono::DateTime;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::error::{Error, Result};
use crate::storage::{Row, RowSource, Value};

const MICROS_PER_DAY: i64 = 86_400_000_000;

/// Authentication credentials for the warehouse session.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

pub struct AdbcRowSource {
    conn: Arc<Mutex<ManagedConnection>>,
}

impl AdbcRowSource {
    pub fn new(driver_path: &str, uri: &str, credentials: Option<&Credentials>) -> Result<Self> {
        let mut driver = ManagedDriver::load_dynamic_from_filename(driver_path, None, AdbcVersion::V100)
            .map_err(|e| Error::row_source("adbc", format!("Failed to load ADBC driver: {}", e)))?;

        let mut database = driver
            .new_database()
            .map_err(|e| Error::row_source("adbc", format!("Failed to create database: {}", e)))?;

        database
            .set_option(OptionDatabase::Uri, OptionValue::String(uri.to_string()))
            .map_err(|e| Error::row_source("adbc", format!("Failed to set connection string: {}", e)))?;

        if let Some(creds) = credentials {
            database
                .set_option(OptionDatabase::Username, OptionValue::String(creds.username.clone()))
                .map_err(|e| Error::row_source("adbc", format!("Failed to set username: {}", e)))?;

            database
                .set_option(OptionDatabase::Password, OptionValue::String(creds.password.clone()))
                .map_err(|e| Error::row_source("adbc", format!("Failed to set password: {}", e)))?;
        }

        let connection = database
            .new_connection()
            .map_err(|e| Error::row_source("adbc", format!("Failed to create connection: {}", e)))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(connection)),
        })
    }
}

fn timestamp_cell(array: &ArrayRef, idx: usize, unit: &TimeUnit) -> Value {
    let micros = match unit {
        TimeUnit::Second => array.as_primitive::<TimestampSecondType>().value(idx).checked_mul(1_000_000),
        TimeUnit::Millisecond => array.as_primitive::<TimestampMillisecondType>().value(idx).checked_mul(1_000),
        TimeUnit::Microsecond => Some(array.as_primitive::<TimestampMicrosecondType>().value(idx)),
        TimeUnit::Nanosecond => Some(array.as_primitive::<TimestampNanosecondType>().value(idx) / 1_000),
    };
    micros
        .and_then(DateTime::from_timestamp_micros)
        .map(Value::Timestamp)
        .unwrap_or(Value::Null)
}

fn unsigned(v: u64) -> Value {
    i64::try_from(v).map(Value::Int).unwrap_or(Value::Float(v as f64))
}

/// Converts one Arrow cell into a row value.
fn cell(array: &ArrayRef, idx: usize) -> Result<Value> {
    if array.is_null(idx) {
        return Ok(Value::Null);
    }

    let value = match array.data_type() {
        DataType::Boolean => Value::Bool(array.as_boolean().value(idx)),
        DataType::Int8 => Value::Int(array.as_primitive::<Int8Type>().value(idx).into()),
        DataType::Int16 => Value::Int(array.as_primitive::<Int16Type>().value(idx).into()),
        DataType::Int32 => Value::Int(array.as_primitive::<Int32Type>().value(idx).into()),
        DataType::Int64 => Value::Int(array.as_primitive::<Int64Type>().value(idx)),
        DataType::UInt8 => unsigned(array.as_primitive::<UInt8Type>().value(idx).into()),
        DataType::UInt16 => unsigned(array.as_primitive::<UInt16Type>().value(idx).into()),
        DataType::UInt32 => unsigned(array.as_primitive::<UInt32Type>().value(idx).into()),
        DataType::UInt64 => unsigned(array.as_primitive::<UInt64Type>().value(idx)),
        DataType::Float32 => Value::Float(array.as_primitive::<Float32Type>().value(idx).into()),
        DataType::Float64 => Value::Float(array.as_primitive::<Float64Type>().value(idx)),
        DataType::Decimal128(_, scale) => {
            let raw = array.as_primitive::<Decimal128Type>().value(idx);
            Value::Float(raw as f64 / 10f64.powi(i32::from(*scale)))
        }
        DataType::Utf8 => Value::Text(array.as_string::<i32>().value(idx).to_string()),
        DataType::LargeUtf8 => Value::Text(array.as_string::<i64>().value(idx).to_string()),
        DataType::Timestamp(unit, _) => timestamp_cell(array, idx, unit),
        DataType::Date32 => {
            let days = i64::from(array.as_primitive::<Date32Type>().value(idx));
            DateTime::from_timestamp_micros(days * MICROS_PER_DAY)
                .map(Value::Timestamp)
                .unwrap_or(Value::Null)
        }
        other => {
            return Err(Error::row_source("adbc", format!("Unsupported column type: {}", other)));
        }
    };

    Ok(value)
}

/// Flattens a record batch into positional rows.
fn batch_rows(batch: &RecordBatch) -> Result<Vec<Row>> {
    let mut rows = Vec::with_capacity(batch.num_rows());
    for i in 0..batch.num_rows() {
        let values = batch
            .columns()
            .iter()
            .map(|col| cell(col, i))
            .collect::<Result<Vec<_>>>()?;
        rows.push(Row::new(values));
    }
    Ok(rows)
}

#[async_trait]
impl RowSource for AdbcRowSource {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        let mut conn = self.conn.lock().await;
        let mut stmt = conn
            .new_statement()
            .map_err(|e| Error::row_source("adbc", format!("Failed to create statement: {}", e)))?;

        stmt.set_sql_query(sql)
            .map_err(|e| Error::row_source("adbc", format!("Failed to set query: {}", e)))?;

        let reader = stmt
            .execute()
            .map_err(|e| Error::row_source("adbc", format!("Failed to execute query: {}", e)))?;

        let mut rows = Vec::new();
        for batch in reader {
            let batch = batch?;
            rows.extend(batch_rows(&batch)?);
        }

        Ok(rows)
    }

    async fn execute_update(&self, sql: &str) -> Result<()> {
        let mut conn = self.conn.lock().await;
        let mut stmt = conn
            .new_statement()
            .map_err(|e| Error::row_source("adbc", format!("Failed to create statement: {}", e)))?;

        stmt.set_sql_query(sql)
            .map_err(|e| Error::row_source("adbc", format!("Failed to set query: {}", e)))?;

        stmt.execute_update()
            .map_err(|e| Error::row_source("adbc", format!("Failed to execute statement: {}", e)))?;

        Ok(())
    }
}
