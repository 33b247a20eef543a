//! Site-specific diagnostic queries.
//!
//! A descriptor either captures the scalar its statement returns
//! (`EvaluationMode::Query`) or reports how long the statement took
//! (`EvaluationMode::Duration`).

use chrono::Utc;
use serde::Deserialize;
use std::time::Instant;

use crate::error::{Error, Result};
use crate::metrics::{Dimension, Metric, MetricUnit};
use crate::storage::{inline_sql, RowSource};

/// A custom-query record as written in the configuration file.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CustomQueryConfig {
    pub name: Option<String>,
    pub unit: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub query: Option<String>,
    pub description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EvaluationMode {
    /// Report the returned scalar with the declared unit.
    Query,
    /// Report the execution time in milliseconds. Keeps the configured label.
    Duration(String),
}

impl EvaluationMode {
    /// `type` values capitalising to `Query` select value capture; any other
    /// value selects duration mode.
    pub fn from_type(raw: &str) -> Self {
        let label = capitalize(raw.trim());
        if label == "Query" {
            EvaluationMode::Query
        } else {
            EvaluationMode::Duration(label)
        }
    }
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CustomQueryDescriptor {
    name: String,
    unit: MetricUnit,
    mode: EvaluationMode,
    statement: String,
    description: String,
}

impl CustomQueryDescriptor {
    pub fn new(name: &str, unit: &str, kind: &str, statement: &str, description: Option<&str>) -> Self {
        let name = name.trim().to_string();
        let description = description
            .map(str::trim)
            .filter(|d| !d.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| name.clone());

        Self {
            unit: MetricUnit::normalize(unit),
            mode: EvaluationMode::from_type(kind),
            statement: statement.trim().to_string(),
            description,
            name,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit(&self) -> &MetricUnit {
        &self.unit
    }

    pub fn mode(&self) -> &EvaluationMode {
        &self.mode
    }

    pub fn statement(&self) -> &str {
        &self.statement
    }

    /// The statement on a single line, for logging.
    pub fn inline_statement(&self) -> String {
        inline_sql(&self.statement)
    }

    pub fn description(&self) -> &str {
        &self.description
    }
}

impl TryFrom<CustomQueryConfig> for CustomQueryDescriptor {
    type Error = Error;

    fn try_from(config: CustomQueryConfig) -> Result<Self> {
        let label = config.name.clone().unwrap_or_else(|| "<unnamed>".to_string());
        let required = |field: &str, value: &Option<String>| -> Result<String> {
            value
                .as_ref()
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty() || field == "unit")
                .ok_or_else(|| {
                    Error::Config(format!("custom query {} is missing required field `{}`", label, field))
                })
        };

        let name = required("name", &config.name)?;
        let unit = required("unit", &config.unit)?;
        let kind = required("type", &config.kind)?;
        let statement = required("query", &config.query)?;

        Ok(Self::new(&name, &unit, &kind, &statement, config.description.as_deref()))
    }
}

/// Executes one descriptor and builds its metric.
///
/// Returns `Ok(None)` with a warning when the statement yields no value.
pub async fn run_custom_query(
    source: &dyn RowSource,
    query: &CustomQueryDescriptor,
    common: &[Dimension],
) -> Result<Option<Metric>> {
    tracing::info!(query = query.name(), statement = %query.inline_statement(), "Running query");

    let started_at = Utc::now();
    let timer = Instant::now();
    let value = source.fetch_scalar(query.statement()).await?;
    let elapsed_ms = timer.elapsed().as_secs_f64() * 1000.0;

    let Some(value) = value else {
        tracing::warn!(query = query.name(), "Query had nothing to report value=None");
        return Ok(None);
    };

    let metric = match query.mode() {
        EvaluationMode::Query => {
            let number = value.as_f64().ok_or_else(|| Error::RowShape {
                query: "CustomQuery",
                column: 0,
                detail: format!("of {} is not numeric: {:?}", query.name(), value),
            })?;
            Metric::new(query.name(), number, started_at, query.unit().clone(), common.to_vec())
        }
        EvaluationMode::Duration(label) => {
            tracing::debug!(query = query.name(), mode = %label, elapsed_ms, "Measured query duration");
            Metric::new(
                query.name(),
                elapsed_ms,
                started_at,
                MetricUnit::Milliseconds,
                common.to_vec(),
            )
        }
    };

    Ok(Some(metric))
}
