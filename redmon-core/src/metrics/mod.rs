mod unit;

pub use unit::MetricUnit;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt::{Display, Formatter};

/// Value half of a dimension pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum DimensionValue {
    Text(String),
    Integer(i64),
    Float(f64),
}

impl Display for DimensionValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            DimensionValue::Text(s) => f.write_str(s),
            DimensionValue::Integer(i) => write!(f, "{}", i),
            DimensionValue::Float(v) => write!(f, "{}", v),
        }
    }
}

impl From<&str> for DimensionValue {
    fn from(value: &str) -> Self {
        DimensionValue::Text(value.to_string())
    }
}

impl From<String> for DimensionValue {
    fn from(value: String) -> Self {
        DimensionValue::Text(value)
    }
}

impl From<i64> for DimensionValue {
    fn from(value: i64) -> Self {
        DimensionValue::Integer(value)
    }
}

impl From<f64> for DimensionValue {
    fn from(value: f64) -> Self {
        DimensionValue::Float(value)
    }
}

/// A name/value pair qualifying a metric.
///
/// Dimension lists keep insertion order and may contain duplicates.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Dimension {
    pub name: String,
    pub value: DimensionValue,
}

impl Dimension {
    pub fn new(name: impl Into<String>, value: impl Into<DimensionValue>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn to_sink_view(&self) -> SinkDimension<'_> {
        SinkDimension {
            name: &self.name,
            value: &self.value,
        }
    }
}

/// Concatenates locally derived dimensions with the caller's common ones.
pub fn with_common(local: Vec<Dimension>, common: &[Dimension]) -> Vec<Dimension> {
    let mut dimensions = local;
    dimensions.extend_from_slice(common);
    dimensions
}

/// A single named, dimensioned, timestamped measurement.
///
/// Fields are private; a metric cannot change once built.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    name: String,
    value: f64,
    timestamp: DateTime<Utc>,
    unit: MetricUnit,
    dimensions: Vec<Dimension>,
}

impl Metric {
    pub fn new(
        name: impl Into<String>,
        value: f64,
        timestamp: DateTime<Utc>,
        unit: impl Into<MetricUnit>,
        dimensions: Vec<Dimension>,
    ) -> Self {
        Self {
            name: name.into(),
            value,
            timestamp,
            unit: unit.into(),
            dimensions,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    pub fn unit(&self) -> &MetricUnit {
        &self.unit
    }

    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Looks up the first dimension with the given name.
    pub fn dimension(&self, name: &str) -> Option<&DimensionValue> {
        self.dimensions
            .iter()
            .find(|d| d.name == name)
            .map(|d| &d.value)
    }

    /// Flat record suitable for merging into a structured log event.
    ///
    /// The metric name is exposed as `statement_name` because `name` is
    /// reserved by most log record formats.
    pub fn to_generic_view(&self) -> GenericView<'_> {
        GenericView {
            statement_name: &self.name,
            value: self.value,
            timestamp: self.timestamp,
            unit: &self.unit,
            dimensions: &self.dimensions,
        }
    }

    /// Record in the shape the metric sink consumes. `Unit` is left out for
    /// unitless metrics.
    pub fn to_sink_view(&self) -> SinkView<'_> {
        SinkView {
            metric_name: &self.name,
            dimensions: self.dimensions.iter().map(Dimension::to_sink_view).collect(),
            timestamp: self.timestamp,
            value: self.value,
            unit: if self.unit.is_none() {
                None
            } else {
                Some(self.unit.as_str())
            },
        }
    }
}

#[derive(Debug, Serialize)]
pub struct GenericView<'a> {
    pub statement_name: &'a str,
    pub value: f64,
    pub timestamp: DateTime<Utc>,
    pub unit: &'a MetricUnit,
    pub dimensions: &'a [Dimension],
}

#[derive(Debug, Serialize)]
pub struct SinkDimension<'a> {
    #[serde(rename = "Name")]
    pub name: &'a str,
    #[serde(rename = "Value")]
    pub value: &'a DimensionValue,
}

#[derive(Debug, Serialize)]
pub struct SinkView<'a> {
    #[serde(rename = "MetricName")]
    pub metric_name: &'a str,
    #[serde(rename = "Dimensions")]
    pub dimensions: Vec<SinkDimension<'a>>,
    #[serde(rename = "Timestamp")]
    pub timestamp: DateTime<Utc>,
    #[serde(rename = "Value")]
    pub value: f64,
    #[serde(rename = "Unit", skip_serializing_if = "Option::is_none")]
    pub unit: Option<&'a str>,
}
