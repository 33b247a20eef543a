//! Destinations for the collected metric stream.

use async_trait::async_trait;
use redmon_core::{Dimension, Metric};
use std::fs::File;
use std::io::{BufWriter, Write};

use crate::config::SinkConfig;
use crate::error::{Error, Result};

#[async_trait]
pub trait MetricSink: Send {
    /// Hands over a batch of metrics, preserving their order.
    async fn publish(&mut self, metrics: &[Metric]) -> Result<()>;
}

/// Writes one structured `info` event per metric.
///
/// The metric time goes under `metric_timestamp`, leaving `timestamp` to the
/// log record itself. Dimensions are rendered as `Name=Value` pairs joined by
/// commas.
#[derive(Debug, Default)]
pub struct LogSink;

fn dimension_pairs(dimensions: &[Dimension]) -> String {
    dimensions
        .iter()
        .map(|d| format!("{}={}", d.name, d.value))
        .collect::<Vec<_>>()
        .join(",")
}

#[async_trait]
impl MetricSink for LogSink {
    async fn publish(&mut self, metrics: &[Metric]) -> Result<()> {
        for metric in metrics {
            let view = metric.to_generic_view();
            tracing::info!(
                statement_name = view.statement_name,
                value = view.value,
                unit = %view.unit,
                metric_timestamp = %view.timestamp.to_rfc3339(),
                dimensions = %dimension_pairs(view.dimensions),
                "metric"
            );
        }
        Ok(())
    }
}

/// One sink-view JSON object per line.
pub struct JsonLinesSink<W: Write + Send> {
    writer: W,
}

impl<W: Write + Send> JsonLinesSink<W> {
    pub fn new(writer: W) -> Self {
        Self { writer }
    }

    pub fn into_inner(self) -> W {
        self.writer
    }
}

impl JsonLinesSink<std::io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(std::io::stdout())
    }
}

impl JsonLinesSink<BufWriter<File>> {
    pub fn create(path: &std::path::Path) -> Result<Self> {
        Ok(Self::new(BufWriter::new(File::create(path)?)))
    }
}

#[async_trait]
impl<W: Write + Send> MetricSink for JsonLinesSink<W> {
    async fn publish(&mut self, metrics: &[Metric]) -> Result<()> {
        for metric in metrics {
            serde_json::to_writer(&mut self.writer, &metric.to_sink_view())?;
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()?;
        Ok(())
    }
}

pub fn build_sink(config: &SinkConfig) -> Result<Box<dyn MetricSink>> {
    match config.kind.to_ascii_lowercase().as_str() {
        "log" => Ok(Box::new(LogSink)),
        "stdout" => Ok(Box::new(JsonLinesSink::stdout())),
        "file" => {
            let path = config.path.as_ref().ok_or(Error::MissingSetting("sink.path"))?;
            Ok(Box::new(JsonLinesSink::create(path)?))
        }
        other => Err(Error::Unsupported {
            kind: "sink",
            value: other.to_string(),
        }),
    }
}
