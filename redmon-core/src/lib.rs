/*!
# redmon-core: metric aggregation for warehouse health monitoring

Turns the results of warehouse diagnostic queries into a uniform stream of
named, dimensioned, unit-tagged metrics.

## Components

### Metric model
- [`Metric`], [`Dimension`] and [`MetricUnit`], immutable once built
- a generic flat view for structured logs and a sink view for the
  monitoring backend

### Row sources
- the [`RowSource`] trait over a SQL connection
- ADBC, DuckDB and scripted in-memory backends
- strongly typed row shapes through [`storage::FromRow`]

### Aggregation
- table and schema statistics with warehouse-wide rollups
- workload queueing statistics per service class
- per-user query activity for grouped users

### Custom queries
- externally configured statements evaluated either for their scalar value
  or for their execution time

## Usage

```rust,no_run
use redmon_core::aggregation::gather_table_stats;
use redmon_core::storage::duckdb::DuckDbRowSource;
use redmon_core::Dimension;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let source = DuckDbRowSource::new_in_memory()?;
    let common = vec![Dimension::new("ClusterIdentifier", "analytics-prod")];

    for metric in gather_table_stats(&source, &common).await? {
        println!("{}", serde_json::to_string(&metric.to_sink_view())?);
    }
    Ok(())
}
```

Every call runs sequentially against a single row source; nothing is cached
or retried between runs.
*/

pub mod aggregation;
pub mod custom_query;
pub mod error;
pub mod metrics;
pub mod storage;

pub use custom_query::{run_custom_query, CustomQueryConfig, CustomQueryDescriptor, EvaluationMode};
pub use error::{Error, Result};
pub use metrics::{Dimension, DimensionValue, Metric, MetricUnit};
pub use storage::{Row, RowSource, Value};
