//! Table and schema statistics rollup over `svv_table_info`.
//!
//! One pass over the per-table rows produces:
//! - `TableSize`/`TableRows` per table,
//! - `SchemaSize`/`SchemaRows` per schema, in first-seen order,
//! - ten warehouse-wide metrics from running accumulators.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::metrics::{with_common, Dimension, Metric, MetricUnit};
use crate::storage::{query_as, FromRow, Row, RowSource};

pub const TABLE_STATS_SQL: &str = r#"
    SELECT DISTINCT
        "schema" || '.' || "table" AS fqdn_table,
        "schema" AS schema_name,
        encoded,
        max_varchar,
        unsorted,
        stats_off,
        tbl_rows,
        skew_sortkey1,
        skew_rows,
        size
    FROM svv_table_info
"#;

/// Tables whose statistics staleness exceeds this are counted as stale.
pub const STATS_OFF_THRESHOLD: f64 = 5.0;

/// One row of `svv_table_info`.
#[derive(Debug, Clone, PartialEq)]
pub struct TableInfoRow {
    pub fqdn_table: String,
    pub schema_name: String,
    pub encoded: Option<String>,
    pub max_varchar: Option<f64>,
    pub unsorted: Option<f64>,
    pub stats_off: Option<f64>,
    pub tbl_rows: Option<f64>,
    pub skew_sortkey1: Option<f64>,
    pub skew_rows: Option<f64>,
    pub size: Option<f64>,
}

impl FromRow for TableInfoRow {
    const QUERY: &'static str = "TableStats";

    fn from_row(row: &Row) -> Result<Self> {
        let r = row.reader(Self::QUERY);
        Ok(Self {
            fqdn_table: r.text(0)?,
            schema_name: r.text(1)?,
            encoded: r.opt_text(2)?,
            max_varchar: r.opt_f64(3)?,
            unsorted: r.opt_f64(4)?,
            stats_off: r.opt_f64(5)?,
            tbl_rows: r.opt_f64(6)?,
            skew_sortkey1: r.opt_f64(7)?,
            skew_rows: r.opt_f64(8)?,
            size: r.opt_f64(9)?,
        })
    }
}

/// Running maximum and mean over the rows that reported a value.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct RunningRatio {
    max: f64,
    sum: f64,
    count: u64,
}

impl RunningRatio {
    fn observe(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            if v > self.max {
                self.max = v;
            }
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.sum / self.count as f64
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
struct SchemaTotals {
    rows: f64,
    size: f64,
}

/// Warehouse-wide accumulators for one table statistics pass.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableStatsSummary {
    pub tables: u64,
    pub tables_not_compressed: u64,
    pub tables_stats_off: u64,
    pub total_rows: f64,
    pub max_varchar_size: f64,
    pub max_unsorted_pct: f64,
    skew_rows: RunningRatio,
    skew_sortkey: RunningRatio,
}

impl TableStatsSummary {
    fn observe(&mut self, row: &TableInfoRow) {
        self.tables += 1;

        if row.encoded.as_deref() == Some("N") {
            self.tables_not_compressed += 1;
        }

        self.skew_rows.observe(row.skew_rows);
        self.skew_sortkey.observe(row.skew_sortkey1);

        if row.stats_off.is_some_and(|s| s > STATS_OFF_THRESHOLD) {
            self.tables_stats_off += 1;
        }

        // Width of the widest VARCHAR column.
        if let Some(width) = row.max_varchar {
            if width > self.max_varchar_size {
                self.max_varchar_size = width;
            }
        }

        if let Some(unsorted) = row.unsorted {
            if unsorted > self.max_unsorted_pct {
                self.max_unsorted_pct = unsorted;
            }
        }

        if let Some(rows) = row.tbl_rows {
            self.total_rows += rows;
        }
    }

    pub fn max_skew_ratio(&self) -> f64 {
        self.skew_rows.max
    }

    pub fn avg_skew_ratio(&self) -> f64 {
        self.skew_rows.mean()
    }

    pub fn max_skew_sort_ratio(&self) -> f64 {
        self.skew_sortkey.max
    }

    pub fn avg_skew_sort_ratio(&self) -> f64 {
        self.skew_sortkey.mean()
    }

    fn into_metrics(self, now: DateTime<Utc>, common: &[Dimension]) -> Vec<Metric> {
        let global = |name: &str, value: f64, unit: MetricUnit| {
            Metric::new(name, value, now, unit, common.to_vec())
        };

        vec![
            global("TablesNotCompressed", self.tables_not_compressed as f64, MetricUnit::Count),
            global("MaxSkewRatio", self.max_skew_ratio(), MetricUnit::Percent),
            global("MaxSkewSortRatio", self.max_skew_sort_ratio(), MetricUnit::Percent),
            global("AvgSkewRatio", self.avg_skew_ratio(), MetricUnit::Percent),
            global("AvgSkewSortRatio", self.avg_skew_sort_ratio(), MetricUnit::Percent),
            global("Tables", self.tables as f64, MetricUnit::Count),
            global("Rows", self.total_rows, MetricUnit::Count),
            global("TablesStatsOff", self.tables_stats_off as f64, MetricUnit::Count),
            global("MaxVarcharSize", self.max_varchar_size, MetricUnit::None),
            global("MaxUnsorted", self.max_unsorted_pct, MetricUnit::Percent),
        ]
    }
}

/// Builds table, schema and warehouse-wide metrics from decoded rows.
pub fn table_stats_metrics(rows: &[TableInfoRow], now: DateTime<Utc>, common: &[Dimension]) -> Vec<Metric> {
    let mut metrics = Vec::with_capacity(rows.len() * 2 + 10);
    let mut summary = TableStatsSummary::default();

    let mut schema_order: Vec<&str> = Vec::new();
    let mut schemas: HashMap<&str, SchemaTotals> = HashMap::new();

    for row in rows {
        summary.observe(row);

        // Null sizes and row counts count as zero.
        let size = row.size.unwrap_or(0.0);
        let tbl_rows = row.tbl_rows.unwrap_or(0.0);

        let totals = schemas.entry(row.schema_name.as_str()).or_insert_with(|| {
            schema_order.push(row.schema_name.as_str());
            SchemaTotals::default()
        });
        totals.rows += tbl_rows;
        totals.size += size;

        let dims = with_common(
            vec![
                Dimension::new("SchemaName", row.schema_name.as_str()),
                Dimension::new("TableName", row.fqdn_table.as_str()),
            ],
            common,
        );
        metrics.push(Metric::new("TableSize", size, now, MetricUnit::Megabytes, dims.clone()));
        metrics.push(Metric::new("TableRows", tbl_rows, now, MetricUnit::Count, dims));
    }

    for schema in schema_order {
        let totals = schemas[schema];
        let dims = with_common(vec![Dimension::new("SchemaName", schema)], common);
        metrics.push(Metric::new("SchemaSize", totals.size, now, MetricUnit::Megabytes, dims.clone()));
        metrics.push(Metric::new("SchemaRows", totals.rows, now, MetricUnit::Count, dims));
    }

    metrics.extend(summary.into_metrics(now, common));
    metrics
}

/// Runs the table statistics query and rolls it up.
pub async fn gather_table_stats(source: &dyn RowSource, common: &[Dimension]) -> Result<Vec<Metric>> {
    let now = Utc::now();
    let rows: Vec<TableInfoRow> = query_as(source, TABLE_STATS_SQL).await?;
    tracing::debug!(tables = rows.len(), "Table statistics fetched");
    Ok(table_stats_metrics(&rows, now, common))
}
