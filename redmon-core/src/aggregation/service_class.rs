//! Workload management queueing statistics.
//!
//! Each (hour, service class) row becomes five metrics stamped with the hour
//! bucket itself, so late runs still attribute load to the right hour.

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::metrics::{with_common, Dimension, Metric, MetricUnit};
use crate::storage::{query_as, FromRow, Row, RowSource};

/// Last two hours, user-defined service classes only (ids above 5).
pub const SERVICE_CLASS_SQL: &str = r#"
    SELECT DATE_TRUNC('hour', a.service_class_start_time)          AS metrics_ts,
           TRIM(d.name)                                            AS service_class,
           COUNT(a.query)                                          AS query_count,
           SUM(a.total_exec_time)                                  AS sum_exec_time,
           SUM(CASE WHEN a.total_queue_time > 0 THEN 1 ELSE 0 END) AS count_queued_queries,
           SUM(a.total_queue_time)                                 AS sum_queue_time,
           COUNT(c.is_diskbased)                                   AS count_diskbased_segments
    FROM stl_wlm_query a
             JOIN stv_wlm_classification_config b ON a.service_class = b.action_service_class
             LEFT OUTER JOIN (SELECT query, SUM(CASE WHEN is_diskbased = 't' THEN 1 ELSE 0 END) is_diskbased
                              FROM svl_query_summary
                              GROUP BY query) c ON a.query = c.query
             JOIN stv_wlm_service_class_config d ON a.service_class = d.service_class
    WHERE a.service_class > 5
      AND a.service_class_start_time > DATEADD(hour, -2, current_date)
    GROUP BY DATE_TRUNC('hour', a.service_class_start_time),
             d.name
"#;

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceClassRow {
    pub metrics_ts: DateTime<Utc>,
    pub service_class: String,
    pub query_count: f64,
    pub sum_exec_time: f64,
    pub count_queued_queries: f64,
    pub sum_queue_time: f64,
    pub count_diskbased_segments: f64,
}

impl FromRow for ServiceClassRow {
    const QUERY: &'static str = "WLM";

    fn from_row(row: &Row) -> Result<Self> {
        let r = row.reader(Self::QUERY);
        Ok(Self {
            metrics_ts: r.timestamp(0)?,
            service_class: r.text(1)?,
            query_count: r.f64(2)?,
            sum_exec_time: r.opt_f64(3)?.unwrap_or(0.0),
            count_queued_queries: r.opt_f64(4)?.unwrap_or(0.0),
            sum_queue_time: r.opt_f64(5)?.unwrap_or(0.0),
            count_diskbased_segments: r.opt_f64(6)?.unwrap_or(0.0),
        })
    }
}

impl ServiceClassRow {
    fn into_metrics(self, common: &[Dimension]) -> [Metric; 5] {
        let dims = with_common(vec![Dimension::new("ServiceClassID", self.service_class)], common);
        let ts = self.metrics_ts;
        let metric = |name: &str, value: f64| Metric::new(name, value, ts, MetricUnit::Count, dims.clone());

        [
            metric("ServiceClass-Queued", self.count_queued_queries),
            metric("ServiceClass-QueueTime", self.sum_queue_time),
            metric("ServiceClass-Executed", self.query_count),
            metric("ServiceClass-ExecTime", self.sum_exec_time),
            metric("ServiceClass-DiskbasedQuerySegments", self.count_diskbased_segments),
        ]
    }
}

pub fn service_class_metrics(rows: Vec<ServiceClassRow>, common: &[Dimension]) -> Vec<Metric> {
    rows.into_iter().flat_map(|row| row.into_metrics(common)).collect()
}

pub async fn gather_service_class_stats(source: &dyn RowSource, common: &[Dimension]) -> Result<Vec<Metric>> {
    let rows: Vec<ServiceClassRow> = query_as(source, SERVICE_CLASS_SQL).await?;
    Ok(service_class_metrics(rows, common))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::DimensionValue;
    use crate::storage::memory::MemoryRowSource;
    use crate::storage::Value;
    use chrono::TimeZone;

    #[tokio::test]
    async fn test_one_row_five_metrics_at_bucket_time() {
        let bucket = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        let source = MemoryRowSource::new().with_rows(
            "stl_wlm_query",
            vec![
                Row::new(vec![
                    Value::Timestamp(bucket),
                    "etl".into(),
                    Value::Int(40),
                    Value::Int(9000),
                    Value::Int(3),
                    Value::Int(120),
                    Value::Int(2),
                ]),
                Row::new(vec![
                    Value::Timestamp(bucket),
                    "adhoc".into(),
                    Value::Int(5),
                    Value::Null,
                    Value::Int(0),
                    Value::Null,
                    Value::Int(0),
                ]),
            ],
        );
        let common = vec![Dimension::new("ClusterIdentifier", "analytics-prod")];

        let metrics = gather_service_class_stats(&source, &common).await.unwrap();
        assert_eq!(metrics.len(), 10);

        let names: Vec<&str> = metrics[..5].iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec![
                "ServiceClass-Queued",
                "ServiceClass-QueueTime",
                "ServiceClass-Executed",
                "ServiceClass-ExecTime",
                "ServiceClass-DiskbasedQuerySegments",
            ]
        );
        assert_eq!(metrics[0].value(), 3.0);
        assert_eq!(metrics[2].value(), 40.0);
        assert!(metrics.iter().all(|m| m.timestamp() == bucket));
        assert!(metrics.iter().all(|m| *m.unit() == MetricUnit::Count));
        assert_eq!(metrics[0].dimension("ServiceClassID"), Some(&DimensionValue::Text("etl".into())));
        assert_eq!(metrics[5].dimension("ServiceClassID"), Some(&DimensionValue::Text("adhoc".into())));
        assert_eq!(metrics[8].value(), 0.0);
        assert_eq!(metrics[0].dimensions().last(), common.last());
    }
}
