//! The monitoring run.
//!
//! One run opens a single row source session, tags it, runs the built-in
//! transformers and the custom queries strictly in sequence, and hands the
//! whole metric stream to the sink. The first row source failure aborts the
//! run and nothing is published.

use redmon_core::aggregation::{
    gather_service_class_stats, gather_table_stats, gather_user_group_stats, UserJoinStrategy,
};
use redmon_core::storage::adbc::AdbcRowSource;
use redmon_core::storage::duckdb::DuckDbRowSource;
use redmon_core::{run_custom_query, CustomQueryDescriptor, Dimension, Metric, RowSource};

use crate::config::{ClusterType, EngineConfig, Settings, WarehouseConfig};
use crate::credentials::CredentialResolver;
use crate::error::{Error, Result};
use crate::queries::load_queries;
use crate::sink::MetricSink;

/// Which diagnostics the target warehouse supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    /// Send `SET application_name` before anything else.
    pub session_tagging: bool,
    pub workload_stats: bool,
    pub user_stats: bool,
    pub user_join: UserJoinStrategy,
}

impl Capabilities {
    /// Serverless warehouses expose neither the workload management tables
    /// nor the user/group catalog.
    pub fn for_cluster(cluster_type: ClusterType, client_side_user_join: bool) -> Self {
        let provisioned = !cluster_type.is_serverless();
        Self {
            session_tagging: true,
            workload_stats: provisioned,
            user_stats: provisioned,
            user_join: if client_side_user_join {
                UserJoinStrategy::ClientSide
            } else {
                UserJoinStrategy::SingleQuery
            },
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        let mut capabilities = Self::for_cluster(
            settings.warehouse.cluster_type,
            settings.capabilities.client_side_user_join,
        );
        // A local DuckDB snapshot has no application_name setting.
        capabilities.session_tagging = !settings.engine.engine.eq_ignore_ascii_case("duckdb");
        capabilities
    }
}

/// Per-run state passed explicitly to everything that needs it.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub application_tag: String,
    pub common_dimensions: Vec<Dimension>,
}

impl SessionContext {
    pub fn set_application_name_sql(&self) -> String {
        format!("SET application_name TO '{}'", self.application_tag.replace('\'', "''"))
    }
}

pub struct Monitor<'a> {
    source: &'a dyn RowSource,
    context: SessionContext,
    capabilities: Capabilities,
}

impl<'a> Monitor<'a> {
    pub fn new(source: &'a dyn RowSource, context: SessionContext, capabilities: Capabilities) -> Self {
        Self {
            source,
            context,
            capabilities,
        }
    }

    /// Runs every enabled diagnostic and returns the metrics in emission order.
    pub async fn collect(&self, queries: &[CustomQueryDescriptor]) -> Result<Vec<Metric>> {
        let common = &self.context.common_dimensions;

        if self.capabilities.session_tagging {
            self.source
                .execute_update(&self.context.set_application_name_sql())
                .await?;
        }

        tracing::info!("Collect table stats");
        let mut metrics = gather_table_stats(self.source, common).await?;

        if self.capabilities.workload_stats {
            tracing::info!("Collect service class metrics");
            metrics.extend(gather_service_class_stats(self.source, common).await?);
        }

        if self.capabilities.user_stats {
            tracing::info!("Collect user group metrics");
            metrics.extend(gather_user_group_stats(self.source, common, self.capabilities.user_join).await?);
        }

        tracing::info!(queries = queries.len(), "Collect custom metrics");
        for query in queries {
            if let Some(metric) = run_custom_query(self.source, query, common).await? {
                metrics.push(metric);
            }
        }

        Ok(metrics)
    }

    /// Collects and publishes. Returns the number of metrics published.
    pub async fn run(&self, queries: &[CustomQueryDescriptor], sink: &mut dyn MetricSink) -> Result<usize> {
        let metrics = self.collect(queries).await?;
        sink.publish(&metrics).await?;
        tracing::info!(metrics = metrics.len(), "Monitoring run complete");
        Ok(metrics.len())
    }
}

/// Opens the configured row source, resolving credentials when it needs them.
pub async fn open_row_source(
    engine: &EngineConfig,
    warehouse: &WarehouseConfig,
    resolver: &dyn CredentialResolver,
) -> Result<Box<dyn RowSource>> {
    match engine.engine.to_ascii_lowercase().as_str() {
        "duckdb" => {
            let connection = engine.connection.as_deref().unwrap_or(":memory:");
            Ok(Box::new(DuckDbRowSource::new(connection, &engine.options)?))
        }
        "adbc" => {
            let driver_path = engine
                .driver_path
                .as_deref()
                .ok_or(Error::MissingSetting("engine.driver_path"))?;
            let details = resolver.resolve(warehouse).await?;
            let uri = engine.connection.clone().unwrap_or_else(|| details.uri());
            tracing::info!(endpoint = %details.endpoint, db_name = %details.db_name, "Opening warehouse session");
            Ok(Box::new(AdbcRowSource::new(driver_path, &uri, Some(&details.credentials()))?))
        }
        other => Err(Error::Unsupported {
            kind: "engine",
            value: other.to_string(),
        }),
    }
}

/// One complete monitoring run driven by settings.
///
/// Custom queries are loaded and validated before the warehouse is touched.
pub async fn run(settings: &Settings, resolver: &dyn CredentialResolver, sink: &mut dyn MetricSink) -> Result<usize> {
    let queries = match settings.queries.path {
        Some(ref path) => load_queries(path)?,
        None => Vec::new(),
    };
    let context = SessionContext {
        application_tag: settings.session.tag(),
        common_dimensions: settings.warehouse.common_dimensions()?,
    };

    let source = open_row_source(&settings.engine, &settings.warehouse, resolver).await?;

    tracing::info!("Run monitoring queries");
    let monitor = Monitor::new(source.as_ref(), context, Capabilities::from_settings(settings));
    let published = monitor.run(&queries, sink).await?;
    Ok(published)
}
