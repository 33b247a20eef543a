#[cfg(test)]
mod tests {
    use crate::config::{CliArgs, ClusterType, EngineConfig, Settings, WarehouseConfig};
    use crate::credentials::{ConnectionDetails, CredentialResolver};
    use crate::error::{Error, Result};
    use crate::monitor::{open_row_source, Capabilities, Monitor, SessionContext};
    use crate::queries::load_queries_from_str;
    use crate::sink::MetricSink;
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};
    use clap::Parser;
    use mockall::*;
    use redmon_core::storage::memory::MemoryRowSource;
    use redmon_core::{Dimension, DimensionValue, Metric, Row, Value};
    use std::collections::HashMap;
    use std::io::Write;

    mock! {
        pub Sink {}
        #[async_trait]
        impl MetricSink for Sink {
            async fn publish(&mut self, metrics: &[Metric]) -> Result<()>;
        }
    }

    mock! {
        pub Resolver {}
        #[async_trait]
        impl CredentialResolver for Resolver {
            async fn resolve(&self, warehouse: &WarehouseConfig) -> Result<ConnectionDetails>;
        }
    }

    const CUSTOM_QUERIES: &str = r#"
queries:
  - name: OpenSessions
    unit: Count
    type: Query
    query: SELECT COUNT(*) FROM stv_sessions
  - name: Vacuuming
    unit: Count
    type: Query
    query: SELECT COUNT(*) FROM svv_vacuum_progress
  - name: CatalogLatency
    unit: Count
    type: Latency
    query: SELECT COUNT(*) FROM pg_namespace
"#;

    fn table_row(schema: &str, table: &str, size: i64) -> Row {
        Row::new(vec![
            format!("{}.{}", schema, table).as_str().into(),
            schema.into(),
            "Y".into(),
            Value::Int(256),
            Value::Float(1.0),
            Value::Float(0.0),
            Value::Int(100),
            Value::Float(1.0),
            Value::Float(1.2),
            Value::Int(size),
        ])
    }

    fn scripted_warehouse() -> MemoryRowSource {
        let bucket = Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap();
        MemoryRowSource::new()
            .with_rows("svv_table_info", vec![table_row("public", "orders", 10), table_row("public", "items", 20)])
            .with_rows("stl_wlm_query", vec![Row::new(vec![
                Value::Timestamp(bucket),
                "etl".into(),
                Value::Int(4),
                Value::Int(900),
                Value::Int(1),
                Value::Int(30),
                Value::Int(0),
            ])])
            .with_rows("pg_group", vec![Row::new(vec![Value::Int(1), "alice".into()])])
            .with_rows("svl_query_summary", vec![Row::new(vec![Value::Int(1), Value::Int(5)])])
            .with_rows("stv_recents", vec![Row::new(vec!["alice".into(), "Running".into(), Value::Int(1)])])
            .with_rows("stv_sessions", vec![Row::new(vec![Value::Int(42)])])
            .with_rows("svv_vacuum_progress", vec![Row::new(vec![Value::Null])])
            .with_rows("pg_namespace", vec![Row::new(vec![Value::Int(7)])])
    }

    fn context(dimension: Dimension) -> SessionContext {
        SessionContext {
            application_tag: "RedshiftAdvancedMonitoring-v0.1.0".into(),
            common_dimensions: vec![dimension],
        }
    }

    fn provisioned() -> (SessionContext, Capabilities) {
        (
            context(Dimension::new("ClusterIdentifier", "analytics-prod")),
            Capabilities::for_cluster(ClusterType::Provisioned, true),
        )
    }

    #[tokio::test]
    async fn test_provisioned_run_order() {
        let source = scripted_warehouse();
        let queries = load_queries_from_str(CUSTOM_QUERIES).unwrap();
        let (context, capabilities) = provisioned();

        let metrics = Monitor::new(&source, context, capabilities).collect(&queries).await.unwrap();

        let executed = source.executed().await;
        assert_eq!(executed[0], "SET application_name TO 'RedshiftAdvancedMonitoring-v0.1.0'");
        let markers = [
            "svv_table_info",
            "stl_wlm_query",
            "pg_group",
            "svl_query_summary",
            "stv_recents",
            "stv_sessions",
            "svv_vacuum_progress",
            "pg_namespace",
        ];
        assert_eq!(executed.len(), markers.len() + 1);
        for (statement, marker) in executed[1..].iter().zip(markers) {
            assert!(statement.contains(marker), "{} should query {}", statement, marker);
        }

        // 2 tables x 2 + 1 schema x 2 + 10 globals, 5 WLM, 2 user, 2 custom
        assert_eq!(metrics.len(), 16 + 5 + 2 + 2);
        assert_eq!(metrics[0].name(), "TableSize");
        assert_eq!(metrics[4].name(), "SchemaSize");
        assert_eq!(metrics[4].value(), 30.0);
        assert_eq!(metrics[16].name(), "ServiceClass-Queued");
        assert_eq!(metrics[21].name(), "UserQuerySummaryCount");
        assert_eq!(metrics[22].name(), "UserQueryRecentRunningCount");
        assert_eq!(metrics[23].name(), "OpenSessions");
        assert_eq!(metrics[23].value(), 42.0);
        assert_eq!(metrics[24].name(), "CatalogLatency");
        assert_eq!(metrics[24].unit().as_str(), "Milliseconds");

        assert!(metrics
            .iter()
            .all(|m| m.dimension("ClusterIdentifier") == Some(&DimensionValue::Text("analytics-prod".into()))));
    }

    #[tokio::test]
    async fn test_serverless_skips_workload_and_user_stats() {
        let source = scripted_warehouse();
        let capabilities = Capabilities::for_cluster(ClusterType::Serverless, true);

        let metrics = Monitor::new(&source, context(Dimension::new("WorkgroupName", "analytics")), capabilities)
            .collect(&[])
            .await
            .unwrap();

        assert_eq!(metrics.len(), 16);
        let executed = source.executed().await;
        assert_eq!(executed.len(), 2);
        assert!(executed.iter().all(|s| !s.contains("stl_wlm_query") && !s.contains("pg_group")));
        assert_eq!(metrics[0].dimension("WorkgroupName"), Some(&DimensionValue::Text("analytics".into())));
    }

    #[tokio::test]
    async fn test_failure_aborts_before_publishing() {
        let source = MemoryRowSource::new()
            .with_rows("svv_table_info", vec![table_row("public", "orders", 10)])
            .with_failure("stl_wlm_query", "permission denied for relation")
            .with_rows("stv_recents", Vec::new());
        let (context, capabilities) = provisioned();
        let mut sink = MockSink::new();
        sink.expect_publish().times(0);

        let result = Monitor::new(&source, context, capabilities).run(&[], &mut sink).await;
        assert!(matches!(result, Err(Error::Core(redmon_core::Error::RowSource { .. }))));
        assert!(source.executed().await.iter().all(|s| !s.contains("stv_recents")));
    }

    #[tokio::test]
    async fn test_run_publishes_whole_stream_once() {
        let source = scripted_warehouse();
        let queries = load_queries_from_str(CUSTOM_QUERIES).unwrap();
        let (context, capabilities) = provisioned();
        let mut sink = MockSink::new();
        sink.expect_publish()
            .times(1)
            .withf(|metrics: &[Metric]| metrics.len() == 25 && metrics[0].name() == "TableSize")
            .returning(|_| Ok(()));

        let published = Monitor::new(&source, context, capabilities)
            .run(&queries, &mut sink)
            .await
            .unwrap();
        assert_eq!(published, 25);
    }

    #[tokio::test]
    async fn test_untagged_session_for_local_snapshot() {
        let source = scripted_warehouse();
        let (context, mut capabilities) = provisioned();
        capabilities.session_tagging = false;

        Monitor::new(&source, context, capabilities).collect(&[]).await.unwrap();
        assert!(source.executed().await[0].contains("svv_table_info"));
    }

    #[test]
    fn test_application_tag_is_quoted() {
        let context = SessionContext {
            application_tag: "O'Brien-v1".into(),
            common_dimensions: Vec::new(),
        };
        assert_eq!(context.set_application_name_sql(), "SET application_name TO 'O''Brien-v1'");
    }

    fn warehouse() -> WarehouseConfig {
        WarehouseConfig {
            cluster_type: ClusterType::Provisioned,
            cluster_id: Some("analytics-prod".into()),
            workgroup_name: None,
            db_name: "dev".into(),
            db_user: Some("monitor".into()),
            host: "localhost".into(),
            port: 5439,
            password: Some("secret".into()),
        }
    }

    fn engine(kind: &str, driver_path: Option<&str>) -> EngineConfig {
        EngineConfig {
            engine: kind.into(),
            connection: None,
            driver_path: driver_path.map(str::to_string),
            options: HashMap::new(),
        }
    }

    #[tokio::test]
    async fn test_duckdb_engine_needs_no_credentials() {
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().times(0);

        let source = open_row_source(&engine("duckdb", None), &warehouse(), &resolver).await.unwrap();
        assert_eq!(source.fetch_scalar("SELECT 1").await.unwrap(), Some(Value::Int(1)));
    }

    #[tokio::test]
    async fn test_adbc_engine_resolves_credentials() {
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().times(1).returning(|w| {
            Ok(ConnectionDetails {
                endpoint: w.host.clone(),
                port: w.port,
                db_name: w.db_name.clone(),
                user: "monitor".into(),
                password: "secret".into(),
            })
        });

        let result = open_row_source(
            &engine("adbc", Some("/nonexistent/libadbc_driver_postgresql.so")),
            &warehouse(),
            &resolver,
        )
        .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_engine_selection_errors() {
        let mut resolver = MockResolver::new();
        resolver.expect_resolve().times(0);

        let result = open_row_source(&engine("clickhouse", None), &warehouse(), &resolver).await;
        assert!(matches!(result, Err(Error::Unsupported { kind: "engine", .. })));

        let result = open_row_source(&engine("adbc", None), &warehouse(), &resolver).await;
        assert!(matches!(result, Err(Error::MissingSetting("engine.driver_path"))));
    }

    #[tokio::test]
    async fn test_malformed_query_file_fails_before_connecting() {
        let mut file = tempfile::Builder::new().suffix(".yaml").tempfile().unwrap();
        write!(
            file,
            "queries:\n  - name: Broken\n    unit: Count\n    query: SELECT 1\n"
        )
        .unwrap();

        let sql_path = file.path().to_str().unwrap().to_string();
        let settings = Settings::new(&CliArgs::parse_from([
            "redmon",
            "--cluster-id",
            "analytics-prod",
            "--sql-path",
            sql_path.as_str(),
        ]))
        .unwrap();

        let mut resolver = MockResolver::new();
        resolver.expect_resolve().times(0);
        let mut sink = MockSink::new();
        sink.expect_publish().times(0);

        let result = crate::monitor::run(&settings, &resolver, &mut sink).await;
        assert!(matches!(result, Err(Error::Core(redmon_core::Error::Config(_)))));
    }
}
