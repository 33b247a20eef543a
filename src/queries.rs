//! Loader for the custom query definitions file.
//!
//! The file is YAML with a single top-level `queries:` list:
//!
//! ```yaml
//! queries:
//!   - name: OpenSessions
//!     unit: Count
//!     type: Query
//!     query: SELECT COUNT(*) FROM stv_sessions
//! ```

use config::{Config, FileFormat};
use redmon_core::{CustomQueryConfig, CustomQueryDescriptor};
use serde::Deserialize;
use std::path::Path;

use crate::error::Result;

#[derive(Debug, Deserialize)]
struct QueryFile {
    queries: Vec<CustomQueryConfig>,
}

/// Reads and validates every descriptor in the file, in file order.
pub fn load_queries(path: &Path) -> Result<Vec<CustomQueryDescriptor>> {
    tracing::info!(path = %path.display(), "Query configuration");
    let source = Config::builder()
        .add_source(config::File::from(path).format(FileFormat::Yaml))
        .build()?;
    descriptors(source)
}

pub fn load_queries_from_str(yaml: &str) -> Result<Vec<CustomQueryDescriptor>> {
    let source = Config::builder()
        .add_source(config::File::from_str(yaml, FileFormat::Yaml))
        .build()?;
    descriptors(source)
}

fn descriptors(source: Config) -> Result<Vec<CustomQueryDescriptor>> {
    let file: QueryFile = source.try_deserialize()?;
    let queries = file
        .queries
        .into_iter()
        .map(CustomQueryDescriptor::try_from)
        .collect::<redmon_core::Result<Vec<_>>>()?;
    Ok(queries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use redmon_core::{EvaluationMode, MetricUnit};

    #[test]
    fn test_file_order_and_fields() {
        let queries = load_queries_from_str(
            r#"
queries:
  - name: OpenSessions
    unit: Count
    type: Query
    query: |
      SELECT COUNT(*)
      FROM stv_sessions
  - name: CatalogLatency
    unit: ""
    type: latency
    description: Catalog scan
    query: SELECT 1
"#,
        )
        .unwrap();

        assert_eq!(queries.len(), 2);
        assert_eq!(queries[0].name(), "OpenSessions");
        assert_eq!(queries[0].inline_statement(), "SELECT COUNT(*) FROM stv_sessions");
        assert_eq!(*queries[0].mode(), EvaluationMode::Query);
        assert_eq!(queries[1].description(), "Catalog scan");
        assert_eq!(*queries[1].unit(), MetricUnit::None);
        assert_eq!(*queries[1].mode(), EvaluationMode::Duration("Latency".into()));
    }

    #[test]
    fn test_missing_field_is_a_configuration_error() {
        let err = load_queries_from_str(
            r#"
queries:
  - name: Broken
    unit: Count
    query: SELECT 1
"#,
        )
        .unwrap_err();
        assert!(matches!(err, Error::Core(redmon_core::Error::Config(_))));
    }

    #[test]
    fn test_sample_file_loads() {
        let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("config/queries.yaml");
        let queries = load_queries(&path).unwrap();
        assert!(!queries.is_empty());
    }
}
