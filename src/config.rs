//! Configuration for a monitoring run.
//!
//! Options are loaded from several sources, later ones overriding earlier ones:
//! 1. Default configuration (embedded in binary)
//! 2. User-specified configuration file (`--config`)
//! 3. Environment variables prefixed with `REDMON_`, using `__` between
//!    section and key (`REDMON_WAREHOUSE__PASSWORD`)
//! 4. Command-line arguments

use clap::Parser;
use config::{Config, ConfigError};
use redmon_core::Dimension;
use serde::{Deserialize, Deserializer};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{Error, Result};

const DEFAULT_CONFIG: &str = include_str!("../config/default.toml");

/// Command-line arguments parser.
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct CliArgs {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Path to the custom query definitions (YAML)
    #[arg(long, env = "REDMON_SQL_PATH")]
    sql_path: Option<PathBuf>,

    /// Warehouse deployment type: provisioned or serverless
    #[arg(long, env = "REDMON_CLUSTER_TYPE")]
    cluster_type: Option<String>,

    /// Identifier of the provisioned cluster
    #[arg(long, env = "REDMON_CLUSTER_ID")]
    cluster_id: Option<String>,

    /// Workgroup of the serverless namespace
    #[arg(long, env = "REDMON_WORKGROUP_NAME")]
    workgroup_name: Option<String>,

    /// Database name
    #[arg(long, env = "REDMON_DB_NAME")]
    db_name: Option<String>,

    /// Database user
    #[arg(long, env = "REDMON_DB_USER")]
    db_user: Option<String>,

    /// Row source engine type
    #[arg(long, env = "REDMON_ENGINE_KIND")]
    engine: Option<String>,

    /// Metric sink type
    #[arg(long, env = "REDMON_SINK_KIND")]
    sink: Option<String>,

    /// Activate debug logging
    #[arg(long, env = "REDMON_DEBUG")]
    debug: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClusterType {
    #[default]
    Provisioned,
    Serverless,
}

impl ClusterType {
    pub fn is_serverless(&self) -> bool {
        matches!(self, ClusterType::Serverless)
    }
}

impl FromStr for ClusterType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "provisioned" => Ok(ClusterType::Provisioned),
            "serverless" => Ok(ClusterType::Serverless),
            other => Err(format!("unknown cluster type `{}`", other)),
        }
    }
}

impl fmt::Display for ClusterType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClusterType::Provisioned => f.write_str("provisioned"),
            ClusterType::Serverless => f.write_str("serverless"),
        }
    }
}

impl<'de> Deserialize<'de> for ClusterType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// Complete run configuration.
#[derive(Debug, Deserialize)]
pub struct Settings {
    pub warehouse: WarehouseConfig,
    pub engine: EngineConfig,
    #[serde(default)]
    pub queries: QueriesConfig,
    pub sink: SinkConfig,
    pub logging: LoggingConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub capabilities: CapabilitiesConfig,
}

/// The warehouse being monitored and how to reach it.
#[derive(Debug, Clone, Deserialize)]
pub struct WarehouseConfig {
    #[serde(default)]
    pub cluster_type: ClusterType,
    pub cluster_id: Option<String>,
    pub workgroup_name: Option<String>,
    pub db_name: String,
    pub db_user: Option<String>,
    pub host: String,
    pub port: u16,
    /// Not read from files in practice; supply it through the environment.
    pub password: Option<String>,
}

impl WarehouseConfig {
    /// Dimensions identifying the warehouse on every metric.
    pub fn common_dimensions(&self) -> Result<Vec<Dimension>> {
        let dimension = match self.cluster_type {
            ClusterType::Provisioned => Dimension::new(
                "ClusterIdentifier",
                non_empty(&self.cluster_id).ok_or(Error::MissingSetting("warehouse.cluster_id"))?,
            ),
            ClusterType::Serverless => Dimension::new(
                "WorkgroupName",
                non_empty(&self.workgroup_name).ok_or(Error::MissingSetting("warehouse.workgroup_name"))?,
            ),
        };
        Ok(vec![dimension])
    }
}

/// Row source configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct EngineConfig {
    /// Engine type ("adbc" or "duckdb")
    pub engine: String,
    /// Connection string; derived from the warehouse section when unset
    pub connection: Option<String>,
    /// ADBC driver library
    pub driver_path: Option<String>,
    /// Engine-specific options
    #[serde(default)]
    pub options: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueriesConfig {
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SinkConfig {
    /// Sink type ("log", "stdout" or "file")
    pub kind: String,
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    /// "json" or "compact"
    pub format: String,
    /// Forces debug level regardless of `RUST_LOG`.
    #[serde(default)]
    pub debug: bool,
}

/// Tag written to the warehouse session before any diagnostics run.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionConfig {
    pub application_name: String,
    pub version: String,
}

impl SessionConfig {
    pub fn tag(&self) -> String {
        format!("{}-{}", self.application_name, self.version)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CapabilitiesConfig {
    /// Join grouped users with their query counts on the client.
    #[serde(default = "default_client_side_user_join")]
    pub client_side_user_join: bool,
}

fn default_client_side_user_join() -> bool {
    true
}

impl Default for CapabilitiesConfig {
    fn default() -> Self {
        Self {
            client_side_user_join: default_client_side_user_join(),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty()).map(str::to_string)
}

impl Settings {
    /// Loads configuration from all available sources.
    pub fn new(cli: &CliArgs) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        // Load default configuration
        builder = builder.add_source(config::File::from_str(DEFAULT_CONFIG, config::FileFormat::Toml));

        // Load user configuration if specified
        if let Some(ref config_path) = cli.config {
            builder = builder.add_source(config::File::from(config_path.clone()));
        }

        // Add environment variables (prefixed with REDMON_)
        builder = builder.add_source(
            config::Environment::with_prefix("REDMON")
                .prefix_separator("_")
                .separator("__"),
        );

        // Override with command line arguments
        if let Some(ref path) = cli.sql_path {
            builder = builder.set_override("queries.path", path.to_string_lossy().into_owned())?;
        }
        if let Some(ref cluster_type) = cli.cluster_type {
            builder = builder.set_override("warehouse.cluster_type", cluster_type.as_str())?;
        }
        if let Some(ref cluster_id) = cli.cluster_id {
            builder = builder.set_override("warehouse.cluster_id", cluster_id.as_str())?;
        }
        if let Some(ref workgroup) = cli.workgroup_name {
            builder = builder.set_override("warehouse.workgroup_name", workgroup.as_str())?;
        }
        if let Some(ref db_name) = cli.db_name {
            builder = builder.set_override("warehouse.db_name", db_name.as_str())?;
        }
        if let Some(ref db_user) = cli.db_user {
            builder = builder.set_override("warehouse.db_user", db_user.as_str())?;
        }
        if let Some(ref engine) = cli.engine {
            builder = builder.set_override("engine.engine", engine.as_str())?;
        }
        if let Some(ref sink) = cli.sink {
            builder = builder.set_override("sink.kind", sink.as_str())?;
        }
        if cli.debug {
            builder = builder
                .set_override("logging.level", "debug")?
                .set_override("logging.debug", true)?;
        }

        builder.build()?.try_deserialize()
    }
}
