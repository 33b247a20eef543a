//! redmon binary.
//!
//! Runs one monitoring pass and exits. Schedule it externally (cron, a
//! container task) at the desired interval.
//!
//! ## Command-line Options
//!
//! ```text
//! Options:
//!   -c, --config <FILE>                Path to configuration file
//!       --sql-path <SQL_PATH>          Custom query definitions [env: REDMON_SQL_PATH]
//!       --cluster-type <CLUSTER_TYPE>  provisioned or serverless [env: REDMON_CLUSTER_TYPE]
//!       --cluster-id <CLUSTER_ID>      Provisioned cluster identifier [env: REDMON_CLUSTER_ID]
//!       --workgroup-name <NAME>        Serverless workgroup [env: REDMON_WORKGROUP_NAME]
//!       --db-name <DB_NAME>            Database name [env: REDMON_DB_NAME]
//!       --db-user <DB_USER>            Database user [env: REDMON_DB_USER]
//!       --engine <ENGINE>              Row source engine type [env: REDMON_ENGINE_KIND]
//!       --sink <SINK>                  Metric sink type [env: REDMON_SINK_KIND]
//!       --debug                        Activate debug logging [env: REDMON_DEBUG]
//! ```
//!
//! ## Examples
//!
//! ```bash
//! # Provisioned cluster, metrics as JSON log records
//! REDMON_WAREHOUSE__HOST=analytics-prod.example.internal \
//! REDMON_WAREHOUSE__PASSWORD=... \
//! redmon --cluster-id analytics-prod --db-name dev --db-user monitor --sql-path config/queries.yaml
//!
//! # Serverless workgroup, sink-view JSON lines on stdout
//! redmon --cluster-type serverless --workgroup-name analytics --db-name dev --sink stdout
//! ```

use clap::Parser;
use redmon::{
    config::{CliArgs, Settings},
    credentials::StaticCredentialResolver,
    logging::init_logger,
    monitor,
    sink::build_sink,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();
    let cli_args = CliArgs::parse();

    // Load settings from config file, environment and CLI args
    let settings = Settings::new(&cli_args)?;
    init_logger(&settings.logging);
    tracing::info!(
        cluster_type = %settings.warehouse.cluster_type,
        db_name = %settings.warehouse.db_name,
        engine = %settings.engine.engine,
        sink = %settings.sink.kind,
        "Arguments"
    );

    let mut sink = build_sink(&settings.sink)?;
    monitor::run(&settings, &StaticCredentialResolver, sink.as_mut()).await?;

    Ok(())
}
