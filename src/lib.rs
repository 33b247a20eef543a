//! redmon: scheduled health monitoring for columnar data warehouses.
//!
//! A run connects to the warehouse, collects table, workload and user
//! statistics plus any configured custom queries, and publishes the result
//! as a stream of dimensioned metrics.
//!
//! # Example
//!
//! ```rust,no_run
//! use clap::Parser;
//! use redmon::{CliArgs, Settings, StaticCredentialResolver};
//! use redmon::sink::build_sink;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let settings = Settings::new(&CliArgs::parse())?;
//!     let mut sink = build_sink(&settings.sink)?;
//!
//!     let published = redmon::monitor::run(&settings, &StaticCredentialResolver, sink.as_mut()).await?;
//!     println!("Published {} metrics", published);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod credentials;
pub mod error;
pub mod logging;
pub mod monitor;
pub mod queries;
pub mod sink;
pub mod tests;

pub use config::{CliArgs, ClusterType, Settings};
pub use credentials::{ConnectionDetails, CredentialResolver, StaticCredentialResolver};
pub use error::{Error, Result};
pub use monitor::{Capabilities, Monitor, SessionContext};
pub use sink::{JsonLinesSink, LogSink, MetricSink};
