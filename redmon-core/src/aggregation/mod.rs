//! Row-to-metric transformers for the built-in diagnostic queries.
//!
//! Every transformer takes a row source and the caller's common dimensions
//! and returns metrics in a deterministic order:
//! - `table_stats`: per table, then per schema, then ten warehouse-wide values
//! - `service_class`: five metrics per row, in row order
//! - `user_activity`: summary counts, then recent counts, in row order

pub mod service_class;
pub mod table_stats;
pub mod user_activity;

pub use service_class::gather_service_class_stats;
pub use table_stats::gather_table_stats;
pub use user_activity::{gather_user_group_stats, UserJoinStrategy};
