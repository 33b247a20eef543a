//! Per-user query activity for users that belong to a group.
//!
//! The user/group catalog lives on the leader node and cannot be joined with
//! the query summary view in one statement on every backend. With
//! `UserJoinStrategy::ClientSide` the lookup is built from one query and the
//! summary rows are joined against it in memory. Backends without that
//! restriction can use `UserJoinStrategy::SingleQuery`.

use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::metrics::{with_common, Dimension, Metric, MetricUnit};
use crate::storage::{query_as, FromRow, Row, RowSource};

pub const USER_GROUP_MAPPING_SQL: &str = r#"
    SELECT DISTINCT
        usesysid AS user_id,
        usename AS user_name
    FROM pg_user,
         pg_group
    WHERE pg_user.usesysid = ANY(pg_group.grolist)
"#;

pub const USER_QUERY_SUMMARY_SQL: &str = r#"
    SELECT DISTINCT a.userid       AS user_id,
                    COUNT(a.query) AS query_count
    FROM svl_query_summary a
    GROUP BY user_id
"#;

pub const USER_QUERY_SUMMARY_JOINED_SQL: &str = r#"
    SELECT u.usename      AS user_name,
           COUNT(a.query) AS query_count
    FROM svl_query_summary a
             JOIN pg_user u ON u.usesysid = a.userid
    WHERE EXISTS (SELECT 1 FROM pg_group g WHERE u.usesysid = ANY(g.grolist))
    GROUP BY u.usename
"#;

pub const USER_RECENT_SQL: &str = r#"
    SELECT
        user_name,
        status,
        COUNT(query) AS query_count
    FROM stv_recents
    GROUP BY user_name, status
"#;

/// How grouped users are joined with their query counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserJoinStrategy {
    /// Build the user lookup first, then join summary rows client-side.
    #[default]
    ClientSide,
    /// Let the warehouse perform the join.
    SingleQuery,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserGroupRow {
    pub user_id: i64,
    pub user_name: String,
}

impl FromRow for UserGroupRow {
    const QUERY: &'static str = "UserGroupMapping";

    fn from_row(row: &Row) -> Result<Self> {
        let r = row.reader(Self::QUERY);
        Ok(Self {
            user_id: r.i64(0)?,
            user_name: r.text(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserSummaryRow {
    pub user_id: i64,
    pub query_count: f64,
}

impl FromRow for UserSummaryRow {
    const QUERY: &'static str = "UserQuerySummaryCount";

    fn from_row(row: &Row) -> Result<Self> {
        let r = row.reader(Self::QUERY);
        Ok(Self {
            user_id: r.i64(0)?,
            query_count: r.f64(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct NamedUserCountRow {
    pub user_name: String,
    pub query_count: f64,
}

impl FromRow for NamedUserCountRow {
    const QUERY: &'static str = "UserQuerySummaryCountJoined";

    fn from_row(row: &Row) -> Result<Self> {
        let r = row.reader(Self::QUERY);
        Ok(Self {
            user_name: r.text(0)?,
            query_count: r.f64(1)?,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UserRecentRow {
    pub user_name: String,
    pub status: String,
    pub query_count: f64,
}

impl FromRow for UserRecentRow {
    const QUERY: &'static str = "UserQueryRecentCount";

    fn from_row(row: &Row) -> Result<Self> {
        let r = row.reader(Self::QUERY);
        Ok(Self {
            user_name: r.text(0)?,
            status: r.text(1)?,
            query_count: r.f64(2)?,
        })
    }
}

/// `user_id -> user_name` for grouped users. Later rows win on duplicate ids.
pub fn user_lookup(rows: Vec<UserGroupRow>) -> HashMap<i64, String> {
    rows.into_iter().map(|r| (r.user_id, r.user_name)).collect()
}

fn user_count_metric(name: &str, user: &str, count: f64, now: DateTime<Utc>, common: &[Dimension]) -> Metric {
    let dims = with_common(vec![Dimension::new("UserName", user)], common);
    Metric::new(name, count, now, MetricUnit::Count, dims)
}

/// Joins summary rows with the lookup; users missing from it are dropped.
pub fn summary_metrics(
    lookup: &HashMap<i64, String>,
    rows: &[UserSummaryRow],
    now: DateTime<Utc>,
    common: &[Dimension],
) -> Vec<Metric> {
    rows.iter()
        .filter_map(|row| {
            lookup.get(&row.user_id).map(|user| {
                user_count_metric("UserQuerySummaryCount", user, row.query_count, now, common)
            })
        })
        .collect()
}

pub fn recent_metrics(rows: &[UserRecentRow], now: DateTime<Utc>, common: &[Dimension]) -> Vec<Metric> {
    rows.iter()
        .map(|row| {
            let name = if row.status == "Running" {
                "UserQueryRecentRunningCount"
            } else {
                "UserQueryRecentDoneCount"
            };
            user_count_metric(name, &row.user_name, row.query_count, now, common)
        })
        .collect()
}

pub async fn gather_user_group_stats(
    source: &dyn RowSource,
    common: &[Dimension],
    strategy: UserJoinStrategy,
) -> Result<Vec<Metric>> {
    let now = Utc::now();

    let mut metrics = match strategy {
        UserJoinStrategy::ClientSide => {
            let lookup = user_lookup(query_as(source, USER_GROUP_MAPPING_SQL).await?);
            tracing::debug!(grouped_users = lookup.len(), "User lookup built");
            let summary: Vec<UserSummaryRow> = query_as(source, USER_QUERY_SUMMARY_SQL).await?;
            summary_metrics(&lookup, &summary, now, common)
        }
        UserJoinStrategy::SingleQuery => {
            let joined: Vec<NamedUserCountRow> = query_as(source, USER_QUERY_SUMMARY_JOINED_SQL).await?;
            joined
                .iter()
                .map(|row| user_count_metric("UserQuerySummaryCount", &row.user_name, row.query_count, now, common))
                .collect()
        }
    };

    let recent: Vec<UserRecentRow> = query_as(source, USER_RECENT_SQL).await?;
    metrics.extend(recent_metrics(&recent, now, common));

    Ok(metrics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::DimensionValue;
    use crate::storage::memory::MemoryRowSource;
    use crate::storage::Value;

    fn common() -> Vec<Dimension> {
        vec![Dimension::new("ClusterIdentifier", "analytics-prod")]
    }

    fn user_name(metric: &Metric) -> Option<&DimensionValue> {
        metric.dimension("UserName")
    }

    #[test]
    fn test_unmapped_users_are_dropped() {
        let lookup = user_lookup(vec![UserGroupRow { user_id: 1, user_name: "alice".into() }]);
        let rows = vec![
            UserSummaryRow { user_id: 1, query_count: 5.0 },
            UserSummaryRow { user_id: 2, query_count: 9.0 },
        ];

        let metrics = summary_metrics(&lookup, &rows, Utc::now(), &common());
        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].name(), "UserQuerySummaryCount");
        assert_eq!(metrics[0].value(), 5.0);
        assert_eq!(user_name(&metrics[0]), Some(&DimensionValue::Text("alice".into())));
    }

    #[test]
    fn test_duplicate_user_ids_last_wins() {
        let lookup = user_lookup(vec![
            UserGroupRow { user_id: 1, user_name: "alice".into() },
            UserGroupRow { user_id: 1, user_name: "alice_v2".into() },
        ]);
        assert_eq!(lookup.get(&1).map(String::as_str), Some("alice_v2"));
    }

    #[test]
    fn test_recent_status_naming() {
        let rows = vec![
            UserRecentRow { user_name: "alice".into(), status: "Running".into(), query_count: 2.0 },
            UserRecentRow { user_name: "alice".into(), status: "Done".into(), query_count: 8.0 },
            UserRecentRow { user_name: "bob".into(), status: "running".into(), query_count: 1.0 },
        ];
        let metrics = recent_metrics(&rows, Utc::now(), &common());
        let names: Vec<&str> = metrics.iter().map(|m| m.name()).collect();
        assert_eq!(
            names,
            vec!["UserQueryRecentRunningCount", "UserQueryRecentDoneCount", "UserQueryRecentDoneCount"]
        );
    }

    #[tokio::test]
    async fn test_client_side_join_protocol() {
        let source = MemoryRowSource::new()
            .with_rows("pg_group", vec![Row::new(vec![Value::Int(1), "alice".into()])])
            .with_rows("svl_query_summary", vec![
                Row::new(vec![Value::Int(1), Value::Int(5)]),
                Row::new(vec![Value::Int(2), Value::Int(9)]),
            ])
            .with_rows("stv_recents", vec![Row::new(vec!["carol".into(), "Running".into(), Value::Int(1)])]);

        let metrics = gather_user_group_stats(&source, &common(), UserJoinStrategy::ClientSide)
            .await
            .unwrap();

        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics[0].name(), "UserQuerySummaryCount");
        assert_eq!(metrics[1].name(), "UserQueryRecentRunningCount");
        assert_eq!(user_name(&metrics[1]), Some(&DimensionValue::Text("carol".into())));

        let executed = source.executed().await;
        assert_eq!(executed.len(), 3);
        assert!(executed[0].contains("pg_group"));
        assert!(executed[1].contains("svl_query_summary"));
        assert!(executed[2].contains("stv_recents"));
    }

    #[tokio::test]
    async fn test_single_query_strategy() {
        let source = MemoryRowSource::new()
            .with_rows("JOIN pg_user", vec![Row::new(vec!["alice".into(), Value::Int(5)])]);

        let metrics = gather_user_group_stats(&source, &common(), UserJoinStrategy::SingleQuery)
            .await
            .unwrap();

        assert_eq!(metrics.len(), 1);
        assert_eq!(metrics[0].value(), 5.0);
        assert_eq!(source.executed().await.len(), 2);
    }
}
