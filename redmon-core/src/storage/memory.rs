use crate::error::{Error, Result};
use crate::storage::{Row, RowSource};
use async_trait::async_trait;
use tokio::sync::Mutex;

enum Answer {
    Rows(Vec<Row>),
    Failure(String),
}

/// Row source answering from a script instead of a live warehouse.
///
/// Each answer is registered under a marker; a statement receives the first
/// answer whose marker occurs in its SQL text. Statements with no matching
/// marker return no rows. Every executed statement is recorded in order.
pub struct MemoryRowSource {
    answers: Vec<(String, Answer)>,
    executed: Mutex<Vec<String>>,
}

impl MemoryRowSource {
    pub fn new() -> Self {
        Self {
            answers: Vec::new(),
            executed: Mutex::new(Vec::new()),
        }
    }

    pub fn with_rows(mut self, marker: &str, rows: Vec<Row>) -> Self {
        self.answers.push((marker.to_string(), Answer::Rows(rows)));
        self
    }

    pub fn with_failure(mut self, marker: &str, message: &str) -> Self {
        self.answers
            .push((marker.to_string(), Answer::Failure(message.to_string())));
        self
    }

    /// Statements executed so far, in call order.
    pub async fn executed(&self) -> Vec<String> {
        self.executed.lock().await.clone()
    }

    fn answer(&self, sql: &str) -> Result<Vec<Row>> {
        match self.answers.iter().find(|(marker, _)| sql.contains(marker.as_str())) {
            Some((_, Answer::Rows(rows))) => Ok(rows.clone()),
            Some((marker, Answer::Failure(message))) => Err(Error::row_source(marker.as_str(), message)),
            None => Ok(Vec::new()),
        }
    }
}

impl Default for MemoryRowSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RowSource for MemoryRowSource {
    async fn execute(&self, sql: &str) -> Result<Vec<Row>> {
        self.executed.lock().await.push(sql.to_string());
        self.answer(sql)
    }

    async fn execute_update(&self, sql: &str) -> Result<()> {
        self.executed.lock().await.push(sql.to_string());
        self.answer(sql).map(|_| ())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Value;

    #[tokio::test]
    async fn test_scripted_answers() {
        let source = MemoryRowSource::new()
            .with_rows("svv_table_info", vec![Row::new(vec![Value::Int(1)])])
            .with_failure("stl_wlm_query", "permission denied");

        let rows = source.execute("SELECT * FROM svv_table_info").await.unwrap();
        assert_eq!(rows.len(), 1);
        assert!(source.execute("SELECT * FROM stl_wlm_query").await.is_err());
        assert!(source.execute("SELECT 1").await.unwrap().is_empty());

        assert_eq!(source.executed().await.len(), 3);
    }

    #[tokio::test]
    async fn test_fetch_scalar_first_cell() {
        let source = MemoryRowSource::new()
            .with_rows("answer", vec![
                Row::new(vec![Value::Int(42), Value::Null]),
                Row::new(vec![Value::Int(7)]),
            ])
            .with_rows("nothing", vec![Row::new(vec![Value::Null])]);

        assert_eq!(source.fetch_scalar("select answer").await.unwrap(), Some(Value::Int(42)));
        assert_eq!(source.fetch_scalar("select nothing").await.unwrap(), None);
        assert_eq!(source.fetch_scalar("select empty").await.unwrap(), None);
    }
}
