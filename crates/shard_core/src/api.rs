use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value as JsonValue;

use crate::{Condition, Key, Projection, Row, ShardResult, Value};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReadOutput {
    Rows(Vec<Row>),
    /// Single-column read under a concrete key or condition: the value from
    /// the first shard, in enumeration order, holding any match.
    Value(Option<Value>),
}

impl ReadOutput {
    pub fn is_empty(&self) -> bool {
        match self {
            ReadOutput::Rows(rows) => rows.is_empty(),
            ReadOutput::Value(value) => value.is_none(),
        }
    }

    pub fn rows(&self) -> &[Row] {
        match self {
            ReadOutput::Rows(rows) => rows,
            ReadOutput::Value(_) => &[],
        }
    }

    pub fn into_rows(self) -> Vec<Row> {
        match self {
            ReadOutput::Rows(rows) => rows,
            ReadOutput::Value(_) => Vec::new(),
        }
    }

    pub fn value(&self) -> Option<&Value> {
        match self {
            ReadOutput::Value(value) => value.as_ref(),
            ReadOutput::Rows(_) => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WriteOutcome {
    pub rows_affected: u64,
}

impl WriteOutcome {
    pub fn modified(&self) -> bool {
        self.rows_affected > 0
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub inserted: u64,
    pub skipped: u64,
}

/// Generic dataset operations. Dataset names are validated by the
/// implementation; callers never see shards or physical tables.
#[async_trait]
pub trait DatasetApi {
    async fn read_by_key(
        &self,
        dataset: &str,
        key: &Key,
        projection: &Projection,
    ) -> ShardResult<ReadOutput>;

    async fn read_by_condition(
        &self,
        dataset: &str,
        condition: &Condition,
        projection: &Projection,
    ) -> ShardResult<ReadOutput>;

    async fn insert(&self, dataset: &str, row: Row) -> ShardResult<()>;

    async fn update_by_condition(
        &self,
        dataset: &str,
        condition: &Condition,
        target: &str,
        value: Option<Value>,
    ) -> ShardResult<WriteOutcome>;

    async fn delete_by_key(&self, dataset: &str, key: &Key) -> ShardResult<WriteOutcome>;

    async fn delete_by_condition(
        &self,
        dataset: &str,
        condition: &Condition,
    ) -> ShardResult<WriteOutcome>;

    async fn export(&self, dataset: &str) -> ShardResult<Vec<Row>>;

    /// Replaces the whole dataset. Records that are not objects, do not fit
    /// the schema, or lack a primary-key column are skipped.
    async fn import(&self, dataset: &str, records: Vec<JsonValue>) -> ShardResult<ImportReport>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{ReadOutput, WriteOutcome};
    use crate::{LogicalDataset, Row, Value};

    #[test]
    fn read_output_serializes_untagged() {
        let row = Row::new(LogicalDataset::User).with("id", "u5").unwrap();
        let rows = ReadOutput::Rows(vec![row]);
        assert_eq!(serde_json::to_value(&rows).unwrap(), json!([{"id": "u5"}]));
        let value = ReadOutput::Value(Some(Value::Int(3)));
        assert_eq!(serde_json::to_value(&value).unwrap(), json!(3));
        assert!(ReadOutput::Value(None).is_empty());
    }

    #[test]
    fn zero_rows_affected_is_not_modified() {
        assert!(!WriteOutcome::default().modified());
        assert!(WriteOutcome { rows_affected: 2 }.modified());
    }
}
