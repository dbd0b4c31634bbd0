use std::path::Path;

use async_trait::async_trait;
use serde_json::Value as JsonValue;

use crate::bootstrap::bootstrap_tables;
use crate::config::RouterConfig;
use crate::executor::ShardExecutor;
use crate::scatter::ScatterGather;
use crate::shard::ShardHandle;
use roomdb_shard_core::{
    ColumnSpec, Condition, DatasetApi, DatasetRecord, ImportReport, Key, LogicalDataset,
    Projection, ReadOutput, ResolvedCondition, Row, ShardError, ShardId, ShardLocator,
    ShardResult, Value, WriteOutcome,
};

/// Entry point for every dataset operation. Owns the shard handles and the
/// static layout; holds no per-request state.
pub struct DatasetRouter {
    shards: Vec<ShardHandle>,
    locator: ShardLocator,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Route {
    Single(ShardId),
    Scatter,
}

impl DatasetRouter {
    /// Connects every configured shard and creates missing tables.
    pub async fn connect(config: &RouterConfig, base_dir: &Path) -> ShardResult<Self> {
        let locator = config.locator()?;
        let mut shards = Vec::with_capacity(config.shards.len());
        for (index, shard) in config.shards.iter().enumerate() {
            shards.push(
                ShardHandle::connect(ShardId(index), shard, config.pool.as_ref(), base_dir).await?,
            );
        }
        let router = Self::new(shards, locator)?;
        router.bootstrap().await?;
        log::info!("dataset router ready with {} shard(s)", router.shards.len());
        Ok(router)
    }

    pub fn new(shards: Vec<ShardHandle>, locator: ShardLocator) -> ShardResult<Self> {
        if shards.len() != locator.shard_count() {
            return Err(ShardError::config(format!(
                "layout expects {} shard(s), got {}",
                locator.shard_count(),
                shards.len()
            )));
        }
        if let Some((index, shard)) = shards
            .iter()
            .enumerate()
            .find(|(index, shard)| shard.id().index() != *index)
        {
            return Err(ShardError::config(format!(
                "shard '{}' is {} but sits at position {index}",
                shard.name(),
                shard.id()
            )));
        }
        Ok(Self { shards, locator })
    }

    pub async fn bootstrap(&self) -> ShardResult<()> {
        for shard in &self.shards {
            bootstrap_tables(shard, &self.locator).await?;
        }
        Ok(())
    }

    pub fn locator(&self) -> &ShardLocator {
        &self.locator
    }

    pub fn shards(&self) -> &[ShardHandle] {
        &self.shards
    }

    pub async fn insert_record(&self, record: DatasetRecord) -> ShardResult<()> {
        let dataset = record.dataset();
        self.insert(dataset.as_str(), record.into_row()).await
    }

    /// Replaces a dataset with already-typed rows.
    pub async fn import_rows(&self, dataset: &str, rows: Vec<Row>) -> ShardResult<ImportReport> {
        let dataset = LogicalDataset::parse(dataset)?;
        self.replace(dataset, rows, 0).await
    }

    async fn replace(
        &self,
        dataset: LogicalDataset,
        rows: Vec<Row>,
        skipped: u64,
    ) -> ShardResult<ImportReport> {
        let mut skipped = skipped;
        let rows = rows
            .into_iter()
            .filter(|row| {
                let keep = row.dataset() == dataset;
                if !keep {
                    log::warn!("skipping {} row offered to {dataset}", row.dataset());
                    skipped += 1;
                }
                keep
            })
            .collect::<Vec<_>>();
        log::debug!(
            "import {dataset}: {} row(s) across {} shard(s)",
            rows.len(),
            self.locator.span(dataset)
        );
        let report = self
            .scatter(dataset)?
            .replace_all(rows, &self.locator)
            .await?;
        Ok(ImportReport {
            inserted: report.inserted,
            skipped: report.skipped + skipped,
        })
    }

    fn executor(&self, dataset: LogicalDataset, shard: ShardId) -> ShardResult<ShardExecutor<'_>> {
        let table = self.locator.physical_table(dataset, shard)?;
        let handle = self
            .shards
            .get(shard.index())
            .ok_or_else(|| ShardError::config(format!("{shard} is not connected")))?;
        Ok(ShardExecutor::new(handle, dataset, table))
    }

    fn scatter(&self, dataset: LogicalDataset) -> ShardResult<ScatterGather<'_>> {
        let executors = self
            .locator
            .shards_for(dataset)
            .into_iter()
            .map(|shard| self.executor(dataset, shard))
            .collect::<ShardResult<Vec<_>>>()?;
        Ok(ScatterGather::new(dataset, executors))
    }

    fn route(&self, condition: &ResolvedCondition) -> Route {
        let dataset = condition.dataset();
        if !self.locator.is_sharded(dataset) {
            return Route::Single(ShardId(0));
        }
        match condition.partition_value() {
            Some(value) => Route::Single(self.locator.locate(dataset, Some(value))),
            None => Route::Scatter,
        }
    }

    async fn read_matching(
        &self,
        condition: &ResolvedCondition,
        column: Option<&'static ColumnSpec>,
    ) -> ShardResult<ReadOutput> {
        let dataset = condition.dataset();
        let route = self.route(condition);
        log::debug!("read {dataset} via {route:?}");
        match (route, column) {
            (Route::Single(shard), Some(column)) => {
                let value = self
                    .executor(dataset, shard)?
                    .select_first(condition, column)
                    .await?;
                Ok(ReadOutput::Value(value.flatten()))
            }
            (Route::Single(shard), None) => {
                let rows = self
                    .executor(dataset, shard)?
                    .select_rows(Some(condition), None)
                    .await?;
                Ok(ReadOutput::Rows(rows))
            }
            (Route::Scatter, Some(column)) => {
                let value = self.scatter(dataset)?.first_value(condition, column).await?;
                Ok(ReadOutput::Value(value))
            }
            (Route::Scatter, None) => {
                let rows = self.scatter(dataset)?.select_all(Some(condition), None).await?;
                Ok(ReadOutput::Rows(rows))
            }
        }
    }

    async fn delete_matching(&self, condition: &ResolvedCondition) -> ShardResult<WriteOutcome> {
        let dataset = condition.dataset();
        let route = self.route(condition);
        log::debug!("delete {dataset} via {route:?}");
        let rows_affected = match route {
            Route::Single(shard) => self.executor(dataset, shard)?.delete_rows(condition).await?,
            Route::Scatter => self.scatter(dataset)?.delete_sum(condition).await?,
        };
        Ok(WriteOutcome { rows_affected })
    }
}

#[async_trait]
impl DatasetApi for DatasetRouter {
    async fn read_by_key(
        &self,
        dataset: &str,
        key: &Key,
        projection: &Projection,
    ) -> ShardResult<ReadOutput> {
        let dataset = LogicalDataset::parse(dataset)?;
        let column = projection.resolve(dataset)?;
        match key.to_condition(dataset)? {
            Some(condition) => {
                let resolved = condition.resolve(dataset)?;
                self.read_matching(&resolved, column).await
            }
            None => {
                log::debug!("read {dataset} across {} shard(s)", self.locator.span(dataset));
                let rows = self.scatter(dataset)?.select_all(None, column).await?;
                Ok(ReadOutput::Rows(rows))
            }
        }
    }

    async fn read_by_condition(
        &self,
        dataset: &str,
        condition: &Condition,
        projection: &Projection,
    ) -> ShardResult<ReadOutput> {
        let dataset = LogicalDataset::parse(dataset)?;
        let column = projection.resolve(dataset)?;
        let resolved = condition.resolve(dataset)?;
        self.read_matching(&resolved, column).await
    }

    async fn insert(&self, dataset: &str, row: Row) -> ShardResult<()> {
        let dataset = LogicalDataset::parse(dataset)?;
        if row.dataset() != dataset {
            return Err(ShardError::invalid_key(format!(
                "{} row cannot be inserted into {dataset}",
                row.dataset()
            )));
        }
        row.check_key()?;
        let schema = dataset.schema();
        let shard = self.locator.locate(dataset, row.get(schema.partition_key));
        log::debug!("insert {dataset} on {shard}");
        self.executor(dataset, shard)?.insert_row(&row).await
    }

    async fn update_by_condition(
        &self,
        dataset: &str,
        condition: &Condition,
        target: &str,
        value: Option<Value>,
    ) -> ShardResult<WriteOutcome> {
        let dataset = LogicalDataset::parse(dataset)?;
        let schema = dataset.schema();
        let target = schema.column(target)?;
        if self.locator.is_sharded(dataset) && target.name == schema.partition_key {
            return Err(ShardError::invalid_key(format!(
                "'{}' places {dataset} rows on shards and cannot be updated",
                target.name
            )));
        }
        let value = value
            .map(|value| value.coerce(target.value_type))
            .transpose()?;
        let resolved = condition.resolve(dataset)?;
        let route = self.route(&resolved);
        log::debug!("update {dataset}.{} via {route:?}", target.name);
        let rows_affected = match route {
            Route::Single(shard) => {
                self.executor(dataset, shard)?
                    .update_column(&resolved, target, value.as_ref())
                    .await?
            }
            Route::Scatter => {
                self.scatter(dataset)?
                    .update_sum(&resolved, target, value.as_ref())
                    .await?
            }
        };
        Ok(WriteOutcome { rows_affected })
    }

    async fn delete_by_key(&self, dataset: &str, key: &Key) -> ShardResult<WriteOutcome> {
        let dataset = LogicalDataset::parse(dataset)?;
        let condition = key.to_condition(dataset)?.ok_or_else(|| {
            ShardError::invalid_key("delete needs a concrete key, not '*'")
        })?;
        let resolved = condition.resolve(dataset)?;
        self.delete_matching(&resolved).await
    }

    async fn delete_by_condition(
        &self,
        dataset: &str,
        condition: &Condition,
    ) -> ShardResult<WriteOutcome> {
        let dataset = LogicalDataset::parse(dataset)?;
        let resolved = condition.resolve(dataset)?;
        self.delete_matching(&resolved).await
    }

    async fn export(&self, dataset: &str) -> ShardResult<Vec<Row>> {
        let dataset = LogicalDataset::parse(dataset)?;
        log::debug!("export {dataset} across {} shard(s)", self.locator.span(dataset));
        self.scatter(dataset)?.select_all(None, None).await
    }

    async fn import(&self, dataset: &str, records: Vec<JsonValue>) -> ShardResult<ImportReport> {
        let dataset = LogicalDataset::parse(dataset)?;
        let mut skipped = 0;
        let mut rows = Vec::with_capacity(records.len());
        for record in records {
            let Some(object) = record.as_object() else {
                log::warn!("skipping non-object {dataset} record");
                skipped += 1;
                continue;
            };
            match Row::from_json(dataset, object) {
                Ok(row) => rows.push(row),
                Err(err) => {
                    log::warn!("skipping {dataset} record: {err}");
                    skipped += 1;
                }
            }
        }
        self.replace(dataset, rows, skipped).await
    }
}

#[cfg(test)]
mod tests {
    use super::{DatasetRouter, Route};
    use crate::shard::ShardHandle;
    use roomdb_shard_core::{Condition, LogicalDataset, ShardError, ShardId, ShardLocator};

    async fn memory_router(unsharded: Option<LogicalDataset>) -> DatasetRouter {
        let mut shards = Vec::new();
        for index in 0..2 {
            let conn = sea_orm::Database::connect("sqlite::memory:")
                .await
                .expect("connect");
            shards.push(ShardHandle::from_connection(ShardId(index), format!("mem{index}"), conn));
        }
        let mut locator = ShardLocator::new(2).unwrap();
        if let Some(dataset) = unsharded {
            locator = locator.with_unsharded(dataset);
        }
        DatasetRouter::new(shards, locator).expect("router")
    }

    #[tokio::test]
    async fn partition_key_conditions_route_to_one_shard() {
        let router = memory_router(None).await;
        let pinned = Condition::eq("room_id", "r1")
            .and("user_id", "alice")
            .resolve(LogicalDataset::Permission)
            .unwrap();
        assert!(matches!(router.route(&pinned), Route::Single(_)));
        let loose = Condition::eq("user_id", "alice")
            .resolve(LogicalDataset::Permission)
            .unwrap();
        assert_eq!(router.route(&loose), Route::Scatter);
    }

    #[tokio::test]
    async fn unsharded_dataset_never_scatters() {
        let router = memory_router(Some(LogicalDataset::User)).await;
        let condition = Condition::eq("email", "a@example.com")
            .resolve(LogicalDataset::User)
            .unwrap();
        assert_eq!(router.route(&condition), Route::Single(ShardId(0)));
    }

    #[tokio::test]
    async fn shard_count_must_match_layout() {
        let conn = sea_orm::Database::connect("sqlite::memory:")
            .await
            .expect("connect");
        let shards = vec![ShardHandle::from_connection(ShardId(0), "only", conn)];
        let result = DatasetRouter::new(shards, ShardLocator::new(2).unwrap());
        assert!(matches!(result, Err(ShardError::Config { .. })));
    }
}
