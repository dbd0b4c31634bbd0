//! Fan-out of one operation over every shard owning a dataset.

use futures::future::join_all;

use crate::executor::ShardExecutor;
use roomdb_shard_core::{
    ColumnSpec, ImportReport, LogicalDataset, ResolvedCondition, Row, ShardError, ShardLocator,
    ShardResult, Value,
};

pub struct ScatterGather<'a> {
    dataset: LogicalDataset,
    executors: Vec<ShardExecutor<'a>>,
}

impl<'a> ScatterGather<'a> {
    /// `executors` must follow shard enumeration order.
    pub fn new(dataset: LogicalDataset, executors: Vec<ShardExecutor<'a>>) -> Self {
        Self { dataset, executors }
    }

    /// Every shard's rows, concatenated in enumeration order.
    pub async fn select_all(
        &self,
        condition: Option<&ResolvedCondition>,
        column: Option<&'static ColumnSpec>,
    ) -> ShardResult<Vec<Row>> {
        let results = join_all(
            self.executors
                .iter()
                .map(|executor| executor.select_rows(condition, column)),
        )
        .await;
        let per_shard = self.merge("select", results)?;
        Ok(per_shard.into_iter().flatten().collect())
    }

    /// First shard with a match wins; later shards are not consulted.
    pub async fn first_value(
        &self,
        condition: &ResolvedCondition,
        column: &'static ColumnSpec,
    ) -> ShardResult<Option<Value>> {
        let mut completed = Vec::new();
        for executor in &self.executors {
            match executor.select_first(condition, column).await {
                Ok(Some(value)) => {
                    log::debug!(
                        "{}.{} first match on {}",
                        self.dataset,
                        column.name,
                        executor.shard_id()
                    );
                    return Ok(value);
                }
                Ok(None) => completed.push(executor.shard_id()),
                Err(err) if self.executors.len() == 1 => return Err(err),
                Err(err) => {
                    log::warn!(
                        "scatter select on {} failed on {}: {err}",
                        self.dataset,
                        executor.shard_id()
                    );
                    return Err(ShardError::PartialScatterFailure {
                        dataset: self.dataset.as_str().to_string(),
                        operation: "select",
                        completed,
                        failures: vec![(executor.shard_id(), err.to_string())],
                    });
                }
            }
        }
        Ok(None)
    }

    pub async fn update_sum(
        &self,
        condition: &ResolvedCondition,
        target: &'static ColumnSpec,
        value: Option<&Value>,
    ) -> ShardResult<u64> {
        let results = join_all(
            self.executors
                .iter()
                .map(|executor| executor.update_column(condition, target, value)),
        )
        .await;
        Ok(self.merge("update", results)?.into_iter().sum())
    }

    pub async fn delete_sum(&self, condition: &ResolvedCondition) -> ShardResult<u64> {
        let results = join_all(
            self.executors
                .iter()
                .map(|executor| executor.delete_rows(condition)),
        )
        .await;
        Ok(self.merge("delete", results)?.into_iter().sum())
    }

    /// Truncates every shard's table and reloads it with the rows the
    /// locator assigns to that shard. Rows whose primary key is incomplete
    /// or holds the wildcard are skipped.
    pub async fn replace_all(
        &self,
        rows: Vec<Row>,
        locator: &ShardLocator,
    ) -> ShardResult<ImportReport> {
        let schema = self.dataset.schema();
        let mut buckets: Vec<Vec<Row>> = vec![Vec::new(); self.executors.len()];
        let mut skipped = 0;
        for row in rows {
            if let Err(err) = row.check_key() {
                log::warn!("skipping {} row: {err}", self.dataset);
                skipped += 1;
                continue;
            }
            let shard = locator.locate(self.dataset, row.get(schema.partition_key));
            match self
                .executors
                .iter()
                .position(|executor| executor.shard_id() == shard)
            {
                Some(index) => buckets[index].push(row),
                None => {
                    log::warn!("skipping {} row routed to unknown {shard}", self.dataset);
                    skipped += 1;
                }
            }
        }
        let results = join_all(
            self.executors
                .iter()
                .zip(buckets.iter())
                .map(|(executor, rows)| executor.truncate_and_bulk_insert(rows)),
        )
        .await;
        let counts = self.merge("import", results)?;
        for (executor, count) in self.executors.iter().zip(counts.iter()) {
            log::info!(
                "imported {count} {} row(s) into {}",
                self.dataset,
                executor.table()
            );
        }
        Ok(ImportReport {
            inserted: counts.into_iter().sum(),
            skipped,
        })
    }

    /// Per-shard results in enumeration order. Any failure aborts the whole
    /// operation; over a single shard the shard's own error is returned.
    fn merge<T>(&self, operation: &'static str, results: Vec<ShardResult<T>>) -> ShardResult<Vec<T>> {
        if self.executors.len() == 1 {
            return results.into_iter().collect();
        }
        let mut values = Vec::with_capacity(results.len());
        let mut completed = Vec::new();
        let mut failures = Vec::new();
        for (executor, result) in self.executors.iter().zip(results) {
            match result {
                Ok(value) => {
                    completed.push(executor.shard_id());
                    values.push(value);
                }
                Err(err) => {
                    log::warn!(
                        "scatter {operation} on {} failed on {}: {err}",
                        self.dataset,
                        executor.shard_id()
                    );
                    failures.push((executor.shard_id(), err.to_string()));
                }
            }
        }
        if failures.is_empty() {
            return Ok(values);
        }
        Err(ShardError::PartialScatterFailure {
            dataset: self.dataset.as_str().to_string(),
            operation,
            completed,
            failures,
        })
    }
}
