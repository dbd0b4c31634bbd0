//! Partition-key to shard mapping.
//!
//! The hash is the byte sum of the key's text modulo the shard count. It is
//! part of the on-disk layout: changing it, or the shard count, requires a
//! full re-shard.

use std::collections::BTreeSet;

use crate::{LogicalDataset, PhysicalTable, ShardError, ShardId, ShardResult, Value};

#[derive(Clone, Debug)]
pub struct ShardLocator {
    shard_count: usize,
    unsharded: BTreeSet<LogicalDataset>,
}

impl ShardLocator {
    pub fn new(shard_count: usize) -> ShardResult<Self> {
        if shard_count == 0 {
            return Err(ShardError::config("at least one shard is required"));
        }
        Ok(Self {
            shard_count,
            unsharded: BTreeSet::new(),
        })
    }

    /// Pins a dataset to a single table on the first shard.
    pub fn with_unsharded(mut self, dataset: LogicalDataset) -> Self {
        self.unsharded.insert(dataset);
        self
    }

    pub fn shard_count(&self) -> usize {
        self.shard_count
    }

    pub fn is_sharded(&self, dataset: LogicalDataset) -> bool {
        self.shard_count > 1 && !self.unsharded.contains(&dataset)
    }

    /// Number of shards holding a slice of the dataset.
    pub fn span(&self, dataset: LogicalDataset) -> usize {
        if self.is_sharded(dataset) {
            self.shard_count
        } else {
            1
        }
    }

    pub fn locate(&self, dataset: LogicalDataset, key: Option<&Value>) -> ShardId {
        if !self.is_sharded(dataset) {
            return ShardId(0);
        }
        match key {
            Some(value) => ShardId(shard_hash(&value.key_text(), self.shard_count)),
            None => ShardId(0),
        }
    }

    pub fn physical_table(
        &self,
        dataset: LogicalDataset,
        shard: ShardId,
    ) -> ShardResult<PhysicalTable> {
        if shard.index() >= self.span(dataset) {
            return Err(ShardError::config(format!(
                "dataset '{dataset}' has no table on {shard}"
            )));
        }
        let table = if self.is_sharded(dataset) {
            format!("{}_{}", dataset.as_str(), shard.index())
        } else {
            dataset.as_str().to_string()
        };
        Ok(PhysicalTable::new(shard, table))
    }

    /// Shards owning the dataset, in enumeration order.
    pub fn shards_for(&self, dataset: LogicalDataset) -> Vec<ShardId> {
        (0..self.span(dataset)).map(ShardId).collect()
    }

    /// Every physical table that lives on a shard.
    pub fn tables_on(&self, shard: ShardId) -> Vec<(LogicalDataset, PhysicalTable)> {
        LogicalDataset::ALL
            .into_iter()
            .filter_map(|dataset| {
                self.physical_table(dataset, shard)
                    .ok()
                    .map(|table| (dataset, table))
            })
            .collect()
    }
}

/// Empty keys land on shard 0.
pub fn shard_hash(key: &str, shard_count: usize) -> usize {
    if shard_count <= 1 || key.is_empty() {
        return 0;
    }
    let sum = key
        .bytes()
        .fold(0u64, |acc, byte| acc.wrapping_add(u64::from(byte)));
    (sum % shard_count as u64) as usize
}
