use std::fmt;

use serde::{Deserialize, Serialize};

/// Position of a shard in the configured, ordered shard list.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
pub struct ShardId(pub usize);

impl ShardId {
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard-{}", self.0)
    }
}

#[derive(Clone, Debug, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PhysicalTable {
    pub shard: ShardId,
    pub table: String,
}

impl PhysicalTable {
    pub fn new(shard: ShardId, table: impl Into<String>) -> Self {
        Self {
            shard,
            table: table.into(),
        }
    }
}

impl fmt::Display for PhysicalTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.shard, self.table)
    }
}
