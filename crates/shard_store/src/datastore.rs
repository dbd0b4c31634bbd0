use std::path::{Path, PathBuf};

use crate::{DatasetRouter, RouterConfig, ShardResult};

pub fn load_or_init_config(base: &Path) -> ShardResult<RouterConfig> {
    RouterConfig::load_or_init(base)
}

pub async fn open_router(base: &Path) -> ShardResult<DatasetRouter> {
    let config = load_or_init_config(base)?;
    DatasetRouter::connect(&config, base).await
}

/// SQLite files backing the configured shards, in shard order.
pub fn sqlite_shard_paths(config: &RouterConfig, base: &Path) -> ShardResult<Vec<PathBuf>> {
    config
        .shards
        .iter()
        .map(|shard| shard.sqlite_path(base))
        .collect()
}
