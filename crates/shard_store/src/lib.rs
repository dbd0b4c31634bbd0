pub mod bootstrap;
mod codec;
pub mod config;
pub mod datastore;
pub mod executor;
pub mod router;
pub mod scatter;
pub mod shard;

pub use roomdb_shard_core::*;
pub use bootstrap::bootstrap_tables;
pub use config::{DatabaseConfig, DatasetLayoutConfig, PoolConfig, RouterConfig, ShardConfig};
pub use datastore::{load_or_init_config, open_router, sqlite_shard_paths};
pub use executor::ShardExecutor;
pub use router::DatasetRouter;
pub use scatter::ScatterGather;
pub use shard::ShardHandle;
