use std::path::Path;
use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection};

use crate::config::{PoolConfig, ShardConfig};
use roomdb_shard_core::{ShardError, ShardId, ShardResult};

/// One independent database holding a slice of every sharded dataset.
#[derive(Clone, Debug)]
pub struct ShardHandle {
    id: ShardId,
    name: String,
    conn: DatabaseConnection,
}

impl ShardHandle {
    pub async fn connect(
        id: ShardId,
        config: &ShardConfig,
        pool: Option<&PoolConfig>,
        base_dir: &Path,
    ) -> ShardResult<Self> {
        let url = config.connection_url(base_dir)?;
        let mut options = ConnectOptions::new(url);
        options.sqlx_logging(false);
        if let Some(pool) = pool {
            if let Some(max) = pool.max_connections {
                options.max_connections(max);
            }
            if let Some(min) = pool.min_connections {
                options.min_connections(min);
            }
            if let Some(timeout_ms) = pool.connect_timeout_ms {
                options.connect_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.acquire_timeout_ms {
                options.acquire_timeout(Duration::from_millis(timeout_ms));
            }
            if let Some(timeout_ms) = pool.idle_timeout_ms {
                options.idle_timeout(Duration::from_millis(timeout_ms));
            }
        }
        let conn = Database::connect(options).await.map_err(|err| {
            ShardError::unavailable(config.name.clone(), id, "connect", err.to_string())
        })?;
        log::info!(
            "connected {id} ({}) on {}",
            config.name,
            config.backend_name()
        );
        Ok(Self::from_connection(id, config.name.clone(), conn))
    }

    pub fn from_connection(id: ShardId, name: impl Into<String>, conn: DatabaseConnection) -> Self {
        Self {
            id,
            name: name.into(),
            conn,
        }
    }

    pub fn id(&self) -> ShardId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn connection(&self) -> &DatabaseConnection {
        &self.conn
    }
}
