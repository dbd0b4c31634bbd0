use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use roomdb_shard_core::{LogicalDataset, ShardError, ShardLocator, ShardResult};

const DEFAULT_CONFIG_NAME: &str = "roomdb.json";
const DEFAULT_SHARD_FILES: [&str; 2] = ["shard_0.sqlite", "shard_1.sqlite"];

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum DatabaseConfig {
    Sqlite { path: Option<String> },
    Postgres { url: String },
    Mysql { url: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PoolConfig {
    pub max_connections: Option<u32>,
    pub min_connections: Option<u32>,
    pub connect_timeout_ms: Option<u64>,
    pub acquire_timeout_ms: Option<u64>,
    pub idle_timeout_ms: Option<u64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ShardConfig {
    pub name: String,
    pub database: DatabaseConfig,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct DatasetLayoutConfig {
    #[serde(default)]
    pub unsharded: Vec<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RouterConfig {
    pub shards: Vec<ShardConfig>,
    pub pool: Option<PoolConfig>,
    pub datasets: Option<DatasetLayoutConfig>,
}

impl ShardConfig {
    pub fn sqlite(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            database: DatabaseConfig::Sqlite {
                path: Some(path.into()),
            },
        }
    }

    pub fn backend_name(&self) -> &'static str {
        match self.database {
            DatabaseConfig::Sqlite { .. } => "sqlite",
            DatabaseConfig::Postgres { .. } => "postgres",
            DatabaseConfig::Mysql { .. } => "mysql",
        }
    }

    pub fn sqlite_path(&self, base_dir: &Path) -> ShardResult<PathBuf> {
        match &self.database {
            DatabaseConfig::Sqlite { path } => {
                let path = path
                    .clone()
                    .unwrap_or_else(|| format!("{}.sqlite", self.name));
                let candidate = PathBuf::from(path);
                if candidate.is_absolute() {
                    Ok(candidate)
                } else {
                    Ok(base_dir.join(candidate))
                }
            }
            _ => Err(ShardError::config(format!(
                "shard '{}' is not a sqlite backend",
                self.name
            ))),
        }
    }

    pub fn connection_url(&self, base_dir: &Path) -> ShardResult<String> {
        match &self.database {
            DatabaseConfig::Sqlite { .. } => {
                let path = self.sqlite_path(base_dir)?;
                Ok(format!("sqlite://{}?mode=rwc", path.display()))
            }
            DatabaseConfig::Postgres { url } | DatabaseConfig::Mysql { url } => Ok(url.clone()),
        }
    }
}

impl RouterConfig {
    /// Two SQLite shards; relative paths resolve against the base dir.
    pub fn sqlite_pair(first: impl Into<String>, second: impl Into<String>) -> Self {
        Self {
            shards: vec![
                ShardConfig::sqlite("og1", first),
                ShardConfig::sqlite("og2", second),
            ],
            pool: None,
            datasets: None,
        }
    }

    pub fn load_or_init(base_dir: &Path) -> ShardResult<Self> {
        fs::create_dir_all(base_dir)
            .map_err(|err| ShardError::config(format!("create config dir: {err}")))?;
        let config_path = base_dir.join(DEFAULT_CONFIG_NAME);
        if config_path.exists() {
            let raw = fs::read_to_string(&config_path)
                .map_err(|err| ShardError::config(format!("read config: {err}")))?;
            let config: RouterConfig = serde_json::from_str(&raw)
                .map_err(|err| ShardError::config(format!("parse config: {err}")))?;
            config.validate()?;
            return Ok(config);
        }
        let default = RouterConfig::sqlite_pair(DEFAULT_SHARD_FILES[0], DEFAULT_SHARD_FILES[1]);
        let payload = serde_json::to_string_pretty(&default)
            .map_err(|err| ShardError::config(format!("serialize config: {err}")))?;
        fs::write(&config_path, payload)
            .map_err(|err| ShardError::config(format!("write config: {err}")))?;
        Ok(default)
    }

    pub fn validate(&self) -> ShardResult<()> {
        self.locator().map(|_| ())
    }

    pub fn unsharded_datasets(&self) -> ShardResult<Vec<LogicalDataset>> {
        let Some(layout) = &self.datasets else {
            return Ok(Vec::new());
        };
        layout
            .unsharded
            .iter()
            .map(|name| {
                LogicalDataset::parse(name).map_err(|_| {
                    ShardError::config(format!("unknown dataset '{name}' in layout"))
                })
            })
            .collect()
    }

    pub fn locator(&self) -> ShardResult<ShardLocator> {
        let locator = ShardLocator::new(self.shards.len())?;
        Ok(self
            .unsharded_datasets()?
            .into_iter()
            .fold(locator, ShardLocator::with_unsharded))
    }
}
