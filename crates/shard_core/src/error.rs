use thiserror::Error;

use crate::ShardId;

#[derive(Debug, Error)]
pub enum ShardError {
    #[error("unknown dataset: {name}")]
    UnknownDataset { name: String },
    #[error("invalid key shape: {message}")]
    InvalidKeyShape { message: String },
    #[error("constraint violation on {dataset} ({shard}, {operation}): {message}")]
    ConstraintViolation {
        dataset: String,
        shard: ShardId,
        operation: &'static str,
        message: String,
    },
    #[error("shard unavailable: {dataset} ({shard}, {operation}): {message}")]
    ShardUnavailable {
        dataset: String,
        shard: ShardId,
        operation: &'static str,
        message: String,
    },
    #[error(
        "scatter {operation} on {dataset} failed on {} shard(s) after {} completed: {}",
        .failures.len(),
        .completed.len(),
        render_failures(.failures)
    )]
    PartialScatterFailure {
        dataset: String,
        operation: &'static str,
        completed: Vec<ShardId>,
        failures: Vec<(ShardId, String)>,
    },
    #[error("config error: {message}")]
    Config { message: String },
    #[error("codec error: {message}")]
    Codec { message: String },
}

impl ShardError {
    pub fn unknown_dataset(name: impl Into<String>) -> Self {
        Self::UnknownDataset { name: name.into() }
    }

    pub fn invalid_key(message: impl Into<String>) -> Self {
        Self::InvalidKeyShape {
            message: message.into(),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec {
            message: message.into(),
        }
    }

    pub fn unavailable(
        dataset: impl Into<String>,
        shard: ShardId,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::ShardUnavailable {
            dataset: dataset.into(),
            shard,
            operation,
            message: message.into(),
        }
    }

    pub fn constraint(
        dataset: impl Into<String>,
        shard: ShardId,
        operation: &'static str,
        message: impl Into<String>,
    ) -> Self {
        Self::ConstraintViolation {
            dataset: dataset.into(),
            shard,
            operation,
            message: message.into(),
        }
    }

    /// Errors the caller can fix by changing the request, as opposed to
    /// failures of a shard or of the deployment.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::UnknownDataset { .. }
                | Self::InvalidKeyShape { .. }
                | Self::ConstraintViolation { .. }
                | Self::Codec { .. }
        )
    }
}

fn render_failures(failures: &[(ShardId, String)]) -> String {
    failures
        .iter()
        .map(|(shard, message)| format!("{shard}: {message}"))
        .collect::<Vec<_>>()
        .join("; ")
}

pub type ShardResult<T> = Result<T, ShardError>;
