//! Static dataset schemas. Every table and column identifier that ever
//! reaches a statement comes from here.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::{ShardError, ShardResult, ValueType};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogicalDataset {
    User,
    Document,
    Permission,
    Content,
}

impl LogicalDataset {
    pub const ALL: [LogicalDataset; 4] = [
        LogicalDataset::User,
        LogicalDataset::Document,
        LogicalDataset::Permission,
        LogicalDataset::Content,
    ];

    /// Accepts the canonical names and the legacy `*_table` aliases.
    pub fn parse(name: &str) -> ShardResult<Self> {
        match name {
            "user" | "user_table" => Ok(Self::User),
            "document" | "user_room_table" => Ok(Self::Document),
            "permission" | "room_permission_table" => Ok(Self::Permission),
            "content" | "room_content_table" => Ok(Self::Content),
            other => Err(ShardError::unknown_dataset(other)),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Document => "document",
            Self::Permission => "permission",
            Self::Content => "content",
        }
    }

    pub fn schema(self) -> &'static DatasetSchema {
        match self {
            Self::User => &USER_SCHEMA,
            Self::Document => &DOCUMENT_SCHEMA,
            Self::Permission => &PERMISSION_SCHEMA,
            Self::Content => &CONTENT_SCHEMA,
        }
    }
}

impl fmt::Display for LogicalDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LogicalDataset {
    type Err = ShardError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Value bound for a column the caller did not supply on insert.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ColumnDefault {
    EmptyString,
    Null,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ColumnSpec {
    pub name: &'static str,
    pub value_type: ValueType,
    pub max_len: Option<u32>,
    pub default: ColumnDefault,
}

impl ColumnSpec {
    const fn varchar(name: &'static str, len: u32, default: ColumnDefault) -> Self {
        Self {
            name,
            value_type: ValueType::Str,
            max_len: Some(len),
            default,
        }
    }

    const fn text(name: &'static str) -> Self {
        Self {
            name,
            value_type: ValueType::Str,
            max_len: None,
            default: ColumnDefault::Null,
        }
    }

    const fn int(name: &'static str) -> Self {
        Self {
            name,
            value_type: ValueType::Int,
            max_len: None,
            default: ColumnDefault::Null,
        }
    }

    const fn timestamp(name: &'static str) -> Self {
        Self {
            name,
            value_type: ValueType::Timestamp,
            max_len: None,
            default: ColumnDefault::Null,
        }
    }
}

#[derive(Debug)]
pub struct DatasetSchema {
    pub dataset: LogicalDataset,
    pub columns: &'static [ColumnSpec],
    pub primary_key: &'static [&'static str],
    pub partition_key: &'static str,
}

impl DatasetSchema {
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name == name)
    }

    /// Resolves a caller-supplied column name against the allow-list.
    pub fn column(&self, name: &str) -> ShardResult<&'static ColumnSpec> {
        self.columns
            .iter()
            .find(|column| column.name == name)
            .ok_or_else(|| {
                ShardError::invalid_key(format!(
                    "column '{name}' is not part of dataset '{}'",
                    self.dataset
                ))
            })
    }

    pub fn partition_column(&self) -> &'static ColumnSpec {
        self.columns
            .iter()
            .find(|column| column.name == self.partition_key)
            .unwrap_or(&self.columns[0])
    }

    pub fn primary_key_columns(&self) -> impl Iterator<Item = &'static ColumnSpec> + '_ {
        self.primary_key.iter().filter_map(|name| {
            self.columns
                .iter()
                .find(|column| column.name == *name)
        })
    }

    pub fn is_primary_key(&self, name: &str) -> bool {
        self.primary_key.contains(&name)
    }
}

static USER_COLUMNS: [ColumnSpec; 4] = [
    ColumnSpec::varchar("id", 64, ColumnDefault::EmptyString),
    ColumnSpec::varchar("user_name", 64, ColumnDefault::EmptyString),
    ColumnSpec::varchar("email", 100, ColumnDefault::EmptyString),
    ColumnSpec::varchar("password", 256, ColumnDefault::EmptyString),
];

static DOCUMENT_COLUMNS: [ColumnSpec; 5] = [
    ColumnSpec::varchar("room_id", 64, ColumnDefault::Null),
    ColumnSpec::varchar("room_name", 128, ColumnDefault::Null),
    ColumnSpec::timestamp("create_time"),
    ColumnSpec::int("overall_permission"),
    ColumnSpec::varchar("owner_user_id", 64, ColumnDefault::Null),
];

static PERMISSION_COLUMNS: [ColumnSpec; 3] = [
    ColumnSpec::varchar("room_id", 64, ColumnDefault::Null),
    ColumnSpec::varchar("user_id", 64, ColumnDefault::Null),
    ColumnSpec::int("permission"),
];

static CONTENT_COLUMNS: [ColumnSpec; 2] = [
    ColumnSpec::varchar("room_id", 64, ColumnDefault::Null),
    ColumnSpec::text("content"),
];

pub static USER_SCHEMA: DatasetSchema = DatasetSchema {
    dataset: LogicalDataset::User,
    columns: &USER_COLUMNS,
    primary_key: &["id"],
    partition_key: "id",
};

pub static DOCUMENT_SCHEMA: DatasetSchema = DatasetSchema {
    dataset: LogicalDataset::Document,
    columns: &DOCUMENT_COLUMNS,
    primary_key: &["room_id"],
    partition_key: "room_id",
};

pub static PERMISSION_SCHEMA: DatasetSchema = DatasetSchema {
    dataset: LogicalDataset::Permission,
    columns: &PERMISSION_COLUMNS,
    primary_key: &["room_id", "user_id"],
    partition_key: "room_id",
};

pub static CONTENT_SCHEMA: DatasetSchema = DatasetSchema {
    dataset: LogicalDataset::Content,
    columns: &CONTENT_COLUMNS,
    primary_key: &["room_id"],
    partition_key: "room_id",
};
