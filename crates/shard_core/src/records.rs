use time::PrimitiveDateTime;

use crate::{LogicalDataset, Row, ShardError, ShardResult, Value};

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub id: String,
    pub user_name: String,
    pub email: String,
    pub password: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentRecord {
    pub room_id: String,
    pub room_name: Option<String>,
    pub create_time: Option<PrimitiveDateTime>,
    pub overall_permission: Option<i64>,
    pub owner_user_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PermissionRecord {
    pub room_id: String,
    pub user_id: String,
    pub permission: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ContentRecord {
    pub room_id: String,
    pub content: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum DatasetRecord {
    User(UserRecord),
    Document(DocumentRecord),
    Permission(PermissionRecord),
    Content(ContentRecord),
}

impl DatasetRecord {
    pub fn dataset(&self) -> LogicalDataset {
        match self {
            DatasetRecord::User(_) => LogicalDataset::User,
            DatasetRecord::Document(_) => LogicalDataset::Document,
            DatasetRecord::Permission(_) => LogicalDataset::Permission,
            DatasetRecord::Content(_) => LogicalDataset::Content,
        }
    }

    pub fn from_row(row: &Row) -> ShardResult<Self> {
        Ok(match row.dataset() {
            LogicalDataset::User => DatasetRecord::User(UserRecord {
                id: required_str(row, "id")?,
                user_name: optional_str(row, "user_name").unwrap_or_default(),
                email: optional_str(row, "email").unwrap_or_default(),
                password: optional_str(row, "password").unwrap_or_default(),
            }),
            LogicalDataset::Document => DatasetRecord::Document(DocumentRecord {
                room_id: required_str(row, "room_id")?,
                room_name: optional_str(row, "room_name"),
                create_time: match row.get("create_time") {
                    Some(Value::Timestamp(value)) => Some(*value),
                    _ => None,
                },
                overall_permission: row.get("overall_permission").and_then(Value::as_i64),
                owner_user_id: optional_str(row, "owner_user_id"),
            }),
            LogicalDataset::Permission => DatasetRecord::Permission(PermissionRecord {
                room_id: required_str(row, "room_id")?,
                user_id: required_str(row, "user_id")?,
                permission: row.get("permission").and_then(Value::as_i64),
            }),
            LogicalDataset::Content => DatasetRecord::Content(ContentRecord {
                room_id: required_str(row, "room_id")?,
                content: optional_str(row, "content"),
            }),
        })
    }

    pub fn into_row(self) -> Row {
        let dataset = self.dataset();
        let fields: Vec<(&str, Option<Value>)> = match self {
            DatasetRecord::User(user) => vec![
                ("id", Some(user.id.into())),
                ("user_name", Some(user.user_name.into())),
                ("email", Some(user.email.into())),
                ("password", Some(user.password.into())),
            ],
            DatasetRecord::Document(doc) => vec![
                ("room_id", Some(doc.room_id.into())),
                ("room_name", doc.room_name.map(Value::from)),
                ("create_time", doc.create_time.map(Value::from)),
                ("overall_permission", doc.overall_permission.map(Value::from)),
                ("owner_user_id", doc.owner_user_id.map(Value::from)),
            ],
            DatasetRecord::Permission(perm) => vec![
                ("room_id", Some(perm.room_id.into())),
                ("user_id", Some(perm.user_id.into())),
                ("permission", perm.permission.map(Value::from)),
            ],
            DatasetRecord::Content(content) => vec![
                ("room_id", Some(content.room_id.into())),
                ("content", content.content.map(Value::from)),
            ],
        };
        let mut row = Row::new(dataset);
        for (column, value) in fields {
            if let Some(value) = value {
                // Names and types come from the same static schema.
                let _ = row.set(column, value);
            }
        }
        row
    }
}

macro_rules! record_into_row {
    ($record:ident, $variant:ident) => {
        impl From<$record> for DatasetRecord {
            fn from(value: $record) -> Self {
                DatasetRecord::$variant(value)
            }
        }

        impl From<$record> for Row {
            fn from(value: $record) -> Self {
                DatasetRecord::$variant(value).into_row()
            }
        }
    };
}

record_into_row!(UserRecord, User);
record_into_row!(DocumentRecord, Document);
record_into_row!(PermissionRecord, Permission);
record_into_row!(ContentRecord, Content);

impl From<DatasetRecord> for Row {
    fn from(value: DatasetRecord) -> Self {
        value.into_row()
    }
}

fn required_str(row: &Row, column: &str) -> ShardResult<String> {
    optional_str(row, column).ok_or_else(|| {
        ShardError::invalid_key(format!(
            "{} row is missing key column '{column}'",
            row.dataset()
        ))
    })
}

fn optional_str(row: &Row, column: &str) -> Option<String> {
    row.get(column).and_then(Value::as_str).map(str::to_string)
}
