use std::fmt;

use serde::ser::SerializeMap;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::{Map as JsonMap, Value as JsonValue};
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{OffsetDateTime, PrimitiveDateTime, UtcOffset};

use crate::{LogicalDataset, ShardError, ShardResult, WILDCARD};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Str,
    Int,
    Timestamp,
}

#[derive(Clone, Debug, PartialEq)]
pub enum Value {
    Str(String),
    Int(i64),
    Timestamp(PrimitiveDateTime),
}

impl Value {
    pub fn value_type(&self) -> ValueType {
        match self {
            Value::Str(_) => ValueType::Str,
            Value::Int(_) => ValueType::Int,
            Value::Timestamp(_) => ValueType::Timestamp,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Textual form used when a value has to act as a partition key.
    pub fn key_text(&self) -> String {
        match self {
            Value::Str(value) => value.clone(),
            Value::Int(value) => value.to_string(),
            Value::Timestamp(value) => format_timestamp(*value),
        }
    }

    /// Re-types a loosely typed value (strings from a query string, JSON
    /// numbers) to the declared column type.
    pub fn coerce(self, target: ValueType) -> ShardResult<Value> {
        match (self, target) {
            (value, target) if value.value_type() == target => Ok(value),
            (Value::Int(value), ValueType::Str) => Ok(Value::Str(value.to_string())),
            (Value::Str(value), ValueType::Int) => value
                .trim()
                .parse::<i64>()
                .map(Value::Int)
                .map_err(|_| ShardError::codec(format!("'{value}' is not an integer"))),
            (Value::Str(value), ValueType::Timestamp) => parse_timestamp(&value).map(Value::Timestamp),
            (value, target) => Err(ShardError::codec(format!(
                "cannot use {:?} value as {target:?}",
                value.value_type()
            ))),
        }
    }

    /// Types a JSON scalar by the column it is destined for. `null` maps to
    /// `None`, which callers treat as "field absent".
    pub fn from_json(target: ValueType, json: &JsonValue) -> ShardResult<Option<Value>> {
        let value = match json {
            JsonValue::Null => return Ok(None),
            JsonValue::String(text) => Value::Str(text.clone()),
            JsonValue::Number(number) => match number.as_i64() {
                Some(value) => Value::Int(value),
                None => {
                    return Err(ShardError::codec(format!(
                        "number {number} is not a 64-bit integer"
                    )));
                }
            },
            other => {
                return Err(ShardError::codec(format!(
                    "unsupported JSON value {other} for {target:?} column"
                )));
            }
        };
        value.coerce(target).map(Some)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(value) => f.write_str(value),
            Value::Int(value) => write!(f, "{value}"),
            Value::Timestamp(value) => f.write_str(&format_timestamp(*value)),
        }
    }
}

impl Serialize for Value {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match self {
            Value::Str(value) => serializer.serialize_str(value),
            Value::Int(value) => serializer.serialize_i64(*value),
            Value::Timestamp(value) => serializer.serialize_str(&format_timestamp(*value)),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Str(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Int(value)
    }
}

impl From<PrimitiveDateTime> for Value {
    fn from(value: PrimitiveDateTime) -> Self {
        Value::Timestamp(value)
    }
}

pub fn format_timestamp(value: PrimitiveDateTime) -> String {
    value
        .assume_utc()
        .format(&Rfc3339)
        .unwrap_or_else(|_| value.to_string())
}

/// Accepts RFC 3339 (normalised to UTC) and the plain SQL
/// `YYYY-MM-DD HH:MM:SS` / `YYYY-MM-DDTHH:MM:SS` forms.
pub fn parse_timestamp(text: &str) -> ShardResult<PrimitiveDateTime> {
    if let Ok(value) = OffsetDateTime::parse(text, &Rfc3339) {
        let utc = value.to_offset(UtcOffset::UTC);
        return Ok(PrimitiveDateTime::new(utc.date(), utc.time()));
    }
    let spaced = format_description!("[year]-[month]-[day] [hour]:[minute]:[second]");
    if let Ok(value) = PrimitiveDateTime::parse(text, spaced) {
        return Ok(value);
    }
    let fractional = format_description!("[year]-[month]-[day] [hour]:[minute]:[second].[subsecond]");
    if let Ok(value) = PrimitiveDateTime::parse(text, fractional) {
        return Ok(value);
    }
    let t_separated = format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]");
    PrimitiveDateTime::parse(text, t_separated)
        .map_err(|err| ShardError::codec(format!("invalid timestamp '{text}': {err}")))
}

/// One row of a logical dataset. Slots follow the dataset's column order;
/// an empty slot means the field is absent (SQL NULL or not projected).
#[derive(Clone, Debug, PartialEq)]
pub struct Row {
    dataset: LogicalDataset,
    values: Vec<Option<Value>>,
}

impl Row {
    pub fn new(dataset: LogicalDataset) -> Self {
        Self {
            dataset,
            values: vec![None; dataset.schema().columns.len()],
        }
    }

    pub fn dataset(&self) -> LogicalDataset {
        self.dataset
    }

    pub fn get(&self, column: &str) -> Option<&Value> {
        let index = self.dataset.schema().position(column)?;
        self.values[index].as_ref()
    }

    pub fn contains(&self, column: &str) -> bool {
        self.get(column).is_some()
    }

    pub fn is_empty(&self) -> bool {
        self.values.iter().all(Option::is_none)
    }

    pub fn len(&self) -> usize {
        self.values.iter().filter(|value| value.is_some()).count()
    }

    /// Sets a field after checking the column exists and the value matches
    /// its declared type.
    pub fn set(&mut self, column: &str, value: impl Into<Value>) -> ShardResult<()> {
        let schema = self.dataset.schema();
        let spec = schema.column(column)?;
        let value = value.into().coerce(spec.value_type)?;
        if let Some(index) = schema.position(column) {
            self.values[index] = Some(value);
        }
        Ok(())
    }

    pub fn with(mut self, column: &str, value: impl Into<Value>) -> ShardResult<Self> {
        self.set(column, value)?;
        Ok(self)
    }

    /// Every primary-key column must be present and must not hold the
    /// reserved wildcard, or the row could never be addressed by key.
    pub fn check_key(&self) -> ShardResult<()> {
        for name in self.dataset.schema().primary_key {
            match self.get(name) {
                None => {
                    return Err(ShardError::invalid_key(format!(
                        "{} row is missing key column '{name}'",
                        self.dataset
                    )));
                }
                Some(value) if value.as_str() == Some(WILDCARD) => {
                    return Err(ShardError::invalid_key(format!(
                        "'{WILDCARD}' is reserved and cannot be stored in key column '{name}'"
                    )));
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Present fields in schema order.
    pub fn iter(&self) -> impl Iterator<Item = (&'static str, &Value)> + '_ {
        self.dataset
            .schema()
            .columns
            .iter()
            .zip(self.values.iter())
            .filter_map(|(column, value)| value.as_ref().map(|value| (column.name, value)))
    }

    /// Keeps only the named column.
    pub fn project(&self, column: &str) -> Row {
        let mut projected = Row::new(self.dataset);
        if let Some(index) = self.dataset.schema().position(column) {
            projected.values[index] = self.values[index].clone();
        }
        projected
    }

    pub fn from_json(dataset: LogicalDataset, object: &JsonMap<String, JsonValue>) -> ShardResult<Row> {
        let schema = dataset.schema();
        let mut row = Row::new(dataset);
        for (name, json) in object {
            let spec = schema.column(name)?;
            let value = Value::from_json(spec.value_type, json)
                .map_err(|err| ShardError::codec(format!("{dataset}.{name}: {err}")))?;
            if let (Some(index), Some(value)) = (schema.position(name), value) {
                row.values[index] = Some(value);
            }
        }
        Ok(row)
    }

    pub fn to_json(&self) -> JsonValue {
        let object = self
            .iter()
            .map(|(name, value)| {
                let json = match value {
                    Value::Str(value) => JsonValue::String(value.clone()),
                    Value::Int(value) => JsonValue::from(*value),
                    Value::Timestamp(value) => JsonValue::String(format_timestamp(*value)),
                };
                (name.to_string(), json)
            })
            .collect::<JsonMap<_, _>>();
        JsonValue::Object(object)
    }
}

impl Serialize for Row {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut map = serializer.serialize_map(Some(self.len()))?;
        for (name, value) in self.iter() {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use time::macros::datetime;

    use super::{Row, Value, ValueType, parse_timestamp};
    use crate::{LogicalDataset, ShardError};

    #[test]
    fn row_keeps_schema_order_regardless_of_insert_order() {
        let row = Row::new(LogicalDataset::User)
            .with("password", "secret")
            .and_then(|row| row.with("id", "u5"))
            .expect("row");
        let names = row.iter().map(|(name, _)| name).collect::<Vec<_>>();
        assert_eq!(names, vec!["id", "password"]);
        assert_eq!(row.len(), 2);
        assert!(!row.contains("email"));
    }

    #[test]
    fn set_rejects_unknown_columns_and_type_mismatches() {
        let mut row = Row::new(LogicalDataset::Permission);
        let err = row.set("role", "admin").unwrap_err();
        assert!(matches!(err, ShardError::InvalidKeyShape { .. }));
        let err = row.set("permission", "write").unwrap_err();
        assert!(matches!(err, ShardError::Codec { .. }));
        row.set("permission", "2").expect("numeric string coerces");
        assert_eq!(row.get("permission"), Some(&Value::Int(2)));
    }

    #[test]
    fn json_null_means_absent() {
        let object = json!({
            "room_id": "r1",
            "room_name": "Design",
            "create_time": null,
            "overall_permission": 3
        });
        let row = Row::from_json(LogicalDataset::Document, object.as_object().unwrap())
            .expect("row");
        assert!(!row.contains("create_time"));
        assert_eq!(row.get("overall_permission").and_then(Value::as_i64), Some(3));
        assert_eq!(
            row.to_json(),
            json!({"room_id": "r1", "room_name": "Design", "overall_permission": 3})
        );
    }

    #[test]
    fn timestamps_accept_rfc3339_and_sql_forms() {
        let expected = datetime!(2024-05-01 10:30:00);
        assert_eq!(parse_timestamp("2024-05-01T10:30:00Z").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-05-01T12:30:00+02:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-05-01 10:30:00").unwrap(), expected);
        assert_eq!(parse_timestamp("2024-05-01 10:30:00.0").unwrap(), expected);
        assert!(parse_timestamp("yesterday").is_err());
        let value = Value::Str("2024-05-01 10:30:00".into())
            .coerce(ValueType::Timestamp)
            .unwrap();
        assert_eq!(serde_json::to_value(&value).unwrap(), json!("2024-05-01T10:30:00Z"));
    }

    #[test]
    fn key_check_rejects_missing_and_wildcard_components() {
        let complete = Row::new(LogicalDataset::Permission)
            .with("room_id", "r1")
            .and_then(|row| row.with("user_id", "alice"))
            .unwrap();
        assert!(complete.check_key().is_ok());
        let partial = Row::new(LogicalDataset::Permission)
            .with("room_id", "r1")
            .unwrap();
        assert!(matches!(partial.check_key(), Err(ShardError::InvalidKeyShape { .. })));
        let reserved = Row::new(LogicalDataset::Permission)
            .with("room_id", "r1")
            .and_then(|row| row.with("user_id", "*"))
            .unwrap();
        assert!(matches!(reserved.check_key(), Err(ShardError::InvalidKeyShape { .. })));
    }

    #[test]
    fn projection_keeps_a_single_column() {
        let row = Row::new(LogicalDataset::Content)
            .with("room_id", "r1")
            .and_then(|row| row.with("content", "# notes"))
            .unwrap();
        let projected = row.project("content");
        assert_eq!(projected.len(), 1);
        assert_eq!(projected.get("content").and_then(Value::as_str), Some("# notes"));
    }
}
