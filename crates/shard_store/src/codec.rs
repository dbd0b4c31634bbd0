//! Translation between dataset rows and driver values.

use sea_orm::sea_query::{SimpleExpr, Value as SeaValue};
use sea_orm::{DbErr, QueryResult};
use time::PrimitiveDateTime;

use roomdb_shard_core::{
    ColumnDefault, ColumnSpec, LogicalDataset, Row, ShardError, ShardResult, Value, ValueType,
    parse_timestamp,
};

pub(crate) fn value_to_sea(value: &Value) -> SeaValue {
    match value {
        Value::Str(text) => SeaValue::String(Some(Box::new(text.clone()))),
        Value::Int(number) => SeaValue::BigInt(Some(*number)),
        Value::Timestamp(stamp) => SeaValue::TimeDateTime(Some(Box::new(*stamp))),
    }
}

pub(crate) fn null_for(value_type: ValueType) -> SeaValue {
    match value_type {
        ValueType::Str => SeaValue::String(None),
        ValueType::Int => SeaValue::BigInt(None),
        ValueType::Timestamp => SeaValue::TimeDateTime(None),
    }
}

/// Bind value for an update target; `None` clears the column.
pub(crate) fn assign_expr(spec: &ColumnSpec, value: Option<&Value>) -> SimpleExpr {
    match value {
        Some(value) => value_to_sea(value).into(),
        None => null_for(spec.value_type).into(),
    }
}

/// Values for every column of the dataset, in schema order. Columns the
/// row leaves empty take the column default.
pub(crate) fn encode_row(row: &Row) -> Vec<SimpleExpr> {
    row.dataset()
        .schema()
        .columns
        .iter()
        .map(|spec| match row.get(spec.name) {
            Some(value) => value_to_sea(value).into(),
            None => match spec.default {
                ColumnDefault::EmptyString => SeaValue::String(Some(Box::new(String::new()))).into(),
                ColumnDefault::Null => null_for(spec.value_type).into(),
            },
        })
        .collect()
}

/// Decodes the selected columns of one result row. `columns` is the
/// projection that was selected, in order.
pub(crate) fn decode_row(
    dataset: LogicalDataset,
    result: &QueryResult,
    columns: &[&'static ColumnSpec],
) -> ShardResult<Row> {
    let mut row = Row::new(dataset);
    for spec in columns {
        if let Some(value) = decode_value(result, spec)? {
            row.set(spec.name, value)?;
        }
    }
    Ok(row)
}

pub(crate) fn decode_value(result: &QueryResult, spec: &ColumnSpec) -> ShardResult<Option<Value>> {
    let name = spec.name;
    let decoded = match spec.value_type {
        ValueType::Str => result
            .try_get::<Option<String>>("", name)
            .map_err(|err| decode_error(name, err))?
            .map(Value::Str),
        ValueType::Int => match result.try_get::<Option<i64>>("", name) {
            Ok(value) => value.map(Value::Int),
            Err(_) => result
                .try_get::<Option<i32>>("", name)
                .map_err(|err| decode_error(name, err))?
                .map(|value| Value::Int(i64::from(value))),
        },
        ValueType::Timestamp => match result.try_get::<Option<PrimitiveDateTime>>("", name) {
            Ok(value) => value.map(Value::Timestamp),
            Err(_) => match result
                .try_get::<Option<String>>("", name)
                .map_err(|err| decode_error(name, err))?
            {
                Some(text) => Some(Value::Timestamp(parse_timestamp(&text)?)),
                None => None,
            },
        },
    };
    Ok(decoded)
}

fn decode_error(column: &str, err: DbErr) -> ShardError {
    ShardError::codec(format!("decode column '{column}': {err}"))
}

#[cfg(test)]
mod tests {
    use sea_orm::sea_query::{SimpleExpr, Value as SeaValue};

    use super::{assign_expr, encode_row};
    use roomdb_shard_core::{LogicalDataset, Row};

    #[test]
    fn missing_user_strings_encode_as_empty() {
        let row = Row::new(LogicalDataset::User).with("id", "u5").unwrap();
        let values = encode_row(&row);
        assert_eq!(values.len(), 4);
        assert_eq!(
            values[0],
            SimpleExpr::Value(SeaValue::String(Some(Box::new("u5".to_string()))))
        );
        assert_eq!(
            values[2],
            SimpleExpr::Value(SeaValue::String(Some(Box::new(String::new()))))
        );
    }

    #[test]
    fn missing_document_fields_encode_as_typed_nulls() {
        let row = Row::new(LogicalDataset::Document)
            .with("room_id", "r1")
            .unwrap();
        let values = encode_row(&row);
        assert_eq!(values[2], SimpleExpr::Value(SeaValue::TimeDateTime(None)));
        assert_eq!(values[3], SimpleExpr::Value(SeaValue::BigInt(None)));
    }

    #[test]
    fn cleared_update_target_binds_null() {
        let spec = LogicalDataset::Permission
            .schema()
            .column("permission")
            .unwrap();
        assert_eq!(
            assign_expr(spec, None),
            SimpleExpr::Value(SeaValue::BigInt(None))
        );
    }
}
