use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::{ColumnSpec, DatasetSchema, LogicalDataset, ShardError, ShardResult, Value};

pub const WILDCARD: &str = "*";

#[derive(Clone, Debug, PartialEq)]
pub enum Key {
    Wildcard,
    Single(Value),
    Composite(Vec<Value>),
}

impl Key {
    pub fn single(value: impl Into<Value>) -> Self {
        let value = value.into();
        if value.as_str() == Some(WILDCARD) {
            Key::Wildcard
        } else {
            Key::Single(value)
        }
    }

    pub fn composite<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Key::Composite(values.into_iter().map(Into::into).collect())
    }

    /// Boundary parser: `*` is the wildcard, a JSON array is a composite
    /// key, anything else is a single string key.
    pub fn parse(text: &str) -> Self {
        if text == WILDCARD {
            return Key::Wildcard;
        }
        if let Ok(JsonValue::Array(items)) = serde_json::from_str::<JsonValue>(text)
            && !items.is_empty()
        {
            let values = items
                .into_iter()
                .map(|item| match item {
                    JsonValue::String(text) => Value::Str(text),
                    JsonValue::Number(number) => match number.as_i64() {
                        Some(value) => Value::Int(value),
                        None => Value::Str(number.to_string()),
                    },
                    other => Value::Str(other.to_string()),
                })
                .collect();
            return Key::Composite(values);
        }
        Key::Single(Value::Str(text.to_string()))
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Key::Wildcard)
    }

    /// Turns a key into an equality condition over the dataset's primary
    /// key. `None` means "every row".
    pub fn to_condition(&self, dataset: LogicalDataset) -> ShardResult<Option<Condition>> {
        let schema = dataset.schema();
        let values = match self {
            Key::Wildcard => return Ok(None),
            Key::Single(value) => std::slice::from_ref(value),
            Key::Composite(values) => values.as_slice(),
        };
        if values.len() != schema.primary_key.len() {
            return Err(ShardError::invalid_key(format!(
                "dataset '{dataset}' expects a key of {} value(s) ({}), got {}",
                schema.primary_key.len(),
                schema.primary_key.join(", "),
                values.len()
            )));
        }
        if values.iter().any(|value| value.as_str() == Some(WILDCARD)) {
            return Err(ShardError::invalid_key(
                "'*' is reserved and cannot be part of a key",
            ));
        }
        let terms = schema
            .primary_key
            .iter()
            .zip(values.iter())
            .map(|(name, value)| ((*name).to_string(), value.clone()))
            .collect();
        Ok(Some(Condition { terms }))
    }
}

impl From<&str> for Key {
    fn from(value: &str) -> Self {
        Key::parse(value)
    }
}

/// Equality conjunction over named columns, as supplied by a caller.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Condition {
    terms: Vec<(String, Value)>,
}

impl Condition {
    pub fn eq(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            terms: vec![(column.into(), value.into())],
        }
    }

    pub fn and(mut self, column: impl Into<String>, value: impl Into<Value>) -> Self {
        self.terms.push((column.into(), value.into()));
        self
    }

    pub fn all_eq<C, V>(columns: C, values: V) -> ShardResult<Self>
    where
        C: IntoIterator,
        C::Item: Into<String>,
        V: IntoIterator,
        V::Item: Into<Value>,
    {
        let columns = columns.into_iter().map(Into::into).collect::<Vec<String>>();
        let values = values.into_iter().map(Into::into).collect::<Vec<Value>>();
        if columns.len() != values.len() {
            return Err(ShardError::invalid_key(format!(
                "{} column(s) but {} value(s)",
                columns.len(),
                values.len()
            )));
        }
        Ok(Self {
            terms: columns.into_iter().zip(values).collect(),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.terms.is_empty()
    }

    pub fn terms(&self) -> &[(String, Value)] {
        &self.terms
    }

    /// Validates every column against the allow-list and types every value.
    pub fn resolve(&self, dataset: LogicalDataset) -> ShardResult<ResolvedCondition> {
        let schema = dataset.schema();
        if self.terms.is_empty() {
            return Err(ShardError::invalid_key("condition needs at least one column"));
        }
        let mut terms: Vec<(&'static ColumnSpec, Value)> = Vec::with_capacity(self.terms.len());
        for (name, value) in &self.terms {
            let spec = schema.column(name)?;
            if terms.iter().any(|(seen, _)| seen.name == spec.name) {
                return Err(ShardError::invalid_key(format!(
                    "column '{name}' appears twice in condition"
                )));
            }
            let value = value
                .clone()
                .coerce(spec.value_type)
                .map_err(|err| ShardError::invalid_key(format!("{dataset}.{name}: {err}")))?;
            terms.push((spec, value));
        }
        Ok(ResolvedCondition { schema, terms })
    }
}

#[derive(Clone, Debug)]
pub struct ResolvedCondition {
    schema: &'static DatasetSchema,
    terms: Vec<(&'static ColumnSpec, Value)>,
}

impl ResolvedCondition {
    pub fn dataset(&self) -> LogicalDataset {
        self.schema.dataset
    }

    pub fn terms(&self) -> &[(&'static ColumnSpec, Value)] {
        &self.terms
    }

    /// Partition-key value when the condition pins it, i.e. when the
    /// condition can be answered by a single shard.
    pub fn partition_value(&self) -> Option<&Value> {
        self.terms
            .iter()
            .find(|(spec, _)| spec.name == self.schema.partition_key)
            .map(|(_, value)| value)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Projection {
    #[default]
    All,
    Column(String),
}

impl Projection {
    pub fn parse(text: &str) -> Self {
        if text.is_empty() || text == WILDCARD {
            Projection::All
        } else {
            Projection::Column(text.to_string())
        }
    }

    pub fn column(name: impl Into<String>) -> Self {
        Projection::Column(name.into())
    }

    pub fn resolve(&self, dataset: LogicalDataset) -> ShardResult<Option<&'static ColumnSpec>> {
        match self {
            Projection::All => Ok(None),
            Projection::Column(name) => dataset.schema().column(name).map(Some),
        }
    }
}
