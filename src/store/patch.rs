use super::{StoreError, StoreResult};
use serde::de::DeserializeOwned;
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Pseudo-value that adds one to a numeric counter
pub const INCREMENT: &str = "increment";

/// Key of the `{"add": n}` form that adds `n` to a numeric counter
pub const ADD: &str = "add";

/// Every counter field on the stored records is a `u32`
const COUNTER_MAX: u64 = u32::MAX as u64;

/// Fields a patch may never touch
const PROTECTED_FIELDS: &[&str] = &["id", "participant_id", "created_at"];

#[derive(Debug, Clone, PartialEq)]
pub enum FieldPatch {
    Set(Value),
    Increment,
    Add(u64),
}

impl Serialize for FieldPatch {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldPatch::Set(value) => value.serialize(serializer),
            FieldPatch::Increment => serializer.serialize_str(INCREMENT),
            FieldPatch::Add(n) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry(ADD, n)?;
                map.end()
            }
        }
    }
}

impl<'de> Deserialize<'de> for FieldPatch {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Value::deserialize(deserializer)?;
        let add = value
            .as_object()
            .filter(|map| map.len() == 1)
            .and_then(|map| map.get(ADD))
            .and_then(Value::as_u64);
        if let Some(n) = add {
            return Ok(FieldPatch::Add(n));
        }

        Ok(match value {
            Value::String(ref s) if s == INCREMENT => FieldPatch::Increment,
            other => FieldPatch::Set(other),
        })
    }
}

/// Partial update of a record, as sent by `PATCH` routes
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Patch(pub BTreeMap<String, FieldPatch>);

impl Patch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(mut self, field: &str, value: impl Into<Value>) -> Self {
        self.0.insert(field.to_string(), FieldPatch::Set(value.into()));
        self
    }

    pub fn increment(mut self, field: &str) -> Self {
        self.0.insert(field.to_string(), FieldPatch::Increment);
        self
    }

    /// Add `n` to a counter in the same write as the rest of the patch
    pub fn add(mut self, field: &str, n: u32) -> Self {
        self.0.insert(field.to_string(), FieldPatch::Add(u64::from(n)));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Apply to a record, returning the updated copy. The record is untouched on error.
    pub fn apply<T>(&self, record: &T) -> StoreResult<T>
    where
        T: Serialize + DeserializeOwned,
    {
        let mut value =
            serde_json::to_value(record).map_err(|e| StoreError::InvalidPatch(e.to_string()))?;
        let object = value
            .as_object_mut()
            .ok_or_else(|| StoreError::InvalidPatch("record is not an object".to_string()))?;

        for (field, change) in &self.0 {
            if PROTECTED_FIELDS.contains(&field.as_str()) {
                return Err(StoreError::ImmutableField(field.clone()));
            }
            let current = object
                .get_mut(field)
                .ok_or_else(|| StoreError::UnknownField(field.clone()))?;

            match change {
                FieldPatch::Set(new_value) => *current = new_value.clone(),
                FieldPatch::Increment => *current = add_to_counter(field, current, 1)?,
                FieldPatch::Add(n) => *current = add_to_counter(field, current, *n)?,
            }
        }

        serde_json::from_value(value).map_err(|e| StoreError::InvalidPatch(e.to_string()))
    }
}

fn add_to_counter(field: &str, current: &Value, n: u64) -> StoreResult<Value> {
    let count = current
        .as_u64()
        .ok_or_else(|| StoreError::NotCounter(field.to_string()))?;
    count
        .checked_add(n)
        .filter(|total| *total <= COUNTER_MAX)
        .map(Value::from)
        .ok_or_else(|| StoreError::CounterOverflow(field.to_string()))
}
