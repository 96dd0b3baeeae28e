use serde_json::Value;
use std::collections::HashMap;

/// Per-request key/value bag
///
/// Set while a request is generated and read while parsing that request's
/// own response. The map is only allocated on the first `set`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TempData {
    data: Option<HashMap<String, Value>>,
}

impl TempData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the value stored under `key`, if any
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.data.as_ref()?.get(key)
    }

    /// Returns the value under `key` as a string slice
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Stores `value` under `key`, replacing any previous value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.data
            .get_or_insert_with(|| HashMap::with_capacity(8))
            .insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.data.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
