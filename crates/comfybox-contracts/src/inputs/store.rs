use indexmap::IndexMap;

use super::InputValue;

/// Partial user input for one service card, keyed by `node_id`.
///
/// Nothing is validated here; whatever a control produces is stored as-is.
/// Absent keys mean "use the parameter default".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InputStore {
    values: IndexMap<String, InputValue>,
}

impl InputStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, node_id: impl Into<String>, value: InputValue) {
        self.values.insert(node_id.into(), value);
    }

    pub fn get(&self, node_id: &str) -> Option<&InputValue> {
        self.values.get(node_id)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &InputValue)> {
        self.values.iter().map(|(key, value)| (key.as_str(), value))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut InputValue)> {
        self.values
            .iter_mut()
            .map(|(key, value)| (key.as_str(), value))
    }

    pub fn clear(&mut self) {
        self.values.clear();
    }
}
