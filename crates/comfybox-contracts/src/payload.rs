use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::inputs::InputStore;
use crate::schema::InputParameter;

const NODE_ID_KEY: &str = "node_id";

/// One `{ node_id, <field>: value }` object of the execute body; `field`
/// is only known at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct PayloadEntry {
    pub node_id: String,
    pub field: String,
    pub value: Value,
}

impl PayloadEntry {
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl Serialize for PayloadEntry {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // A field named `node_id` replaces the id: one key.
        if self.field == NODE_ID_KEY {
            let mut map = serializer.serialize_map(Some(1))?;
            map.serialize_entry(NODE_ID_KEY, &self.value)?;
            return map.end();
        }
        let mut map = serializer.serialize_map(Some(2))?;
        map.serialize_entry(NODE_ID_KEY, &self.node_id)?;
        map.serialize_entry(&self.field, &self.value)?;
        map.end()
    }
}

/// Ordered execute body: exactly one entry per schema parameter.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExecutionPayload {
    entries: Vec<PayloadEntry>,
}

impl ExecutionPayload {
    pub fn build(parameters: &[InputParameter], store: &InputStore) -> Self {
        let entries = parameters
            .iter()
            .map(|param| PayloadEntry {
                node_id: param.node_id.clone(),
                field: param.input_field.clone(),
                value: store
                    .get(&param.node_id)
                    .map(|value| value.to_json())
                    .or_else(|| param.default_value.clone())
                    .unwrap_or(Value::Null),
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[PayloadEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn to_json_bytes(&self) -> anyhow::Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// sha256 of the serialized body, for correlating log lines.
    pub fn fingerprint(&self) -> String {
        let bytes = self.to_json_bytes().unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(bytes);
        hex::encode(hasher.finalize())
    }
}

impl Serialize for ExecutionPayload {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.entries.len()))?;
        for entry in &self.entries {
            seq.serialize_element(entry)?;
        }
        seq.end()
    }
}
