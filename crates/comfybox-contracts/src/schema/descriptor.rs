use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceDescriptor {
    pub name: String,
    #[serde(default)]
    pub input_parameters: Vec<InputParameter>,
}

impl ServiceDescriptor {
    pub fn parameter(&self, row: usize) -> Option<&InputParameter> {
        self.input_parameters.get(row)
    }

    /// Rows whose `node_id` also appears on at least one other row.
    pub fn rows_sharing_node(&self, row: usize) -> Vec<usize> {
        let Some(target) = self.parameter(row) else {
            return Vec::new();
        };
        self.input_parameters
            .iter()
            .enumerate()
            .filter(|(idx, param)| *idx != row && param.node_id == target.node_id)
            .map(|(idx, _)| idx)
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InputParameter {
    #[serde(deserialize_with = "string_or_number")]
    pub node_id: String,
    pub input_field: String,
    pub data_type: DataType,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub required: bool,
}

impl InputParameter {
    /// Text a freshly rendered control shows before any edit.
    pub fn default_text(&self) -> String {
        match &self.default_value {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(text)) => text.clone(),
            Some(other) => other.to_string(),
        }
    }

    pub fn label(&self) -> String {
        format!("{}.{}", self.node_id, self.input_field)
    }
}

fn string_or_number<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    match Value::deserialize(deserializer)? {
        Value::String(text) => Ok(text),
        Value::Number(number) => Ok(number.to_string()),
        other => Err(serde::de::Error::custom(format!(
            "node_id must be a string or number, got {other}"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{DataType, ServiceDescriptor};

    #[test]
    fn descriptor_parses_catalog_entry() -> anyhow::Result<()> {
        let descriptor: ServiceDescriptor = serde_json::from_value(json!({
            "name": "upscale",
            "version": "1.0",
            "input_parameters": [
                {
                    "node_id": "3",
                    "input_field": "text",
                    "data_type": "text",
                    "default_value": "cat",
                    "description": "prompt"
                },
                {
                    "node_id": 12,
                    "input_field": "image",
                    "data_type": "filepath",
                    "default_value": null,
                    "description": "source image",
                    "required": true
                }
            ]
        }))?;

        assert_eq!(descriptor.name, "upscale");
        assert_eq!(descriptor.input_parameters.len(), 2);
        let first = &descriptor.input_parameters[0];
        assert_eq!(first.default_value, Some(json!("cat")));
        assert_eq!(first.data_type, DataType::Text);
        let second = &descriptor.input_parameters[1];
        assert_eq!(second.node_id, "12");
        assert_eq!(second.default_value, None);
        assert!(second.required);
        Ok(())
    }

    #[test]
    fn missing_parameters_and_description_default_to_empty() -> anyhow::Result<()> {
        let descriptor: ServiceDescriptor = serde_json::from_value(json!({ "name": "noop" }))?;
        assert!(descriptor.input_parameters.is_empty());

        let descriptor: ServiceDescriptor = serde_json::from_value(json!({
            "name": "steps",
            "input_parameters": [
                { "node_id": "5", "input_field": "steps", "data_type": "number" }
            ]
        }))?;
        assert_eq!(descriptor.input_parameters[0].description, "");
        Ok(())
    }

    #[test]
    fn default_text_renders_json_scalars_plainly() -> anyhow::Result<()> {
        let descriptor: ServiceDescriptor = serde_json::from_value(json!({
            "name": "mixed",
            "input_parameters": [
                { "node_id": "1", "input_field": "text", "data_type": "text", "default_value": "a cat" },
                { "node_id": "2", "input_field": "steps", "data_type": "number", "default_value": 20 },
                { "node_id": "3", "input_field": "cfg", "data_type": "number", "default_value": 7.5 },
                { "node_id": "4", "input_field": "tiled", "data_type": "bool", "default_value": false },
                { "node_id": "5", "input_field": "seed", "data_type": "number" }
            ]
        }))?;
        let shown: Vec<String> = descriptor
            .input_parameters
            .iter()
            .map(|param| param.default_text())
            .collect();
        assert_eq!(shown, vec!["a cat", "20", "7.5", "false", ""]);
        Ok(())
    }

    #[test]
    fn rows_sharing_node_lists_other_rows_only() -> anyhow::Result<()> {
        let descriptor: ServiceDescriptor = serde_json::from_value(json!({
            "name": "shared",
            "input_parameters": [
                { "node_id": "6", "input_field": "text", "data_type": "text" },
                { "node_id": "7", "input_field": "seed", "data_type": "number" },
                { "node_id": "6", "input_field": "clip", "data_type": "text" }
            ]
        }))?;
        assert_eq!(descriptor.rows_sharing_node(0), vec![2]);
        assert_eq!(descriptor.rows_sharing_node(2), vec![0]);
        assert!(descriptor.rows_sharing_node(1).is_empty());
        assert!(descriptor.rows_sharing_node(9).is_empty());
        Ok(())
    }

    #[test]
    fn rejects_structured_node_ids() {
        let parsed = serde_json::from_value::<ServiceDescriptor>(json!({
            "name": "bad",
            "input_parameters": [
                { "node_id": {"id": 1}, "input_field": "text", "data_type": "text" }
            ]
        }));
        assert!(parsed.is_err());
    }
}
