//! Schema-driven form: one control per declared parameter.

use std::path::Path;

use anyhow::{bail, Context, Result};
use comfybox_contracts::inputs::{FileHandle, InputStore, InputValue};
use comfybox_contracts::schema::{InputParameter, ServiceDescriptor};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlKind {
    FilePicker,
    TextInput { numeric: bool },
}

impl ControlKind {
    fn for_parameter(param: &InputParameter) -> Self {
        if param.data_type.is_filepath() {
            return Self::FilePicker;
        }
        Self::TextInput {
            numeric: param.data_type.is_number(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::FilePicker => "file",
            Self::TextInput { numeric: true } => "number",
            Self::TextInput { numeric: false } => "text",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FormControl {
    pub row: usize,
    pub node_id: String,
    pub input_field: String,
    pub kind: ControlKind,
    /// Shown as guidance, never as a hard label.
    pub placeholder: String,
    pub initial_value: String,
    pub required: bool,
    /// Other rows writing the same `node_id` slot of the store.
    pub shares_slot_with: Vec<usize>,
}

/// Build the controls for a service, in schema order, one per parameter.
///
/// Rows are never merged, even when several target the same node.
pub fn render_form(service: &ServiceDescriptor) -> Vec<FormControl> {
    let controls: Vec<FormControl> = service
        .input_parameters
        .iter()
        .enumerate()
        .map(|(row, param)| FormControl {
            row,
            node_id: param.node_id.clone(),
            input_field: param.input_field.clone(),
            kind: ControlKind::for_parameter(param),
            placeholder: param.description.clone(),
            initial_value: match ControlKind::for_parameter(param) {
                ControlKind::FilePicker => String::new(),
                ControlKind::TextInput { .. } => param.default_text(),
            },
            required: param.required,
            shares_slot_with: service.rows_sharing_node(row),
        })
        .collect();

    if controls.iter().any(|control| !control.shares_slot_with.is_empty()) {
        warn!(
            service = %service.name,
            "several rows target the same node_id and share one stored value"
        );
    }
    controls
}

impl FormControl {
    /// Typing into a text or number row.
    pub fn edit(&self, raw: &str, store: &mut InputStore) -> Result<()> {
        let value = match self.kind {
            ControlKind::FilePicker => {
                bail!("row {} is a file picker; choose a file instead", self.row + 1)
            }
            ControlKind::TextInput { numeric: true } => {
                if !accepts_numeric(raw) {
                    bail!("row {} only accepts numbers, got '{raw}'", self.row + 1);
                }
                InputValue::Number(raw.to_string())
            }
            ControlKind::TextInput { numeric: false } => InputValue::Text(raw.to_string()),
        };
        store.set(self.node_id.clone(), value);
        Ok(())
    }

    /// Choosing a file on a file-picker row.
    pub fn select(&self, path: &Path, store: &mut InputStore) -> Result<()> {
        if self.kind != ControlKind::FilePicker {
            bail!("row {} is not a file picker", self.row + 1);
        }
        let metadata = std::fs::metadata(path)
            .with_context(|| format!("cannot select {}", path.display()))?;
        if !metadata.is_file() {
            bail!("{} is not a regular file", path.display());
        }
        store.set(self.node_id.clone(), InputValue::File(FileHandle::new(path)));
        Ok(())
    }

    /// What the row currently shows: the stored value, else its initial text.
    pub fn display_value(&self, store: &InputStore) -> String {
        store
            .get(&self.node_id)
            .map(InputValue::display)
            .unwrap_or_else(|| self.initial_value.clone())
    }
}

fn accepts_numeric(raw: &str) -> bool {
    let trimmed = raw.trim();
    trimmed.is_empty() || trimmed.parse::<f64>().map(f64::is_finite).unwrap_or(false)
}

/// Plain-text rendering of a form for the terminal.
pub fn render_form_text(controls: &[FormControl], store: &InputStore) -> Vec<String> {
    controls
        .iter()
        .map(|control| {
            let mut line = format!(
                "[{}] {}.{}  <{}>",
                control.row + 1,
                control.node_id,
                control.input_field,
                control.kind.label()
            );
            let shown = control.display_value(store);
            if shown.is_empty() {
                line.push_str("  = (empty)");
            } else {
                line.push_str(&format!("  = {shown}"));
            }
            if !control.placeholder.is_empty() {
                line.push_str(&format!("  ({})", control.placeholder));
            }
            if control.required {
                line.push_str("  *required");
            }
            if !control.shares_slot_with.is_empty() {
                let rows: Vec<String> = control
                    .shares_slot_with
                    .iter()
                    .map(|row| (row + 1).to_string())
                    .collect();
                line.push_str(&format!("  [shares value with row {}]", rows.join(", ")));
            }
            line
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use comfybox_contracts::inputs::{InputStore, InputValue};
    use comfybox_contracts::schema::ServiceDescriptor;
    use serde_json::json;

    use super::{render_form, render_form_text, ControlKind};

    fn sample_service() -> anyhow::Result<ServiceDescriptor> {
        Ok(serde_json::from_value(json!({
            "name": "img2img",
            "input_parameters": [
                { "node_id": "10", "input_field": "image", "data_type": "filepath", "description": "source image" },
                { "node_id": "3", "input_field": "steps", "data_type": "number", "default_value": 20, "description": "sampling steps" },
                { "node_id": "6", "input_field": "text", "data_type": "text", "default_value": "a boat", "description": "prompt" },
                { "node_id": "8", "input_field": "mode", "data_type": "str" }
            ]
        }))?)
    }

    #[test]
    fn one_control_per_parameter_in_schema_order() -> anyhow::Result<()> {
        let service = sample_service()?;
        let controls = render_form(&service);
        assert_eq!(controls.len(), service.input_parameters.len());
        let nodes: Vec<&str> = controls.iter().map(|control| control.node_id.as_str()).collect();
        assert_eq!(nodes, vec!["10", "3", "6", "8"]);
        let rows: Vec<usize> = controls.iter().map(|control| control.row).collect();
        assert_eq!(rows, vec![0, 1, 2, 3]);
        Ok(())
    }

    #[test]
    fn widget_follows_data_type() -> anyhow::Result<()> {
        let controls = render_form(&sample_service()?);
        assert_eq!(controls[0].kind, ControlKind::FilePicker);
        assert_eq!(controls[1].kind, ControlKind::TextInput { numeric: true });
        assert_eq!(controls[2].kind, ControlKind::TextInput { numeric: false });
        assert_eq!(controls[3].kind, ControlKind::TextInput { numeric: false });
        assert_eq!(controls[1].initial_value, "20");
        assert_eq!(controls[2].initial_value, "a boat");
        assert_eq!(controls[3].initial_value, "");
        assert_eq!(controls[2].placeholder, "prompt");
        Ok(())
    }

    #[test]
    fn duplicate_nodes_stay_separate_rows() -> anyhow::Result<()> {
        let service: ServiceDescriptor = serde_json::from_value(json!({
            "name": "shared",
            "input_parameters": [
                { "node_id": "6", "input_field": "text", "data_type": "text" },
                { "node_id": "6", "input_field": "text", "data_type": "text" }
            ]
        }))?;
        let controls = render_form(&service);
        assert_eq!(controls.len(), 2);
        assert_eq!(controls[0].shares_slot_with, vec![1]);
        assert_eq!(controls[1].shares_slot_with, vec![0]);
        Ok(())
    }

    #[test]
    fn edits_write_raw_values_into_store() -> anyhow::Result<()> {
        let controls = render_form(&sample_service()?);
        let mut store = InputStore::new();
        controls[1].edit("30", &mut store)?;
        controls[2].edit(" a ship ", &mut store)?;
        assert_eq!(store.get("3"), Some(&InputValue::Number("30".to_string())));
        assert_eq!(store.get("6"), Some(&InputValue::Text(" a ship ".to_string())));
        Ok(())
    }

    #[test]
    fn numeric_rows_refuse_non_numbers_without_touching_store() -> anyhow::Result<()> {
        let controls = render_form(&sample_service()?);
        let mut store = InputStore::new();
        assert!(controls[1].edit("twenty", &mut store).is_err());
        assert!(controls[1].edit("inf", &mut store).is_err());
        assert!(store.is_empty());
        controls[1].edit("", &mut store)?;
        controls[1].edit("1e3", &mut store)?;
        assert_eq!(store.get("3"), Some(&InputValue::Number("1e3".to_string())));
        Ok(())
    }

    #[test]
    fn file_rows_take_existing_files_only() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let image = temp.path().join("cat.png");
        std::fs::write(&image, b"png")?;

        let controls = render_form(&sample_service()?);
        let mut store = InputStore::new();
        assert!(controls[0].edit("typed path", &mut store).is_err());
        assert!(controls[0]
            .select(&temp.path().join("missing.png"), &mut store)
            .is_err());
        assert!(controls[0].select(temp.path(), &mut store).is_err());
        assert!(controls[2].select(&image, &mut store).is_err());
        assert!(store.is_empty());

        controls[0].select(&image, &mut store)?;
        let Some(InputValue::File(handle)) = store.get("10") else {
            anyhow::bail!("expected a file value");
        };
        assert_eq!(handle.file_name, "cat.png");
        Ok(())
    }

    #[test]
    fn text_view_shows_values_and_hints() -> anyhow::Result<()> {
        let controls = render_form(&sample_service()?);
        let mut store = InputStore::new();
        controls[2].edit("a ship", &mut store)?;
        let lines = render_form_text(&controls, &store);
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "[1] 10.image  <file>  = (empty)  (source image)");
        assert_eq!(lines[1], "[2] 3.steps  <number>  = 20  (sampling steps)");
        assert_eq!(lines[2], "[3] 6.text  <text>  = a ship  (prompt)");
        Ok(())
    }
}
