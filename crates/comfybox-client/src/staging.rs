use std::fs;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use comfybox_contracts::inputs::{InputStore, InputValue};
use tracing::debug;

/// Copies selected files into the directory the backend reads inputs from.
#[derive(Debug, Clone, Default)]
pub struct FileStager {
    input_dir: Option<PathBuf>,
}

impl FileStager {
    pub fn new(input_dir: Option<PathBuf>) -> Self {
        Self { input_dir }
    }

    /// Returns a copy of `store` whose file values point at staged paths.
    /// The caller's store is never touched.
    pub fn stage(&self, store: &InputStore) -> Result<InputStore> {
        let mut staged = store.clone();
        let Some(input_dir) = self.input_dir.as_ref() else {
            return Ok(staged);
        };
        for (node_id, value) in staged.iter_mut() {
            let InputValue::File(handle) = value else {
                continue;
            };
            if handle.file_name.is_empty() {
                bail!("file for node {node_id} has no file name");
            }
            fs::create_dir_all(input_dir)
                .with_context(|| format!("failed to create {}", input_dir.display()))?;
            let target = input_dir.join(&handle.file_name);
            if !target.exists() {
                fs::copy(&handle.local_path, &target).with_context(|| {
                    format!(
                        "failed to stage {} into {}",
                        handle.local_path.display(),
                        input_dir.display()
                    )
                })?;
                debug!(node_id, target = %target.display(), "staged input file");
            }
            let relative_root = input_dir.parent().unwrap_or(input_dir.as_path());
            let relative = target.strip_prefix(relative_root).unwrap_or(&target);
            let wire_path = relative
                .components()
                .map(|part| part.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<String>>()
                .join("/");
            *handle = handle.clone().with_wire_path(wire_path);
        }
        Ok(staged)
    }
}
