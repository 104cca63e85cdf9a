use std::path::PathBuf;

use serde_json::{Number, Value};

/// A local file chosen for a `filepath` parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileHandle {
    pub local_path: PathBuf,
    pub file_name: String,
    /// Path the backend is told about. Starts as the local path and is
    /// rewritten when the file is staged into a shared input directory.
    pub wire_path: String,
}

impl FileHandle {
    pub fn new(local_path: impl Into<PathBuf>) -> Self {
        let local_path = local_path.into();
        let file_name = local_path
            .file_name()
            .map(|name| name.to_string_lossy().to_string())
            .unwrap_or_default();
        let wire_path = local_path.to_string_lossy().to_string();
        Self {
            local_path,
            file_name,
            wire_path,
        }
    }

    pub fn with_wire_path(mut self, wire_path: impl Into<String>) -> Self {
        self.wire_path = wire_path.into();
        self
    }
}

/// Raw value produced by one form control.
#[derive(Debug, Clone, PartialEq)]
pub enum InputValue {
    Text(String),
    /// The numeric string exactly as typed.
    Number(String),
    File(FileHandle),
}

impl InputValue {
    pub fn to_json(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Number(raw) => numeric_json(raw),
            Self::File(handle) => Value::String(handle.wire_path.clone()),
        }
    }

    pub fn display(&self) -> String {
        match self {
            Self::Text(text) | Self::Number(text) => text.clone(),
            Self::File(handle) => handle.local_path.display().to_string(),
        }
    }
}

/// JSON number when the typed text survives the conversion exactly,
/// otherwise the raw text.
fn numeric_json(raw: &str) -> Value {
    let trimmed = raw.trim();
    if let Ok(int) = trimmed.parse::<i64>() {
        return Value::Number(int.into());
    }
    if let Ok(int) = trimmed.parse::<u64>() {
        return Value::Number(int.into());
    }
    let digits = trimmed.strip_prefix(['-', '+']).unwrap_or(trimmed);
    if !digits.is_empty() && digits.bytes().all(|byte| byte.is_ascii_digit()) {
        return Value::String(raw.to_string());
    }
    if significant_digits(trimmed) > F64_EXACT_DIGITS {
        return Value::String(raw.to_string());
    }
    trimmed
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or_else(|| Value::String(raw.to_string()))
}

/// Any decimal with this many significant digits round-trips through f64.
const F64_EXACT_DIGITS: usize = 15;

fn significant_digits(text: &str) -> usize {
    let mantissa = text.split(['e', 'E']).next().unwrap_or_default();
    let digits: String = mantissa.chars().filter(char::is_ascii_digit).collect();
    let leading = digits.trim_start_matches('0');
    let significant = if mantissa.contains('.') {
        leading.trim_end_matches('0')
    } else {
        leading
    };
    significant.len()
}
