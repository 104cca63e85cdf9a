use std::fmt;

use serde::{Deserialize, Serialize};

/// Declared type of one input parameter.
///
/// The backend vocabulary is open-ended; anything other than the three
/// widget-selecting types is kept verbatim in `Other` so it round-trips.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum DataType {
    Filepath,
    Number,
    Text,
    Other(String),
}

impl DataType {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Filepath => "filepath",
            Self::Number => "number",
            Self::Text => "text",
            Self::Other(raw) => raw.as_str(),
        }
    }

    pub fn is_filepath(&self) -> bool {
        matches!(self, Self::Filepath)
    }

    pub fn is_number(&self) -> bool {
        matches!(self, Self::Number)
    }
}

impl From<String> for DataType {
    fn from(raw: String) -> Self {
        match raw.as_str() {
            "filepath" => Self::Filepath,
            "number" => Self::Number,
            "text" => Self::Text,
            _ => Self::Other(raw),
        }
    }
}

impl From<&str> for DataType {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<DataType> for String {
    fn from(value: DataType) -> Self {
        match value {
            DataType::Other(raw) => raw,
            known => known.as_str().to_string(),
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
