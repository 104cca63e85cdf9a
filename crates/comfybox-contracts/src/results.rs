use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub const INLINE_IMAGE_PREFIX: &str = "data:image";
pub const STATUS_COMPLETED: &str = "completed";

/// Body returned by `POST /service/{name}/execute`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub status: String,
    #[serde(default)]
    pub images: Option<Vec<String>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ExecutionResponse {
    fn detail(&self) -> Option<String> {
        ["error", "message", "detail"].iter().find_map(|key| {
            match self.extra.get(*key)? {
                Value::Null => None,
                Value::String(text) if text.trim().is_empty() => None,
                Value::String(text) => Some(text.trim().to_string()),
                other => Some(other.to_string()),
            }
        })
    }
}

/// What one submission produced, as seen by the card.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Completed { artifacts: Vec<Artifact> },
    /// The backend answered but did not complete the run.
    Failed { status: String, diagnostic: String },
    /// Network error, non-2xx status, or an unreadable body.
    TransportFailed { reason: String },
}

impl ExecutionOutcome {
    pub fn from_response(response: ExecutionResponse) -> Self {
        if response.status == STATUS_COMPLETED {
            let artifacts = response
                .images
                .unwrap_or_default()
                .iter()
                .map(|raw| Artifact::classify(raw))
                .collect();
            return Self::Completed { artifacts };
        }
        let mut diagnostic = format!("execution {}: check the service logs", response.status);
        if let Some(detail) = response.detail() {
            diagnostic.push_str(&format!(" ({detail})"));
        }
        Self::Failed {
            status: response.status,
            diagnostic,
        }
    }

    pub fn transport(reason: impl Into<String>) -> Self {
        Self::TransportFailed {
            reason: reason.into(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Failed { .. } => "failed",
            Self::TransportFailed { .. } => "transport_failed",
        }
    }
}

/// One returned image: an inline data URI or a reference to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Inline { uri: String },
    Reference(String),
}

impl Artifact {
    /// Prefix test only; a reference is never checked for validity.
    pub fn classify(raw: &str) -> Self {
        if raw.starts_with(INLINE_IMAGE_PREFIX) {
            Self::Inline {
                uri: raw.to_string(),
            }
        } else {
            Self::Reference(raw.to_string())
        }
    }

    pub fn is_inline(&self) -> bool {
        matches!(self, Self::Inline { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DataUri<'a> {
    pub mime: &'a str,
    pub base64: bool,
    pub payload: &'a str,
}

/// Split `data:<mime>[;params][;base64],<payload>`.
pub fn parse_data_uri(uri: &str) -> Option<DataUri<'_>> {
    let rest = uri.strip_prefix("data:")?;
    let (header, payload) = rest.split_once(',')?;
    let mut params = header.split(';');
    let mime = params.next().unwrap_or_default();
    let base64 = params.any(|param| param.eq_ignore_ascii_case("base64"));
    Some(DataUri {
        mime,
        base64,
        payload,
    })
}
