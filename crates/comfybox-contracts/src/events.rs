use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::Context;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};

use crate::payload::ExecutionPayload;
use crate::results::ExecutionOutcome;

/// Operator-visible activity, one variant per line kind in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActivityEvent {
    ServicesListed {
        count: usize,
        services: Vec<String>,
    },
    ExecutionStarted {
        service: String,
        payload_sha256: String,
        entries: usize,
    },
    ExecutionCompleted {
        service: String,
        payload_sha256: String,
        artifacts: usize,
        inline: usize,
    },
    ExecutionFailed {
        service: String,
        payload_sha256: String,
        status: String,
        diagnostic: String,
    },
    ExecutionTransportFailed {
        service: String,
        reason: String,
        /// Absent when the failure happened before a body was built.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload_sha256: Option<String>,
    },
}

impl ActivityEvent {
    pub fn services_listed<'a>(names: impl IntoIterator<Item = &'a str>) -> Self {
        let services: Vec<String> = names.into_iter().map(str::to_string).collect();
        Self::ServicesListed {
            count: services.len(),
            services,
        }
    }

    pub fn execution_started(service: &str, payload: &ExecutionPayload) -> Self {
        Self::ExecutionStarted {
            service: service.to_string(),
            payload_sha256: payload.fingerprint(),
            entries: payload.len(),
        }
    }

    /// The closing event for one submission.
    pub fn execution_finished(
        service: &str,
        payload_sha256: Option<&str>,
        outcome: &ExecutionOutcome,
    ) -> Self {
        let service = service.to_string();
        match outcome {
            ExecutionOutcome::Completed { artifacts } => Self::ExecutionCompleted {
                service,
                payload_sha256: payload_sha256.unwrap_or_default().to_string(),
                artifacts: artifacts.len(),
                inline: artifacts.iter().filter(|item| item.is_inline()).count(),
            },
            ExecutionOutcome::Failed { status, diagnostic } => Self::ExecutionFailed {
                service,
                payload_sha256: payload_sha256.unwrap_or_default().to_string(),
                status: status.clone(),
                diagnostic: diagnostic.clone(),
            },
            ExecutionOutcome::TransportFailed { reason } => Self::ExecutionTransportFailed {
                service,
                reason: reason.clone(),
                payload_sha256: payload_sha256.map(str::to_string),
            },
        }
    }

    /// Fingerprint of the body this event is about, if one was built.
    pub fn payload_sha256(&self) -> Option<&str> {
        match self {
            Self::ServicesListed { .. } => None,
            Self::ExecutionStarted { payload_sha256, .. }
            | Self::ExecutionCompleted { payload_sha256, .. }
            | Self::ExecutionFailed { payload_sha256, .. } => Some(payload_sha256),
            Self::ExecutionTransportFailed { payload_sha256, .. } => payload_sha256.as_deref(),
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::ServicesListed { .. } => "services_listed",
            Self::ExecutionStarted { .. } => "execution_started",
            Self::ExecutionCompleted { .. } => "execution_completed",
            Self::ExecutionFailed { .. } => "execution_failed",
            Self::ExecutionTransportFailed { .. } => "execution_transport_failed",
        }
    }
}

/// One line of `events.jsonl`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub session_id: String,
    pub ts: String,
    #[serde(flatten)]
    pub event: ActivityEvent,
}

/// Append-only JSONL log shared by every clone; the file opens on first use.
#[derive(Debug, Clone)]
pub struct ActivityLog {
    shared: Arc<LogShared>,
}

#[derive(Debug)]
struct LogShared {
    path: PathBuf,
    session_id: String,
    file: Mutex<Option<File>>,
}

impl ActivityLog {
    pub fn open(path: impl Into<PathBuf>, session_id: impl Into<String>) -> Self {
        Self {
            shared: Arc::new(LogShared {
                path: path.into(),
                session_id: session_id.into(),
                file: Mutex::new(None),
            }),
        }
    }

    /// A log tagged with a fresh random session id.
    pub fn with_new_session(path: impl Into<PathBuf>) -> Self {
        Self::open(path, uuid::Uuid::new_v4().to_string())
    }

    pub fn session_id(&self) -> &str {
        &self.shared.session_id
    }

    pub fn record(&self, event: ActivityEvent) -> anyhow::Result<EventRecord> {
        let record = EventRecord {
            session_id: self.shared.session_id.clone(),
            ts: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            event,
        };
        let mut line = serde_json::to_vec(&record)?;
        line.push(b'\n');

        let mut file = self
            .shared
            .file
            .lock()
            .map_err(|_| anyhow::anyhow!("activity log lock poisoned"))?;
        if file.is_none() {
            *file = Some(self.open_file()?);
        }
        if let Some(handle) = file.as_mut() {
            handle
                .write_all(&line)
                .with_context(|| format!("failed to append to {}", self.shared.path.display()))?;
        }
        Ok(record)
    }

    fn open_file(&self) -> anyhow::Result<File> {
        let path = &self.shared.path;
        if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .with_context(|| format!("failed to open {}", path.display()))
    }
}
