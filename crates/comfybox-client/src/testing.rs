//! In-memory backend for tests in this crate and its dependents
//! (enable the `test-support` feature).

use std::sync::Mutex;

use anyhow::{anyhow, bail, Result};
use comfybox_contracts::payload::ExecutionPayload;
use comfybox_contracts::results::ExecutionResponse;
use comfybox_contracts::schema::ServiceDescriptor;
use serde_json::{json, Value};

use crate::api::{FetchedBytes, HealthStatus, ServiceBackend};

/// Records request bodies and replays canned replies, last one first.
#[derive(Default)]
pub struct ScriptedBackend {
    pub services: Vec<ServiceDescriptor>,
    pub replies: Mutex<Vec<Result<Value, String>>>,
    pub bodies: Mutex<Vec<Vec<u8>>>,
    pub fetched: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub fn replying(replies: Vec<Result<Value, String>>) -> Self {
        Self {
            replies: Mutex::new(replies),
            ..Self::default()
        }
    }

    pub fn with_services(mut self, services: Vec<ServiceDescriptor>) -> Self {
        self.services = services;
        self
    }

    pub fn bodies(&self) -> Vec<Vec<u8>> {
        self.bodies.lock().map(|bodies| bodies.clone()).unwrap_or_default()
    }

    pub fn fetched(&self) -> Vec<String> {
        self.fetched.lock().map(|urls| urls.clone()).unwrap_or_default()
    }
}

impl ServiceBackend for ScriptedBackend {
    fn list_services(&self) -> Result<Vec<ServiceDescriptor>> {
        Ok(self.services.clone())
    }

    fn execute(&self, _service_name: &str, payload: &ExecutionPayload) -> Result<ExecutionResponse> {
        if let Ok(mut bodies) = self.bodies.lock() {
            bodies.push(payload.to_json_bytes()?);
        }
        let next = self
            .replies
            .lock()
            .map_err(|_| anyhow!("replies lock poisoned"))?
            .pop();
        match next {
            Some(Ok(value)) => Ok(serde_json::from_value(value)?),
            Some(Err(message)) => bail!(message),
            None => bail!("no scripted reply left"),
        }
    }

    fn health(&self, service_name: &str) -> Result<HealthStatus> {
        Ok(HealthStatus {
            status: "healthy".to_string(),
            service: Some(service_name.to_string()),
        })
    }

    fn fetch(&self, url: &str) -> Result<FetchedBytes> {
        if let Ok(mut fetched) = self.fetched.lock() {
            fetched.push(url.to_string());
        }
        bail!("fetch not scripted for {url}")
    }
}

/// One text input on node 3 defaulting to `cat`.
pub fn upscale_service() -> Result<ServiceDescriptor> {
    Ok(serde_json::from_value(json!({
        "name": "upscale",
        "input_parameters": [
            { "node_id": "3", "input_field": "text", "data_type": "text", "default_value": "cat" }
        ]
    }))?)
}
