use std::sync::Arc;

use anyhow::Result;
use comfybox_contracts::events::{ActivityEvent, ActivityLog};
use comfybox_contracts::inputs::InputStore;
use comfybox_contracts::payload::ExecutionPayload;
use comfybox_contracts::results::ExecutionOutcome;
use comfybox_contracts::schema::ServiceDescriptor;
use tracing::{debug, warn};

use crate::api::{error_chain_text, ServiceBackend};
use crate::staging::FileStager;

const TRANSPORT_REASON_MAX_CHARS: usize = 512;

/// Builds the execute body for a card and sends it, once, to the backend.
#[derive(Clone)]
pub struct InvocationClient {
    backend: Arc<dyn ServiceBackend>,
    stager: FileStager,
    events: Option<ActivityLog>,
}

impl InvocationClient {
    pub fn new(backend: Arc<dyn ServiceBackend>) -> Self {
        Self {
            backend,
            stager: FileStager::default(),
            events: None,
        }
    }

    pub fn with_stager(mut self, stager: FileStager) -> Self {
        self.stager = stager;
        self
    }

    pub fn with_events(mut self, events: Option<ActivityLog>) -> Self {
        self.events = events;
        self
    }

    pub fn backend(&self) -> &dyn ServiceBackend {
        self.backend.as_ref()
    }

    /// Payload as it would be sent, with files staged.
    pub fn build_payload(
        &self,
        service: &ServiceDescriptor,
        store: &InputStore,
    ) -> Result<ExecutionPayload> {
        let staged = self.stager.stage(store)?;
        Ok(ExecutionPayload::build(&service.input_parameters, &staged))
    }

    /// All-or-nothing: any failure before a parsed response is a transport
    /// failure; a parsed response with a non-completed status is `Failed`.
    pub fn execute(&self, service: &ServiceDescriptor, store: &InputStore) -> ExecutionOutcome {
        let payload = match self.build_payload(service, store) {
            Ok(payload) => payload,
            Err(err) => return self.transport_failure(service, None, &err),
        };
        let fingerprint = payload.fingerprint();
        debug!(service = %service.name, %fingerprint, entries = payload.len(), "execution payload built");
        self.record(ActivityEvent::execution_started(&service.name, &payload));

        let response = match self.backend.execute(&service.name, &payload) {
            Ok(response) => response,
            Err(err) => return self.transport_failure(service, Some(&fingerprint), &err),
        };
        let outcome = ExecutionOutcome::from_response(response);
        if let ExecutionOutcome::Failed { status, .. } = &outcome {
            warn!(service = %service.name, %status, "execution reported failure");
        }
        self.record(ActivityEvent::execution_finished(
            &service.name,
            Some(&fingerprint),
            &outcome,
        ));
        outcome
    }

    fn transport_failure(
        &self,
        service: &ServiceDescriptor,
        fingerprint: Option<&str>,
        err: &anyhow::Error,
    ) -> ExecutionOutcome {
        let reason = error_chain_text(err, TRANSPORT_REASON_MAX_CHARS);
        warn!(service = %service.name, %reason, "execution request failed");
        let outcome = ExecutionOutcome::transport(reason);
        self.record(ActivityEvent::execution_finished(
            &service.name,
            fingerprint,
            &outcome,
        ));
        outcome
    }

    fn record(&self, event: ActivityEvent) {
        let Some(events) = self.events.as_ref() else {
            return;
        };
        let kind = event.kind();
        if let Err(err) = events.record(event) {
            warn!(event = kind, error = %err, "failed to append event");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::{bail, Result};
    use comfybox_contracts::events::{ActivityLog, EventRecord};
    use comfybox_contracts::inputs::{InputStore, InputValue};
    use comfybox_contracts::results::{Artifact, ExecutionOutcome};
    use comfybox_contracts::schema::ServiceDescriptor;
    use serde_json::json;

    use super::InvocationClient;
    use crate::testing::{upscale_service, ScriptedBackend};

    #[test]
    fn unset_store_sends_defaults_and_returns_images() -> Result<()> {
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(json!({
            "status": "completed",
            "images": ["data:image/png;base64,AAAA"]
        }))]));
        let client = InvocationClient::new(backend.clone());
        let outcome = client.execute(&upscale_service()?, &InputStore::new());

        assert_eq!(backend.bodies(), vec![br#"[{"node_id":"3","text":"cat"}]"#.to_vec()]);
        assert_eq!(
            outcome,
            ExecutionOutcome::Completed {
                artifacts: vec![Artifact::Inline {
                    uri: "data:image/png;base64,AAAA".to_string()
                }]
            }
        );
        Ok(())
    }

    #[test]
    fn repeated_submissions_send_identical_bytes() -> Result<()> {
        let reply = json!({ "status": "completed", "images": [] });
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(reply.clone()), Ok(reply)]));
        let client = InvocationClient::new(backend.clone());
        let service = upscale_service()?;
        let mut store = InputStore::new();
        store.set("3", InputValue::Text("dog".to_string()));

        client.execute(&service, &store);
        client.execute(&service, &store);
        let bodies = backend.bodies();
        assert_eq!(bodies.len(), 2);
        assert_eq!(bodies[0], bodies[1]);
        Ok(())
    }

    #[test]
    fn semantic_failure_is_not_a_transport_failure() -> Result<()> {
        let backend = Arc::new(ScriptedBackend::replying(vec![Ok(json!({ "status": "failed" }))]));
        let outcome = InvocationClient::new(backend).execute(&upscale_service()?, &InputStore::new());
        assert!(matches!(outcome, ExecutionOutcome::Failed { .. }));
        Ok(())
    }

    #[test]
    fn transport_failure_carries_reason_and_leaves_store_alone() -> Result<()> {
        let backend = Arc::new(ScriptedBackend::replying(vec![Err(
            "connection refused".to_string()
        )]));
        let mut store = InputStore::new();
        store.set("3", InputValue::Text("dog".to_string()));
        let before = store.clone();

        let outcome = InvocationClient::new(backend).execute(&upscale_service()?, &store);
        let ExecutionOutcome::TransportFailed { reason } = outcome else {
            bail!("expected transport failure");
        };
        assert!(reason.contains("connection refused"));
        assert_eq!(store, before);
        Ok(())
    }

    #[test]
    fn staging_failure_is_reported_as_transport_failure() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let service: ServiceDescriptor = serde_json::from_value(json!({
            "name": "img2img",
            "input_parameters": [
                { "node_id": "10", "input_field": "image", "data_type": "filepath" }
            ]
        }))?;
        let mut store = InputStore::new();
        store.set(
            "10",
            InputValue::File(comfybox_contracts::inputs::FileHandle::new(
                temp.path().join("vanished.png"),
            )),
        );
        let backend = Arc::new(ScriptedBackend::default());
        let client = InvocationClient::new(backend.clone()).with_stager(
            crate::staging::FileStager::new(Some(temp.path().join("input"))),
        );
        let outcome = client.execute(&service, &store);
        assert_eq!(outcome.kind(), "transport_failed");
        assert!(backend.bodies().is_empty());
        Ok(())
    }

    #[test]
    fn events_record_each_stage() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let events_path = temp.path().join("events.jsonl");
        let backend = Arc::new(ScriptedBackend::replying(vec![
            Err("timed out".to_string()),
            Ok(json!({ "status": "failed", "error": "bad node" })),
            Ok(json!({ "status": "completed", "images": ["http://h/a.png"] })),
        ]));
        let client = InvocationClient::new(backend)
            .with_events(Some(ActivityLog::open(&events_path, "session-1")));
        let service = upscale_service()?;
        client.execute(&service, &InputStore::new());
        client.execute(&service, &InputStore::new());
        client.execute(&service, &InputStore::new());

        let mut records = Vec::new();
        for line in std::fs::read_to_string(&events_path)?.lines() {
            records.push(serde_json::from_str::<EventRecord>(line)?);
        }
        assert!(records.iter().all(|record| record.session_id == "session-1"));
        let kinds: Vec<&str> = records.iter().map(|record| record.event.kind()).collect();
        assert_eq!(
            kinds,
            vec![
                "execution_started",
                "execution_completed",
                "execution_started",
                "execution_failed",
                "execution_started",
                "execution_transport_failed",
            ]
        );
        let sent = records[4].event.payload_sha256();
        assert!(sent.is_some());
        assert_eq!(records[5].event.payload_sha256(), sent);
        Ok(())
    }
}
