use std::sync::Arc;

use anyhow::{bail, Result};
use comfybox_contracts::events::{ActivityEvent, ActivityLog};
use comfybox_contracts::schema::ServiceDescriptor;
use tracing::{info, warn};

use crate::api::{HealthStatus, ServiceBackend};

/// Lists the services the backend exposes, in backend order.
#[derive(Clone)]
pub struct ServiceListClient {
    backend: Arc<dyn ServiceBackend>,
    events: Option<ActivityLog>,
}

impl ServiceListClient {
    pub fn new(backend: Arc<dyn ServiceBackend>, events: Option<ActivityLog>) -> Self {
        Self { backend, events }
    }

    pub fn list_services(&self) -> Result<Vec<ServiceDescriptor>> {
        let services = self.backend.list_services()?;
        info!(count = services.len(), "services listed");
        if let Some(events) = self.events.as_ref() {
            let event =
                ActivityEvent::services_listed(services.iter().map(|service| service.name.as_str()));
            if let Err(err) = events.record(event) {
                warn!(error = %err, "failed to append event");
            }
        }
        Ok(services)
    }

    pub fn health(&self, service_name: &str) -> Result<HealthStatus> {
        self.backend.health(service_name)
    }
}

/// Pick a service by exact name, else case-insensitive name, else 1-based index.
pub fn find_service<'a>(
    services: &'a [ServiceDescriptor],
    target: &str,
) -> Result<&'a ServiceDescriptor> {
    let target = target.trim();
    if let Some(found) = services.iter().find(|service| service.name == target) {
        return Ok(found);
    }
    if let Some(found) = services
        .iter()
        .find(|service| service.name.eq_ignore_ascii_case(target))
    {
        return Ok(found);
    }
    if let Ok(index) = target.parse::<usize>() {
        if let Some(found) = index.checked_sub(1).and_then(|idx| services.get(idx)) {
            return Ok(found);
        }
    }
    bail!("unknown service '{target}'")
}
