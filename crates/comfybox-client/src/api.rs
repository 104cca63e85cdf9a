use anyhow::{bail, Context, Result};
use comfybox_contracts::payload::ExecutionPayload;
use comfybox_contracts::results::ExecutionResponse;
use comfybox_contracts::schema::ServiceDescriptor;
use reqwest::blocking::{Client as HttpClient, Response as HttpResponse};
use reqwest::header::CONTENT_TYPE;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ClientConfig;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct HealthStatus {
    pub status: String,
    #[serde(default)]
    pub service: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedBytes {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

/// Everything the client needs from the backend.
///
/// Every method is one request with no retry; errors carry the full context
/// chain so callers can show it verbatim.
pub trait ServiceBackend: Send + Sync {
    fn list_services(&self) -> Result<Vec<ServiceDescriptor>>;
    fn execute(&self, service_name: &str, payload: &ExecutionPayload)
        -> Result<ExecutionResponse>;
    fn health(&self, service_name: &str) -> Result<HealthStatus>;
    fn fetch(&self, url: &str) -> Result<FetchedBytes>;
}

pub struct HttpBackend {
    config: ClientConfig,
    http: HttpClient,
}

impl HttpBackend {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            http: HttpClient::new(),
        }
    }
}

impl ServiceBackend for HttpBackend {
    fn list_services(&self) -> Result<Vec<ServiceDescriptor>> {
        let endpoint = self.config.services_url()?;
        debug!(%endpoint, "listing services");
        let response = self
            .http
            .get(endpoint.clone())
            .send()
            .with_context(|| format!("service listing request failed ({endpoint})"))?;
        let payload = response_json_or_error("service listing", response)?;
        serde_json::from_value(payload).context("service listing returned an unexpected shape")
    }

    fn execute(
        &self,
        service_name: &str,
        payload: &ExecutionPayload,
    ) -> Result<ExecutionResponse> {
        let endpoint = self.config.service_url(service_name, "execute")?;
        let body = payload.to_json_bytes()?;
        debug!(
            %endpoint,
            body = %String::from_utf8_lossy(&body),
            "submitting execution"
        );
        let response = self
            .http
            .post(endpoint.clone())
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .with_context(|| format!("execute request failed ({endpoint})"))?;
        let parsed = response_json_or_error(service_name, response)?;
        serde_json::from_value(parsed)
            .with_context(|| format!("{service_name} returned a malformed execution result"))
    }

    fn health(&self, service_name: &str) -> Result<HealthStatus> {
        let endpoint = self.config.service_url(service_name, "health")?;
        let response = self
            .http
            .get(endpoint.clone())
            .send()
            .with_context(|| format!("health request failed ({endpoint})"))?;
        let parsed = response_json_or_error(service_name, response)?;
        serde_json::from_value(parsed)
            .with_context(|| format!("{service_name} returned a malformed health payload"))
    }

    fn fetch(&self, url: &str) -> Result<FetchedBytes> {
        let response = self
            .http
            .get(url)
            .send()
            .with_context(|| format!("failed downloading artifact ({url})"))?;
        if !response.status().is_success() {
            let code = response.status().as_u16();
            let body = response.text().unwrap_or_default();
            bail!(
                "artifact download failed ({code}): {}",
                truncate_text(&body, 512)
            );
        }
        let mime_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = response
            .bytes()
            .context("failed reading artifact bytes")?
            .to_vec();
        Ok(FetchedBytes { bytes, mime_type })
    }
}

fn response_json_or_error(label: &str, response: HttpResponse) -> Result<Value> {
    let status = response.status();
    let code = status.as_u16();
    let body = response
        .text()
        .with_context(|| format!("{label} response body read failed"))?;
    if !status.is_success() {
        bail!("{label} request failed ({code}): {}", truncate_text(&body, 512));
    }
    let parsed: Value = serde_json::from_str(&body)
        .with_context(|| format!("{label} returned invalid JSON payload"))?;
    Ok(parsed)
}

/// Flatten an error chain into one line, dropping repeated causes.
pub fn error_chain_text(err: &anyhow::Error, max_chars: usize) -> String {
    let mut parts: Vec<String> = Vec::new();
    for cause in err.chain() {
        let text = cause.to_string();
        let trimmed = text.trim();
        if trimmed.is_empty() || parts.last().is_some_and(|existing| existing == trimmed) {
            continue;
        }
        parts.push(trimmed.to_string());
    }
    if parts.is_empty() {
        return truncate_text(&err.to_string(), max_chars);
    }
    truncate_text(&parts.join(" | caused by: "), max_chars)
}

pub fn truncate_text(value: &str, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value.to_string();
    }
    value.chars().take(max_chars).collect::<String>() + "…"
}

#[cfg(test)]
mod tests {
    use comfybox_contracts::inputs::InputStore;
    use comfybox_contracts::payload::ExecutionPayload;
    use comfybox_contracts::schema::ServiceDescriptor;
    use mockito::Matcher;
    use serde_json::json;

    use super::{error_chain_text, truncate_text, HttpBackend, ServiceBackend};
    use crate::config::{parse_base_url, ClientConfig};

    fn backend_for(server: &mockito::Server) -> anyhow::Result<HttpBackend> {
        let config = ClientConfig::new(parse_base_url(&server.url())?, "unused-out");
        Ok(HttpBackend::new(config))
    }

    #[test]
    fn list_services_parses_catalog() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let mock = server
            .mock("GET", "/services")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                json!([
                    {
                        "name": "upscale",
                        "input_parameters": [
                            { "node_id": "3", "input_field": "text", "data_type": "text", "default_value": "cat", "description": "prompt" }
                        ]
                    },
                    { "name": "GenerateStory", "input_parameters": [] }
                ])
                .to_string(),
            )
            .create();

        let services = backend_for(&server)?.list_services()?;
        mock.assert();
        let names: Vec<&str> = services.iter().map(|service| service.name.as_str()).collect();
        assert_eq!(names, vec!["upscale", "GenerateStory"]);
        assert_eq!(services[0].input_parameters[0].input_field, "text");
        Ok(())
    }

    #[test]
    fn list_services_surfaces_status_and_parse_errors() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/services")
            .with_status(503)
            .with_body("backend down")
            .create();
        let err = backend_for(&server)?
            .list_services()
            .err()
            .map(|err| error_chain_text(&err, 512))
            .unwrap_or_default();
        assert!(err.contains("503"));
        assert!(err.contains("backend down"));

        let mut server = mockito::Server::new();
        let _mock = server
            .mock("GET", "/services")
            .with_status(200)
            .with_body("{\"not\": \"a list\"}")
            .create();
        assert!(backend_for(&server)?.list_services().is_err());
        Ok(())
    }

    #[test]
    fn execute_posts_json_payload_to_named_service() -> anyhow::Result<()> {
        let service: ServiceDescriptor = serde_json::from_value(json!({
            "name": "upscale",
            "input_parameters": [
                { "node_id": "3", "input_field": "text", "data_type": "text", "default_value": "cat" }
            ]
        }))?;
        let payload = ExecutionPayload::build(&service.input_parameters, &InputStore::new());

        let mut server = mockito::Server::new();
        let mock = server
            .mock("POST", "/service/upscale/execute")
            .match_header("content-type", "application/json")
            .match_body(Matcher::Exact(r#"[{"node_id":"3","text":"cat"}]"#.to_string()))
            .with_status(200)
            .with_body(json!({ "status": "completed", "images": ["data:image/png;base64,AAAA"] }).to_string())
            .create();

        let response = backend_for(&server)?.execute("upscale", &payload)?;
        mock.assert();
        assert_eq!(response.status, "completed");
        assert_eq!(
            response.images,
            Some(vec!["data:image/png;base64,AAAA".to_string()])
        );
        Ok(())
    }

    #[test]
    fn execute_rejects_malformed_body() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let _mock = server
            .mock("POST", "/service/upscale/execute")
            .with_status(200)
            .with_body("<html>oops</html>")
            .create();
        let err = backend_for(&server)?
            .execute("upscale", &ExecutionPayload::default())
            .err()
            .map(|err| error_chain_text(&err, 512))
            .unwrap_or_default();
        assert!(err.contains("invalid JSON"));
        Ok(())
    }

    #[test]
    fn health_and_fetch() -> anyhow::Result<()> {
        let mut server = mockito::Server::new();
        let _health = server
            .mock("GET", "/service/upscale/health")
            .with_status(200)
            .with_body(json!({ "status": "healthy", "service": "upscale" }).to_string())
            .create();
        let _image = server
            .mock("GET", "/outputs/a.png")
            .with_status(200)
            .with_header("content-type", "image/png")
            .with_body(vec![1_u8, 2, 3])
            .create();
        let _missing = server
            .mock("GET", "/outputs/missing.png")
            .with_status(404)
            .create();

        let backend = backend_for(&server)?;
        let health = backend.health("upscale")?;
        assert_eq!(health.status, "healthy");
        assert_eq!(health.service.as_deref(), Some("upscale"));

        let fetched = backend.fetch(&format!("{}/outputs/a.png", server.url()))?;
        assert_eq!(fetched.bytes, vec![1, 2, 3]);
        assert_eq!(fetched.mime_type.as_deref(), Some("image/png"));

        assert!(backend
            .fetch(&format!("{}/outputs/missing.png", server.url()))
            .is_err());
        Ok(())
    }

    #[test]
    fn error_chain_joins_and_dedupes_causes() {
        let err = anyhow::anyhow!("connection refused")
            .context("execute request failed (http://x/service/a/execute)");
        assert_eq!(
            error_chain_text(&err, 512),
            "execute request failed (http://x/service/a/execute) | caused by: connection refused"
        );
        assert_eq!(truncate_text("abcdef", 3), "abc…");
    }
}
