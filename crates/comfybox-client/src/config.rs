use std::env;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use url::Url;

pub const DEFAULT_API_HOST: &str = "localhost";
pub const DEFAULT_API_PORT: &str = "8686";
pub const DEFAULT_OUT_DIR: &str = "comfybox-out";

/// Settings resolved once at start-up; never reconfigured at runtime.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: Url,
    pub out_dir: PathBuf,
    /// Shared directory files are copied into before submission.
    pub input_dir: Option<PathBuf>,
    pub events_path: Option<PathBuf>,
}

impl ClientConfig {
    pub fn new(base_url: Url, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_url,
            out_dir: out_dir.into(),
            input_dir: None,
            events_path: None,
        }
    }

    /// Resolve from an explicit flag and the process environment.
    pub fn from_env(
        api_url: Option<&str>,
        out_dir: Option<PathBuf>,
        events_path: Option<PathBuf>,
    ) -> Result<Self> {
        Self::resolve(api_url, out_dir, events_path, non_empty_env)
    }

    pub fn resolve(
        api_url: Option<&str>,
        out_dir: Option<PathBuf>,
        events_path: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let raw = api_url
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
            .or_else(|| lookup("COMFYBOX_API_URL"))
            .or_else(|| lookup("VITE_API_URL"))
            .unwrap_or_else(|| {
                format!(
                    "http://{}:{}",
                    lookup("API_HOST").unwrap_or_else(|| DEFAULT_API_HOST.to_string()),
                    lookup("API_PORT").unwrap_or_else(|| DEFAULT_API_PORT.to_string()),
                )
            });
        let base_url = parse_base_url(&raw)?;
        let input_dir = lookup("COMFYBOX_INPUT_DIR")
            .or_else(|| lookup("INPUT_DIR"))
            .map(PathBuf::from);
        Ok(Self {
            base_url,
            out_dir: out_dir.unwrap_or_else(|| PathBuf::from(DEFAULT_OUT_DIR)),
            input_dir,
            events_path,
        })
    }

    pub fn services_url(&self) -> Result<Url> {
        self.endpoint(&["services"])
    }

    pub fn service_url(&self, service_name: &str, action: &str) -> Result<Url> {
        self.endpoint(&["service", service_name, action])
    }

    /// http(s) URLs pass through; anything else is joined to the base.
    pub fn resolve_reference(&self, raw: &str) -> String {
        let absolute = Url::parse(raw)
            .ok()
            .filter(|url| matches!(url.scheme(), "http" | "https"));
        if absolute.is_some() {
            return raw.to_string();
        }
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        // `./` keeps a colon in the first segment from reading as a scheme.
        base.join(&format!("./{}", raw.trim_start_matches('/')))
            .map(|url| url.to_string())
            .unwrap_or_else(|_| raw.to_string())
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| anyhow::anyhow!("base URL cannot carry a path: {}", self.base_url))?;
            path.pop_if_empty();
            for segment in segments {
                path.push(segment);
            }
        }
        Ok(url)
    }
}

pub fn parse_base_url(raw: &str) -> Result<Url> {
    let trimmed = raw.trim().trim_end_matches('/');
    let url = Url::parse(trimmed).with_context(|| format!("invalid API base URL '{raw}'"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("API base URL must use http or https, got '{raw}'");
    }
    Ok(url)
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
