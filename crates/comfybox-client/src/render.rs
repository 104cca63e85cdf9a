use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use comfybox_contracts::results::{parse_data_uri, Artifact, ExecutionOutcome};
use percent_encoding::percent_decode_str;
use tracing::{debug, warn};
use url::Url;

use crate::api::ServiceBackend;
use crate::config::ClientConfig;

/// One displayed result on a card.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResultEntry {
    Image {
        path: PathBuf,
        width: Option<u32>,
        height: Option<u32>,
    },
    Link {
        href: String,
    },
    /// An inline artifact that could not be decoded.
    Broken {
        reason: String,
    },
    Diagnostic {
        message: String,
    },
    Notice {
        message: String,
    },
}

impl ResultEntry {
    pub fn describe(&self) -> String {
        match self {
            Self::Image {
                path,
                width: Some(width),
                height: Some(height),
            } => format!("image {} ({width}x{height})", path.display()),
            Self::Image { path, .. } => format!("image {}", path.display()),
            Self::Link { href } => format!("link {href}"),
            Self::Broken { reason } => format!("broken image: {reason}"),
            Self::Diagnostic { message } => format!("diagnostic: {message}"),
            Self::Notice { message } => format!("notice: {message}"),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ResultRenderer {
    config: ClientConfig,
}

impl ResultRenderer {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn card_dir(&self, card_slug: &str) -> PathBuf {
        self.config.out_dir.join(card_slug)
    }

    pub fn render(
        &self,
        card_slug: &str,
        generation: u64,
        outcome: &ExecutionOutcome,
    ) -> Vec<ResultEntry> {
        match outcome {
            ExecutionOutcome::Completed { artifacts } => {
                self.render_artifacts(card_slug, generation, artifacts)
            }
            ExecutionOutcome::Failed { diagnostic, .. } => vec![ResultEntry::Diagnostic {
                message: diagnostic.clone(),
            }],
            ExecutionOutcome::TransportFailed { reason } => vec![ResultEntry::Notice {
                message: format!("request failed: {reason}"),
            }],
        }
    }

    pub fn render_artifacts(
        &self,
        card_slug: &str,
        generation: u64,
        artifacts: &[Artifact],
    ) -> Vec<ResultEntry> {
        artifacts
            .iter()
            .enumerate()
            .map(|(index, artifact)| match artifact {
                Artifact::Inline { uri } => {
                    match self.write_inline(card_slug, generation, index, uri) {
                        Ok(entry) => entry,
                        Err(err) => {
                            warn!(card = card_slug, index, error = %err, "inline image not decodable");
                            ResultEntry::Broken {
                                reason: format!("{err:#}"),
                            }
                        }
                    }
                }
                Artifact::Reference(raw) => ResultEntry::Link {
                    href: self.config.resolve_reference(raw),
                },
            })
            .collect()
    }

    fn write_inline(
        &self,
        card_slug: &str,
        generation: u64,
        index: usize,
        uri: &str,
    ) -> Result<ResultEntry> {
        let Some(data) = parse_data_uri(uri) else {
            bail!("data URI has no payload separator");
        };
        let bytes: Vec<u8> = if data.base64 {
            BASE64
                .decode(data.payload.trim().as_bytes())
                .context("inline image base64 decode failed")?
        } else {
            percent_decode_str(data.payload).collect()
        };
        let ext = extension_for_mime(Some(data.mime));
        let path = self
            .card_dir(card_slug)
            .join(format!("result-{generation}-{index:02}.{ext}"));
        write_image_file(&path, &bytes)
    }

    /// Fetch a `Link` entry and turn it into an `Image` entry.
    pub fn download(
        &self,
        backend: &dyn ServiceBackend,
        card_slug: &str,
        index: usize,
        entry: &ResultEntry,
    ) -> Result<ResultEntry> {
        let ResultEntry::Link { href } = entry else {
            bail!("result {} is not a downloadable link", index + 1);
        };
        let fetched = backend.fetch(href)?;
        let file_name = file_name_from_url(href).unwrap_or_else(|| {
            format!(
                "download-{index:02}.{}",
                extension_for_mime(fetched.mime_type.as_deref())
            )
        });
        let path = self.card_dir(card_slug).join(file_name);
        debug!(%href, path = %path.display(), "downloaded artifact");
        write_image_file(&path, &fetched.bytes)
    }
}

/// Classify raw strings by prefix alone, whatever they carry.
pub fn classify_strings(raw: &[String]) -> Vec<Artifact> {
    raw.iter().map(|item| Artifact::classify(item)).collect()
}

/// Turn a service name into a directory-safe card slug.
pub fn card_slug(service_name: &str) -> String {
    let slug: String = service_name
        .chars()
        .map(|ch| {
            if ch.is_ascii_alphanumeric() || ch == '-' || ch == '_' {
                ch.to_ascii_lowercase()
            } else {
                '-'
            }
        })
        .collect();
    let slug = slug.trim_matches('-').to_string();
    if slug.is_empty() {
        "service".to_string()
    } else {
        slug
    }
}

fn write_image_file(path: &Path, bytes: &[u8]) -> Result<ResultEntry> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, bytes).with_context(|| format!("failed to write {}", path.display()))?;
    let (width, height) = match image::load_from_memory(bytes) {
        Ok(decoded) => (Some(decoded.width()), Some(decoded.height())),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "image dimensions unavailable");
            (None, None)
        }
    };
    Ok(ResultEntry::Image {
        path: path.to_path_buf(),
        width,
        height,
    })
}

fn extension_for_mime(mime: Option<&str>) -> &'static str {
    let Some(mime) = mime else {
        return "bin";
    };
    let lowered = mime.to_ascii_lowercase();
    if lowered.contains("jpeg") || lowered.contains("jpg") {
        return "jpg";
    }
    if lowered.contains("webp") {
        return "webp";
    }
    if lowered.contains("png") {
        return "png";
    }
    if lowered.contains("gif") {
        return "gif";
    }
    if lowered.contains("svg") {
        return "svg";
    }
    "bin"
}

fn file_name_from_url(href: &str) -> Option<String> {
    let url = Url::parse(href).ok()?;
    let from_query = url
        .query_pairs()
        .find(|(key, _)| key == "filename")
        .map(|(_, value)| value.to_string());
    let from_path = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .map(str::to_string);
    from_query
        .into_iter()
        .chain(from_path)
        .map(|name| name.replace(['/', '\\'], "_"))
        .find(|name| name.contains('.') && !name.starts_with('.'))
}
