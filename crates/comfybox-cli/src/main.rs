use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfybox_client::catalog::{find_service, ServiceListClient};
use comfybox_client::config::ClientConfig;
use comfybox_client::render::{ResultEntry, ResultRenderer};
use comfybox_client::{FileStager, HttpBackend, InvocationClient, ServiceBackend, ServiceCard};
use comfybox_contracts::events::ActivityLog;
use comfybox_contracts::results::ExecutionOutcome;
use tracing_subscriber::EnvFilter;

mod interactive;

#[derive(Debug, Parser)]
#[command(name = "comfybox", version, about = "Terminal client for ComfyBox services")]
struct Cli {
    /// Backend base URL; overrides COMFYBOX_API_URL, VITE_API_URL, API_HOST/API_PORT.
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// Directory results are written to.
    #[arg(long, global = true)]
    out: Option<PathBuf>,
    /// Append activity events (JSONL) to this file.
    #[arg(long, global = true)]
    events: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the services the backend exposes.
    Services,
    /// Show the form for one service.
    Form { service: String },
    /// Execute one service and render its results.
    Run(RunArgs),
    /// Check one service's health endpoint.
    Health { service: String },
    /// Open the interactive session.
    Interactive,
}

#[derive(Debug, Parser)]
struct RunArgs {
    service: String,
    /// Text or number input, as `node_id=value`.
    #[arg(long = "set", value_parser = parse_assignment)]
    set: Vec<(String, String)>,
    /// File input, as `node_id=path`.
    #[arg(long = "file", value_parser = parse_assignment)]
    file: Vec<(String, String)>,
    /// Fetch linked results into the output directory.
    #[arg(long)]
    download: bool,
}

/// Everything the commands share, built once per process.
pub(crate) struct AppContext {
    pub config: ClientConfig,
    pub catalog: ServiceListClient,
    pub invocation: InvocationClient,
    pub renderer: ResultRenderer,
}

impl AppContext {
    fn build(cli: &Cli) -> Result<Self> {
        let config = ClientConfig::from_env(cli.api_url.as_deref(), cli.out.clone(), cli.events.clone())?;
        let backend: Arc<dyn ServiceBackend> = Arc::new(HttpBackend::new(config.clone()));
        Ok(Self::with_backend(config, backend))
    }

    pub(crate) fn with_backend(config: ClientConfig, backend: Arc<dyn ServiceBackend>) -> Self {
        let events = config.events_path.clone().map(ActivityLog::with_new_session);
        let catalog = ServiceListClient::new(Arc::clone(&backend), events.clone());
        let invocation = InvocationClient::new(backend)
            .with_stager(FileStager::new(config.input_dir.clone()))
            .with_events(events);
        let renderer = ResultRenderer::new(config.clone());
        Self {
            config,
            catalog,
            invocation,
            renderer,
        }
    }

    pub(crate) fn open_card(&self, target: &str) -> Result<ServiceCard> {
        let services = self.load_services()?;
        let descriptor = find_service(&services, target)?;
        Ok(ServiceCard::new(descriptor.clone()))
    }

    pub(crate) fn load_services(&self) -> Result<Vec<comfybox_contracts::schema::ServiceDescriptor>> {
        self.catalog
            .list_services()
            .context("could not load services")
    }
}

fn main() {
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("comfybox error: {err:#}");
            std::process::exit(1);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    init_tracing();
    let ctx = AppContext::build(&cli)?;
    tracing::debug!(base_url = %ctx.config.base_url, "client configured");
    match cli.command {
        Command::Services => {
            for line in service_lines(&ctx.load_services()?) {
                println!("{line}");
            }
            Ok(0)
        }
        Command::Form { ref service } => {
            let card = ctx.open_card(service)?;
            println!("{}", card.name());
            for line in card.form_lines() {
                println!("  {line}");
            }
            Ok(0)
        }
        Command::Run(ref args) => run_once(&ctx, args),
        Command::Health { ref service } => {
            let health = ctx.catalog.health(service)?;
            println!(
                "{}: {}",
                health.service.as_deref().unwrap_or(service),
                health.status
            );
            Ok(0)
        }
        Command::Interactive => {
            interactive::run_session(&ctx)?;
            Ok(0)
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run_once(ctx: &AppContext, args: &RunArgs) -> Result<i32> {
    let mut card = ctx.open_card(&args.service)?;
    for (node_id, value) in &args.set {
        let row = card
            .row_for_node(node_id)
            .with_context(|| format!("{} has no input for node {node_id}", card.name()))?;
        card.edit(row, value)?;
    }
    for (node_id, path) in &args.file {
        let row = card
            .row_for_node(node_id)
            .with_context(|| format!("{} has no input for node {node_id}", card.name()))?;
        card.select_file(row, &PathBuf::from(path))?;
    }

    let outcome = card.submit_blocking(&ctx.invocation, &ctx.renderer)?;
    let failures = if args.download {
        download_links(&mut card, ctx)
    } else {
        Vec::new()
    };
    for line in entry_lines(card.entries()) {
        println!("{line}");
    }
    if card.entries().is_empty() {
        println!("{} completed with no images", card.name());
    }
    for line in failures {
        println!("{line}");
    }
    Ok(match outcome {
        ExecutionOutcome::Completed { .. } => 0,
        ExecutionOutcome::Failed { .. } | ExecutionOutcome::TransportFailed { .. } => 2,
    })
}

/// Fetch every linked result; one line per fetch that failed.
fn download_links(card: &mut ServiceCard, ctx: &AppContext) -> Vec<String> {
    let links: Vec<usize> = card
        .entries()
        .iter()
        .enumerate()
        .filter(|(_, entry)| matches!(entry, ResultEntry::Link { .. }))
        .map(|(index, _)| index)
        .collect();
    let mut failures = Vec::new();
    for index in links {
        if let Err(err) = card.download(index, &ctx.invocation, &ctx.renderer) {
            failures.push(format!("download [{}] failed: {err:#}", index + 1));
        }
    }
    failures
}

pub(crate) fn service_lines(services: &[comfybox_contracts::schema::ServiceDescriptor]) -> Vec<String> {
    if services.is_empty() {
        return vec!["no services available".to_string()];
    }
    services
        .iter()
        .enumerate()
        .map(|(index, service)| {
            let count = service.input_parameters.len();
            let noun = if count == 1 { "input" } else { "inputs" };
            format!("{:>3}. {} ({count} {noun})", index + 1, service.name)
        })
        .collect()
}

pub(crate) fn entry_lines(entries: &[ResultEntry]) -> Vec<String> {
    entries
        .iter()
        .enumerate()
        .map(|(index, entry)| format!("  [{}] {}", index + 1, entry.describe()))
        .collect()
}

fn parse_assignment(raw: &str) -> Result<(String, String), String> {
    let Some((node_id, value)) = raw.split_once('=') else {
        return Err(format!("expected node_id=value, got '{raw}'"));
    };
    let node_id = node_id.trim();
    if node_id.is_empty() {
        return Err(format!("missing node_id in '{raw}'"));
    }
    Ok((node_id.to_string(), value.to_string()))
}
