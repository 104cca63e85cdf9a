use std::io::{self, BufRead, ErrorKind, Write};
use std::path::Path;

use anyhow::{bail, Result};
use comfybox_client::card::Completion;
use comfybox_client::catalog::find_service;
use comfybox_client::worker::{ExecutionDone, ExecutionJob, ExecutionWorker};
use comfybox_client::ServiceCard;
use comfybox_contracts::results::ExecutionOutcome;
use comfybox_contracts::schema::ServiceDescriptor;
use comfybox_contracts::session::{help_lines, parse_command, SessionCommand};
use tracing::debug;

use crate::{entry_lines, service_lines, AppContext};

/// Open cards plus the execution worker; all card state stays on this thread.
struct Session<'a> {
    ctx: &'a AppContext,
    services: Vec<ServiceDescriptor>,
    cards: Vec<ServiceCard>,
    active: Option<usize>,
    worker: ExecutionWorker,
}

pub(crate) fn run_session(ctx: &AppContext) -> Result<()> {
    let mut session = Session::new(ctx)?;

    println!("ComfyBox session on {}. Type /help for commands.", ctx.config.base_url);
    match session.reload_services() {
        Ok(lines) => print_lines(&lines),
        Err(err) => println!("{err:#}"),
    }

    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut line = String::new();
    loop {
        for message in session.apply_finished() {
            println!("{message}");
        }
        print!("{}> ", session.prompt_label());
        io::stdout().flush()?;

        line.clear();
        let read = match input.read_line(&mut line) {
            Ok(read) => read,
            Err(err) if err.kind() == ErrorKind::Interrupted => continue,
            Err(err) => return Err(err.into()),
        };
        if read == 0 {
            break;
        }

        let command = parse_command(line.trim_end_matches(['\n', '\r']));
        if command == SessionCommand::Quit {
            break;
        }
        match session.handle(command) {
            Ok(lines) => print_lines(&lines),
            Err(err) => println!("error: {err:#}"),
        }
    }
    session.worker.stop();
    Ok(())
}

fn print_lines(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}

impl<'a> Session<'a> {
    fn new(ctx: &'a AppContext) -> Result<Self> {
        Ok(Self {
            ctx,
            services: Vec::new(),
            cards: Vec::new(),
            active: None,
            worker: ExecutionWorker::start(ctx.invocation.clone())?,
        })
    }

    fn prompt_label(&self) -> String {
        match self.active.and_then(|index| self.cards.get(index)) {
            Some(card) if card.is_pending() => format!("{} (running)", card.name()),
            Some(card) => card.name().to_string(),
            None => "comfybox".to_string(),
        }
    }

    fn handle(&mut self, command: SessionCommand) -> Result<Vec<String>> {
        match command {
            SessionCommand::Noop | SessionCommand::Quit => Ok(Vec::new()),
            SessionCommand::Help => Ok(help_lines()),
            SessionCommand::Services => self.reload_services(),
            SessionCommand::Open { target } => self.open(&target),
            SessionCommand::Cards => Ok(self.card_lines()),
            SessionCommand::Form => Ok(self.active_card()?.form_lines()),
            SessionCommand::Set { row, value } => {
                let card = self.active_card_mut()?;
                card.edit(row, &value)?;
                Ok(card.form_lines())
            }
            SessionCommand::File { row, path } => {
                let card = self.active_card_mut()?;
                card.select_file(row, Path::new(&path))?;
                Ok(card.form_lines())
            }
            SessionCommand::Submit => self.submit(),
            SessionCommand::Wait => Ok(self.wait_all()),
            SessionCommand::Results => self.result_lines(),
            SessionCommand::Download { index } => {
                let ctx = self.ctx;
                let card = self.active_card_mut()?;
                let entry = card.download(index, &ctx.invocation, &ctx.renderer)?;
                Ok(vec![format!("  [{}] {}", index + 1, entry.describe())])
            }
            SessionCommand::Health => {
                let name = self.active_card()?.name().to_string();
                let health = self.ctx.catalog.health(&name)?;
                Ok(vec![format!("{name}: {}", health.status)])
            }
            SessionCommand::Invalid { message } => Ok(vec![message]),
            SessionCommand::Unknown { command, .. } => {
                Ok(vec![format!("unknown command /{command}; type /help")])
            }
        }
    }

    fn reload_services(&mut self) -> Result<Vec<String>> {
        self.services = self.ctx.load_services()?;
        Ok(service_lines(&self.services))
    }

    fn open(&mut self, target: &str) -> Result<Vec<String>> {
        if self.services.is_empty() {
            self.reload_services()?;
        }
        let descriptor = find_service(&self.services, target)?.clone();
        let index = match self
            .cards
            .iter()
            .position(|card| card.name() == descriptor.name)
        {
            Some(index) => index,
            None => {
                self.cards.push(ServiceCard::new(descriptor));
                self.cards.len() - 1
            }
        };
        self.active = Some(index);
        let card = &self.cards[index];
        let mut lines = vec![format!("{} ({} inputs)", card.name(), card.controls().len())];
        lines.extend(card.form_lines());
        Ok(lines)
    }

    fn card_lines(&self) -> Vec<String> {
        if self.cards.is_empty() {
            return vec!["no cards open; use /open <name|index>".to_string()];
        }
        self.cards
            .iter()
            .enumerate()
            .map(|(index, card)| {
                let marker = if self.active == Some(index) { "*" } else { " " };
                let state = if card.is_pending() {
                    "running".to_string()
                } else {
                    format!("{} results", card.entries().len())
                };
                format!("{marker} {}  {state}", card.name())
            })
            .collect()
    }

    fn submit(&mut self) -> Result<Vec<String>> {
        let index = self.active_index()?;
        let ctx = self.ctx;
        let card = &mut self.cards[index];
        let submission = card.begin_submission()?;
        let token = submission.token;
        if let Err(err) = self.worker.submit(ExecutionJob {
            card: index,
            submission,
        }) {
            let outcome = ExecutionOutcome::transport(format!("{err:#}"));
            card.complete_submission(token, &outcome, &ctx.renderer);
            return Err(err);
        }
        Ok(vec![format!("submitted {}", card.name())])
    }

    fn wait_all(&mut self) -> Vec<String> {
        let mut messages = self.apply_finished();
        while let Some(done) = self.worker.wait_one(None) {
            messages.extend(self.apply(done));
        }
        if messages.is_empty() {
            messages.push("nothing in flight".to_string());
        }
        messages
    }

    fn apply_finished(&mut self) -> Vec<String> {
        let finished = self.worker.drain();
        finished.into_iter().flat_map(|done| self.apply(done)).collect()
    }

    fn apply(&mut self, done: ExecutionDone) -> Vec<String> {
        let renderer = &self.ctx.renderer;
        let Some(card) = self.cards.get_mut(done.card) else {
            debug!(card = done.card, "result for a card that no longer exists");
            return Vec::new();
        };
        match card.complete_submission(done.token, &done.outcome, renderer) {
            Completion::Applied => {
                let mut lines = vec![format!("{}: {}", card.name(), done.outcome.kind())];
                if card.entries().is_empty() {
                    lines.push("  no images returned".to_string());
                }
                lines.extend(entry_lines(card.entries()));
                lines
            }
            Completion::Stale => vec![format!(
                "{}: inputs changed while running; result dropped",
                card.name()
            )],
            Completion::Unexpected => Vec::new(),
        }
    }

    fn result_lines(&self) -> Result<Vec<String>> {
        let card = self.active_card()?;
        if card.entries().is_empty() {
            return Ok(vec![format!("{}: no results", card.name())]);
        }
        Ok(entry_lines(card.entries()))
    }

    fn active_index(&self) -> Result<usize> {
        match self.active {
            Some(index) if index < self.cards.len() => Ok(index),
            _ => bail!("no active card; use /open <name|index>"),
        }
    }

    fn active_card(&self) -> Result<&ServiceCard> {
        let index = self.active_index()?;
        Ok(&self.cards[index])
    }

    fn active_card_mut(&mut self) -> Result<&mut ServiceCard> {
        let index = self.active_index()?;
        Ok(&mut self.cards[index])
    }
}
