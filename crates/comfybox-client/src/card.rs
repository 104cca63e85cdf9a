//! Client-side state for one opened service.

use std::path::Path;

use anyhow::{bail, Result};
use comfybox_contracts::inputs::InputStore;
use comfybox_contracts::results::ExecutionOutcome;
use comfybox_contracts::schema::ServiceDescriptor;
use tracing::debug;

use crate::form::{render_form, render_form_text, FormControl};
use crate::invocation::InvocationClient;
use crate::render::{card_slug, ResultEntry, ResultRenderer};

/// Snapshot handed to whoever performs the execution.
#[derive(Debug, Clone)]
pub struct Submission {
    pub token: u64,
    pub descriptor: ServiceDescriptor,
    pub store: InputStore,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    Applied,
    /// Inputs changed after submission; the response was dropped.
    Stale,
    /// No submission with this token is outstanding.
    Unexpected,
}

#[derive(Debug, Clone)]
pub struct ServiceCard {
    descriptor: ServiceDescriptor,
    controls: Vec<FormControl>,
    store: InputStore,
    entries: Vec<ResultEntry>,
    generation: u64,
    pending: Option<u64>,
    slug: String,
}

impl ServiceCard {
    pub fn new(descriptor: ServiceDescriptor) -> Self {
        let controls = render_form(&descriptor);
        let slug = card_slug(&descriptor.name);
        Self {
            descriptor,
            controls,
            store: InputStore::new(),
            entries: Vec::new(),
            generation: 0,
            pending: None,
            slug,
        }
    }

    pub fn descriptor(&self) -> &ServiceDescriptor {
        &self.descriptor
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn controls(&self) -> &[FormControl] {
        &self.controls
    }

    pub fn store(&self) -> &InputStore {
        &self.store
    }

    pub fn entries(&self) -> &[ResultEntry] {
        &self.entries
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_pending(&self) -> bool {
        self.pending.is_some()
    }

    pub fn form_lines(&self) -> Vec<String> {
        render_form_text(&self.controls, &self.store)
    }

    pub fn edit(&mut self, row: usize, raw: &str) -> Result<()> {
        control_at(&self.controls, &self.descriptor.name, row)?.edit(raw, &mut self.store)?;
        self.generation += 1;
        Ok(())
    }

    pub fn select_file(&mut self, row: usize, path: &Path) -> Result<()> {
        control_at(&self.controls, &self.descriptor.name, row)?.select(path, &mut self.store)?;
        self.generation += 1;
        Ok(())
    }

    /// First row bound to `node_id`, for callers addressing inputs by node.
    pub fn row_for_node(&self, node_id: &str) -> Option<usize> {
        self.controls
            .iter()
            .position(|control| control.node_id == node_id)
    }

    pub fn begin_submission(&mut self) -> Result<Submission> {
        if self.pending.is_some() {
            bail!("a submission is already in flight for {}", self.descriptor.name);
        }
        self.generation += 1;
        self.pending = Some(self.generation);
        debug!(card = %self.slug, token = self.generation, "submission started");
        Ok(Submission {
            token: self.generation,
            descriptor: self.descriptor.clone(),
            store: self.store.clone(),
        })
    }

    /// Apply a finished execution, rendering it only if nothing changed since.
    pub fn complete_submission(
        &mut self,
        token: u64,
        outcome: &ExecutionOutcome,
        renderer: &ResultRenderer,
    ) -> Completion {
        if self.pending != Some(token) {
            return Completion::Unexpected;
        }
        self.pending = None;
        if token != self.generation {
            debug!(card = %self.slug, token, generation = self.generation, "dropping stale response");
            return Completion::Stale;
        }
        self.entries = renderer.render(&self.slug, token, outcome);
        Completion::Applied
    }

    /// Run one submission on the calling thread.
    pub fn submit_blocking(
        &mut self,
        client: &InvocationClient,
        renderer: &ResultRenderer,
    ) -> Result<ExecutionOutcome> {
        let submission = self.begin_submission()?;
        let outcome = client.execute(&submission.descriptor, &submission.store);
        self.complete_submission(submission.token, &outcome, renderer);
        Ok(outcome)
    }

    /// Download the link at `index` and show the fetched image in its place.
    pub fn download(
        &mut self,
        index: usize,
        client: &InvocationClient,
        renderer: &ResultRenderer,
    ) -> Result<&ResultEntry> {
        let Some(entry) = self.entries.get(index) else {
            bail!("no result {}", index + 1);
        };
        let replaced = renderer.download(client.backend(), &self.slug, index, entry)?;
        self.entries[index] = replaced;
        Ok(&self.entries[index])
    }
}

fn control_at<'a>(controls: &'a [FormControl], service: &str, row: usize) -> Result<&'a FormControl> {
    match controls.get(row) {
        Some(control) => Ok(control),
        None => bail!("{service} has no row {} (rows 1-{})", row + 1, controls.len()),
    }
}
