use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use comfybox_contracts::results::ExecutionOutcome;
use tracing::{debug, warn};

use crate::card::Submission;
use crate::invocation::InvocationClient;

/// A submission tagged with the card it came from.
#[derive(Debug, Clone)]
pub struct ExecutionJob {
    pub card: usize,
    pub submission: Submission,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionDone {
    pub card: usize,
    pub token: u64,
    pub outcome: ExecutionOutcome,
}

enum WorkerCommand {
    Execute(ExecutionJob),
    Stop,
}

/// Background thread that runs executions so the prompt stays responsive.
pub struct ExecutionWorker {
    sender: Option<mpsc::Sender<WorkerCommand>>,
    results: mpsc::Receiver<ExecutionDone>,
    handle: Option<thread::JoinHandle<()>>,
    in_flight: usize,
}

impl ExecutionWorker {
    pub fn start(client: InvocationClient) -> Result<Self> {
        let (tx, rx) = mpsc::channel::<WorkerCommand>();
        let (done_tx, done_rx) = mpsc::channel::<ExecutionDone>();
        let handle = thread::Builder::new()
            .name("comfybox-exec".to_string())
            .spawn(move || run_worker(client, rx, done_tx))
            .context("execution thread spawn failed")?;
        Ok(Self {
            sender: Some(tx),
            results: done_rx,
            handle: Some(handle),
            in_flight: 0,
        })
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn submit(&mut self, job: ExecutionJob) -> Result<()> {
        let Some(sender) = self.sender.as_ref() else {
            anyhow::bail!("execution worker is stopped");
        };
        sender
            .send(WorkerCommand::Execute(job))
            .map_err(|_| anyhow::anyhow!("execution worker exited"))?;
        self.in_flight += 1;
        Ok(())
    }

    /// Everything finished so far, without blocking.
    pub fn drain(&mut self) -> Vec<ExecutionDone> {
        let mut done = Vec::new();
        while let Ok(item) = self.results.try_recv() {
            done.push(item);
        }
        self.in_flight = self.in_flight.saturating_sub(done.len());
        done
    }

    /// Block until one execution finishes, or `None` when nothing is running.
    pub fn wait_one(&mut self, timeout: Option<Duration>) -> Option<ExecutionDone> {
        if self.in_flight == 0 {
            return None;
        }
        let received = match timeout {
            Some(timeout) => self.results.recv_timeout(timeout).ok(),
            None => self.results.recv().ok(),
        };
        if received.is_some() {
            self.in_flight -= 1;
        }
        received
    }

    pub fn stop(&mut self) {
        if let Some(tx) = self.sender.take() {
            let _ = tx.send(WorkerCommand::Stop);
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for ExecutionWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

fn run_worker(
    client: InvocationClient,
    rx: mpsc::Receiver<WorkerCommand>,
    done: mpsc::Sender<ExecutionDone>,
) {
    while let Ok(command) = rx.recv() {
        let job = match command {
            WorkerCommand::Execute(job) => job,
            WorkerCommand::Stop => break,
        };
        debug!(card = job.card, token = job.submission.token, "executing");
        let outcome = client.execute(&job.submission.descriptor, &job.submission.store);
        let finished = ExecutionDone {
            card: job.card,
            token: job.submission.token,
            outcome,
        };
        if done.send(finished).is_err() {
            warn!("execution result dropped; receiver is gone");
            break;
        }
    }
}
