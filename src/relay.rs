//! # Completion Relay
//!
//! Watches a submitted job until it reaches a terminal state and reports the
//! outcome exactly once.
//!
//! ## Strategies
//!
//! - **Listen**: subscribe to the job's state transitions. States before
//!   `Started` are submission churn and are skipped. Falls back to polling
//!   when the job offers no subscription.
//! - **Poll**: read the job state on a fixed interval.
//!
//! Either way the relay never spins: it sleeps on a tokio interval or on a
//! watch channel. An optional finish signal from the document adapter wakes
//! the poller early.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use tokio::sync::{oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, instrument, warn};

use crate::platform::{JobState, PrintJob};

/// Default interval between job state reads.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Terminal result of a print job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum JobOutcome {
    Succeeded,
    Cancelled,
    Failed,
}

impl JobOutcome {
    /// Outcome for a terminal state, `None` while the job is in flight.
    pub fn from_state(state: JobState) -> Option<Self> {
        match state {
            JobState::Completed => Some(JobOutcome::Succeeded),
            JobState::Cancelled => Some(JobOutcome::Cancelled),
            JobState::Failed => Some(JobOutcome::Failed),
            _ => None,
        }
    }

    /// The boolean the bridge reports: only success counts as completed.
    pub fn completed(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

/// How the relay observes job state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RelayStrategy {
    Poll,
    #[default]
    Listen,
}

/// At-most-once reporter.
///
/// The first [`report`](Self::report) delivers its value; every later call
/// is dropped and returns `false`.
#[derive(Debug)]
pub struct Completion<T> {
    sender: Mutex<Option<oneshot::Sender<T>>>,
}

impl<T> Completion<T> {
    pub fn new() -> (Self, oneshot::Receiver<T>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                sender: Mutex::new(Some(tx)),
            },
            rx,
        )
    }

    pub fn report(&self, value: T) -> bool {
        let sender = match self.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };

        match sender {
            Some(tx) => tx.send(value).is_ok(),
            None => false,
        }
    }
}

/// Waits for print jobs to finish.
#[derive(Debug, Clone, Copy)]
pub struct CompletionRelay {
    strategy: RelayStrategy,
    interval: Duration,
}

impl Default for CompletionRelay {
    fn default() -> Self {
        Self::new(RelayStrategy::default(), DEFAULT_POLL_INTERVAL)
    }
}

impl CompletionRelay {
    pub fn new(strategy: RelayStrategy, interval: Duration) -> Self {
        Self { strategy, interval }
    }

    /// Wait until `job` is terminal and return its outcome.
    ///
    /// `finished` is the adapter's finish signal, if the job has one.
    #[instrument(skip_all, fields(job = %job.id(), strategy = ?self.strategy))]
    pub async fn await_completion(
        &self,
        job: Arc<dyn PrintJob>,
        finished: Option<oneshot::Receiver<()>>,
    ) -> JobOutcome {
        let outcome = match (self.strategy, job.subscribe()) {
            (RelayStrategy::Listen, Some(rx)) => listen(rx).await,
            (RelayStrategy::Listen, None) => {
                debug!("Job offers no listener, polling");
                poll(job.as_ref(), self.interval, finished).await
            }
            (RelayStrategy::Poll, _) => poll(job.as_ref(), self.interval, finished).await,
        };

        info!(?outcome, "Print job finished");
        outcome
    }

    /// Relay in a background task and hand the outcome to `on_complete`.
    ///
    /// `on_complete` runs exactly once unless the runtime shuts down first.
    pub fn spawn<F>(
        self,
        job: Arc<dyn PrintJob>,
        finished: Option<oneshot::Receiver<()>>,
        on_complete: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(JobOutcome) + Send + 'static,
    {
        tokio::spawn(async move {
            let outcome = self.await_completion(job, finished).await;
            on_complete(outcome);
        })
    }
}

async fn listen(mut rx: watch::Receiver<JobState>) -> JobOutcome {
    loop {
        let state = *rx.borrow_and_update();

        if state.has_started() {
            if let Some(outcome) = JobOutcome::from_state(state) {
                return outcome;
            }
        } else {
            debug!(?state, "Ignoring pre-start state");
        }

        if rx.changed().await.is_err() {
            // Service dropped the job; the last published state is final
            let last = *rx.borrow();
            return JobOutcome::from_state(last).unwrap_or_else(|| {
                warn!(state = ?last, "Job listener closed before a terminal state");
                JobOutcome::Failed
            });
        }
    }
}

async fn poll(
    job: &dyn PrintJob,
    interval: Duration,
    mut finished: Option<oneshot::Receiver<()>>,
) -> JobOutcome {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        if let Some(outcome) = JobOutcome::from_state(job.state()) {
            return outcome;
        }

        let finish_fired = tokio::select! {
            _ = ticker.tick() => false,
            _ = finish_signal(&mut finished) => true,
        };

        if finish_fired {
            debug!("Adapter finished");
            finished = None;
        }
    }
}

/// Resolves when the finish signal fires or its sender is dropped; never
/// resolves when there is no signal.
async fn finish_signal(finished: &mut Option<oneshot::Receiver<()>>) {
    match finished {
        Some(rx) => {
            let _ = rx.await;
        }
        None => std::future::pending::<()>().await,
    }
}

// ============================================================================
// TESTS
// ============================================================================
