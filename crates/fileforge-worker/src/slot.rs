//! Execution slots and the per-slot execution shim.
//!
//! A slot is a long-lived task that owns one [`SlotContext`] and runs the
//! jobs the coordinator hands it, one at a time. Each job runs in its own
//! spawned task so that a panic anywhere in the conversion is observed as a
//! slot crash instead of tearing down the coordinator.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;

use fileforge_codecs::{ConversionRequest, Dispatcher, SlotContext};
use fileforge_core::ProgressReporter;
use fileforge_core::types::Job;

use crate::message::{SlotAddress, SlotEvent, SlotEventKind};

/// Coordinator-side handle to a running slot.
#[derive(Debug)]
pub(crate) struct SlotHandle {
    address: SlotAddress,
    jobs: mpsc::UnboundedSender<Job>,
    task: JoinHandle<()>,
}

impl SlotHandle {
    /// Start a slot with a fresh context.
    pub fn spawn(
        address: SlotAddress,
        dispatcher: Arc<Dispatcher>,
        context: SlotContext,
        events: mpsc::UnboundedSender<SlotEvent>,
    ) -> Self {
        let (jobs, inbox) = mpsc::unbounded_channel();
        let span = tracing::debug_span!("slot", index = address.index, generation = address.generation);
        let task = tokio::spawn(
            run_slot(address, dispatcher, Arc::new(context), inbox, events).instrument(span),
        );
        Self {
            address,
            jobs,
            task,
        }
    }

    pub fn address(&self) -> SlotAddress {
        self.address
    }

    /// Hand a job to the slot. Gives the job back if the slot is gone.
    pub fn dispatch(&self, job: Job) -> Result<(), Job> {
        self.jobs.send(job).map_err(|e| e.0)
    }
}

impl Drop for SlotHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Reports a crash if the slot task ends without reaching its normal exit.
struct CrashGuard {
    address: SlotAddress,
    events: mpsc::UnboundedSender<SlotEvent>,
    armed: bool,
}

impl Drop for CrashGuard {
    fn drop(&mut self) {
        if self.armed {
            let _ = self.events.send(SlotEvent::new(
                self.address,
                SlotEventKind::Crashed {
                    reason: "slot task ended unexpectedly".to_string(),
                },
            ));
        }
    }
}

/// The running job's task. Aborted when the slot task is dropped mid-job,
/// so tearing down a slot also stops the conversion it was running.
struct JobTask(JoinHandle<()>);

impl Drop for JobTask {
    fn drop(&mut self) {
        self.0.abort();
    }
}

async fn run_slot(
    address: SlotAddress,
    dispatcher: Arc<Dispatcher>,
    context: Arc<SlotContext>,
    mut inbox: mpsc::UnboundedReceiver<Job>,
    events: mpsc::UnboundedSender<SlotEvent>,
) {
    let mut guard = CrashGuard {
        address,
        events: events.clone(),
        armed: true,
    };

    while let Some(job) = inbox.recv().await {
        let job_id = job.id;
        let mut execution = JobTask(tokio::spawn(
            execute(
                address,
                Arc::clone(&dispatcher),
                Arc::clone(&context),
                job,
                events.clone(),
            )
            .in_current_span(),
        ));

        match (&mut execution.0).await {
            Ok(()) => {}
            Err(err) => {
                let reason = if err.is_panic() {
                    "job panicked".to_string()
                } else {
                    err.to_string()
                };
                tracing::error!("Slot {} crashed while running job {}: {}", address.index, job_id, reason);
                guard.armed = false;
                let _ = events.send(SlotEvent::new(address, SlotEventKind::Crashed { reason }));
                return;
            }
        }
    }

    guard.armed = false;
    tracing::debug!("Slot {} inbox closed", address.index);
}

/// Run one job against the slot's context and stream its events back.
///
/// Adapter errors become a `Failed` event carrying the error unchanged;
/// only a panic escapes this function.
#[tracing::instrument(
    name = "job",
    skip_all,
    fields(slot = address.index, job_id = %job.id, file = %job.file.name)
)]
async fn execute(
    address: SlotAddress,
    dispatcher: Arc<Dispatcher>,
    context: Arc<SlotContext>,
    job: Job,
    events: mpsc::UnboundedSender<SlotEvent>,
) {
    let job_id = job.id;
    let progress_events = events.clone();
    let progress = ProgressReporter::new(Arc::new(move |value| {
        let _ = progress_events.send(SlotEvent::new(
            address,
            SlotEventKind::Progress { job_id, value },
        ));
    }));

    tracing::debug!("Converting to {}", job.output_format);

    let request = ConversionRequest::from(&job);
    let kind = match dispatcher
        .convert(&request, job.category, &context, &progress)
        .await
    {
        Ok(blob) => SlotEventKind::Complete { job_id, blob },
        Err(error) => SlotEventKind::Failed { job_id, error },
    };
    let _ = events.send(SlotEvent::new(address, kind));
}
