//! Worker pool scheduler.
//!
//! A single coordinator task owns every piece of scheduling state: the
//! slots, the FIFO queue and the [`Mailbox`]. [`WorkerPool`] handles talk
//! to it over a channel, slots report back over another, and nothing else
//! mutates the state. Counters readable from outside are mirrored into
//! atomics after every step.

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::task::{Context, Poll};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};

use fileforge_codecs::{ContextFactory, Dispatcher, ffmpeg_context_factory};
use fileforge_core::config::AppConfig;
use fileforge_core::types::{Blob, Job, JobId};
use fileforge_core::{ConvertError, ConvertResult, ProgressFn};

use crate::mailbox::Mailbox;
use crate::message::{PoolCommand, SlotAddress, SlotEvent, SlotEventKind};
use crate::metrics::{MetricsSnapshot, PoolMetrics};
use crate::slot::SlotHandle;

/// Point-in-time view of slot occupancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Configured number of slots.
    pub max_workers: usize,
    /// Slots currently running a job.
    pub busy_slots: usize,
    /// Slots waiting for work.
    pub idle_slots: usize,
    /// Jobs waiting for a slot.
    pub queued_jobs: usize,
    /// Whether `terminate` has been called.
    pub terminated: bool,
}

#[derive(Debug, Default)]
struct PoolShared {
    active: AtomicUsize,
    queued: AtomicUsize,
    terminated: AtomicBool,
    metrics: PoolMetrics,
}

/// A fixed-size pool of execution slots fed from a FIFO queue.
///
/// At most `max_workers` jobs run at once. A slot that crashes is replaced
/// at the same index and the job it was running fails with
/// `"Worker crashed"`. After [`WorkerPool::terminate`] every outstanding
/// and future submission fails with `"Worker pool terminated"`.
///
/// Must be created inside a Tokio runtime.
#[derive(Debug)]
pub struct WorkerPool {
    commands: mpsc::UnboundedSender<PoolCommand>,
    shared: Arc<PoolShared>,
    max_workers: usize,
}

impl WorkerPool {
    /// Start a pool with `max_workers` slots (at least one).
    pub fn new(
        max_workers: usize,
        dispatcher: Arc<Dispatcher>,
        context_factory: ContextFactory,
    ) -> Self {
        let max_workers = max_workers.max(1);
        let shared = Arc::new(PoolShared::default());
        let (commands, command_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let mut coordinator = Coordinator {
            dispatcher,
            context_factory,
            slots: Vec::with_capacity(max_workers),
            queue: VecDeque::new(),
            mailbox: Mailbox::new(),
            events_tx,
            shared: Arc::clone(&shared),
            next_generation: 0,
        };
        for index in 0..max_workers {
            let slot = coordinator.spawn_slot(index);
            coordinator.slots.push(slot);
        }

        tokio::spawn(coordinator.run(command_rx, events_rx));
        tracing::info!("Worker pool started with {} slots", max_workers);

        Self {
            commands,
            shared,
            max_workers,
        }
    }

    /// Pool using the built-in adapters and `ffmpeg`-backed slot contexts.
    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            config.pool.effective_max_workers(),
            Arc::new(Dispatcher::with_defaults(config)),
            ffmpeg_context_factory(&config.video),
        )
    }

    /// Configured number of slots.
    pub fn max_workers(&self) -> usize {
        self.max_workers
    }

    /// Queue a job. The returned ticket resolves with the job's output or
    /// error; `on_progress` receives values in `0..=100` until then.
    ///
    /// The job is enqueued immediately, whether or not the ticket is polled.
    pub fn submit(&self, job: Job, on_progress: Option<ProgressFn>) -> JobTicket {
        let job_id = job.id;
        if self.is_terminated() {
            return JobTicket::rejected(job_id);
        }

        let (result, receiver) = oneshot::channel();
        let command = PoolCommand::Submit {
            job,
            progress: on_progress,
            result,
        };
        match self.commands.send(command) {
            Ok(()) => JobTicket::pending(job_id, receiver),
            Err(_) => JobTicket::rejected(job_id),
        }
    }

    /// Destroy every slot and fail all queued and running jobs.
    ///
    /// Every outstanding ticket has settled by the time this returns.
    /// Calling it again is a no-op.
    pub async fn terminate(&self) {
        self.shared.terminated.store(true, Ordering::SeqCst);
        let (ack, done) = oneshot::channel();
        if self.commands.send(PoolCommand::Terminate { ack }).is_ok() {
            let _ = done.await;
        }
    }

    pub fn is_terminated(&self) -> bool {
        self.shared.terminated.load(Ordering::SeqCst)
    }

    /// Number of jobs currently running in a slot.
    pub fn active_job_count(&self) -> usize {
        self.shared.active.load(Ordering::SeqCst)
    }

    /// Number of jobs waiting for a free slot.
    pub fn queued_job_count(&self) -> usize {
        self.shared.queued.load(Ordering::SeqCst)
    }

    pub fn stats(&self) -> PoolStats {
        let terminated = self.is_terminated();
        let busy_slots = self.active_job_count();
        PoolStats {
            max_workers: self.max_workers,
            busy_slots,
            idle_slots: if terminated {
                0
            } else {
                self.max_workers.saturating_sub(busy_slots)
            },
            queued_jobs: self.queued_job_count(),
            terminated,
        }
    }

    pub fn metrics(&self) -> MetricsSnapshot {
        self.shared.metrics.snapshot()
    }
}

/// Resolves with the outcome of one submitted job.
#[derive(Debug)]
pub struct JobTicket {
    job_id: JobId,
    receiver: Option<oneshot::Receiver<ConvertResult<Blob>>>,
}

impl JobTicket {
    fn pending(job_id: JobId, receiver: oneshot::Receiver<ConvertResult<Blob>>) -> Self {
        Self {
            job_id,
            receiver: Some(receiver),
        }
    }

    fn rejected(job_id: JobId) -> Self {
        Self {
            job_id,
            receiver: None,
        }
    }

    pub fn job_id(&self) -> JobId {
        self.job_id
    }
}

impl Future for JobTicket {
    type Output = ConvertResult<Blob>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.receiver.as_mut() {
            None => Poll::Ready(Err(ConvertError::pool_terminated())),
            // A dropped sender means the coordinator went away with the job
            // still registered.
            Some(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|outcome| outcome.unwrap_or_else(|_| Err(ConvertError::pool_terminated()))),
        }
    }
}

struct RunningJob {
    job_id: JobId,
    started: Instant,
}

struct SlotState {
    handle: SlotHandle,
    running: Option<RunningJob>,
}

struct Coordinator {
    dispatcher: Arc<Dispatcher>,
    context_factory: ContextFactory,
    slots: Vec<SlotState>,
    queue: VecDeque<Job>,
    mailbox: Mailbox,
    events_tx: mpsc::UnboundedSender<SlotEvent>,
    shared: Arc<PoolShared>,
    next_generation: u64,
}

impl Coordinator {
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<PoolCommand>,
        mut events: mpsc::UnboundedReceiver<SlotEvent>,
    ) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(PoolCommand::Submit { job, progress, result }) => {
                        self.enqueue(job, progress, result);
                    }
                    Some(PoolCommand::Terminate { ack }) => {
                        self.shutdown();
                        let _ = ack.send(());
                        break;
                    }
                    None => {
                        self.shutdown();
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_event(event),
            }
        }
    }

    fn spawn_slot(&mut self, index: usize) -> SlotState {
        self.next_generation += 1;
        let address = SlotAddress {
            index,
            generation: self.next_generation,
        };
        SlotState {
            handle: SlotHandle::spawn(
                address,
                Arc::clone(&self.dispatcher),
                (self.context_factory)(),
                self.events_tx.clone(),
            ),
            running: None,
        }
    }

    fn enqueue(
        &mut self,
        job: Job,
        progress: Option<ProgressFn>,
        result: oneshot::Sender<ConvertResult<Blob>>,
    ) {
        tracing::debug!("Queued job {} for '{}'", job.id, job.file.name);
        self.mailbox.register(job.id, progress, result);
        self.shared.metrics.record_submitted();
        self.queue.push_back(job);
        self.drain();
    }

    /// Hand queued jobs to idle slots, oldest first.
    fn drain(&mut self) {
        while let Some(index) = self.slots.iter().position(|s| s.running.is_none()) {
            let Some(job) = self.queue.pop_front() else {
                break;
            };
            let job_id = job.id;
            match self.slots[index].handle.dispatch(job) {
                Ok(()) => {
                    self.slots[index].running = Some(RunningJob {
                        job_id,
                        started: Instant::now(),
                    });
                }
                Err(job) => {
                    tracing::warn!("Slot {} refused job {}; replacing slot", index, job_id);
                    self.queue.push_front(job);
                    self.slots[index] = self.spawn_slot(index);
                    self.shared.metrics.record_crash(false);
                }
            }
        }
        self.publish_counts();
    }

    fn handle_event(&mut self, event: SlotEvent) {
        let SlotEvent { slot, kind } = event;
        let Some(state) = self.slots.get_mut(slot.index) else {
            return;
        };
        if state.handle.address() != slot {
            tracing::trace!("Ignoring event from retired slot {:?}", slot);
            return;
        }

        match kind {
            SlotEventKind::Progress { job_id, value } => {
                if state.running.as_ref().is_some_and(|r| r.job_id == job_id) {
                    self.mailbox.progress(&job_id, value);
                }
            }
            SlotEventKind::Complete { job_id, blob } => {
                if let Some(running) = take_if_running(state, job_id) {
                    self.shared
                        .metrics
                        .record_completed(running.started.elapsed(), blob.len() as u64);
                    tracing::info!("Job {} completed ({} bytes)", job_id, blob.len());
                    self.mailbox.settle(&job_id, Ok(blob));
                    self.drain();
                }
            }
            SlotEventKind::Failed { job_id, error } => {
                if take_if_running(state, job_id).is_some() {
                    self.shared.metrics.record_failed();
                    tracing::warn!("Job {} failed: {}", job_id, error);
                    self.mailbox.settle(&job_id, Err(error));
                    self.drain();
                }
            }
            SlotEventKind::Crashed { reason } => {
                let lost = state.running.take();
                tracing::warn!("Slot {} crashed ({}); replacing", slot.index, reason);
                self.shared.metrics.record_crash(lost.is_some());
                if let Some(running) = lost {
                    self.mailbox
                        .settle(&running.job_id, Err(ConvertError::slot_crash()));
                }
                self.slots[slot.index] = self.spawn_slot(slot.index);
                self.drain();
            }
        }
    }

    fn shutdown(&mut self) {
        self.shared.terminated.store(true, Ordering::SeqCst);
        self.slots.clear();
        self.queue.clear();
        let failed = self.mailbox.settle_all(&ConvertError::pool_terminated());
        self.shared.metrics.record_terminated(failed as u64);
        self.publish_counts();
        tracing::info!("Worker pool terminated ({} jobs failed)", failed);
    }

    fn publish_counts(&self) {
        let active = self.slots.iter().filter(|s| s.running.is_some()).count();
        self.shared.active.store(active, Ordering::SeqCst);
        self.shared.queued.store(self.queue.len(), Ordering::SeqCst);
    }
}

fn take_if_running(state: &mut SlotState, job_id: JobId) -> Option<RunningJob> {
    if state.running.as_ref().is_some_and(|r| r.job_id == job_id) {
        state.running.take()
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fileforge_core::config::VideoConfig;
    use fileforge_core::types::{Category, SourceFile};

    fn pool(workers: usize) -> WorkerPool {
        WorkerPool::new(
            workers,
            Arc::new(Dispatcher::with_defaults(&AppConfig::default())),
            ffmpeg_context_factory(&VideoConfig::default()),
        )
    }

    fn text_job(name: &str) -> Job {
        Job::new(SourceFile::new(name, "hello"), Category::Document, "html", 1.0)
    }

    #[tokio::test]
    async fn test_submit_resolves() {
        let pool = pool(2);
        let blob = pool.submit(text_job("a.txt"), None).await.expect("converted");
        assert_eq!(blob.mime_type, "text/html");
        assert_eq!(pool.metrics().jobs_completed, 1);
    }

    #[tokio::test]
    async fn test_stats_idle_pool() {
        let pool = pool(3);
        let stats = pool.stats();
        assert_eq!(stats.max_workers, 3);
        assert_eq!(stats.busy_slots, 0);
        assert_eq!(stats.idle_slots, 3);
        assert!(!stats.terminated);
    }

    #[tokio::test]
    async fn test_zero_workers_means_one() {
        assert_eq!(pool(0).max_workers(), 1);
    }

    #[tokio::test]
    async fn test_terminate_is_idempotent() {
        let pool = pool(1);
        pool.terminate().await;
        pool.terminate().await;
        assert!(pool.is_terminated());
        assert_eq!(pool.stats().idle_slots, 0);

        let ticket = pool.submit(text_job("late.txt"), None);
        let err = ticket.await.expect_err("rejected");
        assert_eq!(err.to_string(), "Worker pool terminated");
    }
}
