//! Per-job continuation registry.
//!
//! Each submitted job registers a result sender and an optional progress
//! callback. [`Mailbox::settle`] is the only place an entry is removed, so
//! every job's result is delivered exactly once and both continuations are
//! dropped together.

use std::collections::HashMap;

use tokio::sync::oneshot;
use tracing::trace;

use fileforge_core::types::{Blob, JobId};
use fileforge_core::{ConvertError, ConvertResult, ProgressFn};

struct Continuations {
    progress: Option<ProgressFn>,
    result: oneshot::Sender<ConvertResult<Blob>>,
}

/// Continuations for every job that has not yet settled.
#[derive(Default)]
pub(crate) struct Mailbox {
    entries: HashMap<JobId, Continuations>,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register continuations for a job.
    pub fn register(
        &mut self,
        job_id: JobId,
        progress: Option<ProgressFn>,
        result: oneshot::Sender<ConvertResult<Blob>>,
    ) {
        self.entries
            .insert(job_id, Continuations { progress, result });
    }

    /// Invoke the progress callback for a job, if it is still registered.
    pub fn progress(&self, job_id: &JobId, value: f64) {
        if let Some(callback) = self.entries.get(job_id).and_then(|c| c.progress.as_ref()) {
            callback(value);
        }
    }

    /// Deliver the outcome and deregister the job. Returns false if the job
    /// was not registered.
    pub fn settle(&mut self, job_id: &JobId, outcome: ConvertResult<Blob>) -> bool {
        let Some(continuations) = self.entries.remove(job_id) else {
            return false;
        };
        if continuations.result.send(outcome).is_err() {
            trace!(%job_id, "Result receiver dropped before settlement");
        }
        true
    }

    /// Settle every registered job with `error`. Returns how many settled.
    pub fn settle_all(&mut self, error: &ConvertError) -> usize {
        let ids: Vec<JobId> = self.entries.keys().copied().collect();
        for id in &ids {
            self.settle(id, Err(error.clone()));
        }
        ids.len()
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.entries.contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
