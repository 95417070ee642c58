//! Messages exchanged between pool handles, the coordinator and slots.

use tokio::sync::oneshot;

use fileforge_core::types::{Blob, Job, JobId};
use fileforge_core::{ConvertError, ConvertResult, ProgressFn};

/// Identifies one incarnation of a slot. A replaced slot keeps its index
/// but gets a new generation, so late events from the old one are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SlotAddress {
    pub index: usize,
    pub generation: u64,
}

/// Requests sent from [`crate::WorkerPool`] handles to the coordinator.
pub(crate) enum PoolCommand {
    /// Register continuations and enqueue a job.
    Submit {
        job: Job,
        progress: Option<ProgressFn>,
        result: oneshot::Sender<ConvertResult<Blob>>,
    },
    /// Destroy all slots and fail everything outstanding, then acknowledge.
    Terminate { ack: oneshot::Sender<()> },
}

/// What a slot reports back to the coordinator.
#[derive(Debug)]
pub(crate) enum SlotEventKind {
    /// Intermediate progress for the running job.
    Progress { job_id: JobId, value: f64 },
    /// The job produced output.
    Complete { job_id: JobId, blob: Blob },
    /// The adapter failed the job.
    Failed { job_id: JobId, error: ConvertError },
    /// The slot itself died.
    Crashed { reason: String },
}

/// A [`SlotEventKind`] tagged with the slot that sent it.
#[derive(Debug)]
pub(crate) struct SlotEvent {
    pub slot: SlotAddress,
    pub kind: SlotEventKind,
}

impl SlotEvent {
    pub fn new(slot: SlotAddress, kind: SlotEventKind) -> Self {
        Self { slot, kind }
    }
}
