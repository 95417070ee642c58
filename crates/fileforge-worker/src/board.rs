//! Shared per-file progress board.
//!
//! Entries are keyed by [`JobId`], so two files with the same name in one
//! batch never overwrite each other. Display order is submission order.
//! Every accepted change bumps a version counter that observers can watch.

use std::sync::{Arc, Mutex};

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::watch;

use fileforge_core::types::{FileStatus, JobId, ProgressState};

/// Counts of entries in each lifecycle state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct BoardSummary {
    pub pending: usize,
    pub converting: usize,
    pub completed: usize,
    pub error: usize,
}

impl BoardSummary {
    /// Entries that have reached `completed` or `error`.
    pub fn finished(&self) -> usize {
        self.completed + self.error
    }

    pub fn total(&self) -> usize {
        self.pending + self.converting + self.completed + self.error
    }
}

#[derive(Debug)]
struct BoardInner {
    states: DashMap<JobId, ProgressState>,
    order: Mutex<Vec<JobId>>,
    version: watch::Sender<u64>,
}

/// Cheaply cloneable view over per-job progress.
#[derive(Debug, Clone)]
pub struct ProgressBoard {
    inner: Arc<BoardInner>,
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBoard {
    pub fn new() -> Self {
        let (version, _) = watch::channel(0);
        Self {
            inner: Arc::new(BoardInner {
                states: DashMap::new(),
                order: Mutex::new(Vec::new()),
                version,
            }),
        }
    }

    /// Add a `pending` entry for a job.
    pub fn insert(&self, job_id: JobId, file_name: impl Into<String>) {
        let previous = self
            .inner
            .states
            .insert(job_id, ProgressState::pending(file_name));
        if previous.is_none() {
            if let Ok(mut order) = self.inner.order.lock() {
                order.push(job_id);
            }
        }
        self.bump();
    }

    /// Record progress for a job. Ignored for unknown or finished jobs.
    pub fn advance(&self, job_id: JobId, progress: f64) -> bool {
        self.update(job_id, |state| state.advance(progress))
    }

    /// Mark a job completed.
    pub fn complete(&self, job_id: JobId) -> bool {
        self.update(job_id, ProgressState::complete)
    }

    /// Mark a job failed with a user-facing message.
    pub fn fail(&self, job_id: JobId, error: impl Into<String>) -> bool {
        let error = error.into();
        self.update(job_id, |state| state.fail(error))
    }

    fn update(&self, job_id: JobId, change: impl FnOnce(&mut ProgressState) -> bool) -> bool {
        let changed = match self.inner.states.get_mut(&job_id) {
            Some(mut state) => change(state.value_mut()),
            None => false,
        };
        if changed {
            self.bump();
        }
        changed
    }

    fn bump(&self) {
        self.inner.version.send_modify(|v| *v += 1);
    }

    pub fn get(&self, job_id: &JobId) -> Option<ProgressState> {
        self.inner.states.get(job_id).map(|s| s.clone())
    }

    /// All entries in submission order.
    pub fn snapshot(&self) -> Vec<(JobId, ProgressState)> {
        let order = self
            .inner
            .order
            .lock()
            .map(|o| o.clone())
            .unwrap_or_default();
        order
            .into_iter()
            .filter_map(|id| self.get(&id).map(|state| (id, state)))
            .collect()
    }

    /// Entries projected to display rows: file name, progress and status.
    pub fn rows(&self) -> Vec<ProgressState> {
        self.snapshot().into_iter().map(|(_, state)| state).collect()
    }

    pub fn summary(&self) -> BoardSummary {
        let mut summary = BoardSummary::default();
        for entry in self.inner.states.iter() {
            match entry.status {
                FileStatus::Pending => summary.pending += 1,
                FileStatus::Converting => summary.converting += 1,
                FileStatus::Completed => summary.completed += 1,
                FileStatus::Error => summary.error += 1,
            }
        }
        summary
    }

    /// Receiver that changes whenever an entry is added or updated.
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.inner.version.subscribe()
    }

    pub fn len(&self) -> usize {
        self.inner.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.states.is_empty()
    }

    /// Remove every entry.
    pub fn clear(&self) {
        self.inner.states.clear();
        if let Ok(mut order) = self.inner.order.lock() {
            order.clear();
        }
        self.bump();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_name_tracked_separately() {
        let board = ProgressBoard::new();
        let first = JobId::new();
        let second = JobId::new();
        board.insert(first, "photo.png");
        board.insert(second, "photo.png");

        board.advance(first, 40.0);
        board.fail(second, "Failed to load image: bad header");

        assert_eq!(board.get(&first).map(|s| s.progress), Some(40.0));
        assert_eq!(board.get(&second).map(|s| s.status), Some(FileStatus::Error));

        let rows = board.rows();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].status, FileStatus::Converting);
        assert_eq!(rows[1].error.as_deref(), Some("Failed to load image: bad header"));
    }

    #[test]
    fn test_terminal_entries_ignore_updates() {
        let board = ProgressBoard::new();
        let id = JobId::new();
        board.insert(id, "a.wav");
        assert!(board.complete(id));
        assert!(!board.advance(id, 10.0));
        assert!(!board.fail(id, "late"));
        assert_eq!(board.summary().completed, 1);
    }

    #[test]
    fn test_unknown_job_ignored() {
        let board = ProgressBoard::new();
        assert!(!board.advance(JobId::new(), 50.0));
        assert!(board.is_empty());
    }

    #[test]
    fn test_summary_and_clear() {
        let board = ProgressBoard::new();
        let ids: Vec<JobId> = (0..4).map(|_| JobId::new()).collect();
        for (i, id) in ids.iter().enumerate() {
            board.insert(*id, format!("f{i}.txt"));
        }
        board.advance(ids[1], 5.0);
        board.complete(ids[2]);
        board.fail(ids[3], "boom");

        let summary = board.summary();
        assert_eq!(
            summary,
            BoardSummary {
                pending: 1,
                converting: 1,
                completed: 1,
                error: 1,
            }
        );
        assert_eq!(summary.finished(), 2);
        assert_eq!(summary.total(), 4);

        board.clear();
        assert!(board.snapshot().is_empty());
    }

    #[tokio::test]
    async fn test_subscribers_see_changes() {
        let board = ProgressBoard::new();
        let mut changes = board.subscribe();
        let id = JobId::new();
        board.insert(id, "a.txt");
        changes.changed().await.expect("changed");
        let seen = *changes.borrow_and_update();
        board.advance(id, 30.0);
        changes.changed().await.expect("changed");
        assert!(*changes.borrow() > seen);
    }
}
