//! Per-file progress state tracked by the batch orchestrator.

use serde::{Deserialize, Serialize};

/// Lifecycle of one file in a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileStatus {
    /// Submitted, not yet reporting progress.
    Pending,
    /// Conversion underway.
    Converting,
    /// Finished with a blob.
    Completed,
    /// Finished with an error.
    Error,
}

impl FileStatus {
    /// Whether no further transition is allowed.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Error)
    }
}

/// Display state for one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProgressState {
    /// Name shown to the user.
    pub file_name: String,
    /// Percent complete, `0..=100`.
    pub progress: f64,
    /// Current lifecycle state.
    pub status: FileStatus,
    /// Failure message when `status` is `Error`.
    pub error: Option<String>,
}

impl ProgressState {
    /// A freshly submitted file.
    pub fn pending(file_name: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            progress: 0.0,
            status: FileStatus::Pending,
            error: None,
        }
    }

    /// Record a progress value. Moves `pending` to `converting`; ignored in
    /// terminal states and for values below the current one.
    pub fn advance(&mut self, progress: f64) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = FileStatus::Converting;
        if progress.is_finite() && progress > self.progress {
            self.progress = progress.min(100.0);
        }
        true
    }

    /// Mark the file completed. Returns false if already terminal.
    pub fn complete(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = FileStatus::Completed;
        self.progress = 100.0;
        true
    }

    /// Mark the file failed. Returns false if already terminal.
    pub fn fail(&mut self, error: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = FileStatus::Error;
        self.error = Some(error.into());
        true
    }
}
