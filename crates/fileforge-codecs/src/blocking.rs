//! Offloading CPU-bound codec work from the async runtime.

use fileforge_core::{ConvertError, ConvertResult};

/// Run `task` on the blocking pool and return its result.
///
/// A panic inside `task` is resumed on the awaiting task, so it surfaces as
/// a fault of the execution slot rather than as an ordinary conversion error.
pub async fn run_blocking<F, T>(task: F) -> ConvertResult<T>
where
    F: FnOnce() -> ConvertResult<T> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(task).await {
        Ok(result) => result,
        Err(err) if err.is_panic() => std::panic::resume_unwind(err.into_panic()),
        Err(err) => Err(ConvertError::encode(format!(
            "Conversion task was cancelled: {err}"
        ))),
    }
}
