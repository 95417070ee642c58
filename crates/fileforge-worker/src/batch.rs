//! Batch orchestration: one job per file, progress onto a shared board.

use std::sync::Arc;

use futures::future::join_all;
use serde::Serialize;

use fileforge_codecs::{ConversionRequest, Dispatcher, SlotContext};
use fileforge_core::config::AppConfig;
use fileforge_core::types::{
    Blob, Category, ImageOptions, Job, JobId, SourceFile, extension_for,
};
use fileforge_core::{ConvertError, ConvertResult, ProgressReporter};

use crate::board::ProgressBoard;
use crate::pool::WorkerPool;

/// A file that converted successfully.
#[derive(Debug, Clone)]
pub struct ConvertedFile {
    pub job_id: JobId,
    /// Name of the source file.
    pub file_name: String,
    /// Suggested name for the output (`<stem>.<ext>`).
    pub output_name: String,
    /// Format that was requested.
    pub output_format: String,
    pub blob: Blob,
}

/// A file whose conversion failed.
#[derive(Debug, Clone)]
pub struct FailedFile {
    pub job_id: JobId,
    pub file_name: String,
    pub error: ConvertError,
}

/// Outcome of one batch. Every input file appears in exactly one list.
#[derive(Debug, Clone, Default)]
pub struct BatchReport {
    pub converted: Vec<ConvertedFile>,
    pub failed: Vec<FailedFile>,
}

impl BatchReport {
    pub fn total(&self) -> usize {
        self.converted.len() + self.failed.len()
    }

    pub fn summary(&self) -> BatchSummary {
        BatchSummary {
            converted: self.converted.len(),
            failed: self.failed.len(),
            output_bytes: self.converted.iter().map(|c| c.blob.len()).sum(),
        }
    }
}

/// Serializable totals for a [`BatchReport`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub converted: usize,
    pub failed: usize,
    pub output_bytes: usize,
}

/// Where jobs run.
#[derive(Debug)]
pub enum ExecutionMode {
    /// Concurrently on a worker pool.
    Pool(Arc<WorkerPool>),
    /// Serially on the calling task, sharing one slot context.
    Inline {
        dispatcher: Arc<Dispatcher>,
        context: SlotContext,
    },
}

/// Fans a selection of files out to the pool and collects the results.
#[derive(Debug)]
pub struct BatchOrchestrator {
    mode: ExecutionMode,
    board: ProgressBoard,
}

impl BatchOrchestrator {
    pub fn new(mode: ExecutionMode) -> Self {
        Self {
            mode,
            board: ProgressBoard::new(),
        }
    }

    pub fn with_pool(pool: Arc<WorkerPool>) -> Self {
        Self::new(ExecutionMode::Pool(pool))
    }

    pub fn inline(dispatcher: Arc<Dispatcher>, context: SlotContext) -> Self {
        Self::new(ExecutionMode::Inline {
            dispatcher,
            context,
        })
    }

    /// Pool-backed orchestrator, or the inline fallback when
    /// `pool.inline_fallback` is set.
    pub fn from_config(config: &AppConfig) -> Self {
        if config.pool.inline_fallback {
            tracing::info!("Worker pool disabled; converting inline");
            Self::inline(
                Arc::new(Dispatcher::with_defaults(config)),
                SlotContext::ffmpeg(&config.video),
            )
        } else {
            Self::with_pool(Arc::new(WorkerPool::from_config(config)))
        }
    }

    pub fn mode(&self) -> &ExecutionMode {
        &self.mode
    }

    /// Shared progress board updated by every batch run through this
    /// orchestrator.
    pub fn board(&self) -> &ProgressBoard {
        &self.board
    }

    /// Convert every file to `output_format`.
    ///
    /// Never fails as a whole: each file ends up either converted or failed
    /// in the report, and its board entry ends `completed` or `error`.
    pub async fn convert_batch(
        &self,
        files: Vec<SourceFile>,
        category: Category,
        output_format: &str,
        quality: f32,
        options: Option<ImageOptions>,
    ) -> BatchReport {
        let jobs: Vec<Job> = files
            .into_iter()
            .map(|file| {
                Job::new(file, category, output_format, quality).with_options(options.clone())
            })
            .collect();
        for job in &jobs {
            self.board.insert(job.id, job.file.name.clone());
        }

        tracing::info!(
            "Converting {} {} file(s) to {}",
            jobs.len(),
            category,
            output_format
        );

        let outcomes = match &self.mode {
            ExecutionMode::Pool(pool) => self.run_pooled(pool, &jobs).await,
            ExecutionMode::Inline {
                dispatcher,
                context,
            } => self.run_inline(dispatcher, context, &jobs).await,
        };

        let mut report = BatchReport::default();
        for (job, outcome) in jobs.iter().zip(outcomes) {
            match outcome {
                Ok(blob) => {
                    self.board.complete(job.id);
                    report.converted.push(ConvertedFile {
                        job_id: job.id,
                        file_name: job.file.name.clone(),
                        output_name: format!(
                            "{}.{}",
                            job.file.stem(),
                            extension_for(&job.output_format)
                        ),
                        output_format: job.output_format.clone(),
                        blob,
                    });
                }
                Err(error) => {
                    tracing::warn!("Failed to convert '{}': {}", job.file.name, error);
                    self.board.fail(job.id, error.to_string());
                    report.failed.push(FailedFile {
                        job_id: job.id,
                        file_name: job.file.name.clone(),
                        error,
                    });
                }
            }
        }

        tracing::info!(
            "Batch finished: {} converted, {} failed",
            report.converted.len(),
            report.failed.len()
        );
        report
    }

    async fn run_pooled(&self, pool: &WorkerPool, jobs: &[Job]) -> Vec<ConvertResult<Blob>> {
        let tickets: Vec<_> = jobs
            .iter()
            .map(|job| {
                let board = self.board.clone();
                let job_id = job.id;
                pool.submit(
                    job.clone(),
                    Some(Arc::new(move |value| {
                        board.advance(job_id, value);
                    })),
                )
            })
            .collect();
        join_all(tickets).await
    }

    async fn run_inline(
        &self,
        dispatcher: &Dispatcher,
        context: &SlotContext,
        jobs: &[Job],
    ) -> Vec<ConvertResult<Blob>> {
        let mut outcomes = Vec::with_capacity(jobs.len());
        for job in jobs {
            let board = self.board.clone();
            let job_id = job.id;
            let progress = ProgressReporter::new(Arc::new(move |value| {
                board.advance(job_id, value);
            }));
            let request = ConversionRequest::from(job);
            outcomes.push(
                dispatcher
                    .convert(&request, job.category, context, &progress)
                    .await,
            );
        }
        outcomes
    }
}
