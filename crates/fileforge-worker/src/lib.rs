//! Concurrent execution for FileForge conversions.
//!
//! This crate provides:
//! - A bounded worker pool that queues jobs FIFO, runs each in an isolated
//!   execution slot, replaces crashed slots and supports whole-pool
//!   termination
//! - The per-slot execution shim that drives the dispatcher and streams
//!   progress back to the scheduler
//! - A batch orchestrator with a shared per-job progress board and a serial
//!   inline fallback
//! - Pool metrics with run-time percentiles

pub mod batch;
pub mod board;
mod mailbox;
mod message;
pub mod metrics;
pub mod pool;
mod slot;

pub use batch::{BatchOrchestrator, BatchReport, ConvertedFile, ExecutionMode, FailedFile};
pub use board::{BoardSummary, ProgressBoard};
pub use metrics::{MetricsSnapshot, PoolMetrics};
pub use pool::{JobTicket, PoolStats, WorkerPool};
