//! Scheduling behaviour of the worker pool against scripted adapters.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::join_all;

use fileforge_codecs::{
    ConversionRequest, Dispatcher, FormatAdapter, SlotContext, ffmpeg_context_factory,
};
use fileforge_core::config::VideoConfig;
use fileforge_core::types::{Blob, Category, Job, SourceFile};
use fileforge_core::{ConvertError, ConvertResult, ErrorKind, ProgressReporter};
use fileforge_worker::WorkerPool;

/// Document adapter that holds each job briefly and records concurrency.
#[derive(Debug, Default)]
struct TimedAdapter {
    running: AtomicUsize,
    peak: AtomicUsize,
    started: Mutex<Vec<String>>,
}

#[async_trait]
impl FormatAdapter for TimedAdapter {
    fn category(&self) -> Category {
        Category::Document
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        _context: &SlotContext,
        progress: &ProgressReporter,
    ) -> ConvertResult<Blob> {
        self.started
            .lock()
            .expect("lock")
            .push(request.file.name.clone());
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);

        progress.report(50.0);
        tokio::time::sleep(Duration::from_millis(20)).await;

        self.running.fetch_sub(1, Ordering::SeqCst);
        if request.file.name.starts_with("bad") {
            return Err(ConvertError::decode("Unreadable document"));
        }
        Ok(Blob::new(request.file.bytes.clone(), "text/plain"))
    }
}

/// Video adapter that panics on files named `crash*`.
#[derive(Debug)]
struct CrashingAdapter;

#[async_trait]
impl FormatAdapter for CrashingAdapter {
    fn category(&self) -> Category {
        Category::Video
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        _context: &SlotContext,
        _progress: &ProgressReporter,
    ) -> ConvertResult<Blob> {
        if request.file.name.starts_with("crash") {
            panic!("decoder state corrupted");
        }
        Ok(Blob::new(&b"video"[..], "video/mp4"))
    }
}

/// Audio adapter that never finishes.
#[derive(Debug)]
struct StuckAdapter;

#[async_trait]
impl FormatAdapter for StuckAdapter {
    fn category(&self) -> Category {
        Category::Audio
    }

    async fn convert(
        &self,
        _request: &ConversionRequest,
        _context: &SlotContext,
        _progress: &ProgressReporter,
    ) -> ConvertResult<Blob> {
        std::future::pending().await
    }
}

/// Archive adapter that finishes its work only after a delay.
#[derive(Debug, Default)]
struct SlowAdapter {
    finished: AtomicBool,
}

#[async_trait]
impl FormatAdapter for SlowAdapter {
    fn category(&self) -> Category {
        Category::Archive
    }

    async fn convert(
        &self,
        request: &ConversionRequest,
        _context: &SlotContext,
        _progress: &ProgressReporter,
    ) -> ConvertResult<Blob> {
        tokio::time::sleep(Duration::from_millis(200)).await;
        self.finished.store(true, Ordering::SeqCst);
        Ok(Blob::new(request.file.bytes.clone(), "application/zip"))
    }
}

fn pool_with(workers: usize, timed: Arc<TimedAdapter>) -> WorkerPool {
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(timed);
    dispatcher.register(Arc::new(CrashingAdapter));
    dispatcher.register(Arc::new(StuckAdapter));
    WorkerPool::new(
        workers,
        Arc::new(dispatcher),
        ffmpeg_context_factory(&VideoConfig::default()),
    )
}

fn document(name: &str) -> Job {
    Job::new(SourceFile::new(name, "text"), Category::Document, "txt", 1.0)
}

fn video(name: &str) -> Job {
    Job::new(SourceFile::new(name, "frames"), Category::Video, "mp4", 1.0)
}

fn audio(name: &str) -> Job {
    Job::new(SourceFile::new(name, "pcm"), Category::Audio, "wav", 1.0)
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("condition not reached");
}

#[tokio::test]
async fn ten_jobs_never_exceed_four_busy_slots() {
    let timed = Arc::new(TimedAdapter::default());
    let pool = pool_with(4, Arc::clone(&timed));

    let tickets: Vec<_> = (0..10)
        .map(|i| pool.submit(document(&format!("doc-{i}.txt")), None))
        .collect();

    wait_until(|| pool.active_job_count() > 0).await;
    assert!(pool.active_job_count() <= 4);
    assert!(pool.stats().busy_slots <= 4);

    let results = join_all(tickets).await;
    assert!(results.iter().all(|r| r.is_ok()));

    let peak = timed.peak.load(Ordering::SeqCst);
    assert!((1..=4).contains(&peak), "peak concurrency {peak}");
    assert_eq!(pool.active_job_count(), 0);
    assert_eq!(pool.queued_job_count(), 0);
    assert_eq!(pool.metrics().jobs_completed, 10);
}

#[tokio::test]
async fn jobs_start_in_submission_order() {
    let timed = Arc::new(TimedAdapter::default());
    let pool = pool_with(1, Arc::clone(&timed));

    let names = ["a.txt", "b.txt", "c.txt", "d.txt"];
    let tickets: Vec<_> = names.iter().map(|n| pool.submit(document(n), None)).collect();
    join_all(tickets).await;

    assert_eq!(*timed.started.lock().expect("lock"), names);
}

#[tokio::test]
async fn progress_reaches_caller_before_result() {
    let pool = pool_with(2, Arc::new(TimedAdapter::default()));
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);

    pool.submit(
        document("report.txt"),
        Some(Arc::new(move |p| sink.lock().expect("lock").push(p))),
    )
    .await
    .expect("converted");

    assert_eq!(*seen.lock().expect("lock"), vec![0.0, 50.0, 100.0]);
}

#[tokio::test]
async fn adapter_error_fails_only_that_job() {
    let pool = pool_with(2, Arc::new(TimedAdapter::default()));

    let bad = pool.submit(document("bad.txt"), None);
    let good = pool.submit(document("good.txt"), None);

    let err = bad.await.expect_err("failed");
    assert_eq!(err.kind(), ErrorKind::DecodeFailure);
    assert_eq!(err.to_string(), "Unreadable document");
    assert!(good.await.is_ok());

    let metrics = pool.metrics();
    assert_eq!(metrics.jobs_failed, 1);
    assert_eq!(metrics.slots_replaced, 0);
}

#[tokio::test]
async fn slot_crash_fails_job_and_pool_recovers() {
    let pool = pool_with(2, Arc::new(TimedAdapter::default()));

    let crashed = pool.submit(video("crash.mp4"), None);
    let siblings: Vec<_> = (0..3)
        .map(|i| pool.submit(video(&format!("clip-{i}.mp4")), None))
        .collect();

    let err = crashed.await.expect_err("crashed");
    assert_eq!(err.kind(), ErrorKind::SlotCrash);
    assert_eq!(err.to_string(), "Worker crashed");

    for result in join_all(siblings).await {
        assert_eq!(result.expect("completed").mime_type, "video/mp4");
    }

    // The replacement slot keeps accepting work.
    let later = pool.submit(video("after.mp4"), None).await;
    assert!(later.is_ok());

    let metrics = pool.metrics();
    assert_eq!(metrics.jobs_crashed, 1);
    assert!(metrics.slots_replaced >= 1);
    assert_eq!(pool.stats().max_workers, 2);
}

#[tokio::test]
async fn terminate_fails_every_outstanding_job() {
    let pool = pool_with(2, Arc::new(TimedAdapter::default()));

    let tickets: Vec<_> = (0..5)
        .map(|i| pool.submit(audio(&format!("track-{i}.mp3")), None))
        .collect();

    wait_until(|| pool.active_job_count() == 2 && pool.queued_job_count() == 3).await;

    pool.terminate().await;

    // Settled within the call: every ticket is ready without waiting.
    for ticket in tickets {
        let outcome = ticket.now_or_never().expect("settled during terminate");
        let err = outcome.expect_err("terminated");
        assert_eq!(err.kind(), ErrorKind::PoolTerminated);
        assert_eq!(err.to_string(), "Worker pool terminated");
    }

    assert_eq!(pool.active_job_count(), 0);
    assert_eq!(pool.queued_job_count(), 0);
    assert_eq!(pool.metrics().jobs_terminated, 5);
}

#[tokio::test]
async fn submit_after_terminate_fails_immediately() {
    let pool = pool_with(2, Arc::new(TimedAdapter::default()));
    pool.terminate().await;

    let outcome = pool
        .submit(document("late.txt"), None)
        .now_or_never()
        .expect("immediate");
    assert_eq!(
        outcome.expect_err("rejected").to_string(),
        "Worker pool terminated"
    );
}

#[tokio::test]
async fn terminate_stops_running_conversions() {
    let slow = Arc::new(SlowAdapter::default());
    let mut dispatcher = Dispatcher::new();
    dispatcher.register(Arc::clone(&slow) as Arc<dyn FormatAdapter>);
    let pool = WorkerPool::new(
        1,
        Arc::new(dispatcher),
        ffmpeg_context_factory(&VideoConfig::default()),
    );

    let ticket = pool.submit(
        Job::new(SourceFile::new("bundle.zip", "PK"), Category::Archive, "zip", 1.0),
        None,
    );
    wait_until(|| pool.active_job_count() == 1).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    pool.terminate().await;
    let err = ticket.await.expect_err("terminated");
    assert_eq!(err.kind(), ErrorKind::PoolTerminated);

    tokio::time::sleep(Duration::from_millis(400)).await;
    assert!(
        !slow.finished.load(Ordering::SeqCst),
        "conversion kept running after terminate"
    );
}
