//! Transcoding engine abstraction and the `ffmpeg` process driver.
//!
//! The engine exposes a small scratch filesystem (write/read/delete by file
//! name) plus `exec`, mirroring how an embedded transcoder is driven. Each
//! execution slot holds one [`EngineHandle`]; the engine behind it is loaded
//! on first use and shared by every later job on that slot.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

use fileforge_core::config::VideoConfig;
use fileforge_core::{ConvertError, ConvertResult, ErrorKind, ProgressReporter};

/// A loaded transcoding engine with its own scratch filesystem.
#[async_trait]
pub trait TranscodeEngine: Send + Sync + fmt::Debug {
    /// Stage `data` under `name` in the scratch filesystem.
    async fn write_file(&self, name: &str, data: Bytes) -> ConvertResult<()>;

    /// Read a file back from the scratch filesystem.
    async fn read_file(&self, name: &str) -> ConvertResult<Bytes>;

    /// Remove a staged file.
    async fn delete_file(&self, name: &str) -> ConvertResult<()>;

    /// Run the engine with `args`, streaming its progress in `0..=100`.
    ///
    /// Returns the engine's exit code; a non-zero code is not an error at
    /// this level.
    async fn exec(&self, args: &[String], progress: &ProgressReporter) -> ConvertResult<i32>;
}

/// Produces a ready engine. Called at most once per successful load.
#[async_trait]
pub trait EngineLoader: Send + Sync + fmt::Debug {
    /// Load the engine, failing with `EngineInitFailure`.
    async fn load(&self) -> ConvertResult<Arc<dyn TranscodeEngine>>;
}

/// Slot-scoped, lazily initialized engine.
///
/// A failed load leaves the handle empty, so the next job on the slot tries
/// again.
pub struct EngineHandle {
    loader: Arc<dyn EngineLoader>,
    engine: OnceCell<Arc<dyn TranscodeEngine>>,
}

impl EngineHandle {
    /// Create an empty handle around a loader.
    pub fn new(loader: Arc<dyn EngineLoader>) -> Self {
        Self {
            loader,
            engine: OnceCell::new(),
        }
    }

    /// The engine, loading it on first call.
    pub async fn get(&self) -> ConvertResult<Arc<dyn TranscodeEngine>> {
        let engine = self
            .engine
            .get_or_try_init(|| async {
                debug!(loader = ?self.loader, "Loading transcoding engine");
                self.loader.load().await
            })
            .await?;
        Ok(Arc::clone(engine))
    }

    /// Whether the engine has been loaded.
    pub fn is_loaded(&self) -> bool {
        self.engine.initialized()
    }
}

impl fmt::Debug for EngineHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineHandle")
            .field("loader", &self.loader)
            .field("loaded", &self.is_loaded())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ffmpeg
// ---------------------------------------------------------------------------

/// Loads an [`FfmpegEngine`] after probing the executable.
#[derive(Debug, Clone)]
pub struct FfmpegLoader {
    config: VideoConfig,
}

impl FfmpegLoader {
    /// Create a loader from video settings.
    pub fn new(config: VideoConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl EngineLoader for FfmpegLoader {
    async fn load(&self) -> ConvertResult<Arc<dyn TranscodeEngine>> {
        let binary = &self.config.ffmpeg_path;

        let output = Command::new(binary)
            .arg("-version")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| ConvertError::engine_init(format!("Failed to load FFmpeg: {e}")))?;

        if !output.status.success() {
            return Err(ConvertError::engine_init(format!(
                "Failed to load FFmpeg: '{}' exited with {}",
                binary.display(),
                output.status
            )));
        }

        let version = String::from_utf8_lossy(&output.stdout)
            .lines()
            .next()
            .unwrap_or_default()
            .to_string();

        let scratch_dir = self
            .config
            .effective_scratch_root()
            .join(format!("slot-{}", uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&scratch_dir).await.map_err(|e| {
            ConvertError::engine_init(format!(
                "Failed to load FFmpeg: cannot create scratch directory '{}': {e}",
                scratch_dir.display()
            ))
        })?;

        info!(
            version = %version,
            scratch = %scratch_dir.display(),
            "FFmpeg engine loaded"
        );

        Ok(Arc::new(FfmpegEngine {
            binary: binary.clone(),
            scratch_dir,
            log_output: self.config.log_engine_output,
        }))
    }
}

/// Drives the `ffmpeg` executable inside a private scratch directory.
///
/// The scratch directory is removed when the engine is dropped.
#[derive(Debug)]
pub struct FfmpegEngine {
    binary: PathBuf,
    scratch_dir: PathBuf,
    log_output: bool,
}

impl FfmpegEngine {
    /// Scratch directory owned by this engine.
    pub fn scratch_dir(&self) -> &Path {
        &self.scratch_dir
    }

    fn resolve(&self, name: &str) -> ConvertResult<PathBuf> {
        let plain = !name.is_empty()
            && name != "."
            && name != ".."
            && !name.contains(['/', '\\']);
        if !plain {
            return Err(ConvertError::new(
                ErrorKind::Io,
                format!("Invalid scratch file name '{name}'"),
            ));
        }
        Ok(self.scratch_dir.join(name))
    }
}

#[async_trait]
impl TranscodeEngine for FfmpegEngine {
    async fn write_file(&self, name: &str, data: Bytes) -> ConvertResult<()> {
        let path = self.resolve(name)?;
        tokio::fs::write(&path, &data).await?;
        Ok(())
    }

    async fn read_file(&self, name: &str) -> ConvertResult<Bytes> {
        let path = self.resolve(name)?;
        let data = tokio::fs::read(&path).await?;
        Ok(Bytes::from(data))
    }

    async fn delete_file(&self, name: &str) -> ConvertResult<()> {
        let path = self.resolve(name)?;
        tokio::fs::remove_file(&path).await?;
        Ok(())
    }

    async fn exec(&self, args: &[String], progress: &ProgressReporter) -> ConvertResult<i32> {
        debug!(binary = %self.binary.display(), ?args, "Spawning FFmpeg");

        let mut child = Command::new(&self.binary)
            .args(["-hide_banner", "-y", "-nostats", "-progress", "pipe:1"])
            .args(args)
            .current_dir(&self.scratch_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                ConvertError::with_source(
                    ErrorKind::EncodeFailure,
                    format!("Failed to start FFmpeg: {e}"),
                    e,
                )
            })?;

        // Total input duration in microseconds, learned from the log stream.
        let duration_us = Arc::new(AtomicU64::new(0));

        let stderr_task = child.stderr.take().map(|stderr| {
            let duration_us = Arc::clone(&duration_us);
            let log_output = self.log_output;
            tokio::spawn(async move {
                let mut lines = BufReader::new(stderr).lines();
                while let Ok(Some(line)) = lines.next_line().await {
                    if let Some(us) = parse_duration_line(&line) {
                        duration_us.store(us, Ordering::Release);
                    }
                    if log_output {
                        debug!(target: "fileforge::ffmpeg", "{}", line);
                    }
                }
            })
        });

        if let Some(stdout) = child.stdout.take() {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match parse_progress_line(&line) {
                    Some(ProgressLine::OutTime(us)) => {
                        let total = duration_us.load(Ordering::Acquire);
                        if total > 0 {
                            progress.report((us as f64 / total as f64 * 100.0).round());
                        }
                    }
                    Some(ProgressLine::End) => progress.report(100.0),
                    None => {}
                }
            }
        }

        let status = child.wait().await?;
        if let Some(task) = stderr_task {
            if let Err(e) = task.await {
                warn!("FFmpeg log reader ended abnormally: {}", e);
            }
        }

        Ok(status.code().unwrap_or(-1))
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.scratch_dir) {
            Ok(()) => debug!(scratch = %self.scratch_dir.display(), "Removed engine scratch directory"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(
                "Failed to remove engine scratch directory '{}': {}",
                self.scratch_dir.display(),
                e
            ),
        }
    }
}

/// A line of `-progress` output the engine cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ProgressLine {
    /// Output timestamp in microseconds.
    OutTime(u64),
    /// The transcode finished.
    End,
}

fn parse_progress_line(line: &str) -> Option<ProgressLine> {
    let (key, value) = line.trim().split_once('=')?;
    match key {
        // Both keys carry microseconds.
        "out_time_us" | "out_time_ms" => value.parse().ok().map(ProgressLine::OutTime),
        "progress" if value == "end" => Some(ProgressLine::End),
        _ => None,
    }
}

/// Parse `Duration: HH:MM:SS.ss, ...` into microseconds.
fn parse_duration_line(line: &str) -> Option<u64> {
    let rest = line.trim_start().strip_prefix("Duration:")?.trim_start();
    let stamp = rest.split(',').next()?.trim();
    let mut parts = stamp.split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    let total = (hours * 3600.0 + minutes * 60.0 + seconds) * 1_000_000.0;
    (total > 0.0).then_some(total as u64)
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory engine used by unit tests.

    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;

    use super::*;

    /// Engine that "transcodes" by copying the `-i` input to the last arg.
    #[derive(Debug, Default)]
    pub struct MemoryEngine {
        pub files: Mutex<HashMap<String, Bytes>>,
        pub exit_code: i32,
        pub last_args: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl TranscodeEngine for MemoryEngine {
        async fn write_file(&self, name: &str, data: Bytes) -> ConvertResult<()> {
            self.files.lock().expect("lock").insert(name.to_string(), data);
            Ok(())
        }

        async fn read_file(&self, name: &str) -> ConvertResult<Bytes> {
            self.files
                .lock()
                .expect("lock")
                .get(name)
                .cloned()
                .ok_or_else(|| ConvertError::new(ErrorKind::Io, format!("{name} not found")))
        }

        async fn delete_file(&self, name: &str) -> ConvertResult<()> {
            self.files.lock().expect("lock").remove(name);
            Ok(())
        }

        async fn exec(&self, args: &[String], progress: &ProgressReporter) -> ConvertResult<i32> {
            *self.last_args.lock().expect("lock") = args.to_vec();
            if self.exit_code != 0 {
                return Ok(self.exit_code);
            }
            let input = args
                .iter()
                .position(|a| a == "-i")
                .and_then(|i| args.get(i + 1))
                .cloned()
                .unwrap_or_default();
            let output = args.last().cloned().unwrap_or_default();
            let data = self.read_file(&input).await?;
            progress.report(50.0);
            self.write_file(&output, data).await?;
            progress.report(100.0);
            Ok(0)
        }
    }

    /// Loader handing out one shared [`MemoryEngine`].
    #[derive(Debug, Default)]
    pub struct FakeLoader {
        pub engine: Arc<MemoryEngine>,
        pub loads: AtomicUsize,
        pub fail: bool,
    }

    #[async_trait]
    impl EngineLoader for FakeLoader {
        async fn load(&self) -> ConvertResult<Arc<dyn TranscodeEngine>> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(ConvertError::engine_init(
                    "Failed to load FFmpeg: core not found",
                ));
            }
            Ok(Arc::clone(&self.engine) as Arc<dyn TranscodeEngine>)
        }
    }
}
