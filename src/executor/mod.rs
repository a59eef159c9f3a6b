//! Debounced, preemptible execution of external commands.
//!
//! Every submission is keyed by its command signature. A new submission for a
//! key that is still debouncing or running cancels the previous job first
//! (its cancel hook fires before the new job can spawn), then waits out the
//! debounce window itself. Only the last job of a burst ever spawns a process.

mod job;
mod terminate;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tokio_util::sync::CancellationToken;

pub use job::{CancelHook, JobKey, JobOutput, JobRequest, JobState, MatchHook};

/// Debounce window used when none is configured.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);

/// What: Failure modes of a submitted job.
///
/// Details:
/// - A non-zero exit code is not an error here; it is reported through
///   [`JobOutput::exit_code`] and judged by the caller.
#[derive(Debug)]
pub enum ExecError {
    /// The process could not be spawned.
    Spawn {
        /// Command line that failed.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Waiting for the process failed.
    Wait {
        /// Command line that failed.
        command: String,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// The process ended without an exit code (for example, killed by a signal).
    UnknownExitCode {
        /// Command line that ended.
        command: String,
    },
    /// The job was preempted by a newer submission or canceled explicitly.
    Canceled {
        /// Command line that was canceled.
        command: String,
    },
}

impl ExecError {
    /// What: Whether this error only signals cancellation.
    #[must_use]
    pub const fn is_canceled(&self) -> bool {
        matches!(self, Self::Canceled { .. })
    }
}

impl fmt::Display for ExecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn { command, source } => {
                write!(f, "failed to execute command `{command}`: {source}")
            }
            Self::Wait { command, source } => {
                write!(f, "failed waiting for command `{command}`: {source}")
            }
            Self::UnknownExitCode { command } => {
                write!(f, "command `{command}` exited with unknown code")
            }
            Self::Canceled { command } => write!(f, "command `{command}` was canceled"),
        }
    }
}

impl std::error::Error for ExecError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn { source, .. } | Self::Wait { source, .. } => Some(source),
            Self::UnknownExitCode { .. } | Self::Canceled { .. } => None,
        }
    }
}

/// Entry in the active-job table.
struct ActiveJob {
    /// Submission id; distinguishes a job from a later one with the same key.
    id: u64,
    /// Cancels the debounce timer and the running process.
    token: CancellationToken,
    /// Fired exactly once if the job is preempted or canceled.
    on_cancel: Option<CancelHook>,
    /// Debouncing or running.
    state: JobState,
}

/// Active and recently finished jobs.
#[derive(Default)]
struct JobTable {
    /// Jobs that are debouncing or running, at most one per key.
    active: HashMap<JobKey, ActiveJob>,
    /// Terminal state of the last finished job per key.
    finished: HashMap<JobKey, JobState>,
}

/// What: Runs external commands with per-key debounce and last-writer-wins preemption.
///
/// Details:
/// - Shared between handler tasks behind an `Arc`; the job table is the only
///   mutable state and is guarded by a mutex that is never held across an
///   `.await`.
pub struct ProcessExecutor {
    jobs: Mutex<JobTable>,
    debounce: Duration,
    working_dir: PathBuf,
    next_id: AtomicU64,
}

impl fmt::Debug for ProcessExecutor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessExecutor")
            .field("debounce", &self.debounce)
            .field("working_dir", &self.working_dir)
            .finish_non_exhaustive()
    }
}

impl ProcessExecutor {
    /// What: Create an executor spawning commands in `working_dir`.
    ///
    /// Inputs:
    /// - `working_dir`: Directory used as the child's current directory
    /// - `debounce`: Quiet period before a submission actually spawns
    pub fn new(working_dir: impl Into<PathBuf>, debounce: Duration) -> Self {
        Self {
            jobs: Mutex::new(JobTable::default()),
            debounce,
            working_dir: working_dir.into(),
            next_id: AtomicU64::new(1),
        }
    }

    /// What: Directory commands are spawned in.
    #[must_use]
    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Lock the job table, recovering from poisoning.
    fn jobs(&self) -> std::sync::MutexGuard<'_, JobTable> {
        self.jobs
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// What: Debounce, spawn and await one command.
    ///
    /// Inputs:
    /// - `request`: Command, arguments, optional success marker and hooks
    ///
    /// Output:
    /// - `Ok(JobOutput)` when the process exited with a code (zero or not)
    /// - `Err(ExecError::Canceled)` when preempted or canceled; `on_cancel`
    ///   has fired by then
    /// - Other `Err` variants for spawn/wait failures or a missing exit code
    ///
    /// # Errors
    /// - See output; `on_cancel` never fires for these.
    ///
    /// Details:
    /// - A running or debouncing job with the same key is canceled first and
    ///   its `on_cancel` hook runs before this call starts its own debounce.
    /// - `on_match` fires at most once, for the first stdout chunk that
    ///   contains the success marker.
    pub async fn run(&self, mut request: JobRequest) -> Result<JobOutput, ExecError> {
        let key = request.key();
        let label = request.label();
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let token = CancellationToken::new();

        let preempted = {
            let mut jobs = self.jobs();
            jobs.active.insert(
                key,
                ActiveJob {
                    id,
                    token: token.clone(),
                    on_cancel: request.on_cancel.take(),
                    state: JobState::Debouncing,
                },
            )
        };
        if let Some(previous) = preempted {
            self.finish_canceled(key, previous, &label);
        }

        tracing::info!("[Executor] Executing command: {label}");
        tokio::select! {
            () = token.cancelled() => {
                return Err(ExecError::Canceled { command: label });
            }
            () = tokio::time::sleep(self.debounce) => {}
        }
        if !self.mark_running(key, id) {
            return Err(ExecError::Canceled { command: label });
        }
        tracing::info!("[Executor] Debounced execution of command: {label}");

        let result = self.spawn_and_wait(&mut request, &token, &label).await;
        self.settle(key, id, result, label)
    }

    /// What: Cancel the job registered under `key`, if any.
    ///
    /// Output:
    /// - `true` when a job was canceled (its `on_cancel` has fired).
    pub fn cancel(&self, key: JobKey) -> bool {
        let removed = self.jobs().active.remove(&key);
        match removed {
            Some(job) => {
                self.finish_canceled(key, job, &key.to_string());
                true
            }
            None => false,
        }
    }

    /// What: Cancel every active job; used on shutdown.
    pub fn cancel_all(&self) {
        let drained: Vec<(JobKey, ActiveJob)> = self.jobs().active.drain().collect();
        for (key, job) in drained {
            self.finish_canceled(key, job, &key.to_string());
        }
    }

    /// What: Current or last known state of the job for `key`.
    #[must_use]
    pub fn state(&self, key: JobKey) -> Option<JobState> {
        let jobs = self.jobs();
        jobs.active
            .get(&key)
            .map(|job| job.state)
            .or_else(|| jobs.finished.get(&key).copied())
    }

    /// What: Number of jobs currently debouncing or running.
    #[must_use]
    pub fn active_jobs(&self) -> usize {
        self.jobs().active.len()
    }

    /// Signal cancellation to a job already removed from the active table.
    fn finish_canceled(&self, key: JobKey, mut job: ActiveJob, label: &str) {
        job.token.cancel();
        self.jobs().finished.insert(key, JobState::Canceled);
        if let Some(on_cancel) = job.on_cancel.take() {
            on_cancel();
        }
        tracing::info!("[Executor] Execution of command {label} canceled.");
    }

    /// Flip the job to running; `false` if it was replaced meanwhile.
    fn mark_running(&self, key: JobKey, id: u64) -> bool {
        let mut jobs = self.jobs();
        match jobs.active.get_mut(&key) {
            Some(job) if job.id == id => {
                job.state = JobState::Running;
                true
            }
            _ => false,
        }
    }

    /// Remove the finished job and decide what the caller observes.
    ///
    /// A job that lost its table entry was canceled; its result is discarded
    /// even if the process managed to exit normally.
    fn settle(
        &self,
        key: JobKey,
        id: u64,
        result: Result<JobOutput, ExecError>,
        label: String,
    ) -> Result<JobOutput, ExecError> {
        let mut jobs = self.jobs();
        let still_owned = jobs.active.get(&key).is_some_and(|job| job.id == id);
        if !still_owned {
            return Err(ExecError::Canceled { command: label });
        }
        jobs.active.remove(&key);
        let state = match &result {
            Ok(_) => JobState::Succeeded,
            Err(e) if e.is_canceled() => JobState::Canceled,
            Err(_) => JobState::Failed,
        };
        jobs.finished.insert(key, state);
        drop(jobs);
        if let Err(e) = &result
            && !e.is_canceled()
        {
            tracing::warn!("[Executor] {e}");
        }
        result
    }

    /// Spawn the process, stream its output and wait for it to exit or be canceled.
    async fn spawn_and_wait(
        &self,
        request: &mut JobRequest,
        token: &CancellationToken,
        label: &str,
    ) -> Result<JobOutput, ExecError> {
        let program = which::which(&request.command)
            .unwrap_or_else(|_| PathBuf::from(&request.command));
        let mut child = Command::new(&program)
            .args(&request.args)
            .current_dir(&self.working_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| ExecError::Spawn {
                command: label.to_string(),
                source,
            })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let marker = request.success_marker.clone();
        let mut on_match = request.on_match.take();

        let streams = async {
            tokio::join!(
                read_stream(stdout, |chunk| {
                    if let Some(marker) = marker.as_deref()
                        && chunk.contains(marker)
                        && let Some(hook) = on_match.take()
                    {
                        tracing::debug!("[Executor] Match found while looking for {marker}");
                        hook(chunk);
                    }
                }),
                read_stream(stderr, |_| {}),
            )
        };
        let collected = tokio::select! {
            () = token.cancelled() => None,
            out = streams => Some(out),
        };
        let Some((stdout, stderr)) = collected else {
            terminate::terminate(&mut child, label).await;
            return Err(ExecError::Canceled {
                command: label.to_string(),
            });
        };

        let status = tokio::select! {
            () = token.cancelled() => None,
            status = child.wait() => Some(status),
        };
        let Some(status) = status else {
            terminate::terminate(&mut child, label).await;
            return Err(ExecError::Canceled {
                command: label.to_string(),
            });
        };
        let status = status.map_err(|source| ExecError::Wait {
            command: label.to_string(),
            source,
        })?;

        match status.code() {
            Some(exit_code) => {
                tracing::info!("[Executor] Command {label} exited with code: {exit_code}");
                Ok(JobOutput {
                    stdout,
                    stderr,
                    exit_code,
                })
            }
            None => Err(ExecError::UnknownExitCode {
                command: label.to_string(),
            }),
        }
    }
}

/// What: Drain a child's output stream, reporting each chunk as it arrives.
///
/// Inputs:
/// - `reader`: Piped stdout or stderr (absent when not captured)
/// - `on_chunk`: Called with every chunk decoded lossily as UTF-8
///
/// Output:
/// - Complete captured text.
async fn read_stream<R>(reader: Option<R>, mut on_chunk: impl FnMut(&str)) -> String
where
    R: AsyncRead + Unpin,
{
    let Some(mut reader) = reader else {
        return String::new();
    };
    let mut collected = String::new();
    let mut buf = [0u8; 4096];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                let chunk = String::from_utf8_lossy(&buf[..n]);
                let cleaned = strip_ansi_escapes::strip_str(&*chunk);
                for line in cleaned.lines().filter(|l| !l.trim().is_empty()) {
                    tracing::debug!("[Executor] {line}");
                }
                on_chunk(&chunk);
                collected.push_str(&chunk);
            }
            Err(e) => {
                tracing::warn!(error = %e, "[Executor] failed reading process output");
                break;
            }
        }
    }
    collected
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicUsize;

    fn sh(script: &str) -> JobRequest {
        JobRequest::new("sh", vec!["-c".to_string(), script.to_string()])
    }

    #[tokio::test]
    /// What: A finished job resolves with its exit code and buffered output.
    ///
    /// Inputs:
    /// - `sh -c` writing to both streams and exiting with 3
    ///
    /// Output:
    /// - `JobOutput` carries stdout, stderr and the exit code; state recorded as succeeded.
    async fn run_collects_output_and_exit_code() {
        let executor = ProcessExecutor::new(std::env::temp_dir(), Duration::from_millis(10));
        let request = sh("echo hello; echo oops >&2; exit 3");
        let key = request.key();
        let output = executor.run(request).await.expect("job completes");
        assert_eq!(output.stdout.trim(), "hello");
        assert_eq!(output.stderr.trim(), "oops");
        assert_eq!(output.exit_code, 3);
        assert!(!output.success());
        assert_eq!(executor.state(key), Some(JobState::Succeeded));
        assert_eq!(executor.active_jobs(), 0);
    }

    #[tokio::test]
    /// What: The success hook fires once even if the marker is printed repeatedly.
    async fn success_marker_fires_hook_once() {
        let executor = ProcessExecutor::new(std::env::temp_dir(), Duration::from_millis(10));
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&hits);
        let request = sh("echo 'file written'; sleep 0.1; echo 'file written'")
            .with_success_marker("file written", move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            });
        let output = executor.run(request).await.expect("job completes");
        assert!(output.success());
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    /// What: Spawning a missing program is an error, not a cancellation.
    async fn missing_program_reports_spawn_error() {
        let executor = ProcessExecutor::new(std::env::temp_dir(), Duration::from_millis(10));
        let err = executor
            .run(JobRequest::new("transwatch-definitely-missing-binary", vec![]))
            .await
            .expect_err("spawn fails");
        assert!(matches!(err, ExecError::Spawn { .. }));
        assert!(!err.is_canceled());
    }

    #[tokio::test]
    /// What: Explicit cancellation of a running job kills it and fires its hook.
    ///
    /// Inputs:
    /// - Long `sleep` job canceled shortly after it started running
    ///
    /// Output:
    /// - `run` settles as canceled quickly and `on_cancel` fired exactly once.
    async fn cancel_running_job_settles_as_canceled() {
        let executor = Arc::new(ProcessExecutor::new(
            std::env::temp_dir(),
            Duration::from_millis(10),
        ));
        let cancels = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&cancels);
        let request = sh("sleep 30").with_on_cancel(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        });
        let key = request.key();
        let runner = {
            let executor = Arc::clone(&executor);
            tokio::spawn(async move { executor.run(request).await })
        };
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(executor.state(key), Some(JobState::Running));
        assert!(executor.cancel(key));

        let result = tokio::time::timeout(Duration::from_secs(5), runner)
            .await
            .expect("run settles after cancel")
            .expect("task joins");
        assert!(result.expect_err("canceled").is_canceled());
        assert_eq!(cancels.load(Ordering::SeqCst), 1);
        assert_eq!(executor.state(key), Some(JobState::Canceled));
        assert!(!executor.cancel(key));
    }
}
