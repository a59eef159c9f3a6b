//! Stopping a child process once its job has been canceled.

use std::time::Duration;

use tokio::process::Child;

/// How long a child gets to exit after SIGTERM before it is killed.
const TERM_GRACE: Duration = Duration::from_millis(1500);

/// What: Stop a running child and reap it.
///
/// Inputs:
/// - `child`: Spawned process belonging to a canceled job
/// - `label`: Command line used in log messages
///
/// Details:
/// - On unix the child gets SIGTERM first and is killed only if it is still
///   alive after [`TERM_GRACE`].
/// - Elsewhere the child is killed directly.
pub(super) async fn terminate(child: &mut Child, label: &str) {
    #[cfg(unix)]
    if send_sigterm(child) {
        match tokio::time::timeout(TERM_GRACE, child.wait()).await {
            Ok(Ok(status)) => {
                tracing::debug!("[Executor] {label} terminated ({status})");
                return;
            }
            Ok(Err(e)) => {
                tracing::warn!(error = %e, "[Executor] waiting for {label} after SIGTERM failed");
            }
            Err(_) => {
                tracing::debug!("[Executor] {label} ignored SIGTERM; killing");
            }
        }
    }
    if let Err(e) = child.kill().await {
        tracing::warn!(error = %e, "[Executor] failed to kill {label}");
    }
}

/// Send SIGTERM to `child`; returns `false` when the signal could not be sent.
#[cfg(unix)]
fn send_sigterm(child: &Child) -> bool {
    use nix::sys::signal::{Signal, kill};
    use nix::unistd::Pid;

    let Some(pid) = child.id().and_then(|id| i32::try_from(id).ok()) else {
        return false;
    };
    kill(Pid::from_raw(pid), Signal::SIGTERM).is_ok()
}
