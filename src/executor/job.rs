//! Job descriptions submitted to the process executor.

use std::fmt;
use std::hash::{DefaultHasher, Hash, Hasher};

/// Hook invoked once when the success marker is seen on stdout.
pub type MatchHook = Box<dyn FnOnce(&str) + Send>;
/// Hook invoked once when a job is preempted or canceled.
pub type CancelHook = Box<dyn FnOnce() + Send>;

/// What: Identity of a job, derived from its command and arguments.
///
/// Details:
/// - Identical invocations hash to the same key, which is what makes a
///   resubmission preempt the previous run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct JobKey(u64);

impl JobKey {
    /// What: Derive the key for `command` with `args`.
    ///
    /// Inputs:
    /// - `command`: Program name or path
    /// - `args`: Arguments in order
    ///
    /// Output:
    /// - Deterministic key; equal inputs always produce equal keys.
    #[must_use]
    pub fn derive(command: &str, args: &[String]) -> Self {
        let mut hasher = DefaultHasher::new();
        command.hash(&mut hasher);
        args.hash(&mut hasher);
        Self(hasher.finish())
    }
}

impl fmt::Display for JobKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Lifecycle of a job as tracked by the executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Waiting out the debounce window.
    Debouncing,
    /// Process spawned and not yet exited.
    Running,
    /// Process exited and reported an exit code.
    Succeeded,
    /// Spawn, wait or exit-code failure.
    Failed,
    /// Preempted by a newer submission or canceled explicitly.
    Canceled,
}

impl JobState {
    /// What: Whether the job can no longer change state.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed | Self::Canceled)
    }
}

/// What: One external command to run through the executor.
///
/// Details:
/// - Built with [`JobRequest::new`] and the `with_*` helpers.
/// - Hooks are `FnOnce` so the executor can guarantee each fires at most once.
pub struct JobRequest {
    /// Program to spawn.
    pub command: String,
    /// Arguments passed verbatim (no shell interpretation).
    pub args: Vec<String>,
    /// Text that, once seen on stdout, triggers `on_match`.
    pub success_marker: Option<String>,
    /// Hook for the first stdout chunk containing `success_marker`.
    pub on_match: Option<MatchHook>,
    /// Hook for preemption or explicit cancellation.
    pub on_cancel: Option<CancelHook>,
}

impl JobRequest {
    /// What: Describe a command with no hooks attached.
    pub fn new(command: impl Into<String>, args: Vec<String>) -> Self {
        Self {
            command: command.into(),
            args,
            success_marker: None,
            on_match: None,
            on_cancel: None,
        }
    }

    /// What: Attach a success marker and the hook to run when it appears.
    #[must_use]
    pub fn with_success_marker(
        mut self,
        marker: impl Into<String>,
        on_match: impl FnOnce(&str) + Send + 'static,
    ) -> Self {
        self.success_marker = Some(marker.into());
        self.on_match = Some(Box::new(on_match));
        self
    }

    /// What: Attach the hook to run if this job is preempted or canceled.
    #[must_use]
    pub fn with_on_cancel(mut self, on_cancel: impl FnOnce() + Send + 'static) -> Self {
        self.on_cancel = Some(Box::new(on_cancel));
        self
    }

    /// What: Key derived from the command signature.
    #[must_use]
    pub fn key(&self) -> JobKey {
        JobKey::derive(&self.command, &self.args)
    }

    /// What: Human-readable command line for logs and errors.
    #[must_use]
    pub fn label(&self) -> String {
        if self.args.is_empty() {
            self.command.clone()
        } else {
            format!("{} {}", self.command, self.args.join(" "))
        }
    }
}

impl fmt::Debug for JobRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("JobRequest")
            .field("command", &self.command)
            .field("args", &self.args)
            .field("success_marker", &self.success_marker)
            .field("on_match", &self.on_match.is_some())
            .field("on_cancel", &self.on_cancel.is_some())
            .finish()
    }
}

/// What: Buffered result of a process that exited on its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobOutput {
    /// Everything written to stdout.
    pub stdout: String,
    /// Everything written to stderr.
    pub stderr: String,
    /// Process exit code.
    pub exit_code: i32,
}

impl JobOutput {
    /// What: Whether the process reported success (exit code 0).
    #[must_use]
    pub const fn success(&self) -> bool {
        self.exit_code == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    /// What: Keys depend on both command and arguments, and nothing else.
    fn job_key_is_deterministic_per_signature() {
        let args = vec!["-l".to_string(), "de".to_string()];
        assert_eq!(JobKey::derive("npx", &args), JobKey::derive("npx", &args));
        assert_ne!(
            JobKey::derive("npx", &args),
            JobKey::derive("npx", &["-l".to_string(), "fr".to_string()])
        );
        assert_ne!(JobKey::derive("npx", &args), JobKey::derive("node", &args));

        let request = JobRequest::new("npx", args.clone()).with_on_cancel(|| {});
        assert_eq!(request.key(), JobKey::derive("npx", &args));
        assert_eq!(request.label(), "npx -l de");
    }
}
