//! Child process execution with a wall-clock timeout and capped capture.
//!
//! Commands run through `sh -c` in a process group of their own. When the
//! timeout fires, or once the shell has exited, the whole group is killed, so
//! a `build && run` chain or a backgrounded grandchild cannot outlive the run.
//! A process that detached from the group can still hold the output pipes;
//! capture stops shortly after the kill and keeps what was read.

use std::ffi::OsStr;
use std::path::Path;
use std::process::Stdio;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::task::JoinHandle;
use tokio::time::Instant;

const READ_CHUNK: usize = 8 * 1024;

/// How long the pipes may stay open once the process group is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Exit code reported when the process could not provide one.
pub const FALLBACK_EXIT_CODE: i32 = 1;

#[derive(Debug, Clone)]
pub struct ProcessLimits {
    pub timeout: Duration,
    /// Per-stream ceiling; bytes past it are drained and dropped.
    pub max_buffer_bytes: usize,
}

#[derive(Debug, Clone, Default)]
pub struct ProcessOutcome {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// A stream hit `max_buffer_bytes`.
    pub overflowed: bool,
}

impl ProcessOutcome {
    pub fn exit_code(&self) -> i32 {
        match self.exit_code {
            Some(code) if !self.timed_out => code,
            _ => FALLBACK_EXIT_CODE,
        }
    }

    fn push_stderr_line(&mut self, line: &str) {
        if !self.stderr.is_empty() && !self.stderr.ends_with('\n') {
            self.stderr.push('\n');
        }
        self.stderr.push_str(line);
    }
}

pub async fn run_shell(
    command: &str,
    working_dir: &Path,
    path_env: &OsStr,
    limits: &ProcessLimits,
) -> ProcessOutcome {
    let mut cmd = Command::new("sh");
    cmd.arg("-c")
        .arg(command)
        .current_dir(working_dir)
        .env("PATH", path_env)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    #[cfg(unix)]
    cmd.process_group(0);

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            log::warn!("Failed to spawn '{}': {}", command, e);
            let mut outcome = ProcessOutcome::default();
            outcome.push_stderr_line(&format!("Failed to start process: {}", e));
            return outcome;
        }
    };
    let pid = child.id();
    let deadline = Instant::now() + limits.timeout;

    let stdout_reader = StreamReader::spawn(child.stdout.take(), limits.max_buffer_bytes);
    let stderr_reader = StreamReader::spawn(child.stderr.take(), limits.max_buffer_bytes);

    let mut outcome = ProcessOutcome::default();
    let mut wait_error = None;
    match tokio::time::timeout_at(deadline, child.wait()).await {
        Ok(Ok(status)) => {
            outcome.exit_code = status.code();
            kill_process_group(pid);
        }
        Ok(Err(e)) => {
            wait_error = Some(e);
            terminate(&mut child, pid).await;
        }
        Err(_) => {
            log::warn!("Process {:?} timed out after {:?}", pid, limits.timeout);
            outcome.timed_out = true;
            terminate(&mut child, pid).await;
        }
    }

    // Everything in the group is dead now. A process that left the group
    // (setsid, daemonize) can still hold the pipes, so reading stops after
    // a short drain period instead of waiting for EOF.
    let drain_deadline = Instant::now() + DRAIN_GRACE;
    let (stdout, stderr) = tokio::join!(
        stdout_reader.finish(drain_deadline),
        stderr_reader.finish(drain_deadline)
    );
    if stdout.held_open || stderr.held_open {
        log::warn!(
            "Output pipes of process {:?} stayed open after it was killed, a detached process still holds them",
            pid
        );
    }
    outcome.stdout = String::from_utf8_lossy(&stdout.bytes).into_owned();
    outcome.stderr = String::from_utf8_lossy(&stderr.bytes).into_owned();
    outcome.overflowed = stdout.overflowed || stderr.overflowed;

    if let Some(e) = wait_error {
        outcome.push_stderr_line(&format!("Failed to wait for process: {}", e));
    }
    if outcome.timed_out {
        outcome.push_stderr_line(&format!(
            "Execution timed out after {}",
            describe_duration(limits.timeout)
        ));
    }

    outcome
}

async fn terminate(child: &mut Child, pid: Option<u32>) {
    kill_process_group(pid);
    if let Err(e) = child.kill().await {
        log::debug!("Failed to kill process {:?}: {}", pid, e);
    }
}

#[cfg(unix)]
fn kill_process_group(pid: Option<u32>) {
    let Some(pid) = pid else {
        return;
    };
    // The child was spawned with process_group(0), so its pid is the pgid.
    let result = unsafe { libc::killpg(pid as libc::pid_t, libc::SIGKILL) };
    if result != 0 {
        log::trace!(
            "killpg({}) returned {}",
            pid,
            std::io::Error::last_os_error()
        );
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pid: Option<u32>) {}

#[derive(Debug, Default)]
struct Capture {
    bytes: Vec<u8>,
    overflowed: bool,
    /// The reader was aborted before the pipe reached EOF.
    held_open: bool,
}

/// Background task copying one pipe into a buffer shared with the caller,
/// so whatever arrived survives if the task has to be aborted.
struct StreamReader {
    capture: Arc<Mutex<Capture>>,
    task: Option<JoinHandle<()>>,
}

impl StreamReader {
    fn spawn<R>(stream: Option<R>, cap: usize) -> Self
    where
        R: AsyncRead + Unpin + Send + 'static,
    {
        let capture = Arc::new(Mutex::new(Capture::default()));
        let task = stream.map(|stream| tokio::spawn(read_capped(stream, cap, Arc::clone(&capture))));
        Self { capture, task }
    }

    async fn finish(self, deadline: Instant) -> Capture {
        let mut held_open = false;
        if let Some(mut task) = self.task {
            match tokio::time::timeout_at(deadline, &mut task).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => log::debug!("Output reader task failed: {}", e),
                Err(_) => {
                    task.abort();
                    held_open = true;
                }
            }
        }

        let mut capture = lock(&self.capture);
        let mut taken = std::mem::take(&mut *capture);
        taken.held_open = held_open;
        taken
    }
}

fn lock(capture: &Mutex<Capture>) -> MutexGuard<'_, Capture> {
    capture.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

async fn read_capped<R>(mut reader: R, cap: usize, capture: Arc<Mutex<Capture>>)
where
    R: AsyncRead + Unpin,
{
    let mut chunk = vec![0u8; READ_CHUNK];

    loop {
        match reader.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => {
                let mut capture = lock(&capture);
                let room = cap.saturating_sub(capture.bytes.len());
                if n > room {
                    capture.overflowed = true;
                }
                capture.bytes.extend_from_slice(&chunk[..n.min(room)]);
            }
            Err(e) => {
                log::debug!("Stopped reading process output: {}", e);
                break;
            }
        }
    }
}

fn describe_duration(duration: Duration) -> String {
    if duration.subsec_millis() == 0 && duration.as_secs() > 0 {
        format!("{}s", duration.as_secs())
    } else {
        format!("{}ms", duration.as_millis())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    fn limits(timeout: Duration) -> ProcessLimits {
        ProcessLimits {
            timeout,
            max_buffer_bytes: 1024 * 1024,
        }
    }

    fn inherited_path() -> std::ffi::OsString {
        std::env::var_os("PATH").unwrap_or_else(|| "/usr/bin:/bin".into())
    }

    #[tokio::test]
    async fn test_captures_both_streams_and_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_shell(
            "echo out; echo err >&2; exit 3",
            dir.path(),
            &inherited_path(),
            &limits(Duration::from_secs(10)),
        )
        .await;

        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
        assert_eq!(outcome.exit_code(), 3);
        assert!(!outcome.timed_out);
        assert!(!outcome.overflowed);
    }

    #[tokio::test]
    async fn test_runs_in_requested_working_dir() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_shell(
            "pwd",
            dir.path(),
            &inherited_path(),
            &limits(Duration::from_secs(10)),
        )
        .await;

        let reported = std::fs::canonicalize(outcome.stdout.trim()).unwrap();
        assert_eq!(reported, std::fs::canonicalize(dir.path()).unwrap());
    }

    #[tokio::test]
    async fn test_timeout_kills_the_whole_group() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let outcome = run_shell(
            "echo started; sleep 30 && echo finished",
            dir.path(),
            &inherited_path(),
            &limits(Duration::from_millis(500)),
        )
        .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert!(outcome.timed_out);
        assert_eq!(outcome.exit_code(), FALLBACK_EXIT_CODE);
        assert!(outcome.stdout.contains("started"));
        assert!(!outcome.stdout.contains("finished"));
        assert!(outcome.stderr.contains("Execution timed out after 500ms"));
    }

    #[tokio::test]
    async fn test_background_grandchild_does_not_hold_pipes() {
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let outcome = run_shell(
            "sleep 30 & echo done",
            dir.path(),
            &inherited_path(),
            &limits(Duration::from_secs(20)),
        )
        .await;

        assert!(started.elapsed() < Duration::from_secs(10));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.stdout.trim(), "done");
    }

    #[tokio::test]
    async fn test_detached_process_does_not_keep_capture_open() {
        if which::which("setsid").is_err() {
            eprintln!("skipping: 'setsid' not found on PATH");
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let started = Instant::now();
        let outcome = run_shell(
            "setsid sleep 8 & echo partial",
            dir.path(),
            &inherited_path(),
            &limits(Duration::from_secs(20)),
        )
        .await;

        assert!(started.elapsed() < Duration::from_secs(4));
        assert_eq!(outcome.exit_code(), 0);
        assert_eq!(outcome.stdout.trim(), "partial");
    }

    #[tokio::test]
    async fn test_raw_capture_is_capped() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_shell(
            "i=0; while [ $i -lt 200 ]; do echo 0123456789; i=$((i+1)); done",
            dir.path(),
            &inherited_path(),
            &ProcessLimits {
                timeout: Duration::from_secs(10),
                max_buffer_bytes: 100,
            },
        )
        .await;

        assert_eq!(outcome.stdout.len(), 100);
        assert!(outcome.overflowed);
        assert_eq!(outcome.exit_code(), 0);
    }

    #[tokio::test]
    async fn test_missing_binary_is_a_normal_failure() {
        let dir = tempfile::tempdir().unwrap();
        let outcome = run_shell(
            "definitely-not-a-real-toolchain-binary",
            dir.path(),
            &inherited_path(),
            &limits(Duration::from_secs(10)),
        )
        .await;

        assert_ne!(outcome.exit_code(), 0);
        assert!(outcome.stderr.contains("definitely-not-a-real-toolchain-binary"));
    }

    #[test]
    fn test_describe_duration() {
        assert_eq!(describe_duration(Duration::from_secs(30)), "30s");
        assert_eq!(describe_duration(Duration::from_millis(1500)), "1500ms");
    }
}
