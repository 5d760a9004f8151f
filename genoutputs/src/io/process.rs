//! Running a child process under a wall-clock limit with bounded capture.

use std::io::Read;
use std::mem;
use std::process::{Command, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

/// How the child process ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessOutcome {
    Succeeded,
    /// Non-zero exit; `None` when killed by a signal.
    Failed { exit_code: Option<i32> },
    /// Killed after the timeout elapsed.
    TimedOut,
}

/// Outcome plus captured stdout/stderr.
#[derive(Debug)]
pub struct CapturedRun {
    pub outcome: ProcessOutcome,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes discarded beyond the capture limit.
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
}

impl CapturedRun {
    pub fn stdout_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_lossy(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// How long the output readers may keep going once the child is gone.
const DRAIN_GRACE: Duration = Duration::from_millis(500);

/// Run `cmd` to completion or until `timeout`, killing it in the latter case.
///
/// stdout and stderr are drained on their own threads while the child runs so
/// a chatty child can never block on a full pipe. At most `capture_limit`
/// bytes of each are kept. Descendants of the child can hold the pipes open
/// after it exits; their readers are detached once the deadline passes and
/// whatever was captured so far is returned. Errors only when the child
/// cannot be spawned or waited on.
#[instrument(skip_all, fields(timeout_secs = timeout.as_secs_f64(), capture_limit))]
pub fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    capture_limit: usize,
) -> Result<CapturedRun> {
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    debug!("spawning child process");
    let mut child = match cmd.spawn() {
        Ok(c) => c,
        Err(e) => {
            error!(err = %e, "failed to spawn command");
            return Err(e).context("spawn command");
        }
    };

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let started = Instant::now();
    let stdout_reader = StreamReader::spawn(stdout, capture_limit);
    let stderr_reader = StreamReader::spawn(stderr, capture_limit);

    let outcome = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) if status.success() => ProcessOutcome::Succeeded,
        Some(status) => ProcessOutcome::Failed {
            exit_code: status.code(),
        },
        None => {
            warn!(
                timeout_secs = timeout.as_secs_f64(),
                "command timed out, killing"
            );
            // The child may exit between the timeout and the kill.
            if let Err(e) = child.kill() {
                debug!(err = %e, "kill after timeout failed");
            }
            child.wait().context("wait command after kill")?;
            ProcessOutcome::TimedOut
        }
    };

    let grace = Instant::now() + DRAIN_GRACE;
    let deadline = match outcome {
        ProcessOutcome::TimedOut => grace,
        _ => started.checked_add(timeout).map_or(grace, |end| end.max(grace)),
    };
    let (stdout, stdout_truncated) = stdout_reader.finish(deadline).context("collect stdout")?;
    let (stderr, stderr_truncated) = stderr_reader.finish(deadline).context("collect stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        debug!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(?outcome, "command finished");
    Ok(CapturedRun {
        outcome,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
    })
}

#[derive(Default)]
struct Capture {
    bytes: Vec<u8>,
    truncated: usize,
}

/// One output stream drained on a background thread into a shared buffer.
struct StreamReader {
    capture: Arc<Mutex<Capture>>,
    done: Receiver<Result<()>>,
}

impl StreamReader {
    fn spawn<R: Read + Send + 'static>(reader: R, limit: usize) -> Self {
        let capture = Arc::new(Mutex::new(Capture::default()));
        let (done_tx, done) = mpsc::channel();
        let sink = Arc::clone(&capture);
        thread::spawn(move || {
            // The receiver is gone once the reader has been detached.
            let _ = done_tx.send(read_stream_limited(reader, &sink, limit));
        });
        Self { capture, done }
    }

    /// Wait for end of stream until `deadline`, then take what was captured.
    fn finish(self, deadline: Instant) -> Result<(Vec<u8>, usize)> {
        let wait = deadline.saturating_duration_since(Instant::now());
        match self.done.recv_timeout(wait) {
            Ok(result) => result?,
            Err(RecvTimeoutError::Timeout) => {
                warn!("output still held open by a descendant process; detaching reader");
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(anyhow!("output reader thread panicked"));
            }
        }
        let mut capture = self
            .capture
            .lock()
            .map_err(|_| anyhow!("output buffer poisoned"))?;
        let Capture { bytes, truncated } = mem::take(&mut *capture);
        Ok((bytes, truncated))
    }
}

fn read_stream_limited<R: Read>(mut reader: R, sink: &Mutex<Capture>, limit: usize) -> Result<()> {
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            return Ok(());
        }
        let mut capture = sink
            .lock()
            .map_err(|_| anyhow!("output buffer poisoned"))?;
        let remaining = limit.saturating_sub(capture.bytes.len());
        let keep = n.min(remaining);
        capture.bytes.extend_from_slice(&chunk[..keep]);
        capture.truncated += n - keep;
    }
}
