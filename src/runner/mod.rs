//! Command execution for inspections.
//!
//! Inspections run a command locally and record the working directory
//! before and after. Execution is behind the [`CommandRunner`] trait so the
//! verifiers can be driven without spawning processes; [`ProcessRunner`] is
//! the real implementation.

mod recorder;

pub use recorder::{hash_file, ArtifactRecorder, RecordError, HASH_ALGORITHM};

use serde::Serialize;
use std::io::{self, Read};
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Default grace period between SIGTERM and SIGKILL on timeout.
pub const DEFAULT_TERMINATION_GRACE: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Errors starting a command
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    #[error("command is empty")]
    EmptyCommand,

    #[error("failed to spawn '{program}': {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Captured result of a command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,

    /// Exit code; `None` if the process was killed by a signal
    pub return_value: Option<i32>,

    /// The command was stopped because it exceeded its timeout
    pub timed_out: bool,
}

impl CommandOutput {
    /// Exited normally with status 0.
    pub fn success(&self) -> bool {
        !self.timed_out && self.return_value == Some(0)
    }
}

/// Runs an inspection command in a working directory.
pub trait CommandRunner {
    fn run(
        &self,
        command: &[String],
        work_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, RunnerError>;
}

impl<F> CommandRunner for F
where
    F: Fn(&[String], &Path, Option<Duration>) -> Result<CommandOutput, RunnerError>,
{
    fn run(
        &self,
        command: &[String],
        work_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, RunnerError> {
        self(command, work_dir, timeout)
    }
}

/// Spawns real processes.
#[derive(Debug, Clone)]
pub struct ProcessRunner {
    termination_grace: Duration,
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(DEFAULT_TERMINATION_GRACE)
    }
}

impl ProcessRunner {
    pub fn new(termination_grace: Duration) -> Self {
        Self { termination_grace }
    }

    /// Terminate a child and its process group gracefully, then forcefully.
    ///
    /// Descendants that inherited the output pipes must die too, or the
    /// readers never see EOF.
    fn terminate_child(&self, child: &mut Child) -> io::Result<()> {
        signal_group(child, GroupSignal::Terminate);

        let start = Instant::now();
        while start.elapsed() < self.termination_grace {
            if child.try_wait()?.is_some() {
                break;
            }
            thread::sleep(POLL_INTERVAL);
        }

        signal_group(child, GroupSignal::Kill);
        let _ = child.kill();
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
enum GroupSignal {
    Terminate,
    Kill,
}

#[cfg(unix)]
fn signal_group(child: &mut Child, which: GroupSignal) {
    use nix::sys::signal::{self, Signal};
    use nix::unistd::Pid;

    // The child leads its own group (see `spawn`), so its pid is the pgid
    let pgid = Pid::from_raw(child.id() as i32);
    let sig = match which {
        GroupSignal::Terminate => Signal::SIGTERM,
        GroupSignal::Kill => Signal::SIGKILL,
    };
    if let Err(errno) = signal::killpg(pgid, sig) {
        tracing::debug!(pgid = pgid.as_raw(), %errno, "killpg failed");
    }
}

#[cfg(not(unix))]
fn signal_group(child: &mut Child, _which: GroupSignal) {
    let _ = child.kill();
}

fn spawn(program: &str, args: &[String], work_dir: &Path) -> io::Result<Child> {
    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(work_dir)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }

    command.spawn()
}

fn drain<R: Read + Send + 'static>(reader: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut reader) = reader {
            let _ = reader.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}

impl CommandRunner for ProcessRunner {
    fn run(
        &self,
        command: &[String],
        work_dir: &Path,
        timeout: Option<Duration>,
    ) -> Result<CommandOutput, RunnerError> {
        let (program, args) = command.split_first().ok_or(RunnerError::EmptyCommand)?;

        let mut child = spawn(program, args, work_dir).map_err(|e| RunnerError::SpawnFailed {
            program: program.clone(),
            reason: e.to_string(),
        })?;

        let stdout_handle = drain(child.stdout.take());
        let stderr_handle = drain(child.stderr.take());

        let start = Instant::now();
        let mut timed_out = false;
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if timeout.map_or(false, |limit| start.elapsed() >= limit) {
                tracing::warn!(program = %program, "command timed out, terminating");
                timed_out = true;
                self.terminate_child(&mut child)?;
                break child.wait()?;
            }
            thread::sleep(POLL_INTERVAL);
        };

        let stdout = stdout_handle.join().unwrap_or_default();
        let stderr = stderr_handle.join().unwrap_or_default();

        Ok(CommandOutput {
            stdout,
            stderr,
            return_value: status.code(),
            timed_out,
        })
    }
}
