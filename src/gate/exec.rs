//! Running an approved command with a wall-clock limit.

use std::io::Read;
use std::path::PathBuf;
use std::process::{Child, Command, Stdio};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;
use std::time::{Duration, Instant};

use wait_timeout::ChildExt;

use crate::{Error, Result};

/// What a finished command produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Exit code, or `None` when the process was ended by a signal
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub duration: Duration,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Spawns commands through the platform shell.
#[derive(Debug, Clone)]
pub struct CommandRunner {
    timeout: Duration,
    cwd: Option<PathBuf>,
}

impl CommandRunner {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout, cwd: None }
    }

    /// Run commands in `dir` instead of the current directory.
    pub fn with_cwd(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cwd = Some(dir.into());
        self
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `command` and wait for it, up to the configured timeout.
    ///
    /// A non-zero exit is reported in the outcome. The deadline covers both
    /// the shell and anything still holding its output pipes, such as a job
    /// it started in the background. Exceeding it kills the command (and, on
    /// Unix, everything it started) and returns [`Error::CommandTimeout`].
    pub fn run(&self, command: &str) -> Result<CommandOutcome> {
        let mut cmd = shell(command);
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(ref dir) = self.cwd {
            cmd.current_dir(dir);
        }
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        tracing::debug!(command, timeout_secs = self.timeout.as_secs_f32(), "spawning command");
        let started = Instant::now();
        let deadline = started + self.timeout;
        let mut child = cmd.spawn()?;

        let (tx, rx) = mpsc::channel();
        spawn_reader(child.stdout.take(), Pipe::Stdout, tx.clone());
        spawn_reader(child.stderr.take(), Pipe::Stderr, tx);

        let status = match child.wait_timeout(self.timeout)? {
            Some(status) => status,
            None => {
                kill(&mut child);
                let _ = child.wait();
                return Err(self.timed_out(command));
            }
        };

        let Some((stdout, stderr)) = collect(&rx, deadline) else {
            // The shell exited but a background job still holds the pipes
            kill(&mut child);
            return Err(self.timed_out(command));
        };

        let outcome = CommandOutcome {
            exit_code: status.code(),
            stdout,
            stderr,
            duration: started.elapsed(),
        };
        tracing::debug!(command, exit_code = ?outcome.exit_code, "command finished");
        Ok(outcome)
    }

    fn timed_out(&self, command: &str) -> Error {
        tracing::warn!(command, timeout_secs = self.timeout.as_secs_f32(), "command timed out and was killed");
        Error::CommandTimeout {
            command: command.to_string(),
            timeout: self.timeout,
        }
    }
}

#[cfg(unix)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("sh");
    cmd.arg("-c").arg(command);
    cmd
}

#[cfg(windows)]
fn shell(command: &str) -> Command {
    let mut cmd = Command::new("cmd");
    cmd.arg("/C").arg(command);
    cmd
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Pipe {
    Stdout,
    Stderr,
}

/// Drain a pipe on its own thread so a chatty child never blocks on a full
/// pipe while we wait for it. The bytes are sent once the pipe closes.
fn spawn_reader<R: Read + Send + 'static>(
    pipe: Option<R>,
    which: Pipe,
    tx: Sender<(Pipe, Vec<u8>)>,
) {
    match pipe {
        Some(mut pipe) => {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = pipe.read_to_end(&mut buf);
                let _ = tx.send((which, buf));
            });
        }
        None => {
            let _ = tx.send((which, Vec::new()));
        }
    }
}

/// Wait for both pipes to close, but no later than `deadline`.
fn collect(rx: &Receiver<(Pipe, Vec<u8>)>, deadline: Instant) -> Option<(String, String)> {
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let (which, buf) = rx.recv_timeout(remaining).ok()?;
        let text = String::from_utf8_lossy(&buf).into_owned();
        match which {
            Pipe::Stdout => stdout = Some(text),
            Pipe::Stderr => stderr = Some(text),
        }
    }
    Some((stdout.unwrap_or_default(), stderr.unwrap_or_default()))
}

/// Kill the child and its process group.
fn kill(child: &mut Child) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{Signal, killpg};
        use nix::unistd::Pid;
        let _ = killpg(Pid::from_raw(child.id() as i32), Signal::SIGKILL);
    }
    let _ = child.kill();
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::test_utils::TestEnv;

    #[test]
    fn test_captures_output_and_exit_code() {
        let runner = CommandRunner::new(Duration::from_secs(10));
        let outcome = runner.run("echo out; echo err >&2; exit 3").unwrap();
        assert_eq!(outcome.exit_code, Some(3));
        assert_eq!(outcome.stdout, "out\n");
        assert_eq!(outcome.stderr, "err\n");
        assert!(!outcome.success());
    }

    #[test]
    fn test_success() {
        let outcome = CommandRunner::new(Duration::from_secs(10))
            .run("true")
            .unwrap();
        assert!(outcome.success());
    }

    #[test]
    fn test_timeout_kills_command() {
        let runner = CommandRunner::new(Duration::from_millis(300));
        let started = Instant::now();
        let err = runner.run("sleep 30").unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[test]
    fn test_timeout_kills_background_children() {
        let env = TestEnv::new();
        let runner = CommandRunner::new(Duration::from_millis(300)).with_cwd(env.path());
        let err = runner.run("(sleep 2; touch late.txt) & sleep 30").unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
        thread::sleep(Duration::from_secs(3));
        assert!(!env.path().join("late.txt").exists());
    }

    #[test]
    fn test_background_job_holding_output_times_out() {
        let env = TestEnv::new();
        let runner = CommandRunner::new(Duration::from_secs(1)).with_cwd(env.path());
        let started = Instant::now();
        let err = runner
            .run("(sleep 3; touch late.txt) & echo started")
            .unwrap_err();
        assert!(matches!(err, Error::CommandTimeout { .. }));
        assert!(started.elapsed() < Duration::from_secs(3));
        thread::sleep(Duration::from_secs(3));
        assert!(!env.path().join("late.txt").exists());
    }

    #[test]
    fn test_detached_background_job_returns_promptly() {
        let runner = CommandRunner::new(Duration::from_secs(5));
        let started = Instant::now();
        let outcome = runner
            .run("sleep 3 > /dev/null 2>&1 & echo started")
            .unwrap();
        assert_eq!(outcome.stdout, "started\n");
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn test_large_output_does_not_deadlock() {
        let runner = CommandRunner::new(Duration::from_secs(20));
        let outcome = runner.run("head -c 300000 /dev/zero | tr '\\0' 'x'").unwrap();
        assert_eq!(outcome.stdout.len(), 300000);
    }

    #[test]
    fn test_runs_in_cwd() {
        let env = TestEnv::new();
        env.write("marker.txt", "here");
        let runner = CommandRunner::new(Duration::from_secs(10)).with_cwd(env.path());
        let outcome = runner.run("cat marker.txt").unwrap();
        assert_eq!(outcome.stdout, "here");
    }
}
