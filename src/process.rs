//! Process runner.
//!
//! Every external tool the harness drives (compiler, validator, assembler,
//! linker, the compiled program, the emulator) goes through [`Invocation`].
//! Whatever happens to the child is folded into an [`Outcome`]; this module
//! never returns an error and never panics on subprocess failure.

use std::ffi::{OsStr, OsString};
use std::fmt;
use std::fs::File;
use std::io;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Exit code reported for a deadline kill, as `timeout(1)` does.
pub const TIMEOUT_STATUS: i32 = 124;
/// Exit code reported when a program cannot be executed.
pub const SPAWN_FAILED_STATUS: i32 = 126;
/// Exit code reported when a program cannot be found.
pub const NOT_FOUND_STATUS: i32 = 127;

const POLL_INTERVAL: Duration = Duration::from_millis(5);

/// How a child process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Normal exit with the given code.
    Exited(i32),
    /// Terminated by the given signal number.
    Signaled(i32),
    /// Killed after the deadline passed.
    TimedOut,
    /// The program does not exist.
    NotFound,
    /// Spawning or waiting failed for another reason.
    SpawnFailed(String),
}

impl Outcome {
    pub fn success(&self) -> bool {
        matches!(self, Outcome::Exited(0))
    }

    /// Shell-style status: the exit code, or 124/126/127/128+signal.
    pub fn status_code(&self) -> i32 {
        match self {
            Outcome::Exited(code) => *code,
            Outcome::Signaled(sig) => 128 + sig,
            Outcome::TimedOut => TIMEOUT_STATUS,
            Outcome::NotFound => NOT_FOUND_STATUS,
            Outcome::SpawnFailed(_) => SPAWN_FAILED_STATUS,
        }
    }

    /// True when the child died from a hardware or runtime fault.
    pub fn is_fault(&self) -> bool {
        match self {
            Outcome::Signaled(sig) => is_fault_signal(*sig),
            _ => false,
        }
    }

    fn from_status(status: ExitStatus) -> Self {
        if let Some(code) = status.code() {
            return Outcome::Exited(code);
        }
        match exit_signal(status) {
            Some(sig) => Outcome::Signaled(sig),
            None => Outcome::SpawnFailed(format!("unrecognized exit status: {status}")),
        }
    }

    fn from_spawn_error(err: &io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            Outcome::NotFound
        } else {
            Outcome::SpawnFailed(err.to_string())
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Exited(code) => write!(f, "exited with {code}"),
            Outcome::Signaled(sig) => write!(f, "killed by signal {sig}"),
            Outcome::TimedOut => write!(f, "timed out"),
            Outcome::NotFound => write!(f, "program not found"),
            Outcome::SpawnFailed(msg) => write!(f, "failed to run: {msg}"),
        }
    }
}

#[cfg(unix)]
fn exit_signal(status: ExitStatus) -> Option<i32> {
    use std::os::unix::process::ExitStatusExt as _;
    status.signal()
}

#[cfg(not(unix))]
fn exit_signal(_status: ExitStatus) -> Option<i32> {
    None
}

#[cfg(unix)]
fn is_fault_signal(sig: i32) -> bool {
    matches!(
        sig,
        libc::SIGSEGV | libc::SIGBUS | libc::SIGILL | libc::SIGFPE | libc::SIGABRT
    )
}

#[cfg(not(unix))]
fn is_fault_signal(_sig: i32) -> bool {
    false
}

// ============================================================================
// INVOCATION
// ============================================================================

/// A single external command with its I/O wiring and deadline.
#[derive(Debug)]
pub struct Invocation {
    program: OsString,
    args: Vec<OsString>,
    deadline: Option<Duration>,
    stdin: Option<File>,
    stdout: Option<File>,
}

impl Invocation {
    pub fn new<S: AsRef<OsStr>>(program: S) -> Self {
        Self {
            program: program.as_ref().to_os_string(),
            args: Vec::new(),
            deadline: None,
            stdin: None,
            stdout: None,
        }
    }

    pub fn arg<S: AsRef<OsStr>>(mut self, arg: S) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.args
            .extend(args.into_iter().map(|a| a.as_ref().to_os_string()));
        self
    }

    /// Kill the child (and its process group) once `deadline` has elapsed.
    pub fn deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Feed the child's stdin from `file`. Without this, stdin is empty.
    pub fn stdin(mut self, file: File) -> Self {
        self.stdin = Some(file);
        self
    }

    /// Capture the child's stdout into `file`. Without this, stdout is discarded.
    pub fn stdout(mut self, file: File) -> Self {
        self.stdout = Some(file);
        self
    }

    #[cfg(test)]
    pub(crate) fn program(&self) -> &OsStr {
        &self.program
    }

    #[cfg(test)]
    pub(crate) fn arguments(&self) -> &[OsString] {
        &self.args
    }

    #[cfg(test)]
    pub(crate) fn deadline_value(&self) -> Option<Duration> {
        self.deadline
    }

    /// Runs the command to completion, or until the deadline kills it.
    ///
    /// A command with a deadline runs in its own process group so the kill
    /// reaches its descendants; that group is outside the terminal's
    /// foreground group and does not receive Ctrl-C. Commands without a
    /// deadline stay in the harness's group and are interrupted with it.
    pub fn run(self) -> Outcome {
        let grouped = self.deadline.is_some();
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .stdin(self.stdin.map_or_else(Stdio::null, Stdio::from))
            .stdout(self.stdout.map_or_else(Stdio::null, Stdio::from))
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt as _;
            if grouped {
                cmd.process_group(0);
            }
        }

        let mut child = match cmd.spawn() {
            Ok(child) => child,
            Err(e) => return Outcome::from_spawn_error(&e),
        };

        match wait_with_deadline(&mut child, self.deadline) {
            Ok(Some(status)) => Outcome::from_status(status),
            Ok(None) => Outcome::TimedOut,
            Err(e) => {
                kill_tree(&mut child, grouped);
                let _ = child.wait();
                Outcome::SpawnFailed(e.to_string())
            }
        }
    }
}

/// Waits for `child`; returns `Ok(None)` if it had to be killed at the deadline.
fn wait_with_deadline(
    child: &mut Child,
    deadline: Option<Duration>,
) -> io::Result<Option<ExitStatus>> {
    let Some(limit) = deadline else {
        return child.wait().map(Some);
    };
    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if start.elapsed() >= limit {
            kill_tree(child, true);
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

/// Kills `child`, and its whole process group when it leads one.
#[cfg(unix)]
fn kill_tree(child: &mut Child, grouped: bool) {
    if grouped {
        if let Ok(pid) = i32::try_from(child.id()) {
            // SAFETY: kill(2) on our own child's process group has no memory effects.
            unsafe {
                libc::kill(-pid, libc::SIGKILL);
            }
        }
    }
    let _ = child.kill();
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child, _grouped: bool) {
    let _ = child.kill();
}
