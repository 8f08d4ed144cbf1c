//! Running the bundled tools as child processes.

use crate::{LoaderError, LoaderResult};
use std::convert::Infallible;
use std::ffi::OsString;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use tracing::debug;

/// A fully prepared tool invocation: program, arguments and extra
/// environment. Built once and run in either captured or inherited mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    /// Name used in errors and logs (`jattach`, `profiler`, `converter`)
    pub tool: String,
    pub program: PathBuf,
    pub args: Vec<String>,
    /// Added to the inherited environment
    pub env: Vec<(String, OsString)>,
}

impl Invocation {
    pub fn new(tool: impl Into<String>, program: impl AsRef<Path>) -> Self {
        Self {
            tool: tool.into(),
            program: program.as_ref().to_path_buf(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, key: impl Into<String>, value: impl Into<OsString>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    fn command(&self) -> Command {
        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in &self.env {
            command.env(key, value);
        }
        command
    }
}

/// Output of a tool that exited successfully.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
}

/// Exit code and both streams of a finished tool, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CapturedOutput {
    #[must_use]
    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Turn a non-zero exit into [`LoaderError::Subprocess`].
    pub fn into_result(self, tool: &str) -> LoaderResult<ExecutionResult> {
        if self.success() {
            return Ok(ExecutionResult {
                stdout: self.stdout,
                stderr: self.stderr,
            });
        }
        Err(LoaderError::Subprocess {
            tool: tool.to_string(),
            code: self.code,
            stdout: self.stdout,
            stderr: self.stderr,
        })
    }
}

/// Run with piped output and return the status and both streams.
///
/// Stdout and stderr are drained on separate threads so a child filling one
/// pipe while the other is being read cannot deadlock.
pub fn capture(invocation: &Invocation) -> LoaderResult<CapturedOutput> {
    debug!(tool = %invocation.tool, program = %invocation.program.display(), args = ?invocation.args, "running captured");

    let mut child = invocation
        .command()
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| spawn_error(&invocation.tool, e))?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let (stdout, stderr) = thread::scope(|scope| {
        let stdout = scope.spawn(move || drain(stdout_pipe));
        let stderr = scope.spawn(move || drain(stderr_pipe));
        (join_drain(stdout), join_drain(stderr))
    });

    let status = wait(&mut child, &invocation.tool)?;
    let stdout = stdout.map_err(|e| io_error(&invocation.tool, e))?;
    let stderr = stderr.map_err(|e| io_error(&invocation.tool, e))?;

    Ok(CapturedOutput {
        code: exit_code(status),
        stdout,
        stderr,
    })
}

/// Run with piped output; a non-zero exit is an error carrying both streams.
pub fn run_captured(invocation: &Invocation) -> LoaderResult<ExecutionResult> {
    capture(invocation)?.into_result(&invocation.tool)
}

/// Run with the caller's stdin, stdout and stderr and return the exit code.
pub fn run_inherited(invocation: &Invocation) -> LoaderResult<i32> {
    debug!(tool = %invocation.tool, program = %invocation.program.display(), args = ?invocation.args, "running interactively");

    let mut child = invocation
        .command()
        .spawn()
        .map_err(|e| spawn_error(&invocation.tool, e))?;
    let status = wait(&mut child, &invocation.tool)?;
    Ok(exit_code(status))
}

/// Run with inherited stdio, then exit this process with the child's code.
///
/// Returns only if the tool could not be run at all.
pub fn run_interactive(invocation: &Invocation) -> LoaderResult<Infallible> {
    let code = run_inherited(invocation)?;
    std::process::exit(code)
}

fn drain(pipe: Option<impl Read>) -> io::Result<String> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf)?;
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

fn join_drain(handle: thread::ScopedJoinHandle<'_, io::Result<String>>) -> io::Result<String> {
    handle
        .join()
        .unwrap_or_else(|_| Err(io::Error::other("output reader panicked")))
}

fn wait(child: &mut Child, tool: &str) -> LoaderResult<ExitStatus> {
    child.wait().map_err(|e| io_error(tool, e))
}

/// Exit code of a finished child; death by signal `n` reports `128 + n`
/// like a shell does.
fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

fn spawn_error(tool: &str, source: io::Error) -> LoaderError {
    LoaderError::Spawn {
        tool: tool.to_string(),
        source,
    }
}

/// Map a failure while talking to a running tool. `EINTR` is retried inside
/// std, so `Interrupted` rarely gets this far.
fn io_error(tool: &str, source: io::Error) -> LoaderError {
    if source.kind() == io::ErrorKind::Interrupted {
        return LoaderError::Interrupted {
            tool: tool.to_string(),
        };
    }
    spawn_error(tool, source)
}
