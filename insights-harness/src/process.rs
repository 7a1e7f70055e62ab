use crate::HarnessError;
use crate::Result;
use std::ffi::OsString;
use std::io::Read;
use std::io::Write;
use std::path::PathBuf;
use std::process::Child;
use std::process::Command;
use std::process::ExitStatus;
use std::process::Stdio;
use std::time::Duration;
use std::time::Instant;
use tracing::debug;

/// A single synchronous external call.
#[derive(Debug, Clone)]
pub struct Invocation {
  pub program: PathBuf,
  pub args: Vec<OsString>,
  pub cwd: PathBuf,
  pub env: Vec<(OsString, OsString)>,
  pub stdin: Option<String>,
}

impl Invocation {
  pub fn new(program: impl Into<PathBuf>, cwd: impl Into<PathBuf>) -> Self {
    Self {
      program: program.into(),
      args: Vec::new(),
      cwd: cwd.into(),
      env: Vec::new(),
      stdin: None,
    }
  }

  pub fn arg(mut self, arg: impl Into<OsString>) -> Self {
    self.args.push(arg.into());
    self
  }

  pub fn args<I, S>(mut self, args: I) -> Self
  where
    I: IntoIterator<Item = S>,
    S: Into<OsString>,
  {
    self.args.extend(args.into_iter().map(Into::into));
    self
  }

  pub fn envs(mut self, env: Vec<(OsString, OsString)>) -> Self {
    self.env.extend(env);
    self
  }

  /// Arguments as displayable strings.
  pub fn arg_strings(&self) -> Vec<String> {
    self
      .args
      .iter()
      .map(|arg| arg.to_string_lossy().into_owned())
      .collect()
  }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunResult {
  pub stdout: String,
  pub stderr: String,
  pub exit_code: i32,
  pub duration: Duration,
}

/// Seam between the driver and the operating system.
pub trait CommandRunner {
  fn run(&self, invocation: &Invocation) -> Result<RunResult>;
}

/// Runs invocations as real child processes.
///
/// Both pipes are drained on their own threads while the child runs, so a
/// chatty child can never stall on a full pipe. There is no timeout.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessRunner;

impl CommandRunner for ProcessRunner {
  fn run(&self, invocation: &Invocation) -> Result<RunResult> {
    let program = invocation.program.display().to_string();
    debug!(program = %program, args = ?invocation.arg_strings(), "spawning");

    let mut cmd = Command::new(&invocation.program);
    cmd
      .args(&invocation.args)
      .current_dir(&invocation.cwd)
      .envs(invocation.env.iter().map(|(k, v)| (k, v)))
      .stdout(Stdio::piped())
      .stderr(Stdio::piped())
      .stdin(if invocation.stdin.is_some() {
        Stdio::piped()
      } else {
        Stdio::null()
      });

    let started = Instant::now();
    let mut child = cmd.spawn().map_err(|source| HarnessError::Spawn {
      program: program.clone(),
      source,
    })?;

    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (stdout, stderr) = std::thread::scope(|scope| {
      let out = scope.spawn(move || drain(stdout));
      let err = scope.spawn(move || drain(stderr));

      if let (Some(mut pipe), Some(data)) = (stdin, invocation.stdin.as_deref()) {
        // The child may exit without reading its input.
        if let Err(err) = pipe.write_all(data.as_bytes()) {
          debug!(program = %program, "stdin write failed: {err}");
        }
      }

      (join_drain(out), join_drain(err))
    });
    let (status, stdout, stderr) = finish(&mut child, stdout, stderr)?;
    let duration = started.elapsed();
    let exit_code = exit_code(status);
    debug!(program = %program, exit_code, ?duration, "finished");

    Ok(RunResult {
      stdout: String::from_utf8_lossy(&stdout).into_owned(),
      stderr: String::from_utf8_lossy(&stderr).into_owned(),
      exit_code,
      duration,
    })
  }
}

/// Reap the child before surfacing a failed drain.
fn finish(
  child: &mut Child,
  stdout: std::io::Result<Vec<u8>>,
  stderr: std::io::Result<Vec<u8>>,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>)> {
  let status = child.wait()?;
  Ok((status, stdout?, stderr?))
}

fn drain<R: Read>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
  let mut buf = Vec::new();
  if let Some(mut pipe) = pipe {
    pipe.read_to_end(&mut buf)?;
  }
  Ok(buf)
}

fn join_drain(
  handle: std::thread::ScopedJoinHandle<'_, std::io::Result<Vec<u8>>>,
) -> std::io::Result<Vec<u8>> {
  handle
    .join()
    .unwrap_or_else(|_| Err(std::io::Error::other("pipe reader panicked")))
}

#[cfg(unix)]
fn exit_code(status: ExitStatus) -> i32 {
  use std::os::unix::process::ExitStatusExt;
  status
    .code()
    .or_else(|| status.signal().map(|sig| -sig))
    .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: ExitStatus) -> i32 {
  status.code().unwrap_or(-1)
}
