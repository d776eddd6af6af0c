use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Output, Stdio};
use std::thread::JoinHandle;

use crate::foundation::error::{FlipbookError, FlipbookResult, ProcessFailure};

type Drain = JoinHandle<std::io::Result<Vec<u8>>>;

/// Resolve `program` to an executable path.
///
/// Names containing a path separator are checked as given; bare names are searched on `PATH`.
pub fn find_executable(program: &str) -> Option<PathBuf> {
    let candidate = Path::new(program);
    if candidate.components().count() > 1 {
        return is_executable(candidate).then(|| candidate.to_path_buf());
    }
    let path = std::env::var_os("PATH")?;
    std::env::split_paths(&path).find_map(|dir| {
        let full = dir.join(program);
        if is_executable(&full) {
            return Some(full);
        }
        if cfg!(windows) {
            let exe = dir.join(format!("{program}.exe"));
            if is_executable(&exe) {
                return Some(exe);
            }
        }
        None
    })
}

#[cfg(unix)]
fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt as _;
    std::fs::metadata(path).is_ok_and(|m| m.is_file() && m.permissions().mode() & 0o111 != 0)
}

#[cfg(not(unix))]
fn is_executable(path: &Path) -> bool {
    path.is_file()
}

/// Run `program` with `args` to completion with no input, capturing its output.
///
/// Used by capability probes; returns `None` when the program cannot be started.
pub fn probe_output(program: &Path, args: &[&str]) -> Option<Output> {
    let out = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output();
    match out {
        Ok(out) => Some(out),
        Err(e) => {
            tracing::debug!(program = %program.display(), error = %e, "probe failed to start");
            None
        }
    }
}

/// Output captured from a process that exited successfully.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CapturedOutput {
    /// Standard output, lossily decoded.
    pub stdout: String,
    /// Standard error, lossily decoded.
    pub stderr: String,
}

/// A running encoder process fed through stdin.
///
/// stdout and stderr are drained by background threads from the moment the process starts, so a
/// chatty encoder can never block on a full pipe while frames are still being written.
pub struct EncoderProcess {
    program: String,
    args: Vec<String>,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
    stdout_drain: Option<Drain>,
    stderr_drain: Option<Drain>,
}

impl EncoderProcess {
    /// Start `program` with `args`.
    pub fn spawn(program: &Path, args: &[String]) -> FlipbookResult<Self> {
        let program_name = program.display().to_string();
        tracing::info!(command = %command_line(&program_name, args), "running encoder");

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match e.kind() {
                std::io::ErrorKind::NotFound => {
                    FlipbookError::unavailable(format!("'{program_name}' was not found"))
                }
                _ => FlipbookError::Other(
                    anyhow::Error::new(e).context(format!("failed to spawn '{program_name}'")),
                ),
            })?;

        let stdin = child.stdin.take();
        let stdout_drain = child.stdout.take().map(drain);
        let stderr_drain = child.stderr.take().map(drain);
        Ok(Self {
            program: program_name,
            args: args.to_vec(),
            child: Some(child),
            stdin,
            stdout_drain,
            stderr_drain,
        })
    }

    /// Program name as invoked.
    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments the process was started with.
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Writable stdin of the process.
    pub fn stdin(&mut self) -> FlipbookResult<&mut ChildStdin> {
        self.stdin.as_mut().ok_or_else(|| {
            FlipbookError::state(format!("stdin of '{}' is already closed", self.program))
        })
    }

    /// Close stdin, wait for exit and collect the drained output.
    ///
    /// A non-zero exit becomes [`FlipbookError::EncodingProcess`] carrying the exit code and both
    /// output streams.
    pub fn finish(mut self) -> FlipbookResult<CapturedOutput> {
        drop(self.stdin.take());
        let Some(mut child) = self.child.take() else {
            return Err(FlipbookError::state(format!(
                "'{}' was already waited on",
                self.program
            )));
        };
        let status = child.wait().map_err(|e| {
            FlipbookError::Other(
                anyhow::Error::new(e).context(format!("failed to wait for '{}'", self.program)),
            )
        })?;
        let stdout = join_drain(self.stdout_drain.take(), &self.program, "stdout")?;
        let stderr = join_drain(self.stderr_drain.take(), &self.program, "stderr")?;

        if !status.success() {
            tracing::warn!(
                program = %self.program,
                code = ?status.code(),
                stderr = %stderr.trim(),
                "encoder exited unsuccessfully"
            );
            return Err(ProcessFailure {
                program: self.program.clone(),
                args: std::mem::take(&mut self.args),
                code: status.code(),
                stdout,
                stderr,
            }
            .into());
        }

        if !stdout.trim().is_empty() {
            tracing::debug!(program = %self.program, stdout = %stdout.trim(), "encoder stdout");
        }
        if !stderr.trim().is_empty() {
            tracing::debug!(program = %self.program, stderr = %stderr.trim(), "encoder stderr");
        }
        Ok(CapturedOutput { stdout, stderr })
    }
}

impl Drop for EncoderProcess {
    fn drop(&mut self) {
        drop(self.stdin.take());
        if let Some(mut child) = self.child.take() {
            // Abandoned mid-session; don't leave the encoder running.
            if let Err(e) = child.kill() {
                tracing::debug!(program = %self.program, error = %e, "kill failed");
            }
            let _ = child.wait();
        }
    }
}

impl std::fmt::Debug for EncoderProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncoderProcess")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("running", &self.child.is_some())
            .finish()
    }
}

fn drain<R: Read + Send + 'static>(mut stream: R) -> Drain {
    std::thread::spawn(move || {
        let mut bytes = Vec::new();
        stream.read_to_end(&mut bytes)?;
        Ok(bytes)
    })
}

fn join_drain(handle: Option<Drain>, program: &str, stream: &str) -> FlipbookResult<String> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| anyhow::anyhow!("{program} {stream} drain thread panicked"))?
        .map_err(|e| anyhow::anyhow!("reading {program} {stream} failed: {e}"))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Shell-like rendering of a command for logs.
pub fn command_line(program: &str, args: &[String]) -> String {
    let mut line = program.to_owned();
    for arg in args {
        line.push(' ');
        if arg.is_empty() || arg.contains(char::is_whitespace) {
            line.push('\'');
            line.push_str(arg);
            line.push('\'');
        } else {
            line.push_str(arg);
        }
    }
    line
}

#[cfg(test)]
#[path = "../../tests/unit/encode/process.rs"]
mod tests;
