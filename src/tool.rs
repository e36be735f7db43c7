//! Native tool invocation with a bounded timeout.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::ToolError;

/// Default limit for a single tool invocation.
pub const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(60);

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Captured result of a finished tool run.
#[derive(Debug)]
pub struct ToolOutput {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    /// Turn a non-zero exit into [`ToolError::Failed`].
    pub fn into_success(self) -> Result<Self, ToolError> {
        if self.status.success() {
            Ok(self)
        } else {
            Err(ToolError::Failed {
                status: self.status,
                stderr: self.stderr.trim().to_string(),
            })
        }
    }
}

/// An external program used to introspect binaries (`ldd`, `otool -L`, `dumpbin /dependents`).
#[derive(Debug, Clone)]
pub struct NativeTool {
    program: PathBuf,
    args: Vec<String>,
    env: Vec<(String, String)>,
    timeout: Duration,
}

impl NativeTool {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Arguments placed before the target path.
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Display name used in error messages.
    pub fn name(&self) -> String {
        self.program
            .file_name()
            .unwrap_or(self.program.as_os_str())
            .to_string_lossy()
            .into_owned()
    }

    /// Run the tool on `target` and capture its output.
    ///
    /// Both pipes are drained while the child runs so a chatty tool cannot
    /// block on a full pipe. The child is killed once the timeout elapses.
    pub fn run(&self, target: &Path) -> Result<ToolOutput, ToolError> {
        self.run_with(Some(target.as_os_str()))
    }

    /// Run the tool with only its configured arguments.
    pub fn run_bare(&self) -> Result<ToolOutput, ToolError> {
        self.run_with(None)
    }

    fn run_with(&self, target: Option<&OsStr>) -> Result<ToolOutput, ToolError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(target) = target {
            cmd.arg(target);
        }
        for (key, value) in &self.env {
            cmd.env(key, value);
        }
        cmd.stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        tracing::trace!(program = %self.program.display(), args = ?self.args, "spawning tool");

        let mut child = cmd.spawn().map_err(|source| ToolError::Spawn {
            program: self.program.display().to_string(),
            source,
        })?;

        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let deadline = Instant::now() + self.timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {}
                Err(e) => {
                    reap(&mut child);
                    return Err(ToolError::Io(e));
                }
            }
            if Instant::now() >= deadline {
                reap(&mut child);
                return Err(ToolError::TimedOut(self.timeout));
            }
            thread::sleep(POLL_INTERVAL);
        };

        Ok(ToolOutput {
            status,
            stdout: join(stdout)?,
            stderr: join(stderr)?,
        })
    }
}

/// Kill and wait for a child that will not be awaited normally.
///
/// Killing closes the pipes, which lets the reader threads finish.
fn reap(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<std::io::Result<Vec<u8>>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        pipe.read_to_end(&mut buf)?;
        Ok(buf)
    })
}

fn join(
    handle: Option<thread::JoinHandle<std::io::Result<Vec<u8>>>>,
) -> Result<String, ToolError> {
    let Some(handle) = handle else {
        return Ok(String::new());
    };
    let bytes = handle
        .join()
        .map_err(|_| ToolError::Other("output reader thread panicked".to_string()))??;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_run_captures_stdout() {
        let out = NativeTool::new("echo")
            .args(["hello"])
            .run(Path::new("world"))
            .unwrap();
        assert!(out.status.success());
        assert_eq!(out.stdout.trim(), "hello world");
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let err = NativeTool::new("/nonexistent/tool-that-does-not-exist")
            .run(Path::new("/bin/sh"))
            .unwrap_err();
        assert!(matches!(err, ToolError::Spawn { .. }), "got: {err:?}");
    }

    #[test]
    fn test_nonzero_exit_becomes_failed() {
        let out = NativeTool::new("sh")
            .args(["-c", "echo boom >&2; exit 3"])
            .run_bare()
            .unwrap();
        let err = out.into_success().unwrap_err();
        match err {
            ToolError::Failed { stderr, .. } => assert_eq!(stderr, "boom"),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_timeout_kills_child() {
        let start = Instant::now();
        let err = NativeTool::new("sleep")
            .timeout(Duration::from_millis(100))
            .run(Path::new("5"))
            .unwrap_err();
        assert!(matches!(err, ToolError::TimedOut(_)), "got: {err:?}");
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn test_reap_leaves_no_running_child() {
        let mut child = Command::new("sleep").arg("5").spawn().unwrap();
        reap(&mut child);
        assert!(child.try_wait().unwrap().is_some());
    }

    #[test]
    fn test_name_is_program_file_name() {
        let tool = NativeTool::new("/opt/msvc/bin/HostX64/x64/dumpbin.exe");
        assert_eq!(tool.name(), "dumpbin.exe");
        assert_eq!(NativeTool::new("ldd").name(), "ldd");
    }

    #[test]
    fn test_env_is_passed() {
        let out = NativeTool::new("sh")
            .args(["-c", "printf %s \"$BUNDLE_TEST_VAR\""])
            .env("BUNDLE_TEST_VAR", "/dependents")
            .run_bare()
            .unwrap();
        assert_eq!(out.stdout, "/dependents");
    }
}
