//! Subprocess execution with a wall-clock limit.

use std::{io, path::Path, process::Stdio, time::Duration};

use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    process::Command,
};

#[derive(Debug, thiserror::Error)]
pub enum ExecError {
    #[error("Command '{0}' not found. Is it in your PATH?")]
    CommandNotFound(String),

    #[error("Failed to spawn '{0}': {1}")]
    Spawn(String, #[source] io::Error),

    #[error("Failed to communicate with '{0}': {1}")]
    Communicate(String, #[source] io::Error),

    #[error("Empty command line")]
    EmptyCommand,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutput {
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    /// Bytes read past the capture limit and thrown away, over both streams.
    pub discarded_bytes: u64,
}

impl ProcessOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    pub fn is_truncated(&self) -> bool {
        self.discarded_bytes > 0
    }

    /// stdout followed by stderr.
    pub fn combined(&self) -> String {
        let mut s = String::with_capacity(self.stdout.len() + self.stderr.len());
        s += &self.stdout;
        s += &self.stderr;
        s
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Execution {
    Finished(ProcessOutput),
    TimedOut,
}

#[derive(Debug, Clone)]
pub struct ProcessRunner {
    time_limit: Duration,
    capture_limit: usize,
}

impl ProcessRunner {
    pub const DEFAULT_TIME_LIMIT: Duration = Duration::from_secs(15);
    pub const DEFAULT_CAPTURE_LIMIT: usize = 1 << 20;

    pub fn new(time_limit: Duration) -> Self {
        Self {
            time_limit,
            capture_limit: Self::DEFAULT_CAPTURE_LIMIT,
        }
    }

    /// At most `bytes` of each stream are kept; the rest is read and dropped.
    pub fn with_capture_limit(mut self, bytes: usize) -> Self {
        self.capture_limit = bytes;
        self
    }

    pub fn time_limit(&self) -> Duration {
        self.time_limit
    }

    pub fn capture_limit(&self) -> usize {
        self.capture_limit
    }

    /// Runs `argv` in `cwd`, writing `input` to its stdin (or `/dev/null` when `None`).
    ///
    /// On timeout the whole process group is killed and the child is reaped before
    /// returning, so nothing keeps running behind the caller's back.
    pub async fn run(
        &self,
        argv: &[String],
        cwd: &Path,
        input: Option<&[u8]>,
    ) -> Result<(Execution, Duration), ExecError> {
        let (program, args) = argv.split_first().ok_or(ExecError::EmptyCommand)?;
        log::debug!("$ {} (cwd={:?})", argv.join(" "), cwd);

        let mut cmd = Command::new(program);
        cmd.args(args)
            .current_dir(cwd)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        own_process_group(&mut cmd);

        let mut proc = cmd.spawn().map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => ExecError::CommandNotFound(program.to_owned()),
            _ => ExecError::Spawn(program.to_owned(), e),
        })?;
        let pid = proc.id();

        let communicate_err = |e: io::Error| ExecError::Communicate(program.to_owned(), e);
        let stdin = proc.stdin.take();
        let mut stdout = proc
            .stdout
            .take()
            .ok_or_else(|| communicate_err(io::Error::new(io::ErrorKind::Other, "stdout is not piped")))?;
        let mut stderr = proc
            .stderr
            .take()
            .ok_or_else(|| communicate_err(io::Error::new(io::ErrorKind::Other, "stderr is not piped")))?;

        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();

        let feed_stdin = async move {
            let (Some(mut pipe), Some(data)) = (stdin, input) else {
                return Ok(());
            };
            match pipe.write_all(data).await {
                // The program may exit without consuming all of its input.
                Err(e) if e.kind() == io::ErrorKind::BrokenPipe => Ok(()),
                res => res,
            }
            // `pipe` is dropped here and the child sees EOF
        };

        let start_at = tokio::time::Instant::now();
        let res = tokio::time::timeout(self.time_limit, async {
            tokio::try_join!(
                feed_stdin,
                read_capped(&mut stdout, &mut stdout_buf, self.capture_limit),
                read_capped(&mut stderr, &mut stderr_buf, self.capture_limit),
                proc.wait(),
            )
        })
        .await;
        let elapsed = start_at.elapsed();

        match res {
            Err(_) => {
                log::debug!("'{}' exceeded {:?}, killing it", program, self.time_limit);
                kill_process_group(pid);
                proc.kill()
                    .await
                    .unwrap_or_else(|e| log::warn!("Failed to kill timed-out '{}': {:#}", program, e));
                Ok((Execution::TimedOut, elapsed))
            }

            Ok(Err(e)) => Err(communicate_err(e)),

            Ok(Ok((_, stdout_dropped, stderr_dropped, exit_status))) => {
                let discarded_bytes = stdout_dropped + stderr_dropped;
                if discarded_bytes > 0 {
                    log::debug!("'{}' wrote {} bytes past the capture limit", program, discarded_bytes);
                }
                let output = ProcessOutput {
                    status: exit_status.code(),
                    stdout: String::from_utf8_lossy(&stdout_buf).into(),
                    stderr: String::from_utf8_lossy(&stderr_buf).into(),
                    discarded_bytes,
                };
                Ok((Execution::Finished(output), elapsed))
            }
        }
    }
}

impl Default for ProcessRunner {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TIME_LIMIT)
    }
}

/// Keeps the first `limit` bytes of `pipe` in `buf` and drains the rest, so a chatty
/// child can neither block on a full pipe nor grow `buf` without bound.
/// Returns the number of bytes dropped.
async fn read_capped<R>(pipe: &mut R, buf: &mut Vec<u8>, limit: usize) -> io::Result<u64>
where
    R: AsyncRead + Unpin,
{
    (&mut *pipe).take(limit as u64).read_to_end(buf).await?;
    tokio::io::copy(pipe, &mut tokio::io::sink()).await
}

/// Puts the child into a fresh process group so that its own children can be killed with it.
#[cfg(unix)]
fn own_process_group(cmd: &mut Command) {
    cmd.process_group(0);
}

#[cfg(not(unix))]
fn own_process_group(_cmd: &mut Command) {}

#[cfg(unix)]
fn kill_process_group(pgid: Option<u32>) {
    let Some(pgid) = pgid else { return };
    // SAFETY: killpg only sends a signal. A group that already vanished yields ESRCH.
    let ret = unsafe { libc::killpg(pgid as libc::pid_t, libc::SIGKILL) };
    if ret != 0 {
        log::debug!("killpg({}) failed: {}", pgid, io::Error::last_os_error());
    }
}

#[cfg(not(unix))]
fn kill_process_group(_pgid: Option<u32>) {}

#[cfg(test)]
mod test {
    use super::*;

    fn sh(script: &str) -> Vec<String> {
        vec!["sh".into(), "-c".into(), script.into()]
    }

    async fn run(script: &str, input: Option<&str>, limit_ms: u64) -> (Execution, Duration) {
        let r = ProcessRunner::new(Duration::from_millis(limit_ms));
        let cwd = std::env::temp_dir();
        dbg!(r.run(&sh(script), &cwd, input.map(str::as_bytes)).await).unwrap()
    }

    #[tokio::test]
    async fn should_capture_stdout_and_stderr() {
        let (exec, _) = run(r#"read x; echo "got $x"; echo warn >&2"#, Some("42\n"), 3000).await;
        assert_eq!(
            exec,
            Execution::Finished(ProcessOutput {
                status: Some(0),
                stdout: "got 42\n".into(),
                stderr: "warn\n".into(),
                discarded_bytes: 0,
            })
        );
    }

    #[tokio::test]
    async fn should_report_nonzero_exit() {
        let (exec, _) = run("echo oops >&2; exit 3", None, 3000).await;
        let Execution::Finished(out) = exec else {
            panic!("expected the process to finish")
        };
        assert_eq!(out.status, Some(3));
        assert!(!out.success());
        assert_eq!(out.combined(), "oops\n");
    }

    #[tokio::test]
    async fn should_tolerate_unread_input() {
        let big = "x\n".repeat(1 << 20);
        let (exec, _) = run("echo done", Some(&big), 3000).await;
        let Execution::Finished(out) = exec else {
            panic!("expected the process to finish")
        };
        assert!(out.success());
        assert_eq!(out.stdout, "done\n");
    }

    #[tokio::test]
    async fn should_time_out_and_kill() {
        let dir = tempfile::tempdir().unwrap();
        let marker = dir.path().join("still-alive");
        let script = format!("sleep 1; touch '{}'", marker.display());

        let (exec, elapsed) = run(&script, None, 200).await;
        assert_eq!(exec, Execution::TimedOut);
        assert!(elapsed < Duration::from_millis(1000));

        // The shell and its `sleep` child were both killed, so the marker never appears.
        tokio::time::sleep(Duration::from_millis(1300)).await;
        assert!(!marker.exists());
    }

    #[tokio::test]
    async fn should_cap_captured_output() {
        let r = ProcessRunner::new(Duration::from_secs(5)).with_capture_limit(1000);
        let argv = sh("head -c 200000 /dev/zero | tr '\\0' x; echo err >&2");
        let (exec, _) = r.run(&argv, &std::env::temp_dir(), None).await.unwrap();
        let Execution::Finished(out) = exec else {
            panic!("expected the process to finish")
        };
        assert!(out.success());
        assert_eq!(out.stdout, "x".repeat(1000));
        assert_eq!(out.stderr, "err\n");
        assert_eq!(out.discarded_bytes, 199_000);
        assert!(out.is_truncated());
    }

    #[tokio::test]
    async fn endless_output_is_drained_until_timeout() {
        let r = ProcessRunner::new(Duration::from_millis(500)).with_capture_limit(64);
        let argv = sh("while :; do echo 'Enter a number:'; done");
        let (exec, elapsed) = r.run(&argv, &std::env::temp_dir(), None).await.unwrap();
        assert_eq!(exec, Execution::TimedOut);
        assert!(elapsed < Duration::from_secs(3));
    }

    #[tokio::test]
    async fn should_report_missing_command() {
        let r = ProcessRunner::default();
        let argv = vec!["surely-not-an-installed-command-42".to_owned()];
        let err = r.run(&argv, &std::env::temp_dir(), None).await.unwrap_err();
        assert!(matches!(err, ExecError::CommandNotFound(ref p) if p == &argv[0]));
    }

    #[tokio::test]
    async fn should_reject_empty_command() {
        let r = ProcessRunner::default();
        let err = r.run(&[], &std::env::temp_dir(), None).await.unwrap_err();
        assert!(matches!(err, ExecError::EmptyCommand));
    }
}
