//! Command execution with timeouts and bounded output.

use std::io::{ErrorKind, Read};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, error, instrument, warn};
use wait_timeout::ChildExt;

use crate::core::types::ExecutionResult;

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(30 * 60);
pub const DEFAULT_OUTPUT_LIMIT_BYTES: usize = 1_000_000;

/// Exit code reported when the program could not be found.
pub const EXIT_NOT_FOUND: i32 = 127;
/// Exit code reported when the program exists but is not executable.
pub const EXIT_NOT_EXECUTABLE: i32 = 126;
/// Exit code reported when the command was killed after its timeout.
pub const EXIT_TIMED_OUT: i32 = 124;

/// Characters that make whitespace tokenization meaningless.
const SHELL_METACHARACTERS: &[char] = &[
    '|', '&', ';', '<', '>', '(', ')', '$', '`', '\'', '"', '\\', '*', '?', '[', ']', '~', '{',
    '}', '#', '\n',
];

/// Abstraction over command execution so the engine can be tested without
/// spawning processes.
pub trait CommandRunner {
    /// Execute `command` to completion.
    ///
    /// Non-zero exits and missing programs are encoded in the returned result;
    /// `Err` means a process could not be started at all.
    fn run(&self, command: &str) -> Result<ExecutionResult>;
}

/// Runs commands on the host, tokenized or through `sh -c`.
#[derive(Debug, Clone)]
pub struct HostRunner {
    pub timeout: Duration,
    pub output_limit_bytes: usize,
}

impl Default for HostRunner {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_COMMAND_TIMEOUT,
            output_limit_bytes: DEFAULT_OUTPUT_LIMIT_BYTES,
        }
    }
}

impl CommandRunner for HostRunner {
    #[instrument(skip_all, fields(command = command, timeout_secs = self.timeout.as_secs()))]
    fn run(&self, command: &str) -> Result<ExecutionResult> {
        let (program, cmd) = build_command(command);

        debug!("spawning child process");
        let child = match spawn_piped(cmd) {
            Ok(child) => child,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                debug!(program = %program, "program not found");
                return Ok(ExecutionResult::new(
                    command,
                    EXIT_NOT_FOUND,
                    "",
                    format!("{program}: command not found\n"),
                ));
            }
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                debug!(program = %program, "program not executable");
                return Ok(ExecutionResult::new(
                    command,
                    EXIT_NOT_EXECUTABLE,
                    "",
                    format!("{program}: Permission denied\n"),
                ));
            }
            Err(e) => {
                error!(err = %e, "failed to spawn command");
                return Err(e).with_context(|| format!("spawn `{program}`"));
            }
        };

        let output = collect_with_timeout(child, self.timeout, self.output_limit_bytes)?;
        let mut stderr = String::from_utf8_lossy(&output.stderr).into_owned();
        let exit_code = if output.timed_out {
            stderr.push_str(&format!(
                "\n[command timed out after {}s]\n",
                self.timeout.as_secs()
            ));
            EXIT_TIMED_OUT
        } else {
            exit_code_of(output.status)
        };

        Ok(ExecutionResult::new(
            command,
            exit_code,
            String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr,
        ))
    }
}

/// Build the process for `command`, returning the program name for messages.
///
/// Plain words are split on whitespace and executed directly; anything using
/// shell syntax is handed to `sh -c`.
pub fn build_command(command: &str) -> (String, Command) {
    let words: Vec<&str> = command.split_whitespace().collect();
    if words.is_empty() || command.contains(SHELL_METACHARACTERS) {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        return ("sh".to_string(), cmd);
    }
    let mut cmd = Command::new(words[0]);
    cmd.args(&words[1..]);
    (words[0].to_string(), cmd)
}

fn spawn_piped(mut cmd: Command) -> std::io::Result<Child> {
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        cmd.process_group(0);
    }
    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
}

fn exit_code_of(status: ExitStatus) -> i32 {
    // Killed by a signal: no code, report a generic failure.
    status.code().unwrap_or(1)
}

/// Captured child process output.
#[derive(Debug)]
struct CommandOutput {
    status: ExitStatus,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
    timed_out: bool,
}

/// Wait for `child` with a timeout, draining stdout/stderr concurrently so the
/// child never blocks on a full pipe. Bytes beyond `output_limit_bytes` are
/// discarded.
fn collect_with_timeout(
    mut child: Child,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;

    let stdout_handle = thread::spawn(move || read_stream_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || read_stream_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(
                timeout_secs = timeout.as_secs(),
                "command timed out, killing"
            );
            timed_out = true;
            kill_process_group(&mut child)?;
            child.wait().context("wait command after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_output(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_output(stderr_handle).context("join stderr")?;

    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "output truncated");
    }

    debug!(exit_code = ?status.code(), timed_out, "command finished");
    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        timed_out,
    })
}

/// Kill the child and everything it spawned.
///
/// The child leads its own process group, so shell-mode grandchildren holding
/// the output pipes die with it.
#[cfg(unix)]
fn kill_process_group(child: &mut Child) -> Result<()> {
    let group = format!("-{}", child.id());
    let killed = Command::new("kill")
        .args(["-KILL", "--", &group])
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false);
    if !killed {
        debug!(pid = child.id(), "process group kill failed, killing child only");
        child.kill().context("kill command")?;
    }
    Ok(())
}

#[cfg(not(unix))]
fn kill_process_group(child: &mut Child) -> Result<()> {
    child.kill().context("kill command")
}

fn join_output(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    match handle.join() {
        Ok(result) => result,
        Err(_) => Err(anyhow!("output reader thread panicked")),
    }
}

fn read_stream_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut buf = Vec::new();
    let mut truncated = 0usize;
    let mut chunk = [0u8; 8192];

    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let remaining = limit.saturating_sub(buf.len());
        if remaining > 0 {
            let keep = n.min(remaining);
            buf.extend_from_slice(&chunk[..keep]);
            truncated += n.saturating_sub(keep);
        } else {
            truncated += n;
        }
    }

    Ok((buf, truncated))
}
