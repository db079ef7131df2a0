//! External build-tool process wrapper.
//!
//! Exposes a child's stdout as an ordered line stream, its exit code, and a
//! force-kill. The line stream can be taken exactly once, so two consumers
//! can never attach to the same process.
use crate::error::{HarnessError, Result};
use crate::lines::LossyLines;
use crate::poll::SharedBuffer;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Instant;
use tokio::io::BufReader;
use tokio::process::{Child, ChildStdout, Command};

pub type LineStream = LossyLines<BufReader<ChildStdout>>;

/// A build-tool invocation: `program args... -Dkey=value...` in `cwd`.
#[derive(Debug, Clone)]
pub struct BuildCommand {
    program: PathBuf,
    args: Vec<String>,
    properties: BTreeMap<String, String>,
    cwd: PathBuf,
}

impl BuildCommand {
    pub fn new(program: impl Into<PathBuf>, cwd: &Path) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            properties: BTreeMap::new(),
            cwd: cwd.to_path_buf(),
        }
    }

    /// Parse a shell-style command line (`sh gen.sh --flag`) into program + args.
    pub fn from_command_line(command_line: &str, cwd: &Path) -> anyhow::Result<Self> {
        let words = shell_words::split(command_line)
            .map_err(|err| anyhow::anyhow!("parse command {command_line:?}: {err}"))?;
        let Some((program, args)) = words.split_first() else {
            return Err(anyhow::anyhow!("command is empty"));
        };
        Ok(Self::new(program, cwd).args(args.iter().cloned()))
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args(mut self, args: impl IntoIterator<Item = String>) -> Self {
        self.args.extend(args);
        self
    }

    pub fn property(mut self, key: &str, value: &str) -> Self {
        self.properties.insert(key.to_string(), value.to_string());
        self
    }

    /// Look the program up on `PATH` if it is a bare name.
    pub fn resolve(mut self) -> anyhow::Result<Self> {
        let program = self
            .program
            .to_str()
            .ok_or_else(|| anyhow::anyhow!("program path is not valid UTF-8"))?;
        self.program = resolve_program(program)?;
        Ok(self)
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Full argument vector, properties last.
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.extend(
            self.properties
                .iter()
                .map(|(key, value)| format!("-D{key}={value}")),
        );
        argv
    }

    /// Shell-style rendering for logs. Plain words such as `-Dkey=value`
    /// are left unquoted.
    pub fn display(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.argv());
        parts
            .iter()
            .map(String::as_str)
            .map(display_word)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn display_word(word: &str) -> String {
    let plain = !word.is_empty()
        && word
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./=:,+@%".contains(c));
    if plain {
        word.to_string()
    } else {
        shell_words::quote(word).into_owned()
    }
}

#[derive(Debug)]
pub struct BuildProcess {
    label: String,
    child: Child,
    stdout: Option<LineStream>,
    started: Instant,
    exit_code: Option<i32>,
}

impl BuildProcess {
    pub fn spawn(command: &BuildCommand) -> Result<Self> {
        let mut cmd = Command::new(command.program());
        cmd.args(command.argv())
            .current_dir(&command.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        let mut child = cmd.spawn().map_err(|source| HarnessError::Spawn {
            program: command.program().display().to_string(),
            source,
        })?;

        let label = command.display();
        if let Some(stderr) = child.stderr.take() {
            let label = label.clone();
            tokio::spawn(async move {
                let mut lines = LossyLines::new(BufReader::new(stderr));
                while let Ok(Some(line)) = lines.next_line().await {
                    tracing::debug!(target: "build", command = %label, "{line}");
                }
            });
        }
        let stdout = child
            .stdout
            .take()
            .map(|out| LossyLines::new(BufReader::new(out)));
        tracing::info!(command = %label, pid = child.id(), "spawned");

        Ok(Self {
            label,
            child,
            stdout,
            started: Instant::now(),
            exit_code: None,
        })
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Take the stdout line stream. `None` after the first call.
    pub fn take_lines(&mut self) -> Option<LineStream> {
        self.stdout.take()
    }

    /// Wait for exit. Untaken stdout is drained first so the child never
    /// blocks on a full pipe. Deaths by signal map to `128 + signal`.
    pub async fn wait_for_exit(&mut self) -> Result<i32> {
        if let Some(code) = self.exit_code {
            return Ok(code);
        }
        if let Some(mut lines) = self.stdout.take() {
            while let Some(line) = lines.next_line().await? {
                tracing::debug!(target: "build", command = %self.label, "{line}");
            }
        }
        let status = self.child.wait().await?;
        let code = exit_code(&status);
        self.exit_code = Some(code);
        tracing::info!(
            command = %self.label,
            code,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "exited"
        );
        Ok(code)
    }

    pub fn is_running(&mut self) -> bool {
        matches!(self.child.try_wait(), Ok(None))
    }

    /// Kill the child if it is still running and reap it.
    pub async fn force_kill(&mut self) -> Result<()> {
        if !self.is_running() {
            return Ok(());
        }
        tracing::debug!(command = %self.label, "force kill");
        self.child.kill().await?;
        Ok(())
    }
}

#[cfg(unix)]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(-1)
}

#[cfg(not(unix))]
fn exit_code(status: &std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(-1)
}

/// Copy every line into `buffer` until the stream ends.
pub async fn pump_lines(lines: &mut LineStream, buffer: &SharedBuffer) -> Result<()> {
    while let Some(line) = lines.next_line().await? {
        buffer.push_line(&line);
    }
    Ok(())
}

/// Log every line as build progress until the stream ends.
pub async fn echo_lines(mut lines: LineStream, label: String) {
    loop {
        match lines.next_line().await {
            Ok(Some(line)) => tracing::info!(target: "build", command = %label, "{line}"),
            Ok(None) => break,
            Err(err) => {
                tracing::debug!(target: "build", command = %label, %err, "output unreadable");
                break;
            }
        }
    }
}

/// Resolve a build tool: bare names are looked up on `PATH`.
pub fn resolve_program(program: &str) -> anyhow::Result<PathBuf> {
    let path = Path::new(program);
    if path.components().count() > 1 {
        return Ok(path.to_path_buf());
    }
    which::which(program).map_err(|err| anyhow::anyhow!("locate {program} on PATH: {err}"))
}
