use std::fmt;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::mpsc;

use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::log_sanitize::sanitize_log_line;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StdioMode {
    /// Output is piped and forwarded to the log line by line.
    Captured,
    /// The child owns the terminal (editors, prompts).
    Interactive,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    pub cwd: Option<PathBuf>,
    pub stdio: StdioMode,
}

impl CommandSpec {
    /// Build from a configured command vector (`["python3", "script.py"]`) plus extra args.
    pub fn from_argv<I, S>(argv: &[String], extra: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let Some((program, rest)) = argv.split_first() else {
            return Err(Error::msg("empty command"));
        };
        let mut args = rest.to_vec();
        args.extend(extra.into_iter().map(Into::into));
        Ok(Self {
            program: program.clone(),
            args,
            cwd: None,
            stdio: StdioMode::Captured,
        })
    }

    pub fn in_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn interactive(mut self) -> Self {
        self.stdio = StdioMode::Interactive;
        self
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for a in &self.args {
            if a.is_empty() || a.contains(char::is_whitespace) {
                write!(f, " '{a}'")?;
            } else {
                write!(f, " {a}")?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunStatus {
    pub code: Option<i32>,
}

impl RunStatus {
    pub fn exited(code: i32) -> Self {
        Self { code: Some(code) }
    }

    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

impl fmt::Display for RunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(c) => write!(f, "exit code {c}"),
            None => write!(f, "terminated by signal"),
        }
    }
}

/// Exit status plus stdout of a command whose output is parsed rather than logged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOutput {
    pub status: RunStatus,
    pub stdout: String,
}

/// Seam for every external collaborator (merge evaluator, editor, generator,
/// provisioning script, build tools, endpoint lookup).
pub trait ProcessRunner {
    fn run(&self, cmd: &CommandSpec) -> Result<RunStatus>;

    /// Run to completion and hand back stdout; stderr still goes to the log.
    fn output(&self, cmd: &CommandSpec) -> Result<CommandOutput>;
}

pub fn ensure_success(step: &str, status: RunStatus) -> Result<()> {
    if status.success() {
        Ok(())
    } else {
        Err(Error::step_failed(step, status))
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ProcessRunner for SystemRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunStatus> {
        info!(command = %spec, "running");
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args);
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }

        let status = match spec.stdio {
            StdioMode::Interactive => cmd
                .status()
                .map_err(|e| Error::msg(format!("failed to start '{}': {e}", spec.program)))?,
            StdioMode::Captured => {
                let mut child = cmd
                    .stdin(Stdio::null())
                    .stdout(Stdio::piped())
                    .stderr(Stdio::piped())
                    .spawn()
                    .map_err(|e| Error::msg(format!("failed to start '{}': {e}", spec.program)))?;

                let (tx, rx) = mpsc::channel::<String>();
                if let Some(out) = child.stdout.take() {
                    let tx = tx.clone();
                    std::thread::spawn(move || forward_lines(out, tx));
                }
                if let Some(err) = child.stderr.take() {
                    let tx = tx.clone();
                    std::thread::spawn(move || forward_lines(err, tx));
                }
                drop(tx);

                for line in rx {
                    let line = sanitize_log_line(&line);
                    if !line.is_empty() {
                        info!(target: "boardcfg::child", "[{}] {line}", spec.program);
                    }
                }

                child
                    .wait()
                    .map_err(|e| Error::msg(format!("wait for '{}' failed: {e}", spec.program)))?
            }
        };

        let status = RunStatus {
            code: status.code(),
        };
        debug!(command = %spec, %status, "finished");
        Ok(status)
    }

    fn output(&self, spec: &CommandSpec) -> Result<CommandOutput> {
        info!(command = %spec, "running");
        let mut cmd = Command::new(&spec.program);
        cmd.args(&spec.args).stdin(Stdio::null());
        if let Some(dir) = &spec.cwd {
            cmd.current_dir(dir);
        }
        let out = cmd
            .output()
            .map_err(|e| Error::msg(format!("failed to start '{}': {e}", spec.program)))?;

        for line in String::from_utf8_lossy(&out.stderr).lines() {
            let line = sanitize_log_line(line);
            if !line.is_empty() {
                info!(target: "boardcfg::child", "[{}] {line}", spec.program);
            }
        }
        let status = RunStatus {
            code: out.status.code(),
        };
        debug!(command = %spec, %status, "finished");
        Ok(CommandOutput {
            status,
            stdout: String::from_utf8_lossy(&out.stdout).into_owned(),
        })
    }
}

fn forward_lines<R: Read>(stream: R, tx: mpsc::Sender<String>) {
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else {
            break;
        };
        if tx.send(line).is_err() {
            break;
        }
    }
}
