//! External tool invocation.
//!
//! Every Packer and Vagrant call goes through [`CommandRunner`], which lets
//! the pipeline be driven by a recording fake in tests.

use std::fmt;
use std::path::PathBuf;
use std::process::Stdio;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::error::VmAgentError;
use crate::logging::{self, ToolLogger};

/// A single external tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    pub program: String,
    pub args: Vec<String>,
    /// Short label such as `packer-build`, used for log file names.
    pub action: String,
    secrets: Vec<String>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            action: action.into(),
            secrets: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Hide `value` when it is a whole argument or the value of a
    /// `key=value` argument in the displayed command line.
    pub fn secret(mut self, value: impl Into<String>) -> Self {
        let value = value.into();
        if !value.is_empty() {
            self.secrets.push(value);
        }
        self
    }
}

impl fmt::Display for ToolCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.program)?;
        for arg in &self.args {
            write!(f, " {}", self.masked(arg))?;
        }
        Ok(())
    }
}

impl ToolCommand {
    /// An argument equal to a secret, or a `key=<secret>` assignment, with
    /// the secret value hidden. Anything else is shown as is.
    fn masked<'a>(&self, arg: &'a str) -> std::borrow::Cow<'a, str> {
        for secret in &self.secrets {
            if arg == secret.as_str() {
                return "****".into();
            }
            match arg.split_once('=') {
                Some((key, value)) if value == secret.as_str() => {
                    return format!("{key}=****").into();
                }
                _ => {}
            }
        }
        arg.into()
    }
}

/// Result of a finished tool invocation. Exit status is informational only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
    pub stdout: String,
}

impl CommandOutcome {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

#[allow(async_fn_in_trait)] // trait is internal-only
pub trait CommandRunner {
    /// Run `cmd` to completion, passing each stdout/stderr line to `on_line`.
    ///
    /// Only a failure to start the process is an error.
    async fn run(
        &self,
        cmd: &ToolCommand,
        on_line: &(dyn Fn(&str) + Sync),
    ) -> Result<CommandOutcome, VmAgentError>;
}

/// Runs tools as real subprocesses, capturing their output to log files.
pub struct SystemRunner {
    logs_dir: Option<PathBuf>,
}

impl SystemRunner {
    pub fn new(logs_dir: Option<PathBuf>) -> Self {
        Self { logs_dir }
    }

    fn open_log(&self, action: &str) -> Option<ToolLogger> {
        let dir = self.logs_dir.as_ref()?;
        match ToolLogger::new(dir, action) {
            Ok(log) => Some(log),
            Err(e) => {
                tracing::warn!(action, "could not create tool log: {e}");
                None
            }
        }
    }
}

impl CommandRunner for SystemRunner {
    async fn run(
        &self,
        cmd: &ToolCommand,
        on_line: &(dyn Fn(&str) + Sync),
    ) -> Result<CommandOutcome, VmAgentError> {
        tracing::info!(command = %cmd, "running");

        let mut child = tokio::process::Command::new(&cmd.program)
            .args(&cmd.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| VmAgentError::Spawn {
                command: cmd.program.clone(),
                source,
            })?;

        let mut log = self.open_log(&cmd.action);
        let mut stdout = String::new();

        // both pipes were requested above
        let mut out_lines = child.stdout.take().map(|s| BufReader::new(s).lines());
        let mut err_lines = child.stderr.take().map(|s| BufReader::new(s).lines());

        while out_lines.is_some() || err_lines.is_some() {
            tokio::select! {
                line = next_line(&mut out_lines), if out_lines.is_some() => match line {
                    Some(line) => {
                        stdout.push_str(&line);
                        stdout.push('\n');
                        emit(&line, &mut log, on_line);
                    }
                    None => out_lines = None,
                },
                line = next_line(&mut err_lines), if err_lines.is_some() => match line {
                    Some(line) => emit(&line, &mut log, on_line),
                    None => err_lines = None,
                },
            }
        }

        let status = child.wait().await.map_err(|source| VmAgentError::Io {
            context: format!("waiting for {}", cmd.program),
            source,
        })?;
        let outcome = CommandOutcome {
            code: status.code(),
            stdout,
        };

        if let Some(log) = log {
            let path = log.finish(outcome.success());
            tracing::debug!(path = %path.display(), "tool output saved");
            if let Some(dir) = &self.logs_dir {
                logging::rotate_logs(dir, &cmd.action, logging::KEEP_TOOL_LOGS);
            }
        }

        Ok(outcome)
    }
}

type Lines<R> = tokio::io::Lines<BufReader<R>>;

/// Next line from an optional reader; read errors end the stream.
async fn next_line<R>(lines: &mut Option<Lines<R>>) -> Option<String>
where
    R: tokio::io::AsyncRead + Unpin,
{
    match lines {
        Some(lines) => lines.next_line().await.ok().flatten(),
        None => None,
    }
}

fn emit(line: &str, log: &mut Option<ToolLogger>, on_line: &(dyn Fn(&str) + Sync)) {
    tracing::debug!(target: "vmagent::tool", "{line}");
    if let Some(log) = log {
        log.write_line(line);
    }
    on_line(line);
}
