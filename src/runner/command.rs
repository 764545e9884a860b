// Copyright (c) 2025 Steve Wagner (ciroque@live.com)
// SPDX-License-Identifier: MIT

use std::ffi::{OsStr, OsString};
use std::io::Write;
use std::process::Stdio;

use tokio::process::Command;

use crate::config::ExecOptions;
use crate::errors::CommandError;
use crate::observability::messages::command::{ToolInvoked, ToolStderr};
use crate::observability::messages::StructuredLog;

/// Result of one external tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandOutcome {
    status: Option<i32>,
    skipped: bool,
}

impl CommandOutcome {
    fn not_run() -> Self {
        CommandOutcome {
            status: None,
            skipped: true,
        }
    }

    fn from_status(status: std::process::ExitStatus) -> Self {
        CommandOutcome {
            status: status.code(),
            skipped: false,
        }
    }

    /// Exit code, or `None` when the process was terminated by a signal or
    /// the invocation was skipped.
    pub fn status(&self) -> Option<i32> {
        self.status
    }

    /// Whether the invocation was skipped (dry run or interactive decline).
    pub fn skipped(&self) -> bool {
        self.skipped
    }

    /// Skipped invocations count as success so that dry runs walk the whole
    /// pipeline.
    pub fn success(&self) -> bool {
        self.skipped || self.status == Some(0)
    }
}

/// One external tool invocation: program, arguments, environment overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolCommand {
    program: String,
    args: Vec<OsString>,
    env: Vec<(String, String)>,
}

impl ToolCommand {
    pub fn new(program: impl Into<String>) -> Self {
        ToolCommand {
            program: program.into(),
            args: Vec::new(),
            env: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.args.push(arg.as_ref().to_os_string());
        }
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments as lossy strings, mainly for tests and display.
    pub fn argv(&self) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.to_string_lossy().into_owned())
            .collect()
    }

    /// Shell-style rendering of the whole invocation.
    pub fn command_line(&self) -> String {
        let mut line = self.program.clone();
        for arg in &self.args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }

    /// Spawn the tool and wait for it synchronously.
    ///
    /// Modes, in order of precedence:
    /// - `echo`: print the command line and report success without spawning.
    /// - `interactive`: prompt on stdin; a reply of `n` skips the command.
    /// - `verbose`: announce the command before executing.
    /// - `suppress`: capture stdout/stderr instead of inheriting; captured
    ///   stderr is logged.
    ///
    /// Children are spawned with kill-on-drop, so a task aborted mid-wait
    /// takes its external process down with it.
    pub async fn run(&self, options: &ExecOptions) -> Result<CommandOutcome, CommandError> {
        if options.echo {
            println!("{}", self.command_line());
            return Ok(CommandOutcome::not_run());
        }
        if options.interactive && !self.confirm() {
            return Ok(CommandOutcome::not_run());
        }
        if options.verbose {
            ToolInvoked {
                command_line: &self.command_line(),
            }
            .log();
        }

        let mut command = Command::new(&self.program);
        command.args(&self.args);
        for (key, value) in options.env.iter().chain(self.env.iter()) {
            command.env(key, value);
        }
        command.stdin(Stdio::null());
        command.kill_on_drop(true);

        if options.suppress {
            command.stdout(Stdio::piped());
            command.stderr(Stdio::piped());
            let child = command.spawn().map_err(|err| self.classify_spawn(err))?;
            let output = child.wait_with_output().await?;
            if !output.stderr.is_empty() {
                ToolStderr {
                    tool: &self.program,
                    stderr: &String::from_utf8_lossy(&output.stderr),
                }
                .log();
            }
            Ok(CommandOutcome::from_status(output.status))
        } else {
            let mut child = command.spawn().map_err(|err| self.classify_spawn(err))?;
            let status = child.wait().await?;
            Ok(CommandOutcome::from_status(status))
        }
    }

    fn classify_spawn(&self, err: std::io::Error) -> CommandError {
        if err.kind() == std::io::ErrorKind::NotFound {
            CommandError::MissingTool {
                tool: self.program.clone(),
            }
        } else {
            CommandError::Spawn {
                tool: self.program.clone(),
                source: err,
            }
        }
    }

    /// Interactive confirmation. Reading stdin blocks the worker, which is
    /// fine: interactive mode forces a single worker.
    fn confirm(&self) -> bool {
        print!("About to run: {}\n  Type n to skip: ", self.command_line());
        let _ = std::io::stdout().flush();
        let mut reply = String::new();
        if std::io::stdin().read_line(&mut reply).is_err() {
            return true;
        }
        reply.trim() != "n"
    }
}
