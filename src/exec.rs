//! External command steps.
//!
//! Every side effect of the render path goes through an external tool:
//! the stream editor, the calendar renderer, the file opener, and the
//! version-control commands. Each invocation is a named [`Step`] run
//! sequentially, one child process at a time.
//!
//! Steps declare their contract up front (program, arguments, working
//! directory, whether stdout is captured), so tests can substitute fake
//! executables and assert call order and arguments without real
//! rendering or VCS side effects.

use anyhow::{Context, Result};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

/// Resolve a configured command name to an executable path.
///
/// Names are looked up in PATH; absolute paths pass through untouched.
pub fn resolve(name: &str) -> Result<PathBuf> {
    which::which(name).with_context(|| {
        format!(
            "Command '{}' not found. Install it or point [commands] in config.toml at it",
            name
        )
    })
}

/// One invocation of an external tool.
pub struct Step {
    name: &'static str,
    program: PathBuf,
    args: Vec<OsString>,
    dir: Option<PathBuf>,
    benign_failure: bool,
}

impl Step {
    pub fn new(name: &'static str, program: impl Into<PathBuf>) -> Self {
        Self {
            name,
            program: program.into(),
            args: Vec::new(),
            dir: None,
            benign_failure: false,
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

    /// Run the step inside `dir` instead of the current directory.
    pub fn current_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.dir = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Mark a non-zero exit as expected (e.g. a commit with nothing staged).
    pub fn benign_failure(mut self) -> Self {
        self.benign_failure = true;
        self
    }

    fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args);
        if let Some(dir) = &self.dir {
            cmd.current_dir(dir);
        }
        cmd
    }

    /// Run the step and capture its stdout. Stderr stays on the terminal.
    pub async fn capture(self) -> Result<Vec<u8>> {
        let output = self
            .command()
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .output()
            .await
            .with_context(|| {
                format!("Failed to spawn {} ({})", self.name, self.program.display())
            })?;

        if !output.status.success() {
            anyhow::bail!(
                "{} exited with status: {}",
                self.name,
                output.status.code().unwrap_or(-1)
            );
        }

        Ok(output.stdout)
    }

    /// Run the step with inherited stdio and wait for it to finish.
    pub async fn run(self) -> Result<()> {
        let status = self
            .command()
            .status()
            .await
            .with_context(|| {
                format!("Failed to spawn {} ({})", self.name, self.program.display())
            })?;

        if !status.success() {
            if self.benign_failure {
                println!("  {} exited with status {} (ignored)", self.name, status.code().unwrap_or(-1));
                return Ok(());
            }
            anyhow::bail!(
                "{} exited with status: {}",
                self.name,
                status.code().unwrap_or(-1)
            );
        }

        Ok(())
    }
}
