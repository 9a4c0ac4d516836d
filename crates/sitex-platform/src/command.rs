use std::ffi::OsStr;
use std::process::{Command as StdCommand, Output, Stdio};

use crate::error::{Error, Result};

/// A process launched directly, never through a shell. Every argument is
/// passed to the program as-is, so none of them needs quoting.
#[derive(Debug)]
pub struct Command {
    inner: StdCommand,
    program: String,
}

impl Command {
    pub fn new(program: impl AsRef<OsStr>) -> Self {
        let program = program.as_ref();
        let mut inner = StdCommand::new(program);
        inner.stdin(Stdio::null());
        Self {
            inner,
            program: program.to_string_lossy().into_owned(),
        }
    }

    pub fn arg(mut self, arg: impl AsRef<OsStr>) -> Self {
        self.inner.arg(arg);
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        self.inner.args(args);
        self
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run to completion, capturing stdout and stderr.
    pub fn output(mut self) -> Result<Output> {
        self.inner.output().map_err(|e| Error::CommandFailed {
            cmd: self.program.clone(),
            source: e,
        })
    }
}

/// Stdout followed by stderr, lossily decoded.
pub fn combined_output(output: &Output) -> String {
    let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
    text.push_str(&String::from_utf8_lossy(&output.stderr));
    text
}
