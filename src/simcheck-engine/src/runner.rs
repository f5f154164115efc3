// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use simcheck_core::{Error, ErrorCode, ErrorKind, Result};

/// One external command, run to completion in `cwd`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Invocation {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    /// Output of the command is appended here.
    pub log: PathBuf,
}

impl Invocation {
    pub fn command_line(&self) -> String {
        let mut parts = vec![self.program.display().to_string()];
        parts.extend(self.args.iter().cloned());
        parts.join(" ")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct RunExit {
    /// `None` when the process was killed by a signal.
    pub code: Option<i32>,
}

impl RunExit {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs the simulation and its preparation steps.
pub trait SimulationRunner {
    /// Block until `invocation` exits, passing every line it prints on
    /// stdout to `on_line` as it arrives.
    fn run(&mut self, invocation: &Invocation, on_line: &mut dyn FnMut(&str)) -> Result<RunExit>;
}

/// Runs invocations as child processes, teeing their output into the log.
#[derive(Debug, Default)]
pub struct ProcessRunner;

fn spawn_error(invocation: &Invocation, err: std::io::Error) -> Error {
    Error::new(
        ErrorKind::Process,
        ErrorCode::ExternalProcessFailure,
        Some(format!(
            "could not start `{}`: {err}",
            invocation.command_line()
        )),
    )
}

/// Copy `output` line by line into `log`, handing each line to `on_line`.
fn tee<R: BufRead, W: Write>(
    mut output: R,
    log: &mut W,
    on_line: &mut dyn FnMut(&str),
) -> Result<()> {
    let mut buf = vec![];
    loop {
        buf.clear();
        if output.read_until(b'\n', &mut buf)? == 0 {
            return Ok(());
        }
        log.write_all(&buf)?;
        let line = String::from_utf8_lossy(&buf);
        on_line(line.trim_end_matches(['\n', '\r']));
    }
}

impl SimulationRunner for ProcessRunner {
    fn run(&mut self, invocation: &Invocation, on_line: &mut dyn FnMut(&str)) -> Result<RunExit> {
        let mut log: File = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&invocation.log)
            .map_err(|err| Error::from(err).context(invocation.log.display()))?;
        let stderr = log.try_clone()?;

        tracing::debug!(
            command = %invocation.command_line(),
            cwd = %invocation.cwd.display(),
            "spawning"
        );
        let mut child = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::from(stderr))
            .spawn()
            .map_err(|err| spawn_error(invocation, err))?;

        let drained = match child.stdout.take() {
            Some(stdout) => tee(BufReader::new(stdout), &mut log, on_line),
            None => Ok(()),
        };
        if let Err(err) = drained {
            tracing::warn!(command = %invocation.command_line(), "killing after output error");
            let _ = child.kill();
            let _ = child.wait();
            return Err(err);
        }

        let status = match child.wait() {
            Ok(status) => status,
            Err(err) => {
                let _ = child.kill();
                return Err(err.into());
            }
        };
        log.flush()?;
        Ok(RunExit {
            code: status.code(),
        })
    }
}
