// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::path::Path;

use simcheck_core::Error;

use crate::orchestrator::{Phase, PhaseStatus, RunState};
use crate::verify::FileVerdict;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum Verbosity {
    Quiet,
    #[default]
    Normal,
    /// Also echo every line the model prints.
    Verbose,
}

/// Something a user following a test run wants to know about.
#[derive(Debug)]
pub enum Event<'a> {
    Transition {
        test: &'a str,
        state: RunState,
    },
    Command {
        phase: Phase,
        command: &'a str,
    },
    Progress {
        phase: Phase,
        percent: u32,
    },
    Output {
        line: &'a str,
    },
    CheckpointCopied {
        from: &'a Path,
        to: &'a Path,
    },
    FileVerified {
        phase: Phase,
        verdict: &'a FileVerdict,
    },
    FileFailed {
        phase: Phase,
        file: &'a str,
        error: &'a Error,
    },
    PhaseFinished {
        status: &'a PhaseStatus,
    },
}

pub trait Reporter {
    fn report(&mut self, event: &Event<'_>);
}

#[derive(Debug, Default)]
pub struct NullReporter;

impl Reporter for NullReporter {
    fn report(&mut self, _event: &Event<'_>) {}
}

/// Emits events as `tracing` events, filtered by an explicit verbosity.
#[derive(Debug, Default)]
pub struct TracingReporter {
    verbosity: Verbosity,
}

impl TracingReporter {
    pub fn new(verbosity: Verbosity) -> Self {
        TracingReporter { verbosity }
    }

    fn normal(&self) -> bool {
        self.verbosity >= Verbosity::Normal
    }
}

impl Reporter for TracingReporter {
    fn report(&mut self, event: &Event<'_>) {
        match *event {
            Event::Transition { test, state } => {
                if self.normal() {
                    tracing::info!(test, state = ?state, "state");
                }
            }
            Event::Command { phase, command } => {
                tracing::debug!(phase = %phase, command, "running");
            }
            Event::Progress { phase, percent } => {
                if self.normal() {
                    tracing::info!(phase = %phase, "{percent}% complete");
                }
            }
            Event::Output { line } => {
                if self.verbosity == Verbosity::Verbose {
                    tracing::debug!("{line}");
                }
            }
            Event::CheckpointCopied { from, to } => {
                if self.normal() {
                    tracing::info!(
                        from = %from.display(),
                        to = %to.display(),
                        "copied hot start file"
                    );
                }
            }
            Event::FileVerified { phase, verdict } => {
                if verdict.passed {
                    if self.normal() {
                        tracing::info!(phase = %phase, file = %verdict.file_name, "passed");
                    }
                } else {
                    for (field, diff) in verdict.worst_fields() {
                        tracing::warn!(
                            phase = %phase,
                            file = %verdict.file_name,
                            field = %field,
                            max_abs_diff = diff,
                            "outside tolerance"
                        );
                    }
                }
            }
            Event::FileFailed { phase, file, error } => {
                tracing::error!(phase = %phase, file, "{error}");
            }
            Event::PhaseFinished { status } => {
                if status.passed {
                    if self.normal() {
                        tracing::info!(phase = %status.phase, "phase passed");
                    }
                } else if let Some(ref error) = status.error {
                    tracing::error!(phase = %status.phase, "phase aborted: {error}");
                } else {
                    tracing::error!(
                        phase = %status.phase,
                        failed_files = ?status.failed_files,
                        "phase failed"
                    );
                }
            }
        }
    }
}
