// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fmt;
use std::fs::{self, File};
use std::path::{Path, PathBuf};

use serde::Serialize;

use simcheck_core::{Error, Result, artifact_err, process_err};

use crate::compare::CompareOptions;
use crate::descriptor::{PREP_EXECUTABLE, TestDescriptor, TestSuite};
use crate::progress::ProgressTracker;
use crate::report::{Event, Reporter};
use crate::runner::{Invocation, SimulationRunner};
use crate::verify::{FileVerdict, verify_file_pair};

pub const COLD_DIR: &str = "01_cs";
pub const HOT_DIR: &str = "02_hs";
pub const CONTROL_DIR: &str = "control";
pub const LOG_FILE: &str = "test.log";
pub const DEFAULT_LAUNCHER: &str = "mpirun";

/// Restart files a cold start may leave behind, in order of preference.
pub const CHECKPOINT_FILES: &[&str] = &["fort.67", "fort.68", "fort.67.nc", "fort.68.nc"];
/// Subdirectory holding rank 0's files in parallel runs.
const RANK0_DIR: &str = "PE0000";

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// The only phase of a test without a hot start.
    Single,
    Cold,
    Hot,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            Phase::Single => "single",
            Phase::Cold => "cold",
            Phase::Hot => "hot",
        };
        write!(f, "{name}")
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RunState {
    NotStarted,
    Running(Phase),
    Done(Phase),
    Finished,
}

/// An output file whose comparison could not be completed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileError {
    pub file_name: String,
    pub error: String,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PhaseStatus {
    pub phase: Phase,
    /// The model ran to a clean exit.
    pub complete: bool,
    pub passed: bool,
    pub failed_files: Vec<String>,
    pub files: Vec<FileVerdict>,
    pub file_errors: Vec<FileError>,
    /// Why the phase was aborted, if it was.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PhaseStatus {
    fn aborted(phase: Phase, err: &Error) -> Self {
        PhaseStatus {
            phase,
            complete: false,
            passed: false,
            failed_files: vec![],
            files: vec![],
            file_errors: vec![],
            error: Some(err.to_string()),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverallStatus {
    pub test: String,
    pub passed: bool,
    pub phases: Vec<PhaseStatus>,
    /// Set when the test could not be started at all.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl OverallStatus {
    fn not_started(test: &str, err: &Error) -> Self {
        OverallStatus {
            test: test.to_owned(),
            passed: false,
            phases: vec![],
            error: Some(err.to_string()),
        }
    }

    /// Names of every output file that failed, across phases.
    pub fn failed_files(&self) -> Vec<String> {
        self.phases
            .iter()
            .flat_map(|p| p.failed_files.iter().cloned())
            .collect()
    }
}

#[derive(Clone, Debug)]
pub struct RunConfig {
    pub bin_dir: PathBuf,
    pub test_root: PathBuf,
    pub compare: CompareOptions,
    /// MPI launcher used for parallel runs.
    pub launcher: String,
    pub continue_on_failure: bool,
}

impl RunConfig {
    pub fn new(bin_dir: PathBuf, test_root: PathBuf, compare: CompareOptions) -> Self {
        RunConfig {
            bin_dir,
            test_root,
            compare,
            launcher: DEFAULT_LAUNCHER.to_owned(),
            continue_on_failure: false,
        }
    }
}

fn resolve_executable(bin_dir: &Path, name: &str) -> Result<PathBuf> {
    let path = bin_dir.join(name);
    if !path.is_file() {
        return artifact_err!(format!("executable {} not found", path.display()));
    }
    Ok(path)
}

/// Locate the restart file of a finished cold start.
pub fn find_checkpoint(cold_dir: &Path) -> Option<PathBuf> {
    for dir in [cold_dir.to_path_buf(), cold_dir.join(RANK0_DIR)] {
        for name in CHECKPOINT_FILES {
            let path = dir.join(name);
            if path.is_file() {
                return Some(path);
            }
        }
    }
    None
}

/// Copy the cold start's restart file into the root of `hot_dir`.
pub fn copy_checkpoint(cold_dir: &Path, hot_dir: &Path) -> Result<(PathBuf, PathBuf)> {
    let Some(from) = find_checkpoint(cold_dir) else {
        return artifact_err!(format!(
            "no hot start file ({}) in {}",
            CHECKPOINT_FILES.join(", "),
            cold_dir.display()
        ));
    };
    let Some(name) = from.file_name() else {
        return artifact_err!(format!("bad hot start path {}", from.display()));
    };
    let to = hot_dir.join(name);
    fs::copy(&from, &to).map_err(|err| Error::from(err).context(to.display()))?;
    Ok((from, to))
}

/// One test of a suite, from executable resolution to the overall verdict.
pub struct TestRun<'a> {
    name: &'a str,
    test: &'a TestDescriptor,
    config: &'a RunConfig,
    dir: PathBuf,
    executable: PathBuf,
    prep: Option<PathBuf>,
    state: RunState,
}

impl<'a> TestRun<'a> {
    /// Resolve the executables and the test directory; nothing runs yet.
    pub fn new(name: &'a str, test: &'a TestDescriptor, config: &'a RunConfig) -> Result<Self> {
        let executable = resolve_executable(&config.bin_dir, test.executable())?;
        let prep = if test.parallel {
            Some(resolve_executable(&config.bin_dir, PREP_EXECUTABLE)?)
        } else {
            None
        };
        let dir = config.test_root.join(&test.path);
        if !dir.is_dir() {
            return artifact_err!(format!("test directory {} not found", dir.display()));
        }

        Ok(TestRun {
            name,
            test,
            config,
            dir,
            executable,
            prep,
            state: RunState::NotStarted,
        })
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn plan(&self) -> Vec<Phase> {
        if self.test.hotstart {
            vec![Phase::Cold, Phase::Hot]
        } else {
            vec![Phase::Single]
        }
    }

    pub fn phase_dir(&self, phase: Phase) -> PathBuf {
        match phase {
            Phase::Single => self.dir.clone(),
            Phase::Cold => self.dir.join(COLD_DIR),
            Phase::Hot => self.dir.join(HOT_DIR),
        }
    }

    /// Delete leftovers of previous runs from every phase directory. Returns
    /// how many files were removed.
    pub fn clean(&self) -> Result<usize> {
        let mut removed = 0;
        for phase in self.plan() {
            let dir = self.phase_dir(phase);
            for name in self.test.rm_files.iter().chain(self.test.output_files.iter()) {
                let path = dir.join(name);
                if path.is_file() {
                    fs::remove_file(&path)
                        .map_err(|err| Error::from(err).context(path.display()))?;
                    removed += 1;
                }
            }
        }
        tracing::debug!(test = self.name, removed, "cleaned");
        Ok(removed)
    }

    fn transition(&mut self, state: RunState, reporter: &mut dyn Reporter) {
        self.state = state;
        reporter.report(&Event::Transition {
            test: self.name,
            state,
        });
    }

    /// Run every planned phase in order. A phase that fails, for any reason,
    /// ends the test.
    pub fn run(
        &mut self,
        runner: &mut dyn SimulationRunner,
        reporter: &mut dyn Reporter,
    ) -> OverallStatus {
        let plan = self.plan();
        let mut phases: Vec<PhaseStatus> = vec![];

        for &phase in plan.iter() {
            if phase == Phase::Hot {
                match copy_checkpoint(&self.phase_dir(Phase::Cold), &self.phase_dir(Phase::Hot)) {
                    Ok((from, to)) => reporter.report(&Event::CheckpointCopied {
                        from: &from,
                        to: &to,
                    }),
                    Err(err) => {
                        let status = PhaseStatus::aborted(phase, &err);
                        reporter.report(&Event::PhaseFinished { status: &status });
                        phases.push(status);
                        break;
                    }
                }
            }

            self.transition(RunState::Running(phase), reporter);
            let status = self.run_phase(phase, runner, reporter);
            self.transition(RunState::Done(phase), reporter);
            reporter.report(&Event::PhaseFinished { status: &status });

            let passed = status.passed;
            phases.push(status);
            if !passed {
                break;
            }
        }
        self.transition(RunState::Finished, reporter);

        let passed = phases.len() == plan.len() && phases.iter().all(|p| p.passed);
        OverallStatus {
            test: self.name.to_owned(),
            passed,
            phases,
            error: None,
        }
    }

    fn run_phase(
        &self,
        phase: Phase,
        runner: &mut dyn SimulationRunner,
        reporter: &mut dyn Reporter,
    ) -> PhaseStatus {
        if let Err(err) = self.execute(phase, runner, reporter) {
            return PhaseStatus::aborted(phase, &err);
        }

        let dir = self.phase_dir(phase);
        let mut files = vec![];
        let mut file_errors = vec![];
        let mut failed_files = vec![];
        for name in self.test.output_files.iter() {
            let control = dir.join(CONTROL_DIR).join(name);
            let candidate = dir.join(name);
            match verify_output(&control, &candidate, &self.config.compare) {
                Ok(verdict) => {
                    reporter.report(&Event::FileVerified {
                        phase,
                        verdict: &verdict,
                    });
                    if !verdict.passed {
                        failed_files.push(name.clone());
                    }
                    files.push(verdict);
                }
                Err(err) => {
                    reporter.report(&Event::FileFailed {
                        phase,
                        file: name,
                        error: &err,
                    });
                    failed_files.push(name.clone());
                    file_errors.push(FileError {
                        file_name: name.clone(),
                        error: err.to_string(),
                    });
                }
            }
        }

        PhaseStatus {
            phase,
            complete: true,
            passed: failed_files.is_empty(),
            failed_files,
            files,
            file_errors,
            error: None,
        }
    }

    fn invocations(&self, phase: Phase) -> (Vec<Invocation>, Invocation) {
        let cwd = self.phase_dir(phase);
        let log = cwd.join(LOG_FILE);
        let invocation = |program: PathBuf, args: Vec<String>| Invocation {
            program,
            args,
            cwd: cwd.clone(),
            log: log.clone(),
        };

        let mut prep = vec![];
        if let Some(ref adcprep) = self.prep {
            let np = self.test.ncpu.unwrap_or(1).to_string();
            for step in ["--partmesh", "--prepall"] {
                prep.push(invocation(
                    adcprep.clone(),
                    vec!["--np".to_owned(), np.clone(), step.to_owned()],
                ));
            }
        }

        let model = if self.test.parallel {
            let mut args = vec![
                "-np".to_owned(),
                self.test.total_ranks().to_string(),
                self.executable.display().to_string(),
            ];
            if self.test.writers() > 0 {
                args.push("-W".to_owned());
                args.push(self.test.writers().to_string());
            }
            invocation(PathBuf::from(&self.config.launcher), args)
        } else {
            invocation(self.executable.clone(), vec![])
        };
        (prep, model)
    }

    fn execute(
        &self,
        phase: Phase,
        runner: &mut dyn SimulationRunner,
        reporter: &mut dyn Reporter,
    ) -> Result<()> {
        let dir = self.phase_dir(phase);
        if !dir.is_dir() {
            return artifact_err!(format!("phase directory {} not found", dir.display()));
        }
        // each phase starts a fresh log
        File::create(dir.join(LOG_FILE))?;

        let (prep, model) = self.invocations(phase);
        for step in prep.iter() {
            let command = step.command_line();
            reporter.report(&Event::Command {
                phase,
                command: &command,
            });
            let exit = runner.run(step, &mut |_| {})?;
            if !exit.success() {
                return process_err!(format!("`{command}` exited with {:?}", exit.code));
            }
        }

        let command = model.command_line();
        reporter.report(&Event::Command {
            phase,
            command: &command,
        });
        let mut progress = ProgressTracker::new();
        let exit = runner.run(&model, &mut |line| {
            reporter.report(&Event::Output { line });
            if let Some(percent) = progress.observe(line) {
                reporter.report(&Event::Progress { phase, percent });
            }
        })?;
        if let Some(percent) = progress.finish(exit.success()) {
            reporter.report(&Event::Progress { phase, percent });
        }
        if !exit.success() {
            return process_err!(format!("`{command}` exited with {:?}", exit.code));
        }
        Ok(())
    }
}

fn verify_output(control: &Path, candidate: &Path, opts: &CompareOptions) -> Result<FileVerdict> {
    for path in [control, candidate] {
        if !path.is_file() {
            return artifact_err!(format!("output file {} not found", path.display()));
        }
    }
    verify_file_pair(control, candidate, opts)
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct SuiteReport {
    pub passed: bool,
    pub tests: Vec<OverallStatus>,
}

impl SuiteReport {
    pub fn failed_tests(&self) -> Vec<&str> {
        self.tests
            .iter()
            .filter(|t| !t.passed)
            .map(|t| t.test.as_str())
            .collect()
    }
}

/// Run the named tests in order. Unknown names fail before anything runs.
/// The first failing test stops the suite unless `continue_on_failure` is
/// set.
pub fn run_suite(
    suite: &TestSuite,
    names: &[String],
    config: &RunConfig,
    runner: &mut dyn SimulationRunner,
    reporter: &mut dyn Reporter,
) -> Result<SuiteReport> {
    let selected = names
        .iter()
        .map(|name| suite.get(name).map(|test| (name.as_str(), test)))
        .collect::<Result<Vec<_>>>()?;

    let mut report = SuiteReport {
        passed: true,
        tests: vec![],
    };
    for (i, (name, test)) in selected.iter().enumerate() {
        tracing::info!("running test {} of {}: {name}", i + 1, selected.len());

        let status = match TestRun::new(name, test, config) {
            Ok(mut run) => match run.clean() {
                Ok(_) => run.run(runner, reporter),
                Err(err) => OverallStatus::not_started(name, &err),
            },
            Err(err) => OverallStatus::not_started(name, &err),
        };
        if !status.passed {
            report.passed = false;
            tracing::error!(test = name, failed_files = ?status.failed_files(), "test failed");
        }
        let stop = !status.passed && !config.continue_on_failure;
        report.tests.push(status);
        if stop {
            break;
        }
    }
    Ok(report)
}
