// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs;
use std::path::{Path, PathBuf};

use simcheck_engine::{
    CompareOptions, ErrorCode, Event, Invocation, ModelKind, Phase, Reporter, Result, RunConfig,
    RunExit, RunState, SimulationRunner, TestDescriptor, TestRun, TestSuite, run_suite,
};

const FORT63: &str = "run\n1 3 3600.0 720 1\n3600.0 720 1 -99999.0\n2 5.0\n";

/// Pretends to be the model: prints progress, then writes its outputs by
/// copying the control files (optionally perturbed) into the run directory.
#[derive(Default)]
struct FakeModel {
    invocations: Vec<Invocation>,
    /// Exit code for model runs in the cold (or single) phase directory.
    cold_exit: i32,
    hot_exit: i32,
    prep_exit: i32,
    perturb: Option<&'static str>,
    write_checkpoint: bool,
}

impl SimulationRunner for FakeModel {
    fn run(&mut self, invocation: &Invocation, on_line: &mut dyn FnMut(&str)) -> Result<RunExit> {
        self.invocations.push(invocation.clone());
        let program = invocation
            .program
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        if program == "adcprep" {
            on_line("partitioning mesh");
            return Ok(RunExit {
                code: Some(self.prep_exit),
            });
        }

        for pct in ["25.00", "50.00", "90.00"] {
            on_line(&format!(
                " TIME STEP =   360  {pct}% COMPLETE  ITERATIONS =   8  TIME = 0.36E+04"
            ));
        }
        let hot = invocation.cwd.ends_with("02_hs");
        let exit = if hot { self.hot_exit } else { self.cold_exit };
        if exit != 0 {
            return Ok(RunExit { code: Some(exit) });
        }

        let control = invocation.cwd.join("control");
        for entry in fs::read_dir(&control).unwrap() {
            let entry = entry.unwrap();
            let mut contents = fs::read_to_string(entry.path()).unwrap();
            if let Some(replacement) = self.perturb {
                contents = contents.replace("2 5.0", replacement);
            }
            fs::write(invocation.cwd.join(entry.file_name()), contents).unwrap();
        }
        if !hot && self.write_checkpoint {
            fs::write(invocation.cwd.join("fort.67"), "checkpoint").unwrap();
        }
        Ok(RunExit { code: Some(0) })
    }
}

#[derive(Default)]
struct RecordingReporter {
    states: Vec<RunState>,
    progress: Vec<(Phase, u32)>,
    checkpoints: usize,
}

impl Reporter for RecordingReporter {
    fn report(&mut self, event: &Event<'_>) {
        match *event {
            Event::Transition { state, .. } => self.states.push(state),
            Event::Progress { phase, percent } => self.progress.push((phase, percent)),
            Event::CheckpointCopied { .. } => self.checkpoints += 1,
            _ => {}
        }
    }
}

fn descriptor(hotstart: bool, parallel: bool) -> TestDescriptor {
    TestDescriptor {
        model: ModelKind::Adcirc,
        parallel,
        ncpu: parallel.then_some(2),
        n_writer: None,
        hotstart,
        output_files: vec!["fort.63".to_owned()],
        rm_files: vec![],
        path: "case".to_owned(),
        global: false,
        geographic: false,
    }
}

fn setup(hotstart: bool) -> (tempfile::TempDir, RunConfig) {
    let root = tempfile::tempdir().unwrap();
    let bin = root.path().join("bin");
    fs::create_dir_all(&bin).unwrap();
    for exe in ["adcirc", "padcirc", "adcprep"] {
        fs::write(bin.join(exe), "").unwrap();
    }
    let case = root.path().join("tests/case");
    let phases: Vec<PathBuf> = if hotstart {
        vec![case.join("01_cs"), case.join("02_hs")]
    } else {
        vec![case.clone()]
    };
    for dir in phases {
        fs::create_dir_all(dir.join("control")).unwrap();
        fs::write(dir.join("control/fort.63"), FORT63).unwrap();
    }
    fs::create_dir_all(&case).unwrap();

    let config = RunConfig::new(
        bin,
        root.path().join("tests"),
        CompareOptions::new(0.01).unwrap(),
    );
    (root, config)
}

fn case_dir(root: &Path) -> PathBuf {
    root.join("tests/case")
}

#[test]
fn single_phase_passes() {
    let (root, config) = setup(false);
    let test = descriptor(false, false);
    let mut model = FakeModel::default();
    let mut reporter = RecordingReporter::default();

    let mut run = TestRun::new("case", &test, &config).unwrap();
    let status = run.run(&mut model, &mut reporter);

    assert!(status.passed, "{status:?}");
    assert_eq!(1, status.phases.len());
    assert_eq!(Phase::Single, status.phases[0].phase);
    assert_eq!(RunState::Finished, run.state());
    assert_eq!(
        vec![
            RunState::Running(Phase::Single),
            RunState::Done(Phase::Single),
            RunState::Finished
        ],
        reporter.states
    );
    assert_eq!(
        vec![(Phase::Single, 25), (Phase::Single, 50), (Phase::Single, 90), (Phase::Single, 100)],
        reporter.progress
    );
    assert!(case_dir(root.path()).join("test.log").exists());
}

#[test]
fn hot_start_consumes_cold_checkpoint() {
    let (root, config) = setup(true);
    let test = descriptor(true, false);
    let mut model = FakeModel {
        write_checkpoint: true,
        ..Default::default()
    };
    let mut reporter = RecordingReporter::default();

    let status = TestRun::new("case", &test, &config)
        .unwrap()
        .run(&mut model, &mut reporter);

    assert!(status.passed, "{status:?}");
    let phases: Vec<Phase> = status.phases.iter().map(|p| p.phase).collect();
    assert_eq!(vec![Phase::Cold, Phase::Hot], phases);
    assert_eq!(1, reporter.checkpoints);
    assert!(case_dir(root.path()).join("02_hs/fort.67").exists());
    assert!(model.invocations[0].cwd.ends_with("01_cs"));
    assert!(model.invocations[1].cwd.ends_with("02_hs"));
}

#[test]
fn failed_cold_start_skips_hot_start() {
    let (_root, config) = setup(true);
    let test = descriptor(true, false);
    let mut model = FakeModel {
        cold_exit: 1,
        write_checkpoint: true,
        ..Default::default()
    };
    let mut reporter = RecordingReporter::default();

    let status = TestRun::new("case", &test, &config)
        .unwrap()
        .run(&mut model, &mut reporter);

    assert!(!status.passed);
    assert_eq!(1, status.phases.len());
    let cold = &status.phases[0];
    assert!(!cold.complete);
    assert!(cold.error.as_ref().unwrap().contains("external_process_failure"));
    assert_eq!(1, model.invocations.len());
    assert!(!reporter.states.contains(&RunState::Running(Phase::Hot)));
    // no 100% on a failed exit
    assert!(!reporter.progress.contains(&(Phase::Cold, 100)));
}

#[test]
fn failed_hot_start_fails_test() {
    let (_root, config) = setup(true);
    let test = descriptor(true, false);
    let mut model = FakeModel {
        hot_exit: 3,
        write_checkpoint: true,
        ..Default::default()
    };
    let mut reporter = RecordingReporter::default();

    let status = TestRun::new("case", &test, &config)
        .unwrap()
        .run(&mut model, &mut reporter);

    assert!(!status.passed);
    assert_eq!(2, status.phases.len());
    assert!(status.phases[0].passed);
    let hot = &status.phases[1];
    assert!(!hot.complete);
    assert!(!hot.passed);
    assert!(hot.files.is_empty());
    let error = hot.error.as_ref().unwrap();
    assert!(error.contains("external_process_failure"), "{error}");
    assert!(error.contains("Some(3)"), "{error}");
    assert_eq!(2, model.invocations.len());
    assert!(reporter.progress.contains(&(Phase::Cold, 100)));
    assert!(!reporter.progress.contains(&(Phase::Hot, 100)));
}

#[test]
fn cold_verification_failure_skips_hot_start() {
    let (_root, config) = setup(true);
    let test = descriptor(true, false);
    let mut model = FakeModel {
        perturb: Some("2 5.02"),
        write_checkpoint: true,
        ..Default::default()
    };

    let status = TestRun::new("case", &test, &config)
        .unwrap()
        .run(&mut model, &mut RecordingReporter::default());

    assert!(!status.passed);
    assert_eq!(1, status.phases.len());
    assert!(status.phases[0].complete);
    assert_eq!(vec!["fort.63".to_owned()], status.failed_files());
    let worst = status.phases[0].files[0].worst_fields();
    assert!((worst["v"] - 0.02).abs() < 1e-9);
}

#[test]
fn missing_checkpoint_aborts_hot_start() {
    let (_root, config) = setup(true);
    let test = descriptor(true, false);
    let mut model = FakeModel::default();

    let status = TestRun::new("case", &test, &config)
        .unwrap()
        .run(&mut model, &mut RecordingReporter::default());

    assert!(!status.passed);
    assert_eq!(2, status.phases.len());
    assert!(status.phases[0].passed);
    let hot = &status.phases[1];
    assert!(!hot.complete);
    assert!(hot.error.as_ref().unwrap().contains("missing_artifact"));
    assert_eq!(1, model.invocations.len());
}

#[test]
fn missing_output_fails_file_not_phase() {
    let (root, config) = setup(false);
    let mut test = descriptor(false, false);
    test.output_files.push("maxele.63".to_owned());
    fs::write(case_dir(root.path()).join("control/maxele.63"), FORT63).unwrap();

    struct NoMaxele(FakeModel);
    impl SimulationRunner for NoMaxele {
        fn run(
            &mut self,
            invocation: &Invocation,
            on_line: &mut dyn FnMut(&str),
        ) -> Result<RunExit> {
            let exit = self.0.run(invocation, on_line)?;
            let _ = fs::remove_file(invocation.cwd.join("maxele.63"));
            Ok(exit)
        }
    }

    let status = TestRun::new("case", &test, &config)
        .unwrap()
        .run(&mut NoMaxele(FakeModel::default()), &mut RecordingReporter::default());

    assert!(!status.passed);
    let phase = &status.phases[0];
    assert!(phase.complete);
    assert_eq!(vec!["maxele.63".to_owned()], phase.failed_files);
    assert!(phase.file_errors[0].error.contains("missing_artifact"));
    assert!(phase.files[0].passed);
}

#[test]
fn parallel_run_prepares_first() {
    let (_root, config) = setup(false);
    let test = descriptor(false, true);
    let mut model = FakeModel::default();

    let status = TestRun::new("case", &test, &config)
        .unwrap()
        .run(&mut model, &mut RecordingReporter::default());

    assert!(status.passed, "{status:?}");
    let commands: Vec<String> = model.invocations.iter().map(|i| i.command_line()).collect();
    assert_eq!(3, commands.len());
    assert!(commands[0].ends_with("adcprep --np 2 --partmesh"));
    assert!(commands[1].ends_with("adcprep --np 2 --prepall"));
    assert!(commands[2].starts_with("mpirun -np 2 "));
    assert!(commands[2].ends_with("padcirc"));
}

#[test]
fn failed_prep_aborts_before_model() {
    let (_root, config) = setup(false);
    let test = descriptor(false, true);
    let mut model = FakeModel {
        prep_exit: 2,
        ..Default::default()
    };
    let mut reporter = RecordingReporter::default();

    let status = TestRun::new("case", &test, &config)
        .unwrap()
        .run(&mut model, &mut reporter);

    assert!(!status.passed);
    assert_eq!(1, status.phases.len());
    let phase = &status.phases[0];
    assert!(!phase.complete);
    let error = phase.error.as_ref().unwrap();
    assert!(error.contains("external_process_failure"), "{error}");
    assert!(error.contains("--partmesh"), "{error}");

    assert_eq!(1, model.invocations.len());
    assert!(model.invocations[0].command_line().ends_with("adcprep --np 2 --partmesh"));
    assert!(reporter.progress.is_empty());
}

#[test]
fn suite_stops_on_first_failure_unless_told_otherwise() {
    let (root, mut config) = setup(false);
    let mut suite = TestSuite::default();
    let mut broken = descriptor(false, false);
    broken.path = "missing".to_owned();
    suite.tests.insert("a_broken".to_owned(), broken);
    suite.tests.insert("b_case".to_owned(), descriptor(false, false));
    let names = vec!["a_broken".to_owned(), "b_case".to_owned()];

    let report = run_suite(
        &suite,
        &names,
        &config,
        &mut FakeModel::default(),
        &mut RecordingReporter::default(),
    )
    .unwrap();
    assert!(!report.passed);
    assert_eq!(1, report.tests.len());
    assert!(report.tests[0].error.as_ref().unwrap().contains("missing_artifact"));

    config.continue_on_failure = true;
    let report = run_suite(
        &suite,
        &names,
        &config,
        &mut FakeModel::default(),
        &mut RecordingReporter::default(),
    )
    .unwrap();
    assert!(!report.passed);
    assert_eq!(vec!["a_broken"], report.failed_tests());
    assert!(report.tests[1].passed);
    assert!(case_dir(root.path()).join("fort.63").exists());
}

#[test]
fn unknown_test_fails_before_running() {
    let (_root, config) = setup(false);
    let suite = TestSuite::default();
    let mut model = FakeModel::default();
    let err = run_suite(
        &suite,
        &["nope".to_owned()],
        &config,
        &mut model,
        &mut RecordingReporter::default(),
    )
    .unwrap_err();
    assert_eq!(ErrorCode::UnknownTest, err.code);
    assert!(model.invocations.is_empty());
}
