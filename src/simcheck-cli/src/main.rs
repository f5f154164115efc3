// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use clap::{ArgGroup, Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use simcheck_engine::{
    CompareOptions, DEFAULT_LAUNCHER, ExportOptions, FileVerdict, ProcessRunner, RunConfig,
    SuiteReport, TestSuite, TracingReporter, Verbosity, export_file, run_suite, verify_file_pair,
};

const EXIT_FAILURE: i32 = 1;

#[derive(Parser, Debug)]
#[command(
    name = "simcheck",
    version,
    about = "Run model regression tests and verify their outputs"
)]
struct Cli {
    /// Show debug logging and echo model output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only report warnings and failures
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run tests from a suite and compare their outputs against controls
    Run(RunArgs),
    /// Compare one candidate output file against its control
    Compare(CompareArgs),
    /// Write an output series as long-form CSV
    Export(ExportArgs),
}

#[derive(Args, Debug)]
#[command(group(ArgGroup::new("selection").required(true).args(["test", "all"])))]
struct RunArgs {
    /// Directory containing the model executables
    #[arg(long = "bin", value_name = "DIR")]
    bin_dir: PathBuf,

    /// Maximum absolute difference allowed per value
    #[arg(long)]
    tolerance: f64,

    /// YAML file describing the test suite
    #[arg(long, value_name = "FILE")]
    test_yaml: PathBuf,

    /// Directory test paths are relative to
    #[arg(long, value_name = "DIR")]
    test_root: PathBuf,

    /// Test to run (repeatable)
    #[arg(long, value_name = "NAME")]
    test: Vec<String>,

    /// Run every test in the suite
    #[arg(long)]
    all: bool,

    #[arg(long)]
    continue_on_failure: bool,

    /// Field to skip when comparing (repeatable)
    #[arg(long, value_name = "FIELD")]
    exclude: Vec<String>,

    /// MPI launcher for parallel runs
    #[arg(long, default_value = DEFAULT_LAUNCHER)]
    launcher: String,

    /// Write a JSON report of every test to FILE
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct CompareArgs {
    control: PathBuf,
    candidate: PathBuf,

    #[arg(long)]
    tolerance: f64,

    #[arg(long, value_name = "FIELD")]
    exclude: Vec<String>,
}

#[derive(Args, Debug)]
struct ExportArgs {
    file: PathBuf,

    #[arg(short, long, value_name = "CSV")]
    output: PathBuf,

    /// fort.14 mesh supplying node coordinates
    #[arg(long, value_name = "FILE")]
    mesh: Option<PathBuf>,

    /// Label coordinates as lon/lat
    #[arg(long)]
    geographic: bool,

    /// Wrap longitudes into [-180, 180)
    #[arg(long)]
    global: bool,

    /// Values below this are written as empty cells
    #[arg(
        long,
        default_value_t = ExportOptions::default().threshold,
        allow_negative_numbers = true
    )]
    threshold: f64,

    /// Take the coordinate flags from this test's suite entry
    #[arg(long, value_name = "NAME", requires = "test_yaml")]
    test: Option<String>,

    #[arg(long, value_name = "FILE")]
    test_yaml: Option<PathBuf>,
}

impl Cli {
    fn verbosity(&self) -> Verbosity {
        if self.verbose {
            Verbosity::Verbose
        } else if self.quiet {
            Verbosity::Quiet
        } else {
            Verbosity::Normal
        }
    }
}

fn init_tracing(verbosity: Verbosity) {
    let default = match verbosity {
        Verbosity::Quiet => "warn",
        Verbosity::Normal => "info",
        Verbosity::Verbose => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn compare_options(tolerance: f64, exclude: &[String]) -> anyhow::Result<CompareOptions> {
    let opts = CompareOptions::new(tolerance).context("invalid --tolerance")?;
    Ok(opts.excluding(exclude.iter().cloned()))
}

fn run_tests(args: &RunArgs, verbosity: Verbosity) -> anyhow::Result<bool> {
    if !args.bin_dir.is_dir() {
        bail!("executable directory {} does not exist", args.bin_dir.display());
    }
    let suite = TestSuite::from_path(&args.test_yaml)
        .with_context(|| format!("loading test suite {}", args.test_yaml.display()))?;
    let names: Vec<String> = if args.all {
        suite.names().map(str::to_owned).collect()
    } else {
        args.test.clone()
    };

    let mut config = RunConfig::new(
        args.bin_dir.clone(),
        args.test_root.clone(),
        compare_options(args.tolerance, &args.exclude)?,
    );
    config.launcher = args.launcher.clone();
    config.continue_on_failure = args.continue_on_failure;

    let mut runner = ProcessRunner;
    let mut reporter = TracingReporter::new(verbosity);
    let report = run_suite(&suite, &names, &config, &mut runner, &mut reporter)?;

    if let Some(ref path) = args.report {
        write_report(path, &report)?;
    }
    if report.passed {
        tracing::info!("{} test(s) passed", report.tests.len());
    } else {
        for status in report.tests.iter().filter(|t| !t.passed) {
            match status.error {
                Some(ref error) => tracing::error!(test = %status.test, "{error}"),
                None => tracing::error!(
                    test = %status.test,
                    files = ?status.failed_files(),
                    "failed"
                ),
            }
        }
    }
    Ok(report.passed)
}

fn write_report(path: &Path, report: &SuiteReport) -> anyhow::Result<()> {
    let file = File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut out, report)
        .with_context(|| format!("writing report {}", path.display()))?;
    out.flush()?;
    Ok(())
}

fn print_verdict(verdict: &FileVerdict) {
    if verdict.passed {
        println!(
            "{}: passed ({} snapshot(s) checked)",
            verdict.file_name, verdict.snapshots_checked
        );
        return;
    }
    println!(
        "{}: FAILED in {} of {} snapshot(s)",
        verdict.file_name,
        verdict.failures.len(),
        verdict.snapshots_checked
    );
    for (field, diff) in verdict.worst_fields() {
        println!("  {field}: max abs diff {diff:e}");
    }
}

fn compare(args: &CompareArgs) -> anyhow::Result<bool> {
    let opts = compare_options(args.tolerance, &args.exclude)?;
    let verdict = verify_file_pair(&args.control, &args.candidate, &opts).with_context(|| {
        format!(
            "comparing {} against {}",
            args.candidate.display(),
            args.control.display()
        )
    })?;
    print_verdict(&verdict);
    Ok(verdict.passed)
}

fn export(args: &ExportArgs) -> anyhow::Result<bool> {
    let mut opts = ExportOptions {
        geographic: args.geographic,
        global: args.global,
        threshold: args.threshold,
    };
    if let (Some(name), Some(yaml)) = (&args.test, &args.test_yaml) {
        let suite = TestSuite::from_path(yaml)
            .with_context(|| format!("loading test suite {}", yaml.display()))?;
        let from_suite = suite.get(name)?.export_options(args.threshold);
        opts.geographic |= from_suite.geographic;
        opts.global |= from_suite.global;
    }
    export_file(&args.file, &args.output, args.mesh.as_deref(), &opts)
        .with_context(|| format!("exporting {}", args.file.display()))?;
    Ok(true)
}

fn main() {
    let cli = Cli::parse();
    let verbosity = cli.verbosity();
    init_tracing(verbosity);

    let result = match cli.command {
        Command::Run(ref args) => run_tests(args, verbosity),
        Command::Compare(ref args) => compare(args),
        Command::Export(ref args) => export(args),
    };
    match result {
        Ok(true) => {}
        Ok(false) => std::process::exit(EXIT_FAILURE),
        Err(err) => {
            tracing::error!("{err:#}");
            std::process::exit(EXIT_FAILURE);
        }
    }
}
