// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

#![forbid(unsafe_code)]

pub mod ascii;
mod compare;
mod descriptor;
mod export;
mod mesh;
mod netcdf;
mod orchestrator;
mod progress;
mod report;
mod runner;
mod verify;

pub use simcheck_core::{Array, Dataset, Error, ErrorCode, ErrorKind, Field, FieldData, Result};

pub use self::compare::{
    CompareOptions, ComparisonVerdict, FieldVerdict, compare_arrays, compare_datasets,
};
pub use self::descriptor::{ModelKind, PREP_EXECUTABLE, TestDescriptor, TestSuite};
pub use self::export::{ExportOptions, export_file, write_series_csv};
pub use self::mesh::{read_mesh, read_mesh_path};
pub use self::netcdf::{TOPOLOGY_FIELDS, is_netcdf_path, load_netcdf};
pub use self::orchestrator::{
    CHECKPOINT_FILES, COLD_DIR, CONTROL_DIR, DEFAULT_LAUNCHER, FileError, HOT_DIR, LOG_FILE,
    OverallStatus, Phase, PhaseStatus, RunConfig, RunState, SuiteReport, TestRun,
    copy_checkpoint, find_checkpoint, run_suite,
};
pub use self::progress::ProgressTracker;
pub use self::report::{Event, NullReporter, Reporter, TracingReporter, Verbosity};
pub use self::runner::{Invocation, ProcessRunner, RunExit, SimulationRunner};
pub use self::verify::{FileFormat, FileVerdict, SnapshotFailure, verify_file_pair};
