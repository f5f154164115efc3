// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;
use std::path::Path;

use serde::Serialize;

use simcheck_core::{Result, alignment_err, structural_err};

use crate::ascii::{FillPolicy, SnapshotHeader, SnapshotReader};
use crate::compare::{CompareOptions, ComparisonVerdict, compare_datasets};
use crate::netcdf::{is_netcdf_path, load_netcdf};

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FileFormat {
    Ascii,
    Netcdf,
}

impl FileFormat {
    pub fn of(path: &Path) -> Self {
        if is_netcdf_path(path) {
            FileFormat::Netcdf
        } else {
            FileFormat::Ascii
        }
    }
}

/// A compared record that had at least one field outside tolerance.
/// Whole-dataset comparisons have no time stamp.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SnapshotFailure {
    pub index: usize,
    pub time: Option<f64>,
    pub iteration: Option<i64>,
    pub verdict: ComparisonVerdict,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FileVerdict {
    pub file_name: String,
    pub format: FileFormat,
    pub passed: bool,
    pub snapshots_checked: usize,
    pub failures: Vec<SnapshotFailure>,
}

impl FileVerdict {
    /// Worst deviation of every field that failed anywhere in the file.
    pub fn worst_fields(&self) -> BTreeMap<String, f64> {
        let mut worst = BTreeMap::new();
        for failure in &self.failures {
            for field in failure.verdict.failing_fields() {
                let entry = worst.entry(field.name.clone()).or_insert(0.0f64);
                *entry = entry.max(field.max_abs_diff);
            }
        }
        worst
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// Compare a candidate output file against its control. Tolerance failures
/// are reported in the verdict; format, structural and alignment problems
/// are errors. Errors name the file once: read errors carry the path that
/// failed, pair errors the control's file name.
pub fn verify_file_pair(
    control: &Path,
    candidate: &Path,
    opts: &CompareOptions,
) -> Result<FileVerdict> {
    let format = FileFormat::of(control);
    if FileFormat::of(candidate) != format {
        return structural_err!(
            StructuralMismatch,
            format!(
                "{} and {} are in different formats",
                control.display(),
                candidate.display()
            )
        );
    }

    let verdict = match format {
        FileFormat::Netcdf => verify_netcdf(control, candidate, opts)?,
        FileFormat::Ascii => verify_ascii(control, candidate, opts)?,
    };

    tracing::debug!(
        file = %verdict.file_name,
        passed = verdict.passed,
        snapshots = verdict.snapshots_checked,
        "verified file pair"
    );
    Ok(verdict)
}

fn verify_netcdf(control: &Path, candidate: &Path, opts: &CompareOptions) -> Result<FileVerdict> {
    let a = load_netcdf(control)?;
    let b = load_netcdf(candidate)?;
    let verdict =
        compare_datasets(&a, &b, opts).map_err(|err| err.context(display_name(control)))?;

    let mut failures = vec![];
    if !verdict.passed {
        failures.push(SnapshotFailure {
            index: 0,
            time: None,
            iteration: None,
            verdict,
        });
    }
    Ok(FileVerdict {
        file_name: display_name(control),
        format: FileFormat::Netcdf,
        passed: failures.is_empty(),
        snapshots_checked: 1,
        failures,
    })
}

fn verify_ascii(control: &Path, candidate: &Path, opts: &CompareOptions) -> Result<FileVerdict> {
    let name = display_name(control);
    let header = SnapshotHeader::read_path(control)?;
    let candidate_header = SnapshotHeader::read_path(candidate)?;
    if let Some(diff) = header.mismatch(&candidate_header) {
        return structural_err!(StructuralMismatch, format!("{name}: headers differ: {diff}"));
    }

    let mut a = SnapshotReader::open(control, &header, FillPolicy::Preserve)?;
    let mut b = SnapshotReader::open(candidate, &candidate_header, FillPolicy::Preserve)?;

    let mut failures = vec![];
    for index in 0..header.snap_count {
        let sa = a.read_snapshot().map_err(|err| err.context(control.display()))?;
        let sb = b.read_snapshot().map_err(|err| err.context(candidate.display()))?;
        if sa.time != sb.time {
            return alignment_err!(
                TimeMismatch,
                format!("{name}: snapshot {index}: time {} != {}", sa.time, sb.time)
            );
        }
        if sa.iteration != sb.iteration {
            return alignment_err!(
                IterationMismatch,
                format!(
                    "{name}: snapshot {index}: iteration {} != {}",
                    sa.iteration, sb.iteration
                )
            );
        }

        let (time, iteration) = (sa.time, sa.iteration);
        let verdict = compare_datasets(&sa.into_dataset(), &sb.into_dataset(), opts)
            .map_err(|err| err.context(&name))?;
        if !verdict.passed {
            failures.push(SnapshotFailure {
                index,
                time: Some(time),
                iteration: Some(iteration),
                verdict,
            });
        }
    }

    Ok(FileVerdict {
        file_name: name,
        format: FileFormat::Ascii,
        passed: failures.is_empty(),
        snapshots_checked: header.snap_count,
        failures,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::netcdf::fixtures;
    use simcheck_core::{ErrorCode, ErrorKind};
    use std::path::PathBuf;

    fn pair(control: &str, candidate: &str, name: &str) -> (tempfile::TempDir, PathBuf, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("control")).unwrap();
        let a = dir.path().join("control").join(name);
        let b = dir.path().join(name);
        std::fs::write(&a, control).unwrap();
        std::fs::write(&b, candidate).unwrap();
        (dir, a, b)
    }

    const SPARSE: &str = "\
title
2 3 3600.0 720 1
3600.0 720 1 -99999.0
2 5.0
7200.0 1440 0 -99999.0
";

    #[test]
    fn identical_sparse_files_pass() {
        let (_dir, a, b) = pair(SPARSE, SPARSE, "fort.63");
        let verdict = verify_file_pair(&a, &b, &CompareOptions::new(0.0).unwrap()).unwrap();
        assert!(verdict.passed);
        assert_eq!("fort.63", verdict.file_name);
        assert_eq!(2, verdict.snapshots_checked);
    }

    #[test]
    fn deviation_recorded_per_snapshot() {
        let candidate = SPARSE.replace("2 5.0", "2 5.02");
        let (_dir, a, b) = pair(SPARSE, &candidate, "fort.63");
        let verdict = verify_file_pair(&a, &b, &CompareOptions::new(0.01).unwrap()).unwrap();
        assert!(!verdict.passed);
        assert_eq!(1, verdict.failures.len());
        assert_eq!(Some(720), verdict.failures[0].iteration);
        let worst = verdict.worst_fields();
        assert!((worst["v"] - 0.02).abs() < 1e-9);
    }

    #[test]
    fn node_count_disagreement_is_structural() {
        let candidate = SPARSE.replace("2 3 3600.0", "2 4 3600.0");
        let (_dir, a, b) = pair(SPARSE, &candidate, "fort.63");
        let err = verify_file_pair(&a, &b, &CompareOptions::new(1.0).unwrap()).unwrap_err();
        assert_eq!(ErrorKind::Structure, err.kind);
        assert_eq!(ErrorCode::StructuralMismatch, err.code);
        let details = err.details.unwrap();
        assert!(details.starts_with("fort.63: headers differ:"), "{details}");
        assert!(details.contains("node_count 3 != 4"));
    }

    #[test]
    fn time_skew_aborts() {
        let candidate = SPARSE.replace("7200.0 1440", "7300.0 1440");
        let (_dir, a, b) = pair(SPARSE, &candidate, "fort.63");
        let err = verify_file_pair(&a, &b, &CompareOptions::new(1.0).unwrap()).unwrap_err();
        assert_eq!(ErrorKind::Alignment, err.kind);
        assert_eq!(ErrorCode::TimeMismatch, err.code);

        let candidate = SPARSE.replace("7200.0 1440", "7200.0 1441");
        let (_dir, a, b) = pair(SPARSE, &candidate, "fort.63");
        let err = verify_file_pair(&a, &b, &CompareOptions::new(1.0).unwrap()).unwrap_err();
        assert_eq!(ErrorCode::IterationMismatch, err.code);
    }

    #[test]
    fn truncated_candidate_is_format_error() {
        let candidate = SPARSE.replace("7200.0 1440 0 -99999.0\n", "");
        let (_dir, a, b) = pair(SPARSE, &candidate, "fort.63");
        let err = verify_file_pair(&a, &b, &CompareOptions::new(1.0).unwrap()).unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind);
        assert_eq!(ErrorCode::UnexpectedEof, err.code);
        let details = err.details.unwrap();
        assert_eq!(1, details.matches("fort.63").count(), "{details}");
        assert!(details.starts_with(&b.display().to_string()), "{details}");
    }

    #[test]
    fn overflowing_header_counts_fail_the_file() {
        let header = "title\n1 4294967296 3600.0 720 4294967296\n1.0 2\n";
        let (_dir, a, b) = pair(header, header, "fort.63");
        let err = verify_file_pair(&a, &b, &CompareOptions::new(1.0).unwrap()).unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind);
        assert_eq!(ErrorCode::BadHeader, err.code);
        let details = err.details.unwrap();
        assert_eq!(1, details.matches("fort.63").count(), "{details}");
    }

    #[test]
    fn mixed_formats_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = verify_file_pair(
            &dir.path().join("control/fort.63.nc"),
            &dir.path().join("fort.63"),
            &CompareOptions::new(1.0).unwrap(),
        )
        .unwrap_err();
        assert_eq!(ErrorCode::StructuralMismatch, err.code);
    }

    #[test]
    fn netcdf_pair() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.nc");
        let b = dir.path().join("b.nc");
        fixtures::write_nodes(&a, &[("zeta_max", vec![1.0, 2.0, -99999.0], Some(-99999.0))]);
        fixtures::write_nodes(&b, &[("zeta_max", vec![1.0, 2.5, -99999.0], Some(-99999.0))]);

        let opts = CompareOptions::new(0.1).unwrap();
        let verdict = verify_file_pair(&a, &b, &opts).unwrap();
        assert!(!verdict.passed);
        assert_eq!(FileFormat::Netcdf, verdict.format);
        assert_eq!(0.5, verdict.worst_fields()["zeta_max"]);

        let verdict = verify_file_pair(&a, &a, &opts).unwrap();
        assert!(verdict.passed);
    }
}
