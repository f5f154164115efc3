// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use float_cmp::approx_eq;
use serde::Serialize;

use simcheck_core::{Array, Dataset, FieldData, Result, config_err, structural_err};

#[derive(Clone, Debug, PartialEq)]
pub struct CompareOptions {
    tolerance: f64,
    excluded: Vec<String>,
}

impl CompareOptions {
    pub fn new(tolerance: f64) -> Result<Self> {
        if !tolerance.is_finite() || tolerance < 0.0 {
            return config_err!(
                BadTolerance,
                format!("tolerance must be finite and non-negative, got {tolerance}")
            );
        }
        Ok(CompareOptions {
            tolerance,
            excluded: vec![],
        })
    }

    /// Skip `fields` when comparing, in addition to non-numeric fields.
    pub fn excluding<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.excluded.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn is_excluded(&self, name: &str) -> bool {
        self.excluded.iter().any(|e| e == name)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldVerdict {
    pub name: String,
    pub passed: bool,
    /// Largest `|control - candidate|` over pairs where both are numbers;
    /// 0 when there are none.
    pub max_abs_diff: f64,
    /// Elements outside the tolerance, NaN mismatches included.
    pub mismatched: usize,
    pub nan_mismatched: usize,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ComparisonVerdict {
    pub passed: bool,
    pub fields: Vec<FieldVerdict>,
}

impl ComparisonVerdict {
    pub fn failing_fields(&self) -> impl Iterator<Item = &FieldVerdict> {
        self.fields.iter().filter(|f| !f.passed)
    }

    pub fn failing_field_names(&self) -> Vec<String> {
        self.failing_fields().map(|f| f.name.clone()).collect()
    }
}

#[inline]
fn within(control: f64, candidate: f64, tolerance: f64) -> bool {
    match (control.is_nan(), candidate.is_nan()) {
        (true, true) => true,
        (false, false) => approx_eq!(f64, control, candidate, epsilon = tolerance, ulps = 0),
        _ => false,
    }
}

pub fn compare_arrays(
    name: &str,
    control: &Array,
    candidate: &Array,
    tolerance: f64,
) -> FieldVerdict {
    let mut max_abs_diff = 0.0f64;
    let mut mismatched = 0;
    let mut nan_mismatched = 0;

    for (&a, &b) in control.values().iter().zip(candidate.values()) {
        if a.is_nan() != b.is_nan() {
            nan_mismatched += 1;
            mismatched += 1;
            continue;
        }
        if a.is_nan() {
            continue;
        }
        let diff = (a - b).abs();
        // inf - inf is NaN; equal infinities are not a deviation
        if !diff.is_nan() && diff > max_abs_diff {
            max_abs_diff = diff;
        }
        if !within(a, b, tolerance) {
            mismatched += 1;
        }
    }

    FieldVerdict {
        name: name.to_owned(),
        passed: mismatched == 0,
        max_abs_diff,
        mismatched,
        nan_mismatched,
    }
}

/// Compare every numeric field of `control` against the same field of
/// `candidate`. Fields only present in the candidate are ignored.
pub fn compare_datasets(
    control: &Dataset,
    candidate: &Dataset,
    opts: &CompareOptions,
) -> Result<ComparisonVerdict> {
    let mut fields = vec![];

    for (name, control_field) in control.iter() {
        let Some(candidate_field) = candidate.get(name) else {
            return structural_err!(
                FieldMissing,
                format!("field '{name}' missing from candidate")
            );
        };
        if opts.is_excluded(name) {
            continue;
        }
        let (FieldData::Numeric(a), FieldData::Numeric(b)) =
            (&control_field.data, &candidate_field.data)
        else {
            continue;
        };
        if a.shape() != b.shape() {
            return structural_err!(
                ShapeMismatch,
                format!(
                    "field '{name}' has shape {:?} in control, {:?} in candidate",
                    a.shape(),
                    b.shape()
                )
            );
        }

        let verdict = compare_arrays(name, a, b, opts.tolerance);
        if !verdict.passed {
            tracing::debug!(
                field = name,
                max_abs_diff = verdict.max_abs_diff,
                mismatched = verdict.mismatched,
                "field outside tolerance"
            );
        }
        fields.push(verdict);
    }

    Ok(ComparisonVerdict {
        passed: fields.iter().all(|f| f.passed),
        fields,
    })
}
