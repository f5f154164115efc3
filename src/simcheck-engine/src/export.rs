// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs::File;
use std::io::Write;
use std::path::Path;

use simcheck_core::{
    Array, Dataset, Error, ErrorCode, ErrorKind, Result, format_err, structural_err,
};

use crate::ascii::{FillPolicy, load_series, variable_for_file};
use crate::mesh::{node_count, read_mesh_path};
use crate::netcdf::{is_netcdf_path, load_netcdf};

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ExportOptions {
    /// Label coordinate columns `lon,lat` instead of `x,y`.
    pub geographic: bool,
    /// Wrap longitudes into `[-180, 180)`.
    pub global: bool,
    /// Values below this become empty cells.
    pub threshold: f64,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            geographic: false,
            global: false,
            threshold: FillPolicy::DEFAULT_MISSING_THRESHOLD,
        }
    }
}

fn csv_error(err: csv::Error) -> Error {
    Error::new(ErrorKind::Io, ErrorCode::Io, Some(err.to_string()))
}

fn wrap_longitude(lon: f64) -> f64 {
    (lon + 180.0).rem_euclid(360.0) - 180.0
}

fn cell(v: f64) -> String {
    if v.is_nan() { String::new() } else { v.to_string() }
}

/// `(snapshots, nodes, values per node)` of a series field.
fn series_extent(dims: &[String], shape: &[usize]) -> (usize, usize, usize) {
    match shape {
        [] => (1, 1, 1),
        [snaps, rest @ ..] if dims.first().is_some_and(|d| d == "time") => {
            let nodes = rest.first().copied().unwrap_or(1);
            let width = rest.iter().skip(1).product();
            (*snaps, nodes, width)
        }
        [nodes, rest @ ..] => (1, *nodes, rest.iter().product()),
    }
}

/// Write `series[name]` as long-form CSV, one row per snapshot and node.
/// Returns the number of data rows written.
pub fn write_series_csv<W: Write>(
    w: W,
    series: &Dataset,
    name: &str,
    mesh: Option<&Dataset>,
    opts: &ExportOptions,
) -> Result<usize> {
    let Some(field) = series.get(name) else {
        return structural_err!(FieldMissing, format!("no field '{name}' to export"));
    };
    let Some(values) = field.as_numeric() else {
        return format_err!(UnsupportedFormat, format!("field '{name}' is not numeric"));
    };
    let (snaps, nodes, width) = series_extent(&field.dims, values.shape());
    let times = series.numeric("time").map(Array::values);

    let coords = match mesh {
        Some(mesh) => {
            if node_count(mesh) != nodes {
                return structural_err!(
                    StructuralMismatch,
                    format!(
                        "mesh has {} nodes, series '{name}' has {nodes}",
                        node_count(mesh)
                    )
                );
            }
            match (mesh.numeric("x"), mesh.numeric("y")) {
                (Some(x), Some(y)) => Some((x.values(), y.values())),
                _ => None,
            }
        }
        None => None,
    };

    let mut out = csv::Writer::from_writer(w);
    let mut header = vec!["snapshot".to_owned(), "time".to_owned(), "node".to_owned()];
    if coords.is_some() {
        let (x, y) = if opts.geographic { ("lon", "lat") } else { ("x", "y") };
        header.push(x.to_owned());
        header.push(y.to_owned());
    }
    if width == 1 {
        header.push(name.to_owned());
    } else {
        header.extend((1..=width).map(|i| format!("{name}_{i}")));
    }
    out.write_record(&header).map_err(csv_error)?;

    let data = values.values();
    let mut rows = 0;
    for s in 0..snaps {
        let time = times.and_then(|t| t.get(s)).copied().unwrap_or(f64::NAN);
        for n in 0..nodes {
            let mut record = vec![s.to_string(), cell(time), (n + 1).to_string()];
            if let Some((x, y)) = coords {
                let lon = if opts.global { wrap_longitude(x[n]) } else { x[n] };
                record.push(cell(lon));
                record.push(cell(y[n]));
            }
            let start = (s * nodes + n) * width;
            record.extend(data[start..start + width].iter().map(|v| {
                if *v < opts.threshold { String::new() } else { cell(*v) }
            }));
            out.write_record(&record).map_err(csv_error)?;
            rows += 1;
        }
    }
    out.flush()?;
    Ok(rows)
}

fn carries_coordinates(series: &Dataset) -> bool {
    series.numeric("x").is_some() && series.numeric("y").is_some()
}

/// Decode `input` (ASCII series or NetCDF) and write long-form CSV to
/// `output`. Coordinates come from `mesh` when given, otherwise from the
/// `x`/`y` variables a NetCDF file carries itself.
pub fn export_file(
    input: &Path,
    output: &Path,
    mesh: Option<&Path>,
    opts: &ExportOptions,
) -> Result<usize> {
    let file_name = input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = variable_for_file(&file_name);

    let series = if is_netcdf_path(input) {
        load_netcdf(input)?
    } else {
        let policy = FillPolicy::MaskMissing {
            threshold: opts.threshold,
        };
        load_series(input, policy, name)?
    };
    let mesh = match mesh {
        Some(path) => Some(read_mesh_path(path)?),
        None => None,
    };
    let coords = match mesh {
        Some(ref mesh) => Some(mesh),
        None if carries_coordinates(&series) => Some(&series),
        None => None,
    };

    let file = File::create(output).map_err(|err| Error::from(err).context(output.display()))?;
    let rows = write_series_csv(file, &series, name, coords, opts)
        .map_err(|err| err.context(input.display()))?;
    tracing::info!(
        input = %input.display(),
        output = %output.display(),
        rows,
        "exported series"
    );
    Ok(rows)
}
