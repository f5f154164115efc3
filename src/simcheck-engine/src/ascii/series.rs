// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::path::Path;

use simcheck_core::{Array, Dataset, Field, Result};

use super::header::SnapshotHeader;
use super::snapshot::{FillPolicy, SnapshotReader};

/// Name a whole-file series is exported under, derived from the file name.
pub fn variable_for_file(file_name: &str) -> &'static str {
    let stem = file_name.strip_suffix(".nc").unwrap_or(file_name);
    match stem {
        "maxele.63" | "maxele" => "zeta_max",
        "maxvel.63" | "maxvel" => "vel_max",
        "maxwvel.63" | "maxwvel" => "wind_max",
        "fort.61" | "fort.63" => "zeta",
        "fort.62" | "fort.64" => "vel",
        _ => "v",
    }
}

/// Decode every snapshot of the file at `path` into one dataset holding
/// `time [snap]` and `name [snap, node, n_values]`.
pub fn load_series(path: &Path, policy: FillPolicy, name: &str) -> Result<Dataset> {
    let header = SnapshotHeader::read_path(path)?;
    let reader = SnapshotReader::open(path, &header, policy)?;

    let mut times = vec![];
    let mut values = vec![];
    for snapshot in reader {
        let snapshot = snapshot.map_err(|err| err.context(path.display()))?;
        times.push(snapshot.time);
        values.extend_from_slice(snapshot.values.values());
    }
    tracing::debug!(
        path = %path.display(),
        snapshots = times.len(),
        "loaded series"
    );

    let snaps = times.len();
    let mut dataset = Dataset::new();
    dataset.insert("time", Field::numeric(&["time"], Array::from_vec(&[snaps], times)?));
    dataset.insert(
        name,
        Field::numeric(
            &["time", "node", "n_values"],
            Array::from_vec(&[snaps, header.node_count, header.field_count], values)?,
        ),
    );
    Ok(dataset)
}
