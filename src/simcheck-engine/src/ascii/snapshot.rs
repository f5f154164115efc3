// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use simcheck_core::{Array, Dataset, Error, Field, Result, format_err};

use super::header::{HEADER_LINES, SnapshotHeader};
use super::lines::LineReader;

/// Name of the single field a decoded snapshot is exposed as.
pub const SNAPSHOT_FIELD: &str = "v";

/// What happens to missing-data sentinels while decoding.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum FillPolicy {
    /// Keep every value, including sparse fill values, exactly as written.
    Preserve,
    /// Replace every value below `threshold` (written or filled) with NaN.
    MaskMissing { threshold: f64 },
}

impl FillPolicy {
    pub const DEFAULT_MISSING_THRESHOLD: f64 = -999.0;

    pub fn mask_missing() -> Self {
        FillPolicy::MaskMissing {
            threshold: Self::DEFAULT_MISSING_THRESHOLD,
        }
    }

    #[inline]
    fn apply(self, value: f64) -> f64 {
        match self {
            FillPolicy::Preserve => value,
            FillPolicy::MaskMissing { threshold } if value < threshold => f64::NAN,
            FillPolicy::MaskMissing { .. } => value,
        }
    }
}

/// Record layout of a snapshot series, fixed once per file.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SnapshotLayout {
    Dense {
        node_count: usize,
        field_count: usize,
    },
    Sparse {
        node_count: usize,
        field_count: usize,
    },
}

impl SnapshotLayout {
    pub fn node_count(self) -> usize {
        match self {
            SnapshotLayout::Dense { node_count, .. }
            | SnapshotLayout::Sparse { node_count, .. } => node_count,
        }
    }

    pub fn field_count(self) -> usize {
        match self {
            SnapshotLayout::Dense { field_count, .. }
            | SnapshotLayout::Sparse { field_count, .. } => field_count,
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Snapshot {
    pub time: f64,
    pub iteration: i64,
    /// `[node_count, field_count]`
    pub values: Array,
}

impl Snapshot {
    pub fn into_dataset(self) -> Dataset {
        let mut dataset = Dataset::new();
        dataset.insert(
            SNAPSHOT_FIELD,
            Field::numeric(&["node", "n_values"], self.values),
        );
        dataset
    }
}

/// Decodes the records of a snapshot series in file order.
pub struct SnapshotReader<R> {
    lines: LineReader<R>,
    layout: SnapshotLayout,
    policy: FillPolicy,
    remaining: usize,
}

impl SnapshotReader<BufReader<File>> {
    /// Open `path` and position the reader at the first record. The header
    /// must have been read separately (see [`SnapshotHeader::read_path`]).
    pub fn open(path: &Path, header: &SnapshotHeader, policy: FillPolicy) -> Result<Self> {
        let file = File::open(path).map_err(|err| Error::from(err).context(path.display()))?;
        let mut reader = SnapshotReader::new(BufReader::new(file), header, policy);
        reader
            .lines
            .skip_lines(HEADER_LINES)
            .map_err(|err| err.context(path.display()))?;
        Ok(reader)
    }
}

impl<R: BufRead> SnapshotReader<R> {
    /// `reader` must already be positioned past the two header lines.
    pub fn new(reader: R, header: &SnapshotHeader, policy: FillPolicy) -> Self {
        SnapshotReader {
            lines: LineReader::new(reader),
            layout: header.snapshot_layout(),
            policy,
            remaining: header.snap_count,
        }
    }

    pub fn layout(&self) -> SnapshotLayout {
        self.layout
    }

    pub fn read_snapshot(&mut self) -> Result<Snapshot> {
        let snapshot = match self.layout {
            SnapshotLayout::Dense {
                node_count,
                field_count,
            } => decode_dense(&mut self.lines, node_count, field_count, self.policy)?,
            SnapshotLayout::Sparse {
                node_count,
                field_count,
            } => decode_sparse(&mut self.lines, node_count, field_count, self.policy)?,
        };
        self.remaining = self.remaining.saturating_sub(1);
        Ok(snapshot)
    }
}

impl<R: BufRead> Iterator for SnapshotReader<R> {
    type Item = Result<Snapshot>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.remaining == 0 {
            return None;
        }
        let result = self.read_snapshot();
        if result.is_err() {
            // a failed record leaves the stream at an unknown position
            self.remaining = 0;
        }
        Some(result)
    }
}

fn decode_dense<R: BufRead>(
    lines: &mut LineReader<R>,
    node_count: usize,
    field_count: usize,
    policy: FillPolicy,
) -> Result<Snapshot> {
    let (time, iteration) = {
        let stamp = lines.expect_tokens("record stamp", 2)?;
        (
            stamp.parse::<f64>(0, "time")?,
            stamp.parse::<i64>(1, "iteration")?,
        )
    };

    let mut values = Array::filled(&[node_count, field_count], f64::NAN)?;
    for node in 0..node_count {
        let tokens = lines.expect_tokens("node values", field_count)?;
        let row = values.row_mut(node);
        for (j, slot) in row.iter_mut().enumerate() {
            *slot = policy.apply(tokens.parse::<f64>(j, "value")?);
        }
    }

    Ok(Snapshot {
        time,
        iteration,
        values,
    })
}

fn decode_sparse<R: BufRead>(
    lines: &mut LineReader<R>,
    node_count: usize,
    field_count: usize,
    policy: FillPolicy,
) -> Result<Snapshot> {
    let (time, iteration, n_listed, fill_value) = {
        let stamp = lines.expect_tokens("sparse record stamp", 4)?;
        (
            stamp.parse::<f64>(0, "time")?,
            stamp.parse::<i64>(1, "iteration")?,
            stamp.parse::<usize>(2, "listed node count")?,
            stamp.parse::<f64>(3, "fill value")?,
        )
    };
    if n_listed > node_count {
        return format_err!(
            NodeOutOfRange,
            format!(
                "line {}: {n_listed} listed nodes in a mesh of {node_count}",
                lines.line_no()
            )
        );
    }

    let mut values = Array::filled(&[node_count, field_count], policy.apply(fill_value))?;
    for _ in 0..n_listed {
        let tokens = lines.expect_tokens("sparse node values", field_count + 1)?;
        let node = tokens.parse::<usize>(0, "node index")?;
        if node == 0 || node > node_count {
            return format_err!(
                NodeOutOfRange,
                format!(
                    "line {}: node {node} outside 1..={node_count}",
                    tokens.line_no()
                )
            );
        }
        let row = values.row_mut(node - 1);
        for (j, slot) in row.iter_mut().enumerate() {
            *slot = policy.apply(tokens.parse::<f64>(j + 1, "value")?);
        }
    }

    Ok(Snapshot {
        time,
        iteration,
        values,
    })
}

/// Write `snapshot` as one record in `layout`. Sparse records list every
/// node with at least one value different from `fill_value`.
pub fn encode_snapshot<W: Write>(
    w: &mut W,
    layout: SnapshotLayout,
    snapshot: &Snapshot,
    fill_value: f64,
) -> Result<()> {
    match layout {
        SnapshotLayout::Dense { .. } => {
            writeln!(w, "{} {}", snapshot.time, snapshot.iteration)?;
            for row in snapshot.values.rows() {
                writeln!(w, "{}", join_values(row))?;
            }
        }
        SnapshotLayout::Sparse { .. } => {
            let listed: Vec<(usize, &[f64])> = snapshot
                .values
                .rows()
                .enumerate()
                .filter(|(_, row)| row.iter().any(|v| *v != fill_value))
                .collect();
            writeln!(
                w,
                "{} {} {} {}",
                snapshot.time,
                snapshot.iteration,
                listed.len(),
                fill_value
            )?;
            for (i, row) in listed {
                writeln!(w, "{} {}", i + 1, join_values(row))?;
            }
        }
    }
    Ok(())
}

/// Write a complete series file: title, count line and every record.
pub fn encode_series<W: Write>(
    w: &mut W,
    title: &str,
    header: &SnapshotHeader,
    snapshots: &[Snapshot],
    fill_value: f64,
) -> Result<()> {
    writeln!(w, "{title}")?;
    writeln!(
        w,
        "{} {} {} {} {}",
        header.snap_count,
        header.node_count,
        header.output_interval,
        header.output_step,
        header.field_count
    )?;
    let layout = header.snapshot_layout();
    for snapshot in snapshots {
        encode_snapshot(w, layout, snapshot, fill_value)?;
    }
    Ok(())
}

fn join_values(row: &[f64]) -> String {
    row.iter()
        .map(|v| v.to_string())
        .collect::<Vec<_>>()
        .join(" ")
}
