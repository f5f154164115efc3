// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use simcheck_core::{Error, ErrorCode, ErrorKind, Result, format_err};

use super::lines::LineReader;
use super::snapshot::SnapshotLayout;

/// Number of lines a snapshot reader skips before the first record. The
/// third header line is *not* skipped: it is the first record's stamp.
pub const HEADER_LINES: usize = 2;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum RecordLayout {
    Dense,
    Sparse,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SnapshotHeader {
    pub snap_count: usize,
    pub node_count: usize,
    pub output_interval: f64,
    pub output_step: i64,
    pub field_count: usize,
    pub layout: RecordLayout,
}

impl SnapshotHeader {
    pub fn is_sparse(&self) -> bool {
        self.layout == RecordLayout::Sparse
    }

    pub fn snapshot_layout(&self) -> SnapshotLayout {
        match self.layout {
            RecordLayout::Dense => SnapshotLayout::Dense {
                node_count: self.node_count,
                field_count: self.field_count,
            },
            RecordLayout::Sparse => SnapshotLayout::Sparse {
                node_count: self.node_count,
                field_count: self.field_count,
            },
        }
    }

    pub fn read_path(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|err| {
            Error::new(
                ErrorKind::Format,
                ErrorCode::DoesNotExist,
                Some(format!("{}: {err}", path.display())),
            )
        })?;
        Self::read(BufReader::new(file)).map_err(|err| err.context(path.display()))
    }

    /// Parse the title line, the count line, and classify the record layout
    /// from the token count of the line after them.
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = LineReader::new(reader);
        lines.expect_line("title")?;

        let (snap_count, node_count, output_interval, output_step, field_count) = {
            let tokens = lines.expect_tokens("header", 5)?;
            (
                tokens.parse::<usize>(0, "snapshot count")?,
                tokens.parse::<usize>(1, "node count")?,
                tokens.parse::<f64>(2, "output interval")?,
                tokens.parse::<i64>(3, "output step")?,
                tokens.parse::<usize>(4, "field count")?,
            )
        };

        for (count, what) in [
            (snap_count, "snapshot count"),
            (node_count, "node count"),
            (field_count, "field count"),
        ] {
            if count == 0 {
                return format_err!(BadHeader, format!("line 2: {what} must be positive"));
            }
        }
        let total = node_count
            .checked_mul(field_count)
            .and_then(|per_snapshot| per_snapshot.checked_mul(snap_count));
        if total.is_none() {
            return format_err!(
                BadHeader,
                "line 2: snapshot, node and field counts are too large".to_owned()
            );
        }

        let probe = lines.expect_tokens("first record", 2)?;
        let layout = if probe.len() == 2 {
            RecordLayout::Dense
        } else {
            RecordLayout::Sparse
        };

        Ok(SnapshotHeader {
            snap_count,
            node_count,
            output_interval,
            output_step,
            field_count,
            layout,
        })
    }

    /// Describe how two headers differ, or `None` if they are identical.
    pub fn mismatch(&self, other: &SnapshotHeader) -> Option<String> {
        let mut diffs = vec![];
        if self.snap_count != other.snap_count {
            diffs.push(format!("snap_count {} != {}", self.snap_count, other.snap_count));
        }
        if self.node_count != other.node_count {
            diffs.push(format!("node_count {} != {}", self.node_count, other.node_count));
        }
        if self.output_interval != other.output_interval {
            diffs.push(format!(
                "output_interval {} != {}",
                self.output_interval, other.output_interval
            ));
        }
        if self.output_step != other.output_step {
            diffs.push(format!(
                "output_step {} != {}",
                self.output_step, other.output_step
            ));
        }
        if self.field_count != other.field_count {
            diffs.push(format!(
                "field_count {} != {}",
                self.field_count, other.field_count
            ));
        }
        if self.layout != other.layout {
            diffs.push(format!("layout {:?} != {:?}", self.layout, other.layout));
        }

        if diffs.is_empty() {
            None
        } else {
            Some(diffs.join(", "))
        }
    }
}
