// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Reader for the position-dependent ASCII snapshot format: a title line,
//! a count line and `snap_count` records, each either dense (every node on
//! its own line) or sparse (only nodes that differ from a fill value).

mod header;
mod lines;
mod series;
mod snapshot;

pub(crate) use lines::LineReader;

pub use header::{HEADER_LINES, RecordLayout, SnapshotHeader};
pub use series::{load_series, variable_for_file};
pub use snapshot::{
    FillPolicy, SNAPSHOT_FIELD, Snapshot, SnapshotLayout, SnapshotReader, encode_series,
    encode_snapshot,
};
