// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use simcheck_core::{Array, Dataset, Error, ErrorCode, ErrorKind, Field, Result, format_err};

use crate::ascii::LineReader;

/// Read a `fort.14`-style mesh into `x`, `y`, `depth` `[node]` and
/// `element` `[element, 3]`. Boundary sections after the element table are
/// not read.
pub fn read_mesh_path(path: &Path) -> Result<Dataset> {
    let file = File::open(path).map_err(|err| {
        Error::new(
            ErrorKind::Format,
            ErrorCode::DoesNotExist,
            Some(format!("{}: {err}", path.display())),
        )
    })?;
    read_mesh(BufReader::new(file)).map_err(|err| err.context(path.display()))
}

pub fn read_mesh<R: BufRead>(reader: R) -> Result<Dataset> {
    let mut lines = LineReader::new(reader);
    lines.expect_line("mesh title")?;

    let (element_count, node_count) = {
        let tokens = lines.expect_tokens("mesh counts", 2)?;
        (
            tokens.parse::<usize>(0, "element count")?,
            tokens.parse::<usize>(1, "node count")?,
        )
    };

    let mut x = vec![];
    let mut y = vec![];
    let mut depth = vec![];
    for i in 0..node_count {
        let tokens = lines.expect_tokens("node", 4)?;
        let id = tokens.parse::<usize>(0, "node id")?;
        if id != i + 1 {
            return format_err!(
                NodeOutOfRange,
                format!("line {}: expected node {}, found {id}", tokens.line_no(), i + 1)
            );
        }
        x.push(tokens.parse::<f64>(1, "x")?);
        y.push(tokens.parse::<f64>(2, "y")?);
        depth.push(tokens.parse::<f64>(3, "depth")?);
    }

    let mut elements = vec![];
    for _ in 0..element_count {
        let tokens = lines.expect_tokens("element", 5)?;
        for j in 2..5 {
            let node = tokens.parse::<usize>(j, "element node")?;
            if node == 0 || node > node_count {
                return format_err!(
                    NodeOutOfRange,
                    format!(
                        "line {}: element references node {node} outside 1..={node_count}",
                        tokens.line_no()
                    )
                );
            }
            elements.push(node as f64);
        }
    }

    let mut mesh = Dataset::new();
    mesh.insert("x", Field::numeric(&["node"], Array::from_vec(&[node_count], x)?));
    mesh.insert("y", Field::numeric(&["node"], Array::from_vec(&[node_count], y)?));
    mesh.insert(
        "depth",
        Field::numeric(&["node"], Array::from_vec(&[node_count], depth)?),
    );
    mesh.insert(
        "element",
        Field::numeric(
            &["element", "vertex"],
            Array::from_vec(&[element_count, 3], elements)?,
        ),
    );
    Ok(mesh)
}

/// Number of nodes in a mesh returned by [`read_mesh`].
pub fn node_count(mesh: &Dataset) -> usize {
    mesh.numeric("x").map(Array::len).unwrap_or(0)
}
