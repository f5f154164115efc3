// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! NetCDF-4 (HDF5) files, read through libnetcdf.

use std::path::Path;

use ::netcdf::types::NcVariableType;
use ::netcdf::{AttributeValue, Variable};

use simcheck_core::{Error, ErrorCode, ErrorKind, Result};

use super::{Packing, RawData, RawVariable, is_topology};

fn nc_error(err: ::netcdf::Error) -> Error {
    Error::new(
        ErrorKind::Format,
        ErrorCode::UnsupportedFormat,
        Some(err.to_string()),
    )
}

fn attr_f64(var: &Variable, name: &str) -> Result<Option<f64>> {
    let Some(value) = var.attribute_value(name).transpose().map_err(nc_error)? else {
        return Ok(None);
    };
    let value = match value {
        AttributeValue::Doubles(v) => v.first().copied(),
        AttributeValue::Floats(v) => v.first().map(|v| f64::from(*v)),
        AttributeValue::Ints(v) => v.first().map(|v| f64::from(*v)),
        AttributeValue::Shorts(v) => v.first().map(|v| f64::from(*v)),
        scalar => f64::try_from(scalar).ok(),
    };
    Ok(value)
}

fn packing(var: &Variable) -> Result<Packing> {
    Ok(Packing {
        fill: attr_f64(var, "_FillValue")?,
        missing: attr_f64(var, "missing_value")?,
        scale: attr_f64(var, "scale_factor")?,
        offset: attr_f64(var, "add_offset")?,
    })
}

pub(super) fn read_variables(path: &Path) -> Result<Vec<RawVariable>> {
    let file = ::netcdf::open(path).map_err(nc_error)?;

    let mut variables = vec![];
    for var in file.variables() {
        let name = var.name();
        if is_topology(&name) {
            continue;
        }
        let data = match var.vartype() {
            NcVariableType::Int(_) | NcVariableType::Float(_) => RawData::Numeric {
                values: var.get_values::<f64, _>(..).map_err(nc_error)?,
                packing: packing(&var)?,
            },
            NcVariableType::Char => RawData::Text(var.get_raw_values(..).map_err(nc_error)?),
            other => {
                tracing::debug!(variable = %name, vartype = ?other, "skipping variable");
                continue;
            }
        };
        variables.push(RawVariable {
            dims: var.dimensions().iter().map(|d| d.name()).collect(),
            shape: var.dimensions().iter().map(|d| d.len()).collect(),
            name,
            data,
        });
    }
    file.close().map_err(nc_error)?;
    Ok(variables)
}
