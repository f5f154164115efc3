// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! NetCDF classic and 64-bit offset files, read without libnetcdf.

use std::path::Path;

use netcdf3::{DataType, DataVector, FileReader, ReadError, Variable};

use simcheck_core::{Error, ErrorCode, ErrorKind, Result};

use super::{Packing, RawData, RawVariable, is_topology};

fn read_error(err: ReadError) -> Error {
    let code = match err {
        ReadError::ParseHeader(_) => ErrorCode::BadHeader,
        ReadError::IOErrorKind(_) => ErrorCode::Io,
        _ => ErrorCode::UnsupportedFormat,
    };
    Error::new(ErrorKind::Format, code, Some(err.to_string()))
}

/// First value of a numeric attribute, whatever its stored type.
fn attr_f64(var: &Variable, name: &str) -> Option<f64> {
    let attr = var.get_attr(name)?;
    match attr.data_type() {
        DataType::I8 => attr.get_i8()?.first().map(|v| f64::from(*v)),
        DataType::U8 => None,
        DataType::I16 => attr.get_i16()?.first().map(|v| f64::from(*v)),
        DataType::I32 => attr.get_i32()?.first().map(|v| f64::from(*v)),
        DataType::F32 => attr.get_f32()?.first().map(|v| f64::from(*v)),
        DataType::F64 => attr.get_f64()?.first().copied(),
    }
}

fn packing(var: &Variable) -> Packing {
    Packing {
        fill: attr_f64(var, "_FillValue"),
        missing: attr_f64(var, "missing_value"),
        scale: attr_f64(var, "scale_factor"),
        offset: attr_f64(var, "add_offset"),
    }
}

fn widen(data: DataVector) -> std::result::Result<Vec<f64>, Vec<u8>> {
    match data {
        DataVector::I8(v) => Ok(v.into_iter().map(f64::from).collect()),
        DataVector::U8(v) => Err(v),
        DataVector::I16(v) => Ok(v.into_iter().map(f64::from).collect()),
        DataVector::I32(v) => Ok(v.into_iter().map(f64::from).collect()),
        DataVector::F32(v) => Ok(v.into_iter().map(f64::from).collect()),
        DataVector::F64(v) => Ok(v),
    }
}

pub(super) fn read_variables(path: &Path) -> Result<Vec<RawVariable>> {
    let mut reader = FileReader::open(path).map_err(read_error)?;

    let mut variables = vec![];
    for name in reader.data_set().get_var_names() {
        if is_topology(&name) {
            continue;
        }
        let data = reader.read_var(&name).map_err(read_error)?;
        let Some(var) = reader.data_set().get_var(&name) else {
            continue;
        };
        let data = match widen(data) {
            Ok(values) => RawData::Numeric {
                values,
                packing: packing(var),
            },
            Err(bytes) => RawData::Text(bytes),
        };
        variables.push(RawVariable {
            dims: var.dim_names(),
            shape: var.get_dims().iter().map(|d| d.size()).collect(),
            name,
            data,
        });
    }
    let _ = reader.close();
    Ok(variables)
}
