// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

//! Loader for NetCDF output files.
//!
//! Classic and 64-bit offset files are read directly. NetCDF-4 files are
//! HDF5 containers and are read through libnetcdf when the `netcdf4`
//! feature is enabled.
//!
//! Every numeric variable becomes an `f64` field: packed values are
//! unpacked with `scale_factor`/`add_offset`, and values equal to the
//! variable's `_FillValue` or `missing_value` become NaN. Two files written
//! with different fill conventions or formats therefore load to the same
//! dataset.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use simcheck_core::{
    Array, Dataset, Error, ErrorCode, ErrorKind, Field, FieldData, Result, format_err,
};

mod classic;
#[cfg(feature = "netcdf4")]
mod nc4;

/// Mesh topology carried by every output file; identical by construction
/// and irrelevant to the comparison.
pub const TOPOLOGY_FIELDS: &[&str] = &[
    "neta",
    "nvel",
    "nvdll",
    "max_nvdll",
    "ibtype",
    "nbdv",
    "nvell",
    "nbvv",
    "ibtypee",
    "max_nvell",
];

/// `(x component, y component, combined name)`
const VECTOR_PAIRS: &[(&str, &str, &str)] =
    &[("u-vel", "v-vel", "vel"), ("windx", "windy", "wind")];

const COMPONENT_DIM: &str = "component";

const CLASSIC_MAGIC: &[u8; 4] = b"CDF\x01";
const OFFSET64_MAGIC: &[u8; 4] = b"CDF\x02";
const HDF5_MAGIC: &[u8; 4] = b"\x89HDF";

pub fn is_netcdf_path(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "nc")
}

fn is_topology(name: &str) -> bool {
    TOPOLOGY_FIELDS.contains(&name)
}

/// Attributes mapping stored values to physical ones.
#[derive(Copy, Clone, Debug, Default, PartialEq)]
struct Packing {
    fill: Option<f64>,
    missing: Option<f64>,
    scale: Option<f64>,
    offset: Option<f64>,
}

impl Packing {
    fn unpack(&self, values: &mut [f64]) {
        let scale = self.scale.unwrap_or(1.0);
        let offset = self.offset.unwrap_or(0.0);
        for v in values.iter_mut() {
            if Some(*v) == self.fill || Some(*v) == self.missing {
                *v = f64::NAN;
            } else {
                *v = *v * scale + offset;
            }
        }
    }
}

enum RawData {
    Numeric { values: Vec<f64>, packing: Packing },
    Text(Vec<u8>),
}

/// A variable as stored, before unpacking.
struct RawVariable {
    name: String,
    dims: Vec<String>,
    shape: Vec<usize>,
    data: RawData,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Container {
    Classic,
    Hdf5,
}

fn sniff(path: &Path) -> Result<Container> {
    let mut file = File::open(path).map_err(|err| {
        Error::new(
            ErrorKind::Format,
            ErrorCode::DoesNotExist,
            Some(err.to_string()),
        )
    })?;
    let mut magic = [0u8; 4];
    if file.read_exact(&mut magic).is_err() {
        return format_err!(BadHeader, "shorter than a NetCDF header".to_owned());
    }
    match &magic {
        m if m == CLASSIC_MAGIC || m == OFFSET64_MAGIC => Ok(Container::Classic),
        m if m == HDF5_MAGIC => Ok(Container::Hdf5),
        _ => format_err!(UnsupportedFormat, "not a NetCDF file".to_owned()),
    }
}

#[cfg(feature = "netcdf4")]
fn read_hdf5(path: &Path) -> Result<Vec<RawVariable>> {
    nc4::read_variables(path)
}

#[cfg(not(feature = "netcdf4"))]
fn read_hdf5(_path: &Path) -> Result<Vec<RawVariable>> {
    format_err!(
        UnsupportedFormat,
        "NetCDF-4/HDF5 file, rebuild with the `netcdf4` feature to read it".to_owned()
    )
}

fn pair_vectors(dataset: &mut Dataset) -> Result<()> {
    for &(x, y, combined) in VECTOR_PAIRS {
        let (Some(u), Some(v)) = (dataset.numeric(x), dataset.numeric(y)) else {
            continue;
        };
        let array = Array::interleave(&[u, v]).map_err(|err| err.context(combined))?;
        let mut dims = dataset.get(x).map(|f| f.dims.clone()).unwrap_or_default();
        dims.push(COMPONENT_DIM.to_owned());

        dataset.remove(x);
        dataset.remove(y);
        dataset.insert(
            combined,
            Field {
                dims,
                data: FieldData::Numeric(array),
            },
        );
    }
    Ok(())
}

/// Load every variable of a NetCDF file except the mesh topology.
pub fn load_netcdf(path: &Path) -> Result<Dataset> {
    load(path).map_err(|err| err.context(path.display()))
}

fn load(path: &Path) -> Result<Dataset> {
    let container = sniff(path)?;
    let variables = match container {
        Container::Classic => classic::read_variables(path)?,
        Container::Hdf5 => read_hdf5(path)?,
    };

    let mut dataset = Dataset::new();
    for RawVariable {
        name,
        dims,
        shape,
        data,
    } in variables
    {
        let data = match data {
            RawData::Numeric {
                mut values,
                packing,
            } => {
                packing.unpack(&mut values);
                let array = Array::from_vec(&shape, values).map_err(|err| err.context(&name))?;
                FieldData::Numeric(array)
            }
            RawData::Text(bytes) => FieldData::Text { shape, bytes },
        };
        dataset.insert(name, Field { dims, data });
    }

    pair_vectors(&mut dataset)?;
    tracing::debug!(fields = dataset.len(), ?container, "loaded NetCDF dataset");
    Ok(dataset)
}


#[cfg(test)]
mod tests {
    use super::*;
    use netcdf3::{DataSet, FileWriter, Version};

    #[test]
    fn fill_conventions_compare_equal() {
        let dir = tempfile::tempdir().unwrap();
        let a = dir.path().join("a.nc");
        let b = dir.path().join("b.nc");
        fixtures::write_nodes(&a, &[("zeta", vec![1.0, -99999.0, 3.0], Some(-99999.0))]);
        fixtures::write_nodes(&b, &[("zeta", vec![1.0, 9.0e36, 3.0], Some(9.0e36))]);

        let a = load_netcdf(&a).unwrap();
        let b = load_netcdf(&b).unwrap();
        let za = a.numeric("zeta").unwrap().values();
        let zb = b.numeric("zeta").unwrap().values();
        assert!(za[1].is_nan() && zb[1].is_nan());
        assert_eq!(za[0], zb[0]);
        assert_eq!(za[2], zb[2]);
    }

    #[test]
    fn topology_dropped_and_vectors_paired() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fort.64.nc");
        fixtures::write_nodes(
            &path,
            &[
                ("u-vel", vec![1.0, 2.0], None),
                ("v-vel", vec![-1.0, -2.0], None),
                ("nvdll", vec![0.0, 0.0], None),
            ],
        );
        let ds = load_netcdf(&path).unwrap();
        assert!(!ds.contains("nvdll"));
        assert!(!ds.contains("u-vel"));
        let vel = ds.get("vel").unwrap();
        assert_eq!(vec!["node".to_owned(), "component".to_owned()], vel.dims);
        assert_eq!(&[2.0, -2.0], vel.as_numeric().unwrap().row(1));
    }

    #[test]
    fn packed_and_text_variables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("packed.nc");
        let mut ds = DataSet::new();
        ds.add_fixed_dim("node", 2).unwrap();
        ds.add_fixed_dim("len", 4).unwrap();
        ds.add_var_i16("depth", &["node"]).unwrap();
        ds.add_var_attr_f64("depth", "scale_factor", vec![0.5]).unwrap();
        ds.add_var_attr_f64("depth", "add_offset", vec![10.0]).unwrap();
        ds.add_var_attr_i16("depth", "missing_value", vec![-1]).unwrap();
        ds.add_var_u8("label", &["len"]).unwrap();
        let mut writer = FileWriter::open(&path).unwrap();
        writer.set_def(&ds, Version::Classic, 0).unwrap();
        writer.write_var_i16("depth", &[4, -1]).unwrap();
        writer.write_var_u8("label", b"mesh").unwrap();
        writer.close().unwrap();

        let loaded = load_netcdf(&path).unwrap();
        let depth = loaded.numeric("depth").unwrap().values();
        assert_eq!(12.0, depth[0]);
        assert!(depth[1].is_nan());
        assert!(loaded.numeric("label").is_none());
        assert_eq!(&[4usize][..], loaded.get("label").unwrap().shape());
    }

    #[test]
    fn unpack_applies_scale_after_masking() {
        let packing = Packing {
            fill: Some(-1.0),
            scale: Some(2.0),
            offset: Some(1.0),
            ..Default::default()
        };
        let mut values = [-1.0, 0.0, 3.0];
        packing.unpack(&mut values);
        assert!(values[0].is_nan());
        assert_eq!(&[1.0, 7.0], &values[1..]);
    }

    #[test]
    fn hdf5_container_recognized() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("maxele.63.nc");
        std::fs::write(&path, b"\x89HDF\r\n\x1a\n....").unwrap();
        assert_eq!(Container::Hdf5, sniff(&path).unwrap());

        let err = load_netcdf(&path).unwrap_err();
        assert_eq!(ErrorKind::Format, err.kind);
        assert_eq!(ErrorCode::UnsupportedFormat, err.code);
        let details = err.details.unwrap();
        assert_eq!(1, details.matches("maxele.63.nc").count(), "{details}");
    }

    #[test]
    fn unknown_magic_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fort.63.nc");
        std::fs::write(&path, b"title\n1 2 3600.0 720 1\n").unwrap();
        let err = load_netcdf(&path).unwrap_err();
        assert_eq!(ErrorCode::UnsupportedFormat, err.code);
        assert!(err.details.unwrap().contains("not a NetCDF file"));
    }

    #[test]
    fn missing_file() {
        let err = load_netcdf(Path::new("/nonexistent/fort.63.nc")).unwrap_err();
        assert_eq!(ErrorCode::DoesNotExist, err.code);
    }

    #[test]
    fn netcdf_extension() {
        assert!(is_netcdf_path(Path::new("run/fort.63.nc")));
        assert!(!is_netcdf_path(Path::new("run/fort.63")));
    }
}
