// Copyright 2026 The Simcheck Authors. All rights reserved.
// Use of this source code is governed by the Apache License,
// Version 2.0, that can be found in the LICENSE file.

use std::collections::BTreeMap;

use crate::common::Result;

/// A dense N-dimensional array of `f64` stored row-major in one allocation.
#[derive(Clone, Debug, PartialEq)]
pub struct Array {
    shape: Vec<usize>,
    // one large allocation
    data: Box<[f64]>,
}

/// Number of values a shape holds, or an error if it cannot be addressed.
fn checked_len(shape: &[usize]) -> Result<usize> {
    match shape.iter().try_fold(1usize, |acc, &dim| acc.checked_mul(dim)) {
        Some(len) => Ok(len),
        None => crate::structural_err!(ShapeMismatch, format!("shape {shape:?} is too large")),
    }
}

impl Array {
    pub fn filled(shape: &[usize], value: f64) -> Result<Self> {
        let len = checked_len(shape)?;
        let mut data = Vec::new();
        if data.try_reserve_exact(len).is_err() {
            return crate::structural_err!(
                ShapeMismatch,
                format!("cannot allocate {len} values for shape {shape:?}")
            );
        }
        data.resize(len, value);
        Ok(Array {
            shape: shape.to_vec(),
            data: data.into_boxed_slice(),
        })
    }

    pub fn from_vec(shape: &[usize], data: Vec<f64>) -> Result<Self> {
        let len = checked_len(shape)?;
        if len != data.len() {
            return crate::structural_err!(
                ShapeMismatch,
                format!(
                    "shape {:?} holds {} values, got {}",
                    shape,
                    len,
                    data.len()
                )
            );
        }
        Ok(Array {
            shape: shape.to_vec(),
            data: data.into_boxed_slice(),
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn values(&self) -> &[f64] {
        &self.data
    }

    pub fn values_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    /// Length of the innermost dimension (1 for scalars).
    pub fn row_len(&self) -> usize {
        self.shape.last().copied().unwrap_or(1)
    }

    /// Iterate over rows of the innermost dimension.
    pub fn rows(&self) -> std::slice::Chunks<'_, f64> {
        self.data.chunks(self.row_len().max(1))
    }

    pub fn row(&self, i: usize) -> &[f64] {
        let n = self.row_len();
        &self.data[i * n..(i + 1) * n]
    }

    pub fn row_mut(&mut self, i: usize) -> &mut [f64] {
        let n = self.row_len();
        &mut self.data[i * n..(i + 1) * n]
    }

    /// Stack `parts` (all the same shape) along a new trailing axis.
    pub fn interleave(parts: &[&Array]) -> Result<Array> {
        let Some(first) = parts.first() else {
            return crate::structural_err!(ShapeMismatch, "nothing to interleave".to_owned());
        };
        if let Some(odd) = parts.iter().find(|p| p.shape != first.shape) {
            return crate::structural_err!(
                ShapeMismatch,
                format!("component shapes {:?} and {:?}", first.shape, odd.shape)
            );
        }
        let mut data = Vec::with_capacity(first.len() * parts.len());
        for i in 0..first.len() {
            data.extend(parts.iter().map(|p| p.data[i]));
        }
        let mut shape = first.shape.clone();
        shape.push(parts.len());
        Array::from_vec(&shape, data)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldData {
    Numeric(Array),
    /// Character data (labels, time strings); never compared.
    Text { shape: Vec<usize>, bytes: Vec<u8> },
}

#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub dims: Vec<String>,
    pub data: FieldData,
}

impl Field {
    pub fn numeric(dims: &[&str], array: Array) -> Self {
        Field {
            dims: dims.iter().map(|d| d.to_string()).collect(),
            data: FieldData::Numeric(array),
        }
    }

    pub fn as_numeric(&self) -> Option<&Array> {
        match &self.data {
            FieldData::Numeric(array) => Some(array),
            FieldData::Text { .. } => None,
        }
    }

    pub fn shape(&self) -> &[usize] {
        match &self.data {
            FieldData::Numeric(array) => array.shape(),
            FieldData::Text { shape, .. } => shape,
        }
    }
}

/// Named fields of one result set, ordered by name.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Dataset {
    fields: BTreeMap<String, Field>,
}

impl Dataset {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, field: Field) -> Option<Field> {
        self.fields.insert(name.into(), field)
    }

    pub fn remove(&mut self, name: &str) -> Option<Field> {
        self.fields.remove(name)
    }

    pub fn get(&self, name: &str) -> Option<&Field> {
        self.fields.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn numeric(&self, name: &str) -> Option<&Array> {
        self.get(name).and_then(Field::as_numeric)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Field)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(|k| k.as_str())
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::ErrorCode;

    #[test]
    fn from_vec_checks_length() {
        let err = Array::from_vec(&[2, 3], vec![0.0; 5]).unwrap_err();
        assert_eq!(ErrorCode::ShapeMismatch, err.code);

        let a = Array::from_vec(&[2, 3], (0..6).map(|i| i as f64).collect()).unwrap();
        assert_eq!(&[3.0, 4.0, 5.0], a.row(1));
        assert_eq!(2, a.rows().count());
    }

    #[test]
    fn oversized_shapes_are_errors() {
        let huge = 1usize << 32;
        let err = Array::filled(&[huge, huge], 0.0).unwrap_err();
        assert_eq!(ErrorCode::ShapeMismatch, err.code);
        assert!(Array::from_vec(&[huge, huge, 2], vec![]).is_err());
        assert!(Array::filled(&[usize::MAX / 4], f64::NAN).is_err());

        let a = Array::filled(&[2, 0], 1.0).unwrap();
        assert!(a.is_empty());
    }

    #[test]
    fn interleave_components() {
        let u = Array::from_vec(&[3], vec![1.0, 2.0, 3.0]).unwrap();
        let v = Array::from_vec(&[3], vec![-1.0, -2.0, -3.0]).unwrap();
        let uv = Array::interleave(&[&u, &v]).unwrap();
        assert_eq!(&[3, 2], uv.shape());
        assert_eq!(&[2.0, -2.0], uv.row(1));

        let short = Array::from_vec(&[2], vec![1.0, 2.0]).unwrap();
        assert!(Array::interleave(&[&u, &short]).is_err());
    }

    #[test]
    fn dataset_ordering() {
        let mut ds = Dataset::new();
        ds.insert("zeta", Field::numeric(&["node"], Array::filled(&[2], 0.0).unwrap()));
        ds.insert(
            "time",
            Field {
                dims: vec!["time".to_owned()],
                data: FieldData::Text {
                    shape: vec![4],
                    bytes: b"2026".to_vec(),
                },
            },
        );
        let names: Vec<&str> = ds.names().collect();
        assert_eq!(vec!["time", "zeta"], names);
        assert!(ds.numeric("time").is_none());
        assert_eq!(Some(&[2usize][..]), ds.numeric("zeta").map(|a| a.shape()));
    }
}
