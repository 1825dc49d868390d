//! C2: a named, typed, multi-dimensional variable.
//!
//! The data buffer is a flat, contiguous, row-major (last axis varies
//! fastest) vector; all shape-changing operations below rebuild that buffer
//! by computing, for each element of the new shape, which element (if any)
//! of the old shape it comes from.

use crate::dims::{DataType, DimensionKind, MAX_DIMS};
use crate::error::HarpError;

/// The owned, contiguous element buffer backing a [`Variable`].
#[derive(Debug, Clone, PartialEq)]
pub enum DataBuffer {
    Int8(Vec<i8>),
    Int16(Vec<i16>),
    Int32(Vec<i32>),
    Float32(Vec<f32>),
    Float64(Vec<f64>),
    String(Vec<String>),
}

impl DataBuffer {
    pub fn dtype(&self) -> DataType {
        match self {
            DataBuffer::Int8(_) => DataType::Int8,
            DataBuffer::Int16(_) => DataType::Int16,
            DataBuffer::Int32(_) => DataType::Int32,
            DataBuffer::Float32(_) => DataType::Float32,
            DataBuffer::Float64(_) => DataType::Float64,
            DataBuffer::String(_) => DataType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            DataBuffer::Int8(v) => v.len(),
            DataBuffer::Int16(v) => v.len(),
            DataBuffer::Int32(v) => v.len(),
            DataBuffer::Float32(v) => v.len(),
            DataBuffer::Float64(v) => v.len(),
            DataBuffer::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn zeros(dtype: DataType, n: usize) -> Self {
        match dtype {
            DataType::Int8 => DataBuffer::Int8(vec![0; n]),
            DataType::Int16 => DataBuffer::Int16(vec![0; n]),
            DataType::Int32 => DataBuffer::Int32(vec![0; n]),
            DataType::Float32 => DataBuffer::Float32(vec![0.0; n]),
            DataType::Float64 => DataBuffer::Float64(vec![0.0; n]),
            DataType::String => DataBuffer::String(vec![String::new(); n]),
        }
    }

    pub fn as_f64(&self) -> Option<Vec<f64>> {
        match self {
            DataBuffer::Int8(v) => Some(v.iter().map(|&x| x as f64).collect()),
            DataBuffer::Int16(v) => Some(v.iter().map(|&x| x as f64).collect()),
            DataBuffer::Int32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            DataBuffer::Float32(v) => Some(v.iter().map(|&x| x as f64).collect()),
            DataBuffer::Float64(v) => Some(v.clone()),
            DataBuffer::String(_) => None,
        }
    }

    pub fn as_strings(&self) -> Option<&[String]> {
        match self {
            DataBuffer::String(v) => Some(v.as_slice()),
            _ => None,
        }
    }

    /// Gather elements into a new buffer of `new_total` elements, one
    /// source index per output position.
    fn gather(&self, new_total: usize, mapping: impl Fn(usize) -> usize) -> DataBuffer {
        match self {
            DataBuffer::Int8(v) => DataBuffer::Int8((0..new_total).map(|i| v[mapping(i)]).collect()),
            DataBuffer::Int16(v) => DataBuffer::Int16((0..new_total).map(|i| v[mapping(i)]).collect()),
            DataBuffer::Int32(v) => DataBuffer::Int32((0..new_total).map(|i| v[mapping(i)]).collect()),
            DataBuffer::Float32(v) => DataBuffer::Float32((0..new_total).map(|i| v[mapping(i)]).collect()),
            DataBuffer::Float64(v) => DataBuffer::Float64((0..new_total).map(|i| v[mapping(i)]).collect()),
            DataBuffer::String(v) => {
                DataBuffer::String((0..new_total).map(|i| v[mapping(i)].clone()).collect())
            }
        }
    }

    /// Like [`Self::gather`] but allows `mapping` to signal "no source" for
    /// an output position, in which case a zero/empty fill is used.
    fn resize_gather(&self, new_total: usize, mapping: impl Fn(usize) -> Option<usize>) -> DataBuffer {
        match self {
            DataBuffer::Int8(v) => DataBuffer::Int8(
                (0..new_total).map(|i| mapping(i).map(|j| v[j]).unwrap_or(0)).collect(),
            ),
            DataBuffer::Int16(v) => DataBuffer::Int16(
                (0..new_total).map(|i| mapping(i).map(|j| v[j]).unwrap_or(0)).collect(),
            ),
            DataBuffer::Int32(v) => DataBuffer::Int32(
                (0..new_total).map(|i| mapping(i).map(|j| v[j]).unwrap_or(0)).collect(),
            ),
            DataBuffer::Float32(v) => DataBuffer::Float32(
                (0..new_total).map(|i| mapping(i).map(|j| v[j]).unwrap_or(0.0)).collect(),
            ),
            DataBuffer::Float64(v) => DataBuffer::Float64(
                (0..new_total).map(|i| mapping(i).map(|j| v[j]).unwrap_or(0.0)).collect(),
            ),
            DataBuffer::String(v) => DataBuffer::String(
                (0..new_total)
                    .map(|i| mapping(i).map(|j| v[j].clone()).unwrap_or_default())
                    .collect(),
            ),
        }
    }

    fn concat(&self, other: &DataBuffer) -> Result<DataBuffer, HarpError> {
        match (self, other) {
            (DataBuffer::Int8(a), DataBuffer::Int8(b)) => {
                Ok(DataBuffer::Int8(a.iter().chain(b.iter()).copied().collect()))
            }
            (DataBuffer::Int16(a), DataBuffer::Int16(b)) => {
                Ok(DataBuffer::Int16(a.iter().chain(b.iter()).copied().collect()))
            }
            (DataBuffer::Int32(a), DataBuffer::Int32(b)) => {
                Ok(DataBuffer::Int32(a.iter().chain(b.iter()).copied().collect()))
            }
            (DataBuffer::Float32(a), DataBuffer::Float32(b)) => {
                Ok(DataBuffer::Float32(a.iter().chain(b.iter()).copied().collect()))
            }
            (DataBuffer::Float64(a), DataBuffer::Float64(b)) => {
                Ok(DataBuffer::Float64(a.iter().chain(b.iter()).copied().collect()))
            }
            (DataBuffer::String(a), DataBuffer::String(b)) => {
                Ok(DataBuffer::String(a.iter().chain(b.iter()).cloned().collect()))
            }
            _ => Err(HarpError::invalid_argument(
                "cannot append variables with different data types",
            )),
        }
    }
}

/// A named, typed, multi-dimensional array with unit, valid range, and
/// optional enumeration labels.
#[derive(Debug, Clone)]
pub struct Variable {
    pub name: String,
    pub dim_kinds: Vec<DimensionKind>,
    pub dim_lengths: Vec<usize>,
    pub unit: Option<String>,
    pub valid_range: Option<(f64, f64)>,
    pub enumeration: Option<Vec<String>>,
    pub description: Option<String>,
    data: DataBuffer,
}

/// Row-major flat index <-> multi-index conversions (last axis fastest).
fn multi_to_flat(idx: &[usize], shape: &[usize]) -> usize {
    let mut flat = 0;
    for i in 0..shape.len() {
        flat = flat * shape[i] + idx[i];
    }
    flat
}

fn flat_to_multi(mut flat: usize, shape: &[usize]) -> Vec<usize> {
    let mut idx = vec![0; shape.len()];
    for i in (0..shape.len()).rev() {
        idx[i] = flat % shape[i].max(1);
        flat /= shape[i].max(1);
    }
    idx
}

impl Variable {
    pub fn new(
        name: impl Into<String>,
        dtype: DataType,
        dim_kinds: Vec<DimensionKind>,
        dim_lengths: Vec<usize>,
    ) -> Result<Self, HarpError> {
        let name = name.into();
        if name.is_empty() {
            return Err(HarpError::invalid_argument("variable name must not be empty"));
        }
        if dim_kinds.len() != dim_lengths.len() {
            return Err(HarpError::invalid_argument(
                "dim_kinds and dim_lengths must have the same length",
            ));
        }
        if dim_kinds.len() > MAX_DIMS {
            return Err(HarpError::invalid_argument(format!(
                "variable '{name}' has {} dimensions, exceeds MAX_DIMS={MAX_DIMS}",
                dim_kinds.len()
            )));
        }
        let total: usize = dim_lengths.iter().product();
        Ok(Variable {
            name,
            dim_kinds,
            dim_lengths,
            unit: None,
            valid_range: None,
            enumeration: None,
            description: None,
            data: DataBuffer::zeros(dtype, total),
        })
    }

    pub fn dtype(&self) -> DataType {
        self.data.dtype()
    }

    pub fn num_dimensions(&self) -> usize {
        self.dim_kinds.len()
    }

    pub fn num_elements(&self) -> usize {
        self.dim_lengths.iter().product()
    }

    pub fn data(&self) -> &DataBuffer {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut DataBuffer {
        &mut self.data
    }

    pub fn set_data(&mut self, data: DataBuffer) -> Result<(), HarpError> {
        if data.len() != self.num_elements() {
            return Err(HarpError::invalid_variable(
                &self.name,
                format!(
                    "replacement buffer has {} elements, expected {}",
                    data.len(),
                    self.num_elements()
                ),
            ));
        }
        self.data = data;
        Ok(())
    }

    pub fn has_dimension_signature(&self, kinds: &[DimensionKind], independent_length: Option<usize>) -> bool {
        if self.dim_kinds.len() != kinds.len() {
            return false;
        }
        for (i, k) in kinds.iter().enumerate() {
            if self.dim_kinds[i] != *k {
                return false;
            }
            if *k == DimensionKind::Independent {
                if let Some(len) = independent_length {
                    if self.dim_lengths[i] != len {
                        return false;
                    }
                }
            }
        }
        true
    }

    /// Deep copy, equivalent to `Clone`, exposed under the spec's name.
    pub fn copy(&self) -> Variable {
        self.clone()
    }

    pub fn set_unit(&mut self, unit: Option<String>) -> Result<(), HarpError> {
        if unit.is_some() && !self.dtype().is_numeric() {
            return Err(HarpError::invalid_variable(
                &self.name,
                "cannot set a unit on a string variable",
            ));
        }
        self.unit = unit;
        Ok(())
    }

    pub fn has_unit(&self, unit: &str) -> bool {
        self.unit.as_deref() == Some(unit)
    }

    pub fn set_enumeration(&mut self, labels: Vec<String>) -> Result<(), HarpError> {
        if matches!(self.dtype(), DataType::Float32 | DataType::Float64 | DataType::String) {
            return Err(HarpError::invalid_variable(
                &self.name,
                "enumeration vocabularies require an integer data type",
            ));
        }
        self.enumeration = Some(labels);
        Ok(())
    }

    /// Insert a new axis at `index`, replicating the existing data `length`
    /// times along it. Total element count multiplies by `length`.
    pub fn add_dimension(&mut self, index: usize, kind: DimensionKind, length: usize) -> Result<(), HarpError> {
        if index > self.dim_kinds.len() {
            return Err(HarpError::invalid_argument(format!(
                "dimension index {index} out of range for {} dimensions",
                self.dim_kinds.len()
            )));
        }
        if self.dim_kinds.len() + 1 > MAX_DIMS {
            return Err(HarpError::invalid_argument(format!(
                "adding a dimension would exceed MAX_DIMS={MAX_DIMS}"
            )));
        }
        let old_shape = self.dim_lengths.clone();
        let mut new_shape = old_shape.clone();
        new_shape.insert(index, length);
        let new_total: usize = new_shape.iter().product();

        let data = self.data.gather(new_total, |flat| {
            let new_idx = flat_to_multi(flat, &new_shape);
            let mut old_idx = new_idx.clone();
            old_idx.remove(index);
            multi_to_flat(&old_idx, &old_shape)
        });

        self.dim_kinds.insert(index, kind);
        self.dim_lengths = new_shape;
        self.data = data;
        Ok(())
    }

    /// Remove axis `index`; only legal when that axis has length 1.
    pub fn remove_dimension(&mut self, index: usize) -> Result<(), HarpError> {
        if index >= self.dim_kinds.len() {
            return Err(HarpError::invalid_argument(format!(
                "dimension index {index} out of range"
            )));
        }
        if self.dim_lengths[index] != 1 {
            return Err(HarpError::invalid_argument(format!(
                "can only remove a dimension of length 1, axis {index} has length {}",
                self.dim_lengths[index]
            )));
        }
        self.dim_kinds.remove(index);
        self.dim_lengths.remove(index);
        // Removing a length-1 axis never reorders elements.
        Ok(())
    }

    /// Truncate or zero/empty-extend along `index`.
    pub fn resize_dimension(&mut self, index: usize, new_length: usize) -> Result<(), HarpError> {
        if index >= self.dim_kinds.len() {
            return Err(HarpError::invalid_argument(format!(
                "dimension index {index} out of range"
            )));
        }
        let old_shape = self.dim_lengths.clone();
        let old_len = old_shape[index];
        let mut new_shape = old_shape.clone();
        new_shape[index] = new_length;
        let new_total: usize = new_shape.iter().product();

        let data = self.data.resize_gather(new_total, |flat| {
            let new_idx = flat_to_multi(flat, &new_shape);
            if new_idx[index] < old_len {
                Some(multi_to_flat(&new_idx, &old_shape))
            } else {
                None
            }
        });

        self.dim_lengths = new_shape;
        self.data = data;
        Ok(())
    }

    /// Permute/select slices along `index` according to `ids`, producing an
    /// axis of length `ids.len()`.
    pub fn rearrange_dimension(&mut self, index: usize, ids: &[usize]) -> Result<(), HarpError> {
        if index >= self.dim_kinds.len() {
            return Err(HarpError::invalid_argument(format!(
                "dimension index {index} out of range"
            )));
        }
        let old_shape = self.dim_lengths.clone();
        let old_len = old_shape[index];
        for &id in ids {
            if id >= old_len {
                return Err(HarpError::invalid_argument(format!(
                    "rearrange id {id} out of range for axis of length {old_len}"
                )));
            }
        }
        let mut new_shape = old_shape.clone();
        new_shape[index] = ids.len();
        let new_total: usize = new_shape.iter().product();

        let data = self.data.gather(new_total, |flat| {
            let mut idx = flat_to_multi(flat, &new_shape);
            idx[index] = ids[idx[index]];
            multi_to_flat(&idx, &old_shape)
        });

        self.dim_lengths = new_shape;
        self.data = data;
        Ok(())
    }

    /// Shorthand for `rearrange_dimension` built from a boolean mask.
    pub fn filter_dimension(&mut self, index: usize, mask: &[bool]) -> Result<(), HarpError> {
        if index >= self.dim_kinds.len() {
            return Err(HarpError::invalid_argument(format!(
                "dimension index {index} out of range"
            )));
        }
        if mask.len() != self.dim_lengths[index] {
            return Err(HarpError::invalid_argument(format!(
                "mask length {} does not match axis length {}",
                mask.len(),
                self.dim_lengths[index]
            )));
        }
        let ids: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, &keep)| keep.then_some(i))
            .collect();
        self.rearrange_dimension(index, &ids)
    }

    /// Reorder axes: `order[i]` is the old axis index that becomes new axis `i`.
    pub fn transpose(&mut self, order: &[usize]) -> Result<(), HarpError> {
        if order.len() != self.dim_kinds.len() {
            return Err(HarpError::invalid_argument(
                "transpose order must name every axis exactly once",
            ));
        }
        let mut seen = vec![false; order.len()];
        for &o in order {
            if o >= order.len() || seen[o] {
                return Err(HarpError::invalid_argument(
                    "transpose order must be a permutation of 0..num_dimensions",
                ));
            }
            seen[o] = true;
        }

        let old_shape = self.dim_lengths.clone();
        let old_kinds = self.dim_kinds.clone();
        let new_shape: Vec<usize> = order.iter().map(|&o| old_shape[o]).collect();
        let new_kinds: Vec<DimensionKind> = order.iter().map(|&o| old_kinds[o]).collect();
        let new_total: usize = new_shape.iter().product();

        let data = self.data.gather(new_total, |flat| {
            let new_idx = flat_to_multi(flat, &new_shape);
            let mut old_idx = vec![0usize; order.len()];
            for (i, &o) in order.iter().enumerate() {
                old_idx[o] = new_idx[i];
            }
            multi_to_flat(&old_idx, &old_shape)
        });

        self.dim_kinds = new_kinds;
        self.dim_lengths = new_shape;
        self.data = data;
        Ok(())
    }

    /// Concatenate `other` onto `self` along the first axis.
    pub fn append(&mut self, other: &Variable) -> Result<(), HarpError> {
        if self.dtype() != other.dtype() {
            return Err(HarpError::invalid_argument(format!(
                "cannot append variable '{}' of type {} onto '{}' of type {}",
                other.name, other.dtype(), self.name, self.dtype()
            )));
        }
        if self.unit != other.unit {
            return Err(HarpError::invalid_argument(format!(
                "cannot append variable '{}': units differ ({:?} vs {:?})",
                other.name, other.unit, self.unit
            )));
        }
        if self.dim_kinds.len() != other.dim_kinds.len() || self.dim_kinds[1..] != other.dim_kinds[1..] {
            return Err(HarpError::invalid_argument(format!(
                "cannot append variable '{}': dimension signatures (excluding the first axis) differ",
                other.name
            )));
        }
        if self.dim_lengths[1..] != other.dim_lengths[1..] {
            return Err(HarpError::invalid_argument(format!(
                "cannot append variable '{}': non-leading dimension lengths differ",
                other.name
            )));
        }
        self.data = self.data.concat(&other.data)?;
        if self.dim_lengths.is_empty() {
            self.dim_lengths.push(other.num_elements());
            self.dim_kinds.push(other.dim_kinds.first().copied().unwrap_or(DimensionKind::Time));
        } else {
            self.dim_lengths[0] += other.dim_lengths[0];
        }
        Ok(())
    }

    /// Structural invariants: non-empty name, consistent shape/buffer length,
    /// valid UTF-8 strings (guaranteed by `String`), dims within MAX_DIMS.
    pub fn verify(&self) -> Result<(), HarpError> {
        if self.name.is_empty() {
            return Err(HarpError::invalid_variable("<unnamed>", "name must not be empty"));
        }
        if self.dim_kinds.len() != self.dim_lengths.len() {
            return Err(HarpError::invalid_variable(
                &self.name,
                "dim_kinds and dim_lengths length mismatch",
            ));
        }
        if self.dim_kinds.len() > MAX_DIMS {
            return Err(HarpError::invalid_variable(&self.name, "too many dimensions"));
        }
        if self.data.len() != self.num_elements() {
            return Err(HarpError::invalid_variable(
                &self.name,
                format!(
                    "buffer has {} elements, shape implies {}",
                    self.data.len(),
                    self.num_elements()
                ),
            ));
        }
        if self.enumeration.is_some() && matches!(self.dtype(), DataType::Float32 | DataType::Float64 | DataType::String) {
            return Err(HarpError::invalid_variable(
                &self.name,
                "enumeration vocabulary requires an integer data type",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn var_1d(name: &str, dtype: DataType, len: usize) -> Variable {
        Variable::new(name, dtype, vec![DimensionKind::Time], vec![len]).unwrap()
    }

    #[test]
    fn new_allocates_zeroed_buffer() {
        let v = var_1d("temperature", DataType::Float64, 3);
        assert_eq!(v.num_elements(), 3);
        assert_eq!(v.data().as_f64().unwrap(), vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn add_dimension_replicates_data() {
        let mut v = var_1d("x", DataType::Float64, 2);
        v.set_data(DataBuffer::Float64(vec![1.0, 2.0])).unwrap();
        v.add_dimension(1, DimensionKind::Vertical, 3).unwrap();
        assert_eq!(v.dim_lengths, vec![2, 3]);
        assert_eq!(
            v.data().as_f64().unwrap(),
            vec![1.0, 1.0, 1.0, 2.0, 2.0, 2.0]
        );
    }

    #[test]
    fn remove_dimension_requires_length_one() {
        let mut v = var_1d("x", DataType::Float64, 2);
        assert!(v.remove_dimension(0).is_err());
        let mut v2 = Variable::new("y", DataType::Float64, vec![DimensionKind::Time], vec![1]).unwrap();
        assert!(v2.remove_dimension(0).is_ok());
        assert_eq!(v2.num_dimensions(), 0);
    }

    #[test]
    fn resize_truncates_and_zero_extends() {
        let mut v = var_1d("x", DataType::Float64, 3);
        v.set_data(DataBuffer::Float64(vec![1.0, 2.0, 3.0])).unwrap();
        v.resize_dimension(0, 2).unwrap();
        assert_eq!(v.data().as_f64().unwrap(), vec![1.0, 2.0]);

        v.resize_dimension(0, 4).unwrap();
        assert_eq!(v.data().as_f64().unwrap(), vec![1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn rearrange_selects_and_permutes() {
        let mut v = var_1d("x", DataType::Float64, 4);
        v.set_data(DataBuffer::Float64(vec![10.0, 20.0, 30.0, 40.0])).unwrap();
        v.rearrange_dimension(0, &[3, 0]).unwrap();
        assert_eq!(v.data().as_f64().unwrap(), vec![40.0, 10.0]);
    }

    #[test]
    fn rearrange_rejects_out_of_range_id() {
        let mut v = var_1d("x", DataType::Float64, 2);
        assert!(v.rearrange_dimension(0, &[5]).is_err());
    }

    #[test]
    fn filter_dimension_keeps_masked_entries() {
        let mut v = var_1d("x", DataType::Float64, 3);
        v.set_data(DataBuffer::Float64(vec![1.0, 2.0, 3.0])).unwrap();
        v.filter_dimension(0, &[true, false, true]).unwrap();
        assert_eq!(v.data().as_f64().unwrap(), vec![1.0, 3.0]);
    }

    #[test]
    fn transpose_reorders_axes() {
        let mut v = Variable::new(
            "x",
            DataType::Float64,
            vec![DimensionKind::Time, DimensionKind::Vertical],
            vec![2, 3],
        )
        .unwrap();
        v.set_data(DataBuffer::Float64((0..6).map(|x| x as f64).collect())).unwrap();
        v.transpose(&[1, 0]).unwrap();
        assert_eq!(v.dim_lengths, vec![3, 2]);
        assert_eq!(
            v.data().as_f64().unwrap(),
            vec![0.0, 3.0, 1.0, 4.0, 2.0, 5.0]
        );
    }

    #[test]
    fn append_concatenates_first_axis() {
        let mut a = var_1d("x", DataType::Float64, 2);
        a.set_data(DataBuffer::Float64(vec![1.0, 2.0])).unwrap();
        let mut b = var_1d("x", DataType::Float64, 1);
        b.set_data(DataBuffer::Float64(vec![3.0])).unwrap();
        a.append(&b).unwrap();
        assert_eq!(a.dim_lengths, vec![3]);
        assert_eq!(a.data().as_f64().unwrap(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn verify_catches_buffer_mismatch() {
        let mut v = var_1d("x", DataType::Float64, 2);
        v.dim_lengths = vec![3];
        assert!(v.verify().is_err());
    }
}
