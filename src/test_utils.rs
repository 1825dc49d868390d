//! Test-only builders shared across unit and integration tests.

use std::path::PathBuf;

use crate::dims::{DataType, DimensionKind};
use crate::product::Product;
use crate::variable::{DataBuffer, Variable};

pub(crate) fn test_data_dir() -> PathBuf {
    PathBuf::from(file!())
        .parent().unwrap()
        .parent().unwrap()
        .join("test-data")
}

/// Build a one-dimensional `time`-indexed `f64` variable with the given
/// values and, optionally, a unit.
pub(crate) fn time_variable(name: &str, values: Vec<f64>, unit: Option<&str>) -> Variable {
    let mut v = Variable::new(name, DataType::Float64, vec![DimensionKind::Time], vec![values.len()]).unwrap();
    v.set_data(DataBuffer::Float64(values)).unwrap();
    if let Some(unit) = unit {
        v.set_unit(Some(unit.to_string())).unwrap();
    }
    v
}

/// Build a `{time, vertical}` profile variable from row-major `values`
/// (`time_len * vertical_len` entries), and, optionally, a unit.
pub(crate) fn profile_variable(
    name: &str,
    time_len: usize,
    vertical_len: usize,
    values: Vec<f64>,
    unit: Option<&str>,
) -> Variable {
    let mut v = Variable::new(
        name,
        DataType::Float64,
        vec![DimensionKind::Time, DimensionKind::Vertical],
        vec![time_len, vertical_len],
    )
    .unwrap();
    v.set_data(DataBuffer::Float64(values)).unwrap();
    if let Some(unit) = unit {
        v.set_unit(Some(unit.to_string())).unwrap();
    }
    v
}

/// Build a product from a list of already-constructed variables, in order.
pub(crate) fn product_of(variables: Vec<Variable>) -> Product {
    let mut p = Product::new();
    for v in variables {
        p.add_variable(v).expect("test fixture variables must be mutually compatible");
    }
    p
}
