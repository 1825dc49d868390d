//! Kernel implementations backing the bundled rule catalogue.
//!
//! Each submodule owns one physical family (unit/type expansion, density,
//! column integration, bounds/midpoints, climatology fallbacks). A kernel is
//! a plain function over already-coerced [`Variable`]s; it never looks at
//! the registry or the planner.

pub mod avk;
pub mod bounds;
pub mod climatology;
pub mod column;
pub mod density;
pub mod unit_expansion;

use crate::error::HarpError;
use crate::variable::{DataBuffer, Variable};

/// Read every source as an `f64` view, erroring with the source's name if
/// it holds a string buffer. Kernels work in `f64` and rely on the registry
/// to have already coerced sources to the declared type/unit.
pub(crate) fn as_f64_views<'a>(sources: &'a [Variable]) -> Result<Vec<Vec<f64>>, HarpError> {
    sources
        .iter()
        .map(|v| {
            v.data()
                .as_f64()
                .ok_or_else(|| HarpError::invalid_variable(&v.name, "kernel requires a numeric source"))
        })
        .collect()
}

pub(crate) fn set_f64(target: &mut Variable, values: Vec<f64>) -> Result<(), HarpError> {
    if values.len() != target.num_elements() {
        return Err(HarpError::invalid_variable(
            &target.name,
            format!(
                "kernel produced {} values, target expects {}",
                values.len(),
                target.num_elements()
            ),
        ));
    }
    target.set_data(DataBuffer::Float64(values))
}

/// Length of the innermost (vertical) axis, and the number of
/// "outer" rows that precede it in row-major layout.
pub(crate) fn split_innermost(shape: &[usize]) -> (usize, usize) {
    let inner = *shape.last().unwrap_or(&1);
    let outer: usize = shape[..shape.len().saturating_sub(1)].iter().product();
    (outer, inner.max(1))
}
