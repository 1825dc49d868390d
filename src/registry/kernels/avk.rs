//! Averaging-kernel-smoothed column density: applies a per-profile
//! square averaging-kernel matrix to a partial column profile, row by row
//! over the outer (time-like) axes.

use ndarray::{Array1, Array2};

use crate::error::HarpError;
use crate::registry::kernels::{as_f64_views, set_f64, split_innermost};
use crate::variable::Variable;

/// `avk_corrected_partial_column_density {.., vertical} [molec/m2]` from
/// `partial_column_density {.., vertical} [molec/m2]` and
/// `column_averaging_kernel {.., vertical, independent=vertical} [1]`,
/// via `out[row] = AVK[row] . partial[row]` for each outer row, where
/// `AVK[row]` is the `vertical x vertical` matrix for that row.
pub fn avk_corrected_partial_column(target: &mut Variable, sources: &[Variable]) -> Result<(), HarpError> {
    let (partial, avk) = match sources {
        [partial, avk] => (partial, avk),
        _ => {
            return Err(HarpError::invalid_argument(
                "AVK kernel requires exactly [partial_column_density, column_averaging_kernel]",
            ))
        }
    };

    let views = as_f64_views(std::slice::from_ref(partial))?;
    let partial_values = &views[0];
    let (outer, vertical) = split_innermost(&partial.dim_lengths);
    if outer * vertical != partial_values.len() {
        return Err(HarpError::invalid_variable(&partial.name, "shape does not match its buffer length"));
    }

    let avk_values = avk
        .data()
        .as_f64()
        .ok_or_else(|| HarpError::invalid_variable(&avk.name, "kernel requires a numeric source"))?;
    if avk_values.len() != outer * vertical * vertical {
        return Err(HarpError::invalid_variable(
            &avk.name,
            format!(
                "averaging kernel has {} values, expected {outer} * {vertical} * {vertical} for a square matrix per row",
                avk_values.len()
            ),
        ));
    }

    let mut out = Vec::with_capacity(outer * vertical);
    for row in 0..outer {
        let profile = Array1::from_vec(partial_values[row * vertical..(row + 1) * vertical].to_vec());
        let matrix_slice = &avk_values[row * vertical * vertical..(row + 1) * vertical * vertical];
        let matrix = Array2::from_shape_vec((vertical, vertical), matrix_slice.to_vec())
            .map_err(|e| HarpError::invalid_variable(&avk.name, format!("not a square row matrix: {e}")))?;
        let smoothed = matrix.dot(&profile);
        out.extend(smoothed.into_iter());
    }
    set_f64(target, out)
}
