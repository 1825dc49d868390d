//! Bounds <-> midpoints rules for the vertical axis: collapse a pair of
//! bound values into their midpoint, or reconstruct bounds from a
//! monotonic midpoint grid by averaging neighbours. The two edges, which
//! have no outer neighbour to average against, are handled per
//! [`ExtrapolationMode`]: left as NaN, clamped to the nearest in-range
//! value (mirroring [`crate::interpolation::ConstantValueInterp`]), or
//! extrapolated linearly by half the adjacent spacing.

use crate::config::ExtrapolationMode;
use crate::error::HarpError;
use crate::interpolation::{ConstantValueInterp, InterpolationMethod};
use crate::registry::kernels::set_f64;
use crate::variable::Variable;

/// `altitude {.., vertical} [m]` from `altitude_bounds {.., vertical, independent=2} [m]`.
pub fn midpoints_from_bounds(target: &mut Variable, sources: &[Variable]) -> Result<(), HarpError> {
    let bounds = sources
        .first()
        .ok_or_else(|| HarpError::invalid_argument("midpoint kernel requires exactly one bounds source"))?;
    let values = bounds
        .data()
        .as_f64()
        .ok_or_else(|| HarpError::invalid_variable(&bounds.name, "kernel requires a numeric source"))?;
    if values.len() != target.num_elements() * 2 {
        return Err(HarpError::invalid_argument(
            "bounds source must carry exactly two values per target element",
        ));
    }
    let midpoints: Vec<f64> = values.chunks_exact(2).map(|pair| 0.5 * (pair[0] + pair[1])).collect();
    set_f64(target, midpoints)
}

/// `altitude_bounds {.., vertical, independent=2} [m]` from
/// `altitude {.., vertical} [m]`, row by row over the innermost
/// (vertical) axis: interior bounds are midpoint averages of neighbouring
/// grid points; the two edges are resolved per `mode`.
fn bounds_from_midpoints_with_mode(
    target: &mut Variable,
    sources: &[Variable],
    mode: ExtrapolationMode,
) -> Result<(), HarpError> {
    let midpoints = sources
        .first()
        .ok_or_else(|| HarpError::invalid_argument("bounds kernel requires exactly one midpoint source"))?;
    let vertical_len = *midpoints.dim_lengths.last().unwrap_or(&0);
    if vertical_len == 0 {
        return set_f64(target, Vec::new());
    }
    let values = midpoints
        .data()
        .as_f64()
        .ok_or_else(|| HarpError::invalid_variable(&midpoints.name, "kernel requires a numeric source"))?;
    let rows = values.len() / vertical_len;

    let mut out = Vec::with_capacity(values.len() * 2);
    for row in 0..rows {
        let mid = &values[row * vertical_len..(row + 1) * vertical_len];
        for i in 0..mid.len() {
            let (lo, hi) = if mid.len() == 1 {
                (mid[0], mid[0])
            } else if i == 0 {
                (edge_bound(mode, mid, 0), 0.5 * (mid[0] + mid[1]))
            } else if i == mid.len() - 1 {
                (0.5 * (mid[i - 1] + mid[i]), edge_bound(mode, mid, i))
            } else {
                (0.5 * (mid[i - 1] + mid[i]), 0.5 * (mid[i] + mid[i + 1]))
            };
            out.push(lo);
            out.push(hi);
        }
    }
    set_f64(target, out)
}

/// The outer bound at the first or last midpoint of `mid`, where `i` is 0
/// (left edge) or `mid.len() - 1` (right edge).
fn edge_bound(mode: ExtrapolationMode, mid: &[f64], i: usize) -> f64 {
    match mode {
        ExtrapolationMode::Nan => f64::NAN,
        // The nearest in-range value is the midpoint itself: a bound that
        // merely clamps to its own grid point rather than reaching past it.
        ExtrapolationMode::Edge => {
            let interp = ConstantValueInterp::new(false);
            interp.interp1d(mid, mid, mid[i]).unwrap_or(mid[i])
        }
        ExtrapolationMode::Extrapolate => {
            if i == 0 {
                let spacing = mid[1] - mid[0];
                mid[0] - 0.5 * spacing
            } else {
                let spacing = mid[i] - mid[i - 1];
                mid[i] + 0.5 * spacing
            }
        }
    }
}

/// The NaN-edged variant: the default per [`ExtrapolationMode::Nan`].
pub fn bounds_from_midpoints_nan(target: &mut Variable, sources: &[Variable]) -> Result<(), HarpError> {
    bounds_from_midpoints_with_mode(target, sources, ExtrapolationMode::Nan)
}

/// The edge-clamped variant, per [`ExtrapolationMode::Edge`].
pub fn bounds_from_midpoints_edge(target: &mut Variable, sources: &[Variable]) -> Result<(), HarpError> {
    bounds_from_midpoints_with_mode(target, sources, ExtrapolationMode::Edge)
}

/// The linearly-extrapolated variant, per [`ExtrapolationMode::Extrapolate`].
pub fn bounds_from_midpoints_extrapolate(target: &mut Variable, sources: &[Variable]) -> Result<(), HarpError> {
    bounds_from_midpoints_with_mode(target, sources, ExtrapolationMode::Extrapolate)
}
