//! Column-integration rules: partial column density from number density and
//! layer thickness, and total column density from summing partial columns
//! over the vertical axis.

use crate::error::HarpError;
use crate::registry::kernels::{as_f64_views, set_f64, split_innermost};
use crate::variable::Variable;

/// `partial_column_density {.., vertical} [molec/m2]` from
/// `number_density {.., vertical} [molec/m3]` and
/// `altitude_bounds {.., vertical, independent=2} [m]`, via
/// `partial_column = density * |bound[1] - bound[0]|`.
pub fn partial_column_from_density_and_bounds(target: &mut Variable, sources: &[Variable]) -> Result<(), HarpError> {
    let (density, bounds) = match sources {
        [density, bounds] => (density, bounds),
        _ => {
            return Err(HarpError::invalid_argument(
                "partial column kernel requires exactly [number_density, altitude_bounds]",
            ))
        }
    };
    let density_values = density
        .data()
        .as_f64()
        .ok_or_else(|| HarpError::invalid_variable(&density.name, "kernel requires a numeric source"))?;
    let bound_values = bounds
        .data()
        .as_f64()
        .ok_or_else(|| HarpError::invalid_variable(&bounds.name, "kernel requires a numeric source"))?;

    if bound_values.len() != density_values.len() * 2 {
        return Err(HarpError::invalid_argument(
            "altitude_bounds must carry exactly two bound values per density element",
        ));
    }

    let values: Vec<f64> = density_values
        .iter()
        .enumerate()
        .map(|(i, &n)| {
            let lo = bound_values[2 * i];
            let hi = bound_values[2 * i + 1];
            n * (hi - lo).abs()
        })
        .collect();
    set_f64(target, values)
}

/// `column_density {..} [molec/m2]` from summing
/// `partial_column_density {.., vertical} [molec/m2]` over its innermost
/// (vertical) axis.
pub fn column_from_partial_column(target: &mut Variable, sources: &[Variable]) -> Result<(), HarpError> {
    let partial = sources
        .first()
        .ok_or_else(|| HarpError::invalid_argument("column kernel requires exactly [partial_column_density]"))?;
    let values = as_f64_views(std::slice::from_ref(partial))?.remove(0);
    let (outer, inner) = split_innermost(&partial.dim_lengths);
    if outer * inner != values.len() {
        return Err(HarpError::invalid_variable(&partial.name, "shape does not match its buffer length"));
    }
    let summed: Vec<f64> = (0..outer)
        .map(|row| values[row * inner..(row + 1) * inner].iter().sum())
        .collect();
    set_f64(target, summed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dims::{DataType, DimensionKind};
    use crate::variable::DataBuffer;

    #[test]
    fn partial_column_multiplies_thickness() {
        let mut density = Variable::new("number_density", DataType::Float64, vec![DimensionKind::Time], vec![2]).unwrap();
        density.set_data(DataBuffer::Float64(vec![1e25, 2e25])).unwrap();

        let mut bounds = Variable::new(
            "altitude_bounds",
            DataType::Float64,
            vec![DimensionKind::Time, DimensionKind::Independent],
            vec![2, 2],
        )
        .unwrap();
        bounds.set_data(DataBuffer::Float64(vec![0.0, 100.0, 100.0, 300.0])).unwrap();

        let mut target = Variable::new("partial_column_density", DataType::Float64, vec![DimensionKind::Time], vec![2]).unwrap();
        partial_column_from_density_and_bounds(&mut target, &[density.clone(), bounds]).unwrap();
        assert_eq!(target.data().as_f64().unwrap(), vec![1e27, 4e27]);
        let _ = &mut density;
    }

    #[test]
    fn column_sums_over_vertical() {
        let mut partial = Variable::new(
            "partial_column_density",
            DataType::Float64,
            vec![DimensionKind::Time, DimensionKind::Vertical],
            vec![2, 3],
        )
        .unwrap();
        partial.set_data(DataBuffer::Float64(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0])).unwrap();
        let mut target = Variable::new("column_density", DataType::Float64, vec![DimensionKind::Time], vec![2]).unwrap();
        column_from_partial_column(&mut target, &[partial]).unwrap();
        assert_eq!(target.data().as_f64().unwrap(), vec![6.0, 15.0]);
    }
}
