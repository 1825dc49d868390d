//! Unit-family expansion rules: derive a variable in one unit from a
//! measurement of the same quantity in another unit already present in the
//! product (e.g. `pressure {time} [Pa]` from `pressure {time} [hPa]`).

use crate::error::HarpError;
use crate::registry::kernels::{as_f64_views, set_f64};
use crate::units::{BuiltinUnitTable, UnitCoercionService};
use crate::variable::Variable;

/// Build a kernel that copies its single source verbatim, then converts it
/// in place from `from_unit` to `to_unit` via the [`BuiltinUnitTable`].
pub fn affine_unit_conversion_kernel(
    from_unit: &'static str,
    to_unit: &'static str,
) -> impl Fn(&mut Variable, &[Variable]) -> Result<(), HarpError> {
    move |target: &mut Variable, sources: &[Variable]| {
        let source = sources
            .first()
            .ok_or_else(|| HarpError::invalid_argument("unit expansion kernel requires exactly one source"))?;
        let mut scratch = source.copy();
        scratch.set_unit(Some(from_unit.to_string()))?;
        BuiltinUnitTable.convert_unit(&mut scratch, to_unit)?;
        let values = as_f64_views(std::slice::from_ref(&scratch))?.remove(0);
        set_f64(target, values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dims::{DataType, DimensionKind};
    use crate::variable::DataBuffer;

    #[test]
    fn kelvin_source_expands_to_celsius_target() {
        let kernel = affine_unit_conversion_kernel("K", "degC");
        let mut source = Variable::new("temperature", DataType::Float64, vec![DimensionKind::Time], vec![2]).unwrap();
        source.set_data(DataBuffer::Float64(vec![273.15, 373.15])).unwrap();
        source.set_unit(Some("K".to_string())).unwrap();

        let mut target = Variable::new("temperature", DataType::Float64, vec![DimensionKind::Time], vec![2]).unwrap();
        target.set_unit(Some("degC".to_string())).unwrap();

        kernel(&mut target, std::slice::from_ref(&source)).unwrap();
        let got = target.data().as_f64().unwrap();
        assert!((got[0] - 0.0).abs() < 1e-9);
        assert!((got[1] - 100.0).abs() < 1e-9);
    }
}
