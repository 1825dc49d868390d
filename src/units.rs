//! C4: the unit & type coercion service.
//!
//! `spec.md` treats unit-string parsing as an opaque external collaborator
//! (`convert(value, from_unit, to_unit)`); this module provides a small,
//! table-driven implementation of that contract so the engine is runnable
//! standalone, and a trait seam (`UnitCoercionService`) so a production
//! deployment can swap in a full unit-library binding without touching the
//! planner or executor.

use std::fmt::Display;

use crate::dims::DataType;
use crate::error::HarpError;
use crate::variable::{DataBuffer, Variable};

#[derive(Debug)]
pub struct UnknownUnitError {
    pub quantity: &'static str,
    pub unit: String,
}

impl UnknownUnitError {
    fn new<S: ToString>(quantity: &'static str, unit: S) -> Self {
        Self {
            quantity,
            unit: unit.to_string(),
        }
    }
}

impl Display for UnknownUnitError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Unknown {} unit '{}'", self.quantity, self.unit)
    }
}

impl std::error::Error for UnknownUnitError {}

/// Conversion factor between two mole-fraction units (parts <-> ppm <-> ppb <-> ppt).
pub fn dmf_conv_factor(old_unit: &str, new_unit: &str) -> Result<f64, UnknownUnitError> {
    let fac1 = parts_to(old_unit)?;
    let fac2 = parts_to(new_unit)?;
    Ok(fac2 / fac1)
}

fn parts_to(dmf_unit: &str) -> Result<f64, UnknownUnitError> {
    match dmf_unit {
        "parts" | "1" => Ok(1.0),
        "ppm" => Ok(1e6),
        "ppb" => Ok(1e9),
        "ppt" => Ok(1e12),
        _ => Err(UnknownUnitError::new("mole fraction", dmf_unit)),
    }
}

pub fn dmf_long_name(dmf_unit: &str) -> Result<&'static str, UnknownUnitError> {
    match dmf_unit {
        "parts" | "1" => Ok("parts"),
        "ppm" => Ok("parts per million"),
        "ppb" => Ok("parts per billion"),
        "ppt" => Ok("parts per trillion"),
        _ => Err(UnknownUnitError::new("mole fraction", dmf_unit)),
    }
}

/// An affine conversion `y = scale * x + offset` from a unit to a shared
/// reference unit within its quantity family.
#[derive(Debug, Clone, Copy)]
struct AffineUnit {
    scale: f64,
    offset: f64,
}

impl AffineUnit {
    fn to_reference(&self, x: f64) -> f64 {
        x * self.scale + self.offset
    }

    fn from_reference(&self, y: f64) -> f64 {
        (y - self.offset) / self.scale
    }
}

fn known_unit(unit: &str) -> Option<AffineUnit> {
    match unit {
        // temperature, reference = kelvin
        "K" => Some(AffineUnit { scale: 1.0, offset: 0.0 }),
        "degC" => Some(AffineUnit { scale: 1.0, offset: 273.15 }),
        "degF" => Some(AffineUnit {
            scale: 5.0 / 9.0,
            offset: 273.15 - 32.0 * 5.0 / 9.0,
        }),
        // angle, reference = radian
        "rad" => Some(AffineUnit { scale: 1.0, offset: 0.0 }),
        "deg" => Some(AffineUnit {
            scale: std::f64::consts::PI / 180.0,
            offset: 0.0,
        }),
        _ => None,
    }
}

/// The seam the planner/executor call through; a production build can
/// provide a binding to a full unit library (UDUNITS2-style) here.
pub trait UnitCoercionService {
    fn unit_is_valid(&self, unit: &str) -> bool;
    fn convert_unit(&self, var: &mut Variable, to: &str) -> Result<(), HarpError>;
    fn convert_type(&self, var: &mut Variable, to: DataType) -> Result<(), HarpError>;
}

/// Built-in table covering the unit families the bundled rule catalogue uses
/// (temperature, angle, dimensionless mole fraction). Unknown units are
/// accepted as opaque/unitless tags so custom kernels can still round-trip
/// a no-op conversion (`to == v.unit`).
#[derive(Debug, Default, Clone, Copy)]
pub struct BuiltinUnitTable;

impl UnitCoercionService for BuiltinUnitTable {
    fn unit_is_valid(&self, unit: &str) -> bool {
        !unit.trim().is_empty()
    }

    fn convert_unit(&self, var: &mut Variable, to: &str) -> Result<(), HarpError> {
        if !var.dtype().is_numeric() {
            return Err(HarpError::invalid_variable(
                &var.name,
                "cannot convert the unit of a string variable",
            ));
        }
        let from = var.unit.clone().unwrap_or_default();
        if from == to {
            return Ok(());
        }

        let factor_offset = if let (Some(f), Some(t)) = (known_unit(&from), known_unit(to)) {
            // Both known affine units in the same reference frame: y = t.from_reference(f.to_reference(x))
            Some(move |x: f64| t.from_reference(f.to_reference(x)))
        } else {
            None
        };

        if let Some(convert) = factor_offset {
            let values = var
                .data()
                .as_f64()
                .ok_or_else(|| HarpError::invalid_variable(&var.name, "non-numeric buffer"))?;
            let converted: Vec<f64> = values.into_iter().map(convert).collect();
            write_f64_preserving_type(var, &converted)?;
            var.unit = Some(to.to_string());
            return Ok(());
        }

        // Fall back to the mole-fraction family, an opaque multiplicative factor.
        if let Ok(factor) = dmf_conv_factor(&from, to) {
            let values = var
                .data()
                .as_f64()
                .ok_or_else(|| HarpError::invalid_variable(&var.name, "non-numeric buffer"))?;
            let converted: Vec<f64> = values.into_iter().map(|x| x * factor).collect();
            write_f64_preserving_type(var, &converted)?;
            var.unit = Some(to.to_string());
            return Ok(());
        }

        Err(HarpError::unit_conversion(
            from,
            to,
            "no known conversion between these units",
        ))
    }

    fn convert_type(&self, var: &mut Variable, to: DataType) -> Result<(), HarpError> {
        if var.dtype() == to {
            return Ok(());
        }
        if var.dtype() == DataType::String || to == DataType::String {
            return Err(HarpError::unit_conversion(
                var.dtype().to_string(),
                to.to_string(),
                "string <-> numeric conversions are not supported",
            ));
        }
        let values = var
            .data()
            .as_f64()
            .ok_or_else(|| HarpError::invalid_variable(&var.name, "non-numeric buffer"))?;
        let new_buffer = match to {
            DataType::Int8 => DataBuffer::Int8(values.iter().map(|&x| saturating_round::<i8>(x)).collect()),
            DataType::Int16 => DataBuffer::Int16(values.iter().map(|&x| saturating_round::<i16>(x)).collect()),
            DataType::Int32 => DataBuffer::Int32(values.iter().map(|&x| saturating_round::<i32>(x)).collect()),
            DataType::Float32 => DataBuffer::Float32(values.iter().map(|&x| x as f32).collect()),
            DataType::Float64 => DataBuffer::Float64(values),
            DataType::String => unreachable!("handled above"),
        };
        var.set_data(new_buffer)
    }
}

fn write_f64_preserving_type(var: &mut Variable, values: &[f64]) -> Result<(), HarpError> {
    let buffer = match var.dtype() {
        DataType::Int8 => DataBuffer::Int8(values.iter().map(|&x| saturating_round::<i8>(x)).collect()),
        DataType::Int16 => DataBuffer::Int16(values.iter().map(|&x| saturating_round::<i16>(x)).collect()),
        DataType::Int32 => DataBuffer::Int32(values.iter().map(|&x| saturating_round::<i32>(x)).collect()),
        DataType::Float32 => DataBuffer::Float32(values.iter().map(|&x| x as f32).collect()),
        DataType::Float64 => DataBuffer::Float64(values.to_vec()),
        DataType::String => return Err(HarpError::invalid_variable(&var.name, "string variable has no numeric unit")),
    };
    var.set_data(buffer)
}

trait SaturatingFromF64 {
    const MIN: f64;
    const MAX: f64;
    fn from_f64(x: f64) -> Self;
}

impl SaturatingFromF64 for i8 {
    const MIN: f64 = i8::MIN as f64;
    const MAX: f64 = i8::MAX as f64;
    fn from_f64(x: f64) -> Self {
        x as i8
    }
}

impl SaturatingFromF64 for i16 {
    const MIN: f64 = i16::MIN as f64;
    const MAX: f64 = i16::MAX as f64;
    fn from_f64(x: f64) -> Self {
        x as i16
    }
}

impl SaturatingFromF64 for i32 {
    const MIN: f64 = i32::MIN as f64;
    const MAX: f64 = i32::MAX as f64;
    fn from_f64(x: f64) -> Self {
        x as i32
    }
}

fn saturating_round<T: SaturatingFromF64>(x: f64) -> T {
    let clamped = x.round().clamp(T::MIN, T::MAX);
    T::from_f64(clamped)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dims::DimensionKind;

    #[test]
    fn kelvin_to_celsius() {
        let svc = BuiltinUnitTable;
        let mut v = Variable::new(
            "temperature",
            DataType::Float64,
            vec![DimensionKind::Time],
            vec![3],
        )
        .unwrap();
        v.set_data(DataBuffer::Float64(vec![273.15, 283.15, 293.15])).unwrap();
        v.set_unit(Some("K".to_string())).unwrap();
        svc.convert_unit(&mut v, "degC").unwrap();
        let vals = v.data().as_f64().unwrap();
        for (got, want) in vals.iter().zip([0.0, 10.0, 20.0]) {
            assert!((got - want).abs() < 1e-9, "{got} vs {want}");
        }
    }

    #[test]
    fn same_unit_is_noop() {
        let svc = BuiltinUnitTable;
        let mut v = Variable::new("x", DataType::Float64, vec![DimensionKind::Time], vec![1]).unwrap();
        v.set_unit(Some("K".to_string())).unwrap();
        svc.convert_unit(&mut v, "K").unwrap();
        assert_eq!(v.unit.as_deref(), Some("K"));
    }

    #[test]
    fn saturating_cast_clamps() {
        let svc = BuiltinUnitTable;
        let mut v = Variable::new("x", DataType::Float64, vec![DimensionKind::Time], vec![2]).unwrap();
        v.set_data(DataBuffer::Float64(vec![1000.0, -1000.0])).unwrap();
        svc.convert_type(&mut v, DataType::Int8).unwrap();
        assert_eq!(v.data().as_f64().unwrap(), vec![i8::MAX as f64, i8::MIN as f64]);
    }

    #[test]
    fn string_type_conversion_fails() {
        let svc = BuiltinUnitTable;
        let mut v = Variable::new("x", DataType::Float64, vec![DimensionKind::Time], vec![1]).unwrap();
        assert!(svc.convert_type(&mut v, DataType::String).is_err());
    }
}
