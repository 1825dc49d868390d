//! Density-family rules: air number density from pressure and temperature
//! (ideal gas law), and a species' number density from its volume mixing
//! ratio and the air number density.

use crate::error::HarpError;
use crate::registry::kernels::{as_f64_views, set_f64};
use crate::variable::Variable;

/// Boltzmann constant, J/K.
const BOLTZMANN_CONSTANT: f64 = 1.380649e-23;

/// `number_density {..} [molec/m3]` from `pressure {..} [Pa]` and
/// `temperature {..} [K]`, via the ideal gas law `n = p / (k_B * T)`.
pub fn number_density_from_pressure_temperature(target: &mut Variable, sources: &[Variable]) -> Result<(), HarpError> {
    let views = as_f64_views(sources)?;
    let (pressure, temperature) = match views.as_slice() {
        [p, t] => (p, t),
        _ => {
            return Err(HarpError::invalid_argument(
                "number density kernel requires exactly [pressure, temperature]",
            ))
        }
    };
    if pressure.len() != temperature.len() {
        return Err(HarpError::invalid_argument(
            "pressure and temperature sources have mismatched lengths",
        ));
    }
    let values: Vec<f64> = pressure
        .iter()
        .zip(temperature)
        .map(|(&p, &t)| p / (BOLTZMANN_CONSTANT * t))
        .collect();
    set_f64(target, values)
}

/// `<species>_number_density {..} [molec/m3]` from
/// `<species>_volume_mixing_ratio {..} [1]` and `number_density {..} [molec/m3]`.
pub fn species_number_density_from_vmr(target: &mut Variable, sources: &[Variable]) -> Result<(), HarpError> {
    let views = as_f64_views(sources)?;
    let (vmr, air_density) = match views.as_slice() {
        [vmr, air] => (vmr, air),
        _ => {
            return Err(HarpError::invalid_argument(
                "species number density kernel requires exactly [vmr, air_number_density]",
            ))
        }
    };
    if vmr.len() != air_density.len() {
        return Err(HarpError::invalid_argument(
            "vmr and air number density sources have mismatched lengths",
        ));
    }
    let values: Vec<f64> = vmr.iter().zip(air_density).map(|(&x, &n)| x * n).collect();
    set_f64(target, values)
}
