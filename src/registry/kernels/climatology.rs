//! Climatological fallback rules: used only when a direct measurement isn't
//! available and the caller's options permit climatology-backed
//! derivations ([`HarpOptions::allow_climatology`](crate::config::HarpOptions::allow_climatology),
//! enforced by the rule's `is_enabled` predicate, not by the kernel itself).

use crate::error::HarpError;
use crate::registry::kernels::{as_f64_views, set_f64};
use crate::variable::Variable;

/// `tropopause_altitude {..} [m]` from `latitude {..} [degree_north]`, using
/// a smooth latitude-only empirical fit (~17 km at the equator, ~9 km at
/// the poles) as a climatological stand-in for a measured profile.
pub fn tropopause_altitude_from_latitude(target: &mut Variable, sources: &[Variable]) -> Result<(), HarpError> {
    let latitude = sources
        .first()
        .ok_or_else(|| HarpError::invalid_argument("tropopause climatology kernel requires exactly [latitude]"))?;
    let values = as_f64_views(std::slice::from_ref(latitude))?.remove(0);
    let altitudes: Vec<f64> = values
        .iter()
        .map(|&lat_deg| (17_000.0 - 0.988 * lat_deg.abs()).max(8_000.0))
        .collect();
    set_f64(target, altitudes)
}
