//! C: process-wide options consulted by rule `is_enabled()` predicates.
//!
//! Mirrors the teacher's configuration layer: a `figment`-backed loader over
//! a TOML file plus environment overrides, producing an immutable snapshot
//! that is then shared behind an `Arc` so the registry and planner can read
//! it without taking a lock.

use std::sync::Arc;

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};

/// How bounds/midpoints kernels react to an out-of-range lookup at the
/// edge of their input grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, strum::Display, strum::EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ExtrapolationMode {
    /// Leave the edge value as NaN rather than guess at it.
    Nan,
    /// Clamp to the nearest in-range value.
    Edge,
    /// Extrapolate linearly from the two nearest in-range values.
    Extrapolate,
}

impl Default for ExtrapolationMode {
    fn default() -> Self {
        ExtrapolationMode::Nan
    }
}

/// Process-wide engine options, analogous to the teacher's run configuration
/// struct. Values here gate optional rule families (e.g. climatology
/// fallbacks) and bound planner search.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarpOptions {
    /// Maximum recursion depth the planner will explore before declaring a
    /// target over-budget.
    pub max_planner_depth: usize,
    /// Whether rules backed by climatological fallbacks (as opposed to
    /// direct measurements) may be used at all.
    pub allow_climatology: bool,
    /// How a-priori/bounds kernels react to out-of-range lookups.
    pub midpoint_extrapolation: ExtrapolationMode,
}

impl Default for HarpOptions {
    fn default() -> Self {
        Self {
            max_planner_depth: 8,
            allow_climatology: true,
            midpoint_extrapolation: ExtrapolationMode::Nan,
        }
    }
}

impl HarpOptions {
    /// Load options from (in increasing priority) built-in defaults, an
    /// optional `harp.toml` in the current directory, then `HARP_*`
    /// environment variables, the way the teacher layers its own config.
    pub fn load() -> Result<Self, figment::Error> {
        Figment::new()
            .merge(Serialized::defaults(HarpOptions::default()))
            .merge(Toml::file("harp.toml"))
            .merge(Env::prefixed("HARP_"))
            .extract()
    }
}

/// Shared, reference-counted handle to a loaded options snapshot. Cloning is
/// cheap; rule predicates take `&HarpOptionsHandle` rather than owning one.
pub type HarpOptionsHandle = Arc<HarpOptions>;

pub fn default_options_handle() -> HarpOptionsHandle {
    Arc::new(HarpOptions::default())
}
