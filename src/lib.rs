//! A derived-variable engine for gridded/profile atmospheric data products:
//! given a product and a request for a named, dimensioned variable, finds
//! the cheapest chain of registered conversions that can produce it and
//! executes that chain without mutating the caller's product until the
//! result is ready.

/// Common error types
pub mod error;
/// Process-wide options consulted by rule `is_enabled()` predicates
pub mod config;
/// Logging setup
pub mod logging;
/// General common utilities
pub mod utils;
/// Utilities related to interpolation, used by the bounds/midpoints kernels
pub mod interpolation;
/// The fixed dimension and data-type model
pub mod dims;
/// Named, typed, multi-dimensional variables
pub mod variable;
/// Products: collections of variables sharing named dimension lengths, and product algebra
pub mod product;
/// Unit and type coercion
pub mod units;
/// The conversion registry and bundled rule catalogue
pub mod registry;
/// The planner: finds the cheapest derivation plan for a requested variable
pub mod planner;
/// The executor: walks a plan, materialising and coercing sources, then invokes kernels
pub mod executor;
/// `list_conversions`, the engine's documentation/help surface
pub mod docs;

#[cfg(test)]
mod test_utils;
