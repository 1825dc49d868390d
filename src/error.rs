//! Common error types for the derived-variable engine.
//!
//! Every fallible operation in this crate returns one of the variants below.
//! Call sites that need to attach extra context (e.g. the variable name that
//! was being processed) should wrap these in an [`error_stack::Result`] and
//! use `.attach_printable(..)` rather than growing the enum further.

use crate::dims::DimensionKind;

/// Errors related to working with datetimes
#[derive(Debug, thiserror::Error)]
pub enum DateTimeError {
    #[error("Year {0}, month {1}, day {2} is not a valid date")]
    InvalidYearMonthDay(i32, u32, u32),
    #[error("Year {year} month {month} does not have {n} {weekday}s")]
    NoNthWeekday{year: i32, month: u32, n: u8, weekday: chrono::Weekday},
    #[error("{0} falls in the repeated hour of the DST -> standard transition, cannot determine the timezone")]
    AmbiguousDst(chrono::NaiveDateTime),
    #[error("Error adding timezone to naive datetime: {0}")]
    InvalidTimezone(String),
}

/// The abstract error kinds described by the engine's error-handling design.
///
/// Every fallible engine operation returns exactly one of these. `VariableNotFound`
/// is the canonical "not derivable" outcome at the top of a `derive` call; planner
/// outcomes of `missing`, `cycle`, and `over-budget` all collapse into it.
#[derive(Debug, Clone, thiserror::Error)]
pub enum HarpError {
    #[error("out of memory: {0}")]
    OutOfMemory(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid variable '{name}': {reason}")]
    InvalidVariable { name: String, reason: String },

    #[error("invalid product: {0}")]
    InvalidProduct(String),

    #[error("could not derive variable '{signature}'")]
    VariableNotFound { signature: String },

    #[error("unit conversion failed ({from} -> {to}): {reason}")]
    UnitConversion {
        from: String,
        to: String,
        reason: String,
    },

    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),

    #[error("unsupported: {0}")]
    Unsupported(String),
}

impl HarpError {
    pub fn invalid_argument<S: ToString>(msg: S) -> Self {
        Self::InvalidArgument(msg.to_string())
    }

    pub fn invalid_variable<N: ToString, R: ToString>(name: N, reason: R) -> Self {
        Self::InvalidVariable {
            name: name.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn invalid_product<S: ToString>(msg: S) -> Self {
        Self::InvalidProduct(msg.to_string())
    }

    /// Build the canonical "not derivable" error, printing the signature the
    /// way the documentation routine does: `name {dim,dim,...}`.
    pub fn variable_not_found(name: &str, dims: &[DimensionKind]) -> Self {
        let dims_str = dims
            .iter()
            .map(|d| d.printed_name())
            .collect::<Vec<_>>()
            .join(",");
        Self::VariableNotFound {
            signature: format!("{name} {{{dims_str}}}"),
        }
    }

    pub fn unit_conversion<F: ToString, T: ToString, R: ToString>(from: F, to: T, reason: R) -> Self {
        Self::UnitConversion {
            from: from.to_string(),
            to: to.to_string(),
            reason: reason.to_string(),
        }
    }
}

pub type HarpResult<T> = error_stack::Result<T, HarpError>;
