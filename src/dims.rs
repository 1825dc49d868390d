//! C1: the fixed dimension and data-type model shared by every variable,
//! rule, and product in the engine.

use crate::error::HarpError;

/// Maximum number of dimensions a variable or rule signature may have.
pub const MAX_DIMS: usize = 8;

/// A semantic axis. `Independent` is anonymous: its length lives on the
/// variable/rule rather than on the product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::EnumIter)]
pub enum DimensionKind {
    Independent,
    Time,
    Latitude,
    Longitude,
    Vertical,
    Spectral,
}

impl DimensionKind {
    /// Whether this kind has a product-wide length (as opposed to `Independent`,
    /// whose length is intrinsic to the variable).
    pub fn is_named(&self) -> bool {
        !matches!(self, DimensionKind::Independent)
    }

    /// Single-character code used in a dimsvar key, per the external interface table.
    pub fn code(&self) -> char {
        match self {
            DimensionKind::Independent => 'I',
            DimensionKind::Time => 'T',
            DimensionKind::Latitude => 'A',
            DimensionKind::Longitude => 'O',
            DimensionKind::Vertical => 'V',
            DimensionKind::Spectral => 'S',
        }
    }

    /// Human-readable name, used for documentation export and error messages.
    pub fn printed_name(&self) -> &'static str {
        match self {
            DimensionKind::Independent => "independent",
            DimensionKind::Time => "time",
            DimensionKind::Latitude => "latitude",
            DimensionKind::Longitude => "longitude",
            DimensionKind::Vertical => "vertical",
            DimensionKind::Spectral => "spectral",
        }
    }

    pub fn from_code(code: char) -> Result<Self, HarpError> {
        match code {
            'I' => Ok(DimensionKind::Independent),
            'T' => Ok(DimensionKind::Time),
            'A' => Ok(DimensionKind::Latitude),
            'O' => Ok(DimensionKind::Longitude),
            'V' => Ok(DimensionKind::Vertical),
            'S' => Ok(DimensionKind::Spectral),
            other => Err(HarpError::invalid_argument(format!(
                "unknown dimension code '{other}'"
            ))),
        }
    }

    /// All the named (non-independent) dimension kinds, in the table order.
    pub fn named_kinds() -> [DimensionKind; 5] {
        [
            DimensionKind::Time,
            DimensionKind::Latitude,
            DimensionKind::Longitude,
            DimensionKind::Vertical,
            DimensionKind::Spectral,
        ]
    }
}

impl std::fmt::Display for DimensionKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.printed_name())
    }
}

/// A closed enumeration of the numeric/string data types a variable may hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DataType {
    Int8,
    Int16,
    Int32,
    Float32,
    Float64,
    String,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DataType::String)
    }

    /// Size in bytes of one element, for non-string types.
    pub fn size_of(&self) -> Result<usize, HarpError> {
        match self {
            DataType::Int8 => Ok(1),
            DataType::Int16 => Ok(2),
            DataType::Int32 => Ok(4),
            DataType::Float32 => Ok(4),
            DataType::Float64 => Ok(8),
            DataType::String => Err(HarpError::invalid_argument(
                "string variables have no fixed element size",
            )),
        }
    }

    pub fn valid_min(&self) -> Result<f64, HarpError> {
        match self {
            DataType::Int8 => Ok(i8::MIN as f64),
            DataType::Int16 => Ok(i16::MIN as f64),
            DataType::Int32 => Ok(i32::MIN as f64),
            DataType::Float32 => Ok(f32::MIN as f64),
            DataType::Float64 => Ok(f64::MIN),
            DataType::String => Err(HarpError::invalid_argument(
                "string variables have no numeric valid range",
            )),
        }
    }

    pub fn valid_max(&self) -> Result<f64, HarpError> {
        match self {
            DataType::Int8 => Ok(i8::MAX as f64),
            DataType::Int16 => Ok(i16::MAX as f64),
            DataType::Int32 => Ok(i32::MAX as f64),
            DataType::Float32 => Ok(f32::MAX as f64),
            DataType::Float64 => Ok(f64::MAX),
            DataType::String => Err(HarpError::invalid_argument(
                "string variables have no numeric valid range",
            )),
        }
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DataType::Int8 => "int8",
            DataType::Int16 => "int16",
            DataType::Int32 => "int32",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::String => "string",
        };
        write!(f, "{s}")
    }
}

/// Standalone accessors mirroring the component's documented surface
/// (`size_of`, `valid_min`, `valid_max`, `name_of`), for callers that prefer
/// free functions over inherent methods.
pub fn size_of(dtype: DataType) -> Result<usize, HarpError> {
    dtype.size_of()
}

pub fn valid_min(dtype: DataType) -> Result<f64, HarpError> {
    dtype.valid_min()
}

pub fn valid_max(dtype: DataType) -> Result<f64, HarpError> {
    dtype.valid_max()
}

pub fn name_of(kind: DimensionKind) -> &'static str {
    kind.printed_name()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dim_code_roundtrip() {
        for kind in [
            DimensionKind::Independent,
            DimensionKind::Time,
            DimensionKind::Latitude,
            DimensionKind::Longitude,
            DimensionKind::Vertical,
            DimensionKind::Spectral,
        ] {
            let code = kind.code();
            let back = DimensionKind::from_code(code).unwrap();
            assert_eq!(back.code(), code);
        }
    }

    #[test]
    fn unknown_code_errors() {
        assert!(DimensionKind::from_code('Z').is_err());
    }

    #[test]
    fn type_sizes() {
        assert_eq!(DataType::Int8.size_of().unwrap(), 1);
        assert_eq!(DataType::Float64.size_of().unwrap(), 8);
        assert!(DataType::String.size_of().is_err());
    }
}
