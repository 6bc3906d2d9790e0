use crate::error::{self, Result};
use serde::{Deserialize, Serialize};
use snafu::ensure;
use std::str::FromStr;

/// The pixel element type a `DataDescription` / `RasterChannel` declares.
/// Matches the `datatype` strings of the JSON descriptor (spec §6.1).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    U8,
    U16,
    U32,
    I8,
    I16,
    I32,
    F32,
    F64,
}

impl ElementType {
    pub fn byte_size(self) -> usize {
        match self {
            ElementType::U8 | ElementType::I8 => 1,
            ElementType::U16 | ElementType::I16 => 2,
            ElementType::U32 | ElementType::I32 | ElementType::F32 => 4,
            ElementType::F64 => 8,
        }
    }

    /// Matches the GDAL-ish naming used in the descriptor JSON (§6.1).
    pub fn as_gdal_name(self) -> &'static str {
        match self {
            ElementType::U8 => "Byte",
            ElementType::U16 => "UInt16",
            ElementType::I16 => "Int16",
            ElementType::U32 => "UInt32",
            ElementType::I32 => "Int32",
            ElementType::F32 => "Float32",
            ElementType::F64 => "Float64",
            ElementType::I8 => "Int8",
        }
    }
}

impl FromStr for ElementType {
    type Err = error::Error;

    fn from_str(s: &str) -> Result<Self> {
        Ok(match s {
            "Byte" | "u8" | "U8" => ElementType::U8,
            "UInt16" | "u16" | "U16" => ElementType::U16,
            "Int16" | "i16" | "I16" => ElementType::I16,
            "UInt32" | "u32" | "U32" => ElementType::U32,
            "Int32" | "i32" | "I32" => ElementType::I32,
            "Float32" | "f32" | "F32" => ElementType::F32,
            "Float64" | "f64" | "F64" => ElementType::F64,
            "Int8" | "i8" | "I8" => ElementType::I8,
            other => {
                return error::UnknownElementType {
                    found: other.to_string(),
                }
                .fail()
            }
        })
    }
}

/// Describes one channel's value range and optional no-data sentinel.
///
/// Invariant: `min <= max`. If `has_no_data`, `no_data` is expected to lie
/// outside `[min, max]` but this is not enforced (spec §3.2).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DataDescription {
    pub element_type: ElementType,
    pub min: f64,
    pub max: f64,
    pub has_no_data: bool,
    pub no_data: f64,
}

impl DataDescription {
    pub fn new(element_type: ElementType, min: f64, max: f64) -> Result<Self> {
        ensure!(min <= max, error::InvalidDataRange { min, max });
        Ok(Self {
            element_type,
            min,
            max,
            has_no_data: false,
            no_data: 0.0,
        })
    }

    pub fn with_no_data(mut self, no_data: f64) -> Self {
        self.has_no_data = true;
        self.no_data = no_data;
        self
    }

    pub fn verify(&self) -> Result<()> {
        ensure!(
            self.min <= self.max,
            error::InvalidDataRange {
                min: self.min,
                max: self.max
            }
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_inverted_range() {
        assert!(DataDescription::new(ElementType::U8, 10.0, 0.0).is_err());
    }

    #[test]
    fn element_type_round_trips_gdal_name() {
        for et in [
            ElementType::U8,
            ElementType::U16,
            ElementType::I16,
            ElementType::U32,
            ElementType::I32,
            ElementType::F32,
            ElementType::F64,
        ] {
            assert_eq!(ElementType::from_str(et.as_gdal_name()).unwrap(), et);
        }
    }
}
