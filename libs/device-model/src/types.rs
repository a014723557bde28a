//! Wire types of packet elements

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DescriptorError;

/// Primitive type of an element on the wire.
///
/// Marked non-exhaustive: emitters living in other crates must treat a type
/// they do not know as an emission error instead of guessing.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementType {
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Bool,
    Char,
    Float,
    String,
}

impl ElementType {
    pub const ALL: [ElementType; 12] = [
        ElementType::Int8,
        ElementType::UInt8,
        ElementType::Int16,
        ElementType::UInt16,
        ElementType::Int32,
        ElementType::UInt32,
        ElementType::Int64,
        ElementType::UInt64,
        ElementType::Bool,
        ElementType::Char,
        ElementType::Float,
        ElementType::String,
    ];

    /// Descriptor spelling, e.g. `uint16`.
    pub fn as_str(&self) -> &'static str {
        match self {
            ElementType::Int8 => "int8",
            ElementType::UInt8 => "uint8",
            ElementType::Int16 => "int16",
            ElementType::UInt16 => "uint16",
            ElementType::Int32 => "int32",
            ElementType::UInt32 => "uint32",
            ElementType::Int64 => "int64",
            ElementType::UInt64 => "uint64",
            ElementType::Bool => "bool",
            ElementType::Char => "char",
            ElementType::Float => "float",
            ElementType::String => "string",
        }
    }

    /// Size of one item in bytes. Bools are packed as bits on the wire but
    /// take one byte when scalar.
    pub fn size(&self) -> usize {
        match self {
            ElementType::Int8 | ElementType::UInt8 => 1,
            ElementType::Int16 | ElementType::UInt16 => 2,
            ElementType::Int32 | ElementType::UInt32 | ElementType::Float => 4,
            ElementType::Int64 | ElementType::UInt64 => 8,
            ElementType::Bool | ElementType::Char | ElementType::String => 1,
        }
    }

    /// Wire size of an element of this type with the given cardinality.
    pub fn wire_size(&self, cardinality: usize) -> usize {
        match self {
            ElementType::Bool if cardinality > 1 => cardinality.div_ceil(8),
            _ => self.size() * cardinality,
        }
    }

    pub fn is_integer(&self) -> bool {
        self.integer_range().is_some()
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            ElementType::Int8
                | ElementType::Int16
                | ElementType::Int32
                | ElementType::Int64
                | ElementType::Float
        )
    }

    /// Inclusive value range for integer types.
    pub fn integer_range(&self) -> Option<(i128, i128)> {
        match self {
            ElementType::Int8 => Some((i8::MIN as i128, i8::MAX as i128)),
            ElementType::UInt8 => Some((0, u8::MAX as i128)),
            ElementType::Int16 => Some((i16::MIN as i128, i16::MAX as i128)),
            ElementType::UInt16 => Some((0, u16::MAX as i128)),
            ElementType::Int32 => Some((i32::MIN as i128, i32::MAX as i128)),
            ElementType::UInt32 => Some((0, u32::MAX as i128)),
            ElementType::Int64 => Some((i64::MIN as i128, i64::MAX as i128)),
            ElementType::UInt64 => Some((0, u64::MAX as i128)),
            _ => None,
        }
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ElementType {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ElementType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| DescriptorError::UnknownType(s.to_string()))
    }
}

/// Whether an element is sent to the device or returned from it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    In,
    Out,
}

impl FromStr for Direction {
    type Err = DescriptorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in" => Ok(Direction::In),
            "out" => Ok(Direction::Out),
            other => Err(DescriptorError::InvalidValue {
                field: "direction".to_string(),
                message: format!("expected 'in' or 'out', got '{}'", other),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_descriptor_spelling() {
        for ty in ElementType::ALL {
            assert_eq!(ty.as_str().parse::<ElementType>().unwrap(), ty);
        }
        assert!(matches!(
            "uint128".parse::<ElementType>(),
            Err(DescriptorError::UnknownType(t)) if t == "uint128"
        ));
    }

    #[test]
    fn bool_arrays_pack_into_bits() {
        assert_eq!(ElementType::Bool.wire_size(1), 1);
        assert_eq!(ElementType::Bool.wire_size(9), 2);
        assert_eq!(ElementType::UInt16.wire_size(30), 60);
    }

    #[test]
    fn integer_ranges() {
        assert_eq!(ElementType::UInt8.integer_range(), Some((0, 255)));
        assert_eq!(ElementType::Int16.integer_range(), Some((-32768, 32767)));
        assert!(ElementType::Char.integer_range().is_none());
        assert!(!ElementType::Float.is_integer());
    }
}
