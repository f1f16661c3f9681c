//! The static type model and the `Symbol` record (spec.md §3 "Symbol").

use std::{convert::TryFrom, fmt};

/// Numeric values match the original implementation's `enum DataType :
/// uint8_t` so the `CONVERT` opcode's operand byte (spec.md §4.4) is
/// stable across tools built against either encoding.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, proptest_derive::Arbitrary)]
pub enum DataType {
    Unknown  = 0,
    Nil      = 1,
    Bool     = 2,
    Int      = 3,
    Double   = 4,
    String   = 5,
    Function = 6,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DataType::Unknown => "Unknown",
            DataType::Nil => "Nil",
            DataType::Bool => "Bool",
            DataType::Int => "Int",
            DataType::Double => "Double",
            DataType::String => "String",
            DataType::Function => "Function",
        };
        write!(f, "{}", name)
    }
}

impl DataType {
    /// Parses a type annotation identifier (spec.md §4.2 `type-expr`).
    /// `Function` is never a valid spelled-out annotation — it is only
    /// ever inferred for function symbols.
    pub fn from_annotation(name: &str) -> Option<DataType> {
        Some(match name {
            "Nil" => DataType::Nil,
            "Bool" => DataType::Bool,
            "Int" => DataType::Int,
            "Double" => DataType::Double,
            "String" => DataType::String,
            _ => return None,
        })
    }

    pub fn is_numeric(self) -> bool { matches!(self, DataType::Int | DataType::Double) }

    pub fn to_byte(self) -> u8 { self as u8 }

    /// Whether a value of type `self` may be used where `target` is
    /// expected (var-decl initializers, assignment). Every numeric
    /// literal is typed `Double` (spec.md §4.3 "Type of a literal"), so
    /// `Int`-declared variables need to accept a `Double`-typed numeric
    /// literal at the boundary — otherwise no numeric literal could ever
    /// initialize or be assigned to an `Int` variable. Both sides being
    /// numeric is treated as compatible; every other pairing requires an
    /// exact match.
    pub fn compatible_with(self, target: DataType) -> bool {
        self == target || (self.is_numeric() && target.is_numeric())
    }
}

impl TryFrom<u8> for DataType {
    type Error = u8;

    fn try_from(byte: u8) -> Result<Self, u8> {
        Ok(match byte {
            0 => DataType::Unknown,
            1 => DataType::Nil,
            2 => DataType::Bool,
            3 => DataType::Int,
            4 => DataType::Double,
            5 => DataType::String,
            6 => DataType::Function,
            other => return Err(other),
        })
    }
}

/// A resolved name binding (spec.md §3 "Symbol").
#[derive(Debug, Clone, PartialEq)]
pub struct Symbol {
    pub data_type:    DataType,
    pub return_type:  DataType,
    pub mutable:      bool,
    pub exported:     bool,
    pub external:     bool,
    /// `None` for a symbol defined in the current compilation unit;
    /// `Some(ordinal)` for a symbol pulled in via `#import` (spec.md §3:
    /// "module-index (−1 when local)").
    pub module_index: Option<usize>,
}

impl Symbol {
    pub fn variable(data_type: DataType, mutable: bool, exported: bool) -> Symbol {
        Symbol {
            data_type,
            return_type: DataType::Nil,
            mutable,
            exported,
            external: false,
            module_index: None,
        }
    }

    pub fn function(return_type: DataType, exported: bool) -> Symbol {
        Symbol {
            data_type: DataType::Function,
            return_type,
            mutable: false,
            exported,
            external: false,
            module_index: None,
        }
    }

    pub fn external(mut self, module_index: usize) -> Symbol {
        self.external = true;
        self.module_index = Some(module_index);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn compatible_with_accepts_exact_match_and_numeric_pairs() {
        assert!(DataType::Int.compatible_with(DataType::Int));
        assert!(DataType::Int.compatible_with(DataType::Double));
        assert!(!DataType::Int.compatible_with(DataType::String));
    }

    proptest::proptest! {
        /// The `CONVERT` opcode's operand byte (spec.md §4.4) round-trips
        /// through `to_byte`/`try_from` for every `DataType` variant.
        #[test]
        fn to_byte_round_trips(ty: DataType) {
            proptest::prop_assert_eq!(DataType::try_from(ty.to_byte()), Ok(ty));
        }
    }
}
