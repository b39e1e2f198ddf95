//! Primitive data types and the numeric range tables.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ResolveError, Result};

/// A primitive type named in a pattern (`$x:u64`) or field descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    I8,
    I16,
    I32,
    I64,
    I128,
    Bool,
    Pubkey,
    String,
}

impl DataType {
    pub fn name(&self) -> &'static str {
        match self {
            DataType::U8 => "u8",
            DataType::U16 => "u16",
            DataType::U32 => "u32",
            DataType::U64 => "u64",
            DataType::U128 => "u128",
            DataType::Usize => "usize",
            DataType::I8 => "i8",
            DataType::I16 => "i16",
            DataType::I32 => "i32",
            DataType::I64 => "i64",
            DataType::I128 => "i128",
            DataType::Bool => "bool",
            DataType::Pubkey => "pubkey",
            DataType::String => "string",
        }
    }

    pub fn int_width(&self) -> Option<IntWidth> {
        match self {
            DataType::U8 => Some(IntWidth::U8),
            DataType::U16 => Some(IntWidth::U16),
            DataType::U32 => Some(IntWidth::U32),
            DataType::U64 => Some(IntWidth::U64),
            DataType::U128 => Some(IntWidth::U128),
            DataType::Usize => Some(IntWidth::Usize),
            DataType::I8 => Some(IntWidth::I8),
            DataType::I16 => Some(IntWidth::I16),
            DataType::I32 => Some(IntWidth::I32),
            DataType::I64 => Some(IntWidth::I64),
            DataType::I128 => Some(IntWidth::I128),
            DataType::Bool | DataType::Pubkey | DataType::String => None,
        }
    }

    /// Fixed encoded width in bytes; `None` for strings.
    pub fn byte_width(&self) -> Option<usize> {
        match self {
            DataType::Bool => Some(1),
            DataType::Pubkey => Some(chain_sol::ADDRESS_LEN),
            DataType::String => None,
            _ => self.int_width().map(|w| w.bytes()),
        }
    }

    /// Types allowed after `$name:` in a variable reference.
    pub fn is_variable_type(&self) -> bool {
        !matches!(self, DataType::U128 | DataType::I128)
    }

    /// Types allowed in an account-decoder field descriptor.
    pub fn is_field_type(&self) -> bool {
        !matches!(self, DataType::String)
    }
}

impl FromStr for DataType {
    type Err = ();

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s {
            "u8" => DataType::U8,
            "u16" => DataType::U16,
            "u32" => DataType::U32,
            "u64" => DataType::U64,
            "u128" => DataType::U128,
            "usize" => DataType::Usize,
            "i8" => DataType::I8,
            "i16" => DataType::I16,
            "i32" => DataType::I32,
            "i64" => DataType::I64,
            "i128" => DataType::I128,
            "bool" => DataType::Bool,
            "pubkey" => DataType::Pubkey,
            "string" => DataType::String,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The eleven integer widths a typed value can carry.
///
/// `Usize` is a 64-bit quantity: it shares the `U64` range and encodes to
/// 8 bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IntWidth {
    U8,
    U16,
    U32,
    U64,
    U128,
    Usize,
    I8,
    I16,
    I32,
    I64,
    I128,
}

impl IntWidth {
    pub fn bits(&self) -> u32 {
        match self {
            IntWidth::U8 | IntWidth::I8 => 8,
            IntWidth::U16 | IntWidth::I16 => 16,
            IntWidth::U32 | IntWidth::I32 => 32,
            IntWidth::U64 | IntWidth::Usize | IntWidth::I64 => 64,
            IntWidth::U128 | IntWidth::I128 => 128,
        }
    }

    pub fn bytes(&self) -> usize {
        (self.bits() / 8) as usize
    }

    pub fn is_signed(&self) -> bool {
        matches!(
            self,
            IntWidth::I8 | IntWidth::I16 | IntWidth::I32 | IntWidth::I64 | IntWidth::I128
        )
    }

    pub fn min(&self) -> i128 {
        match self {
            IntWidth::I8 => i8::MIN as i128,
            IntWidth::I16 => i16::MIN as i128,
            IntWidth::I32 => i32::MIN as i128,
            IntWidth::I64 => i64::MIN as i128,
            IntWidth::I128 => i128::MIN,
            _ => 0,
        }
    }

    pub fn max(&self) -> u128 {
        match self {
            IntWidth::U8 => u8::MAX as u128,
            IntWidth::U16 => u16::MAX as u128,
            IntWidth::U32 => u32::MAX as u128,
            IntWidth::U64 | IntWidth::Usize => u64::MAX as u128,
            IntWidth::U128 => u128::MAX,
            IntWidth::I8 => i8::MAX as u128,
            IntWidth::I16 => i16::MAX as u128,
            IntWidth::I32 => i32::MAX as u128,
            IntWidth::I64 => i64::MAX as u128,
            IntWidth::I128 => i128::MAX as u128,
        }
    }

    /// True when every value of `self` is also a value of `target`.
    ///
    /// A `u8` variable may satisfy a `u32` request; the reverse never holds.
    pub fn widens_to(&self, target: IntWidth) -> bool {
        self.min() >= target.min() && self.max() <= target.max()
    }

    pub fn data_type(&self) -> DataType {
        match self {
            IntWidth::U8 => DataType::U8,
            IntWidth::U16 => DataType::U16,
            IntWidth::U32 => DataType::U32,
            IntWidth::U64 => DataType::U64,
            IntWidth::U128 => DataType::U128,
            IntWidth::Usize => DataType::Usize,
            IntWidth::I8 => DataType::I8,
            IntWidth::I16 => DataType::I16,
            IntWidth::I32 => DataType::I32,
            IntWidth::I64 => DataType::I64,
            IntWidth::I128 => DataType::I128,
        }
    }
}

impl fmt::Display for IntWidth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.data_type().name())
    }
}

/// A sign-magnitude integer covering both the `i128` and `u128` ranges.
///
/// Literals are parsed into this form first and only narrowed once the
/// target width is known, so range checks never wrap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WideInt {
    negative: bool,
    magnitude: u128,
}

impl WideInt {
    pub fn from_u128(value: u128) -> Self {
        WideInt {
            negative: false,
            magnitude: value,
        }
    }

    pub fn from_i128(value: i128) -> Self {
        WideInt {
            negative: value < 0,
            magnitude: value.unsigned_abs(),
        }
    }

    /// Parse a decimal integer with an optional leading `-`.
    pub fn parse(text: &str) -> Option<Self> {
        let (negative, digits) = match text.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, text),
        };
        if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let magnitude: u128 = digits.parse().ok()?;
        Some(WideInt {
            negative: negative && magnitude != 0,
            magnitude,
        })
    }

    pub fn is_negative(&self) -> bool {
        self.negative
    }

    pub fn fits(&self, width: IntWidth) -> bool {
        if self.negative {
            width.is_signed() && self.magnitude <= width.min().unsigned_abs()
        } else {
            self.magnitude <= width.max()
        }
    }

    /// Fail with `RangeViolation` unless the value fits `width`.
    pub fn check(&self, width: IntWidth) -> Result<()> {
        if self.fits(width) {
            Ok(())
        } else {
            Err(ResolveError::range(self, width))
        }
    }

    pub fn to_i128(&self) -> Option<i128> {
        if self.negative {
            if self.magnitude > i128::MIN.unsigned_abs() {
                return None;
            }
            // 2^127 maps onto i128::MIN through the wrap.
            Some((self.magnitude as i128).wrapping_neg())
        } else {
            i128::try_from(self.magnitude).ok()
        }
    }

    pub fn to_u128(&self) -> Option<u128> {
        (!self.negative).then_some(self.magnitude)
    }

    /// Little-endian two's-complement encoding at the given width.
    pub fn to_le_bytes(&self, width: IntWidth) -> Result<Vec<u8>> {
        self.check(width)?;
        let n = width.bytes();
        let full = if self.negative {
            self.to_i128()
                .ok_or_else(|| ResolveError::range(self, width))?
                .to_le_bytes()
        } else {
            self.magnitude.to_le_bytes()
        };
        Ok(full[..n].to_vec())
    }
}

impl fmt::Display for WideInt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.negative {
            write!(f, "-{}", self.magnitude)
        } else {
            write!(f, "{}", self.magnitude)
        }
    }
}
