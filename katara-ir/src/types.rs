use crate::StructuralError;

/// The closed set of IR types.
///
/// String forms are fixed: `b, i8, i16, i32, i64, u8, u16, u32, u64,
/// block, func`. `Unknown` only appears transiently in front ends and is
/// rejected by the text parser.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    strum::Display,
    strum::EnumString,
)]
pub enum Type {
    /// Not yet determined.
    #[strum(serialize = "unknown")]
    Unknown,
    /// Boolean, stored as a byte.
    #[strum(serialize = "b")]
    Bool,
    /// Signed 8-bit integer.
    #[strum(serialize = "i8")]
    I8,
    /// Signed 16-bit integer.
    #[strum(serialize = "i16")]
    I16,
    /// Signed 32-bit integer.
    #[strum(serialize = "i32")]
    I32,
    /// Signed 64-bit integer.
    #[strum(serialize = "i64")]
    I64,
    /// Unsigned 8-bit integer.
    #[strum(serialize = "u8")]
    U8,
    /// Unsigned 16-bit integer.
    #[strum(serialize = "u16")]
    U16,
    /// Unsigned 32-bit integer.
    #[strum(serialize = "u32")]
    U32,
    /// Unsigned 64-bit integer.
    #[strum(serialize = "u64")]
    U64,
    /// A basic block reference.
    #[strum(serialize = "block")]
    Block,
    /// A func reference.
    #[strum(serialize = "func")]
    Func,
}

impl Type {
    /// Bool and all sized integers.
    pub fn is_integral(self) -> bool {
        matches!(
            self,
            Type::Bool
                | Type::I8
                | Type::I16
                | Type::I32
                | Type::I64
                | Type::U8
                | Type::U16
                | Type::U32
                | Type::U64
        )
    }

    /// Whether an integral type is unsigned. Bool counts as unsigned;
    /// asking about a non-integral type is an error.
    pub fn is_unsigned(self) -> Result<bool, StructuralError> {
        match self {
            Type::Bool | Type::U8 | Type::U16 | Type::U32 | Type::U64 => Ok(true),
            Type::I8 | Type::I16 | Type::I32 | Type::I64 => Ok(false),
            Type::Unknown | Type::Block | Type::Func => {
                Err(StructuralError::NonIntegralType(self))
            }
        }
    }

    /// Size in bits: 8/16/32/64 for integral types, 64 for func values.
    /// `Block` and `Unknown` carry no size.
    pub fn bit_size(self) -> Result<u8, StructuralError> {
        match self {
            Type::Bool | Type::I8 | Type::U8 => Ok(8),
            Type::I16 | Type::U16 => Ok(16),
            Type::I32 | Type::U32 => Ok(32),
            Type::I64 | Type::U64 | Type::Func => Ok(64),
            Type::Block | Type::Unknown => Err(StructuralError::UnsizedType(self)),
        }
    }

    /// Parse one of the fixed type strings. Unlike the derived `FromStr`,
    /// this rejects `unknown`.
    pub fn parse(type_str: &str) -> Result<Type, StructuralError> {
        match type_str.parse::<Type>() {
            Ok(Type::Unknown) | Err(_) => {
                Err(StructuralError::UnknownTypeString(type_str.to_owned()))
            }
            Ok(typ) => Ok(typ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn string_forms_round_trip() {
        for typ in [
            Type::Bool,
            Type::I8,
            Type::I16,
            Type::I32,
            Type::I64,
            Type::U8,
            Type::U16,
            Type::U32,
            Type::U64,
            Type::Block,
            Type::Func,
        ] {
            assert_eq!(Type::parse(&typ.to_string()), Ok(typ));
        }
        assert_eq!(Type::Bool.to_string(), "b");
        assert_eq!(Type::U32.to_string(), "u32");
    }

    #[test]
    fn unknown_strings_are_rejected() {
        assert!(Type::parse("unknown").is_err());
        assert!(Type::parse("i128").is_err());
        assert!(Type::parse("").is_err());
    }

    #[test]
    fn sizes() {
        assert_eq!(Type::Bool.bit_size(), Ok(8));
        assert_eq!(Type::I16.bit_size(), Ok(16));
        assert_eq!(Type::U32.bit_size(), Ok(32));
        assert_eq!(Type::Func.bit_size(), Ok(64));
        assert_eq!(
            Type::Block.bit_size(),
            Err(StructuralError::UnsizedType(Type::Block))
        );
        assert_eq!(
            Type::Unknown.bit_size(),
            Err(StructuralError::UnsizedType(Type::Unknown))
        );
    }

    #[test]
    fn predicates() {
        assert!(Type::Bool.is_integral());
        assert!(Type::U64.is_integral());
        assert!(!Type::Func.is_integral());
        assert_eq!(Type::Bool.is_unsigned(), Ok(true));
        assert_eq!(Type::U16.is_unsigned(), Ok(true));
        assert_eq!(Type::I8.is_unsigned(), Ok(false));
        assert_eq!(
            Type::Func.is_unsigned(),
            Err(StructuralError::NonIntegralType(Type::Func))
        );
        assert_eq!(
            Type::Block.is_unsigned(),
            Err(StructuralError::NonIntegralType(Type::Block))
        );
    }
}
