//! Primitive element kinds shared by host values and native memory.

use std::fmt;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Primitive kinds understood on both sides of the bridge.
///
/// The discriminant is part of the generated prelude (`nb_kind`), so the
/// numbering must stay stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
pub enum PrimitiveKind {
    Bool = 1,
    Byte = 2,
    Short = 3,
    Char = 4,
    Int = 5,
    Long = 6,
    Float = 7,
    Double = 8,
    Size = 9,
    Address = 10,
}

impl PrimitiveKind {
    /// All kinds, in discriminant order.
    pub const ALL: [PrimitiveKind; 10] = [
        PrimitiveKind::Bool,
        PrimitiveKind::Byte,
        PrimitiveKind::Short,
        PrimitiveKind::Char,
        PrimitiveKind::Int,
        PrimitiveKind::Long,
        PrimitiveKind::Float,
        PrimitiveKind::Double,
        PrimitiveKind::Size,
        PrimitiveKind::Address,
    ];

    /// Host-language spelling of this kind.
    pub const fn host_name(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "boolean",
            PrimitiveKind::Byte => "byte",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Char => "char",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Size => "size_t",
            PrimitiveKind::Address => "address",
        }
    }

    /// Default native type expression for this kind.
    pub const fn native_type(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "bool",
            PrimitiveKind::Byte => "signed char",
            PrimitiveKind::Short => "short",
            PrimitiveKind::Char => "unsigned short",
            PrimitiveKind::Int => "int",
            PrimitiveKind::Long => "long long",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Size => "size_t",
            PrimitiveKind::Address => "void*",
        }
    }

    /// Fixed-width type used on the generated host ABI.
    pub const fn abi_type(self) -> &'static str {
        match self {
            PrimitiveKind::Bool => "uint8_t",
            PrimitiveKind::Byte => "int8_t",
            PrimitiveKind::Short => "int16_t",
            PrimitiveKind::Char => "uint16_t",
            PrimitiveKind::Int => "int32_t",
            PrimitiveKind::Long => "int64_t",
            PrimitiveKind::Float => "float",
            PrimitiveKind::Double => "double",
            PrimitiveKind::Size => "uint64_t",
            PrimitiveKind::Address => "intptr_t",
        }
    }

    /// Size in bytes of one element of this kind on the native side.
    pub const fn size_bytes(self) -> usize {
        match self {
            PrimitiveKind::Bool | PrimitiveKind::Byte => 1,
            PrimitiveKind::Short | PrimitiveKind::Char => 2,
            PrimitiveKind::Int | PrimitiveKind::Float => 4,
            PrimitiveKind::Long | PrimitiveKind::Double => 8,
            PrimitiveKind::Size | PrimitiveKind::Address => std::mem::size_of::<usize>(),
        }
    }

    /// Whether values of this kind cross the ABI as floating point.
    pub const fn is_floating(self) -> bool {
        matches!(self, PrimitiveKind::Float | PrimitiveKind::Double)
    }

    /// Parse a host spelling back into a kind.
    pub fn from_host_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|k| k.host_name() == name)
    }
}

impl fmt::Display for PrimitiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.host_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn discriminants_round_trip() {
        for kind in PrimitiveKind::ALL {
            let code: u8 = kind.into();
            assert_eq!(PrimitiveKind::try_from(code).unwrap(), kind);
        }
    }

    #[test]
    fn unknown_discriminant_is_rejected() {
        assert!(PrimitiveKind::try_from(0u8).is_err());
        assert!(PrimitiveKind::try_from(11u8).is_err());
    }

    #[test]
    fn host_names_parse() {
        assert_eq!(PrimitiveKind::from_host_name("short"), Some(PrimitiveKind::Short));
        assert_eq!(PrimitiveKind::from_host_name("String"), None);
    }

    #[test]
    fn sizes_match_rust_layout() {
        assert_eq!(PrimitiveKind::Short.size_bytes(), std::mem::size_of::<i16>());
        assert_eq!(PrimitiveKind::Long.size_bytes(), std::mem::size_of::<i64>());
        assert_eq!(PrimitiveKind::Address.size_bytes(), std::mem::size_of::<usize>());
    }
}
