//! Primitive element types addressable through typed handles.

use std::fmt;

use nativebind_core::PrimitiveKind;

/// Plain native element data.
///
/// # Safety
///
/// Implementors must be valid for every bit pattern of their size and carry
/// no drop glue, so native memory can be filled, block-copied, and
/// reinterpreted as them.
pub unsafe trait PlainData: Copy + Default + Send + Sync + 'static {
    /// The primitive kind this element maps to.
    const KIND: PrimitiveKind;
}

/// A native `bool` stored as one byte; any non-zero value reads as `true`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct NativeBool(pub u8);

impl NativeBool {
    /// The boolean value.
    pub const fn get(self) -> bool {
        self.0 != 0
    }
}

impl From<bool> for NativeBool {
    fn from(value: bool) -> Self {
        Self(value as u8)
    }
}

impl From<NativeBool> for bool {
    fn from(value: NativeBool) -> Self {
        value.get()
    }
}

/// A native address stored in memory (an element of a pointer array).
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct Address(pub usize);

impl Address {
    /// The null address.
    pub const NULL: Address = Address(0);

    /// Check if this is the null address.
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({:#x})", self.0)
    }
}

macro_rules! plain_data {
    ($($ty:ty => $kind:ident),* $(,)?) => {
        $(
            // SAFETY: valid for all bit patterns, no drop glue.
            unsafe impl PlainData for $ty {
                const KIND: PrimitiveKind = PrimitiveKind::$kind;
            }
        )*
    };
}

plain_data! {
    NativeBool => Bool,
    i8 => Byte,
    i16 => Short,
    u16 => Char,
    i32 => Int,
    i64 => Long,
    f32 => Float,
    f64 => Double,
    usize => Size,
    Address => Address,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn element_sizes_match_primitive_kinds() {
        fn check<T: PlainData>() {
            assert_eq!(std::mem::size_of::<T>(), T::KIND.size_bytes(), "{}", T::KIND);
        }
        check::<NativeBool>();
        check::<i8>();
        check::<i16>();
        check::<u16>();
        check::<i32>();
        check::<i64>();
        check::<f32>();
        check::<f64>();
        check::<usize>();
        check::<Address>();
    }

    #[test]
    fn native_bool_reads_nonzero_as_true() {
        assert!(NativeBool(2).get());
        assert!(!NativeBool::default().get());
        assert_eq!(NativeBool::from(true), NativeBool(1));
    }
}
