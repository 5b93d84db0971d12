//! Intent annotations carried by declarations.
//!
//! Annotations are plain data: flags in [`Annotations`] and [`ClassFlags`],
//! the pass convention of a type position, and adapter selections. The
//! generator checks their consistency during resolution.

use std::fmt;

use bitflags::bitflags;

bitflags! {
    /// Flags applying to a single method or field declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Annotations: u32 {
        /// The native member is `const`.
        const CONST = 1 << 0;
        /// The native call is guaranteed not to throw; no exception handling is emitted.
        const NO_EXCEPTION = 1 << 1;
        /// Allocations made by this declaration get no Deallocator.
        const NO_DEALLOCATOR = 1 << 2;
        /// Pass the raw host object and execution context through unchanged.
        const RAW_PASSTHROUGH = 1 << 3;
        /// A static (free) member rather than an instance member.
        const STATIC = 1 << 4;
        /// The call-shaped method is implemented by host logic (callbacks).
        const HOST_IMPLEMENTED = 1 << 5;
    }
}

bitflags! {
    /// Flags applying to a whole class declaration.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ClassFlags: u32 {
        /// Allocations of this class get no Deallocator.
        const NO_DEALLOCATOR = 1 << 0;
        /// Every method of the class is treated as `NO_EXCEPTION`.
        const NO_EXCEPTION = 1 << 1;
        /// Emit the callback trampoline declaration into the companion header.
        const EXPORT_CALLBACK = 1 << 2;
    }
}

/// How a value crosses into native code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PassConvention {
    /// The natural convention: primitives by value, handles as pointers.
    #[default]
    Default,
    /// Copy the pointed-to object (requires value semantics).
    ByVal,
    /// Bind a native reference to the pointed-to object.
    ByRef,
    /// Pass the address of a pointer (`T**`).
    ByPtrPtr,
    /// Pass a reference to a pointer (`T*&`).
    ByPtrRef,
}

impl PassConvention {
    /// Whether the convention needs a dereferenceable (non-null) address.
    pub const fn dereferences(self) -> bool {
        matches!(self, PassConvention::ByVal | PassConvention::ByRef)
    }

    /// Native type suffix applied to the base type.
    pub const fn suffix(self) -> &'static str {
        match self {
            PassConvention::Default => "*",
            PassConvention::ByVal => "",
            PassConvention::ByRef => "&",
            PassConvention::ByPtrPtr => "**",
            PassConvention::ByPtrRef => "*&",
        }
    }
}

impl fmt::Display for PassConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PassConvention::Default => "default",
            PassConvention::ByVal => "by-value",
            PassConvention::ByRef => "by-reference",
            PassConvention::ByPtrPtr => "pointer-to-pointer",
            PassConvention::ByPtrRef => "pointer-reference",
        };
        f.write_str(name)
    }
}

/// Direction of an adapter conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Host to native only (read-only/const parameters).
    In,
    /// Native to host only (return values).
    Out,
    /// Host to native, then read back after the call.
    InOut,
}

impl Direction {
    /// Whether the adapter reads the native value back into the host.
    pub const fn reads_back(self) -> bool {
        matches!(self, Direction::Out | Direction::InOut)
    }
}

/// An adapter selection on a parameter or return type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AdapterSpec {
    /// Adapter name, e.g. `VectorAdapter` or `StringAdapter`.
    pub name: String,
    /// Native container/value type the adapter marshals to, e.g. `std::vector<int>`.
    pub native_type: String,
    /// Explicit direction; `None` means "derive from constness".
    pub direction: Option<Direction>,
}

impl AdapterSpec {
    /// Create an adapter selection with a derived direction.
    pub fn new(name: impl Into<String>, native_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native_type: native_type.into(),
            direction: None,
        }
    }

    /// Force a direction.
    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = Some(direction);
        self
    }

    /// The effective direction for a parameter: read-only when const, read-back otherwise.
    pub fn effective_direction(&self, is_const: bool) -> Direction {
        self.direction.unwrap_or(if is_const {
            Direction::In
        } else {
            Direction::InOut
        })
    }
}
