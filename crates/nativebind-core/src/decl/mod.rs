//! The resolved declaration model.
//!
//! A declaration set is a tree of [`ClassDecl`]s. Each class carries its
//! methods, fields, and nested classes. Every type position is described by a
//! [`TypeSpec`]: the host-side shape ([`HostType`]) plus the annotations that
//! change how it crosses into native code (pass convention, constness, cast,
//! adapter).
//!
//! Declarations are built programmatically; turning native headers into
//! declarations is the parser's job and happens before this crate sees them.

mod class;
mod field;
mod method;

pub use class::{ClassDecl, ClassKind};
pub use field::FieldDecl;
pub use method::{IndexOp, MethodDecl, MethodKind, NativeSignature, ParamDecl};

use std::fmt;

use crate::{AdapterSpec, PassConvention, PrimitiveKind};

/// The host-language shape of a type position.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum HostType {
    /// No value (return positions only).
    Void,
    /// A primitive passed by value.
    Primitive(PrimitiveKind),
    /// A host array of primitives, pinned for the duration of the call.
    PrimitiveArray(PrimitiveKind),
    /// A built-in typed element handle (e.g. an `int` pointer).
    PrimitiveHandle(PrimitiveKind),
    /// A host string, marshaled as NUL-terminated bytes unless adapted.
    String,
    /// A handle to a declared class, by host name (relative or `.`-qualified).
    Handle(String),
    /// An opaque host object; only valid with raw passthrough.
    Object,
}

impl HostType {
    /// Host-side spelling, used for declaration hashes and diagnostics.
    pub fn host_name(&self) -> String {
        match self {
            HostType::Void => "void".to_string(),
            HostType::Primitive(k) => k.host_name().to_string(),
            HostType::PrimitiveArray(k) => format!("{}[]", k.host_name()),
            HostType::PrimitiveHandle(k) => format!("{}*", k.host_name()),
            HostType::String => "String".to_string(),
            HostType::Handle(name) => name.clone(),
            HostType::Object => "Object".to_string(),
        }
    }

    /// Whether values of this type are handles (carry a native address).
    pub fn is_handle(&self) -> bool {
        matches!(self, HostType::Handle(_) | HostType::PrimitiveHandle(_))
    }
}

impl fmt::Display for HostType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.host_name())
    }
}

/// A type position plus the annotations that shape its native mapping.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeSpec {
    /// Host-side shape.
    pub host: HostType,
    /// Pass convention.
    pub pass: PassConvention,
    /// Native constness.
    pub is_const: bool,
    /// Explicit cast to a different static native type.
    pub cast: Option<String>,
    /// Adapter marshaling to a native container/value type.
    pub adapter: Option<AdapterSpec>,
}

impl TypeSpec {
    /// Create a type spec with default annotations.
    pub fn new(host: HostType) -> Self {
        Self {
            host,
            pass: PassConvention::Default,
            is_const: false,
            cast: None,
            adapter: None,
        }
    }

    /// `void`.
    pub fn void() -> Self {
        Self::new(HostType::Void)
    }

    /// A primitive by value.
    pub fn primitive(kind: PrimitiveKind) -> Self {
        Self::new(HostType::Primitive(kind))
    }

    /// A host array of primitives.
    pub fn array(kind: PrimitiveKind) -> Self {
        Self::new(HostType::PrimitiveArray(kind))
    }

    /// A typed element handle.
    pub fn primitive_handle(kind: PrimitiveKind) -> Self {
        Self::new(HostType::PrimitiveHandle(kind))
    }

    /// A host string.
    pub fn string() -> Self {
        Self::new(HostType::String)
    }

    /// A handle to a declared class.
    pub fn handle(class: impl Into<String>) -> Self {
        Self::new(HostType::Handle(class.into()))
    }

    /// An opaque host object.
    pub fn object() -> Self {
        Self::new(HostType::Object)
    }

    /// Set the pass convention.
    pub fn pass(mut self, pass: PassConvention) -> Self {
        self.pass = pass;
        self
    }

    /// Shorthand for [`PassConvention::ByVal`].
    pub fn by_val(self) -> Self {
        self.pass(PassConvention::ByVal)
    }

    /// Shorthand for [`PassConvention::ByRef`].
    pub fn by_ref(self) -> Self {
        self.pass(PassConvention::ByRef)
    }

    /// Shorthand for [`PassConvention::ByPtrPtr`].
    pub fn by_ptr_ptr(self) -> Self {
        self.pass(PassConvention::ByPtrPtr)
    }

    /// Mark as native `const`.
    pub fn constant(mut self) -> Self {
        self.is_const = true;
        self
    }

    /// Request an explicit cast to another native type.
    pub fn cast(mut self, native_type: impl Into<String>) -> Self {
        self.cast = Some(native_type.into());
        self
    }

    /// Select an adapter.
    pub fn adapter(mut self, adapter: AdapterSpec) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Check if this is `void`.
    pub fn is_void(&self) -> bool {
        matches!(self.host, HostType::Void)
    }
}

impl From<HostType> for TypeSpec {
    fn from(host: HostType) -> Self {
        TypeSpec::new(host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_names() {
        assert_eq!(TypeSpec::array(PrimitiveKind::Int).host.host_name(), "int[]");
        assert_eq!(TypeSpec::handle("IntVector").host.host_name(), "IntVector");
        assert_eq!(TypeSpec::primitive_handle(PrimitiveKind::Short).host.host_name(), "short*");
    }

    #[test]
    fn builder_chains() {
        let spec = TypeSpec::handle("Mat").by_ref().constant().cast("cv::Mat&");
        assert_eq!(spec.pass, PassConvention::ByRef);
        assert!(spec.is_const);
        assert_eq!(spec.cast.as_deref(), Some("cv::Mat&"));
        assert!(spec.host.is_handle());
    }
}
