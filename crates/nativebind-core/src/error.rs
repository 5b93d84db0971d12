//! Unified error types for nativebind.
//!
//! ## Error Hierarchy
//!
//! ```text
//! NativeBindError (top-level wrapper)
//! ├── RegistrationError - building the declaration set
//! ├── GenerationError   - unresolvable/contradictory declarations (per declaration)
//! ├── ResourceError     - null-reference / range failures, raised before any native call
//! ├── NativeException   - a translated native failure
//! └── HostFailure       - a failure raised by host logic behind a callback
//! ```
//!
//! Reclamation failures (a Deallocator's release action failing) are not in
//! this hierarchy: they are logged where they happen and never surfaced.

use thiserror::Error;

use crate::StatusCode;

// ============================================================================
// Registration Errors
// ============================================================================

/// Errors raised while assembling a declaration set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// A class with this host path already exists.
    #[error("duplicate class: {0}")]
    DuplicateClass(String),

    /// The host scope path does not exist.
    #[error("invalid host scope: {0}")]
    InvalidScope(String),
}

// ============================================================================
// Generation Errors
// ============================================================================

/// Generation-time errors.
///
/// Each error is fatal to the declaration it names; generation continues
/// with the remaining declarations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GenerationError {
    /// A referenced class name could not be resolved.
    #[error("{decl}: unresolved type '{name}'")]
    UnresolvedType { decl: String, name: String },

    /// Two annotations contradict each other.
    #[error("{decl}: conflicting annotations: {detail}")]
    ConflictingAnnotations { decl: String, detail: String },

    /// By-value passing on a type without value semantics.
    #[error("{decl}: by-value passing requires a value type, '{ty}' is not one")]
    ByValueRequiresValueType { decl: String, ty: String },

    /// Indexing on a class with no resolvable element accessor.
    #[error("{decl}: index access needs a container element ({detail})")]
    IndexWithoutAccessor { decl: String, detail: String },

    /// Allocator declared on a class that cannot own native storage.
    #[error("{decl}: allocator declared on non-allocatable class")]
    AllocatorOnNonPointer { decl: String },

    /// A callback class without exactly one call-shaped method.
    #[error("{decl}: callback declarations need exactly one call method, found {found}")]
    CallbackShape { decl: String, found: usize },

    /// Adapter name not known to the generator.
    #[error("{decl}: unknown adapter '{adapter}'")]
    UnknownAdapter { decl: String, adapter: String },

    /// A host type shape the generator cannot map in this position.
    #[error("{decl}: unsupported type '{ty}' ({detail})")]
    UnsupportedType {
        decl: String,
        ty: String,
        detail: String,
    },

    /// No candidate native overload accepts the mapped arguments.
    #[error("{decl}: no native overload takes {arity} argument(s)")]
    NoMatchingOverload { decl: String, arity: usize },

    /// Two declarations produce the same identity.
    #[error("{decl}: duplicate declaration")]
    DuplicateDeclaration { decl: String },

    /// Emitted code does not bracket a scoped resource exactly once.
    #[error("{decl}: unbalanced scoped resource ({detail})")]
    UnbalancedScope { decl: String, detail: String },
}

impl GenerationError {
    /// The qualified host name of the offending declaration.
    pub fn decl(&self) -> &str {
        match self {
            GenerationError::UnresolvedType { decl, .. }
            | GenerationError::ConflictingAnnotations { decl, .. }
            | GenerationError::ByValueRequiresValueType { decl, .. }
            | GenerationError::IndexWithoutAccessor { decl, .. }
            | GenerationError::AllocatorOnNonPointer { decl }
            | GenerationError::CallbackShape { decl, .. }
            | GenerationError::UnknownAdapter { decl, .. }
            | GenerationError::UnsupportedType { decl, .. }
            | GenerationError::NoMatchingOverload { decl, .. }
            | GenerationError::DuplicateDeclaration { decl }
            | GenerationError::UnbalancedScope { decl, .. } => decl,
        }
    }
}

// ============================================================================
// Resource Errors
// ============================================================================

/// Resource-state failures, raised locally before any native call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// The handle's address is null.
    #[error("this pointer address is NULL")]
    NullReference,

    /// `position > limit`, or the requested extent leaves `[0, limit)`.
    #[error("invalid range: position {position}, limit {limit}, requested {requested}")]
    InvalidRange {
        position: usize,
        limit: usize,
        requested: usize,
    },

    /// A subscript exceeded the container size.
    #[error("index {index} out of range for size {size}")]
    IndexOutOfRange { index: usize, size: usize },

    /// The subscript path does not match the container depth.
    #[error("subscript path of length {given} does not fit container depth {depth}")]
    InvalidIndexPath { given: usize, depth: usize },

    /// The handle was explicitly released.
    #[error("handle already released")]
    Released,

    /// A cast between element types whose layouts are incompatible.
    #[error("cannot view {from_size}-byte elements as {to_size}-byte elements")]
    TypeMismatch { from_size: usize, to_size: usize },
}

impl ResourceError {
    /// The status code generated code reports for this failure.
    pub fn status(&self) -> StatusCode {
        match self {
            ResourceError::NullReference | ResourceError::Released => StatusCode::NullReference,
            ResourceError::InvalidRange { .. } | ResourceError::TypeMismatch { .. } => {
                StatusCode::InvalidRange
            }
            ResourceError::IndexOutOfRange { .. } | ResourceError::InvalidIndexPath { .. } => {
                StatusCode::IndexOutOfRange
            }
        }
    }
}

// ============================================================================
// Call Failures
// ============================================================================

/// Kind used when neither side declares a more specific failure.
pub const DEFAULT_NATIVE_KIND: &str = "std::runtime_error";

/// Kind used for translated native failures with no declared host kind.
pub const DEFAULT_HOST_KIND: &str = "RuntimeException";

/// A native failure translated into a host-visible one.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{kind}: {message}")]
pub struct NativeException {
    /// The failure kind (declared, or a default).
    pub kind: String,
    /// The original native message.
    pub message: String,
}

impl NativeException {
    /// Create a native exception.
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
        }
    }

    /// Translate with the first declared kind, or the default host kind.
    pub fn translated(declared: &[String], message: impl Into<String>) -> Self {
        let kind = declared.first().map(String::as_str).unwrap_or(DEFAULT_HOST_KIND);
        Self::new(kind, message)
    }
}

/// A failure raised by host-implemented callback logic.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("host failure: {message}")]
pub struct HostFailure {
    /// What went wrong.
    pub message: String,
}

impl HostFailure {
    /// Create a host failure.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Convert into the native exception a trampoline throws.
    ///
    /// The first declared native kind wins; otherwise a generic runtime error.
    pub fn into_native(self, declared: &[String]) -> NativeException {
        let kind = declared.first().map(String::as_str).unwrap_or(DEFAULT_NATIVE_KIND);
        NativeException::new(kind, self.message)
    }
}

// ============================================================================
// Top-level
// ============================================================================

/// Top-level error wrapper.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NativeBindError {
    #[error(transparent)]
    Registration(#[from] RegistrationError),

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Native(#[from] NativeException),

    #[error(transparent)]
    Host(#[from] HostFailure),
}

impl NativeBindError {
    /// The status code that reports this error across the ABI.
    pub fn status(&self) -> StatusCode {
        match self {
            NativeBindError::Resource(e) => e.status(),
            NativeBindError::Native(_) => StatusCode::NativeException,
            NativeBindError::Host(_) => StatusCode::HostFailure,
            NativeBindError::Registration(_) | NativeBindError::Generation(_) => {
                StatusCode::NativeException
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn host_failure_uses_first_declared_kind() {
        let declared = vec!["std::invalid_argument".to_string(), "std::range_error".to_string()];
        let native = HostFailure::new("bad").into_native(&declared);
        assert_eq!(native.kind, "std::invalid_argument");
        assert_eq!(native.message, "bad");
    }

    #[test]
    fn host_failure_defaults_to_runtime_error() {
        let native = HostFailure::new("bad").into_native(&[]);
        assert_eq!(native.kind, DEFAULT_NATIVE_KIND);
    }

    #[test]
    fn native_translation_defaults_to_host_runtime_kind() {
        let e = NativeException::translated(&[], "boom");
        assert_eq!(e.kind, DEFAULT_HOST_KIND);
        assert_eq!(e.to_string(), "RuntimeException: boom");
    }

    #[test]
    fn resource_errors_map_to_status() {
        assert_eq!(ResourceError::NullReference.status(), StatusCode::NullReference);
        assert_eq!(
            ResourceError::IndexOutOfRange { index: 42, size: 13 }.status(),
            StatusCode::IndexOutOfRange
        );
    }

    #[test]
    fn wrapper_converts() {
        let err: NativeBindError = ResourceError::NullReference.into();
        assert_eq!(err.status(), StatusCode::NullReference);
        assert_eq!(err.to_string(), "this pointer address is NULL");
    }

    #[test]
    fn generation_error_names_declaration() {
        let err = GenerationError::CallbackShape {
            decl: "Callback".into(),
            found: 2,
        };
        assert_eq!(err.decl(), "Callback");
        assert!(err.to_string().contains("found 2"));
    }
}
