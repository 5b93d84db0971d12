//! Core types shared by every nativebind crate.
//!
//! - [`decl`]: the resolved declaration model (classes, methods, fields, type specs)
//! - [`Annotations`]: intent flags carried by declarations
//! - [`NativeName`]: native scope resolution (nesting, absolute reset, unscoped)
//! - [`DeclHash`]: deterministic identity for declarations and overloads
//! - [`StatusCode`]: the status channel shared by generated code and the runtime
//! - [`error`]: the error taxonomy for every phase

pub mod annotations;
pub mod decl;
pub mod error;
mod native_name;
mod primitive;
mod status;
mod type_hash;

pub use annotations::{AdapterSpec, Annotations, ClassFlags, Direction, PassConvention};
pub use decl::{
    ClassDecl, ClassKind, FieldDecl, HostType, IndexOp, MethodDecl, MethodKind, NativeSignature,
    ParamDecl, TypeSpec,
};
pub use error::{
    GenerationError, HostFailure, NativeBindError, NativeException, RegistrationError,
    ResourceError,
};
pub use native_name::{NativeName, NativeScope, mangle};
pub use primitive::PrimitiveKind;
pub use status::StatusCode;
pub use type_hash::{DeclHash, hash_constants};
