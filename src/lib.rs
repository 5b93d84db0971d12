//! nativebind: native bindings from resolved declarations.
//!
//! The workspace splits into four crates, re-exported here:
//!
//! - [`core`]: the declaration model, annotations, native names, errors
//! - [`registry`]: the [`DeclarationSet`] the generator consumes
//! - [`generator`]: Resolve, Map types, Emit, Finalize
//! - [`runtime`]: handles, deallocators, the reclaimer, adapters, callbacks
//!
//! # Example
//!
//! ```
//! use nativebind::prelude::*;
//!
//! let mut set = DeclarationSet::new();
//! set.add_class(
//!     ClassDecl::opaque("Mat")
//!         .namespace("cv")
//!         .method(MethodDecl::allocator())
//!         .method(MethodDecl::new("rows").returns(TypeSpec::primitive(PrimitiveKind::Int))),
//! )
//! .unwrap();
//!
//! let unit = nativebind::generate_complete(&set, GeneratorOptions::default()).unwrap();
//! assert!(unit.symbols.contains(&"nb_Mat_allocate".to_string()));
//! ```

pub use nativebind_core as core;
pub use nativebind_generator as generator;
pub use nativebind_registry as registry;
pub use nativebind_runtime as runtime;

pub use nativebind_core::{GenerationError, NativeBindError};
pub use nativebind_generator::{GeneratedUnit, Generator, GeneratorOptions};
pub use nativebind_registry::DeclarationSet;

use thiserror::Error;
use tracing::warn;

/// Commonly used types.
pub mod prelude {
    pub use nativebind_core::{
        AdapterSpec, Annotations, ClassDecl, ClassFlags, ClassKind, Direction, FieldDecl, IndexOp,
        MethodDecl, NativeSignature, PassConvention, PrimitiveKind, TypeSpec,
    };
    pub use nativebind_generator::{GeneratedUnit, Generator, GeneratorOptions};
    pub use nativebind_registry::DeclarationSet;
    pub use nativebind_runtime::{
        Callback, CallbackBinding, CallbackTable, Deallocator, FunctionPointer, HostRuntime,
        IntPointer, Pointer, Reclaimer, StringAdapter, ThreadAttacher, VectorAdapter,
    };
}

/// Failure of a generation run that must cover every declaration.
#[derive(Debug, Error)]
pub enum Error {
    #[error("{} declaration(s) could not be generated", .diagnostics.len())]
    Incomplete {
        /// One entry per skipped declaration, in declaration order.
        diagnostics: Vec<GenerationError>,
        /// Everything that did generate.
        unit: Box<GeneratedUnit>,
    },
}

/// Generate `set`, failing if any declaration was skipped.
///
/// Use [`Generator::generate`] directly to keep partial units.
pub fn generate_complete(set: &DeclarationSet, options: GeneratorOptions) -> Result<GeneratedUnit, Error> {
    let mut unit = Generator::new(options).generate(set);
    if unit.is_complete() {
        return Ok(unit);
    }
    let diagnostics = std::mem::take(&mut unit.diagnostics);
    warn!(skipped = diagnostics.len(), "incomplete generation");
    Err(Error::Incomplete {
        diagnostics,
        unit: Box::new(unit),
    })
}
