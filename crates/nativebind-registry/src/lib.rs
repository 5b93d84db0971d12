//! Declaration set storage.
//!
//! - [`ScopeTree`]: host scopes (packages and enclosing classes) as a graph,
//!   used to resolve class references relative to the declaration using them
//! - [`DeclarationSet`]: the fully resolved input handed to the generator

mod declaration_set;
mod scope_tree;

pub use declaration_set::{ClassEntry, ClassId, DeclarationSet};
pub use scope_tree::{ResolutionResult, ScopeData, ScopeEdge, ScopeTree};
