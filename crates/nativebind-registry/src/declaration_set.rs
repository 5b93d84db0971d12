//! DeclarationSet - the resolved input to code generation.
//!
//! Nested classes are flattened into [`ClassEntry`]s in declaration order
//! (parents before their nested classes), each remembering its parent and
//! the host scope it opens. Class references inside declarations are
//! resolved against the [`ScopeTree`] relative to the class using them.
//!
//! # Example
//!
//! ```
//! use nativebind_core::ClassDecl;
//! use nativebind_registry::DeclarationSet;
//!
//! let mut set = DeclarationSet::new();
//! let outer = set
//!     .add_class_in(&["org", "demo"], ClassDecl::opaque("Outer").nest(ClassDecl::value("Inner")))
//!     .unwrap();
//!
//! let inner = set.find("org.demo.Outer.Inner").unwrap();
//! assert_eq!(set.parent(inner), Some(outer));
//! assert_eq!(set.resolve("Inner", outer).ok(), Some(inner));
//! ```

use std::fmt;

use petgraph::graph::NodeIndex;
use rustc_hash::FxHashMap;

use nativebind_core::{ClassDecl, DeclHash, RegistrationError};

use crate::{ResolutionResult, ScopeTree};

/// Index of a class inside a [`DeclarationSet`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ClassId(pub usize);

impl fmt::Display for ClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A flattened class declaration.
#[derive(Debug, Clone)]
pub struct ClassEntry {
    /// This entry's id.
    pub id: ClassId,
    /// Host path: package segments then enclosing classes then the class name.
    pub host_path: Vec<String>,
    /// The declaration, with `nested` emptied (nested classes have their own entries).
    pub decl: ClassDecl,
    /// The enclosing class, if nested.
    pub parent: Option<ClassId>,
    /// Deterministic identity derived from the host path.
    pub hash: DeclHash,
    /// The host scope this class opens for its members and nested classes.
    pub scope: NodeIndex,
}

impl ClassEntry {
    /// The `.`-joined host path.
    pub fn qualified_host_name(&self) -> String {
        self.host_path.join(".")
    }
}

/// The full set of declarations to generate bindings for.
#[derive(Default)]
pub struct DeclarationSet {
    classes: Vec<ClassEntry>,
    by_hash: FxHashMap<DeclHash, ClassId>,
    scopes: ScopeTree,
}

impl DeclarationSet {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a top-level class in the root package.
    pub fn add_class(&mut self, decl: ClassDecl) -> Result<ClassId, RegistrationError> {
        self.add_class_in::<&str>(&[], decl)
    }

    /// Add a top-level class in a package, along with its nested classes.
    ///
    /// Returns the id of the top-level class.
    pub fn add_class_in<S: AsRef<str>>(
        &mut self,
        package: &[S],
        decl: ClassDecl,
    ) -> Result<ClassId, RegistrationError> {
        let path: Vec<String> = package.iter().map(|s| s.as_ref().to_string()).collect();
        let scope = self.scopes.get_or_create_path(&path);
        self.insert(path, scope, None, decl)
    }

    fn insert(
        &mut self,
        mut host_path: Vec<String>,
        scope: NodeIndex,
        parent: Option<ClassId>,
        mut decl: ClassDecl,
    ) -> Result<ClassId, RegistrationError> {
        host_path.push(decl.host_name.clone());
        let qualified = host_path.join(".");
        let hash = DeclHash::from_class(&host_path);
        if self.by_hash.contains_key(&hash) {
            return Err(RegistrationError::DuplicateClass(qualified));
        }

        let id = ClassId(self.classes.len());
        if self.scopes.insert_class(scope, &decl.host_name, id).is_some() {
            return Err(RegistrationError::DuplicateClass(qualified));
        }
        let own_scope = self.scopes.get_or_create_child(scope, &decl.host_name);
        let nested = std::mem::take(&mut decl.nested);

        self.by_hash.insert(hash, id);
        self.classes.push(ClassEntry {
            id,
            host_path: host_path.clone(),
            decl,
            parent,
            hash,
            scope: own_scope,
        });

        for child in nested {
            self.insert(host_path.clone(), own_scope, Some(id), child)?;
        }
        Ok(id)
    }

    /// Make every class of `target` visible from `from` (both package paths).
    pub fn add_import<S: AsRef<str>, T: AsRef<str>>(
        &mut self,
        from: &[S],
        target: &[T],
    ) -> Result<(), RegistrationError> {
        let Some(target) = self.scopes.get_path(target) else {
            let name = target.iter().map(|s| s.as_ref()).collect::<Vec<_>>().join(".");
            return Err(RegistrationError::InvalidScope(name));
        };
        let from = self.scopes.get_or_create_path(from);
        self.scopes.add_import(from, target);
        Ok(())
    }

    /// All classes in declaration order (enclosing classes first).
    pub fn classes(&self) -> &[ClassEntry] {
        &self.classes
    }

    /// Get a class by id.
    pub fn get(&self, id: ClassId) -> Option<&ClassEntry> {
        self.classes.get(id.0)
    }

    /// Get a class by hash.
    pub fn get_by_hash(&self, hash: DeclHash) -> Option<&ClassEntry> {
        self.by_hash.get(&hash).and_then(|id| self.get(*id))
    }

    /// Find a class by its `.`-joined host path.
    pub fn find(&self, qualified: &str) -> Option<ClassId> {
        let path: Vec<&str> = qualified.split('.').collect();
        self.by_hash.get(&DeclHash::from_class(&path)).copied()
    }

    /// Resolve a class reference as seen from inside class `from`.
    pub fn resolve(&self, name: &str, from: ClassId) -> ResolutionResult<ClassId> {
        match self.get(from) {
            Some(entry) => self.scopes.resolve_class(name, entry.scope),
            None => ResolutionResult::NotFound,
        }
    }

    /// The enclosing class, if `id` is nested.
    pub fn parent(&self, id: ClassId) -> Option<ClassId> {
        self.get(id).and_then(|e| e.parent)
    }

    /// Chain of enclosing classes, outermost first, ending with `id` itself.
    pub fn lineage(&self, id: ClassId) -> Vec<ClassId> {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(c) = current {
            chain.push(c);
            current = self.parent(c);
        }
        chain.reverse();
        chain
    }

    /// Number of classes, nested ones included.
    pub fn len(&self) -> usize {
        self.classes.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }

    /// The underlying scope tree.
    pub fn scopes(&self) -> &ScopeTree {
        &self.scopes
    }
}
