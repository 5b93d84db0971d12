//! Class declarations.

use crate::{ClassFlags, FieldDecl, MethodDecl, MethodKind, TypeSpec};

/// The closed set of class declaration kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClassKind {
    /// A native object reachable only through pointers.
    Opaque,
    /// A native type with value semantics (copyable, passable by value).
    Value,
    /// A function-pointer/functor type with exactly one call-shaped method.
    Callback,
    /// A container of free functions and globals; has no native type itself.
    Global,
}

impl ClassKind {
    /// Whether instances are Handles that own native storage.
    pub const fn is_allocatable(self) -> bool {
        matches!(self, ClassKind::Opaque | ClassKind::Value | ClassKind::Callback)
    }
}

/// A class declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassDecl {
    /// Host class name (simple, unqualified).
    pub host_name: String,
    /// Native name override; defaults to the host name.
    pub native_name: Option<String>,
    /// Namespace annotation.
    pub namespace: Option<String>,
    /// Declaration kind.
    pub kind: ClassKind,
    /// Class-wide flags.
    pub flags: ClassFlags,
    /// Element type of an indexed container (the type `operator[]` reaches
    /// after `container_depth` subscripts).
    pub element: Option<TypeSpec>,
    /// Nesting depth of the container (1 for `vector<T>`, 2 for `vector<vector<T>>`).
    pub container_depth: usize,
    /// Declared native failure kinds thrown by callback trampolines; first wins.
    pub throws: Vec<String>,
    /// Methods, in declaration order.
    pub methods: Vec<MethodDecl>,
    /// Fields, in declaration order.
    pub fields: Vec<FieldDecl>,
    /// Nested classes.
    pub nested: Vec<ClassDecl>,
}

impl ClassDecl {
    /// Create a class declaration.
    pub fn new(host_name: impl Into<String>, kind: ClassKind) -> Self {
        Self {
            host_name: host_name.into(),
            native_name: None,
            namespace: None,
            kind,
            flags: ClassFlags::empty(),
            element: None,
            container_depth: 0,
            throws: Vec::new(),
            methods: Vec::new(),
            fields: Vec::new(),
            nested: Vec::new(),
        }
    }

    /// Create an opaque class.
    pub fn opaque(host_name: impl Into<String>) -> Self {
        Self::new(host_name, ClassKind::Opaque)
    }

    /// Create a value class.
    pub fn value(host_name: impl Into<String>) -> Self {
        Self::new(host_name, ClassKind::Value)
    }

    /// Create a callback class.
    pub fn callback(host_name: impl Into<String>) -> Self {
        Self::new(host_name, ClassKind::Callback)
    }

    /// Create a container of free functions.
    pub fn global(host_name: impl Into<String>) -> Self {
        Self::new(host_name, ClassKind::Global)
    }

    /// Override the native name.
    pub fn native(mut self, name: impl Into<String>) -> Self {
        self.native_name = Some(name.into());
        self
    }

    /// Set the namespace annotation.
    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    /// Add class-wide flags.
    pub fn flags(mut self, flags: ClassFlags) -> Self {
        self.flags |= flags;
        self
    }

    /// Declare this class as an indexed container of `element` with `depth` levels.
    pub fn container(mut self, element: TypeSpec, depth: usize) -> Self {
        self.element = Some(element);
        self.container_depth = depth;
        self
    }

    /// Declare a native failure kind thrown by this callback's trampoline.
    pub fn throws(mut self, kind: impl Into<String>) -> Self {
        self.throws.push(kind.into());
        self
    }

    /// Append a method.
    pub fn method(mut self, method: MethodDecl) -> Self {
        self.methods.push(method);
        self
    }

    /// Append a field.
    pub fn field(mut self, field: FieldDecl) -> Self {
        self.fields.push(field);
        self
    }

    /// Append a nested class.
    pub fn nest(mut self, class: ClassDecl) -> Self {
        self.nested.push(class);
        self
    }

    /// The native identifier before scope resolution.
    pub fn native_ident(&self) -> &str {
        self.native_name.as_deref().unwrap_or(&self.host_name)
    }

    /// The call-shaped methods (a callback class must have exactly one).
    pub fn call_methods(&self) -> impl Iterator<Item = &MethodDecl> {
        self.methods.iter().filter(|m| m.kind == MethodKind::Call)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{PrimitiveKind, TypeSpec};

    #[test]
    fn builder_collects_members() {
        let class = ClassDecl::opaque("IntVector")
            .native("std::vector<int>")
            .container(TypeSpec::primitive(PrimitiveKind::Int), 1)
            .method(MethodDecl::allocator())
            .field(FieldDecl::new("tag", TypeSpec::primitive(PrimitiveKind::Int)));
        assert_eq!(class.native_ident(), "std::vector<int>");
        assert_eq!(class.methods.len(), 1);
        assert_eq!(class.fields.len(), 1);
        assert_eq!(class.container_depth, 1);
    }

    #[test]
    fn call_methods_filters_kind() {
        let class = ClassDecl::callback("Callback")
            .method(MethodDecl::call())
            .method(MethodDecl::new("other"));
        assert_eq!(class.call_methods().count(), 1);
    }

    #[test]
    fn global_is_not_allocatable() {
        assert!(!ClassKind::Global.is_allocatable());
        assert!(ClassKind::Callback.is_allocatable());
    }
}
