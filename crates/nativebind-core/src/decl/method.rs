//! Method declarations.

use crate::{Annotations, TypeSpec};

/// Operation performed by an index-style (`operator[]`-shaped) declaration.
///
/// The first `index_arity` parameters are subscripts applied to the
/// container before the operation runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum IndexOp {
    /// Read the element at the subscript path.
    Get,
    /// Write the last parameter to the element at the subscript path.
    Set,
    /// Number of elements of the container at the subscript path.
    Size,
    /// Whether the container at the subscript path is empty.
    Empty,
    /// Resize the container at the subscript path to the last parameter.
    Resize,
}

impl IndexOp {
    /// Number of non-subscript parameters this operation takes.
    pub const fn value_params(self) -> usize {
        match self {
            IndexOp::Get | IndexOp::Size | IndexOp::Empty => 0,
            IndexOp::Set | IndexOp::Resize => 1,
        }
    }

    /// Whether the operation addresses an element rather than a container.
    pub const fn addresses_element(self) -> bool {
        matches!(self, IndexOp::Get | IndexOp::Set)
    }
}

/// What a method declaration maps to natively.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MethodKind {
    /// A plain native call (instance, or static with [`Annotations::STATIC`]).
    Method,
    /// Constructor-mapped allocator: `new T(args)`.
    Allocator,
    /// Array allocator: `new T[size]`.
    ArrayAllocator,
    /// Index-style access composed over the class's container element.
    Index(IndexOp),
    /// The call-shaped method of a callback class.
    Call,
    /// A native operator, e.g. `=` for assignment-like copies.
    Operator(String),
}

/// One candidate native signature, as reported by the header parser.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct NativeSignature {
    /// Native parameter type spellings.
    pub params: Vec<String>,
}

impl NativeSignature {
    /// Create a candidate signature.
    pub fn new<S: Into<String>>(params: impl IntoIterator<Item = S>) -> Self {
        Self {
            params: params.into_iter().map(Into::into).collect(),
        }
    }
}

/// A named parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ParamDecl {
    /// Host parameter name.
    pub name: String,
    /// Parameter type.
    pub ty: TypeSpec,
}

impl ParamDecl {
    /// Create a parameter.
    pub fn new(name: impl Into<String>, ty: TypeSpec) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A method declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodDecl {
    /// Host method name.
    pub host_name: String,
    /// Native name override; defaults to the host name.
    pub native_name: Option<String>,
    /// Per-method namespace annotation.
    pub namespace: Option<String>,
    /// Native mapping.
    pub kind: MethodKind,
    /// Parameters, in order.
    pub params: Vec<ParamDecl>,
    /// Return type.
    pub returns: TypeSpec,
    /// Intent flags.
    pub flags: Annotations,
    /// Number of leading subscript parameters for index-style access.
    pub index_arity: usize,
    /// Declared failure kinds; the first one declared wins.
    pub throws: Vec<String>,
    /// Candidate native overloads; empty means "use the mapped types".
    pub candidates: Vec<NativeSignature>,
}

impl MethodDecl {
    /// Create a plain method returning `void`.
    pub fn new(host_name: impl Into<String>) -> Self {
        Self {
            host_name: host_name.into(),
            native_name: None,
            namespace: None,
            kind: MethodKind::Method,
            params: Vec::new(),
            returns: TypeSpec::void(),
            flags: Annotations::empty(),
            index_arity: 0,
            throws: Vec::new(),
            candidates: Vec::new(),
        }
    }

    /// Create a constructor-mapped allocator.
    pub fn allocator() -> Self {
        Self::new("allocate").kind(MethodKind::Allocator)
    }

    /// Create an array allocator taking the element count.
    pub fn array_allocator() -> Self {
        Self::new("allocateArray")
            .kind(MethodKind::ArrayAllocator)
            .param("size", TypeSpec::primitive(crate::PrimitiveKind::Long))
    }

    /// Create an index-style accessor with `arity` leading subscripts.
    pub fn index(host_name: impl Into<String>, op: IndexOp, arity: usize) -> Self {
        let mut method = Self::new(host_name).kind(MethodKind::Index(op));
        method.index_arity = arity;
        for i in 0..arity {
            method = method.param(format!("i{i}"), TypeSpec::primitive(crate::PrimitiveKind::Long));
        }
        method
    }

    /// Create the call-shaped method of a callback class.
    pub fn call() -> Self {
        Self::new("call").kind(MethodKind::Call)
    }

    /// Set the native mapping.
    pub fn kind(mut self, kind: MethodKind) -> Self {
        self.kind = kind;
        self
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

    /// Append a parameter.
    pub fn param(mut self, name: impl Into<String>, ty: TypeSpec) -> Self {
        self.params.push(ParamDecl::new(name, ty));
        self
    }

    /// Set the return type.
    pub fn returns(mut self, ty: TypeSpec) -> Self {
        self.returns = ty;
        self
    }

    /// Add flags.
    pub fn flags(mut self, flags: Annotations) -> Self {
        self.flags |= flags;
        self
    }

    /// Declare a failure kind.
    pub fn throws(mut self, kind: impl Into<String>) -> Self {
        self.throws.push(kind.into());
        self
    }

    /// Add a candidate native overload.
    pub fn candidate(mut self, signature: NativeSignature) -> Self {
        self.candidates.push(signature);
        self
    }

    /// The native identifier before scope resolution.
    pub fn native_ident(&self) -> &str {
        self.native_name.as_deref().unwrap_or(&self.host_name)
    }

    /// Host parameter type spellings, for hashing.
    pub fn host_param_names(&self) -> Vec<String> {
        self.params.iter().map(|p| p.ty.host.host_name()).collect()
    }

    /// Check if this is a static (free) member.
    pub fn is_static(&self) -> bool {
        self.flags.contains(Annotations::STATIC)
    }

    /// Check if this declaration allocates.
    pub fn is_allocator(&self) -> bool {
        matches!(self.kind, MethodKind::Allocator | MethodKind::ArrayAllocator)
    }

    /// The first declared failure kind, if any.
    pub fn first_throws(&self) -> Option<&str> {
        self.throws.first().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrimitiveKind;

    #[test]
    fn index_accessor_gets_subscript_params() {
        let method = MethodDecl::index("get", IndexOp::Get, 2)
            .returns(TypeSpec::primitive(PrimitiveKind::Int));
        assert_eq!(method.params.len(), 2);
        assert_eq!(method.index_arity, 2);
    }

    #[test]
    fn first_throws_wins() {
        let method = MethodDecl::new("open").throws("IOException").throws("RuntimeException");
        assert_eq!(method.first_throws(), Some("IOException"));
    }

    #[test]
    fn native_ident_defaults_to_host_name() {
        assert_eq!(MethodDecl::new("size").native_ident(), "size");
        assert_eq!(MethodDecl::new("plus").native("operator+").native_ident(), "operator+");
    }

    #[test]
    fn index_op_value_params() {
        assert_eq!(IndexOp::Set.value_params(), 1);
        assert_eq!(IndexOp::Size.value_params(), 0);
        assert!(IndexOp::Get.addresses_element());
        assert!(!IndexOp::Resize.addresses_element());
    }
}
