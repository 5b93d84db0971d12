//! Field declarations.

use crate::{Annotations, TypeSpec};

/// A native member variable exposed through getter/setter bridging functions.
///
/// Const fields only get a getter. An indexed field (`index_arity > 0`)
/// takes that many leading subscripts, like an array member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDecl {
    /// Host field name.
    pub host_name: String,
    /// Native name override; defaults to the host name.
    pub native_name: Option<String>,
    /// Field type.
    pub ty: TypeSpec,
    /// Intent flags (`CONST`, `STATIC`, `NO_EXCEPTION`).
    pub flags: Annotations,
    /// Number of leading subscripts.
    pub index_arity: usize,
}

impl FieldDecl {
    /// Create a field.
    pub fn new(host_name: impl Into<String>, ty: TypeSpec) -> Self {
        Self {
            host_name: host_name.into(),
            native_name: None,
            ty,
            flags: Annotations::empty(),
            index_arity: 0,
        }
    }

    /// Override the native name.
    pub fn native(mut self, name: impl Into<String>) -> Self {
        self.native_name = Some(name.into());
        self
    }

    /// Add flags.
    pub fn flags(mut self, flags: Annotations) -> Self {
        self.flags |= flags;
        self
    }

    /// Make the field an array member with `arity` subscripts.
    pub fn indexed(mut self, arity: usize) -> Self {
        self.index_arity = arity;
        self
    }

    /// The native identifier.
    pub fn native_ident(&self) -> &str {
        self.native_name.as_deref().unwrap_or(&self.host_name)
    }

    /// Whether a setter is generated.
    pub fn has_setter(&self) -> bool {
        !self.flags.contains(Annotations::CONST) && !self.ty.is_const
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PrimitiveKind;

    #[test]
    fn const_fields_have_no_setter() {
        let field = FieldDecl::new("width", TypeSpec::primitive(PrimitiveKind::Int));
        assert!(field.has_setter());
        let field = field.flags(Annotations::CONST);
        assert!(!field.has_setter());
    }
}
