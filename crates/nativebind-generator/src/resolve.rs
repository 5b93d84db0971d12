//! Resolve phase: native names, class-level validation, class lookup.
//!
//! Every class gets its fully qualified native name from the namespace
//! annotations along its nesting chain, and the scope its members and nested
//! classes resolve in. Class-level shape errors are reported here; a class
//! that fails is skipped, and references to it are unresolved.

use nativebind_core::{
    ClassFlags, ClassKind, GenerationError, MethodDecl, MethodKind, NativeName, NativeScope, mangle,
};
use nativebind_registry::{ClassId, DeclarationSet, ResolutionResult};
use tracing::debug;

use crate::GeneratorOptions;

/// A class with its native identity resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedClass {
    pub id: ClassId,
    /// `.`-joined host path.
    pub host_name: String,
    /// Fully qualified native name (the container name for globals).
    pub native: NativeName,
    /// Native scope of members and nested classes.
    pub member_scope: Vec<String>,
    /// Symbol fragment shared by every function generated for this class.
    pub symbol: String,
    pub kind: ClassKind,
    pub flags: ClassFlags,
    /// Declared native failure kinds, in declaration order.
    pub throws: Vec<String>,
}

impl ResolvedClass {
    /// The native type expression of instances.
    pub fn native_type(&self) -> String {
        match self.kind {
            ClassKind::Callback => self.fn_type(),
            _ => self.native.qualified(),
        }
    }

    /// Function pointer typedef of a callback class.
    pub fn fn_type(&self) -> String {
        format!("{}_fn", self.symbol)
    }

    /// Function object wrapper of a callback class.
    pub fn functor_type(&self) -> String {
        format!("{}_functor", self.symbol)
    }

    pub fn no_exception(&self) -> bool {
        self.flags.contains(ClassFlags::NO_EXCEPTION)
    }

    pub fn no_deallocator(&self) -> bool {
        self.flags.contains(ClassFlags::NO_DEALLOCATOR)
    }
}

/// Resolved classes, indexed by [`ClassId`].
#[derive(Debug, Default)]
pub struct Resolution {
    classes: Vec<Option<ResolvedClass>>,
}

impl Resolution {
    /// Resolve every class of `set`, collecting class-level errors.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn build(set: &DeclarationSet, options: &GeneratorOptions) -> (Self, Vec<GenerationError>) {
        let mut classes = Vec::with_capacity(set.len());
        let mut errors = Vec::new();
        for entry in set.classes() {
            match resolve_class(set, entry.id, options) {
                Ok(class) => {
                    debug!(host = %class.host_name, native = %class.native, "resolved class");
                    classes.push(Some(class));
                }
                Err(err) => {
                    errors.push(err);
                    classes.push(None);
                }
            }
        }
        (Self { classes }, errors)
    }

    /// A resolved class, or `None` if it failed or does not exist.
    pub fn get(&self, id: ClassId) -> Option<&ResolvedClass> {
        self.classes.get(id.0).and_then(Option::as_ref)
    }

    /// Resolve a class reference made by declaration `decl` inside class `from`.
    pub fn lookup(
        &self,
        set: &DeclarationSet,
        name: &str,
        from: ClassId,
        decl: &str,
    ) -> Result<&ResolvedClass, GenerationError> {
        let unresolved = || GenerationError::UnresolvedType {
            decl: decl.to_string(),
            name: name.to_string(),
        };
        match set.resolve(name, from) {
            ResolutionResult::Found(id) => self.get(id).ok_or_else(unresolved),
            ResolutionResult::Ambiguous(candidates) => {
                debug!(name, decl, count = candidates.len(), "ambiguous class reference");
                Err(unresolved())
            }
            ResolutionResult::NotFound => Err(unresolved()),
        }
    }
}

/// The native name of class `id`.
pub fn class_native_name(set: &DeclarationSet, id: ClassId) -> NativeName {
    let Some(entry) = set.get(id) else {
        return NativeName::global("");
    };
    let enclosing = entry.parent.map(|p| member_scope(set, p)).unwrap_or_default();
    let scope = NativeScope::parse(entry.decl.namespace.as_deref());
    NativeName::resolve(&enclosing, &scope, entry.decl.native_ident())
}

/// The native scope members of class `id` resolve in.
///
/// A global container contributes its namespace annotation but not its own
/// name; any other class scopes its members by its name.
pub fn member_scope(set: &DeclarationSet, id: ClassId) -> Vec<String> {
    let Some(entry) = set.get(id) else {
        return Vec::new();
    };
    if entry.decl.kind == ClassKind::Global {
        let enclosing = entry.parent.map(|p| member_scope(set, p)).unwrap_or_default();
        return NativeScope::parse(entry.decl.namespace.as_deref())
            .apply(&enclosing)
            .unwrap_or_default();
    }
    class_native_name(set, id).child_scope()
}

/// The native name of a member of a class whose member scope is `scope`.
pub fn member_native_name(scope: &[String], method: &MethodDecl) -> NativeName {
    if let MethodKind::Operator(op) = &method.kind {
        return NativeName::unscoped(format!("operator{op}"));
    }
    NativeName::resolve(scope, &NativeScope::parse(method.namespace.as_deref()), method.native_ident())
}

fn resolve_class(
    set: &DeclarationSet,
    id: ClassId,
    options: &GeneratorOptions,
) -> Result<ResolvedClass, GenerationError> {
    let entry = set.get(id).ok_or_else(|| GenerationError::UnresolvedType {
        decl: id.to_string(),
        name: id.to_string(),
    })?;
    let decl = &entry.decl;
    let host_name = entry.qualified_host_name();

    let calls = decl.call_methods().count();
    match decl.kind {
        ClassKind::Callback if calls != 1 => {
            return Err(GenerationError::CallbackShape {
                decl: host_name,
                found: calls,
            });
        }
        ClassKind::Callback => {}
        _ if calls > 0 => {
            return Err(GenerationError::ConflictingAnnotations {
                decl: host_name,
                detail: "call method outside a callback class".to_string(),
            });
        }
        _ => {}
    }
    if decl.kind == ClassKind::Global && decl.element.is_some() {
        return Err(GenerationError::ConflictingAnnotations {
            decl: host_name,
            detail: "global container cannot have a container element".to_string(),
        });
    }
    if decl.element.is_some() != (decl.container_depth > 0) {
        return Err(GenerationError::IndexWithoutAccessor {
            decl: host_name,
            detail: format!("element type and container depth {} disagree", decl.container_depth),
        });
    }

    let native = class_native_name(set, id);
    let path = entry.host_path.join("::");
    Ok(ResolvedClass {
        id,
        symbol: options.symbol(&[&mangle(&path)]),
        native,
        member_scope: member_scope(set, id),
        kind: decl.kind,
        flags: decl.flags,
        throws: decl.throws.clone(),
        host_name,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use nativebind_core::{ClassDecl, IndexOp, PrimitiveKind, TypeSpec};

    fn names(set: &DeclarationSet) -> Vec<String> {
        set.classes()
            .iter()
            .map(|e| class_native_name(set, e.id).qualified())
            .collect()
    }

    #[test]
    fn nested_classes_inherit_scope() {
        let mut set = DeclarationSet::new();
        set.add_class(
            ClassDecl::opaque("Outer")
                .namespace("lib::v1")
                .nest(ClassDecl::value("Inner"))
                .nest(ClassDecl::value("Reset").namespace("::std").native("string"))
                .nest(ClassDecl::value("Bare").namespace("").native("LIB_HANDLE")),
        )
        .unwrap();
        assert_eq!(
            names(&set),
            vec!["lib::v1::Outer", "lib::v1::Outer::Inner", "std::string", "LIB_HANDLE"]
        );
    }

    #[test]
    fn global_container_scopes_members_by_namespace_only() {
        let mut set = DeclarationSet::new();
        let id = set.add_class(ClassDecl::global("Functions").namespace("cv")).unwrap();
        assert_eq!(member_scope(&set, id), vec!["cv"]);

        let free = MethodDecl::new("abs");
        assert_eq!(member_native_name(&member_scope(&set, id), &free).qualified(), "cv::abs");
        let reset = MethodDecl::new("printf").namespace("::");
        assert_eq!(member_native_name(&member_scope(&set, id), &reset).qualified(), "printf");
        let op = MethodDecl::new("add").kind(MethodKind::Operator("+".into()));
        assert_eq!(member_native_name(&member_scope(&set, id), &op).qualified(), "operator+");
    }

    #[test]
    fn callback_shape_is_checked() {
        let mut set = DeclarationSet::new();
        set.add_class(ClassDecl::callback("NoCall")).unwrap();
        set.add_class(ClassDecl::callback("Good").method(MethodDecl::call())).unwrap();
        set.add_class(ClassDecl::opaque("Stray").method(MethodDecl::call())).unwrap();

        let (resolution, errors) = Resolution::build(&set, &GeneratorOptions::default());
        assert_eq!(errors.len(), 2);
        assert!(matches!(&errors[0], GenerationError::CallbackShape { found: 0, .. }));
        assert!(matches!(&errors[1], GenerationError::ConflictingAnnotations { .. }));
        let good = set.find("Good").unwrap();
        assert_eq!(resolution.get(good).unwrap().native_type(), "nb_Good_fn");
    }

    #[test]
    fn container_depth_must_match_element() {
        let mut set = DeclarationSet::new();
        set.add_class(
            ClassDecl::opaque("Broken")
                .method(MethodDecl::index("get", IndexOp::Get, 1))
                .flags(ClassFlags::empty()),
        )
        .unwrap();
        let mut broken = ClassDecl::opaque("Depthless");
        broken.element = Some(TypeSpec::primitive(PrimitiveKind::Int));
        set.add_class(broken).unwrap();

        let (_, errors) = Resolution::build(&set, &GeneratorOptions::default());
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].decl(), "Depthless");
    }

    #[test]
    fn lookup_reports_unresolved_and_failed_targets() {
        let mut set = DeclarationSet::new();
        let user = set.add_class(ClassDecl::opaque("User")).unwrap();
        set.add_class(ClassDecl::callback("Broken")).unwrap();
        let (resolution, _) = Resolution::build(&set, &GeneratorOptions::default());

        let err = resolution.lookup(&set, "Missing", user, "User.f").unwrap_err();
        assert_eq!(
            err,
            GenerationError::UnresolvedType {
                decl: "User.f".into(),
                name: "Missing".into()
            }
        );
        assert!(resolution.lookup(&set, "Broken", user, "User.f").is_err());
        assert_eq!(resolution.lookup(&set, "User", user, "User.f").unwrap().symbol, "nb_User");
    }
}
