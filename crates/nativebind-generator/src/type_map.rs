//! Map types phase: host type positions to native argument and return code.
//!
//! Each parameter maps to the ABI parameters of the bridging function, the
//! checks that run before anything is dereferenced, the setup that builds
//! adapter temporaries and locals, the native argument expression, and the
//! read-back that runs after a successful call.

use nativebind_core::{
    AdapterSpec, Annotations, ClassKind, Direction, GenerationError, HostType, ParamDecl,
    PassConvention, PrimitiveKind, TypeSpec,
};
use nativebind_registry::{ClassId, DeclarationSet};

use crate::resolve::{ResolvedClass, Resolution};

/// Adapter names the generator knows how to emit.
pub const VECTOR_ADAPTER: &str = "VectorAdapter";
pub const STRING_ADAPTER: &str = "StringAdapter";

/// Where a type position is being mapped.
#[derive(Clone, Copy)]
pub struct Site<'a> {
    pub set: &'a DeclarationSet,
    pub resolution: &'a Resolution,
    /// The class whose scope resolves class references.
    pub from: ClassId,
    /// Qualified host name of the declaration, for diagnostics.
    pub decl: &'a str,
    /// Flags of the declaration.
    pub flags: Annotations,
}

impl Site<'_> {
    fn class(&self, name: &str) -> Result<&ResolvedClass, GenerationError> {
        self.resolution.lookup(self.set, name, self.from, self.decl)
    }

    fn unsupported(&self, ty: &TypeSpec, detail: &str) -> GenerationError {
        GenerationError::UnsupportedType {
            decl: self.decl.to_string(),
            ty: ty.host.host_name(),
            detail: detail.to_string(),
        }
    }

    fn conflict(&self, detail: impl Into<String>) -> GenerationError {
        GenerationError::ConflictingAnnotations {
            decl: self.decl.to_string(),
            detail: detail.into(),
        }
    }
}

/// A parameter mapped to native code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappedParam {
    /// Parameter name in the bridging function.
    pub name: String,
    /// ABI parameter declarations.
    pub abi: Vec<String>,
    /// Static native type of [`arg`](Self::arg).
    pub native_type: String,
    /// Precondition lines; may return a failure status.
    pub checks: Vec<String>,
    /// Lines that build locals and adapter temporaries.
    pub setup: Vec<String>,
    /// Native argument expression.
    pub arg: String,
    /// Lines run after a successful call.
    pub read_back: Vec<String>,
    /// Names of adapter temporaries declared in `setup`.
    pub temporaries: Vec<String>,
}

impl MappedParam {
    fn new(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    /// Insert an explicit cast of the argument.
    pub fn cast_to(&mut self, native_type: &str) {
        self.arg = format!("({native_type})({})", self.arg);
        self.native_type = native_type.to_string();
    }
}

fn const_prefix(ty: &TypeSpec) -> &'static str {
    if ty.is_const { "const " } else { "" }
}

/// Map parameter `index`.
pub fn map_param(site: &Site<'_>, index: usize, param: &ParamDecl) -> Result<MappedParam, GenerationError> {
    let ty = &param.ty;
    let name = format!("a{index}");
    let mut mapped = match (&ty.host, &ty.adapter) {
        (_, Some(adapter)) => map_adapted_param(site, name, ty, adapter)?,
        (HostType::Void, None) => return Err(site.unsupported(ty, "void parameter")),
        (HostType::Primitive(kind), None) => map_primitive_param(site, name, ty, *kind)?,
        (HostType::PrimitiveArray(kind), None) => {
            if ty.pass != PassConvention::Default {
                return Err(site.conflict(format!("host arrays cannot be passed {}", ty.pass)));
            }
            let native_type = format!("{}{}*", const_prefix(ty), kind.native_type());
            MappedParam {
                abi: vec![format!("{}* {name}", kind.abi_type()), format!("intptr_t {name}_len")],
                arg: format!("({native_type}){name}"),
                native_type,
                ..MappedParam::new(name)
            }
        }
        (HostType::PrimitiveHandle(kind), None) => map_handle_param(site, name, ty, kind.native_type(), true)?,
        (HostType::Handle(class), None) => {
            let class = site.class(class)?;
            match class.kind {
                ClassKind::Callback => map_callback_param(site, name, ty, class)?,
                ClassKind::Global => return Err(site.unsupported(ty, "a global container is not a type")),
                kind => map_handle_param(site, name, ty, &class.native_type(), kind == ClassKind::Value)?,
            }
        }
        (HostType::String, None) => map_string_param(name, ty),
        (HostType::Object, None) => {
            if !site.flags.contains(Annotations::RAW_PASSTHROUGH) {
                return Err(site.unsupported(ty, "host objects need raw passthrough"));
            }
            MappedParam {
                abi: vec![format!("void* {name}")],
                arg: name.clone(),
                native_type: "void*".to_string(),
                ..MappedParam::new(name)
            }
        }
    };
    if let Some(cast) = &ty.cast {
        mapped.cast_to(cast);
    }
    Ok(mapped)
}

fn map_primitive_param(
    site: &Site<'_>,
    name: String,
    ty: &TypeSpec,
    kind: PrimitiveKind,
) -> Result<MappedParam, GenerationError> {
    let native = kind.native_type();
    let mut mapped = MappedParam {
        abi: vec![format!("{} {name}", kind.abi_type())],
        ..MappedParam::new(name.clone())
    };
    match ty.pass {
        PassConvention::Default | PassConvention::ByVal => {
            mapped.arg = name;
            mapped.native_type = native.to_string();
        }
        PassConvention::ByRef => {
            mapped.setup.push(format!("{native} {name}_value = ({native}){name};"));
            mapped.arg = format!("{name}_value");
            mapped.native_type = format!("{}{native}&", const_prefix(ty));
        }
        PassConvention::ByPtrPtr | PassConvention::ByPtrRef => {
            return Err(site.unsupported(ty, "primitives cannot be passed as pointer-to-pointer"));
        }
    }
    Ok(mapped)
}

fn map_handle_param(
    site: &Site<'_>,
    name: String,
    ty: &TypeSpec,
    element: &str,
    value_type: bool,
) -> Result<MappedParam, GenerationError> {
    let c = const_prefix(ty);
    let ptr = format!("nb_ptr<{element} >({name})");
    let mut mapped = MappedParam {
        abi: vec![format!("nb_pointer* {name}")],
        ..MappedParam::new(name.clone())
    };
    match ty.pass {
        PassConvention::Default => {
            mapped.native_type = format!("{c}{element}*");
            mapped.arg = ptr;
        }
        PassConvention::ByVal | PassConvention::ByRef => {
            if ty.pass == PassConvention::ByVal && !value_type {
                return Err(GenerationError::ByValueRequiresValueType {
                    decl: site.decl.to_string(),
                    ty: ty.host.host_name(),
                });
            }
            mapped.checks.push(format!("if ({ptr} == NULL) return nb_fail_null(env);"));
            mapped.arg = format!("*{ptr}");
            mapped.native_type = if ty.pass == PassConvention::ByRef {
                format!("{c}{element}&")
            } else {
                element.to_string()
            };
        }
        PassConvention::ByPtrPtr | PassConvention::ByPtrRef => {
            mapped.setup.push(format!("{element}* {name}_ptr = {ptr};"));
            mapped.read_back.push(format!(
                "if ({name} != NULL) nb_set_pointer({name}, {name}_ptr, 1, NULL);"
            ));
            if ty.pass == PassConvention::ByPtrPtr {
                mapped.arg = format!("&{name}_ptr");
                mapped.native_type = format!("{element}**");
            } else {
                mapped.arg = format!("{name}_ptr");
                mapped.native_type = format!("{element}*&");
            }
        }
    }
    Ok(mapped)
}

fn map_callback_param(
    site: &Site<'_>,
    name: String,
    ty: &TypeSpec,
    class: &ResolvedClass,
) -> Result<MappedParam, GenerationError> {
    let fn_type = class.fn_type();
    let target = format!("nb_fn<{fn_type}>({name})");
    let mut mapped = MappedParam {
        abi: vec![format!("nb_pointer* {name}")],
        ..MappedParam::new(name.clone())
    };
    match ty.pass {
        PassConvention::Default => {
            mapped.arg = target;
            mapped.native_type = fn_type;
        }
        PassConvention::ByVal | PassConvention::ByRef => {
            let functor = class.functor_type();
            mapped.checks.push(format!("if ({target} == NULL) return nb_fail_null(env);"));
            mapped.setup.push(format!("{functor} {name}_functor = {{ {target} }};"));
            mapped.arg = format!("{name}_functor");
            mapped.native_type = if ty.pass == PassConvention::ByRef {
                format!("{}{functor}&", const_prefix(ty))
            } else {
                functor
            };
        }
        PassConvention::ByPtrPtr | PassConvention::ByPtrRef => {
            return Err(site.unsupported(ty, "callbacks cannot be passed as pointer-to-pointer"));
        }
    }
    Ok(mapped)
}

fn map_string_param(name: String, ty: &TypeSpec) -> MappedParam {
    let mut mapped = MappedParam {
        abi: vec![format!("const char* {name}")],
        ..MappedParam::new(name.clone())
    };
    match ty.pass {
        PassConvention::ByVal | PassConvention::ByRef => {
            mapped.checks.push(format!("if ({name} == NULL) return nb_fail_null(env);"));
            mapped.setup.push(format!("std::string {name}_value({name});"));
            mapped.arg = format!("{name}_value");
            mapped.native_type = if ty.pass == PassConvention::ByRef {
                format!("{}std::string&", const_prefix(ty))
            } else {
                "std::string".to_string()
            };
        }
        _ => {
            mapped.arg = name;
            mapped.native_type = "const char*".to_string();
        }
    }
    mapped
}

fn adapter_element(site: &Site<'_>, ty: &TypeSpec) -> Result<String, GenerationError> {
    match &ty.host {
        HostType::PrimitiveHandle(kind) => Ok(kind.native_type().to_string()),
        HostType::Handle(class) => {
            let class = site.class(class)?;
            match class.kind {
                ClassKind::Opaque | ClassKind::Value => Ok(class.native_type()),
                _ => Err(site.unsupported(ty, "adapters need an element type")),
            }
        }
        _ => Err(site.conflict(format!("{VECTOR_ADAPTER} on {}", ty.host))),
    }
}

fn check_adapter(site: &Site<'_>, adapter: &AdapterSpec) -> Result<(), GenerationError> {
    if adapter.name == VECTOR_ADAPTER || adapter.name == STRING_ADAPTER {
        Ok(())
    } else {
        Err(GenerationError::UnknownAdapter {
            decl: site.decl.to_string(),
            adapter: adapter.name.clone(),
        })
    }
}

fn map_adapted_param(
    site: &Site<'_>,
    name: String,
    ty: &TypeSpec,
    adapter: &AdapterSpec,
) -> Result<MappedParam, GenerationError> {
    check_adapter(site, adapter)?;
    if matches!(ty.pass, PassConvention::ByPtrPtr | PassConvention::ByPtrRef) {
        return Err(site.conflict(format!("adapter {} with {} passing", adapter.name, ty.pass)));
    }
    let direction = adapter.effective_direction(ty.is_const);
    let temporary = format!("{name}_adapter");
    let source = if direction == Direction::Out {
        "(nb_pointer*)NULL".to_string()
    } else {
        name.clone()
    };

    let mut mapped = MappedParam {
        native_type: format!("{}{}&", const_prefix(ty), adapter.native_type),
        arg: format!("{temporary}.value"),
        ..MappedParam::new(name.clone())
    };
    match (adapter.name.as_str(), &ty.host) {
        (STRING_ADAPTER, HostType::String) => {
            mapped.abi.push(format!("const char* {name}"));
            mapped.setup.push(format!("nb_string_adapter {temporary}({name});"));
        }
        (STRING_ADAPTER, HostType::PrimitiveHandle(PrimitiveKind::Byte)) => {
            mapped.abi.push(format!("nb_pointer* {name}"));
            mapped.checks.push(range_check(&name));
            mapped.setup.push(format!("nb_string_adapter {temporary}({source});"));
            if direction.reads_back() {
                mapped.read_back.push(format!("{temporary}.read_back({name});"));
            }
        }
        (STRING_ADAPTER, _) => return Err(site.conflict(format!("{STRING_ADAPTER} on {}", ty.host))),
        _ => {
            let element = adapter_element(site, ty)?;
            mapped.abi.push(format!("nb_pointer* {name}"));
            mapped.checks.push(range_check(&name));
            mapped.setup.push(format!("nb_vector_adapter<{element} > {temporary}({source});"));
            if direction.reads_back() {
                mapped.read_back.push(format!("{temporary}.read_back({name});"));
            }
        }
    }
    mapped.temporaries.push(temporary);
    Ok(mapped)
}

fn range_check(name: &str) -> String {
    format!(
        "if (!nb_range_ok({name})) return nb_fail_range(env, {name}->position, {name}->limit, 0);"
    )
}

/// How a native result is stored for the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnKind {
    Void,
    /// A primitive written through `nb_ret`.
    Value { abi: String },
    /// An address written into the `nb_ret` handle descriptor.
    Pointer,
    /// A reference whose address is written into `nb_ret`.
    Reference,
    /// A by-value object copied into new storage owned by `nb_ret`.
    Copy { element: String, owned: bool },
    /// A function pointer written into `nb_ret`.
    Function,
    /// A string copied into new byte storage owned by `nb_ret`.
    String,
    /// A vector copied into new element storage owned by `nb_ret`.
    Vector,
}

/// A return type mapped to native code.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MappedReturn {
    /// ABI declaration of the result parameter.
    pub abi: Option<String>,
    /// Native static type of the call expression.
    pub native_type: String,
    pub kind: ReturnKind,
    cast: Option<String>,
}

impl MappedReturn {
    /// The return of a function with no result.
    pub fn void() -> Self {
        Self {
            abi: None,
            native_type: "void".to_string(),
            kind: ReturnKind::Void,
            cast: None,
        }
    }

    /// Lines storing the result of `call`.
    pub fn store(&self, call: &str) -> Vec<String> {
        let call = match &self.cast {
            Some(cast) => format!("({cast})({call})"),
            None => call.to_string(),
        };
        match &self.kind {
            ReturnKind::Void => vec![format!("{call};")],
            ReturnKind::Value { abi } => vec![format!("*nb_ret = ({abi})({call});")],
            ReturnKind::Pointer => vec![format!("nb_set_pointer(nb_ret, ({call}), 1, NULL);")],
            ReturnKind::Reference => vec![format!("nb_set_pointer(nb_ret, &({call}), 1, NULL);")],
            ReturnKind::Copy { element, owned } => {
                let owner = if *owned {
                    format!("&nb_release_object<{element} >")
                } else {
                    "NULL".to_string()
                };
                vec![
                    format!("{element}* nb_value = new (std::nothrow) {element}({call});"),
                    format!("nb_set_pointer(nb_ret, nb_value, 1, {owner});"),
                ]
            }
            ReturnKind::Function => {
                vec![format!("nb_set_pointer(nb_ret, reinterpret_cast<void*>({call}), 1, NULL);")]
            }
            ReturnKind::String => vec![format!("nb_set_string(nb_ret, {call});")],
            ReturnKind::Vector => vec![format!("nb_set_vector(nb_ret, {call});")],
        }
    }

    /// Whether a result parameter exists.
    pub fn has_result(&self) -> bool {
        self.abi.is_some()
    }
}

/// Map a return type.
pub fn map_return(site: &Site<'_>, ty: &TypeSpec) -> Result<MappedReturn, GenerationError> {
    let handle_abi = Some("nb_pointer* nb_ret".to_string());
    let owned = !site.flags.contains(Annotations::NO_DEALLOCATOR);
    let mut mapped = match (&ty.host, &ty.adapter) {
        (HostType::Void, _) => return Ok(MappedReturn::void()),
        (_, Some(adapter)) => {
            check_adapter(site, adapter)?;
            let kind = match (adapter.name.as_str(), &ty.host) {
                (STRING_ADAPTER, HostType::String | HostType::PrimitiveHandle(PrimitiveKind::Byte)) => {
                    ReturnKind::String
                }
                (STRING_ADAPTER, _) => return Err(site.conflict(format!("{STRING_ADAPTER} on {}", ty.host))),
                _ => {
                    adapter_element(site, ty)?;
                    ReturnKind::Vector
                }
            };
            MappedReturn {
                abi: handle_abi,
                native_type: adapter.native_type.clone(),
                kind,
                cast: None,
            }
        }
        (HostType::Primitive(kind), None) => MappedReturn {
            abi: Some(format!("{}* nb_ret", kind.abi_type())),
            native_type: kind.native_type().to_string(),
            kind: ReturnKind::Value {
                abi: kind.abi_type().to_string(),
            },
            cast: None,
        },
        (HostType::PrimitiveHandle(kind), None) => {
            map_handle_return(site, ty, kind.native_type(), true, owned)?
        }
        (HostType::Handle(class), None) => {
            let class = site.class(class)?;
            match class.kind {
                ClassKind::Callback => MappedReturn {
                    abi: handle_abi,
                    native_type: class.fn_type(),
                    kind: ReturnKind::Function,
                    cast: None,
                },
                ClassKind::Global => return Err(site.unsupported(ty, "a global container is not a type")),
                kind => map_handle_return(site, ty, &class.native_type(), kind == ClassKind::Value, owned)?,
            }
        }
        (HostType::String, None) => MappedReturn {
            abi: handle_abi,
            native_type: "const char*".to_string(),
            kind: ReturnKind::String,
            cast: None,
        },
        (HostType::PrimitiveArray(_), None) => {
            return Err(site.unsupported(ty, "host arrays cannot be returned"));
        }
        (HostType::Object, None) => return Err(site.unsupported(ty, "host objects cannot be returned")),
    };
    mapped.cast = ty.cast.clone();
    Ok(mapped)
}

fn map_handle_return(
    site: &Site<'_>,
    ty: &TypeSpec,
    element: &str,
    value_type: bool,
    owned: bool,
) -> Result<MappedReturn, GenerationError> {
    let c = const_prefix(ty);
    let (native_type, kind) = match ty.pass {
        PassConvention::Default => (format!("{c}{element}*"), ReturnKind::Pointer),
        PassConvention::ByRef => (format!("{c}{element}&"), ReturnKind::Reference),
        PassConvention::ByVal if value_type => (
            element.to_string(),
            ReturnKind::Copy {
                element: element.to_string(),
                owned,
            },
        ),
        PassConvention::ByVal => {
            return Err(GenerationError::ByValueRequiresValueType {
                decl: site.decl.to_string(),
                ty: ty.host.host_name(),
            });
        }
        PassConvention::ByPtrPtr | PassConvention::ByPtrRef => {
            return Err(site.unsupported(ty, "pointer-to-pointer results are not supported"));
        }
    };
    Ok(MappedReturn {
        abi: Some("nb_pointer* nb_ret".to_string()),
        native_type,
        kind,
        cast: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GeneratorOptions;
    use nativebind_core::ClassDecl;

    struct Fixture {
        set: DeclarationSet,
        resolution: Resolution,
        from: ClassId,
    }

    impl Fixture {
        fn new() -> Self {
            let mut set = DeclarationSet::new();
            let from = set
                .add_class(ClassDecl::opaque("Mat").namespace("cv").nest(ClassDecl::value("Size")))
                .unwrap();
            set.add_class(ClassDecl::callback("Listener").method(nativebind_core::MethodDecl::call()))
                .unwrap();
            let (resolution, _) = Resolution::build(&set, &GeneratorOptions::default());
            Self { set, resolution, from }
        }

        fn site(&self, flags: Annotations) -> Site<'_> {
            Site {
                set: &self.set,
                resolution: &self.resolution,
                from: self.from,
                decl: "Mat.test",
                flags,
            }
        }

        fn param(&self, ty: TypeSpec) -> Result<MappedParam, GenerationError> {
            map_param(&self.site(Annotations::empty()), 0, &ParamDecl::new("x", ty))
        }
    }

    #[test]
    fn primitives_pass_directly() {
        let fx = Fixture::new();
        let mapped = fx.param(TypeSpec::primitive(PrimitiveKind::Long)).unwrap();
        assert_eq!(mapped.abi, vec!["int64_t a0"]);
        assert_eq!(mapped.arg, "a0");
        assert_eq!(mapped.native_type, "long long");
        assert!(mapped.checks.is_empty());
    }

    #[test]
    fn dereferencing_conventions_check_null_first() {
        let fx = Fixture::new();
        let by_ref = fx.param(TypeSpec::handle("Size").by_ref().constant()).unwrap();
        assert_eq!(by_ref.native_type, "const cv::Mat::Size&");
        assert_eq!(by_ref.checks.len(), 1);
        assert!(by_ref.checks[0].contains("nb_fail_null"));

        let by_ptr = fx.param(TypeSpec::handle("Size")).unwrap();
        assert!(by_ptr.checks.is_empty());
        assert_eq!(by_ptr.native_type, "cv::Mat::Size*");
    }

    #[test]
    fn by_value_needs_value_semantics() {
        let fx = Fixture::new();
        assert!(fx.param(TypeSpec::handle("Size").by_val()).is_ok());
        let err = fx.param(TypeSpec::handle("Mat").by_val()).unwrap_err();
        assert_eq!(
            err,
            GenerationError::ByValueRequiresValueType {
                decl: "Mat.test".into(),
                ty: "Mat".into()
            }
        );
    }

    #[test]
    fn pointer_to_pointer_reads_back() {
        let fx = Fixture::new();
        let mapped = fx.param(TypeSpec::handle("Mat").by_ptr_ptr()).unwrap();
        assert_eq!(mapped.arg, "&a0_ptr");
        assert_eq!(mapped.native_type, "cv::Mat**");
        assert_eq!(mapped.read_back.len(), 1);
    }

    #[test]
    fn callbacks_map_to_pointer_or_functor() {
        let fx = Fixture::new();
        let pointer = fx.param(TypeSpec::handle("Listener")).unwrap();
        assert_eq!(pointer.native_type, "nb_Listener_fn");
        let functor = fx.param(TypeSpec::handle("Listener").by_ref()).unwrap();
        assert_eq!(functor.native_type, "nb_Listener_functor&");
        assert_eq!(functor.arg, "a0_functor");
    }

    #[test]
    fn adapters_declare_one_temporary() {
        let fx = Fixture::new();
        let adapter = AdapterSpec::new(VECTOR_ADAPTER, "std::vector<int>");
        let mapped = fx
            .param(TypeSpec::primitive_handle(PrimitiveKind::Int).adapter(adapter.clone()))
            .unwrap();
        assert_eq!(mapped.temporaries, vec!["a0_adapter"]);
        assert_eq!(mapped.arg, "a0_adapter.value");
        assert_eq!(mapped.read_back, vec!["a0_adapter.read_back(a0);"]);

        let read_only = fx
            .param(TypeSpec::primitive_handle(PrimitiveKind::Int).constant().adapter(adapter))
            .unwrap();
        assert!(read_only.read_back.is_empty());
        assert_eq!(read_only.native_type, "const std::vector<int>&");
    }

    #[test]
    fn unknown_adapters_are_rejected() {
        let fx = Fixture::new();
        let err = fx
            .param(TypeSpec::handle("Mat").adapter(AdapterSpec::new("SharedPtr", "std::shared_ptr<cv::Mat>")))
            .unwrap_err();
        assert!(matches!(err, GenerationError::UnknownAdapter { .. }));
    }

    #[test]
    fn raw_objects_need_passthrough() {
        let fx = Fixture::new();
        assert!(fx.param(TypeSpec::object()).is_err());
        let site = fx.site(Annotations::RAW_PASSTHROUGH);
        let mapped = map_param(&site, 1, &ParamDecl::new("o", TypeSpec::object())).unwrap();
        assert_eq!(mapped.abi, vec!["void* a1"]);
    }

    #[test]
    fn casts_replace_static_type() {
        let fx = Fixture::new();
        let mapped = fx.param(TypeSpec::primitive(PrimitiveKind::Int).cast("unsigned")).unwrap();
        assert_eq!(mapped.arg, "(unsigned)(a0)");
        assert_eq!(mapped.native_type, "unsigned");
    }

    #[test]
    fn returns_store_through_result_parameter() {
        let fx = Fixture::new();
        let site = fx.site(Annotations::empty());
        let ret = map_return(&site, &TypeSpec::primitive(PrimitiveKind::Double)).unwrap();
        assert_eq!(ret.abi.as_deref(), Some("double* nb_ret"));
        assert_eq!(ret.store("f()"), vec!["*nb_ret = (double)(f());"]);

        let copy = map_return(&site, &TypeSpec::handle("Size").by_val()).unwrap();
        let lines = copy.store("m.size()");
        assert!(lines[0].contains("new (std::nothrow) cv::Mat::Size(m.size())"));
        assert!(lines[1].contains("nb_release_object"));

        let quiet = fx.site(Annotations::NO_DEALLOCATOR);
        let unowned = map_return(&quiet, &TypeSpec::handle("Size").by_val()).unwrap();
        assert!(unowned.store("m.size()")[1].ends_with("1, NULL);"));

        assert!(map_return(&site, &TypeSpec::array(PrimitiveKind::Int)).is_err());
        assert!(!map_return(&site, &TypeSpec::void()).unwrap().has_result());
    }
}
