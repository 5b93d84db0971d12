//! Bridging functions: one exported function per method, allocator, index
//! operation, operator, and field accessor.
//!
//! Every bridging function returns an `nb_status` and takes the call
//! environment first. Handle preconditions are checked before anything is
//! dereferenced; the native call runs inside exception translation unless the
//! declaration is marked no-exception, in which case the function is
//! `noexcept` and a native failure terminates.

use nativebind_core::error::DEFAULT_HOST_KIND;
use nativebind_core::{
    Annotations, ClassKind, FieldDecl, GenerationError, HostType, IndexOp, MethodDecl, MethodKind,
    NativeName, NativeScope, ParamDecl, PrimitiveKind, TypeSpec, mangle,
};
use nativebind_registry::ClassEntry;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use super::{Context, EmittedFunction, FunctionKind, SourceWriter};
use crate::overload::{apply_casts, find_best_match};
use crate::resolve::{ResolvedClass, member_native_name};
use crate::type_map::{MappedParam, MappedReturn, Site, map_param, map_return};

// ============================================================================
// Bridge Assembly
// ============================================================================

/// How a bridging function reaches what it operates on.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Receiver {
    /// Free function; no `self` parameter.
    None,
    /// `self` points at an instance of the given native type.
    Object(String),
    /// `self` holds a native function pointer of the given type.
    Function(String),
    /// `self` receives newly allocated storage.
    Output,
}

struct Bridge {
    decl: String,
    symbol: String,
    receiver: Receiver,
    params: Vec<MappedParam>,
    ret: MappedReturn,
    /// Lines before setup that may return a failure status.
    checks: Vec<String>,
    /// Lines performing the operation and storing its result.
    body: Vec<String>,
    no_exception: bool,
    /// Native exception types declared on the declaration, in order.
    throws: Vec<String>,
}

impl Bridge {
    fn abi(&self) -> Vec<String> {
        let mut abi = vec!["nb_env* env".to_string()];
        if self.receiver != Receiver::None {
            abi.push("nb_pointer* self".to_string());
        }
        abi.extend(self.params.iter().flat_map(|p| p.abi.iter().cloned()));
        abi.extend(self.ret.abi.iter().cloned());
        abi
    }

    fn write(self, cx: &Context<'_>) -> EmittedFunction {
        let mut w = SourceWriter::new();
        let noexcept = if self.no_exception { " noexcept" } else { "" };
        w.open(&format!(
            "extern \"C\" NB_EXPORT nb_status {}({}){noexcept}",
            self.symbol,
            self.abi().join(", ")
        ));

        match &self.receiver {
            Receiver::None => {}
            Receiver::Object(ty) => {
                w.line(&format!("{ty}* nb_this = nb_ptr<{ty} >(self);"));
                w.line("if (nb_this == NULL) return nb_fail_null(env);");
            }
            Receiver::Function(ty) => {
                w.line(&format!("{ty} nb_this = nb_fn<{ty}>(self);"));
                w.line("if (nb_this == NULL) return nb_fail_null(env);");
            }
            Receiver::Output => w.line("if (self == NULL) return nb_fail_null(env);"),
        }
        for param in &self.params {
            w.lines(&param.checks);
        }
        w.lines(&self.checks);
        if self.ret.has_result() {
            w.line("if (nb_ret == NULL) return nb_fail_null(env);");
        }

        let inner: Vec<&String> = self
            .params
            .iter()
            .flat_map(|p| p.setup.iter())
            .chain(self.body.iter())
            .chain(self.params.iter().flat_map(|p| p.read_back.iter()))
            .collect();

        if self.no_exception {
            w.lines(inner);
        } else {
            w.open("try");
            w.lines(inner);
            for kind in &self.throws {
                w.reopen(&format!("}} catch ({kind}& e) {{"));
                w.line(&format!(
                    "return nb_raise(env, NB_NATIVE_EXCEPTION, \"{kind}\", e.what());"
                ));
            }
            w.reopen(&format!("}} catch ({}& e) {{", cx.options.default_exception));
            w.line(&format!(
                "return nb_raise(env, NB_NATIVE_EXCEPTION, \"{DEFAULT_HOST_KIND}\", e.what());"
            ));
            w.reopen("} catch (...) {");
            w.line(&format!(
                "return nb_raise(env, NB_NATIVE_EXCEPTION, \"{DEFAULT_HOST_KIND}\", \"unknown native exception\");"
            ));
            w.close();
        }
        w.line("return NB_OK;");
        w.close();

        EmittedFunction {
            decl: self.decl,
            symbol: self.symbol,
            kind: FunctionKind::Bridge,
            body: w.finish(),
            temporaries: self.params.into_iter().flat_map(|p| p.temporaries).collect(),
            no_exception: self.no_exception,
        }
    }
}

fn native_args(params: &[MappedParam], flags: Annotations) -> String {
    let mut args: Vec<&str> = Vec::with_capacity(params.len() + 1);
    if flags.contains(Annotations::RAW_PASSTHROUGH) {
        args.push("env->host");
    }
    args.extend(params.iter().map(|p| p.arg.as_str()));
    args.join(", ")
}

fn map_params(site: &Site<'_>, params: &[ParamDecl]) -> Result<Vec<MappedParam>, GenerationError> {
    params
        .iter()
        .enumerate()
        .map(|(i, p)| map_param(site, i, p))
        .collect()
}

fn select_overload(site: &Site<'_>, params: &mut [MappedParam], method: &MethodDecl) -> Result<(), GenerationError> {
    if let Some(selected) = find_best_match(site.decl, params, &method.candidates)? {
        debug!(decl = site.decl, candidate = selected.index, casts = selected.cost(), "selected overload");
        apply_casts(params, &method.candidates[selected.index], &selected);
    }
    Ok(())
}

fn conflict(decl: &str, detail: impl Into<String>) -> GenerationError {
    GenerationError::ConflictingAnnotations {
        decl: decl.to_string(),
        detail: detail.into(),
    }
}

// ============================================================================
// Classes
// ============================================================================

/// Emit the bridging functions of one class, in declaration order.
///
/// A declaration that fails is reported in `errors` and skipped; the rest of
/// the class is still emitted.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn emit_class(
    cx: &Context<'_>,
    class: &ResolvedClass,
    entry: &ClassEntry,
    out: &mut Vec<EmittedFunction>,
    errors: &mut Vec<GenerationError>,
) {
    let mut group_sizes: FxHashMap<&str, usize> = FxHashMap::default();
    for method in &entry.decl.methods {
        *group_sizes.entry(method.host_name.as_str()).or_default() += 1;
    }
    let mut ordinals: FxHashMap<&str, usize> = FxHashMap::default();

    for method in &entry.decl.methods {
        let name = method.host_name.as_str();
        let suffix = if group_sizes.get(name).copied().unwrap_or(0) > 1 {
            let ordinal = ordinals.entry(name).or_default();
            let suffix = format!("__{ordinal}");
            *ordinal += 1;
            suffix
        } else {
            String::new()
        };
        let symbol = format!("{}_{}{suffix}", class.symbol, mangle(name));
        record(emit_method(cx, class, entry, method, symbol), out, errors);
    }

    for field in &entry.decl.fields {
        let getter = format!("{}_get_{}", class.symbol, mangle(&field.host_name));
        record(emit_field(cx, class, field, getter, false).map(Some), out, errors);
        if field.has_setter() {
            let setter = format!("{}_set_{}", class.symbol, mangle(&field.host_name));
            record(emit_field(cx, class, field, setter, true).map(Some), out, errors);
        }
    }
}

fn record(
    result: Result<Option<EmittedFunction>, GenerationError>,
    out: &mut Vec<EmittedFunction>,
    errors: &mut Vec<GenerationError>,
) {
    match result {
        Ok(Some(function)) => {
            debug!(decl = %function.decl, symbol = %function.symbol, "emitted bridge");
            out.push(function);
        }
        Ok(None) => {}
        Err(err) => {
            warn!(decl = err.decl(), error = %err, "skipping declaration");
            errors.push(err);
        }
    }
}

// ============================================================================
// Methods
// ============================================================================

fn emit_method(
    cx: &Context<'_>,
    class: &ResolvedClass,
    entry: &ClassEntry,
    method: &MethodDecl,
    symbol: String,
) -> Result<Option<EmittedFunction>, GenerationError> {
    let decl = format!("{}.{}", class.host_name, method.host_name);
    let mut flags = method.flags;
    if class.no_exception() {
        flags |= Annotations::NO_EXCEPTION;
    }
    if class.no_deallocator() {
        flags |= Annotations::NO_DEALLOCATOR;
    }
    let site = Site {
        set: cx.set,
        resolution: cx.resolution,
        from: class.id,
        decl: &decl,
        flags,
    };

    let mut bridge = Bridge {
        decl: decl.clone(),
        symbol,
        receiver: Receiver::None,
        params: Vec::new(),
        ret: MappedReturn::void(),
        checks: Vec::new(),
        body: Vec::new(),
        no_exception: flags.contains(Annotations::NO_EXCEPTION),
        throws: method.throws.clone(),
    };

    match &method.kind {
        MethodKind::Method => {
            if class.kind == ClassKind::Callback {
                return Err(conflict(&decl, "callback classes only declare their call method"));
            }
            bridge.params = map_params(&site, &method.params)?;
            select_overload(&site, &mut bridge.params, method)?;
            bridge.ret = map_return(&site, &method.returns)?;
            let args = native_args(&bridge.params, flags);
            let native = member_native_name(&class.member_scope, method);
            let call = if class.kind == ClassKind::Global || method.is_static() {
                format!("{}({args})", native.qualified())
            } else {
                bridge.receiver = Receiver::Object(class.native_type());
                format!("nb_this->{}({args})", native.name)
            };
            bridge.body = bridge.ret.store(&call);
        }
        MethodKind::Call => {
            bridge.receiver = Receiver::Function(class.fn_type());
            bridge.params = map_params(&site, &method.params)?;
            bridge.ret = map_return(&site, &method.returns)?;
            let call = format!("nb_this({})", native_args(&bridge.params, flags));
            bridge.body = bridge.ret.store(&call);
        }
        MethodKind::Allocator | MethodKind::ArrayAllocator if class.kind == ClassKind::Callback => {
            if method.kind == MethodKind::Allocator && host_implemented(entry) {
                debug!(decl = %decl, "callback allocation binds a trampoline slot");
                return Ok(None);
            }
            return Err(conflict(&decl, "callback allocation needs a host-implemented call method"));
        }
        MethodKind::Allocator => {
            allocatable(class, &decl)?;
            bridge.receiver = Receiver::Output;
            bridge.params = map_params(&site, &method.params)?;
            select_overload(&site, &mut bridge.params, method)?;
            let ty = class.native_type();
            let owner = owner(flags, &format!("&nb_release_object<{ty} >"));
            let args = native_args(&bridge.params, flags);
            bridge.body = vec![
                format!("{ty}* nb_value = new (std::nothrow) {ty}({args});"),
                format!("nb_set_pointer(self, nb_value, 1, {owner});"),
            ];
        }
        MethodKind::ArrayAllocator => {
            allocatable(class, &decl)?;
            let [size] = method.params.as_slice() else {
                return Err(conflict(&decl, "array allocators take exactly the element count"));
            };
            if !matches!(
                size.ty.host,
                HostType::Primitive(PrimitiveKind::Int | PrimitiveKind::Long | PrimitiveKind::Size)
            ) {
                return Err(conflict(&decl, "array allocator count must be an integer"));
            }
            bridge.receiver = Receiver::Output;
            bridge.params = map_params(&site, &method.params)?;
            let ty = class.native_type();
            let owner = owner(flags, &format!("&nb_release_array<{ty} >"));
            bridge.body = vec![
                "intptr_t nb_count = a0 > 0 ? (intptr_t)a0 : 0;".to_string(),
                format!("{ty}* nb_value = new (std::nothrow) {ty}[nb_count > 0 ? nb_count : 1];"),
                format!("nb_set_pointer(self, nb_value, nb_count, {owner});"),
            ];
        }
        MethodKind::Index(op) => emit_index(&site, class, entry, method, *op, &mut bridge)?,
        MethodKind::Operator(op) => {
            bridge.params = map_params(&site, &method.params)?;
            select_overload(&site, &mut bridge.params, method)?;
            bridge.ret = map_return(&site, &method.returns)?;
            let expr = if class.kind == ClassKind::Global || method.is_static() {
                let native = member_native_name(&class.member_scope, method);
                format!("{}({})", native.qualified(), native_args(&bridge.params, flags))
            } else {
                bridge.receiver = Receiver::Object(class.native_type());
                operator_expr(&decl, op, &bridge.params)?
            };
            bridge.body = bridge.ret.store(&expr);
        }
    }

    Ok(Some(bridge.write(cx)))
}

fn host_implemented(entry: &ClassEntry) -> bool {
    entry
        .decl
        .call_methods()
        .any(|m| m.flags.contains(Annotations::HOST_IMPLEMENTED))
}

fn allocatable(class: &ResolvedClass, decl: &str) -> Result<(), GenerationError> {
    if class.kind.is_allocatable() {
        Ok(())
    } else {
        Err(GenerationError::AllocatorOnNonPointer { decl: decl.to_string() })
    }
}

fn owner(flags: Annotations, release: &str) -> String {
    if flags.contains(Annotations::NO_DEALLOCATOR) {
        "NULL".to_string()
    } else {
        release.to_string()
    }
}

fn operator_expr(decl: &str, op: &str, params: &[MappedParam]) -> Result<String, GenerationError> {
    let args = params.iter().map(|p| p.arg.as_str()).collect::<Vec<_>>().join(", ");
    match (op, params) {
        ("()", _) => Ok(format!("(*nb_this)({args})")),
        ("[]", [index]) => Ok(format!("(*nb_this)[{}]", index.arg)),
        (_, []) => Ok(format!("({op}*nb_this)")),
        (_, [rhs]) => Ok(format!("(*nb_this {op} {})", rhs.arg)),
        _ => Err(conflict(decl, format!("operator{op} takes at most one operand"))),
    }
}

// ============================================================================
// Index Access
// ============================================================================

fn emit_index(
    site: &Site<'_>,
    class: &ResolvedClass,
    entry: &ClassEntry,
    method: &MethodDecl,
    op: IndexOp,
    bridge: &mut Bridge,
) -> Result<(), GenerationError> {
    let decl = site.decl;
    let Some(element) = &entry.decl.element else {
        return Err(GenerationError::IndexWithoutAccessor {
            decl: decl.to_string(),
            detail: "class declares no container element".to_string(),
        });
    };
    let depth = entry.decl.container_depth;
    let arity = method.index_arity;
    let arity_ok = if op.addresses_element() { arity == depth } else { arity < depth };
    if !arity_ok {
        return Err(GenerationError::IndexWithoutAccessor {
            decl: decl.to_string(),
            detail: format!("{op:?} with {arity} subscript(s) on a depth-{depth} container"),
        });
    }
    if method.params.len() != arity + op.value_params() {
        return Err(conflict(
            decl,
            format!("{op:?} takes {arity} subscript(s) and {} value(s)", op.value_params()),
        ));
    }

    bridge.receiver = Receiver::Object(class.native_type());
    bridge.params = map_params(site, &method.params[..arity])?;

    let ty = class.native_type();
    let mut body = vec![format!("{ty}& nb_c0 = *nb_this;")];
    for k in 0..arity {
        body.push(format!(
            "if ((size_t)a{k} >= nb_c{k}.size()) return nb_fail_index(env, (intptr_t)a{k}, (intptr_t)nb_c{k}.size());"
        ));
        body.push(format!("auto& nb_c{} = nb_c{k}[(size_t)a{k}];", k + 1));
    }
    let target = format!("nb_c{arity}");

    match op {
        IndexOp::Get => {
            bridge.ret = map_return(site, element)?;
            body.extend(bridge.ret.store(&target));
        }
        IndexOp::Set => {
            let value = map_param(site, arity, &ParamDecl::new("value", element.clone()))?;
            body.push(format!("{target} = {};", value.arg));
            bridge.params.push(value);
        }
        IndexOp::Size => {
            bridge.ret = map_return(site, &TypeSpec::primitive(PrimitiveKind::Long))?;
            body.extend(bridge.ret.store(&format!("{target}.size()")));
        }
        IndexOp::Empty => {
            bridge.ret = map_return(site, &TypeSpec::primitive(PrimitiveKind::Bool))?;
            body.extend(bridge.ret.store(&format!("{target}.empty()")));
        }
        IndexOp::Resize => {
            let declared = &method.params[arity];
            let HostType::Primitive(kind) = declared.ty.host else {
                return Err(conflict(decl, "resize takes an integer size"));
            };
            let value = map_param(site, arity, declared)?;
            match kind {
                PrimitiveKind::Size => {}
                PrimitiveKind::Byte | PrimitiveKind::Short | PrimitiveKind::Int | PrimitiveKind::Long => {
                    bridge.checks.push(format!(
                        "if ({0} < 0) return nb_fail_range(env, 0, 0, (intptr_t){0});",
                        value.name
                    ));
                }
                _ => return Err(conflict(decl, "resize takes an integer size")),
            }
            body.push(format!("{target}.resize((size_t)({}));", value.arg));
            bridge.params.push(value);
        }
    }
    bridge.body = body;
    Ok(())
}

// ============================================================================
// Fields
// ============================================================================

fn emit_field(
    cx: &Context<'_>,
    class: &ResolvedClass,
    field: &FieldDecl,
    symbol: String,
    setter: bool,
) -> Result<EmittedFunction, GenerationError> {
    let decl = format!("{}.{}", class.host_name, field.host_name);
    if class.kind == ClassKind::Callback {
        return Err(conflict(&decl, "callback classes have no fields"));
    }
    let mut flags = field.flags;
    if class.no_exception() {
        flags |= Annotations::NO_EXCEPTION;
    }
    let site = Site {
        set: cx.set,
        resolution: cx.resolution,
        from: class.id,
        decl: &decl,
        flags,
    };

    let native = NativeName::resolve(&class.member_scope, &NativeScope::Inherit, field.native_ident());
    let free = class.kind == ClassKind::Global || flags.contains(Annotations::STATIC);
    let mut access = if free {
        native.qualified()
    } else {
        format!("nb_this->{}", native.name)
    };
    let subscripts: Vec<ParamDecl> = (0..field.index_arity)
        .map(|k| ParamDecl::new(format!("i{k}"), TypeSpec::primitive(PrimitiveKind::Long)))
        .collect();
    for k in 0..field.index_arity {
        access.push_str(&format!("[(size_t)a{k}]"));
    }

    let mut bridge = Bridge {
        decl: decl.clone(),
        symbol,
        receiver: if free {
            Receiver::None
        } else {
            Receiver::Object(class.native_type())
        },
        params: map_params(&site, &subscripts)?,
        ret: MappedReturn::void(),
        checks: Vec::new(),
        body: Vec::new(),
        no_exception: flags.contains(Annotations::NO_EXCEPTION),
        throws: Vec::new(),
    };
    if setter {
        let value = map_param(&site, field.index_arity, &ParamDecl::new("value", field.ty.clone()))?;
        bridge.body.push(format!("{access} = {};", value.arg));
        bridge.params.push(value);
    } else {
        bridge.ret = map_return(&site, &field.ty)?;
        bridge.body = bridge.ret.store(&access);
    }
    Ok(bridge.write(cx))
}
