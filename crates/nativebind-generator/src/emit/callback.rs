//! Callback types, trampolines, and the companion header.
//!
//! Every callback class gets a function pointer typedef and a functor
//! wrapper for native code expecting a function object. A class whose call
//! method is host-implemented also gets a fixed set of trampolines: native
//! callable stubs that attach the calling thread to the host runtime and
//! dispatch into the host logic bound to their slot.

use nativebind_core::error::DEFAULT_NATIVE_KIND;
use nativebind_core::{Annotations, ClassFlags, DeclHash, GenerationError, MethodDecl, mangle};
use nativebind_registry::ClassEntry;
use tracing::debug;

use super::{Context, EmittedFunction, FunctionKind, SourceWriter};
use crate::GeneratorOptions;
use crate::resolve::ResolvedClass;
use crate::type_map::{ReturnKind, Site, map_param, map_return};

/// The native signature of one callback class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackShape {
    pub decl: String,
    pub symbol: String,
    pub fn_type: String,
    pub functor_type: String,
    /// Identity handed to the host dispatcher.
    pub hash: DeclHash,
    /// Native parameter types, in order.
    pub params: Vec<String>,
    /// Native return type.
    pub ret: String,
    /// Failure type thrown when the host logic fails.
    pub throws: String,
    pub no_exception: bool,
    pub host_implemented: bool,
    /// Trampolines are exported and declared in the companion header.
    pub exported: bool,
}

impl CallbackShape {
    /// Compute the shape of a resolved callback class.
    pub fn build(cx: &Context<'_>, class: &ResolvedClass, entry: &ClassEntry) -> Result<Self, GenerationError> {
        let call: &MethodDecl = entry.decl.call_methods().next().ok_or_else(|| GenerationError::CallbackShape {
            decl: class.host_name.clone(),
            found: 0,
        })?;
        let decl = format!("{}.{}", class.host_name, call.host_name);
        let site = Site {
            set: cx.set,
            resolution: cx.resolution,
            from: class.id,
            decl: &decl,
            flags: call.flags,
        };

        let params = call
            .params
            .iter()
            .enumerate()
            .map(|(i, p)| map_param(&site, i, p).map(|m| m.native_type))
            .collect::<Result<Vec<_>, _>>()?;
        let ret = map_return(&site, &call.returns)?;
        if !matches!(
            ret.kind,
            ReturnKind::Void | ReturnKind::Value { .. } | ReturnKind::Pointer | ReturnKind::Function
        ) {
            return Err(GenerationError::UnsupportedType {
                decl,
                ty: call.returns.host.host_name(),
                detail: "callback results must be primitives or pointers".to_string(),
            });
        }

        // the call method's declarations come before the class's
        let throws = call
            .throws
            .iter()
            .chain(class.throws.iter())
            .next()
            .cloned()
            .unwrap_or_else(|| DEFAULT_NATIVE_KIND.to_string());

        Ok(Self {
            hash: DeclHash::from_method(entry.hash, &call.host_name, &call.host_param_names()),
            symbol: class.symbol.clone(),
            fn_type: class.fn_type(),
            functor_type: class.functor_type(),
            params,
            ret: ret.native_type,
            throws,
            no_exception: class.no_exception() || call.flags.contains(Annotations::NO_EXCEPTION),
            host_implemented: call.flags.contains(Annotations::HOST_IMPLEMENTED),
            exported: class.flags.contains(ClassFlags::EXPORT_CALLBACK),
            decl,
        })
    }

    fn is_void(&self) -> bool {
        self.ret == "void"
    }

    fn named_params(&self) -> String {
        if self.params.is_empty() {
            return "void".to_string();
        }
        self.params
            .iter()
            .enumerate()
            .map(|(i, ty)| format!("{ty} p{i}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    fn forwarded_args(&self) -> String {
        (0..self.params.len()).map(|i| format!("p{i}")).collect::<Vec<_>>().join(", ")
    }

    fn trampoline(&self, slot: usize) -> String {
        format!("{}_t{slot}", self.symbol)
    }

    fn slots_table(&self) -> String {
        format!("{}_slots", self.symbol)
    }

    /// The exported function binding a trampoline slot to a handle.
    pub fn binder(&self) -> String {
        format!("{}_allocate", self.symbol)
    }
}

/// Emit the typedef and functor of every callback shape.
pub fn emit_callback_types(shapes: &[CallbackShape]) -> String {
    let mut w = SourceWriter::new();
    for shape in shapes {
        let types = if shape.params.is_empty() {
            "void".to_string()
        } else {
            shape.params.join(", ")
        };
        w.line(&format!("typedef {} (*{})({types});", shape.ret, shape.fn_type));
        w.blank();
        w.open(&format!("struct {}", shape.functor_type));
        w.line(&format!("{} fn;", shape.fn_type));
        let params = if shape.params.is_empty() {
            String::new()
        } else {
            shape.named_params()
        };
        w.open(&format!("{} operator()({params}) const", shape.ret));
        w.line(&format!("return fn({});", shape.forwarded_args()));
        w.close();
        w.close_with("};");
        w.blank();
    }
    w.finish()
}

/// Emit the trampolines, slot table, and binder of a host-implemented callback.
#[cfg_attr(feature = "profiling", profiling::function)]
pub fn emit_trampolines(options: &GeneratorOptions, shape: &CallbackShape) -> Vec<EmittedFunction> {
    if !shape.host_implemented || options.callback_slots == 0 {
        return Vec::new();
    }
    let slots = options.callback_slots;
    let mut out = Vec::with_capacity(slots + 2);

    for slot in 0..slots {
        out.push(EmittedFunction {
            decl: shape.decl.clone(),
            symbol: shape.trampoline(slot),
            kind: FunctionKind::Trampoline,
            body: trampoline_body(shape, slot),
            temporaries: Vec::new(),
            no_exception: shape.no_exception,
        });
    }

    let mut w = SourceWriter::new();
    w.open(&format!("static const {} {}[{slots}] =", shape.fn_type, shape.slots_table()));
    for slot in 0..slots {
        w.line(&format!("{},", shape.trampoline(slot)));
    }
    w.close_with("};");
    out.push(EmittedFunction {
        decl: shape.decl.clone(),
        symbol: shape.slots_table(),
        kind: FunctionKind::Support,
        body: w.finish(),
        temporaries: Vec::new(),
        no_exception: true,
    });

    let mut w = SourceWriter::new();
    w.open(&format!(
        "extern \"C\" NB_EXPORT nb_status {}(nb_env* env, nb_pointer* self, int32_t slot)",
        shape.binder()
    ));
    w.line("if (self == NULL) return nb_fail_null(env);");
    w.line(&format!(
        "if (slot < 0 || slot >= {slots}) return nb_fail_index(env, slot, {slots});"
    ));
    w.line(&format!(
        "nb_set_pointer(self, reinterpret_cast<void*>({}[slot]), 1, NULL);",
        shape.slots_table()
    ));
    w.line("return NB_OK;");
    w.close();
    out.push(EmittedFunction {
        decl: shape.decl.clone(),
        symbol: shape.binder(),
        kind: FunctionKind::Bridge,
        body: w.finish(),
        temporaries: Vec::new(),
        no_exception: true,
    });

    debug!(decl = %shape.decl, slots, "emitted trampolines");
    out
}

fn trampoline_signature(shape: &CallbackShape, slot: usize) -> String {
    format!("{} {}({})", shape.ret, shape.trampoline(slot), shape.named_params())
}

fn trampoline_body(shape: &CallbackShape, slot: usize) -> String {
    let linkage = if shape.exported { "extern \"C\" NB_EXPORT" } else { "static" };
    let noexcept = if shape.no_exception { " noexcept" } else { "" };
    let fail = |message: &str| {
        if shape.no_exception {
            "std::terminate();".to_string()
        } else {
            format!("throw {}({message});", shape.throws)
        }
    };

    let mut w = SourceWriter::new();
    w.open(&format!("{linkage} {}{noexcept}", trampoline_signature(shape, slot)));
    w.line("nb_attach_guard nb_guard;");
    w.line(&format!(
        "if (!nb_guard.ok) {}",
        fail("\"host runtime unavailable on this thread\"")
    ));
    if shape.params.is_empty() {
        w.line("void** nb_args = NULL;");
    } else {
        let args = (0..shape.params.len())
            .map(|i| format!("(void*)&p{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        w.line(&format!("void* nb_args[] = {{ {args} }};"));
    }
    let result = if shape.is_void() {
        "NULL"
    } else {
        w.line(&format!("{} nb_result = {{}};", shape.ret));
        "&nb_result"
    };
    w.line("nb_env nb_call_env = {};");
    w.line(&format!(
        "nb_status nb_rc = nb_runtime.dispatch(nb_runtime.host, &nb_call_env, 0x{:016x}ULL, {slot}, nb_args, {result});",
        shape.hash.as_u64()
    ));
    w.line(&format!("if (nb_rc != NB_OK) {}", fail("nb_call_env.message")));
    if !shape.is_void() {
        w.line("return nb_result;");
    }
    w.close();
    w.finish()
}

/// Emit the companion header declaring exported trampolines.
pub fn emit_header(options: &GeneratorOptions, shapes: &[CallbackShape]) -> String {
    let guard = format!("{}_", mangle(&options.header_name).to_uppercase());
    let mut w = SourceWriter::new();
    w.line("// Generated by nativebind. Do not edit.");
    w.line(&format!("#ifndef {guard}"));
    w.line(&format!("#define {guard}"));
    w.blank();
    w.line("#ifdef __cplusplus");
    w.line("extern \"C\" {");
    w.line("#endif");
    w.blank();
    for shape in shapes.iter().filter(|s| s.exported && s.host_implemented) {
        for slot in 0..options.callback_slots {
            w.line(&format!("{};", trampoline_signature(shape, slot)));
        }
    }
    w.blank();
    w.line("#ifdef __cplusplus");
    w.line("}");
    w.line("#endif");
    w.blank();
    w.line(&format!("#endif // {guard}"));
    w.finish()
}
