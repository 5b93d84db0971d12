//! Native bridging code generator.
//!
//! Turns a [`DeclarationSet`] into one native compilation unit in four phases:
//!
//! 1. **Resolve** ([`resolve`]): native names and class-level validation
//! 2. **Map types** ([`type_map`], [`overload`]): native argument and return code
//! 3. **Emit** ([`emit`]): bridging functions, callback types, trampolines
//! 4. **Finalize** ([`finalize`]): scoped-resource and identifier checks
//!
//! A declaration that fails any phase is reported in
//! [`GeneratedUnit::diagnostics`] and left out; generation continues with the
//! remaining declarations.
//!
//! # Example
//!
//! ```
//! use nativebind_core::{ClassDecl, MethodDecl, PrimitiveKind, TypeSpec};
//! use nativebind_generator::{Generator, GeneratorOptions};
//! use nativebind_registry::DeclarationSet;
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
//! let unit = Generator::new(GeneratorOptions::default()).generate(&set);
//! assert!(unit.diagnostics.is_empty());
//! assert!(unit.symbols.contains(&"nb_Mat_rows".to_string()));
//! assert!(unit.source.contains("nb_this->rows()"));
//! ```

pub mod emit;
pub mod finalize;
mod options;
pub mod overload;
pub mod resolve;
pub mod type_map;

pub use options::GeneratorOptions;

use nativebind_core::{ClassKind, GenerationError};
use nativebind_registry::DeclarationSet;
use tracing::{debug, info, warn};

use emit::{CallbackShape, Context};
use resolve::Resolution;

/// The output of one generation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GeneratedUnit {
    /// The native compilation unit.
    pub source: String,
    /// The companion trampoline header, when requested.
    pub header: Option<String>,
    /// Exported symbols, in emission order.
    pub symbols: Vec<String>,
    /// Errors for declarations that were skipped.
    pub diagnostics: Vec<GenerationError>,
}

impl GeneratedUnit {
    /// Check if every declaration was emitted.
    pub fn is_complete(&self) -> bool {
        self.diagnostics.is_empty()
    }
}

/// Runs the generation phases over declaration sets.
#[derive(Debug, Clone, Default)]
pub struct Generator {
    options: GeneratorOptions,
}

impl Generator {
    pub fn new(options: GeneratorOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &GeneratorOptions {
        &self.options
    }

    /// Generate the compilation unit for `set`.
    #[cfg_attr(feature = "profiling", profiling::function)]
    pub fn generate(&self, set: &DeclarationSet) -> GeneratedUnit {
        let options = &self.options;
        let (resolution, mut diagnostics) = Resolution::build(set, options);
        for err in &diagnostics {
            warn!(decl = err.decl(), error = %err, "skipping class");
        }
        let cx = Context {
            set,
            resolution: &resolution,
            options,
        };

        let mut shapes: Vec<CallbackShape> = Vec::new();
        let mut functions = Vec::new();
        for entry in set.classes() {
            let Some(class) = resolution.get(entry.id) else {
                continue;
            };
            if class.kind == ClassKind::Callback {
                match CallbackShape::build(&cx, class, entry) {
                    Ok(shape) => shapes.push(shape),
                    Err(err) => {
                        warn!(decl = err.decl(), error = %err, "skipping callback");
                        diagnostics.push(err);
                        continue;
                    }
                }
            }
            emit::emit_class(&cx, class, entry, &mut functions, &mut diagnostics);
        }
        for shape in &shapes {
            functions.extend(emit::emit_trampolines(options, shape));
        }

        let (functions, errors) = finalize::finalize(functions);
        diagnostics.extend(errors);

        let mut source = String::new();
        let mut symbols = Vec::new();
        if options.include_prelude {
            source.push_str(&emit::emit_prelude(options));
            symbols.push(emit::set_runtime_symbol(options));
        }
        source.push_str(&emit::emit_callback_types(&shapes));
        for function in &functions {
            source.push_str(&function.body);
            source.push('\n');
            if function.body.starts_with("extern \"C\"") {
                symbols.push(function.symbol.clone());
            }
        }

        let header = options.emit_header.then(|| emit::emit_header(options, &shapes));
        info!(
            classes = set.len(),
            functions = functions.len(),
            skipped = diagnostics.len(),
            "generated unit"
        );
        debug!(bytes = source.len(), header = header.is_some(), "unit size");

        GeneratedUnit {
            source,
            header,
            symbols,
            diagnostics,
        }
    }
}

/// The runtime prelude alone, for units assembled by hand.
pub fn prelude(options: &GeneratorOptions) -> String {
    emit::emit_prelude(options)
}

#[cfg(test)]
mod tests {
    use super::*;
    use nativebind_core::{Annotations, ClassDecl, MethodDecl, PrimitiveKind, TypeSpec};

    fn generate(set: &DeclarationSet, options: GeneratorOptions) -> GeneratedUnit {
        Generator::new(options).generate(set)
    }

    #[test]
    fn empty_set_yields_prelude_only() {
        let unit = generate(&DeclarationSet::new(), GeneratorOptions::default());
        assert!(unit.is_complete());
        assert_eq!(unit.symbols, vec!["nb_set_runtime"]);
        assert!(unit.source.starts_with("// Generated by nativebind."));
        assert!(unit.header.is_none());
    }

    #[test]
    fn prelude_can_be_left_out() {
        let unit = generate(&DeclarationSet::new(), GeneratorOptions::default().with_prelude(false));
        assert!(unit.source.is_empty());
        assert!(unit.symbols.is_empty());
    }

    #[test]
    fn broken_classes_do_not_stop_generation() {
        let mut set = DeclarationSet::new();
        set.add_class(ClassDecl::callback("Broken")).unwrap();
        set.add_class(ClassDecl::opaque("Fine").method(MethodDecl::new("run"))).unwrap();
        let unit = generate(&set, GeneratorOptions::default());
        assert_eq!(unit.diagnostics.len(), 1);
        assert_eq!(unit.diagnostics[0].decl(), "Broken");
        assert!(unit.symbols.contains(&"nb_Fine_run".to_string()));
    }

    #[test]
    fn callbacks_emit_types_before_bridges() {
        let mut set = DeclarationSet::new();
        set.add_class(
            ClassDecl::callback("Listener").method(
                MethodDecl::call()
                    .flags(Annotations::HOST_IMPLEMENTED)
                    .param("code", TypeSpec::primitive(PrimitiveKind::Int)),
            ),
        )
        .unwrap();
        let unit = generate(&set, GeneratorOptions::default().with_callback_slots(2).with_header(true));
        assert!(unit.is_complete(), "{:?}", unit.diagnostics);

        let typedef = unit.source.find("typedef void (*nb_Listener_fn)(int);").unwrap();
        let call = unit.source.find("nb_status nb_Listener_call(").unwrap();
        let trampoline = unit.source.find("static void nb_Listener_t0(int p0)").unwrap();
        assert!(typedef < call && call < trampoline);
        assert_eq!(
            unit.symbols,
            vec!["nb_set_runtime", "nb_Listener_call", "nb_Listener_allocate"]
        );
        assert!(!unit.source.contains("nb_Listener_t2"));
        assert!(unit.header.is_some());
    }
}
