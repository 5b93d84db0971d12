//! Emit phase: native source text for each declaration.
//!
//! The [`SourceWriter`] is the indentation-aware text buffer every emitter
//! writes through. Each declaration produces one or more
//! [`EmittedFunction`]s, which the finalize pass checks before they are
//! assembled into the unit.
//!
//! # Example
//!
//! ```ignore
//! let mut w = SourceWriter::new();
//! w.open("int main(void)");
//! w.line("return 0;");
//! w.close();
//! assert_eq!(w.finish(), "int main(void) {\n  return 0;\n}\n");
//! ```

mod bridge;
mod callback;
mod prelude;

pub use bridge::emit_class;
pub use callback::{CallbackShape, emit_callback_types, emit_header, emit_trampolines};
pub use prelude::{emit_prelude, set_runtime_symbol};

use nativebind_registry::DeclarationSet;

use crate::GeneratorOptions;
use crate::resolve::Resolution;

/// Indentation-aware source buffer.
#[derive(Debug, Default)]
pub struct SourceWriter {
    out: String,
    indent: usize,
}

impl SourceWriter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write one line at the current indentation.
    pub fn line(&mut self, s: &str) {
        if s.is_empty() {
            self.out.push('\n');
            return;
        }
        for _ in 0..self.indent {
            self.out.push_str("  ");
        }
        self.out.push_str(s);
        self.out.push('\n');
    }

    pub fn lines<S: AsRef<str>>(&mut self, lines: impl IntoIterator<Item = S>) {
        for line in lines {
            self.line(line.as_ref());
        }
    }

    pub fn blank(&mut self) {
        self.out.push('\n');
    }

    /// Write `header {` and indent.
    pub fn open(&mut self, header: &str) {
        self.line(&format!("{header} {{"));
        self.indent += 1;
    }

    /// Dedent and write `}`.
    pub fn close(&mut self) {
        self.close_with("}");
    }

    /// Dedent and write a custom closing line such as `};` or `} catch (...) {`.
    pub fn close_with(&mut self, closing: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(closing);
    }

    /// Dedent, write `closing`, and indent again.
    pub fn reopen(&mut self, closing: &str) {
        self.indent = self.indent.saturating_sub(1);
        self.line(closing);
        self.indent += 1;
    }

    /// Append already formatted text verbatim.
    pub fn raw(&mut self, text: &str) {
        self.out.push_str(text);
    }

    pub fn finish(self) -> String {
        self.out
    }
}

/// What an emitted function is, for the finalize checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FunctionKind {
    /// An exported function called by the host.
    Bridge,
    /// A native-callable stub running host logic.
    Trampoline,
    /// A file-local helper such as a slot table.
    Support,
}

/// One emitted definition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmittedFunction {
    /// Qualified host name of the declaration it came from.
    pub decl: String,
    /// Exported or file-local identifier.
    pub symbol: String,
    pub kind: FunctionKind,
    /// Full definition text.
    pub body: String,
    /// Adapter temporaries declared in the body.
    pub temporaries: Vec<String>,
    /// No exception handling may appear in the body.
    pub no_exception: bool,
}

/// Shared inputs of the emitters.
#[derive(Clone, Copy)]
pub struct Context<'a> {
    pub set: &'a DeclarationSet,
    pub resolution: &'a Resolution,
    pub options: &'a GeneratorOptions,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_indents_blocks() {
        let mut w = SourceWriter::new();
        w.open("int main(void)");
        w.open("if (x)");
        w.line("return 1;");
        w.close();
        w.line("return 0;");
        w.close();
        assert_eq!(
            w.finish(),
            "int main(void) {\n  if (x) {\n    return 1;\n  }\n  return 0;\n}\n"
        );
    }

    #[test]
    fn reopen_keeps_depth() {
        let mut w = SourceWriter::new();
        w.open("try");
        w.line("f();");
        w.reopen("} catch (...) {");
        w.line("g();");
        w.close();
        assert_eq!(w.finish(), "try {\n  f();\n} catch (...) {\n  g();\n}\n");
    }

    #[test]
    fn close_never_underflows() {
        let mut w = SourceWriter::new();
        w.close_with("};");
        w.line("x;");
        assert_eq!(w.finish(), "};\nx;\n");
    }
}
