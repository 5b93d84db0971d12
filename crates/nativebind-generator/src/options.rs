//! Generator configuration.

/// Options controlling one generation run.
///
/// ```
/// use nativebind_generator::GeneratorOptions;
///
/// let options = GeneratorOptions::default()
///     .with_symbol_prefix("cv")
///     .with_header(true)
///     .with_include("<opencv2/core.hpp>");
/// assert_eq!(options.symbol_prefix, "cv");
/// assert!(options.emit_header);
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratorOptions {
    /// Prefix of every exported identifier.
    pub symbol_prefix: String,
    /// Produce the companion trampoline header.
    pub emit_header: bool,
    /// File name of the companion header, also used for its include guard.
    pub header_name: String,
    /// Emit the runtime prelude at the top of the unit.
    pub include_prelude: bool,
    /// Native exception type caught by bridging functions.
    pub default_exception: String,
    /// Additional `#include` targets, spelled with their delimiters.
    pub extra_includes: Vec<String>,
    /// Trampolines generated per host-implemented callback.
    pub callback_slots: usize,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            symbol_prefix: "nb".to_string(),
            emit_header: false,
            header_name: "nativebind_callbacks.h".to_string(),
            include_prelude: true,
            default_exception: "std::exception".to_string(),
            extra_includes: Vec::new(),
            callback_slots: 10,
        }
    }
}

impl GeneratorOptions {
    pub fn with_symbol_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.symbol_prefix = prefix.into();
        self
    }

    pub fn with_header(mut self, emit: bool) -> Self {
        self.emit_header = emit;
        self
    }

    pub fn with_header_name(mut self, name: impl Into<String>) -> Self {
        self.header_name = name.into();
        self
    }

    pub fn with_prelude(mut self, include: bool) -> Self {
        self.include_prelude = include;
        self
    }

    pub fn with_default_exception(mut self, exception: impl Into<String>) -> Self {
        self.default_exception = exception.into();
        self
    }

    /// Add an include target such as `<vector>` or `"mylib.h"`.
    pub fn with_include(mut self, include: impl Into<String>) -> Self {
        self.extra_includes.push(include.into());
        self
    }

    pub fn with_callback_slots(mut self, slots: usize) -> Self {
        self.callback_slots = slots;
        self
    }

    /// Build an exported identifier from mangled fragments.
    pub(crate) fn symbol(&self, fragments: &[&str]) -> String {
        let mut out = self.symbol_prefix.clone();
        for fragment in fragments.iter().filter(|f| !f.is_empty()) {
            if !out.is_empty() {
                out.push('_');
            }
            out.push_str(fragment);
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = GeneratorOptions::default();
        assert_eq!(options.symbol_prefix, "nb");
        assert!(!options.emit_header);
        assert_eq!(options.header_name, "nativebind_callbacks.h");
        assert!(options.include_prelude);
        assert_eq!(options.default_exception, "std::exception");
        assert_eq!(options.callback_slots, 10);
    }

    #[test]
    fn symbols_join_fragments() {
        let options = GeneratorOptions::default();
        assert_eq!(options.symbol(&["demo_Foo", "bar"]), "nb_demo_Foo_bar");
        let bare = options.with_symbol_prefix("");
        assert_eq!(bare.symbol(&["Foo", "", "bar"]), "Foo_bar");
    }
}
